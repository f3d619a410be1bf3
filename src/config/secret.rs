//! SMTP password wrapper that never appears in logs.

use serde::Deserialize;
use std::fmt;

const REDACTED: &str = "[REDACTED]";

/// Credential value that formats as `[REDACTED]`.
///
/// Used for the SMTP password from every configuration layer so that
/// `Settings` and `RawSettings` can be logged with `{:?}` safely.
///
/// # Example
///
/// ```
/// use event_mailer::config::SecretString;
///
/// let password = SecretString::new("hunter2".to_string());
/// assert_eq!(format!("{:?}", password), "[REDACTED]");
/// assert_eq!(password.expose(), "hunter2");
/// ```
#[derive(Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(s: String) -> Self {
        SecretString(s)
    }

    /// The plain value, for the AUTH exchange only.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        SecretString(s)
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}
