//! Validated settings for one delivery.

use super::raw::RawSettings;
use super::secret::SecretString;
use super::source::{TemplateFetcher, TemplateLocation};
use crate::error::ConfigError;
use crate::template::{DEFAULT_BODY_TEMPLATE, DEFAULT_SUBJECT_TEMPLATE, HOOK_OUTPUT_BODY_TEMPLATE};
use lettre::message::Mailbox;
use std::str::FromStr;

/// Default SMTP submission port.
pub const DEFAULT_SMTP_PORT: u16 = 587;

/// Port forced by the deprecated `insecure` option.
const INSECURE_SMTP_PORT: u16 = 25;

/// SMTP authentication method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    None,
    Plain,
    Login,
}

impl AuthMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMethod::None => "none",
            AuthMethod::Plain => "plain",
            AuthMethod::Login => "login",
        }
    }
}

impl FromStr for AuthMethod {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(AuthMethod::None),
            "plain" => Ok(AuthMethod::Plain),
            "login" => Ok(AuthMethod::Login),
            other => Err(ConfigError::invalid(format!(
                "{} is not a valid auth method",
                other
            ))),
        }
    }
}

impl std::fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the effective body template came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyTemplateSource {
    /// Built-in template listing check hook output.
    HookOutput,
    /// Loaded from a local file or URL.
    External(TemplateLocation),
    /// Literal template supplied in the configuration.
    Inline,
    /// Built-in template printing the check output.
    Default,
}

impl std::fmt::Display for BodyTemplateSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BodyTemplateSource::HookOutput => f.write_str("hook output"),
            BodyTemplateSource::External(location) => write!(f, "{}", location),
            BodyTemplateSource::Inline => f.write_str("inline"),
            BodyTemplateSource::Default => f.write_str("default"),
        }
    }
}

/// Settings after validation.
///
/// Fields are only reachable through accessors so the invariants established
/// by [`Settings::validate`] hold for the rest of the run:
/// - the auth method is one of the three canonical values,
/// - username and password are non-empty unless the auth method is `none`,
/// - the sender address parsed as an RFC 5322 mailbox.
#[derive(Debug, Clone)]
pub struct Settings {
    smtp_host: String,
    smtp_port: u16,
    smtp_username: String,
    smtp_password: SecretString,
    to_email: String,
    from_email: String,
    from_header: String,
    auth_method: AuthMethod,
    tls_skip_verify: bool,
    hookout: bool,
    body_template_source: BodyTemplateSource,
    body_template: String,
    subject_template: String,
}

impl Settings {
    /// Validate raw settings and resolve the effective body template.
    ///
    /// Rules are applied in order and the first violation is returned:
    /// 1. host, recipient and sender must be present, the recipient on one line
    /// 2. the port must fit in 16 bits
    /// 3. deprecated options are translated (`insecure` wins over `enable_login_auth`)
    /// 4. the auth method must be `none`, `plain` or `login` (empty means `plain`)
    /// 5. credentials are required unless the auth method is `none`
    /// 6. `hookout` and `body_template_file` are mutually exclusive
    /// 7. the body template is chosen: hook output > file/URL > inline > default
    /// 8. the sender is parsed as a mailbox
    ///
    /// # Errors
    ///
    /// * `ConfigError::ValidationError` - missing, invalid or conflicting settings
    /// * `ConfigError::TemplateLoad` - the body template file could not be fetched
    /// * `ConfigError::AddressParse` - the sender is not a valid mailbox
    pub async fn validate(
        raw: RawSettings,
        fetcher: &dyn TemplateFetcher,
    ) -> Result<Self, ConfigError> {
        let smtp_host = non_empty(raw.smtp_host)
            .ok_or_else(|| ConfigError::invalid("missing smtp host"))?;
        let to_email = non_empty(raw.to_email)
            .ok_or_else(|| ConfigError::invalid("missing destination email address"))?;
        if to_email.contains(['\r', '\n']) {
            return Err(ConfigError::invalid(
                "destination email address contains a line break",
            ));
        }
        let from_input =
            non_empty(raw.from_email).ok_or_else(|| ConfigError::invalid("from email is empty"))?;

        let port = raw.smtp_port.unwrap_or(u64::from(DEFAULT_SMTP_PORT));
        let mut smtp_port = u16::try_from(port)
            .map_err(|_| ConfigError::invalid(format!("smtp port {} is out of range", port)))?;

        let mut auth_method = raw.auth_method.unwrap_or_default();
        let mut tls_skip_verify = raw.tls_skip_verify.unwrap_or(false);

        if raw.enable_login_auth.unwrap_or(false) {
            tracing::warn!("enableLoginAuth is deprecated, use authMethod=login");
            auth_method = AuthMethod::Login.as_str().to_string();
        }
        if raw.insecure.unwrap_or(false) {
            tracing::warn!(
                "insecure is deprecated, use smtpPort=25 authMethod=none tlsSkipVerify=true"
            );
            smtp_port = INSECURE_SMTP_PORT;
            auth_method = AuthMethod::None.as_str().to_string();
            tls_skip_verify = true;
        }

        let auth_method = if auth_method.is_empty() {
            AuthMethod::Plain
        } else {
            auth_method.parse::<AuthMethod>()?
        };

        let smtp_username = raw.smtp_username.unwrap_or_default();
        let smtp_password = raw.smtp_password.unwrap_or_default();
        if auth_method != AuthMethod::None {
            if smtp_username.is_empty() {
                return Err(ConfigError::invalid("smtp username is empty"));
            }
            if smtp_password.is_empty() {
                return Err(ConfigError::invalid("smtp password is empty"));
            }
        }

        let hookout = raw.hookout.unwrap_or(false);
        let body_template_file = non_empty(raw.body_template_file);
        if hookout && body_template_file.is_some() {
            return Err(ConfigError::invalid(
                "--hookout (-H) and --bodyTemplateFile (-T) are mutually exclusive",
            ));
        }

        let (body_template_source, body_template) = if hookout {
            (
                BodyTemplateSource::HookOutput,
                HOOK_OUTPUT_BODY_TEMPLATE.to_string(),
            )
        } else if let Some(file) = body_template_file {
            let location = TemplateLocation::parse(&file)?;
            let text = fetcher
                .fetch(&location)
                .await
                .map_err(|source| ConfigError::TemplateLoad {
                    location: file.clone(),
                    source,
                })?;
            (BodyTemplateSource::External(location), text)
        } else if let Some(inline) = non_empty(raw.body_template) {
            (BodyTemplateSource::Inline, inline)
        } else {
            (
                BodyTemplateSource::Default,
                DEFAULT_BODY_TEMPLATE.to_string(),
            )
        };
        tracing::debug!(source = %body_template_source, "Body template selected");

        let mailbox: Mailbox = from_input
            .parse()
            .map_err(|e: lettre::address::AddressError| ConfigError::AddressParse {
                input: from_input.clone(),
                message: e.to_string(),
            })?;

        let subject_template = non_empty(raw.subject_template)
            .unwrap_or_else(|| DEFAULT_SUBJECT_TEMPLATE.to_string());

        if tls_skip_verify {
            tracing::warn!("TLS certificate verification is disabled");
        }

        Ok(Self {
            smtp_host,
            smtp_port,
            smtp_username,
            smtp_password,
            to_email,
            from_email: mailbox.email.to_string(),
            from_header: mailbox.to_string(),
            auth_method,
            tls_skip_verify,
            hookout,
            body_template_source,
            body_template,
            subject_template,
        })
    }

    pub fn smtp_host(&self) -> &str {
        &self.smtp_host
    }

    pub fn smtp_port(&self) -> u16 {
        self.smtp_port
    }

    /// `host:port` for connecting.
    pub fn smtp_address(&self) -> String {
        format!("{}:{}", self.smtp_host, self.smtp_port)
    }

    pub fn smtp_username(&self) -> &str {
        &self.smtp_username
    }

    pub fn smtp_password(&self) -> &SecretString {
        &self.smtp_password
    }

    pub fn to_email(&self) -> &str {
        &self.to_email
    }

    /// Bare sender address, used for the envelope.
    pub fn from_email(&self) -> &str {
        &self.from_email
    }

    /// Sender formatted for the `From` header.
    pub fn from_header(&self) -> &str {
        &self.from_header
    }

    pub fn auth_method(&self) -> AuthMethod {
        self.auth_method
    }

    pub fn tls_skip_verify(&self) -> bool {
        self.tls_skip_verify
    }

    pub fn hookout(&self) -> bool {
        self.hookout
    }

    pub fn body_template_source(&self) -> &BodyTemplateSource {
        &self.body_template_source
    }

    /// Effective body template text.
    pub fn body_template(&self) -> &str {
        &self.body_template
    }

    pub fn subject_template(&self) -> &str {
        &self.subject_template
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
