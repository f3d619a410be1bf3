//! Environment variable substitution for config file values.

use crate::error::ConfigError;
use regex::Regex;
use std::sync::LazyLock;

static ENV_VAR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid env var regex")
});

/// Replace every `${VAR}` reference with the variable's value.
///
/// Substituted values are not scanned again. All undefined variables are
/// reported together in a single error.
pub fn resolve_env_vars(value: &str) -> Result<String, ConfigError> {
    let mut missing: Vec<String> = Vec::new();

    let resolved = ENV_VAR_PATTERN.replace_all(value, |caps: &regex::Captures<'_>| {
        std::env::var(&caps[1]).unwrap_or_else(|_| {
            if !missing.iter().any(|m| m == &caps[1]) {
                missing.push(caps[1].to_string());
            }
            String::new()
        })
    });

    match missing.len() {
        0 => Ok(resolved.into_owned()),
        1 => Err(ConfigError::invalid(format!(
            "undefined environment variable: {}",
            missing[0]
        ))),
        _ => Err(ConfigError::invalid(format!(
            "undefined environment variables: {}",
            missing.join(", ")
        ))),
    }
}
