//! Unvalidated settings and the layers they are assembled from.
//!
//! Each layer (config file, command line, event annotations) produces a
//! [`RawSettings`] where every field is optional. Layers are stacked with
//! [`RawSettings::overlay`] and the result is handed to
//! [`Settings::validate`](super::Settings::validate).

use super::env::resolve_env_vars;
use super::secret::SecretString;
use crate::error::ConfigError;
use crate::event::Event;
use serde::Deserialize;
use std::path::Path;

/// Annotation prefix for per-event configuration overrides.
pub const ANNOTATION_KEYSPACE: &str = "event-mailer/config";

/// Settings as supplied by one configuration layer.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawSettings {
    pub smtp_host: Option<String>,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<SecretString>,
    pub smtp_port: Option<u64>,
    pub to_email: Option<String>,
    pub from_email: Option<String>,
    pub auth_method: Option<String>,
    pub tls_skip_verify: Option<bool>,
    pub hookout: Option<bool>,
    pub body_template: Option<String>,
    pub body_template_file: Option<String>,
    pub subject_template: Option<String>,
    /// Deprecated: port 25, no authentication, no certificate verification.
    pub insecure: Option<bool>,
    /// Deprecated: same as `auth_method: login`.
    pub enable_login_auth: Option<bool>,
}

impl RawSettings {
    /// Load a YAML config file and substitute `${VAR}` references.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::LoadError(format!("{}: {}", path.display(), e)))?;
        let raw: RawSettings = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::LoadError(format!("{}: {}", path.display(), e)))?;
        tracing::debug!(path = %path.display(), "Config file loaded");
        raw.resolve_env()
    }

    fn resolve_env(self) -> Result<Self, ConfigError> {
        let resolve = |field: &str, value: Option<String>| {
            value
                .map(|v| resolve_env_vars(&v))
                .transpose()
                .map_err(|e| ConfigError::invalid(format!("{}: {}", field, e)))
        };

        Ok(Self {
            smtp_host: resolve("smtp_host", self.smtp_host)?,
            smtp_username: resolve("smtp_username", self.smtp_username)?,
            smtp_password: resolve(
                "smtp_password",
                self.smtp_password.map(|p| p.expose().to_string()),
            )?
            .map(SecretString::new),
            to_email: resolve("to_email", self.to_email)?,
            from_email: resolve("from_email", self.from_email)?,
            auth_method: resolve("auth_method", self.auth_method)?,
            body_template_file: resolve("body_template_file", self.body_template_file)?,
            ..self
        })
    }

    /// Stack `upper` on top of `self`; values set in `upper` win.
    pub fn overlay(self, upper: RawSettings) -> RawSettings {
        RawSettings {
            smtp_host: upper.smtp_host.or(self.smtp_host),
            smtp_username: upper.smtp_username.or(self.smtp_username),
            smtp_password: upper.smtp_password.or(self.smtp_password),
            smtp_port: upper.smtp_port.or(self.smtp_port),
            to_email: upper.to_email.or(self.to_email),
            from_email: upper.from_email.or(self.from_email),
            auth_method: upper.auth_method.or(self.auth_method),
            tls_skip_verify: upper.tls_skip_verify.or(self.tls_skip_verify),
            hookout: upper.hookout.or(self.hookout),
            body_template: upper.body_template.or(self.body_template),
            body_template_file: upper.body_template_file.or(self.body_template_file),
            subject_template: upper.subject_template.or(self.subject_template),
            insecure: upper.insecure.or(self.insecure),
            enable_login_auth: upper.enable_login_auth.or(self.enable_login_auth),
        }
    }

    /// Collect overrides from `event-mailer/config/<option>` annotations.
    ///
    /// Check annotations take precedence over entity annotations. The SMTP
    /// password is never read from annotations.
    pub fn from_annotations(event: &Event) -> Result<Self, ConfigError> {
        let text = |option: &str| {
            event
                .annotation(&format!("{}/{}", ANNOTATION_KEYSPACE, option))
                .map(str::to_string)
        };
        let flag = |option: &str| -> Result<Option<bool>, ConfigError> {
            text(option)
                .map(|v| {
                    v.trim().parse::<bool>().map_err(|_| {
                        ConfigError::invalid(format!(
                            "annotation {}/{}: '{}' is not a boolean",
                            ANNOTATION_KEYSPACE, option, v
                        ))
                    })
                })
                .transpose()
        };

        let smtp_port = text("smtpPort")
            .map(|v| {
                v.trim().parse::<u64>().map_err(|_| {
                    ConfigError::invalid(format!(
                        "annotation {}/smtpPort: '{}' is not a port number",
                        ANNOTATION_KEYSPACE, v
                    ))
                })
            })
            .transpose()?;

        let raw = RawSettings {
            smtp_host: text("smtpHost"),
            smtp_username: text("smtpUsername"),
            smtp_password: None,
            smtp_port,
            to_email: text("toEmail"),
            from_email: text("fromEmail"),
            auth_method: text("authMethod"),
            tls_skip_verify: flag("tlsSkipVerify")?,
            hookout: flag("hookout")?,
            body_template: text("bodyTemplate"),
            body_template_file: text("bodyTemplateFile"),
            subject_template: text("subjectTemplate"),
            insecure: flag("insecure")?,
            enable_login_auth: flag("enableLoginAuth")?,
        };

        if event
            .annotation(&format!("{}/smtpPassword", ANNOTATION_KEYSPACE))
            .is_some()
        {
            tracing::warn!("Ignoring smtpPassword annotation, credentials cannot be overridden per event");
        }

        Ok(raw)
    }
}
