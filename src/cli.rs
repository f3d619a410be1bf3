//! Command-line interface for event-mailer using clap.
//!
//! Every mailer option can be given as a flag; options left unset fall
//! through to the config file (`-c`) and defaults.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::config::{RawSettings, SecretString};

/// Log output format.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum LogFormat {
    /// Human-readable text format (default).
    #[default]
    Text,
    /// Structured JSON format for log aggregation.
    Json,
}

/// Send a monitoring event notification by email.
#[derive(Parser, Debug)]
#[command(name = "event-mailer")]
#[command(version)]
#[command(about = "Send a monitoring event notification by email")]
pub struct Cli {
    /// Path to a YAML configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Read the event JSON from this file instead of stdin.
    #[arg(short = 'e', long = "event-file")]
    pub event_file: Option<PathBuf>,

    /// Validate configuration and exit.
    #[arg(long = "validate")]
    pub validate: bool,

    /// Log format: text or json.
    #[arg(long = "log-format", value_enum, default_value_t = LogFormat::Text, env = "LOG_FORMAT")]
    pub log_format: LogFormat,

    /// The SMTP host to use to send email.
    #[arg(short = 's', long = "smtpHost")]
    pub smtp_host: Option<String>,

    /// The SMTP username.
    #[arg(short = 'u', long = "smtpUsername", env = "SMTP_USERNAME")]
    pub smtp_username: Option<String>,

    /// The SMTP password.
    #[arg(short = 'p', long = "smtpPassword", env = "SMTP_PASSWORD", hide_env_values = true)]
    pub smtp_password: Option<String>,

    /// The SMTP server port [default: 587].
    #[arg(short = 'P', long = "smtpPort")]
    pub smtp_port: Option<u64>,

    /// The 'to' email address.
    #[arg(short = 't', long = "toEmail")]
    pub to_email: Option<String>,

    /// The 'from' email address.
    #[arg(short = 'f', long = "fromEmail")]
    pub from_email: Option<String>,

    /// Do not verify TLS certificates.
    #[arg(short = 'k', long = "tlsSkipVerify")]
    pub tls_skip_verify: bool,

    /// The SMTP authentication method, one of 'none', 'plain', or 'login' [default: plain].
    #[arg(short = 'a', long = "authMethod")]
    pub auth_method: Option<String>,

    /// Include output from check hook(s).
    #[arg(short = 'H', long = "hookout")]
    pub hookout: bool,

    /// Literal template to use for the body.
    #[arg(long = "bodyTemplate")]
    pub body_template: Option<String>,

    /// A template file to use for the body, as a fully qualified path or
    /// URL (file://, http://, https://).
    #[arg(short = 'T', long = "bodyTemplateFile")]
    pub body_template_file: Option<String>,

    /// A template to use for the subject.
    #[arg(short = 'S', long = "subjectTemplate")]
    pub subject_template: Option<String>,

    /// [deprecated] Use an insecure connection (unauthenticated on port 25).
    #[arg(short = 'i', long = "insecure")]
    pub insecure: bool,

    /// [deprecated] Use the "login" auth mechanism.
    #[arg(short = 'l', long = "enableLoginAuth")]
    pub enable_login_auth: bool,
}

impl Cli {
    /// Options given on the command line (or through their environment
    /// variables) as a settings layer. Flags that were not passed stay unset.
    pub fn to_raw_settings(&self) -> RawSettings {
        let flag = |set: bool| set.then_some(true);
        RawSettings {
            smtp_host: self.smtp_host.clone(),
            smtp_username: self.smtp_username.clone(),
            smtp_password: self.smtp_password.clone().map(SecretString::new),
            smtp_port: self.smtp_port,
            to_email: self.to_email.clone(),
            from_email: self.from_email.clone(),
            auth_method: self.auth_method.clone(),
            tls_skip_verify: flag(self.tls_skip_verify),
            hookout: flag(self.hookout),
            body_template: self.body_template.clone(),
            body_template_file: self.body_template_file.clone(),
            subject_template: self.subject_template.clone(),
            insecure: flag(self.insecure),
            enable_login_auth: flag(self.enable_login_auth),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const NO_ENV: [(&str, Option<&str>); 3] = [
        ("SMTP_USERNAME", None),
        ("SMTP_PASSWORD", None),
        ("LOG_FORMAT", None),
    ];

    fn parse(args: &[&str]) -> Cli {
        temp_env::with_vars(NO_ENV, || Cli::try_parse_from(args).unwrap())
    }

    #[test]
    #[serial]
    fn cli_defaults() {
        let cli = parse(&["event-mailer"]);
        assert!(cli.config.is_none());
        assert!(cli.event_file.is_none());
        assert!(!cli.validate);
        assert!(matches!(cli.log_format, LogFormat::Text));

        let raw = cli.to_raw_settings();
        assert!(raw.smtp_host.is_none());
        assert!(raw.smtp_port.is_none());
        assert!(raw.tls_skip_verify.is_none());
        assert!(raw.insecure.is_none());
    }

    #[test]
    #[serial]
    fn cli_short_flags() {
        let cli = parse(&[
            "event-mailer",
            "-s", "smtp.example.com",
            "-u", "alerts",
            "-p", "hunter2",
            "-P", "2525",
            "-t", "oncall@example.com",
            "-f", "ops@example.com",
            "-k",
            "-a", "login",
            "-S", "{{ CheckName }}",
            "-T", "/etc/event-mailer/body.tmpl",
        ]);
        let raw = cli.to_raw_settings();
        assert_eq!(raw.smtp_host.as_deref(), Some("smtp.example.com"));
        assert_eq!(raw.smtp_username.as_deref(), Some("alerts"));
        assert_eq!(raw.smtp_password.unwrap().expose(), "hunter2");
        assert_eq!(raw.smtp_port, Some(2525));
        assert_eq!(raw.to_email.as_deref(), Some("oncall@example.com"));
        assert_eq!(raw.from_email.as_deref(), Some("ops@example.com"));
        assert_eq!(raw.tls_skip_verify, Some(true));
        assert_eq!(raw.auth_method.as_deref(), Some("login"));
        assert_eq!(raw.subject_template.as_deref(), Some("{{ CheckName }}"));
        assert_eq!(
            raw.body_template_file.as_deref(),
            Some("/etc/event-mailer/body.tmpl")
        );
    }

    #[test]
    #[serial]
    fn cli_long_flags() {
        let cli = parse(&[
            "event-mailer",
            "--smtpHost", "smtp.example.com",
            "--hookout",
            "--insecure",
            "--enableLoginAuth",
            "--bodyTemplate", "{{ CheckOutput }}",
            "--config", "/etc/event-mailer.yaml",
            "--event-file", "/tmp/event.json",
            "--validate",
        ]);
        assert_eq!(cli.config, Some(PathBuf::from("/etc/event-mailer.yaml")));
        assert_eq!(cli.event_file, Some(PathBuf::from("/tmp/event.json")));
        assert!(cli.validate);

        let raw = cli.to_raw_settings();
        assert_eq!(raw.hookout, Some(true));
        assert_eq!(raw.insecure, Some(true));
        assert_eq!(raw.enable_login_auth, Some(true));
        assert_eq!(raw.body_template.as_deref(), Some("{{ CheckOutput }}"));
    }

    #[test]
    #[serial]
    fn cli_rejects_non_numeric_port() {
        temp_env::with_vars(NO_ENV, || {
            assert!(Cli::try_parse_from(["event-mailer", "-P", "smtp"]).is_err());
        });
    }

    #[test]
    #[serial]
    fn cli_log_format_json() {
        let cli = parse(&["event-mailer", "--log-format", "json"]);
        assert!(matches!(cli.log_format, LogFormat::Json));
    }

    #[test]
    #[serial]
    fn cli_log_format_invalid_rejected() {
        temp_env::with_vars(NO_ENV, || {
            let result = Cli::try_parse_from(["event-mailer", "--log-format", "invalid"]);
            assert!(result.is_err(), "Invalid log format should be rejected");
        });
    }

    #[test]
    #[serial]
    fn cli_credentials_from_env() {
        temp_env::with_vars(
            [
                ("SMTP_USERNAME", Some("env-user")),
                ("SMTP_PASSWORD", Some("env-pass")),
                ("LOG_FORMAT", Some("json")),
            ],
            || {
                let cli = Cli::try_parse_from(["event-mailer"]).unwrap();
                assert!(matches!(cli.log_format, LogFormat::Json));
                let raw = cli.to_raw_settings();
                assert_eq!(raw.smtp_username.as_deref(), Some("env-user"));
                assert_eq!(raw.smtp_password.unwrap().expose(), "env-pass");
            },
        );
    }

    #[test]
    #[serial]
    fn cli_flag_overrides_env() {
        temp_env::with_vars([("SMTP_USERNAME", Some("env-user"))], || {
            let cli = Cli::try_parse_from(["event-mailer", "-u", "flag-user"]).unwrap();
            assert_eq!(cli.smtp_username.as_deref(), Some("flag-user"));
        });
    }

    #[test]
    #[serial]
    fn cli_password_hidden_from_debug() {
        let cli = parse(&["event-mailer", "-p", "hunter2"]);
        let raw = cli.to_raw_settings();
        assert!(!format!("{:?}", raw).contains("hunter2"));
    }
}
