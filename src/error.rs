//! Centralized error types for event-mailer using thiserror.
//!
//! Errors are grouped by the stage that produces them: configuration
//! validation, template loading and rendering, SASL authentication and the
//! SMTP session itself. Every message names the stage that failed.

use thiserror::Error;

use crate::smtp::Reply;

/// Errors related to configuration loading and validation.
///
/// All of these are detected before any connection to the SMTP server is
/// opened.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load config file: {0}")]
    LoadError(String),
    #[error("invalid configuration: {0}")]
    ValidationError(String),
    #[error("invalid sender address '{input}': {message}")]
    AddressParse { input: String, message: String },
    #[error("failed to read specified template file {location}: {source}")]
    TemplateLoad {
        location: String,
        #[source]
        source: FetchError,
    },
}

impl ConfigError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        ConfigError::ValidationError(message.into())
    }
}

/// Errors raised while fetching a body template from disk or over HTTP.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Http(#[from] reqwest::Error),
    #[error("template is not valid UTF-8")]
    NotUtf8,
    #[error("template exceeds maximum size of {limit} bytes ({size} bytes)")]
    TooLarge { size: u64, limit: u64 },
}

/// Errors related to template compilation and rendering.
#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("template '{name}' has invalid syntax: {message}")]
    Syntax { name: String, message: String },
    #[error("template '{name}' render failed: {message}")]
    Execution { name: String, message: String },
}

/// Errors produced by a SASL mechanism during `AUTH`.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum AuthError {
    #[error("unknown response ({0}) from server when attempting to use login auth")]
    UnrecognizedChallenge(String),
    #[error("unencrypted connection")]
    UnencryptedConnection,
    #[error("wrong host name")]
    WrongHostName,
    #[error("unexpected server challenge")]
    UnexpectedChallenge,
    #[error("invalid base64 challenge: {0}")]
    InvalidChallenge(String),
}

/// Errors from the SMTP session: any step that is rejected or fails.
#[derive(Error, Debug)]
pub enum SmtpError {
    #[error("failed to connect to {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: std::io::Error,
    },
    #[error("timed out: {0}")]
    Timeout(String),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("connection closed by server")]
    Closed,
    #[error("malformed reply: {0}")]
    MalformedReply(String),
    #[error("{0} contains CR or LF")]
    InvalidLine(String),
    #[error("{command} rejected: {reply}")]
    Rejected { command: String, reply: Reply },
    #[error("TLS error: {0}")]
    Tls(String),
    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),
}

/// Errors returned by a single delivery attempt.
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("template error: {0}")]
    Template(#[from] TemplateError),
    #[error("smtp error: {0}")]
    Protocol(#[from] SmtpError),
}
