//! SASL mechanisms used with the SMTP `AUTH` command.
//!
//! A [`Mechanism`] only produces response bytes; the exchange itself
//! (base64 framing, reply codes, cancellation) is driven by
//! [`SmtpClient::authenticate`](super::SmtpClient::authenticate).

use crate::config::SecretString;
use crate::error::AuthError;

/// What the client knows about the server when authentication starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    /// Server name the client connected to.
    pub name: String,
    /// Whether the connection is protected by TLS.
    pub tls: bool,
}

/// One side of a SASL exchange.
pub trait Mechanism: Send + Sync {
    /// Mechanism name and optional initial response.
    fn start(&self, server: &ServerInfo) -> Result<(&'static str, Vec<u8>), AuthError>;

    /// Answer a server challenge.
    ///
    /// `more` is false once the server has accepted the exchange; an empty
    /// response then ends it.
    fn next(&self, challenge: &[u8], more: bool) -> Result<Vec<u8>, AuthError>;
}

/// RFC 4616 `PLAIN`.
///
/// Credentials are only sent over TLS or to a loopback host, and only to the
/// host the mechanism was built for.
pub struct PlainAuth {
    identity: String,
    username: String,
    password: SecretString,
    host: String,
}

impl PlainAuth {
    pub fn new(identity: &str, username: &str, password: SecretString, host: &str) -> Self {
        Self {
            identity: identity.to_string(),
            username: username.to_string(),
            password,
            host: host.to_string(),
        }
    }
}

impl Mechanism for PlainAuth {
    fn start(&self, server: &ServerInfo) -> Result<(&'static str, Vec<u8>), AuthError> {
        if !server.tls && !is_localhost(&server.name) {
            return Err(AuthError::UnencryptedConnection);
        }
        if server.name != self.host {
            return Err(AuthError::WrongHostName);
        }

        let mut response = Vec::with_capacity(
            self.identity.len() + self.username.len() + self.password.expose().len() + 2,
        );
        response.extend_from_slice(self.identity.as_bytes());
        response.push(0);
        response.extend_from_slice(self.username.as_bytes());
        response.push(0);
        response.extend_from_slice(self.password.expose().as_bytes());
        Ok(("PLAIN", response))
    }

    fn next(&self, _challenge: &[u8], more: bool) -> Result<Vec<u8>, AuthError> {
        if more {
            return Err(AuthError::UnexpectedChallenge);
        }
        Ok(Vec::new())
    }
}

/// The `LOGIN` mechanism: username and password sent in answer to
/// `Username:` and `Password:` prompts.
pub struct LoginAuth {
    username: String,
    password: SecretString,
}

impl LoginAuth {
    pub fn new(username: &str, password: SecretString) -> Self {
        Self {
            username: username.to_string(),
            password,
        }
    }
}

impl Mechanism for LoginAuth {
    fn start(&self, _server: &ServerInfo) -> Result<(&'static str, Vec<u8>), AuthError> {
        Ok(("LOGIN", self.username.as_bytes().to_vec()))
    }

    fn next(&self, challenge: &[u8], more: bool) -> Result<Vec<u8>, AuthError> {
        if !more {
            return Ok(Vec::new());
        }
        match challenge {
            b"Username:" => Ok(self.username.as_bytes().to_vec()),
            b"Password:" => Ok(self.password.expose().as_bytes().to_vec()),
            other => Err(AuthError::UnrecognizedChallenge(
                String::from_utf8_lossy(other).into_owned(),
            )),
        }
    }
}

fn is_localhost(name: &str) -> bool {
    matches!(name, "localhost" | "127.0.0.1" | "::1")
}
