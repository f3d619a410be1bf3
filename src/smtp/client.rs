//! SMTP client session.
//!
//! Commands are strictly sequential: each one is written, flushed and its
//! reply read before the next is issued. The client never retries; every
//! rejection is returned to the caller as [`SmtpError::Rejected`].

use super::auth::{Mechanism, ServerInfo};
use super::reply::{Extensions, Reply, is_last_line};
use super::tls;
use crate::error::{AuthError, SmtpError};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

/// Timeout for establishing the TCP connection.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Name sent with EHLO/HELO.
const LOCAL_NAME: &str = "localhost";

/// Byte stream an SMTP session can run over (plain TCP, TLS, or an in-memory pipe).
pub trait Io: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> Io for T {}

pub struct SmtpClient {
    stream: Option<BufReader<Box<dyn Io>>>,
    server_name: String,
    extensions: Extensions,
    tls: bool,
}

impl SmtpClient {
    /// Open a TCP connection to `host:port` and read the greeting.
    pub async fn connect(host: &str, port: u16) -> Result<Self, SmtpError> {
        let address = format!("{}:{}", host, port);
        tracing::debug!(address = %address, "Connecting to SMTP server");

        let tcp = tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect((host, port)))
            .await
            .map_err(|_| SmtpError::Timeout(format!("connecting to {}", address)))?
            .map_err(|source| SmtpError::Connect {
                address: address.clone(),
                source,
            })?;

        Self::from_stream(Box::new(tcp), host).await
    }

    /// Start a session over an established stream and read the greeting.
    ///
    /// `server_name` is used for TLS verification and by authentication
    /// mechanisms that check the host.
    pub async fn from_stream(stream: Box<dyn Io>, server_name: &str) -> Result<Self, SmtpError> {
        let mut client = Self {
            stream: Some(BufReader::new(stream)),
            server_name: server_name.to_string(),
            extensions: Extensions::default(),
            tls: false,
        };

        let greeting = client.read_reply().await?;
        if greeting.code != 220 {
            return Err(SmtpError::Rejected {
                command: "connection".to_string(),
                reply: greeting,
            });
        }
        Ok(client)
    }

    /// Extensions from the most recent EHLO.
    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    pub fn is_tls(&self) -> bool {
        self.tls
    }

    /// Send EHLO, falling back to HELO when the server rejects it.
    pub async fn ehlo(&mut self) -> Result<(), SmtpError> {
        let reply = self.command(&format!("EHLO {}", LOCAL_NAME)).await?;
        if reply.code == 250 {
            self.extensions = Extensions::from_ehlo(&reply);
            return Ok(());
        }

        tracing::debug!(code = reply.code, "EHLO rejected, falling back to HELO");
        self.extensions = Extensions::default();
        self.expect(&format!("HELO {}", LOCAL_NAME), "HELO", &[250])
            .await
            .map(|_| ())
    }

    /// Upgrade the connection with STARTTLS and repeat EHLO.
    pub async fn starttls(&mut self, skip_verify: bool) -> Result<(), SmtpError> {
        self.expect("STARTTLS", "STARTTLS", &[220]).await?;

        let reader = self.stream.take().ok_or(SmtpError::Closed)?;
        if !reader.buffer().is_empty() {
            return Err(SmtpError::Tls(
                "server sent data before the TLS handshake".to_string(),
            ));
        }
        let upgraded = tls::handshake(reader.into_inner(), &self.server_name, skip_verify).await?;
        self.stream = Some(BufReader::new(upgraded));
        self.tls = true;
        tracing::debug!("STARTTLS upgrade complete");

        self.ehlo().await
    }

    /// Run a SASL exchange with `mechanism`.
    ///
    /// Credentials are never logged. If the mechanism fails part way
    /// through, `*` is sent to cancel the exchange before the error is
    /// returned.
    pub async fn authenticate(&mut self, mechanism: &dyn Mechanism) -> Result<(), SmtpError> {
        let server = ServerInfo {
            name: self.server_name.clone(),
            tls: self.tls,
        };
        let (name, initial) = mechanism.start(&server)?;
        tracing::debug!(
            mechanism = name,
            advertised = ?self.extensions.auth_mechanisms(),
            "Starting authentication"
        );

        let (line, shown) = if initial.is_empty() {
            (format!("AUTH {}", name), format!("AUTH {}", name))
        } else {
            (
                format!("AUTH {} {}", name, BASE64.encode(&initial)),
                format!("AUTH {} [REDACTED]", name),
            )
        };
        let mut reply = self.command_logged(&line, &shown).await?;

        loop {
            let step = match reply.code {
                334 => match BASE64.decode(reply.text().trim()) {
                    Ok(challenge) => mechanism.next(&challenge, true),
                    Err(e) => Err(AuthError::InvalidChallenge(e.to_string())),
                },
                235 => mechanism.next(reply.text().as_bytes(), false),
                _ => {
                    return Err(SmtpError::Rejected {
                        command: "AUTH".to_string(),
                        reply,
                    });
                }
            };

            let response = match step {
                Ok(response) => response,
                Err(e) => {
                    self.cancel_auth().await;
                    return Err(e.into());
                }
            };

            if reply.code == 235 {
                tracing::debug!(mechanism = name, "Authenticated");
                return Ok(());
            }

            reply = self
                .command_logged(&BASE64.encode(&response), "[REDACTED]")
                .await?;
        }
    }

    /// Declare the envelope sender.
    pub async fn mail_from(&mut self, address: &str) -> Result<(), SmtpError> {
        let mut line = format!("MAIL FROM:<{}>", address);
        if self.extensions.supports("8BITMIME") {
            line.push_str(" BODY=8BITMIME");
        }
        if self.extensions.supports("SMTPUTF8") {
            line.push_str(" SMTPUTF8");
        }
        self.expect(&line, "MAIL FROM", &[250]).await.map(|_| ())
    }

    /// Declare one envelope recipient.
    pub async fn rcpt_to(&mut self, address: &str) -> Result<(), SmtpError> {
        self.expect(&format!("RCPT TO:<{}>", address), "RCPT TO", &[250, 251])
            .await
            .map(|_| ())
    }

    /// Transmit the message and end the data phase.
    pub async fn data(&mut self, message: &str) -> Result<(), SmtpError> {
        self.expect("DATA", "DATA", &[354]).await?;

        let payload = dot_stuff(message);
        tracing::debug!(bytes = payload.len(), "C: <message data>");
        let stream = self.stream.as_mut().ok_or(SmtpError::Closed)?;
        stream.write_all(payload.as_bytes()).await?;
        stream.write_all(b".\r\n").await?;
        stream.flush().await?;

        let reply = self.read_reply().await?;
        if reply.code != 250 {
            return Err(SmtpError::Rejected {
                command: "end of data".to_string(),
                reply,
            });
        }
        Ok(())
    }

    /// End the session and close the connection.
    pub async fn quit(&mut self) -> Result<(), SmtpError> {
        let result = self.expect("QUIT", "QUIT", &[221]).await.map(|_| ());
        self.stream = None;
        result
    }

    async fn cancel_auth(&mut self) {
        if let Err(e) = self.command("*").await {
            tracing::debug!(error = %e, "Failed to cancel authentication");
        }
    }

    async fn expect(
        &mut self,
        line: &str,
        verb: &str,
        codes: &[u16],
    ) -> Result<Reply, SmtpError> {
        let reply = self.command(line).await?;
        if codes.contains(&reply.code) {
            Ok(reply)
        } else {
            Err(SmtpError::Rejected {
                command: verb.to_string(),
                reply,
            })
        }
    }

    async fn command(&mut self, line: &str) -> Result<Reply, SmtpError> {
        self.command_logged(line, line).await
    }

    /// Send `line`, logging `shown` in its place.
    ///
    /// A line carrying CR or LF would smuggle extra commands into the
    /// session, so it is refused before anything is written.
    async fn command_logged(&mut self, line: &str, shown: &str) -> Result<Reply, SmtpError> {
        if line.contains(['\r', '\n']) {
            let verb = shown.split([' ', ':']).next().unwrap_or_default();
            return Err(SmtpError::InvalidLine(verb.to_string()));
        }
        tracing::debug!("C: {}", shown);
        let stream = self.stream.as_mut().ok_or(SmtpError::Closed)?;
        stream.write_all(line.as_bytes()).await?;
        stream.write_all(b"\r\n").await?;
        stream.flush().await?;
        self.read_reply().await
    }

    async fn read_reply(&mut self) -> Result<Reply, SmtpError> {
        let stream = self.stream.as_mut().ok_or(SmtpError::Closed)?;
        let mut lines = Vec::new();

        loop {
            let mut raw = Vec::new();
            if stream.read_until(b'\n', &mut raw).await? == 0 {
                return Err(SmtpError::Closed);
            }
            let line = String::from_utf8_lossy(&raw)
                .trim_end_matches(['\r', '\n'])
                .to_string();
            tracing::debug!("S: {}", line);
            let last = is_last_line(&line);
            lines.push(line);
            if last {
                break;
            }
        }

        Reply::parse(&lines)
    }
}

/// Normalise line endings to CRLF and escape lines starting with `.`.
///
/// The result always ends with CRLF, ready for the `.` terminator.
fn dot_stuff(message: &str) -> String {
    if message.is_empty() {
        return String::new();
    }
    let body = message
        .strip_suffix('\n')
        .map(|m| m.strip_suffix('\r').unwrap_or(m))
        .unwrap_or(message);

    let mut out = String::with_capacity(body.len() + 64);
    for line in body.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.starts_with('.') {
            out.push('.');
        }
        out.push_str(line);
        out.push_str("\r\n");
    }
    out
}
