//! Minimal SMTP client: extension discovery, STARTTLS, SASL authentication
//! and a single mail transaction.

mod auth;
mod client;
mod reply;
mod tls;

pub use auth::{LoginAuth, Mechanism, PlainAuth, ServerInfo};
pub use client::{CONNECT_TIMEOUT, Io, SmtpClient};
pub use reply::{Extensions, Reply};
