//! Email delivery of a single event.
//!
//! [`EmailNotifier::send`] performs one complete SMTP session:
//! render, connect, EHLO, optional STARTTLS, optional AUTH, envelope, DATA,
//! QUIT. Any failing step aborts the send; nothing is retried and the
//! connection is closed on every exit path.

use crate::config::{AuthMethod, Settings};
use crate::error::NotifyError;
use crate::event::{Event, TemplateContext};
use crate::smtp::{LoginAuth, Mechanism, PlainAuth, SmtpClient};
use crate::template::RenderedMessage;
use async_trait::async_trait;
use tracing::Instrument;

/// A channel that can deliver an event notification.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a notification for `event`.
    async fn send(&self, event: &Event) -> Result<(), NotifyError>;
}

/// Sends one email per event using validated [`Settings`].
pub struct EmailNotifier {
    settings: Settings,
}

impl EmailNotifier {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Render the message for `event` with headers, ready for DATA.
    pub fn compose(&self, event: &Event) -> Result<String, NotifyError> {
        let ctx = TemplateContext::from(event);
        let message = RenderedMessage::render(
            self.settings.subject_template(),
            self.settings.body_template(),
            &ctx,
        )?;
        Ok(message.format(self.settings.from_header(), self.settings.to_email()))
    }

    fn build_mechanism(&self) -> Option<Box<dyn Mechanism>> {
        let settings = &self.settings;
        match settings.auth_method() {
            AuthMethod::None => None,
            AuthMethod::Plain => Some(Box::new(PlainAuth::new(
                "",
                settings.smtp_username(),
                settings.smtp_password().clone(),
                settings.smtp_host(),
            ))),
            AuthMethod::Login => Some(Box::new(LoginAuth::new(
                settings.smtp_username(),
                settings.smtp_password().clone(),
            ))),
        }
    }

    async fn deliver(&self, message: &str) -> Result<(), NotifyError> {
        let settings = &self.settings;
        let mut client = SmtpClient::connect(settings.smtp_host(), settings.smtp_port()).await?;
        client.ehlo().await?;

        if client.extensions().supports("STARTTLS") {
            client.starttls(settings.tls_skip_verify()).await?;
        } else {
            tracing::warn!("Server does not offer STARTTLS, continuing unencrypted");
        }

        match self.build_mechanism() {
            Some(mechanism) if client.extensions().supports("AUTH") => {
                client.authenticate(mechanism.as_ref()).await?;
            }
            Some(_) => {
                tracing::warn!(
                    auth_method = %settings.auth_method(),
                    "Server does not advertise AUTH, sending without authentication"
                );
            }
            None => {}
        }

        client.mail_from(settings.from_email()).await?;
        client.rcpt_to(settings.to_email()).await?;
        client.data(message).await?;
        client.quit().await?;
        Ok(())
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn send(&self, event: &Event) -> Result<(), NotifyError> {
        let span = tracing::info_span!(
            "send_email",
            smtp = %self.settings.smtp_address(),
            to = %self.settings.to_email(),
            entity = %event.entity.metadata.name,
            check = %event.check.metadata.name,
        );

        async {
            let message = self.compose(event)?;
            self.deliver(&message).await
        }
        .instrument(span)
        .await
    }
}
