// src/lib.rs
//! event-mailer - email notifications for monitoring events.

pub mod cli;
pub mod config;
pub mod error;
pub mod event;
pub mod notify;
pub mod smtp;
pub mod template;

// Re-export commonly used types
pub use cli::LogFormat;
pub use config::{DefaultTemplateFetcher, RawSettings, Settings, TemplateFetcher};
pub use event::{Event, TemplateContext};
pub use notify::{EmailNotifier, Notifier};
pub use template::{ContentType, RenderedMessage};
