//! Configuration assembly and validation for event-mailer.
//!
//! Settings are collected from a YAML file, the command line and event
//! annotations, then validated once into an immutable [`Settings`] value
//! that also carries the effective body template.

mod env;
mod raw;
mod secret;
mod settings;
mod source;

pub use env::resolve_env_vars;
pub use raw::{ANNOTATION_KEYSPACE, RawSettings};
pub use secret::SecretString;
pub use settings::{AuthMethod, BodyTemplateSource, DEFAULT_SMTP_PORT, Settings};
pub use source::{
    DefaultTemplateFetcher, FETCH_TIMEOUT, MAX_TEMPLATE_SIZE, TemplateFetcher, TemplateLocation,
};
