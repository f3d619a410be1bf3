//! Message templating for email notifications.
//!
//! Subject and body are Jinja-style templates rendered with minijinja
//! against a [`TemplateContext`] projected from the event:
//! ```text
//! event.rs -> template.rs -> notify.rs -> SMTP server
//! ```
//!
//! # Example
//!
//! ```
//! use event_mailer::event::{Event, TemplateContext};
//! use event_mailer::template::render_template;
//!
//! let event = Event::from_json(
//!     r#"{"entity": {"metadata": {"name": "web1"}},
//!         "check": {"metadata": {"name": "cpu"}, "state": "critical"}}"#,
//! ).unwrap();
//! let ctx = TemplateContext::from(&event);
//! let subject = render_template(
//!     "subject",
//!     "Alert - {{EntityName}}/{{CheckName}}: {{CheckState}}",
//!     &ctx,
//! ).unwrap();
//! assert_eq!(subject, "Alert - web1/cpu: critical");
//! ```

use crate::error::TemplateError;
use crate::event::TemplateContext;
use minijinja::{AutoEscape, Environment, UndefinedBehavior};

/// Subject used when none is configured.
pub const DEFAULT_SUBJECT_TEMPLATE: &str =
    "Alert - {{ EntityName }}/{{ CheckName }}: {{ CheckState }}";

/// Body used when no other body template source is configured.
pub const DEFAULT_BODY_TEMPLATE: &str = "{{ CheckOutput }}";

/// Body used when hook output inclusion is requested.
pub const HOOK_OUTPUT_BODY_TEMPLATE: &str = "{{ CheckOutput }}\n{% for hook in Hooks %}Hook Name:  {{ hook.Name }}\nHook Command:  {{ hook.Command }}\n\n{{ hook.Output }}\n\n{% endfor %}";

/// Marker that switches the message to `text/html`.
const HTML_MARKER: &str = "<html>";

/// MIME content type of the rendered body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    TextPlain,
    TextHtml,
}

impl ContentType {
    /// `text/html` if the body carries a literal `<html>` marker.
    pub fn detect(body: &str) -> Self {
        if body.contains(HTML_MARKER) {
            ContentType::TextHtml
        } else {
            ContentType::TextPlain
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::TextPlain => "text/plain",
            ContentType::TextHtml => "text/html",
        }
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rendered message ready for transmission.
///
/// Built once per send and discarded after the DATA phase.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedMessage {
    pub subject: String,
    pub body: String,
    pub content_type: ContentType,
}

impl RenderedMessage {
    /// Render subject and body templates against the event context.
    ///
    /// # Errors
    ///
    /// * `TemplateError::Syntax` - a template cannot be parsed.
    /// * `TemplateError::Execution` - rendering failed, e.g. an unknown field.
    pub fn render(
        subject_template: &str,
        body_template: &str,
        ctx: &TemplateContext,
    ) -> Result<Self, TemplateError> {
        let subject = render_template("subject", subject_template, ctx)?;
        let body = render_template("body", body_template, ctx)?;
        let content_type = ContentType::detect(&body);

        tracing::trace!(
            subject_len = subject.len(),
            body_len = body.len(),
            content_type = %content_type,
            "Message rendered"
        );
        Ok(Self {
            subject,
            body,
            content_type,
        })
    }

    /// Serialize the message with its headers, using CRLF line endings.
    ///
    /// Line breaks in the subject are flattened so that rendered event data
    /// cannot add headers.
    pub fn format(&self, from_header: &str, to: &str) -> String {
        let subject: String = self
            .subject
            .chars()
            .map(|c| if c == '\r' || c == '\n' { ' ' } else { c })
            .collect();

        format!(
            "From: {}\r\nTo: {}\r\nSubject: {}\r\nContent-Type: {}\r\n\r\n{}\r\n",
            from_header, to, subject, self.content_type, self.body
        )
    }
}

/// Compile `source` and render it against `ctx`.
///
/// Undefined fields are an error rather than an empty string, so a typo in a
/// field name surfaces before anything is sent.
pub fn render_template(
    name: &str,
    source: &str,
    ctx: &TemplateContext,
) -> Result<String, TemplateError> {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    env.set_auto_escape_callback(|_| AutoEscape::None);
    env.set_keep_trailing_newline(true);

    env.add_template(name, source)
        .map_err(|e| TemplateError::Syntax {
            name: name.to_string(),
            message: e.to_string(),
        })?;

    let tmpl = env
        .get_template(name)
        .map_err(|e| TemplateError::Execution {
            name: name.to_string(),
            message: e.to_string(),
        })?;

    tmpl.render(ctx).map_err(|e| TemplateError::Execution {
        name: name.to_string(),
        message: e.to_string(),
    })
}
