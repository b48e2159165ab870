//! Handlebars rendering of email content.
//!
//! Each [`EmailType`] owns a subject, HTML and plain-text template. HTML is
//! rendered with escaping; subject and text are not. Missing fields render as
//! empty strings.

mod sources;

use handlebars::{Handlebars, no_escape};
use serde_json::{Map, Value};
use sea_orm::Iterable;
use tracing::debug;

use crate::error::NotificationResult;
use crate::models::EmailType;

/// Rendered email content.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedEmail {
    pub subject: String,
    pub html: String,
    pub text: String,
}

/// Per-recipient values injected next to the job's template data.
#[derive(Debug, Clone, Copy)]
pub struct Recipient<'a> {
    pub email: &'a str,
    pub name: Option<&'a str>,
    pub unsubscribe_url: &'a str,
}

pub struct TemplateEngine {
    html: Handlebars<'static>,
    plain: Handlebars<'static>,
}

fn template_name(email_type: EmailType, part: &str) -> String {
    format!("{email_type}.{part}")
}

impl TemplateEngine {
    /// An engine with the built-in templates for every email type.
    pub fn new() -> NotificationResult<Self> {
        let mut html = Handlebars::new();
        html.register_partial("greeting", sources::GREETING)?;
        html.register_partial("footer", sources::FOOTER_HTML)?;

        let mut plain = Handlebars::new();
        plain.register_escape_fn(no_escape);
        plain.register_partial("greeting", sources::GREETING)?;
        plain.register_partial("footer", sources::FOOTER_TEXT)?;

        let mut engine = Self { html, plain };
        for email_type in EmailType::iter() {
            let (subject, html, text) = sources::for_type(email_type);
            engine.register(email_type, subject, html, text)?;
        }
        Ok(engine)
    }

    /// Register (or replace) the templates for one email type.
    pub fn register(
        &mut self,
        email_type: EmailType,
        subject: &str,
        html: &str,
        text: &str,
    ) -> NotificationResult<()> {
        self.plain
            .register_template_string(&template_name(email_type, "subject"), subject)?;
        self.html
            .register_template_string(&template_name(email_type, "html"), html)?;
        self.plain
            .register_template_string(&template_name(email_type, "text"), text)?;
        Ok(())
    }

    pub fn render(
        &self,
        email_type: EmailType,
        template_data: &Value,
        recipient: Recipient<'_>,
    ) -> NotificationResult<RenderedEmail> {
        debug!(%email_type, "Rendering email");
        let context = Self::context(template_data, recipient);

        let subject = self
            .plain
            .render(&template_name(email_type, "subject"), &context)?;
        let html = self.html.render(&template_name(email_type, "html"), &context)?;
        let text = self.plain.render(&template_name(email_type, "text"), &context)?;

        Ok(RenderedEmail {
            subject: subject.trim().to_string(),
            html,
            text,
        })
    }

    fn context(template_data: &Value, recipient: Recipient<'_>) -> Value {
        let mut context = match template_data {
            Value::Object(map) => map.clone(),
            _ => Map::new(),
        };
        context.insert("recipient_email".into(), recipient.email.into());
        context.insert(
            "recipient_name".into(),
            recipient.name.unwrap_or_default().into(),
        );
        context.insert("unsubscribe_url".into(), recipient.unsubscribe_url.into());
        Value::Object(context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn recipient() -> Recipient<'static> {
        Recipient {
            email: "ada@example.com",
            name: Some("Ada"),
            unsubscribe_url: "https://mail.example.com/api/unsubscribe?email=ada%40example.com",
        }
    }

    #[test]
    fn test_every_type_renders_with_empty_data() {
        let engine = TemplateEngine::new().unwrap();
        for email_type in EmailType::iter() {
            let rendered = engine.render(email_type, &json!({}), recipient()).unwrap();
            assert!(!rendered.subject.is_empty(), "{email_type}");
            assert!(rendered.html.contains("unsubscribe"), "{email_type}");
            assert!(
                rendered.text.contains("https://mail.example.com/api/unsubscribe"),
                "{email_type}"
            );
        }
    }

    #[test]
    fn test_password_reset_uses_template_data() {
        let engine = TemplateEngine::new().unwrap();
        let rendered = engine
            .render(
                EmailType::PasswordReset,
                &json!({ "reset_url": "https://app.example.com/reset?t=abc", "expires_in_minutes": 30 }),
                recipient(),
            )
            .unwrap();

        assert_eq!(rendered.subject, "Reset your password");
        assert!(rendered.text.contains("Hi Ada,"));
        assert!(rendered.text.contains("https://app.example.com/reset?t=abc"));
        assert!(rendered.text.contains("30 minutes"));
    }

    #[test]
    fn test_html_is_escaped_text_is_not() {
        let engine = TemplateEngine::new().unwrap();
        let data = json!({ "actor_name": "<b>Eve</b>", "context_title": "Tom & Jerry" });
        let rendered = engine.render(EmailType::Mention, &data, recipient()).unwrap();

        assert!(rendered.html.contains("&lt;b&gt;Eve&lt;/b&gt;"));
        assert!(rendered.text.contains("<b>Eve</b>"));
        assert_eq!(rendered.subject, "<b>Eve</b> mentioned you in Tom & Jerry");
    }

    #[test]
    fn test_weekly_digest_iterates_items() {
        let engine = TemplateEngine::new().unwrap();
        let data = json!({
            "items": [
                { "title": "First post", "url": "https://app.example.com/p/1" },
                { "title": "Second post", "url": "https://app.example.com/p/2" }
            ]
        });
        let rendered = engine.render(EmailType::WeeklyDigest, &data, recipient()).unwrap();
        assert!(rendered.text.contains("- First post: https://app.example.com/p/1"));
        assert!(rendered.text.contains("- Second post: https://app.example.com/p/2"));
    }

    #[test]
    fn test_missing_partial_is_render_error() {
        let mut engine = TemplateEngine::new().unwrap();
        engine
            .register(EmailType::Welcome, "Hi", "{{> missing}}", "Hi")
            .unwrap();
        assert!(engine.render(EmailType::Welcome, &json!({}), recipient()).is_err());
    }

    #[test]
    fn test_invalid_template_is_rejected() {
        let mut engine = TemplateEngine::new().unwrap();
        assert!(engine.register(EmailType::Reply, "{{#if}}", "", "").is_err());
    }
}
