//! Built-in template sources.

use crate::models::EmailType;

pub(super) const FOOTER_HTML: &str = r#"<hr>
<p style="font-size:12px;color:#6b7280">
  You are receiving this email because you have an account with Zerg.
  <a href="{{unsubscribe_url}}">Click here to unsubscribe</a>.
</p>"#;

pub(super) const FOOTER_TEXT: &str = "
--
You are receiving this email because you have an account with Zerg.
To unsubscribe, visit: {{unsubscribe_url}}
";

pub(super) const GREETING: &str = "{{#if recipient_name}}Hi {{recipient_name}},{{else}}Hi,{{/if}}";

/// `(subject, html, text)` for one email type.
pub(super) fn for_type(email_type: EmailType) -> (&'static str, &'static str, &'static str) {
    match email_type {
        EmailType::Welcome => (WELCOME_SUBJECT, WELCOME_HTML, WELCOME_TEXT),
        EmailType::PasswordReset => (PASSWORD_RESET_SUBJECT, PASSWORD_RESET_HTML, PASSWORD_RESET_TEXT),
        EmailType::PaymentFailed => (PAYMENT_FAILED_SUBJECT, PAYMENT_FAILED_HTML, PAYMENT_FAILED_TEXT),
        EmailType::PaymentSucceeded => (
            PAYMENT_SUCCEEDED_SUBJECT,
            PAYMENT_SUCCEEDED_HTML,
            PAYMENT_SUCCEEDED_TEXT,
        ),
        EmailType::Mention => (MENTION_SUBJECT, MENTION_HTML, MENTION_TEXT),
        EmailType::Reply => (REPLY_SUBJECT, REPLY_HTML, REPLY_TEXT),
        EmailType::WeeklyDigest => (WEEKLY_DIGEST_SUBJECT, WEEKLY_DIGEST_HTML, WEEKLY_DIGEST_TEXT),
    }
}

const WELCOME_SUBJECT: &str =
    "Welcome to Zerg{{#if recipient_name}}, {{recipient_name}}{{/if}}!";

const WELCOME_HTML: &str = r#"<h1>Welcome to Zerg{{#if recipient_name}}, {{recipient_name}}{{/if}}!</h1>
<p>Your account is ready.</p>
{{#if action_url}}<p><a href="{{action_url}}">Get started</a></p>{{/if}}
{{> footer}}"#;

const WELCOME_TEXT: &str = "{{> greeting}}

Your Zerg account is ready.
{{#if action_url}}
Get started: {{action_url}}
{{/if}}{{> footer}}";

const PASSWORD_RESET_SUBJECT: &str = "Reset your password";

const PASSWORD_RESET_HTML: &str = r#"<p>{{> greeting}}</p>
<p>We received a request to reset your password.</p>
<p><a href="{{reset_url}}">Choose a new password</a></p>
{{#if expires_in_minutes}}<p>This link expires in {{expires_in_minutes}} minutes.</p>{{/if}}
<p>If you did not ask for this, you can ignore this email.</p>
{{> footer}}"#;

const PASSWORD_RESET_TEXT: &str = "{{> greeting}}

We received a request to reset your password.

Choose a new password: {{reset_url}}
{{#if expires_in_minutes}}This link expires in {{expires_in_minutes}} minutes.
{{/if}}
If you did not ask for this, you can ignore this email.
{{> footer}}";

const PAYMENT_FAILED_SUBJECT: &str = "Your payment could not be processed";

const PAYMENT_FAILED_HTML: &str = r#"<p>{{> greeting}}</p>
<p>We could not charge {{amount}} {{currency}} for your subscription.</p>
{{#if update_payment_url}}<p><a href="{{update_payment_url}}">Update your payment method</a></p>{{/if}}
{{> footer}}"#;

const PAYMENT_FAILED_TEXT: &str = "{{> greeting}}

We could not charge {{amount}} {{currency}} for your subscription.
{{#if update_payment_url}}
Update your payment method: {{update_payment_url}}
{{/if}}{{> footer}}";

const PAYMENT_SUCCEEDED_SUBJECT: &str = "Payment received";

const PAYMENT_SUCCEEDED_HTML: &str = r#"<p>{{> greeting}}</p>
<p>Thanks! We received your payment of {{amount}} {{currency}}.</p>
{{#if receipt_url}}<p><a href="{{receipt_url}}">View receipt</a></p>{{/if}}
{{> footer}}"#;

const PAYMENT_SUCCEEDED_TEXT: &str = "{{> greeting}}

Thanks! We received your payment of {{amount}} {{currency}}.
{{#if receipt_url}}
Receipt: {{receipt_url}}
{{/if}}{{> footer}}";

const MENTION_SUBJECT: &str = "{{actor_name}} mentioned you in {{context_title}}";

const MENTION_HTML: &str = r#"<p><strong>{{actor_name}}</strong> mentioned you in <em>{{context_title}}</em>:</p>
{{#if excerpt}}<blockquote>{{excerpt}}</blockquote>{{/if}}
{{#if url}}<p><a href="{{url}}">View the conversation</a></p>{{/if}}
{{> footer}}"#;

const MENTION_TEXT: &str = "{{actor_name}} mentioned you in {{context_title}}:
{{#if excerpt}}
> {{excerpt}}
{{/if}}{{#if url}}
View the conversation: {{url}}
{{/if}}{{> footer}}";

const REPLY_SUBJECT: &str = "{{actor_name}} replied to {{context_title}}";

const REPLY_HTML: &str = r#"<p><strong>{{actor_name}}</strong> replied to <em>{{context_title}}</em>:</p>
{{#if excerpt}}<blockquote>{{excerpt}}</blockquote>{{/if}}
{{#if url}}<p><a href="{{url}}">View the reply</a></p>{{/if}}
{{> footer}}"#;

const REPLY_TEXT: &str = "{{actor_name}} replied to {{context_title}}:
{{#if excerpt}}
> {{excerpt}}
{{/if}}{{#if url}}
View the reply: {{url}}
{{/if}}{{> footer}}";

const WEEKLY_DIGEST_SUBJECT: &str = "Your weekly digest";

const WEEKLY_DIGEST_HTML: &str = r#"<h1>Your week on Zerg</h1>
{{#if items}}
<ul>
{{#each items}}  <li><a href="{{this.url}}">{{this.title}}</a></li>
{{/each}}</ul>
{{else}}
<p>Nothing new this week.</p>
{{/if}}
{{> footer}}"#;

const WEEKLY_DIGEST_TEXT: &str = "Your week on Zerg
{{#if items}}
{{#each items}}- {{this.title}}: {{this.url}}
{{/each}}{{else}}
Nothing new this week.
{{/if}}{{> footer}}";
