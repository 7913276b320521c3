use super::HandlerContext;
use crate::core::{FormError, Result, Value};
use crate::forms::BoundForm;
use handlebars::Handlebars;
use std::collections::BTreeMap;

/// Sends one notification mail per submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailHandler {
    pub subject: String,
    /// Comma separated addresses.
    pub recipients: String,
    /// Handlebars template rendered against the cleaned data.
    pub template: String,
}

impl EmailHandler {
    pub fn new(
        subject: impl Into<String>,
        recipients: impl Into<String>,
        template: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            recipients: recipients.into(),
            template: template.into(),
        }
    }

    pub fn recipient_list(&self) -> Vec<String> {
        self.recipients.split(',').map(str::to_string).collect()
    }

    pub fn clean(&self) -> Result<()> {
        if self.recipients.trim().is_empty() {
            return Err(FormError::validation("Enter at least one recipient"));
        }
        handlebars::Template::compile(&self.template)?;
        Ok(())
    }

    /// Renders the message body; undefined variables render empty unless
    /// `strict` is set.
    pub fn render_body(&self, cleaned_data: &BTreeMap<String, Value>, strict: bool) -> Result<String> {
        let mut registry = Handlebars::new();
        registry.register_escape_fn(handlebars::no_escape);
        registry.set_strict_mode(strict);

        let context: serde_json::Map<String, serde_json::Value> = cleaned_data
            .iter()
            .map(|(name, value)| (name.clone(), value.to_json()))
            .collect();

        Ok(registry.render_template(&self.template, &serde_json::Value::Object(context))?)
    }

    pub async fn handle(&self, form: &BoundForm<'_>, ctx: &HandlerContext<'_>) -> Result<()> {
        let body = self.render_body(form.cleaned_data(), ctx.config.strict_templates)?;
        let recipients = self.recipient_list();

        ctx.mailer
            .send_mail(
                &self.subject,
                &body,
                &ctx.config.default_from_email,
                &recipients,
            )
            .await
            .map_err(|err| match err {
                FormError::Dispatch(_) => err,
                other => FormError::Dispatch(other.to_string()),
            })?;

        log::info!(
            "Sent '{}' to {} recipient(s)",
            self.subject,
            recipients.len()
        );
        Ok(())
    }
}
