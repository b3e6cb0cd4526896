//! Send Email action - notifies an external party via a mail template

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use super::{string_from_params_or_context, ActionError, ActionHandler};

/// Outbound mail collaborator
///
/// The real payload contract is business-specific; the engine only needs
/// "accepts (recipient, template, context), returns success/failure".
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(
        &self,
        recipient: &str,
        template: &str,
        context: &Value,
    ) -> Result<(), ActionError>;
}

/// Default mailer that only logs the send
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(
        &self,
        recipient: &str,
        template: &str,
        _context: &Value,
    ) -> Result<(), ActionError> {
        info!(%recipient, %template, "sending email");
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct SendEmailParams {
    template: String,
    #[serde(default)]
    recipient: Option<String>,
}

/// `send_email` action
///
/// Recipient comes from `params.recipient` or, failing that, from the
/// `customer_email` / `email` context keys.
pub struct SendEmailAction {
    mailer: Arc<dyn Mailer>,
}

impl SendEmailAction {
    pub fn new(mailer: Arc<dyn Mailer>) -> Self {
        Self { mailer }
    }
}

impl Default for SendEmailAction {
    fn default() -> Self {
        Self::new(Arc::new(LogMailer))
    }
}

#[async_trait]
impl ActionHandler for SendEmailAction {
    fn name(&self) -> &'static str {
        "send_email"
    }

    async fn execute(
        &self,
        params: &serde_json::Map<String, Value>,
        context: &Value,
    ) -> Result<(), ActionError> {
        let params: SendEmailParams =
            serde_json::from_value(Value::Object(params.clone()))
                .map_err(|e| ActionError::invalid_params("send_email", e))?;

        let recipient = string_from_params_or_context(
            params.recipient.as_deref(),
            context,
            &["customer_email", "email"],
        )
        .ok_or_else(|| {
            ActionError::new(
                "send_email requires a 'recipient' param or a 'customer_email'/'email' context key",
            )
        })?;

        self.mailer.send(recipient, &params.template, context).await
    }
}
