//! Internal Alert action - emits an operator-facing alert
//!
//! Alerting is not built into the engine core; it is just another action a
//! workflow can choose to run.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use super::{ActionError, ActionHandler};

#[derive(Debug, Default, Deserialize)]
struct InternalAlertParams {
    #[serde(default)]
    message: Option<String>,
}

/// `internal_alert` action
pub struct InternalAlertAction;

#[async_trait]
impl ActionHandler for InternalAlertAction {
    fn name(&self) -> &'static str {
        "internal_alert"
    }

    async fn execute(
        &self,
        params: &serde_json::Map<String, Value>,
        context: &Value,
    ) -> Result<(), ActionError> {
        let params: InternalAlertParams =
            serde_json::from_value(Value::Object(params.clone()))
                .map_err(|e| ActionError::invalid_params("internal_alert", e))?;

        let message = params.message.as_deref().unwrap_or("workflow alert");
        warn!(%message, %context, "internal alert");
        Ok(())
    }
}
