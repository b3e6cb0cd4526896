//! Update Record Status action - marks an external record's status

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use super::{ActionError, ActionHandler};

/// External record-status collaborator
#[async_trait]
pub trait RecordStatusClient: Send + Sync {
    async fn set_status(&self, record_id: &str, status: &str) -> Result<(), ActionError>;
}

/// Default client that only logs the transition
pub struct LogRecordStatusClient;

#[async_trait]
impl RecordStatusClient for LogRecordStatusClient {
    async fn set_status(&self, record_id: &str, status: &str) -> Result<(), ActionError> {
        info!(%record_id, %status, "updating record status");
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct UpdateRecordStatusParams {
    record_id: String,
    status: String,
}

/// `update_record_status` action
pub struct UpdateRecordStatusAction {
    client: Arc<dyn RecordStatusClient>,
}

impl UpdateRecordStatusAction {
    pub fn new(client: Arc<dyn RecordStatusClient>) -> Self {
        Self { client }
    }
}

impl Default for UpdateRecordStatusAction {
    fn default() -> Self {
        Self::new(Arc::new(LogRecordStatusClient))
    }
}

#[async_trait]
impl ActionHandler for UpdateRecordStatusAction {
    fn name(&self) -> &'static str {
        "update_record_status"
    }

    async fn execute(
        &self,
        params: &serde_json::Map<String, Value>,
        _context: &Value,
    ) -> Result<(), ActionError> {
        let params: UpdateRecordStatusParams =
            serde_json::from_value(Value::Object(params.clone()))
                .map_err(|e| ActionError::invalid_params("update_record_status", e))?;

        self.client.set_status(&params.record_id, &params.status).await
    }
}
