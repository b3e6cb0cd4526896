//! Generate Document action - produces a derived document from a template

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use super::{ActionError, ActionHandler};

#[derive(Debug, Deserialize)]
struct GenerateDocumentParams {
    template: String,
}

/// `generate_document` action
///
/// Document rendering itself is business glue; the engine's contract is only
/// that the step succeeds or fails with a message.
pub struct GenerateDocumentAction;

#[async_trait]
impl ActionHandler for GenerateDocumentAction {
    fn name(&self) -> &'static str {
        "generate_document"
    }

    async fn execute(
        &self,
        params: &serde_json::Map<String, Value>,
        _context: &Value,
    ) -> Result<(), ActionError> {
        let params: GenerateDocumentParams =
            serde_json::from_value(Value::Object(params.clone()))
                .map_err(|e| ActionError::invalid_params("generate_document", e))?;

        info!(template = %params.template, "generating document");
        Ok(())
    }
}
