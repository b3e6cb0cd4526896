//! Assign Product action - grants an entitlement to the triggering party

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use super::{string_from_params_or_context, ActionError, ActionHandler};

/// Entitlement-granting collaborator
#[async_trait]
pub trait ProductAssigner: Send + Sync {
    async fn assign(&self, sku: &str, assignee: &str) -> Result<(), ActionError>;
}

/// Default assigner that only logs the assignment
pub struct LogProductAssigner;

#[async_trait]
impl ProductAssigner for LogProductAssigner {
    async fn assign(&self, sku: &str, assignee: &str) -> Result<(), ActionError> {
        info!(%sku, %assignee, "assigning product");
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct AssignProductParams {
    sku: String,
    #[serde(default)]
    assignee: Option<String>,
}

/// `assign_product` action
pub struct AssignProductAction {
    assigner: Arc<dyn ProductAssigner>,
}

impl AssignProductAction {
    pub fn new(assigner: Arc<dyn ProductAssigner>) -> Self {
        Self { assigner }
    }
}

impl Default for AssignProductAction {
    fn default() -> Self {
        Self::new(Arc::new(LogProductAssigner))
    }
}

#[async_trait]
impl ActionHandler for AssignProductAction {
    fn name(&self) -> &'static str {
        "assign_product"
    }

    async fn execute(
        &self,
        params: &serde_json::Map<String, Value>,
        context: &Value,
    ) -> Result<(), ActionError> {
        let params: AssignProductParams =
            serde_json::from_value(Value::Object(params.clone()))
                .map_err(|e| ActionError::invalid_params("assign_product", e))?;

        let assignee = string_from_params_or_context(
            params.assignee.as_deref(),
            context,
            &["customer_email", "employee_id"],
        )
        .ok_or_else(|| {
            ActionError::new(
                "assign_product requires an 'assignee' param or a 'customer_email'/'employee_id' context key",
            )
        })?;

        self.assigner.assign(&params.sku, assignee).await
    }
}
