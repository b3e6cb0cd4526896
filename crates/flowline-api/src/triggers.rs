// Trigger ingestion HTTP route

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;
use uuid::Uuid;

use flowline_engine::{DispatchResult, DispatchStatus, TriggerDispatcher};

/// A business event to match against active workflow definitions
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct TriggerRequest {
    /// Event category, e.g. "purchase" or "signup"
    #[schema(example = "purchase")]
    pub trigger_type: String,
    /// Event discriminator matched exactly, e.g. a product code
    #[schema(example = "PLAN-X")]
    pub trigger_value: String,
    /// Arbitrary event payload made available to every step
    #[serde(default)]
    #[schema(example = json!({ "customer_email": "a@example.com" }))]
    pub context_data: serde_json::Value,
}

/// Outcome of one matched workflow definition
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TriggerResultDto {
    pub workflow_key: String,
    /// Present once an execution row was created
    pub execution_id: Option<Uuid>,
    /// "started" or "failed"; a started execution may still fail later
    /// inside its own steps
    #[schema(example = "started")]
    pub status: String,
    pub error: Option<String>,
}

impl From<DispatchResult> for TriggerResultDto {
    fn from(result: DispatchResult) -> Self {
        let status = match result.status {
            DispatchStatus::Started => "started",
            DispatchStatus::Failed => "failed",
        };
        Self {
            workflow_key: result.workflow_key,
            execution_id: result.execution_id,
            status: status.to_string(),
            error: result.error,
        }
    }
}

/// Response to a trigger submission
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TriggerResponse {
    #[schema(example = "matched 1 workflow(s)")]
    pub message: String,
    pub results: Vec<TriggerResultDto>,
}

/// App state for trigger routes
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: TriggerDispatcher,
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/v1/triggers", post(submit_trigger))
        .with_state(state)
}

/// POST /v1/triggers - Fire a trigger occurrence
#[utoipa::path(
    post,
    path = "/v1/triggers",
    request_body = TriggerRequest,
    responses(
        (status = 200, description = "Trigger processed; zero matches is not an error", body = TriggerResponse),
        (status = 422, description = "Missing or empty trigger_type/trigger_value"),
        (status = 500, description = "Internal server error")
    ),
    tag = "triggers"
)]
pub async fn submit_trigger(
    State(state): State<AppState>,
    Json(req): Json<TriggerRequest>,
) -> Result<Json<TriggerResponse>, StatusCode> {
    if req.trigger_type.trim().is_empty() || req.trigger_value.trim().is_empty() {
        return Err(StatusCode::UNPROCESSABLE_ENTITY);
    }

    let context_data = if req.context_data.is_null() {
        json!({})
    } else {
        req.context_data
    };

    let results = state
        .dispatcher
        .dispatch(&req.trigger_type, &req.trigger_value, context_data)
        .await
        .map_err(|e| {
            tracing::error!("Failed to dispatch trigger: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    let message = format!("matched {} workflow(s)", results.len());
    Ok(Json(TriggerResponse {
        message,
        results: results.into_iter().map(TriggerResultDto::from).collect(),
    }))
}
