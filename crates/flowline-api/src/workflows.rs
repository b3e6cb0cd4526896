// Workflow definition listing HTTP route

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use std::sync::Arc;

use flowline_engine::ExecutionStore;

use crate::common::{ListResponse, WorkflowDefinitionDto};

/// App state for workflow routes
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ExecutionStore>,
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/v1/workflows", get(list_workflows))
        .with_state(state)
}

/// GET /v1/workflows - List active workflow definitions
#[utoipa::path(
    get,
    path = "/v1/workflows",
    responses(
        (status = 200, description = "Active workflow definitions", body = ListResponse<WorkflowDefinitionDto>),
        (status = 500, description = "Internal server error")
    ),
    tag = "workflows"
)]
pub async fn list_workflows(
    State(state): State<AppState>,
) -> Result<Json<ListResponse<WorkflowDefinitionDto>>, StatusCode> {
    let definitions = state.store.list_active_definitions().await.map_err(|e| {
        tracing::error!("Failed to list workflow definitions: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Ok(Json(ListResponse::new(
        definitions
            .into_iter()
            .map(WorkflowDefinitionDto::from)
            .collect(),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use flowline_engine::{CreateDefinition, InMemoryExecutionStore, StepSpec};

    #[tokio::test]
    async fn test_list_workflows_active_only() {
        let store = Arc::new(InMemoryExecutionStore::new());
        store.insert_definition(CreateDefinition {
            workflow_key: "wf-live".to_string(),
            name: "Live".to_string(),
            trigger_type: "purchase".to_string(),
            trigger_value: "PLAN-X".to_string(),
            is_active: true,
            steps: vec![StepSpec::delay(5)],
        });
        store.insert_definition(CreateDefinition {
            workflow_key: "wf-paused".to_string(),
            name: "Paused".to_string(),
            trigger_type: "purchase".to_string(),
            trigger_value: "PLAN-X".to_string(),
            is_active: false,
            steps: vec![StepSpec::delay(5)],
        });

        let app = routes(AppState { store });
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/v1/workflows")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        let data = parsed["data"].as_array().unwrap();
        assert_eq!(data.len(), 1);
        assert_eq!(data[0]["workflow_key"], "wf-live");
    }
}
