// Execution inspection and resumption HTTP routes

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use flowline_engine::{EngineError, TriggerDispatcher};

use crate::common::{ExecutionDto, ListResponse, StepRecordDto};

/// Response to a resumption request
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ResumeResponse {
    /// False when the execution was already terminal or already claimed;
    /// repeating a resumption is always safe
    pub resumed: bool,
}

/// App state for execution routes
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: TriggerDispatcher,
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/v1/executions/:id", get(get_execution))
        .route("/v1/executions/:id/steps", get(list_step_records))
        .route("/v1/executions/:id/resume", post(resume_execution))
        .with_state(state)
}

/// GET /v1/executions/{id} - Get an execution
#[utoipa::path(
    get,
    path = "/v1/executions/{id}",
    params(
        ("id" = Uuid, Path, description = "Execution ID")
    ),
    responses(
        (status = 200, description = "Execution found", body = ExecutionDto),
        (status = 404, description = "Execution not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "executions"
)]
pub async fn get_execution(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ExecutionDto>, StatusCode> {
    let execution = state
        .dispatcher
        .store()
        .get_execution(id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to get execution: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(ExecutionDto::from(execution)))
}

/// GET /v1/executions/{id}/steps - List step records for an execution
#[utoipa::path(
    get,
    path = "/v1/executions/{id}/steps",
    params(
        ("id" = Uuid, Path, description = "Execution ID")
    ),
    responses(
        (status = 200, description = "Step records ordered by step number", body = ListResponse<StepRecordDto>),
        (status = 404, description = "Execution not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "executions"
)]
pub async fn list_step_records(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ListResponse<StepRecordDto>>, StatusCode> {
    let store = state.dispatcher.store();
    store
        .get_execution(id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to get execution: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::NOT_FOUND)?;

    let records = store.list_step_records(id).await.map_err(|e| {
        tracing::error!("Failed to list step records: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Ok(Json(ListResponse::new(
        records.into_iter().map(StepRecordDto::from).collect(),
    )))
}

/// POST /v1/executions/{id}/resume - Resume a scheduled execution
///
/// The endpoint behind external timer callbacks. Duplicate and late
/// invocations return `resumed: false` instead of an error.
#[utoipa::path(
    post,
    path = "/v1/executions/{id}/resume",
    params(
        ("id" = Uuid, Path, description = "Execution ID")
    ),
    responses(
        (status = 200, description = "Resumption attempted", body = ResumeResponse),
        (status = 404, description = "Execution not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "executions"
)]
pub async fn resume_execution(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ResumeResponse>, StatusCode> {
    let resumed = state.dispatcher.resume(id).await.map_err(|e| match e {
        EngineError::ExecutionNotFound(_) => StatusCode::NOT_FOUND,
        other => {
            tracing::error!("Failed to resume execution: {}", other);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    })?;

    Ok(Json(ResumeResponse { resumed }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use std::sync::Arc;
    use tower::ServiceExt;

    use flowline_engine::{
        ActionRegistry, CreateDefinition, InMemoryExecutionStore, StepSpec,
    };

    async fn suspended_execution() -> (Router, Uuid) {
        let store = Arc::new(InMemoryExecutionStore::new());
        let dispatcher =
            TriggerDispatcher::new(store.clone(), Arc::new(ActionRegistry::builtin()));
        store.insert_definition(CreateDefinition {
            workflow_key: "wf-delayed".to_string(),
            name: "Delayed".to_string(),
            trigger_type: "purchase".to_string(),
            trigger_value: "PLAN-X".to_string(),
            is_active: true,
            steps: vec![
                StepSpec::new("internal_alert", serde_json::json!({})),
                StepSpec::delay(5),
                StepSpec::new("internal_alert", serde_json::json!({})),
            ],
        });
        let results = dispatcher
            .dispatch("purchase", "PLAN-X", serde_json::json!({}))
            .await
            .unwrap();
        let execution_id = results[0].execution_id.unwrap();
        let router = routes(AppState { dispatcher });
        (router, execution_id)
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_get_execution() {
        let (app, execution_id) = suspended_execution().await;

        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/v1/executions/{execution_id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let parsed = body_json(response).await;
        assert_eq!(parsed["status"], "scheduled");
        assert_eq!(parsed["current_step"], 2);
        assert!(parsed["scheduled_for"].is_string());
    }

    #[tokio::test]
    async fn test_get_execution_not_found() {
        let (app, _execution_id) = suspended_execution().await;

        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/v1/executions/{}", Uuid::now_v7()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_list_step_records() {
        let (app, execution_id) = suspended_execution().await;

        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/v1/executions/{execution_id}/steps"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let parsed = body_json(response).await;
        let records = parsed["data"].as_array().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["step_number"], 1);
        assert_eq!(records[1]["action"], "delay");
        assert_eq!(records[1]["status"], "completed");
    }

    #[tokio::test]
    async fn test_resume_then_duplicate_resume() {
        let (app, execution_id) = suspended_execution().await;
        let resume = || {
            Request::builder()
                .method("POST")
                .uri(format!("/v1/executions/{execution_id}/resume"))
                .body(Body::empty())
                .unwrap()
        };

        let response = app.clone().oneshot(resume()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["resumed"], true);

        // Second fire of the same timer is a no-op, not an error
        let response = app.oneshot(resume()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["resumed"], false);
    }

    #[tokio::test]
    async fn test_resume_unknown_execution() {
        let (app, _execution_id) = suspended_execution().await;

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/v1/executions/{}/resume", Uuid::now_v7()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
