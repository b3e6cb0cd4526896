// Flowline API server
// Decision: the resume poller runs in-process alongside the HTTP surface;
// the claim in the store keeps that safe even with multiple replicas

mod common;
mod executions;
mod triggers;
mod workflows;

use anyhow::{Context, Result};
use axum::{routing::get, Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use flowline_engine::{
    ActionRegistry, ExecutionStore, PollerConfig, PostgresExecutionStore, ResumePoller,
    TriggerDispatcher,
};

use common::{ExecutionDto, ListResponse, StepRecordDto, WorkflowDefinitionDto};
use executions::ResumeResponse;
use triggers::{TriggerRequest, TriggerResponse, TriggerResultDto};

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        triggers::submit_trigger,
        executions::get_execution,
        executions::list_step_records,
        executions::resume_execution,
        workflows::list_workflows,
    ),
    components(
        schemas(
            TriggerRequest,
            TriggerResponse,
            TriggerResultDto,
            ResumeResponse,
            ExecutionDto,
            StepRecordDto,
            WorkflowDefinitionDto,
            ListResponse<StepRecordDto>,
            ListResponse<WorkflowDefinitionDto>,
        )
    ),
    tags(
        (name = "triggers", description = "Trigger ingestion endpoints"),
        (name = "executions", description = "Execution inspection and resumption endpoints"),
        (name = "workflows", description = "Workflow definition endpoints")
    ),
    info(
        title = "Flowline API",
        version = "0.1.0",
        description = "Workflow automation engine: triggers, durable executions, and delayed resumption",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "flowline_api=debug,flowline_engine=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("flowline-api starting...");

    // Initialize database
    let database_url =
        std::env::var("DATABASE_URL").context("DATABASE_URL environment variable required")?;
    let store = PostgresExecutionStore::connect(&database_url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Connected to database");

    let store: Arc<dyn ExecutionStore> = Arc::new(store);
    let registry = Arc::new(ActionRegistry::builtin());
    tracing::info!(
        actions = ?registry.action_names().collect::<Vec<_>>(),
        "Action registry initialized"
    );

    let dispatcher = TriggerDispatcher::new(store.clone(), registry);

    // Start the resume poller with a shutdown handle
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let poller_config = PollerConfig::from_env();
    let poller = ResumePoller::new(dispatcher.clone(), poller_config, shutdown_rx);
    let poller_handle = tokio::spawn(poller.run());

    // Create module-specific states
    let triggers_state = triggers::AppState {
        dispatcher: dispatcher.clone(),
    };
    let executions_state = executions::AppState { dispatcher };
    let workflows_state = workflows::AppState { store };

    // Load API prefix from environment (default: empty)
    // Example: API_PREFIX="/api" results in routes like /api/v1/triggers
    let api_prefix = std::env::var("API_PREFIX").unwrap_or_default();
    if !api_prefix.is_empty() {
        tracing::info!(prefix = %api_prefix, "API prefix configured");
    }

    // Build API routes
    let api_routes = Router::new()
        .merge(triggers::routes(triggers_state))
        .merge(executions::routes(executions_state))
        .merge(workflows::routes(workflows_state));

    let app = Router::new()
        .route("/health", get(health))
        .merge(build_router_with_prefix(api_routes, &api_prefix))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:9000".to_string());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await
        .context("Server error")?;

    // Stop the poller before exiting
    let _ = shutdown_tx.send(true);
    let _ = poller_handle.await;

    Ok(())
}

/// Build router with optional API prefix (extracted for testing)
fn build_router_with_prefix<S: Clone + Send + Sync + 'static>(
    api_routes: Router<S>,
    api_prefix: &str,
) -> Router<S> {
    if api_prefix.is_empty() {
        api_routes
    } else {
        Router::new().nest(api_prefix, api_routes)
    }
}
