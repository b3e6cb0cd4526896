//! ExecutionStore trait definition

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::workflow::{Execution, StepRecord, StepSpec, WorkflowDefinition};

/// Error type for store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Execution not found
    #[error("execution not found: {0}")]
    ExecutionNotFound(Uuid),

    /// Workflow definition not found
    #[error("workflow definition not found: {0}")]
    DefinitionNotFound(Uuid),

    /// Step record not found
    #[error("step record not found: {0}")]
    StepRecordNotFound(Uuid),

    /// Database error
    #[error("database error: {0}")]
    Database(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Input for creating an execution
///
/// New executions always start `running` with the cursor at 0 and
/// `started_at = now`.
#[derive(Debug, Clone)]
pub struct CreateExecution {
    pub workflow_definition_id: Uuid,
    pub trigger_data: serde_json::Value,
    pub context_data: serde_json::Value,
}

/// Input for creating a step record
///
/// New step records always start `running` with `started_at = now` and a
/// zero `retry_count`.
#[derive(Debug, Clone)]
pub struct CreateStepRecord {
    pub execution_id: Uuid,
    pub step_number: i32,
    pub action: String,
    pub params: serde_json::Map<String, serde_json::Value>,
}

/// Store for workflow definitions, executions, and step records
///
/// Implementations must be thread-safe and support atomic per-row status
/// transitions: the conditional operations (`mark_running_if_scheduled`,
/// `claim_due_executions`) are the engine's only defense against a duplicate
/// re-invocation of the same scheduled job.
#[async_trait]
pub trait ExecutionStore: Send + Sync + 'static {
    // =========================================================================
    // Workflow Definitions (read-only to the engine)
    // =========================================================================

    /// Find active definitions matching a trigger, by exact case-sensitive
    /// equality on `(trigger_type, trigger_value)`
    async fn find_matching_definitions(
        &self,
        trigger_type: &str,
        trigger_value: &str,
    ) -> Result<Vec<WorkflowDefinition>, StoreError>;

    /// Get a definition by id, active or not
    ///
    /// Resumption must not care whether the definition was deactivated after
    /// dispatch; matching is only checked at dispatch time.
    async fn get_definition(&self, id: Uuid) -> Result<Option<WorkflowDefinition>, StoreError>;

    /// List all active definitions
    async fn list_active_definitions(&self) -> Result<Vec<WorkflowDefinition>, StoreError>;

    // =========================================================================
    // Executions
    // =========================================================================

    /// Create a new execution (`running`, cursor 0)
    async fn create_execution(&self, input: CreateExecution) -> Result<Execution, StoreError>;

    /// Get an execution by id
    async fn get_execution(&self, id: Uuid) -> Result<Option<Execution>, StoreError>;

    /// Set the resumption cursor
    async fn set_current_step(&self, id: Uuid, current_step: i32) -> Result<(), StoreError>;

    /// Suspend an execution on a delay: `scheduled`, cursor, `scheduled_for`
    async fn mark_execution_scheduled(
        &self,
        id: Uuid,
        current_step: i32,
        scheduled_for: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Mark an execution `completed` with `completed_at = now`
    async fn mark_execution_completed(&self, id: Uuid) -> Result<(), StoreError>;

    /// Mark an execution `failed`, preserving the handler's message verbatim
    async fn mark_execution_failed(&self, id: Uuid, error: &str) -> Result<(), StoreError>;

    /// Atomically flip `scheduled -> running` and clear `scheduled_for`
    ///
    /// Returns false if the execution was not in `scheduled` (already resumed,
    /// terminal, or still running) so the caller can treat resumption as a
    /// no-op.
    async fn mark_running_if_scheduled(&self, id: Uuid) -> Result<bool, StoreError>;

    /// Atomically claim executions whose `scheduled_for` has passed
    ///
    /// Claimed rows are flipped to `running` with `scheduled_for` cleared
    /// before being returned, so two concurrent pollers never resume the same
    /// execution twice.
    async fn claim_due_executions(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Execution>, StoreError>;

    // =========================================================================
    // Step Records
    // =========================================================================

    /// Create a step record (`running`) with a params snapshot
    async fn create_step_record(&self, input: CreateStepRecord) -> Result<StepRecord, StoreError>;

    /// Mark a step record `completed` with `completed_at = now`
    async fn complete_step_record(&self, id: Uuid) -> Result<(), StoreError>;

    /// Mark a step record `failed` with the handler's message verbatim
    async fn fail_step_record(&self, id: Uuid, error: &str) -> Result<(), StoreError>;

    /// List step records for an execution, ordered by step number
    async fn list_step_records(&self, execution_id: Uuid) -> Result<Vec<StepRecord>, StoreError>;
}

/// Input for seeding a workflow definition
///
/// The engine only consumes definitions; this input exists for the external
/// configuration surface and for tests.
#[derive(Debug, Clone)]
pub struct CreateDefinition {
    pub workflow_key: String,
    pub name: String,
    pub trigger_type: String,
    pub trigger_value: String,
    pub is_active: bool,
    pub steps: Vec<StepSpec>,
}
