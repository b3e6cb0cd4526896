//! Executions: one run of a workflow definition per trigger occurrence

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Steps are being processed in the current activation
    Running,

    /// Suspended on a delay step; `scheduled_for` holds the resumption time
    Scheduled,

    /// Every step completed
    Completed,

    /// A step failed; no later steps were attempted
    Failed,
}

impl ExecutionStatus {
    /// Whether the execution has reached a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Scheduled => write!(f, "scheduled"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// One instantiation of a workflow definition against one trigger occurrence
///
/// Mutated only by the step processor and the resumption path; never deleted
/// by the engine (retained for audit).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    pub id: Uuid,

    pub workflow_definition_id: Uuid,

    pub status: ExecutionStatus,

    /// Raw event payload, immutable after creation
    pub trigger_data: serde_json::Value,

    /// Key/value bag passed to every action; read-mostly but re-read from the
    /// store at resumption time so out-of-band enrichment is visible
    pub context_data: serde_json::Value,

    /// 0-based index of the next step to execute. Always equals the number of
    /// steps that have completed so far; doubles as the resumption cursor.
    pub current_step: i32,

    pub started_at: DateTime<Utc>,

    pub completed_at: Option<DateTime<Utc>>,

    pub error_message: Option<String>,

    /// Wall-clock time of the next resumption; set iff `status = scheduled`
    pub scheduled_for: Option<DateTime<Utc>>,
}

/// Outcome of the synchronous portion of processing for one matched definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchStatus {
    /// The execution row was created and the first activation ran
    Started,

    /// The execution could not be created or driven; see `error`
    Failed,
}

/// Per-definition result of a trigger dispatch
///
/// A failure for one matched definition is isolated: the dispatcher still
/// reports the outcomes of its siblings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchResult {
    pub workflow_key: String,

    pub execution_id: Option<Uuid>,

    pub status: DispatchStatus,

    pub error: Option<String>,
}

impl DispatchResult {
    /// Result for a definition whose execution was created and driven
    pub fn started(workflow_key: impl Into<String>, execution_id: Uuid) -> Self {
        Self {
            workflow_key: workflow_key.into(),
            execution_id: Some(execution_id),
            status: DispatchStatus::Started,
            error: None,
        }
    }

    /// Result for a definition whose execution could not be created
    pub fn failed(workflow_key: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            workflow_key: workflow_key.into(),
            execution_id: None,
            status: DispatchStatus::Failed,
            error: Some(error.into()),
        }
    }

    /// Result for an execution that was created but could not be driven
    pub fn failed_after_create(
        workflow_key: impl Into<String>,
        execution_id: Uuid,
        error: impl Into<String>,
    ) -> Self {
        Self {
            workflow_key: workflow_key.into(),
            execution_id: Some(execution_id),
            status: DispatchStatus::Failed,
            error: Some(error.into()),
        }
    }
}
