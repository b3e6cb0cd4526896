//! Step records: per-step execution history within one execution

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Step record status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Running,
    Completed,
    Failed,
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// One step's execution history within one execution
///
/// Created immediately before the step begins; `step_number` is 1-based,
/// strictly increasing and contiguous per execution. Immutable once terminal
/// except for the timestamp/error fields being set exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    pub id: Uuid,

    pub execution_id: Uuid,

    /// 1-based position within the execution
    pub step_number: i32,

    pub action: String,

    /// Params snapshot taken at execution time
    pub params: serde_json::Map<String, serde_json::Value>,

    pub status: StepStatus,

    pub started_at: DateTime<Utc>,

    pub completed_at: Option<DateTime<Utc>>,

    pub error_message: Option<String>,

    /// Reserved for future automatic retry; the engine never consults it
    pub retry_count: i32,
}
