// Common DTOs for the public API
//
// Engine types stay inside flowline-engine; the API exposes its own wire
// shapes with string statuses so the OpenAPI surface is stable even if the
// engine enums grow.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use flowline_engine::{Execution, StepRecord, WorkflowDefinition};

/// Response wrapper for list endpoints.
/// All list endpoints return responses wrapped in a `data` field.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ListResponse<T> {
    /// Array of items returned by the list operation.
    pub data: Vec<T>,
}

impl<T> ListResponse<T> {
    pub fn new(data: Vec<T>) -> Self {
        Self { data }
    }
}

impl<T> From<Vec<T>> for ListResponse<T> {
    fn from(data: Vec<T>) -> Self {
        Self { data }
    }
}

/// A workflow execution as exposed over the API
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ExecutionDto {
    pub id: Uuid,
    pub workflow_definition_id: Uuid,
    /// One of: running, scheduled, completed, failed
    #[schema(example = "scheduled")]
    pub status: String,
    pub trigger_data: serde_json::Value,
    pub context_data: serde_json::Value,
    /// Number of completed steps; also the next step index to run
    pub current_step: i32,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    /// Set only while status is scheduled
    pub scheduled_for: Option<DateTime<Utc>>,
}

impl From<Execution> for ExecutionDto {
    fn from(execution: Execution) -> Self {
        Self {
            id: execution.id,
            workflow_definition_id: execution.workflow_definition_id,
            status: execution.status.to_string(),
            trigger_data: execution.trigger_data,
            context_data: execution.context_data,
            current_step: execution.current_step,
            started_at: execution.started_at,
            completed_at: execution.completed_at,
            error_message: execution.error_message,
            scheduled_for: execution.scheduled_for,
        }
    }
}

/// One step attempt within an execution
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StepRecordDto {
    pub id: Uuid,
    pub execution_id: Uuid,
    /// 1-based position within the workflow
    pub step_number: i32,
    #[schema(example = "send_email")]
    pub action: String,
    pub params: serde_json::Value,
    /// One of: running, completed, failed
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

impl From<StepRecord> for StepRecordDto {
    fn from(record: StepRecord) -> Self {
        Self {
            id: record.id,
            execution_id: record.execution_id,
            step_number: record.step_number,
            action: record.action,
            params: serde_json::Value::Object(record.params),
            status: record.status.to_string(),
            started_at: record.started_at,
            completed_at: record.completed_at,
            error_message: record.error_message,
        }
    }
}

/// An active workflow definition
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WorkflowDefinitionDto {
    pub id: Uuid,
    #[schema(example = "purchase-onboarding")]
    pub workflow_key: String,
    pub name: String,
    #[schema(example = "purchase")]
    pub trigger_type: String,
    #[schema(example = "PLAN-X")]
    pub trigger_value: String,
    pub is_active: bool,
    /// Ordered step specs, each `{ "action": ..., "params": {...} }`
    pub steps: Vec<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl From<WorkflowDefinition> for WorkflowDefinitionDto {
    fn from(definition: WorkflowDefinition) -> Self {
        let steps = definition
            .steps
            .into_iter()
            .map(|step| {
                serde_json::json!({
                    "action": step.action,
                    "params": serde_json::Value::Object(step.params),
                })
            })
            .collect();
        Self {
            id: definition.id,
            workflow_key: definition.workflow_key,
            name: definition.name,
            trigger_type: definition.trigger_type,
            trigger_value: definition.trigger_value,
            is_active: definition.is_active,
            steps,
            created_at: definition.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowline_engine::{ExecutionStatus, StepSpec};

    #[test]
    fn test_execution_dto_status_strings() {
        let execution = Execution {
            id: Uuid::now_v7(),
            workflow_definition_id: Uuid::now_v7(),
            status: ExecutionStatus::Scheduled,
            trigger_data: serde_json::json!({}),
            context_data: serde_json::json!({}),
            current_step: 2,
            started_at: Utc::now(),
            completed_at: None,
            error_message: None,
            scheduled_for: Some(Utc::now()),
        };
        let dto = ExecutionDto::from(execution);
        assert_eq!(dto.status, "scheduled");
        assert!(dto.scheduled_for.is_some());
    }

    #[test]
    fn test_definition_dto_step_shape() {
        let definition = WorkflowDefinition {
            id: Uuid::now_v7(),
            workflow_key: "wf".to_string(),
            name: "Wf".to_string(),
            trigger_type: "purchase".to_string(),
            trigger_value: "PLAN-X".to_string(),
            is_active: true,
            steps: vec![StepSpec::new(
                "send_email",
                serde_json::json!({ "template": "confirm" }),
            )],
            created_at: Utc::now(),
        };
        let dto = WorkflowDefinitionDto::from(definition);
        assert_eq!(dto.steps.len(), 1);
        assert_eq!(dto.steps[0]["action"], "send_email");
        assert_eq!(dto.steps[0]["params"]["template"], "confirm");
    }
}
