//! PostgreSQL implementation of ExecutionStore
//!
//! Production persistence using PostgreSQL with:
//! - Conditional UPDATE ... RETURNING for atomic status transitions
//! - SKIP LOCKED claiming of due scheduled executions
//! - JSONB columns for trigger/context data and step params

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::{debug, error, instrument};
use uuid::Uuid;

use super::store::*;
use crate::workflow::{
    Execution, ExecutionStatus, StepRecord, StepStatus, WorkflowDefinition,
};

/// Embedded sqlx migrations for the engine's three tables
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

const DEFINITION_COLUMNS: &str =
    "id, workflow_key, name, trigger_type, trigger_value, is_active, steps, created_at";
const EXECUTION_COLUMNS: &str = "id, workflow_definition_id, status, trigger_data, context_data, \
     current_step, started_at, completed_at, error_message, scheduled_for";
const STEP_COLUMNS: &str = "id, execution_id, step_number, action, params, status, started_at, \
     completed_at, error_message, retry_count";

/// PostgreSQL implementation of ExecutionStore
///
/// Uses a connection pool for efficient database access; a single pool gives
/// the per-row read-your-writes consistency the engine relies on.
#[derive(Clone)]
pub struct PostgresExecutionStore {
    pool: PgPool,
}

impl PostgresExecutionStore {
    /// Create a new PostgreSQL store with the given connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect to the database and run pending migrations
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        MIGRATOR
            .run(&pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(Self { pool })
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Seed a workflow definition
    ///
    /// Not part of the `ExecutionStore` trait: the engine only consumes
    /// definitions. Exists for the external configuration surface and for
    /// integration tests.
    pub async fn create_definition(
        &self,
        input: CreateDefinition,
    ) -> Result<WorkflowDefinition, StoreError> {
        let steps = serde_json::to_value(&input.steps)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO workflow_definitions (id, workflow_key, name, trigger_type, trigger_value, is_active, steps)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {DEFINITION_COLUMNS}
            "#,
        ))
        .bind(Uuid::now_v7())
        .bind(&input.workflow_key)
        .bind(&input.name)
        .bind(&input.trigger_type)
        .bind(&input.trigger_value)
        .bind(input.is_active)
        .bind(&steps)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to create workflow definition: {}", e);
            StoreError::Database(e.to_string())
        })?;

        definition_from_row(&row)
    }
}

#[async_trait]
impl ExecutionStore for PostgresExecutionStore {
    #[instrument(skip(self))]
    async fn find_matching_definitions(
        &self,
        trigger_type: &str,
        trigger_value: &str,
    ) -> Result<Vec<WorkflowDefinition>, StoreError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {DEFINITION_COLUMNS}
            FROM workflow_definitions
            WHERE is_active AND trigger_type = $1 AND trigger_value = $2
            ORDER BY created_at ASC
            "#,
        ))
        .bind(trigger_type)
        .bind(trigger_value)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to load matching definitions: {}", e);
            StoreError::Database(e.to_string())
        })?;

        rows.iter().map(definition_from_row).collect()
    }

    #[instrument(skip(self))]
    async fn get_definition(&self, id: Uuid) -> Result<Option<WorkflowDefinition>, StoreError> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {DEFINITION_COLUMNS}
            FROM workflow_definitions
            WHERE id = $1
            "#,
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        row.as_ref().map(definition_from_row).transpose()
    }

    #[instrument(skip(self))]
    async fn list_active_definitions(&self) -> Result<Vec<WorkflowDefinition>, StoreError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {DEFINITION_COLUMNS}
            FROM workflow_definitions
            WHERE is_active
            ORDER BY created_at ASC
            "#,
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        rows.iter().map(definition_from_row).collect()
    }

    #[instrument(skip(self, input))]
    async fn create_execution(&self, input: CreateExecution) -> Result<Execution, StoreError> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO workflow_executions (id, workflow_definition_id, status, trigger_data, context_data, current_step)
            VALUES ($1, $2, 'running', $3, $4, 0)
            RETURNING {EXECUTION_COLUMNS}
            "#,
        ))
        .bind(Uuid::now_v7())
        .bind(input.workflow_definition_id)
        .bind(&input.trigger_data)
        .bind(&input.context_data)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to create execution: {}", e);
            StoreError::Database(e.to_string())
        })?;

        let execution = execution_from_row(&row)?;
        debug!(execution_id = %execution.id, "created execution");
        Ok(execution)
    }

    #[instrument(skip(self))]
    async fn get_execution(&self, id: Uuid) -> Result<Option<Execution>, StoreError> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {EXECUTION_COLUMNS}
            FROM workflow_executions
            WHERE id = $1
            "#,
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        row.as_ref().map(execution_from_row).transpose()
    }

    #[instrument(skip(self))]
    async fn set_current_step(&self, id: Uuid, current_step: i32) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE workflow_executions SET current_step = $2 WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(current_step)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::ExecutionNotFound(id));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn mark_execution_scheduled(
        &self,
        id: Uuid,
        current_step: i32,
        scheduled_for: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE workflow_executions
            SET status = 'scheduled', current_step = $2, scheduled_for = $3
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(current_step)
        .bind(scheduled_for)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::ExecutionNotFound(id));
        }
        debug!(execution_id = %id, %scheduled_for, "execution suspended until resumption");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn mark_execution_completed(&self, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE workflow_executions
            SET status = 'completed', completed_at = NOW(), scheduled_for = NULL
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::ExecutionNotFound(id));
        }
        Ok(())
    }

    #[instrument(skip(self, error))]
    async fn mark_execution_failed(&self, id: Uuid, error: &str) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE workflow_executions
            SET status = 'failed', completed_at = NOW(), error_message = $2, scheduled_for = NULL
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(error)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::ExecutionNotFound(id));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn mark_running_if_scheduled(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE workflow_executions
            SET status = 'running', scheduled_for = NULL
            WHERE id = $1 AND status = 'scheduled'
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn claim_due_executions(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Execution>, StoreError> {
        let rows = sqlx::query(&format!(
            r#"
            UPDATE workflow_executions
            SET status = 'running', scheduled_for = NULL
            WHERE id IN (
                SELECT id FROM workflow_executions
                WHERE status = 'scheduled' AND scheduled_for <= $1
                ORDER BY scheduled_for ASC
                LIMIT $2
                FOR UPDATE SKIP LOCKED
            )
            RETURNING {EXECUTION_COLUMNS}
            "#,
        ))
        .bind(now)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to claim due executions: {}", e);
            StoreError::Database(e.to_string())
        })?;

        if !rows.is_empty() {
            debug!(count = rows.len(), "claimed due executions");
        }
        rows.iter().map(execution_from_row).collect()
    }

    #[instrument(skip(self, input))]
    async fn create_step_record(&self, input: CreateStepRecord) -> Result<StepRecord, StoreError> {
        let params = serde_json::Value::Object(input.params);

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO workflow_step_records (id, execution_id, step_number, action, params, status)
            VALUES ($1, $2, $3, $4, $5, 'running')
            RETURNING {STEP_COLUMNS}
            "#,
        ))
        .bind(Uuid::now_v7())
        .bind(input.execution_id)
        .bind(input.step_number)
        .bind(&input.action)
        .bind(&params)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to create step record: {}", e);
            StoreError::Database(e.to_string())
        })?;

        step_record_from_row(&row)
    }

    #[instrument(skip(self))]
    async fn complete_step_record(&self, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE workflow_step_records
            SET status = 'completed', completed_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::StepRecordNotFound(id));
        }
        Ok(())
    }

    #[instrument(skip(self, error))]
    async fn fail_step_record(&self, id: Uuid, error: &str) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE workflow_step_records
            SET status = 'failed', completed_at = NOW(), error_message = $2
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(error)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::StepRecordNotFound(id));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_step_records(&self, execution_id: Uuid) -> Result<Vec<StepRecord>, StoreError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {STEP_COLUMNS}
            FROM workflow_step_records
            WHERE execution_id = $1
            ORDER BY step_number ASC
            "#,
        ))
        .bind(execution_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        rows.iter().map(step_record_from_row).collect()
    }
}

fn definition_from_row(row: &PgRow) -> Result<WorkflowDefinition, StoreError> {
    let steps_json: serde_json::Value = row.get("steps");
    let steps = serde_json::from_value(steps_json)
        .map_err(|e| StoreError::Serialization(e.to_string()))?;

    Ok(WorkflowDefinition {
        id: row.get("id"),
        workflow_key: row.get("workflow_key"),
        name: row.get("name"),
        trigger_type: row.get("trigger_type"),
        trigger_value: row.get("trigger_value"),
        is_active: row.get("is_active"),
        steps,
        created_at: row.get("created_at"),
    })
}

fn execution_from_row(row: &PgRow) -> Result<Execution, StoreError> {
    let status: String = row.get("status");

    Ok(Execution {
        id: row.get("id"),
        workflow_definition_id: row.get("workflow_definition_id"),
        status: parse_execution_status(&status)?,
        trigger_data: row.get("trigger_data"),
        context_data: row.get("context_data"),
        current_step: row.get("current_step"),
        started_at: row.get("started_at"),
        completed_at: row.get("completed_at"),
        error_message: row.get("error_message"),
        scheduled_for: row.get("scheduled_for"),
    })
}

fn step_record_from_row(row: &PgRow) -> Result<StepRecord, StoreError> {
    let status: String = row.get("status");
    let params_json: serde_json::Value = row.get("params");
    let params = match params_json {
        serde_json::Value::Object(map) => map,
        _ => serde_json::Map::new(),
    };

    Ok(StepRecord {
        id: row.get("id"),
        execution_id: row.get("execution_id"),
        step_number: row.get("step_number"),
        action: row.get("action"),
        params,
        status: parse_step_status(&status)?,
        started_at: row.get("started_at"),
        completed_at: row.get("completed_at"),
        error_message: row.get("error_message"),
        retry_count: row.get("retry_count"),
    })
}

fn parse_execution_status(status: &str) -> Result<ExecutionStatus, StoreError> {
    match status {
        "running" => Ok(ExecutionStatus::Running),
        "scheduled" => Ok(ExecutionStatus::Scheduled),
        "completed" => Ok(ExecutionStatus::Completed),
        "failed" => Ok(ExecutionStatus::Failed),
        other => Err(StoreError::Serialization(format!(
            "unknown execution status: {other}"
        ))),
    }
}

fn parse_step_status(status: &str) -> Result<StepStatus, StoreError> {
    match status {
        "running" => Ok(StepStatus::Running),
        "completed" => Ok(StepStatus::Completed),
        "failed" => Ok(StepStatus::Failed),
        other => Err(StoreError::Serialization(format!(
            "unknown step status: {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_execution_status() {
        assert_eq!(
            parse_execution_status("scheduled").unwrap(),
            ExecutionStatus::Scheduled
        );
        assert!(parse_execution_status("bogus").is_err());
    }

    #[test]
    fn test_parse_step_status() {
        assert_eq!(parse_step_status("failed").unwrap(), StepStatus::Failed);
        assert!(parse_step_status("pending").is_err());
    }
}
