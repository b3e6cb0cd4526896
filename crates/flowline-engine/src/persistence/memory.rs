//! In-memory implementation of ExecutionStore for testing

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use uuid::Uuid;

use super::store::*;
use crate::workflow::{
    Execution, ExecutionStatus, StepRecord, StepStatus, WorkflowDefinition,
};

/// In-memory implementation of ExecutionStore
///
/// This is primarily for testing. It stores all data in memory and provides
/// the same semantics as the PostgreSQL implementation, including the atomic
/// claim operations.
pub struct InMemoryExecutionStore {
    definitions: RwLock<HashMap<Uuid, WorkflowDefinition>>,
    executions: RwLock<HashMap<Uuid, Execution>>,
    step_records: RwLock<HashMap<Uuid, StepRecord>>,
}

impl InMemoryExecutionStore {
    /// Create a new in-memory store
    pub fn new() -> Self {
        Self {
            definitions: RwLock::new(HashMap::new()),
            executions: RwLock::new(HashMap::new()),
            step_records: RwLock::new(HashMap::new()),
        }
    }

    /// Seed a workflow definition, returning its id
    pub fn insert_definition(&self, input: CreateDefinition) -> Uuid {
        let id = Uuid::now_v7();
        self.definitions.write().insert(
            id,
            WorkflowDefinition {
                id,
                workflow_key: input.workflow_key,
                name: input.name,
                trigger_type: input.trigger_type,
                trigger_value: input.trigger_value,
                is_active: input.is_active,
                steps: input.steps,
                created_at: Utc::now(),
            },
        );
        id
    }

    /// Get the number of executions
    pub fn execution_count(&self) -> usize {
        self.executions.read().len()
    }

    /// Get the number of step records
    pub fn step_record_count(&self) -> usize {
        self.step_records.read().len()
    }

    /// Overwrite an execution's context bag, as an out-of-band writer would
    /// (for testing context enrichment between activations)
    pub fn set_context_data(&self, id: Uuid, context_data: serde_json::Value) {
        if let Some(execution) = self.executions.write().get_mut(&id) {
            execution.context_data = context_data;
        }
    }

    /// Clear all data (for testing)
    pub fn clear(&self) {
        self.definitions.write().clear();
        self.executions.write().clear();
        self.step_records.write().clear();
    }
}

impl Default for InMemoryExecutionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExecutionStore for InMemoryExecutionStore {
    async fn find_matching_definitions(
        &self,
        trigger_type: &str,
        trigger_value: &str,
    ) -> Result<Vec<WorkflowDefinition>, StoreError> {
        let definitions = self.definitions.read();
        let mut matches: Vec<_> = definitions
            .values()
            .filter(|d| {
                d.is_active && d.trigger_type == trigger_type && d.trigger_value == trigger_value
            })
            .cloned()
            .collect();
        matches.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(matches)
    }

    async fn get_definition(&self, id: Uuid) -> Result<Option<WorkflowDefinition>, StoreError> {
        Ok(self.definitions.read().get(&id).cloned())
    }

    async fn list_active_definitions(&self) -> Result<Vec<WorkflowDefinition>, StoreError> {
        let definitions = self.definitions.read();
        let mut active: Vec<_> = definitions.values().filter(|d| d.is_active).cloned().collect();
        active.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(active)
    }

    async fn create_execution(&self, input: CreateExecution) -> Result<Execution, StoreError> {
        // Parity with the foreign key constraint in Postgres
        if !self
            .definitions
            .read()
            .contains_key(&input.workflow_definition_id)
        {
            return Err(StoreError::DefinitionNotFound(input.workflow_definition_id));
        }

        let execution = Execution {
            id: Uuid::now_v7(),
            workflow_definition_id: input.workflow_definition_id,
            status: ExecutionStatus::Running,
            trigger_data: input.trigger_data,
            context_data: input.context_data,
            current_step: 0,
            started_at: Utc::now(),
            completed_at: None,
            error_message: None,
            scheduled_for: None,
        };
        self.executions.write().insert(execution.id, execution.clone());
        Ok(execution)
    }

    async fn get_execution(&self, id: Uuid) -> Result<Option<Execution>, StoreError> {
        Ok(self.executions.read().get(&id).cloned())
    }

    async fn set_current_step(&self, id: Uuid, current_step: i32) -> Result<(), StoreError> {
        let mut executions = self.executions.write();
        let execution = executions
            .get_mut(&id)
            .ok_or(StoreError::ExecutionNotFound(id))?;
        execution.current_step = current_step;
        Ok(())
    }

    async fn mark_execution_scheduled(
        &self,
        id: Uuid,
        current_step: i32,
        scheduled_for: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut executions = self.executions.write();
        let execution = executions
            .get_mut(&id)
            .ok_or(StoreError::ExecutionNotFound(id))?;
        execution.status = ExecutionStatus::Scheduled;
        execution.current_step = current_step;
        execution.scheduled_for = Some(scheduled_for);
        Ok(())
    }

    async fn mark_execution_completed(&self, id: Uuid) -> Result<(), StoreError> {
        let mut executions = self.executions.write();
        let execution = executions
            .get_mut(&id)
            .ok_or(StoreError::ExecutionNotFound(id))?;
        execution.status = ExecutionStatus::Completed;
        execution.completed_at = Some(Utc::now());
        execution.scheduled_for = None;
        Ok(())
    }

    async fn mark_execution_failed(&self, id: Uuid, error: &str) -> Result<(), StoreError> {
        let mut executions = self.executions.write();
        let execution = executions
            .get_mut(&id)
            .ok_or(StoreError::ExecutionNotFound(id))?;
        execution.status = ExecutionStatus::Failed;
        execution.completed_at = Some(Utc::now());
        execution.error_message = Some(error.to_string());
        execution.scheduled_for = None;
        Ok(())
    }

    async fn mark_running_if_scheduled(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut executions = self.executions.write();
        let execution = executions
            .get_mut(&id)
            .ok_or(StoreError::ExecutionNotFound(id))?;
        if execution.status != ExecutionStatus::Scheduled {
            return Ok(false);
        }
        execution.status = ExecutionStatus::Running;
        execution.scheduled_for = None;
        Ok(true)
    }

    async fn claim_due_executions(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Execution>, StoreError> {
        let mut executions = self.executions.write();

        let mut due: Vec<(DateTime<Utc>, Uuid)> = executions
            .values()
            .filter_map(|e| match (e.status, e.scheduled_for) {
                (ExecutionStatus::Scheduled, Some(t)) if t <= now => Some((t, e.id)),
                _ => None,
            })
            .collect();
        due.sort();
        due.truncate(limit);

        let due: Vec<Uuid> = due.into_iter().map(|(_, id)| id).collect();

        let mut claimed = Vec::with_capacity(due.len());
        for id in due {
            if let Some(execution) = executions.get_mut(&id) {
                execution.status = ExecutionStatus::Running;
                execution.scheduled_for = None;
                claimed.push(execution.clone());
            }
        }
        Ok(claimed)
    }

    async fn create_step_record(&self, input: CreateStepRecord) -> Result<StepRecord, StoreError> {
        let record = StepRecord {
            id: Uuid::now_v7(),
            execution_id: input.execution_id,
            step_number: input.step_number,
            action: input.action,
            params: input.params,
            status: StepStatus::Running,
            started_at: Utc::now(),
            completed_at: None,
            error_message: None,
            retry_count: 0,
        };
        self.step_records.write().insert(record.id, record.clone());
        Ok(record)
    }

    async fn complete_step_record(&self, id: Uuid) -> Result<(), StoreError> {
        let mut records = self.step_records.write();
        let record = records.get_mut(&id).ok_or(StoreError::StepRecordNotFound(id))?;
        record.status = StepStatus::Completed;
        record.completed_at = Some(Utc::now());
        Ok(())
    }

    async fn fail_step_record(&self, id: Uuid, error: &str) -> Result<(), StoreError> {
        let mut records = self.step_records.write();
        let record = records.get_mut(&id).ok_or(StoreError::StepRecordNotFound(id))?;
        record.status = StepStatus::Failed;
        record.completed_at = Some(Utc::now());
        record.error_message = Some(error.to_string());
        Ok(())
    }

    async fn list_step_records(&self, execution_id: Uuid) -> Result<Vec<StepRecord>, StoreError> {
        let records = self.step_records.read();
        let mut for_execution: Vec<_> = records
            .values()
            .filter(|r| r.execution_id == execution_id)
            .cloned()
            .collect();
        for_execution.sort_by_key(|r| r.step_number);
        Ok(for_execution)
    }
}
