//! Trigger dispatcher: matches events to definitions and starts executions
//!
//! Also owns the resumption entry point used by the poller and the external
//! timer surface. Resumption re-reads the execution's context from the store
//! rather than capturing it in a closure: no in-memory state survives across
//! the delay boundary.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

use crate::actions::ActionRegistry;
use crate::persistence::{CreateExecution, ExecutionStore};
use crate::workflow::{DispatchResult, Execution};

use super::{EngineError, StepProcessor};

/// Matches incoming triggers to active workflow definitions and drives the
/// resulting executions
#[derive(Clone)]
pub struct TriggerDispatcher {
    store: Arc<dyn ExecutionStore>,
    processor: StepProcessor,
}

impl TriggerDispatcher {
    pub fn new(store: Arc<dyn ExecutionStore>, registry: Arc<ActionRegistry>) -> Self {
        let processor = StepProcessor::new(store.clone(), registry);
        Self { store, processor }
    }

    /// The store this dispatcher coordinates through
    pub fn store(&self) -> &Arc<dyn ExecutionStore> {
        &self.store
    }

    /// Dispatch one trigger occurrence
    ///
    /// Loads active definitions matching `(trigger_type, trigger_value)`
    /// exactly and starts one execution per match, each driven synchronously
    /// through its first activation. Zero matches is not an error. A failure
    /// for one matched definition never affects its siblings; the only fatal
    /// error is the definition lookup itself.
    #[instrument(skip(self, context_data))]
    pub async fn dispatch(
        &self,
        trigger_type: &str,
        trigger_value: &str,
        context_data: Value,
    ) -> Result<Vec<DispatchResult>, EngineError> {
        let definitions = self
            .store
            .find_matching_definitions(trigger_type, trigger_value)
            .await?;

        if definitions.is_empty() {
            debug!(trigger_type, trigger_value, "no matching workflow definitions");
            return Ok(vec![]);
        }

        info!(
            trigger_type,
            trigger_value,
            matches = definitions.len(),
            "trigger matched workflow definitions"
        );

        let mut results = Vec::with_capacity(definitions.len());
        for definition in definitions {
            let created = self
                .store
                .create_execution(CreateExecution {
                    workflow_definition_id: definition.id,
                    trigger_data: context_data.clone(),
                    context_data: context_data.clone(),
                })
                .await;

            let execution = match created {
                Ok(execution) => execution,
                Err(err) => {
                    error!(
                        workflow_key = %definition.workflow_key,
                        "failed to create execution: {}", err
                    );
                    results.push(DispatchResult::failed(&definition.workflow_key, err.to_string()));
                    continue;
                }
            };

            match self
                .processor
                .run(execution.id, &definition.steps, 0, &execution.context_data)
                .await
            {
                Ok(()) => {
                    results.push(DispatchResult::started(&definition.workflow_key, execution.id));
                }
                Err(err) => {
                    error!(
                        workflow_key = %definition.workflow_key,
                        execution_id = %execution.id,
                        "failed to drive execution: {}", err
                    );
                    results.push(DispatchResult::failed_after_create(
                        &definition.workflow_key,
                        execution.id,
                        err.to_string(),
                    ));
                }
            }
        }

        Ok(results)
    }

    /// Resume a scheduled execution from its stored cursor
    ///
    /// Returns false when there is nothing to do: the execution is already
    /// terminal, already running, or another invocation claimed it first.
    /// Re-running an already-completed execution is a safe no-op.
    #[instrument(skip(self))]
    pub async fn resume(&self, execution_id: Uuid) -> Result<bool, EngineError> {
        let execution = self
            .store
            .get_execution(execution_id)
            .await?
            .ok_or(EngineError::ExecutionNotFound(execution_id))?;

        if execution.status.is_terminal() {
            debug!(%execution_id, status = %execution.status, "resumption of terminal execution is a no-op");
            return Ok(false);
        }

        if !self.store.mark_running_if_scheduled(execution_id).await? {
            debug!(%execution_id, "execution not scheduled, nothing to resume");
            return Ok(false);
        }

        // Re-read after the claim: context_data may have been enriched out of
        // band while the execution was suspended.
        let execution = self
            .store
            .get_execution(execution_id)
            .await?
            .ok_or(EngineError::ExecutionNotFound(execution_id))?;

        self.run_from_cursor(&execution).await?;
        Ok(true)
    }

    /// Drive an execution that has already been claimed (flipped to running)
    ///
    /// Used by the poller, whose claim happens in bulk inside the store.
    pub async fn resume_claimed(&self, execution: &Execution) -> Result<(), EngineError> {
        self.run_from_cursor(execution).await
    }

    async fn run_from_cursor(&self, execution: &Execution) -> Result<(), EngineError> {
        let definition = self
            .store
            .get_definition(execution.workflow_definition_id)
            .await?;

        let Some(definition) = definition else {
            // The configuration surface removed the definition mid-flight;
            // there is no step list left to run against.
            let message = "workflow definition no longer exists";
            self.store.mark_execution_failed(execution.id, message).await?;
            error!(execution_id = %execution.id, message);
            return Ok(());
        };

        info!(
            execution_id = %execution.id,
            workflow_key = %definition.workflow_key,
            resume_from = execution.current_step,
            "resuming execution"
        );

        self.processor
            .run(
                execution.id,
                &definition.steps,
                execution.current_step as usize,
                &execution.context_data,
            )
            .await
    }
}
