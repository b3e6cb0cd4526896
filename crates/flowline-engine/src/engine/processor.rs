//! Step processor: sequential, synchronous-within-one-activation step loop
//!
//! The processor owns the special handling of the `delay` step. A delay is a
//! persisted suspension: the activation terminates after writing the cursor
//! and `scheduled_for`, and a later activation re-enters the loop from the
//! cursor. All other steps dispatch to the action registry; a failure is
//! terminal for the owning execution and short-circuits the remaining steps
//! with no compensation of prior side effects.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::actions::ActionRegistry;
use crate::persistence::{CreateStepRecord, ExecutionStore};
use crate::workflow::StepSpec;

use super::EngineError;

/// Drives the steps of one execution within one activation
#[derive(Clone)]
pub struct StepProcessor {
    store: Arc<dyn ExecutionStore>,
    registry: Arc<ActionRegistry>,
}

impl StepProcessor {
    pub fn new(store: Arc<dyn ExecutionStore>, registry: Arc<ActionRegistry>) -> Self {
        Self { store, registry }
    }

    /// Run steps from `start_index` until completion, failure, or suspension
    ///
    /// Terminal state is persisted, not returned: an `Err` here is an
    /// infrastructure failure, never a workflow-logic one.
    #[instrument(skip(self, steps, context_data), fields(steps = steps.len()))]
    pub async fn run(
        &self,
        execution_id: Uuid,
        steps: &[StepSpec],
        start_index: usize,
        context_data: &Value,
    ) -> Result<(), EngineError> {
        if start_index >= steps.len() {
            self.store.mark_execution_completed(execution_id).await?;
            debug!(%execution_id, "no steps remaining, execution completed");
            return Ok(());
        }

        for (index, step) in steps.iter().enumerate().skip(start_index) {
            let step_number = (index + 1) as i32;
            let record = self
                .store
                .create_step_record(CreateStepRecord {
                    execution_id,
                    step_number,
                    action: step.action.clone(),
                    params: step.params.clone(),
                })
                .await?;

            if step.is_delay() {
                let minutes = match delay_minutes(&step.params) {
                    Ok(minutes) => minutes,
                    Err(message) => {
                        self.store.fail_step_record(record.id, &message).await?;
                        self.store.mark_execution_failed(execution_id, &message).await?;
                        warn!(%execution_id, step_number, %message, "invalid delay step");
                        return Ok(());
                    }
                };

                // The delay itself is the unit of work; it succeeds by
                // definition once the resumption time is recorded.
                let scheduled_for = resumption_time(Utc::now(), minutes);
                self.store.complete_step_record(record.id).await?;

                if index + 1 == steps.len() {
                    // Trailing delay: nothing left to resume into
                    self.store.set_current_step(execution_id, step_number).await?;
                    self.store.mark_execution_completed(execution_id).await?;
                    info!(%execution_id, "execution completed on trailing delay");
                } else {
                    self.store
                        .mark_execution_scheduled(execution_id, step_number, scheduled_for)
                        .await?;
                    info!(
                        %execution_id,
                        resume_from = step_number,
                        %scheduled_for,
                        "execution suspended on delay"
                    );
                }
                return Ok(());
            }

            match self
                .registry
                .execute(&step.action, &step.params, context_data)
                .await
            {
                Ok(()) => {
                    self.store.complete_step_record(record.id).await?;
                    self.store.set_current_step(execution_id, step_number).await?;
                    debug!(%execution_id, step_number, action = %step.action, "step completed");
                }
                Err(err) => {
                    // The handler's message is propagated verbatim, on both
                    // the step record and the execution.
                    self.store.fail_step_record(record.id, &err.message).await?;
                    self.store
                        .mark_execution_failed(execution_id, &err.message)
                        .await?;
                    warn!(
                        %execution_id,
                        step_number,
                        action = %step.action,
                        error = %err.message,
                        "step failed, execution terminated"
                    );
                    return Ok(());
                }
            }
        }

        self.store.mark_execution_completed(execution_id).await?;
        info!(%execution_id, "execution completed");
        Ok(())
    }
}

/// Upper bound on a delay, 100 years in minutes
///
/// Keeps `resumption_time` inside the datetime range; anything larger is a
/// data error like a negative value.
const MAX_DELAY_MINUTES: f64 = 100.0 * 365.0 * 24.0 * 60.0;

/// Validate the `minutes` param of a delay step
///
/// Zero is valid ("as soon as possible", still routed through the async
/// path); a missing, negative, or out-of-range value is a data error.
fn delay_minutes(params: &serde_json::Map<String, Value>) -> Result<f64, String> {
    match params.get("minutes").and_then(Value::as_f64) {
        Some(minutes) if (0.0..=MAX_DELAY_MINUTES).contains(&minutes) => Ok(minutes),
        Some(minutes) if minutes < 0.0 => {
            Err("delay step 'minutes' must be non-negative".to_string())
        }
        Some(_) => Err("delay step 'minutes' exceeds the supported maximum".to_string()),
        None => Err("delay step requires a numeric 'minutes' param".to_string()),
    }
}

fn resumption_time(now: DateTime<Utc>, minutes: f64) -> DateTime<Utc> {
    now + Duration::milliseconds((minutes * 60_000.0) as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::actions::{ActionError, ActionHandler};
    use crate::persistence::{CreateDefinition, CreateExecution, InMemoryExecutionStore};
    use crate::workflow::{Execution, ExecutionStatus, StepStatus};

    fn processor_with_store() -> (Arc<InMemoryExecutionStore>, StepProcessor) {
        let store = Arc::new(InMemoryExecutionStore::new());
        let processor = StepProcessor::new(store.clone(), Arc::new(ActionRegistry::builtin()));
        (store, processor)
    }

    async fn execution_with_steps(
        store: &Arc<InMemoryExecutionStore>,
        steps: Vec<StepSpec>,
    ) -> Execution {
        let definition_id = store.insert_definition(CreateDefinition {
            workflow_key: "test".to_string(),
            name: "Test".to_string(),
            trigger_type: "event".to_string(),
            trigger_value: "value".to_string(),
            is_active: true,
            steps,
        });
        store
            .create_execution(CreateExecution {
                workflow_definition_id: definition_id,
                trigger_data: serde_json::json!({}),
                context_data: serde_json::json!({}),
            })
            .await
            .unwrap()
    }

    fn alert_step() -> StepSpec {
        StepSpec::new("internal_alert", serde_json::json!({ "message": "hi" }))
    }

    #[tokio::test]
    async fn test_empty_start_index_completes_immediately() {
        let (store, processor) = processor_with_store();
        let execution = execution_with_steps(&store, vec![]).await;

        processor
            .run(execution.id, &[], 0, &serde_json::json!({}))
            .await
            .unwrap();

        let execution = store.get_execution(execution.id).await.unwrap().unwrap();
        assert_eq!(execution.status, ExecutionStatus::Completed);
        assert!(execution.completed_at.is_some());
        assert_eq!(store.step_record_count(), 0);
    }

    #[tokio::test]
    async fn test_sequential_ordering_and_completion_invariant() {
        let (store, processor) = processor_with_store();
        let steps = vec![alert_step(), alert_step(), alert_step()];
        let execution = execution_with_steps(&store, steps.clone()).await;

        processor
            .run(execution.id, &steps, 0, &serde_json::json!({}))
            .await
            .unwrap();

        let execution = store.get_execution(execution.id).await.unwrap().unwrap();
        assert_eq!(execution.status, ExecutionStatus::Completed);
        assert_eq!(execution.current_step, 3);

        let records = store.list_step_records(execution.id).await.unwrap();
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.status == StepStatus::Completed));
        // Step i completes before step i+1 starts
        for pair in records.windows(2) {
            assert!(pair[0].completed_at.unwrap() <= pair[1].started_at);
        }
    }

    #[tokio::test]
    async fn test_delay_suspension_leaves_later_steps_unattempted() {
        let (store, processor) = processor_with_store();
        let steps = vec![alert_step(), StepSpec::delay(5), alert_step()];
        let execution = execution_with_steps(&store, steps.clone()).await;

        processor
            .run(execution.id, &steps, 0, &serde_json::json!({}))
            .await
            .unwrap();

        let execution = store.get_execution(execution.id).await.unwrap().unwrap();
        assert_eq!(execution.status, ExecutionStatus::Scheduled);
        assert_eq!(execution.current_step, 2);
        let scheduled_for = execution.scheduled_for.expect("scheduled_for set");
        assert!(scheduled_for > Utc::now() + Duration::minutes(4));

        // The delay's own record is completed; step 3 has no record yet
        let records = store.list_step_records(execution.id).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].action, "delay");
        assert_eq!(records[1].status, StepStatus::Completed);
    }

    #[tokio::test]
    async fn test_trailing_delay_completes_without_continuation() {
        let (store, processor) = processor_with_store();
        let steps = vec![alert_step(), StepSpec::delay(5)];
        let execution = execution_with_steps(&store, steps.clone()).await;

        processor
            .run(execution.id, &steps, 0, &serde_json::json!({}))
            .await
            .unwrap();

        let execution = store.get_execution(execution.id).await.unwrap().unwrap();
        assert_eq!(execution.status, ExecutionStatus::Completed);
        assert_eq!(execution.current_step, 2);
        assert!(execution.scheduled_for.is_none());
    }

    #[tokio::test]
    async fn test_zero_minute_delay_still_suspends() {
        let (store, processor) = processor_with_store();
        let steps = vec![StepSpec::delay(0), alert_step()];
        let execution = execution_with_steps(&store, steps.clone()).await;

        processor
            .run(execution.id, &steps, 0, &serde_json::json!({}))
            .await
            .unwrap();

        // Delay is never synchronous, even at zero minutes
        let execution = store.get_execution(execution.id).await.unwrap().unwrap();
        assert_eq!(execution.status, ExecutionStatus::Scheduled);
        assert!(execution.scheduled_for.unwrap() <= Utc::now());
    }

    #[tokio::test]
    async fn test_invalid_delay_minutes_fails_execution() {
        let (store, processor) = processor_with_store();
        let steps = vec![StepSpec::new("delay", serde_json::json!({ "minutes": "soon" }))];
        let execution = execution_with_steps(&store, steps.clone()).await;

        processor
            .run(execution.id, &steps, 0, &serde_json::json!({}))
            .await
            .unwrap();

        let execution = store.get_execution(execution.id).await.unwrap().unwrap();
        assert_eq!(execution.status, ExecutionStatus::Failed);
        assert!(execution
            .error_message
            .unwrap()
            .contains("requires a numeric 'minutes' param"));
    }

    #[tokio::test]
    async fn test_oversized_delay_minutes_fails_execution() {
        let (store, processor) = processor_with_store();
        // Large enough to overflow the datetime range if it were added blindly
        let steps = vec![
            StepSpec::new("delay", serde_json::json!({ "minutes": 1.0e15 })),
            alert_step(),
        ];
        let execution = execution_with_steps(&store, steps.clone()).await;

        processor
            .run(execution.id, &steps, 0, &serde_json::json!({}))
            .await
            .unwrap();

        let execution = store.get_execution(execution.id).await.unwrap().unwrap();
        assert_eq!(execution.status, ExecutionStatus::Failed);
        assert!(execution.scheduled_for.is_none());
        assert!(execution
            .error_message
            .unwrap()
            .contains("exceeds the supported maximum"));

        let records = store.list_step_records(execution.id).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, StepStatus::Failed);
    }

    struct ExplodingAction;

    #[async_trait]
    impl ActionHandler for ExplodingAction {
        fn name(&self) -> &'static str {
            "exploding"
        }

        async fn execute(
            &self,
            _params: &serde_json::Map<String, Value>,
            _context: &Value,
        ) -> Result<(), ActionError> {
            panic!("template engine exploded");
        }
    }

    #[tokio::test]
    async fn test_panicking_action_terminates_like_a_failure() {
        let store = Arc::new(InMemoryExecutionStore::new());
        let mut registry = ActionRegistry::new();
        registry.register(Arc::new(ExplodingAction));
        let processor = StepProcessor::new(store.clone(), Arc::new(registry));

        let steps = vec![
            StepSpec::new("exploding", serde_json::json!({})),
            StepSpec::new("exploding", serde_json::json!({})),
        ];
        let execution = execution_with_steps(&store, steps.clone()).await;

        // The unwind must not escape the step loop
        processor
            .run(execution.id, &steps, 0, &serde_json::json!({}))
            .await
            .unwrap();

        // Neither row is left running: the panic takes the failure path
        let execution = store.get_execution(execution.id).await.unwrap().unwrap();
        assert_eq!(execution.status, ExecutionStatus::Failed);
        let error = execution.error_message.unwrap();
        assert!(error.contains("panicked"));
        assert!(error.contains("template engine exploded"));

        let records = store.list_step_records(execution.id).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, StepStatus::Failed);
        assert_eq!(records[0].error_message.as_deref(), Some(error.as_str()));
    }

    #[tokio::test]
    async fn test_failure_short_circuit() {
        let (store, processor) = processor_with_store();
        // send_email with no recipient anywhere fails in the handler
        let steps = vec![
            alert_step(),
            StepSpec::new("send_email", serde_json::json!({ "template": "confirm" })),
            alert_step(),
        ];
        let execution = execution_with_steps(&store, steps.clone()).await;

        processor
            .run(execution.id, &steps, 0, &serde_json::json!({}))
            .await
            .unwrap();

        let execution = store.get_execution(execution.id).await.unwrap().unwrap();
        assert_eq!(execution.status, ExecutionStatus::Failed);
        let error = execution.error_message.clone().unwrap();
        assert!(error.contains("recipient"));

        // Step 3 was never attempted; the failed record carries the same message
        let records = store.list_step_records(execution.id).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].status, StepStatus::Completed);
        assert_eq!(records[1].status, StepStatus::Failed);
        assert_eq!(records[1].error_message.as_deref(), Some(error.as_str()));
        assert_eq!(execution.current_step, 1);
    }

    #[tokio::test]
    async fn test_unknown_action_is_handled_failure() {
        let (store, processor) = processor_with_store();
        let steps = vec![StepSpec::new("does_not_exist", serde_json::json!({}))];
        let execution = execution_with_steps(&store, steps.clone()).await;

        processor
            .run(execution.id, &steps, 0, &serde_json::json!({}))
            .await
            .unwrap();

        let execution = store.get_execution(execution.id).await.unwrap().unwrap();
        assert_eq!(execution.status, ExecutionStatus::Failed);
        assert!(execution
            .error_message
            .unwrap()
            .contains("unknown action 'does_not_exist'"));

        let records = store.list_step_records(execution.id).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, StepStatus::Failed);
    }

    #[tokio::test]
    async fn test_resume_from_cursor_runs_remaining_steps_only() {
        let (store, processor) = processor_with_store();
        let steps = vec![alert_step(), StepSpec::delay(0), alert_step(), alert_step()];
        let execution = execution_with_steps(&store, steps.clone()).await;

        processor
            .run(execution.id, &steps, 0, &serde_json::json!({}))
            .await
            .unwrap();
        assert_eq!(
            store
                .get_execution(execution.id)
                .await
                .unwrap()
                .unwrap()
                .current_step,
            2
        );

        // Second activation from the stored cursor
        processor
            .run(execution.id, &steps, 2, &serde_json::json!({}))
            .await
            .unwrap();

        let execution = store.get_execution(execution.id).await.unwrap().unwrap();
        assert_eq!(execution.status, ExecutionStatus::Completed);
        assert_eq!(execution.current_step, 4);
        let records = store.list_step_records(execution.id).await.unwrap();
        assert_eq!(records.len(), 4);
        assert_eq!(
            records.iter().map(|r| r.step_number).collect::<Vec<_>>(),
            vec![1, 2, 3, 4]
        );
    }

    #[test]
    fn test_delay_minutes_parsing() {
        let params = |v: serde_json::Value| match serde_json::json!({ "minutes": v }) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };
        assert_eq!(delay_minutes(&params(serde_json::json!(5))).unwrap(), 5.0);
        assert_eq!(delay_minutes(&params(serde_json::json!(0))).unwrap(), 0.0);
        assert!(delay_minutes(&params(serde_json::json!(-1))).is_err());
        assert!(delay_minutes(&params(serde_json::json!(1.0e15))).is_err());
        assert!(delay_minutes(&serde_json::Map::new()).is_err());
    }
}
