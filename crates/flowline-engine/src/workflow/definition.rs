//! Workflow definitions: named, ordered step lists activated by a trigger
//!
//! Definitions are authored by an external configuration surface and are
//! read-only to the engine. The step list an execution runs against is the one
//! loaded at dispatch (or resumption) time, so concurrent edits to a
//! definition cannot change an in-flight activation's step count or order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Action name reserved for the delay step.
///
/// Delay is handled by the step processor itself, never by the action
/// registry, and always routes through the persisted-suspension path (even at
/// zero minutes).
pub const DELAY_ACTION: &str = "delay";

/// One step inside a workflow definition: an action name plus a parameter bag.
///
/// Params are an untrusted JSON object; each action handler validates the
/// fields it needs lazily.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepSpec {
    /// Action handler name (or `delay`)
    pub action: String,

    /// Parameters passed to the handler, snapshot into the step record
    #[serde(default)]
    pub params: serde_json::Map<String, serde_json::Value>,
}

impl StepSpec {
    /// Create a step from an action name and a JSON object of params
    pub fn new(action: impl Into<String>, params: serde_json::Value) -> Self {
        let params = match params {
            serde_json::Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        Self {
            action: action.into(),
            params,
        }
    }

    /// Create a delay step of the given number of minutes
    pub fn delay(minutes: u64) -> Self {
        Self::new(DELAY_ACTION, serde_json::json!({ "minutes": minutes }))
    }

    /// Whether this step is a delay step
    pub fn is_delay(&self) -> bool {
        self.action == DELAY_ACTION
    }
}

/// A named, versionless workflow rule
///
/// Matched against incoming triggers by exact, case-sensitive equality on
/// `(trigger_type, trigger_value)` when `is_active` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    /// Storage id
    pub id: Uuid,

    /// Logical identifier, distinct from the storage id
    pub workflow_key: String,

    /// Human-readable name
    pub name: String,

    /// Trigger event type, e.g. "purchase"
    pub trigger_type: String,

    /// Trigger event value, e.g. a plan or product code
    pub trigger_value: String,

    /// Inactive definitions never match
    pub is_active: bool,

    /// Ordered steps executed for each matching trigger occurrence
    pub steps: Vec<StepSpec>,

    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_spec_delay() {
        let step = StepSpec::delay(5);
        assert!(step.is_delay());
        assert_eq!(step.params.get("minutes"), Some(&serde_json::json!(5)));
    }

    #[test]
    fn test_step_spec_non_object_params() {
        let step = StepSpec::new("send_email", serde_json::json!("not an object"));
        assert!(step.params.is_empty());
    }

    #[test]
    fn test_step_spec_deserialize_missing_params() {
        let step: StepSpec = serde_json::from_value(serde_json::json!({
            "action": "internal_alert"
        }))
        .unwrap();
        assert_eq!(step.action, "internal_alert");
        assert!(step.params.is_empty());
    }
}
