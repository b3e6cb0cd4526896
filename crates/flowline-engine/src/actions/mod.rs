//! Action handler registry
//!
//! Actions are the pluggable units of side-effecting work named by workflow
//! steps. The registry maps action names to handlers populated at startup;
//! unknown names are a data error, not a code error. Handlers never propagate
//! errors across the registry boundary in any form other than [`ActionError`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

mod assign_product;
mod generate_document;
mod internal_alert;
mod send_email;
mod update_record_status;

pub use assign_product::{AssignProductAction, LogProductAssigner, ProductAssigner};
pub use generate_document::GenerateDocumentAction;
pub use internal_alert::InternalAlertAction;
pub use send_email::{LogMailer, Mailer, SendEmailAction};
pub use update_record_status::{
    LogRecordStatusClient, RecordStatusClient, UpdateRecordStatusAction,
};

/// Error reported by an action handler
///
/// The message is preserved verbatim on the failed step record and execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionError {
    /// Error message
    pub message: String,
}

impl ActionError {
    /// Create a new action error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Error for a params bag that failed an action's lazy validation
    pub fn invalid_params(action: &str, err: impl fmt::Display) -> Self {
        Self::new(format!("invalid params for action '{action}': {err}"))
    }
}

impl fmt::Display for ActionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ActionError {}

/// One unit of side-effecting work, identified by an action name
///
/// Handlers are pure functions of `(params, context)` plus whatever external
/// collaborator they touch. They should be idempotent-safe where possible: a
/// failed activation before the step record is marked completed could in
/// principle be re-driven by an operator.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    /// The action name steps use to address this handler
    fn name(&self) -> &'static str;

    /// Perform the work. All failure paths are normalized to `ActionError`.
    async fn execute(
        &self,
        params: &serde_json::Map<String, Value>,
        context: &Value,
    ) -> Result<(), ActionError>;
}

/// Registry of named action handlers
///
/// The closed set of supported actions is whatever was registered at startup.
pub struct ActionRegistry {
    handlers: HashMap<&'static str, Arc<dyn ActionHandler>>,
}

impl ActionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Create a registry with the built-in handlers and their default
    /// (logging) collaborators
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(SendEmailAction::default()));
        registry.register(Arc::new(AssignProductAction::default()));
        registry.register(Arc::new(GenerateDocumentAction));
        registry.register(Arc::new(InternalAlertAction));
        registry.register(Arc::new(UpdateRecordStatusAction::default()));
        registry
    }

    /// Register a handler under its own name
    pub fn register(&mut self, handler: Arc<dyn ActionHandler>) {
        self.handlers.insert(handler.name(), handler);
    }

    /// Check if an action name is registered
    pub fn contains(&self, action: &str) -> bool {
        self.handlers.contains_key(action)
    }

    /// Get all registered action names
    pub fn action_names(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().copied()
    }

    /// Dispatch to the handler registered under `action`
    ///
    /// An unknown action is a handled failure, never a crash. So is a
    /// panicking handler: the handler runs in its own task, and an unwind
    /// there becomes an `ActionError` carrying the panic message.
    pub async fn execute(
        &self,
        action: &str,
        params: &serde_json::Map<String, Value>,
        context: &Value,
    ) -> Result<(), ActionError> {
        let handler = self
            .handlers
            .get(action)
            .ok_or_else(|| ActionError::new(format!("unknown action '{action}'")))?;

        let handler = Arc::clone(handler);
        let params = params.clone();
        let context = context.clone();
        let joined =
            tokio::spawn(async move { handler.execute(&params, &context).await }).await;

        match joined {
            Ok(outcome) => outcome,
            Err(err) if err.is_panic() => Err(ActionError::new(format!(
                "action '{action}' panicked: {}",
                panic_message(err.into_panic())
            ))),
            Err(_) => Err(ActionError::new(format!("action '{action}' was cancelled"))),
        }
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("actions", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Pull a string the handler needs from params first, then from the context
/// bag. Neither source is trusted to carry any particular key.
pub(crate) fn string_from_params_or_context<'a>(
    explicit: Option<&'a str>,
    context: &'a Value,
    context_keys: &[&str],
) -> Option<&'a str> {
    if let Some(value) = explicit {
        return Some(value);
    }
    context_keys
        .iter()
        .find_map(|key| context.get(key).and_then(Value::as_str))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unknown_action_is_handled_failure() {
        let registry = ActionRegistry::builtin();
        let err = registry
            .execute("does_not_exist", &serde_json::Map::new(), &Value::Null)
            .await
            .unwrap_err();
        assert!(err.message.contains("unknown action 'does_not_exist'"));
    }

    #[test]
    fn test_builtin_registry_contents() {
        let registry = ActionRegistry::builtin();
        for action in [
            "send_email",
            "assign_product",
            "generate_document",
            "internal_alert",
            "update_record_status",
        ] {
            assert!(registry.contains(action), "missing builtin: {action}");
        }
        // Delay is handled by the step processor, never the registry
        assert!(!registry.contains(crate::workflow::DELAY_ACTION));
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
    async fn test_panicking_handler_is_handled_failure() {
        let mut registry = ActionRegistry::new();
        registry.register(Arc::new(ExplodingAction));

        let err = registry
            .execute("exploding", &serde_json::Map::new(), &Value::Null)
            .await
            .unwrap_err();
        assert!(err.message.contains("action 'exploding' panicked"));
        assert!(err.message.contains("template engine exploded"));
    }

    #[tokio::test]
    async fn test_internal_alert_accepts_empty_params() {
        let registry = ActionRegistry::builtin();
        registry
            .execute("internal_alert", &serde_json::Map::new(), &Value::Null)
            .await
            .unwrap();
    }

    #[test]
    fn test_string_from_params_or_context() {
        let context = serde_json::json!({ "customer_email": "a@b.com" });
        assert_eq!(
            string_from_params_or_context(Some("x@y.com"), &context, &["customer_email"]),
            Some("x@y.com")
        );
        assert_eq!(
            string_from_params_or_context(None, &context, &["email", "customer_email"]),
            Some("a@b.com")
        );
        assert_eq!(
            string_from_params_or_context(None, &Value::Null, &["email"]),
            None
        );
    }
}
