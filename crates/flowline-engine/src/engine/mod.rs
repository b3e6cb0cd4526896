//! Engine core: trigger dispatch and step processing

mod dispatcher;
mod processor;

pub use dispatcher::TriggerDispatcher;
pub use processor::StepProcessor;

use uuid::Uuid;

use crate::persistence::StoreError;

/// Errors from engine operations
///
/// Infrastructure failures (`Store`) are kept distinct from workflow-logic
/// failures: a failed step never surfaces here, it is persisted on the
/// execution row. An `EngineError` always means the engine could not uphold
/// its persistence or resumption guarantees.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Store error
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Execution not found
    #[error("execution not found: {0}")]
    ExecutionNotFound(Uuid),
}
