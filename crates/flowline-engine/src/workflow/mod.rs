//! Domain model: workflow definitions, executions, and step records

mod definition;
mod execution;
mod step;

pub use definition::{StepSpec, WorkflowDefinition, DELAY_ACTION};
pub use execution::{DispatchResult, DispatchStatus, Execution, ExecutionStatus};
pub use step::{StepRecord, StepStatus};
