//! # Workflow Automation Engine
//!
//! A PostgreSQL-backed engine that matches business events ("triggers") to
//! declarative workflow definitions, executes their ordered steps, and durably
//! resumes execution after time-based delays.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     TriggerDispatcher                        │
//! │  (matches events to active definitions, starts executions)  │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       StepProcessor                          │
//! │  (runs steps sequentially, suspends on delay steps)         │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      ExecutionStore                          │
//! │  (PostgreSQL: workflow_definitions, executions, steps)      │
//! └─────────────────────────────────────────────────────────────┘
//!                              ▲
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       ResumePoller                           │
//! │  (claims due scheduled executions, re-enters the processor) │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! A delay step is a persisted suspension, never a sleeping task: the current
//! activation terminates after writing `status = scheduled` and the cursor, and
//! a later activation (the poller or an external timer calling the resumption
//! endpoint) picks the execution up from the stored cursor.
//!
//! ## Example
//!
//! ```ignore
//! use flowline_engine::prelude::*;
//!
//! let store = Arc::new(InMemoryExecutionStore::new());
//! let registry = Arc::new(ActionRegistry::builtin());
//! let dispatcher = TriggerDispatcher::new(store, registry);
//!
//! let results = dispatcher
//!     .dispatch("purchase", "PLAN-X", json!({ "customer_email": "a@b.com" }))
//!     .await?;
//! ```

pub mod actions;
pub mod engine;
pub mod persistence;
pub mod worker;
pub mod workflow;

/// Prelude for common imports
pub mod prelude {
    pub use crate::actions::{ActionError, ActionHandler, ActionRegistry};
    pub use crate::engine::{EngineError, StepProcessor, TriggerDispatcher};
    pub use crate::persistence::{
        CreateExecution, CreateStepRecord, ExecutionStore, InMemoryExecutionStore,
        PostgresExecutionStore, StoreError,
    };
    pub use crate::worker::{PollerConfig, ResumePoller};
    pub use crate::workflow::{
        DispatchResult, DispatchStatus, Execution, ExecutionStatus, StepRecord, StepSpec,
        StepStatus, WorkflowDefinition, DELAY_ACTION,
    };
}

// Re-export key types at crate root
pub use actions::{ActionError, ActionHandler, ActionRegistry};
pub use engine::{EngineError, StepProcessor, TriggerDispatcher};
pub use persistence::{
    CreateDefinition, CreateExecution, CreateStepRecord, ExecutionStore, InMemoryExecutionStore,
    PostgresExecutionStore, StoreError,
};
pub use worker::{PollerConfig, ResumePoller};
pub use workflow::{
    DispatchResult, DispatchStatus, Execution, ExecutionStatus, StepRecord, StepSpec, StepStatus,
    WorkflowDefinition, DELAY_ACTION,
};
