//! Persistence layer: the `ExecutionStore` trait and its implementations

mod memory;
mod postgres;
mod store;

pub use memory::InMemoryExecutionStore;
pub use postgres::{PostgresExecutionStore, MIGRATOR};
pub use store::{CreateDefinition, CreateExecution, CreateStepRecord, ExecutionStore, StoreError};
