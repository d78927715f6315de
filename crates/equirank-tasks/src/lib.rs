//! equirank-tasks — Background execution of long-running rank computations.
//!
//! A fixed pool of workers drains a queue of submitted cohort jobs. Callers
//! poll task snapshots by id while workers report progress into a shared
//! registry.

pub mod executor;
pub mod manager;
pub mod task;

pub use executor::TaskExecutor;
pub use manager::{TaskConfig, TaskError, TaskManager, WaitOutcome};
pub use task::{Task, TaskStatus};
