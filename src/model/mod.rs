// src/model/mod.rs

//! Scheduling data model.
//!
//! - [`task`] defines the `Task` record and its link/constraint fields.
//! - [`project`] defines the snapshot read from the task store.
//! - [`working_set`] is the owned arena every scheduling pass runs over.

pub mod project;
pub mod task;
pub mod working_set;

pub use project::ProjectSnapshot;
pub use task::{Constraint, Dependency, Task, TaskId};
pub use working_set::WorkingSet;
