// src/engine/mod.rs

//! Invocation surface of the scheduling engine.
//!
//! This module ties together:
//! - the pure schedule core, which turns a snapshot plus a request into
//!   recomputed tasks and an ordered list of store commands
//! - the per-project runtime, a single-writer queue that loads snapshots,
//!   asks the core for a plan, persists it and notifies listeners
//!
//! The pure core lives in [`core`]; the async/IO shell is implemented in
//! [`runtime`].

use chrono::NaiveDate;
use serde::Serialize;
use tokio::sync::oneshot;

use crate::analysis::{CriticalPathReport, LevelingProposal};
use crate::errors::Result;
use crate::model::{ProjectSnapshot, Task, TaskId};

/// A single write the IO shell should perform, in plan order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum StoreCommand {
    /// Persist new dates for an existing task.
    WriteDates {
        task: TaskId,
        start: NaiveDate,
        end: NaiveDate,
    },
    /// Insert or replace a whole task record.
    PutTask(Task),
    RemoveTasks { ids: Vec<TaskId> },
}

impl StoreCommand {
    /// Ids written (not removed) by this command.
    pub fn written_id(&self) -> Option<&str> {
        match self {
            StoreCommand::WriteDates { task, .. } => Some(task.as_str()),
            StoreCommand::PutTask(task) => Some(task.id.as_str()),
            StoreCommand::RemoveTasks { .. } => None,
        }
    }
}

/// Published by the runtime after a batch of commands has been persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeEvent {
    pub project: String,
    pub changed: Vec<TaskId>,
    pub removed: Vec<TaskId>,
}

/// Leveling output together with the critical path it was computed from.
#[derive(Debug, Clone, Serialize)]
pub struct LevelingView {
    pub critical_path: CriticalPathReport,
    pub proposals: Vec<LevelingProposal>,
}

pub type Reply<T> = oneshot::Sender<Result<T>>;

/// Requests accepted by a project runtime. Each carries its reply channel.
#[derive(Debug)]
pub enum EngineRequest {
    Snapshot {
        reply: Reply<ProjectSnapshot>,
    },
    ReconcileSnapshot {
        reply: Reply<ReconcileView>,
    },
    RefreshSchedule {
        reply: Reply<RefreshPlan>,
    },
    ApplyEdit {
        task: TaskId,
        edit: TaskEdit,
        reply: Reply<EditPlan>,
    },
    CreateTask {
        task: NewTask,
        today: NaiveDate,
        reply: Reply<EditPlan>,
    },
    RemoveTask {
        task: TaskId,
        reply: Reply<EditPlan>,
    },
    CriticalPath {
        reply: Reply<CriticalPathReport>,
    },
    LevelingProposals {
        reply: Reply<LevelingView>,
    },
}

pub mod core;
pub mod runtime;

pub use core::{EditPlan, EngineOptions, NewTask, ReconcileView, RefreshPlan, ScheduleCore, TaskEdit};
pub use runtime::{spawn_project_runtime, EngineHandle, EngineRegistry, ProjectRuntime};
