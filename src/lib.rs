// src/lib.rs

pub mod analysis;
pub mod calendar;
pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod logging;
pub mod model;
pub mod schedule;
pub mod store;
pub mod types;

use std::sync::Arc;

use anyhow::{bail, Result};
use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info};

use crate::cli::{CliArgs, Command};
use crate::config::load_or_default;
use crate::engine::{EngineHandle, EngineRegistry, ScheduleCore};
use crate::model::ProjectSnapshot;
use crate::store::{JsonFileStore, TaskStore};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - the JSON file store
/// - the per-project engine runtime
///
/// and prints the result of the requested command as JSON on stdout.
pub async fn run(args: CliArgs) -> Result<()> {
    let cfg = load_or_default(args.config.as_deref())?;
    let store_dir = args
        .store
        .clone()
        .unwrap_or_else(|| cfg.store_dir().to_path_buf());
    let store = JsonFileStore::new(&store_dir);
    debug!(store = ?store_dir, project = %args.project, "opening task store");

    if let Command::Init { include_weekends } = args.command {
        return init_project(&store, &args.project, include_weekends);
    }
    if !store.project_exists(&args.project) {
        bail!(
            "project '{}' not found in {:?}; run `taskcascade --project {} init` first",
            args.project,
            store_dir,
            args.project
        );
    }

    let registry = EngineRegistry::new(ScheduleCore::new(cfg.engine_options()), Arc::new(store));
    let handle = registry.handle(&args.project);
    dispatch(&handle, args.command).await
}

async fn dispatch(handle: &EngineHandle, command: Command) -> Result<()> {
    match command {
        Command::Init { .. } => bail!("project already initialised"),
        Command::Show => print_json(&handle.snapshot().await?),
        Command::Reconcile => print_json(&handle.reconcile_snapshot().await?),
        Command::Refresh => {
            let plan = handle.refresh_schedule().await?;
            info!(changed = plan.changed_count, "schedule refreshed");
            print_json(&plan)
        }
        Command::Add(add) => {
            let plan = handle.create_task(add.into_new_task(), today()).await?;
            print_json(&plan)
        }
        Command::Edit(edit_args) => {
            let edit = edit_args.to_edit();
            if edit.is_empty() {
                bail!("nothing to change for task '{}'", edit_args.id);
            }
            print_json(&handle.apply_edit(edit_args.id, edit).await?)
        }
        Command::Remove { id } => print_json(&handle.remove_task(id).await?),
        Command::CriticalPath => print_json(&handle.compute_critical_path().await?),
        Command::Level => print_json(&handle.compute_leveling_proposals().await?),
    }
}

fn init_project(store: &JsonFileStore, project: &str, include_weekends: bool) -> Result<()> {
    if store.project_exists(project) {
        bail!("project '{project}' already exists at {:?}", store.project_path(project));
    }
    let snapshot = ProjectSnapshot::new(project, include_weekends);
    store.save_project(&snapshot)?;
    info!(project, path = ?store.project_path(project), "project initialised");
    print_json(&snapshot)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

