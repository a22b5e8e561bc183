// tests/edit_and_cascade.rs
mod common;
use crate::common::{d, dates_of, init_tracing, prepare, SnapshotBuilder, TaskBuilder};

use std::error::Error;

use taskcascade::calendar::Calendar;
use taskcascade::engine::{EngineOptions, ScheduleCore, StoreCommand, TaskEdit};
use taskcascade::errors::CascadeError;
use taskcascade::model::{Dependency, ProjectSnapshot};
use taskcascade::schedule::{cascade_from, Anomaly};

type TestResult = Result<(), Box<dyn Error>>;

fn chain() -> ProjectSnapshot {
    SnapshotBuilder::new("chain")
        .task(TaskBuilder::new("A", d(1), d(3)))
        .task(TaskBuilder::new("B", d(4), d(6)).after("A"))
        .task(TaskBuilder::new("C", d(7), d(9)).after("B"))
        .build()
}

#[test]
fn closing_a_cycle_is_rejected_and_edges_stay_put() {
    init_tracing();
    let snapshot = chain();

    let edit = TaskEdit::new().with_dependencies(vec![Dependency::finish_start("C")]);
    let err = ScheduleCore::default()
        .apply_edit(&snapshot, "A", &edit)
        .unwrap_err();

    match &err {
        CascadeError::CycleDetected { chain } => {
            assert_eq!(chain, &["A", "C", "B", "A"]);
        }
        other => panic!("expected CycleDetected, got {other:?}"),
    }
    assert!(err.to_string().contains("A -> C -> B -> A"));

    // The snapshot is only ever read; nothing was planned.
    assert!(snapshot.task("A").unwrap().dependencies.is_empty());
    assert_eq!(snapshot.task("B").unwrap().predecessor_ids().count(), 1);
}

#[test]
fn self_dependency_is_a_cycle() {
    let edit = TaskEdit::new().with_dependencies(vec![Dependency::finish_start("B")]);
    let err = ScheduleCore::default()
        .apply_edit(&chain(), "B", &edit)
        .unwrap_err();
    assert_eq!(err.cycle_chain().unwrap(), &["B".to_string(), "B".to_string()]);
}

#[test]
fn cascade_preserves_durations_downstream() -> TestResult {
    let snapshot = SnapshotBuilder::new("p")
        .working_days()
        .task(TaskBuilder::new("A", d(3), d(5)))
        .task(TaskBuilder::new("B", d(6), d(12)).after("A"))
        .task(TaskBuilder::new("C", d(13), d(14)).after("B"))
        .task(TaskBuilder::new("D", d(13), d(17)).after("B"))
        .build();
    let calendar = snapshot.calendar();

    let plan = ScheduleCore::default().apply_edit(&snapshot, "A", &TaskEdit::new().with_start(d(10)))?;

    for id in ["A", "B", "C", "D"] {
        let before = snapshot.task(id).unwrap();
        let (start, end) = dates_of(&plan.final_tasks, id);
        assert_eq!(
            calendar.diff_days(start, end),
            before.duration(&calendar),
            "duration of {id} changed"
        );
    }
    assert_eq!(dates_of(&plan.final_tasks, "B").0, d(13));
    Ok(())
}

#[test]
fn write_order_puts_predecessors_first() -> TestResult {
    let plan = ScheduleCore::default().apply_edit(&chain(), "A", &TaskEdit::new().with_start(d(5)))?;
    let order: Vec<&str> = plan
        .commands
        .iter()
        .filter_map(StoreCommand::written_id)
        .collect();
    assert_eq!(order, vec!["A", "B", "C"]);
    Ok(())
}

#[test]
fn cascade_reaches_dependents_of_a_parent() -> TestResult {
    let snapshot = SnapshotBuilder::new("p")
        .task(TaskBuilder::new("X", d(1), d(5)))
        .task(TaskBuilder::new("K", d(1), d(5)).parent("X"))
        .task(TaskBuilder::new("Y", d(6), d(7)).after("X"))
        .build();

    let plan = ScheduleCore::default().apply_edit(&snapshot, "K", &TaskEdit::new().with_start(d(10)))?;
    assert_eq!(dates_of(&plan.final_tasks, "K"), (d(10), d(14)));
    assert_eq!(dates_of(&plan.final_tasks, "X"), (d(10), d(14)));
    assert_eq!(dates_of(&plan.final_tasks, "Y"), (d(15), d(16)));
    Ok(())
}

#[test]
fn cascade_clears_exclusive_peers() -> TestResult {
    let snapshot = SnapshotBuilder::new("p")
        .task(TaskBuilder::new("A", d(1), d(2)))
        .task(TaskBuilder::new("B", d(3), d(4)).after("A").exclusive_with("E"))
        .task(TaskBuilder::new("E", d(8), d(9)).exclusive_with("B"))
        .build();

    let plan = ScheduleCore::default().apply_edit(&snapshot, "A", &TaskEdit::new().with_dates(d(5), d(6)))?;
    let b = dates_of(&plan.final_tasks, "B");
    let e = dates_of(&plan.final_tasks, "E");
    assert_eq!(b, (d(7), d(8)));
    assert_eq!(e, (d(9), d(10)));
    assert!(!(b.0 <= e.1 && b.1 >= e.0));
    Ok(())
}

#[test]
fn cascade_stops_at_the_step_bound() {
    let mut builder = SnapshotBuilder::new("long").task(TaskBuilder::new("T0", d(1), d(1)));
    for i in 1..20 {
        builder = builder.task(TaskBuilder::new(&format!("T{i}"), d(1), d(1)).after(&format!("T{}", i - 1)));
    }
    let snapshot = builder.build();
    let (mut ws, graph) = prepare(&snapshot);
    ws.set_dates("T0", d(2), d(2));

    let outcome = cascade_from(&mut ws, &graph, "T0", 5);
    assert!(outcome.truncated);
    assert_eq!(outcome.steps, 5);
    assert!(outcome.anomalies.contains(&Anomaly::CascadeLimitReached {
        origin: "T0".into(),
        limit: 5,
    }));
}

#[test]
fn configured_bound_applies_to_edits() -> TestResult {
    let options = EngineOptions {
        max_cascade_steps: 1,
        ..EngineOptions::default()
    };
    let plan = ScheduleCore::new(options).apply_edit(&chain(), "A", &TaskEdit::new().with_start(d(5)))?;
    assert_eq!(dates_of(&plan.final_tasks, "B"), (d(8), d(10)));
    assert_eq!(dates_of(&plan.final_tasks, "C"), (d(7), d(9)));
    assert!(plan
        .violations
        .iter()
        .any(|v| matches!(v, Anomaly::CascadeLimitReached { .. })));
    Ok(())
}

#[test]
fn refresh_reports_changed_count_and_final_tasks() {
    let snapshot = SnapshotBuilder::new("p")
        .task(TaskBuilder::new("P", d(1), d(10)))
        .task(TaskBuilder::new("S", d(5), d(8)).after("P"))
        .task(TaskBuilder::new("Q", d(2), d(3)))
        .build();

    let plan = ScheduleCore::default().refresh_schedule(&snapshot);
    assert_eq!(plan.changed_count, 1);
    assert_eq!(dates_of(&plan.final_tasks, "S"), (d(11), d(14)));
    assert_eq!(plan.final_tasks.len(), 3);
}

#[test]
fn duration_is_exclusive_of_the_start_day() {
    let calendar = Calendar::working_days();
    // Monday to Friday.
    assert_eq!(calendar.diff_days(d(3), d(7)), 4);
}
