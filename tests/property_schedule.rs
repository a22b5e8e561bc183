// tests/property_schedule.rs
mod common;
use crate::common::{d, SnapshotBuilder, TaskBuilder};

use std::collections::{BTreeSet, HashMap, HashSet};

use proptest::prelude::*;

use taskcascade::calendar::Calendar;
use taskcascade::engine::ScheduleCore;
use taskcascade::model::{ProjectSnapshot, Task};
use taskcascade::schedule::exclusion::overlaps;

/// (start offset, duration, raw predecessor picks) per task.
type RawTask = (i64, i64, Vec<usize>);

fn raw_tasks(max_tasks: usize) -> impl Strategy<Value = Vec<RawTask>> {
    proptest::collection::vec(
        (0..20i64, 0..5i64, proptest::collection::vec(any::<usize>(), 0..3)),
        1..=max_tasks,
    )
}

// Acyclic by construction: task N only depends on tasks 0..N-1.
fn build_snapshot(raw: &[RawTask], include_weekends: bool, owners: &[&str]) -> ProjectSnapshot {
    let calendar = Calendar::new(include_weekends);
    let mut builder = SnapshotBuilder::new("prop");
    if !include_weekends {
        builder = builder.working_days();
    }
    for (i, (offset, duration, picks)) in raw.iter().enumerate() {
        let start = calendar.next_valid_day(d(3) + chrono::Duration::days(*offset));
        let end = calendar.add_days(start, *duration);
        let mut task = TaskBuilder::new(&format!("t{i}"), start, end);
        let preds: BTreeSet<usize> = picks.iter().filter(|_| i > 0).map(|p| p % i.max(1)).collect();
        for p in preds {
            task = task.after(&format!("t{p}"));
        }
        if !owners.is_empty() {
            task = task.owner(owners[i % owners.len()]).effort(4.0 + (*duration as f64) * 6.0);
        }
        builder = builder.task(task);
    }
    builder.build()
}

fn by_id(tasks: &[Task]) -> HashMap<&str, &Task> {
    tasks.iter().map(|t| (t.id.as_str(), t)).collect()
}

proptest! {
    #[test]
    fn refresh_satisfies_every_finish_start_link(
        raw in raw_tasks(8),
        include_weekends in any::<bool>(),
    ) {
        let snapshot = build_snapshot(&raw, include_weekends, &[]);
        let plan = ScheduleCore::default().refresh_schedule(&snapshot);
        let finals = by_id(&plan.final_tasks);

        for task in &plan.final_tasks {
            for dep in &task.dependencies {
                let pred = finals[dep.predecessor.as_str()];
                prop_assert!(
                    task.start_date > pred.end_date,
                    "{} starts {} but {} ends {}",
                    task.id, task.start_date, pred.id, pred.end_date
                );
            }
        }
    }

    #[test]
    fn moved_tasks_keep_their_duration(
        raw in raw_tasks(8),
        include_weekends in any::<bool>(),
    ) {
        let snapshot = build_snapshot(&raw, include_weekends, &[]);
        let calendar = snapshot.calendar();
        let plan = ScheduleCore::default().refresh_schedule(&snapshot);
        let finals = by_id(&plan.final_tasks);

        for before in &snapshot.tasks {
            let after = finals[before.id.as_str()];
            prop_assert_eq!(before.duration(&calendar), after.duration(&calendar));
            prop_assert!(calendar.is_valid_day(after.start_date));
        }
    }

    #[test]
    fn refresh_is_idempotent(
        raw in raw_tasks(8),
        include_weekends in any::<bool>(),
    ) {
        let core = ScheduleCore::default();
        let first = core.refresh_schedule(&build_snapshot(&raw, include_weekends, &[]));

        let mut settled = ProjectSnapshot::new("prop", include_weekends);
        settled.tasks = first.final_tasks.clone();
        let second = core.refresh_schedule(&settled);
        prop_assert!(second.commands.is_empty(), "second refresh wrote {:?}", second.commands);
    }

    #[test]
    fn exclusive_pair_never_overlaps_after_refresh(
        a in (0..15i64, 0..6i64),
        b in (0..15i64, 0..6i64),
        include_weekends in any::<bool>(),
    ) {
        let calendar = Calendar::new(include_weekends);
        let span = |(offset, duration): (i64, i64)| {
            let start = calendar.next_valid_day(d(3) + chrono::Duration::days(offset));
            (start, calendar.add_days(start, duration))
        };
        let (sa, ea) = span(a);
        let (sb, eb) = span(b);
        let mut builder = SnapshotBuilder::new("prop")
            .task(TaskBuilder::new("A", sa, ea).exclusive_with("B"))
            .task(TaskBuilder::new("B", sb, eb));
        if !include_weekends {
            builder = builder.working_days();
        }
        let snapshot = builder.build();

        let plan = ScheduleCore::default().refresh_schedule(&snapshot);
        let finals = by_id(&plan.final_tasks);
        prop_assert!(!overlaps(finals["A"], finals["B"], &calendar));
        // Only the later starter ever moves.
        prop_assert!(finals["A"].start_date >= sa && finals["B"].start_date >= sb);
    }

    #[test]
    fn float_and_critical_set_agree(
        raw in raw_tasks(10),
        include_weekends in any::<bool>(),
    ) {
        let snapshot = build_snapshot(&raw, include_weekends, &[]);
        let report = ScheduleCore::default().compute_critical_path(&snapshot);

        prop_assert_eq!(report.float_by_task.len(), snapshot.tasks.len());
        prop_assert!(!report.critical_ids.is_empty());
        for (id, float) in &report.float_by_task {
            prop_assert!(*float >= 0);
            prop_assert_eq!(*float == 0, report.critical_ids.contains(id));
        }
        let latest = report.timings.values().map(|t| t.earliest_finish).max();
        prop_assert_eq!(latest, report.project_end);
    }

    #[test]
    fn leveling_never_exceeds_float_or_touches_critical_tasks(
        raw in raw_tasks(10),
        include_weekends in any::<bool>(),
    ) {
        let snapshot = build_snapshot(&raw, include_weekends, &["ann", "bob"]);
        let calendar = snapshot.calendar();
        let core = ScheduleCore::default();
        let report = core.compute_critical_path(&snapshot);
        let proposals = core.compute_leveling_proposals(&snapshot, &report);

        let mut seen = HashSet::new();
        for p in &proposals {
            prop_assert!(seen.insert(p.task.clone()), "{} proposed twice", p.task);
            prop_assert!(!report.is_critical(&p.task));
            prop_assert!(p.shift_days >= 1 && p.shift_days <= p.float_days);
            prop_assert_eq!(Some(p.float_days), report.float_of(&p.task));

            let stored = snapshot.task(&p.task).unwrap();
            prop_assert_eq!(p.old_dates, stored.dates());
            prop_assert_eq!(p.owner.as_str(), stored.owner.as_deref().unwrap());
            prop_assert_eq!(calendar.diff_days(p.old_dates.0, p.new_dates.0), p.shift_days);
        }
    }
}
