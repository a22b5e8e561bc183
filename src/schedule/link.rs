// src/schedule/link.rs

//! Link Scheduler: candidate dates for a successor under one precedence link.

use std::collections::HashSet;

use chrono::NaiveDate;

use crate::calendar::Calendar;
use crate::dag::DependencyGraph;
use crate::model::WorkingSet;
use crate::types::LinkType;

/// Candidate `(start, end)` for a successor of duration `duration`, given its
/// predecessor's effective `(start, end)`.
///
/// - FS: start on the valid day after the predecessor's effective end.
/// - FF: end on the predecessor's effective end.
/// - SS: start on the first valid day at or after the predecessor's
///   effective start.
/// - SF: end on the valid day before the predecessor's effective start.
///
/// The other boundary is always derived from `duration`, which is preserved.
pub fn candidate_dates(
    link: LinkType,
    predecessor: (NaiveDate, NaiveDate),
    duration: i64,
    calendar: &Calendar,
) -> (NaiveDate, NaiveDate) {
    let (pred_start, pred_end) = predecessor;
    match link {
        LinkType::FinishStart => {
            let start = calendar.add_days(pred_end, 1);
            (start, calendar.add_days(start, duration))
        }
        LinkType::FinishFinish => (calendar.add_days(pred_end, -duration), pred_end),
        LinkType::StartStart => {
            let start = calendar.next_valid_day(pred_start);
            (start, calendar.add_days(start, duration))
        }
        LinkType::StartFinish => {
            let end = calendar.add_days(pred_start, -1);
            (calendar.add_days(end, -duration), end)
        }
    }
}

/// Dates a task presents to its successors.
///
/// For an ordinary task this is its stored range adjusted by its buffer. For a
/// summary task it is the min/max over its children's effective dates, since
/// a parent's own stored dates never drive scheduling.
pub fn effective_dates(
    ws: &WorkingSet,
    graph: &DependencyGraph,
    id: &str,
) -> Option<(NaiveDate, NaiveDate)> {
    let mut seen = HashSet::new();
    effective_dates_inner(ws, graph, id, &mut seen)
}

fn effective_dates_inner<'a>(
    ws: &WorkingSet,
    graph: &'a DependencyGraph,
    id: &'a str,
    seen: &mut HashSet<&'a str>,
) -> Option<(NaiveDate, NaiveDate)> {
    let task = ws.get(id)?;
    let calendar = ws.calendar();

    if !seen.insert(id) {
        // Malformed hierarchy loop: fall back to the task's own dates.
        return Some((task.effective_start(&calendar), task.effective_end(&calendar)));
    }

    let children = graph.children_of(id);
    let mut rolled: Option<(NaiveDate, NaiveDate)> = None;
    for child in children {
        if let Some((s, e)) = effective_dates_inner(ws, graph, child, seen) {
            rolled = Some(match rolled {
                Some((rs, re)) => (rs.min(s), re.max(e)),
                None => (s, e),
            });
        }
    }

    Some(rolled.unwrap_or_else(|| {
        (task.effective_start(&calendar), task.effective_end(&calendar))
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Task;
    use crate::types::BufferPosition;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, day).unwrap()
    }

    #[test]
    fn finish_start_on_calendar_days() {
        let cal = Calendar::calendar_days();
        let (s, e) = candidate_dates(LinkType::FinishStart, (d(6, 1), d(6, 10)), 3, &cal);
        assert_eq!((s, e), (d(6, 11), d(6, 14)));
    }

    #[test]
    fn finish_start_skips_weekend() {
        let cal = Calendar::working_days();
        // Mon 3 .. Fri 7 -> next start Mon 10.
        let (s, e) = candidate_dates(LinkType::FinishStart, (d(6, 3), d(6, 7)), 2, &cal);
        assert_eq!((s, e), (d(6, 10), d(6, 12)));
    }

    #[test]
    fn finish_finish_and_start_finish_back_compute_start() {
        let cal = Calendar::calendar_days();
        assert_eq!(
            candidate_dates(LinkType::FinishFinish, (d(6, 1), d(6, 10)), 4, &cal),
            (d(6, 6), d(6, 10))
        );
        assert_eq!(
            candidate_dates(LinkType::StartFinish, (d(6, 10), d(6, 20)), 2, &cal),
            (d(6, 7), d(6, 9))
        );
    }

    #[test]
    fn start_start_moves_off_weekend() {
        let cal = Calendar::working_days();
        // Predecessor effectively starts on Saturday the 8th.
        assert_eq!(
            candidate_dates(LinkType::StartStart, (d(6, 8), d(6, 12)), 1, &cal),
            (d(6, 10), d(6, 11))
        );
    }

    #[test]
    fn summary_effective_dates_roll_up_children() {
        let cal = Calendar::calendar_days();
        let parent = Task::new("P", d(1, 1), d(1, 2));
        let mut a = Task::new("A", d(6, 3), d(6, 5));
        a.parent_task_id = Some("P".into());
        let mut b = Task::new("B", d(6, 4), d(6, 9));
        b.parent_task_id = Some("P".into());
        b.buffer_days = 2;
        b.buffer_position = BufferPosition::End;

        let ws = WorkingSet::new(vec![parent, a, b], cal);
        let graph = DependencyGraph::from_working_set(&ws);
        assert_eq!(effective_dates(&ws, &graph, "P"), Some((d(6, 3), d(6, 11))));
        assert_eq!(effective_dates(&ws, &graph, "A"), Some((d(6, 3), d(6, 5))));
        assert_eq!(effective_dates(&ws, &graph, "missing"), None);
    }
}
