// src/calendar.rs

//! Working-day / calendar-day arithmetic.
//!
//! Every date computation in the engine goes through a [`Calendar`]. The
//! calendar is built once per run from the project's `include_weekends`
//! flag, so all passes of a run agree on which days count.
//!
//! When weekends are excluded, Saturday and Sunday are skipped by every
//! operation:
//!
//! - `add_days(d, n)` steps `|n|` valid days in the direction of `n`.
//! - `diff_days(a, b)` is the signed number of valid days passed through
//!   going from `a` to `b` (`a` itself not counted, `b` counted), so that
//!   `add_days(a, diff_days(a, b)) == b` for valid `a` and `b`.
//! - `next_valid_day(d)` is `d` itself when valid, else the first valid day
//!   after it.

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

/// Day-counting policy for one project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Calendar {
    include_weekends: bool,
}

impl Calendar {
    pub fn new(include_weekends: bool) -> Self {
        Self { include_weekends }
    }

    /// Every day counts.
    pub fn calendar_days() -> Self {
        Self::new(true)
    }

    /// Saturdays and Sundays are skipped.
    pub fn working_days() -> Self {
        Self::new(false)
    }

    pub fn includes_weekends(&self) -> bool {
        self.include_weekends
    }

    /// Whether `date` is a day the schedule may use.
    pub fn is_valid_day(&self, date: NaiveDate) -> bool {
        self.include_weekends || !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
    }

    /// Move `n` valid days away from `date` (backwards when `n < 0`).
    ///
    /// `add_days(d, 0)` is always `d`, even when `d` itself is not valid.
    pub fn add_days(&self, date: NaiveDate, n: i64) -> NaiveDate {
        if self.include_weekends {
            return date
                .checked_add_signed(chrono::Duration::days(n))
                .unwrap_or(date);
        }

        let forward = n >= 0;
        let mut remaining = n.unsigned_abs();
        let mut current = date;
        while remaining > 0 {
            let next = step(current, forward);
            if next == current {
                break;
            }
            current = next;
            if self.is_valid_day(current) {
                remaining -= 1;
            }
        }
        current
    }

    /// Signed count of valid days from `start` to `end`.
    pub fn diff_days(&self, start: NaiveDate, end: NaiveDate) -> i64 {
        if self.include_weekends {
            return (end - start).num_days();
        }

        if end >= start {
            self.count_valid_in_half_open(start, end)
        } else {
            // Valid days in [end, start): mirror of the forward case.
            -self.count_valid_in_half_open(
                step(end, false),
                step(start, false),
            )
        }
    }

    /// `date` if it is valid, else the first valid day after it.
    pub fn next_valid_day(&self, date: NaiveDate) -> NaiveDate {
        let mut current = date;
        while !self.is_valid_day(current) {
            let next = step(current, true);
            if next == current {
                break;
            }
            current = next;
        }
        current
    }

    /// `date` if it is valid, else the last valid day before it.
    pub fn prev_valid_day(&self, date: NaiveDate) -> NaiveDate {
        let mut current = date;
        while !self.is_valid_day(current) {
            let prev = step(current, false);
            if prev == current {
                break;
            }
            current = prev;
        }
        current
    }

    /// Iterate over the valid days of the inclusive range `[start, end]`.
    pub fn valid_days(&self, start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = NaiveDate> + '_ {
        start
            .iter_days()
            .take_while(move |d| *d <= end)
            .filter(move |d| self.is_valid_day(*d))
    }

    /// Valid days in `(from, to]`, for `from <= to`.
    fn count_valid_in_half_open(&self, from: NaiveDate, to: NaiveDate) -> i64 {
        let total = (to - from).num_days();
        let full_weeks = total / 7;
        let rem = total % 7;

        // Weekday pattern repeats every 7 days, so only the tail needs a look.
        let mut count = full_weeks * 5;
        let mut current = from;
        for _ in 0..rem {
            current = step(current, true);
            if self.is_valid_day(current) {
                count += 1;
            }
        }
        count
    }
}

fn step(date: NaiveDate, forward: bool) -> NaiveDate {
    let next = if forward { date.succ_opt() } else { date.pred_opt() };
    next.unwrap_or(date)
}
