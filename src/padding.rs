//! Zero-filled padding so every user has a record on every day of their
//! validity window. Rolling statistics downstream rely on a complete date
//! axis; padding supplies it without touching real totals.

use chrono::{Datelike, NaiveDate};
use log::warn;

use crate::inputs::WorkingHoursRow;
use crate::worklog::{WorklogEntry, PADDING_GROUP, PADDING_KEY};

fn padding_entry(date: NaiveDate, user: &str) -> WorklogEntry {
    WorklogEntry {
        date,
        user: user.to_string(),
        issue_key: PADDING_KEY.to_string(),
        group: PADDING_GROUP.to_string(),
        total_hours: 0.0,
        billable_hours: 0.0,
        internal_hours: 0.0,
        year: date.year(),
        rate: Some(0.0),
        income: Some(0.0),
    }
}

fn pad_range(out: &mut Vec<WorklogEntry>, user: &str, start: NaiveDate, stop: NaiveDate) {
    let mut day = start;
    while day <= stop {
        out.push(padding_entry(day, user));
        day = day.succ_opt().unwrap();
    }
}

/// Appends one zero-valued record per (user, day) over each user's
/// validity window. With policy rows, the window is `valid_from` (or the
/// user's earliest entry) through `valid_to` (or `yesterday`; the
/// in-flight day is never padded). Without policies, the observed
/// first/last entry dates bound the window.
///
/// Pre-existing padding rows are stripped first, so padding an already
/// padded series reproduces it exactly and per-(date, user) hour totals
/// are always conserved.
pub fn pad(
    entries: &[WorklogEntry],
    policies: &[WorkingHoursRow],
    yesterday: NaiveDate,
) -> Vec<WorklogEntry> {
    let mut padded: Vec<WorklogEntry> = entries
        .iter()
        .filter(|entry| !entry.is_padding())
        .cloned()
        .collect();
    let real = padded.clone();

    if !policies.is_empty() {
        for row in policies {
            let start = match row.valid_from.date() {
                Some(date) => Some(date),
                None => crate::worklog::first_entry_date(&real, &row.user),
            };
            let Some(start) = start else {
                warn!(
                    "no worklog entries for {}; skipping padding for an open-start policy row",
                    row.user
                );
                continue;
            };
            let stop = row.valid_to.unwrap_or(yesterday);
            if stop < start {
                warn!(
                    "padding window for {} is empty ({start} .. {stop}); skipping row",
                    row.user
                );
                continue;
            }
            pad_range(&mut padded, &row.user, start, stop);
        }
    } else {
        for user in crate::worklog::users(&real) {
            let first = crate::worklog::first_entry_date(&real, &user);
            let last = real
                .iter()
                .filter(|entry| entry.user == user)
                .map(|entry| entry.date)
                .max();
            if let (Some(first), Some(last)) = (first, last) {
                pad_range(&mut padded, &user, first, last);
            }
        }
    }

    padded.sort_by(|a, b| {
        (a.date, &a.user, &a.issue_key).cmp(&(b.date, &b.user, &b.issue_key))
    });
    padded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inputs::{DateBound, WorklogRow};
    use crate::worklog::normalize;
    use std::collections::BTreeMap;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn row(key: &str, seconds: i64, billable: i64, date: NaiveDate, user: &str) -> WorklogRow {
        WorklogRow {
            issue_key: key.to_string(),
            time_spent_seconds: seconds,
            billable_seconds: billable,
            started: date,
            user: user.to_string(),
        }
    }

    fn policy(user: &str, from: DateBound, to: DateBound) -> WorkingHoursRow {
        WorkingHoursRow {
            user: user.to_string(),
            daily_hours: 8.0,
            baseline_delta: 0.0,
            valid_from: from,
            valid_to: to,
        }
    }

    fn daily_totals(entries: &[WorklogEntry]) -> BTreeMap<(NaiveDate, String), (f64, f64)> {
        let mut sums = BTreeMap::new();
        for entry in entries {
            let slot = sums
                .entry((entry.date, entry.user.clone()))
                .or_insert((0.0, 0.0));
            slot.0 += entry.billable_hours;
            slot.1 += entry.internal_hours;
        }
        sums
    }

    #[test]
    fn test_open_bounds_pad_from_first_entry_to_yesterday() {
        let entries = normalize(&[
            row("ENG-1", 28800, 28800, d(2024, 1, 3), "Ada"),
            row("ENG-1", 28800, 28800, d(2024, 1, 5), "Ada"),
        ]);
        let policies = vec![policy("Ada", DateBound::Open, DateBound::Open)];

        let padded = pad(&entries, &policies, d(2024, 1, 9));
        let dates: Vec<NaiveDate> = padded
            .iter()
            .filter(|entry| entry.is_padding())
            .map(|entry| entry.date)
            .collect();
        // One padding row per day 2024-01-03 ..= 2024-01-09.
        assert_eq!(dates.len(), 7);
        assert_eq!(dates[0], d(2024, 1, 3));
        assert_eq!(*dates.last().unwrap(), d(2024, 1, 9));
    }

    #[test]
    fn test_explicit_bounds_take_precedence() {
        let entries = normalize(&[row("ENG-1", 28800, 28800, d(2024, 1, 3), "Ada")]);
        let policies = vec![policy(
            "Ada",
            DateBound::On(d(2024, 1, 1)),
            DateBound::On(d(2024, 1, 4)),
        )];

        let padded = pad(&entries, &policies, d(2024, 2, 1));
        let pad_dates: Vec<NaiveDate> = padded
            .iter()
            .filter(|entry| entry.is_padding())
            .map(|entry| entry.date)
            .collect();
        assert_eq!(pad_dates, vec![d(2024, 1, 1), d(2024, 1, 2), d(2024, 1, 3), d(2024, 1, 4)]);
    }

    #[test]
    fn test_no_policies_pads_observed_span_per_user() {
        let entries = normalize(&[
            row("ENG-1", 28800, 28800, d(2024, 1, 1), "Ada"),
            row("ENG-1", 28800, 28800, d(2024, 1, 4), "Ada"),
            row("DOC-1", 3600, 0, d(2024, 1, 2), "Grace"),
        ]);

        let padded = pad(&entries, &[], d(2024, 3, 1));
        let ada_pads = padded
            .iter()
            .filter(|entry| entry.is_padding() && entry.user == "Ada")
            .count();
        let grace_pads = padded
            .iter()
            .filter(|entry| entry.is_padding() && entry.user == "Grace")
            .count();
        assert_eq!(ada_pads, 4);
        assert_eq!(grace_pads, 1);
    }

    #[test]
    fn test_padding_conserves_daily_totals() {
        let entries = normalize(&[
            row("ENG-1", 28800, 21600, d(2024, 1, 2), "Ada"),
            row("DOC-1", 7200, 0, d(2024, 1, 2), "Ada"),
            row("ENG-1", 14400, 14400, d(2024, 1, 8), "Ada"),
        ]);
        let policies = vec![policy("Ada", DateBound::Open, DateBound::Open)];

        let padded = pad(&entries, &policies, d(2024, 1, 10));

        let before = daily_totals(&entries);
        let after = daily_totals(&padded);
        for (key, sums) in &before {
            let padded_sums = after.get(key).unwrap();
            assert!((sums.0 - padded_sums.0).abs() < 1e-9);
            assert!((sums.1 - padded_sums.1).abs() < 1e-9);
        }
        // Days that only exist as padding sum to zero.
        let gap = after.get(&(d(2024, 1, 5), "Ada".to_string())).unwrap();
        assert_eq!(*gap, (0.0, 0.0));
    }

    #[test]
    fn test_padding_twice_is_identical() {
        let entries = normalize(&[
            row("ENG-1", 28800, 28800, d(2024, 1, 2), "Ada"),
            row("ENG-1", 28800, 28800, d(2024, 1, 6), "Ada"),
        ]);
        let policies = vec![policy("Ada", DateBound::Open, DateBound::Open)];

        let once = pad(&entries, &policies, d(2024, 1, 8));
        let twice = pad(&once, &policies, d(2024, 1, 8));
        assert_eq!(once, twice);
    }

    #[test]
    fn test_inverted_window_is_skipped() {
        let entries = normalize(&[row("ENG-1", 28800, 28800, d(2024, 1, 2), "Ada")]);
        let policies = vec![policy(
            "Ada",
            DateBound::On(d(2024, 2, 1)),
            DateBound::On(d(2024, 1, 1)),
        )];

        let padded = pad(&entries, &policies, d(2024, 3, 1));
        assert!(padded.iter().all(|entry| !entry.is_padding()));
    }
}
