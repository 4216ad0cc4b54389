//! Workload normalization: absolute rolling hours expressed as a
//! percentage of each person's expected capacity, where expected daily
//! hours can change at known calendar dates per person.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use log::warn;
use serde::Serialize;

use crate::calendar::{look_back, weekdays_through};
use crate::inputs::WorkingHoursRow;
use crate::rolling::{join_windows, rolling_mean, team_mean_by_date, RollingSeries};
use crate::worklog::{first_entry_date, hours_between, last_entry_date, users, WorklogEntry};

fn row_contains(row: &WorkingHoursRow, date: NaiveDate) -> bool {
    let after_start = row.valid_from.date().map_or(true, |from| date >= from);
    let before_stop = row.valid_to.date().map_or(true, |to| date <= to);
    after_start && before_stop
}

/// Expected working hours for (user, date). Policy rows whose window
/// contains the date and whose hours differ from the global default
/// override it; when several such rows overlap, the last one wins and the
/// conflict is logged.
pub fn expected_daily_hours(
    policies: &[WorkingHoursRow],
    user: &str,
    date: NaiveDate,
    default_daily_hours: f64,
) -> f64 {
    let mut chosen = default_daily_hours;
    let mut matched = false;
    for row in policies
        .iter()
        .filter(|row| row.user == user && row.daily_hours != default_daily_hours)
    {
        if row_contains(row, date) {
            if matched && row.daily_hours != chosen {
                warn!(
                    "overlapping working-hours rows for {user} on {date}: {chosen}h replaced by {}h",
                    row.daily_hours
                );
            }
            chosen = row.daily_hours;
            matched = true;
        }
    }
    chosen
}

/// Rolling hours for one (date, user), expressed as percent of a five-day
/// week at the user's expected daily hours.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkloadPoint {
    pub date: NaiveDate,
    pub user: String,
    pub billable_pct: f64,
    pub internal_pct: f64,
}

/// Normalizes per-user rolling-week hour sums against expected capacity.
/// Rows whose expected hours resolve to zero or less are skipped rather
/// than divided through.
pub fn normalize_user(
    billable: &BTreeMap<String, RollingSeries>,
    internal: &BTreeMap<String, RollingSeries>,
    policies: &[WorkingHoursRow],
    default_daily_hours: f64,
) -> Vec<WorkloadPoint> {
    let mut points = Vec::new();
    for (user, series) in billable {
        let internal_series = internal.get(user);
        for (date, billable_hours) in series {
            let daily = expected_daily_hours(policies, user, *date, default_daily_hours);
            if daily <= 0.0 {
                warn!("expected daily hours for {user} on {date} is {daily}; skipping");
                continue;
            }
            let week_capacity = 5.0 * daily;
            let internal_hours = internal_series
                .and_then(|series| series.get(date))
                .copied()
                .unwrap_or(0.0);
            points.push(WorkloadPoint {
                date: *date,
                user: user.clone(),
                billable_pct: 100.0 * billable_hours / week_capacity,
                internal_pct: 100.0 * internal_hours / week_capacity,
            });
        }
    }
    points.sort_by(|a, b| (a.date, &a.user).cmp(&(b.date, &b.user)));
    points
}

/// Team workload per date: the mean of the per-user percentages (not a
/// re-normalization of summed hours), with a 30-day smoothed companion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamWorkloadPoint {
    pub date: NaiveDate,
    pub billable_pct: f64,
    pub internal_pct: f64,
    pub billable_pct_30: Option<f64>,
    pub internal_pct_30: Option<f64>,
}

pub fn team_average(points: &[WorkloadPoint]) -> Vec<TeamWorkloadPoint> {
    let mut billable: BTreeMap<String, RollingSeries> = BTreeMap::new();
    let mut internal: BTreeMap<String, RollingSeries> = BTreeMap::new();
    for point in points {
        billable
            .entry(point.user.clone())
            .or_default()
            .insert(point.date, point.billable_pct);
        internal
            .entry(point.user.clone())
            .or_default()
            .insert(point.date, point.internal_pct);
    }

    let team_billable = team_mean_by_date(&billable);
    let team_internal = team_mean_by_date(&internal);
    let billable_30 = rolling_mean(&team_billable, 30, 23);
    let internal_30 = rolling_mean(&team_internal, 30, 23);

    join_windows(&team_billable, &billable_30)
        .into_iter()
        .filter_map(|pair| {
            let billable_pct = pair.short?;
            Some(TeamWorkloadPoint {
                date: pair.date,
                billable_pct,
                internal_pct: team_internal.get(&pair.date).copied().unwrap_or(0.0),
                billable_pct_30: pair.long,
                internal_pct_30: internal_30.get(&pair.date).copied(),
            })
        })
        .collect()
}

/// Per-user hour balance for users with an open-ended policy row: how far
/// ahead or behind expectation they run, and which way the last week
/// points.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserSummary {
    pub user: String,
    pub first: NaiveDate,
    pub last: NaiveDate,
    pub weekday_count: i64,
    pub expected_hours: f64,
    pub delta_hours: f64,
    pub last_week_hours: f64,
    pub trend_hours: f64,
}

pub fn user_summaries(
    entries: &[WorklogEntry],
    policies: &[WorkingHoursRow],
    today: NaiveDate,
) -> Vec<UserSummary> {
    let mut summaries = Vec::new();
    for row in policies.iter().filter(|row| row.valid_to.is_open()) {
        let first = match row.valid_from.date() {
            Some(date) => date,
            None => match first_entry_date(entries, &row.user) {
                Some(date) => date,
                None => {
                    warn!("no worklog entries for {}; skipping summary", row.user);
                    continue;
                }
            },
        };
        let Some(last) = last_entry_date(entries, &row.user, today) else {
            warn!("no completed-day entries for {}; skipping summary", row.user);
            continue;
        };

        let weekday_count = weekdays_through(first, last);
        let expected_hours = weekday_count as f64 * row.daily_hours;
        let total_hours = hours_between(entries, &row.user, first, None);
        let last_week_hours =
            hours_between(entries, &row.user, look_back(6, last), Some(last));

        summaries.push(UserSummary {
            user: row.user.clone(),
            first,
            last,
            weekday_count,
            expected_hours,
            delta_hours: row.baseline_delta + total_hours - expected_hours,
            last_week_hours,
            trend_hours: last_week_hours - 5.0 * row.daily_hours,
        });
    }
    summaries.sort_by(|a, b| a.user.cmp(&b.user));
    summaries
}

/// Fallback per-user activity figures when no working-hours policies are
/// configured.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserActivity {
    pub user: String,
    pub total_hours: f64,
    pub billable_hours: f64,
    pub first: NaiveDate,
    pub last: NaiveDate,
    pub weekday_count: i64,
}

pub fn user_activity(entries: &[WorklogEntry], today: NaiveDate) -> Vec<UserActivity> {
    let mut activity = Vec::new();
    for user in users(entries) {
        let Some(first) = first_entry_date(entries, &user) else {
            continue;
        };
        let Some(last) = last_entry_date(entries, &user, today) else {
            continue;
        };
        let (total, billable) = entries
            .iter()
            .filter(|entry| entry.user == user && entry.date >= first)
            .fold((0.0, 0.0), |(total, billable), entry| {
                (total + entry.total_hours, billable + entry.billable_hours)
            });
        activity.push(UserActivity {
            user,
            total_hours: total,
            billable_hours: billable,
            first,
            last,
            weekday_count: weekdays_through(first, last),
        });
    }
    activity
}
