//! Trailing-window statistics over daily series. One parameterized
//! pipeline covers every chart variant: collapse to a daily series, roll
//! a window over it, join window sizes for plotting.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use log::debug;
use serde::Serialize;

use crate::worklog::WorklogEntry;

/// One value per calendar day. Ordered, so rolling windows are a single
/// forward pass.
pub type DailySeries = BTreeMap<NaiveDate, f64>;

/// Output of a rolling computation. Dates failing the minimum-coverage
/// gate are omitted entirely rather than carried as nulls.
pub type RollingSeries = BTreeMap<NaiveDate, f64>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Metric {
    TotalHours,
    BillableHours,
    InternalHours,
    Income,
}

impl Metric {
    pub fn value_of(self, entry: &WorklogEntry) -> f64 {
        match self {
            Metric::TotalHours => entry.total_hours,
            Metric::BillableHours => entry.billable_hours,
            Metric::InternalHours => entry.internal_hours,
            Metric::Income => entry.income_or_zero(),
        }
    }
}

/// Collapses entries to one summed value per date. Input order never
/// affects the result.
pub fn daily_team_series(entries: &[WorklogEntry], metric: Metric) -> DailySeries {
    let mut series = DailySeries::new();
    for entry in entries {
        *series.entry(entry.date).or_insert(0.0) += metric.value_of(entry);
    }
    series
}

/// Collapses entries to one summed value per (user, date).
pub fn daily_user_series(
    entries: &[WorklogEntry],
    metric: Metric,
) -> BTreeMap<String, DailySeries> {
    let mut series: BTreeMap<String, DailySeries> = BTreeMap::new();
    for entry in entries {
        *series
            .entry(entry.user.clone())
            .or_default()
            .entry(entry.date)
            .or_insert(0.0) += metric.value_of(entry);
    }
    series
}

/// Walks the left-open/right-closed window `(date - window_days, date]`
/// over a sorted series, yielding `(date, observations, sum)` per date.
fn window_pass(
    series: &DailySeries,
    window_days: i64,
    mut emit: impl FnMut(NaiveDate, usize, f64),
) {
    let points: Vec<(NaiveDate, f64)> = series.iter().map(|(d, v)| (*d, *v)).collect();
    let mut lo = 0;
    let mut sum = 0.0;
    for i in 0..points.len() {
        let (date, value) = points[i];
        sum += value;
        while (date - points[lo].0).num_days() >= window_days {
            sum -= points[lo].1;
            lo += 1;
        }
        emit(date, i - lo + 1, sum);
    }
}

/// Trailing sum over `window_days` calendar days. A date reports a value
/// only when at least `min_days` observations fall inside its window.
pub fn rolling_sum(series: &DailySeries, window_days: i64, min_days: usize) -> RollingSeries {
    let mut out = RollingSeries::new();
    window_pass(series, window_days, |date, count, sum| {
        if count >= min_days {
            out.insert(date, sum);
        }
    });
    out
}

/// Trailing mean over `window_days` calendar days, gated like
/// [`rolling_sum`]. The mean is over observed days, not the window span.
pub fn rolling_mean(series: &DailySeries, window_days: i64, min_days: usize) -> RollingSeries {
    let mut out = RollingSeries::new();
    window_pass(series, window_days, |date, count, sum| {
        if count >= min_days && count > 0 {
            out.insert(date, sum / count as f64);
        }
    });
    out
}

/// Per-date mean across users of already-rolled per-user series.
pub fn team_mean_by_date(per_user: &BTreeMap<String, RollingSeries>) -> RollingSeries {
    let mut sums: BTreeMap<NaiveDate, (f64, usize)> = BTreeMap::new();
    for series in per_user.values() {
        for (date, value) in series {
            let slot = sums.entry(*date).or_insert((0.0, 0));
            slot.0 += value;
            slot.1 += 1;
        }
    }
    sums.into_iter()
        .map(|(date, (sum, count))| (date, sum / count as f64))
        .collect()
}

/// A short and a long rolling window joined on date, so both can be
/// plotted on one axis. Either side may be missing where its coverage
/// gate has not closed yet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowPair {
    pub date: NaiveDate,
    pub short: Option<f64>,
    pub long: Option<f64>,
}

pub fn join_windows(short: &RollingSeries, long: &RollingSeries) -> Vec<WindowPair> {
    let mut dates: Vec<NaiveDate> = short.keys().chain(long.keys()).copied().collect();
    dates.sort();
    dates.dedup();
    dates
        .into_iter()
        .map(|date| WindowPair {
            date,
            short: short.get(&date).copied(),
            long: long.get(&date).copied(),
        })
        .collect()
}

/// Rolling-window income divided by rolling-window external cost, over
/// the dates where both series are populated. Windows with zero cost are
/// skipped rather than reported as infinities.
pub fn income_vs_cost(
    income: &DailySeries,
    cost: &DailySeries,
    window_days: i64,
    min_days: usize,
) -> RollingSeries {
    let joint_income: DailySeries = income
        .iter()
        .filter(|(date, _)| cost.contains_key(date))
        .map(|(d, v)| (*d, *v))
        .collect();
    let joint_cost: DailySeries = cost
        .iter()
        .filter(|(date, _)| income.contains_key(date))
        .map(|(d, v)| (*d, *v))
        .collect();

    let income_sums = rolling_sum(&joint_income, window_days, min_days);
    let cost_sums = rolling_sum(&joint_cost, window_days, min_days);

    let mut out = RollingSeries::new();
    for (date, income_sum) in income_sums {
        let Some(cost_sum) = cost_sums.get(&date) else {
            continue;
        };
        if *cost_sum == 0.0 {
            debug!("zero rolling cost on {date}; skipping income/cost ratio");
            continue;
        }
        out.insert(date, income_sum / cost_sum);
    }
    out
}

/// Weekly income/cost ratio with its 30- and 365-day smoothed companions,
/// joined on date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatioPoint {
    pub date: NaiveDate,
    pub weekly: f64,
    pub monthly: Option<f64>,
    pub yearly: Option<f64>,
}

pub fn income_vs_cost_smoothed(income: &DailySeries, cost: &DailySeries) -> Vec<RatioPoint> {
    let weekly = income_vs_cost(income, cost, 7, 7);
    let monthly = rolling_mean(&weekly, 30, 23);
    let yearly = rolling_mean(&weekly, 365, 358);

    weekly
        .iter()
        .map(|(date, ratio)| RatioPoint {
            date: *date,
            weekly: *ratio,
            monthly: monthly.get(date).copied(),
            yearly: yearly.get(date).copied(),
        })
        .collect()
}
