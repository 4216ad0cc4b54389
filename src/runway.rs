//! Cash-runway projection: one chronological signed-event ledger merging
//! fixed monthly burn, already-worked-but-uninvoiced income, and
//! confirmed future allocations, accumulated into three what-if balance
//! series (costs only, incl. known work, incl. allocated work).

use std::collections::BTreeMap;

use chrono::NaiveDate;
use log::{debug, warn};
use serde::Serialize;

use crate::calendar::{look_ahead, look_back, month_ends_between, next_month_begin, prev_month_begin, weekdays_through};
use crate::inputs::{AccountingRow, AllocationRow};
use crate::rates::ResolvedRates;
use crate::rolling::DailySeries;

#[derive(Debug, Clone)]
pub struct RunwaySettings {
    /// Fixed monthly burn (typically the crew's total compensation).
    pub monthly_cost: f64,
    /// Hours of projected work per allocated day.
    pub hours_per_day: f64,
    /// Workdays subtracted per month to absorb untracked holidays and
    /// sick days.
    pub workday_slack: i64,
    /// How many trailing rows of the extended accounting series are
    /// synthetic projection months; the first of them anchors the ledger.
    pub projection_months: usize,
    /// Days between a month boundary and the estimated payment for work
    /// invoiced at that boundary.
    pub invoicing_lag_days: u64,
}

impl RunwaySettings {
    pub fn new(monthly_cost: f64) -> Self {
        RunwaySettings {
            monthly_cost,
            hours_per_day: 7.5,
            workday_slack: 3,
            projection_months: 5,
            invoicing_lag_days: 14,
        }
    }
}

/// One day of the runway ledger: that day's summed deltas and the three
/// running balances up to and including it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunwayPoint {
    pub date: NaiveDate,
    pub costs_only: f64,
    pub incl_known: f64,
    pub incl_allocated: f64,
    pub cum_costs_only: f64,
    pub cum_known: f64,
    pub cum_allocated: f64,
}

/// Vertical-range suggestion for rendering. Purely presentational: the
/// series in [`RunwayProjection::points`] are never clamped.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RangeHint {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunwayProjection {
    pub points: Vec<RunwayPoint>,
    pub starting_balance: f64,
    pub total_known_income: f64,
    pub clamp_hint: RangeHint,
}

/// Work done on `work_date` is invoiced at the following month boundary
/// and paid an estimated lag later.
fn estimated_invoice_date(work_date: NaiveDate, lag_days: u64) -> NaiveDate {
    look_ahead(lag_days, next_month_begin(work_date))
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Builds the runway ledger.
///
/// `accounting` must already be extended with projection months (see
/// [`crate::accounting::extend_with_projection`]); the first projected
/// month anchors the analysis start and supplies the starting balance.
/// `daily_income` holds the team's actual income totals per worked day.
/// Unconfirmed allocations are ignored; confirmed ones without a
/// resolvable rate contribute zero income, which the missing-rates report
/// surfaces upstream.
pub fn project(
    accounting: &[AccountingRow],
    daily_income: &DailySeries,
    allocations: &[AllocationRow],
    rates: &ResolvedRates,
    settings: &RunwaySettings,
) -> Option<RunwayProjection> {
    if accounting.len() < settings.projection_months + 1 {
        warn!(
            "accounting series too short ({} rows) to anchor a runway projection",
            accounting.len()
        );
        return None;
    }
    let anchor = &accounting[accounting.len() - settings.projection_months];
    let start_date = anchor.month.first_day();
    let starting_balance = anchor.starting_amount;
    let invoiced_cutoff = prev_month_begin(start_date);

    let furthest_stop = allocations.iter().filter_map(|row| row.stop).max();
    let horizon = furthest_stop.unwrap_or_else(|| {
        warn!("no bounded allocation stop; projecting costs through the start month only");
        start_date
    });

    // date -> (costs only, incl. known, incl. allocated)
    let mut events: BTreeMap<NaiveDate, (f64, f64, f64)> = BTreeMap::new();
    let mut add = |date: NaiveDate, deltas: (f64, f64, f64)| {
        let slot = events.entry(date).or_insert((0.0, 0.0, 0.0));
        slot.0 += deltas.0;
        slot.1 += deltas.1;
        slot.2 += deltas.2;
    };

    // Seed: yesterday's balance flows into all three scenarios.
    add(
        look_back(1, start_date),
        (starting_balance, starting_balance, starting_balance),
    );

    // Fixed burn at every month end through the allocation horizon.
    for day in month_ends_between(start_date, next_month_begin(horizon)) {
        add(
            day,
            (-settings.monthly_cost, -settings.monthly_cost, -settings.monthly_cost),
        );
    }

    // Work already done but not yet invoiced.
    let mut total_known = 0.0;
    for (&work_date, &income) in daily_income {
        if work_date < invoiced_cutoff {
            continue;
        }
        total_known += income;
        add(
            estimated_invoice_date(work_date, settings.invoicing_lag_days),
            (0.0, income, 0.0),
        );
    }

    // Confirmed allocations, month by month.
    for row in allocations {
        if row.unconfirmed {
            continue;
        }
        if row.stop.is_some_and(|stop| stop < start_date) {
            continue;
        }
        let start = row.start.unwrap_or(invoiced_cutoff).max(invoiced_cutoff);
        let stop = row.stop.unwrap_or(horizon);
        if stop < start {
            warn!(
                "allocation for {} stops ({stop}) before it starts ({start}); skipping",
                row.user
            );
            continue;
        }

        let rate = row
            .task_key()
            .and_then(|key| rates.rate_for(key, &row.user))
            .unwrap_or(0.0);
        if rate == 0.0 {
            debug!(
                "no rate for allocation {} / {:?}; projecting zero income",
                row.user, row.task_id
            );
        }

        let mut prev_boundary = start;
        let mut boundary = next_month_begin(start);
        while boundary <= stop {
            let workdays =
                (weekdays_through(prev_boundary, boundary) - settings.workday_slack).max(0);
            let amount = row.fraction * workdays as f64 * settings.hours_per_day * rate;
            add(
                estimated_invoice_date(prev_boundary, settings.invoicing_lag_days),
                (0.0, 0.0, amount),
            );
            prev_boundary = boundary;
            boundary = next_month_begin(boundary);
        }
    }

    let mut points = Vec::with_capacity(events.len());
    let (mut cum_costs, mut cum_known, mut cum_allocated) = (0.0, 0.0, 0.0);
    for (date, (costs_only, incl_known, incl_allocated)) in events {
        cum_costs = round4(cum_costs + costs_only);
        cum_known = round4(cum_known + costs_only + incl_known);
        cum_allocated = round4(cum_allocated + costs_only + incl_known + incl_allocated);
        points.push(RunwayPoint {
            date,
            costs_only,
            incl_known,
            incl_allocated,
            cum_costs_only: cum_costs,
            cum_known,
            cum_allocated,
        });
    }

    Some(RunwayProjection {
        points,
        starting_balance,
        total_known_income: total_known,
        clamp_hint: RangeHint {
            min: 0.0,
            max: starting_balance + total_known * 1.2,
        },
    })
}
