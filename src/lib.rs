//! # Worklog Metrics
//!
//! A library for turning raw, irregular worklog records (one entry per
//! person per task per day) plus sparse configuration into derived time
//! series: gap-filled per-person daily series, rolling-window statistics,
//! workload percentages against time-varying expected hours, and a
//! forward-looking cash-runway ledger.
//!
//! ## Core Concepts
//!
//! - **Padding**: zero-valued records fill every calendar day of each
//!   person's validity window, so rolling statistics see a complete date
//!   axis without real totals ever changing.
//! - **Rate resolution**: default rates broadcast per key, per-user
//!   exceptions override, currencies normalize once; a missing rate stays
//!   missing instead of becoming a silent zero.
//! - **Runway**: realized balances, uninvoiced-but-worked income, and
//!   confirmed allocations merge into one signed-event ledger with three
//!   cumulative what-if series.
//!
//! Every optional input degrades gracefully: a run only fails outright
//! when there is no worklog data at all. The analysis window is passed in
//! explicitly, so runs are reproducible without wall-clock access.
//!
//! ## Example
//!
//! ```rust,ignore
//! use worklog_metrics::{EngineSettings, MetricsInputs, MetricsReport};
//! use chrono::NaiveDate;
//!
//! let settings = EngineSettings::new(
//!     NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(),
//!     NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
//! );
//! let inputs = MetricsInputs {
//!     worklog: load_worklog_rows(),
//!     ..MetricsInputs::default()
//! };
//!
//! let report = MetricsReport::compute(&inputs, &settings)?;
//! for pair in report.team_income.unwrap_or_default() {
//!     println!("{}: {:?} / {:?}", pair.date, pair.short, pair.long);
//! }
//! ```

pub mod accounting;
pub mod calendar;
pub mod crew;
pub mod error;
pub mod inputs;
pub mod padding;
pub mod rates;
pub mod rolling;
pub mod runway;
pub mod workload;
pub mod worklog;

pub use error::{MetricsError, Result};
pub use inputs::{
    AccountingRow, AllocationRow, CrewRole, CrewRow, Currency, DateBound, DefaultRateRow,
    ExceptionRateRow, InternalKeyRow, WorkingHoursRow, WorklogRow, YearMonth,
};
pub use rates::{RateRecord, RateReportRow, ResolvedRates};
pub use rolling::{DailySeries, Metric, RatioPoint, RollingSeries, WindowPair};
pub use runway::{RangeHint, RunwayPoint, RunwayProjection, RunwaySettings};
pub use workload::{TeamWorkloadPoint, UserActivity, UserSummary, WorkloadPoint};
pub use worklog::{
    BasketIncome, RecencyBasket, TimeType, WorklogEntry, PADDING_GROUP, PADDING_KEY,
};

use std::collections::BTreeMap;

use chrono::NaiveDate;
use log::{debug, info, warn};

/// Engine configuration. The analysis window (`window_start`, `today`) is
/// explicit so two runs over the same inputs always agree; the remaining
/// fields default to the conventions the dashboard has always used.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// First day of the analysis window; earlier entries are ignored.
    pub window_start: NaiveDate,
    /// The in-flight day. Computations treat the day before as the last
    /// complete one.
    pub today: NaiveDate,
    /// Expected daily hours when no working-hours policy row applies.
    pub default_daily_hours: f64,
    /// SEK per EUR conversion divisor applied at rate resolution.
    pub eur_per_sek: f64,
    /// Hours of projected work per allocated day in the runway ledger.
    pub allocation_hours_per_day: f64,
    /// Workdays subtracted per projected month for untracked absence.
    pub workday_slack: i64,
    /// Synthetic months appended to the accounting series.
    pub projection_months: usize,
    /// Days between a month boundary and the estimated payment date.
    pub invoicing_lag_days: u64,
}

impl EngineSettings {
    pub fn new(window_start: NaiveDate, today: NaiveDate) -> Self {
        EngineSettings {
            window_start,
            today,
            default_daily_hours: 8.0,
            eur_per_sek: 11.43,
            allocation_hours_per_day: 7.5,
            workday_slack: 3,
            projection_months: 5,
            invoicing_lag_days: 14,
        }
    }

    pub fn yesterday(&self) -> NaiveDate {
        calendar::look_back(1, self.today)
    }
}

/// Everything one dashboard refresh supplies. Only `worklog` is required;
/// each empty optional input just switches its dependent features off.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize, schemars::JsonSchema)]
pub struct MetricsInputs {
    pub worklog: Vec<WorklogRow>,
    #[serde(default)]
    pub default_rates: Vec<DefaultRateRow>,
    #[serde(default)]
    pub exception_rates: Vec<ExceptionRateRow>,
    #[serde(default)]
    pub internal_keys: Vec<InternalKeyRow>,
    #[serde(default)]
    pub working_hours: Vec<WorkingHoursRow>,
    #[serde(default)]
    pub accounting: Vec<AccountingRow>,
    #[serde(default)]
    pub allocations: Vec<AllocationRow>,
    #[serde(default)]
    pub crew: Vec<CrewRow>,
}

impl MetricsInputs {
    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(MetricsInputs)
    }

    pub fn schema_as_json() -> Result<String> {
        Ok(serde_json::to_string_pretty(&Self::generate_json_schema())?)
    }
}

/// One refresh cycle's derived series. Fields are `None` (or empty) when
/// the inputs gating them were absent.
#[derive(Debug, Clone)]
pub struct MetricsReport {
    /// Normalized entries with internal keys zeroed and rates attached.
    pub entries: Vec<WorklogEntry>,
    /// Entries plus zero-valued padding over each user's validity window.
    pub padded: Vec<WorklogEntry>,
    pub resolved_rates: Vec<RateRecord>,
    pub rates_report: Vec<RateReportRow>,
    pub missing_rates: Vec<RateReportRow>,
    /// Rolling 7-day billable-hour sums per user.
    pub user_billable_rolling: BTreeMap<String, RollingSeries>,
    /// Rolling 7-day internal-hour sums per user.
    pub user_internal_rolling: BTreeMap<String, RollingSeries>,
    /// Percent-of-capacity workload per (date, user); empty without
    /// working-hours policies.
    pub user_workload: Vec<WorkloadPoint>,
    pub team_workload: Vec<TeamWorkloadPoint>,
    /// Rolling 7-day income per user; `None` without rate tables.
    pub user_income_rolling: Option<BTreeMap<String, RollingSeries>>,
    /// Average income per person, 7-day rolled with 30-day companion.
    pub average_income: Option<Vec<WindowPair>>,
    /// Team-total income, 7-day rolled with 30-day companion.
    pub team_income: Option<Vec<WindowPair>>,
    /// Rolling income/cost ratio; `None` without rates or accounting.
    pub income_vs_cost: Option<Vec<RatioPoint>>,
    pub user_summaries: Vec<UserSummary>,
    pub user_activity: Vec<UserActivity>,
    pub recency_baskets: Vec<BasketIncome>,
    /// Accounting series extended with projection months.
    pub accounting_extended: Option<Vec<AccountingRow>>,
    pub runway: Option<RunwayProjection>,
}

impl MetricsReport {
    pub fn compute(inputs: &MetricsInputs, settings: &EngineSettings) -> Result<MetricsReport> {
        compute_metrics(inputs, settings)
    }
}

/// Drops rows whose explicit date range is inverted. Upstream data entry
/// errors must not take the whole run down.
fn sane_policies(rows: &[WorkingHoursRow]) -> Vec<WorkingHoursRow> {
    rows.iter()
        .filter(|row| match row.validate() {
            Ok(()) => true,
            Err(err) => {
                warn!("{err}; dropping row");
                false
            }
        })
        .cloned()
        .collect()
}

fn sane_allocations(rows: &[AllocationRow]) -> Vec<AllocationRow> {
    rows.iter()
        .filter(|row| match row.validate() {
            Ok(()) => true,
            Err(err) => {
                warn!("{err}; dropping row");
                false
            }
        })
        .cloned()
        .collect()
}

fn user_rolling_week(
    padded: &[WorklogEntry],
    metric: Metric,
) -> BTreeMap<String, RollingSeries> {
    rolling::daily_user_series(padded, metric)
        .into_iter()
        .map(|(user, series)| (user, rolling::rolling_sum(&series, 7, 7)))
        .collect()
}

pub fn compute_metrics(inputs: &MetricsInputs, settings: &EngineSettings) -> Result<MetricsReport> {
    if inputs.worklog.is_empty() {
        return Err(MetricsError::NoWorklogData);
    }

    // The in-flight day never enters the analysis.
    let mut entries: Vec<WorklogEntry> = worklog::normalize(&inputs.worklog)
        .into_iter()
        .filter(|entry| entry.date >= settings.window_start && entry.date <= settings.yesterday())
        .collect();
    if entries.is_empty() {
        return Err(MetricsError::NoWorklogData);
    }
    info!(
        "computing metrics over {} entries, {} .. {}",
        entries.len(),
        settings.window_start,
        settings.yesterday()
    );

    entries = worklog::zero_out_internal(entries, &inputs.internal_keys);
    let users = worklog::users(&entries);

    let resolved = if inputs.default_rates.is_empty() {
        info!("no rate tables configured; income features disabled");
        ResolvedRates::default()
    } else {
        rates::resolve(
            &inputs.default_rates,
            &inputs.exception_rates,
            &users,
            settings.eur_per_sek,
        )
    };
    if !resolved.is_empty() {
        entries = rates::apply_rates(entries, &resolved);
    }

    let (rates_report, missing_rates) = if resolved.is_empty() {
        (Vec::new(), Vec::new())
    } else {
        let report = rates::rates_report(&entries);
        let missing = rates::missing_rates_report(&report);
        (report, missing)
    };

    let policies = sane_policies(&inputs.working_hours);
    let allocations = sane_allocations(&inputs.allocations);

    let padded = padding::pad(&entries, &policies, settings.yesterday());
    debug!("padded series holds {} records", padded.len());

    let user_billable_rolling = user_rolling_week(&padded, Metric::BillableHours);
    let user_internal_rolling = user_rolling_week(&padded, Metric::InternalHours);

    let (user_workload, team_workload) = if policies.is_empty() {
        info!("no working-hours policies; workload normalization disabled");
        (Vec::new(), Vec::new())
    } else {
        let user_points = workload::normalize_user(
            &user_billable_rolling,
            &user_internal_rolling,
            &policies,
            settings.default_daily_hours,
        );
        let team_points = workload::team_average(&user_points);
        (user_points, team_points)
    };

    let mut user_income_rolling = None;
    let mut average_income = None;
    let mut team_income = None;
    if !resolved.is_empty() {
        let per_user = user_rolling_week(&padded, Metric::Income);

        let average_week = rolling::team_mean_by_date(&per_user);
        let average_month = rolling::rolling_mean(&average_week, 30, 23);
        average_income = Some(rolling::join_windows(&average_week, &average_month));

        let team_daily = rolling::daily_team_series(&padded, Metric::Income);
        let team_week = rolling::rolling_sum(&team_daily, 7, 7);
        let team_month = rolling::rolling_mean(&team_week, 30, 23);
        team_income = Some(rolling::join_windows(&team_week, &team_month));

        user_income_rolling = Some(per_user);
    }

    let mut accounting_extended = None;
    let mut income_vs_cost = None;
    if inputs.accounting.is_empty() {
        info!("no accounting entries; cost comparisons and runway disabled");
    } else {
        let extended =
            accounting::extend_with_projection(&inputs.accounting, settings.projection_months);
        if !resolved.is_empty() {
            let (daily_cost, _daily_income) = accounting::daily_cost_series(&extended);
            let team_daily = rolling::daily_team_series(&padded, Metric::Income);
            income_vs_cost = Some(rolling::income_vs_cost_smoothed(&team_daily, &daily_cost));
        }
        accounting_extended = Some(extended);
    }

    let runway = match &accounting_extended {
        Some(extended)
            if accounting::has_real_income(extended)
                && !inputs.crew.is_empty()
                && !allocations.is_empty()
                && !resolved.is_empty() =>
        {
            let daily_income = rolling::daily_team_series(&entries, Metric::Income);
            let runway_settings = RunwaySettings {
                monthly_cost: crew::monthly_cost_total(&inputs.crew),
                hours_per_day: settings.allocation_hours_per_day,
                workday_slack: settings.workday_slack,
                projection_months: settings.projection_months,
                invoicing_lag_days: settings.invoicing_lag_days,
            };
            runway::project(extended, &daily_income, &allocations, &resolved, &runway_settings)
        }
        _ => {
            info!("runway gating inputs incomplete; ledger skipped");
            None
        }
    };

    let (user_summaries, user_activity) = if policies.is_empty() {
        (Vec::new(), workload::user_activity(&entries, settings.today))
    } else {
        (
            workload::user_summaries(&entries, &policies, settings.today),
            Vec::new(),
        )
    };

    let recency_baskets = worklog::by_recency_basket(&entries, settings.today);

    Ok(MetricsReport {
        resolved_rates: resolved.records().cloned().collect(),
        entries,
        padded,
        rates_report,
        missing_rates,
        user_billable_rolling,
        user_internal_rolling,
        user_workload,
        team_workload,
        user_income_rolling,
        average_income,
        team_income,
        income_vs_cost,
        user_summaries,
        user_activity,
        recency_baskets,
        accounting_extended,
        runway,
    })
}
