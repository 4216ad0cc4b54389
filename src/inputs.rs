//! Externally-parsed tabular inputs. Transport and persistence of these
//! rows (HTTP clients, configuration files) are owned by the callers; the
//! engine only sees the already-typed records below.

use std::fmt;

use chrono::{Datelike, NaiveDate};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::calendar::last_day_of_month;
use crate::error::{MetricsError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[schemars(description = "The base currency; amounts pass through unchanged")]
    Eur,

    #[schemars(description = "Converted to the base currency at resolution time")]
    Sek,
}

/// One bound of a validity window. The raw tables use `"*"` for an open
/// bound ("derive from observed activity" / "still running").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateBound {
    Open,
    On(NaiveDate),
}

impl DateBound {
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw == "*" {
            return Ok(DateBound::Open);
        }
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map(DateBound::On)
            .map_err(|_| MetricsError::InvalidDateBound(raw.to_string()))
    }

    pub fn is_open(self) -> bool {
        matches!(self, DateBound::Open)
    }

    pub fn date(self) -> Option<NaiveDate> {
        match self {
            DateBound::Open => None,
            DateBound::On(date) => Some(date),
        }
    }

    /// The bounded date, or `fallback` when the bound is open.
    pub fn unwrap_or(self, fallback: NaiveDate) -> NaiveDate {
        self.date().unwrap_or(fallback)
    }
}

impl fmt::Display for DateBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateBound::Open => write!(f, "*"),
            DateBound::On(date) => write!(f, "{}", date.format("%Y-%m-%d")),
        }
    }
}

impl Serialize for DateBound {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for DateBound {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateBound::parse(&raw).map_err(serde::de::Error::custom)
    }
}

impl JsonSchema for DateBound {
    fn schema_name() -> String {
        "DateBound".to_string()
    }

    fn json_schema(gen: &mut schemars::gen::SchemaGenerator) -> schemars::schema::Schema {
        String::json_schema(gen)
    }
}

/// A calendar month, serialized as `YYYY-MM`. Accounting rows are keyed by
/// these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Self {
        debug_assert!((1..=12).contains(&month));
        YearMonth { year, month }
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let invalid = || MetricsError::InvalidMonth(raw.to_string());
        let (y, m) = raw.trim().split_once('-').ok_or_else(invalid)?;
        let year: i32 = y.parse().map_err(|_| invalid())?;
        let month: u32 = m.parse().map_err(|_| invalid())?;
        if !(1..=12).contains(&month) {
            return Err(invalid());
        }
        Ok(YearMonth { year, month })
    }

    pub fn first_day(self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap()
    }

    pub fn last_day(self) -> NaiveDate {
        last_day_of_month(self.year, self.month)
    }

    pub fn days(self) -> u32 {
        self.last_day().day()
    }

    pub fn next(self) -> Self {
        if self.month == 12 {
            YearMonth::new(self.year + 1, 1)
        } else {
            YearMonth::new(self.year, self.month + 1)
        }
    }
}

impl From<NaiveDate> for YearMonth {
    fn from(date: NaiveDate) -> Self {
        YearMonth::new(date.year(), date.month())
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl Serialize for YearMonth {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for YearMonth {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        YearMonth::parse(&raw).map_err(serde::de::Error::custom)
    }
}

impl JsonSchema for YearMonth {
    fn schema_name() -> String {
        "YearMonth".to_string()
    }

    fn json_schema(gen: &mut schemars::gen::SchemaGenerator) -> schemars::schema::Schema {
        String::json_schema(gen)
    }
}

/// One raw time report: one person, one task, one day.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorklogRow {
    #[schemars(description = "Task identifier in GROUP-NUMBER form (e.g. 'ENG-42')")]
    pub issue_key: String,

    #[schemars(description = "Total reported time in seconds")]
    pub time_spent_seconds: i64,

    #[schemars(description = "Portion of the reported time billable to a client, in seconds")]
    pub billable_seconds: i64,

    #[schemars(description = "Calendar day the work was performed")]
    pub started: NaiveDate,

    #[schemars(description = "Display name of the person reporting the time")]
    pub user: String,
}

/// Default income rate for a task key, applying to every user unless an
/// exception row overrides it.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DefaultRateRow {
    pub key: String,

    #[schemars(description = "Hourly rate in the row's currency")]
    pub rate: f64,

    pub currency: Currency,
}

/// Per-user override of a default rate. The currency of the matching
/// default row applies.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExceptionRateRow {
    pub key: String,
    pub user: String,
    pub rate: f64,
}

/// A task group whose time is never billable, regardless of rates.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct InternalKeyRow {
    pub key: String,
}

/// One expected-working-hours policy row for a user. Multiple rows per
/// user are allowed; see the workload normalizer for overlap handling.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkingHoursRow {
    pub user: String,

    #[schemars(description = "Expected working hours per weekday while this row applies")]
    pub daily_hours: f64,

    #[schemars(description = "Carried-forward correction added to the user's hour balance")]
    pub baseline_delta: f64,

    #[schemars(description = "First day the row applies, or '*' for the user's earliest entry")]
    pub valid_from: DateBound,

    #[schemars(description = "Last day the row applies, or '*' while still in effect")]
    pub valid_to: DateBound,
}

impl WorkingHoursRow {
    pub fn validate(&self) -> Result<()> {
        if let (Some(from), Some(to)) = (self.valid_from.date(), self.valid_to.date()) {
            if to < from {
                return Err(MetricsError::InvalidDateRange {
                    context: format!("working-hours row for {}", self.user),
                    start: from,
                    stop: to,
                });
            }
        }
        Ok(())
    }
}

/// One realized (or projected) month of bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AccountingRow {
    pub month: YearMonth,

    #[schemars(description = "External costs booked for the month, in the base currency")]
    pub external_cost: f64,

    #[schemars(description = "Invoiced income for the month; absent when bookkeeping lags")]
    pub real_income: Option<f64>,

    #[schemars(
        description = "Bank balance snapshot taken at the start of the month; 0 when unknown"
    )]
    pub starting_amount: f64,
}

/// A planned future assignment of a person's time.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AllocationRow {
    pub user: String,

    #[schemars(description = "Task the allocation bills against; None or '?' when not yet known")]
    pub task_id: Option<String>,

    #[schemars(description = "Fraction of a working day allocated (0.0-1.0, occasionally above)")]
    pub fraction: f64,

    #[schemars(description = "First allocated day; None for an already-running assignment")]
    pub start: Option<NaiveDate>,

    #[schemars(description = "Last allocated day; None for an open-ended assignment")]
    pub stop: Option<NaiveDate>,

    #[schemars(description = "True while the assignment is not yet contractually confirmed")]
    pub unconfirmed: bool,
}

impl AllocationRow {
    /// The task key usable for rate lookup. The upstream tables use `"?"`
    /// as a missing-task sentinel; treat it like an absent key.
    pub fn task_key(&self) -> Option<&str> {
        match self.task_id.as_deref() {
            None | Some("?") | Some("") => None,
            Some(key) => Some(key),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if let (Some(start), Some(stop)) = (self.start, self.stop) {
            if stop < start {
                return Err(MetricsError::InvalidDateRange {
                    context: format!("allocation for {}", self.user),
                    start,
                    stop,
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum CrewRole {
    #[schemars(description = "Bills client work; carries a share of staff cost")]
    Consultant,

    #[schemars(description = "Internal role whose cost is spread across consultants")]
    Staff,
}

/// One crew member's employment economics, in the base currency.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CrewRow {
    pub user: String,
    pub role: CrewRole,

    #[schemars(description = "Contracted consulting hours per week")]
    pub weekly_hours: f64,

    #[schemars(description = "Total monthly employment cost in the base currency")]
    pub monthly_cost: f64,
}
