//! Rate resolution: default rates broadcast to every observed user,
//! per-user exception overrides, and currency normalization, collapsed
//! into one effective record per (key, user) so downstream consumers
//! never look at raw rate tables again.

use std::collections::{BTreeMap, BTreeSet};

use log::debug;
use serde::Serialize;

use crate::inputs::{Currency, DefaultRateRow, ExceptionRateRow};
use crate::worklog::WorklogEntry;

/// Effective hourly rate for one (key, user) pair, already normalized to
/// the base currency. `currency` records where the amount came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateRecord {
    pub key: String,
    pub user: String,
    pub rate: f64,
    pub currency: Currency,
}

/// Resolved rate table with (key, user) lookup.
#[derive(Debug, Clone, Default)]
pub struct ResolvedRates {
    records: BTreeMap<(String, String), RateRecord>,
}

impl ResolvedRates {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn rate_for(&self, key: &str, user: &str) -> Option<f64> {
        self.records
            .get(&(key.to_string(), user.to_string()))
            .map(|record| record.rate)
    }

    pub fn records(&self) -> impl Iterator<Item = &RateRecord> {
        self.records.values()
    }
}

/// Builds the effective rate table: every default row is broadcast to all
/// of `users`, then exception rows override the amount for their exact
/// (key, user) pair. Exceptions inherit the default row's currency, and
/// conversion to the base currency happens here, not at use time.
pub fn resolve(
    defaults: &[DefaultRateRow],
    exceptions: &[ExceptionRateRow],
    users: &[String],
    eur_per_sek: f64,
) -> ResolvedRates {
    let exception_map: BTreeMap<(&str, &str), f64> = exceptions
        .iter()
        .map(|row| ((row.key.as_str(), row.user.as_str()), row.rate))
        .collect();

    let mut records = BTreeMap::new();
    for default in defaults {
        for user in users {
            let amount = exception_map
                .get(&(default.key.as_str(), user.as_str()))
                .copied()
                .unwrap_or(default.rate);
            let normalized = match default.currency {
                Currency::Eur => amount,
                Currency::Sek => amount / eur_per_sek,
            };
            debug!(
                "resolved rate {}/{} = {normalized:.2} ({:?})",
                default.key, user, default.currency
            );
            records.insert(
                (default.key.clone(), user.clone()),
                RateRecord {
                    key: default.key.clone(),
                    user: user.clone(),
                    rate: normalized,
                    currency: default.currency,
                },
            );
        }
    }
    ResolvedRates { records }
}

/// Attaches `rate` and `income` to each entry. Entries with no matching
/// record keep `rate = None` so the missing-rates report stays distinct
/// from genuinely zero income.
pub fn apply_rates(entries: Vec<WorklogEntry>, rates: &ResolvedRates) -> Vec<WorklogEntry> {
    entries
        .into_iter()
        .map(|mut entry| {
            entry.rate = rates.rate_for(&entry.issue_key, &entry.user);
            entry.income = entry.rate.map(|rate| rate * entry.billable_hours);
            entry
        })
        .collect()
}

/// One row of the rates report: billable hours and users per (key, rate).
/// `rate = None` marks work billed without a configured rate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateReportRow {
    pub key: String,
    pub rate: Option<f64>,
    pub billable_hours: f64,
    pub users: Vec<String>,
}

/// Groups billable entries by (key, rate). Only entries with billable time
/// appear; padding never does.
pub fn rates_report(entries: &[WorklogEntry]) -> Vec<RateReportRow> {
    // f64 keys are not Ord; key the map on the rate's bit pattern instead.
    let mut groups: BTreeMap<(&String, Option<u64>), (f64, BTreeSet<&String>)> = BTreeMap::new();
    for entry in entries.iter().filter(|entry| entry.billable_hours > 0.0) {
        let slot = groups
            .entry((&entry.issue_key, entry.rate.map(f64::to_bits)))
            .or_insert((0.0, BTreeSet::new()));
        slot.0 += entry.billable_hours;
        slot.1.insert(&entry.user);
    }
    groups
        .into_iter()
        .map(|((key, rate_bits), (hours, users))| RateReportRow {
            key: key.clone(),
            rate: rate_bits.map(f64::from_bits),
            billable_hours: hours,
            users: users.into_iter().cloned().collect(),
        })
        .collect()
}

/// The subset of the rates report with no configured rate.
pub fn missing_rates_report(report: &[RateReportRow]) -> Vec<RateReportRow> {
    report
        .iter()
        .filter(|row| row.rate.is_none())
        .cloned()
        .collect()
}
