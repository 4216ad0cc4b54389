//! Worklog normalization and grouping queries.
//!
//! Raw rows arrive with time in seconds and a combined `GROUP-NUMBER` task
//! key; normalization derives hours, the group prefix and the year once,
//! so every later stage works on the same canonical [`WorklogEntry`].

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike, NaiveDate};
use log::warn;
use serde::Serialize;

use crate::calendar::look_back;
use crate::inputs::{InternalKeyRow, WorklogRow};

/// Group under which zero-valued padding records are filed.
pub const PADDING_GROUP: &str = "ZP";
/// Task key carried by padding records.
pub const PADDING_KEY: &str = "ZP-1";

const SECONDS_PER_HOUR: f64 = 3600.0;

/// One canonical person-task-day record. `rate` and `income` stay `None`
/// until rate resolution runs; a missing rate is not the same thing as a
/// zero rate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorklogEntry {
    pub date: NaiveDate,
    pub user: String,
    pub issue_key: String,
    pub group: String,
    pub total_hours: f64,
    pub billable_hours: f64,
    pub internal_hours: f64,
    pub year: i32,
    pub rate: Option<f64>,
    pub income: Option<f64>,
}

impl WorklogEntry {
    pub fn is_padding(&self) -> bool {
        self.group == PADDING_GROUP
    }

    pub fn income_or_zero(&self) -> f64 {
        self.income.unwrap_or(0.0)
    }
}

/// Converts raw rows into canonical entries. No business filtering happens
/// here; rows with more billable than total time are clamped with a
/// warning rather than dropped.
pub fn normalize(rows: &[WorklogRow]) -> Vec<WorklogEntry> {
    rows.iter()
        .map(|row| {
            let total_hours = row.time_spent_seconds as f64 / SECONDS_PER_HOUR;
            let mut billable_hours = row.billable_seconds as f64 / SECONDS_PER_HOUR;
            if billable_hours > total_hours {
                warn!(
                    "worklog row {} / {} on {} reports more billable ({billable_hours}h) than total ({total_hours}h); clamping",
                    row.issue_key, row.user, row.started
                );
                billable_hours = total_hours;
            }
            let group = row
                .issue_key
                .split_once('-')
                .map(|(group, _)| group)
                .unwrap_or(row.issue_key.as_str())
                .to_string();

            WorklogEntry {
                date: row.started,
                user: row.user.clone(),
                issue_key: row.issue_key.clone(),
                group,
                total_hours,
                billable_hours,
                internal_hours: total_hours - billable_hours,
                year: row.started.year(),
                rate: None,
                income: None,
            }
        })
        .collect()
}

/// Moves all time on internal groups to the internal bucket. Pure: returns
/// a new collection, so applying it twice cannot double the effect.
pub fn zero_out_internal(
    entries: Vec<WorklogEntry>,
    internal_keys: &[InternalKeyRow],
) -> Vec<WorklogEntry> {
    if internal_keys.is_empty() {
        return entries;
    }
    let keys: BTreeSet<&str> = internal_keys.iter().map(|row| row.key.as_str()).collect();

    entries
        .into_iter()
        .map(|mut entry| {
            if keys.contains(entry.group.as_str()) {
                entry.billable_hours = 0.0;
                entry.internal_hours = entry.total_hours;
                entry.income = entry.rate.map(|_| 0.0);
            }
            entry
        })
        .collect()
}

/// Unique users present in the worklog, sorted. Padding records do not
/// introduce users on their own.
pub fn users(entries: &[WorklogEntry]) -> Vec<String> {
    let set: BTreeSet<&String> = entries
        .iter()
        .filter(|entry| !entry.is_padding())
        .map(|entry| &entry.user)
        .collect();
    set.into_iter().cloned().collect()
}

pub fn first_entry_date(entries: &[WorklogEntry], user: &str) -> Option<NaiveDate> {
    entries
        .iter()
        .filter(|entry| !entry.is_padding() && entry.user == user)
        .map(|entry| entry.date)
        .min()
}

/// Latest entry date for `user` strictly before `before` (the in-flight
/// day is never a reliable "last reported" marker).
pub fn last_entry_date(entries: &[WorklogEntry], user: &str, before: NaiveDate) -> Option<NaiveDate> {
    entries
        .iter()
        .filter(|entry| !entry.is_padding() && entry.user == user && entry.date < before)
        .map(|entry| entry.date)
        .max()
}

/// Sum of total hours for `user` in `[start, stop]`; `stop = None` leaves
/// the span open-ended.
pub fn hours_between(
    entries: &[WorklogEntry],
    user: &str,
    start: NaiveDate,
    stop: Option<NaiveDate>,
) -> f64 {
    entries
        .iter()
        .filter(|entry| entry.user == user && entry.date >= start)
        .filter(|entry| stop.map_or(true, |stop| entry.date <= stop))
        .map(|entry| entry.total_hours)
        .sum()
}

/// Hours per (date, user, group), sorted by key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupDayHours {
    pub date: NaiveDate,
    pub user: String,
    pub group: String,
    pub total_hours: f64,
    pub billable_hours: f64,
}

pub fn by_group(entries: &[WorklogEntry]) -> Vec<GroupDayHours> {
    let mut sums: BTreeMap<(NaiveDate, &String, &String), (f64, f64)> = BTreeMap::new();
    for entry in entries {
        let slot = sums
            .entry((entry.date, &entry.user, &entry.group))
            .or_insert((0.0, 0.0));
        slot.0 += entry.total_hours;
        slot.1 += entry.billable_hours;
    }
    sums.into_iter()
        .map(|((date, user, group), (total, billable))| GroupDayHours {
            date,
            user: user.clone(),
            group: group.clone(),
            total_hours: total,
            billable_hours: billable,
        })
        .collect()
}

/// Hours per (date, user, issue key), sorted by key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyDayHours {
    pub date: NaiveDate,
    pub user: String,
    pub issue_key: String,
    pub total_hours: f64,
    pub billable_hours: f64,
}

pub fn by_day(entries: &[WorklogEntry]) -> Vec<KeyDayHours> {
    let mut sums: BTreeMap<(NaiveDate, &String, &String), (f64, f64)> = BTreeMap::new();
    for entry in entries {
        let slot = sums
            .entry((entry.date, &entry.user, &entry.issue_key))
            .or_insert((0.0, 0.0));
        slot.0 += entry.total_hours;
        slot.1 += entry.billable_hours;
    }
    sums.into_iter()
        .map(|((date, user, issue_key), (total, billable))| KeyDayHours {
            date,
            user: user.clone(),
            issue_key: issue_key.clone(),
            total_hours: total,
            billable_hours: billable,
        })
        .collect()
}

/// Billable hours per (group, user) in the trailing `days_back` window.
/// Groups without billable time are left out.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupUserHours {
    pub group: String,
    pub user: String,
    pub billable_hours: f64,
}

pub fn by_total_group(entries: &[WorklogEntry], days_back: u64, today: NaiveDate) -> Vec<GroupUserHours> {
    let cutoff = look_back(days_back, today);
    let mut sums: BTreeMap<(&String, &String), f64> = BTreeMap::new();
    for entry in entries.iter().filter(|entry| entry.date > cutoff) {
        *sums.entry((&entry.group, &entry.user)).or_insert(0.0) += entry.billable_hours;
    }
    sums.into_iter()
        .filter(|(_, billable)| *billable > 0.0)
        .map(|((group, user), billable)| GroupUserHours {
            group: group.clone(),
            user: user.clone(),
            billable_hours: billable,
        })
        .collect()
}

/// Trailing 30-day buckets used for income-concentration reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum RecencyBasket {
    Days60To90,
    Days30To60,
    Days0To30,
}

impl RecencyBasket {
    pub fn label(self) -> &'static str {
        match self {
            RecencyBasket::Days60To90 => "60-90 days ago",
            RecencyBasket::Days30To60 => "30-60 days ago",
            RecencyBasket::Days0To30 => "0-30 days ago",
        }
    }
}

/// Income per (group, user, recency basket). Entries older than 90 days or
/// without income are left out.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BasketIncome {
    pub group: String,
    pub user: String,
    pub basket: RecencyBasket,
    pub income: f64,
}

pub fn by_recency_basket(entries: &[WorklogEntry], today: NaiveDate) -> Vec<BasketIncome> {
    let d30 = look_back(30, today);
    let d60 = look_back(60, today);
    let d90 = look_back(90, today);

    let mut sums: BTreeMap<(&String, &String, RecencyBasket), f64> = BTreeMap::new();
    for entry in entries {
        let basket = if entry.date > d30 {
            RecencyBasket::Days0To30
        } else if entry.date > d60 {
            RecencyBasket::Days30To60
        } else if entry.date > d90 {
            RecencyBasket::Days60To90
        } else {
            continue;
        };
        *sums
            .entry((&entry.group, &entry.user, basket))
            .or_insert(0.0) += entry.income_or_zero();
    }
    sums.into_iter()
        .filter(|(_, income)| *income > 0.0)
        .map(|((group, user, basket), income)| BasketIncome {
            group: group.clone(),
            user: user.clone(),
            basket,
            income,
        })
        .collect()
}

/// Whether an entry counts as paying work, judged by rate presence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum TimeType {
    Billable,
    NonBillable,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeTypeHours {
    pub date: NaiveDate,
    pub time_type: TimeType,
    pub group: String,
    pub total_hours: f64,
}

pub fn by_time_type(entries: &[WorklogEntry]) -> Vec<TimeTypeHours> {
    let mut sums: BTreeMap<(NaiveDate, TimeType, &String), f64> = BTreeMap::new();
    for entry in entries {
        let time_type = if entry.rate.is_some() {
            TimeType::Billable
        } else {
            TimeType::NonBillable
        };
        *sums
            .entry((entry.date, time_type, &entry.group))
            .or_insert(0.0) += entry.total_hours;
    }
    sums.into_iter()
        .map(|((date, time_type, group), total)| TimeTypeHours {
            date,
            time_type,
            group: group.clone(),
            total_hours: total,
        })
        .collect()
}

pub fn entries_for_year(entries: &[WorklogEntry], year: i32) -> Vec<WorklogEntry> {
    entries
        .iter()
        .filter(|entry| entry.year == year)
        .cloned()
        .collect()
}

pub fn latest_year(entries: &[WorklogEntry]) -> Option<i32> {
    entries.iter().map(|entry| entry.year).max()
}
