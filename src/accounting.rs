//! Accounting-series shaping: realized monthly entries extended with
//! synthetic projection months, and month totals spread into daily series
//! for rolling comparisons against income.

use log::debug;

use crate::inputs::AccountingRow;
use crate::rolling::DailySeries;

/// True when the series carries invoiced-income figures at all. Every
/// "incl. known" / "incl. allocated" computation is gated on this.
pub fn has_real_income(rows: &[AccountingRow]) -> bool {
    rows.iter().any(|row| row.real_income.is_some())
}

/// Weighted trailing average of the last three realized external costs,
/// weighting the most recent month highest (3/2/1 over six parts).
fn trailing_cost_average(rows: &[AccountingRow]) -> f64 {
    let take = |n: usize| -> f64 {
        rows.iter()
            .rev()
            .take(n)
            .map(|row| row.external_cost)
            .sum()
    };
    (take(3) + take(2) + take(1)) / 6.0
}

/// Balance accumulated since the most recent month with a bank snapshot:
/// walk backwards summing income − cost + snapshot until a snapshot is
/// found.
fn accumulated_balance(rows: &[AccountingRow]) -> f64 {
    let mut balance = 0.0;
    for row in rows.iter().skip(1).rev() {
        balance += row.real_income.unwrap_or(0.0) - row.external_cost + row.starting_amount;
        if row.starting_amount != 0.0 {
            break;
        }
    }
    balance
}

/// Appends `months` synthetic future months to the realized series: each
/// costs the trailing average, earns nothing, and the first one carries
/// the accumulated balance forward as its starting amount.
pub fn extend_with_projection(rows: &[AccountingRow], months: usize) -> Vec<AccountingRow> {
    let mut extended: Vec<AccountingRow> = rows.to_vec();
    extended.sort_by_key(|row| row.month);
    if extended.is_empty() {
        return extended;
    }

    let average_cost = trailing_cost_average(&extended);
    let mut carried_balance = accumulated_balance(&extended);
    let projected_income = if has_real_income(&extended) {
        Some(0.0)
    } else {
        None
    };
    debug!(
        "projecting {months} months at {average_cost:.2}/month from balance {carried_balance:.2}"
    );

    let mut month = extended.last().unwrap().month;
    for _ in 0..months {
        month = month.next();
        extended.push(AccountingRow {
            month,
            external_cost: average_cost,
            real_income: projected_income,
            starting_amount: carried_balance,
        });
        carried_balance = 0.0;
    }
    extended
}

/// Spreads each month's totals uniformly over its calendar days. Returns
/// the daily external-cost series and the daily income series (income
/// days exist only for months that report income).
pub fn daily_cost_series(rows: &[AccountingRow]) -> (DailySeries, DailySeries) {
    let mut cost = DailySeries::new();
    let mut income = DailySeries::new();
    for row in rows {
        let days = row.month.days() as f64;
        let mut day = row.month.first_day();
        let last = row.month.last_day();
        while day <= last {
            cost.insert(day, row.external_cost / days);
            if let Some(month_income) = row.real_income {
                income.insert(day, month_income / days);
            }
            day = day.succ_opt().unwrap();
        }
    }
    (cost, income)
}
