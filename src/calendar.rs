use chrono::{Datelike, Days, NaiveDate, Weekday};

/// Number of Mon-Fri days in the half-open span `[from, to)`.
pub fn weekdays_between(from: NaiveDate, to: NaiveDate) -> i64 {
    if to <= from {
        return 0;
    }
    let mut count = 0;
    let mut day = from;
    while day < to {
        if !matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
            count += 1;
        }
        day = day.succ_opt().unwrap();
    }
    count
}

/// Number of Mon-Fri days in the inclusive span `[from, to]`.
pub fn weekdays_through(from: NaiveDate, to: NaiveDate) -> i64 {
    weekdays_between(from, look_ahead(1, to))
}

pub fn look_back(days: u64, from: NaiveDate) -> NaiveDate {
    from.checked_sub_days(Days::new(days)).unwrap()
}

pub fn look_ahead(days: u64, from: NaiveDate) -> NaiveDate {
    from.checked_add_days(Days::new(days)).unwrap()
}

pub fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    last_day_of_month(year, month).day()
}

pub fn last_day_of_month(year: i32, month: u32) -> NaiveDate {
    let next_month = if month == 12 { 1 } else { month + 1 };
    let next_year = if month == 12 { year + 1 } else { year };

    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .unwrap()
        .checked_sub_days(Days::new(1))
        .unwrap()
}

pub fn month_begin(date: NaiveDate) -> NaiveDate {
    NaiveDate::from_ymd_opt(date.year(), date.month(), 1).unwrap()
}

/// First day of the month after `date`. Always advances, even when `date`
/// is itself a month begin.
pub fn next_month_begin(date: NaiveDate) -> NaiveDate {
    let year = if date.month() == 12 {
        date.year() + 1
    } else {
        date.year()
    };
    let month = if date.month() == 12 { 1 } else { date.month() + 1 };
    NaiveDate::from_ymd_opt(year, month, 1).unwrap()
}

/// First day of the month containing `date`, or of the previous month when
/// `date` is itself a month begin. Rolls backwards the way `next_month_begin`
/// rolls forwards.
pub fn prev_month_begin(date: NaiveDate) -> NaiveDate {
    if date.day() > 1 {
        month_begin(date)
    } else {
        let year = if date.month() == 1 {
            date.year() - 1
        } else {
            date.year()
        };
        let month = if date.month() == 1 { 12 } else { date.month() - 1 };
        NaiveDate::from_ymd_opt(year, month, 1).unwrap()
    }
}

/// Month-end dates falling inside the inclusive span `[from, to]`.
pub fn month_ends_between(from: NaiveDate, to: NaiveDate) -> Vec<NaiveDate> {
    let mut dates = Vec::new();
    let mut current = last_day_of_month(from.year(), from.month());
    while current <= to {
        if current >= from {
            dates.push(current);
        }
        current = last_day_of_month(
            if current.month() == 12 {
                current.year() + 1
            } else {
                current.year()
            },
            if current.month() == 12 {
                1
            } else {
                current.month() + 1
            },
        );
    }
    dates
}
