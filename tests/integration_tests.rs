use chrono::NaiveDate;
use worklog_metrics::rolling::{daily_user_series, rolling_sum};
use worklog_metrics::*;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn log_day(key: &str, hours: i64, billable: i64, date: NaiveDate, user: &str) -> WorklogRow {
    WorklogRow {
        issue_key: key.to_string(),
        time_spent_seconds: hours * 3600,
        billable_seconds: billable * 3600,
        started: date,
        user: user.to_string(),
    }
}

fn open_policy(user: &str, daily: f64) -> WorkingHoursRow {
    WorkingHoursRow {
        user: user.to_string(),
        daily_hours: daily,
        baseline_delta: 0.0,
        valid_from: DateBound::Open,
        valid_to: DateBound::Open,
    }
}

fn eng_rate() -> DefaultRateRow {
    DefaultRateRow {
        key: "ENG-1".to_string(),
        rate: 100.0,
        currency: Currency::Eur,
    }
}

#[test]
fn seven_days_logged_roll_to_full_sum() {
    // One person, ENG-1, 2024-01-01 .. 2024-01-07, 8h billable per day,
    // default rate 100/h, no working-hours policy.
    let mut inputs = MetricsInputs::default();
    inputs.worklog = (1..=7)
        .map(|day| log_day("ENG-1", 8, 8, d(2024, 1, day), "Ada"))
        .collect();
    inputs.default_rates = vec![eng_rate()];
    let settings = EngineSettings::new(d(2021, 1, 1), d(2024, 1, 8));

    let report = MetricsReport::compute(&inputs, &settings).unwrap();

    let billable = &report.user_billable_rolling["Ada"];
    assert!((billable.get(&d(2024, 1, 7)).unwrap() - 56.0).abs() < 1e-9);
    assert!(billable.get(&d(2024, 1, 6)).is_none(), "gate needs 7 days");

    let income = &report.user_income_rolling.as_ref().unwrap()["Ada"];
    assert!((income.get(&d(2024, 1, 7)).unwrap() - 5600.0).abs() < 1e-9);
}

#[test]
fn five_business_days_roll_to_forty_hours_with_padding() {
    // Work Mon-Fri only; an open-ended policy pads the weekend with zeros
    // so the 7-day window still closes on Sunday.
    let mut inputs = MetricsInputs::default();
    inputs.worklog = (1..=5)
        .map(|day| log_day("ENG-1", 8, 8, d(2024, 1, day), "Ada"))
        .collect();
    inputs.default_rates = vec![eng_rate()];
    inputs.working_hours = vec![open_policy("Ada", 8.0)];
    let settings = EngineSettings::new(d(2021, 1, 1), d(2024, 1, 8));

    let report = MetricsReport::compute(&inputs, &settings).unwrap();

    let billable = &report.user_billable_rolling["Ada"];
    assert!((billable.get(&d(2024, 1, 7)).unwrap() - 40.0).abs() < 1e-9);

    let income = &report.user_income_rolling.as_ref().unwrap()["Ada"];
    assert!((income.get(&d(2024, 1, 7)).unwrap() - 4000.0).abs() < 1e-9);
}

#[test]
fn padding_conserves_real_totals() {
    let mut inputs = MetricsInputs::default();
    inputs.worklog = vec![
        log_day("ENG-1", 8, 6, d(2024, 1, 2), "Ada"),
        log_day("ENG-1", 4, 4, d(2024, 1, 9), "Ada"),
        log_day("DOC-1", 6, 0, d(2024, 1, 4), "Grace"),
    ];
    inputs.working_hours = vec![open_policy("Ada", 8.0), open_policy("Grace", 8.0)];
    let settings = EngineSettings::new(d(2021, 1, 1), d(2024, 1, 15));

    let report = MetricsReport::compute(&inputs, &settings).unwrap();

    let sum = |entries: &[WorklogEntry]| -> (f64, f64) {
        entries.iter().fold((0.0, 0.0), |(b, i), e| {
            (b + e.billable_hours, i + e.internal_hours)
        })
    };
    let (billable_before, internal_before) = sum(&report.entries);
    let (billable_after, internal_after) = sum(&report.padded);
    assert!((billable_before - billable_after).abs() < 1e-9);
    assert!((internal_before - internal_after).abs() < 1e-9);

    // Both users now cover every day through yesterday.
    for user in ["Ada", "Grace"] {
        let days: Vec<NaiveDate> = report
            .padded
            .iter()
            .filter(|e| e.user == user)
            .map(|e| e.date)
            .collect();
        assert!(days.contains(&d(2024, 1, 14)));
    }
}

#[test]
fn thirty_day_window_gates_on_observed_days() {
    let mut inputs = MetricsInputs::default();
    inputs.worklog = (0..40)
        .map(|offset| {
            log_day(
                "ENG-1",
                8,
                8,
                d(2024, 1, 1) + chrono::Days::new(offset),
                "Ada",
            )
        })
        .collect();
    let settings = EngineSettings::new(d(2021, 1, 1), d(2024, 2, 15));

    let report = MetricsReport::compute(&inputs, &settings).unwrap();
    let daily = daily_user_series(&report.padded, Metric::BillableHours);
    let monthly = rolling_sum(&daily["Ada"], 30, 23);

    // 23 observed days accumulate on 2024-01-23, not a day earlier.
    assert!(monthly.get(&d(2024, 1, 22)).is_none());
    assert!((monthly.get(&d(2024, 1, 23)).unwrap() - 184.0).abs() < 1e-9);
    // Once the window is full it carries 30 days x 8h.
    assert!((monthly.get(&d(2024, 2, 5)).unwrap() - 240.0).abs() < 1e-9);
}

#[test]
fn rate_exceptions_override_for_their_user_only() {
    let mut inputs = MetricsInputs::default();
    inputs.worklog = vec![
        log_day("ENG-1", 8, 8, d(2024, 1, 2), "Ada"),
        log_day("ENG-1", 8, 8, d(2024, 1, 2), "Grace"),
    ];
    inputs.default_rates = vec![eng_rate()];
    inputs.exception_rates = vec![ExceptionRateRow {
        key: "ENG-1".to_string(),
        user: "Ada".to_string(),
        rate: 120.0,
    }];
    let settings = EngineSettings::new(d(2021, 1, 1), d(2024, 1, 5));

    let report = MetricsReport::compute(&inputs, &settings).unwrap();

    let rate_of = |user: &str| {
        report
            .entries
            .iter()
            .find(|e| e.user == user)
            .unwrap()
            .rate
            .unwrap()
    };
    assert!((rate_of("Ada") - 120.0).abs() < 1e-9);
    assert!((rate_of("Grace") - 100.0).abs() < 1e-9);
}

/// Full pipeline: rates with a missing key, an internal group, policies
/// with differing expected hours, accounting with projections, confirmed
/// and unconfirmed allocations, and crew costs feeding the runway.
#[test]
fn full_refresh_cycle() {
    let mut inputs = MetricsInputs::default();

    // Ada: ENG-1 every day of March 2024 plus one internal OPS day.
    inputs.worklog = (1..=31)
        .map(|day| log_day("ENG-1", 8, 8, d(2024, 3, day), "Ada"))
        .collect();
    inputs.worklog.push(log_day("OPS-1", 8, 8, d(2024, 3, 15), "Ada"));
    // Grace: un-rated MISC work, 4h per day for one week.
    for day in 4..=8 {
        inputs.worklog.push(log_day("MISC-9", 4, 4, d(2024, 3, day), "Grace"));
    }

    inputs.default_rates = vec![eng_rate()];
    inputs.internal_keys = vec![InternalKeyRow {
        key: "OPS".to_string(),
    }];
    inputs.working_hours = vec![open_policy("Ada", 8.0), open_policy("Grace", 4.0)];
    inputs.accounting = vec![
        AccountingRow {
            month: YearMonth::new(2023, 11),
            external_cost: 15_000.0,
            real_income: Some(18_000.0),
            starting_amount: 0.0,
        },
        AccountingRow {
            month: YearMonth::new(2023, 12),
            external_cost: 15_000.0,
            real_income: Some(14_000.0),
            starting_amount: 0.0,
        },
        AccountingRow {
            month: YearMonth::new(2024, 1),
            external_cost: 15_000.0,
            real_income: Some(16_000.0),
            starting_amount: 0.0,
        },
        AccountingRow {
            month: YearMonth::new(2024, 2),
            external_cost: 15_000.0,
            real_income: Some(17_000.0),
            starting_amount: 0.0,
        },
        AccountingRow {
            month: YearMonth::new(2024, 3),
            external_cost: 15_000.0,
            real_income: Some(20_000.0),
            starting_amount: 100_000.0,
        },
    ];
    inputs.allocations = vec![
        AllocationRow {
            user: "Ada".to_string(),
            task_id: Some("ENG-1".to_string()),
            fraction: 0.5,
            start: Some(d(2024, 4, 1)),
            stop: Some(d(2024, 6, 30)),
            unconfirmed: false,
        },
        AllocationRow {
            user: "Grace".to_string(),
            task_id: Some("?".to_string()),
            fraction: 1.0,
            start: Some(d(2024, 4, 1)),
            stop: Some(d(2024, 5, 31)),
            unconfirmed: true,
        },
    ];
    inputs.crew = vec![
        CrewRow {
            user: "Ada".to_string(),
            role: CrewRole::Consultant,
            weekly_hours: 30.0,
            monthly_cost: 10_000.0,
        },
        CrewRow {
            user: "Ops".to_string(),
            role: CrewRole::Staff,
            weekly_hours: 0.0,
            monthly_cost: 2_000.0,
        },
    ];

    let settings = EngineSettings::new(d(2021, 1, 1), d(2024, 4, 10));
    let report = MetricsReport::compute(&inputs, &settings).unwrap();

    // Internal group zeroed: the OPS entry carries no billable time.
    let ops = report.entries.iter().find(|e| e.group == "OPS").unwrap();
    assert!(ops.billable_hours.abs() < 1e-9);
    assert!((ops.internal_hours - 8.0).abs() < 1e-9);

    // Grace's MISC work surfaces in the missing-rates report.
    assert!(report.missing_rates.iter().any(|row| row.key == "MISC-9"));
    assert!(report.rates_report.iter().any(|row| row.key == "ENG-1"));

    // Workload: Ada at 8h/day expectation runs 140% on a full 7-day week
    // of 8h entries; Grace's 4h days normalize against her own policy.
    let ada_mid_march = report
        .user_workload
        .iter()
        .find(|p| p.user == "Ada" && p.date == d(2024, 3, 10))
        .unwrap();
    assert!((ada_mid_march.billable_pct - 140.0).abs() < 1e-9);

    let grace = report
        .user_workload
        .iter()
        .find(|p| p.user == "Grace" && p.date == d(2024, 3, 10))
        .unwrap();
    assert!((grace.billable_pct - 100.0).abs() < 1e-9);

    assert!(!report.team_workload.is_empty());
    assert_eq!(report.user_summaries.len(), 2);
    assert!(report.user_activity.is_empty());

    // Runway: analysis starts at the first projected month, 2024-04-01,
    // with the balance accumulated through March.
    let runway = report.runway.as_ref().unwrap();
    assert!((runway.starting_balance - 105_000.0).abs() < 1e-6);
    // Ada's March income: 31 days x 8h x 100.
    assert!((runway.total_known_income - 24_800.0).abs() < 1e-6);

    let seed = &runway.points[0];
    assert_eq!(seed.date, d(2024, 3, 31));
    assert!((seed.cum_costs_only - 105_000.0).abs() < 1e-6);

    let at = |date: NaiveDate| runway.points.iter().find(|p| p.date == date).unwrap();
    // Crew burn is 12,000/month at each month end through June.
    assert!((at(d(2024, 4, 30)).cum_costs_only - 93_000.0).abs() < 1e-6);
    assert!((at(d(2024, 5, 31)).cum_costs_only - 81_000.0).abs() < 1e-6);
    assert!((at(d(2024, 6, 30)).cum_costs_only - 69_000.0).abs() < 1e-6);

    // March work is paid at the estimated lag: 2024-04-01 + 14 days.
    assert!((at(d(2024, 4, 15)).incl_known - 24_800.0).abs() < 1e-6);

    // Confirmed allocation: 0.5 x 20 workdays x 7.5h x 100 per walked
    // month (April paid May 15, May paid June 15; June is partial).
    assert!((at(d(2024, 5, 15)).incl_allocated - 7_500.0).abs() < 1e-6);
    assert!((at(d(2024, 6, 15)).incl_allocated - 7_500.0).abs() < 1e-6);

    // The unconfirmed allocation never contributes.
    let total_allocated: f64 = runway.points.iter().map(|p| p.incl_allocated).sum();
    assert!((total_allocated - 15_000.0).abs() < 1e-6);

    let last = runway.points.last().unwrap();
    assert!((last.cum_costs_only - 69_000.0).abs() < 1e-6);
    assert!((last.cum_known - (105_000.0 - 36_000.0 + 24_800.0)).abs() < 1e-6);
    assert!((last.cum_allocated - (105_000.0 - 36_000.0 + 24_800.0 + 15_000.0)).abs() < 1e-6);

    // Costs-only only ever decreases after the seed.
    for pair in runway.points.windows(2) {
        assert!(pair[1].cum_costs_only <= pair[0].cum_costs_only + 1e-9);
    }

    // Clamp hint bounds rendering without touching the series.
    assert!((runway.clamp_hint.max - (105_000.0 + 24_800.0 * 1.2)).abs() < 1e-6);
    assert!(runway.clamp_hint.min == 0.0);

    // Income-vs-cost ratio exists once rates and accounting are present.
    assert!(report.income_vs_cost.is_some());
    assert_eq!(report.accounting_extended.as_ref().unwrap().len(), 10);
}

#[test]
fn report_sections_serialize_for_the_presentation_layer() -> anyhow::Result<()> {
    let mut inputs = MetricsInputs::default();
    inputs.worklog = (1..=7)
        .map(|day| log_day("ENG-1", 8, 8, d(2024, 1, day), "Ada"))
        .collect();
    inputs.default_rates = vec![eng_rate()];
    let settings = EngineSettings::new(d(2021, 1, 1), d(2024, 1, 8));

    let report = MetricsReport::compute(&inputs, &settings)?;

    let rates_json = serde_json::to_string(&report.rates_report)?;
    assert!(rates_json.contains("ENG-1"));

    let income_json = serde_json::to_string(&report.team_income)?;
    assert!(income_json.contains("2024-01-07"));

    let entries_json = serde_json::to_string(&report.padded)?;
    assert!(entries_json.contains(PADDING_KEY));
    Ok(())
}

#[test]
fn accounting_without_income_degrades_to_costs_only_features() {
    let mut inputs = MetricsInputs::default();
    inputs.worklog = (1..=7)
        .map(|day| log_day("ENG-1", 8, 8, d(2024, 3, day), "Ada"))
        .collect();
    inputs.default_rates = vec![eng_rate()];
    inputs.accounting = vec![AccountingRow {
        month: YearMonth::new(2024, 3),
        external_cost: 10_000.0,
        real_income: None,
        starting_amount: 50_000.0,
    }];
    inputs.allocations = vec![AllocationRow {
        user: "Ada".to_string(),
        task_id: Some("ENG-1".to_string()),
        fraction: 1.0,
        start: Some(d(2024, 4, 1)),
        stop: Some(d(2024, 5, 31)),
        unconfirmed: false,
    }];
    inputs.crew = vec![CrewRow {
        user: "Ada".to_string(),
        role: CrewRole::Consultant,
        weekly_hours: 30.0,
        monthly_cost: 10_000.0,
    }];

    let settings = EngineSettings::new(d(2021, 1, 1), d(2024, 3, 20));
    let report = MetricsReport::compute(&inputs, &settings).unwrap();

    // No realized income anywhere: the ledger cannot estimate payments.
    assert!(report.runway.is_none());
    // Cost-side features survive.
    assert!(report.accounting_extended.is_some());
    assert!(report.income_vs_cost.is_some());
    assert!(report.team_income.is_some());
}
