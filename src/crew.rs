//! Crew cost economics: the fixed monthly burn the runway ledger charges,
//! and per-consultant break-even figures.

use log::warn;
use serde::Serialize;

use crate::inputs::{CrewRole, CrewRow};

/// Vacation adjustment: 52 paid weeks over 44 worked ones.
const VACATION_FACTOR: f64 = 52.0 / 44.0;
/// Margin on top of break-even considered sustainable.
const SUSTAINABILITY_MARGIN: f64 = 1.1;

/// Total monthly compensation across the whole crew, the runway's fixed
/// burn.
pub fn monthly_cost_total(crew: &[CrewRow]) -> f64 {
    crew.iter().map(|member| member.monthly_cost).sum()
}

/// Monthly cost targets for one consultant: own vacation-adjusted cost,
/// the break-even point including a share of staff cost, and the
/// sustainable level with margin.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostShare {
    pub user: String,
    pub own_cost: f64,
    pub break_even: f64,
    pub sustainable: f64,
}

/// Spreads the (vacation-adjusted) cost of staff members evenly over the
/// consultants. Returns one row per consultant; empty when the crew has
/// no consultants.
pub fn cost_shares(crew: &[CrewRow]) -> Vec<CostShare> {
    let consultants: Vec<&CrewRow> = crew
        .iter()
        .filter(|member| member.role == CrewRole::Consultant)
        .collect();
    if consultants.is_empty() {
        return Vec::new();
    }

    let staff_cost: f64 = crew
        .iter()
        .filter(|member| member.role == CrewRole::Staff)
        .map(|member| member.monthly_cost * VACATION_FACTOR)
        .sum();
    let shared_staff_cost = staff_cost / consultants.len() as f64;

    consultants
        .into_iter()
        .map(|member| {
            let own_cost = member.monthly_cost * VACATION_FACTOR;
            let break_even = own_cost + shared_staff_cost;
            CostShare {
                user: member.user.clone(),
                own_cost,
                break_even,
                sustainable: break_even * SUSTAINABILITY_MARGIN,
            }
        })
        .collect()
}

/// Minimum hourly rates implied by the cost shares, assuming four
/// consulting weeks per month at the member's contracted weekly hours.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreakEvenRates {
    pub user: String,
    pub cost_rate: f64,
    pub break_even_rate: f64,
    pub sustainable_rate: f64,
}

pub fn break_even_rates(crew: &[CrewRow]) -> Vec<BreakEvenRates> {
    let shares = cost_shares(crew);
    shares
        .into_iter()
        .filter_map(|share| {
            let member = crew.iter().find(|member| member.user == share.user)?;
            if member.weekly_hours <= 0.0 {
                warn!(
                    "{} has no contracted consulting hours; skipping rate targets",
                    member.user
                );
                return None;
            }
            let monthly_hours = member.weekly_hours * 4.0;
            let to_rate = |monthly: f64| monthly * (12.0 / 52.0) / monthly_hours;
            Some(BreakEvenRates {
                user: share.user,
                cost_rate: to_rate(share.own_cost),
                break_even_rate: to_rate(share.break_even),
                sustainable_rate: to_rate(share.sustainable),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(user: &str, role: CrewRole, hours: f64, cost: f64) -> CrewRow {
        CrewRow {
            user: user.to_string(),
            role,
            weekly_hours: hours,
            monthly_cost: cost,
        }
    }

    #[test]
    fn test_monthly_cost_total() {
        let crew = vec![
            member("Ada", CrewRole::Consultant, 30.0, 8_000.0),
            member("Grace", CrewRole::Consultant, 30.0, 9_000.0),
            member("Ops", CrewRole::Staff, 0.0, 4_000.0),
        ];
        assert!((monthly_cost_total(&crew) - 21_000.0).abs() < 1e-9);
    }

    #[test]
    fn test_cost_shares_spread_staff_over_consultants() {
        let crew = vec![
            member("Ada", CrewRole::Consultant, 30.0, 8_800.0),
            member("Grace", CrewRole::Consultant, 30.0, 8_800.0),
            member("Ops", CrewRole::Staff, 0.0, 4_400.0),
        ];

        let shares = cost_shares(&crew);
        assert_eq!(shares.len(), 2);

        let ada = &shares[0];
        let own = 8_800.0 * 52.0 / 44.0;
        let staff_share = (4_400.0 * 52.0 / 44.0) / 2.0;
        assert!((ada.own_cost - own).abs() < 1e-6);
        assert!((ada.break_even - (own + staff_share)).abs() < 1e-6);
        assert!((ada.sustainable - (own + staff_share) * 1.1).abs() < 1e-6);
    }

    #[test]
    fn test_no_consultants_no_shares() {
        let crew = vec![member("Ops", CrewRole::Staff, 0.0, 4_000.0)];
        assert!(cost_shares(&crew).is_empty());
    }

    #[test]
    fn test_break_even_rates_skip_zero_hours() {
        let crew = vec![
            member("Ada", CrewRole::Consultant, 30.0, 8_800.0),
            member("Bench", CrewRole::Consultant, 0.0, 8_800.0),
        ];

        let rates = break_even_rates(&crew);
        assert_eq!(rates.len(), 1);
        assert_eq!(rates[0].user, "Ada");

        // own cost 8800 * 52/44 = 10400; x 12/52 / 120h = 20/h
        assert!((rates[0].cost_rate - 20.0).abs() < 1e-6);
        assert!(rates[0].break_even_rate >= rates[0].cost_rate);
        assert!(rates[0].sustainable_rate > rates[0].break_even_rate);
    }
}
