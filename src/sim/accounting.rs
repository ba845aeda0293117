//! Post-hoc dual-tariff cost accounting from a committed trajectory.

use std::collections::BTreeMap;
use std::fmt;

use chrono::Datelike;
use serde::Serialize;

use crate::forecast::DT_HOURS;
use crate::tariff::{PlanKind, RATCHET_FACTOR, TariffPlan, Tariffs};

use super::trajectory::{Trajectory, TrajectoryRow};

/// A calendar month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Purchases in one calendar month.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyUsage {
    pub period: YearMonth,
    /// Purchased energy, `Σ buy · 0.5 h` (kWh).
    pub energy_kwh: f64,
    /// Highest buy power in the month (kW).
    pub peak_kw: f64,
    pub steps: usize,
}

/// Charges making up one bill.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CostBreakdown {
    pub demand_charge: f64,
    pub energy_charge: f64,
    /// Always 0 for the market plan.
    pub fuel_adjustment: f64,
    pub levy: f64,
    pub total: f64,
}

impl CostBreakdown {
    fn new(demand_charge: f64, energy_charge: f64, fuel_adjustment: f64, levy: f64) -> Self {
        Self {
            demand_charge,
            energy_charge,
            fuel_adjustment,
            levy,
            total: demand_charge + energy_charge + fuel_adjustment + levy,
        }
    }

    fn add(self, other: Self) -> Self {
        Self::new(
            self.demand_charge + other.demand_charge,
            self.energy_charge + other.energy_charge,
            self.fuel_adjustment + other.fuel_adjustment,
            self.levy + other.levy,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyCost {
    pub period: YearMonth,
    #[serde(flatten)]
    pub cost: CostBreakdown,
}

/// Bill of one plan over the accounted trajectory.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanCost {
    pub plan: PlanKind,
    pub monthly: Vec<MonthlyCost>,
    pub annual: CostBreakdown,
}

impl PlanCost {
    /// Prices a trajectory under one plan.
    ///
    /// # Arguments
    ///
    /// * `rows` - Committed steps
    /// * `plan` - Tariff plan to bill under
    /// * `annual_peak_kw` - Peak buy power over all `rows`
    ///
    /// # Returns
    ///
    /// One entry per calendar month present in `rows`, in calendar order.
    pub fn compute(rows: &[TrajectoryRow], plan: &TariffPlan, annual_peak_kw: f64) -> Self {
        let demand_charge = annual_peak_kw * plan.demand_rate_per_kw() * RATCHET_FACTOR;
        let levy_rate = plan.renewable_levy_rate();

        let mut months: BTreeMap<YearMonth, (f64, f64)> = BTreeMap::new();
        for r in rows {
            let entry = months.entry(period_of(r)).or_insert((0.0, 0.0));
            entry.0 += r.energy_bought_kwh();
            entry.1 += r.buy_kw * DT_HOURS * r.spot_price;
        }

        let monthly: Vec<MonthlyCost> = months
            .into_iter()
            .map(|(period, (energy_kwh, spot_cost))| {
                let cost = match plan {
                    TariffPlan::Flat(rates) => CostBreakdown::new(
                        demand_charge,
                        energy_kwh * rates.energy_rate,
                        energy_kwh * rates.fuel_adjustment(period.month),
                        energy_kwh * levy_rate,
                    ),
                    TariffPlan::Market(_) => {
                        CostBreakdown::new(demand_charge, spot_cost, 0.0, energy_kwh * levy_rate)
                    }
                };
                MonthlyCost { period, cost }
            })
            .collect();

        let annual = monthly
            .iter()
            .fold(CostBreakdown::default(), |acc, m| acc.add(m.cost));

        Self {
            plan: plan.kind(),
            monthly,
            annual,
        }
    }
}

/// Both plans priced against the same trajectory.
///
/// Computed post-hoc from the committed rows only, so the figures are
/// consistent with whatever was exported.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostComparison {
    pub flat: PlanCost,
    pub market: PlanCost,
    pub usage: Vec<MonthlyUsage>,
    /// Peak buy power over the whole trajectory (kW).
    pub annual_peak_kw: f64,
    /// Total purchased energy (kWh).
    pub annual_energy_kwh: f64,
    /// Rows committed as fallbacks; their zero purchases understate the bill.
    pub fallback_steps: usize,
}

impl CostComparison {
    /// Prices the trajectory under both plans.
    pub fn from_trajectory(trajectory: &Trajectory, tariffs: &Tariffs) -> Self {
        let rows = trajectory.rows();
        let usage = monthly_usage(rows);
        let annual_peak_kw = usage.iter().map(|u| u.peak_kw).fold(0.0, f64::max);
        let annual_energy_kwh = usage.iter().map(|u| u.energy_kwh).sum();

        Self {
            flat: PlanCost::compute(rows, &tariffs.plan(PlanKind::Flat), annual_peak_kw),
            market: PlanCost::compute(rows, &tariffs.plan(PlanKind::Market), annual_peak_kw),
            usage,
            annual_peak_kw,
            annual_energy_kwh,
            fallback_steps: trajectory.fallback_steps().len(),
        }
    }

    /// The plan with the lower annual total; the flat plan wins ties.
    pub fn cheaper(&self) -> PlanKind {
        if self.flat.annual.total <= self.market.annual.total {
            PlanKind::Flat
        } else {
            PlanKind::Market
        }
    }

    /// How much the cheaper plan saves over the other one.
    pub fn savings(&self) -> f64 {
        (self.flat.annual.total - self.market.annual.total).abs()
    }

    pub fn plan(&self, kind: PlanKind) -> &PlanCost {
        match kind {
            PlanKind::Flat => &self.flat,
            PlanKind::Market => &self.market,
        }
    }
}

/// Purchased energy and peak buy power per calendar month.
pub fn monthly_usage(rows: &[TrajectoryRow]) -> Vec<MonthlyUsage> {
    let mut months: BTreeMap<YearMonth, MonthlyUsage> = BTreeMap::new();
    for r in rows {
        let period = period_of(r);
        let usage = months.entry(period).or_insert(MonthlyUsage {
            period,
            energy_kwh: 0.0,
            peak_kw: 0.0,
            steps: 0,
        });
        usage.energy_kwh += r.energy_bought_kwh();
        usage.peak_kw = usage.peak_kw.max(r.buy_kw);
        usage.steps += 1;
    }
    months.into_values().collect()
}

fn period_of(row: &TrajectoryRow) -> YearMonth {
    YearMonth {
        year: row.timestamp.year(),
        month: row.timestamp.month(),
    }
}

impl fmt::Display for CostComparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Cost Comparison ---")?;
        writeln!(f, "Annual peak buy:       {:.2} kW", self.annual_peak_kw)?;
        writeln!(f, "Annual energy bought:  {:.2} kWh", self.annual_energy_kwh)?;
        for plan in [&self.flat, &self.market] {
            let a = &plan.annual;
            writeln!(
                f,
                "{:<7} demand {:>14.2}  energy {:>14.2}  fuel {:>12.2}  levy {:>12.2}  total {:>14.2}",
                plan.plan.as_str(),
                a.demand_charge,
                a.energy_charge,
                a.fuel_adjustment,
                a.levy,
                a.total
            )?;
        }
        if self.fallback_steps > 0 {
            writeln!(
                f,
                "Warning: {} fallback steps bought nothing; totals are understated",
                self.fallback_steps
            )?;
        }
        write!(
            f,
            "Cheaper plan:          {} (saves {:.2})",
            self.cheaper(),
            self.savings()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::trajectory::tests::row;
    use crate::sim::types::StepStatus;
    use crate::tariff::{FlatRates, MarketRates};

    fn tariffs() -> Tariffs {
        let mut fuel = [0.0; 12];
        fuel[0] = -2.0;
        Tariffs {
            flat: FlatRates {
                energy_rate: 10.0,
                monthly_fuel_adjustment: fuel,
                renewable_levy_rate: 1.0,
                demand_rate_per_kw: 100.0,
            },
            market: MarketRates {
                renewable_levy_rate: 1.0,
                demand_rate_per_kw: 100.0,
            },
        }
    }

    fn trajectory(buys: &[f64]) -> Trajectory {
        let mut t = Trajectory::default();
        for (i, &b) in buys.iter().enumerate() {
            t.push(row(i, b, StepStatus::Optimal));
        }
        t
    }

    #[test]
    fn test_monthly_energy_is_half_hour_sum() {
        let usage = monthly_usage(trajectory(&[10.0, 20.0, 30.0]).rows());
        assert_eq!(usage.len(), 1);
        assert!((usage[0].energy_kwh - 30.0).abs() < 1e-9);
        assert_eq!(usage[0].peak_kw, 30.0);
        assert_eq!(usage[0].steps, 3);
    }

    #[test]
    fn test_flat_plan_breakdown() {
        let report = CostComparison::from_trajectory(&trajectory(&[40.0, 60.0]), &tariffs());
        let a = report.flat.annual;
        // 50 kWh in January, peak 60 kW
        assert!((a.demand_charge - 60.0 * 100.0 * 0.85).abs() < 1e-9);
        assert!((a.energy_charge - 500.0).abs() < 1e-9);
        assert!((a.fuel_adjustment + 100.0).abs() < 1e-9);
        assert!((a.levy - 50.0).abs() < 1e-9);
        assert!((a.total - (5100.0 + 500.0 - 100.0 + 50.0)).abs() < 1e-9);
    }

    #[test]
    fn test_market_plan_uses_row_spot_price() {
        let report = CostComparison::from_trajectory(&trajectory(&[40.0, 60.0]), &tariffs());
        let a = report.market.annual;
        // row fixture spot price is 10
        assert!((a.energy_charge - 500.0).abs() < 1e-9);
        assert_eq!(a.fuel_adjustment, 0.0);
        assert!((a.levy - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_demand_charge_repeats_every_month() {
        let mut t = Trajectory::default();
        t.push(row(0, 80.0, StepStatus::Optimal));
        let mut feb = row(1, 10.0, StepStatus::Optimal);
        feb.timestamp += chrono::Duration::days(40);
        t.push(feb);
        let report = CostComparison::from_trajectory(&t, &tariffs());
        assert_eq!(report.flat.monthly.len(), 2);
        for m in &report.flat.monthly {
            assert!((m.cost.demand_charge - 80.0 * 100.0 * 0.85).abs() < 1e-9);
        }
        assert_eq!(report.usage[1].period, YearMonth { year: 2024, month: 2 });
    }

    #[test]
    fn test_cheaper_picks_lower_total() {
        let report = CostComparison::from_trajectory(&trajectory(&[40.0]), &tariffs());
        // flat: fuel adjustment of -2 makes it cheaper than market at spot 10
        assert_eq!(report.cheaper(), PlanKind::Flat);
        assert!(report.savings() > 0.0);
    }

    #[test]
    fn test_empty_trajectory_costs_nothing() {
        let report = CostComparison::from_trajectory(&Trajectory::default(), &tariffs());
        assert_eq!(report.flat.annual.total, 0.0);
        assert!(report.flat.monthly.is_empty());
        assert_eq!(report.annual_peak_kw, 0.0);
    }

    #[test]
    fn test_fallback_rows_are_counted() {
        let mut t = trajectory(&[10.0]);
        t.push(row(1, 0.0, StepStatus::TimelimitFallback));
        let report = CostComparison::from_trajectory(&t, &tariffs());
        assert_eq!(report.fallback_steps, 1);
        assert!(report.to_string().contains("fallback"));
    }
}
