//! The committed dispatch record.

use chrono::NaiveDateTime;
use serde::Serialize;

use super::types::{BatteryConfig, StepStatus};

/// Absolute tolerance used when auditing committed rows.
pub const AUDIT_TOLERANCE: f64 = 1e-5;

/// One committed step: the first decision of its window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrajectoryRow {
    pub step: usize,
    pub timestamp: NaiveDateTime,
    /// Metered demand (kW).
    pub demand_kw: f64,
    /// Bus-side demand after conversion losses (kW).
    pub converted_demand_kw: f64,
    pub pv_available_kw: f64,
    pub pv_used_kw: f64,
    /// PV left unused, `max(0, available - used)` (kW).
    pub pv_surplus_kw: f64,
    pub buy_kw: f64,
    pub sell_kw: f64,
    /// Bus-side charge power (kW).
    pub charge_kw: f64,
    /// Charge power reaching the cells (kW).
    pub charge_stored_kw: f64,
    /// Discharge power leaving the cells (kW).
    pub discharge_kw: f64,
    /// Discharge power delivered to the bus (kW).
    pub discharge_delivered_kw: f64,
    /// SOC at the end of the step (kWh).
    pub soc_kwh: f64,
    /// Purchase price the optimizer saw (currency/kWh).
    pub price: f64,
    pub spot_price: f64,
    /// Length of the window this step was taken from.
    pub horizon: usize,
    /// Contract power of that window (kW).
    pub contract_kw: f64,
    pub status: StepStatus,
}

impl TrajectoryRow {
    /// Energy purchased during the step (kWh).
    pub fn energy_bought_kwh(&self) -> f64 {
        self.buy_kw * crate::forecast::DT_HOURS
    }

    /// `pv_used + buy - sell - charge + discharge·η - converted_demand`.
    pub fn balance_residual_kw(&self) -> f64 {
        self.pv_used_kw + self.buy_kw - self.sell_kw - self.charge_kw
            + self.discharge_delivered_kw
            - self.converted_demand_kw
    }
}

/// A committed row that breaks a dispatch invariant.
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    pub step: usize,
    pub kind: ViolationKind,
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationKind {
    SocOutOfBounds,
    SimultaneousChargeDischarge,
    BuyAboveContract,
    EnergyImbalance,
}

/// Append-only record of committed steps.
///
/// Rows can be read but never changed once pushed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Trajectory {
    rows: Vec<TrajectoryRow>,
}

impl Trajectory {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            rows: Vec::with_capacity(capacity),
        }
    }

    pub(crate) fn push(&mut self, row: TrajectoryRow) {
        self.rows.push(row);
    }

    pub fn rows(&self) -> &[TrajectoryRow] {
        &self.rows
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TrajectoryRow> {
        self.rows.iter()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn last(&self) -> Option<&TrajectoryRow> {
        self.rows.last()
    }

    /// Global indices of steps committed with a fallback status.
    pub fn fallback_steps(&self) -> Vec<usize> {
        self.rows
            .iter()
            .filter(|r| r.status.is_fallback())
            .map(|r| r.step)
            .collect()
    }

    /// Checks every committed row against the dispatch invariants.
    ///
    /// SOC bounds, charge/discharge exclusion and the contract cap apply to all
    /// rows; energy balance is only checked for non-fallback rows.
    pub fn audit(&self, battery: &BatteryConfig) -> Vec<Violation> {
        let (soc_min, soc_max) = (battery.soc_min_kwh(), battery.soc_max_kwh());
        let mut violations = Vec::new();
        for r in &self.rows {
            let mut flag = |kind, value| {
                violations.push(Violation {
                    step: r.step,
                    kind,
                    value,
                })
            };
            let soc_ok = if battery.has_storage() {
                r.soc_kwh >= soc_min - AUDIT_TOLERANCE && r.soc_kwh <= soc_max + AUDIT_TOLERANCE
            } else {
                r.soc_kwh == 0.0
            };
            if !soc_ok {
                flag(ViolationKind::SocOutOfBounds, r.soc_kwh);
            }
            if r.charge_kw > AUDIT_TOLERANCE && r.discharge_kw > AUDIT_TOLERANCE {
                flag(ViolationKind::SimultaneousChargeDischarge, r.charge_kw.min(r.discharge_kw));
            }
            if r.buy_kw > r.contract_kw + AUDIT_TOLERANCE {
                flag(ViolationKind::BuyAboveContract, r.buy_kw - r.contract_kw);
            }
            let residual = r.balance_residual_kw();
            if !r.status.is_fallback() && residual.abs() > AUDIT_TOLERANCE {
                flag(ViolationKind::EnergyImbalance, residual);
            }
        }
        violations
    }
}

impl<'a> IntoIterator for &'a Trajectory {
    type Item = &'a TrajectoryRow;
    type IntoIter = std::slice::Iter<'a, TrajectoryRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::NaiveDate;

    pub(crate) fn row(step: usize, buy_kw: f64, status: StepStatus) -> TrajectoryRow {
        let timestamp = NaiveDate::from_ymd_opt(2024, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap_or_default()
            + chrono::Duration::minutes(30 * step as i64);
        TrajectoryRow {
            step,
            timestamp,
            demand_kw: buy_kw,
            converted_demand_kw: buy_kw,
            pv_available_kw: 0.0,
            pv_used_kw: 0.0,
            pv_surplus_kw: 0.0,
            buy_kw,
            sell_kw: 0.0,
            charge_kw: 0.0,
            charge_stored_kw: 0.0,
            discharge_kw: 0.0,
            discharge_delivered_kw: 0.0,
            soc_kwh: 0.0,
            price: 10.0,
            spot_price: 10.0,
            horizon: 1,
            contract_kw: buy_kw,
            status,
        }
    }

    #[test]
    fn test_clean_rows_pass_audit() {
        let mut t = Trajectory::default();
        t.push(row(0, 50.0, StepStatus::Optimal));
        t.push(row(1, 60.0, StepStatus::InfeasibleRelaxed));
        assert!(t.audit(&BatteryConfig::without_storage(1.0)).is_empty());
    }

    #[test]
    fn test_audit_flags_each_broken_invariant() {
        let mut bad = row(0, 50.0, StepStatus::Optimal);
        bad.contract_kw = 40.0;
        bad.charge_kw = 5.0;
        bad.discharge_kw = 5.0;
        bad.soc_kwh = 1.0;
        let mut t = Trajectory::default();
        t.push(bad);
        let kinds: Vec<ViolationKind> = t
            .audit(&BatteryConfig::without_storage(1.0))
            .into_iter()
            .map(|v| v.kind)
            .collect();
        assert!(kinds.contains(&ViolationKind::SocOutOfBounds));
        assert!(kinds.contains(&ViolationKind::SimultaneousChargeDischarge));
        assert!(kinds.contains(&ViolationKind::BuyAboveContract));
        assert!(kinds.contains(&ViolationKind::EnergyImbalance));
    }

    #[test]
    fn test_fallback_rows_skip_balance_check() {
        let mut r = row(0, 0.0, StepStatus::InfeasibleFallback);
        r.converted_demand_kw = 100.0;
        let mut t = Trajectory::default();
        t.push(r);
        assert!(t.audit(&BatteryConfig::without_storage(1.0)).is_empty());
        assert_eq!(t.fallback_steps(), vec![0]);
    }
}
