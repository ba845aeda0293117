//! Per-window MILP formulation.
//!
//! A [`HorizonModel`] is an unsolved `good_lp` problem for one look-ahead
//! window. It is built, handed to a [`HorizonSolver`](super::solver::HorizonSolver)
//! and dropped; nothing in it survives into the next window.

use good_lp::{Constraint, Expression, ProblemVariables, Solution, Variable, constraint, variable};

use crate::error::ConfigError;
use crate::forecast::{DT_HOURS, ForecastWindow};
use crate::tariff::RATCHET_FACTOR;

use super::types::{BatteryConfig, GridLimits, HorizonSolution, StepStatus};

/// Objective reward per kW of PV used. Breaks ties between PV and free battery
/// energy; excluded from the reported objective.
pub const PV_TIE_BREAK: f64 = 1e-6;

/// Objective penalty per kW exported, twice the PV reward so that exporting PV
/// at a zero sell price still costs more than leaving it unused. Excluded from
/// the reported objective.
pub const EXPORT_TIE_BREAK: f64 = 2.0 * PV_TIE_BREAK;

/// Values closer to zero than this are reported as exactly zero.
const CLEAN_EPS: f64 = 1e-9;

/// Share of the monthly demand charge attributed to one window.
///
/// `demand_rate · 0.85 · 12 · (H · 0.5 h) / (24 · 365 h)`
pub fn weighted_demand_rate(demand_rate_per_kw: f64, horizon: usize) -> f64 {
    demand_rate_per_kw * RATCHET_FACTOR * 12.0 * (horizon as f64 * DT_HOURS) / (24.0 * 365.0)
}

/// Everything one window solve depends on.
#[derive(Debug, Clone, Copy)]
pub struct HorizonInputs<'a> {
    pub window: ForecastWindow<'a>,
    pub battery: &'a BatteryConfig,
    pub grid: GridLimits,
    /// SOC entering the window's first step (kWh).
    pub start_soc_kwh: f64,
    pub demand_rate_per_kw: f64,
}

/// An unsolved horizon problem plus the handles needed to read its solution.
pub struct HorizonModel {
    vars: ProblemVariables,
    objective: Expression,
    constraints: Vec<Constraint>,
    layout: ModelLayout,
}

impl HorizonModel {
    /// Builds the window problem.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` for malformed battery or grid bounds, an empty
    /// window, slices of unequal length or a non-finite starting SOC. A model
    /// that passes these checks is always constructible.
    pub fn build(inputs: &HorizonInputs<'_>) -> Result<Self, ConfigError> {
        let HorizonInputs {
            window,
            battery,
            grid,
            start_soc_kwh,
            demand_rate_per_kw,
        } = *inputs;

        battery.validate()?;
        if let Some(err) = grid.problems().into_iter().next() {
            return Err(err);
        }
        let n = window.len();
        if n == 0 {
            return Err(ConfigError::new("run.horizon", "window has no steps"));
        }
        if window.pv_kw.len() != n || window.price.len() != n {
            return Err(ConfigError::new(
                "forecast",
                format!(
                    "window slices differ in length: {n} demand, {} pv, {} price",
                    window.pv_kw.len(),
                    window.price.len()
                ),
            ));
        }
        if !start_soc_kwh.is_finite() {
            return Err(ConfigError::new("battery.initial_soc_kwh", "must be finite"));
        }
        if !(demand_rate_per_kw >= 0.0) {
            return Err(ConfigError::new("tariff.demand_rate_per_kw", "must be >= 0"));
        }

        let storage = battery.has_storage();
        let (soc_min, soc_max) = (battery.soc_min_kwh(), battery.soc_max_kwh());
        let charge_max = if storage { battery.max_charge_kw } else { 0.0 };
        let discharge_max = if storage { battery.max_discharge_kw } else { 0.0 };

        let mut vars = ProblemVariables::new();
        let mut layout = ModelLayout {
            buy: Vec::with_capacity(n),
            sell: Vec::with_capacity(n),
            pv_used: Vec::with_capacity(n),
            converted_demand: Vec::with_capacity(n),
            soc: Vec::with_capacity(n),
            charge: Vec::with_capacity(n),
            charge_stored: Vec::with_capacity(n),
            discharge: Vec::with_capacity(n),
            discharge_delivered: Vec::with_capacity(n),
            contract: vars.add(variable().min(0.0)),
            storage,
            soc_bounds: (soc_min, soc_max),
            price: window.price.to_vec(),
            sell_price: grid.sell_price,
            weighted_demand_rate: weighted_demand_rate(demand_rate_per_kw, n),
        };

        for k in 0..n {
            layout.buy.push(vars.add(variable().min(0.0).max(grid.buy_cap_kw)));
            layout.sell.push(vars.add(variable().min(0.0).max(grid.sell_cap_kw)));
            layout.pv_used.push(vars.add(variable().min(0.0).max(window.pv_kw[k])));
            layout.converted_demand.push(vars.add(variable().min(0.0)));
            layout.soc.push(vars.add(variable().min(soc_min).max(soc_max)));
            layout.charge.push(vars.add(variable().min(0.0)));
            layout.charge_stored.push(vars.add(variable().min(0.0).max(charge_max)));
            layout.discharge.push(vars.add(variable().min(0.0).max(discharge_max)));
            layout.discharge_delivered.push(vars.add(variable().min(0.0)));
        }

        let mut constraints = Vec::with_capacity(n * 8);
        let conversion = battery.conversion_efficiency;
        let big_m = battery.big_m();
        let contract = layout.contract;

        for k in 0..n {
            let b = layout.buy[k];
            let s = layout.sell[k];
            let g = layout.pv_used[k];
            let d = layout.converted_demand[k];
            let f = layout.soc[k];
            let c = layout.charge[k];
            let cp = layout.charge_stored[k];
            let q = layout.discharge[k];
            let qp = layout.discharge_delivered[k];

            constraints.push(constraint!(g + b - s - c + qp == d));
            constraints.push(constraint!(conversion * d == window.demand_kw[k]));
            constraints.push(constraint!(b <= contract));
            constraints.push(constraint!(cp == battery.charge_efficiency * c));
            constraints.push(constraint!(qp == battery.discharge_efficiency * q));

            if !storage {
                continue;
            }
            if k == 0 {
                constraints.push(constraint!(f - DT_HOURS * cp + DT_HOURS * q == start_soc_kwh));
            } else {
                let prev = layout.soc[k - 1];
                constraints.push(constraint!(f - prev - DT_HOURS * cp + DT_HOURS * q == 0.0));
            }

            let z = vars.add(variable().binary());
            constraints.push(constraint!(c <= big_m * z));
            constraints.push(constraint!(q + big_m * z <= big_m));
        }

        let mut objective: Expression = layout.weighted_demand_rate * contract;
        for k in 0..n {
            objective += layout.price[k] * DT_HOURS * layout.buy[k];
            objective -= (layout.sell_price * DT_HOURS - EXPORT_TIE_BREAK) * layout.sell[k];
            objective -= PV_TIE_BREAK * layout.pv_used[k];
        }

        Ok(Self {
            vars,
            objective,
            constraints,
            layout,
        })
    }

    /// Number of steps in the window.
    pub fn len(&self) -> usize {
        self.layout.buy.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layout.buy.is_empty()
    }

    /// Demand-charge weight on the contract-power variable.
    pub fn weighted_demand_rate(&self) -> f64 {
        self.layout.weighted_demand_rate
    }

    pub fn constraint_count(&self) -> usize {
        self.constraints.len()
    }

    pub(crate) fn into_parts(self) -> (ProblemVariables, Expression, Vec<Constraint>, ModelLayout) {
        (self.vars, self.objective, self.constraints, self.layout)
    }
}

/// Variable handles and objective weights of a built model.
pub(crate) struct ModelLayout {
    buy: Vec<Variable>,
    sell: Vec<Variable>,
    pv_used: Vec<Variable>,
    converted_demand: Vec<Variable>,
    soc: Vec<Variable>,
    charge: Vec<Variable>,
    charge_stored: Vec<Variable>,
    discharge: Vec<Variable>,
    discharge_delivered: Vec<Variable>,
    contract: Variable,
    storage: bool,
    soc_bounds: (f64, f64),
    price: Vec<f64>,
    sell_price: f64,
    weighted_demand_rate: f64,
}

impl ModelLayout {
    /// Reads and cleans every variable, then prices the result.
    ///
    /// Solver noise below `1e-9` becomes exactly zero, non-negative quantities
    /// never come back negative and SOC stays inside its bounds (exactly 0
    /// without storage).
    pub(crate) fn extract(&self, solution: &impl Solution) -> HorizonSolution {
        let read = |vars: &[Variable]| -> Vec<f64> {
            vars.iter()
                .map(|v| non_negative(solution.value(*v)))
                .collect()
        };
        let (soc_min, soc_max) = self.soc_bounds;
        let soc = if self.storage {
            self.soc
                .iter()
                .map(|v| clean(solution.value(*v)).clamp(soc_min, soc_max))
                .collect()
        } else {
            vec![0.0; self.soc.len()]
        };

        let buy_kw = read(&self.buy);
        let sell_kw = read(&self.sell);
        let contract_kw = non_negative(solution.value(self.contract));

        let energy: f64 = buy_kw
            .iter()
            .zip(&sell_kw)
            .zip(&self.price)
            .map(|((b, s), p)| p * b * DT_HOURS - self.sell_price * s * DT_HOURS)
            .sum();

        HorizonSolution {
            pv_used_kw: read(&self.pv_used),
            converted_demand_kw: read(&self.converted_demand),
            soc_kwh: soc,
            charge_kw: read(&self.charge),
            charge_stored_kw: read(&self.charge_stored),
            discharge_kw: read(&self.discharge),
            discharge_delivered_kw: read(&self.discharge_delivered),
            objective: self.weighted_demand_rate * contract_kw + energy,
            buy_kw,
            sell_kw,
            contract_kw,
            status: StepStatus::Optimal,
        }
    }
}

fn clean(value: f64) -> f64 {
    if value.abs() < CLEAN_EPS { 0.0 } else { value }
}

fn non_negative(value: f64) -> f64 {
    clean(value).max(0.0)
}
