//! Core dispatch types: battery and grid parameters, run settings, window solutions.

use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::error::ConfigError;

/// Stationary battery and demand-side conversion parameters.
///
/// A capacity of 0 disables storage: SOC is pinned to 0 and no charging or
/// discharging is modelled.
#[derive(Debug, Clone, PartialEq)]
pub struct BatteryConfig {
    /// Usable capacity (kWh).
    pub capacity_kwh: f64,
    /// Maximum charge power measured after charge losses (kW).
    pub max_charge_kw: f64,
    /// Maximum discharge power drawn from the cells (kW).
    pub max_discharge_kw: f64,
    /// Grid-to-cell efficiency (0..1].
    pub charge_efficiency: f64,
    /// Cell-to-bus efficiency (0..1].
    pub discharge_efficiency: f64,
    /// Efficiency converting bus power into the metered demand (0..1].
    pub conversion_efficiency: f64,
    /// Lower SOC bound as a fraction of capacity.
    pub soc_min_fraction: f64,
    /// Upper SOC bound as a fraction of capacity.
    pub soc_max_fraction: f64,
    /// SOC at the start of the run (kWh).
    pub initial_soc_kwh: f64,
}

impl BatteryConfig {
    /// The reference installation: 860 kWh, 400 kW, 98 % efficiencies, half full.
    pub fn reference() -> Self {
        Self {
            capacity_kwh: 860.0,
            max_charge_kw: 400.0,
            max_discharge_kw: 400.0,
            charge_efficiency: 0.98,
            discharge_efficiency: 0.98,
            conversion_efficiency: 0.98,
            soc_min_fraction: 0.05,
            soc_max_fraction: 0.95,
            initial_soc_kwh: 430.0,
        }
    }

    /// A configuration without storage.
    pub fn without_storage(conversion_efficiency: f64) -> Self {
        Self {
            capacity_kwh: 0.0,
            max_charge_kw: 0.0,
            max_discharge_kw: 0.0,
            initial_soc_kwh: 0.0,
            conversion_efficiency,
            ..Self::reference()
        }
    }

    pub fn has_storage(&self) -> bool {
        self.capacity_kwh > 0.0
    }

    /// Lower SOC bound in kWh (0 without storage).
    pub fn soc_min_kwh(&self) -> f64 {
        if self.has_storage() {
            self.capacity_kwh * self.soc_min_fraction
        } else {
            0.0
        }
    }

    /// Upper SOC bound in kWh (0 without storage).
    pub fn soc_max_kwh(&self) -> f64 {
        if self.has_storage() {
            self.capacity_kwh * self.soc_max_fraction
        } else {
            0.0
        }
    }

    /// Tightest valid big-M for the charge/discharge exclusion rows.
    ///
    /// Pre-efficiency charge power never exceeds `max_charge / η_charge` and
    /// discharge never exceeds `max_discharge`, so the larger of the two bounds
    /// both rows. Never below 1 kW.
    pub fn big_m(&self) -> f64 {
        let charge = if self.charge_efficiency > 0.0 {
            self.max_charge_kw / self.charge_efficiency
        } else {
            self.max_charge_kw
        };
        charge.max(self.max_discharge_kw).max(1.0)
    }

    /// Checks physical bounds.
    ///
    /// # Errors
    ///
    /// Returns the first violated bound as a `ConfigError`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.problems().into_iter().next().map_or(Ok(()), Err)
    }

    /// All violated bounds, each tagged with its config field path.
    pub fn problems(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        if !(self.soc_min_fraction <= self.soc_max_fraction) {
            errors.push(ConfigError::new(
                "battery.soc_min_fraction",
                format!(
                    "must be <= battery.soc_max_fraction ({} > {})",
                    self.soc_min_fraction, self.soc_max_fraction
                ),
            ));
        }
        if !(0.0..=1.0).contains(&self.soc_min_fraction)
            || !(0.0..=1.0).contains(&self.soc_max_fraction)
        {
            errors.push(ConfigError::new(
                "battery.soc_max_fraction",
                "SOC fractions must be in [0.0, 1.0]",
            ));
        }
        if !(self.capacity_kwh >= 0.0) {
            errors.push(ConfigError::new("battery.capacity_kwh", "must be >= 0"));
        }
        if !(self.max_charge_kw >= 0.0) {
            errors.push(ConfigError::new("battery.max_charge_kw", "must be >= 0"));
        }
        if !(self.max_discharge_kw >= 0.0) {
            errors.push(ConfigError::new("battery.max_discharge_kw", "must be >= 0"));
        }
        for (field, eta) in [
            ("battery.charge_efficiency", self.charge_efficiency),
            ("battery.discharge_efficiency", self.discharge_efficiency),
            ("battery.conversion_efficiency", self.conversion_efficiency),
        ] {
            if !(eta > 0.0 && eta <= 1.0) {
                errors.push(ConfigError::new(field, "must be in (0.0, 1.0]"));
            }
        }
        if self.has_storage()
            && self.soc_min_fraction <= self.soc_max_fraction
            && !(self.soc_min_kwh()..=self.soc_max_kwh()).contains(&self.initial_soc_kwh)
        {
            errors.push(ConfigError::new(
                "battery.initial_soc_kwh",
                format!(
                    "must be within [{:.2}, {:.2}] kWh",
                    self.soc_min_kwh(),
                    self.soc_max_kwh()
                ),
            ));
        }
        errors
    }
}

/// Grid connection limits and the export price.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridLimits {
    /// Upper bound on buy power (kW); the contract-cap row sits below it.
    pub buy_cap_kw: f64,
    /// Upper bound on sell power (kW); 0 disallows reverse flow.
    pub sell_cap_kw: f64,
    /// Price paid for exported energy (currency/kWh).
    pub sell_price: f64,
}

impl GridLimits {
    /// Practically unlimited import, no reverse flow.
    pub fn no_export() -> Self {
        Self {
            buy_cap_kw: 1e6,
            sell_cap_kw: 0.0,
            sell_price: 0.0,
        }
    }

    /// Same limits with a different buy cap.
    pub fn with_buy_cap(self, buy_cap_kw: f64) -> Self {
        Self { buy_cap_kw, ..self }
    }

    /// Checks the limits are usable bounds.
    pub fn problems(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        if !(self.buy_cap_kw > 0.0) {
            errors.push(ConfigError::new("grid.buy_cap_kw", "must be > 0"));
        }
        if !(self.sell_cap_kw >= 0.0) {
            errors.push(ConfigError::new("grid.sell_cap_kw", "must be >= 0"));
        }
        if !self.sell_price.is_finite() {
            errors.push(ConfigError::new("grid.sell_price", "must be finite"));
        }
        errors
    }
}

/// Rolling-loop parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSettings {
    /// Look-ahead length `H` in steps.
    pub horizon: usize,
    /// Wall-clock budget per window solve.
    pub time_limit: Duration,
    /// Optional cap on the number of committed steps.
    pub max_steps: Option<usize>,
    /// Report progress every this many steps.
    pub progress_interval: usize,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            horizon: 96,
            time_limit: Duration::from_secs(10),
            max_steps: None,
            progress_interval: 100,
        }
    }
}

impl RunSettings {
    pub fn problems(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        if self.horizon == 0 {
            errors.push(ConfigError::new("run.horizon", "must be > 0"));
        }
        if self.time_limit.is_zero() {
            errors.push(ConfigError::new("run.time_limit_secs", "must be > 0"));
        }
        if self.progress_interval == 0 {
            errors.push(ConfigError::new("run.progress_interval", "must be > 0"));
        }
        errors
    }
}

/// How a committed step was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepStatus {
    /// The window solved on the first attempt.
    Optimal,
    /// The window solved after raising the buy bound to the peak demand.
    InfeasibleRelaxed,
    /// Both attempts were infeasible; a degenerate step was committed.
    InfeasibleFallback,
    /// The solve exhausted its time budget; a degenerate step was committed.
    TimelimitFallback,
}

impl StepStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Optimal => "optimal",
            Self::InfeasibleRelaxed => "infeasible-relaxed",
            Self::InfeasibleFallback => "infeasible-fallback",
            Self::TimelimitFallback => "timelimit-fallback",
        }
    }

    /// Whether the committed values are a placeholder rather than a solution.
    pub fn is_fallback(self) -> bool {
        matches!(self, Self::InfeasibleFallback | Self::TimelimitFallback)
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optimal values of one horizon model, one entry per window step.
#[derive(Debug, Clone, PartialEq)]
pub struct HorizonSolution {
    /// Grid purchase power `b_k` (kW).
    pub buy_kw: Vec<f64>,
    /// Grid export power `s_k` (kW).
    pub sell_kw: Vec<f64>,
    /// PV power used `g_k` (kW).
    pub pv_used_kw: Vec<f64>,
    /// Bus-side demand `d_k` (kW).
    pub converted_demand_kw: Vec<f64>,
    /// SOC after each step `f_k` (kWh).
    pub soc_kwh: Vec<f64>,
    /// Charge power drawn from the bus `c_k` (kW).
    pub charge_kw: Vec<f64>,
    /// Charge power reaching the cells `c'_k` (kW).
    pub charge_stored_kw: Vec<f64>,
    /// Discharge power leaving the cells `q_k` (kW).
    pub discharge_kw: Vec<f64>,
    /// Discharge power delivered to the bus `q'_k` (kW).
    pub discharge_delivered_kw: Vec<f64>,
    /// Contract-power proxy `B` for the window (kW).
    pub contract_kw: f64,
    /// Objective value (currency), excluding the PV tie-break.
    pub objective: f64,
    /// How the solution was obtained.
    pub status: StepStatus,
}

impl HorizonSolution {
    pub fn len(&self) -> usize {
        self.buy_kw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buy_kw.is_empty()
    }
}
