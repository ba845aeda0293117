//! TOML-based dispatch configuration and preset definitions.

use std::fs;
use std::path::Path;
use std::time::Duration;

use chrono::NaiveDateTime;
use serde::Deserialize;

pub use crate::error::ConfigError;
use crate::sim::types::{BatteryConfig, GridLimits, RunSettings};
use crate::tariff::{
    FUEL_ADJUSTMENT_2024, FlatRates, MarketRates, PlanKind, RENEWABLE_LEVY_RATE, RateSchedule,
    TariffPlan, Tariffs,
};

/// Top-level configuration parsed from TOML.
///
/// All fields have defaults matching the reference installation. Load from
/// TOML with [`ScenarioConfig::from_toml_file`] or use
/// [`ScenarioConfig::baseline`] for the built-in default.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioConfig {
    /// Rolling loop parameters.
    #[serde(default)]
    pub run: RunConfig,
    /// Battery and demand conversion parameters.
    #[serde(default)]
    pub battery: StorageConfig,
    /// Grid connection limits.
    #[serde(default)]
    pub grid: GridConfig,
    /// Tariff rates.
    #[serde(default)]
    pub tariff: TariffConfig,
    /// Synthetic profile generator, used when no series file is given.
    #[serde(default)]
    pub profiles: ProfileConfig,
}

/// Rolling loop parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// Look-ahead horizon in half-hour steps (must be > 0).
    pub horizon: usize,
    /// Wall-clock budget per window solve (seconds).
    pub time_limit_secs: f64,
    /// Stop after this many steps.
    pub max_steps: Option<usize>,
    /// Log progress every this many steps.
    pub progress_interval: usize,
    /// Plan whose prices drive the optimizer: `"flat"` or `"market"`.
    pub plan: PlanKind,
    /// First timestamp to dispatch, e.g. `"2024-04-01T00:00:00"`.
    pub start: Option<NaiveDateTime>,
    /// Last timestamp to dispatch (inclusive).
    pub end: Option<NaiveDateTime>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            horizon: 96,
            time_limit_secs: 10.0,
            max_steps: None,
            progress_interval: 100,
            plan: PlanKind::Flat,
            start: None,
            end: None,
        }
    }
}

/// Battery and demand conversion parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    /// Usable capacity (kWh, 0 disables storage).
    pub capacity_kwh: f64,
    /// Maximum charging power (kW).
    pub max_charge_kw: f64,
    /// Maximum discharging power (kW).
    pub max_discharge_kw: f64,
    /// Charge efficiency (0.0, 1.0].
    pub charge_efficiency: f64,
    /// Discharge efficiency (0.0, 1.0].
    pub discharge_efficiency: f64,
    /// Bus-to-load conversion efficiency (0.0, 1.0].
    pub conversion_efficiency: f64,
    /// Lower SOC bound as a fraction of capacity.
    pub soc_min_fraction: f64,
    /// Upper SOC bound as a fraction of capacity.
    pub soc_max_fraction: f64,
    /// Initial SOC (kWh). Defaults to half the capacity.
    pub initial_soc_kwh: Option<f64>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            capacity_kwh: 860.0,
            max_charge_kw: 400.0,
            max_discharge_kw: 400.0,
            charge_efficiency: 0.98,
            discharge_efficiency: 0.98,
            conversion_efficiency: 0.98,
            soc_min_fraction: 0.05,
            soc_max_fraction: 0.95,
            initial_soc_kwh: None,
        }
    }
}

/// Grid connection limits.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GridConfig {
    /// Export price (currency/kWh).
    pub sell_price: f64,
    /// Maximum export power (kW, 0 disallows reverse flow).
    pub sell_cap_kw: f64,
    /// Maximum import power (kW).
    pub buy_cap_kw: f64,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            sell_price: 0.0,
            sell_cap_kw: 0.0,
            buy_cap_kw: 1e6,
        }
    }
}

/// Tariff rates. Unset rates come from the selected rate schedule.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TariffConfig {
    /// Published schedule: `"2024"` or `"2025"`.
    pub rate_year: RateSchedule,
    /// Flat energy rate (currency/kWh).
    pub energy_rate: Option<f64>,
    /// Demand charge rate (currency/kW/month).
    pub demand_rate_per_kw: Option<f64>,
    /// Fuel adjustment per calendar month, January first (currency/kWh).
    pub fuel_adjustment: [f64; 12],
    /// Renewable levy (currency/kWh).
    pub renewable_levy_rate: f64,
}

impl Default for TariffConfig {
    fn default() -> Self {
        Self {
            rate_year: RateSchedule::Y2024,
            energy_rate: None,
            demand_rate_per_kw: None,
            fuel_adjustment: FUEL_ADJUSTMENT_2024,
            renewable_levy_rate: RENEWABLE_LEVY_RATE,
        }
    }
}

/// Synthetic profile generator parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProfileConfig {
    /// Master random seed.
    pub seed: u64,
    /// First timestamp of the generated series.
    pub start: NaiveDateTime,
    /// Number of days to generate (must be > 0).
    pub days: usize,
    /// Mean demand (kW).
    pub base_demand_kw: f64,
    /// Daily demand swing (kW).
    pub demand_amp_kw: f64,
    /// Demand noise standard deviation (kW).
    pub demand_noise_kw: f64,
    /// PV peak at solar noon in midsummer (kW).
    pub pv_peak_kw: f64,
    /// Multiplicative PV noise standard deviation.
    pub pv_noise: f64,
    /// Mean spot price (currency/kWh).
    pub spot_base: f64,
    /// Daily spot swing (currency/kWh).
    pub spot_amp: f64,
    /// Spot noise standard deviation (currency/kWh).
    pub spot_noise: f64,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            start: crate::profiles::default_start(),
            days: 7,
            base_demand_kw: 350.0,
            demand_amp_kw: 150.0,
            demand_noise_kw: 15.0,
            pv_peak_kw: 250.0,
            pv_noise: 0.1,
            spot_base: 12.0,
            spot_amp: 5.0,
            spot_noise: 1.0,
        }
    }
}

impl ScenarioConfig {
    /// Returns the baseline scenario: the 860 kWh / 400 kW installation on the flat plan.
    pub fn baseline() -> Self {
        Self::default()
    }

    /// Returns the no-storage preset: the same site without a battery.
    pub fn no_storage() -> Self {
        Self {
            battery: StorageConfig {
                capacity_kwh: 0.0,
                max_charge_kw: 0.0,
                max_discharge_kw: 0.0,
                ..StorageConfig::default()
            },
            ..Self::default()
        }
    }

    /// Returns the market preset: the optimizer follows the spot-linked plan.
    pub fn market() -> Self {
        Self {
            run: RunConfig {
                plan: PlanKind::Market,
                ..RunConfig::default()
            },
            ..Self::default()
        }
    }

    /// Available preset names.
    pub const PRESETS: &[&str] = &["baseline", "no_storage", "market"];

    /// Loads a scenario from a named preset.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the preset name is unknown.
    pub fn from_preset(name: &str) -> Result<Self, ConfigError> {
        match name {
            "baseline" => Ok(Self::baseline()),
            "no_storage" => Ok(Self::no_storage()),
            "market" => Ok(Self::market()),
            _ => Err(ConfigError::new(
                "preset",
                format!(
                    "unknown preset \"{name}\", available: {}",
                    Self::PRESETS.join(", ")
                ),
            )),
        }
    }

    /// Parses a scenario from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| {
            ConfigError::new("scenario", format!("cannot read \"{}\": {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a scenario from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::new("toml", e.to_string()))
    }

    /// The battery described by the `[battery]` section.
    pub fn battery(&self) -> BatteryConfig {
        let b = &self.battery;
        BatteryConfig {
            capacity_kwh: b.capacity_kwh,
            max_charge_kw: b.max_charge_kw,
            max_discharge_kw: b.max_discharge_kw,
            charge_efficiency: b.charge_efficiency,
            discharge_efficiency: b.discharge_efficiency,
            conversion_efficiency: b.conversion_efficiency,
            soc_min_fraction: b.soc_min_fraction,
            soc_max_fraction: b.soc_max_fraction,
            initial_soc_kwh: b.initial_soc_kwh.unwrap_or(b.capacity_kwh / 2.0),
        }
    }

    pub fn grid(&self) -> GridLimits {
        GridLimits {
            buy_cap_kw: self.grid.buy_cap_kw,
            sell_cap_kw: self.grid.sell_cap_kw,
            sell_price: self.grid.sell_price,
        }
    }

    /// Both tariff plans, with overrides applied on top of the rate schedule.
    pub fn tariffs(&self) -> Tariffs {
        let t = &self.tariff;
        let demand_rate_per_kw = t
            .demand_rate_per_kw
            .unwrap_or_else(|| t.rate_year.demand_rate_per_kw());
        Tariffs {
            flat: FlatRates {
                energy_rate: t.energy_rate.unwrap_or_else(|| t.rate_year.energy_rate()),
                monthly_fuel_adjustment: t.fuel_adjustment,
                renewable_levy_rate: t.renewable_levy_rate,
                demand_rate_per_kw,
            },
            market: MarketRates {
                renewable_levy_rate: t.renewable_levy_rate,
                demand_rate_per_kw,
            },
        }
    }

    /// The plan that drives the optimizer.
    pub fn plan(&self) -> TariffPlan {
        self.tariffs().plan(self.run.plan)
    }

    pub fn run_settings(&self) -> RunSettings {
        RunSettings {
            horizon: self.run.horizon,
            time_limit: Duration::try_from_secs_f64(self.run.time_limit_secs)
                .unwrap_or(Duration::ZERO),
            max_steps: self.run.max_steps,
            progress_interval: self.run.progress_interval,
        }
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if configuration is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        let r = &self.run;

        if r.horizon == 0 {
            errors.push(ConfigError::new("run.horizon", "must be > 0"));
        }
        if !(r.time_limit_secs > 0.0 && r.time_limit_secs.is_finite()) {
            errors.push(ConfigError::new("run.time_limit_secs", "must be > 0"));
        }
        if r.max_steps == Some(0) {
            errors.push(ConfigError::new("run.max_steps", "must be > 0 when set"));
        }
        if r.progress_interval == 0 {
            errors.push(ConfigError::new("run.progress_interval", "must be > 0"));
        }
        if let (Some(start), Some(end)) = (r.start, r.end) {
            if start > end {
                errors.push(ConfigError::new("run.start", "must be <= run.end"));
            }
        }

        errors.extend(self.battery().problems());
        errors.extend(self.grid().problems());

        let t = &self.tariff;
        if t.energy_rate.is_some_and(|v| !v.is_finite()) {
            errors.push(ConfigError::new("tariff.energy_rate", "must be finite"));
        }
        if t.demand_rate_per_kw.is_some_and(|v| !(v >= 0.0)) {
            errors.push(ConfigError::new("tariff.demand_rate_per_kw", "must be >= 0"));
        }
        if t.fuel_adjustment.iter().any(|v| !v.is_finite()) {
            errors.push(ConfigError::new("tariff.fuel_adjustment", "must be finite"));
        }
        if !t.renewable_levy_rate.is_finite() {
            errors.push(ConfigError::new("tariff.renewable_levy_rate", "must be finite"));
        }

        let p = &self.profiles;
        if p.days == 0 {
            errors.push(ConfigError::new("profiles.days", "must be > 0"));
        }
        if p.base_demand_kw < 0.0 || p.pv_peak_kw < 0.0 {
            errors.push(ConfigError::new(
                "profiles.base_demand_kw",
                "demand and pv levels must be >= 0",
            ));
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_baseline_preset_valid() {
        let cfg = ScenarioConfig::baseline();
        let errors = cfg.validate();
        assert!(errors.is_empty(), "baseline should be valid: {errors:?}");
    }

    #[test]
    fn test_baseline_matches_reference_installation() {
        let battery = ScenarioConfig::baseline().battery();
        assert_eq!(battery, BatteryConfig::reference());
    }

    #[test]
    fn test_from_preset_unknown() {
        let err = ScenarioConfig::from_preset("nonexistent");
        assert!(err.is_err_and(|e| e.message.contains("unknown preset")));
    }

    #[test]
    fn test_all_presets_are_valid() {
        for name in ScenarioConfig::PRESETS {
            let cfg = ScenarioConfig::from_preset(name);
            assert!(cfg.is_ok(), "preset \"{name}\" should load");
            let errors = cfg.as_ref().map(|c| c.validate()).unwrap_or_default();
            assert!(
                errors.is_empty(),
                "preset \"{name}\" should be valid: {errors:?}"
            );
        }
    }

    #[test]
    fn test_no_storage_has_zero_capacity() {
        let battery = ScenarioConfig::no_storage().battery();
        assert!(!battery.has_storage());
        assert_eq!(battery.initial_soc_kwh, 0.0);
    }

    #[test]
    fn test_valid_toml_parses() {
        let toml = r#"
[run]
horizon = 48
time_limit_secs = 2.5
max_steps = 100
plan = "market"
start = "2024-04-01T00:00:00"

[battery]
capacity_kwh = 500.0
max_charge_kw = 250.0
max_discharge_kw = 250.0
initial_soc_kwh = 100.0

[grid]
sell_price = 7.0
sell_cap_kw = 50.0

[tariff]
rate_year = "2025"
renewable_levy_rate = 3.49
"#;
        let cfg = ScenarioConfig::from_toml_str(toml);
        assert!(cfg.is_ok(), "valid TOML should parse: {:?}", cfg.err());
        let cfg = cfg.ok();
        assert_eq!(cfg.as_ref().map(|c| c.run.horizon), Some(48));
        assert_eq!(cfg.as_ref().map(|c| c.run.plan), Some(PlanKind::Market));
        assert_eq!(
            cfg.as_ref().map(|c| c.tariffs().flat.energy_rate),
            Some(21.62)
        );
        assert_eq!(
            cfg.as_ref().map(|c| c.run_settings().time_limit),
            Some(Duration::from_millis(2500))
        );
        assert!(cfg.is_some_and(|c| c.validate().is_empty()));
    }

    #[test]
    fn test_invalid_toml_unknown_field() {
        let toml = r#"
[battery]
capacity_kwh = 100.0
bogus_field = true
"#;
        assert!(ScenarioConfig::from_toml_str(toml).is_err());
    }

    #[test]
    fn test_rate_overrides_win_over_schedule() {
        let toml = r#"
[tariff]
energy_rate = 18.0
demand_rate_per_kw = 1000.0
"#;
        let tariffs = ScenarioConfig::from_toml_str(toml).map(|c| c.tariffs());
        assert!(tariffs.as_ref().is_ok_and(|t| t.flat.energy_rate == 18.0));
        assert!(tariffs.is_ok_and(|t| t.market.demand_rate_per_kw == 1000.0));
    }

    #[test]
    fn test_validation_catches_inverted_soc_bounds() {
        let mut cfg = ScenarioConfig::baseline();
        cfg.battery.soc_min_fraction = 0.9;
        cfg.battery.soc_max_fraction = 0.1;
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "battery.soc_min_fraction"));
    }

    #[test]
    fn test_validation_catches_zero_horizon_and_bad_budget() {
        let mut cfg = ScenarioConfig::baseline();
        cfg.run.horizon = 0;
        cfg.run.time_limit_secs = -1.0;
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "run.horizon"));
        assert!(errors.iter().any(|e| e.field == "run.time_limit_secs"));
    }

    #[test]
    fn test_validation_catches_inverted_period() {
        let toml = r#"
[run]
start = "2024-05-01T00:00:00"
end = "2024-04-01T00:00:00"
"#;
        let errors = ScenarioConfig::from_toml_str(toml)
            .map(|c| c.validate())
            .unwrap_or_default();
        assert!(errors.iter().any(|e| e.field == "run.start"));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let toml = r#"
[grid]
buy_cap_kw = 800.0
"#;
        let cfg = ScenarioConfig::from_toml_str(toml).ok();
        assert_eq!(cfg.as_ref().map(|c| c.grid().buy_cap_kw), Some(800.0));
        // battery kept default
        assert_eq!(cfg.as_ref().map(|c| c.battery.capacity_kwh), Some(860.0));
        assert_eq!(cfg.as_ref().map(|c| c.run.horizon), Some(96));
    }
}
