//! Shared test fixtures for integration tests.
#![allow(dead_code)]

use std::cell::Cell;
use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime};
use pv_dispatch::error::SolveError;
use pv_dispatch::forecast::ForecastSeries;
use pv_dispatch::sim::model::HorizonModel;
use pv_dispatch::sim::{
    BatteryConfig, GridLimits, HorizonSolution, HorizonSolver, MilpSolver, RollingController,
    RunSettings,
};
use pv_dispatch::tariff::{FlatRates, MarketRates, PlanKind, TariffPlan, Tariffs};

/// 2024-01-01 00:00.
pub fn start() -> NaiveDateTime {
    at(2024, 1, 1, 0, 0)
}

pub fn at(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(hour, minute, 0))
        .expect("valid date")
}

/// Half-hourly series starting at [`start`].
pub fn series(demand: &[f64], pv: &[f64], spot: &[f64]) -> ForecastSeries {
    series_from(start(), demand, pv, spot)
}

pub fn series_from(
    from: NaiveDateTime,
    demand: &[f64],
    pv: &[f64],
    spot: &[f64],
) -> ForecastSeries {
    ForecastSeries::regular(from, demand.to_vec(), pv.to_vec(), spot.to_vec())
        .expect("fixture series should be valid")
}

/// Both plans with a flat energy rate of `price`, no fuel adjustment and no levy.
pub fn simple_tariffs(price: f64, demand_rate_per_kw: f64) -> Tariffs {
    Tariffs {
        flat: FlatRates {
            energy_rate: price,
            monthly_fuel_adjustment: [0.0; 12],
            renewable_levy_rate: 0.0,
            demand_rate_per_kw,
        },
        market: MarketRates {
            renewable_levy_rate: 0.0,
            demand_rate_per_kw,
        },
    }
}

pub fn flat_plan(price: f64, demand_rate_per_kw: f64) -> TariffPlan {
    simple_tariffs(price, demand_rate_per_kw).plan(PlanKind::Flat)
}

/// Run settings with the given horizon and a generous time budget.
pub fn settings(horizon: usize) -> RunSettings {
    RunSettings {
        horizon,
        time_limit: Duration::from_secs(30),
        max_steps: None,
        progress_interval: 100,
    }
}

/// Grid-only site with lossless demand conversion.
pub fn lossless_no_storage() -> BatteryConfig {
    BatteryConfig::without_storage(1.0)
}

pub fn controller(
    battery: BatteryConfig,
    grid: GridLimits,
    plan: TariffPlan,
    horizon: usize,
) -> RollingController<MilpSolver> {
    RollingController::new(battery, grid, plan, settings(horizon))
        .expect("fixture configuration should be valid")
}

/// Delegates to the MILP solver and counts calls.
pub struct CountingSolver<'a> {
    pub calls: &'a Cell<usize>,
    pub inner: MilpSolver,
}

impl<'a> CountingSolver<'a> {
    pub fn new(calls: &'a Cell<usize>) -> Self {
        Self {
            calls,
            inner: MilpSolver::new(Duration::from_secs(30)),
        }
    }
}

impl HorizonSolver for CountingSolver<'_> {
    fn solve(&self, model: HorizonModel) -> Result<HorizonSolution, SolveError> {
        self.calls.set(self.calls.get() + 1);
        self.inner.solve(model)
    }
}

/// Solves normally until call `fail_at`, which reports an internal solver failure.
pub struct FailingSolver {
    pub fail_at: usize,
    pub calls: Cell<usize>,
}

impl HorizonSolver for FailingSolver {
    fn solve(&self, model: HorizonModel) -> Result<HorizonSolution, SolveError> {
        let call = self.calls.get();
        self.calls.set(call + 1);
        if call == self.fail_at {
            return Err(SolveError::Solver("injected failure".into()));
        }
        MilpSolver::new(Duration::from_secs(30)).solve(model)
    }
}

/// Never finishes within its budget.
pub struct ExhaustedSolver;

impl HorizonSolver for ExhaustedSolver {
    fn solve(&self, _model: HorizonModel) -> Result<HorizonSolution, SolveError> {
        Err(SolveError::TimeLimit(Duration::from_millis(1)))
    }
}
