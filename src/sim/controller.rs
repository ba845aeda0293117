//! Receding-horizon control loop.

use std::ops::ControlFlow;

use crate::error::{ConfigError, RunError, SolveError};
use crate::forecast::{ForecastSeries, ForecastWindow};
use crate::tariff::TariffPlan;

use super::clock::{StepClock, Tick};
use super::model::HorizonInputs;
use super::recovery::solve_window;
use super::solver::{HorizonSolver, MilpSolver};
use super::trajectory::{Trajectory, TrajectoryRow};
use super::types::{BatteryConfig, GridLimits, HorizonSolution, RunSettings};

/// How a run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Termination {
    /// Every requested step was committed.
    Completed,
    /// The observer asked to stop after the step before `at_step`.
    Cancelled { at_step: usize },
    /// The solve for `at_step` failed in a way the recovery table cannot absorb.
    Aborted { at_step: usize, error: SolveError },
}

/// Result of a rolling run. The trajectory is kept whatever the termination.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub trajectory: Trajectory,
    pub requested_steps: usize,
    pub termination: Termination,
}

impl RunOutcome {
    pub fn completed_steps(&self) -> usize {
        self.trajectory.len()
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.termination, Termination::Completed)
    }

    /// Global indices of steps committed with a fallback status.
    pub fn fallback_steps(&self) -> Vec<usize> {
        self.trajectory.fallback_steps()
    }
}

/// Rolling-horizon controller.
///
/// Generic over `S: HorizonSolver` for static dispatch. Battery, grid and tariff
/// are fixed for the run; only the starting SOC rolls forward.
#[derive(Debug, Clone)]
pub struct RollingController<S: HorizonSolver = MilpSolver> {
    battery: BatteryConfig,
    grid: GridLimits,
    plan: TariffPlan,
    settings: RunSettings,
    solver: S,
}

impl RollingController<MilpSolver> {
    /// Creates a controller backed by the MILP solver with the run's time budget.
    ///
    /// # Errors
    ///
    /// Returns `RunError::Configuration` listing every invalid field.
    pub fn new(
        battery: BatteryConfig,
        grid: GridLimits,
        plan: TariffPlan,
        settings: RunSettings,
    ) -> Result<Self, RunError> {
        let solver = MilpSolver::new(settings.time_limit);
        Self::with_solver(battery, grid, plan, settings, solver)
    }
}

impl<S: HorizonSolver> RollingController<S> {
    /// Creates a controller with a caller-supplied solver.
    ///
    /// # Errors
    ///
    /// Returns `RunError::Configuration` listing every invalid field. No solve is
    /// attempted for a rejected configuration.
    pub fn with_solver(
        battery: BatteryConfig,
        grid: GridLimits,
        plan: TariffPlan,
        settings: RunSettings,
        solver: S,
    ) -> Result<Self, RunError> {
        let mut errors = battery.problems();
        errors.extend(grid.problems());
        errors.extend(settings.problems());
        errors.extend(plan_problems(&plan));
        if !errors.is_empty() {
            return Err(RunError::Configuration(errors));
        }
        Ok(Self {
            battery,
            grid,
            plan,
            settings,
            solver,
        })
    }

    pub fn battery(&self) -> &BatteryConfig {
        &self.battery
    }

    pub fn plan(&self) -> &TariffPlan {
        &self.plan
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    pub fn solver(&self) -> &S {
        &self.solver
    }

    /// Runs every step of the series (up to `max_steps`).
    ///
    /// # Errors
    ///
    /// Returns `RunError::EmptySeries` for a series without steps. Solver
    /// failures do not produce an error; they end the run early and are
    /// reported in [`RunOutcome::termination`].
    pub fn run(&self, series: &ForecastSeries) -> Result<RunOutcome, RunError> {
        self.run_with(series, |_| ControlFlow::Continue(()))
    }

    /// Runs the loop, calling `observer` after each committed step.
    ///
    /// Returning `ControlFlow::Break` stops the run before the next window is
    /// built; the rows committed so far are returned.
    ///
    /// # Errors
    ///
    /// Same as [`RollingController::run`].
    pub fn run_with(
        &self,
        series: &ForecastSeries,
        mut observer: impl FnMut(&TrajectoryRow) -> ControlFlow<()>,
    ) -> Result<RunOutcome, RunError> {
        if series.is_empty() {
            return Err(RunError::EmptySeries);
        }
        let requested = self
            .settings
            .max_steps
            .map_or(series.len(), |m| m.min(series.len()));
        let prices = self
            .plan
            .price_source(series.spot_price())
            .resolve(series.timestamps());

        tracing::info!(
            steps = requested,
            horizon = self.settings.horizon,
            plan = %self.plan.kind(),
            "starting rolling dispatch"
        );

        let mut clock = StepClock::new(series.timestamps(), requested);
        let mut trajectory = Trajectory::with_capacity(requested);
        let mut soc_kwh = if self.battery.has_storage() {
            self.battery.initial_soc_kwh
        } else {
            0.0
        };
        let mut month = None;

        while let Some(tick) = clock.tick() {
            if month != Some(tick.month) {
                tracing::debug!(step = tick.step, month = tick.month, "entering month");
                month = Some(tick.month);
            }

            let window = ForecastWindow::clip(series, &prices, tick.step, self.settings.horizon);
            let inputs = HorizonInputs {
                window,
                battery: &self.battery,
                grid: self.grid,
                start_soc_kwh: soc_kwh,
                demand_rate_per_kw: self.plan.demand_rate_per_kw(),
            };

            let solution = match solve_window(&self.solver, &inputs) {
                Ok(solution) => solution,
                Err(error) => {
                    tracing::error!(step = tick.step, %error, committed = trajectory.len(), "aborting run");
                    return Ok(RunOutcome {
                        trajectory,
                        requested_steps: requested,
                        termination: Termination::Aborted {
                            at_step: tick.step,
                            error,
                        },
                    });
                }
            };
            tracing::debug!(
                step = tick.step,
                horizon = window.len(),
                objective = solution.objective,
                status = %solution.status,
                "window solved"
            );

            let row = commit_row(series, &prices, &tick, &window, &solution);
            let stop = observer(&row).is_break();
            soc_kwh = row.soc_kwh;
            trajectory.push(row);

            let done = tick.step + 1;
            if done % self.settings.progress_interval == 0 {
                tracing::info!(
                    step = done,
                    total = requested,
                    soc_kwh,
                    fallbacks = trajectory.fallback_steps().len(),
                    "progress"
                );
            }

            if stop && done < requested {
                tracing::info!(at_step = done, "run cancelled");
                return Ok(RunOutcome {
                    trajectory,
                    requested_steps: requested,
                    termination: Termination::Cancelled { at_step: done },
                });
            }
        }

        let fallbacks = trajectory.fallback_steps();
        tracing::info!(
            completed = trajectory.len(),
            requested,
            fallbacks = fallbacks.len(),
            "rolling dispatch finished"
        );
        Ok(RunOutcome {
            trajectory,
            requested_steps: requested,
            termination: Termination::Completed,
        })
    }
}

/// Turns the first step of a window solution into a trajectory row.
fn commit_row(
    series: &ForecastSeries,
    prices: &[f64],
    tick: &Tick,
    window: &ForecastWindow<'_>,
    solution: &HorizonSolution,
) -> TrajectoryRow {
    let t = tick.step;
    let first = |values: &[f64]| values.first().copied().unwrap_or(0.0);
    let pv_available_kw = series.pv_kw()[t];
    let pv_used_kw = first(&solution.pv_used_kw);
    TrajectoryRow {
        step: t,
        timestamp: tick.timestamp,
        demand_kw: series.demand_kw()[t],
        converted_demand_kw: first(&solution.converted_demand_kw),
        pv_available_kw,
        pv_used_kw,
        pv_surplus_kw: (pv_available_kw - pv_used_kw).max(0.0),
        buy_kw: first(&solution.buy_kw),
        sell_kw: first(&solution.sell_kw),
        charge_kw: first(&solution.charge_kw),
        charge_stored_kw: first(&solution.charge_stored_kw),
        discharge_kw: first(&solution.discharge_kw),
        discharge_delivered_kw: first(&solution.discharge_delivered_kw),
        soc_kwh: first(&solution.soc_kwh),
        price: prices[t],
        spot_price: series.spot_price()[t],
        horizon: window.len(),
        contract_kw: solution.contract_kw,
        status: solution.status,
    }
}

fn plan_problems(plan: &TariffPlan) -> Vec<ConfigError> {
    let mut errors = Vec::new();
    if !(plan.demand_rate_per_kw() >= 0.0) {
        errors.push(ConfigError::new("tariff.demand_rate_per_kw", "must be >= 0"));
    }
    if !plan.renewable_levy_rate().is_finite() {
        errors.push(ConfigError::new("tariff.renewable_levy_rate", "must be finite"));
    }
    if let TariffPlan::Flat(rates) = plan {
        if !rates.energy_rate.is_finite() {
            errors.push(ConfigError::new("tariff.energy_rate", "must be finite"));
        }
        if rates.monthly_fuel_adjustment.iter().any(|v| !v.is_finite()) {
            errors.push(ConfigError::new("tariff.fuel_adjustment", "must be finite"));
        }
    }
    errors
}
