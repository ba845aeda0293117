//! What to do when a window does not solve.
//!
//! | failure      | first attempt | relaxed attempt |
//! |--------------|---------------|-----------------|
//! | infeasible   | relax buy cap | fallback        |
//! | time limit   | fallback      | fallback        |
//! | anything else| abort         | abort           |

use crate::error::SolveError;

use super::model::{HorizonInputs, HorizonModel};
use super::solver::HorizonSolver;
use super::types::{HorizonSolution, StepStatus};

/// Which solve of a window failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    First,
    Relaxed,
}

/// The policy's answer to a failed solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// Raise the buy cap to the window's peak demand and solve again.
    Relax,
    /// Commit a degenerate step tagged with this status.
    Fallback(StepStatus),
    /// Stop the run; committed steps are kept.
    Abort,
}

/// Looks up the recovery action for a failure.
pub fn policy(error: &SolveError, attempt: Attempt) -> Recovery {
    match (error, attempt) {
        (SolveError::Infeasible, Attempt::First) => Recovery::Relax,
        (SolveError::Infeasible, Attempt::Relaxed) => {
            Recovery::Fallback(StepStatus::InfeasibleFallback)
        }
        (SolveError::TimeLimit(_), _) => Recovery::Fallback(StepStatus::TimelimitFallback),
        (SolveError::Unbounded | SolveError::InvalidModel(_) | SolveError::Solver(_), _) => {
            Recovery::Abort
        }
    }
}

/// Buy-power bound used by the relaxed attempt.
///
/// At least the window's peak forecast demand, and at least the peak converted
/// demand the balance row has to cover.
pub fn relaxed_buy_cap(inputs: &HorizonInputs<'_>) -> f64 {
    let peak = inputs.window.peak_demand_kw();
    let converted = peak / inputs.battery.conversion_efficiency;
    inputs.grid.buy_cap_kw.max(peak).max(converted)
}

/// Degenerate decision for a window that could not be solved.
///
/// Nothing is bought, sold, charged or discharged; PV is left unused and the
/// SOC stays where it was. The balance does not hold for these rows.
pub fn fallback_solution(inputs: &HorizonInputs<'_>, status: StepStatus) -> HorizonSolution {
    let n = inputs.window.len();
    let conversion = inputs.battery.conversion_efficiency;
    let soc = if inputs.battery.has_storage() {
        inputs.start_soc_kwh
    } else {
        0.0
    };
    HorizonSolution {
        buy_kw: vec![0.0; n],
        sell_kw: vec![0.0; n],
        pv_used_kw: vec![0.0; n],
        converted_demand_kw: inputs.window.demand_kw.iter().map(|d| d / conversion).collect(),
        soc_kwh: vec![soc; n],
        charge_kw: vec![0.0; n],
        charge_stored_kw: vec![0.0; n],
        discharge_kw: vec![0.0; n],
        discharge_delivered_kw: vec![0.0; n],
        contract_kw: 0.0,
        objective: 0.0,
        status,
    }
}

/// Solves one window, applying the recovery table.
///
/// # Errors
///
/// Returns the solver error when the table says to abort.
pub fn solve_window<S: HorizonSolver>(
    solver: &S,
    inputs: &HorizonInputs<'_>,
) -> Result<HorizonSolution, SolveError> {
    let first = HorizonModel::build(inputs).map_err(SolveError::from);
    let error = match first.and_then(|model| solver.solve(model)) {
        Ok(solution) => return Ok(solution),
        Err(error) => error,
    };

    match policy(&error, Attempt::First) {
        Recovery::Abort => return Err(error),
        Recovery::Fallback(status) => {
            tracing::warn!(step = inputs.window.start, %error, %status, "committing fallback step");
            return Ok(fallback_solution(inputs, status));
        }
        Recovery::Relax => {}
    }

    let buy_cap_kw = relaxed_buy_cap(inputs);
    tracing::warn!(
        step = inputs.window.start,
        from_kw = inputs.grid.buy_cap_kw,
        to_kw = buy_cap_kw,
        "window infeasible, relaxing buy cap"
    );
    let relaxed = HorizonInputs {
        grid: inputs.grid.with_buy_cap(buy_cap_kw),
        ..*inputs
    };
    let error = match HorizonModel::build(&relaxed)
        .map_err(SolveError::from)
        .and_then(|model| solver.solve(model))
    {
        Ok(solution) => {
            return Ok(HorizonSolution {
                status: StepStatus::InfeasibleRelaxed,
                ..solution
            });
        }
        Err(error) => error,
    };

    match policy(&error, Attempt::Relaxed) {
        Recovery::Fallback(status) => {
            tracing::warn!(step = inputs.window.start, %error, %status, "relaxed window failed, committing fallback step");
            Ok(fallback_solution(inputs, status))
        }
        Recovery::Relax | Recovery::Abort => Err(error),
    }
}
