//! Solver seam: turns a [`HorizonModel`] into a [`HorizonSolution`].

use std::time::Duration;

use good_lp::{Constraint, ResolutionError, SolverModel};

use crate::error::SolveError;

use super::model::{HorizonModel, ModelLayout};
use super::types::HorizonSolution;

/// Anything that can solve one horizon problem.
///
/// The rolling controller is generic over this trait so that tests can count
/// calls or inject failures without a real backend.
pub trait HorizonSolver {
    /// Solves the model, returning the extracted values or the failure kind.
    fn solve(&self, model: HorizonModel) -> Result<HorizonSolution, SolveError>;
}

/// MILP solver backed by `good_lp`.
///
/// With the `solver-highs` feature the time budget is handed to HiGHS. With
/// the pure-Rust `microlp` backend the solve runs on a worker thread and the
/// caller waits at most `time_limit`; a worker that overruns is detached and
/// its result dropped.
///
/// On that backend the budget bounds how long the controller waits, not the
/// CPU the solve uses: a detached worker runs to completion in the background,
/// so a run with many slow windows can have several of them alive at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MilpSolver {
    pub time_limit: Duration,
}

impl MilpSolver {
    pub fn new(time_limit: Duration) -> Self {
        Self { time_limit }
    }
}

impl Default for MilpSolver {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

#[cfg(feature = "solver-highs")]
impl HorizonSolver for MilpSolver {
    fn solve(&self, model: HorizonModel) -> Result<HorizonSolution, SolveError> {
        use good_lp::solvers::highs::highs;

        let (vars, objective, constraints, layout) = model.into_parts();
        let problem = vars
            .minimise(objective)
            .using(highs)
            .set_time_limit(self.time_limit.as_secs_f64());
        solve_model(problem, constraints, &layout)
    }
}

#[cfg(all(feature = "solver-microlp", not(feature = "solver-highs")))]
impl HorizonSolver for MilpSolver {
    fn solve(&self, model: HorizonModel) -> Result<HorizonSolution, SolveError> {
        use std::sync::mpsc::{self, RecvTimeoutError};
        use std::thread;

        use good_lp::solvers::microlp::microlp;

        let (tx, rx) = mpsc::channel();
        thread::Builder::new()
            .name("horizon-solve".into())
            .spawn(move || {
                let (vars, objective, constraints, layout) = model.into_parts();
                let problem = vars.minimise(objective).using(microlp);
                // The receiver is gone once the budget expired; nothing to report.
                let _ = tx.send(solve_model(problem, constraints, &layout));
            })
            .map_err(|e| SolveError::Solver(format!("cannot start solver thread: {e}")))?;

        match rx.recv_timeout(self.time_limit) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                tracing::debug!(budget = ?self.time_limit, "solver thread detached after timeout");
                Err(SolveError::TimeLimit(self.time_limit))
            }
            Err(RecvTimeoutError::Disconnected) => Err(SolveError::Solver(
                "solver thread terminated without a result".into(),
            )),
        }
    }
}

fn solve_model<M>(
    mut problem: M,
    constraints: Vec<Constraint>,
    layout: &ModelLayout,
) -> Result<HorizonSolution, SolveError>
where
    M: SolverModel<Error = ResolutionError>,
{
    for c in constraints {
        problem.add_constraint(c);
    }
    let solution = problem.solve()?;
    Ok(layout.extract(&solution))
}
