/// Dual-tariff cost accounting.
pub mod accounting;
/// Step clock over the forecast timestamps.
pub mod clock;
pub mod controller;
pub mod model;
/// Infeasibility and time-limit recovery table.
pub mod recovery;
pub mod solver;
pub mod trajectory;
pub mod types;

pub use accounting::{CostComparison, PlanCost};
pub use controller::{RollingController, RunOutcome, Termination};
pub use solver::{HorizonSolver, MilpSolver};
pub use trajectory::{Trajectory, TrajectoryRow};
pub use types::{BatteryConfig, GridLimits, HorizonSolution, RunSettings, StepStatus};
