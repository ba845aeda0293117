//! Error taxonomy shared by the model builder, the solver wrapper and the rolling run.

use std::time::Duration;

use thiserror::Error;

/// Configuration error with field path and constraint description.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("config error: {field}: {message}")]
pub struct ConfigError {
    /// Dotted field path (e.g., `"battery.soc_min_fraction"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl ConfigError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Failure of a single horizon solve.
///
/// Every variant is resolved by the recovery policy in [`crate::sim::recovery`];
/// none of them escapes the rolling loop as a panic.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SolveError {
    #[error("horizon model is infeasible")]
    Infeasible,
    #[error("horizon model is unbounded")]
    Unbounded,
    #[error("no solution within the {0:?} time budget")]
    TimeLimit(Duration),
    #[error("horizon model rejected: {0}")]
    InvalidModel(#[from] ConfigError),
    #[error("solver failure: {0}")]
    Solver(String),
}

impl From<good_lp::ResolutionError> for SolveError {
    fn from(err: good_lp::ResolutionError) -> Self {
        match err {
            good_lp::ResolutionError::Infeasible => Self::Infeasible,
            good_lp::ResolutionError::Unbounded => Self::Unbounded,
            other => Self::Solver(other.to_string()),
        }
    }
}

/// Problems with the aligned input series.
#[derive(Debug, Error)]
pub enum SeriesError {
    #[error("cannot read series: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed series CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("row {row}: {message}")]
    Row { row: usize, message: String },
    #[error("series columns are misaligned: {0}")]
    Misaligned(String),
    #[error("no data in requested period")]
    EmptyPeriod,
}

/// Errors that reject a rolling run before its first step.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("invalid configuration: {}", render_config_errors(.0))]
    Configuration(Vec<ConfigError>),
    #[error("forecast series is empty")]
    EmptySeries,
}

impl From<ConfigError> for RunError {
    fn from(err: ConfigError) -> Self {
        Self::Configuration(vec![err])
    }
}

fn render_config_errors(errors: &[ConfigError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_errors_map_to_solve_errors() {
        assert_eq!(
            SolveError::from(good_lp::ResolutionError::Infeasible),
            SolveError::Infeasible
        );
        assert_eq!(
            SolveError::from(good_lp::ResolutionError::Unbounded),
            SolveError::Unbounded
        );
        assert!(matches!(
            SolveError::from(good_lp::ResolutionError::Str("boom".into())),
            SolveError::Solver(_)
        ));
    }

    #[test]
    fn test_configuration_error_lists_every_field() {
        let err = RunError::Configuration(vec![
            ConfigError::new("battery.capacity_kwh", "must be >= 0"),
            ConfigError::new("run.horizon", "must be > 0"),
        ]);
        let text = err.to_string();
        assert!(text.contains("battery.capacity_kwh"));
        assert!(text.contains("run.horizon"));
    }
}
