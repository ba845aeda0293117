//! Rolling-horizon dispatch optimizer for a grid-tied PV and battery installation.

#[cfg(not(any(feature = "solver-microlp", feature = "solver-highs")))]
compile_error!("enable at least one solver backend: `solver-microlp` or `solver-highs`");

pub mod config;
pub mod error;
pub mod forecast;
/// CSV/JSON import and export.
pub mod io;
/// Seeded synthetic input profiles.
pub mod profiles;
/// Horizon model, solver, rolling controller and accounting.
pub mod sim;
pub mod tariff;
