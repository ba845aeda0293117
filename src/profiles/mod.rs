//! Seeded synthetic demand, PV and spot-price profiles.
//!
//! Used for demos and tests when no recorded series is supplied. Every
//! generator owns its own `StdRng`, so identical seeds give identical series.

pub mod demand;
pub mod price;
pub mod solar;

use chrono::{NaiveDate, NaiveDateTime};
use rand::{Rng, rngs::StdRng};

use crate::config::ProfileConfig;
use crate::error::SeriesError;
use crate::forecast::{ForecastSeries, STEPS_PER_DAY};

pub use demand::DemandProfile;
pub use price::SpotProfile;
pub use solar::SolarProfile;

/// Start of the default synthetic series: 2024-04-01 00:00.
pub fn default_start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 4, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

/// Gaussian noise via the Box-Muller transform.
///
/// # Arguments
///
/// * `rng` - Random number generator
/// * `std_dev` - Standard deviation of the noise
///
/// # Returns
///
/// Random value from a Gaussian distribution with mean 0 and the given standard deviation
pub fn gaussian_noise(rng: &mut StdRng, std_dev: f64) -> f64 {
    if std_dev <= 0.0 {
        return 0.0;
    }

    let u1: f64 = rng.random::<f64>().clamp(1e-9, 1.0);
    let u2: f64 = rng.random::<f64>();
    let z0 = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
    z0 * std_dev
}

/// Generates an aligned half-hourly series from the `[profiles]` section.
///
/// # Errors
///
/// Returns a `SeriesError` if the generated columns fail validation.
pub fn generate(config: &ProfileConfig) -> Result<ForecastSeries, SeriesError> {
    let steps = config.days * STEPS_PER_DAY;
    let mut demand = DemandProfile::new(
        config.base_demand_kw,
        config.demand_amp_kw,
        config.demand_noise_kw,
        config.seed,
    );
    let mut pv = SolarProfile::new(config.pv_peak_kw, config.pv_noise, config.seed.wrapping_add(1));
    let mut spot = SpotProfile::new(
        config.spot_base,
        config.spot_amp,
        config.spot_noise,
        config.seed.wrapping_add(2),
    );

    let timestamps: Vec<NaiveDateTime> = (0..steps)
        .map(|i| config.start + chrono::Duration::minutes(30 * i as i64))
        .collect();
    let demand_kw = timestamps.iter().map(|ts| demand.demand_kw(ts)).collect();
    let pv_kw = timestamps.iter().map(|ts| pv.pv_kw(ts)).collect();
    let spot_price = timestamps.iter().map(|ts| spot.price(ts)).collect();

    tracing::debug!(steps, seed = config.seed, "generated synthetic profiles");
    ForecastSeries::new(timestamps, demand_kw, pv_kw, spot_price)
}

/// Fractional hour of day, e.g. 13.5 for 13:30.
pub(crate) fn hour_of_day(ts: &NaiveDateTime) -> f64 {
    use chrono::Timelike;
    ts.hour() as f64 + ts.minute() as f64 / 60.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_gaussian_noise_zero_std() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(gaussian_noise(&mut rng, 0.0), 0.0);
        assert_eq!(gaussian_noise(&mut rng, -1.0), 0.0);
    }

    #[test]
    fn test_generate_is_deterministic() {
        let cfg = ProfileConfig {
            days: 2,
            ..ProfileConfig::default()
        };
        let a = generate(&cfg).expect("profiles should generate");
        let b = generate(&cfg).expect("profiles should generate");
        assert_eq!(a, b);
        assert_eq!(a.len(), 2 * STEPS_PER_DAY);
    }

    #[test]
    fn test_generate_changes_with_seed() {
        let cfg = ProfileConfig {
            days: 1,
            ..ProfileConfig::default()
        };
        let other = ProfileConfig { seed: 7, ..cfg.clone() };
        let a = generate(&cfg).expect("profiles should generate");
        let b = generate(&other).expect("profiles should generate");
        assert_ne!(a.demand_kw(), b.demand_kw());
    }

    #[test]
    fn test_hour_of_day() {
        let ts = default_start() + chrono::Duration::minutes(13 * 60 + 30);
        assert_eq!(hour_of_day(&ts), 13.5);
    }
}
