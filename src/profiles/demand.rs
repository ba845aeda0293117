use chrono::NaiveDateTime;
use rand::{SeedableRng, rngs::StdRng};

use super::{gaussian_noise, hour_of_day};

/// Site demand with a daily sinusoid peaking mid-afternoon and Gaussian noise.
///
/// # Examples
///
/// ```
/// use pv_dispatch::profiles::{DemandProfile, default_start};
///
/// let mut load = DemandProfile::new(350.0, 150.0, 0.0, 42);
/// let kw = load.demand_kw(&default_start());
/// assert!(kw >= 0.0);
/// ```
#[derive(Debug, Clone)]
pub struct DemandProfile {
    /// Mean demand in kilowatts
    pub base_kw: f64,

    /// Amplitude of the daily swing in kilowatts
    pub amp_kw: f64,

    /// Standard deviation of the Gaussian noise in kilowatts
    pub noise_std: f64,

    rng: StdRng,
}

impl DemandProfile {
    /// Hour of day at which the sinusoid peaks.
    const PEAK_HOUR: f64 = 15.0;

    /// Creates a new demand generator.
    ///
    /// # Arguments
    ///
    /// * `base_kw` - Mean demand in kilowatts
    /// * `amp_kw` - Amplitude of the daily swing in kilowatts
    /// * `noise_std` - Standard deviation of Gaussian noise in kilowatts
    /// * `seed` - Random seed for reproducible noise
    pub fn new(base_kw: f64, amp_kw: f64, noise_std: f64, seed: u64) -> Self {
        Self {
            base_kw: base_kw.max(0.0),
            amp_kw,
            noise_std: noise_std.max(0.0),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Demand at `ts`, never negative.
    pub fn demand_kw(&mut self, ts: &NaiveDateTime) -> f64 {
        let angle = 2.0 * std::f64::consts::PI * (hour_of_day(ts) - Self::PEAK_HOUR) / 24.0;
        let noise = gaussian_noise(&mut self.rng, self.noise_std);
        (self.base_kw + self.amp_kw * angle.cos() + noise).max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profiles::default_start;
    use chrono::Duration;

    #[test]
    fn test_peak_in_afternoon() {
        let mut load = DemandProfile::new(100.0, 50.0, 0.0, 1);
        let day = default_start();
        let afternoon = load.demand_kw(&(day + Duration::hours(15)));
        let night = load.demand_kw(&(day + Duration::hours(3)));
        assert!((afternoon - 150.0).abs() < 1e-9);
        assert!((night - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_never_negative() {
        let mut load = DemandProfile::new(10.0, 50.0, 5.0, 9);
        let day = default_start();
        for i in 0..48 {
            assert!(load.demand_kw(&(day + Duration::minutes(30 * i))) >= 0.0);
        }
    }

    #[test]
    fn test_negative_base_clamped() {
        let load = DemandProfile::new(-1.0, 0.0, -0.5, 1);
        assert_eq!(load.base_kw, 0.0);
        assert_eq!(load.noise_std, 0.0);
    }
}
