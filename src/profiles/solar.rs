use chrono::{Datelike, NaiveDateTime};
use rand::{SeedableRng, rngs::StdRng};

use super::{gaussian_noise, hour_of_day};

/// PV availability with a seasonal day length and a half-sine daily shape.
///
/// Daylight runs from 12 − L/2 to 12 + L/2, where the day length `L` swings
/// between 9 h at the winter solstice and 15 h at the summer solstice. The
/// peak output scales with the same seasonal factor.
#[derive(Debug, Clone)]
pub struct SolarProfile {
    /// Output at solar noon on the longest day (kW).
    pub kw_peak: f64,

    /// Multiplicative noise standard deviation.
    pub noise_std: f64,

    rng: StdRng,
}

impl SolarProfile {
    pub fn new(kw_peak: f64, noise_std: f64, seed: u64) -> Self {
        Self {
            kw_peak: kw_peak.max(0.0),
            noise_std: noise_std.max(0.0),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Seasonal factor in [0, 1]: 1 at the summer solstice, 0 at the winter one.
    fn season(ts: &NaiveDateTime) -> f64 {
        let day = ts.ordinal() as f64;
        let angle = 2.0 * std::f64::consts::PI * (day - 172.0) / 365.0;
        0.5 * (1.0 + angle.cos())
    }

    /// Fraction of peak output from the daily shape alone (0 outside daylight).
    pub fn daylight_frac(ts: &NaiveDateTime) -> f64 {
        let length = 9.0 + 6.0 * Self::season(ts);
        let sunrise = 12.0 - length / 2.0;
        let x = (hour_of_day(ts) - sunrise) / length;
        if !(0.0..=1.0).contains(&x) {
            return 0.0;
        }
        (std::f64::consts::PI * x).sin().max(0.0)
    }

    /// PV available at `ts`, never negative.
    pub fn pv_kw(&mut self, ts: &NaiveDateTime) -> f64 {
        let frac = Self::daylight_frac(ts);
        if frac <= 0.0 {
            return 0.0;
        }
        let seasonal_peak = self.kw_peak * (0.5 + 0.5 * Self::season(ts));
        let noise_mult = 1.0 + gaussian_noise(&mut self.rng, self.noise_std);
        (seasonal_peak * frac * noise_mult).max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(month: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, month, 21)
            .and_then(|d| d.and_hms_opt(hour, 0, 0))
            .unwrap_or_default()
    }

    #[test]
    fn test_dark_at_midnight() {
        let mut pv = SolarProfile::new(100.0, 0.0, 1);
        assert_eq!(pv.pv_kw(&at(6, 0)), 0.0);
        assert_eq!(pv.pv_kw(&at(12, 23)), 0.0);
    }

    #[test]
    fn test_noon_peak_is_seasonal() {
        let mut pv = SolarProfile::new(100.0, 0.0, 1);
        let summer = pv.pv_kw(&at(6, 12));
        let winter = pv.pv_kw(&at(12, 12));
        assert!(summer > 99.0);
        assert!(winter > 0.0 && winter < summer);
    }

    #[test]
    fn test_longer_days_in_summer() {
        assert_eq!(SolarProfile::daylight_frac(&at(12, 7)), 0.0);
        assert!(SolarProfile::daylight_frac(&at(6, 7)) > 0.0);
    }
}
