use chrono::{Datelike, NaiveDateTime, Weekday};
use rand::{SeedableRng, rngs::StdRng};

use super::{gaussian_noise, hour_of_day};

/// Wholesale spot price with morning and evening peaks and cheaper weekends.
#[derive(Debug, Clone)]
pub struct SpotProfile {
    /// Mean price (currency/kWh)
    pub base: f64,
    /// Height of the daily peaks (currency/kWh)
    pub amp: f64,
    pub noise_std: f64,
    rng: StdRng,
}

impl SpotProfile {
    const WEEKEND_DISCOUNT: f64 = 0.85;

    pub fn new(base: f64, amp: f64, noise_std: f64, seed: u64) -> Self {
        Self {
            base,
            amp,
            noise_std: noise_std.max(0.0),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Spot price at `ts`. Never below zero.
    pub fn price(&mut self, ts: &NaiveDateTime) -> f64 {
        let h = hour_of_day(ts);
        let bump = |centre: f64, width: f64| (-((h - centre) / width).powi(2)).exp();
        let shape = bump(8.0, 2.0) + bump(18.5, 2.5) - 0.5 * bump(3.0, 3.0);
        let weekday = match ts.weekday() {
            Weekday::Sat | Weekday::Sun => Self::WEEKEND_DISCOUNT,
            _ => 1.0,
        };
        let noise = gaussian_noise(&mut self.rng, self.noise_std);
        ((self.base + self.amp * shape) * weekday + noise).max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(day: u32, hour: u32) -> NaiveDateTime {
        // 2024-04-01 is a Monday
        NaiveDate::from_ymd_opt(2024, 4, day)
            .and_then(|d| d.and_hms_opt(hour, 0, 0))
            .unwrap_or_default()
    }

    #[test]
    fn test_evening_dearer_than_night() {
        let mut spot = SpotProfile::new(12.0, 5.0, 0.0, 3);
        assert!(spot.price(&at(1, 18)) > spot.price(&at(1, 3)));
    }

    #[test]
    fn test_weekend_discount() {
        let mut spot = SpotProfile::new(12.0, 5.0, 0.0, 3);
        let monday = spot.price(&at(1, 12));
        let saturday = spot.price(&at(6, 12));
        assert!((saturday - monday * 0.85).abs() < 1e-9);
    }
}
