use chrono::{Datelike, NaiveDateTime};

/// One tick of the rolling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    /// Global step index.
    pub step: usize,
    pub timestamp: NaiveDateTime,
    /// Calendar month (1-12) the step falls in.
    pub month: u32,
}

/// A step clock over the timestamps of a forecast series.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use pv_dispatch::sim::clock::StepClock;
///
/// let ts = [NaiveDate::from_ymd_opt(2024, 1, 31)
///     .and_then(|d| d.and_hms_opt(23, 30, 0))
///     .unwrap()];
/// let mut clock = StepClock::new(&ts, 5);
/// let tick = clock.tick().unwrap();
/// assert_eq!((tick.step, tick.month), (0, 1));
/// assert!(clock.tick().is_none());
/// ```
pub struct StepClock<'a> {
    /// Timestamps of the series being stepped through
    timestamps: &'a [NaiveDateTime],
    /// Next step to hand out
    current: usize,
    /// Steps to run (never more than there are timestamps)
    total: usize,
}

impl<'a> StepClock<'a> {
    /// Creates a clock that runs `total` steps, clipped to the series length.
    ///
    /// # Arguments
    ///
    /// * `timestamps` - Timestamps of the series
    /// * `total` - The requested number of steps
    pub fn new(timestamps: &'a [NaiveDateTime], total: usize) -> Self {
        Self {
            timestamps,
            current: 0,
            total: total.min(timestamps.len()),
        }
    }

    /// Advances the clock by one step.
    ///
    /// # Returns
    ///
    /// * `Some(tick)` - The step before advancing, with its timestamp and month
    /// * `None` - If the clock has reached its total steps
    pub fn tick(&mut self) -> Option<Tick> {
        if self.current >= self.total {
            return None;
        }
        let step = self.current;
        self.current += 1;
        let timestamp = self.timestamps[step];
        Some(Tick {
            step,
            timestamp,
            month: timestamp.month(),
        })
    }

    /// Steps this clock will run in total.
    pub fn total(&self) -> usize {
        self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn stamps(n: usize) -> Vec<NaiveDateTime> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 31)
            .and_then(|d| d.and_hms_opt(23, 0, 0))
            .unwrap_or_default();
        (0..n)
            .map(|i| start + Duration::minutes(30 * i as i64))
            .collect()
    }

    #[test]
    fn test_tick_reports_month_changes() {
        let ts = stamps(3);
        let mut clock = StepClock::new(&ts, 3);
        let months: Vec<u32> = std::iter::from_fn(|| clock.tick()).map(|t| t.month).collect();
        assert_eq!(months, vec![1, 1, 2]);
    }

    #[test]
    fn test_total_is_clipped_to_series() {
        let ts = stamps(2);
        let mut clock = StepClock::new(&ts, 10);
        assert_eq!(clock.total(), 2);
        assert_eq!(clock.tick().map(|t| t.step), Some(0));
        assert_eq!(clock.tick().map(|t| t.step), Some(1));
        assert_eq!(clock.tick(), None);
    }

    #[test]
    fn test_empty_clock() {
        let ts = stamps(4);
        let mut clock = StepClock::new(&ts, 0);
        assert_eq!(clock.tick(), None);
    }
}
