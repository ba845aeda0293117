//! Aligned half-hourly input series and the look-ahead windows sliced from them.
//!
//! Forecasts are perfect information: the window for global step `t` is simply
//! the recorded series over `[t, t + H)`, clipped at the end of the data.

use chrono::{Duration, NaiveDateTime};

use crate::error::SeriesError;

/// Duration of one timestep in hours.
pub const DT_HOURS: f64 = 0.5;

/// Number of timesteps per day.
pub const STEPS_PER_DAY: usize = 48;

/// Demand, PV availability and spot price on a shared half-hour grid.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastSeries {
    timestamps: Vec<NaiveDateTime>,
    demand_kw: Vec<f64>,
    pv_kw: Vec<f64>,
    spot_price: Vec<f64>,
}

impl ForecastSeries {
    /// Builds a series from pre-aligned columns.
    ///
    /// # Errors
    ///
    /// Returns `SeriesError::Misaligned` if the columns differ in length, and
    /// `SeriesError::Row` for non-finite values or negative demand/PV.
    pub fn new(
        timestamps: Vec<NaiveDateTime>,
        demand_kw: Vec<f64>,
        pv_kw: Vec<f64>,
        spot_price: Vec<f64>,
    ) -> Result<Self, SeriesError> {
        let n = timestamps.len();
        if demand_kw.len() != n || pv_kw.len() != n || spot_price.len() != n {
            return Err(SeriesError::Misaligned(format!(
                "{n} timestamps, {} demand, {} pv, {} spot values",
                demand_kw.len(),
                pv_kw.len(),
                spot_price.len()
            )));
        }
        for i in 0..n {
            if !(demand_kw[i].is_finite() && pv_kw[i].is_finite() && spot_price[i].is_finite()) {
                return Err(SeriesError::Row {
                    row: i,
                    message: "non-finite value".into(),
                });
            }
            if demand_kw[i] < 0.0 || pv_kw[i] < 0.0 {
                return Err(SeriesError::Row {
                    row: i,
                    message: "demand and pv must be >= 0".into(),
                });
            }
        }
        if timestamps.windows(2).any(|w| w[1] <= w[0]) {
            return Err(SeriesError::Misaligned(
                "timestamps must be strictly increasing".into(),
            ));
        }
        Ok(Self {
            timestamps,
            demand_kw,
            pv_kw,
            spot_price,
        })
    }

    /// Builds a series on a regular half-hour grid starting at `start`.
    ///
    /// # Errors
    ///
    /// Same as [`ForecastSeries::new`].
    pub fn regular(
        start: NaiveDateTime,
        demand_kw: Vec<f64>,
        pv_kw: Vec<f64>,
        spot_price: Vec<f64>,
    ) -> Result<Self, SeriesError> {
        let step = Duration::minutes(30);
        let timestamps = (0..demand_kw.len())
            .map(|i| start + step * i as i32)
            .collect();
        Self::new(timestamps, demand_kw, pv_kw, spot_price)
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn timestamps(&self) -> &[NaiveDateTime] {
        &self.timestamps
    }

    pub fn demand_kw(&self) -> &[f64] {
        &self.demand_kw
    }

    pub fn pv_kw(&self) -> &[f64] {
        &self.pv_kw
    }

    pub fn spot_price(&self) -> &[f64] {
        &self.spot_price
    }

    /// Restricts the series to `[start, end]` (both inclusive, both optional).
    ///
    /// # Errors
    ///
    /// Returns `SeriesError::EmptyPeriod` if nothing falls inside the period.
    pub fn period(
        &self,
        start: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
    ) -> Result<Self, SeriesError> {
        let keep: Vec<usize> = self
            .timestamps
            .iter()
            .enumerate()
            .filter(|(_, ts)| start.is_none_or(|s| **ts >= s) && end.is_none_or(|e| **ts <= e))
            .map(|(i, _)| i)
            .collect();
        if keep.is_empty() {
            return Err(SeriesError::EmptyPeriod);
        }
        Ok(Self {
            timestamps: keep.iter().map(|&i| self.timestamps[i]).collect(),
            demand_kw: keep.iter().map(|&i| self.demand_kw[i]).collect(),
            pv_kw: keep.iter().map(|&i| self.pv_kw[i]).collect(),
            spot_price: keep.iter().map(|&i| self.spot_price[i]).collect(),
        })
    }

    /// Keeps only the first `n` steps.
    pub fn truncated(&self, n: usize) -> Self {
        let n = n.min(self.len());
        Self {
            timestamps: self.timestamps[..n].to_vec(),
            demand_kw: self.demand_kw[..n].to_vec(),
            pv_kw: self.pv_kw[..n].to_vec(),
            spot_price: self.spot_price[..n].to_vec(),
        }
    }
}

/// The look-ahead slice seen by one horizon solve.
#[derive(Debug, Clone, Copy)]
pub struct ForecastWindow<'a> {
    /// Global index of the window's first step.
    pub start: usize,
    pub demand_kw: &'a [f64],
    pub pv_kw: &'a [f64],
    /// Purchase price per step (currency/kWh).
    pub price: &'a [f64],
}

impl<'a> ForecastWindow<'a> {
    /// Slices `[start, start + horizon)` out of the series and the resolved
    /// prices, shrinking the window near the tail instead of failing.
    ///
    /// `prices` must be aligned with `series`.
    pub fn clip(
        series: &'a ForecastSeries,
        prices: &'a [f64],
        start: usize,
        horizon: usize,
    ) -> Self {
        let n = series.len().min(prices.len());
        let start = start.min(n);
        let end = start.saturating_add(horizon).min(n);
        Self {
            start,
            demand_kw: &series.demand_kw[start..end],
            pv_kw: &series.pv_kw[start..end],
            price: &prices[start..end],
        }
    }

    /// Number of steps in the window.
    pub fn len(&self) -> usize {
        self.demand_kw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.demand_kw.is_empty()
    }

    /// Highest forecast demand inside the window (kW).
    pub fn peak_demand_kw(&self) -> f64 {
        self.demand_kw.iter().copied().fold(0.0, f64::max)
    }
}
