//! Tariff plans and per-step purchase price resolution.
//!
//! Two plans are modelled: a flat energy rate with a monthly fuel adjustment,
//! and a wholesale-spot-linked rate. Both share the renewable levy and the
//! ratcheted demand charge billed on the annual peak buy power.

use std::fmt;

use chrono::{Datelike, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Share of the annual peak that the demand charge bills every month.
pub const RATCHET_FACTOR: f64 = 0.85;

/// Renewable energy levy (currency/kWh).
pub const RENEWABLE_LEVY_RATE: f64 = 3.98;

/// Monthly fuel-adjustment rates for 2024 (currency/kWh), January first.
pub const FUEL_ADJUSTMENT_2024: [f64; 12] = [
    -8.76, -8.59, -8.56, -8.85, -9.02, -7.47, -5.69, -5.69, -9.60, -9.47, -8.06, -5.83,
];

/// Published rate schedule the default energy and demand rates come from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub enum RateSchedule {
    /// Rates in force from April 2024.
    #[default]
    #[serde(rename = "2024")]
    Y2024,
    /// Rates in force from October 2025.
    #[serde(rename = "2025")]
    Y2025,
}

impl RateSchedule {
    /// Flat energy rate (currency/kWh).
    pub fn energy_rate(self) -> f64 {
        match self {
            Self::Y2024 => 21.51,
            Self::Y2025 => 21.62,
        }
    }

    /// Demand charge rate (currency/kW/month) before the ratchet factor.
    pub fn demand_rate_per_kw(self) -> f64 {
        match self {
            Self::Y2024 => 2829.60,
            Self::Y2025 => 2880.20,
        }
    }
}

/// Which tariff plan a figure refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanKind {
    Flat,
    Market,
}

impl PlanKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Flat => "flat",
            Self::Market => "market",
        }
    }
}

impl fmt::Display for PlanKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Flat-rate plan: one energy rate plus a per-month fuel adjustment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlatRates {
    pub energy_rate: f64,
    pub monthly_fuel_adjustment: [f64; 12],
    pub renewable_levy_rate: f64,
    pub demand_rate_per_kw: f64,
}

impl FlatRates {
    /// Fuel adjustment for a calendar month (1-12). Out-of-range months adjust by 0.
    pub fn fuel_adjustment(&self, month: u32) -> f64 {
        month
            .checked_sub(1)
            .and_then(|i| self.monthly_fuel_adjustment.get(i as usize))
            .copied()
            .unwrap_or(0.0)
    }

    /// All-in marginal purchase price for energy bought in `month`.
    pub fn purchase_price(&self, month: u32) -> f64 {
        self.energy_rate + self.fuel_adjustment(month) + self.renewable_levy_rate
    }
}

/// Spot-linked plan: the energy charge follows the wholesale series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketRates {
    pub renewable_levy_rate: f64,
    pub demand_rate_per_kw: f64,
}

impl MarketRates {
    pub fn purchase_price(&self, spot_price: f64) -> f64 {
        spot_price + self.renewable_levy_rate
    }
}

/// A tariff plan fixed for the whole run.
#[derive(Debug, Clone, PartialEq)]
pub enum TariffPlan {
    Flat(FlatRates),
    Market(MarketRates),
}

impl TariffPlan {
    pub fn kind(&self) -> PlanKind {
        match self {
            Self::Flat(_) => PlanKind::Flat,
            Self::Market(_) => PlanKind::Market,
        }
    }

    pub fn demand_rate_per_kw(&self) -> f64 {
        match self {
            Self::Flat(rates) => rates.demand_rate_per_kw,
            Self::Market(rates) => rates.demand_rate_per_kw,
        }
    }

    pub fn renewable_levy_rate(&self) -> f64 {
        match self {
            Self::Flat(rates) => rates.renewable_levy_rate,
            Self::Market(rates) => rates.renewable_levy_rate,
        }
    }

    /// Pairs the plan with the spot series it would be priced against.
    pub fn price_source<'a>(&'a self, spot_price: &'a [f64]) -> PriceSource<'a> {
        match self {
            Self::Flat(rates) => PriceSource::Flat(rates),
            Self::Market(rates) => PriceSource::Market {
                rates,
                spot_price,
            },
        }
    }
}

/// Where per-step purchase prices come from.
#[derive(Debug, Clone, Copy)]
pub enum PriceSource<'a> {
    Flat(&'a FlatRates),
    Market {
        rates: &'a MarketRates,
        spot_price: &'a [f64],
    },
}

impl PriceSource<'_> {
    /// Resolves one purchase price per timestamp.
    ///
    /// Flat prices use each step's own calendar month, so a window that
    /// crosses a month boundary sees both months' fuel adjustments. Pricing
    /// the whole window at the month of its first step would differ only for
    /// such windows. Market prices add the levy to the spot price at the same
    /// index. A spot series shorter than `timestamps` is padded with its last
    /// value.
    pub fn resolve(&self, timestamps: &[NaiveDateTime]) -> Vec<f64> {
        match *self {
            Self::Flat(rates) => timestamps
                .iter()
                .map(|ts| rates.purchase_price(ts.month()))
                .collect(),
            Self::Market { rates, spot_price } => {
                let last = spot_price.last().copied().unwrap_or(0.0);
                (0..timestamps.len())
                    .map(|i| rates.purchase_price(spot_price.get(i).copied().unwrap_or(last)))
                    .collect()
            }
        }
    }
}

/// Both plans, as needed by the cost comparison.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tariffs {
    pub flat: FlatRates,
    pub market: MarketRates,
}

impl Tariffs {
    /// Published 2024 or 2025 rates with the 2024 fuel-adjustment table.
    pub fn published(schedule: RateSchedule) -> Self {
        Self {
            flat: FlatRates {
                energy_rate: schedule.energy_rate(),
                monthly_fuel_adjustment: FUEL_ADJUSTMENT_2024,
                renewable_levy_rate: RENEWABLE_LEVY_RATE,
                demand_rate_per_kw: schedule.demand_rate_per_kw(),
            },
            market: MarketRates {
                renewable_levy_rate: RENEWABLE_LEVY_RATE,
                demand_rate_per_kw: schedule.demand_rate_per_kw(),
            },
        }
    }

    /// The plan that drives the optimizer.
    pub fn plan(&self, kind: PlanKind) -> TariffPlan {
        match kind {
            PlanKind::Flat => TariffPlan::Flat(self.flat.clone()),
            PlanKind::Market => TariffPlan::Market(self.market.clone()),
        }
    }
}
