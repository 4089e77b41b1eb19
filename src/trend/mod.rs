//! Correlated linear trend corrections.
//!
//! A single [`QuantileDraw`] per module invocation is mapped through each
//! component's [`TrendDistribution`] to a per-sample rate, then multiplied
//! by elapsed years since the baseyear. Sharing the draw across components
//! (and across modules, via a shared seed) keeps per-sample trend ranks
//! consistent.

mod config;
mod distribution;
mod quantile;

use thiserror::Error;

use crate::series::SampleSeries;

pub use config::{component, FitParameters, ICE_SHEET_RATE_FLOOR};
pub use distribution::TrendDistribution;
pub use quantile::{QuantileDraw, DEFAULT_TREND_SEED};

/// Errors that can occur while building trend corrections.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TrendError {
    #[error("Invalid trend distribution: {0:?}")]
    InvalidDistribution(TrendDistribution),
    #[error("Trend rate is not finite at quantile {quantile} for {distribution:?}")]
    NonFiniteRate {
        quantile: f64,
        distribution: TrendDistribution,
    },
    #[error("No trend parameters for component '{0}'")]
    MissingComponent(String),
    #[error("Trend shape {trend_samples}x{trend_years} does not match series {series_samples}x{series_years}")]
    ShapeMismatch {
        trend_samples: usize,
        trend_years: usize,
        series_samples: usize,
        series_years: usize,
    },
}

/// Inverts `distribution` at every quantile of `draw`.
pub fn sample_rates(distribution: &TrendDistribution, draw: &QuantileDraw) -> Result<Vec<f64>, TrendError> {
    draw.values()
        .iter()
        .map(|&q| distribution.inverse_cdf(q))
        .collect()
}

/// Separable sample×year trend: `value(s, y) = rate[s] * elapsed[y]`.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearTrend {
    rates: Vec<f64>,
    elapsed: Vec<f64>,
}

impl LinearTrend {
    /// Trend growing linearly from zero at `baseyear`.
    pub fn from_rates(rates: Vec<f64>, years: &[i32], baseyear: i32) -> Self {
        let elapsed = years.iter().map(|&y| f64::from(y - baseyear)).collect();
        Self { rates, elapsed }
    }

    /// Trend frozen at its value after `elapsed_years`, repeated over `nyears`.
    pub fn constant(rates: Vec<f64>, elapsed_years: f64, nyears: usize) -> Self {
        Self {
            rates,
            elapsed: vec![elapsed_years; nyears],
        }
    }

    /// Draws rates for `distribution` and builds a baseyear-anchored trend.
    pub fn from_draw(
        distribution: &TrendDistribution,
        draw: &QuantileDraw,
        years: &[i32],
        baseyear: i32,
    ) -> Result<Self, TrendError> {
        Ok(Self::from_rates(sample_rates(distribution, draw)?, years, baseyear))
    }

    pub fn rates(&self) -> &[f64] {
        &self.rates
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rates.len(), self.elapsed.len())
    }

    pub fn value(&self, sample: usize, year: usize) -> f64 {
        self.rates[sample] * self.elapsed[year]
    }

    /// Returns this trend with every rate multiplied by `factor`.
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            rates: self.rates.iter().map(|r| r * factor).collect(),
            elapsed: self.elapsed.clone(),
        }
    }

    /// Adds the trend to `series`. Missing cells stay missing.
    pub fn apply(&self, series: &mut SampleSeries) -> Result<(), TrendError> {
        if self.shape() != series.shape() {
            return Err(TrendError::ShapeMismatch {
                trend_samples: self.rates.len(),
                trend_years: self.elapsed.len(),
                series_samples: series.nsamps(),
                series_years: series.nyears(),
            });
        }
        series.add_with(|s, y| self.value(s, y));
        Ok(())
    }
}
