//! Regional aggregation and trend redistribution.
//!
//! Ice sheets sum their sub-regions; glaciers apportion a population-level
//! trend across regions before summing.

mod glaciers;
mod ice_sheet;

use thiserror::Error;

use crate::series::SeriesError;
use crate::trend::TrendError;

pub use glaciers::{
    melt_ratios, redistribute_trend, region_melt, BaselineWindow, GlacierRedistribution,
    BASELINE_WINDOW_YEARS,
};
pub use ice_sheet::{apply_ice_sheet_trends, IceSheetComponents};

/// Errors that can occur during aggregation.
#[derive(Error, Debug)]
pub enum AggregateError {
    #[error(transparent)]
    Series(#[from] SeriesError),
    #[error(transparent)]
    Trend(#[from] TrendError),
    #[error("Expected {expected} regions, found {found}")]
    RegionCount { expected: usize, found: usize },
    #[error("No target years")]
    NoYears,
    #[error("Region {region} has no observed samples at a baseline window boundary")]
    UnobservedBaseline { region: usize },
    #[error("Total baseline melt is {total}; melt shares are undefined")]
    UndefinedMeltShare { total: f64 },
}
