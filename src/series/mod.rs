//! Sample-space projection arrays.
//!
//! Provides the dense sample×year and region×sample×year containers that
//! every stage of the projection pipeline reads and writes. Cells are
//! explicit optional values so emulator coverage gaps stay visible.

mod sample;
mod region;

use thiserror::Error;

pub use sample::SampleSeries;
pub use region::RegionSeries;

/// Errors raised when combining arrays of incompatible shape.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SeriesError {
    #[error("Shape mismatch: {left_samples}x{left_years} vs {right_samples}x{right_years}")]
    ShapeMismatch {
        left_samples: usize,
        left_years: usize,
        right_samples: usize,
        right_years: usize,
    },
    #[error("Region set is empty")]
    NoRegions,
}
