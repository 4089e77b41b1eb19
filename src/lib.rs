//! Probabilistic sea-level projections from ice-sheet and glacier emulator output.
//!
//! This crate turns the per-sample, per-year output of an external emulator
//! into trend-corrected global projections and localizes them to point
//! sites, writing both in a gridded NetCDF4 layout.

pub mod series;
pub mod extract;
pub mod trend;
pub mod aggregate;
pub mod localize;
pub mod export;
pub mod bundle;
pub mod config;
pub mod emulator;
pub mod project;
pub mod postprocess;
pub mod pipeline;

pub use series::{RegionSeries, SampleSeries};
pub use extract::{GlacierRegion, IceSheetRegion, IceSource};
pub use trend::{FitParameters, LinearTrend, QuantileDraw, TrendDistribution, DEFAULT_TREND_SEED};
pub use localize::{FingerprintGrid, FingerprintSource, LocalChunk, LocalSeries, Site};
pub use export::{GriddedProjection, ProjectionMetadata};
pub use bundle::ProjectionBundle;
pub use config::ModuleConfig;
pub use emulator::{EmulatorRunner, ExistingOutput, RscriptEmulator};
pub use pipeline::{FitStage, ModuleRun, ModuleStage, Pipeline, PipelineError, PostprocessStage, ProjectStage, StageId};
