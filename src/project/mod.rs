//! Project stage: emulator output to trend-corrected global projections.
//!
//! Each ice source extracts the emulator table, checks the sample count
//! against the configured trajectories, adds its correlated trend, writes
//! global projection files and returns a [`ProjectionBundle`].

mod ais;
mod glaciers;
mod gris;

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use crate::aggregate::AggregateError;
use crate::bundle::{BundleError, ProjectionBundle};
use crate::config::ModuleConfig;
use crate::export::NetcdfExportError;
use crate::extract::{ExtractError, IceSource};
use crate::series::SeriesError;
use crate::trend::{FitParameters, QuantileDraw, TrendError};

pub use ais::{project_ais, AIS_DESCRIPTION};
pub use glaciers::{project_glaciers, GLACIERS_DESCRIPTION};
pub use gris::{project_gris, GRIS_DESCRIPTION};

/// Errors that can occur during the project stage.
#[derive(Error, Debug)]
pub enum ProjectError {
    #[error(transparent)]
    Extract(#[from] ExtractError),
    #[error(transparent)]
    Series(#[from] SeriesError),
    #[error(transparent)]
    Trend(#[from] TrendError),
    #[error(transparent)]
    Aggregate(#[from] AggregateError),
    #[error(transparent)]
    Export(#[from] NetcdfExportError),
    #[error(transparent)]
    Bundle(#[from] BundleError),
    #[error("Number of SLC projections does not match number of temperature trajectories: {found} != {expected}")]
    SampleCountMismatch { found: usize, expected: usize },
    #[error("Fit parameters are for {found}, not {expected}")]
    WrongSource { expected: IceSource, found: IceSource },
}

/// Bundle plus every file written while producing it.
#[derive(Debug, Clone)]
pub struct ProjectOutput {
    pub bundle: ProjectionBundle,
    pub written: Vec<PathBuf>,
}

/// Fails unless the emulator returned one projection per trajectory.
pub fn check_sample_count(found: usize, expected: usize) -> Result<(), ProjectError> {
    if found != expected {
        return Err(ProjectError::SampleCountMismatch { found, expected });
    }
    Ok(())
}

/// Quantile draw shared by every component of one module run.
pub(crate) fn shared_draw(config: &ModuleConfig) -> QuantileDraw {
    QuantileDraw::generate(config.nsamps, config.seed)
}

/// Runs the project stage for `config.source` on an emulator CSV.
pub fn project(config: &ModuleConfig, fit: &FitParameters, emulator_csv: &Path) -> Result<ProjectOutput, ProjectError> {
    if fit.source != config.source {
        return Err(ProjectError::WrongSource {
            expected: config.source,
            found: fit.source,
        });
    }
    fit.validate()?;

    let output = match config.source {
        IceSource::Ais => project_ais(config, fit, emulator_csv)?,
        IceSource::Gris => project_gris(config, fit, emulator_csv)?,
        IceSource::Glaciers => project_glaciers(config, fit, emulator_csv)?,
    };
    info!(
        source = %config.source,
        components = ?output.bundle.component_names(),
        files = output.written.len(),
        "project stage complete"
    );
    Ok(output)
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::io::Write;
    use std::path::Path;

    /// Writes an emulator-style CSV. Rows are `(source, region, year, sample, sle_cm)`.
    pub fn write_emulator_csv(path: &Path, rows: &[(&str, &str, i32, u32, f64)]) {
        let mut file = std::fs::File::create(path).unwrap();
        writeln!(file, "ice_source,region,year,sample,GSAT,model,exp,SLE").unwrap();
        for (source, region, year, sample, sle) in rows {
            writeln!(file, "{source},{region},{year},{sample},1.2,m,e,{sle}").unwrap();
        }
    }
}
