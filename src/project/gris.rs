//! Greenland ice sheet projection.

use std::path::Path;

use super::{check_sample_count, shared_draw, ProjectError, ProjectOutput};
use crate::bundle::ProjectionBundle;
use crate::config::ModuleConfig;
use crate::export::GriddedProjection;
use crate::extract::{extract_single, IceSource};
use crate::trend::{component, FitParameters, LinearTrend};

pub const GRIS_DESCRIPTION: &str = "Global SLR contribution from Greenland using the emulandice module";

/// Projects the Greenland contribution as a single `GIS` component.
pub fn project_gris(config: &ModuleConfig, fit: &FitParameters, emulator_csv: &Path) -> Result<ProjectOutput, ProjectError> {
    let extraction = extract_single(emulator_csv, IceSource::Gris)?;
    let mut samples = extraction.data;
    check_sample_count(samples.nsamps(), config.nsamps)?;

    let years = extraction.years;
    let draw = shared_draw(config);
    let trend = LinearTrend::from_draw(fit.component(component::GIS)?, &draw, &years, config.baseyear)?;
    trend.apply(&mut samples)?;

    let metadata = config.metadata();
    let path = config.global_file();
    GriddedProjection::global(&samples, &years, &metadata, GRIS_DESCRIPTION)?.write(&path)?;

    let mut bundle = ProjectionBundle::new(IceSource::Gris, years, metadata);
    bundle.push(component::GIS, samples)?;

    Ok(ProjectOutput {
        bundle,
        written: vec![path],
    })
}
