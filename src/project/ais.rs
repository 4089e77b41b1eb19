//! Antarctic ice sheet projection.

use std::path::Path;

use tracing::debug;

use super::{check_sample_count, shared_draw, ProjectError, ProjectOutput};
use crate::aggregate::apply_ice_sheet_trends;
use crate::bundle::ProjectionBundle;
use crate::config::ModuleConfig;
use crate::export::GriddedProjection;
use crate::extract::{extract_ice_sheet, IceSource};
use crate::trend::{component, FitParameters};

pub const AIS_DESCRIPTION: &str = "Global SLR contribution from Antarctica using the emulandice module";

fn component_description(name: &str) -> String {
    format!("Global SLR contribution from Antarctica ({name}) using the emulandice module")
}

/// Projects the Antarctic contribution.
///
/// Writes the global total and, with `write_components`, one global file
/// each for EAIS, WAIS and PEN. The bundle carries `EAIS` and `WAIS`, with
/// the peninsula folded into `WAIS`.
pub fn project_ais(config: &ModuleConfig, fit: &FitParameters, emulator_csv: &Path) -> Result<ProjectOutput, ProjectError> {
    let extraction = extract_ice_sheet(emulator_csv)?;
    let (_, nsamps, _) = extraction.data.shape();
    check_sample_count(nsamps, config.nsamps)?;

    let years = extraction.years;
    let draw = shared_draw(config);
    let components = apply_ice_sheet_trends(extraction.data, &draw, fit, &years, config.baseyear)?;
    debug!(nsamps, nyears = years.len(), "applied Antarctic trends");

    let metadata = config.metadata();
    let mut written = Vec::new();

    let total = components.total()?;
    let path = config.global_file();
    GriddedProjection::global(&total, &years, &metadata, AIS_DESCRIPTION)?.write(&path)?;
    written.push(path);

    if config.write_components {
        for (name, series) in [
            (component::EAIS, &components.eais),
            (component::WAIS, &components.wais),
            (component::PEN, &components.pen),
        ] {
            let path = config.component_global_file(name);
            GriddedProjection::global(series, &years, &metadata, component_description(name))?.write(&path)?;
            written.push(path);
        }
    }

    let wais = components.wais_with_peninsula()?;
    let mut bundle = ProjectionBundle::new(IceSource::Ais, years, metadata);
    bundle.push(component::EAIS, components.eais)?;
    bundle.push(component::WAIS, wais)?;

    Ok(ProjectOutput { bundle, written })
}
