//! Glacier projection.

use std::path::Path;

use tracing::debug;

use super::{check_sample_count, shared_draw, ProjectError, ProjectOutput};
use crate::aggregate::{redistribute_trend, BaselineWindow};
use crate::bundle::ProjectionBundle;
use crate::config::ModuleConfig;
use crate::export::GriddedProjection;
use crate::extract::{extract_glaciers, IceSource};
use crate::trend::{component, sample_rates, FitParameters, LinearTrend};

pub const GLACIERS_DESCRIPTION: &str = "Global SLR contribution from glaciers using the emulandice module";

fn region_description(id: u32) -> String {
    format!("Global SLR contribution from glaciers (glac{id}) using the emulandice module")
}

/// Projects the glacier contribution.
///
/// The population trend is evaluated once at the first target year and
/// shared out by each region's baseline melt. Writes the global total and,
/// with `write_components`, `glac<N>_globalsl.nc` per region.
pub fn project_glaciers(
    config: &ModuleConfig,
    fit: &FitParameters,
    emulator_csv: &Path,
) -> Result<ProjectOutput, ProjectError> {
    let extraction = extract_glaciers(emulator_csv)?;
    let (nregions, nsamps, nyears) = extraction.data.shape();
    check_sample_count(nsamps, config.nsamps)?;

    let years = extraction.years;
    let window = BaselineWindow::from_years(&years)?;
    let draw = shared_draw(config);
    let rates = sample_rates(fit.component(component::GLACIERS)?, &draw)?;
    let elapsed = f64::from(years[window.start] - config.baseyear);
    let population = LinearTrend::constant(rates, elapsed, nyears);

    let redistributed = redistribute_trend(extraction.data, &years, &population)?;
    debug!(nregions, ratios = ?redistributed.ratios, "redistributed glacier trend");

    let metadata = config.metadata();
    let mut written = Vec::new();

    let total = redistributed.regions.total()?;
    let path = config.global_file();
    GriddedProjection::global(&total, &years, &metadata, GLACIERS_DESCRIPTION)?.write(&path)?;
    written.push(path);

    if config.write_components {
        let dir = config.region_dir();
        for (index, series) in redistributed.regions.iter().enumerate() {
            let id = index as u32 + 1;
            let path = dir.join(format!("glac{id}_globalsl.nc"));
            GriddedProjection::global(series, &years, &metadata, region_description(id))?.write(&path)?;
            written.push(path);
        }
    }

    let mut bundle = ProjectionBundle::new(IceSource::Glaciers, years, metadata);
    bundle.push(component::GLACIERS, total)?;

    Ok(ProjectOutput { bundle, written })
}
