//! Postprocess stage: localize every bundle component to point sites.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use crate::bundle::{BundleComponent, BundleError, ProjectionBundle};
use crate::export::{LocalFileWriter, NetcdfExportError};
use crate::localize::{
    localize, localize_chunks, read_location_file, resolve_fingerprints, FingerprintGrid, FingerprintSource,
    LocalChunk, LocalSeries, LocalizeError, Site,
};

/// Errors that can occur during the postprocess stage.
#[derive(Error, Debug)]
pub enum PostprocessError {
    #[error(transparent)]
    Localize(#[from] LocalizeError),
    #[error(transparent)]
    Export(#[from] NetcdfExportError),
    #[error(transparent)]
    Bundle(#[from] BundleError),
    #[error("No fingerprint dataset for component '{0}'")]
    MissingFingerprint(String),
    #[error("Location file contains no sites")]
    NoSites,
}

/// One bundle component localized to every site.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalProjection {
    pub component: String,
    pub series: LocalSeries,
}

/// Fingerprint sources keyed by bundle component name.
pub type FingerprintSet = BTreeMap<String, Box<dyn FingerprintSource>>;

/// Reads one gridded fingerprint file per component.
pub fn load_fingerprints(files: &BTreeMap<String, PathBuf>) -> Result<FingerprintSet, PostprocessError> {
    let mut set = FingerprintSet::new();
    for (component, path) in files {
        let grid = FingerprintGrid::from_netcdf(path)?;
        info!(component = %component, path = %path.display(), shape = ?grid.shape(), "loaded fingerprint");
        set.insert(component.clone(), Box::new(grid));
    }
    Ok(set)
}

/// Resolves every component's per-site fingerprints before any work starts.
fn resolve_components<'b>(
    bundle: &'b ProjectionBundle,
    sites: &[Site],
    fingerprints: &FingerprintSet,
) -> Result<Vec<(&'b BundleComponent, Vec<f64>)>, PostprocessError> {
    if sites.is_empty() {
        return Err(PostprocessError::NoSites);
    }

    bundle
        .components()
        .iter()
        .map(|component| {
            let source = fingerprints
                .get(&component.name)
                .ok_or_else(|| PostprocessError::MissingFingerprint(component.name.clone()))?;
            Ok::<_, PostprocessError>((component, resolve_fingerprints(source.as_ref(), sites)?))
        })
        .collect()
}

/// Localizes each bundle component with its own fingerprint source, in memory.
pub fn localize_bundle(
    bundle: &ProjectionBundle,
    sites: &[Site],
    fingerprints: &FingerprintSet,
    chunk_size: usize,
) -> Result<Vec<LocalProjection>, PostprocessError> {
    resolve_components(bundle, sites, fingerprints)?
        .into_iter()
        .map(|(component, fps)| -> Result<LocalProjection, PostprocessError> {
            Ok(LocalProjection {
                component: component.name.clone(),
                series: localize(&component.samples, &fps, chunk_size)?,
            })
        })
        .collect()
}

fn local_description(component: &str, bundle: &ProjectionBundle) -> String {
    format!(
        "Local SLR contributions from {component} according to emulandice {} workflow",
        bundle.source
    )
}

/// Localizes the bundle and writes one local file per component.
///
/// Site chunks are written to disk as they are computed. Every fingerprint
/// is resolved first, so an unresolvable site leaves no files behind.
/// `local_file` maps a component name to its output path.
pub fn write_local_projections<F>(
    bundle: &ProjectionBundle,
    sites: &[Site],
    fingerprints: &FingerprintSet,
    chunk_size: usize,
    local_file: F,
) -> Result<Vec<PathBuf>, PostprocessError>
where
    F: Fn(&str) -> PathBuf,
{
    if chunk_size == 0 {
        return Err(LocalizeError::InvalidChunkSize.into());
    }
    let resolved = resolve_components(bundle, sites, fingerprints)?;

    let mut written = Vec::with_capacity(resolved.len());
    for (component, fps) in resolved {
        let path = local_file(&component.name);
        let mut writer = LocalFileWriter::create(
            &path,
            sites,
            &bundle.years,
            component.samples.nsamps(),
            &bundle.metadata,
            &local_description(&component.name, bundle),
        )?;
        localize_chunks(&component.samples, &fps, chunk_size, |chunk: LocalChunk| {
            writer.put_chunk(&chunk).map_err(PostprocessError::from)
        })?;
        writer.finish()?;
        written.push(path);
    }
    Ok(written)
}

/// Reads sites and fingerprint files, then writes the local projections.
pub fn postprocess<F>(
    bundle: &ProjectionBundle,
    location_file: &Path,
    fingerprint_files: &BTreeMap<String, PathBuf>,
    chunk_size: usize,
    local_file: F,
) -> Result<Vec<PathBuf>, PostprocessError>
where
    F: Fn(&str) -> PathBuf,
{
    let sites = read_location_file(location_file)?;
    info!(sites = sites.len(), "read location file");
    let fingerprints = load_fingerprints(fingerprint_files)?;
    write_local_projections(bundle, &sites, &fingerprints, chunk_size, local_file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::ProjectionMetadata;
    use crate::extract::IceSource;
    use crate::series::SampleSeries;
    use tempfile::tempdir;

    struct Uniform(f64);

    impl FingerprintSource for Uniform {
        fn fingerprint_at(&self, _lat: f64, _lon: f64) -> Option<f64> {
            Some(self.0)
        }
    }

    fn bundle() -> ProjectionBundle {
        let metadata = ProjectionMetadata {
            pipeline_id: "emu.ais".into(),
            baseyear: 2005,
            scenario: "ssp585".into(),
            preprocess_infile: Some("input.nc".into()),
        };
        let mut bundle = ProjectionBundle::new(IceSource::Ais, vec![2020, 2030], metadata);
        bundle
            .push("EAIS", SampleSeries::from_fn(2, 2, |s, y| Some((s + y) as f64)))
            .unwrap();
        bundle
            .push("WAIS", SampleSeries::from_fn(2, 2, |s, y| Some(10.0 * (s + y) as f64)))
            .unwrap();
        bundle
    }

    fn sites() -> Vec<Site> {
        vec![
            Site { name: "a".into(), id: 1, lat: 0.0, lon: 0.0 },
            Site { name: "b".into(), id: 2, lat: 10.0, lon: 20.0 },
        ]
    }

    fn fingerprints() -> FingerprintSet {
        let mut set = FingerprintSet::new();
        set.insert("EAIS".to_string(), Box::new(Uniform(0.5)) as Box<dyn FingerprintSource>);
        set.insert("WAIS".to_string(), Box::new(Uniform(2.0)) as Box<dyn FingerprintSource>);
        set
    }

    #[test]
    fn test_each_component_uses_its_fingerprint() {
        let local = localize_bundle(&bundle(), &sites(), &fingerprints(), 1).unwrap();
        assert_eq!(local.len(), 2);
        assert_eq!(local[0].component, "EAIS");
        assert_eq!(local[0].series.get(1, 1, 0), Some(1.0));
        assert_eq!(local[1].series.get(1, 1, 1), Some(40.0));
    }

    #[test]
    fn test_missing_fingerprint_is_fatal() {
        let mut set = fingerprints();
        set.remove("WAIS");
        assert!(matches!(
            localize_bundle(&bundle(), &sites(), &set, 50),
            Err(PostprocessError::MissingFingerprint(name)) if name == "WAIS"
        ));
    }

    #[test]
    fn test_no_sites_is_fatal() {
        assert!(matches!(
            localize_bundle(&bundle(), &[], &fingerprints(), 50),
            Err(PostprocessError::NoSites)
        ));
    }

    #[test]
    fn test_writes_one_file_per_component() {
        let dir = tempdir().unwrap();
        let written = write_local_projections(&bundle(), &sites(), &fingerprints(), 1, |c| {
            dir.path().join(format!("{c}_localsl.nc"))
        })
        .unwrap();
        assert_eq!(written.len(), 2);
        assert!(written.iter().all(|p| p.is_file()));

        let file = netcdf::open(&written[1]).unwrap();
        assert_eq!(file.dimension("locations").unwrap().len(), 2);
        assert!(matches!(
            file.attribute("description").unwrap().value().unwrap(),
            netcdf::AttributeValue::Str(d) if d.contains("from WAIS") && d.contains("AIS workflow")
        ));
    }

    #[test]
    fn test_missing_fingerprint_writes_no_files() {
        let dir = tempdir().unwrap();
        let mut set = fingerprints();
        set.remove("WAIS");
        let result = write_local_projections(&bundle(), &sites(), &set, 1, |c| {
            dir.path().join(format!("{c}_localsl.nc"))
        });
        assert!(matches!(result, Err(PostprocessError::MissingFingerprint(_))));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_streamed_files_match_in_memory_localization() {
        let dir = tempdir().unwrap();
        let expected = localize_bundle(&bundle(), &sites(), &fingerprints(), 50).unwrap();
        for chunk_size in [1, 2, 50] {
            let written = write_local_projections(&bundle(), &sites(), &fingerprints(), chunk_size, |c| {
                dir.path().join(format!("{c}_{chunk_size}_localsl.nc"))
            })
            .unwrap();
            for (path, local) in written.iter().zip(&expected) {
                let file = netcdf::open(path).unwrap();
                let stored = file
                    .variable("sea_level_change")
                    .unwrap()
                    .get_values::<f32, _>(..)
                    .unwrap();
                let want = local.series.to_f32_filled();
                assert_eq!(stored.len(), want.len());
                for (a, b) in stored.iter().zip(&want) {
                    assert!(a == b || (a.is_nan() && b.is_nan()), "chunk={chunk_size}");
                }
            }
        }
    }
}
