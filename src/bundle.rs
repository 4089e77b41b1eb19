//! Hand-off between the project and postprocess stages.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::export::ProjectionMetadata;
use crate::extract::IceSource;
use crate::series::SampleSeries;

/// Errors that can occur while building, saving or loading a bundle.
#[derive(Error, Debug)]
pub enum BundleError {
    #[error("Failed to access bundle '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Bundle JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Bundle has no component '{0}'")]
    MissingComponent(String),
    #[error("Component '{name}' has shape {nsamps}x{nyears}, expected {expected_samps}x{expected_years}")]
    Shape {
        name: String,
        nsamps: usize,
        nyears: usize,
        expected_samps: usize,
        expected_years: usize,
    },
}

/// One named global series carried to postprocessing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleComponent {
    pub name: String,
    pub samples: SampleSeries,
}

/// Output of a module's project stage.
///
/// All components share the bundle's sample count and target years.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionBundle {
    pub source: IceSource,
    pub years: Vec<i32>,
    pub metadata: ProjectionMetadata,
    components: Vec<BundleComponent>,
}

impl ProjectionBundle {
    pub fn new(source: IceSource, years: Vec<i32>, metadata: ProjectionMetadata) -> Self {
        Self {
            source,
            years,
            metadata,
            components: Vec::new(),
        }
    }

    /// Adds a component, checking it against the bundle's shape.
    pub fn push(&mut self, name: impl Into<String>, samples: SampleSeries) -> Result<(), BundleError> {
        let component = BundleComponent {
            name: name.into(),
            samples,
        };
        self.check_shape(&component)?;
        self.components.push(component);
        Ok(())
    }

    fn check_shape(&self, component: &BundleComponent) -> Result<(), BundleError> {
        let expected_samps = self
            .components
            .first()
            .map_or(component.samples.nsamps(), |c| c.samples.nsamps());
        let expected_years = self.years.len();
        let (nsamps, nyears) = component.samples.shape();
        if !component.samples.is_well_formed() || nsamps != expected_samps || nyears != expected_years {
            return Err(BundleError::Shape {
                name: component.name.clone(),
                nsamps,
                nyears,
                expected_samps,
                expected_years,
            });
        }
        Ok(())
    }

    pub fn components(&self) -> &[BundleComponent] {
        &self.components
    }

    pub fn component(&self, name: &str) -> Result<&SampleSeries, BundleError> {
        self.components
            .iter()
            .find(|c| c.name == name)
            .map(|c| &c.samples)
            .ok_or_else(|| BundleError::MissingComponent(name.to_string()))
    }

    pub fn component_names(&self) -> Vec<&str> {
        self.components.iter().map(|c| c.name.as_str()).collect()
    }

    /// Sample count shared by every component (0 for an empty bundle).
    pub fn nsamps(&self) -> usize {
        self.components.first().map_or(0, |c| c.samples.nsamps())
    }

    /// Writes the bundle as JSON. Missing cells are stored as `null`.
    pub fn save(&self, path: &Path) -> Result<(), BundleError> {
        let io_err = |source| BundleError::Io {
            path: path.display().to_string(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let file = File::create(path).map_err(io_err)?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)?;
        Ok(())
    }

    /// Reads a bundle written by [`ProjectionBundle::save`] and re-checks
    /// every component's shape.
    pub fn load(path: &Path) -> Result<Self, BundleError> {
        let file = File::open(path).map_err(|source| BundleError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let loaded: Self = serde_json::from_reader(BufReader::new(file))?;

        let mut bundle = Self::new(loaded.source, loaded.years, loaded.metadata);
        for component in loaded.components {
            bundle.push(component.name, component.samples)?;
        }
        Ok(bundle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn metadata() -> ProjectionMetadata {
        ProjectionMetadata {
            pipeline_id: "emu.ais".into(),
            baseyear: 2005,
            scenario: "ssp245".into(),
            preprocess_infile: None,
        }
    }

    #[test]
    fn test_push_checks_shape() {
        let mut bundle = ProjectionBundle::new(IceSource::Ais, vec![2020, 2030], metadata());
        bundle.push("EAIS", SampleSeries::missing(3, 2)).unwrap();
        assert!(matches!(
            bundle.push("WAIS", SampleSeries::missing(4, 2)),
            Err(BundleError::Shape { expected_samps: 3, .. })
        ));
        assert!(bundle.push("WAIS", SampleSeries::missing(3, 5)).is_err());
        assert_eq!(bundle.nsamps(), 3);
        assert_eq!(bundle.component_names(), vec!["EAIS"]);
    }

    #[test]
    fn test_missing_component() {
        let bundle = ProjectionBundle::new(IceSource::Gris, vec![2020], metadata());
        assert!(matches!(bundle.component("GIS"), Err(BundleError::MissingComponent(_))));
    }

    #[test]
    fn test_save_and_load_keeps_missing_cells() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bundle.json");

        let mut bundle = ProjectionBundle::new(IceSource::Ais, vec![2020, 2030], metadata());
        let eais = SampleSeries::from_fn(2, 2, |s, y| (s + y != 2).then_some(1.5 * (s + y) as f64));
        bundle.push("EAIS", eais.clone()).unwrap();
        bundle.push("WAIS", SampleSeries::missing(2, 2)).unwrap();
        bundle.save(&path).unwrap();

        let loaded = ProjectionBundle::load(&path).unwrap();
        assert_eq!(loaded, bundle);
        assert_eq!(loaded.component("EAIS").unwrap().get(1, 1), None);
    }

    #[test]
    fn test_load_rejects_truncated_series() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.json");
        let json = r#"{
            "source": "GrIS",
            "years": [2020, 2030],
            "metadata": {"pipeline_id": "x", "baseyear": 2005, "scenario": "s", "preprocess_infile": null},
            "components": [{"name": "GIS", "samples": {"nsamps": 1, "nyears": 2, "values": [1.0]}}]
        }"#;
        std::fs::write(&path, json).unwrap();
        assert!(matches!(ProjectionBundle::load(&path), Err(BundleError::Shape { .. })));
    }
}
