//! Module run configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::export::ProjectionMetadata;
use crate::extract::IceSource;
use crate::localize::DEFAULT_CHUNK_SIZE;
use crate::trend::{FitParameters, DEFAULT_TREND_SEED};

/// Errors that can occur while loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config '{path}': {source}")]
    Toml {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Configuration for one module run (fit, project and optional postprocess).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleConfig {
    /// Unique identifier for this instance of the module; prefixes output files.
    pub pipeline_id: String,
    pub source: IceSource,
    /// Number of temperature trajectories fed to the emulator.
    pub nsamps: usize,
    /// Year at which trend corrections are zero.
    pub baseyear: i32,
    pub scenario: String,
    /// Input file the run was prepared from, recorded for provenance.
    pub preprocess_infile: Option<String>,
    /// Forcing dataset handed to the emulator.
    pub emulator_dataset: Option<PathBuf>,
    /// Directory for emulator output and projection files.
    pub output_dir: PathBuf,
    /// Seed of the shared trend quantile draw. Must match across the
    /// modules of one pipeline run.
    pub seed: u64,
    /// Sites localized per parallel chunk.
    pub chunk_size: usize,
    /// Write per-component (AIS) or per-region (glaciers) global files.
    pub write_components: bool,
    /// Overrides the source's default trend parameters.
    pub fit: Option<FitParameters>,
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            pipeline_id: "emulandice".to_string(),
            source: IceSource::Ais,
            nsamps: 500,
            baseyear: 2005,
            scenario: "ssp585".to_string(),
            preprocess_infile: None,
            emulator_dataset: None,
            output_dir: PathBuf::from("./output"),
            seed: DEFAULT_TREND_SEED,
            chunk_size: DEFAULT_CHUNK_SIZE,
            write_components: false,
            fit: None,
        }
    }
}

impl ModuleConfig {
    /// Creates a configuration for the Antarctic ice sheet module.
    pub fn antarctica(pipeline_id: &str) -> Self {
        Self::for_source(IceSource::Ais, pipeline_id)
    }

    /// Creates a configuration for the Greenland ice sheet module.
    pub fn greenland(pipeline_id: &str) -> Self {
        Self::for_source(IceSource::Gris, pipeline_id)
    }

    /// Creates a configuration for the glacier module.
    pub fn glaciers(pipeline_id: &str) -> Self {
        Self::for_source(IceSource::Glaciers, pipeline_id)
    }

    pub fn for_source(source: IceSource, pipeline_id: &str) -> Self {
        Self {
            pipeline_id: pipeline_id.to_string(),
            source,
            ..Default::default()
        }
    }

    /// Loads a configuration from a TOML file. Missing keys take defaults.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Toml {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pipeline_id.trim().is_empty() {
            return Err(ConfigError::Invalid("pipeline_id must not be empty".into()));
        }
        if self.nsamps == 0 {
            return Err(ConfigError::Invalid("nsamps must be at least 1".into()));
        }
        if self.chunk_size == 0 {
            return Err(ConfigError::Invalid("chunk_size must be at least 1".into()));
        }
        if let Some(fit) = &self.fit {
            if fit.source != self.source {
                return Err(ConfigError::Invalid(format!(
                    "fit parameters are for {} but the module source is {}",
                    fit.source, self.source
                )));
            }
        }
        Ok(())
    }

    /// Trend parameters for the fit stage.
    pub fn fit_parameters(&self) -> FitParameters {
        self.fit
            .clone()
            .unwrap_or_else(|| FitParameters::for_source(self.source))
    }

    pub fn metadata(&self) -> ProjectionMetadata {
        ProjectionMetadata {
            pipeline_id: self.pipeline_id.clone(),
            baseyear: self.baseyear,
            scenario: self.scenario.clone(),
            preprocess_infile: self.preprocess_infile.clone(),
        }
    }

    /// `<output_dir>/<pipeline_id>_globalsl.nc`
    pub fn global_file(&self) -> PathBuf {
        self.output_dir.join(format!("{}_globalsl.nc", self.pipeline_id))
    }

    /// `<output_dir>/<pipeline_id>_<component>_globalsl.nc`
    pub fn component_global_file(&self, component: &str) -> PathBuf {
        self.output_dir
            .join(format!("{}_{}_globalsl.nc", self.pipeline_id, component))
    }

    /// Directory holding one global file per glacier region.
    pub fn region_dir(&self) -> PathBuf {
        self.output_dir.join(format!("{}_regions", self.pipeline_id))
    }

    /// `<output_dir>/<pipeline_id>_<component>_localsl.nc`
    pub fn local_file(&self, component: &str) -> PathBuf {
        self.output_dir
            .join(format!("{}_{}_localsl.nc", self.pipeline_id, component))
    }

    /// `<output_dir>/<pipeline_id>_bundle.json`
    pub fn bundle_file(&self) -> PathBuf {
        self.output_dir.join(format!("{}_bundle.json", self.pipeline_id))
    }
}
