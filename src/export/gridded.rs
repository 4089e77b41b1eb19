//! NetCDF4 projection files.
//!
//! Every file carries `years`, `samples` and `locations` dimensions and a
//! compressed `sea_level_change[samples, years, locations]` variable in mm.
//! Global files use a single placeholder location (id -1, lat/lon +inf).
//! Variable and attribute names are read by downstream tools and must not
//! change.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::localize::{LocalChunk, LocalSeries, Site};
use crate::series::SampleSeries;

/// Deflate level for `sea_level_change`.
pub const COMPRESSION_LEVEL: i32 = 4;
/// Prefix of the `source` attribute.
pub const SOURCE_PREFIX: &str = "FACTS";
/// Placeholder location id in global files.
pub const GLOBAL_LOCATION_ID: i64 = -1;
/// Units attribute of `sea_level_change`.
pub const SEA_LEVEL_UNITS: &str = "mm";

/// Errors that can occur during NetCDF export.
#[derive(Error, Debug)]
pub enum NetcdfExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("NetCDF error: {0}")]
    Netcdf(#[from] netcdf::Error),
    #[error("Invalid data length for 'sea_level_change': got {got}, expected {expected}")]
    InvalidDataLength { got: usize, expected: usize },
    #[error("Invalid projection shape: {0}")]
    InvalidShape(String),
}

/// Run-level metadata written as global attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionMetadata {
    pub pipeline_id: String,
    pub baseyear: i32,
    pub scenario: String,
    /// Provenance of the run inputs; written on local files only.
    pub preprocess_infile: Option<String>,
}

/// Location axis of a projection file.
#[derive(Debug, Clone, PartialEq)]
pub enum Locations {
    /// Single placeholder location.
    Global,
    Sites(Vec<Site>),
}

impl Locations {
    pub fn len(&self) -> usize {
        match self {
            Locations::Global => 1,
            Locations::Sites(sites) => sites.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory image of one projection file.
#[derive(Debug, Clone, PartialEq)]
pub struct GriddedProjection {
    pub description: String,
    pub metadata: ProjectionMetadata,
    pub years: Vec<i32>,
    pub nsamps: usize,
    pub locations: Locations,
    /// Row-major `[samples, years, locations]`; NaN marks missing values.
    pub sea_level_change: Vec<f32>,
}

impl GriddedProjection {
    /// Global file for a sample×year series.
    pub fn global(
        series: &SampleSeries,
        years: &[i32],
        metadata: &ProjectionMetadata,
        description: impl Into<String>,
    ) -> Result<Self, NetcdfExportError> {
        let projection = Self {
            description: description.into(),
            metadata: metadata.clone(),
            years: years.to_vec(),
            nsamps: series.nsamps(),
            locations: Locations::Global,
            sea_level_change: series.to_f32_filled(),
        };
        projection.validate()?;
        Ok(projection)
    }

    /// Local file for a sample×year×site series.
    pub fn local(
        series: &LocalSeries,
        sites: &[Site],
        years: &[i32],
        metadata: &ProjectionMetadata,
        description: impl Into<String>,
    ) -> Result<Self, NetcdfExportError> {
        let (nsamps, _, nsites) = series.shape();
        if nsites != sites.len() {
            return Err(NetcdfExportError::InvalidShape(format!(
                "{nsites} localized sites but {} site records",
                sites.len()
            )));
        }
        let projection = Self {
            description: description.into(),
            metadata: metadata.clone(),
            years: years.to_vec(),
            nsamps,
            locations: Locations::Sites(sites.to_vec()),
            sea_level_change: series.to_f32_filled(),
        };
        projection.validate()?;
        Ok(projection)
    }

    /// Zero-length dimensions would be created unlimited, so every axis
    /// must be non-empty.
    fn validate(&self) -> Result<(), NetcdfExportError> {
        if self.years.is_empty() || self.nsamps == 0 || self.locations.is_empty() {
            return Err(NetcdfExportError::InvalidShape(format!(
                "{} samples x {} years x {} locations",
                self.nsamps,
                self.years.len(),
                self.locations.len()
            )));
        }
        let expected = self.nsamps * self.years.len() * self.locations.len();
        if self.sea_level_change.len() != expected {
            return Err(NetcdfExportError::InvalidDataLength {
                got: self.sea_level_change.len(),
                expected,
            });
        }
        Ok(())
    }

    fn header(&self) -> FileHeader<'_> {
        FileHeader {
            description: &self.description,
            metadata: &self.metadata,
            years: &self.years,
            nsamps: self.nsamps,
            locations: &self.locations,
        }
    }

    pub fn location_ids(&self) -> Vec<i64> {
        self.header().location_ids()
    }

    pub fn lats(&self) -> Vec<f32> {
        self.header().lats()
    }

    pub fn lons(&self) -> Vec<f32> {
        self.header().lons()
    }

    /// Value of the `source` attribute.
    pub fn source_attribute(&self) -> String {
        source_attribute(&self.metadata.pipeline_id)
    }

    /// Writes the file, replacing any existing file at `path`.
    ///
    /// A failure part-way through may leave a partial file behind.
    pub fn write(&self, path: &Path) -> Result<(), NetcdfExportError> {
        self.validate()?;
        let mut file = self.header().create(path)?;
        sea_level_change(&mut file)?.put_values(&self.sea_level_change, ..)?;

        info!(path = %path.display(), description = %self.description, "wrote projection file");
        Ok(())
    }
}

/// Everything in a projection file except the `sea_level_change` values.
struct FileHeader<'a> {
    description: &'a str,
    metadata: &'a ProjectionMetadata,
    years: &'a [i32],
    nsamps: usize,
    locations: &'a Locations,
}

impl FileHeader<'_> {
    fn location_ids(&self) -> Vec<i64> {
        match self.locations {
            Locations::Global => vec![GLOBAL_LOCATION_ID],
            Locations::Sites(sites) => sites.iter().map(|s| s.id).collect(),
        }
    }

    fn lats(&self) -> Vec<f32> {
        match self.locations {
            Locations::Global => vec![f32::INFINITY],
            Locations::Sites(sites) => sites.iter().map(|s| s.lat as f32).collect(),
        }
    }

    fn lons(&self) -> Vec<f32> {
        match self.locations {
            Locations::Global => vec![f32::INFINITY],
            Locations::Sites(sites) => sites.iter().map(|s| s.lon as f32).collect(),
        }
    }

    /// Creates the file with dimensions, attributes, coordinates and an
    /// empty (NaN-filled) `sea_level_change`.
    fn create(&self, path: &Path) -> Result<netcdf::FileMut, NetcdfExportError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = netcdf::create(path)?;

        file.add_dimension("years", self.years.len())?;
        file.add_dimension("samples", self.nsamps)?;
        file.add_dimension("locations", self.locations.len())?;

        file.add_attribute("description", self.description)?;
        file.add_attribute("history", creation_stamp().as_str())?;
        file.add_attribute("source", source_attribute(&self.metadata.pipeline_id).as_str())?;
        file.add_attribute("baseyear", self.metadata.baseyear)?;
        file.add_attribute("scenario", self.metadata.scenario.as_str())?;
        // Provenance is recorded on local files only.
        if let (Locations::Sites(_), Some(infile)) = (self.locations, &self.metadata.preprocess_infile) {
            file.add_attribute("preprocess_infile", infile.as_str())?;
        }

        let mut years = file.add_variable::<i32>("years", &["years"])?;
        years.put_values(self.years, ..)?;

        let sample_ids: Vec<i64> = (0..self.nsamps as i64).collect();
        let mut samples = file.add_variable::<i64>("samples", &["samples"])?;
        samples.put_values(&sample_ids, ..)?;

        let mut locations = file.add_variable::<i64>("locations", &["locations"])?;
        locations.put_values(&self.location_ids(), ..)?;

        let mut lat = file.add_variable::<f32>("lat", &["locations"])?;
        lat.put_values(&self.lats(), ..)?;

        let mut lon = file.add_variable::<f32>("lon", &["locations"])?;
        lon.put_values(&self.lons(), ..)?;

        let mut slc = file.add_variable::<f32>("sea_level_change", &["samples", "years", "locations"])?;
        slc.set_compression(COMPRESSION_LEVEL, false)?;
        slc.set_fill_value(f32::NAN)?;
        slc.put_attribute("units", SEA_LEVEL_UNITS)?;

        Ok(file)
    }
}

fn sea_level_change(file: &mut netcdf::FileMut) -> Result<netcdf::VariableMut<'_>, NetcdfExportError> {
    file.variable_mut("sea_level_change")
        .ok_or_else(|| NetcdfExportError::InvalidShape("sea_level_change was not created".into()))
}

fn source_attribute(pipeline_id: &str) -> String {
    format!("{SOURCE_PREFIX}: {pipeline_id}. ")
}

/// Local projection file written one site chunk at a time.
///
/// Chunks must arrive in site order and together cover every site;
/// [`LocalFileWriter::finish`] fails otherwise.
pub struct LocalFileWriter {
    file: netcdf::FileMut,
    path: PathBuf,
    nsamps: usize,
    nyears: usize,
    nsites: usize,
    next_site: usize,
}

impl LocalFileWriter {
    /// Creates the file with every coordinate and attribute in place.
    pub fn create(
        path: &Path,
        sites: &[Site],
        years: &[i32],
        nsamps: usize,
        metadata: &ProjectionMetadata,
        description: &str,
    ) -> Result<Self, NetcdfExportError> {
        if years.is_empty() || nsamps == 0 || sites.is_empty() {
            return Err(NetcdfExportError::InvalidShape(format!(
                "{nsamps} samples x {} years x {} locations",
                years.len(),
                sites.len()
            )));
        }
        let locations = Locations::Sites(sites.to_vec());
        let header = FileHeader {
            description,
            metadata,
            years,
            nsamps,
            locations: &locations,
        };
        let file = header.create(path)?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
            nsamps,
            nyears: years.len(),
            nsites: sites.len(),
            next_site: 0,
        })
    }

    /// Writes the `[samples, years, chunk.sites()]` hyperslab.
    pub fn put_chunk(&mut self, chunk: &LocalChunk) -> Result<(), NetcdfExportError> {
        if chunk.offset != self.next_site || chunk.offset + chunk.width > self.nsites {
            return Err(NetcdfExportError::InvalidShape(format!(
                "chunk covers sites {:?}, expected to start at {} of {}",
                chunk.sites(),
                self.next_site,
                self.nsites
            )));
        }
        let expected = self.nsamps * self.nyears * chunk.width;
        if chunk.values.len() != expected {
            return Err(NetcdfExportError::InvalidDataLength {
                got: chunk.values.len(),
                expected,
            });
        }

        let extents = (0..self.nsamps, 0..self.nyears, chunk.sites());
        sea_level_change(&mut self.file)?.put_values(&chunk.to_f32_filled(), extents)?;
        self.next_site += chunk.width;
        Ok(())
    }

    /// Checks every site was written and closes the file.
    pub fn finish(self) -> Result<(), NetcdfExportError> {
        if self.next_site != self.nsites {
            return Err(NetcdfExportError::InvalidShape(format!(
                "{} of {} sites written",
                self.next_site, self.nsites
            )));
        }
        info!(path = %self.path.display(), nsites = self.nsites, "wrote local projection file");
        Ok(())
    }
}

/// `history` attribute: "Created " followed by a ctime-style local timestamp.
fn creation_stamp() -> String {
    format!("Created {}", chrono::Local::now().format("%a %b %e %H:%M:%S %Y"))
}
