//! Export module for saving projections in the gridded NetCDF4 schema.
//!
//! Global and local projection files share one layout; see [`GriddedProjection`].

mod gridded;

pub use gridded::{
    GriddedProjection, LocalFileWriter, Locations, NetcdfExportError, ProjectionMetadata,
    COMPRESSION_LEVEL, GLOBAL_LOCATION_ID, SEA_LEVEL_UNITS, SOURCE_PREFIX,
};
