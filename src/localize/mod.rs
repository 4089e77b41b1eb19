//! Localization of global projections to point sites.
//!
//! Each site's local contribution is the global sample series scaled by the
//! site's fingerprint. Sites are processed in fixed-width chunks mapped in
//! parallel; chunk width bounds peak memory and never changes results.

mod fingerprint;
mod locations;

use rayon::prelude::*;
use thiserror::Error;
use tracing::debug;

use crate::series::SampleSeries;

pub use fingerprint::{resolve_fingerprints, FingerprintGrid, FingerprintSource};
pub use locations::{read_location_file, read_locations_from, Site};

/// Default number of sites processed per chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 50;

/// Errors that can occur during localization.
#[derive(Error, Debug)]
pub enum LocalizeError {
    #[error("Failed to read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Location file error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Location file line {line}: {detail}")]
    MalformedLocation { line: u64, detail: String },
    #[error("NetCDF error: {0}")]
    Netcdf(#[from] netcdf::Error),
    #[error("Fingerprint file '{path}' has no '{name}' variable")]
    MissingVariable { path: String, name: &'static str },
    #[error("Invalid fingerprint grid: {0}")]
    InvalidGrid(String),
    #[error("No fingerprint for site '{name}' (id {id}) at lat {lat}, lon {lon}")]
    UnresolvedSite { name: String, id: i64, lat: f64, lon: f64 },
    #[error("Chunk size must be at least 1")]
    InvalidChunkSize,
}

/// Local contributions over (sample, year, site), site-innermost.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalSeries {
    nsamps: usize,
    nyears: usize,
    nsites: usize,
    values: Vec<Option<f64>>,
}

impl LocalSeries {
    /// Returns `(nsamps, nyears, nsites)`.
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.nsamps, self.nyears, self.nsites)
    }

    pub fn get(&self, sample: usize, year: usize, site: usize) -> Option<f64> {
        self.values[(sample * self.nyears + year) * self.nsites + site]
    }

    /// Values in `[samples, years, locations]` order.
    pub fn values(&self) -> &[Option<f64>] {
        &self.values
    }

    /// Single-precision values with missing cells encoded as NaN.
    pub fn to_f32_filled(&self) -> Vec<f32> {
        self.values
            .iter()
            .map(|v| v.map_or(f32::NAN, |x| x as f32))
            .collect()
    }
}

/// Localized values for one contiguous run of sites.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalChunk {
    /// Index of the first site in the chunk.
    pub offset: usize,
    /// Number of sites in the chunk.
    pub width: usize,
    /// Values in `[samples, years, width]` order.
    pub values: Vec<Option<f64>>,
}

impl LocalChunk {
    /// Site range covered by this chunk.
    pub fn sites(&self) -> std::ops::Range<usize> {
        self.offset..self.offset + self.width
    }

    /// Single-precision values with missing cells encoded as NaN.
    pub fn to_f32_filled(&self) -> Vec<f32> {
        self.values
            .iter()
            .map(|v| v.map_or(f32::NAN, |x| x as f32))
            .collect()
    }
}

/// Outer product of every global cell with a slice of fingerprints.
///
/// Output is cell-major: `block[cell * width + k] = global[cell] * fp[k]`.
fn outer_block(global: &SampleSeries, fingerprints: &[f64]) -> Vec<Option<f64>> {
    let mut block = Vec::with_capacity(global.values().len() * fingerprints.len());
    for cell in global.values() {
        for fp in fingerprints {
            block.push(cell.map(|g| g * fp));
        }
    }
    block
}

/// Localizes `global` chunk by chunk and hands each chunk to `sink` in site
/// order.
///
/// Up to one chunk per rayon worker is computed at a time, so peak memory is
/// bounded by `chunk_size` rather than by the number of sites.
pub fn localize_chunks<F, E>(
    global: &SampleSeries,
    fingerprints: &[f64],
    chunk_size: usize,
    mut sink: F,
) -> Result<(), E>
where
    F: FnMut(LocalChunk) -> Result<(), E>,
    E: From<LocalizeError>,
{
    if chunk_size == 0 {
        return Err(LocalizeError::InvalidChunkSize.into());
    }

    let batch_width = chunk_size * rayon::current_num_threads().max(1);
    let mut offset = 0;
    let mut nchunks = 0usize;
    for batch in fingerprints.chunks(batch_width) {
        let blocks: Vec<Vec<Option<f64>>> = batch
            .par_chunks(chunk_size)
            .map(|chunk| outer_block(global, chunk))
            .collect();

        for (chunk, values) in batch.chunks(chunk_size).zip(blocks) {
            let width = chunk.len();
            sink(LocalChunk { offset, width, values })?;
            offset += width;
            nchunks += 1;
        }
    }
    debug!(nsites = fingerprints.len(), chunks = nchunks, chunk_size, "localized sample series");
    Ok(())
}

/// Computes `local[s, y, site] = global[s, y] * fingerprints[site]` in memory.
///
/// The output is allocated once and each chunk is copied into its own
/// columns as it arrives.
pub fn localize(
    global: &SampleSeries,
    fingerprints: &[f64],
    chunk_size: usize,
) -> Result<LocalSeries, LocalizeError> {
    let (nsamps, nyears) = global.shape();
    let nsites = fingerprints.len();
    let mut values = vec![None; nsamps * nyears * nsites];

    localize_chunks(global, fingerprints, chunk_size, |chunk: LocalChunk| -> Result<(), LocalizeError> {
        for (cell, row) in chunk.values.chunks(chunk.width).enumerate() {
            let start = cell * nsites + chunk.offset;
            values[start..start + chunk.width].copy_from_slice(row);
        }
        Ok(())
    })?;

    Ok(LocalSeries {
        nsamps,
        nyears,
        nsites,
        values,
    })
}
