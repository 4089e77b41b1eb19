//! Region×sample×year series for multi-region ice sources.

use serde::{Deserialize, Serialize};

use super::{SampleSeries, SeriesError};

/// Per-region sample series sharing one (nsamps, nyears) shape.
///
/// Region `i` holds the region whose 1-based identifier is `i + 1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionSeries {
    regions: Vec<SampleSeries>,
}

impl RegionSeries {
    /// Creates `nregions` all-missing series.
    pub fn missing(nregions: usize, nsamps: usize, nyears: usize) -> Self {
        Self {
            regions: vec![SampleSeries::missing(nsamps, nyears); nregions],
        }
    }

    pub fn nregions(&self) -> usize {
        self.regions.len()
    }

    /// Returns `(nregions, nsamps, nyears)`.
    pub fn shape(&self) -> (usize, usize, usize) {
        let (nsamps, nyears) = self
            .regions
            .first()
            .map(SampleSeries::shape)
            .unwrap_or((0, 0));
        (self.regions.len(), nsamps, nyears)
    }

    pub fn region(&self, index: usize) -> &SampleSeries {
        &self.regions[index]
    }

    pub fn region_mut(&mut self, index: usize) -> &mut SampleSeries {
        &mut self.regions[index]
    }

    pub fn iter(&self) -> impl Iterator<Item = &SampleSeries> {
        self.regions.iter()
    }

    pub fn into_regions(self) -> Vec<SampleSeries> {
        self.regions
    }

    /// Sum over regions with missing propagation.
    pub fn total(&self) -> Result<SampleSeries, SeriesError> {
        let refs: Vec<&SampleSeries> = self.regions.iter().collect();
        SampleSeries::sum_all(&refs)
    }
}
