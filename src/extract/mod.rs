//! Extraction of emulator output into dense projection arrays.
//!
//! The emulator writes one row per (ice source, region, year, sample). This
//! module reindexes those rows into [`SampleSeries`] / [`RegionSeries`]
//! arrays whose extents are the distinct years and samples encountered.

mod region;
mod table;

use std::collections::BTreeSet;
use std::path::Path;

use thiserror::Error;
use tracing::debug;

use crate::series::{RegionSeries, SampleSeries};

pub use region::{GlacierRegion, IceSheetRegion, IceSource};
pub use table::{read_records, read_records_from, EmulatorRecord, CM_TO_MM};

/// Errors that can occur while extracting emulator output.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Failed to read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Line {line}: expected at least {expected} fields, found {fields}")]
    ShortRow { line: u64, fields: usize, expected: usize },
    #[error("Line {line}: malformed {column} value '{value}'")]
    MalformedField {
        line: u64,
        column: &'static str,
        value: String,
    },
    #[error("Line {line}: invalid sample index {sample} (indices are 1-based)")]
    InvalidSample { line: u64, sample: u32 },
    #[error("Unknown region label '{0}'")]
    UnknownRegion(String),
    #[error("Unknown ice source '{0}'")]
    UnknownIceSource(String),
    #[error("No rows found for ice source '{0}'")]
    NoRows(String),
    #[error("Sample indices are not contiguous: found {distinct} distinct samples but index {max} present")]
    SampleGap { distinct: usize, max: u32 },
    #[error("Region identifiers are not contiguous: found {distinct} distinct regions but '{label}' present")]
    RegionGap { distinct: usize, label: String },
}

/// Extracted array together with its target years.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction<T> {
    pub data: T,
    /// Target years, sorted ascending and unique.
    pub years: Vec<i32>,
}

/// Array extents recovered from a set of records.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Extents {
    years: Vec<i32>,
    nsamps: usize,
}

impl Extents {
    fn from_records(records: &[EmulatorRecord]) -> Result<Self, ExtractError> {
        let years: BTreeSet<i32> = records.iter().map(|r| r.year).collect();
        let samples: BTreeSet<u32> = records.iter().map(|r| r.sample).collect();

        let nsamps = samples.len();
        if let Some(&max) = samples.last() {
            if max as usize != nsamps {
                return Err(ExtractError::SampleGap { distinct: nsamps, max });
            }
        }

        Ok(Self {
            years: years.into_iter().collect(),
            nsamps,
        })
    }

    fn year_index(&self, year: i32) -> usize {
        // Every record year is in the extent by construction.
        self.years.binary_search(&year).unwrap_or_else(|i| i)
    }
}

fn load(path: &Path, source: IceSource) -> Result<(Vec<EmulatorRecord>, Extents), ExtractError> {
    let records = read_records(path, source.label())?;
    if records.is_empty() {
        return Err(ExtractError::NoRows(source.label().to_string()));
    }
    let extents = Extents::from_records(&records)?;
    debug!(
        source = source.label(),
        rows = records.len(),
        nsamps = extents.nsamps,
        nyears = extents.years.len(),
        "extracted emulator table"
    );
    Ok((records, extents))
}

/// Fills a region×sample×year array, resolving each row's region to an index.
fn fill_regions<F>(
    records: &[EmulatorRecord],
    extents: &Extents,
    nregions: usize,
    mut region_index: F,
) -> Result<RegionSeries, ExtractError>
where
    F: FnMut(&str) -> Result<usize, ExtractError>,
{
    let mut data = RegionSeries::missing(nregions, extents.nsamps, extents.years.len());
    for record in records {
        let r = region_index(&record.region)?;
        let y = extents.year_index(record.year);
        let s = (record.sample - 1) as usize;
        data.region_mut(r).set(s, y, record.sle_mm);
    }
    Ok(data)
}

/// Extracts a single-region source (e.g. Greenland). Region labels are ignored.
pub fn extract_single(path: &Path, source: IceSource) -> Result<Extraction<SampleSeries>, ExtractError> {
    let (records, extents) = load(path, source)?;
    let data = fill_regions(&records, &extents, 1, |_| Ok(0))?;
    let data = data.into_regions().into_iter().next().unwrap_or_else(|| {
        SampleSeries::missing(extents.nsamps, extents.years.len())
    });
    Ok(Extraction { data, years: extents.years })
}

/// Extracts the three Antarctic sub-regions, indexed by [`IceSheetRegion::index`].
pub fn extract_ice_sheet(path: &Path) -> Result<Extraction<RegionSeries>, ExtractError> {
    let (records, extents) = load(path, IceSource::Ais)?;
    let data = fill_regions(&records, &extents, IceSheetRegion::COUNT, |label| {
        IceSheetRegion::from_label(label).map(|r| r.index())
    })?;
    Ok(Extraction { data, years: extents.years })
}

/// Extracts numbered glacier regions, indexed by [`GlacierRegion::index`].
///
/// Region identifiers must cover `1..=N` without gaps.
pub fn extract_glaciers(path: &Path) -> Result<Extraction<RegionSeries>, ExtractError> {
    let (records, extents) = load(path, IceSource::Glaciers)?;

    let mut regions = BTreeSet::new();
    for record in &records {
        regions.insert(GlacierRegion::from_label(&record.region)?);
    }
    let nregions = regions.len();
    if let Some(last) = regions.last() {
        if last.id() as usize != nregions {
            return Err(ExtractError::RegionGap {
                distinct: nregions,
                label: last.to_string(),
            });
        }
    }

    let data = fill_regions(&records, &extents, nregions, |label| {
        GlacierRegion::from_label(label).map(|r| r.index())
    })?;
    Ok(Extraction { data, years: extents.years })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_csv(rows: &[&str]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "ice_source,region,year,sample,GSAT,melt0,model,SLE").unwrap();
        for row in rows {
            writeln!(file, "{row}").unwrap();
        }
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_single_region_shape_and_values() {
        let file = write_csv(&[
            "GrIS,ALL,2030,2,0,0,m,0.4",
            "GrIS,ALL,2020,1,0,0,m,0.1",
            "GrIS,ALL,2030,1,0,0,m,0.3",
            "GrIS,ALL,2020,2,0,0,m,0.2",
            "GrIS,ALL,2100,1,0,0,m,2.0",
        ]);
        let out = extract_single(file.path(), IceSource::Gris).unwrap();

        assert_eq!(out.years, vec![2020, 2030, 2100]);
        assert_eq!(out.data.shape(), (2, 3));
        assert_eq!(out.data.get(0, 0), Some(1.0));
        assert_eq!(out.data.get(1, 1), Some(4.0));
        assert_eq!(out.data.get(0, 2), Some(20.0));
        // Sample 2 has no 2100 row.
        assert_eq!(out.data.get(1, 2), None);
    }

    #[test]
    fn test_ice_sheet_regions() {
        let file = write_csv(&[
            "AIS,WAIS,2020,1,0,0,m,1",
            "AIS,EAIS,2020,1,0,0,m,2",
            "AIS,PEN,2020,1,0,0,m,3",
            "GrIS,ALL,2020,1,0,0,m,99",
        ]);
        let out = extract_ice_sheet(file.path()).unwrap();
        assert_eq!(out.data.shape(), (3, 1, 1));
        assert_eq!(out.data.region(IceSheetRegion::Wais.index()).get(0, 0), Some(10.0));
        assert_eq!(out.data.region(IceSheetRegion::Eais.index()).get(0, 0), Some(20.0));
        assert_eq!(out.data.region(IceSheetRegion::Pen.index()).get(0, 0), Some(30.0));
    }

    #[test]
    fn test_ice_sheet_unknown_region_is_fatal() {
        let file = write_csv(&["AIS,ROSS,2020,1,0,0,m,1"]);
        assert!(matches!(
            extract_ice_sheet(file.path()),
            Err(ExtractError::UnknownRegion(_))
        ));
    }

    #[test]
    fn test_glacier_regions_are_indexed_by_id() {
        let file = write_csv(&[
            "Glaciers,region_2,2020,1,0,0,m,5",
            "Glaciers,region_1,2020,1,0,0,m,7",
        ]);
        let out = extract_glaciers(file.path()).unwrap();
        assert_eq!(out.data.shape(), (2, 1, 1));
        assert_eq!(out.data.region(0).get(0, 0), Some(70.0));
        assert_eq!(out.data.region(1).get(0, 0), Some(50.0));
    }

    #[test]
    fn test_glacier_region_gap_is_fatal() {
        let file = write_csv(&[
            "Glaciers,region_1,2020,1,0,0,m,5",
            "Glaciers,region_3,2020,1,0,0,m,7",
        ]);
        assert!(matches!(
            extract_glaciers(file.path()),
            Err(ExtractError::RegionGap { distinct: 2, .. })
        ));
    }

    #[test]
    fn test_sample_gap_is_fatal() {
        let file = write_csv(&["GrIS,ALL,2020,1,0,0,m,1", "GrIS,ALL,2020,3,0,0,m,1"]);
        assert!(matches!(
            extract_single(file.path(), IceSource::Gris),
            Err(ExtractError::SampleGap { distinct: 2, max: 3 })
        ));
    }

    #[test]
    fn test_no_rows_for_source() {
        let file = write_csv(&["AIS,WAIS,2020,1,0,0,m,1"]);
        assert!(matches!(
            extract_single(file.path(), IceSource::Gris),
            Err(ExtractError::NoRows(_))
        ));
    }

    #[test]
    fn test_extraction_is_repeatable() {
        let file = write_csv(&[
            "Glaciers,region_1,2020,1,0,0,m,0.123456789",
            "Glaciers,region_1,2030,1,0,0,m,-3.3",
        ]);
        let a = extract_glaciers(file.path()).unwrap();
        let b = extract_glaciers(file.path()).unwrap();
        assert_eq!(a, b);
    }
}
