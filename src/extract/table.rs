//! Streaming reader for the emulator's projection table.

use std::io::Read;
use std::path::Path;

use super::ExtractError;

/// Column holding the ice source label.
const COL_ICE_SOURCE: usize = 0;
/// Column holding the region label.
const COL_REGION: usize = 1;
const COL_YEAR: usize = 2;
const COL_SAMPLE: usize = 3;
/// Column holding the sea-level-equivalent contribution (cm).
const COL_SLE: usize = 7;

/// Emulator SLE is reported in centimetres.
pub const CM_TO_MM: f64 = 10.0;

/// One parsed row of emulator output.
#[derive(Debug, Clone, PartialEq)]
pub struct EmulatorRecord {
    pub region: String,
    pub year: i32,
    /// 1-based sample index.
    pub sample: u32,
    /// Contribution in millimetres (already converted).
    pub sle_mm: f64,
}

/// Reads all rows for `ice_source` from an emulator CSV file.
///
/// The header line is skipped. Rows for other ice sources are dropped
/// before their numeric fields are parsed.
pub fn read_records(path: &Path, ice_source: &str) -> Result<Vec<EmulatorRecord>, ExtractError> {
    let file = std::fs::File::open(path).map_err(|source| ExtractError::Io {
        path: path.display().to_string(),
        source,
    })?;
    read_records_from(file, ice_source)
}

/// Reads all rows for `ice_source` from any reader.
pub fn read_records_from<R: Read>(reader: R, ice_source: &str) -> Result<Vec<EmulatorRecord>, ExtractError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut records = Vec::new();
    let mut record = csv::StringRecord::new();

    while reader.read_record(&mut record)? {
        let line = record.position().map(|p| p.line()).unwrap_or(0);

        if record.get(COL_ICE_SOURCE) != Some(ice_source) {
            continue;
        }

        if record.len() <= COL_SLE {
            return Err(ExtractError::ShortRow {
                line,
                fields: record.len(),
                expected: COL_SLE + 1,
            });
        }

        let year = parse_field::<i32>(&record, COL_YEAR, "year", line)?;
        let sample = parse_field::<u32>(&record, COL_SAMPLE, "sample", line)?;
        let sle_cm = parse_field::<f64>(&record, COL_SLE, "sle", line)?;

        if sample == 0 {
            return Err(ExtractError::InvalidSample { line, sample });
        }

        records.push(EmulatorRecord {
            region: record[COL_REGION].to_string(),
            year,
            sample,
            sle_mm: sle_cm * CM_TO_MM,
        });
    }

    Ok(records)
}

fn parse_field<T: std::str::FromStr>(
    record: &csv::StringRecord,
    column: usize,
    name: &'static str,
    line: u64,
) -> Result<T, ExtractError> {
    let raw = &record[column];
    raw.parse::<T>().map_err(|_| ExtractError::MalformedField {
        line,
        column: name,
        value: raw.to_string(),
    })
}
