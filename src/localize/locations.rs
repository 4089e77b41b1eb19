//! Site location files.

use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::LocalizeError;

/// A point location to localize projections to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    pub name: String,
    pub id: i64,
    pub lat: f64,
    pub lon: f64,
}

/// Reads a tab-separated location file with rows `name  id  lat  lon`.
///
/// Blank lines are skipped. There is no header.
pub fn read_location_file(path: &Path) -> Result<Vec<Site>, LocalizeError> {
    let file = std::fs::File::open(path).map_err(|source| LocalizeError::Io {
        path: path.display().to_string(),
        source,
    })?;
    read_locations_from(file)
}

pub fn read_locations_from<R: Read>(reader: R) -> Result<Vec<Site>, LocalizeError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut sites = Vec::new();
    for result in reader.records() {
        let record = result?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        if record.iter().all(str::is_empty) {
            continue;
        }
        if record.len() < 4 {
            return Err(LocalizeError::MalformedLocation {
                line,
                detail: format!("expected 4 fields, found {}", record.len()),
            });
        }

        let id = parse_field::<i64>(&record, 1, "id", line)?;
        let lat = parse_field::<f64>(&record, 2, "lat", line)?;
        let lon = parse_field::<f64>(&record, 3, "lon", line)?;

        sites.push(Site {
            name: record[0].to_string(),
            id,
            lat,
            lon,
        });
    }
    Ok(sites)
}

fn parse_field<T: std::str::FromStr>(
    record: &csv::StringRecord,
    column: usize,
    name: &str,
    line: u64,
) -> Result<T, LocalizeError> {
    record[column].parse::<T>().map_err(|_| LocalizeError::MalformedLocation {
        line,
        detail: format!("invalid {name} '{}'", &record[column]),
    })
}
