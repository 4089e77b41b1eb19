//! Ice sources and region labels found in emulator output.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::ExtractError;

/// Ice-mass source handled by one module invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IceSource {
    /// Antarctic ice sheet (three sub-regions).
    #[serde(rename = "AIS")]
    Ais,
    /// Greenland ice sheet (single region).
    #[serde(rename = "GrIS")]
    Gris,
    /// Glaciers (numbered regions).
    #[serde(rename = "Glaciers")]
    Glaciers,
}

impl IceSource {
    /// Label used in the emulator's `ice_source` column.
    pub fn label(&self) -> &'static str {
        match self {
            IceSource::Ais => "AIS",
            IceSource::Gris => "GrIS",
            IceSource::Glaciers => "Glaciers",
        }
    }

    pub fn all() -> [IceSource; 3] {
        [IceSource::Ais, IceSource::Gris, IceSource::Glaciers]
    }
}

impl fmt::Display for IceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for IceSource {
    type Err = ExtractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        IceSource::all()
            .into_iter()
            .find(|source| source.label().eq_ignore_ascii_case(s))
            .ok_or_else(|| ExtractError::UnknownIceSource(s.to_string()))
    }
}

/// Antarctic sub-region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IceSheetRegion {
    /// West Antarctic ice sheet.
    Wais,
    /// East Antarctic ice sheet.
    Eais,
    /// Antarctic peninsula.
    Pen,
}

impl IceSheetRegion {
    pub const COUNT: usize = 3;

    pub fn all() -> [IceSheetRegion; 3] {
        [IceSheetRegion::Wais, IceSheetRegion::Eais, IceSheetRegion::Pen]
    }

    /// Array index of this region.
    pub fn index(&self) -> usize {
        match self {
            IceSheetRegion::Wais => 0,
            IceSheetRegion::Eais => 1,
            IceSheetRegion::Pen => 2,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            IceSheetRegion::Wais => "WAIS",
            IceSheetRegion::Eais => "EAIS",
            IceSheetRegion::Pen => "PEN",
        }
    }

    /// Parses an emulator region label. Unknown labels are rejected.
    pub fn from_label(label: &str) -> Result<Self, ExtractError> {
        match label {
            "WAIS" => Ok(IceSheetRegion::Wais),
            "EAIS" => Ok(IceSheetRegion::Eais),
            "PEN" => Ok(IceSheetRegion::Pen),
            other => Err(ExtractError::UnknownRegion(other.to_string())),
        }
    }
}

/// Glacier region, labelled `region_<N>` with a 1-based identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GlacierRegion(u32);

impl GlacierRegion {
    pub fn new(id: u32) -> Option<Self> {
        (id >= 1).then_some(GlacierRegion(id))
    }

    /// 1-based region identifier.
    pub fn id(&self) -> u32 {
        self.0
    }

    /// Array index (`id - 1`).
    pub fn index(&self) -> usize {
        (self.0 - 1) as usize
    }

    pub fn from_label(label: &str) -> Result<Self, ExtractError> {
        let digits = label
            .strip_prefix("region_")
            .filter(|d| !d.is_empty() && d.bytes().all(|b| b.is_ascii_digit()))
            .ok_or_else(|| ExtractError::UnknownRegion(label.to_string()))?;

        digits
            .parse::<u32>()
            .ok()
            .and_then(GlacierRegion::new)
            .ok_or_else(|| ExtractError::UnknownRegion(label.to_string()))
    }
}

impl fmt::Display for GlacierRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "region_{}", self.0)
    }
}
