//! Spatial fingerprints: global-to-local scaling factors.

use std::path::Path;

use super::{LocalizeError, Site};

/// Anything that can report a fingerprint value at a (lat, lon) point.
pub trait FingerprintSource: Send + Sync {
    /// Fingerprint at `lat`/`lon` (degrees), or `None` if unresolvable.
    fn fingerprint_at(&self, lat: f64, lon: f64) -> Option<f64>;
}

/// Fingerprint on a regular latitude/longitude grid.
///
/// Latitudes are stored ascending, longitudes ascending in `[0, 360)`.
/// Values are row-major `[lat][lon]`; NaN marks grid cells without data.
/// Only a grid whose longitudes circle the globe interpolates across the
/// 360 degree seam; a regional grid resolves nothing outside its span.
#[derive(Debug, Clone, PartialEq)]
pub struct FingerprintGrid {
    lats: Vec<f64>,
    lons: Vec<f64>,
    values: Vec<f64>,
    periodic: bool,
}

/// Relative slack when comparing the seam gap with the grid spacing.
const SEAM_TOLERANCE: f64 = 1e-6;

/// True if the gap from the last longitude across 360 to the first is no
/// wider than the widest interior spacing.
fn wraps_globe(lons: &[f64]) -> bool {
    let (Some(&first), Some(&last)) = (lons.first(), lons.last()) else {
        return false;
    };
    let widest = lons.windows(2).map(|w| w[1] - w[0]).fold(0.0, f64::max);
    if widest <= 0.0 {
        return false;
    }
    first + 360.0 - last <= widest * (1.0 + SEAM_TOLERANCE)
}

impl FingerprintGrid {
    /// Builds a grid, normalising axis order and longitude range.
    pub fn new(lats: Vec<f64>, lons: Vec<f64>, values: Vec<f64>) -> Result<Self, LocalizeError> {
        let (nlat, nlon) = (lats.len(), lons.len());
        if nlat == 0 || nlon == 0 || values.len() != nlat * nlon {
            return Err(LocalizeError::InvalidGrid(format!(
                "{nlat} latitudes x {nlon} longitudes with {} values",
                values.len()
            )));
        }

        // Latitude order: ascending, rows permuted to match.
        let mut lat_order: Vec<usize> = (0..nlat).collect();
        lat_order.sort_by(|&a, &b| lats[a].total_cmp(&lats[b]));

        // Longitude order: wrapped into [0, 360), ascending, duplicates dropped.
        let wrapped: Vec<f64> = lons.iter().map(|l| l.rem_euclid(360.0)).collect();
        let mut lon_order: Vec<usize> = (0..nlon).collect();
        lon_order.sort_by(|&a, &b| wrapped[a].total_cmp(&wrapped[b]));
        lon_order.dedup_by(|a, b| wrapped[*a] == wrapped[*b]);

        let sorted_lats: Vec<f64> = lat_order.iter().map(|&i| lats[i]).collect();
        if sorted_lats.windows(2).any(|w| w[0] == w[1]) || sorted_lats.iter().any(|l| !l.is_finite()) {
            return Err(LocalizeError::InvalidGrid("latitudes must be finite and distinct".into()));
        }
        let sorted_lons: Vec<f64> = lon_order.iter().map(|&j| wrapped[j]).collect();

        let mut grid_values = Vec::with_capacity(lat_order.len() * lon_order.len());
        for &i in &lat_order {
            for &j in &lon_order {
                grid_values.push(values[i * nlon + j]);
            }
        }

        let periodic = wraps_globe(&sorted_lons);
        Ok(Self {
            lats: sorted_lats,
            lons: sorted_lons,
            values: grid_values,
            periodic,
        })
    }

    /// Reads a fingerprint file with 1-D `lat`, `lon` and 2-D `fp` variables.
    pub fn from_netcdf(path: &Path) -> Result<Self, LocalizeError> {
        let file = netcdf::open(path)?;

        let read = |name: &'static str| -> Result<Vec<f64>, LocalizeError> {
            let var = file.variable(name).ok_or_else(|| LocalizeError::MissingVariable {
                path: path.display().to_string(),
                name,
            })?;
            let mut values = var.get_values::<f64, _>(..)?;
            if let Some(fill) = var.fill_value::<f64>()? {
                for v in values.iter_mut().filter(|v| **v == fill) {
                    *v = f64::NAN;
                }
            }
            Ok(values)
        };

        Self::new(read("lat")?, read("lon")?, read("fp")?)
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.lats.len(), self.lons.len())
    }

    fn value(&self, i: usize, j: usize) -> f64 {
        self.values[i * self.lons.len() + j]
    }

    fn lon_bracket(&self, lon: f64) -> Option<(usize, usize, f64)> {
        let x = lon.rem_euclid(360.0);
        if let Some(found) = bracket(&self.lons, x) {
            return Some(found);
        }
        if !self.periodic {
            return None;
        }
        // Periodic segment from the last longitude across 360 to the first.
        let n = self.lons.len();
        let (first, last) = (self.lons[0], self.lons[n - 1]);
        let span = first + 360.0 - last;
        let dx = if x > last { x - last } else { x + 360.0 - last };
        Some((n - 1, 0, dx / span))
    }
}

/// Finds `(lower, upper, t)` with `axis[lower] <= x <= axis[upper]`.
fn bracket(axis: &[f64], x: f64) -> Option<(usize, usize, f64)> {
    let n = axis.len();
    if n == 0 || !(x >= axis[0] && x <= axis[n - 1]) {
        return None;
    }
    if n == 1 {
        return Some((0, 0, 0.0));
    }
    let upper = axis.partition_point(|&a| a < x).clamp(1, n - 1);
    let lower = upper - 1;
    let t = (x - axis[lower]) / (axis[upper] - axis[lower]);
    Some((lower, upper, t))
}

impl FingerprintSource for FingerprintGrid {
    /// Bilinear interpolation. Points outside the grid, or whose
    /// contributing corners include missing cells, are unresolvable.
    fn fingerprint_at(&self, lat: f64, lon: f64) -> Option<f64> {
        if !lat.is_finite() || !lon.is_finite() {
            return None;
        }
        let (i0, i1, tl) = bracket(&self.lats, lat)?;
        let (j0, j1, tn) = self.lon_bracket(lon)?;

        let corners = [
            (i0, j0, (1.0 - tl) * (1.0 - tn)),
            (i0, j1, (1.0 - tl) * tn),
            (i1, j0, tl * (1.0 - tn)),
            (i1, j1, tl * tn),
        ];

        let mut sum = 0.0;
        for (i, j, w) in corners {
            if w == 0.0 {
                continue;
            }
            let v = self.value(i, j);
            if !v.is_finite() {
                return None;
            }
            sum += w * v;
        }
        Some(sum)
    }
}

/// Resolves one fingerprint value per site. Any unresolvable site is fatal.
pub fn resolve_fingerprints(
    source: &dyn FingerprintSource,
    sites: &[Site],
) -> Result<Vec<f64>, LocalizeError> {
    sites
        .iter()
        .map(|site| {
            source
                .fingerprint_at(site.lat, site.lon)
                .ok_or_else(|| LocalizeError::UnresolvedSite {
                    name: site.name.clone(),
                    id: site.id,
                    lat: site.lat,
                    lon: site.lon,
                })
        })
        .collect()
}
