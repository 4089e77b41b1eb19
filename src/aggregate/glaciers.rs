//! Glacier trend redistribution by early-period melt share.

use tracing::{debug, warn};

use super::AggregateError;
use crate::series::RegionSeries;
use crate::trend::LinearTrend;

/// Years after the first target year that bound the baseline window.
pub const BASELINE_WINDOW_YEARS: i32 = 10;

/// Index range `[start, end]` of the baseline window (inclusive).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BaselineWindow {
    pub start: usize,
    pub end: usize,
}

impl BaselineWindow {
    /// Window from the first target year to the last year within
    /// [`BASELINE_WINDOW_YEARS`] of it. `years` must be sorted ascending.
    pub fn from_years(years: &[i32]) -> Result<Self, AggregateError> {
        let first = *years.first().ok_or(AggregateError::NoYears)?;
        let end = years
            .iter()
            .rposition(|&y| y <= first + BASELINE_WINDOW_YEARS)
            .unwrap_or(0);
        Ok(Self { start: 0, end })
    }
}

/// Per-region melt over the baseline window:
/// `mean(end year) - mean(start year)` across samples, ignoring missing cells.
pub fn region_melt(regions: &RegionSeries, window: BaselineWindow) -> Result<Vec<f64>, AggregateError> {
    regions
        .iter()
        .enumerate()
        .map(|(i, series)| {
            let end = series.observed_mean(window.end);
            let start = series.observed_mean(window.start);
            match (end, start) {
                (Some(end), Some(start)) => Ok(end - start),
                _ => Err(AggregateError::UnobservedBaseline { region: i + 1 }),
            }
        })
        .collect()
}

/// Each region's share of total baseline melt.
///
/// Shares are not clamped: a region gaining mass while others lose it gets a
/// negative share and the others exceed their proportional weight.
pub fn melt_ratios(melt: &[f64]) -> Result<Vec<f64>, AggregateError> {
    let total: f64 = melt.iter().sum();
    if total == 0.0 || !total.is_finite() {
        return Err(AggregateError::UndefinedMeltShare { total });
    }

    let ratios: Vec<f64> = melt.iter().map(|m| m / total).collect();
    for (i, r) in ratios.iter().enumerate() {
        if *r < 0.0 || *r > 1.0 {
            warn!(region = i + 1, ratio = *r, "glacier melt share outside [0, 1]");
        }
    }
    Ok(ratios)
}

/// Redistributed glacier regions and the shares used.
#[derive(Debug, Clone, PartialEq)]
pub struct GlacierRedistribution {
    pub regions: RegionSeries,
    pub ratios: Vec<f64>,
    pub window: BaselineWindow,
}

/// Apportions `population` across regions by baseline melt share and adds
/// each region's portion to its series.
pub fn redistribute_trend(
    mut regions: RegionSeries,
    years: &[i32],
    population: &LinearTrend,
) -> Result<GlacierRedistribution, AggregateError> {
    let window = BaselineWindow::from_years(years)?;
    let melt = region_melt(&regions, window)?;
    let ratios = melt_ratios(&melt)?;
    debug!(?window, nregions = ratios.len(), "computed glacier melt shares");

    for (i, ratio) in ratios.iter().enumerate() {
        population.scaled(*ratio).apply(regions.region_mut(i))?;
    }

    Ok(GlacierRedistribution { regions, ratios, window })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_inclusive_boundary() {
        let w = BaselineWindow::from_years(&[2020, 2025, 2030, 2031, 2100]).unwrap();
        assert_eq!(w, BaselineWindow { start: 0, end: 2 });
    }

    #[test]
    fn test_window_single_year() {
        let w = BaselineWindow::from_years(&[2050]).unwrap();
        assert_eq!(w, BaselineWindow { start: 0, end: 0 });
        assert!(BaselineWindow::from_years(&[]).is_err());
    }

    #[test]
    fn test_melt_uses_observed_means() {
        let mut regions = RegionSeries::missing(1, 3, 2);
        let r = regions.region_mut(0);
        r.set(0, 0, 1.0);
        r.set(1, 0, 3.0);
        r.set(0, 1, 10.0);
        r.set(2, 1, 20.0);
        let melt = region_melt(&regions, BaselineWindow { start: 0, end: 1 }).unwrap();
        assert_eq!(melt, vec![15.0 - 2.0]);
    }

    #[test]
    fn test_unobserved_window_is_fatal() {
        let regions = RegionSeries::missing(2, 2, 2);
        assert!(matches!(
            region_melt(&regions, BaselineWindow { start: 0, end: 1 }),
            Err(AggregateError::UnobservedBaseline { region: 1 })
        ));
    }

    #[test]
    fn test_ratios_sum_to_one_and_may_be_negative() {
        let ratios = melt_ratios(&[3.0, -1.0, 0.5]).unwrap();
        let sum: f64 = ratios.iter().sum();
        assert!((sum - 1.0).abs() < 1e-12);
        assert!(ratios[1] < 0.0);
        assert!(ratios[0] > 1.0);
    }

    #[test]
    fn test_zero_total_melt_is_fatal() {
        assert!(matches!(
            melt_ratios(&[1.0, -1.0]),
            Err(AggregateError::UndefinedMeltShare { .. })
        ));
    }

    #[test]
    fn test_redistribution_is_broadcast_over_years() {
        let mut regions = RegionSeries::missing(2, 1, 3);
        for (y, v) in [0.0, 2.0, 4.0].into_iter().enumerate() {
            regions.region_mut(0).set(0, y, v);
            regions.region_mut(1).set(0, y, v * 3.0);
        }
        let years = [2020, 2030, 2040];
        let population = LinearTrend::constant(vec![2.0], 15.0, 3);
        let out = redistribute_trend(regions, &years, &population).unwrap();

        assert_eq!(out.window.end, 1);
        assert_eq!(out.ratios, vec![0.25, 0.75]);
        // region 0 gets 30 * 0.25 at every year
        assert_eq!(out.regions.region(0).row(0), &[Some(7.5), Some(9.5), Some(11.5)]);
        assert_eq!(out.regions.region(1).row(0), &[Some(22.5), Some(28.5), Some(34.5)]);
    }
}
