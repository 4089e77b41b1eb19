//! Antarctic sub-region trend correction and summation.

use tracing::debug;

use super::AggregateError;
use crate::extract::IceSheetRegion;
use crate::series::{RegionSeries, SampleSeries};
use crate::trend::{component, FitParameters, LinearTrend, QuantileDraw};

/// Trend-corrected Antarctic sub-regions.
#[derive(Debug, Clone, PartialEq)]
pub struct IceSheetComponents {
    pub eais: SampleSeries,
    pub wais: SampleSeries,
    pub pen: SampleSeries,
}

impl IceSheetComponents {
    /// Global Antarctic total: EAIS + WAIS + PEN.
    pub fn total(&self) -> Result<SampleSeries, AggregateError> {
        Ok(SampleSeries::sum_all(&[&self.eais, &self.wais, &self.pen])?)
    }

    /// West Antarctic series as reported downstream: WAIS + PEN.
    ///
    /// The peninsula is folded into WAIS so that consumers see two
    /// components ("EAIS", "WAIS").
    pub fn wais_with_peninsula(&self) -> Result<SampleSeries, AggregateError> {
        Ok(self.wais.checked_add(&self.pen)?)
    }
}

fn component_name(region: IceSheetRegion) -> &'static str {
    match region {
        IceSheetRegion::Wais => component::WAIS,
        IceSheetRegion::Eais => component::EAIS,
        IceSheetRegion::Pen => component::PEN,
    }
}

/// Adds each sub-region's correlated trend, sharing one quantile draw.
pub fn apply_ice_sheet_trends(
    regions: RegionSeries,
    draw: &QuantileDraw,
    fit: &FitParameters,
    years: &[i32],
    baseyear: i32,
) -> Result<IceSheetComponents, AggregateError> {
    let (nregions, _, _) = regions.shape();
    if nregions != IceSheetRegion::COUNT {
        return Err(AggregateError::RegionCount {
            expected: IceSheetRegion::COUNT,
            found: nregions,
        });
    }

    let mut series = regions.into_regions();
    for region in IceSheetRegion::all() {
        let distribution = fit.component(component_name(region))?;
        let trend = LinearTrend::from_draw(distribution, draw, years, baseyear)?;
        trend.apply(&mut series[region.index()])?;
        debug!(region = region.label(), "applied ice-sheet trend");
    }

    let mut take = |region: IceSheetRegion| {
        std::mem::replace(&mut series[region.index()], SampleSeries::missing(0, 0))
    };
    Ok(IceSheetComponents {
        wais: take(IceSheetRegion::Wais),
        eais: take(IceSheetRegion::Eais),
        pen: take(IceSheetRegion::Pen),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trend::{TrendDistribution, DEFAULT_TREND_SEED};

    fn regions_with(values: [f64; 3]) -> RegionSeries {
        let mut regions = RegionSeries::missing(3, 2, 2);
        for region in IceSheetRegion::all() {
            for s in 0..2 {
                for y in 0..2 {
                    regions.region_mut(region.index()).set(s, y, values[region.index()]);
                }
            }
        }
        regions
    }

    #[test]
    fn test_total_is_sum_of_corrected_regions() {
        let draw = QuantileDraw::generate(2, DEFAULT_TREND_SEED);
        let fit = FitParameters::antarctica();
        let years = [2020, 2030];
        let out = apply_ice_sheet_trends(regions_with([1.0, 2.0, 3.0]), &draw, &fit, &years, 2005).unwrap();
        let total = out.total().unwrap();

        for s in 0..2 {
            for y in 0..2 {
                let expected = out.eais.get(s, y).unwrap() + out.wais.get(s, y).unwrap() + out.pen.get(s, y).unwrap();
                assert_eq!(total.get(s, y), Some(expected));
            }
        }
    }

    #[test]
    fn test_trend_values_follow_shared_quantile() {
        let draw = QuantileDraw::generate(2, 7);
        let mut fit = FitParameters::antarctica();
        fit.components.insert(
            component::WAIS.to_string(),
            TrendDistribution::TruncatedNormal { mean: 1.0, sd: 0.0, lower: 0.0 },
        );
        let out = apply_ice_sheet_trends(regions_with([0.0, 0.0, 0.0]), &draw, &fit, &[2015, 2025], 2005).unwrap();
        // Point-mass rate of 1 mm/yr.
        assert_eq!(out.wais.get(0, 0), Some(10.0));
        assert_eq!(out.wais.get(1, 1), Some(20.0));
        // Truncated components never subtract.
        assert!(out.eais.values().iter().all(|v| v.unwrap() >= 0.0));
    }

    #[test]
    fn test_wais_with_peninsula() {
        let draw = QuantileDraw::generate(2, DEFAULT_TREND_SEED);
        let fit = FitParameters::antarctica();
        let out = apply_ice_sheet_trends(regions_with([1.0, 2.0, 3.0]), &draw, &fit, &[2005, 2006], 2005).unwrap();
        let west = out.wais_with_peninsula().unwrap();
        // At baseyear the trend is zero.
        assert_eq!(west.get(0, 0), Some(4.0));
    }

    #[test]
    fn test_missing_component_parameters() {
        let draw = QuantileDraw::generate(2, DEFAULT_TREND_SEED);
        let mut fit = FitParameters::antarctica();
        fit.components.remove(component::PEN);
        assert!(matches!(
            apply_ice_sheet_trends(regions_with([0.0; 3]), &draw, &fit, &[2020, 2030], 2005),
            Err(AggregateError::Trend(_))
        ));
    }
}
