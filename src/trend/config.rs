//! Fit-stage trend parameters for each ice source.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{TrendDistribution, TrendError};
use crate::extract::IceSource;

/// Component names used in fit parameters and projection bundles.
pub mod component {
    pub const EAIS: &str = "EAIS";
    pub const WAIS: &str = "WAIS";
    pub const PEN: &str = "PEN";
    pub const GIS: &str = "GIS";
    pub const GLACIERS: &str = "Glaciers";
}

/// Lower bound applied to ice-sheet drift rates.
pub const ICE_SHEET_RATE_FLOOR: f64 = 0.0;

/// Trend distributions supplied by a module's fit stage.
///
/// Units: mm/yr of sea-level-equivalent drift relative to the baseyear.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitParameters {
    pub source: IceSource,
    pub components: BTreeMap<String, TrendDistribution>,
}

impl FitParameters {
    /// Antarctic defaults: one truncated normal per sub-region.
    ///
    /// Placeholder rates. Fitted values come from the `[fit]` table.
    pub fn antarctica() -> Self {
        let truncated = |mean: f64, sd: f64| TrendDistribution::TruncatedNormal {
            mean,
            sd,
            lower: ICE_SHEET_RATE_FLOOR,
        };
        let components = BTreeMap::from([
            (component::EAIS.to_string(), truncated(0.09, 0.04)),
            (component::WAIS.to_string(), truncated(0.18, 0.09)),
            (component::PEN.to_string(), truncated(0.02, 0.01)),
        ]);
        Self { source: IceSource::Ais, components }
    }

    /// Greenland defaults: a single truncated normal. Placeholder rates, as
    /// for [`FitParameters::antarctica`].
    pub fn greenland() -> Self {
        let components = BTreeMap::from([(
            component::GIS.to_string(),
            TrendDistribution::TruncatedNormal {
                mean: 0.19,
                sd: 0.1,
                lower: ICE_SHEET_RATE_FLOOR,
            },
        )]);
        Self { source: IceSource::Gris, components }
    }

    /// Glacier defaults: an unbounded normal population trend.
    pub fn glaciers() -> Self {
        let components = BTreeMap::from([(
            component::GLACIERS.to_string(),
            TrendDistribution::Normal { mean: 0.7, sd: 0.1 },
        )]);
        Self { source: IceSource::Glaciers, components }
    }

    /// Default parameters for `source`.
    pub fn for_source(source: IceSource) -> Self {
        match source {
            IceSource::Ais => Self::antarctica(),
            IceSource::Gris => Self::greenland(),
            IceSource::Glaciers => Self::glaciers(),
        }
    }

    /// Looks up a component's distribution.
    pub fn component(&self, name: &str) -> Result<&TrendDistribution, TrendError> {
        self.components
            .get(name)
            .ok_or_else(|| TrendError::MissingComponent(name.to_string()))
    }

    /// Validates every component distribution.
    pub fn validate(&self) -> Result<(), TrendError> {
        self.components.values().try_for_each(TrendDistribution::validate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_validate() {
        for source in IceSource::all() {
            let fit = FitParameters::for_source(source);
            assert_eq!(fit.source, source);
            fit.validate().unwrap();
        }
    }

    #[test]
    fn test_antarctica_components_are_truncated_at_zero() {
        let fit = FitParameters::antarctica();
        for name in [component::EAIS, component::WAIS, component::PEN] {
            assert!(matches!(
                fit.component(name).unwrap(),
                TrendDistribution::TruncatedNormal { lower, .. } if *lower == 0.0
            ));
        }
    }

    #[test]
    fn test_glacier_trend_matches_fit_stage() {
        let fit = FitParameters::glaciers();
        let d = fit.component(component::GLACIERS).unwrap();
        assert_eq!(d.mean(), 0.7);
        assert_eq!(d.sd(), 0.1);
    }

    #[test]
    fn test_missing_component() {
        let fit = FitParameters::greenland();
        assert!(matches!(fit.component("EAIS"), Err(TrendError::MissingComponent(_))));
    }
}
