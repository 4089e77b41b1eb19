//! Parametric trend-rate distributions inverted at a quantile.

use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};

use super::TrendError;

/// Distribution of a population-level linear trend rate (mm/yr).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum TrendDistribution {
    /// Unbounded normal distribution.
    Normal { mean: f64, sd: f64 },
    /// Normal distribution truncated below at `lower` (support `[lower, ∞)`).
    TruncatedNormal { mean: f64, sd: f64, lower: f64 },
}

impl TrendDistribution {
    pub fn mean(&self) -> f64 {
        match *self {
            TrendDistribution::Normal { mean, .. } | TrendDistribution::TruncatedNormal { mean, .. } => mean,
        }
    }

    pub fn sd(&self) -> f64 {
        match *self {
            TrendDistribution::Normal { sd, .. } | TrendDistribution::TruncatedNormal { sd, .. } => sd,
        }
    }

    /// Rejects non-finite parameters and negative standard deviations.
    pub fn validate(&self) -> Result<(), TrendError> {
        let (mean, sd) = (self.mean(), self.sd());
        let lower_ok = match *self {
            TrendDistribution::TruncatedNormal { lower, .. } => lower.is_finite(),
            TrendDistribution::Normal { .. } => true,
        };
        if !mean.is_finite() || !sd.is_finite() || sd < 0.0 || !lower_ok {
            return Err(TrendError::InvalidDistribution(*self));
        }
        Ok(())
    }

    /// Inverse CDF at quantile `q`.
    ///
    /// A zero standard deviation is a point mass at the mean (clamped to the
    /// lower bound for truncated distributions).
    pub fn inverse_cdf(&self, q: f64) -> Result<f64, TrendError> {
        self.validate()?;
        let std_normal = Normal::standard();

        let rate = match *self {
            TrendDistribution::Normal { mean, sd } => {
                if sd == 0.0 {
                    mean
                } else {
                    mean + sd * std_normal.inverse_cdf(q)
                }
            }
            TrendDistribution::TruncatedNormal { mean, sd, lower } => {
                if sd == 0.0 {
                    mean.max(lower)
                } else {
                    // Invert through the upper tail so a lower bound far
                    // below the mean does not lose precision.
                    let alpha = (lower - mean) / sd;
                    let tail = (1.0 - q) * std_normal.cdf(-alpha);
                    let z = -std_normal.inverse_cdf(tail);
                    (mean + sd * z).max(lower)
                }
            }
        };

        if !rate.is_finite() {
            return Err(TrendError::NonFiniteRate { quantile: q, distribution: *self });
        }
        Ok(rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() < tol
    }

    #[test]
    fn test_normal_median_is_mean() {
        let d = TrendDistribution::Normal { mean: 0.7, sd: 0.1 };
        assert!(close(d.inverse_cdf(0.5).unwrap(), 0.7, 1e-12));
    }

    #[test]
    fn test_normal_known_quantile() {
        let d = TrendDistribution::Normal { mean: 0.0, sd: 2.0 };
        // z(0.975) = 1.959964
        assert!(close(d.inverse_cdf(0.975).unwrap(), 2.0 * 1.959964, 1e-5));
    }

    #[test]
    fn test_truncated_respects_lower_bound() {
        let d = TrendDistribution::TruncatedNormal { mean: 0.1, sd: 0.5, lower: 0.0 };
        for i in 0..100 {
            let q = i as f64 / 100.0;
            assert!(d.inverse_cdf(q).unwrap() >= 0.0);
        }
    }

    #[test]
    fn test_truncated_at_mean_is_half_normal() {
        // Truncating at the mean leaves the upper half: median = mean + sd * z(0.75).
        let d = TrendDistribution::TruncatedNormal { mean: 1.0, sd: 1.0, lower: 1.0 };
        assert!(close(d.inverse_cdf(0.5).unwrap(), 1.0 + 0.6744898, 1e-5));
        assert!(close(d.inverse_cdf(0.0).unwrap(), 1.0, 1e-9));
    }

    #[test]
    fn test_truncation_far_below_mean_matches_normal() {
        let truncated = TrendDistribution::TruncatedNormal { mean: 10.0, sd: 1.0, lower: 0.0 };
        let normal = TrendDistribution::Normal { mean: 10.0, sd: 1.0 };
        for q in [0.1, 0.5, 0.9] {
            assert!(close(truncated.inverse_cdf(q).unwrap(), normal.inverse_cdf(q).unwrap(), 1e-9));
        }
    }

    #[test]
    fn test_inverse_is_monotone() {
        let d = TrendDistribution::TruncatedNormal { mean: 0.2, sd: 0.3, lower: 0.0 };
        let mut prev = f64::NEG_INFINITY;
        for i in 1..200 {
            let v = d.inverse_cdf(i as f64 / 200.0).unwrap();
            assert!(v >= prev);
            prev = v;
        }
    }

    #[test]
    fn test_zero_sd_is_point_mass() {
        let d = TrendDistribution::TruncatedNormal { mean: -0.5, sd: 0.0, lower: 0.0 };
        assert_eq!(d.inverse_cdf(0.3).unwrap(), 0.0);
        let d = TrendDistribution::Normal { mean: 0.4, sd: 0.0 };
        assert_eq!(d.inverse_cdf(0.9).unwrap(), 0.4);
    }

    #[test]
    fn test_invalid_parameters_rejected() {
        let d = TrendDistribution::Normal { mean: 0.0, sd: -1.0 };
        assert!(matches!(d.inverse_cdf(0.5), Err(TrendError::InvalidDistribution(_))));
        let d = TrendDistribution::Normal { mean: f64::NAN, sd: 1.0 };
        assert!(d.validate().is_err());
    }

    #[test]
    fn test_zero_quantile_of_normal_is_rejected() {
        let d = TrendDistribution::Normal { mean: 0.0, sd: 1.0 };
        assert!(matches!(d.inverse_cdf(0.0), Err(TrendError::NonFiniteRate { .. })));
    }
}
