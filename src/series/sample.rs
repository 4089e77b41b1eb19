//! Sample×year series with explicit missing cells.

use serde::{Deserialize, Serialize};

use super::SeriesError;

/// Sea-level contribution (mm) per sample and target year.
///
/// Values are stored in row-major order (sample-major). A `None` cell marks
/// a (sample, year) pair the emulator did not produce; it is never treated
/// as a zero contribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleSeries {
    nsamps: usize,
    nyears: usize,
    values: Vec<Option<f64>>,
}

impl SampleSeries {
    /// Creates a series with every cell missing.
    pub fn missing(nsamps: usize, nyears: usize) -> Self {
        Self {
            nsamps,
            nyears,
            values: vec![None; nsamps * nyears],
        }
    }

    /// Creates a series by evaluating `f(sample, year)` for every cell.
    pub fn from_fn<F>(nsamps: usize, nyears: usize, mut f: F) -> Self
    where
        F: FnMut(usize, usize) -> Option<f64>,
    {
        let mut values = Vec::with_capacity(nsamps * nyears);
        for s in 0..nsamps {
            for y in 0..nyears {
                values.push(f(s, y));
            }
        }
        Self { nsamps, nyears, values }
    }

    /// Creates a fully observed series from row-major values.
    ///
    /// Returns `None` if `values.len() != nsamps * nyears`.
    pub fn from_values(nsamps: usize, nyears: usize, values: Vec<f64>) -> Option<Self> {
        if values.len() != nsamps * nyears {
            return None;
        }
        Some(Self {
            nsamps,
            nyears,
            values: values.into_iter().map(Some).collect(),
        })
    }

    pub fn nsamps(&self) -> usize {
        self.nsamps
    }

    pub fn nyears(&self) -> usize {
        self.nyears
    }

    /// Returns `(nsamps, nyears)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.nsamps, self.nyears)
    }

    #[inline]
    fn index(&self, sample: usize, year: usize) -> usize {
        debug_assert!(sample < self.nsamps && year < self.nyears);
        sample * self.nyears + year
    }

    /// Gets the value at a cell, or `None` if the cell is missing.
    pub fn get(&self, sample: usize, year: usize) -> Option<f64> {
        self.values[self.index(sample, year)]
    }

    /// Sets the value at a cell.
    pub fn set(&mut self, sample: usize, year: usize, value: f64) {
        let i = self.index(sample, year);
        self.values[i] = Some(value);
    }

    /// Row-major cell values.
    pub fn values(&self) -> &[Option<f64>] {
        &self.values
    }

    /// All years of one sample.
    pub fn row(&self, sample: usize) -> &[Option<f64>] {
        let start = sample * self.nyears;
        &self.values[start..start + self.nyears]
    }

    /// Number of missing cells.
    pub fn missing_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_none()).count()
    }

    /// True if the stored values fill the declared shape. Always holds for
    /// series built in-process; deserialized series must be checked.
    pub fn is_well_formed(&self) -> bool {
        self.values.len() == self.nsamps * self.nyears
    }

    /// Mean over samples at one year, ignoring missing cells.
    ///
    /// Returns `None` if every sample is missing at that year.
    pub fn observed_mean(&self, year: usize) -> Option<f64> {
        let mut sum = 0.0;
        let mut count = 0usize;
        for s in 0..self.nsamps {
            if let Some(v) = self.get(s, year) {
                sum += v;
                count += 1;
            }
        }
        (count > 0).then(|| sum / count as f64)
    }

    /// Adds `f(sample, year)` to every observed cell. Missing cells stay missing.
    pub fn add_with<F>(&mut self, mut f: F)
    where
        F: FnMut(usize, usize) -> f64,
    {
        let nyears = self.nyears;
        for (i, cell) in self.values.iter_mut().enumerate() {
            if let Some(v) = cell {
                *v += f(i / nyears, i % nyears);
            }
        }
    }

    /// Elementwise sum. A cell is missing if it is missing in either operand.
    pub fn checked_add(&self, other: &SampleSeries) -> Result<SampleSeries, SeriesError> {
        if self.shape() != other.shape() {
            return Err(SeriesError::ShapeMismatch {
                left_samples: self.nsamps,
                left_years: self.nyears,
                right_samples: other.nsamps,
                right_years: other.nyears,
            });
        }

        let values = self
            .values
            .iter()
            .zip(&other.values)
            .map(|(a, b)| Some((*a)? + (*b)?))
            .collect();

        Ok(SampleSeries {
            nsamps: self.nsamps,
            nyears: self.nyears,
            values,
        })
    }

    /// Sums a non-empty list of series with missing propagation.
    pub fn sum_all(series: &[&SampleSeries]) -> Result<SampleSeries, SeriesError> {
        let (first, rest) = series.split_first().ok_or(SeriesError::NoRegions)?;
        rest.iter()
            .try_fold((*first).clone(), |acc, s| acc.checked_add(s))
    }

    /// Converts to single precision, encoding missing cells as NaN.
    pub fn to_f32_filled(&self) -> Vec<f32> {
        self.values
            .iter()
            .map(|v| v.map_or(f32::NAN, |x| x as f32))
            .collect()
    }
}
