//! Population-level statistics over feature columns.
//!
//! Shared by normalization, anomaly detection and the deployed model:
//! per-column population mean and standard deviation, plus the degeneracy
//! guard that turns zero-variance columns into zeros instead of NaN.

use serde::{Deserialize, Serialize};

/// Per-column population mean and standard deviation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulationStats {
    pub means: Vec<f64>,
    pub std_devs: Vec<f64>,
}

impl PopulationStats {
    /// Compute population (divide-by-n) mean and std per column.
    ///
    /// Rows shorter than the first row only contribute to the columns they have.
    pub fn from_rows(rows: &[Vec<f64>]) -> Self {
        if rows.is_empty() {
            return Self {
                means: Vec::new(),
                std_devs: Vec::new(),
            };
        }

        let dim = rows[0].len();
        let n = rows.len() as f64;

        let mut means = vec![0.0; dim];
        for row in rows {
            for (m, v) in means.iter_mut().zip(row) {
                *m += v;
            }
        }
        for m in &mut means {
            *m /= n;
        }

        let mut variance = vec![0.0; dim];
        for row in rows {
            for ((acc, v), m) in variance.iter_mut().zip(row).zip(&means) {
                let diff = v - m;
                *acc += diff * diff;
            }
        }

        let std_devs = variance.iter().map(|v| (v / n).sqrt()).collect();

        Self { means, std_devs }
    }

    pub fn dim(&self) -> usize {
        self.means.len()
    }

    /// Whether column `i` has (numerically) no spread.
    pub fn is_degenerate(&self, i: usize) -> bool {
        is_degenerate_std(self.std_devs[i], self.means[i])
    }

    /// Z-score of `value` in column `i`, or `None` for a degenerate column.
    pub fn z_score(&self, i: usize, value: f64) -> Option<f64> {
        if self.is_degenerate(i) {
            None
        } else {
            Some((value - self.means[i]) / self.std_devs[i])
        }
    }

    /// Z-score every column of `row`; degenerate columns map to 0.
    pub fn standardize(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .enumerate()
            .map(|(i, &v)| self.z_score(i, v).unwrap_or(0.0))
            .collect()
    }
}

/// Spread below floating-point noise relative to the column's magnitude.
///
/// Summing identical non-representable values (e.g. 0.86) leaves a residual
/// around 1e-16 in the std; that must count as zero variance.
pub fn is_degenerate_std(std: f64, mean: f64) -> bool {
    !std.is_finite() || std <= 1e-9 * (1.0 + mean.abs())
}

/// Population variance of a single column of values.
pub fn population_variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn population_stats_basic() {
        let data = vec![vec![1.0, 2.0], vec![3.0, 4.0]];
        let stats = PopulationStats::from_rows(&data);
        assert_eq!(stats.dim(), 2);
        assert!((stats.means[0] - 2.0).abs() < 1e-10);
        assert!((stats.means[1] - 3.0).abs() < 1e-10);
        assert!((stats.std_devs[0] - 1.0).abs() < 1e-10);
    }

    #[test]
    fn population_stats_empty() {
        let stats = PopulationStats::from_rows(&[]);
        assert!(stats.means.is_empty());
        assert!(stats.std_devs.is_empty());
    }

    #[test]
    fn constant_column_is_degenerate_even_with_rounding_noise() {
        let data = vec![vec![0.86, 1.0]; 10];
        let stats = PopulationStats::from_rows(&data);
        assert!(stats.is_degenerate(0));
        assert!(stats.is_degenerate(1));
        assert_eq!(stats.z_score(0, 0.86), None);
        assert_eq!(stats.standardize(&[0.86, 1.0]), vec![0.0, 0.0]);
    }

    #[test]
    fn z_score_of_spread_column() {
        let data = vec![vec![1.0], vec![3.0]];
        let stats = PopulationStats::from_rows(&data);
        assert_eq!(stats.z_score(0, 3.0), Some(1.0));
        assert_eq!(stats.z_score(0, 1.0), Some(-1.0));
    }

    #[test]
    fn variance_of_column() {
        assert!((population_variance(&[1.0, 3.0]) - 1.0).abs() < 1e-12);
        assert_eq!(population_variance(&[]), 0.0);
        assert_eq!(population_variance(&[5.0]), 0.0);
    }
}
