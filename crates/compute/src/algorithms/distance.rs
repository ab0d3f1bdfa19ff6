use serde::{Deserialize, Serialize};

/// Distance functions available to clustering callers.
///
/// The clustering loop always uses [`DistanceMetric::Euclidean`]; the other
/// metrics are utilities for callers comparing feature vectors directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    #[default]
    Euclidean,
    Manhattan,
    Cosine,
}

impl DistanceMetric {
    pub fn distance(&self, a: &[f64], b: &[f64]) -> f64 {
        match self {
            DistanceMetric::Euclidean => euclidean(a, b),
            DistanceMetric::Manhattan => manhattan(a, b),
            DistanceMetric::Cosine => cosine_distance(a, b),
        }
    }
}

/// Squared Euclidean distance.
#[inline]
pub fn squared_euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

/// Euclidean distance (with sqrt, for silhouette).
#[inline]
pub fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    squared_euclidean(a, b).sqrt()
}

/// Sum of absolute coordinate differences.
#[inline]
pub fn manhattan(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs()).sum()
}

/// `1 - cos(a, b)`, in [0, 2].
///
/// A zero-norm operand has no direction; its similarity is taken as 0,
/// giving distance 1.
pub fn cosine_distance(a: &[f64], b: &[f64]) -> f64 {
    let dot: f64 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f64>().sqrt();

    if norm_a <= f64::EPSILON || norm_b <= f64::EPSILON {
        return 1.0;
    }

    let similarity = (dot / (norm_a * norm_b)).clamp(-1.0, 1.0);
    1.0 - similarity
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn euclidean_3_4_5() {
        assert!((euclidean(&[0.0, 0.0], &[3.0, 4.0]) - 5.0).abs() < 1e-12);
        assert!((squared_euclidean(&[0.0, 0.0], &[3.0, 4.0]) - 25.0).abs() < 1e-12);
    }

    #[test]
    fn manhattan_sums_abs_diffs() {
        assert!((manhattan(&[1.0, -2.0], &[4.0, 2.0]) - 7.0).abs() < 1e-12);
    }

    #[test]
    fn cosine_of_parallel_and_orthogonal() {
        assert!(cosine_distance(&[1.0, 1.0], &[2.0, 2.0]).abs() < 1e-12);
        assert!((cosine_distance(&[1.0, 0.0], &[0.0, 5.0]) - 1.0).abs() < 1e-12);
        assert!((cosine_distance(&[1.0, 0.0], &[-1.0, 0.0]) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn cosine_with_zero_vector_is_finite() {
        let d = cosine_distance(&[0.0, 0.0], &[1.0, 2.0]);
        assert!(d.is_finite());
        assert!((d - 1.0).abs() < 1e-12);
    }

    #[test]
    fn metric_dispatch() {
        let a = [0.0, 0.0];
        let b = [3.0, 4.0];
        assert!((DistanceMetric::Euclidean.distance(&a, &b) - 5.0).abs() < 1e-12);
        assert!((DistanceMetric::Manhattan.distance(&a, &b) - 7.0).abs() < 1e-12);
        assert!((DistanceMetric::Cosine.distance(&a, &b) - 1.0).abs() < 1e-12);
    }
}
