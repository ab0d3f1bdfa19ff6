use rand::Rng;
use tracing::debug;

use super::kmeans::{AdvancedKMeans, InitMethod, DEFAULT_TOLERANCE};
use crate::error::ComputeError;

/// Default largest K tried by the sweep.
pub const DEFAULT_MAX_K: usize = 10;

/// Lloyd's iteration cap for each candidate K.
pub const SELECTOR_MAX_ITERATIONS: usize = 100;

/// Picks K by maximizing the silhouette score over `2..=min(max_k, n / 2)`.
#[derive(Debug, Clone)]
pub struct OptimalKSelector {
    max_k: usize,
    max_iterations: usize,
    tolerance: f64,
}

impl Default for OptimalKSelector {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_K)
    }
}

impl OptimalKSelector {
    pub fn new(max_k: usize) -> Self {
        Self {
            max_k,
            max_iterations: SELECTOR_MAX_ITERATIONS,
            tolerance: DEFAULT_TOLERANCE,
        }
    }

    /// Override the per-candidate iteration cap and tolerance.
    pub fn with_iterations(mut self, max_iterations: usize, tolerance: f64) -> Self {
        self.max_iterations = max_iterations;
        self.tolerance = tolerance;
        self
    }

    /// Return the K with the highest silhouette score.
    ///
    /// Fewer than 2 rows gives 1. Each candidate gets a fresh K-means++ run;
    /// only a strictly greater score replaces the running best, so ties go
    /// to the smallest K. When the sweep range is empty (n < 4 or
    /// `max_k < 2`) the answer is `min(2, max_k)` floored at 1.
    pub fn find_optimal_k<R: Rng + ?Sized>(
        &self,
        data: &[Vec<f64>],
        rng: &mut R,
    ) -> Result<usize, ComputeError> {
        let n = data.len();
        if n < 2 {
            return Ok(1);
        }

        let upper_k = self.max_k.min(n / 2);
        let mut best_k = self.max_k.clamp(1, 2);
        let mut best_score = f64::NEG_INFINITY;

        for k in 2..=upper_k {
            let kmeans =
                AdvancedKMeans::with_params(k, self.max_iterations, self.tolerance, InitMethod::KMeansPlusPlus);
            let result = kmeans.cluster(data, rng)?;
            debug!(k, silhouette = result.silhouette_score, "evaluated candidate k");

            if result.silhouette_score > best_score {
                best_score = result.silhouette_score;
                best_k = k;
            }
        }

        debug!(best_k, best_score, upper_k, "selected k");
        Ok(best_k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn blobs(centers: &[(f64, f64)], count: usize) -> Vec<Vec<f64>> {
        centers
            .iter()
            .flat_map(|&(cx, cy)| (0..count).map(move |i| vec![cx + i as f64 * 0.1, cy - i as f64 * 0.1]))
            .collect()
    }

    #[test]
    fn finds_three_well_separated_groups() {
        let points = blobs(&[(0.0, 0.0), (100.0, 100.0), (200.0, 0.0)], 20);
        let k = OptimalKSelector::new(10)
            .find_optimal_k(&points, &mut StdRng::seed_from_u64(3))
            .unwrap();
        assert_eq!(k, 3);
    }

    #[test]
    fn finds_two_groups() {
        let points = blobs(&[(0.0, 0.0), (100.0, 100.0)], 20);
        let k = OptimalKSelector::new(8)
            .find_optimal_k(&points, &mut StdRng::seed_from_u64(3))
            .unwrap();
        assert_eq!(k, 2);
    }

    #[test]
    fn fewer_than_two_points_is_one() {
        let mut rng = StdRng::seed_from_u64(1);
        let selector = OptimalKSelector::default();
        assert_eq!(selector.find_optimal_k(&[], &mut rng).unwrap(), 1);
        assert_eq!(selector.find_optimal_k(&[vec![1.0]], &mut rng).unwrap(), 1);
    }

    #[test]
    fn empty_sweep_range_falls_back_to_two() {
        // n = 3 gives upper_k = 1, so nothing is evaluated.
        let points = vec![vec![0.0], vec![1.0], vec![5.0]];
        let k = OptimalKSelector::default()
            .find_optimal_k(&points, &mut StdRng::seed_from_u64(1))
            .unwrap();
        assert_eq!(k, 2);
    }

    #[test]
    fn never_exceeds_max_k() {
        let points = blobs(&[(0.0, 0.0), (50.0, 0.0), (100.0, 0.0), (150.0, 0.0)], 5);
        let k = OptimalKSelector::new(3)
            .find_optimal_k(&points, &mut StdRng::seed_from_u64(9))
            .unwrap();
        assert!((2..=3).contains(&k));

        let k = OptimalKSelector::new(1)
            .find_optimal_k(&points, &mut StdRng::seed_from_u64(9))
            .unwrap();
        assert_eq!(k, 1);
    }

    #[test]
    fn identical_points_tie_to_smallest_k() {
        // Every candidate scores 0, so the first one evaluated wins.
        let points = vec![vec![4.0, 4.0]; 10];
        let k = OptimalKSelector::default()
            .find_optimal_k(&points, &mut StdRng::seed_from_u64(5))
            .unwrap();
        assert_eq!(k, 2);
    }
}
