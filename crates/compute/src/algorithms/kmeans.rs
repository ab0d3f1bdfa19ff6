use rand::Rng;
use serde::Serialize;
use tracing::debug;

pub use vitals_core::InitMethod;

use super::distance::{euclidean, squared_euclidean};
use crate::error::ComputeError;

/// Default Lloyd's iteration cap.
pub const DEFAULT_MAX_ITERATIONS: usize = 300;

/// Default convergence threshold on the change in inertia.
pub const DEFAULT_TOLERANCE: f64 = 1e-4;

/// Result of a full batch K-means run.
#[derive(Debug, Clone, Serialize)]
pub struct KmeansResult {
    /// Cluster index of each input row, in input order.
    pub assignments: Vec<usize>,
    /// Final centroid vectors, indexed by cluster id.
    pub centroids: Vec<Vec<f64>>,
    /// Number of clusters.
    pub k: usize,
    /// Number of Lloyd's iterations performed.
    pub iterations: usize,
    /// Whether the inertia change dropped below tolerance before the cap.
    pub converged: bool,
    /// Sum of squared distances from each point to its assigned centroid.
    pub inertia: f64,
    /// Inertia against the initial centroids, then after each iteration.
    pub inertia_history: Vec<f64>,
    /// Mean silhouette over all points, in [-1, 1]; 0 when k == 1.
    pub silhouette_score: f64,
}

impl KmeansResult {
    /// Number of points assigned to each cluster.
    pub fn cluster_sizes(&self) -> Vec<usize> {
        cluster_sizes(&self.assignments, self.k)
    }

    /// Row indices assigned to `cluster`, in input order.
    pub fn members_of(&self, cluster: usize) -> impl Iterator<Item = usize> + '_ {
        self.assignments
            .iter()
            .enumerate()
            .filter(move |(_, &c)| c == cluster)
            .map(|(i, _)| i)
    }
}

/// Lloyd's K-means with K-means++ (or random) seeding.
///
/// Randomness comes from the generator passed to [`AdvancedKMeans::cluster`],
/// so a seeded generator gives reproducible assignments.
#[derive(Debug, Clone)]
pub struct AdvancedKMeans {
    k: usize,
    max_iterations: usize,
    tolerance: f64,
    init: InitMethod,
}

impl AdvancedKMeans {
    /// K-means with default iteration cap, tolerance and K-means++ seeding.
    pub fn new(k: usize) -> Self {
        Self::with_params(k, DEFAULT_MAX_ITERATIONS, DEFAULT_TOLERANCE, InitMethod::KMeansPlusPlus)
    }

    pub fn with_params(k: usize, max_iterations: usize, tolerance: f64, init: InitMethod) -> Self {
        Self {
            k,
            max_iterations,
            tolerance,
            init,
        }
    }

    /// Cluster `data` (one row per point) into `k` groups.
    ///
    /// Fails without a partial result when `data` is empty, `k` is 0 or
    /// larger than the number of rows, or rows differ in length.
    pub fn cluster<R: Rng + ?Sized>(
        &self,
        data: &[Vec<f64>],
        rng: &mut R,
    ) -> Result<KmeansResult, ComputeError> {
        validate_dataset(data, self.k)?;

        let k = self.k;
        let n = data.len();

        let mut centroids = match self.init {
            InitMethod::KMeansPlusPlus => kmeanspp_init(data, k, rng),
            InitMethod::Random => random_init(data, k, rng),
        };

        let mut assignments: Vec<usize> = data
            .iter()
            .map(|point| nearest_centroid(point, &centroids))
            .collect();
        let mut inertia_history = vec![compute_inertia(data, &assignments, &centroids)];

        let mut previous = f64::INFINITY;
        let mut iterations = 0;
        let mut converged = false;

        for _ in 0..self.max_iterations {
            iterations += 1;

            // Assignment step.
            for (slot, point) in assignments.iter_mut().zip(data) {
                *slot = nearest_centroid(point, &centroids);
            }

            // Update step.
            let reseeded = update_centroids(data, &assignments, &mut centroids, rng);
            if reseeded > 0 {
                debug!(k, reseeded, iteration = iterations, "reseeded empty clusters");
            }

            let inertia = compute_inertia(data, &assignments, &centroids);
            inertia_history.push(inertia);

            if (previous - inertia).abs() < self.tolerance {
                converged = true;
                break;
            }
            previous = inertia;
        }

        let repaired = fill_empty_clusters(data, &mut assignments, &mut centroids);
        let inertia = compute_inertia(data, &assignments, &centroids);
        if repaired > 0 {
            debug!(k, repaired, "moved points into clusters left empty");
            inertia_history.push(inertia);
        }

        let silhouette_score = silhouette_score(data, &assignments, k);

        debug!(
            k,
            n,
            iterations,
            converged,
            inertia,
            silhouette = silhouette_score,
            "k-means run complete"
        );

        Ok(KmeansResult {
            assignments,
            centroids,
            k,
            iterations,
            converged,
            inertia,
            inertia_history,
            silhouette_score,
        })
    }
}

/// Compute the mean silhouette score for an assignment.
///
/// For each point i:
///   a(i) = average distance to other points in the same cluster (0 if alone)
///   b(i) = minimum average distance to points in any other non-empty cluster
///   s(i) = (b(i) - a(i)) / max(a(i), b(i)), or 0 when no other cluster has points
///
/// Returns the mean s(i) across all points. Range: [-1, 1]. Defined as 0 when k <= 1.
pub fn silhouette_score(data: &[Vec<f64>], assignments: &[usize], k: usize) -> f64 {
    let n = data.len();
    if n <= 1 || k <= 1 {
        return 0.0;
    }

    let mut members: Vec<Vec<usize>> = vec![Vec::new(); k];
    for (i, &c) in assignments.iter().enumerate() {
        members[c].push(i);
    }

    let mut total = 0.0;
    for (i, point) in data.iter().enumerate() {
        let own = assignments[i];
        let own_members = &members[own];

        let a = if own_members.len() <= 1 {
            0.0
        } else {
            let sum: f64 = own_members
                .iter()
                .filter(|&&j| j != i)
                .map(|&j| euclidean(point, &data[j]))
                .sum();
            sum / (own_members.len() - 1) as f64
        };

        let mut b = f64::INFINITY;
        for (cid, others) in members.iter().enumerate() {
            if cid == own || others.is_empty() {
                continue;
            }
            let avg = others.iter().map(|&j| euclidean(point, &data[j])).sum::<f64>()
                / others.len() as f64;
            b = b.min(avg);
        }

        let s = if b.is_infinite() {
            0.0
        } else {
            let max_ab = a.max(b);
            if max_ab > 0.0 { (b - a) / max_ab } else { 0.0 }
        };
        total += s.clamp(-1.0, 1.0);
    }

    total / n as f64
}

/// Sum of squared distances from each point to its assigned centroid.
pub fn compute_inertia(data: &[Vec<f64>], assignments: &[usize], centroids: &[Vec<f64>]) -> f64 {
    data.iter()
        .zip(assignments)
        .map(|(point, &c)| squared_euclidean(point, &centroids[c]))
        .sum()
}

// ── Internal helpers ─────────────────────────────────────────

fn validate_dataset(data: &[Vec<f64>], k: usize) -> Result<(), ComputeError> {
    if data.is_empty() {
        return Err(ComputeError::EmptyDataset);
    }
    if k == 0 || k > data.len() {
        return Err(ComputeError::InvalidK { k, n: data.len() });
    }
    let dim = data[0].len();
    if let Some((row, found)) = data
        .iter()
        .enumerate()
        .find(|(_, p)| p.len() != dim)
        .map(|(row, p)| (row, p.len()))
    {
        return Err(ComputeError::DimensionMismatch {
            row,
            expected: dim,
            found,
        });
    }
    Ok(())
}

/// K-means++ initialization: pick k centroids with D²-weighted sampling.
fn kmeanspp_init<R: Rng + ?Sized>(data: &[Vec<f64>], k: usize, rng: &mut R) -> Vec<Vec<f64>> {
    let n = data.len();
    let mut centroids = Vec::with_capacity(k);

    let first = data[rng.gen_range(0..n)].clone();
    let mut nearest_d2: Vec<f64> = data.iter().map(|p| squared_euclidean(p, &first)).collect();
    centroids.push(first);

    while centroids.len() < k {
        let total: f64 = nearest_d2.iter().sum();

        let idx = if total > 0.0 && total.is_finite() {
            // Roulette wheel over cumulative D².
            let target = rng.gen::<f64>() * total;
            let mut cumulative = 0.0;
            let mut chosen = None;
            for (i, &d2) in nearest_d2.iter().enumerate() {
                cumulative += d2;
                if d2 > 0.0 && cumulative >= target {
                    chosen = Some(i);
                    break;
                }
            }
            // Rounding can leave the target just past the final sum.
            chosen.unwrap_or_else(|| nearest_d2.iter().rposition(|&d2| d2 > 0.0).unwrap_or(0))
        } else {
            // Every point coincides with a chosen centroid.
            rng.gen_range(0..n)
        };

        let centroid = data[idx].clone();
        for (d2, point) in nearest_d2.iter_mut().zip(data) {
            *d2 = d2.min(squared_euclidean(point, &centroid));
        }
        centroids.push(centroid);
    }

    centroids
}

/// Random initialization: k distinct rows chosen uniformly.
fn random_init<R: Rng + ?Sized>(data: &[Vec<f64>], k: usize, rng: &mut R) -> Vec<Vec<f64>> {
    rand::seq::index::sample(rng, data.len(), k)
        .into_iter()
        .map(|i| data[i].clone())
        .collect()
}

/// Find the index of the nearest centroid (ties go to the lowest index).
fn nearest_centroid(point: &[f64], centroids: &[Vec<f64>]) -> usize {
    let mut best_idx = 0;
    let mut best_dist = f64::INFINITY;
    for (i, centroid) in centroids.iter().enumerate() {
        let dist = squared_euclidean(point, centroid);
        if dist < best_dist {
            best_dist = dist;
            best_idx = i;
        }
    }
    best_idx
}

fn cluster_sizes(assignments: &[usize], k: usize) -> Vec<usize> {
    let mut counts = vec![0usize; k];
    for &c in assignments {
        counts[c] += 1;
    }
    counts
}

/// Recompute centroids as member means. A centroid with no members is
/// reseeded to a uniformly random row. Returns the number reseeded.
fn update_centroids<R: Rng + ?Sized>(
    data: &[Vec<f64>],
    assignments: &[usize],
    centroids: &mut [Vec<f64>],
    rng: &mut R,
) -> usize {
    let dim = data[0].len();
    let k = centroids.len();
    let mut sums = vec![vec![0.0; dim]; k];
    let mut counts = vec![0usize; k];

    for (point, &c) in data.iter().zip(assignments) {
        counts[c] += 1;
        for (acc, &val) in sums[c].iter_mut().zip(point) {
            *acc += val;
        }
    }

    let mut reseeded = 0;
    for ((centroid, sum), &count) in centroids.iter_mut().zip(sums).zip(&counts) {
        if count > 0 {
            let count = count as f64;
            *centroid = sum.into_iter().map(|v| v / count).collect();
        } else {
            centroid.clone_from(&data[rng.gen_range(0..data.len())]);
            reseeded += 1;
        }
    }
    reseeded
}

/// Mean of the rows assigned to `cluster`; `None` when it has no members.
fn member_mean(data: &[Vec<f64>], assignments: &[usize], cluster: usize) -> Option<Vec<f64>> {
    let dim = data[0].len();
    let mut sum = vec![0.0; dim];
    let mut count = 0usize;
    for (point, _) in data.iter().zip(assignments).filter(|(_, &c)| c == cluster) {
        count += 1;
        for (acc, &val) in sum.iter_mut().zip(point) {
            *acc += val;
        }
    }
    (count > 0).then(|| sum.into_iter().map(|v| v / count as f64).collect())
}

/// Give every empty cluster a member: the point lying farthest from its
/// centroid among multi-member clusters moves over and becomes the new
/// centroid, and its old cluster's centroid is recomputed. Neither move
/// increases inertia. Returns the number of clusters filled.
fn fill_empty_clusters(
    data: &[Vec<f64>],
    assignments: &mut [usize],
    centroids: &mut [Vec<f64>],
) -> usize {
    let k = centroids.len();
    let mut filled = 0;

    loop {
        let counts = cluster_sizes(assignments, k);
        let Some(empty) = counts.iter().position(|&c| c == 0) else {
            break;
        };

        let donor = assignments
            .iter()
            .enumerate()
            .filter(|(_, &c)| counts[c] > 1)
            .map(|(i, &c)| (i, squared_euclidean(&data[i], &centroids[c])))
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| i);

        // No multi-member cluster means k > n, which validation rules out.
        let Some(i) = donor else {
            break;
        };

        let from = assignments[i];
        assignments[i] = empty;
        centroids[empty] = data[i].clone();
        if let Some(mean) = member_mean(data, assignments, from) {
            centroids[from] = mean;
        }
        filled += 1;
    }

    filled
}
