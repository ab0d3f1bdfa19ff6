//! Clustering primitives: distance metrics, batch K-means and K selection.

pub mod distance;
pub mod kmeans;
pub mod optimal_k;

pub use distance::DistanceMetric;
pub use kmeans::{AdvancedKMeans, InitMethod, KmeansResult};
pub use optimal_k::OptimalKSelector;
