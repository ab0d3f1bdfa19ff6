use std::fmt;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::pipeline::features::{FeatureVector, FEATURE_NAMES};

/// Algorithm tag stamped on every full-pipeline result.
pub const ALGORITHM: &str = concat!("advanced-kmeans++-silhouette/v", env!("CARGO_PKG_VERSION"));

/// Coarse risk bucket. Ordered so `max` raises a level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    #[default]
    Low,
    Medium,
    High,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "low"),
            RiskLevel::Medium => write!(f, "medium"),
            RiskLevel::High => write!(f, "high"),
        }
    }
}

/// One cluster of the final K-means run, over normalized vectors.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterResult {
    /// 0-based position among the run's clusters. A deployed-model
    /// lookup instead carries the matched model cluster, so it need not
    /// be 0 there.
    pub cluster_id: usize,
    pub centroid: Vec<f64>,
    pub members: Vec<FeatureVector>,
    /// Squared distance of this cluster's members to its centroid.
    pub inertia: f64,
    /// Silhouette of the whole clustering this cluster belongs to.
    pub silhouette_score: f64,
}

impl ClusterResult {
    pub fn size(&self) -> usize {
        self.members.len()
    }
}

/// The assessment returned to callers.
///
/// Every collection serializes as an array or object, never null.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub id: Uuid,
    pub user_id: String,
    pub timestamp: DateTime<Utc>,
    pub algorithm: String,
    /// One entry per cluster after a pipeline run (`len() == optimal_k`).
    /// A deployed-model lookup reports only the matched cluster.
    pub clusters: Vec<ClusterResult>,
    /// K of the final run, or the deployed model's cluster count.
    pub optimal_k: usize,
    pub risk_level: RiskLevel,
    pub patterns: Vec<String>,
    pub recommendations: Vec<String>,
    /// Heuristic pattern-match strength in [0, 1], not a clinical probability.
    pub confidence: f64,
    /// Feature name → relative importance in [0, 1], in canonical feature order.
    pub feature_importance: IndexMap<String, f64>,
    pub anomalies: Vec<FeatureVector>,
}

impl AnalysisResult {
    /// Degraded result for histories too short to cluster.
    pub fn insufficient_data(user_id: &str, record_count: usize) -> Self {
        Self {
            patterns: vec![format!(
                "Insufficient data for pattern analysis ({record_count} records, at least 3 needed)"
            )],
            recommendations: vec![
                "Log at least 3 entries to enable personalized pattern analysis".to_string(),
            ],
            confidence: 0.1,
            ..Self::empty(user_id)
        }
    }

    /// Zero-confidence result standing in for a failed analysis.
    pub fn error(user_id: &str, reason: &str) -> Self {
        Self {
            patterns: vec![format!("Analysis error: {reason}")],
            recommendations: vec!["Please try again later".to_string()],
            confidence: 0.0,
            ..Self::empty(user_id)
        }
    }

    fn empty(user_id: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            timestamp: Utc::now(),
            algorithm: ALGORITHM.to_string(),
            clusters: Vec::new(),
            optimal_k: 1,
            risk_level: RiskLevel::Low,
            patterns: Vec::new(),
            recommendations: Vec::new(),
            confidence: 0.0,
            feature_importance: zero_importance(),
            anomalies: Vec::new(),
        }
    }

    /// Total number of clustered vectors.
    pub fn clustered_count(&self) -> usize {
        self.clusters.iter().map(ClusterResult::size).sum()
    }
}

/// Importance map with every feature present at 0.
pub fn zero_importance() -> IndexMap<String, f64> {
    FEATURE_NAMES.iter().map(|name| (name.to_string(), 0.0)).collect()
}
