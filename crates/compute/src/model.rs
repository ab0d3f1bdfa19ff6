//! Deployed centroid model for single-record risk lookups.
//!
//! A model is fitted once over a population of records: features are
//! standardized against population statistics, clustered, and every cluster
//! gets a rule-based risk profile from the raw records it holds. Scoring a
//! new record is then a nearest-centroid lookup, no clustering involved.

use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

use vitals_core::{AnalysisConfig, CoreError, HealthRecord};

use crate::algorithms::distance::euclidean;
use crate::algorithms::{AdvancedKMeans, OptimalKSelector};
use crate::error::ComputeError;
use crate::pipeline::features::{FeatureEngineer, FeatureSet, FEATURE_COUNT};
use crate::pipeline::risk::{RawAverages, RiskSynthesizer};
use crate::pipeline::stats::PopulationStats;
use crate::types::RiskLevel;

/// Schema version written into every saved model.
pub const MODEL_VERSION: &str = "centroid-v1";

/// Lookup confidence never leaves this band.
const MIN_CONFIDENCE: f64 = 0.1;
const MAX_CONFIDENCE: f64 = 0.95;

/// A model fitted needs at least this many records.
const MIN_TRAINING_RECORDS: usize = 3;

/// Availability and shape of a deployed model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    pub is_deployed: bool,
    pub version: String,
    pub cluster_count: usize,
}

/// Result of scoring one record against a deployed model.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelAssessment {
    pub overall_risk: RiskLevel,
    pub confidence: f64,
    pub risk_score: f64,
    pub primary_cluster: usize,
    /// Euclidean distance from the standardized record to its centroid.
    pub distance: f64,
    pub centroid: Vec<f64>,
    /// The record's features, standardized with the model's statistics.
    pub features: FeatureSet,
    pub patterns: Vec<String>,
    pub recommendations: Vec<String>,
}

/// Pre-fitted risk model that can score a single record.
///
/// The analyzer only consults it for one-record requests and falls back to
/// the full pipeline when it is not deployed or returns an error.
pub trait DeployedModel: Send + Sync {
    fn model_info(&self) -> ModelInfo;

    fn assess_risk(&self, record: &HealthRecord) -> Result<ModelAssessment, ComputeError>;
}

/// How the analyzer assesses requests.
#[derive(Clone, Default)]
pub enum RiskModel {
    /// Always run feature extraction, clustering and the rule set.
    #[default]
    FullPipeline,
    /// Try the deployed model for single-record requests first.
    DeployedLookup(Arc<dyn DeployedModel>),
}

impl RiskModel {
    pub fn deployed<M: DeployedModel + 'static>(model: M) -> Self {
        RiskModel::DeployedLookup(Arc::new(model))
    }
}

impl fmt::Debug for RiskModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskModel::FullPipeline => write!(f, "FullPipeline"),
            RiskModel::DeployedLookup(model) => f
                .debug_tuple("DeployedLookup")
                .field(&model.model_info())
                .finish(),
        }
    }
}

/// Risk profile of one fitted cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterProfile {
    pub cluster_id: usize,
    pub centroid: Vec<f64>,
    pub member_count: usize,
    pub averages: RawAverages,
    pub risk_level: RiskLevel,
    /// Risk score of a record sitting exactly on the centroid.
    pub base_risk_score: f64,
    pub patterns: Vec<String>,
    pub recommendations: Vec<String>,
}

/// Nearest-centroid model persisted as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CentroidModel {
    pub version: String,
    pub trained_at: DateTime<Utc>,
    pub training_records: usize,
    pub stats: PopulationStats,
    pub clusters: Vec<ClusterProfile>,
}

impl CentroidModel {
    /// Fit a model over a population of records.
    pub fn fit<R: Rng + ?Sized>(
        records: &[HealthRecord],
        config: &AnalysisConfig,
        rng: &mut R,
    ) -> Result<Self, ComputeError> {
        if records.len() < MIN_TRAINING_RECORDS {
            return Err(ComputeError::InsufficientData {
                needed: MIN_TRAINING_RECORDS,
                found: records.len(),
            });
        }

        let engineer = FeatureEngineer::new();
        let vectors = engineer.extract("population", records)?;
        let rows: Vec<Vec<f64>> = vectors.iter().map(|v| v.features.to_vec()).collect();
        let stats = PopulationStats::from_rows(&rows);
        let data: Vec<Vec<f64>> = rows.iter().map(|row| stats.standardize(row)).collect();

        let k = OptimalKSelector::new(config.max_k)
            .with_iterations(config.selector_max_iterations, config.tolerance)
            .find_optimal_k(&data, rng)?;
        let run = AdvancedKMeans::with_params(
            k,
            config.max_iterations,
            config.tolerance,
            config.init_method,
        )
        .cluster(&data, rng)?;

        let synthesizer = RiskSynthesizer::new();
        let clusters: Vec<ClusterProfile> = run
            .centroids
            .iter()
            .enumerate()
            .map(|(cluster_id, centroid)| {
                let members: Vec<&HealthRecord> =
                    run.members_of(cluster_id).map(|i| &records[i]).collect();
                let averages = RawAverages::from_records(members.iter().copied());
                let assessment = synthesizer.assess_averages(&averages);
                ClusterProfile {
                    cluster_id,
                    centroid: centroid.clone(),
                    member_count: members.len(),
                    averages,
                    risk_level: assessment.risk_level,
                    base_risk_score: base_risk_score(assessment.risk_level, &averages),
                    patterns: assessment.patterns,
                    recommendations: assessment.recommendations,
                }
            })
            .collect();

        info!(
            records = records.len(),
            clusters = clusters.len(),
            silhouette = run.silhouette_score,
            "fitted centroid model"
        );

        Ok(Self {
            version: MODEL_VERSION.to_string(),
            trained_at: Utc::now(),
            training_records: records.len(),
            stats,
            clusters,
        })
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn to_json_file(&self, path: impl AsRef<Path>) -> Result<(), CoreError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    fn nearest(&self, point: &[f64]) -> Option<(&ClusterProfile, f64)> {
        self.clusters
            .iter()
            .map(|c| (c, euclidean(point, &c.centroid)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }
}

impl DeployedModel for CentroidModel {
    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            is_deployed: !self.clusters.is_empty(),
            version: self.version.clone(),
            cluster_count: self.clusters.len(),
        }
    }

    fn assess_risk(&self, record: &HealthRecord) -> Result<ModelAssessment, ComputeError> {
        record
            .validate()
            .map_err(|source| ComputeError::InvalidRecord { index: 0, source })?;

        if self.stats.dim() != FEATURE_COUNT {
            return Err(ComputeError::Model(format!(
                "normalization statistics cover {} features, expected {FEATURE_COUNT}",
                self.stats.dim()
            )));
        }
        if let Some(bad) = self.clusters.iter().find(|c| c.centroid.len() != FEATURE_COUNT) {
            return Err(ComputeError::Model(format!(
                "centroid of cluster {} has {} dimensions",
                bad.cluster_id,
                bad.centroid.len()
            )));
        }

        let raw = FeatureEngineer::new().extract_features(record);
        let standardized = self.stats.standardize(&raw.to_array());
        let (profile, distance) = self
            .nearest(&standardized)
            .ok_or_else(|| ComputeError::Model("model has no clusters".to_string()))?;

        let confidence = (1.0 / (1.0 + distance)).clamp(MIN_CONFIDENCE, MAX_CONFIDENCE);

        Ok(ModelAssessment {
            overall_risk: profile.risk_level,
            confidence,
            risk_score: profile.base_risk_score * confidence,
            primary_cluster: profile.cluster_id,
            distance,
            centroid: profile.centroid.clone(),
            features: FeatureSet::from_slice(&standardized).unwrap_or_default(),
            patterns: profile.patterns.clone(),
            recommendations: profile.recommendations.clone(),
        })
    }
}

/// Level floor plus a severity-driven share, in [0, 1].
fn base_risk_score(level: RiskLevel, averages: &RawAverages) -> f64 {
    let floor = match level {
        RiskLevel::Low => 0.1,
        RiskLevel::Medium => 0.4,
        RiskLevel::High => 0.7,
    };
    (floor + 0.3 * (averages.severity / 10.0)).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn population() -> Vec<HealthRecord> {
        let ts = Utc.with_ymd_and_hms(2024, 4, 10, 9, 0, 0).unwrap();
        let mut records = Vec::new();
        for i in 0..8 {
            records.push(HealthRecord::new(1 + (i % 2) as u8, 8.0, 2, 60.0, ts));
        }
        for i in 0..8 {
            records.push(HealthRecord::new(9 - (i % 2) as u8, 4.0, 9, 5.0, ts));
        }
        records
    }

    fn fitted() -> CentroidModel {
        let mut rng = StdRng::seed_from_u64(7);
        CentroidModel::fit(&population(), &AnalysisConfig::default(), &mut rng).unwrap()
    }

    #[test]
    fn fit_requires_three_records() {
        let mut rng = StdRng::seed_from_u64(1);
        let err = CentroidModel::fit(&population()[..2], &AnalysisConfig::default(), &mut rng)
            .unwrap_err();
        assert!(matches!(err, ComputeError::InsufficientData { found: 2, .. }));
    }

    #[test]
    fn fit_separates_risk_groups() {
        let model = fitted();
        assert!(model.model_info().is_deployed);
        assert!(model.clusters.len() >= 2);
        let levels: Vec<RiskLevel> = model.clusters.iter().map(|c| c.risk_level).collect();
        assert!(levels.contains(&RiskLevel::High));
        assert!(levels.contains(&RiskLevel::Low));
        let total: usize = model.clusters.iter().map(|c| c.member_count).sum();
        assert_eq!(total, 16);
    }

    #[test]
    fn lookup_picks_matching_cluster() {
        let model = fitted();
        let ts = Utc.with_ymd_and_hms(2024, 4, 11, 9, 0, 0).unwrap();

        let sick = model
            .assess_risk(&HealthRecord::new(9, 4.0, 9, 5.0, ts))
            .unwrap();
        assert_eq!(sick.overall_risk, RiskLevel::High);
        assert!((MIN_CONFIDENCE..=MAX_CONFIDENCE).contains(&sick.confidence));
        assert!(sick.risk_score > 0.0 && sick.risk_score <= 1.0);

        let well = model
            .assess_risk(&HealthRecord::new(1, 8.0, 2, 60.0, ts))
            .unwrap();
        assert_eq!(well.overall_risk, RiskLevel::Low);
        assert_ne!(sick.primary_cluster, well.primary_cluster);
    }

    #[test]
    fn empty_model_is_not_deployed() {
        let model = CentroidModel {
            version: MODEL_VERSION.to_string(),
            trained_at: Utc::now(),
            training_records: 0,
            stats: PopulationStats::from_rows(&[]),
            clusters: Vec::new(),
        };
        assert!(!model.model_info().is_deployed);
        let ts = Utc.with_ymd_and_hms(2024, 4, 11, 9, 0, 0).unwrap();
        assert!(model.assess_risk(&HealthRecord::new(5, 7.0, 5, 30.0, ts)).is_err());
    }

    #[test]
    fn json_file_roundtrip() {
        let model = fitted();
        let path = std::env::temp_dir().join(format!("vitals-model-{}.json", uuid::Uuid::new_v4()));
        model.to_json_file(&path).unwrap();
        let loaded = CentroidModel::from_json_file(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded.clusters.len(), model.clusters.len());
        assert_eq!(loaded.version, MODEL_VERSION);
    }
}
