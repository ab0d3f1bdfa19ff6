//! Health analysis orchestrator.
//!
//! Wires feature extraction, normalization, K selection, clustering,
//! anomaly scoring, feature importance and the risk rules into one call:
//!
//! - **Single record + deployed model**: nearest-centroid lookup, falling
//!   back to the full pipeline when the model is unavailable or fails.
//! - **Fewer than three records**: low-confidence placeholder.
//! - **Otherwise**: the full pipeline over the user's history.

pub mod anomaly;
pub mod features;
pub mod importance;
pub mod metrics;
pub mod profile;
pub mod risk;
pub mod stats;

use std::time::Instant;

use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};
use uuid::Uuid;

use vitals_core::{AnalysisConfig, HealthRecord};

use crate::algorithms::distance::squared_euclidean;
use crate::algorithms::{AdvancedKMeans, KmeansResult, OptimalKSelector};
use crate::error::ComputeError;
use crate::model::{DeployedModel, RiskModel};
use crate::types::{AnalysisResult, ClusterResult, ALGORITHM};

use self::anomaly::AnomalyDetector;
use self::features::{FeatureEngineer, FeatureVector};
use self::importance::{deviation_importance, feature_importance};
use self::risk::{RiskInputs, RiskSynthesizer};

/// Histories shorter than this get the insufficient-data placeholder.
pub const MIN_RECORDS: usize = 3;

/// Tag for results produced by the deployed model lookup.
const LOOKUP_ALGORITHM: &str = "deployed-centroid-lookup";

/// Stateless per call; safe to share across threads.
#[derive(Debug, Clone, Default)]
pub struct HealthAnalyzer {
    config: AnalysisConfig,
    model: RiskModel,
    engineer: FeatureEngineer,
    synthesizer: RiskSynthesizer,
}

impl HealthAnalyzer {
    pub fn new(config: AnalysisConfig) -> Self {
        Self::with_model(config, RiskModel::FullPipeline)
    }

    pub fn with_model(config: AnalysisConfig, model: RiskModel) -> Self {
        Self {
            config,
            model,
            engineer: FeatureEngineer::new(),
            synthesizer: RiskSynthesizer::new(),
        }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Analyze one user's history. Never fails: errors become a
    /// zero-confidence result.
    ///
    /// Seeded from `config.seed` when set, OS entropy otherwise.
    pub fn analyze_health_data(&self, user_id: &str, records: &[HealthRecord]) -> AnalysisResult {
        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        self.analyze_with_rng(user_id, records, &mut rng)
    }

    /// Same as [`analyze_health_data`](Self::analyze_health_data) with a
    /// caller-supplied random source.
    pub fn analyze_with_rng<R: Rng + ?Sized>(
        &self,
        user_id: &str,
        records: &[HealthRecord],
        rng: &mut R,
    ) -> AnalysisResult {
        let start = Instant::now();

        if let ([record], RiskModel::DeployedLookup(model)) = (records, &self.model) {
            if let Some(result) = self.deployed_lookup(model.as_ref(), user_id, record) {
                info!(
                    user_id,
                    risk = %result.risk_level,
                    elapsed_us = start.elapsed().as_micros(),
                    "deployed model assessment"
                );
                return result;
            }
        }

        if records.len() < MIN_RECORDS {
            info!(user_id, records = records.len(), "insufficient data for clustering");
            return AnalysisResult::insufficient_data(user_id, records.len());
        }

        match self.run_pipeline(user_id, records, rng) {
            Ok(result) => {
                info!(
                    user_id,
                    records = records.len(),
                    k = result.optimal_k,
                    anomalies = result.anomalies.len(),
                    risk = %result.risk_level,
                    elapsed_ms = start.elapsed().as_millis(),
                    "analysis completed"
                );
                result
            }
            Err(e) => {
                warn!(user_id, error = %e, "analysis failed");
                AnalysisResult::error(user_id, &e.to_string())
            }
        }
    }

    fn run_pipeline<R: Rng + ?Sized>(
        &self,
        user_id: &str,
        records: &[HealthRecord],
        rng: &mut R,
    ) -> Result<AnalysisResult, ComputeError> {
        let vectors = self.engineer.extract(user_id, records)?;
        let normalized = self.engineer.normalize(&vectors);
        let data: Vec<Vec<f64>> = normalized.iter().map(|v| v.features.to_vec()).collect();

        let optimal_k = OptimalKSelector::new(self.config.max_k)
            .with_iterations(self.config.selector_max_iterations, self.config.tolerance)
            .find_optimal_k(&data, rng)?;

        let run = AdvancedKMeans::with_params(
            optimal_k,
            self.config.max_iterations,
            self.config.tolerance,
            self.config.init_method,
        )
        .cluster(&data, rng)?;
        debug!(
            user_id,
            k = optimal_k,
            iterations = run.iterations,
            converged = run.converged,
            silhouette = run.silhouette_score,
            "final clustering"
        );

        let clusters = build_clusters(&normalized, &run);
        let anomalies =
            AnomalyDetector::new(self.config.anomaly_threshold).detect_anomalies(&normalized);
        let importance = feature_importance(&clusters);

        let assessment = self.synthesizer.synthesize(&RiskInputs {
            records,
            clusters: &clusters,
            anomaly_count: anomalies.len(),
            feature_importance: &importance,
        });

        Ok(AnalysisResult {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            timestamp: Utc::now(),
            algorithm: ALGORITHM.to_string(),
            clusters,
            optimal_k,
            risk_level: assessment.risk_level,
            patterns: assessment.patterns,
            recommendations: assessment.recommendations,
            confidence: assessment.confidence,
            feature_importance: importance,
            anomalies,
        })
    }

    /// Repackage a deployed-model assessment as a one-cluster result.
    /// The cluster keeps the model's id and `optimal_k` is the model's
    /// cluster count. `None` means the full pipeline should run instead.
    fn deployed_lookup(
        &self,
        model: &dyn DeployedModel,
        user_id: &str,
        record: &HealthRecord,
    ) -> Option<AnalysisResult> {
        let info = model.model_info();
        if !info.is_deployed {
            debug!(user_id, "no deployed model, using full pipeline");
            return None;
        }

        let assessment = match model.assess_risk(record) {
            Ok(a) => a,
            Err(e) => {
                warn!(user_id, error = %e, "deployed model failed, using full pipeline");
                return None;
            }
        };

        let mut vector = match self.engineer.extract(user_id, std::slice::from_ref(record)) {
            Ok(mut v) => v.pop()?,
            Err(e) => {
                warn!(user_id, error = %e, "record rejected for lookup");
                return None;
            }
        };
        vector.features = assessment.features;

        let importance = deviation_importance(&assessment.features, &assessment.centroid);

        Some(AnalysisResult {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            timestamp: Utc::now(),
            algorithm: format!("{LOOKUP_ALGORITHM}/{}", info.version),
            clusters: vec![ClusterResult {
                cluster_id: assessment.primary_cluster,
                centroid: assessment.centroid,
                members: vec![vector],
                inertia: assessment.distance * assessment.distance,
                silhouette_score: 0.0,
            }],
            optimal_k: info.cluster_count,
            risk_level: assessment.overall_risk,
            patterns: assessment.patterns,
            recommendations: assessment.recommendations,
            confidence: assessment.confidence,
            feature_importance: importance,
            anomalies: Vec::new(),
        })
    }
}

/// Partition normalized vectors by assignment. Inertia is per cluster.
fn build_clusters(vectors: &[FeatureVector], run: &KmeansResult) -> Vec<ClusterResult> {
    run.centroids
        .iter()
        .enumerate()
        .map(|(cluster_id, centroid)| {
            let members: Vec<FeatureVector> =
                run.members_of(cluster_id).map(|i| vectors[i].clone()).collect();
            let inertia = members
                .iter()
                .map(|m| squared_euclidean(&m.values(), centroid))
                .sum();
            ClusterResult {
                cluster_id,
                centroid: centroid.clone(),
                members,
                inertia,
                silhouette_score: run.silhouette_score,
            }
        })
        .collect()
}
