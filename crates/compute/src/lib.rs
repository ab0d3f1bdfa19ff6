pub mod algorithms;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod types;

pub use error::ComputeError;
pub use model::{CentroidModel, DeployedModel, ModelAssessment, ModelInfo, RiskModel};
pub use pipeline::features::{FeatureEngineer, FeatureSet, FeatureVector, FEATURE_NAMES};
pub use pipeline::profile::DatasetProfile;
pub use pipeline::HealthAnalyzer;
pub use types::{AnalysisResult, ClusterResult, RiskLevel};
