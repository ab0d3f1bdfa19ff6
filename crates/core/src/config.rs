use std::env;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

/// Parse a profiled env var, falling back to `default` when unset.
/// A value that is set but unparseable is an error rather than a silent default.
fn profiled_env_parse<T: FromStr>(profile: &str, key: &str, default: T) -> Result<T, CoreError> {
    match profiled_env_opt(profile, key) {
        Some(raw) => raw.trim().parse().map_err(|_| CoreError::Config {
            key: key.to_string(),
            value: raw,
        }),
        None => Ok(default),
    }
}

// ── Centroid initialization ───────────────────────────────────

/// Strategy for choosing the starting centroids of a K-means run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InitMethod {
    /// Uniformly random distinct data points.
    #[serde(rename = "random")]
    Random,
    /// D²-weighted sampling.
    #[default]
    #[serde(rename = "kmeans++")]
    KMeansPlusPlus,
}

impl fmt::Display for InitMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InitMethod::Random => write!(f, "random"),
            InitMethod::KMeansPlusPlus => write!(f, "kmeans++"),
        }
    }
}

impl FromStr for InitMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "random" => Ok(InitMethod::Random),
            "kmeans++" | "kmeanspp" | "kmeans_plus_plus" => Ok(InitMethod::KMeansPlusPlus),
            other => Err(format!("unknown init method: {other}")),
        }
    }
}

// ── Analysis config ───────────────────────────────────────────

/// Tuning knobs for the clustering and risk pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Active profile name (empty = default).
    pub profile: String,
    /// Largest K tried by the silhouette sweep.
    pub max_k: usize,
    /// Lloyd's iteration cap for the final clustering run.
    pub max_iterations: usize,
    /// Lloyd's iteration cap for each K tried during the sweep.
    pub selector_max_iterations: usize,
    /// Convergence threshold on the change in inertia.
    pub tolerance: f64,
    pub init_method: InitMethod,
    /// Z-score above which a feature value is anomalous.
    pub anomaly_threshold: f64,
    /// Fixed PRNG seed; `None` draws from OS entropy.
    pub seed: Option<u64>,
    /// History length callers should cap each user to (0 = unbounded).
    pub max_records: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            profile: String::new(),
            max_k: 10,
            max_iterations: 300,
            selector_max_iterations: 100,
            tolerance: 1e-4,
            init_method: InitMethod::KMeansPlusPlus,
            anomaly_threshold: 2.5,
            seed: None,
            max_records: 50,
        }
    }
}

impl AnalysisConfig {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `VITALS_PROFILE` env var. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Result<Self, CoreError> {
        let profile = env_or("VITALS_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Result<Self, CoreError> {
        let p = profile.to_uppercase();
        let p = p.as_str();
        let d = Self::default();

        let seed = match profiled_env_opt(p, "ANALYSIS_SEED") {
            Some(raw) => Some(raw.trim().parse().map_err(|_| CoreError::Config {
                key: "ANALYSIS_SEED".to_string(),
                value: raw,
            })?),
            None => None,
        };

        let init_method = match profiled_env_opt(p, "KMEANS_INIT") {
            Some(raw) => raw.parse().map_err(|_| CoreError::Config {
                key: "KMEANS_INIT".to_string(),
                value: raw,
            })?,
            None => d.init_method,
        };

        let config = Self {
            profile: p.to_string(),
            max_k: profiled_env_parse(p, "KMEANS_MAX_K", d.max_k)?,
            max_iterations: profiled_env_parse(p, "KMEANS_MAX_ITERATIONS", d.max_iterations)?,
            selector_max_iterations: profiled_env_parse(
                p,
                "KMEANS_SELECTOR_ITERATIONS",
                d.selector_max_iterations,
            )?,
            tolerance: profiled_env_parse(p, "KMEANS_TOLERANCE", d.tolerance)?,
            init_method,
            anomaly_threshold: profiled_env_parse(p, "ANOMALY_THRESHOLD", d.anomaly_threshold)?,
            seed,
            max_records: profiled_env_parse(p, "ANALYSIS_MAX_RECORDS", d.max_records)?,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), CoreError> {
        if self.max_iterations == 0 {
            return Err(CoreError::Config {
                key: "KMEANS_MAX_ITERATIONS".to_string(),
                value: "0".to_string(),
            });
        }
        if !(self.tolerance.is_finite() && self.tolerance >= 0.0) {
            return Err(CoreError::Config {
                key: "KMEANS_TOLERANCE".to_string(),
                value: self.tolerance.to_string(),
            });
        }
        if !(self.anomaly_threshold.is_finite() && self.anomaly_threshold > 0.0) {
            return Err(CoreError::Config {
                key: "ANOMALY_THRESHOLD".to_string(),
                value: self.anomaly_threshold.to_string(),
            });
        }
        Ok(())
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Analysis config loaded (profile: {}):", self.profile_label());
        tracing::info!(
            "  kmeans:   max_k={}, max_iterations={}, selector_iterations={}, tolerance={}, init={}",
            self.max_k,
            self.max_iterations,
            self.selector_max_iterations,
            self.tolerance,
            self.init_method
        );
        tracing::info!("  anomaly:  threshold={}", self.anomaly_threshold);
        tracing::info!(
            "  input:    max_records={}, seed={}",
            self.max_records,
            self.seed.map(|s| s.to_string()).as_deref().unwrap_or("(entropy)")
        );
    }
}
