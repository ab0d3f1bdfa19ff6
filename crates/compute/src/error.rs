use thiserror::Error;

/// Error type for the clustering and feature primitives.
///
/// `HealthAnalyzer::analyze_health_data` never surfaces these; they are
/// folded into a zero-confidence result there. Direct callers of the
/// primitives see them as-is.
#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("Cannot cluster an empty dataset")]
    EmptyDataset,

    #[error("Invalid cluster count: k={k} for {n} points")]
    InvalidK { k: usize, n: usize },

    #[error("Need at least {needed} records, got {found}")]
    InsufficientData { needed: usize, found: usize },

    #[error("Dimension mismatch at row {row}: expected {expected}, got {found}")]
    DimensionMismatch {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("Invalid record at index {index}: {source}")]
    InvalidRecord {
        index: usize,
        #[source]
        source: vitals_core::CoreError,
    },

    #[error("Model error: {0}")]
    Model(String),
}
