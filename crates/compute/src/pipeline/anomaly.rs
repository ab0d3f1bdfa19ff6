//! Per-feature z-score outlier detection across a batch of vectors.

use std::collections::HashSet;

use tracing::debug;
use uuid::Uuid;

use super::features::{FeatureVector, FEATURE_COUNT, FEATURE_NAMES};
use super::stats::PopulationStats;

/// Default z-score above which a value is anomalous.
pub const DEFAULT_ANOMALY_THRESHOLD: f64 = 2.5;

/// Batches smaller than this are never scored.
const MIN_BATCH: usize = 3;

/// Flags vectors with any feature more than `threshold` standard deviations
/// from the batch mean.
#[derive(Debug, Clone)]
pub struct AnomalyDetector {
    threshold: f64,
}

impl Default for AnomalyDetector {
    fn default() -> Self {
        Self::new(DEFAULT_ANOMALY_THRESHOLD)
    }
}

impl AnomalyDetector {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// Return the anomalous vectors, deduplicated by id, in first-flagged order.
    ///
    /// Columns are scanned one at a time; a zero-variance column is skipped.
    /// Fewer than three vectors gives an empty list.
    pub fn detect_anomalies(&self, vectors: &[FeatureVector]) -> Vec<FeatureVector> {
        if vectors.len() < MIN_BATCH {
            return Vec::new();
        }

        let rows: Vec<Vec<f64>> = vectors.iter().map(|v| v.features.to_vec()).collect();
        let stats = PopulationStats::from_rows(&rows);

        let mut seen: HashSet<Uuid> = HashSet::new();
        let mut flagged = Vec::new();

        for col in 0..FEATURE_COUNT {
            if stats.is_degenerate(col) {
                continue;
            }
            for (vector, row) in vectors.iter().zip(&rows) {
                let z = (row[col] - stats.means[col]) / stats.std_devs[col];
                if z.abs() > self.threshold && seen.insert(vector.id) {
                    debug!(
                        id = %vector.id,
                        feature = FEATURE_NAMES[col],
                        z,
                        "flagged anomalous record"
                    );
                    flagged.push(vector.clone());
                }
            }
        }

        flagged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::features::FeatureEngineer;
    use chrono::{TimeZone, Utc};
    use vitals_core::HealthRecord;

    fn vectors(records: &[HealthRecord]) -> Vec<FeatureVector> {
        FeatureEngineer::new().extract("u1", records).unwrap()
    }

    fn steady(count: usize) -> Vec<HealthRecord> {
        let ts = Utc.with_ymd_and_hms(2024, 5, 6, 8, 0, 0).unwrap();
        (0..count).map(|_| HealthRecord::new(3, 8.0, 3, 40.0, ts)).collect()
    }

    #[test]
    fn fewer_than_three_is_empty() {
        let mut records = steady(1);
        records.push(HealthRecord::new(10, 0.0, 10, 0.0, records[0].timestamp));
        assert!(AnomalyDetector::default().detect_anomalies(&vectors(&records)).is_empty());
    }

    #[test]
    fn degenerate_batch_is_empty() {
        let v = vectors(&steady(8));
        assert!(AnomalyDetector::default().detect_anomalies(&v).is_empty());
    }

    #[test]
    fn flags_extreme_record_once() {
        let mut records = steady(9);
        records.push(HealthRecord::new(10, 0.0, 10, 0.0, records[0].timestamp));
        let v = vectors(&records);

        let anomalies = AnomalyDetector::default().detect_anomalies(&v);
        assert_eq!(anomalies.len(), 1, "outlier trips several columns but appears once");
        assert_eq!(anomalies[0].id, v[9].id);
    }

    #[test]
    fn threshold_controls_sensitivity() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 6, 8, 0, 0).unwrap();
        let records: Vec<HealthRecord> = (0..10)
            .map(|i| HealthRecord::new(5, 7.0, 4, 10.0 * i as f64, ts))
            .collect();
        let v = vectors(&records);
        // Evenly spaced exercise: max |z| is about 1.57.
        assert!(AnomalyDetector::new(2.5).detect_anomalies(&v).is_empty());
        assert!(!AnomalyDetector::new(1.5).detect_anomalies(&v).is_empty());
    }
}
