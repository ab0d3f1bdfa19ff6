use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::types::{AnalysisResult, RiskLevel};

/// Throughput and outcome counters for a batch of analyses.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchMetrics {
    pub users: u64,
    pub records: u64,
    /// Results produced by clustering or the deployed lookup.
    pub analyzed: u64,
    pub insufficient: u64,
    pub errors: u64,
    pub low: u64,
    pub medium: u64,
    pub high: u64,
    /// Average time per user in milliseconds.
    pub avg_latency_ms: f64,
    pub users_per_second: f64,
    pub finished_at: Option<DateTime<Utc>>,

    #[serde(skip)]
    total_latency_ms: f64,
}

impl BatchMetrics {
    /// Record one user's result and how long it took.
    pub fn record(&mut self, result: &AnalysisResult, record_count: usize, elapsed: Duration) {
        self.users += 1;
        self.records += record_count as u64;
        self.total_latency_ms += elapsed.as_secs_f64() * 1000.0;
        self.avg_latency_ms = self.total_latency_ms / self.users as f64;

        if result.confidence == 0.0 {
            self.errors += 1;
            return;
        }
        if result.clusters.is_empty() {
            self.insufficient += 1;
            return;
        }
        self.analyzed += 1;
        match result.risk_level {
            RiskLevel::Low => self.low += 1,
            RiskLevel::Medium => self.medium += 1,
            RiskLevel::High => self.high += 1,
        }
    }

    /// Close the batch with its wall-clock duration.
    pub fn finish(&mut self, wall: Duration) {
        let secs = wall.as_secs_f64();
        if secs > 0.0 {
            self.users_per_second = self.users as f64 / secs;
        }
        self.finished_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_outcomes() {
        let mut m = BatchMetrics::default();
        m.record(&AnalysisResult::insufficient_data("a", 2), 2, Duration::from_millis(4));
        m.record(&AnalysisResult::error("b", "bad"), 5, Duration::from_millis(2));

        assert_eq!(m.users, 2);
        assert_eq!(m.records, 7);
        assert_eq!(m.insufficient, 1);
        assert_eq!(m.errors, 1);
        assert_eq!(m.analyzed, 0);
        assert!((m.avg_latency_ms - 3.0).abs() < 1e-9);
    }

    #[test]
    fn finish_sets_throughput() {
        let mut m = BatchMetrics::default();
        m.record(&AnalysisResult::insufficient_data("a", 1), 1, Duration::from_millis(1));
        m.finish(Duration::from_millis(500));
        assert!((m.users_per_second - 2.0).abs() < 1e-9);
        assert!(m.finished_at.is_some());
    }

    #[test]
    fn internal_totals_not_serialized() {
        let json = serde_json::to_value(BatchMetrics::default()).unwrap();
        assert!(json.get("totalLatencyMs").is_none());
        assert!(json.get("usersPerSecond").is_some());
    }
}
