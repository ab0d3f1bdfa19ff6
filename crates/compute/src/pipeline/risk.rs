//! Rule-based risk synthesis.
//!
//! Rules read raw (un-normalized) averages so their thresholds stay in the
//! units users log in. The resulting confidence is a heuristic strength of
//! the pattern match, not a probability.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use vitals_core::HealthRecord;

use super::importance::top_features;
use crate::types::{ClusterResult, RiskLevel};

const BASE_CONFIDENCE: f64 = 0.7;

const HIGH_SEVERITY: f64 = 7.0;
const MODERATE_SEVERITY: f64 = 4.0;
const MIN_SLEEP_HOURS: f64 = 6.0;
const HIGH_STRESS: f64 = 7.0;
const MIN_EXERCISE_MINUTES: f64 = 30.0;

/// Share of records that may be anomalous before the history counts as irregular.
const ANOMALY_RATIO: f64 = 0.1;
/// Share of records the largest cluster must hold to count as a dominant trend.
const DOMINANT_CLUSTER_RATIO: f64 = 0.5;
/// Below this many records the assessment is marked as limited.
const LIMITED_DATA_RECORDS: usize = 10;

/// Mean of the four rule-driving quantities over a set of records.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RawAverages {
    pub severity: f64,
    pub sleep: f64,
    pub stress: f64,
    pub exercise: f64,
}

impl RawAverages {
    /// Averages over `records`; all zeros when empty.
    pub fn from_records<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a HealthRecord>,
    {
        let mut sums = Self::default();
        let mut n = 0usize;
        for r in records {
            sums.severity += f64::from(r.severity);
            sums.sleep += r.sleep;
            sums.stress += f64::from(r.stress);
            sums.exercise += r.exercise;
            n += 1;
        }
        if n == 0 {
            return sums;
        }
        let n = n as f64;
        Self {
            severity: sums.severity / n,
            sleep: sums.sleep / n,
            stress: sums.stress / n,
            exercise: sums.exercise / n,
        }
    }
}

/// Everything the rules look at for one analysis.
#[derive(Debug, Clone, Copy)]
pub struct RiskInputs<'a> {
    pub records: &'a [HealthRecord],
    pub clusters: &'a [ClusterResult],
    pub anomaly_count: usize,
    pub feature_importance: &'a IndexMap<String, f64>,
}

/// Output of the rules: level, findings and confidence.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskAssessment {
    pub risk_level: RiskLevel,
    pub patterns: Vec<String>,
    pub recommendations: Vec<String>,
    pub confidence: f64,
}

impl RiskAssessment {
    fn new() -> Self {
        Self {
            risk_level: RiskLevel::Low,
            patterns: Vec::new(),
            recommendations: Vec::new(),
            confidence: BASE_CONFIDENCE,
        }
    }

    fn raise_to(&mut self, level: RiskLevel) {
        self.risk_level = self.risk_level.max(level);
    }

    fn lower_confidence(&mut self, by: f64, floor: f64) {
        self.confidence = (self.confidence - by).max(floor);
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RiskSynthesizer;

impl RiskSynthesizer {
    pub fn new() -> Self {
        Self
    }

    /// Apply the severity, sleep, stress and exercise rules to averages.
    pub fn assess_averages(&self, avg: &RawAverages) -> RiskAssessment {
        let mut out = RiskAssessment::new();

        if avg.severity > HIGH_SEVERITY {
            out.raise_to(RiskLevel::High);
            out.patterns.push(format!(
                "Consistently high symptom severity (average {:.1}/10)",
                avg.severity
            ));
            out.recommendations.push(
                "Seek consultation with a healthcare provider about persistent severe symptoms"
                    .to_string(),
            );
            out.confidence = (out.confidence + 0.2).min(0.95);
        } else if avg.severity > MODERATE_SEVERITY {
            out.raise_to(RiskLevel::Medium);
            out.patterns.push(format!(
                "Moderate symptom severity (average {:.1}/10)",
                avg.severity
            ));
            out.recommendations.push(
                "Monitor symptoms and consider professional advice if they persist or worsen"
                    .to_string(),
            );
        }

        if avg.sleep < MIN_SLEEP_HOURS {
            out.raise_to(RiskLevel::Medium);
            out.patterns.push(format!(
                "Chronic sleep deprivation (average {:.1} hours)",
                avg.sleep
            ));
            out.recommendations
                .push("Improve sleep hygiene and aim for 7-9 hours of sleep per night".to_string());
        }

        if avg.stress > HIGH_STRESS {
            out.raise_to(RiskLevel::Medium);
            out.patterns
                .push(format!("Elevated stress levels (average {:.1}/10)", avg.stress));
            out.recommendations.push(
                "Practice stress management such as breathing exercises, meditation or short breaks"
                    .to_string(),
            );
        }

        if avg.exercise < MIN_EXERCISE_MINUTES {
            out.patterns.push(format!(
                "Insufficient physical activity (average {:.0} minutes)",
                avg.exercise
            ));
            out.recommendations
                .push("Increase physical activity toward at least 30 minutes a day".to_string());
        }

        out
    }

    /// Full rule set for one analysis.
    pub fn synthesize(&self, inputs: &RiskInputs<'_>) -> RiskAssessment {
        let total = inputs.records.len();
        let avg = RawAverages::from_records(inputs.records);
        let mut out = self.assess_averages(&avg);

        if total > 0 && inputs.anomaly_count as f64 > total as f64 * ANOMALY_RATIO {
            out.patterns.push(format!(
                "Irregular patterns detected in {} of {} records",
                inputs.anomaly_count, total
            ));
            out.recommendations
                .push("Track potential triggers around unusual entries".to_string());
            out.lower_confidence(0.1, 0.5);
        }

        let largest = inputs.clusters.iter().map(ClusterResult::size).max().unwrap_or(0);
        if total > 0 && (largest as f64) < total as f64 * DOMINANT_CLUSTER_RATIO {
            out.patterns
                .push("Diverse health patterns with no dominant trend".to_string());
            out.lower_confidence(0.1, 0.5);
        }

        let top: Vec<&str> = top_features(inputs.feature_importance, 3)
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        if !top.is_empty() {
            out.patterns
                .push(format!("Most influential factors: {}", top.join(", ")));
        }

        if total < LIMITED_DATA_RECORDS {
            out.lower_confidence(0.2, 0.3);
            out.patterns.push(format!(
                "Limited data ({total} records); patterns may change as more entries are logged"
            ));
            out.recommendations
                .push("Keep logging daily to improve assessment accuracy".to_string());
        }

        out
    }
}
