use chrono::{DateTime, Datelike, FixedOffset, Timelike, Weekday};
use serde::{Deserialize, Serialize, Serializer};
use tracing::{debug, warn};
use uuid::Uuid;

use vitals_core::HealthRecord;

use super::stats::PopulationStats;
use crate::error::ComputeError;

/// Dimensionality of the engineered feature vector.
pub const FEATURE_COUNT: usize = 14;

/// Feature names, in the one order used everywhere (arrays, JSON, importance).
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "severity",
    "sleep",
    "stress",
    "exercise",
    "symptom_count",
    "symptom_severity_score",
    "symptom_diversity",
    "time_of_day_score",
    "day_of_week_score",
    "sleep_stress_ratio",
    "exercise_severity_ratio",
    "lifestyle_score",
    "diet_quality",
    "notes_complexity",
];

/// Severity weight per known symptom. Anything else weighs [`DEFAULT_SYMPTOM_WEIGHT`].
const SYMPTOM_WEIGHTS: &[(&str, f64)] = &[
    ("chest pain", 10.0),
    ("difficulty breathing", 9.0),
    ("shortness of breath", 9.0),
    ("severe headache", 8.0),
    ("high fever", 8.0),
    ("fever", 7.0),
    ("palpitations", 7.0),
    ("vomiting", 6.0),
    ("dizziness", 6.0),
    ("abdominal pain", 6.0),
    ("fatigue", 5.0),
    ("headache", 5.0),
    ("nausea", 5.0),
    ("diarrhea", 5.0),
    ("muscle pain", 5.0),
    ("joint pain", 5.0),
    ("anxiety", 5.0),
    ("cough", 4.0),
    ("insomnia", 4.0),
    ("sore throat", 3.0),
    ("congestion", 2.0),
    ("runny nose", 2.0),
];

const DEFAULT_SYMPTOM_WEIGHT: f64 = 5.0;

/// Body-system categories and the substrings that place a symptom in them.
const BODY_SYSTEMS: &[(&str, &[&str])] = &[
    (
        "respiratory",
        &["cough", "breath", "throat", "congestion", "runny nose", "wheez", "sneez"],
    ),
    (
        "neurological",
        &["headache", "migraine", "dizz", "numb", "confusion", "tingling", "memory"],
    ),
    (
        "cardiovascular",
        &["chest", "heart", "palpitation", "blood pressure", "swelling"],
    ),
    (
        "gastrointestinal",
        &["nausea", "vomit", "diarrhea", "constipation", "abdominal", "stomach", "bloat"],
    ),
    (
        "general",
        &["fatigue", "fever", "weakness", "chills", "pain", "ache", "tired"],
    ),
];

const HEALTHY_DIET_KEYWORDS: &[&str] = &[
    "vegetables",
    "fruits",
    "whole grain",
    "lean protein",
    "water",
    "healthy",
];

const UNHEALTHY_DIET_KEYWORDS: &[&str] = &["fast food", "junk", "processed", "sugar", "soda", "fried"];

const DIET_BASELINE: f64 = 5.0;

/// The 14 engineered features of one record.
///
/// Named fields keep values and names aligned by construction; the array
/// form (and JSON) follows [`FEATURE_NAMES`].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "[f64; 14]", into = "[f64; 14]")]
pub struct FeatureSet {
    pub severity: f64,
    pub sleep: f64,
    pub stress: f64,
    pub exercise: f64,
    pub symptom_count: f64,
    pub symptom_severity_score: f64,
    pub symptom_diversity: f64,
    pub time_of_day_score: f64,
    pub day_of_week_score: f64,
    pub sleep_stress_ratio: f64,
    pub exercise_severity_ratio: f64,
    pub lifestyle_score: f64,
    pub diet_quality: f64,
    pub notes_complexity: f64,
}

impl FeatureSet {
    pub fn to_array(&self) -> [f64; FEATURE_COUNT] {
        [
            self.severity,
            self.sleep,
            self.stress,
            self.exercise,
            self.symptom_count,
            self.symptom_severity_score,
            self.symptom_diversity,
            self.time_of_day_score,
            self.day_of_week_score,
            self.sleep_stress_ratio,
            self.exercise_severity_ratio,
            self.lifestyle_score,
            self.diet_quality,
            self.notes_complexity,
        ]
    }

    pub fn from_array(values: [f64; FEATURE_COUNT]) -> Self {
        let [severity, sleep, stress, exercise, symptom_count, symptom_severity_score, symptom_diversity, time_of_day_score, day_of_week_score, sleep_stress_ratio, exercise_severity_ratio, lifestyle_score, diet_quality, notes_complexity] =
            values;
        Self {
            severity,
            sleep,
            stress,
            exercise,
            symptom_count,
            symptom_severity_score,
            symptom_diversity,
            time_of_day_score,
            day_of_week_score,
            sleep_stress_ratio,
            exercise_severity_ratio,
            lifestyle_score,
            diet_quality,
            notes_complexity,
        }
    }

    /// Build from a slice of exactly [`FEATURE_COUNT`] values.
    pub fn from_slice(values: &[f64]) -> Option<Self> {
        let array: [f64; FEATURE_COUNT] = values.try_into().ok()?;
        Some(Self::from_array(array))
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.to_array().to_vec()
    }

    /// `(name, value)` pairs in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f64)> {
        FEATURE_NAMES.into_iter().zip(self.to_array())
    }
}

impl From<[f64; FEATURE_COUNT]> for FeatureSet {
    fn from(values: [f64; FEATURE_COUNT]) -> Self {
        Self::from_array(values)
    }
}

impl From<FeatureSet> for [f64; FEATURE_COUNT] {
    fn from(set: FeatureSet) -> Self {
        set.to_array()
    }
}

/// Serializes as the constant [`FEATURE_NAMES`] array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FeatureNames;

impl Serialize for FeatureNames {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        FEATURE_NAMES.serialize(serializer)
    }
}

/// One record's features plus the metadata needed to trace it back.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureVector {
    pub id: Uuid,
    pub user_id: String,
    pub timestamp: DateTime<FixedOffset>,
    pub features: FeatureSet,
    pub feature_names: FeatureNames,
    pub raw_data: HealthRecord,
}

impl FeatureVector {
    pub fn values(&self) -> [f64; FEATURE_COUNT] {
        self.features.to_array()
    }
}

/// Turns raw records into feature vectors and standardizes batches.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureEngineer;

impl FeatureEngineer {
    pub fn new() -> Self {
        Self
    }

    /// Extract one feature vector per record, in input order.
    ///
    /// Fails on the first record with a non-finite or negative quantity.
    pub fn extract(
        &self,
        user_id: &str,
        records: &[HealthRecord],
    ) -> Result<Vec<FeatureVector>, ComputeError> {
        let vectors = records
            .iter()
            .enumerate()
            .map(|(index, record)| -> Result<FeatureVector, ComputeError> {
                record
                    .validate()
                    .map_err(|source| ComputeError::InvalidRecord { index, source })?;
                let outside = record.out_of_nominal_range();
                if !outside.is_empty() {
                    warn!(user_id, index, fields = ?outside, "record outside nominal range");
                }
                Ok(FeatureVector {
                    id: Uuid::new_v4(),
                    user_id: user_id.to_string(),
                    timestamp: record.timestamp,
                    features: self.extract_features(record),
                    feature_names: FeatureNames,
                    raw_data: record.clone(),
                })
            })
            .collect::<Result<Vec<_>, ComputeError>>()?;

        debug!(user_id, count = vectors.len(), "extracted feature vectors");
        Ok(vectors)
    }

    /// The 14 features of a single record. Depends only on the record.
    pub fn extract_features(&self, record: &HealthRecord) -> FeatureSet {
        let severity = f64::from(record.severity);
        let stress = f64::from(record.stress);
        let sleep = record.sleep;
        let exercise = record.exercise;

        FeatureSet {
            severity,
            sleep,
            stress,
            exercise,
            symptom_count: record.symptoms.len() as f64,
            symptom_severity_score: symptom_severity_score(&record.symptoms),
            symptom_diversity: symptom_diversity(&record.symptoms),
            time_of_day_score: time_of_day_score(&record.timestamp),
            day_of_week_score: day_of_week_score(&record.timestamp),
            sleep_stress_ratio: if record.stress == 0 { sleep } else { sleep / stress },
            exercise_severity_ratio: if record.severity == 0 {
                exercise
            } else {
                exercise / severity
            },
            lifestyle_score: lifestyle_score(sleep, stress, exercise),
            diet_quality: diet_quality(&record.diet),
            notes_complexity: notes_complexity(&record.notes),
        }
    }

    /// Per-column z-score across the batch.
    ///
    /// Returns new vectors (same ids and metadata); zero-variance columns become 0.
    pub fn normalize(&self, vectors: &[FeatureVector]) -> Vec<FeatureVector> {
        let rows: Vec<Vec<f64>> = vectors.iter().map(|v| v.features.to_vec()).collect();
        let stats = PopulationStats::from_rows(&rows);
        vectors
            .iter()
            .map(|v| self.normalize_with(&stats, v))
            .collect()
    }

    /// Standardize one vector against precomputed column statistics.
    pub fn normalize_with(&self, stats: &PopulationStats, vector: &FeatureVector) -> FeatureVector {
        let standardized = stats.standardize(&vector.features.to_array());
        FeatureVector {
            features: FeatureSet::from_slice(&standardized).unwrap_or_default(),
            ..vector.clone()
        }
    }
}

fn symptom_severity_score(symptoms: &[String]) -> f64 {
    if symptoms.is_empty() {
        return 0.0;
    }
    let total: f64 = symptoms
        .iter()
        .map(|s| {
            let key = s.trim().to_lowercase();
            SYMPTOM_WEIGHTS
                .iter()
                .find(|(name, _)| *name == key)
                .map(|&(_, w)| w)
                .unwrap_or(DEFAULT_SYMPTOM_WEIGHT)
        })
        .sum();
    total / symptoms.len() as f64
}

fn symptom_diversity(symptoms: &[String]) -> f64 {
    let lowered: Vec<String> = symptoms.iter().map(|s| s.to_lowercase()).collect();
    BODY_SYSTEMS
        .iter()
        .filter(|(_, keywords)| {
            lowered
                .iter()
                .any(|s| keywords.iter().any(|kw| s.contains(kw)))
        })
        .count() as f64
}

/// Local hour: morning (05-11) = 1, afternoon (12-16) = 2, evening (17-20) = 3, night = 4.
fn time_of_day_score(timestamp: &DateTime<FixedOffset>) -> f64 {
    match timestamp.hour() {
        5..=11 => 1.0,
        12..=16 => 2.0,
        17..=20 => 3.0,
        _ => 4.0,
    }
}

fn day_of_week_score(timestamp: &DateTime<FixedOffset>) -> f64 {
    match timestamp.weekday() {
        Weekday::Sat | Weekday::Sun => 1.0,
        _ => 0.0,
    }
}

fn lifestyle_score(sleep: f64, stress: f64, exercise: f64) -> f64 {
    (sleep / 8.0).min(1.0) * 0.4 + (10.0 - stress) / 10.0 * 0.3 + (exercise / 60.0).min(1.0) * 0.3
}

fn diet_quality(diet: &str) -> f64 {
    let diet = diet.to_lowercase();
    let healthy = HEALTHY_DIET_KEYWORDS.iter().filter(|kw| diet.contains(*kw)).count();
    let unhealthy = UNHEALTHY_DIET_KEYWORDS.iter().filter(|kw| diet.contains(*kw)).count();
    (DIET_BASELINE + healthy as f64 - unhealthy as f64).clamp(0.0, 10.0)
}

fn notes_complexity(notes: &str) -> f64 {
    let words = notes.split_whitespace().count();
    if words == 0 {
        return 0.0;
    }
    let sentences = notes
        .split(['.', '!', '?'])
        .filter(|s| !s.trim().is_empty())
        .count()
        .max(1);
    let avg_words_per_sentence = words as f64 / sentences as f64;
    (words as f64 * 0.1 + avg_words_per_sentence * 0.2).min(10.0)
}
