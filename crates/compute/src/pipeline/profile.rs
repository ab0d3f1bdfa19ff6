//! Descriptive profile of a record batch: column statistics, correlations,
//! a K range suggestion, symptom frequency and summary, and when in the
//! day and week records are logged.
//!
//! Hours and weekdays are read in each record's own offset.

use std::collections::{BTreeMap, HashMap};

use chrono::{Datelike, Timelike};
use serde::Serialize;

use vitals_core::HealthRecord;

use super::features::{FeatureEngineer, FEATURE_COUNT, FEATURE_NAMES};
use crate::error::ComputeError;

/// Pairs with |r| above this are reported.
const CORRELATION_THRESHOLD: f64 = 0.3;
/// Columns whose range exceeds this should be standardized before clustering.
const NORMALIZATION_RANGE: f64 = 10.0;
const TOP_SYMPTOMS: usize = 10;
const MAX_RECOMMENDED_K: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnStats {
    pub name: String,
    pub mean: f64,
    /// Sample (n - 1) standard deviation.
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub variance: f64,
    pub coefficient_of_variation: f64,
    /// Values outside the 1.5 IQR fences.
    pub outliers: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Correlation {
    pub a: String,
    pub b: String,
    pub r: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct KRange {
    pub min: usize,
    pub max: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SymptomCount {
    pub symptom: String,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimePeriod {
    EarlyMorning,
    Morning,
    Noon,
    Afternoon,
    Evening,
    Night,
}

impl TimePeriod {
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            5..=7 => TimePeriod::EarlyMorning,
            8..=11 => TimePeriod::Morning,
            12..=13 => TimePeriod::Noon,
            14..=16 => TimePeriod::Afternoon,
            17..=19 => TimePeriod::Evening,
            _ => TimePeriod::Night,
        }
    }
}

/// Symptom list sizes across the batch.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SymptomSummary {
    pub mean_per_record: f64,
    pub max_per_record: usize,
    pub records_without_symptoms: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HourCount {
    pub hour: u32,
    pub period: TimePeriod,
    pub records: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayCount {
    pub day: String,
    pub records: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HourSeverity {
    pub hour: u32,
    pub records: usize,
    pub mean_severity: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetProfile {
    pub record_count: usize,
    pub columns: Vec<ColumnStats>,
    pub correlations: Vec<Correlation>,
    pub recommended_k: Option<KRange>,
    pub needs_normalization: Vec<String>,
    pub top_symptoms: Vec<SymptomCount>,
    pub symptom_summary: SymptomSummary,
    /// Records per local hour, ascending, labelled with the hour's period.
    pub hour_distribution: Vec<HourCount>,
    /// Records per weekday, Monday first, days without records omitted.
    pub day_of_week_distribution: Vec<DayCount>,
    pub severity_by_hour: Vec<HourSeverity>,
    /// Hour with the highest mean severity; ties go to the earliest hour.
    pub peak_hour: Option<u32>,
    /// Hour with the lowest mean severity; ties go to the earliest hour.
    pub lowest_hour: Option<u32>,
}

impl DatasetProfile {
    /// Profile a batch. Empty input gives an empty profile; an invalid
    /// record is an error.
    pub fn build(records: &[HealthRecord]) -> Result<Self, ComputeError> {
        if records.is_empty() {
            return Ok(Self::default());
        }

        let vectors = FeatureEngineer::new().extract("profile", records)?;
        let columns: Vec<Vec<f64>> = (0..FEATURE_COUNT)
            .map(|col| vectors.iter().map(|v| v.values()[col]).collect())
            .collect();

        let stats: Vec<ColumnStats> = columns
            .iter()
            .zip(FEATURE_NAMES)
            .map(|(values, name)| column_stats(name, values))
            .collect();

        let needs_normalization = stats
            .iter()
            .filter(|s| s.max - s.min > NORMALIZATION_RANGE)
            .map(|s| s.name.clone())
            .collect();

        let severity_by_hour = severity_by_hour(records);
        let peak_hour = first_extreme(&severity_by_hour, |candidate, best| candidate > best);
        let lowest_hour = first_extreme(&severity_by_hour, |candidate, best| candidate < best);

        Ok(Self {
            record_count: records.len(),
            correlations: correlations(&columns),
            recommended_k: recommended_k(records.len()),
            needs_normalization,
            top_symptoms: top_symptoms(records, TOP_SYMPTOMS),
            symptom_summary: symptom_summary(records),
            hour_distribution: hour_distribution(records),
            day_of_week_distribution: day_of_week_distribution(records),
            columns: stats,
            severity_by_hour,
            peak_hour,
            lowest_hour,
        })
    }
}

/// `[max(2, floor(sqrt(n/2))), min(10, floor(sqrt(n)))]` with the lower
/// bound capped at 10, or `None` when the batch is too small for two clusters.
pub fn recommended_k(n: usize) -> Option<KRange> {
    let min = ((n as f64 / 2.0).sqrt().floor() as usize).clamp(2, MAX_RECOMMENDED_K);
    let max = ((n as f64).sqrt().floor() as usize).min(MAX_RECOMMENDED_K);
    (min <= max).then_some(KRange { min, max })
}

fn column_stats(name: &str, values: &[f64]) -> ColumnStats {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = if values.len() > 1 {
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)
    } else {
        0.0
    };
    let std = variance.sqrt();
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    ColumnStats {
        name: name.to_string(),
        mean,
        std,
        min,
        max,
        variance,
        coefficient_of_variation: std / (mean + 0.001),
        outliers: iqr_outliers(values),
    }
}

/// Linear-interpolated quantile of sorted values.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = (sorted.len() - 1) as f64 * q;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

fn iqr_outliers(values: &[f64]) -> usize {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let q1 = quantile(&sorted, 0.25);
    let q3 = quantile(&sorted, 0.75);
    let iqr = q3 - q1;
    let (lo, hi) = (q1 - 1.5 * iqr, q3 + 1.5 * iqr);
    values.iter().filter(|&&v| v < lo || v > hi).count()
}

fn pearson(a: &[f64], b: &[f64]) -> Option<f64> {
    let n = a.len() as f64;
    let mean_a = a.iter().sum::<f64>() / n;
    let mean_b = b.iter().sum::<f64>() / n;
    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (x, y) in a.iter().zip(b) {
        let (dx, dy) = (x - mean_a, y - mean_b);
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }
    let denom = (var_a * var_b).sqrt();
    (denom > 0.0).then(|| cov / denom)
}

fn correlations(columns: &[Vec<f64>]) -> Vec<Correlation> {
    let mut out = Vec::new();
    for i in 0..columns.len() {
        for j in (i + 1)..columns.len() {
            if let Some(r) = pearson(&columns[i], &columns[j]) {
                if r.abs() > CORRELATION_THRESHOLD {
                    out.push(Correlation {
                        a: FEATURE_NAMES[i].to_string(),
                        b: FEATURE_NAMES[j].to_string(),
                        r,
                    });
                }
            }
        }
    }
    out
}

fn top_symptoms(records: &[HealthRecord], n: usize) -> Vec<SymptomCount> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for symptom in records.iter().flat_map(|r| &r.symptoms) {
        let key = symptom.trim().to_lowercase();
        if !key.is_empty() {
            *counts.entry(key).or_default() += 1;
        }
    }
    let mut ranked: Vec<SymptomCount> = counts
        .into_iter()
        .map(|(symptom, count)| SymptomCount { symptom, count })
        .collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.symptom.cmp(&b.symptom)));
    ranked.truncate(n);
    ranked
}

fn symptom_summary(records: &[HealthRecord]) -> SymptomSummary {
    let total: usize = records.iter().map(|r| r.symptoms.len()).sum();
    SymptomSummary {
        mean_per_record: total as f64 / records.len().max(1) as f64,
        max_per_record: records.iter().map(|r| r.symptoms.len()).max().unwrap_or(0),
        records_without_symptoms: records.iter().filter(|r| r.symptoms.is_empty()).count(),
    }
}

fn hour_distribution(records: &[HealthRecord]) -> Vec<HourCount> {
    let mut counts: BTreeMap<u32, usize> = BTreeMap::new();
    for r in records {
        *counts.entry(r.timestamp.hour()).or_default() += 1;
    }
    counts
        .into_iter()
        .map(|(hour, records)| HourCount {
            hour,
            period: TimePeriod::from_hour(hour),
            records,
        })
        .collect()
}

const WEEKDAYS: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

fn day_of_week_distribution(records: &[HealthRecord]) -> Vec<DayCount> {
    let mut counts = [0usize; 7];
    for r in records {
        counts[r.timestamp.weekday().num_days_from_monday() as usize] += 1;
    }
    WEEKDAYS
        .iter()
        .zip(counts)
        .filter(|(_, n)| *n > 0)
        .map(|(name, records)| DayCount {
            day: name.to_string(),
            records,
        })
        .collect()
}

fn severity_by_hour(records: &[HealthRecord]) -> Vec<HourSeverity> {
    let mut sums: BTreeMap<u32, (f64, usize)> = BTreeMap::new();
    for r in records {
        let entry = sums.entry(r.timestamp.hour()).or_default();
        entry.0 += f64::from(r.severity);
        entry.1 += 1;
    }
    sums.into_iter()
        .map(|(hour, (total, count))| HourSeverity {
            hour,
            records: count,
            mean_severity: total / count as f64,
        })
        .collect()
}

/// Earliest hour whose mean beats every hour before it under `beats`.
fn first_extreme(hours: &[HourSeverity], beats: impl Fn(f64, f64) -> bool) -> Option<u32> {
    let mut best: Option<&HourSeverity> = None;
    for h in hours {
        if best.map_or(true, |b| beats(h.mean_severity, b.mean_severity)) {
            best = Some(h);
        }
    }
    best.map(|h| h.hour)
}
