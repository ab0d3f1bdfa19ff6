use indexmap::IndexMap;

use super::features::{FeatureSet, FEATURE_COUNT, FEATURE_NAMES};
use super::stats::population_variance;
use crate::types::{zero_importance, ClusterResult};

/// Relative importance of each feature to the cluster structure.
///
/// Per feature: within-cluster variance summed over clusters (singletons
/// contribute 0), divided by the number of clusters, then scaled so the
/// largest score is 1. All zeros when no feature varies inside any cluster.
pub fn feature_importance(clusters: &[ClusterResult]) -> IndexMap<String, f64> {
    if clusters.is_empty() {
        return zero_importance();
    }

    let mut scores = [0.0; FEATURE_COUNT];
    for cluster in clusters.iter().filter(|c| c.size() > 1) {
        for (col, score) in scores.iter_mut().enumerate() {
            let column: Vec<f64> = cluster.members.iter().map(|m| m.values()[col]).collect();
            *score += population_variance(&column);
        }
    }

    let cluster_count = clusters.len() as f64;
    for score in &mut scores {
        *score /= cluster_count;
    }

    let max = scores.iter().copied().fold(0.0, f64::max);
    FEATURE_NAMES
        .iter()
        .zip(scores)
        .map(|(name, score)| {
            let scaled = if max > 0.0 { score / max } else { 0.0 };
            (name.to_string(), scaled)
        })
        .collect()
}

/// Importance for a single standardized record: squared deviation from its
/// centroid per feature, scaled so the largest is 1.
pub fn deviation_importance(features: &FeatureSet, centroid: &[f64]) -> IndexMap<String, f64> {
    let values = features.to_array();
    let deviations: Vec<f64> = values
        .iter()
        .zip(centroid.iter().chain(std::iter::repeat(&0.0)))
        .map(|(v, c)| (v - c).powi(2))
        .collect();
    let max = deviations.iter().copied().fold(0.0, f64::max);
    FEATURE_NAMES
        .iter()
        .zip(deviations)
        .map(|(name, d)| (name.to_string(), if max > 0.0 { d / max } else { 0.0 }))
        .collect()
}

/// The `n` most important features, highest first. Ties keep feature order.
pub fn top_features(importance: &IndexMap<String, f64>, n: usize) -> Vec<(&str, f64)> {
    let mut ranked: Vec<(&str, f64)> = importance.iter().map(|(k, &v)| (k.as_str(), v)).collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    ranked.truncate(n);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::features::{FeatureEngineer, FeatureVector};
    use chrono::{TimeZone, Utc};
    use vitals_core::HealthRecord;

    fn cluster(id: usize, members: Vec<FeatureVector>) -> ClusterResult {
        ClusterResult {
            cluster_id: id,
            centroid: vec![0.0; FEATURE_COUNT],
            members,
            inertia: 0.0,
            silhouette_score: 0.0,
        }
    }

    fn vectors(specs: &[(u8, f64)]) -> Vec<FeatureVector> {
        let ts = Utc.with_ymd_and_hms(2024, 1, 2, 10, 0, 0).unwrap();
        let records: Vec<HealthRecord> = specs
            .iter()
            .map(|&(severity, sleep)| HealthRecord::new(severity, sleep, 5, 30.0, ts))
            .collect();
        FeatureEngineer::new().extract("u1", &records).unwrap()
    }

    #[test]
    fn top_feature_scales_to_one() {
        // Severity spreads 4 points inside the cluster, sleep only 1 hour.
        let members = vectors(&[(2, 7.0), (6, 8.0)]);
        let importance = feature_importance(&[cluster(0, members)]);

        assert_eq!(importance.len(), FEATURE_COUNT);
        let max = importance.values().copied().fold(0.0, f64::max);
        assert!((max - 1.0).abs() < 1e-12);
        assert!(importance.values().all(|&v| (0.0..=1.0).contains(&v)));
        assert!(importance["severity"] > importance["sleep"]);
        assert_eq!(importance["stress"], 0.0);
    }

    #[test]
    fn singletons_contribute_nothing() {
        let v = vectors(&[(1, 4.0), (9, 10.0)]);
        let clusters = vec![cluster(0, vec![v[0].clone()]), cluster(1, vec![v[1].clone()])];
        let importance = feature_importance(&clusters);
        assert!(importance.values().all(|&s| s == 0.0));
    }

    #[test]
    fn keys_follow_canonical_order() {
        let importance = feature_importance(&[]);
        let keys: Vec<&str> = importance.keys().map(String::as_str).collect();
        assert_eq!(keys, FEATURE_NAMES.to_vec());
    }

    #[test]
    fn deviation_importance_scales_largest_gap() {
        let mut values = [0.0; FEATURE_COUNT];
        values[0] = 2.0;
        values[2] = 1.0;
        let importance = deviation_importance(&FeatureSet::from_array(values), &[0.0; FEATURE_COUNT]);
        assert_eq!(importance["severity"], 1.0);
        assert!((importance["stress"] - 0.25).abs() < 1e-12);
        assert_eq!(importance["sleep"], 0.0);
    }

    #[test]
    fn top_features_ranked_descending() {
        let mut importance = zero_importance();
        importance.insert("sleep".into(), 0.4);
        importance.insert("stress".into(), 1.0);
        importance.insert("exercise".into(), 0.7);
        let top = top_features(&importance, 3);
        assert_eq!(top, vec![("stress", 1.0), ("exercise", 0.7), ("sleep", 0.4)]);
    }
}
