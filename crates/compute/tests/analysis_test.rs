//! End-to-end analysis over realistic user histories.
//!
//! Every test runs through `HealthAnalyzer` with a fixed seed so cluster
//! counts and patterns are reproducible.

use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;

use vitals_compute::{
    AnalysisResult, CentroidModel, DeployedModel, HealthAnalyzer, RiskLevel, RiskModel,
    FEATURE_NAMES,
};
use vitals_core::{AnalysisConfig, HealthRecord, UserRecords};

fn seeded_config(seed: u64) -> AnalysisConfig {
    AnalysisConfig {
        seed: Some(seed),
        ..AnalysisConfig::default()
    }
}

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 9, 2, 9, 30, 0).unwrap()
}

fn has_pattern(result: &AnalysisResult, needle: &str) -> bool {
    result
        .patterns
        .iter()
        .any(|p| p.to_lowercase().contains(needle))
}

fn assert_partition(result: &AnalysisResult, n: usize) {
    assert_eq!(result.clustered_count(), n, "every vector lands in one cluster");
    assert_eq!(result.clusters.len(), result.optimal_k);
    let mut ids: Vec<_> = result
        .clusters
        .iter()
        .flat_map(|c| c.members.iter().map(|m| m.id))
        .collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), n, "no vector appears twice");
    for (i, cluster) in result.clusters.iter().enumerate() {
        assert_eq!(cluster.cluster_id, i);
        assert!(cluster.size() > 0, "cluster {i} is empty");
    }
}

#[test]
fn two_records_are_insufficient() {
    let ts = base_time();
    let records = vec![
        HealthRecord::new(4, 7.0, 5, 30.0, ts),
        HealthRecord::new(5, 6.5, 6, 20.0, ts + Duration::days(1)),
    ];
    let result = HealthAnalyzer::new(seeded_config(1)).analyze_health_data("alice", &records);

    assert_eq!(result.risk_level, RiskLevel::Low);
    assert!((result.confidence - 0.1).abs() < 1e-12);
    assert!(result.clusters.is_empty());
    assert!(result.anomalies.is_empty());
    assert_eq!(result.user_id, "alice");
}

#[test]
fn two_severity_groups_cluster_apart() {
    let ts = base_time();
    let records: Vec<HealthRecord> = std::iter::repeat(9)
        .take(7)
        .chain(std::iter::repeat(1).take(3))
        .map(|severity| HealthRecord::new(severity, 7.0, 3, 60.0, ts))
        .collect();

    let result = HealthAnalyzer::new(seeded_config(11)).analyze_health_data("bob", &records);

    assert!(result.risk_level >= RiskLevel::Medium);
    assert!(has_pattern(&result, "moderate") || has_pattern(&result, "high"));
    assert!((2..=5).contains(&result.optimal_k), "k = {}", result.optimal_k);
    assert_partition(&result, records.len());

    let mut sizes: Vec<usize> = result.clusters.iter().map(|c| c.size()).collect();
    sizes.sort();
    assert_eq!(sizes, vec![3, 7]);
}

#[test]
fn extreme_entry_is_reported_as_anomaly() {
    let ts = base_time();
    let mut records: Vec<HealthRecord> = (0..9)
        .map(|_| HealthRecord::new(3, 8.0, 3, 40.0, ts))
        .collect();
    records.push(HealthRecord::new(10, 0.0, 10, 0.0, ts));

    let result = HealthAnalyzer::new(seeded_config(5)).analyze_health_data("carol", &records);

    assert_eq!(result.anomalies.len(), 1);
    assert_eq!(result.anomalies[0].raw_data, records[9]);
    assert_partition(&result, records.len());
}

#[test]
fn varied_history_keeps_invariants_across_seeds() {
    let ts = base_time();
    let records: Vec<HealthRecord> = (0..24)
        .map(|i| {
            let severity = 1 + (i * 7 % 10) as u8;
            let sleep = 4.0 + (i % 5) as f64;
            let stress = 1 + (i * 3 % 10) as u8;
            let exercise = (i * 13 % 90) as f64;
            HealthRecord::new(severity, sleep, stress, exercise, ts + Duration::hours(7 * i as i64))
                .with_symptoms(if i % 3 == 0 { vec!["headache", "nausea"] } else { vec!["fatigue"] })
                .with_diet(if i % 2 == 0 { "vegetables and water" } else { "fast food" })
                .with_notes("Felt tired. Long day at work.")
        })
        .collect();

    for seed in [1, 2, 3, 99] {
        let result = HealthAnalyzer::new(seeded_config(seed)).analyze_health_data("dave", &records);
        assert!(!result.patterns[0].starts_with("Analysis error"), "{:?}", result.patterns);
        assert_partition(&result, records.len());
        assert!((1..=10).contains(&result.optimal_k));
        assert!((0.0..=1.0).contains(&result.confidence));
        assert_eq!(result.feature_importance.len(), FEATURE_NAMES.len());
        assert!(result
            .feature_importance
            .values()
            .all(|v| (0.0..=1.0).contains(v)));
        for cluster in &result.clusters {
            assert!((-1.0..=1.0).contains(&cluster.silhouette_score));
            assert!(cluster.inertia >= 0.0);
        }
    }
}

#[test]
fn invalid_input_becomes_error_result() {
    let ts = base_time();
    let mut records: Vec<HealthRecord> =
        (0..5).map(|_| HealthRecord::new(5, 7.0, 5, 30.0, ts)).collect();
    records[3].exercise = -10.0;

    let result = HealthAnalyzer::new(seeded_config(1)).analyze_health_data("erin", &records);

    assert_eq!(result.confidence, 0.0);
    assert_eq!(result.risk_level, RiskLevel::Low);
    assert!(result.patterns[0].starts_with("Analysis error"));
}

#[test]
fn single_record_uses_fitted_model_and_falls_back_without_one() {
    let ts = base_time();
    let mut population = Vec::new();
    for i in 0..10 {
        population.push(HealthRecord::new(1 + (i % 2) as u8, 8.0, 2, 60.0, ts));
        population.push(HealthRecord::new(9 - (i % 2) as u8, 4.0, 9, 5.0, ts));
    }
    let mut rng = StdRng::seed_from_u64(8);
    let model = CentroidModel::fit(&population, &AnalysisConfig::default(), &mut rng).unwrap();
    assert!(model.model_info().is_deployed);

    let record = [HealthRecord::new(9, 4.0, 9, 5.0, ts)];

    let with_model = HealthAnalyzer::with_model(seeded_config(1), RiskModel::deployed(model));
    let result = with_model.analyze_health_data("frank", &record);
    assert_eq!(result.risk_level, RiskLevel::High);
    assert_eq!(result.clusters.len(), 1);
    assert_eq!(result.clusters[0].size(), 1);
    assert!(result.algorithm.starts_with("deployed-centroid-lookup"));
    assert!((0.1..=0.95).contains(&result.confidence));

    let without = HealthAnalyzer::new(seeded_config(1)).analyze_health_data("frank", &record);
    assert!((without.confidence - 0.1).abs() < 1e-12);
    assert!(without.clusters.is_empty());
}

#[test]
fn result_json_uses_camel_case_and_arrays() {
    let ts = base_time();
    let records: Vec<HealthRecord> = (0..6)
        .map(|i| HealthRecord::new(2 + i as u8, 7.0, 4, 30.0, ts + Duration::days(i)))
        .collect();
    let result = HealthAnalyzer::new(seeded_config(4)).analyze_health_data("gina", &records);
    let json = serde_json::to_value(&result).unwrap();

    assert!(json["optimalK"].is_u64());
    assert!(json["riskLevel"].is_string());
    assert!(json["anomalies"].is_array());
    assert_eq!(json["featureImportance"].as_object().unwrap().len(), 14);

    let member = &json["clusters"][0]["members"][0];
    assert_eq!(member["features"].as_array().unwrap().len(), 14);
    assert_eq!(member["featureNames"].as_array().unwrap().len(), 14);
    assert_eq!(member["featureNames"][0], "severity");
    assert_eq!(member["userId"], "gina");
    assert!(member["rawData"]["timestamp"].is_string());
}

#[test]
fn user_batch_parses_and_truncates() {
    let raw = r#"[
        {"userId": "u1", "records": [
            {"severity": 3, "sleep": 7.5, "stress": 4, "exercise": 30, "timestamp": "2024-01-01T08:00:00Z"},
            {"severity": 5, "sleep": 6.0, "stress": 6, "exercise": 10, "timestamp": "2024-01-02T08:00:00Z", "symptoms": ["headache"]},
            {"severity": 7, "sleep": 5.0, "stress": 8, "exercise": 0, "timestamp": "2024-01-03T08:00:00Z", "diet": "fast food"}
        ]}
    ]"#;
    let mut users: Vec<UserRecords> = serde_json::from_str(raw).unwrap();
    users[0].truncate_to_recent(2);
    assert_eq!(users[0].records.len(), 2);
    assert_eq!(users[0].records[0].severity, 5);

    let result = HealthAnalyzer::new(seeded_config(1)).analyze_health_data(&users[0].user_id, &users[0].records);
    assert!(result.clusters.is_empty(), "two records after truncation");
}
