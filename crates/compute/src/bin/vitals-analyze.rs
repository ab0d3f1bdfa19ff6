//! vitals-analyze: batch health-pattern analysis from JSON files.
//!
//! Subcommands:
//! - `analyze`  : per-user clustering and risk assessment
//! - `profile`  : descriptive statistics over every record in the file
//! - `fit-model`: fit a centroid model for single-record lookups

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use tracing::info;

use vitals_compute::pipeline::metrics::BatchMetrics;
use vitals_compute::{AnalysisResult, CentroidModel, DatasetProfile, HealthAnalyzer, RiskModel};
use vitals_core::config::load_dotenv;
use vitals_core::{AnalysisConfig, HealthRecord, UserRecords};

// ── CLI ─────────────────────────────────────────────────────────────

/// Health-pattern clustering and risk assessment over logged records.
#[derive(Parser, Debug)]
#[command(name = "vitals-analyze", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze every user in a JSON array of `{ userId, records }`.
    Analyze {
        /// Input file.
        #[arg(long)]
        input: PathBuf,

        /// Centroid model used for single-record users.
        #[arg(long, env = "VITALS_MODEL")]
        model: Option<PathBuf>,

        /// Base PRNG seed (overrides ANALYSIS_SEED).
        #[arg(long)]
        seed: Option<u64>,

        /// Log batch metrics when done.
        #[arg(long)]
        metrics: bool,
    },
    /// Print the dataset profile of all records in the file.
    Profile {
        #[arg(long)]
        input: PathBuf,
    },
    /// Fit a centroid model over all records and write it as JSON.
    FitModel {
        #[arg(long)]
        input: PathBuf,

        #[arg(long)]
        output: PathBuf,

        #[arg(long)]
        seed: Option<u64>,
    },
}

fn main() -> Result<()> {
    // .env may carry RUST_LOG.
    load_dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = AnalysisConfig::from_env().context("invalid analysis configuration")?;
    config.log_summary();

    match cli.command {
        Command::Analyze {
            input,
            model,
            seed,
            metrics,
        } => analyze(config, &input, model.as_deref(), seed, metrics),
        Command::Profile { input } => profile(&input),
        Command::FitModel {
            input,
            output,
            seed,
        } => fit_model(&config, &input, &output, seed),
    }
}

fn read_users(path: &Path) -> Result<Vec<UserRecords>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
}

fn all_records(users: Vec<UserRecords>) -> Vec<HealthRecord> {
    users.into_iter().flat_map(|u| u.records).collect()
}

fn analyze(
    mut config: AnalysisConfig,
    input: &Path,
    model_path: Option<&Path>,
    seed: Option<u64>,
    with_metrics: bool,
) -> Result<()> {
    if seed.is_some() {
        config.seed = seed;
    }

    let model = match model_path {
        Some(path) => {
            let model = CentroidModel::from_json_file(path)
                .with_context(|| format!("failed to load model {}", path.display()))?;
            info!(path = %path.display(), clusters = model.clusters.len(), "loaded centroid model");
            RiskModel::deployed(model)
        }
        None => RiskModel::FullPipeline,
    };

    let mut users = read_users(input)?;
    for user in &mut users {
        user.truncate_to_recent(config.max_records);
    }
    info!(users = users.len(), "analyzing");

    let base_seed = config.seed;
    let analyzer = HealthAnalyzer::with_model(config, model);
    let start = Instant::now();

    let outcomes: Vec<(AnalysisResult, usize, std::time::Duration)> = users
        .par_iter()
        .enumerate()
        .map(|(i, user)| {
            let t = Instant::now();
            let result = match base_seed {
                Some(seed) => {
                    let mut rng = StdRng::seed_from_u64(seed.wrapping_add(i as u64));
                    analyzer.analyze_with_rng(&user.user_id, &user.records, &mut rng)
                }
                None => analyzer.analyze_health_data(&user.user_id, &user.records),
            };
            (result, user.records.len(), t.elapsed())
        })
        .collect();

    let mut metrics = BatchMetrics::default();
    for (result, count, elapsed) in &outcomes {
        metrics.record(result, *count, *elapsed);
    }
    metrics.finish(start.elapsed());
    info!(
        users = metrics.users,
        high = metrics.high,
        errors = metrics.errors,
        elapsed_ms = start.elapsed().as_millis(),
        "batch completed"
    );
    if with_metrics {
        info!(metrics = %serde_json::to_string(&metrics)?, "batch metrics");
    }

    let results: Vec<AnalysisResult> = outcomes.into_iter().map(|(r, _, _)| r).collect();
    println!("{}", serde_json::to_string_pretty(&results)?);
    Ok(())
}

fn profile(input: &Path) -> Result<()> {
    let records = all_records(read_users(input)?);
    let profile = DatasetProfile::build(&records).context("failed to profile records")?;
    info!(records = profile.record_count, "profiled dataset");
    println!("{}", serde_json::to_string_pretty(&profile)?);
    Ok(())
}

fn fit_model(config: &AnalysisConfig, input: &Path, output: &Path, seed: Option<u64>) -> Result<()> {
    let records = all_records(read_users(input)?);
    let mut rng = match seed.or(config.seed) {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let model =
        CentroidModel::fit(&records, config, &mut rng).context("failed to fit centroid model")?;
    model
        .to_json_file(output)
        .with_context(|| format!("failed to write {}", output.display()))?;
    info!(
        output = %output.display(),
        clusters = model.clusters.len(),
        records = model.training_records,
        "model written"
    );
    Ok(())
}
