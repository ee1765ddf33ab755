use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use signal_gru::config::{self, ExperimentConfig};
use signal_gru::data::{loader, merge, sentiment, synthetic};
use signal_gru::nn::dataset::prepare_features;
use signal_gru::nn::evaluation::{run_evaluation, EvaluationReport};

/// Cross-validate a dilated GRU ensemble on daily buy/sell signals.
///
/// Without `--sentiment`/`--prices` the run uses seeded random windows.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Window length in trading days (repeatable)
    #[arg(long = "seq-len", default_values_t = config::DEMO_SEQ_LENS.to_vec())]
    seq_lens: Vec<usize>,

    /// Synthetic window count
    #[arg(long, default_value_t = config::DEMO_NUM_SAMPLES)]
    samples: usize,

    /// Synthetic feature count
    #[arg(long, default_value_t = config::DEMO_NUM_FEATURES)]
    features: usize,

    #[arg(long, default_value_t = config::DEMO_SEED)]
    seed: u64,

    /// Sentiment events CSV
    #[arg(long, requires = "prices")]
    sentiment: Option<PathBuf>,

    /// Daily price table CSV with a label column
    #[arg(long, requires = "sentiment")]
    prices: Option<PathBuf>,

    #[arg(long, default_value = config::LABEL_COLUMN)]
    label_col: String,

    /// Project standardized features onto this many principal components
    #[arg(long)]
    n_components: Option<usize>,

    /// Hyper-parameters as JSON
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the evaluation reports as JSON
    #[arg(long)]
    report: Option<PathBuf>,

    /// Train on the Wgpu backend
    #[arg(long)]
    gpu: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    if args.seq_lens.is_empty() {
        bail!("at least one --seq-len is required");
    }

    let experiment = match &args.config {
        Some(path) => ExperimentConfig::from_file(path).context("Failed to load experiment config")?,
        None => ExperimentConfig::new(),
    };
    tracing::debug!("Experiment config: {}", experiment);

    let reports = match (&args.sentiment, &args.prices) {
        (Some(sentiment_path), Some(prices_path)) => {
            run_pipeline(&args, &experiment, sentiment_path, prices_path)?
        }
        _ => run_synthetic(&args, &experiment)?,
    };

    for report in &reports {
        tracing::info!(
            "Sequence length {}: mean AUC {:.4} (fold AUCs {:?}, std {:.4})",
            report.seq_len,
            report.mean_auc,
            report.fold_aucs(),
            report.auc_std
        );
    }

    if let Some(path) = &args.report {
        let json = serde_json::to_string_pretty(&reports).context("Failed to serialize report")?;
        std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
        tracing::info!("Report written to {}", path.display());
    }

    Ok(())
}

fn run_synthetic(args: &Args, experiment: &ExperimentConfig) -> anyhow::Result<Vec<EvaluationReport>> {
    let mut reports = Vec::with_capacity(args.seq_lens.len());
    for &seq_len in &args.seq_lens {
        tracing::info!(
            "Synthetic run: {} windows of {} steps x {} features (seed {})",
            args.samples,
            seq_len,
            args.features,
            args.seed
        );
        let dataset = synthetic::random_windows(args.samples, seq_len, args.features, args.seed);
        let report = run_evaluation(&dataset, experiment, args.gpu)
            .with_context(|| format!("Evaluation failed for sequence length {}", seq_len))?;
        reports.push(report);
    }
    Ok(reports)
}

fn run_pipeline(
    args: &Args,
    experiment: &ExperimentConfig,
    sentiment_path: &Path,
    prices_path: &Path,
) -> anyhow::Result<Vec<EvaluationReport>> {
    let events = loader::load_sentiment_events(sentiment_path)
        .with_context(|| format!("Failed to load sentiment from {}", sentiment_path.display()))?;
    let prices = loader::load_price_table(prices_path)
        .with_context(|| format!("Failed to load prices from {}", prices_path.display()))?;

    let daily = sentiment::aggregate_daily_sentiment(&events);
    let table = merge::merge_price_sentiment(&prices, &daily);

    let mut reports = Vec::with_capacity(args.seq_lens.len());
    for &seq_len in &args.seq_lens {
        let dataset = prepare_features(&table, &args.label_col, args.n_components, seq_len)
            .with_context(|| format!("Failed to build {}-step windows", seq_len))?;
        let report = run_evaluation(&dataset, experiment, args.gpu)
            .with_context(|| format!("Evaluation failed for sequence length {}", seq_len))?;
        reports.push(report);
    }
    Ok(reports)
}
