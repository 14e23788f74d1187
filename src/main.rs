use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use campaign_insights::{
    config::{Config, LogFormat, PipelineConfig},
    output::write_reports,
    records::{ReplyFile, ThreadSleep},
    MetricsSummary, Pipeline,
};

/// Diagnose campaign performance from a metrics summary.
#[derive(Debug, Parser)]
#[command(name = "campaign-insights", version, about)]
struct Cli {
    /// Metrics summary JSON file.
    #[arg(long)]
    summary: PathBuf,

    /// Output directory for reports (defaults to OUTPUT_DIR or ./reports).
    #[arg(long)]
    out: Option<PathBuf>,

    /// Pipeline configuration JSON file; replaces environment settings.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the baseline window in days.
    #[arg(long)]
    window_days: Option<u32>,

    /// Override the minimum confidence for generated and validated hypotheses.
    #[arg(long)]
    confidence_min: Option<f64>,

    /// Reply file of an external hypothesis generator; replaces the built-in
    /// signals. Re-read with backoff until it holds valid records.
    #[arg(long)]
    hypotheses: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize logging
    init_logging(&config);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Campaign insights starting..."
    );

    if let Some(path) = &cli.config {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        config.pipeline = serde_json::from_str::<PipelineConfig>(&raw)
            .with_context(|| format!("parsing config {}", path.display()))?;
        info!(path = %path.display(), "Pipeline config loaded from file");
    }
    if let Some(days) = cli.window_days {
        config.pipeline.baseline.window_days = days;
    }
    if let Some(min) = cli.confidence_min {
        config.pipeline.generator.confidence_min = min;
        config.pipeline.evaluator.confidence_min = min;
    }
    if let Err(e) = config.pipeline.validate() {
        error!(error = %e, "Invalid pipeline configuration");
        return Err(e.into());
    }

    let raw = fs::read_to_string(&cli.summary)
        .with_context(|| format!("reading summary {}", cli.summary.display()))?;
    let summary: MetricsSummary = serde_json::from_str(&raw)
        .with_context(|| format!("parsing summary {}", cli.summary.display()))?;
    info!(
        campaigns = summary.campaigns.len(),
        days = summary.daily_roas.len(),
        "Summary loaded"
    );
    if summary.is_empty() {
        warn!("Summary has no campaigns and no daily history");
    }

    let pipeline = Pipeline::new(config.pipeline.clone());
    let output = match &cli.hypotheses {
        Some(path) => {
            info!(path = %path.display(), "Using external hypotheses");
            let mut source = ReplyFile::new(path);
            pipeline.run_with_source(&summary, &mut source, &ThreadSleep)
        }
        None => pipeline.run(&summary),
    };

    let out_dir = cli.out.unwrap_or_else(|| config.output.dir.clone());
    match write_reports(&out_dir, &output) {
        Ok(paths) => {
            for path in paths {
                info!(path = %path.display(), "Report written");
            }
        }
        Err(e) => {
            error!(error = %e, "Failed to write reports");
            return Err(e.into());
        }
    }

    if output.alert.alerted {
        info!(reason = %output.alert.reason, "Alert raised");
    }
    info!(run_id = %output.run_id, "Run complete");
    Ok(())
}

/// Initialize tracing/logging
fn init_logging(config: &Config) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}
