//! Flat JSON report files.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::error::AppResult;
use crate::evaluator::ValidationMetrics;
use crate::pipeline::PipelineOutput;

/// Insights file name.
pub const INSIGHTS_FILE: &str = "insights.json";
/// Creatives file name.
pub const CREATIVES_FILE: &str = "creatives.json";
/// Metrics file name.
pub const METRICS_FILE: &str = "metrics.json";
/// Baseline file name.
pub const BASELINE_FILE: &str = "baseline.json";
/// Alert file name.
pub const ALERT_FILE: &str = "alert.json";

#[derive(Serialize)]
struct RunMetrics<'a> {
    run_id: Uuid,
    generated_at: DateTime<Utc>,
    #[serde(flatten)]
    metrics: &'a ValidationMetrics,
}

/// Write the run's artifacts as pretty JSON files under `dir`.
///
/// Creates `dir` if needed and returns the written paths.
pub fn write_reports(dir: &Path, output: &PipelineOutput) -> AppResult<Vec<PathBuf>> {
    fs::create_dir_all(dir)?;

    let metrics = RunMetrics {
        run_id: output.run_id,
        generated_at: output.generated_at,
        metrics: &output.metrics,
    };

    let paths = vec![
        write_json(dir, INSIGHTS_FILE, &output.insights)?,
        write_json(dir, CREATIVES_FILE, &output.creatives)?,
        write_json(dir, METRICS_FILE, &metrics)?,
        write_json(dir, BASELINE_FILE, &output.baseline)?,
        write_json(dir, ALERT_FILE, &output.alert)?,
    ];

    info!(
        dir = %dir.display(),
        files = paths.len(),
        run_id = %output.run_id,
        "Reports written"
    );
    Ok(paths)
}

fn write_json<T: Serialize + ?Sized>(dir: &Path, name: &str, value: &T) -> AppResult<PathBuf> {
    let path = dir.join(name);
    let json = serde_json::to_string_pretty(value)?;
    fs::write(&path, json)?;
    Ok(path)
}
