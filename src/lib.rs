//! # Campaign Insights
//!
//! A deterministic evidence pipeline that diagnoses advertising campaign
//! performance and recommends creative changes.
//!
//! ## Stages
//!
//! - **Baseline**: percentile baselines for CTR (across campaigns) and ROAS
//!   (over a window of days), with static fallbacks for thin history
//! - **Hypotheses**: candidate explanations for metric declines, each with
//!   literal numeric rationale and a base confidence
//! - **Evaluation**: per-metric support/contradiction, severity buckets and
//!   final confidence
//! - **Creatives**: copy recommendations for campaigns below the low-CTR cutoff
//! - **Records**: validation, JSON repair and sanitization for every record
//!   that crosses a stage boundary
//!
//! ## Architecture
//!
//! ```text
//! MetricsSummary → Baseline → Hypotheses → Evaluation → Creatives
//!                                 ↑                         ↓
//!                          records (repair/sanitize)   JSON reports
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use campaign_insights::{MetricsSummary, Pipeline, PipelineConfig};
//!
//! let summary: MetricsSummary = serde_json::from_str("{}").unwrap();
//! let output = Pipeline::new(PipelineConfig::default()).run(&summary);
//! println!("{} insights", output.insights.len());
//! ```

#![warn(missing_docs)]

/// Percentile baselines.
pub mod baseline;
/// Configuration management.
pub mod config;
/// Creative recommendations.
pub mod creative;
/// Error types and result aliases for the application.
pub mod error;
/// Hypothesis validation and severity.
pub mod evaluator;
/// Summary/baseline evidence merge.
pub mod evidence;
/// Hypothesis generation.
pub mod hypothesis;
/// Zero-safe numeric helpers.
pub mod numeric;
/// Report file writer.
pub mod output;
/// Stage sequencing.
pub mod pipeline;
/// Record validation, repair and sanitization.
pub mod records;
/// Metrics summary value types.
pub mod summary;

pub use baseline::{Baseline, BaselineCalculator};
pub use config::{Config, PipelineConfig};
pub use error::{AppError, AppResult};
pub use pipeline::{Pipeline, PipelineOutput};
pub use summary::MetricsSummary;
