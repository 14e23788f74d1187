use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::evaluator::Severity;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Logging settings
    pub logging: LoggingConfig,
    /// Pipeline stage settings
    pub pipeline: PipelineConfig,
    /// Report output settings
    pub output: OutputConfig,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,
    /// Output format
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    /// Human-readable
    Pretty,
    /// One JSON object per line
    Json,
}

/// Report output configuration
#[derive(Debug, Clone)]
pub struct OutputConfig {
    /// Directory the report files are written to
    pub dir: PathBuf,
}

/// Immutable configuration for one pipeline run.
///
/// Every option has a built-in default; a missing option is never an error.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Baseline computation options.
    pub baseline: BaselineConfig,
    /// Hypothesis generation options.
    pub generator: GeneratorConfig,
    /// Validation and severity options.
    pub evaluator: EvaluatorConfig,
    /// Creative recommendation options.
    pub creative: CreativeConfig,
    /// Retry options for external record sources.
    pub retry: RetryConfig,
    /// ROAS-drop alert rule options.
    pub alerts: AlertConfig,
}

/// Configuration for the percentile baselines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaselineConfig {
    /// Number of most recent calendar days of daily ROAS to consider.
    pub window_days: u32,
    /// Percentile (0-100) of campaign CTRs used as the low-CTR threshold.
    pub ctr_percentile_low: f64,
    /// Percentile (0-100) of campaign CTRs used as the CTR baseline.
    pub ctr_percentile_mid: f64,
    /// Percentile (0-100) of daily ROAS used as the drop threshold.
    pub roas_percentile_low: f64,
    /// Percentile (0-100) of daily ROAS used as the ROAS baseline.
    pub roas_percentile_mid: f64,
    /// Minimum days of ROAS history before percentiles are trusted.
    pub min_days: usize,
    /// Minimum campaigns before CTR percentiles are trusted.
    pub min_campaigns: usize,
    /// Static values used below the sample floor.
    pub fallback: FallbackThresholds,
}

impl Default for BaselineConfig {
    fn default() -> Self {
        Self {
            window_days: 30,
            ctr_percentile_low: 10.0,
            ctr_percentile_mid: 50.0,
            roas_percentile_low: 25.0,
            roas_percentile_mid: 50.0,
            min_days: 1,
            min_campaigns: 1,
            fallback: FallbackThresholds::default(),
        }
    }
}

/// Static thresholds used when there is too little history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackThresholds {
    /// Fallback CTR baseline.
    pub ctr_baseline: f64,
    /// Fallback low-CTR threshold.
    pub ctr_threshold: f64,
    /// Fallback ROAS baseline.
    pub roas_baseline: f64,
    /// Fallback ROAS drop threshold.
    pub roas_drop_threshold: f64,
}

impl Default for FallbackThresholds {
    fn default() -> Self {
        Self {
            ctr_baseline: 0.012,
            ctr_threshold: 0.01,
            roas_baseline: 1.0,
            roas_drop_threshold: 0.92,
        }
    }
}

/// Delta triggers shared by the generator and the evaluator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalTriggers {
    /// CTR delta (fraction) below which a CTR decline is signalled.
    pub ctr_delta: f64,
    /// ROAS delta (fraction) below which a ROAS decline is signalled.
    pub roas_delta: f64,
}

impl Default for SignalTriggers {
    fn default() -> Self {
        Self {
            ctr_delta: -0.05,
            roas_delta: -0.05,
        }
    }
}

/// Configuration for hypothesis generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Hypotheses below this initial confidence carry a refine request.
    pub confidence_min: f64,
    /// Delta triggers.
    pub triggers: SignalTriggers,
    /// Baselines built from fewer days than this emit a small-sample hypothesis.
    pub small_sample_days: usize,
    /// ROAS delta below which creative scarcity is considered.
    pub scarcity_roas_delta: f64,
    /// Creative counts below this are considered scarce.
    pub scarcity_max_creatives: u32,
    /// Maximum number of hypotheses kept.
    pub top_k: usize,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            confidence_min: 0.3,
            triggers: SignalTriggers::default(),
            small_sample_days: 7,
            scarcity_roas_delta: -0.20,
            scarcity_max_creatives: 2,
            top_k: 5,
        }
    }
}

/// A confidence-qualified severity bucket: `delta < delta_below && confidence > confidence_above`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceGate {
    /// Bucket this gate qualifies for.
    pub severity: Severity,
    /// Delta bound (fraction).
    pub delta_below: f64,
    /// Confidence bound.
    pub confidence_above: f64,
}

/// Delta bounds per severity bucket, plus confidence-qualified gates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeverityThresholds {
    /// `delta < critical` is critical.
    pub critical: f64,
    /// `delta < high` is high.
    pub high: f64,
    /// `delta < medium` is medium.
    pub medium: f64,
    /// `delta < low` is low.
    pub low: f64,
    /// Additional confidence-qualified bounds.
    pub gates: Vec<ConfidenceGate>,
}

impl Default for SeverityThresholds {
    fn default() -> Self {
        Self {
            critical: -0.40,
            high: -0.20,
            medium: -0.05,
            low: 0.0,
            gates: vec![
                ConfidenceGate {
                    severity: Severity::Critical,
                    delta_below: -0.30,
                    confidence_above: 0.8,
                },
                ConfidenceGate {
                    severity: Severity::High,
                    delta_below: -0.20,
                    confidence_above: 0.7,
                },
                ConfidenceGate {
                    severity: Severity::Medium,
                    delta_below: -0.10,
                    confidence_above: 0.5,
                },
            ],
        }
    }
}

/// Configuration for hypothesis validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluatorConfig {
    /// Severity buckets.
    pub severity: SeverityThresholds,
    /// Confidence bonus for critical, high and medium severity.
    pub severity_bonus: f64,
    /// Confidence bonus for low severity.
    pub low_severity_bonus: f64,
    /// Delta triggers for supporting evidence.
    pub triggers: SignalTriggers,
    /// A metric moving up by more than this contradicts a decline hypothesis.
    pub contradiction_tolerance: f64,
    /// Validated hypotheses below this final confidence get an audit note.
    pub confidence_min: f64,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            severity: SeverityThresholds::default(),
            severity_bonus: 0.25,
            low_severity_bonus: 0.0,
            triggers: SignalTriggers::default(),
            contradiction_tolerance: 0.05,
            confidence_min: 0.3,
        }
    }
}

/// Configuration for creative recommendations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CreativeConfig {
    /// Cap on recommendations; `None` keeps every qualifying campaign.
    pub max_recommendations: Option<usize>,
    /// Campaigns below this CTR get a softer call to action.
    pub soft_cta_ctr: f64,
}

impl Default for CreativeConfig {
    fn default() -> Self {
        Self {
            max_recommendations: None,
            soft_cta_ctr: 0.01,
        }
    }
}

/// Upper bound on a single backoff wait.
const MAX_BACKOFF_SECS: f64 = 300.0;

/// Retry configuration for external record sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of fetch attempts.
    pub attempts: u32,
    /// Wait before each retry, in seconds; the last entry repeats.
    pub backoff_seconds: Vec<f64>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff_seconds: vec![1.0, 2.0, 4.0],
        }
    }
}

impl RetryConfig {
    /// Delay to wait after the given failed attempt (0-based).
    pub fn backoff_for(&self, attempt_index: usize) -> Duration {
        let secs = self
            .backoff_seconds
            .get(attempt_index)
            .or_else(|| self.backoff_seconds.last())
            .copied()
            .unwrap_or(0.0);
        Duration::from_secs_f64(crate::numeric::normalize(secs, 0.0).clamp(0.0, MAX_BACKOFF_SECS))
    }
}

/// Configuration for the ROAS-drop alert rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// ROAS drop (positive fraction) above which the rule may fire.
    pub roas_drop_threshold: f64,
    /// Validation rates below this count as low.
    pub min_validation_rate: f64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            roas_drop_threshold: 0.20,
            min_validation_rate: 0.5,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, AppError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        };

        let output = OutputConfig {
            dir: PathBuf::from(env::var("OUTPUT_DIR").unwrap_or_else(|_| "./reports".to_string())),
        };

        let pipeline = PipelineConfig::from_env();
        pipeline.validate()?;

        Ok(Config {
            logging,
            pipeline,
            output,
        })
    }
}

impl PipelineConfig {
    /// Build pipeline options from environment variables, defaulting anything unset.
    pub fn from_env() -> Self {
        let defaults = PipelineConfig::default();

        let triggers = SignalTriggers {
            ctr_delta: env_or("CTR_DELTA_TRIGGER", defaults.generator.triggers.ctr_delta),
            roas_delta: env_or("ROAS_DELTA_TRIGGER", defaults.generator.triggers.roas_delta),
        };
        let confidence_min = env_or("CONFIDENCE_MIN", defaults.generator.confidence_min);

        let baseline = BaselineConfig {
            window_days: env_or("WINDOW_DAYS", defaults.baseline.window_days),
            ctr_percentile_low: env_or("CTR_PERCENTILE_LOW", defaults.baseline.ctr_percentile_low),
            ctr_percentile_mid: env_or("CTR_PERCENTILE_MID", defaults.baseline.ctr_percentile_mid),
            roas_percentile_low: env_or(
                "ROAS_PERCENTILE_LOW",
                defaults.baseline.roas_percentile_low,
            ),
            roas_percentile_mid: env_or(
                "ROAS_PERCENTILE_MID",
                defaults.baseline.roas_percentile_mid,
            ),
            ..defaults.baseline
        };

        let generator = GeneratorConfig {
            confidence_min,
            triggers: triggers.clone(),
            top_k: env_or("TOP_K_INSIGHTS", defaults.generator.top_k),
            ..defaults.generator
        };

        let severity = SeverityThresholds {
            critical: env_or("SEVERITY_CRITICAL_DELTA", defaults.evaluator.severity.critical),
            high: env_or("SEVERITY_HIGH_DELTA", defaults.evaluator.severity.high),
            medium: env_or("SEVERITY_MEDIUM_DELTA", defaults.evaluator.severity.medium),
            low: env_or("SEVERITY_LOW_DELTA", defaults.evaluator.severity.low),
            ..defaults.evaluator.severity
        };

        let evaluator = EvaluatorConfig {
            severity,
            severity_bonus: env_or("SEVERITY_BONUS", defaults.evaluator.severity_bonus),
            triggers,
            confidence_min,
            ..defaults.evaluator
        };

        let retry = RetryConfig {
            attempts: env_or("RETRY_ATTEMPTS", defaults.retry.attempts),
            backoff_seconds: env::var("RETRY_BACKOFF_SECONDS")
                .ok()
                .and_then(|s| parse_seconds_list(&s))
                .unwrap_or(defaults.retry.backoff_seconds),
        };

        Self {
            baseline,
            generator,
            evaluator,
            creative: defaults.creative,
            retry,
            alerts: defaults.alerts,
        }
    }

    /// Reject option combinations that would break baseline monotonicity.
    pub fn validate(&self) -> Result<(), AppError> {
        let b = &self.baseline;
        if b.window_days == 0 {
            return Err(config_error("WINDOW_DAYS must be at least 1"));
        }
        for (name, value) in [
            ("CTR_PERCENTILE_LOW", b.ctr_percentile_low),
            ("CTR_PERCENTILE_MID", b.ctr_percentile_mid),
            ("ROAS_PERCENTILE_LOW", b.roas_percentile_low),
            ("ROAS_PERCENTILE_MID", b.roas_percentile_mid),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(config_error(&format!(
                    "{name} must be within [0, 100], got {value}"
                )));
            }
        }
        if b.ctr_percentile_low > b.ctr_percentile_mid {
            return Err(config_error(
                "CTR_PERCENTILE_LOW must not exceed CTR_PERCENTILE_MID",
            ));
        }
        if b.roas_percentile_low > b.roas_percentile_mid {
            return Err(config_error(
                "ROAS_PERCENTILE_LOW must not exceed ROAS_PERCENTILE_MID",
            ));
        }
        if b.fallback.ctr_threshold > b.fallback.ctr_baseline
            || b.fallback.roas_drop_threshold > b.fallback.roas_baseline
        {
            return Err(config_error(
                "fallback thresholds must not exceed fallback baselines",
            ));
        }
        if self.retry.backoff_seconds.iter().any(|s| !s.is_finite() || *s < 0.0) {
            return Err(config_error(
                "RETRY_BACKOFF_SECONDS must contain non-negative numbers",
            ));
        }
        Ok(())
    }
}

fn config_error(message: &str) -> AppError {
    AppError::Config {
        message: message.to_string(),
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

/// Parse a comma-separated list of seconds such as `"1, 2, 4"`.
fn parse_seconds_list(raw: &str) -> Option<Vec<f64>> {
    let values: Option<Vec<f64>> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<f64>().ok())
        .collect();
    values.filter(|v| !v.is_empty())
}
