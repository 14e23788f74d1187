//! ROAS-drop alert rule.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::AlertConfig;

/// Result of the alert rule. `reason` starts with a machine-friendly token:
/// `roas_drop_exceeded`, `no_creatives_and_roas_drop_exceeded` or `no_alert`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertDecision {
    /// Whether the rule fired.
    pub alerted: bool,
    /// Token plus the numbers compared.
    pub reason: String,
    /// ROAS drop as a positive fraction (0 when ROAS rose).
    pub roas_drop: f64,
    /// Validation rate of the run.
    pub validation_rate: f64,
    /// Creatives produced by the run.
    pub num_creatives: usize,
    /// Drop threshold applied.
    pub threshold_used: f64,
}

/// Fire when ROAS dropped past the threshold and either the validation rate
/// is low or no creatives were produced.
pub fn roas_drop_rule(
    roas_delta: Option<f64>,
    validation_rate: f64,
    num_creatives: usize,
    config: &AlertConfig,
) -> AlertDecision {
    let roas_drop = roas_delta.map(|d| (-d).max(0.0)).unwrap_or(0.0);
    let threshold = config.roas_drop_threshold;
    let exceeded = roas_drop > threshold;
    let no_creatives = num_creatives == 0;
    let low_rate = validation_rate < config.min_validation_rate;

    let reason = if exceeded && no_creatives {
        format!(
            "no_creatives_and_roas_drop_exceeded: roas_drop={roas_drop:.4} threshold={threshold:.4}"
        )
    } else if exceeded && low_rate {
        format!(
            "roas_drop_exceeded: roas_drop={roas_drop:.4} exceeds threshold={threshold:.4} with low validation_rate={validation_rate:.4}"
        )
    } else {
        format!(
            "no_alert: roas_drop={roas_drop:.4}, threshold={threshold:.4}, validation_rate={validation_rate:.4}"
        )
    };
    let alerted = exceeded && (no_creatives || low_rate);

    if alerted {
        warn!(roas_drop, threshold, validation_rate, num_creatives, "ROAS drop alert");
    }

    AlertDecision {
        alerted,
        reason,
        roas_drop,
        validation_rate,
        num_creatives,
        threshold_used: threshold,
    }
}
