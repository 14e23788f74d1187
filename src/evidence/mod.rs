//! Current-vs-baseline evidence shared by the generator and the evaluator.

use serde::{Deserialize, Serialize};

use crate::baseline::Baseline;
use crate::numeric::pct_delta;
use crate::summary::MetricsSummary;

/// Latest observed metrics and their zero-safe deltas against a baseline.
///
/// A `None` metric means the summary carried no data for it; signals on that
/// metric are skipped rather than evaluated against zero.
#[derive(Debug, Clone, PartialEq)]
pub struct Evidence {
    /// Aggregate CTR across all campaigns.
    pub last_ctr: Option<f64>,
    /// Most recent daily ROAS.
    pub last_roas: Option<f64>,
    /// `(last_ctr - ctr_baseline) / ctr_baseline`.
    pub ctr_delta: Option<f64>,
    /// `(last_roas - roas_baseline) / roas_baseline`.
    pub roas_delta: Option<f64>,
    /// CTR baseline the delta was taken against.
    pub ctr_baseline: f64,
    /// Low-CTR cutoff.
    pub ctr_threshold: f64,
    /// ROAS baseline the delta was taken against.
    pub roas_baseline: f64,
    /// ROAS drop cutoff.
    pub roas_drop_threshold: f64,
    /// Days of ROAS history behind the baseline.
    pub days_used: usize,
}

impl Evidence {
    /// Merge a summary with its baseline.
    pub fn gather(summary: &MetricsSummary, baseline: &Baseline) -> Self {
        let last_ctr = summary.aggregate_ctr();
        let last_roas = summary.latest_roas().map(|d| d.roas);
        Self {
            last_ctr,
            last_roas,
            ctr_delta: last_ctr.map(|v| pct_delta(v, baseline.ctr_baseline)),
            roas_delta: last_roas.map(|v| pct_delta(v, baseline.roas_baseline)),
            ctr_baseline: baseline.ctr_baseline,
            ctr_threshold: baseline.ctr_threshold,
            roas_baseline: baseline.roas_baseline,
            roas_drop_threshold: baseline.roas_drop_threshold,
            days_used: baseline.computed_from_days,
        }
    }

    /// True when the CTR baseline is usable for relative comparisons.
    pub fn has_ctr_baseline(&self) -> bool {
        self.ctr_baseline > 0.0
    }

    /// True when the ROAS baseline is usable for relative comparisons.
    pub fn has_roas_baseline(&self) -> bool {
        self.roas_baseline > 0.0
    }
}

/// Evidence attached to a validated hypothesis, limited to the metrics it used.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvidenceSnapshot {
    /// CTR delta in percent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ctr_delta_pct: Option<f64>,
    /// ROAS delta in percent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roas_delta_pct: Option<f64>,
    /// Observed aggregate CTR.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_ctr: Option<f64>,
    /// CTR baseline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ctr_baseline: Option<f64>,
    /// Observed latest ROAS.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_roas: Option<f64>,
    /// ROAS baseline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roas_baseline: Option<f64>,
    /// Days of history behind the baseline.
    #[serde(default)]
    pub days_used: usize,
}

impl EvidenceSnapshot {
    /// Snapshot of the CTR and/or ROAS parts of `evidence`.
    pub fn from_evidence(evidence: &Evidence, include_ctr: bool, include_roas: bool) -> Self {
        let mut snapshot = Self {
            days_used: evidence.days_used,
            ..Self::default()
        };
        if include_ctr {
            snapshot.ctr_delta_pct = evidence.ctr_delta.map(to_pct);
            snapshot.last_ctr = evidence.last_ctr;
            snapshot.ctr_baseline = Some(evidence.ctr_baseline);
        }
        if include_roas {
            snapshot.roas_delta_pct = evidence.roas_delta.map(to_pct);
            snapshot.last_roas = evidence.last_roas;
            snapshot.roas_baseline = Some(evidence.roas_baseline);
        }
        snapshot
    }
}

fn to_pct(fraction: f64) -> f64 {
    (fraction * 1000.0).round() / 10.0
}
