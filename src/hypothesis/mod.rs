//! Hypothesis generation from summary and baseline evidence.
//!
//! Generation answers "is this worth investigating"; it never adjusts
//! confidence based on evidence strength beyond the signal's base value.
//! That is the [`Evaluator`](crate::evaluator::Evaluator)'s job.

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::baseline::Baseline;
use crate::config::{GeneratorConfig, RetryConfig};
use crate::evidence::Evidence;
use crate::numeric::{clamp_unit, fmt_pct};
use crate::records::{
    conform, fetch_records, from_value, Delay, RecordSchema, RecordSource, SchemaRecord,
    HYPOTHESIS_SCHEMA,
};
use crate::summary::MetricsSummary;

/// Metric a hypothesis can reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    /// Click-through rate.
    Ctr,
    /// Return on ad spend.
    Roas,
}

impl MetricKind {
    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Ctr => "ctr",
            MetricKind::Roas => "roas",
        }
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A candidate explanation for a metric movement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hypothesis {
    /// Identifier, `h1..hn` in ranked order.
    pub id: String,
    /// Human-readable claim.
    pub hypothesis: String,
    /// Literal numeric reasoning, self-contained for audit.
    pub rationale: Vec<String>,
    /// Raw `key=value` facts taken from the summary.
    pub evidence_from_summary: Vec<String>,
    /// Signal base confidence in `[0, 1]`.
    pub initial_confidence: f64,
    /// Metrics the claim depends on.
    pub metrics_used: BTreeSet<MetricKind>,
    /// Set when `initial_confidence` is below the configured minimum.
    #[serde(default)]
    pub refine_request: bool,
}

impl Hypothesis {
    /// True when the hypothesis references `metric`.
    pub fn uses(&self, metric: MetricKind) -> bool {
        self.metrics_used.contains(&metric)
    }
}

impl SchemaRecord for Hypothesis {
    fn schema() -> &'static RecordSchema {
        &HYPOTHESIS_SCHEMA
    }
}

/// Derives candidate hypotheses from evidence.
#[derive(Debug, Clone)]
pub struct HypothesisGenerator {
    config: GeneratorConfig,
}

impl HypothesisGenerator {
    /// Create a new generator.
    pub fn new(config: GeneratorConfig) -> Self {
        Self { config }
    }

    /// Generate ranked hypotheses for a summary and its baseline.
    ///
    /// Signals on metrics absent from the summary are skipped. An empty
    /// summary yields an empty list.
    pub fn generate(&self, summary: &MetricsSummary, baseline: &Baseline) -> Vec<Hypothesis> {
        let evidence = Evidence::gather(summary, baseline);

        let candidates: Vec<Hypothesis> = [
            self.roas_decline(&evidence),
            self.creative_fatigue(&evidence),
            self.small_sample(&evidence),
            self.creative_scarcity(&evidence, summary.totals.num_creatives),
        ]
        .into_iter()
        .flatten()
        .collect();

        let ranked = self.finalize(candidates);
        info!(
            generated = ranked.len(),
            refine = ranked.iter().filter(|h| h.refine_request).count(),
            "Hypotheses generated"
        );
        ranked
    }

    /// Accept hypotheses from an external text generator.
    ///
    /// Replies go through the bounded retry loop; whatever comes back is
    /// schema-valid and is ranked the same way as generated hypotheses.
    pub fn ingest_external(
        &self,
        source: &mut dyn RecordSource,
        retry: &RetryConfig,
        delay: &dyn Delay,
    ) -> Vec<Hypothesis> {
        let outcome = fetch_records(source, &HYPOTHESIS_SCHEMA, retry, delay);
        let candidates: Vec<Hypothesis> = outcome
            .records
            .into_iter()
            .filter_map(from_value::<Hypothesis>)
            .collect();
        info!(
            status = ?outcome.status,
            attempts = outcome.attempts_used,
            received = candidates.len(),
            "External hypotheses ingested"
        );
        self.finalize(candidates)
    }

    fn roas_decline(&self, ev: &Evidence) -> Option<Hypothesis> {
        let last = ev.last_roas?;
        let delta = ev.roas_delta?;
        let trigger = self.config.triggers.roas_delta;

        let fired = if ev.has_roas_baseline() {
            delta < trigger
        } else {
            last < ev.roas_drop_threshold
        };
        if !fired {
            debug!(roas_delta = delta, trigger, "ROAS decline signal not triggered");
            return None;
        }

        Some(candidate(
            format!(
                "ROAS has declined by {} vs baseline; investigate budget, creative and traffic",
                fmt_pct(delta)
            ),
            vec![
                format!(
                    "Latest ROAS {:.2} vs baseline {:.2} ({})",
                    last,
                    ev.roas_baseline,
                    fmt_pct(delta)
                ),
                format!(
                    "ROAS delta {} is below trigger {}",
                    fmt_pct(delta),
                    fmt_pct(trigger)
                ),
            ],
            vec![
                format!("last_roas={last:.4}"),
                format!("roas_baseline={:.4}", ev.roas_baseline),
                format!("roas_drop_threshold={:.4}", ev.roas_drop_threshold),
            ],
            delta.abs().clamp(0.2, 0.9),
            &[MetricKind::Roas],
        ))
    }

    fn creative_fatigue(&self, ev: &Evidence) -> Option<Hypothesis> {
        let last = ev.last_ctr?;
        let delta = ev.ctr_delta?;
        let trigger = self.config.triggers.ctr_delta;

        let fired = if ev.has_ctr_baseline() {
            delta < trigger
        } else {
            last < ev.ctr_threshold
        };
        if !fired {
            debug!(ctr_delta = delta, trigger, "Creative fatigue signal not triggered");
            return None;
        }

        Some(candidate(
            format!(
                "CTR has dropped by {} vs baseline; possible creative fatigue or targeting issue",
                fmt_pct(delta)
            ),
            vec![
                format!(
                    "Aggregate CTR {:.4} vs baseline {:.4} ({})",
                    last,
                    ev.ctr_baseline,
                    fmt_pct(delta)
                ),
                format!(
                    "CTR delta {} is below trigger {}",
                    fmt_pct(delta),
                    fmt_pct(trigger)
                ),
            ],
            vec![
                format!("last_ctr={last:.4}"),
                format!("ctr_baseline={:.4}", ev.ctr_baseline),
                format!("ctr_threshold={:.4}", ev.ctr_threshold),
            ],
            delta.abs().clamp(0.2, 0.85),
            &[MetricKind::Ctr],
        ))
    }

    fn small_sample(&self, ev: &Evidence) -> Option<Hypothesis> {
        let days = ev.days_used;
        if days == 0 || days >= self.config.small_sample_days {
            return None;
        }
        Some(candidate(
            "Sample size for baseline is small; results may be noisy, gather more data or widen the baseline window"
                .to_string(),
            vec![format!(
                "Baseline computed from {} days, fewer than {}",
                days, self.config.small_sample_days
            )],
            vec![format!("days_used={days}")],
            0.25,
            &[MetricKind::Ctr, MetricKind::Roas],
        ))
    }

    fn creative_scarcity(&self, ev: &Evidence, num_creatives: Option<u32>) -> Option<Hypothesis> {
        let delta = ev.roas_delta?;
        let creatives = num_creatives?;
        if !ev.has_roas_baseline()
            || delta >= self.config.scarcity_roas_delta
            || creatives >= self.config.scarcity_max_creatives
        {
            return None;
        }
        Some(candidate(
            "Significant ROAS drop with few creatives detected; try fresh creative variants targeted at top segments"
                .to_string(),
            vec![
                format!(
                    "ROAS delta {} is below {}",
                    fmt_pct(delta),
                    fmt_pct(self.config.scarcity_roas_delta)
                ),
                format!(
                    "Only {} distinct creatives, fewer than {}",
                    creatives, self.config.scarcity_max_creatives
                ),
            ],
            vec![format!("num_creatives={creatives}")],
            0.8,
            &[MetricKind::Roas],
        ))
    }

    /// Dedupe by text, rank by confidence, keep `top_k`, assign ids, flag
    /// borderline confidence and conform every record to its schema.
    fn finalize(&self, candidates: Vec<Hypothesis>) -> Vec<Hypothesis> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut ranked: Vec<Hypothesis> = candidates
            .into_iter()
            .filter(|h| {
                let text = h.hypothesis.trim();
                !text.is_empty() && seen.insert(text.to_string())
            })
            .collect();

        ranked.sort_by(|a, b| b.initial_confidence.total_cmp(&a.initial_confidence));
        ranked.truncate(self.config.top_k);

        ranked
            .into_iter()
            .enumerate()
            .map(|(i, mut h)| {
                h.id = format!("h{}", i + 1);
                h.initial_confidence = clamp_unit(h.initial_confidence);
                h.refine_request = h.refine_request || h.initial_confidence < self.config.confidence_min;
                conform(&h)
            })
            .collect()
    }
}

fn candidate(
    hypothesis: String,
    rationale: Vec<String>,
    evidence_from_summary: Vec<String>,
    initial_confidence: f64,
    metrics: &[MetricKind],
) -> Hypothesis {
    Hypothesis {
        id: String::new(),
        hypothesis,
        rationale,
        evidence_from_summary,
        initial_confidence,
        metrics_used: metrics.iter().copied().collect(),
        refine_request: false,
    }
}
