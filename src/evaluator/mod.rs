//! Hypothesis validation and severity ranking.
//!
//! Each referenced metric is assessed independently against the baseline and
//! the assessments are folded into a [`Tally`]. The tally only counts, so the
//! verdict does not depend on the order metrics are examined in:
//!
//! - `validated` requires at least one supporting metric and no contradicting one
//! - severity comes from the most negative supporting delta, first matching
//!   bucket in critical → low order
//! - `final_confidence = clamp(initial + bonus)`, clamped last

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::baseline::Baseline;
use crate::config::{EvaluatorConfig, SeverityThresholds};
use crate::evidence::{Evidence, EvidenceSnapshot};
use crate::hypothesis::{Hypothesis, MetricKind};
use crate::numeric::{clamp_unit, fmt_pct, safe_div};
use crate::summary::MetricsSummary;

/// Urgency bucket of a validated hypothesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// No qualifying evidence.
    None = 0,
    /// Negative movement not otherwise classified.
    Low = 1,
    /// Moderate decline.
    Medium = 2,
    /// Significant decline.
    High = 3,
    /// Severe decline, act immediately.
    Critical = 4,
}

impl Severity {
    /// Classify a delta, with `confidence` as the secondary qualifier.
    ///
    /// Buckets are checked critical first; the first match wins.
    pub fn classify(delta: f64, confidence: f64, thresholds: &SeverityThresholds) -> Self {
        let gated = |severity: Severity| {
            thresholds.gates.iter().any(|g| {
                g.severity == severity && delta < g.delta_below && confidence > g.confidence_above
            })
        };

        if delta < thresholds.critical || gated(Severity::Critical) {
            Severity::Critical
        } else if delta < thresholds.high || gated(Severity::High) {
            Severity::High
        } else if delta < thresholds.medium || gated(Severity::Medium) {
            Severity::Medium
        } else if delta < thresholds.low {
            Severity::Low
        } else {
            Severity::None
        }
    }

    /// True for every bucket except `None`.
    pub fn is_actionable(&self) -> bool {
        *self != Severity::None
    }

    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::None => "none",
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How one metric's evidence bears on a decline hypothesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The metric moved in the claimed direction.
    Supports,
    /// The metric moved against the claim.
    Contradicts,
    /// Within tolerance.
    Neutral,
    /// The summary has no data for the metric.
    NoData,
}

/// Assessment of a single referenced metric.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricAssessment {
    /// Metric assessed.
    pub metric: MetricKind,
    /// Delta against baseline, when data exists.
    pub delta: Option<f64>,
    /// Outcome.
    pub verdict: Verdict,
    /// Literal comparisons performed.
    pub notes: Vec<String>,
}

/// Commutative accumulation of metric assessments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tally {
    /// Supporting metrics.
    pub supports: usize,
    /// Contradicting metrics.
    pub contradicts: usize,
    /// Most negative delta among supporting metrics.
    pub worst_delta: Option<f64>,
}

impl Tally {
    /// Add one assessment.
    pub fn add(&mut self, assessment: &MetricAssessment) {
        match assessment.verdict {
            Verdict::Supports => {
                self.supports += 1;
                if let Some(delta) = assessment.delta {
                    self.worst_delta = Some(match self.worst_delta {
                        Some(worst) => worst.min(delta),
                        None => delta,
                    });
                }
            }
            Verdict::Contradicts => self.contradicts += 1,
            Verdict::Neutral | Verdict::NoData => {}
        }
    }

    /// Fold any sequence of assessments.
    pub fn from_assessments<'a, I>(assessments: I) -> Self
    where
        I: IntoIterator<Item = &'a MetricAssessment>,
    {
        let mut tally = Self::default();
        for assessment in assessments {
            tally.add(assessment);
        }
        tally
    }

    /// At least one supporting metric and none contradicting.
    pub fn validated(&self) -> bool {
        self.supports >= 1 && self.contradicts == 0
    }
}

/// Evaluation result for one hypothesis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatedHypothesis {
    /// Id of the evaluated hypothesis.
    pub id: String,
    /// Hypothesis text.
    pub hypothesis: String,
    /// Metrics the hypothesis referenced.
    pub metrics_used: BTreeSet<MetricKind>,
    /// Evidence supports the claim and nothing contradicts it.
    pub validated: bool,
    /// Confidence after the severity bonus, in `[0, 1]`.
    pub final_confidence: f64,
    /// Urgency bucket; `none` for unvalidated hypotheses.
    pub severity: Severity,
    /// Numbers the verdict was based on.
    pub evidence: EvidenceSnapshot,
    /// Audit trail of literal comparisons.
    pub notes: Vec<String>,
}

/// Aggregate validation statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationMetrics {
    /// Hypotheses evaluated.
    pub num_hypotheses: usize,
    /// Hypotheses validated.
    pub num_validated: usize,
    /// `num_validated / num_hypotheses`, 0 when empty.
    pub validation_rate: f64,
    /// CTR baseline used.
    pub ctr_baseline: f64,
    /// ROAS baseline used.
    pub roas_baseline: f64,
}

/// Output of [`Evaluator::evaluate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    /// One entry per input hypothesis, in input order.
    pub validated: Vec<ValidatedHypothesis>,
    /// Aggregate statistics.
    pub metrics: ValidationMetrics,
}

impl EvaluationReport {
    /// Validated hypotheses with an actionable severity.
    pub fn actionable(&self) -> impl Iterator<Item = &ValidatedHypothesis> {
        self.validated
            .iter()
            .filter(|v| v.validated && v.severity.is_actionable())
    }
}

/// Validates hypotheses against a baseline.
#[derive(Debug, Clone)]
pub struct Evaluator {
    config: EvaluatorConfig,
}

impl Evaluator {
    /// Create a new evaluator.
    pub fn new(config: EvaluatorConfig) -> Self {
        Self { config }
    }

    /// Evaluate every hypothesis. Never fails.
    pub fn evaluate(
        &self,
        hypotheses: &[Hypothesis],
        summary: &MetricsSummary,
        baseline: &Baseline,
    ) -> EvaluationReport {
        let evidence = Evidence::gather(summary, baseline);
        let validated: Vec<ValidatedHypothesis> = hypotheses
            .iter()
            .map(|h| self.evaluate_one(h, &evidence))
            .collect();

        let num_validated = validated.iter().filter(|v| v.validated).count();
        let metrics = ValidationMetrics {
            num_hypotheses: validated.len(),
            num_validated,
            validation_rate: safe_div(num_validated as f64, validated.len() as f64, 0.0),
            ctr_baseline: baseline.ctr_baseline,
            roas_baseline: baseline.roas_baseline,
        };

        info!(
            hypotheses = metrics.num_hypotheses,
            validated = metrics.num_validated,
            validation_rate = metrics.validation_rate,
            "Hypotheses evaluated"
        );

        EvaluationReport { validated, metrics }
    }

    fn evaluate_one(&self, hypothesis: &Hypothesis, evidence: &Evidence) -> ValidatedHypothesis {
        let confidence = clamp_unit(hypothesis.initial_confidence);
        let assessments: Vec<MetricAssessment> = hypothesis
            .metrics_used
            .iter()
            .map(|metric| self.assess(*metric, evidence))
            .collect();
        let tally = Tally::from_assessments(&assessments);
        let validated = tally.validated();

        let severity = match (validated, tally.worst_delta) {
            (true, Some(delta)) => Severity::classify(delta, confidence, &self.config.severity),
            _ => Severity::None,
        };
        let bonus = match severity {
            Severity::Critical | Severity::High | Severity::Medium => self.config.severity_bonus,
            Severity::Low => self.config.low_severity_bonus,
            Severity::None => 0.0,
        };
        let final_confidence = clamp_unit(confidence + bonus);

        let mut notes: Vec<String> = assessments.into_iter().flat_map(|a| a.notes).collect();
        if hypothesis.metrics_used.is_empty() {
            notes.push("No metrics referenced; nothing to validate".to_string());
        }
        notes.push(format!(
            "Severity {} with confidence {:.2} + bonus {:.2} = {:.2}",
            severity, confidence, bonus, final_confidence
        ));
        if validated && final_confidence < self.config.confidence_min {
            notes.push(format!(
                "Final confidence {:.2} below minimum {:.2}; refine before acting",
                final_confidence, self.config.confidence_min
            ));
        }

        debug!(
            id = %hypothesis.id,
            supports = tally.supports,
            contradicts = tally.contradicts,
            validated,
            severity = %severity,
            final_confidence,
            "Hypothesis evaluated"
        );

        ValidatedHypothesis {
            id: hypothesis.id.clone(),
            hypothesis: hypothesis.hypothesis.clone(),
            metrics_used: hypothesis.metrics_used.clone(),
            validated,
            final_confidence,
            severity,
            evidence: EvidenceSnapshot::from_evidence(
                evidence,
                hypothesis.uses(MetricKind::Ctr),
                hypothesis.uses(MetricKind::Roas),
            ),
            notes,
        }
    }

    /// Assess one metric. Supporting and contradicting are mutually exclusive.
    pub fn assess(&self, metric: MetricKind, evidence: &Evidence) -> MetricAssessment {
        let tolerance = self.config.contradiction_tolerance;
        let (last, delta, label) = match metric {
            MetricKind::Ctr => (evidence.last_ctr, evidence.ctr_delta, "CTR"),
            MetricKind::Roas => (evidence.last_roas, evidence.roas_delta, "ROAS"),
        };
        let (Some(last), Some(delta)) = (last, delta) else {
            return MetricAssessment {
                metric,
                delta: None,
                verdict: Verdict::NoData,
                notes: vec![format!("{label}: no data in summary")],
            };
        };

        let mut notes = Vec::new();
        let (trigger, below_cutoff) = match metric {
            MetricKind::Ctr => {
                let trigger = self.config.triggers.ctr_delta;
                let below = last < evidence.ctr_threshold;
                if below {
                    notes.push(format!(
                        "CTR {:.4} below low-CTR threshold {:.4}",
                        last, evidence.ctr_threshold
                    ));
                }
                (trigger, below)
            }
            MetricKind::Roas => {
                let trigger = self.config.triggers.roas_delta;
                let below = evidence.has_roas_baseline() && last < evidence.roas_drop_threshold;
                if below {
                    notes.push(format!(
                        "ROAS {:.2} below drop threshold {:.2}",
                        last, evidence.roas_drop_threshold
                    ));
                }
                (trigger, below)
            }
        };

        let verdict = if delta < trigger || below_cutoff {
            if delta < trigger {
                notes.push(format!(
                    "{label} delta {} exceeded threshold {}",
                    fmt_pct(delta),
                    fmt_pct(trigger)
                ));
            }
            Verdict::Supports
        } else if delta > tolerance {
            notes.push(format!(
                "{label} delta {} above tolerance {} contradicts a decline",
                fmt_pct(delta),
                fmt_pct(tolerance)
            ));
            Verdict::Contradicts
        } else {
            notes.push(format!(
                "{label} delta {} within tolerance of baseline",
                fmt_pct(delta)
            ));
            Verdict::Neutral
        };

        MetricAssessment {
            metric,
            delta: Some(delta),
            verdict,
            notes,
        }
    }
}
