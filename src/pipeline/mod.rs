//! Pipeline coordinator.
//!
//! Runs the stages strictly in sequence:
//!
//! ```text
//! MetricsSummary → Baseline → Hypotheses → Evaluation → Creatives → Alert
//! ```
//!
//! Every stage takes its inputs by reference and returns new values. Apart
//! from `run_id` and `generated_at`, two runs over the same summary and
//! configuration produce identical output.

pub mod alerts;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::baseline::{Baseline, BaselineCalculator};
use crate::config::PipelineConfig;
use crate::creative::{CreativeRecommendation, CreativeRecommender};
use crate::evaluator::{Evaluator, ValidatedHypothesis, ValidationMetrics};
use crate::evidence::Evidence;
use crate::hypothesis::{Hypothesis, HypothesisGenerator};
use crate::records::{Delay, RecordSource};
use crate::summary::MetricsSummary;

pub use alerts::{roas_drop_rule, AlertDecision};

/// Everything one pipeline run produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineOutput {
    /// Unique id of the run.
    pub run_id: Uuid,
    /// When the run finished.
    pub generated_at: DateTime<Utc>,
    /// Baseline the run compared against.
    pub baseline: Baseline,
    /// Candidate hypotheses.
    pub hypotheses: Vec<Hypothesis>,
    /// Evaluated hypotheses (the insights artifact).
    pub insights: Vec<ValidatedHypothesis>,
    /// Aggregate validation statistics.
    pub metrics: ValidationMetrics,
    /// Creative recommendations.
    pub creatives: Vec<CreativeRecommendation>,
    /// ROAS-drop alert decision.
    pub alert: AlertDecision,
}

/// Sequences the pipeline stages.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
    baseline: BaselineCalculator,
    generator: HypothesisGenerator,
    evaluator: Evaluator,
    recommender: CreativeRecommender,
}

impl Pipeline {
    /// Create a pipeline from its configuration.
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            baseline: BaselineCalculator::new(config.baseline.clone()),
            generator: HypothesisGenerator::new(config.generator.clone()),
            evaluator: Evaluator::new(config.evaluator.clone()),
            recommender: CreativeRecommender::new(config.creative.clone()),
            config,
        }
    }

    /// Run every stage over `summary` using the built-in hypothesis signals.
    pub fn run(&self, summary: &MetricsSummary) -> PipelineOutput {
        let summary = summary.clone().normalized();
        let baseline = self.baseline.compute(&summary);
        let hypotheses = self.generator.generate(&summary, &baseline);
        self.finish(&summary, baseline, hypotheses)
    }

    /// Run the pipeline with hypotheses supplied by an external text generator.
    ///
    /// The source is polled through the bounded retry loop; the rest of the
    /// run is identical to [`Pipeline::run`].
    pub fn run_with_source(
        &self,
        summary: &MetricsSummary,
        source: &mut dyn RecordSource,
        delay: &dyn Delay,
    ) -> PipelineOutput {
        let summary = summary.clone().normalized();
        let baseline = self.baseline.compute(&summary);
        let hypotheses = self
            .generator
            .ingest_external(source, &self.config.retry, delay);
        self.finish(&summary, baseline, hypotheses)
    }

    fn finish(
        &self,
        summary: &MetricsSummary,
        baseline: Baseline,
        hypotheses: Vec<Hypothesis>,
    ) -> PipelineOutput {
        if baseline.used_fallback() {
            info!(
                ctr_source = %baseline.ctr_source,
                roas_source = %baseline.roas_source,
                "Baseline uses fallback thresholds"
            );
        }

        let report = self.evaluator.evaluate(&hypotheses, summary, &baseline);
        let actionable = report.actionable().count();
        let creatives = self
            .recommender
            .recommend(&report.validated, summary, &baseline);

        let evidence = Evidence::gather(summary, &baseline);
        let alert = roas_drop_rule(
            evidence.roas_delta,
            report.metrics.validation_rate,
            creatives.len(),
            &self.config.alerts,
        );

        let output = PipelineOutput {
            run_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            baseline,
            hypotheses,
            insights: report.validated,
            metrics: report.metrics,
            creatives,
            alert,
        };

        info!(
            run_id = %output.run_id,
            hypotheses = output.hypotheses.len(),
            validated = output.metrics.num_validated,
            actionable,
            creatives = output.creatives.len(),
            alerted = output.alert.alerted,
            "Pipeline run complete"
        );

        output
    }
}
