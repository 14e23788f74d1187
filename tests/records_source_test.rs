//! External record source tests through the public API.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::time::Duration;

use campaign_insights::config::{PipelineConfig, RetryConfig};
use campaign_insights::error::{RecordError, RecordResult};
use campaign_insights::evaluator::Severity;
use campaign_insights::records::{
    fetch_records, validate, Delay, RecordSource, RetryStatus, CREATIVE_SCHEMA, HYPOTHESIS_SCHEMA,
};
use campaign_insights::summary::{CampaignAggregate, DailyRoas};
use campaign_insights::{MetricsSummary, Pipeline};
use chrono::NaiveDate;
use pretty_assertions::assert_eq;

/// Replays canned replies; `None` simulates a transport failure.
struct ScriptedSource {
    replies: VecDeque<Option<&'static str>>,
    calls: Vec<u32>,
}

impl ScriptedSource {
    fn new(replies: Vec<Option<&'static str>>) -> Self {
        Self {
            replies: replies.into(),
            calls: Vec::new(),
        }
    }
}

impl RecordSource for ScriptedSource {
    fn fetch(&mut self, attempt: u32) -> RecordResult<String> {
        self.calls.push(attempt);
        match self.replies.pop_front().flatten() {
            Some(text) => Ok(text.to_string()),
            None => Err(RecordError::Source {
                attempt,
                message: "connection reset".to_string(),
            }),
        }
    }
}

#[derive(Default)]
struct RecordingDelay {
    waits: RefCell<Vec<Duration>>,
}

impl Delay for RecordingDelay {
    fn wait(&self, duration: Duration) {
        self.waits.borrow_mut().push(duration);
    }
}

const PYTHONISH: &str = "Here are the hypotheses:\n\
    [{'id': 'a', 'hypothesis': 'Ad copy fatigue', 'rationale': ['CTR down vs peers'], \
    'evidence_from_summary': [], 'initial_confidence': 0.6, 'metrics_used': ['ctr'],}]";

fn low_ctr_summary() -> MetricsSummary {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    MetricsSummary::new(
        (0..14)
            .map(|d| DailyRoas {
                date: start + chrono::Duration::days(d),
                roas: 2.0,
            })
            .collect(),
        vec![
            CampaignAggregate::new("A", 400.0, 10_000, 123, 4, 800.0),
            CampaignAggregate::new("B", 500.0, 10_000, 181, 5, 1000.0),
            CampaignAggregate::new("C", 300.0, 10_000, 181, 5, 600.0),
            CampaignAggregate::new("D", 200.0, 10_000, 181, 5, 400.0),
            CampaignAggregate::new("E", 100.0, 10_000, 181, 5, 200.0),
        ],
    )
}

#[test]
fn test_fetch_repairs_after_transport_failure() {
    let mut source = ScriptedSource::new(vec![None, Some(PYTHONISH)]);
    let delay = RecordingDelay::default();

    let outcome = fetch_records(
        &mut source,
        &HYPOTHESIS_SCHEMA,
        &RetryConfig::default(),
        &delay,
    );

    assert_eq!(outcome.status, RetryStatus::Repaired);
    assert_eq!(outcome.attempts_used, 2);
    assert_eq!(source.calls, vec![1, 2]);
    assert_eq!(*delay.waits.borrow(), vec![Duration::from_secs(1)]);
    assert_eq!(outcome.records.len(), 1);
    assert!(validate(&outcome.records[0], &HYPOTHESIS_SCHEMA).ok);
}

#[test]
fn test_fetch_sanitizes_when_budget_spent() {
    let mut source = ScriptedSource::new(vec![
        Some("no json here"),
        Some(r#"{"campaign_name": "A", "current_ctr": "1.2%"}"#),
        None,
    ]);
    let delay = RecordingDelay::default();

    let outcome = fetch_records(&mut source, &CREATIVE_SCHEMA, &RetryConfig::default(), &delay);

    assert_eq!(outcome.status, RetryStatus::Sanitized);
    assert_eq!(outcome.attempts_used, 3);
    assert_eq!(
        *delay.waits.borrow(),
        vec![Duration::from_secs(1), Duration::from_secs(2)]
    );
    assert_eq!(outcome.records.len(), 1);
    assert!(validate(&outcome.records[0], &CREATIVE_SCHEMA).ok);
    assert_eq!(outcome.records[0]["campaign_name"], "A");
}

#[test]
fn test_fetch_exhausted_returns_nothing() {
    let mut source = ScriptedSource::new(vec![None, Some("still not json"), None]);
    let delay = RecordingDelay::default();

    let outcome = fetch_records(
        &mut source,
        &HYPOTHESIS_SCHEMA,
        &RetryConfig::default(),
        &delay,
    );

    assert_eq!(outcome.status, RetryStatus::Exhausted);
    assert!(outcome.records.is_empty());
    assert_eq!(delay.waits.borrow().len(), 2);
}

#[test]
fn test_pipeline_with_external_hypotheses() {
    let mut source = ScriptedSource::new(vec![Some(PYTHONISH)]);
    let delay = RecordingDelay::default();
    let pipeline = Pipeline::new(PipelineConfig::default());

    let output = pipeline.run_with_source(&low_ctr_summary(), &mut source, &delay);

    assert!(delay.waits.borrow().is_empty());
    assert_eq!(output.hypotheses.len(), 1);
    assert_eq!(output.hypotheses[0].id, "h1");
    assert_eq!(output.hypotheses[0].hypothesis, "Ad copy fatigue");

    let insight = &output.insights[0];
    assert!(insight.validated);
    assert_eq!(insight.severity, Severity::Medium);
    assert!((insight.final_confidence - 0.85).abs() < 1e-9);

    assert_eq!(output.creatives.len(), 1);
    assert_eq!(output.creatives[0].linked_hypothesis_id.as_deref(), Some("h1"));
}

#[test]
fn test_pipeline_with_silent_source_has_no_insights() {
    let mut source = ScriptedSource::new(vec![None, None, None]);
    let delay = RecordingDelay::default();
    let pipeline = Pipeline::new(PipelineConfig::default());

    let output = pipeline.run_with_source(&low_ctr_summary(), &mut source, &delay);

    assert!(output.hypotheses.is_empty());
    assert!(output.insights.is_empty());
    assert!(output.creatives.is_empty());
    assert_eq!(output.metrics.validation_rate, 0.0);
}
