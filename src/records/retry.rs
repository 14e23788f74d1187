//! Bounded retry around an external record source.
//!
//! The loop is synchronous: a failed fetch, an unparseable reply or a batch
//! with schema problems triggers a wait (from the configured backoff list)
//! followed by another fetch. After the attempt budget is spent the last
//! parsed batch is sanitized; if nothing ever parsed the result is empty.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde_json::Value;
use tracing::{error, info, warn};

use super::repair::recover_json;
use super::sanitize::sanitize;
use super::schema::RecordSchema;
use super::validate::validate;
use crate::config::RetryConfig;
use crate::error::{RecordError, RecordResult};

/// External producer of record text, e.g. a text generator.
#[cfg_attr(test, mockall::automock)]
pub trait RecordSource {
    /// Produce raw text for the given 1-based attempt.
    fn fetch(&mut self, attempt: u32) -> RecordResult<String>;
}

/// Reply text written to a file by an external generator.
///
/// The file is re-read on every attempt, so a generator that is still
/// writing gets another chance after the backoff. A missing or blank file is
/// a failed fetch.
#[derive(Debug, Clone)]
pub struct ReplyFile {
    path: PathBuf,
}

impl ReplyFile {
    /// Source reading replies from `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl RecordSource for ReplyFile {
    fn fetch(&mut self, attempt: u32) -> RecordResult<String> {
        let text = fs::read_to_string(&self.path).map_err(|e| RecordError::Source {
            attempt,
            message: format!("{}: {}", self.path.display(), e),
        })?;
        if text.trim().is_empty() {
            return Err(RecordError::Source {
                attempt,
                message: format!("{} is empty", self.path.display()),
            });
        }
        Ok(text)
    }
}

/// Blocking wait between attempts.
pub trait Delay {
    /// Block for `duration`.
    fn wait(&self, duration: Duration);
}

/// [`Delay`] backed by `std::thread::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleep;

impl Delay for ThreadSleep {
    fn wait(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// [`Delay`] that returns immediately.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDelay;

impl Delay for NoDelay {
    fn wait(&self, _duration: Duration) {}
}

/// How the returned records were obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryStatus {
    /// Parsed and schema-valid as received.
    Valid,
    /// Schema-valid after structural text repair.
    Repaired,
    /// Budget exhausted; the last parsed batch was sanitized.
    Sanitized,
    /// Budget exhausted without any parseable reply.
    Exhausted,
}

/// Result of [`fetch_records`].
#[derive(Debug, Clone, PartialEq)]
pub struct RetryOutcome {
    /// Schema-valid records.
    pub records: Vec<Value>,
    /// Number of fetches performed.
    pub attempts_used: u32,
    /// How the records were obtained.
    pub status: RetryStatus,
}

/// Fetch a batch of records from `source`, retrying until one is schema-valid.
///
/// Never fails: every record returned passes [`validate`] against `schema`.
pub fn fetch_records(
    source: &mut dyn RecordSource,
    schema: &RecordSchema,
    retry: &RetryConfig,
    delay: &dyn Delay,
) -> RetryOutcome {
    let max_attempts = retry.attempts.max(1);
    let mut last_batch: Option<Vec<Value>> = None;
    let mut attempt = 0;

    while attempt < max_attempts {
        if attempt > 0 {
            let wait = retry.backoff_for(attempt as usize - 1);
            warn!(
                schema = schema.name,
                retry = attempt,
                delay_ms = wait.as_millis() as u64,
                "Retrying record source"
            );
            delay.wait(wait);
        }
        attempt += 1;

        let text = match source.fetch(attempt) {
            Ok(text) => text,
            Err(e) => {
                error!(schema = schema.name, attempt, error = %e, "Record source failed");
                continue;
            }
        };

        let (parsed, repaired) = match parse_record_text(&text) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(schema = schema.name, attempt, error = %e, "Discarding unparseable reply");
                continue;
            }
        };

        let batch = into_batch(parsed, schema);
        let invalid: Vec<String> = batch
            .iter()
            .map(|record| validate(record, schema))
            .filter(|result| !result.ok)
            .map(|result| result.summary())
            .collect();

        if invalid.is_empty() {
            info!(
                schema = schema.name,
                attempt,
                records = batch.len(),
                repaired,
                "Record batch accepted"
            );
            return RetryOutcome {
                records: batch,
                attempts_used: attempt,
                status: if repaired {
                    RetryStatus::Repaired
                } else {
                    RetryStatus::Valid
                },
            };
        }

        warn!(
            schema = schema.name,
            attempt,
            invalid = invalid.len(),
            problems = %invalid.join(" | "),
            "Record batch failed validation"
        );
        last_batch = Some(batch);
    }

    match last_batch {
        Some(batch) => {
            warn!(
                schema = schema.name,
                attempts = attempt,
                records = batch.len(),
                "Retry budget exhausted, sanitizing last batch"
            );
            RetryOutcome {
                records: batch.iter().map(|r| sanitize(r, schema)).collect(),
                attempts_used: attempt,
                status: RetryStatus::Sanitized,
            }
        }
        None => {
            error!(
                schema = schema.name,
                attempts = attempt,
                "Retry budget exhausted without a parseable reply"
            );
            RetryOutcome {
                records: Vec::new(),
                attempts_used: attempt,
                status: RetryStatus::Exhausted,
            }
        }
    }
}

/// Parse generator text; the flag reports whether structural repair was needed.
pub fn parse_record_text(text: &str) -> RecordResult<(Value, bool)> {
    recover_json(text).ok_or_else(|| RecordError::Unparseable {
        message: format!(
            "no JSON payload recovered. First 100 chars: '{}'",
            text.chars().take(100).collect::<String>()
        ),
    })
}

/// Split a parsed reply into candidate records, dropping non-objects.
fn into_batch(parsed: Value, schema: &RecordSchema) -> Vec<Value> {
    let items = match parsed {
        Value::Array(items) => items,
        other => vec![other],
    };
    let total = items.len();
    let batch: Vec<Value> = items.into_iter().filter(Value::is_object).collect();
    if batch.len() < total {
        warn!(
            schema = schema.name,
            dropped = total - batch.len(),
            "Dropped non-object entries from record batch"
        );
    }
    batch
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::schema::HYPOTHESIS_SCHEMA;
    use mockall::predicate::eq;
    use mockall::Sequence;
    use std::cell::RefCell;

    const VALID: &str = r#"[{"id": "h1", "hypothesis": "ROAS fell", "rationale": ["ROAS 1.0 vs 2.0"],
        "evidence_from_summary": [], "initial_confidence": 0.5, "metrics_used": ["roas"]}]"#;

    /// Records every requested wait instead of sleeping.
    #[derive(Default)]
    struct RecordingDelay {
        waits: RefCell<Vec<Duration>>,
    }

    impl Delay for RecordingDelay {
        fn wait(&self, duration: Duration) {
            self.waits.borrow_mut().push(duration);
        }
    }

    fn source_error(attempt: u32) -> RecordError {
        RecordError::Source {
            attempt,
            message: "timeout".to_string(),
        }
    }

    #[test]
    fn test_valid_first_attempt() {
        let mut source = MockRecordSource::new();
        source
            .expect_fetch()
            .with(eq(1))
            .times(1)
            .returning(|_| Ok(VALID.to_string()));
        let delay = RecordingDelay::default();

        let outcome = fetch_records(&mut source, &HYPOTHESIS_SCHEMA, &RetryConfig::default(), &delay);

        assert_eq!(outcome.status, RetryStatus::Valid);
        assert_eq!(outcome.attempts_used, 1);
        assert_eq!(outcome.records.len(), 1);
        assert!(delay.waits.borrow().is_empty());
    }

    #[test]
    fn test_repaired_reply() {
        let mut source = MockRecordSource::new();
        source.expect_fetch().times(1).returning(|_| {
            Ok("```json\n[{'id': 'h1', 'hypothesis': 'CTR fell', 'rationale': [], \
                'evidence_from_summary': [], 'initial_confidence': 0.4, \
                'metrics_used': ['ctr'],},]\n```"
                .to_string())
        });

        let outcome = fetch_records(&mut source, &HYPOTHESIS_SCHEMA, &RetryConfig::default(), &NoDelay);

        assert_eq!(outcome.status, RetryStatus::Repaired);
        assert_eq!(outcome.records[0]["hypothesis"], "CTR fell");
    }

    #[test]
    fn test_retries_with_backoff_then_succeeds() {
        let mut source = MockRecordSource::new();
        let mut seq = Sequence::new();
        source
            .expect_fetch()
            .with(eq(1))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|a| Err(source_error(a)));
        source
            .expect_fetch()
            .with(eq(2))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok("not json".to_string()));
        source
            .expect_fetch()
            .with(eq(3))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(VALID.to_string()));
        let delay = RecordingDelay::default();

        let outcome = fetch_records(&mut source, &HYPOTHESIS_SCHEMA, &RetryConfig::default(), &delay);

        assert_eq!(outcome.status, RetryStatus::Valid);
        assert_eq!(outcome.attempts_used, 3);
        assert_eq!(
            *delay.waits.borrow(),
            vec![Duration::from_secs(1), Duration::from_secs(2)]
        );
    }

    #[test]
    fn test_exhausted_without_parseable_reply() {
        let mut source = MockRecordSource::new();
        source
            .expect_fetch()
            .times(3)
            .returning(|a| Err(source_error(a)));
        let delay = RecordingDelay::default();

        let outcome = fetch_records(&mut source, &HYPOTHESIS_SCHEMA, &RetryConfig::default(), &delay);

        assert_eq!(outcome.status, RetryStatus::Exhausted);
        assert!(outcome.records.is_empty());
        assert_eq!(outcome.attempts_used, 3);
        let total: Duration = delay.waits.borrow().iter().sum();
        assert!(total <= Duration::from_secs(7));
    }

    #[test]
    fn test_exhausted_sanitizes_last_batch() {
        let mut source = MockRecordSource::new();
        source
            .expect_fetch()
            .times(2)
            .returning(|a| Ok(format!(r#"[{{"hypothesis": "attempt {a}"}}, 42]"#)));
        let retry = RetryConfig {
            attempts: 2,
            backoff_seconds: vec![0.0],
        };

        let outcome = fetch_records(&mut source, &HYPOTHESIS_SCHEMA, &retry, &NoDelay);

        assert_eq!(outcome.status, RetryStatus::Sanitized);
        assert_eq!(outcome.records.len(), 1);
        let record = &outcome.records[0];
        assert_eq!(record["hypothesis"], "attempt 2");
        assert_eq!(record["initial_confidence"], 0.0);
        assert!(validate(record, &HYPOTHESIS_SCHEMA).ok);
    }

    #[test]
    fn test_zero_attempts_still_fetches_once() {
        let mut source = MockRecordSource::new();
        source.expect_fetch().times(1).returning(|_| Ok("[]".to_string()));
        let retry = RetryConfig {
            attempts: 0,
            backoff_seconds: vec![],
        };

        let outcome = fetch_records(&mut source, &HYPOTHESIS_SCHEMA, &retry, &NoDelay);

        assert_eq!(outcome.status, RetryStatus::Valid);
        assert!(outcome.records.is_empty());
    }

    #[test]
    fn test_bracketed_prose_does_not_hide_records() {
        let reply = format!("Based on the data [see summary], here you go: {VALID}");
        let mut source = MockRecordSource::new();
        source
            .expect_fetch()
            .times(1)
            .returning(move |_| Ok(reply.clone()));

        let outcome = fetch_records(&mut source, &HYPOTHESIS_SCHEMA, &RetryConfig::default(), &NoDelay);

        assert_eq!(outcome.status, RetryStatus::Valid);
        assert_eq!(outcome.attempts_used, 1);
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0]["hypothesis"], "ROAS fell");
    }

    #[test]
    fn test_reply_file_reread_each_attempt() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("reply.txt");
        let mut source = ReplyFile::new(&path);

        assert!(matches!(source.fetch(1), Err(RecordError::Source { attempt: 1, .. })));

        std::fs::write(&path, "  \n").unwrap();
        assert!(matches!(source.fetch(2), Err(RecordError::Source { attempt: 2, .. })));

        std::fs::write(&path, VALID).unwrap();
        let outcome = fetch_records(&mut source, &HYPOTHESIS_SCHEMA, &RetryConfig::default(), &NoDelay);
        assert_eq!(outcome.status, RetryStatus::Valid);
        assert_eq!(outcome.records.len(), 1);
    }

    #[test]
    fn test_parse_record_text() {
        let (value, repaired) = parse_record_text("{\"a\": 1}").unwrap();
        assert_eq!(value["a"], 1);
        assert!(!repaired);

        let (_, repaired) = parse_record_text("{'a': 1,}").unwrap();
        assert!(repaired);

        assert!(matches!(
            parse_record_text("nothing"),
            Err(RecordError::Unparseable { .. })
        ));
    }
}
