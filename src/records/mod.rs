//! Record validation, repair and sanitization.
//!
//! This module is the defensive boundary for semi-structured records
//! (hypotheses and creative recommendations):
//!
//! - [`validate`] reports field-level problems without touching the record
//! - [`repair_json`] recovers near-miss JSON text
//! - [`sanitize`] coerces anything into a schema-valid record
//! - [`fetch_records`] wraps an external [`RecordSource`] in a bounded retry loop
//!
//! Every record leaving this module is schema-valid.

mod repair;
mod retry;
mod sanitize;
mod schema;
mod validate;

pub use repair::{recover_json, repair_json};
pub use retry::{
    fetch_records, parse_record_text, Delay, NoDelay, RecordSource, ReplyFile, RetryOutcome,
    RetryStatus, ThreadSleep,
};
pub use sanitize::sanitize;
pub use schema::{
    FieldKind, FieldSpec, RecordSchema, CREATIVE_BUNDLE_SCHEMA, CREATIVE_SCHEMA,
    HYPOTHESIS_SCHEMA, METRIC_NAMES,
};
pub use validate::{validate, FieldProblem, ProblemKind, ValidationResult};

#[cfg(test)]
pub use retry::MockRecordSource;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

/// A typed record with a schema.
pub trait SchemaRecord: Serialize + DeserializeOwned {
    /// Schema the serialized form must satisfy.
    fn schema() -> &'static RecordSchema;
}

/// Return `record` unchanged if it validates, otherwise its sanitized form.
pub fn enforce(record: Value, schema: &RecordSchema) -> Value {
    let result = validate(&record, schema);
    if result.ok {
        return record;
    }
    warn!(
        schema = schema.name,
        problems = %result.summary(),
        "Record failed validation, sanitizing"
    );
    sanitize(&record, schema)
}

/// Pass a typed record through [`enforce`] and back.
pub fn conform<T: SchemaRecord + Clone>(record: &T) -> T {
    let value = match serde_json::to_value(record) {
        Ok(value) => value,
        Err(e) => {
            warn!(schema = T::schema().name, error = %e, "Record not serializable");
            return record.clone();
        }
    };
    from_value(enforce(value, T::schema())).unwrap_or_else(|| record.clone())
}

/// Build a typed record from an arbitrary JSON value, sanitizing as needed.
pub fn from_value<T: SchemaRecord>(value: Value) -> Option<T> {
    let schema = T::schema();
    match serde_json::from_value(enforce(value, schema)) {
        Ok(record) => Some(record),
        Err(e) => {
            warn!(schema = schema.name, error = %e, "Sanitized record did not deserialize");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Bundle {
        headline: String,
        message: String,
        cta: String,
        targeting_suggestions: Vec<String>,
    }

    impl SchemaRecord for Bundle {
        fn schema() -> &'static RecordSchema {
            &CREATIVE_BUNDLE_SCHEMA
        }
    }

    #[test]
    fn test_enforce_keeps_valid_record() {
        let record = json!({"headline": "H", "message": "M", "cta": "C", "targeting_suggestions": []});
        assert_eq!(enforce(record.clone(), &CREATIVE_BUNDLE_SCHEMA), record);
    }

    #[test]
    fn test_enforce_sanitizes_invalid_record() {
        let record = json!({"headline": "H"});
        let enforced = enforce(record, &CREATIVE_BUNDLE_SCHEMA);
        assert_eq!(enforced["cta"], "Missing cta");
        assert!(validate(&enforced, &CREATIVE_BUNDLE_SCHEMA).ok);
    }

    #[test]
    fn test_conform_fills_empty_text() {
        let bundle = Bundle {
            headline: String::new(),
            message: "Try the new range".to_string(),
            cta: "Shop Now".to_string(),
            targeting_suggestions: vec![],
        };
        let conformed = conform(&bundle);
        assert_eq!(conformed.headline, "Missing headline");
        assert_eq!(conformed.cta, "Shop Now");
    }

    #[test]
    fn test_from_value() {
        let bundle: Bundle = from_value(json!({"headline": 5})).unwrap();
        assert_eq!(bundle.headline, "5");
        assert_eq!(bundle.message, "Missing message");
    }
}
