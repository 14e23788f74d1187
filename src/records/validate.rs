//! Pure schema validation.

use serde_json::{Map, Value};

use super::schema::{FieldKind, RecordSchema};

/// What is wrong with a single field.
#[derive(Debug, Clone, PartialEq)]
pub enum ProblemKind {
    /// A required field is absent or null.
    Missing,
    /// The value has the wrong JSON type.
    WrongType {
        /// Expected type name.
        expected: &'static str,
    },
    /// A string field is empty.
    Empty,
    /// A number lies outside the allowed range.
    OutOfRange {
        /// Observed value.
        value: f64,
    },
    /// A list entry is not in the allowed vocabulary.
    NotAllowed {
        /// Offending entry.
        value: String,
    },
}

/// A field-level validation issue.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldProblem {
    /// Dotted path of the field, e.g. `creative_bundle.cta`; `$` for the root.
    pub field: String,
    /// Issue.
    pub kind: ProblemKind,
}

impl std::fmt::Display for FieldProblem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            ProblemKind::Missing => write!(f, "{}: missing", self.field),
            ProblemKind::WrongType { expected } => {
                write!(f, "{}: expected {}", self.field, expected)
            }
            ProblemKind::Empty => write!(f, "{}: empty", self.field),
            ProblemKind::OutOfRange { value } => {
                write!(f, "{}: {} out of range", self.field, value)
            }
            ProblemKind::NotAllowed { value } => {
                write!(f, "{}: '{}' not allowed", self.field, value)
            }
        }
    }
}

/// Outcome of [`validate`].
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationResult {
    /// True when there are no problems.
    pub ok: bool,
    /// Problems in schema field order.
    pub problems: Vec<FieldProblem>,
}

impl ValidationResult {
    /// Problems joined into a single line for logging.
    pub fn summary(&self) -> String {
        self.problems
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Check `record` against `schema` without modifying it.
pub fn validate(record: &Value, schema: &RecordSchema) -> ValidationResult {
    let mut problems = Vec::new();
    match record.as_object() {
        Some(map) => check_object(map, schema, "", &mut problems),
        None => problems.push(FieldProblem {
            field: "$".to_string(),
            kind: ProblemKind::WrongType { expected: "object" },
        }),
    }
    ValidationResult {
        ok: problems.is_empty(),
        problems,
    }
}

fn check_object(
    map: &Map<String, Value>,
    schema: &RecordSchema,
    prefix: &str,
    problems: &mut Vec<FieldProblem>,
) {
    for spec in schema.fields {
        let path = format!("{prefix}{}", spec.name);
        let value = match map.get(spec.name) {
            None | Some(Value::Null) => {
                if spec.required {
                    problems.push(FieldProblem {
                        field: path,
                        kind: ProblemKind::Missing,
                    });
                }
                continue;
            }
            Some(value) => value,
        };

        let problem = match (&spec.kind, value) {
            (FieldKind::Text, Value::String(s)) if s.trim().is_empty() => Some(ProblemKind::Empty),
            (FieldKind::Text, Value::String(_)) => None,
            (FieldKind::Float { min, max, .. }, Value::Number(n)) => match n.as_f64() {
                Some(v) if v.is_finite() && v >= *min && v <= *max => None,
                Some(v) => Some(ProblemKind::OutOfRange { value: v }),
                None => Some(ProblemKind::WrongType { expected: "number" }),
            },
            (FieldKind::TextList { allowed }, Value::Array(items)) => {
                check_list(items, *allowed)
            }
            (FieldKind::Flag, Value::Bool(_)) => None,
            (FieldKind::Object(nested), Value::Object(inner)) => {
                check_object(inner, nested, &format!("{path}."), problems);
                None
            }
            (kind, _) => Some(ProblemKind::WrongType {
                expected: kind.type_name(),
            }),
        };

        if let Some(kind) = problem {
            problems.push(FieldProblem { field: path, kind });
        }
    }
}

fn check_list(items: &[Value], allowed: Option<&[&str]>) -> Option<ProblemKind> {
    for item in items {
        let Value::String(s) = item else {
            return Some(ProblemKind::WrongType {
                expected: "string list",
            });
        };
        if let Some(allowed) = allowed {
            if !allowed.contains(&s.as_str()) {
                return Some(ProblemKind::NotAllowed { value: s.clone() });
            }
        }
    }
    None
}
