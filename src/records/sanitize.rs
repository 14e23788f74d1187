//! Idempotent coercion of any JSON value into a schema-valid record.

use serde_json::{Map, Number, Value};

use super::schema::{FieldKind, FieldSpec, RecordSchema};

/// Coerce `record` into a value that passes [`validate`](super::validate).
///
/// Out-of-range numbers are clamped, numeric strings parsed, wrong-typed or
/// missing required fields replaced with typed defaults (`"Missing <field>"`,
/// `[]`, the float default, `false`). Unknown fields are preserved. Total and
/// idempotent: `sanitize(&sanitize(r, s), s) == sanitize(r, s)`.
pub fn sanitize(record: &Value, schema: &RecordSchema) -> Value {
    let empty = Map::new();
    let source = record.as_object().unwrap_or(&empty);
    Value::Object(sanitize_object(source, schema))
}

fn sanitize_object(source: &Map<String, Value>, schema: &RecordSchema) -> Map<String, Value> {
    let mut out = source.clone();
    for spec in schema.fields {
        match source.get(spec.name) {
            None | Some(Value::Null) if !spec.required => {}
            None | Some(Value::Null) => {
                out.insert(spec.name.to_string(), default_for(spec));
            }
            Some(value) => match coerce(value, spec) {
                Some(coerced) => {
                    out.insert(spec.name.to_string(), coerced);
                }
                None if spec.required => {
                    out.insert(spec.name.to_string(), default_for(spec));
                }
                None => {
                    out.remove(spec.name);
                }
            },
        }
    }
    out
}

/// Typed default for a missing required field.
fn default_for(spec: &FieldSpec) -> Value {
    match spec.kind {
        FieldKind::Text => Value::String(format!("Missing {}", spec.name)),
        FieldKind::Float { min, max, default } => float_value(default.clamp(min, max)),
        FieldKind::TextList { .. } => Value::Array(Vec::new()),
        FieldKind::Flag => Value::Bool(false),
        FieldKind::Object(nested) => Value::Object(sanitize_object(&Map::new(), nested)),
    }
}

/// Best-effort conversion of a present value; `None` when it cannot be used.
fn coerce(value: &Value, spec: &FieldSpec) -> Option<Value> {
    match spec.kind {
        FieldKind::Text => match value {
            Value::String(s) if !s.trim().is_empty() => Some(value.clone()),
            Value::Number(n) => Some(Value::String(n.to_string())),
            Value::Bool(b) => Some(Value::String(b.to_string())),
            _ => None,
        },
        FieldKind::Float { min, max, .. } => {
            let raw = match value {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().trim_end_matches('%').parse::<f64>().ok(),
                _ => None,
            };
            raw.filter(|v| v.is_finite())
                .map(|v| float_value(v.clamp(min, max)))
        }
        FieldKind::TextList { allowed } => {
            let items: Vec<String> = match value {
                Value::Array(items) => items.iter().filter_map(list_item).collect(),
                Value::String(s) if allowed.is_some() => {
                    s.split(',').map(|part| part.to_string()).collect()
                }
                Value::String(s) => vec![s.clone()],
                _ => Vec::new(),
            };
            let items = match allowed {
                Some(allowed) => {
                    let mut kept: Vec<String> = Vec::new();
                    for item in items {
                        let item = item.trim().to_lowercase();
                        if allowed.contains(&item.as_str()) && !kept.contains(&item) {
                            kept.push(item);
                        }
                    }
                    kept
                }
                None => items,
            };
            Some(Value::Array(items.into_iter().map(Value::String).collect()))
        }
        FieldKind::Flag => match value {
            Value::Bool(_) => Some(value.clone()),
            Value::Number(n) => Some(Value::Bool(n.as_f64().is_some_and(|v| v != 0.0))),
            Value::String(s) => match s.trim().to_lowercase().as_str() {
                "true" | "yes" | "1" => Some(Value::Bool(true)),
                "false" | "no" | "0" => Some(Value::Bool(false)),
                _ => None,
            },
            _ => None,
        },
        FieldKind::Object(nested) => match value {
            Value::Object(inner) => Some(Value::Object(sanitize_object(inner, nested))),
            _ => None,
        },
    }
}

fn list_item(item: &Value) -> Option<String> {
    match item {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn float_value(v: f64) -> Value {
    Number::from_f64(v).map(Value::Number).unwrap_or(Value::Null)
}
