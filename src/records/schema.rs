//! Tagged record schemas.
//!
//! Each schema maps field names to an expected kind and range. Schemas are
//! static data, shared by [`validate`](super::validate) and
//! [`sanitize`](super::sanitize).

/// Expected kind of a record field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldKind {
    /// Non-empty string.
    Text,
    /// Finite number within `[min, max]`; `default` when missing.
    Float {
        /// Lower bound (inclusive).
        min: f64,
        /// Upper bound (inclusive).
        max: f64,
        /// Substitute for a missing or non-numeric value.
        default: f64,
    },
    /// Array of strings, optionally restricted to a vocabulary.
    TextList {
        /// Allowed values (lowercase), or `None` for free text.
        allowed: Option<&'static [&'static str]>,
    },
    /// Boolean.
    Flag,
    /// Nested record.
    Object(&'static RecordSchema),
}

impl FieldKind {
    /// Short name used in problem reports.
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldKind::Text => "string",
            FieldKind::Float { .. } => "number",
            FieldKind::TextList { .. } => "string list",
            FieldKind::Flag => "boolean",
            FieldKind::Object(_) => "object",
        }
    }
}

/// One field of a [`RecordSchema`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldSpec {
    /// JSON key.
    pub name: &'static str,
    /// Expected kind.
    pub kind: FieldKind,
    /// Required fields are always present after sanitization.
    pub required: bool,
}

impl FieldSpec {
    const fn required(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: true,
        }
    }

    const fn optional(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: false,
        }
    }
}

/// A named set of field specifications.
#[derive(Debug, PartialEq)]
pub struct RecordSchema {
    /// Schema name, used in logs.
    pub name: &'static str,
    /// Field specifications in output order.
    pub fields: &'static [FieldSpec],
}

impl RecordSchema {
    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }
}

const UNIT: FieldKind = FieldKind::Float {
    min: 0.0,
    max: 1.0,
    default: 0.0,
};

/// Ratios that can legitimately exceed 1, e.g. CTR with view-through clicks.
const NON_NEGATIVE: FieldKind = FieldKind::Float {
    min: 0.0,
    max: f64::MAX,
    default: 0.0,
};

const FREE_TEXT_LIST: FieldKind = FieldKind::TextList { allowed: None };

/// Metric names a hypothesis may reference.
pub const METRIC_NAMES: &[&str] = &["ctr", "roas"];

/// Shape of a hypothesis record.
pub static HYPOTHESIS_SCHEMA: RecordSchema = RecordSchema {
    name: "hypothesis",
    fields: &[
        FieldSpec::required("id", FieldKind::Text),
        FieldSpec::required("hypothesis", FieldKind::Text),
        FieldSpec::required("rationale", FREE_TEXT_LIST),
        FieldSpec::required("evidence_from_summary", FREE_TEXT_LIST),
        FieldSpec::required("initial_confidence", UNIT),
        FieldSpec::required(
            "metrics_used",
            FieldKind::TextList {
                allowed: Some(METRIC_NAMES),
            },
        ),
        FieldSpec::optional("refine_request", FieldKind::Flag),
    ],
};

/// Shape of the nested creative bundle.
pub static CREATIVE_BUNDLE_SCHEMA: RecordSchema = RecordSchema {
    name: "creative_bundle",
    fields: &[
        FieldSpec::required("headline", FieldKind::Text),
        FieldSpec::required("message", FieldKind::Text),
        FieldSpec::required("cta", FieldKind::Text),
        FieldSpec::required("targeting_suggestions", FREE_TEXT_LIST),
    ],
};

/// Shape of a creative recommendation record.
pub static CREATIVE_SCHEMA: RecordSchema = RecordSchema {
    name: "creative",
    fields: &[
        FieldSpec::required("campaign_name", FieldKind::Text),
        FieldSpec::required("current_ctr", NON_NEGATIVE),
        FieldSpec::required("ctr_baseline", NON_NEGATIVE),
        FieldSpec::optional(
            "ctr_delta_pct",
            FieldKind::Float {
                min: -100.0,
                max: f64::MAX,
                default: 0.0,
            },
        ),
        FieldSpec::optional("spend", NON_NEGATIVE),
        FieldSpec::required("issue_diagnosed", FieldKind::Text),
        FieldSpec::required(
            "creative_bundle",
            FieldKind::Object(&CREATIVE_BUNDLE_SCHEMA),
        ),
        FieldSpec::optional("linked_hypothesis_id", FieldKind::Text),
    ],
};
