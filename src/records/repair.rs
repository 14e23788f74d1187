//! Structural repair of near-miss JSON text.
//!
//! Text generators wrap JSON in prose or code fences, use single or smart
//! quotes, leave Python literals, trailing commas, raw newlines inside strings,
//! and stop before closing every bracket. [`repair_json`] fixes those in one
//! deterministic pass; a string that still fails to parse afterwards is left
//! to the caller.

use serde_json::Value;
use tracing::debug;

/// Most payload start positions examined in one reply.
const MAX_CANDIDATES: usize = 32;

/// Recover a JSON payload from free-form generator output.
///
/// Candidates are the bodies of code fences, then every opening bracket in
/// reading order. Each is parsed directly, then structurally repaired. The
/// first candidate yielding a record (an object, or an array holding at least
/// one object) wins, so bracketed prose ahead of the payload is skipped.
/// Failing that, the first value that parsed at all is returned.
///
/// The flag is `true` when the winning value needed structural repair.
pub fn recover_json(text: &str) -> Option<(Value, bool)> {
    let mut fallback: Option<(Value, bool)> = None;

    for candidate in payload_candidates(text) {
        let attempts = [
            serde_json::from_str::<Value>(candidate).ok().map(|v| (v, false)),
            serde_json::from_str::<Value>(&normalize_structure(candidate))
                .ok()
                .map(|v| (v, true)),
        ];
        for (value, repaired) in attempts.into_iter().flatten() {
            if holds_record(&value) {
                if repaired {
                    debug!(candidate_len = candidate.len(), "Repaired malformed JSON text");
                }
                return Some((value, repaired));
            }
            fallback.get_or_insert((value, repaired));
        }
    }

    if fallback.is_none() {
        debug!(text_len = text.len(), "No JSON payload recoverable");
    }
    fallback
}

/// Parse `text` as JSON, repairing it structurally if a direct parse fails.
///
/// Returns `None` when no JSON payload can be recovered.
pub fn repair_json(text: &str) -> Option<Value> {
    recover_json(text).map(|(value, _)| value)
}

/// Slices of `text` that may start a JSON payload, most specific first.
fn payload_candidates(text: &str) -> Vec<&str> {
    let fenced = text
        .split("```")
        .skip(1)
        .step_by(2)
        .map(|body| body.strip_prefix("json").unwrap_or(body).trim());
    let bracketed = text
        .char_indices()
        .filter(|(_, c)| *c == '{' || *c == '[')
        .map(|(idx, _)| &text[idx..]);

    let mut candidates: Vec<&str> = Vec::new();
    for candidate in fenced
        .filter(|body| body.starts_with('{') || body.starts_with('['))
        .chain(bracketed)
    {
        if !candidates.contains(&candidate) {
            candidates.push(candidate);
        }
        if candidates.len() == MAX_CANDIDATES {
            break;
        }
    }
    candidates
}

fn holds_record(value: &Value) -> bool {
    match value {
        Value::Object(_) => true,
        Value::Array(items) => items.iter().any(Value::is_object),
        _ => false,
    }
}

/// Rewrite `input` into strict JSON syntax as far as a single scan allows.
fn normalize_structure(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + 8);
    let mut closers: Vec<char> = Vec::new();
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut opened = false;

    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        i += 1;

        if let Some(q) = quote {
            if escaped {
                escaped = false;
                if c == '\'' {
                    out.push('\'');
                } else {
                    out.push('\\');
                    out.push(c);
                }
                continue;
            }
            match c {
                '\\' => escaped = true,
                _ if closes(q, c) => {
                    out.push('"');
                    quote = None;
                }
                '"' => out.push_str("\\\""),
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\t' => out.push_str("\\t"),
                _ if c.is_control() => {}
                _ => out.push(c),
            }
            continue;
        }

        match c {
            _ if is_opening_quote(c) => {
                quote = Some(c);
                out.push('"');
            }
            '{' => {
                opened = true;
                closers.push('}');
                out.push(c);
            }
            '[' => {
                opened = true;
                closers.push(']');
                out.push(c);
            }
            '}' | ']' => {
                if !closers.contains(&c) {
                    continue;
                }
                while let Some(top) = closers.pop() {
                    strip_trailing_comma(&mut out);
                    out.push(top);
                    if top == c {
                        break;
                    }
                }
                if opened && closers.is_empty() {
                    break;
                }
            }
            _ if c.is_ascii_alphabetic() || c == '_' => {
                let start = i - 1;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                out.push_str(&literal_or_quoted(&word));
            }
            '-' | '0'..='9' => {
                out.push(c);
                while i < chars.len() && matches!(chars[i], '0'..='9' | '.' | 'e' | 'E' | '+' | '-')
                {
                    out.push(chars[i]);
                    i += 1;
                }
            }
            _ => out.push(c),
        }
    }

    if quote.is_some() {
        out.push('"');
    }
    let trimmed_len = out.trim_end().len();
    out.truncate(trimmed_len);
    strip_trailing_comma(&mut out);
    if out.ends_with(':') {
        out.push_str(" null");
    }
    while let Some(top) = closers.pop() {
        strip_trailing_comma(&mut out);
        out.push(top);
    }
    out
}

fn is_opening_quote(c: char) -> bool {
    matches!(
        c,
        '"' | '\'' | '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{2018}' | '\u{201A}' | '\u{00AB}' | '\u{00BB}'
    )
}

/// True when `c` ends a string opened by `open`. Typographic quotes only
/// close their own family, so an apostrophe inside `'...'` stays content.
fn closes(open: char, c: char) -> bool {
    match open {
        '"' | '\'' => c == open,
        '\u{201C}' | '\u{201D}' | '\u{201E}' => matches!(c, '\u{201C}' | '\u{201D}'),
        '\u{2018}' | '\u{201A}' => c == '\u{2019}',
        '\u{00AB}' | '\u{00BB}' => matches!(c, '\u{00AB}' | '\u{00BB}'),
        _ => false,
    }
}

/// Map Python/JS bare words to JSON literals; quote anything else.
fn literal_or_quoted(word: &str) -> String {
    match word {
        "true" | "True" | "TRUE" => "true".to_string(),
        "false" | "False" | "FALSE" => "false".to_string(),
        "null" | "None" | "NULL" | "NaN" | "undefined" => "null".to_string(),
        _ => format!("\"{word}\""),
    }
}

fn strip_trailing_comma(out: &mut String) {
    let trimmed_len = out.trim_end().len();
    if out[..trimmed_len].ends_with(',') {
        out.truncate(trimmed_len - 1);
    }
}
