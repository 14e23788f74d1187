//! Zero-safe arithmetic shared by every pipeline stage.
//!
//! Malformed exports (zero impressions, zero spend, `Infinity` cells) must never
//! reach a percentile or a confidence score, so all ratios and deltas in the
//! crate are computed through these helpers.

/// Divide `numerator` by `denominator`, returning `default` when the
/// denominator is zero or the quotient is NaN or infinite.
#[inline]
pub fn safe_div(numerator: f64, denominator: f64, default: f64) -> f64 {
    if denominator == 0.0 {
        return default;
    }
    let quotient = numerator / denominator;
    if quotient.is_finite() {
        quotient
    } else {
        default
    }
}

/// Replace NaN and ±Infinity with `default`.
#[inline]
pub fn normalize(x: f64, default: f64) -> f64 {
    if x.is_finite() {
        x
    } else {
        default
    }
}

/// Relative change of `current` against `baseline`: `(current - baseline) / baseline`.
///
/// Returns `0.0` when the baseline is zero or either input is not finite.
#[inline]
pub fn pct_delta(current: f64, baseline: f64) -> f64 {
    safe_div(current - baseline, baseline, 0.0)
}

/// Normalize `x` and clamp it into `[0, 1]`.
#[inline]
pub fn clamp_unit(x: f64) -> f64 {
    normalize(x, 0.0).clamp(0.0, 1.0)
}

/// Format a fraction as a signed percentage with one decimal, e.g. `-32.0%`.
pub fn fmt_pct(fraction: f64) -> String {
    format!("{:.1}%", normalize(fraction, 0.0) * 100.0)
}
