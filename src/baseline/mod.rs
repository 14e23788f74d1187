//! Percentile baselines for CTR and ROAS.
//!
//! Two populations feed the baseline:
//! - **Daily ROAS** over the most recent `window_days` calendar days (time series)
//! - **Campaign CTR** across every campaign in the summary (cross-sectional)
//!
//! Each population yields a mid percentile (the baseline) and a low percentile
//! (the "low" cutoff). Below the configured sample floor the pair falls back
//! to static thresholds, recorded in the provenance fields.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::BaselineConfig;
use crate::numeric::normalize;
use crate::summary::MetricsSummary;

/// Where a baseline pair came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaselineSource {
    /// Percentiles over observed samples.
    Computed,
    /// Static configured values (too little history).
    Fallback,
}

impl std::fmt::Display for BaselineSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BaselineSource::Computed => write!(f, "computed"),
            BaselineSource::Fallback => write!(f, "fallback"),
        }
    }
}

/// Historical reference values for one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    /// Mid percentile of campaign CTRs.
    pub ctr_baseline: f64,
    /// Low percentile of campaign CTRs ("low CTR" cutoff).
    pub ctr_threshold: f64,
    /// Mid percentile of daily ROAS.
    pub roas_baseline: f64,
    /// Low percentile of daily ROAS.
    pub roas_drop_threshold: f64,
    /// Days of ROAS history used; 0 when ROAS fell back.
    pub computed_from_days: usize,
    /// Campaigns whose CTR was used; 0 when CTR fell back.
    pub campaigns_analyzed: usize,
    /// Window the ROAS series was restricted to.
    pub window_days: u32,
    /// Provenance of the CTR pair.
    pub ctr_source: BaselineSource,
    /// Provenance of the ROAS pair.
    pub roas_source: BaselineSource,
}

impl Baseline {
    /// Baseline made entirely of the configured fallback values.
    pub fn fallback(config: &BaselineConfig) -> Self {
        let f = &config.fallback;
        Self {
            ctr_baseline: f.ctr_baseline,
            ctr_threshold: f.ctr_threshold.min(f.ctr_baseline),
            roas_baseline: f.roas_baseline,
            roas_drop_threshold: f.roas_drop_threshold.min(f.roas_baseline),
            computed_from_days: 0,
            campaigns_analyzed: 0,
            window_days: config.window_days,
            ctr_source: BaselineSource::Fallback,
            roas_source: BaselineSource::Fallback,
        }
    }

    /// True when either pair used static values.
    pub fn used_fallback(&self) -> bool {
        self.ctr_source == BaselineSource::Fallback || self.roas_source == BaselineSource::Fallback
    }
}

/// Computes [`Baseline`]s from a [`MetricsSummary`].
#[derive(Debug, Clone)]
pub struct BaselineCalculator {
    config: BaselineConfig,
}

impl BaselineCalculator {
    /// Create a new baseline calculator.
    pub fn new(config: BaselineConfig) -> Self {
        Self { config }
    }

    /// Compute the baseline for a summary. Deterministic; never fails.
    pub fn compute(&self, summary: &MetricsSummary) -> Baseline {
        let mut baseline = Baseline::fallback(&self.config);

        let roas_window = self.roas_window(summary);
        if roas_window.len() >= self.config.min_days.max(1) {
            let mid = percentile(&roas_window, self.config.roas_percentile_mid);
            let low = percentile(&roas_window, self.config.roas_percentile_low);
            baseline.roas_baseline = mid;
            baseline.roas_drop_threshold = low.min(mid);
            baseline.computed_from_days = roas_window.len();
            baseline.roas_source = BaselineSource::Computed;
        } else {
            info!(
                days = roas_window.len(),
                min_days = self.config.min_days,
                roas_baseline = baseline.roas_baseline,
                "ROAS baseline fallback: insufficient daily history"
            );
        }

        let ctrs: Vec<f64> = summary
            .campaigns
            .iter()
            .map(|c| c.ctr)
            .filter(|v| v.is_finite())
            .collect();
        if ctrs.len() >= self.config.min_campaigns.max(1) {
            let mid = percentile(&ctrs, self.config.ctr_percentile_mid);
            let low = percentile(&ctrs, self.config.ctr_percentile_low);
            baseline.ctr_baseline = mid;
            baseline.ctr_threshold = low.min(mid);
            baseline.campaigns_analyzed = ctrs.len();
            baseline.ctr_source = BaselineSource::Computed;
        } else {
            info!(
                campaigns = ctrs.len(),
                min_campaigns = self.config.min_campaigns,
                ctr_baseline = baseline.ctr_baseline,
                "CTR baseline fallback: insufficient campaigns"
            );
        }

        debug!(
            ctr_baseline = baseline.ctr_baseline,
            ctr_threshold = baseline.ctr_threshold,
            roas_baseline = baseline.roas_baseline,
            roas_drop_threshold = baseline.roas_drop_threshold,
            days = baseline.computed_from_days,
            campaigns = baseline.campaigns_analyzed,
            "Baseline computed"
        );

        baseline
    }

    /// Daily ROAS values within the last `window_days` calendar days.
    fn roas_window(&self, summary: &MetricsSummary) -> Vec<f64> {
        let Some(latest) = summary.daily_roas.iter().map(|d| d.date).max() else {
            return Vec::new();
        };
        let window = i64::from(self.config.window_days.max(1));
        // A window reaching past the calendar's start keeps every day.
        let cutoff = latest.checked_sub_signed(Duration::days(window));
        summary
            .daily_roas
            .iter()
            .filter(|d| cutoff.map_or(true, |cutoff| d.date > cutoff))
            .map(|d| d.roas)
            .filter(|v| v.is_finite())
            .collect()
    }
}

/// Percentile `pct` (0-100) with linear interpolation between order statistics.
///
/// Rank is `pct / 100 * (n - 1)`; non-finite samples are ignored and an empty
/// input yields `0.0`.
pub fn percentile(values: &[f64], pct: f64) -> f64 {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return 0.0;
    }
    sorted.sort_by(f64::total_cmp);

    let q = normalize(pct, 50.0).clamp(0.0, 100.0) / 100.0;
    let idx = q * (sorted.len() - 1) as f64;
    let lo = idx.floor() as usize;
    let hi = idx.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        let t = idx - lo as f64;
        sorted[lo] * (1.0 - t) + sorted[hi] * t
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summary::{CampaignAggregate, DailyRoas};
    use chrono::NaiveDate;

    fn day(offset: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + Duration::days(offset)
    }

    fn series(values: &[f64]) -> Vec<DailyRoas> {
        values
            .iter()
            .enumerate()
            .map(|(i, roas)| DailyRoas {
                date: day(i as i64),
                roas: *roas,
            })
            .collect()
    }

    fn campaign(name: &str, impressions: u64, clicks: u64) -> CampaignAggregate {
        CampaignAggregate::new(name, 100.0, impressions, clicks, 0, 200.0)
    }

    #[test]
    fn test_percentile_linear_interpolation() {
        let values = [1.0, 2.0, 3.0, 4.0];
        assert!((percentile(&values, 50.0) - 2.5).abs() < 1e-12);
        assert!((percentile(&values, 25.0) - 1.75).abs() < 1e-12);
        assert!((percentile(&values, 10.0) - 1.3).abs() < 1e-12);
        assert_eq!(percentile(&values, 0.0), 1.0);
        assert_eq!(percentile(&values, 100.0), 4.0);
    }

    #[test]
    fn test_percentile_order_independent() {
        let a = [5.0, 1.0, 3.0, 3.0, 2.0];
        let b = [3.0, 2.0, 5.0, 1.0, 3.0];
        assert_eq!(percentile(&a, 25.0), percentile(&b, 25.0));
        assert_eq!(percentile(&a, 50.0), 3.0);
    }

    #[test]
    fn test_percentile_degenerate_inputs() {
        assert_eq!(percentile(&[], 50.0), 0.0);
        assert_eq!(percentile(&[f64::NAN, f64::INFINITY], 50.0), 0.0);
        assert_eq!(percentile(&[7.0], 10.0), 7.0);
        assert_eq!(percentile(&[1.0, f64::NAN, 3.0], 50.0), 2.0);
    }

    #[test]
    fn test_compute_percentiles() {
        let summary = MetricsSummary::new(
            series(&[2.0, 3.0, 4.0, 5.0, 6.0]),
            vec![
                campaign("A", 1000, 10),
                campaign("B", 1000, 20),
                campaign("C", 1000, 30),
            ],
        );
        let baseline = BaselineCalculator::new(BaselineConfig::default()).compute(&summary);

        assert_eq!(baseline.roas_baseline, 4.0);
        assert_eq!(baseline.roas_drop_threshold, 3.0);
        assert!((baseline.ctr_baseline - 0.02).abs() < 1e-12);
        assert!((baseline.ctr_threshold - 0.012).abs() < 1e-12);
        assert_eq!(baseline.computed_from_days, 5);
        assert_eq!(baseline.campaigns_analyzed, 3);
        assert_eq!(baseline.roas_source, BaselineSource::Computed);
        assert_eq!(baseline.ctr_source, BaselineSource::Computed);
        assert!(!baseline.used_fallback());
    }

    #[test]
    fn test_window_restricts_to_recent_days() {
        let mut values = vec![100.0; 10];
        values.extend([1.0, 2.0, 3.0]);
        let summary = MetricsSummary::new(series(&values), vec![campaign("A", 100, 1)]);
        let config = BaselineConfig {
            window_days: 3,
            ..BaselineConfig::default()
        };
        let baseline = BaselineCalculator::new(config).compute(&summary);

        assert_eq!(baseline.computed_from_days, 3);
        assert_eq!(baseline.roas_baseline, 2.0);
        assert_eq!(baseline.window_days, 3);
    }

    #[test]
    fn test_window_uses_calendar_days_with_gaps() {
        let summary = MetricsSummary::new(
            vec![
                DailyRoas { date: day(0), roas: 9.0 },
                DailyRoas { date: day(20), roas: 1.0 },
                DailyRoas { date: day(21), roas: 3.0 },
            ],
            vec![],
        );
        let config = BaselineConfig {
            window_days: 7,
            ..BaselineConfig::default()
        };
        let baseline = BaselineCalculator::new(config).compute(&summary);
        assert_eq!(baseline.computed_from_days, 2);
        assert_eq!(baseline.roas_baseline, 2.0);
    }

    #[test]
    fn test_huge_window_keeps_all_days() {
        let summary = MetricsSummary::new(series(&[1.0, 2.0, 3.0]), vec![campaign("A", 100, 1)]);
        let config = BaselineConfig {
            window_days: u32::MAX,
            ..BaselineConfig::default()
        };
        let baseline = BaselineCalculator::new(config).compute(&summary);

        assert_eq!(baseline.computed_from_days, 3);
        assert_eq!(baseline.roas_baseline, 2.0);
        assert_eq!(baseline.window_days, u32::MAX);
    }

    #[test]
    fn test_empty_summary_falls_back() {
        let config = BaselineConfig::default();
        let baseline = BaselineCalculator::new(config.clone()).compute(&MetricsSummary::default());

        assert_eq!(baseline.computed_from_days, 0);
        assert_eq!(baseline.campaigns_analyzed, 0);
        assert_eq!(baseline.ctr_baseline, config.fallback.ctr_baseline);
        assert_eq!(baseline.roas_drop_threshold, config.fallback.roas_drop_threshold);
        assert_eq!(baseline.ctr_source, BaselineSource::Fallback);
        assert!(baseline.used_fallback());
    }

    #[test]
    fn test_min_days_floor() {
        let summary = MetricsSummary::new(series(&[1.0, 2.0]), vec![]);
        let config = BaselineConfig {
            min_days: 3,
            ..BaselineConfig::default()
        };
        let baseline = BaselineCalculator::new(config.clone()).compute(&summary);
        assert_eq!(baseline.roas_source, BaselineSource::Fallback);
        assert_eq!(baseline.computed_from_days, 0);
        assert_eq!(baseline.roas_baseline, config.fallback.roas_baseline);
    }

    #[test]
    fn test_zero_spend_series() {
        let summary = MetricsSummary::new(series(&[0.0; 7]), vec![]);
        let baseline = BaselineCalculator::new(BaselineConfig::default()).compute(&summary);
        assert_eq!(baseline.roas_baseline, 0.0);
        assert_eq!(baseline.roas_drop_threshold, 0.0);
        assert_eq!(baseline.computed_from_days, 7);
    }

    #[test]
    fn test_thresholds_monotonic() {
        let datasets: [&[f64]; 4] = [
            &[0.5, 9.0, 1.0, 3.0],
            &[2.0],
            &[1.0, 1.0, 1.0],
            &[10.0, 0.0, 5.0, 2.5, 7.5, 0.1],
        ];
        for values in datasets {
            let campaigns = values
                .iter()
                .enumerate()
                .map(|(i, v)| campaign(&format!("c{i}"), 10_000, (*v * 100.0) as u64))
                .collect();
            let summary = MetricsSummary::new(series(values), campaigns);
            let b = BaselineCalculator::new(BaselineConfig::default()).compute(&summary);
            assert!(b.ctr_threshold <= b.ctr_baseline, "{values:?}");
            assert!(b.roas_drop_threshold <= b.roas_baseline, "{values:?}");
        }
    }

    #[test]
    fn test_compute_is_deterministic() {
        let summary = MetricsSummary::new(
            series(&[1.2, 0.8, 2.4, 1.9]),
            vec![campaign("A", 800, 9), campaign("B", 1200, 30)],
        );
        let calc = BaselineCalculator::new(BaselineConfig::default());
        assert_eq!(calc.compute(&summary), calc.compute(&summary));
    }
}
