//! Creative-copy recommendations for low-CTR campaigns.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::baseline::Baseline;
use crate::config::CreativeConfig;
use crate::evaluator::ValidatedHypothesis;
use crate::hypothesis::MetricKind;
use crate::numeric::{fmt_pct, pct_delta};
use crate::records::{conform, RecordSchema, SchemaRecord, CREATIVE_SCHEMA};
use crate::summary::{CampaignAggregate, MetricsSummary};

/// Copy suggestions for one campaign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreativeBundle {
    /// Headline.
    pub headline: String,
    /// Body copy.
    pub message: String,
    /// Call to action.
    pub cta: String,
    /// Audience and testing suggestions.
    pub targeting_suggestions: Vec<String>,
}

/// A recommendation tied to one underperforming campaign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreativeRecommendation {
    /// Campaign the recommendation is for.
    pub campaign_name: String,
    /// Campaign CTR.
    pub current_ctr: f64,
    /// CTR baseline.
    pub ctr_baseline: f64,
    /// CTR delta vs baseline, in percent.
    #[serde(default)]
    pub ctr_delta_pct: f64,
    /// Campaign spend.
    #[serde(default)]
    pub spend: f64,
    /// Diagnosis with the literal numbers.
    pub issue_diagnosed: String,
    /// Suggested copy.
    pub creative_bundle: CreativeBundle,
    /// Hypothesis that motivated the recommendation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linked_hypothesis_id: Option<String>,
}

impl SchemaRecord for CreativeRecommendation {
    fn schema() -> &'static RecordSchema {
        &CREATIVE_SCHEMA
    }
}

/// Builds creative recommendations.
#[derive(Debug, Clone)]
pub struct CreativeRecommender {
    config: CreativeConfig,
}

impl CreativeRecommender {
    /// Create a new recommender.
    pub fn new(config: CreativeConfig) -> Self {
        Self { config }
    }

    /// Recommend creatives for campaigns below the low-CTR threshold.
    ///
    /// Returns nothing unless at least one validated hypothesis carries an
    /// actionable severity. Campaigns are ordered by spend, largest first.
    pub fn recommend(
        &self,
        validated: &[ValidatedHypothesis],
        summary: &MetricsSummary,
        baseline: &Baseline,
    ) -> Vec<CreativeRecommendation> {
        let Some(link) = primary_hypothesis(validated) else {
            debug!("No actionable validated hypothesis; skipping creatives");
            return Vec::new();
        };

        let mut candidates: Vec<&CampaignAggregate> = summary
            .campaigns
            .iter()
            .filter(|c| c.impressions > 0 && c.ctr < baseline.ctr_threshold)
            .collect();
        candidates.sort_by(|a, b| {
            b.spend
                .total_cmp(&a.spend)
                .then_with(|| a.campaign_name.cmp(&b.campaign_name))
        });

        let mut seen: HashSet<String> = HashSet::new();
        let recommendations: Vec<CreativeRecommendation> = candidates
            .into_iter()
            .filter(|c| seen.insert(c.campaign_name.clone()))
            .take(self.config.max_recommendations.unwrap_or(usize::MAX))
            .map(|c| conform(&self.build(c, baseline, &link.id)))
            .collect();

        info!(
            creatives = recommendations.len(),
            linked = %link.id,
            ctr_threshold = baseline.ctr_threshold,
            "Creative recommendations generated"
        );
        recommendations
    }

    fn build(
        &self,
        campaign: &CampaignAggregate,
        baseline: &Baseline,
        hypothesis_id: &str,
    ) -> CreativeRecommendation {
        let delta = pct_delta(campaign.ctr, baseline.ctr_baseline);
        let keywords: Vec<&str> = campaign
            .keywords
            .iter()
            .map(String::as_str)
            .filter(|k| !k.trim().is_empty())
            .take(3)
            .collect();
        let focus = if keywords.is_empty() {
            "key features".to_string()
        } else {
            keywords.join(", ")
        };

        let mut targeting_suggestions = Vec::new();
        if !keywords.is_empty() {
            targeting_suggestions.push(format!("Lookalike audiences engaged with {focus}"));
        }
        targeting_suggestions.push("Exclude audiences with recent ad exposure".to_string());
        targeting_suggestions.push("A/B test new headlines against the current creative".to_string());

        CreativeRecommendation {
            campaign_name: campaign.campaign_name.clone(),
            current_ctr: campaign.ctr,
            ctr_baseline: baseline.ctr_baseline,
            ctr_delta_pct: (delta * 1000.0).round() / 10.0,
            spend: campaign.spend,
            issue_diagnosed: format!(
                "CTR {:.4} is {} vs baseline {:.4} (below low-CTR threshold {:.4})",
                campaign.ctr,
                fmt_pct(delta),
                baseline.ctr_baseline,
                baseline.ctr_threshold
            ),
            creative_bundle: CreativeBundle {
                headline: format!("Refresh fatigued creative: emphasize {focus}"),
                message: format!(
                    "Current CTR ({:.2}%) is {:.1}% below baseline. Test new angles highlighting {focus} with stronger social proof.",
                    campaign.ctr * 100.0,
                    (delta * 100.0).abs()
                ),
                cta: if campaign.ctr < self.config.soft_cta_ctr {
                    "Learn More".to_string()
                } else {
                    "Shop Now".to_string()
                },
                targeting_suggestions,
            },
            linked_hypothesis_id: Some(hypothesis_id.to_string()),
        }
    }
}

/// Most severe actionable hypothesis, preferring ones that reference CTR.
/// Ties keep input order.
fn primary_hypothesis(validated: &[ValidatedHypothesis]) -> Option<&ValidatedHypothesis> {
    validated
        .iter()
        .filter(|v| v.validated && v.severity.is_actionable())
        .min_by(|a, b| {
            b.metrics_used
                .contains(&MetricKind::Ctr)
                .cmp(&a.metrics_used.contains(&MetricKind::Ctr))
                .then_with(|| b.severity.cmp(&a.severity))
                .then_with(|| b.final_confidence.total_cmp(&a.final_confidence))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::baseline::BaselineSource;
    use crate::evaluator::Severity;
    use crate::evidence::EvidenceSnapshot;

    fn baseline() -> Baseline {
        Baseline {
            ctr_baseline: 0.0181,
            ctr_threshold: 0.0146,
            roas_baseline: 2.0,
            roas_drop_threshold: 1.5,
            computed_from_days: 30,
            campaigns_analyzed: 4,
            window_days: 30,
            ctr_source: BaselineSource::Computed,
            roas_source: BaselineSource::Computed,
        }
    }

    fn validated(id: &str, severity: Severity, metric: MetricKind, confidence: f64) -> ValidatedHypothesis {
        ValidatedHypothesis {
            id: id.to_string(),
            hypothesis: format!("{metric} declined"),
            metrics_used: [metric].into_iter().collect(),
            validated: severity.is_actionable(),
            final_confidence: confidence,
            severity,
            evidence: EvidenceSnapshot::default(),
            notes: vec![],
        }
    }

    fn summary() -> MetricsSummary {
        MetricsSummary::new(
            vec![],
            vec![
                CampaignAggregate::new("A", 500.0, 10_000, 123, 5, 900.0)
                    .with_keywords(["summer", "linen", "sale", "extra"]),
                CampaignAggregate::new("B", 800.0, 10_000, 181, 5, 900.0),
                CampaignAggregate::new("C", 800.0, 10_000, 90, 5, 900.0),
                CampaignAggregate::new("D", 900.0, 10_000, 80, 5, 900.0),
                CampaignAggregate::new("Idle", 0.0, 0, 0, 0, 0.0),
            ],
        )
    }

    #[test]
    fn test_scenario_issue_text() {
        let single = MetricsSummary::new(
            vec![],
            vec![CampaignAggregate::new("A", 500.0, 10_000, 123, 5, 900.0)],
        );
        let hypotheses = vec![validated("h1", Severity::Medium, MetricKind::Ctr, 0.45)];
        let recs = CreativeRecommender::new(CreativeConfig::default()).recommend(&hypotheses, &single, &baseline());

        assert_eq!(recs.len(), 1);
        let rec = &recs[0];
        assert_eq!(rec.campaign_name, "A");
        assert_eq!(
            rec.issue_diagnosed,
            "CTR 0.0123 is -32.0% vs baseline 0.0181 (below low-CTR threshold 0.0146)"
        );
        assert_eq!(rec.ctr_delta_pct, -32.0);
        assert_eq!(rec.creative_bundle.cta, "Shop Now");
        assert_eq!(rec.linked_hypothesis_id.as_deref(), Some("h1"));
    }

    #[test]
    fn test_ordered_by_spend_then_name() {
        let hypotheses = vec![validated("h1", Severity::High, MetricKind::Ctr, 0.7)];
        let recs = CreativeRecommender::new(CreativeConfig::default()).recommend(&hypotheses, &summary(), &baseline());

        let names: Vec<&str> = recs.iter().map(|r| r.campaign_name.as_str()).collect();
        assert_eq!(names, vec!["D", "C", "A"]);
        assert_eq!(recs[0].creative_bundle.cta, "Learn More");
    }

    #[test]
    fn test_keywords_shape_bundle() {
        let hypotheses = vec![validated("h1", Severity::High, MetricKind::Ctr, 0.7)];
        let recs = CreativeRecommender::new(CreativeConfig::default()).recommend(&hypotheses, &summary(), &baseline());
        let a = recs.iter().find(|r| r.campaign_name == "A").unwrap();

        assert!(a.creative_bundle.headline.contains("summer, linen, sale"));
        assert!(!a.creative_bundle.headline.contains("extra"));
        assert_eq!(a.creative_bundle.targeting_suggestions.len(), 3);

        let d = recs.iter().find(|r| r.campaign_name == "D").unwrap();
        assert!(d.creative_bundle.headline.contains("key features"));
        assert_eq!(d.creative_bundle.targeting_suggestions.len(), 2);
    }

    #[test]
    fn test_max_recommendations() {
        let config = CreativeConfig {
            max_recommendations: Some(1),
            ..CreativeConfig::default()
        };
        let hypotheses = vec![validated("h1", Severity::High, MetricKind::Ctr, 0.7)];
        let recs = CreativeRecommender::new(config).recommend(&hypotheses, &summary(), &baseline());
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].campaign_name, "D");
    }

    #[test]
    fn test_requires_actionable_hypothesis() {
        let recommender = CreativeRecommender::new(CreativeConfig::default());
        assert!(recommender.recommend(&[], &summary(), &baseline()).is_empty());

        let none = vec![validated("h1", Severity::None, MetricKind::Ctr, 0.9)];
        assert!(recommender.recommend(&none, &summary(), &baseline()).is_empty());
    }

    #[test]
    fn test_links_ctr_hypothesis_first() {
        let hypotheses = vec![
            validated("h1", Severity::Critical, MetricKind::Roas, 0.9),
            validated("h2", Severity::Medium, MetricKind::Ctr, 0.45),
            validated("h3", Severity::Medium, MetricKind::Ctr, 0.6),
        ];
        let recs = CreativeRecommender::new(CreativeConfig::default()).recommend(&hypotheses, &summary(), &baseline());
        assert!(recs.iter().all(|r| r.linked_hypothesis_id.as_deref() == Some("h3")));
    }

    #[test]
    fn test_ctr_above_one_reported_unchanged() {
        // More clicks than impressions across the board.
        let summary = MetricsSummary::new(
            vec![],
            vec![
                CampaignAggregate::new("A", 100.0, 100, 150, 1, 90.0),
                CampaignAggregate::new("B", 100.0, 100, 300, 1, 90.0),
                CampaignAggregate::new("C", 100.0, 100, 300, 1, 90.0),
            ],
        );
        let baseline = Baseline {
            ctr_baseline: 3.0,
            ctr_threshold: 1.8,
            ..baseline()
        };
        let hypotheses = vec![validated("h1", Severity::Medium, MetricKind::Ctr, 0.45)];
        let recs = CreativeRecommender::new(CreativeConfig::default()).recommend(&hypotheses, &summary, &baseline);

        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].current_ctr, 1.5);
        assert_eq!(recs[0].ctr_baseline, 3.0);
        assert!(recs[0].issue_diagnosed.starts_with("CTR 1.5000 is -50.0% vs baseline 3.0000"));
    }

    #[test]
    fn test_no_qualifying_campaigns() {
        let healthy = MetricsSummary::new(
            vec![],
            vec![CampaignAggregate::new("B", 800.0, 10_000, 181, 5, 900.0)],
        );
        let hypotheses = vec![validated("h1", Severity::High, MetricKind::Roas, 0.7)];
        let recs = CreativeRecommender::new(CreativeConfig::default()).recommend(&hypotheses, &healthy, &baseline());
        assert!(recs.is_empty());
    }
}
