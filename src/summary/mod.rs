//! Metrics summary value types.
//!
//! A [`MetricsSummary`] is the immutable snapshot handed to the pipeline by the
//! ingestion layer: global totals, the daily ROAS series and per-campaign
//! aggregates. Ratios are always derived through [`crate::numeric::safe_div`].

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::numeric::{normalize, safe_div};

/// Global totals over the summarized rows.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalTotals {
    /// First date covered by the data.
    pub start_date: Option<NaiveDate>,
    /// Last date covered by the data.
    pub end_date: Option<NaiveDate>,
    /// Total spend.
    pub total_spend: f64,
    /// Total revenue.
    pub total_revenue: f64,
    /// Number of source rows.
    pub row_count: u64,
    /// Number of distinct creatives, when the source carried creative ids.
    pub num_creatives: Option<u32>,
}

/// ROAS for a single day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyRoas {
    /// Calendar day.
    pub date: NaiveDate,
    /// Revenue over spend for that day.
    pub roas: f64,
}

/// Aggregated metrics for one campaign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignAggregate {
    /// Campaign name, unique within a summary.
    pub campaign_name: String,
    /// Spend.
    pub spend: f64,
    /// Impressions.
    pub impressions: u64,
    /// Clicks.
    pub clicks: u64,
    /// Purchases.
    #[serde(default)]
    pub purchases: u64,
    /// Revenue.
    pub revenue: f64,
    /// Click-through rate, `clicks / impressions`.
    #[serde(default)]
    pub ctr: f64,
    /// Return on ad spend, `revenue / spend`.
    #[serde(default)]
    pub roas: f64,
    /// Frequent words from the campaign's creative messages.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
}

impl CampaignAggregate {
    /// Create an aggregate, deriving CTR and ROAS.
    pub fn new(
        campaign_name: impl Into<String>,
        spend: f64,
        impressions: u64,
        clicks: u64,
        purchases: u64,
        revenue: f64,
    ) -> Self {
        let spend = normalize(spend, 0.0);
        let revenue = normalize(revenue, 0.0);
        Self {
            campaign_name: campaign_name.into(),
            spend,
            impressions,
            clicks,
            purchases,
            revenue,
            ctr: safe_div(clicks as f64, impressions as f64, 0.0),
            roas: safe_div(revenue, spend, 0.0),
            keywords: Vec::new(),
        }
    }

    /// Attach creative keywords.
    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    fn recompute(mut self) -> Self {
        self.spend = normalize(self.spend, 0.0);
        self.revenue = normalize(self.revenue, 0.0);
        self.ctr = safe_div(self.clicks as f64, self.impressions as f64, 0.0);
        self.roas = safe_div(self.revenue, self.spend, 0.0);
        self
    }
}

/// Immutable snapshot of campaign performance.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsSummary {
    /// Global totals.
    pub totals: GlobalTotals,
    /// Daily ROAS ordered by date.
    pub daily_roas: Vec<DailyRoas>,
    /// Per-campaign aggregates.
    pub campaigns: Vec<CampaignAggregate>,
}

impl MetricsSummary {
    /// Build a summary from a daily series and campaign aggregates.
    ///
    /// Totals are derived from the campaigns and the date range from the
    /// series; the result is normalized.
    pub fn new(daily_roas: Vec<DailyRoas>, campaigns: Vec<CampaignAggregate>) -> Self {
        Self {
            totals: GlobalTotals::default(),
            daily_roas,
            campaigns,
        }
        .normalized()
    }

    /// Set the number of distinct creatives.
    pub fn with_num_creatives(mut self, num_creatives: u32) -> Self {
        self.totals.num_creatives = Some(num_creatives);
        self
    }

    /// Re-establish the summary invariants on a value received from outside.
    ///
    /// Sorts and de-duplicates the daily series (last entry per date wins),
    /// replaces non-finite ROAS with 0, merges campaigns sharing a name by
    /// summing their counts, recomputes every ratio, and refreshes totals.
    pub fn normalized(self) -> Self {
        let MetricsSummary {
            mut totals,
            daily_roas,
            campaigns,
        } = self;

        let mut by_date: BTreeMap<NaiveDate, f64> = BTreeMap::new();
        for point in daily_roas {
            by_date.insert(point.date, normalize(point.roas, 0.0));
        }
        let daily_roas: Vec<DailyRoas> = by_date
            .into_iter()
            .map(|(date, roas)| DailyRoas { date, roas })
            .collect();

        let mut order: Vec<String> = Vec::new();
        let mut merged: BTreeMap<String, CampaignAggregate> = BTreeMap::new();
        for campaign in campaigns {
            match merged.get_mut(&campaign.campaign_name) {
                Some(existing) => {
                    existing.spend = normalize(existing.spend, 0.0) + normalize(campaign.spend, 0.0);
                    existing.revenue =
                        normalize(existing.revenue, 0.0) + normalize(campaign.revenue, 0.0);
                    existing.impressions = existing.impressions.saturating_add(campaign.impressions);
                    existing.clicks = existing.clicks.saturating_add(campaign.clicks);
                    existing.purchases = existing.purchases.saturating_add(campaign.purchases);
                    for keyword in campaign.keywords {
                        if !existing.keywords.contains(&keyword) {
                            existing.keywords.push(keyword);
                        }
                    }
                }
                None => {
                    order.push(campaign.campaign_name.clone());
                    merged.insert(campaign.campaign_name.clone(), campaign);
                }
            }
        }
        let campaigns: Vec<CampaignAggregate> = order
            .into_iter()
            .filter_map(|name| merged.remove(&name))
            .map(CampaignAggregate::recompute)
            .collect();

        if !campaigns.is_empty() {
            totals.total_spend = campaigns.iter().map(|c| c.spend).sum();
            totals.total_revenue = campaigns.iter().map(|c| c.revenue).sum();
        }
        totals.total_spend = normalize(totals.total_spend, 0.0);
        totals.total_revenue = normalize(totals.total_revenue, 0.0);
        if let (Some(first), Some(last)) = (daily_roas.first(), daily_roas.last()) {
            totals.start_date = Some(first.date);
            totals.end_date = Some(last.date);
        }

        Self {
            totals,
            daily_roas,
            campaigns,
        }
    }

    /// True when the summary has neither campaigns nor daily history.
    pub fn is_empty(&self) -> bool {
        self.campaigns.is_empty() && self.daily_roas.is_empty()
    }

    /// Total impressions across campaigns.
    pub fn total_impressions(&self) -> u64 {
        self.campaigns
            .iter()
            .fold(0u64, |acc, c| acc.saturating_add(c.impressions))
    }

    /// Total clicks across campaigns.
    pub fn total_clicks(&self) -> u64 {
        self.campaigns
            .iter()
            .fold(0u64, |acc, c| acc.saturating_add(c.clicks))
    }

    /// Aggregate CTR across campaigns, or `None` without impressions.
    pub fn aggregate_ctr(&self) -> Option<f64> {
        let impressions = self.total_impressions();
        if impressions == 0 {
            return None;
        }
        Some(safe_div(self.total_clicks() as f64, impressions as f64, 0.0))
    }

    /// Most recent daily ROAS point.
    pub fn latest_roas(&self) -> Option<&DailyRoas> {
        self.daily_roas.last()
    }
}
