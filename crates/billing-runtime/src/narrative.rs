//! The contract between the analysis pipeline and narrative generators.

use async_trait::async_trait;
use billing_core::models::{CustomerTotal, Period, PlanTotals};
use billing_core::Result;
use billing_data::analysis::BillingAnalysis;
use indexmap::IndexMap;
use serde::Serialize;

/// Everything a narrator is allowed to see about one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NarrativeSummary {
    pub total_revenue: f64,
    pub avg_bill_per_customer: f64,
    pub monthly_revenue: IndexMap<String, f64>,
    pub top_customers: Vec<CustomerTotal>,
    pub plan_totals: IndexMap<String, PlanTotals>,
    pub anomalies: Vec<String>,
    pub health_score: u8,
    pub period: Period,
}

impl NarrativeSummary {
    pub fn from_analysis(analysis: &BillingAnalysis, period: Period) -> Self {
        let stats = &analysis.stats;
        Self {
            total_revenue: stats.total_revenue,
            avg_bill_per_customer: stats.avg_bill_per_customer,
            monthly_revenue: stats.monthly_revenue.clone(),
            top_customers: stats.top_customers.clone(),
            plan_totals: stats.plan_totals.clone(),
            anomalies: analysis.anomaly_messages(),
            health_score: analysis.health_score,
            period,
        }
    }

    /// Compact JSON used to embed the summary in prompts.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Something that turns a [`NarrativeSummary`] into prose.
///
/// Implementations may be slow or fail; callers are expected to bound the
/// call with a timeout and fall back to a local narrative on error.
#[async_trait]
pub trait NarrativeGenerator: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    async fn summarize(&self, summary: &NarrativeSummary) -> Result<String>;
}
