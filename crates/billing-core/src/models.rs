use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize, Serializer};

// ── Input records ─────────────────────────────────────────────────────────────

/// One row of billing input after normalisation.
///
/// Sign and zero values are not validated here; suspicious combinations are
/// reported by the anomaly detector instead.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BillingRecord {
    /// Customer identifier.
    pub customer_id: String,
    /// Plan name.
    pub plan: String,
    /// Consumption for the billing line (e.g. gigabytes).
    pub data_used: f64,
    /// Amount billed for the line.
    pub amount_billed: f64,
    /// ISO-8601 date string; only the `YYYY-MM` prefix is used.
    pub billing_date: String,
}

impl BillingRecord {
    /// The `YYYY-MM` grouping key: the first seven characters of the date,
    /// or the whole string when it is shorter.
    pub fn month_key(&self) -> String {
        self.billing_date.chars().take(7).collect()
    }
}

/// Reporting period tag forwarded to the narrative generator.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    #[default]
    Adhoc,
    Weekly,
    Monthly,
}

impl Period {
    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Adhoc => "adhoc",
            Period::Weekly => "weekly",
            Period::Monthly => "monthly",
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single analysis request: either CSV text or a loosely-typed JSON array.
///
/// The older `data_csv` / `data_json` field names are accepted as aliases.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisRequest {
    #[serde(default, alias = "data_csv", skip_serializing_if = "Option::is_none")]
    pub csv_data: Option<String>,
    #[serde(default, alias = "data_json", skip_serializing_if = "Option::is_none")]
    pub json_data: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub period: Period,
}

impl AnalysisRequest {
    pub fn from_csv(csv: impl Into<String>, period: Period) -> Self {
        Self {
            csv_data: Some(csv.into()),
            json_data: None,
            period,
        }
    }

    pub fn from_json(rows: Vec<serde_json::Value>, period: Period) -> Self {
        Self {
            csv_data: None,
            json_data: Some(rows),
            period,
        }
    }
}

// ── Aggregates ────────────────────────────────────────────────────────────────

/// Revenue and usage accumulated for one plan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanTotals {
    pub revenue: f64,
    pub usage: f64,
}

/// A customer's summed revenue, as listed in `topCustomers`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerTotal {
    pub customer_id: String,
    pub total: f64,
}

/// Everything the aggregator derives from one batch of records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateStats {
    pub total_revenue: f64,
    pub avg_bill_per_customer: f64,
    /// `YYYY-MM` → revenue, in first-seen order.
    pub monthly_revenue: IndexMap<String, f64>,
    /// `customer_id` → revenue. Not part of the serialised result.
    pub customer_totals: IndexMap<String, f64>,
    pub top_customers: Vec<CustomerTotal>,
    pub plan_totals: IndexMap<String, PlanTotals>,
}

/// The subset of [`AggregateStats`] exposed to callers and narrators.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSummary {
    pub total_revenue: f64,
    pub avg_bill_per_customer: f64,
    pub monthly_revenue: IndexMap<String, f64>,
    pub top_customers: Vec<CustomerTotal>,
    pub plan_totals: IndexMap<String, PlanTotals>,
}

impl From<&AggregateStats> for StatsSummary {
    fn from(stats: &AggregateStats) -> Self {
        Self {
            total_revenue: stats.total_revenue,
            avg_bill_per_customer: stats.avg_bill_per_customer,
            monthly_revenue: stats.monthly_revenue.clone(),
            top_customers: stats.top_customers.clone(),
            plan_totals: stats.plan_totals.clone(),
        }
    }
}

// ── Anomalies ─────────────────────────────────────────────────────────────────

/// A suspicious pattern found in a batch of records.
///
/// The `Display` output is the human-readable line shown to users.
#[derive(Debug, Clone, PartialEq)]
pub enum Anomaly {
    /// Usage was recorded but nothing was billed.
    UsageWithoutBilling {
        customer_id: String,
        billing_date: String,
    },
    /// A charge was billed against zero usage.
    BilledWithoutUsage {
        customer_id: String,
        amount: f64,
        billing_date: String,
    },
    /// The latest month's revenue moved sharply against the month before it.
    RevenueSwing {
        previous_month: String,
        latest_month: String,
        change_ratio: f64,
    },
}

impl fmt::Display for Anomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Anomaly::UsageWithoutBilling {
                customer_id,
                billing_date,
            } => write!(
                f,
                "Customer {} shows usage but was billed $0 on {}.",
                customer_id, billing_date
            ),
            Anomaly::BilledWithoutUsage {
                customer_id,
                amount,
                billing_date,
            } => write!(
                f,
                "Customer {} billed {} with zero usage on {}.",
                customer_id, amount, billing_date
            ),
            Anomaly::RevenueSwing { .. } => {
                f.write_str("Significant month-over-month revenue change detected (>35%).")
            }
        }
    }
}

impl Serialize for Anomaly {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// ── Results ───────────────────────────────────────────────────────────────────

/// Where the `insights` text of a result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NarrativeSource {
    /// Written by the language-model collaborator.
    Model,
    /// Built locally from the summary template.
    Fallback,
}

/// Bookkeeping attached to a result; not needed to interpret the analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultMetadata {
    /// RFC 3339 timestamp of when the result was produced.
    pub generated_at: String,
    pub period: Period,
    pub records_processed: usize,
    pub narrative_source: NarrativeSource,
}

/// The final output of one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub stats: StatsSummary,
    pub anomalies: Vec<String>,
    pub health_score: u8,
    pub insights: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ResultMetadata>,
}

// ── Tests ─────────────────────────────────────────────────────────────────────
