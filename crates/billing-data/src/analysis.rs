//! Synchronous analysis pipeline.
//!
//! Normalises a request into records, aggregates them, runs the anomaly rules
//! and scores the batch. Narrative generation lives in the runtime crate; this
//! module produces everything that is deterministic.

use std::time::Instant;

use billing_core::models::{AggregateStats, AnalysisRequest, Anomaly, BillingRecord, StatsSummary};
use billing_core::Result;
use tracing::debug;

use crate::aggregator::{BillingAggregator, DEFAULT_TOP_CUSTOMERS};
use crate::analyzer::{AnomalyDetector, HealthScorer};
use crate::reader::normalize_request;

// ── Public types ──────────────────────────────────────────────────────────────

/// Tunables for [`analyze_records`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisOptions {
    /// Maximum length of `top_customers`.
    pub top_customers: usize,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            top_customers: DEFAULT_TOP_CUSTOMERS,
        }
    }
}

/// Deterministic output of the pipeline, before any narrative is attached.
#[derive(Debug, Clone, PartialEq)]
pub struct BillingAnalysis {
    pub stats: AggregateStats,
    pub anomalies: Vec<Anomaly>,
    pub health_score: u8,
    /// Number of records the batch normalised to.
    pub records_processed: usize,
}

impl BillingAnalysis {
    /// Human-readable anomaly lines, in detection order.
    pub fn anomaly_messages(&self) -> Vec<String> {
        self.anomalies.iter().map(ToString::to_string).collect()
    }

    /// The serialisable subset of the aggregate stats.
    pub fn summary(&self) -> StatsSummary {
        StatsSummary::from(&self.stats)
    }

    /// Number of distinct months with revenue entries.
    pub fn month_count(&self) -> usize {
        self.stats.monthly_revenue.len()
    }
}

// ── Public functions ──────────────────────────────────────────────────────────

/// Aggregate, detect and score an already-normalised batch.
///
/// Never fails; an empty batch yields zeroed stats and the base score.
pub fn analyze_records(records: &[BillingRecord], options: &AnalysisOptions) -> BillingAnalysis {
    let start = Instant::now();

    let stats = BillingAggregator::aggregate(records, options.top_customers);
    let anomalies = AnomalyDetector::detect(records, &stats);
    let health_score = HealthScorer::score(anomalies.len(), stats.monthly_revenue.len());

    debug!(
        records = records.len(),
        months = stats.monthly_revenue.len(),
        customers = stats.customer_totals.len(),
        anomalies = anomalies.len(),
        health_score,
        elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
        "Analysed billing batch"
    );

    BillingAnalysis {
        stats,
        anomalies,
        health_score,
        records_processed: records.len(),
    }
}

/// Normalise `request` and run [`analyze_records`] on the result.
///
/// Fails only when the request carries no input or its JSON rows are not
/// objects.
pub fn analyze_request(request: &AnalysisRequest, options: &AnalysisOptions) -> Result<BillingAnalysis> {
    let records = normalize_request(request)?;
    Ok(analyze_records(&records, options))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use billing_core::models::{CustomerTotal, Period};
    use serde_json::json;

    fn scenario_a() -> AnalysisRequest {
        AnalysisRequest::from_json(
            vec![
                json!({"customer_id": "C1", "plan": "Basic", "data_used": 10, "amount_billed": 20, "billing_date": "2025-01-05"}),
                json!({"customer_id": "C2", "plan": "Basic", "data_used": 0, "amount_billed": 15, "billing_date": "2025-01-10"}),
            ],
            Period::Adhoc,
        )
    }

    #[test]
    fn test_scenario_a_two_customers_one_billed_without_usage() {
        let analysis = analyze_request(&scenario_a(), &AnalysisOptions::default()).unwrap();

        assert_eq!(analysis.stats.total_revenue, 35.0);
        assert_eq!(analysis.stats.avg_bill_per_customer, 17.5);
        assert_eq!(
            analysis.stats.top_customers,
            vec![
                CustomerTotal {
                    customer_id: "C1".to_string(),
                    total: 20.0
                },
                CustomerTotal {
                    customer_id: "C2".to_string(),
                    total: 15.0
                },
            ]
        );
        assert_eq!(analysis.anomalies.len(), 1);
        assert!(matches!(
            &analysis.anomalies[0],
            Anomaly::BilledWithoutUsage { customer_id, .. } if customer_id == "C2"
        ));
        assert_eq!(analysis.health_score, 80);
        assert_eq!(analysis.records_processed, 2);
    }

    #[test]
    fn test_scenario_b_empty_batch() {
        // A header with no data lines normalises to zero records.
        let request = AnalysisRequest::from_csv(
            "customer_id,plan,data_used,amount_billed,billing_date\n",
            Period::Adhoc,
        );
        let analysis = analyze_request(&request, &AnalysisOptions::default()).unwrap();

        assert_eq!(analysis.records_processed, 0);
        assert_eq!(analysis.stats.total_revenue, 0.0);
        assert!(analysis.stats.monthly_revenue.is_empty());
        assert!(analysis.stats.top_customers.is_empty());
        assert!(analysis.anomalies.is_empty());
        assert_eq!(analysis.health_score, 85);
    }

    #[test]
    fn test_scenario_c_csv_usage_without_billing() {
        let csv = "customer_id,plan,data_used,amount_billed,billing_date\nC1,Pro,5,0,2025-02-01\n";
        let request = AnalysisRequest::from_csv(csv, Period::Monthly);
        let analysis = analyze_request(&request, &AnalysisOptions::default()).unwrap();

        assert_eq!(
            analysis.anomaly_messages(),
            vec!["Customer C1 shows usage but was billed $0 on 2025-02-01.".to_string()]
        );
        assert_eq!(analysis.health_score, 80);
    }

    #[test]
    fn test_scenario_d_revenue_spike_with_consistency_bonus() {
        let request = AnalysisRequest::from_json(
            vec![
                json!({"customer_id": "C1", "plan": "Basic", "data_used": 1, "amount_billed": 100, "billing_date": "2025-01-15"}),
                json!({"customer_id": "C1", "plan": "Basic", "data_used": 1, "amount_billed": 100, "billing_date": "2025-02-15"}),
                json!({"customer_id": "C1", "plan": "Basic", "data_used": 1, "amount_billed": 1000, "billing_date": "2025-03-15"}),
            ],
            Period::Monthly,
        );
        let analysis = analyze_request(&request, &AnalysisOptions::default()).unwrap();

        assert_eq!(
            analysis.anomaly_messages(),
            vec!["Significant month-over-month revenue change detected (>35%).".to_string()]
        );
        assert_eq!(analysis.month_count(), 3);
        assert_eq!(analysis.health_score, 90);
    }

    #[test]
    fn test_missing_input_is_rejected() {
        let err = analyze_request(&AnalysisRequest::default(), &AnalysisOptions::default()).unwrap_err();
        assert!(err.is_input());

        let empty_array = AnalysisRequest::from_json(Vec::new(), Period::Adhoc);
        assert!(analyze_request(&empty_array, &AnalysisOptions::default())
            .unwrap_err()
            .is_input());
    }

    #[test]
    fn test_pipeline_is_idempotent() {
        let options = AnalysisOptions::default();
        let first = analyze_request(&scenario_a(), &options).unwrap();
        let second = analyze_request(&scenario_a(), &options).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_top_customers_option_is_honoured() {
        let records: Vec<BillingRecord> = (0..8)
            .map(|i| BillingRecord {
                customer_id: format!("C{}", i),
                plan: "Basic".to_string(),
                data_used: 1.0,
                amount_billed: f64::from(i),
                billing_date: "2025-01-01".to_string(),
            })
            .collect();
        let analysis = analyze_records(&records, &AnalysisOptions { top_customers: 3 });
        assert_eq!(analysis.stats.top_customers.len(), 3);
        assert_eq!(analysis.summary().top_customers[0].customer_id, "C7");
    }
}
