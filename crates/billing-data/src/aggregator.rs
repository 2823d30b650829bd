//! Revenue aggregation over billing records.

use std::cmp::Ordering;

use billing_core::models::{AggregateStats, BillingRecord, CustomerTotal, PlanTotals};
use indexmap::IndexMap;

/// Customers listed in `top_customers` unless configured otherwise.
pub const DEFAULT_TOP_CUSTOMERS: usize = 10;

// ── BillingAggregator ─────────────────────────────────────────────────────────

/// Stateless helper that folds records into [`AggregateStats`].
pub struct BillingAggregator;

impl BillingAggregator {
    /// Aggregate `records` into revenue totals by month, customer and plan.
    ///
    /// Empty input yields all-zero stats. `top_n` bounds the length of
    /// `top_customers`.
    pub fn aggregate(records: &[BillingRecord], top_n: usize) -> AggregateStats {
        let mut monthly_revenue: IndexMap<String, f64> = IndexMap::new();
        let mut customer_totals: IndexMap<String, f64> = IndexMap::new();
        let mut plan_totals: IndexMap<String, PlanTotals> = IndexMap::new();
        let mut total_revenue = 0.0;

        for record in records {
            total_revenue += record.amount_billed;

            *monthly_revenue.entry(record.month_key()).or_default() += record.amount_billed;
            *customer_totals
                .entry(record.customer_id.clone())
                .or_default() += record.amount_billed;

            let plan = plan_totals.entry(record.plan.clone()).or_default();
            plan.revenue += record.amount_billed;
            plan.usage += record.data_used;
        }

        let unique_customers = customer_totals.len().max(1);
        let avg_bill_per_customer = total_revenue / unique_customers as f64;
        let top_customers = Self::rank_customers(&customer_totals, top_n);

        AggregateStats {
            total_revenue,
            avg_bill_per_customer,
            monthly_revenue,
            customer_totals,
            top_customers,
            plan_totals,
        }
    }

    /// Rank customers by total revenue, highest first, keeping at most `top_n`.
    ///
    /// The sort is stable: customers with equal totals stay in the order they
    /// were first seen.
    pub fn rank_customers(totals: &IndexMap<String, f64>, top_n: usize) -> Vec<CustomerTotal> {
        let mut ranked: Vec<CustomerTotal> = totals
            .iter()
            .map(|(id, total)| CustomerTotal {
                customer_id: id.clone(),
                total: *total,
            })
            .collect();
        ranked.sort_by(|a, b| b.total.partial_cmp(&a.total).unwrap_or(Ordering::Equal));
        ranked.truncate(top_n);
        ranked
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
