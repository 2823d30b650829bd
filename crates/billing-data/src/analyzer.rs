//! Heuristic anomaly detection and health scoring.
//!
//! Per-record rules flag usage that was never billed and charges billed
//! against zero usage. A batch rule flags a sharp revenue move between the two
//! most recent months once at least three months of data exist. The health
//! score starts from a fixed base, earns a bonus for a multi-month history and
//! loses a capped penalty per anomaly.

use billing_core::models::{AggregateStats, Anomaly, BillingRecord};
use indexmap::IndexMap;

/// Score before bonuses and penalties.
pub const BASE_HEALTH_SCORE: i64 = 85;
/// Bonus for having at least [`MIN_MONTHS_FOR_TREND`] months of data.
pub const CONSISTENCY_BONUS: i64 = 10;
/// Points lost per anomaly.
pub const ANOMALY_PENALTY: i64 = 5;
/// Upper bound on the total anomaly penalty.
pub const MAX_ANOMALY_PENALTY: i64 = 40;
/// Months required before the revenue-swing rule and the bonus apply.
pub const MIN_MONTHS_FOR_TREND: usize = 3;
/// Relative month-over-month change above which revenue is flagged.
pub const REVENUE_SWING_THRESHOLD: f64 = 0.35;

// ── AnomalyDetector ───────────────────────────────────────────────────────────

/// Stateless rule evaluator.
pub struct AnomalyDetector;

impl AnomalyDetector {
    /// Run every rule. Record rules fire in record order; the revenue-swing
    /// rule, when it fires, is always last.
    pub fn detect(records: &[BillingRecord], stats: &AggregateStats) -> Vec<Anomaly> {
        let mut anomalies: Vec<Anomaly> = records.iter().filter_map(Self::check_record).collect();
        if let Some(swing) = Self::check_revenue_swing(&stats.monthly_revenue) {
            anomalies.push(swing);
        }
        anomalies
    }

    /// Apply the per-record rules. The two rules are mutually exclusive, so a
    /// record yields at most one anomaly.
    pub fn check_record(record: &BillingRecord) -> Option<Anomaly> {
        if record.data_used > 0.0 && record.amount_billed == 0.0 {
            return Some(Anomaly::UsageWithoutBilling {
                customer_id: record.customer_id.clone(),
                billing_date: record.billing_date.clone(),
            });
        }
        if record.data_used == 0.0 && record.amount_billed > 0.0 {
            return Some(Anomaly::BilledWithoutUsage {
                customer_id: record.customer_id.clone(),
                amount: record.amount_billed,
                billing_date: record.billing_date.clone(),
            });
        }
        None
    }

    /// Compare the two chronologically latest months.
    ///
    /// Months are ordered by their `YYYY-MM` key, which sorts
    /// chronologically, regardless of the order they were first seen in.
    /// Nothing is reported with fewer than [`MIN_MONTHS_FOR_TREND`] months or
    /// when the earlier month's revenue is not positive.
    pub fn check_revenue_swing(monthly: &IndexMap<String, f64>) -> Option<Anomaly> {
        if monthly.len() < MIN_MONTHS_FOR_TREND {
            return None;
        }

        let mut months: Vec<(&str, f64)> = monthly.iter().map(|(k, v)| (k.as_str(), *v)).collect();
        months.sort_by(|a, b| a.0.cmp(b.0));

        let (latest_month, last) = months[months.len() - 1];
        let (previous_month, prev) = months[months.len() - 2];
        if prev <= 0.0 {
            return None;
        }

        let change_ratio = (last - prev) / prev;
        if change_ratio.abs() > REVENUE_SWING_THRESHOLD {
            return Some(Anomaly::RevenueSwing {
                previous_month: previous_month.to_string(),
                latest_month: latest_month.to_string(),
                change_ratio,
            });
        }
        None
    }
}

// ── HealthScorer ──────────────────────────────────────────────────────────────

/// Turns anomaly and month counts into a `0..=100` health score.
pub struct HealthScorer;

impl HealthScorer {
    /// `85 (+10 with >= 3 months) - min(5 * anomalies, 40)`, clamped to
    /// `0..=100`.
    pub fn score(anomaly_count: usize, month_count: usize) -> u8 {
        let bonus = if month_count >= MIN_MONTHS_FOR_TREND {
            CONSISTENCY_BONUS
        } else {
            0
        };
        let penalty = i64::try_from(anomaly_count)
            .unwrap_or(i64::MAX)
            .saturating_mul(ANOMALY_PENALTY)
            .min(MAX_ANOMALY_PENALTY);
        let score = (BASE_HEALTH_SCORE + bonus - penalty).clamp(0, 100);
        u8::try_from(score).unwrap_or(100)
    }

    /// Short label for a score, used in text reports.
    pub fn grade(score: u8) -> &'static str {
        match score {
            80.. => "healthy",
            60..=79 => "watch",
            _ => "at risk",
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
