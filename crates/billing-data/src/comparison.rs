//! Trend comparison across previously saved analysis results.

use std::fmt;
use std::path::Path;

use billing_core::formatting::format_currency;
use billing_core::models::AnalysisResult;
use billing_core::{BillingError, Result};
use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use tracing::debug;

/// Fewest results a comparison accepts.
pub const MIN_COMPARISON_RESULTS: usize = 2;

// ── Trend labels ──────────────────────────────────────────────────────────────

/// Direction of total revenue between the oldest and newest result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RevenueTrend {
    Increasing,
    Declining,
    Flat,
}

/// Direction of the health score between the oldest and newest result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthTrend {
    Improving,
    Declining,
    Flat,
}

/// Direction of the anomaly count between the oldest and newest result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AnomalyTrend {
    Increasing,
    Decreasing,
    Flat,
}

impl fmt::Display for RevenueTrend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Increasing => "increasing",
            Self::Declining => "declining",
            Self::Flat => "flat",
        })
    }
}

impl fmt::Display for HealthTrend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Improving => "improving",
            Self::Declining => "declining",
            Self::Flat => "flat",
        })
    }
}

impl fmt::Display for AnomalyTrend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Increasing => "increasing",
            Self::Decreasing => "decreasing",
            Self::Flat => "flat",
        })
    }
}

// ── Report ────────────────────────────────────────────────────────────────────

/// One compared result, reduced to the figures the trends use.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparedEntry {
    pub label: String,
    pub generated_at: Option<String>,
    pub total_revenue: f64,
    pub health_score: u8,
    pub anomaly_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ComparisonTrends {
    pub revenue_trend: RevenueTrend,
    pub health_trend: HealthTrend,
    pub anomaly_trend: AnomalyTrend,
}

/// Output of [`compare_results`]. Entries are ordered oldest first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonReport {
    pub entries: Vec<ComparedEntry>,
    pub total_revenue: f64,
    pub average_health_score: u8,
    pub total_anomalies: usize,
    pub trends: ComparisonTrends,
    pub insights: String,
}

// ── Public functions ──────────────────────────────────────────────────────────

/// Read a result previously written with `--output`.
pub fn load_result(path: &Path) -> Result<AnalysisResult> {
    let text = std::fs::read_to_string(path).map_err(|source| BillingError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    let result = serde_json::from_str(&text)?;
    Ok(result)
}

/// Compare labelled results and describe how they moved over time.
///
/// Results are ordered by `metadata.generatedAt`. Results without a
/// parseable timestamp sort before timestamped ones and otherwise keep the
/// order they were given in. Fails with [`BillingError::Input`] when fewer
/// than [`MIN_COMPARISON_RESULTS`] results are supplied.
pub fn compare_results(
    results: &[(String, AnalysisResult)],
    currency_symbol: &str,
) -> Result<ComparisonReport> {
    if results.len() < MIN_COMPARISON_RESULTS {
        return Err(BillingError::input(format!(
            "comparison needs at least {} results, got {}",
            MIN_COMPARISON_RESULTS,
            results.len()
        )));
    }

    let mut ordered: Vec<&(String, AnalysisResult)> = results.iter().collect();
    ordered.sort_by_key(|(_, result)| generated_at(result));

    let entries: Vec<ComparedEntry> = ordered
        .iter()
        .map(|(label, result)| ComparedEntry {
            label: label.clone(),
            generated_at: result.metadata.as_ref().map(|m| m.generated_at.clone()),
            total_revenue: result.stats.total_revenue,
            health_score: result.health_score,
            anomaly_count: result.anomalies.len(),
        })
        .collect();

    // `entries` has at least two elements.
    let oldest = &entries[0];
    let newest = &entries[entries.len() - 1];
    let trends = ComparisonTrends {
        revenue_trend: revenue_trend(oldest.total_revenue, newest.total_revenue),
        health_trend: health_trend(oldest.health_score, newest.health_score),
        anomaly_trend: anomaly_trend(oldest.anomaly_count, newest.anomaly_count),
    };

    let total_revenue: f64 = entries.iter().map(|e| e.total_revenue).sum();
    let health_sum: f64 = entries.iter().map(|e| f64::from(e.health_score)).sum();
    let average_health_score = (health_sum / entries.len() as f64).round().clamp(0.0, 100.0) as u8;
    let total_anomalies: usize = entries.iter().map(|e| e.anomaly_count).sum();

    let insights = format!(
        "Based on your {} analyses, your total revenue is {} with an average health score of {}/100. \
         The {} revenue trend and {} health trend suggest {} billing issues. \
         Total anomalies detected: {}.",
        entries.len(),
        format_currency(total_revenue, currency_symbol),
        average_health_score,
        trends.revenue_trend,
        trends.health_trend,
        trends.anomaly_trend,
        total_anomalies
    );

    debug!(
        results = entries.len(),
        revenue_trend = %trends.revenue_trend,
        health_trend = %trends.health_trend,
        anomaly_trend = %trends.anomaly_trend,
        "Compared analysis results"
    );

    Ok(ComparisonReport {
        entries,
        total_revenue,
        average_health_score,
        total_anomalies,
        trends,
        insights,
    })
}

// ── Private helpers ───────────────────────────────────────────────────────────

fn generated_at(result: &AnalysisResult) -> Option<DateTime<FixedOffset>> {
    result
        .metadata
        .as_ref()
        .and_then(|m| DateTime::parse_from_rfc3339(&m.generated_at).ok())
}

fn revenue_trend(oldest: f64, newest: f64) -> RevenueTrend {
    if newest > oldest {
        RevenueTrend::Increasing
    } else if newest < oldest {
        RevenueTrend::Declining
    } else {
        RevenueTrend::Flat
    }
}

fn health_trend(oldest: u8, newest: u8) -> HealthTrend {
    match newest.cmp(&oldest) {
        std::cmp::Ordering::Greater => HealthTrend::Improving,
        std::cmp::Ordering::Less => HealthTrend::Declining,
        std::cmp::Ordering::Equal => HealthTrend::Flat,
    }
}

fn anomaly_trend(oldest: usize, newest: usize) -> AnomalyTrend {
    match newest.cmp(&oldest) {
        std::cmp::Ordering::Greater => AnomalyTrend::Increasing,
        std::cmp::Ordering::Less => AnomalyTrend::Decreasing,
        std::cmp::Ordering::Equal => AnomalyTrend::Flat,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
