//! Plain-text rendering for `--format text`.

use std::fmt::Write;

use billing_core::formatting::{format_currency, format_currency_compact, format_number};
use billing_core::models::AnalysisResult;
use billing_data::analyzer::HealthScorer;
use billing_data::comparison::ComparisonReport;

const LABEL_WIDTH: usize = 22;

pub fn render_analysis(result: &AnalysisResult, currency_symbol: &str) -> String {
    let money = |amount: f64| format_currency(amount, currency_symbol);
    let mut out = String::new();

    let title = match &result.metadata {
        Some(meta) => format!("BillIntel report ({})", meta.period),
        None => "BillIntel report".to_string(),
    };
    let _ = writeln!(out, "{}", title);
    let _ = writeln!(out, "{}", "=".repeat(title.len()));
    let _ = writeln!(out, "{:<w$}{}", "Total revenue:", money(result.stats.total_revenue), w = LABEL_WIDTH);
    let _ = writeln!(
        out,
        "{:<w$}{}",
        "Avg bill per customer:",
        money(result.stats.avg_bill_per_customer),
        w = LABEL_WIDTH
    );
    let _ = writeln!(
        out,
        "{:<w$}{}/100 ({})",
        "Health score:",
        result.health_score,
        HealthScorer::grade(result.health_score),
        w = LABEL_WIDTH
    );

    if !result.stats.monthly_revenue.is_empty() {
        let _ = writeln!(out, "\nMonthly revenue");
        for (month, revenue) in result.stats.monthly_revenue.iter() {
            let _ = writeln!(out, "  {:<10}{}", month, money(*revenue));
        }
    }

    if !result.stats.top_customers.is_empty() {
        let _ = writeln!(out, "\nTop customers");
        for (rank, customer) in result.stats.top_customers.iter().enumerate() {
            let _ = writeln!(out, "  {:>2}. {:<16}{}", rank + 1, customer.customer_id, money(customer.total));
        }
    }

    if !result.stats.plan_totals.is_empty() {
        let _ = writeln!(out, "\nPlans");
        for (plan, totals) in result.stats.plan_totals.iter() {
            let _ = writeln!(
                out,
                "  {:<16}revenue {}  usage {}",
                plan,
                money(totals.revenue),
                format_number(totals.usage, 2)
            );
        }
    }

    let _ = writeln!(out, "\nAnomalies ({})", result.anomalies.len());
    if result.anomalies.is_empty() {
        let _ = writeln!(out, "  none");
    }
    for anomaly in &result.anomalies {
        let _ = writeln!(out, "  - {}", anomaly);
    }

    let _ = writeln!(out, "\nInsights");
    for line in result.insights.lines() {
        let _ = writeln!(out, "  {}", line);
    }

    out
}

pub fn render_comparison(report: &ComparisonReport, currency_symbol: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "BillIntel comparison ({} results)", report.entries.len());
    let _ = writeln!(out, "{}", "=".repeat(30));

    for entry in &report.entries {
        let _ = writeln!(
            out,
            "  {:<24}{:<28}{:<12}health {:>3}  anomalies {}",
            entry.label,
            entry.generated_at.as_deref().unwrap_or("-"),
            format_currency_compact(entry.total_revenue, currency_symbol),
            entry.health_score,
            entry.anomaly_count
        );
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "{:<w$}{}", "Revenue trend:", report.trends.revenue_trend, w = LABEL_WIDTH);
    let _ = writeln!(out, "{:<w$}{}", "Health trend:", report.trends.health_trend, w = LABEL_WIDTH);
    let _ = writeln!(out, "{:<w$}{}", "Anomaly trend:", report.trends.anomaly_trend, w = LABEL_WIDTH);
    let _ = writeln!(out, "\n{}", report.insights);
    out
}
