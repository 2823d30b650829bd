//! Deterministic narrative built locally from the summary.
//!
//! Used whenever the language-model narrator is unavailable, fails, times out
//! or returns blank text, so every result carries some narrative.

use std::cmp::Ordering;

use async_trait::async_trait;
use billing_core::formatting::{format_change, format_currency, DEFAULT_CURRENCY_SYMBOL};
use billing_core::models::Period;
use billing_core::Result;
use billing_data::analyzer::HealthScorer;

use crate::narrative::{NarrativeGenerator, NarrativeSummary};

/// Top customers named in the narrative.
const MAX_NAMED_CUSTOMERS: usize = 5;
/// Anomaly lines quoted in the narrative.
const MAX_QUOTED_ANOMALIES: usize = 3;

#[derive(Debug, Clone)]
pub struct TemplateNarrator {
    currency_symbol: String,
}

impl Default for TemplateNarrator {
    fn default() -> Self {
        Self::new(DEFAULT_CURRENCY_SYMBOL)
    }
}

impl TemplateNarrator {
    pub fn new(currency_symbol: impl Into<String>) -> Self {
        Self {
            currency_symbol: currency_symbol.into(),
        }
    }

    /// Render the narrative. Sentences are joined with single spaces.
    pub fn render(&self, summary: &NarrativeSummary) -> String {
        let mut sentences = Vec::with_capacity(6);

        sentences.push(format!(
            "{} billing summary: total revenue was {} with an average bill per customer of {}.",
            period_label(summary.period),
            self.money(summary.total_revenue),
            self.money(summary.avg_bill_per_customer)
        ));
        sentences.push(self.monthly_sentence(summary));
        if let Some(s) = self.top_customers_sentence(summary) {
            sentences.push(s);
        }
        if let Some(s) = self.low_margin_sentence(summary) {
            sentences.push(s);
        }
        sentences.push(anomaly_sentence(&summary.anomalies));
        sentences.push(format!(
            "Overall health score: {}/100 ({}).",
            summary.health_score,
            HealthScorer::grade(summary.health_score)
        ));

        sentences.join(" ")
    }

    fn money(&self, amount: f64) -> String {
        format_currency(amount, &self.currency_symbol)
    }

    fn monthly_sentence(&self, summary: &NarrativeSummary) -> String {
        let mut months: Vec<(&str, f64)> = summary
            .monthly_revenue
            .iter()
            .map(|(k, v)| (k.as_str(), *v))
            .collect();
        months.sort_by(|a, b| a.0.cmp(b.0));

        match months.as_slice() {
            [] => "No monthly revenue was recorded.".to_string(),
            [(month, revenue)] => format!(
                "Revenue covers a single month ({}) at {}.",
                month,
                self.money(*revenue)
            ),
            [.., (prev_month, prev), (last_month, last)] => {
                let direction = if *prev > 0.0 {
                    let change = (last - prev) / prev;
                    match last.partial_cmp(prev).unwrap_or(Ordering::Equal) {
                        Ordering::Greater => format!("rose {}", format_change(change)),
                        Ordering::Less => format!("fell {}", format_change(change)),
                        Ordering::Equal => "held steady".to_string(),
                    }
                } else {
                    "moved from zero".to_string()
                };
                format!(
                    "Revenue spans {} months; the latest month ({}) {} against {} at {}.",
                    months.len(),
                    last_month,
                    direction,
                    prev_month,
                    self.money(*last)
                )
            }
        }
    }

    fn top_customers_sentence(&self, summary: &NarrativeSummary) -> Option<String> {
        if summary.top_customers.is_empty() {
            return None;
        }
        let named: Vec<String> = summary
            .top_customers
            .iter()
            .take(MAX_NAMED_CUSTOMERS)
            .map(|c| format!("{} ({})", c.customer_id, self.money(c.total)))
            .collect();
        Some(format!("Top customers: {}.", named.join(", ")))
    }

    /// Names the plan earning the least revenue per unit of usage.
    fn low_margin_sentence(&self, summary: &NarrativeSummary) -> Option<String> {
        let (plan, per_unit) = summary
            .plan_totals
            .iter()
            .filter(|(_, totals)| totals.usage > 0.0)
            .map(|(plan, totals)| (plan, totals.revenue / totals.usage))
            .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal))?;
        Some(format!(
            "Lowest-margin plan: {} at {} per unit of usage.",
            plan,
            self.money(per_unit)
        ))
    }
}

#[async_trait]
impl NarrativeGenerator for TemplateNarrator {
    fn name(&self) -> &str {
        "template"
    }

    async fn summarize(&self, summary: &NarrativeSummary) -> Result<String> {
        Ok(self.render(summary))
    }
}

fn period_label(period: Period) -> &'static str {
    match period {
        Period::Adhoc => "Ad-hoc",
        Period::Weekly => "Weekly",
        Period::Monthly => "Monthly",
    }
}

fn anomaly_sentence(anomalies: &[String]) -> String {
    match anomalies.len() {
        0 => "No anomalies were detected.".to_string(),
        n => {
            let quoted: Vec<&str> = anomalies
                .iter()
                .take(MAX_QUOTED_ANOMALIES)
                .map(|a| a.trim_end_matches('.'))
                .collect();
            let noun = if n == 1 { "anomaly was" } else { "anomalies were" };
            format!("{} {} flagged: {}.", n, noun, quoted.join("; "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use billing_core::models::{CustomerTotal, PlanTotals};
    use indexmap::IndexMap;

    fn summary() -> NarrativeSummary {
        let mut plans: IndexMap<String, PlanTotals> = IndexMap::new();
        plans.insert(
            "Basic".to_string(),
            PlanTotals {
                revenue: 35.0,
                usage: 10.0,
            },
        );
        plans.insert(
            "Pro".to_string(),
            PlanTotals {
                revenue: 100.0,
                usage: 5.0,
            },
        );
        plans.insert(
            "Idle".to_string(),
            PlanTotals {
                revenue: 10.0,
                usage: 0.0,
            },
        );
        NarrativeSummary {
            total_revenue: 1_135.0,
            avg_bill_per_customer: 567.5,
            monthly_revenue: [("2025-02".to_string(), 1_000.0), ("2025-01".to_string(), 135.0)]
                .into_iter()
                .collect(),
            top_customers: vec![
                CustomerTotal {
                    customer_id: "C1".to_string(),
                    total: 1_000.0,
                },
                CustomerTotal {
                    customer_id: "C2".to_string(),
                    total: 135.0,
                },
            ],
            plan_totals: plans,
            anomalies: vec!["Customer C2 billed 15 with zero usage on 2025-01-10.".to_string()],
            health_score: 80,
            period: Period::Monthly,
        }
    }

    #[test]
    fn test_render_mentions_headline_figures() {
        let text = TemplateNarrator::default().render(&summary());
        assert!(text.starts_with(
            "Monthly billing summary: total revenue was KSH 1,135.00 with an average bill per customer of KSH 567.50."
        ));
        assert!(text.contains("Top customers: C1 (KSH 1,000.00), C2 (KSH 135.00)."));
        assert!(text.contains("Overall health score: 80/100 (healthy)."));
    }

    #[test]
    fn test_render_orders_months_chronologically() {
        let text = TemplateNarrator::default().render(&summary());
        assert!(text.contains("the latest month (2025-02) rose +640.7% against 2025-01"));
    }

    #[test]
    fn test_low_margin_plan_ignores_zero_usage() {
        let text = TemplateNarrator::default().render(&summary());
        assert!(text.contains("Lowest-margin plan: Basic at KSH 3.50 per unit of usage."));
    }

    #[test]
    fn test_anomalies_are_counted_and_quoted() {
        let text = TemplateNarrator::default().render(&summary());
        assert!(text.contains(
            "1 anomaly was flagged: Customer C2 billed 15 with zero usage on 2025-01-10."
        ));

        let many: Vec<String> = (1..=5).map(|i| format!("issue {}.", i)).collect();
        assert_eq!(
            anomaly_sentence(&many),
            "5 anomalies were flagged: issue 1; issue 2; issue 3."
        );
    }

    #[test]
    fn test_empty_summary_still_narrates() {
        let empty = NarrativeSummary {
            total_revenue: 0.0,
            avg_bill_per_customer: 0.0,
            monthly_revenue: IndexMap::new(),
            top_customers: Vec::new(),
            plan_totals: IndexMap::new(),
            anomalies: Vec::new(),
            health_score: 85,
            period: Period::Adhoc,
        };
        let text = TemplateNarrator::new("$").render(&empty);
        assert_eq!(
            text,
            "Ad-hoc billing summary: total revenue was $ 0.00 with an average bill per customer of $ 0.00. \
             No monthly revenue was recorded. No anomalies were detected. \
             Overall health score: 85/100 (healthy)."
        );
    }

    #[tokio::test]
    async fn test_summarize_matches_render() {
        let narrator = TemplateNarrator::default();
        let s = summary();
        assert_eq!(narrator.summarize(&s).await.unwrap(), narrator.render(&s));
    }
}
