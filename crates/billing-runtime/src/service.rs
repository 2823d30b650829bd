//! End-to-end analysis service.
//!
//! Runs the deterministic pipeline from `billing-data`, asks the configured
//! narrator for insights under a timeout and falls back to the template
//! narrative whenever the narrator is missing, fails, stalls or answers with
//! blank text. Only input errors reach the caller.

use std::time::Duration;

use billing_core::formatting::DEFAULT_CURRENCY_SYMBOL;
use billing_core::models::{AnalysisRequest, AnalysisResult, NarrativeSource, ResultMetadata};
use billing_core::Result;
use billing_data::aggregator::DEFAULT_TOP_CUSTOMERS;
use billing_data::analysis::{analyze_request, AnalysisOptions};
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::narrative::{NarrativeGenerator, NarrativeSummary};
use crate::template::TemplateNarrator;

/// Default upper bound on a narrator call.
pub const DEFAULT_NARRATIVE_TIMEOUT_SECS: u64 = 30;

// ── ServiceConfig ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Maximum length of `topCustomers`.
    pub top_customers: usize,
    /// How long to wait for the narrator before using the template.
    pub narrative_timeout: Duration,
    /// Symbol used by the template narrative.
    pub currency_symbol: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            top_customers: DEFAULT_TOP_CUSTOMERS,
            narrative_timeout: Duration::from_secs(DEFAULT_NARRATIVE_TIMEOUT_SECS),
            currency_symbol: DEFAULT_CURRENCY_SYMBOL.to_string(),
        }
    }
}

// ── BillIntelService ──────────────────────────────────────────────────────────

/// Analysis entry point. Holds its configuration and narrator explicitly;
/// there is no global state, so several services can coexist.
pub struct BillIntelService {
    config: ServiceConfig,
    narrator: Option<Box<dyn NarrativeGenerator>>,
    fallback: TemplateNarrator,
}

impl BillIntelService {
    /// Create a service. With `narrator` set to `None` every result uses the
    /// template narrative.
    pub fn new(config: ServiceConfig, narrator: Option<Box<dyn NarrativeGenerator>>) -> Self {
        let fallback = TemplateNarrator::new(config.currency_symbol.clone());
        Self {
            config,
            narrator,
            fallback,
        }
    }

    /// Analyse one request and attach a narrative.
    ///
    /// # Errors
    ///
    /// Returns [`billing_core::BillingError::Input`] when the request carries
    /// no usable data. Narrator failures are logged and never returned.
    pub async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult> {
        let options = AnalysisOptions {
            top_customers: self.config.top_customers,
        };
        let analysis = analyze_request(request, &options)?;
        info!(
            records = analysis.records_processed,
            anomalies = analysis.anomalies.len(),
            health_score = analysis.health_score,
            period = %request.period,
            "Billing analysis complete"
        );

        let summary = NarrativeSummary::from_analysis(&analysis, request.period);
        let (insights, narrative_source) = self.narrate(&summary).await;

        Ok(AnalysisResult {
            stats: analysis.summary(),
            anomalies: summary.anomalies,
            health_score: analysis.health_score,
            insights,
            metadata: Some(ResultMetadata {
                generated_at: Utc::now().to_rfc3339(),
                period: request.period,
                records_processed: analysis.records_processed,
                narrative_source,
            }),
        })
    }

    /// Ask the narrator for text, falling back to the template on any failure.
    async fn narrate(&self, summary: &NarrativeSummary) -> (String, NarrativeSource) {
        let Some(narrator) = self.narrator.as_deref() else {
            debug!("No narrator configured; using template narrative");
            return (self.fallback.render(summary), NarrativeSource::Fallback);
        };

        match tokio::time::timeout(self.config.narrative_timeout, narrator.summarize(summary)).await {
            Ok(Ok(text)) if !text.trim().is_empty() => (text, NarrativeSource::Model),
            Ok(Ok(_)) => {
                warn!(narrator = narrator.name(), "Narrator returned blank text; using template narrative");
                (self.fallback.render(summary), NarrativeSource::Fallback)
            }
            Ok(Err(e)) => {
                warn!(narrator = narrator.name(), error = %e, "Narrator failed; using template narrative");
                (self.fallback.render(summary), NarrativeSource::Fallback)
            }
            Err(_) => {
                warn!(
                    narrator = narrator.name(),
                    timeout_secs = self.config.narrative_timeout.as_secs_f64(),
                    "Narrator timed out; using template narrative"
                );
                (self.fallback.render(summary), NarrativeSource::Fallback)
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
