//! Narrative generation through the Gemini `generateContent` REST endpoint.

use std::time::Duration;

use async_trait::async_trait;
use billing_core::settings::{DEFAULT_GEMINI_BASE_URL, DEFAULT_GEMINI_MODEL};
use billing_core::{BillingError, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::narrative::{NarrativeGenerator, NarrativeSummary};

pub const DEFAULT_TEMPERATURE: f32 = 0.4;

/// Header carrying the API key. The key never appears in the request URL.
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Connection settings for [`GeminiNarrator`].
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub temperature: f32,
    /// Per-request timeout applied by the HTTP client.
    pub request_timeout: Duration,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_GEMINI_MODEL.to_string(),
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            request_timeout: Duration::from_secs(30),
        }
    }
}

// ── Wire types ────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    role: String,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

// ── GeminiNarrator ────────────────────────────────────────────────────────────

pub struct GeminiNarrator {
    client: Client,
    config: GeminiConfig,
}

impl GeminiNarrator {
    pub fn new(config: GeminiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| BillingError::collaborator(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }
}

/// The analyst prompt sent to the model, with the summary embedded as JSON.
pub fn build_prompt(summary: &NarrativeSummary) -> Result<String> {
    Ok(format!(
        "You are BillIntel, an AI billing analyst for ISPs.\n\
         Summarize the dataset with:\n\
         - Total revenue\n\
         - Average bill per customer\n\
         - Monthly trends (brief)\n\
         - Top paying customers (up to 5)\n\
         - Low-margin plans (high usage, low revenue)\n\
         - Bullet a few anomalies if any\n\
         Provide a concise narrative (120-200 words). Period: {}.\n\
         \n\
         DATA (JSON): {}\n",
        summary.period,
        summary.to_json()?
    ))
}

#[async_trait]
impl NarrativeGenerator for GeminiNarrator {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn summarize(&self, summary: &NarrativeSummary) -> Result<String> {
        let payload = GenerateContentRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![Part {
                    text: Some(build_prompt(summary)?),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: self.config.temperature,
            },
        };

        debug!(model = %self.config.model, "Requesting narrative from Gemini");
        let res = self
            .client
            .post(self.endpoint())
            .header(API_KEY_HEADER, &self.config.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                BillingError::collaborator(format!("Gemini request failed: {}", e.without_url()))
            })?;

        let status = res.status();
        if !status.is_success() {
            let err_text = res.text().await.unwrap_or_default();
            return Err(BillingError::collaborator(format!(
                "Gemini API error (status {}): {}",
                status, err_text
            )));
        }

        let body: GenerateContentResponse = res.json().await.map_err(|e| {
            BillingError::collaborator(format!(
                "Gemini returned an unreadable body: {}",
                e.without_url()
            ))
        })?;

        let text: String = body
            .candidates
            .and_then(|candidates| candidates.into_iter().next())
            .and_then(|candidate| candidate.content)
            .ok_or_else(|| BillingError::collaborator("Gemini returned no candidates"))?
            .parts
            .into_iter()
            .filter_map(|part| part.text)
            .collect();

        debug!(chars = text.len(), "Received Gemini narrative");
        Ok(text)
    }
}
