mod bootstrap;
mod report;

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use billing_core::models::{AnalysisRequest, AnalysisResult};
use billing_core::settings::Settings;
use billing_data::comparison::{compare_results, load_result};
use billing_data::reader::load_request;
use billing_runtime::gemini::{GeminiConfig, GeminiNarrator};
use billing_runtime::narrative::NarrativeGenerator;
use billing_runtime::service::{BillIntelService, ServiceConfig};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load_with_last_used();

    bootstrap::ensure_directories()?;
    bootstrap::setup_logging(&settings.log_level, settings.log_file.as_ref())?;

    info!("BillIntel v{} starting", env!("CARGO_PKG_VERSION"));

    if settings.clear && !has_input(&settings) {
        info!("Saved preferences cleared");
        return Ok(());
    }

    let output = if settings.compare.is_empty() {
        run_analysis(&settings).await?
    } else {
        run_comparison(&settings)?
    };
    println!("{}", output);
    Ok(())
}

fn has_input(settings: &Settings) -> bool {
    settings.csv.is_some()
        || settings.json.is_some()
        || settings.request.is_some()
        || !settings.compare.is_empty()
}

// ── Analysis mode ──────────────────────────────────────────────────────────────

async fn run_analysis(settings: &Settings) -> Result<String> {
    let request = build_request(settings)?;
    let service = BillIntelService::new(service_config(settings), build_narrator(settings));

    let result = service.analyze(&request).await?;

    if let Some(path) = &settings.output {
        match save_result(path, &result) {
            Ok(()) => info!("Saved result to {}", path.display()),
            Err(e) => warn!("Could not save result to {}: {:#}", path.display(), e),
        }
    }

    if settings.format == "text" {
        Ok(report::render_analysis(&result, &settings.currency_symbol))
    } else {
        Ok(serde_json::to_string_pretty(&result)?)
    }
}

/// Load the selected input file. With no input flag the request is empty and
/// the service rejects it as missing data.
fn build_request(settings: &Settings) -> Result<AnalysisRequest> {
    let path = settings
        .request
        .as_ref()
        .or(settings.json.as_ref())
        .or(settings.csv.as_ref());

    match path {
        Some(path) => load_request(path, settings.period)
            .with_context(|| format!("loading billing data from {}", path.display())),
        None => Ok(AnalysisRequest {
            period: settings.period,
            ..AnalysisRequest::default()
        }),
    }
}

fn service_config(settings: &Settings) -> ServiceConfig {
    ServiceConfig {
        top_customers: usize::from(settings.top_customers),
        narrative_timeout: Duration::from_secs(settings.narrative_timeout),
        currency_symbol: settings.currency_symbol.clone(),
    }
}

/// The Gemini narrator when an API key is available and `--offline` is not set.
fn build_narrator(settings: &Settings) -> Option<Box<dyn NarrativeGenerator>> {
    let Some(api_key) = settings.narrative_api_key() else {
        info!("No Gemini API key configured; using template narrative");
        return None;
    };

    let config = GeminiConfig {
        model: settings.model.clone(),
        base_url: settings.gemini_base_url.clone(),
        temperature: settings.temperature,
        request_timeout: Duration::from_secs(settings.narrative_timeout),
        ..GeminiConfig::new(api_key)
    };
    match GeminiNarrator::new(config) {
        Ok(narrator) => Some(Box::new(narrator)),
        Err(e) => {
            warn!("Gemini narrator unavailable: {}", e);
            None
        }
    }
}

fn save_result(path: &Path, result: &AnalysisResult) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(result)?;
    std::fs::write(path, json)?;
    Ok(())
}

// ── Comparison mode ────────────────────────────────────────────────────────────

fn run_comparison(settings: &Settings) -> Result<String> {
    let mut results = Vec::with_capacity(settings.compare.len());
    for path in &settings.compare {
        let result = load_result(path).with_context(|| format!("loading {}", path.display()))?;
        let label = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        results.push((label, result));
    }

    let report = compare_results(&results, &settings.currency_symbol)?;
    if settings.format == "text" {
        Ok(report::render_comparison(&report, &settings.currency_symbol))
    } else {
        Ok(serde_json::to_string_pretty(&report)?)
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use billing_core::models::{NarrativeSource, Period};
    use billing_core::BillingError;
    use clap::Parser;
    use tempfile::TempDir;

    fn settings(args: &[&str]) -> Settings {
        let mut argv = vec!["billintel"];
        argv.extend_from_slice(args);
        Settings::parse_from(argv)
    }

    fn write(dir: &TempDir, name: &str, content: &str) -> String {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path.to_string_lossy().into_owned()
    }

    const CSV: &str = "customer_id,plan,data_used,amount_billed,billing_date\n\
                       C1,Basic,10,20,2025-01-05\n\
                       C2,Basic,0,15,2025-01-10\n";

    #[test]
    fn test_build_request_from_csv_file() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "bills.csv", CSV);
        let request = build_request(&settings(&["--csv", &path, "--period", "weekly"])).unwrap();
        assert!(request.csv_data.is_some());
        assert_eq!(request.period, Period::Weekly);
    }

    #[test]
    fn test_build_request_without_input_is_empty() {
        let request = build_request(&settings(&[])).unwrap();
        assert!(request.csv_data.is_none());
        assert!(request.json_data.is_none());
    }

    #[test]
    fn test_offline_disables_narrator() {
        let s = settings(&["--gemini-api-key", "k", "--offline"]);
        assert!(build_narrator(&s).is_none());
        let s = settings(&["--gemini-api-key", "k"]);
        assert!(build_narrator(&s).is_some());
    }

    #[tokio::test]
    async fn test_run_analysis_text_and_saved_output() {
        let dir = TempDir::new().unwrap();
        let input = write(&dir, "bills.csv", CSV);
        let saved = dir.path().join("out").join("result.json");
        let saved_str = saved.to_string_lossy().into_owned();

        let s = settings(&["--csv", &input, "--format", "text", "--offline", "--output", &saved_str]);
        let text = run_analysis(&s).await.unwrap();
        assert!(text.contains("Total revenue:        KSH 35.00"));

        let result = load_result(&saved).unwrap();
        assert_eq!(result.health_score, 80);
        assert_eq!(
            result.metadata.unwrap().narrative_source,
            NarrativeSource::Fallback
        );
    }

    #[tokio::test]
    async fn test_run_analysis_survives_unwritable_output() {
        let dir = TempDir::new().unwrap();
        let input = write(&dir, "bills.csv", CSV);
        // A directory cannot be overwritten as a file.
        let target = dir.path().to_string_lossy().into_owned();

        let s = settings(&["--csv", &input, "--offline", "--output", &target]);
        let json = run_analysis(&s).await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["stats"]["totalRevenue"], 35.0);
    }

    #[tokio::test]
    async fn test_run_analysis_without_input_fails() {
        let err = run_analysis(&settings(&["--offline"])).await.unwrap_err();
        let billing = err.downcast_ref::<BillingError>().unwrap();
        assert!(billing.is_input());
    }

    #[tokio::test]
    async fn test_compare_saved_results() {
        let dir = TempDir::new().unwrap();
        let first = dir.path().join("first.json");
        let second = dir.path().join("second.json");

        let input = write(&dir, "bills.csv", CSV);
        for out in [&first, &second] {
            let s = settings(&["--csv", &input, "--offline", "--output", &out.to_string_lossy()]);
            run_analysis(&s).await.unwrap();
        }

        let s = settings(&[
            "--compare",
            &first.to_string_lossy(),
            &second.to_string_lossy(),
            "--format",
            "text",
        ]);
        let text = run_comparison(&s).unwrap();
        assert!(text.contains("BillIntel comparison (2 results)"));
        assert!(text.contains("Revenue trend:        flat"));
    }

    #[tokio::test]
    async fn test_compare_needs_two_results() {
        let dir = TempDir::new().unwrap();
        let input = write(&dir, "bills.csv", CSV);
        let only = dir.path().join("only.json");
        let s = settings(&["--csv", &input, "--offline", "--output", &only.to_string_lossy()]);
        run_analysis(&s).await.unwrap();

        let err = run_comparison(&settings(&["--compare", &only.to_string_lossy()])).unwrap_err();
        assert!(err.downcast_ref::<BillingError>().unwrap().is_input());
    }

    #[test]
    fn test_compare_rejects_non_result_file() {
        let dir = TempDir::new().unwrap();
        let bogus = write(&dir, "bogus.json", "{}");
        let other = write(&dir, "other.json", "{}");
        let err = run_comparison(&settings(&["--compare", &bogus, &other])).unwrap_err();
        assert!(err.to_string().contains("bogus.json"));
    }
}
