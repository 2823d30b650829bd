use clap::{ArgGroup, CommandFactory, Parser};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::formatting::DEFAULT_CURRENCY_SYMBOL;
use crate::models::Period;

/// Base URL of the Gemini REST API.
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Model used for narratives unless overridden.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Billing analytics: revenue aggregation, anomaly detection and health scoring
#[derive(Parser, Debug, Clone)]
#[command(
    name = "billintel",
    about = "Billing analytics: revenue aggregation, anomaly detection and health scoring",
    version,
    group(ArgGroup::new("input").args(["csv", "json", "request", "compare"]).multiple(false))
)]
pub struct Settings {
    /// CSV file of billing records (header row required)
    #[arg(long)]
    pub csv: Option<PathBuf>,

    /// JSON file holding an array of billing records
    #[arg(long)]
    pub json: Option<PathBuf>,

    /// JSON file holding a full analysis request ({csv_data | json_data, period})
    #[arg(long)]
    pub request: Option<PathBuf>,

    /// Compare previously saved analysis results instead of analysing new data
    #[arg(long, num_args = 1..)]
    pub compare: Vec<PathBuf>,

    /// Reporting period passed to the narrative
    #[arg(long, value_enum, default_value_t = Period::Adhoc)]
    pub period: Period,

    /// Number of customers listed in the top-customers ranking (1-100)
    #[arg(long, default_value = "10", value_parser = clap::value_parser!(u16).range(1..=100))]
    pub top_customers: u16,

    /// Output format
    #[arg(long, default_value = "json", value_parser = ["json", "text"])]
    pub format: String,

    /// Also write the JSON result to this file
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Gemini API key; without one the templated narrative is used
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub gemini_api_key: Option<String>,

    /// Gemini model name
    #[arg(long, default_value = DEFAULT_GEMINI_MODEL)]
    pub model: String,

    /// Gemini API base URL
    #[arg(long, default_value = DEFAULT_GEMINI_BASE_URL, hide = true)]
    pub gemini_base_url: String,

    /// Sampling temperature for the narrative model
    #[arg(long, default_value = "0.4")]
    pub temperature: f32,

    /// Seconds to wait for the narrative before falling back (1-300)
    #[arg(long, default_value = "30", value_parser = clap::value_parser!(u64).range(1..=300))]
    pub narrative_timeout: u64,

    /// Never call the narrative model
    #[arg(long)]
    pub offline: bool,

    /// Currency symbol used in text output and fallback narratives
    #[arg(long, default_value = DEFAULT_CURRENCY_SYMBOL)]
    pub currency_symbol: String,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"])]
    pub log_level: String,

    /// Log file path
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Clear saved preferences
    #[arg(long)]
    pub clear: bool,
}

// ── LastUsedParams ─────────────────────────────────────────────────────────────

/// Persisted last-used preferences saved to `~/.billintel/last_used.json`.
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct LastUsedParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period: Option<Period>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_customers: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub narrative_timeout: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency_symbol: Option<String>,
}

impl LastUsedParams {
    /// `~/.billintel/last_used.json`.
    pub fn config_path() -> PathBuf {
        Self::config_path_in(&dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
    }

    /// Return the config path rooted at `base_dir` (used for testing).
    pub fn config_path_in(base_dir: &Path) -> PathBuf {
        base_dir.join(".billintel").join("last_used.json")
    }

    /// Load persisted params from an explicit path.
    /// Returns `Default` when the file is absent or cannot be parsed.
    pub fn load_from(path: &Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        serde_json::from_str(&content).unwrap_or_else(|e| {
            tracing::debug!("ignoring unreadable preferences {}: {}", path.display(), e);
            Self::default()
        })
    }

    /// Atomically write params to `path`, creating parent directories if needed.
    pub fn save_to(&self, path: &Path) -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, &json)?;
        std::fs::rename(&tmp, path)?;

        Ok(())
    }

    /// Delete the config file at `path` if it exists.
    pub fn clear_at(path: &Path) -> Result<(), std::io::Error> {
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}

// ── Settings impl ──────────────────────────────────────────────────────────────

impl Settings {
    /// Parse CLI arguments, merge with last-used preferences where no explicit
    /// CLI value was provided, and persist the result.
    pub fn load_with_last_used() -> Self {
        Self::load_with_last_used_impl(
            std::env::args_os().collect(),
            &LastUsedParams::config_path(),
        )
    }

    /// Same as [`load_with_last_used`](Self::load_with_last_used) but with an
    /// explicit argument list and config path so tests can redirect both.
    pub fn load_with_last_used_impl(args: Vec<std::ffi::OsString>, config_path: &Path) -> Self {
        let matches = Settings::command().get_matches_from(args.clone());
        let mut settings = Settings::parse_from(args);

        if settings.clear {
            if let Err(e) = LastUsedParams::clear_at(config_path) {
                tracing::warn!("could not clear {}: {}", config_path.display(), e);
            }
            return settings.apply_debug();
        }

        let last = LastUsedParams::load_from(config_path);

        // CLI always wins; the id is the field name, not the flag spelling.
        if !is_arg_explicitly_set(&matches, "period") {
            if let Some(v) = last.period {
                settings.period = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "top_customers") {
            if let Some(v) = last.top_customers.filter(|n| (1..=100).contains(n)) {
                settings.top_customers = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "format") {
            if let Some(v) = last.format.filter(|f| f == "json" || f == "text") {
                settings.format = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "model") {
            if let Some(v) = last.model {
                settings.model = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "narrative_timeout") {
            if let Some(v) = last.narrative_timeout.filter(|s| (1..=300).contains(s)) {
                settings.narrative_timeout = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "currency_symbol") {
            if let Some(v) = last.currency_symbol {
                settings.currency_symbol = v;
            }
        }

        settings = settings.apply_debug();

        let params = LastUsedParams::from(&settings);
        if let Err(e) = params.save_to(config_path) {
            tracing::debug!("could not persist preferences: {}", e);
        }

        settings
    }

    /// `--debug` overrides the log level.
    fn apply_debug(mut self) -> Self {
        if self.debug {
            self.log_level = "DEBUG".to_string();
        }
        self
    }

    /// API key to use for the narrative model, if the model should be called.
    pub fn narrative_api_key(&self) -> Option<&str> {
        if self.offline {
            return None;
        }
        self.gemini_api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }
}

impl From<&Settings> for LastUsedParams {
    fn from(s: &Settings) -> Self {
        LastUsedParams {
            period: Some(s.period),
            top_customers: Some(s.top_customers),
            format: Some(s.format.clone()),
            model: Some(s.model.clone()),
            narrative_timeout: Some(s.narrative_timeout),
            currency_symbol: Some(s.currency_symbol.clone()),
        }
    }
}

/// Returns `true` when `name` was supplied explicitly on the command line
/// (not via default value or environment variable).
fn is_arg_explicitly_set(matches: &clap::ArgMatches, name: &str) -> bool {
    matches.value_source(name) == Some(clap::parser::ValueSource::CommandLine)
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn tmp_config_path(tmp: &TempDir) -> PathBuf {
        LastUsedParams::config_path_in(tmp.path())
    }

    #[test]
    fn test_last_used_params_save_load() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp_config_path(&tmp);
        let params = LastUsedParams {
            period: Some(Period::Monthly),
            top_customers: Some(5),
            format: Some("text".to_string()),
            model: Some("gemini-2.0-flash".to_string()),
            narrative_timeout: Some(12),
            currency_symbol: Some("USD".to_string()),
        };

        params.save_to(&path).expect("save");
        let loaded = LastUsedParams::load_from(&path);

        assert_eq!(loaded, params);
    }

    #[test]
    fn test_last_used_params_default_when_missing_or_corrupt() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp_config_path(&tmp);
        assert_eq!(LastUsedParams::load_from(&path), LastUsedParams::default());

        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{not json").unwrap();
        assert_eq!(LastUsedParams::load_from(&path), LastUsedParams::default());
    }

    #[test]
    fn test_last_used_params_clear() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp_config_path(&tmp);
        LastUsedParams::default().save_to(&path).expect("save");
        assert!(path.exists());

        LastUsedParams::clear_at(&path).expect("clear");
        assert!(!path.exists());
    }

    #[test]
    fn test_settings_default_values() {
        let settings = Settings::parse_from(["billintel"]);

        assert!(settings.csv.is_none());
        assert!(settings.json.is_none());
        assert!(settings.request.is_none());
        assert!(settings.compare.is_empty());
        assert_eq!(settings.period, Period::Adhoc);
        assert_eq!(settings.top_customers, 10);
        assert_eq!(settings.format, "json");
        assert_eq!(settings.model, DEFAULT_GEMINI_MODEL);
        assert_eq!(settings.gemini_base_url, DEFAULT_GEMINI_BASE_URL);
        assert!((settings.temperature - 0.4).abs() < f32::EPSILON);
        assert_eq!(settings.narrative_timeout, 30);
        assert!(!settings.offline);
        assert_eq!(settings.currency_symbol, "KSH");
        assert_eq!(settings.log_level, "INFO");
        assert!(!settings.debug);
        assert!(!settings.clear);
    }

    #[test]
    fn test_settings_input_flags_are_exclusive() {
        let result = Settings::try_parse_from(["billintel", "--csv", "a.csv", "--json", "b.json"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_settings_compare_takes_many_files() {
        let settings = Settings::parse_from(["billintel", "--compare", "a.json", "b.json"]);
        assert_eq!(
            settings.compare,
            vec![PathBuf::from("a.json"), PathBuf::from("b.json")]
        );
    }

    #[test]
    fn test_settings_rejects_out_of_range_top_customers() {
        assert!(Settings::try_parse_from(["billintel", "--top-customers", "0"]).is_err());
        assert!(Settings::try_parse_from(["billintel", "--top-customers", "101"]).is_err());
    }

    #[test]
    fn test_narrative_api_key_respects_offline_and_blank() {
        let mut settings = Settings::parse_from(["billintel", "--gemini-api-key", "k-123"]);
        assert_eq!(settings.narrative_api_key(), Some("k-123"));

        settings.offline = true;
        assert_eq!(settings.narrative_api_key(), None);

        settings.offline = false;
        settings.gemini_api_key = Some("   ".to_string());
        assert_eq!(settings.narrative_api_key(), None);
    }

    #[test]
    fn test_load_with_last_used_merges_persisted_values() {
        let tmp = TempDir::new().expect("tempdir");
        let config_path = tmp_config_path(&tmp);
        LastUsedParams {
            period: Some(Period::Weekly),
            top_customers: Some(5),
            ..Default::default()
        }
        .save_to(&config_path)
        .expect("save");

        let settings = Settings::load_with_last_used_impl(vec!["billintel".into()], &config_path);
        assert_eq!(settings.period, Period::Weekly);
        assert_eq!(settings.top_customers, 5);
    }

    #[test]
    fn test_load_with_last_used_cli_overrides_persisted() {
        let tmp = TempDir::new().expect("tempdir");
        let config_path = tmp_config_path(&tmp);
        LastUsedParams {
            period: Some(Period::Weekly),
            ..Default::default()
        }
        .save_to(&config_path)
        .expect("save");

        let settings = Settings::load_with_last_used_impl(
            vec!["billintel".into(), "--period".into(), "monthly".into()],
            &config_path,
        );
        assert_eq!(settings.period, Period::Monthly);
    }

    #[test]
    fn test_load_with_last_used_ignores_invalid_persisted_values() {
        let tmp = TempDir::new().expect("tempdir");
        let config_path = tmp_config_path(&tmp);
        LastUsedParams {
            top_customers: Some(0),
            format: Some("yaml".to_string()),
            ..Default::default()
        }
        .save_to(&config_path)
        .expect("save");

        let settings = Settings::load_with_last_used_impl(vec!["billintel".into()], &config_path);
        assert_eq!(settings.top_customers, 10);
        assert_eq!(settings.format, "json");
    }

    #[test]
    fn test_load_with_last_used_clear_removes_file() {
        let tmp = TempDir::new().expect("tempdir");
        let config_path = tmp_config_path(&tmp);
        LastUsedParams::default().save_to(&config_path).expect("save");

        Settings::load_with_last_used_impl(
            vec!["billintel".into(), "--clear".into()],
            &config_path,
        );

        assert!(!config_path.exists(), "file must be gone after --clear");
    }

    #[test]
    fn test_load_with_last_used_debug_overrides_log_level() {
        let tmp = TempDir::new().expect("tempdir");
        let settings = Settings::load_with_last_used_impl(
            vec!["billintel".into(), "--debug".into()],
            &tmp_config_path(&tmp),
        );
        assert_eq!(settings.log_level, "DEBUG");
    }

    #[test]
    fn test_load_with_last_used_persists_after_run() {
        let tmp = TempDir::new().expect("tempdir");
        let config_path = tmp_config_path(&tmp);

        Settings::load_with_last_used_impl(
            vec!["billintel".into(), "--format".into(), "text".into()],
            &config_path,
        );

        let loaded = LastUsedParams::load_from(&config_path);
        assert_eq!(loaded.format, Some("text".to_string()));
        assert_eq!(loaded.top_customers, Some(10));
    }
}
