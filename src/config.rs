use std::path::PathBuf;
use std::str::FromStr;

use serde::Serialize;

/// Application-level constants
pub const APP_NAME: &str = "MedTrend";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Maximum number of files accepted in a single upload batch.
pub const MAX_BATCH_FILES: usize = 10;

/// Maximum size of a single uploaded file (25 MB).
pub const MAX_FILE_BYTES: usize = 25 * 1024 * 1024;

/// Document text beyond this many characters is not sent for inference.
pub const MAX_PROMPT_CHARS: usize = 12_000;

/// Number of prior measurements sent to the inference service as trend context.
pub const HISTORY_LIMIT: usize = 100;

/// Confidence recorded for AI-sourced analyses and measurements.
pub const AI_CONFIDENCE: f64 = 0.9;

/// Rolling window (by extraction time) for the "recent" part of the summary.
pub const RECENT_WINDOW_DAYS: i64 = 30;

/// Number of recent measurements returned in the summary.
pub const RECENT_LIMIT: usize = 10;

const DEFAULT_MODEL: &str = "medgemma";
const DEFAULT_TIMEOUT_SECS: u64 = 120;
const DEFAULT_RETRIES: u32 = 1;
const DEFAULT_FANOUT: usize = 3;

/// Default tracing filter when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "medtrend=info,warn"
}

/// Get the application data directory
/// ~/MedTrend/ on all platforms
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_NAME)
}

/// Runtime configuration. Defaults are overridable from `MEDTREND_*` variables.
#[derive(Debug, Clone, Serialize)]
pub struct AppConfig {
    /// Root for the SQLite database and stored document bytes.
    pub data_dir: PathBuf,
    /// Base URL of the Ollama server. `None` leaves inference unavailable.
    pub ollama_url: Option<String>,
    pub model: String,
    /// Optional bearer credential for hosted Ollama-compatible endpoints.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub inference_timeout_secs: u64,
    /// Extra attempts after a transport failure (timeouts are never retried).
    pub inference_retries: u32,
    /// Upper bound on files processed concurrently within one batch.
    pub batch_fanout: usize,
    /// Skip the inference call for documents the classifier does not flag.
    pub require_lab_signal: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: app_data_dir(),
            ollama_url: None,
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
            inference_timeout_secs: DEFAULT_TIMEOUT_SECS,
            inference_retries: DEFAULT_RETRIES,
            batch_fanout: DEFAULT_FANOUT,
            require_lab_signal: false,
        }
    }
}

impl AppConfig {
    /// Build a config from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        Self {
            data_dir: get("MEDTREND_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            ollama_url: get("MEDTREND_OLLAMA_URL"),
            model: get("MEDTREND_MODEL").unwrap_or(defaults.model),
            api_key: get("MEDTREND_API_KEY"),
            inference_timeout_secs: parse_or(
                "MEDTREND_INFERENCE_TIMEOUT_SECS",
                get("MEDTREND_INFERENCE_TIMEOUT_SECS"),
                defaults.inference_timeout_secs,
            ),
            inference_retries: parse_or(
                "MEDTREND_INFERENCE_RETRIES",
                get("MEDTREND_INFERENCE_RETRIES"),
                defaults.inference_retries,
            ),
            batch_fanout: parse_or(
                "MEDTREND_BATCH_FANOUT",
                get("MEDTREND_BATCH_FANOUT"),
                defaults.batch_fanout,
            )
            .max(1),
            require_lab_signal: parse_or(
                "MEDTREND_REQUIRE_LAB_SIGNAL",
                get("MEDTREND_REQUIRE_LAB_SIGNAL"),
                defaults.require_lab_signal,
            ),
        }
    }

    /// Path of the SQLite database file.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("medtrend.db")
    }

    /// Directory holding uploaded document bytes.
    pub fn files_dir(&self) -> PathBuf {
        self.data_dir.join("files")
    }
}

fn parse_or<T: FromStr>(key: &str, raw: Option<String>, default: T) -> T {
    match raw {
        None => default,
        Some(value) => value.parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %value, "Invalid configuration value, using default");
            default
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn app_data_dir_ends_with_app_name() {
        assert!(app_data_dir().ends_with("MedTrend"));
    }

    #[test]
    fn defaults_leave_inference_unconfigured() {
        let config = AppConfig::from_lookup(lookup_from(&[]));
        assert!(config.ollama_url.is_none());
        assert_eq!(config.model, "medgemma");
        assert_eq!(config.inference_timeout_secs, 120);
        assert_eq!(config.batch_fanout, 3);
        assert!(!config.require_lab_signal);
    }

    #[test]
    fn environment_overrides_are_applied() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("MEDTREND_DATA_DIR", "/tmp/medtrend-test"),
            ("MEDTREND_OLLAMA_URL", "http://localhost:11434"),
            ("MEDTREND_MODEL", "medgemma:27b"),
            ("MEDTREND_INFERENCE_TIMEOUT_SECS", "30"),
            ("MEDTREND_BATCH_FANOUT", "5"),
            ("MEDTREND_REQUIRE_LAB_SIGNAL", "true"),
        ]));
        assert_eq!(config.data_dir, PathBuf::from("/tmp/medtrend-test"));
        assert_eq!(config.ollama_url.as_deref(), Some("http://localhost:11434"));
        assert_eq!(config.model, "medgemma:27b");
        assert_eq!(config.inference_timeout_secs, 30);
        assert_eq!(config.batch_fanout, 5);
        assert!(config.require_lab_signal);
        assert_eq!(config.database_path(), PathBuf::from("/tmp/medtrend-test/medtrend.db"));
    }

    #[test]
    fn invalid_values_fall_back_to_defaults() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("MEDTREND_INFERENCE_TIMEOUT_SECS", "soon"),
            ("MEDTREND_BATCH_FANOUT", "0"),
            ("MEDTREND_OLLAMA_URL", "   "),
        ]));
        assert_eq!(config.inference_timeout_secs, 120);
        assert_eq!(config.batch_fanout, 1);
        assert!(config.ollama_url.is_none());
    }

    #[test]
    fn api_key_is_never_serialized() {
        let config = AppConfig {
            api_key: Some("secret-token".into()),
            ..AppConfig::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("secret-token"));
    }
}
