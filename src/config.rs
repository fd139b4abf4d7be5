//! Configuration for PubMed, Gemini and pipeline tuning
//!
//! Loads configuration from config.yml file; environment variables win.

use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::retry::RetryPolicy;

/// Default constants (fallback if config.yml not found)
pub const PUBMED_API_BASE_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";
pub const GEMINI_API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const EMBEDDING_MODEL: &str = "models/embedding-001";
pub const GENERATIVE_MODEL: &str = "gemini-1.5-flash-latest";
pub const DEFAULT_TOP_K: usize = 100;
pub const MIN_TOP_K: usize = 20;
pub const MAX_TOP_K: usize = 200;
pub const FETCH_BATCH_SIZE: usize = 200;
pub const POLITENESS_DELAY_MS: u64 = 300;
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// YAML config structures
#[derive(Debug, Default, Deserialize)]
struct YamlConfig {
    pubmed: Option<PubMedSection>,
    gemini: Option<GeminiSection>,
    search: Option<SearchSection>,
    retry: Option<RetrySection>,
}

#[derive(Debug, Default, Deserialize)]
struct PubMedSection {
    api_key: Option<String>,
    base_url: Option<String>,
    batch_size: Option<usize>,
    politeness_delay_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct GeminiSection {
    api_key: Option<String>,
    base_url: Option<String>,
    embedding_model: Option<String>,
    generative_model: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SearchSection {
    default_top_k: Option<usize>,
    request_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct RetrySection {
    max_attempts: Option<u32>,
    base_delay_ms: Option<u64>,
    max_delay_ms: Option<u64>,
}

/// Main configuration struct
#[derive(Debug, Clone)]
pub struct Config {
    pub pubmed_api_key: String,
    pub pubmed_base_url: String,
    pub google_api_key: String,
    pub gemini_base_url: String,
    pub embedding_model: String,
    pub generative_model: String,
    pub default_top_k: usize,
    pub fetch_batch_size: usize,
    pub politeness_delay: Duration,
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    /// Load configuration from config.yml or use defaults
    /// Environment variables take precedence over config.yml values
    pub fn new() -> Self {
        Self::load_from_file("config.yml")
            .or_else(|_| Self::load_from_file("../config.yml"))
            .unwrap_or_else(|_| Self::from_yaml(YamlConfig::default()))
    }

    /// Built-in defaults with no file and no environment lookups.
    pub fn defaults() -> Self {
        Self {
            pubmed_api_key: String::new(),
            pubmed_base_url: PUBMED_API_BASE_URL.to_string(),
            google_api_key: String::new(),
            gemini_base_url: GEMINI_API_BASE_URL.to_string(),
            embedding_model: EMBEDDING_MODEL.to_string(),
            generative_model: GENERATIVE_MODEL.to_string(),
            default_top_k: DEFAULT_TOP_K,
            fetch_batch_size: FETCH_BATCH_SIZE,
            politeness_delay: Duration::from_millis(POLITENESS_DELAY_MS),
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
            retry: RetryPolicy::default(),
        }
    }

    /// Resolve a value: prefer env var if config value looks like ${VAR}
    fn resolve_env_string(value: Option<String>, env_key: &str) -> Option<String> {
        if let Some(ref v) = value {
            if v.starts_with("${") && v.ends_with('}') {
                let var_name = &v[2..v.len() - 1];
                if let Ok(env_val) = std::env::var(var_name) {
                    return Some(env_val);
                }
                return std::env::var(env_key).ok();
            }
        }
        if let Ok(env_val) = std::env::var(env_key) {
            return Some(env_val);
        }
        value
    }

    /// Resolve a numeric value, env var first
    fn resolve_env_number<T: std::str::FromStr>(value: Option<T>, env_key: &str) -> Option<T> {
        std::env::var(env_key)
            .ok()
            .and_then(|v| v.trim().parse::<T>().ok())
            .or(value)
    }

    /// Load .env file into environment variables using dotenvy
    fn load_dotenv() {
        if dotenvy::dotenv().is_err() {
            let _ = dotenvy::from_filename("../.env");
        }
    }

    /// Load configuration from a specific file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        Self::load_dotenv();

        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        let yaml: YamlConfig = serde_yaml::from_str(&content)
            .map_err(|e| format!("Failed to parse config file: {}", e))?;

        Ok(Self::from_yaml(yaml))
    }

    fn from_yaml(yaml: YamlConfig) -> Self {
        let defaults = Self::defaults();
        let pubmed = yaml.pubmed.unwrap_or_default();
        let gemini = yaml.gemini.unwrap_or_default();
        let search = yaml.search.unwrap_or_default();
        let retry = yaml.retry.unwrap_or_default();

        let base_delay_ms = Self::resolve_env_number(retry.base_delay_ms, "RETRY_BASE_DELAY_MS")
            .unwrap_or(defaults.retry.base_delay.as_millis() as u64);
        let max_delay_ms = Self::resolve_env_number(retry.max_delay_ms, "RETRY_MAX_DELAY_MS")
            .unwrap_or(defaults.retry.max_delay.as_millis() as u64);

        Self {
            pubmed_api_key: Self::resolve_env_string(pubmed.api_key, "PUBMED_API_KEY")
                .unwrap_or_default(),
            pubmed_base_url: Self::resolve_env_string(pubmed.base_url, "PUBMED_API_BASE_URL")
                .unwrap_or(defaults.pubmed_base_url),
            google_api_key: Self::resolve_env_string(gemini.api_key, "GOOGLE_API_KEY")
                .unwrap_or_default(),
            gemini_base_url: Self::resolve_env_string(gemini.base_url, "GEMINI_API_BASE_URL")
                .unwrap_or(defaults.gemini_base_url),
            embedding_model: Self::resolve_env_string(
                gemini.embedding_model,
                "GEMINI_EMBEDDING_MODEL",
            )
            .unwrap_or(defaults.embedding_model),
            generative_model: Self::resolve_env_string(
                gemini.generative_model,
                "GEMINI_GENERATIVE_MODEL",
            )
            .unwrap_or(defaults.generative_model),
            default_top_k: Self::resolve_env_number(search.default_top_k, "DEFAULT_TOP_K")
                .unwrap_or(DEFAULT_TOP_K)
                .clamp(MIN_TOP_K, MAX_TOP_K),
            fetch_batch_size: Self::resolve_env_number(pubmed.batch_size, "PUBMED_BATCH_SIZE")
                .unwrap_or(FETCH_BATCH_SIZE)
                .max(1),
            politeness_delay: Duration::from_millis(
                Self::resolve_env_number(pubmed.politeness_delay_ms, "POLITENESS_DELAY_MS")
                    .unwrap_or(POLITENESS_DELAY_MS),
            ),
            request_timeout: Duration::from_secs(
                Self::resolve_env_number(search.request_timeout_secs, "REQUEST_TIMEOUT_SECS")
                    .unwrap_or(REQUEST_TIMEOUT_SECS),
            ),
            retry: RetryPolicy::new(
                Self::resolve_env_number(retry.max_attempts, "RETRY_MAX_ATTEMPTS")
                    .unwrap_or(defaults.retry.max_attempts),
                Duration::from_millis(base_delay_ms),
                Duration::from_millis(max_delay_ms),
            ),
        }
    }

    /// Deadline for one record-source stage: every attempt plus backoff.
    ///
    /// With defaults this is 96s, about three times a single request
    /// timeout, since the stage includes the retries.
    pub fn source_timeout(&self) -> Duration {
        let attempts = self.retry.max_attempts.max(1);
        let backoff: Duration = (1..attempts).map(|a| self.retry.delay_for(a)).sum();
        self.request_timeout * attempts + backoff
    }

    /// True when a Gemini key is present.
    pub fn has_google_api_key(&self) -> bool {
        !self.google_api_key.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::defaults();
        assert_eq!(config.pubmed_base_url, PUBMED_API_BASE_URL);
        assert_eq!(config.embedding_model, "models/embedding-001");
        assert_eq!(config.default_top_k, 100);
        assert_eq!(config.fetch_batch_size, 200);
        assert_eq!(config.politeness_delay, Duration::from_millis(300));
        assert_eq!(config.retry.max_attempts, 3);
        assert!(!config.has_google_api_key());
    }

    #[test]
    fn load_from_file_reads_sections() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "pubmed:\n  base_url: http://localhost:9999\n  batch_size: 50\n\
             gemini:\n  generative_model: gemini-test\n\
             search:\n  default_top_k: 40\n  request_timeout_secs: 5\n\
             retry:\n  max_attempts: 5\n  base_delay_ms: 10\n  max_delay_ms: 40"
        )
        .unwrap();

        let config = Config::load_from_file(file.path()).unwrap();
        assert_eq!(config.generative_model, "gemini-test");
        assert_eq!(config.default_top_k, 40);
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.base_delay, Duration::from_millis(10));
    }

    #[test]
    fn top_k_is_clamped_into_range() {
        let yaml: YamlConfig =
            serde_yaml::from_str("search:\n  default_top_k: 5000").unwrap();
        assert_eq!(Config::from_yaml(yaml).default_top_k, MAX_TOP_K);
    }

    #[test]
    fn source_timeout_covers_all_attempts() {
        let config = Config::defaults();
        // 3 x 30s requests + 2s + 4s of backoff
        assert_eq!(config.source_timeout(), Duration::from_secs(96));
    }

    #[test]
    fn single_attempt_source_timeout_is_one_request() {
        let mut config = Config::defaults();
        config.request_timeout = Duration::from_secs(20);
        config.retry = RetryPolicy::immediate(1);
        assert_eq!(config.source_timeout(), Duration::from_secs(20));
    }

    #[test]
    fn load_from_missing_file_fails() {
        assert!(Config::load_from_file("/nonexistent/config.yml").is_err());
    }

    #[test]
    fn literal_value_used_without_env() {
        let resolved = Config::resolve_env_string(
            Some("literal".to_string()),
            "PUBMED_SEARCH_TEST_UNSET_VARIABLE",
        );
        assert_eq!(resolved.as_deref(), Some("literal"));
    }
}
