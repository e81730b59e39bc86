//! Engine configuration
//!
//! Sources, lowest precedence first: [`EngineConfig::default`], a JSON config
//! file, then `AMPERE_*` environment variables. Command-line flags are applied
//! on top by the binary.

use crate::error::{EngineError, Result};
use ampere_store::{RetryPolicy, StoreConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Bucket used when only `AMPERE_STORE_URL` is given.
pub const DEFAULT_BUCKET: &str = "ampere-models";

/// Get the default blob cache path.
///
/// - Linux: `~/.cache/ampere/artifacts.db`
/// - macOS: `~/Library/Caches/ampere/artifacts.db`
/// - Windows: `%LOCALAPPDATA%\ampere\artifacts.db`
pub fn default_cache_path() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ampere")
        .join("artifacts.db")
}

/// Local blob cache settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Whether fetched artifacts are kept in the SQLite cache
    pub enabled: bool,
    /// Database file, [`default_cache_path`] when unset
    pub path: Option<PathBuf>,
    /// Entries older than this are refetched; unset means never
    pub max_age_hours: Option<u64>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: None,
            max_age_hours: Some(24),
        }
    }
}

impl CacheConfig {
    /// Database file to open.
    pub fn resolved_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(default_cache_path)
    }

    /// Maximum entry age.
    pub fn max_age(&self) -> Option<Duration> {
        self.max_age_hours
            .map(|hours| Duration::from_secs(hours.saturating_mul(3600)))
    }
}

/// Retry settings for transient store errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Delay before the first retry, in milliseconds
    pub initial_backoff_ms: u64,
    /// Upper bound on a single delay, in milliseconds
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            initial_backoff_ms: policy.initial_backoff.as_millis() as u64,
            max_backoff_ms: policy.max_backoff.as_millis() as u64,
        }
    }
}

impl RetryConfig {
    /// The retry policy these settings describe.
    pub const fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: if self.max_attempts == 0 { 1 } else { self.max_attempts },
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms),
        }
    }
}

/// Configuration for an [`Engine`](crate::Engine).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Artifact store
    pub store: StoreConfig,
    /// Local blob cache
    pub cache: CacheConfig,
    /// Retry policy for transient store errors
    pub retry: RetryConfig,
    /// Budget for loading one model, in seconds
    pub load_timeout_secs: u64,
    /// Budget for one SHAP pass, in seconds
    pub explain_timeout_secs: u64,
    /// Factors kept in a report
    pub top_k: usize,
    /// Models this deployment serves; empty means every registered model
    pub models: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            cache: CacheConfig::default(),
            retry: RetryConfig::default(),
            load_timeout_secs: 60,
            explain_timeout_secs: 120,
            top_k: ampere_output::DEFAULT_TOP_K,
            models: Vec::new(),
        }
    }
}

fn parse_var<T: FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| EngineError::Config(format!("{key}={value}: {e}")))
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(EngineError::Config(format!(
            "{key}={other}: expected a boolean"
        ))),
    }
}

impl EngineConfig {
    /// Read a JSON config file; absent keys keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("{}: {e}", path.display())))?;
        serde_json::from_str(&text)
            .map_err(|e| EngineError::Config(format!("{}: {e}", path.display())))
    }

    /// Defaults or `path`, then the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env()?;
        Ok(config)
    }

    /// Apply `AMPERE_*` variables from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_vars(|key| std::env::var(key).ok())
    }

    /// Apply `AMPERE_*` variables read through `lookup`.
    pub fn apply_vars(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(root) = lookup("AMPERE_STORE_ROOT") {
            self.store = StoreConfig::Local {
                root: PathBuf::from(root),
            };
        }
        if let Some(url) = lookup("AMPERE_STORE_URL") {
            self.store = match std::mem::take(&mut self.store) {
                StoreConfig::Http {
                    bucket,
                    token_env,
                    timeout_secs,
                    ..
                } => StoreConfig::Http {
                    base_url: url,
                    bucket,
                    token_env,
                    timeout_secs,
                },
                StoreConfig::Local { .. } => StoreConfig::Http {
                    base_url: url,
                    bucket: DEFAULT_BUCKET.to_string(),
                    token_env: None,
                    timeout_secs: 30,
                },
            };
        }
        if let Some(name) = lookup("AMPERE_BUCKET") {
            match &mut self.store {
                StoreConfig::Http { bucket, .. } => *bucket = name,
                StoreConfig::Local { .. } => {
                    return Err(EngineError::Config(
                        "AMPERE_BUCKET requires an http store (set AMPERE_STORE_URL)".to_string(),
                    ));
                }
            }
        }
        if let Some(path) = lookup("AMPERE_CACHE_PATH") {
            self.cache.path = Some(PathBuf::from(path));
        }
        if let Some(value) = lookup("AMPERE_NO_CACHE") {
            self.cache.enabled = !parse_flag("AMPERE_NO_CACHE", &value)?;
        }
        if let Some(value) = lookup("AMPERE_LOAD_TIMEOUT_SECS") {
            self.load_timeout_secs = parse_var("AMPERE_LOAD_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = lookup("AMPERE_EXPLAIN_TIMEOUT_SECS") {
            self.explain_timeout_secs = parse_var("AMPERE_EXPLAIN_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = lookup("AMPERE_TOP_K") {
            self.top_k = parse_var("AMPERE_TOP_K", &value)?;
        }
        Ok(())
    }

    /// Budget for loading one model.
    pub const fn load_timeout(&self) -> Duration {
        Duration::from_secs(self.load_timeout_secs)
    }

    /// Budget for one SHAP pass.
    pub const fn explain_timeout(&self) -> Duration {
        Duration::from_secs(self.explain_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.top_k, 15);
        assert!(config.cache.enabled);
        assert_eq!(config.retry.policy(), RetryPolicy::default());
        assert!(config.cache.resolved_path().ends_with("ampere/artifacts.db"));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: EngineConfig = serde_json::from_str(
            r#"{"store": {"kind": "http", "base_url": "https://storage.example.com", "bucket": "models"},
                "cache": {"enabled": false},
                "top_k": 5}"#,
        )
        .unwrap();
        assert_eq!(config.top_k, 5);
        assert!(!config.cache.enabled);
        assert_eq!(config.cache.max_age_hours, Some(24));
        assert_eq!(config.explain_timeout_secs, 120);
        assert!(matches!(config.store, StoreConfig::Http { ref bucket, .. } if bucket == "models"));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = EngineConfig::default();
        config
            .apply_vars(vars(&[
                ("AMPERE_STORE_URL", "https://storage.example.com"),
                ("AMPERE_BUCKET", "prod-models"),
                ("AMPERE_NO_CACHE", "1"),
                ("AMPERE_TOP_K", "7"),
                ("AMPERE_EXPLAIN_TIMEOUT_SECS", "5"),
            ]))
            .unwrap();

        assert_eq!(
            config.store,
            StoreConfig::Http {
                base_url: "https://storage.example.com".into(),
                bucket: "prod-models".into(),
                token_env: None,
                timeout_secs: 30,
            }
        );
        assert!(!config.cache.enabled);
        assert_eq!(config.top_k, 7);
        assert_eq!(config.explain_timeout(), Duration::from_secs(5));
    }

    #[rstest]
    #[case("AMPERE_TOP_K", "many")]
    #[case("AMPERE_NO_CACHE", "perhaps")]
    #[case("AMPERE_LOAD_TIMEOUT_SECS", "-1")]
    #[case("AMPERE_BUCKET", "models")]
    fn test_invalid_env_values(#[case] key: &str, #[case] value: &str) {
        let mut config = EngineConfig::default();
        let err = config.apply_vars(vars(&[(key, value)])).unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = EngineConfig::from_file(Path::new("/nonexistent/ampere.json")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/ampere.json"));
    }

    #[test]
    fn test_zero_attempts_still_tries_once() {
        let retry = RetryConfig {
            max_attempts: 0,
            ..RetryConfig::default()
        };
        assert_eq!(retry.policy().max_attempts, 1);
    }
}
