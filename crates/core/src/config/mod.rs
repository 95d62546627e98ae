//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (ASHA_*)
//! 2. TOML config file (if ASHA_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Deserializer, Serialize};

mod validation;

pub use validation::ConfigError;

/// Assets the reference deployment pre-caches on install.
pub const DEFAULT_MANIFEST: &[&str] = &[
    "/",
    "/static/css/style.css",
    "/static/js/script.js",
    "/static/img/logo.svg",
    "/static/img/gemini-logo.svg",
    "/static/img/grok-logo.svg",
    "/static/img/icons/icon-192x192.png",
    "/static/img/icons/icon-512x512.png",
    "/static/manifest.json",
    "https://fonts.googleapis.com/css2?family=Poppins:wght@300;400;500;600&display=swap",
    "https://fonts.googleapis.com/icon?family=Material+Icons",
];

/// Hosts serving dynamic model traffic; never cached.
pub const DEFAULT_EXCLUDE_PATTERNS: &[&str] = &["api.x.ai", "generativelanguage.googleapis.com"];

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (ASHA_*)
/// 2. TOML config file (if ASHA_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to SQLite cache database.
    ///
    /// Set via ASHA_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Origin the worker is registered for, e.g. `http://localhost:5000`.
    ///
    /// Set via ASHA_ORIGIN environment variable.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Version tag of the current cache generation.
    ///
    /// Set via ASHA_CACHE_NAME environment variable. Change it whenever the
    /// manifest changes so clients re-install.
    #[serde(default = "default_cache_name")]
    pub cache_name: String,

    /// URLs that must be cached on install. Paths resolve against `origin`.
    ///
    /// Set via ASHA_MANIFEST environment variable (comma-separated).
    #[serde(default = "default_manifest", deserialize_with = "list_or_csv")]
    pub manifest: Vec<String>,

    /// URL substrings that are never read from or written to the cache.
    ///
    /// Set via ASHA_EXCLUDE_PATTERNS environment variable (comma-separated).
    #[serde(default = "default_exclude_patterns", deserialize_with = "list_or_csv")]
    pub exclude_patterns: Vec<String>,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via ASHA_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// HTTP request timeout in milliseconds.
    ///
    /// Set via ASHA_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum bytes to fetch per request.
    ///
    /// Set via ASHA_MAX_BYTES environment variable.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./asha-cache.sqlite")
}

fn default_origin() -> String {
    "http://localhost:5000".into()
}

fn default_cache_name() -> String {
    "asha-chatbot-v1".into()
}

fn default_manifest() -> Vec<String> {
    DEFAULT_MANIFEST.iter().map(|s| s.to_string()).collect()
}

fn default_exclude_patterns() -> Vec<String> {
    DEFAULT_EXCLUDE_PATTERNS.iter().map(|s| s.to_string()).collect()
}

fn default_user_agent() -> String {
    "asha-sw/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

/// Accept either a real list (TOML) or a comma-separated string (env).
fn list_or_csv<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ListOrCsv {
        List(Vec<String>),
        Csv(String),
    }

    Ok(match ListOrCsv::deserialize(deserializer)? {
        ListOrCsv::List(items) => items,
        ListOrCsv::Csv(raw) => raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
    })
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            origin: default_origin(),
            cache_name: default_cache_name(),
            manifest: default_manifest(),
            exclude_patterns: default_exclude_patterns(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            max_bytes: default_max_bytes(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `ASHA_`
    /// 2. TOML file from `ASHA_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Like [`AppConfig::load`], but an explicit `config_file` replaces the
    /// `ASHA_CONFIG_FILE` lookup.
    pub fn load_from(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        let config: Self = Self::figment(config_file)
            .extract()
            .map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// The layered provider stack behind [`AppConfig::load_from`].
    pub fn figment(config_file: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        let env_file = std::env::var_os("ASHA_CONFIG_FILE").map(PathBuf::from);
        if let Some(path) = config_file.map(Path::to_path_buf).or(env_file) {
            figment = figment.merge(Toml::file(path));
        }

        figment.merge(
            Env::prefixed("ASHA_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        )
    }
}
