//! TOML configuration parsing and validation.
//!
//! Every section except `[db]` and `[server]` is optional and falls back to
//! defaults suited to a single-node deployment.
//!
//! ```toml
//! [db]
//! path = "./data/scout.sqlite"
//!
//! [search]
//! default_limit = 7
//! cache_ttl_secs = 3600
//!
//! [ranker]
//! provider = "keyword"
//!
//! [server]
//! bind = "127.0.0.1:7340"
//!
//! [providers.edx]
//! enabled = true
//!
//! [providers.catalog.local]
//! path = "./data/courses.json"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::models::MAX_LIMIT;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub enhancer: AssistConfig,
    #[serde(default = "default_ranker")]
    pub ranker: AssistConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    pub server: ServerConfig,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_limit")]
    pub default_limit: usize,
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_provider_timeout_ms")]
    pub provider_timeout_ms: u64,
    #[serde(default = "default_enhancer_timeout_ms")]
    pub enhancer_timeout_ms: u64,
    #[serde(default = "default_ranker_timeout_ms")]
    pub ranker_timeout_ms: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            cache_ttl_secs: default_cache_ttl_secs(),
            provider_timeout_ms: default_provider_timeout_ms(),
            enhancer_timeout_ms: default_enhancer_timeout_ms(),
            ranker_timeout_ms: default_ranker_timeout_ms(),
        }
    }
}

impl SearchConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
    pub fn provider_timeout(&self) -> Duration {
        Duration::from_millis(self.provider_timeout_ms)
    }
    pub fn enhancer_timeout(&self) -> Duration {
        Duration::from_millis(self.enhancer_timeout_ms)
    }
    pub fn ranker_timeout(&self) -> Duration {
        Duration::from_millis(self.ranker_timeout_ms)
    }
}

fn default_limit() -> usize {
    crate::models::DEFAULT_LIMIT
}
fn default_cache_ttl_secs() -> u64 {
    3600
}
fn default_provider_timeout_ms() -> u64 {
    15_000
}
fn default_enhancer_timeout_ms() -> u64 {
    3_000
}
fn default_ranker_timeout_ms() -> u64 {
    5_000
}

/// Settings for a best-effort chat-backed collaborator (query enhancer or
/// relevance ranker).
///
/// `provider` selects the implementation: `"disabled"`, `"keyword"` (ranker
/// only), `"openai"`, or `"ollama"`.
#[derive(Debug, Deserialize, Clone)]
pub struct AssistConfig {
    #[serde(default = "default_assist_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    /// Base URL override (OpenAI-compatible gateway or Ollama host).
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for AssistConfig {
    fn default() -> Self {
        Self {
            provider: default_assist_provider(),
            model: None,
            url: None,
        }
    }
}

impl AssistConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_assist_provider() -> String {
    "disabled".to_string()
}

fn default_ranker() -> AssistConfig {
    AssistConfig {
        provider: "keyword".to_string(),
        model: None,
        url: None,
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RateLimitConfig {
    #[serde(default = "default_burst_max")]
    pub burst_max: u32,
    #[serde(default = "default_burst_window_secs")]
    pub burst_window_secs: u64,
    #[serde(default = "default_sustained_window_secs")]
    pub sustained_window_secs: u64,
    #[serde(default = "default_sustained_max_anonymous")]
    pub sustained_max_anonymous: u32,
    #[serde(default = "default_sustained_max_authenticated")]
    pub sustained_max_authenticated: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            burst_max: default_burst_max(),
            burst_window_secs: default_burst_window_secs(),
            sustained_window_secs: default_sustained_window_secs(),
            sustained_max_anonymous: default_sustained_max_anonymous(),
            sustained_max_authenticated: default_sustained_max_authenticated(),
        }
    }
}

fn default_burst_max() -> u32 {
    20
}
fn default_burst_window_secs() -> u64 {
    60
}
fn default_sustained_window_secs() -> u64 {
    900
}
fn default_sustained_max_anonymous() -> u32 {
    100
}
fn default_sustained_max_authenticated() -> u32 {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub edx: Option<WebProviderConfig>,
    #[serde(default)]
    pub gfg: Option<WebProviderConfig>,
    #[serde(default)]
    pub swayam: Option<WebProviderConfig>,
    /// Named static-catalog providers, registered in name order.
    #[serde(default)]
    pub catalog: BTreeMap<String, CatalogProviderConfig>,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            edx: None,
            gfg: None,
            swayam: None,
            catalog: BTreeMap::new(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_user_agent() -> String {
    format!("course-scout/{}", env!("CARGO_PKG_VERSION"))
}

/// A network-backed platform provider.
///
/// `search_url` may contain a `{query}` placeholder, replaced with the
/// URL-encoded query; `{limit}` is replaced with the per-provider bound.
#[derive(Debug, Deserialize, Clone)]
pub struct WebProviderConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub search_url: Option<String>,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct CatalogProviderConfig {
    pub path: PathBuf,
}

impl Config {
    /// A config with defaults for everything, used by tests and embedders.
    pub fn minimal(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db: DbConfig {
                path: db_path.into(),
            },
            search: SearchConfig::default(),
            enhancer: AssistConfig::default(),
            ranker: default_ranker(),
            rate_limit: RateLimitConfig::default(),
            server: ServerConfig {
                bind: "127.0.0.1:7340".to_string(),
            },
            log: LogConfig::default(),
            providers: ProvidersConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.search.default_limit == 0 || config.search.default_limit > MAX_LIMIT {
        anyhow::bail!("search.default_limit must be between 1 and {}", MAX_LIMIT);
    }

    if config.search.provider_timeout_ms == 0
        || config.search.enhancer_timeout_ms == 0
        || config.search.ranker_timeout_ms == 0
    {
        anyhow::bail!("search timeouts must be > 0");
    }

    if config.rate_limit.burst_max == 0 || config.rate_limit.burst_window_secs == 0 {
        anyhow::bail!("rate_limit.burst_max and rate_limit.burst_window_secs must be > 0");
    }
    if config.rate_limit.sustained_window_secs == 0 {
        anyhow::bail!("rate_limit.sustained_window_secs must be > 0");
    }

    match config.enhancer.provider.as_str() {
        "disabled" | "openai" | "ollama" => {}
        other => anyhow::bail!(
            "Unknown enhancer provider: '{}'. Must be disabled, openai, or ollama.",
            other
        ),
    }

    match config.ranker.provider.as_str() {
        "disabled" | "keyword" | "openai" | "ollama" => {}
        other => anyhow::bail!(
            "Unknown ranker provider: '{}'. Must be disabled, keyword, openai, or ollama.",
            other
        ),
    }

    for (label, assist) in [("enhancer", &config.enhancer), ("ranker", &config.ranker)] {
        if matches!(assist.provider.as_str(), "openai" | "ollama") && assist.model.is_none() {
            anyhow::bail!(
                "{}.model must be specified when provider is '{}'",
                label,
                assist.provider
            );
        }
    }

    Ok(())
}
