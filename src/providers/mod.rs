//! Platform providers.
//!
//! A [`PlatformProvider`] turns `(query, limit)` into a finite list of
//! normalized [`CourseListing`]s for one content source. The aggregator only
//! ever sees this trait, so API-based, scrape-based, and dataset-based
//! providers are interchangeable.
//!
//! # Built-in providers
//!
//! | Type | Source | Module |
//! |------|--------|--------|
//! | `edx` | edX course catalogue JSON API | [`edx`] |
//! | `gfg` | GeeksforGeeks course listing page | [`gfg`] |
//! | `swayam` | SWAYAM course listing page | [`swayam`] |
//! | `catalog` | Local JSON dataset | [`catalog`] |
//!
//! # Extraction contract
//!
//! Providers degrade to fewer results rather than failing when individual
//! items cannot be read. An item without a title or a resolvable link is
//! dropped; every other missing field becomes [`NOT_AVAILABLE`].

pub mod catalog;
pub mod edx;
pub mod gfg;
pub mod html;
pub mod swayam;

use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;
use url::Url;

use crate::config::Config;
use crate::models::{CourseListing, NOT_AVAILABLE};

/// One content source behind a stable search interface.
///
/// Implementations must be cheap to share across concurrent requests: the
/// aggregator holds a single long-lived instance per source.
///
/// # Example
///
/// ```rust
/// use anyhow::Result;
/// use async_trait::async_trait;
/// use course_scout::models::{CourseListing, Platform};
/// use course_scout::providers::PlatformProvider;
///
/// struct FixedProvider;
///
/// #[async_trait]
/// impl PlatformProvider for FixedProvider {
///     fn name(&self) -> &str { "fixed" }
///     fn description(&self) -> &str { "Always returns one course" }
///
///     async fn search(&self, _query: &str, _limit: usize) -> Result<Vec<CourseListing>> {
///         Ok(vec![CourseListing::new(Platform::Edx, "Intro", "https://example.com/intro")])
///     }
/// }
/// ```
#[async_trait]
pub trait PlatformProvider: Send + Sync {
    /// Instance name (e.g. `"edx"`, `"local"`).
    fn name(&self) -> &str;

    /// One-line description for `scout providers` and `GET /api/providers`.
    fn description(&self) -> &str;

    /// Provider type identifier. Custom providers default to `"custom"`.
    fn provider_type(&self) -> &str {
        "custom"
    }

    /// Label used in logs: `"{type}:{name}"`.
    fn label(&self) -> String {
        format!("{}:{}", self.provider_type(), self.name())
    }

    /// Return at most `limit` listings for `query`, in the source's own
    /// relevance order.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<CourseListing>>;
}

/// Ordered set of providers. Registration order is the concatenation order
/// of results and therefore the tie-break before ranking.
pub struct ProviderRegistry {
    providers: Vec<Box<dyn PlatformProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
        }
    }

    /// Build a registry with every enabled provider from the config, in the
    /// order edx, gfg, swayam, then catalogs by name.
    ///
    /// All network providers share one HTTP client.
    pub fn from_config(config: &Config) -> Result<Self> {
        use catalog::CatalogProvider;
        use edx::EdxProvider;
        use gfg::GfgProvider;
        use swayam::SwayamProvider;

        let client = http_client(&config.providers.user_agent)?;
        let mut registry = Self::new();

        if let Some(cfg) = config.providers.edx.as_ref().filter(|c| c.enabled) {
            registry.register(Box::new(EdxProvider::new(cfg, client.clone())?));
        }
        if let Some(cfg) = config.providers.gfg.as_ref().filter(|c| c.enabled) {
            registry.register(Box::new(GfgProvider::new(cfg, client.clone())?));
        }
        if let Some(cfg) = config.providers.swayam.as_ref().filter(|c| c.enabled) {
            registry.register(Box::new(SwayamProvider::new(cfg, client.clone())?));
        }
        for (name, cfg) in &config.providers.catalog {
            registry.register(Box::new(CatalogProvider::load(name.clone(), cfg)?));
        }

        Ok(registry)
    }

    pub fn register(&mut self, provider: Box<dyn PlatformProvider>) {
        self.providers.push(provider);
    }

    pub fn providers(&self) -> &[Box<dyn PlatformProvider>] {
        &self.providers
    }

    pub fn find(&self, name: &str) -> Option<&dyn PlatformProvider> {
        self.providers
            .iter()
            .find(|p| p.name() == name)
            .map(|p| p.as_ref())
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared HTTP client for network providers.
///
/// Only the connect phase is bounded here; the overall per-call deadline is
/// owned by the aggregator.
pub fn http_client(user_agent: &str) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(user_agent)
        .connect_timeout(Duration::from_secs(10))
        .build()?;
    Ok(client)
}

/// Fill a search URL template: `{query}` becomes the URL-encoded query and
/// `{limit}` the per-provider bound.
pub(crate) fn render_search_url(template: &str, query: &str, limit: usize) -> String {
    template
        .replace("{query}", &urlencoding::encode(query))
        .replace("{limit}", &limit.to_string())
}

/// Collapse runs of whitespace into single spaces and trim.
pub(crate) fn clean_text(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// A listing field: cleaned text, or [`NOT_AVAILABLE`] when absent or blank.
pub(crate) fn field_or_na(raw: Option<&str>) -> String {
    match raw.map(clean_text) {
        Some(s) if !s.is_empty() => s,
        _ => NOT_AVAILABLE.to_string(),
    }
}

/// Resolve `href` against `base`, accepting only http(s) results.
pub(crate) fn resolve_link(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
        return None;
    }
    let url = base.join(href).ok()?;
    match url.scheme() {
        "http" | "https" => Some(url.to_string()),
        _ => None,
    }
}
