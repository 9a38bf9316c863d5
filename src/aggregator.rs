//! Search aggregation pipeline.
//!
//! [`SearchAggregator::search`] runs one search end to end:
//!
//! ```text
//! validate ─► cache lookup ─┬─ hit ──────────────────────────────► response
//!                           └─ miss ─► enhance ─► fan out ─► summarize
//!                                      ─► dedup ─► filter ─► rank ─► cache put
//!                                      ─► record analytics ─► response
//! ```
//!
//! Every external collaborator call (enhancer, ranker, each provider) runs
//! under its own deadline through [`guarded`]. Those calls are best effort:
//! a failure or timeout degrades the result instead of failing the search.
//! Cache and analytics failures are caught at the outer boundary, where the
//! computed list is still returned and a failed attempt is recorded.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::analytics::{AnalyticsStore, ViewCounter};
use crate::cache::{cache_key, ResultCache};
use crate::config::SearchConfig;
use crate::enhancer::{PassthroughEnhancer, QueryEnhancer};
use crate::error::{guarded, SearchError};
use crate::filter::apply_filters;
use crate::models::{
    ClientMeta, CourseListing, ResultSummary, SearchRecord, SearchRequest, SearchResponse,
    MAX_LIMIT, MAX_QUERY_CHARS,
};
use crate::providers::ProviderRegistry;
use crate::ranker::{apply_ranking, PassthroughRanker, RelevanceRanker};

/// Per-collaborator deadlines.
#[derive(Debug, Clone, Copy)]
pub struct AggregatorSettings {
    pub provider_timeout: Duration,
    pub enhancer_timeout: Duration,
    pub ranker_timeout: Duration,
}

impl From<&SearchConfig> for AggregatorSettings {
    fn from(config: &SearchConfig) -> Self {
        Self {
            provider_timeout: config.provider_timeout(),
            enhancer_timeout: config.enhancer_timeout(),
            ranker_timeout: config.ranker_timeout(),
        }
    }
}

impl Default for AggregatorSettings {
    fn default() -> Self {
        Self::from(&SearchConfig::default())
    }
}

/// Outcome of [`SearchAggregator::track_click`].
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ClickReceipt {
    /// Whether the click was attached to a search record.
    pub recorded: bool,
    /// The listing's view count after this click, if the counter was reachable.
    pub views: Option<i64>,
}

/// Orchestrates providers, enhancer, ranker, cache and analytics.
///
/// Collaborators are long-lived and shared; all per-search state lives on
/// the stack of [`search`](Self::search).
pub struct SearchAggregator {
    providers: Arc<ProviderRegistry>,
    enhancer: Arc<dyn QueryEnhancer>,
    ranker: Arc<dyn RelevanceRanker>,
    cache: Arc<dyn ResultCache>,
    analytics: Arc<dyn AnalyticsStore>,
    views: Arc<dyn ViewCounter>,
    settings: AggregatorSettings,
}

impl SearchAggregator {
    /// An aggregator with a passthrough enhancer and ranker and default
    /// deadlines.
    pub fn new(
        providers: Arc<ProviderRegistry>,
        cache: Arc<dyn ResultCache>,
        analytics: Arc<dyn AnalyticsStore>,
        views: Arc<dyn ViewCounter>,
    ) -> Self {
        Self {
            providers,
            enhancer: Arc::new(PassthroughEnhancer),
            ranker: Arc::new(PassthroughRanker),
            cache,
            analytics,
            views,
            settings: AggregatorSettings::default(),
        }
    }

    pub fn with_enhancer(mut self, enhancer: Arc<dyn QueryEnhancer>) -> Self {
        self.enhancer = enhancer;
        self
    }

    pub fn with_ranker(mut self, ranker: Arc<dyn RelevanceRanker>) -> Self {
        self.ranker = ranker;
        self
    }

    pub fn with_settings(mut self, settings: AggregatorSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn providers(&self) -> &ProviderRegistry {
        &self.providers
    }

    pub fn analytics(&self) -> &Arc<dyn AnalyticsStore> {
        &self.analytics
    }

    /// Run one search.
    ///
    /// The only error is [`SearchError::InvalidQuery`]; rate limiting is
    /// applied by the caller before this point.
    pub async fn search(
        &self,
        request: &SearchRequest,
        client: &ClientMeta,
    ) -> Result<SearchResponse, SearchError> {
        let started = Instant::now();
        validate_request(request)?;

        let query = request.query.trim();
        let key = cache_key(query, &request.filters, request.limit);
        let mut record = SearchRecord::new(
            query,
            request.caller_id.clone(),
            request.filters.clone(),
            client.clone(),
        );
        let mut courses = Vec::new();

        let outcome = self
            .run(&key, query, request, &mut courses, &mut record.results)
            .await;
        let elapsed_ms = started.elapsed().as_millis() as i64;
        record.elapsed_ms = elapsed_ms;

        let record_id = match outcome {
            Ok(true) => {
                debug!(query, results = courses.len(), "served from cache");
                return Ok(SearchResponse {
                    record_id: None,
                    courses,
                    cached: true,
                    elapsed_ms,
                });
            }
            Ok(false) => match self.analytics.record_search(&record).await {
                Ok(()) => Some(record.id.clone()),
                Err(e) => self.record_failure(&mut record, &e).await,
            },
            Err(e) => self.record_failure(&mut record, &e).await,
        };

        info!(
            query,
            total_found = record.results.total_found,
            results = courses.len(),
            elapsed_ms,
            success = record.success,
            "search complete"
        );

        Ok(SearchResponse {
            record_id,
            courses,
            cached: false,
            elapsed_ms,
        })
    }

    /// The fenced part of a search. Returns `Ok(true)` on a cache hit.
    ///
    /// `courses` and `summary` are filled as soon as they are known so the
    /// caller keeps them if a later step fails.
    async fn run(
        &self,
        key: &str,
        query: &str,
        request: &SearchRequest,
        courses: &mut Vec<CourseListing>,
        summary: &mut ResultSummary,
    ) -> anyhow::Result<bool> {
        if let Some(hit) = self.cache.get(key).await? {
            *courses = hit;
            return Ok(true);
        }

        let enhanced = self.enhance(query).await;
        let raw = self.fan_out(&enhanced, request.limit).await;
        *summary = ResultSummary::from_listings(&raw);

        let filtered = apply_filters(dedup_by_link(raw), &request.filters);
        *courses = self.rank(query, filtered, request.limit).await;

        self.cache.put(key, courses).await?;
        Ok(false)
    }

    async fn record_failure(
        &self,
        record: &mut SearchRecord,
        error: &anyhow::Error,
    ) -> Option<String> {
        warn!(query = %record.query, error = %error, "search pipeline error");
        record.success = false;
        record.error = Some(error.to_string());
        match self.analytics.record_search(record).await {
            Ok(()) => Some(record.id.clone()),
            Err(e) => {
                warn!(error = %e, "failed to record unsuccessful search");
                None
            }
        }
    }

    async fn enhance(&self, query: &str) -> String {
        let outcome = guarded(
            "enhancer",
            self.settings.enhancer_timeout,
            self.enhancer.enhance(query),
        )
        .await;

        match outcome {
            Ok(text) if !text.trim().is_empty() => {
                let text = text.trim().to_string();
                if text != query {
                    debug!(original = query, enhanced = %text, "query enhanced");
                }
                text
            }
            Ok(_) => query.to_string(),
            Err(e) => {
                warn!(error = %e, timeout = e.is_timeout(), "query enhancement skipped");
                query.to_string()
            }
        }
    }

    /// Query every provider concurrently; failures contribute nothing.
    async fn fan_out(&self, query: &str, limit: usize) -> Vec<CourseListing> {
        let providers = self.providers.providers();
        if providers.is_empty() {
            return Vec::new();
        }

        let per_provider = limit.div_ceil(providers.len());
        let timeout = self.settings.provider_timeout;
        let calls = providers.iter().map(|p| async move {
            let label = p.label();
            let outcome = guarded(&label, timeout, p.search(query, per_provider)).await;
            (label, outcome)
        });

        let mut out = Vec::new();
        for (label, outcome) in join_all(calls).await {
            match outcome {
                Ok(items) => {
                    debug!(provider = %label, count = items.len(), "provider returned");
                    out.extend(items);
                }
                Err(e) => {
                    warn!(provider = %label, error = %e, timeout = e.is_timeout(), "provider contributed no results");
                }
            }
        }
        out
    }

    async fn rank(
        &self,
        query: &str,
        candidates: Vec<CourseListing>,
        limit: usize,
    ) -> Vec<CourseListing> {
        if candidates.is_empty() {
            return candidates;
        }

        let outcome = guarded(
            "ranker",
            self.settings.ranker_timeout,
            self.ranker.rank(query, &candidates, limit),
        )
        .await;

        let order = match outcome {
            Ok(order) => Some(order),
            Err(e) => {
                warn!(error = %e, timeout = e.is_timeout(), "ranking skipped");
                None
            }
        };
        apply_ranking(candidates, order.as_deref(), limit)
    }

    /// Record a click on `listing_id`, optionally tied to the search that
    /// produced it, and bump the listing's view counter.
    ///
    /// Storage failures are logged and reflected in the receipt.
    pub async fn track_click(
        &self,
        listing_id: &str,
        record_id: Option<&str>,
        caller_id: Option<&str>,
    ) -> Result<ClickReceipt, SearchError> {
        let listing_id = listing_id.trim();
        if listing_id.is_empty() {
            return Err(SearchError::InvalidQuery(
                "listing id must not be empty".to_string(),
            ));
        }

        let recorded = match record_id {
            Some(id) => match self.analytics.record_click(id, listing_id).await {
                Ok(found) => {
                    if !found {
                        debug!(record_id = id, "click for unknown search record");
                    }
                    found
                }
                Err(e) => {
                    warn!(record_id = id, error = %e, "failed to record click");
                    false
                }
            },
            None => false,
        };

        let views = match self.views.increment(listing_id).await {
            Ok(n) => Some(n),
            Err(e) => {
                warn!(listing_id, error = %e, "failed to increment view count");
                None
            }
        };

        debug!(listing_id, caller = caller_id.unwrap_or("anonymous"), recorded, "click tracked");
        Ok(ClickReceipt { recorded, views })
    }
}

/// Reject malformed requests before any external call.
pub fn validate_request(request: &SearchRequest) -> Result<(), SearchError> {
    let query = request.query.trim();
    if query.is_empty() {
        return Err(SearchError::InvalidQuery(
            "query must not be empty".to_string(),
        ));
    }
    if query.chars().count() > MAX_QUERY_CHARS {
        return Err(SearchError::InvalidQuery(format!(
            "query must be at most {} characters",
            MAX_QUERY_CHARS
        )));
    }
    if request.limit == 0 || request.limit > MAX_LIMIT {
        return Err(SearchError::InvalidQuery(format!(
            "limit must be between 1 and {}",
            MAX_LIMIT
        )));
    }
    if let Some(price) = request.filters.max_price {
        if !price.is_finite() || price < 0.0 {
            return Err(SearchError::InvalidQuery(
                "max_price must be a non-negative number".to_string(),
            ));
        }
    }
    if request.filters.max_duration_hours == Some(0) {
        return Err(SearchError::InvalidQuery(
            "max_duration_hours must be at least 1".to_string(),
        ));
    }
    Ok(())
}

/// Keep the first listing for each link.
fn dedup_by_link(listings: Vec<CourseListing>) -> Vec<CourseListing> {
    let mut seen = HashSet::new();
    listings
        .into_iter()
        .filter(|l| seen.insert(l.link.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::InMemoryAnalyticsStore;
    use crate::cache::InMemoryResultCache;
    use crate::models::{Platform, SearchFilters};
    use crate::providers::PlatformProvider;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct MockProvider {
        name: &'static str,
        platform: Platform,
        count: usize,
        fail: bool,
        delay: Option<Duration>,
        calls: Arc<AtomicUsize>,
        queries: Arc<Mutex<Vec<String>>>,
    }

    impl MockProvider {
        fn new(name: &'static str, platform: Platform, count: usize) -> Self {
            Self {
                name,
                platform,
                count,
                fail: false,
                delay: None,
                calls: Arc::new(AtomicUsize::new(0)),
                queries: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn failing(mut self) -> Self {
            self.fail = true;
            self
        }

        fn slow(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }
    }

    #[async_trait]
    impl PlatformProvider for MockProvider {
        fn name(&self) -> &str {
            self.name
        }

        fn description(&self) -> &str {
            "mock"
        }

        async fn search(&self, query: &str, _limit: usize) -> Result<Vec<CourseListing>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.queries.lock().unwrap().push(query.to_string());
            if let Some(d) = self.delay {
                tokio::time::sleep(d).await;
            }
            if self.fail {
                anyhow::bail!("{} unavailable", self.name);
            }
            Ok((0..self.count)
                .map(|i| {
                    CourseListing::new(
                        self.platform,
                        format!("{} {} #{}", self.name, query, i),
                        format!("https://{}.example/{}", self.name, i),
                    )
                })
                .collect())
        }
    }

    struct CountingRanker {
        calls: Arc<AtomicUsize>,
        order: Vec<usize>,
        delay: Option<Duration>,
    }

    #[async_trait]
    impl RelevanceRanker for CountingRanker {
        fn name(&self) -> &str {
            "counting"
        }

        async fn rank(&self, _: &str, _: &[CourseListing], _: usize) -> Result<Vec<usize>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(d) = self.delay {
                tokio::time::sleep(d).await;
            }
            Ok(self.order.clone())
        }
    }

    enum ScriptedEnhancer {
        Rewrite(&'static str),
        Fail,
        Stall,
    }

    #[async_trait]
    impl QueryEnhancer for ScriptedEnhancer {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn enhance(&self, _: &str) -> Result<String> {
            match self {
                ScriptedEnhancer::Rewrite(text) => Ok(text.to_string()),
                ScriptedEnhancer::Fail => anyhow::bail!("model unavailable"),
                ScriptedEnhancer::Stall => {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok("too late".to_string())
                }
            }
        }
    }

    #[derive(Default)]
    struct RecordingRanker {
        queries: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl RelevanceRanker for RecordingRanker {
        fn name(&self) -> &str {
            "recording"
        }

        async fn rank(&self, query: &str, _: &[CourseListing], _: usize) -> Result<Vec<usize>> {
            self.queries.lock().unwrap().push(query.to_string());
            Ok(Vec::new())
        }
    }

    struct BrokenAnalytics;

    #[async_trait]
    impl AnalyticsStore for BrokenAnalytics {
        async fn record_search(&self, _: &SearchRecord) -> Result<()> {
            anyhow::bail!("disk full")
        }
        async fn record_click(&self, _: &str, _: &str) -> Result<bool> {
            anyhow::bail!("disk full")
        }
        async fn get_record(&self, _: &str) -> Result<Option<SearchRecord>> {
            Ok(None)
        }
        async fn popular(&self, _: usize) -> Result<Vec<crate::analytics::PopularQuery>> {
            Ok(Vec::new())
        }
        async fn history(&self, _: &str, _: usize) -> Result<Vec<SearchRecord>> {
            Ok(Vec::new())
        }
        async fn trends(&self, _: u32) -> Result<Vec<crate::analytics::TrendPoint>> {
            Ok(Vec::new())
        }
        async fn platform_stats(&self, _: u32) -> Result<Vec<crate::analytics::PlatformStat>> {
            Ok(Vec::new())
        }
    }

    struct BrokenCache;

    #[async_trait]
    impl ResultCache for BrokenCache {
        async fn get(&self, _: &str) -> Result<Option<Vec<CourseListing>>> {
            Ok(None)
        }
        async fn put(&self, _: &str, _: &[CourseListing]) -> Result<()> {
            anyhow::bail!("cache offline")
        }
    }

    fn registry(providers: Vec<MockProvider>) -> Arc<ProviderRegistry> {
        let mut r = ProviderRegistry::new();
        for p in providers {
            r.register(Box::new(p));
        }
        Arc::new(r)
    }

    fn aggregator(
        providers: Vec<MockProvider>,
        store: Arc<InMemoryAnalyticsStore>,
    ) -> SearchAggregator {
        SearchAggregator::new(
            registry(providers),
            Arc::new(InMemoryResultCache::new(Duration::from_secs(60))),
            store.clone(),
            store,
        )
    }

    fn request(query: &str, limit: usize) -> SearchRequest {
        SearchRequest {
            limit,
            ..SearchRequest::new(query)
        }
    }

    fn links(resp: &SearchResponse) -> Vec<String> {
        resp.courses.iter().map(|c| c.link.clone()).collect()
    }

    #[tokio::test]
    async fn test_blank_query_is_rejected_without_provider_calls() {
        let p = MockProvider::new("edx", Platform::Edx, 3);
        let calls = p.calls.clone();
        let store = Arc::new(InMemoryAnalyticsStore::new());
        let agg = aggregator(vec![p], store.clone());

        let err = agg
            .search(&request("   ", 5), &ClientMeta::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::InvalidQuery(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(store.is_empty());
    }

    #[test]
    fn test_validation_bounds() {
        assert!(validate_request(&request("rust", 0)).is_err());
        assert!(validate_request(&request("rust", 21)).is_err());
        assert!(validate_request(&request("rust", 20)).is_ok());
        assert!(validate_request(&request(&"x".repeat(201), 5)).is_err());
        assert!(validate_request(&request(&"x".repeat(200), 5)).is_ok());

        let mut negative = request("rust", 5);
        negative.filters.max_price = Some(-1.0);
        assert!(validate_request(&negative).is_err());

        let mut zero_hours = request("rust", 5);
        zero_hours.filters.max_duration_hours = Some(0);
        assert!(validate_request(&zero_hours).is_err());
    }

    #[tokio::test]
    async fn test_yield_accounting_is_pre_filter() {
        let store = Arc::new(InMemoryAnalyticsStore::new());
        let agg = aggregator(
            vec![
                MockProvider::new("edx", Platform::Edx, 2),
                MockProvider::new("gfg", Platform::Gfg, 1),
                MockProvider::new("swayam", Platform::Swayam, 3),
            ],
            store.clone(),
        );

        let resp = agg
            .search(&request("machine learning", 5), &ClientMeta::default())
            .await
            .unwrap();
        assert!(resp.courses.len() <= 5);
        assert!(!resp.cached);

        let record = store
            .get_record(resp.record_id.as_deref().unwrap())
            .await
            .unwrap()
            .unwrap();
        assert!(record.success);
        assert_eq!(record.results.total_found, 6);
        let sum: i64 = record.results.platforms.iter().map(|p| p.count).sum();
        assert_eq!(sum, 6);
    }

    #[tokio::test]
    async fn test_one_failing_provider_matches_survivors_alone() {
        let with_failure = aggregator(
            vec![
                MockProvider::new("edx", Platform::Edx, 2),
                MockProvider::new("gfg", Platform::Gfg, 2).failing(),
                MockProvider::new("swayam", Platform::Swayam, 2),
            ],
            Arc::new(InMemoryAnalyticsStore::new()),
        );
        let survivors = aggregator(
            vec![
                MockProvider::new("edx", Platform::Edx, 2),
                MockProvider::new("swayam", Platform::Swayam, 2),
            ],
            Arc::new(InMemoryAnalyticsStore::new()),
        );

        let a = with_failure
            .search(&request("rust", 20), &ClientMeta::default())
            .await
            .unwrap();
        let b = survivors
            .search(&request("rust", 20), &ClientMeta::default())
            .await
            .unwrap();
        assert_eq!(links(&a), links(&b));
        assert_eq!(a.courses.len(), 4);
    }

    #[tokio::test]
    async fn test_all_providers_failing_is_an_empty_success() {
        let store = Arc::new(InMemoryAnalyticsStore::new());
        let agg = aggregator(
            vec![
                MockProvider::new("edx", Platform::Edx, 2).failing(),
                MockProvider::new("gfg", Platform::Gfg, 2).failing(),
            ],
            store.clone(),
        );
        let resp = agg
            .search(&request("rust", 5), &ClientMeta::default())
            .await
            .unwrap();
        assert!(resp.courses.is_empty());
        let record = store.records().unwrap().remove(0);
        assert!(record.success);
        assert_eq!(record.results.total_found, 0);
    }

    #[tokio::test]
    async fn test_slow_provider_is_dropped() {
        let agg = aggregator(
            vec![
                MockProvider::new("edx", Platform::Edx, 2),
                MockProvider::new("gfg", Platform::Gfg, 2).slow(Duration::from_secs(5)),
            ],
            Arc::new(InMemoryAnalyticsStore::new()),
        )
        .with_settings(AggregatorSettings {
            provider_timeout: Duration::from_millis(50),
            ..AggregatorSettings::default()
        });

        let resp = agg
            .search(&request("rust", 10), &ClientMeta::default())
            .await
            .unwrap();
        assert_eq!(resp.courses.len(), 2);
        assert!(resp.courses.iter().all(|c| c.platform == Platform::Edx));
    }

    #[tokio::test]
    async fn test_second_identical_search_hits_cache() {
        let p = MockProvider::new("edx", Platform::Edx, 3);
        let provider_calls = p.calls.clone();
        let ranker_calls = Arc::new(AtomicUsize::new(0));
        let store = Arc::new(InMemoryAnalyticsStore::new());
        let agg = aggregator(vec![p], store.clone()).with_ranker(Arc::new(CountingRanker {
            calls: ranker_calls.clone(),
            order: vec![2, 0, 1],
            delay: None,
        }));

        let first = agg
            .search(&request("Rust", 3), &ClientMeta::default())
            .await
            .unwrap();
        let second = agg
            .search(&request("  rust ", 3), &ClientMeta::default())
            .await
            .unwrap();

        assert_eq!(links(&first), links(&second));
        assert!(second.cached);
        assert!(second.record_id.is_none());
        assert_eq!(provider_calls.load(Ordering::SeqCst), 1);
        assert_eq!(ranker_calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.len(), 1);
        assert_eq!(first.courses[0].link, "https://edx.example/2");
    }

    #[tokio::test]
    async fn test_ranker_timeout_keeps_concatenation_order() {
        let agg = aggregator(
            vec![
                MockProvider::new("edx", Platform::Edx, 2),
                MockProvider::new("gfg", Platform::Gfg, 2),
            ],
            Arc::new(InMemoryAnalyticsStore::new()),
        )
        .with_ranker(Arc::new(CountingRanker {
            calls: Arc::new(AtomicUsize::new(0)),
            order: vec![3, 2, 1, 0],
            delay: Some(Duration::from_secs(5)),
        }))
        .with_settings(AggregatorSettings {
            ranker_timeout: Duration::from_millis(50),
            ..AggregatorSettings::default()
        });

        let resp = agg
            .search(&request("rust", 3), &ClientMeta::default())
            .await
            .unwrap();
        assert_eq!(
            links(&resp),
            vec![
                "https://edx.example/0",
                "https://edx.example/1",
                "https://gfg.example/0",
            ]
        );
    }

    #[tokio::test]
    async fn test_ranker_not_called_for_empty_candidates() {
        let ranker_calls = Arc::new(AtomicUsize::new(0));
        let agg = aggregator(
            vec![MockProvider::new("edx", Platform::Edx, 2)],
            Arc::new(InMemoryAnalyticsStore::new()),
        )
        .with_ranker(Arc::new(CountingRanker {
            calls: ranker_calls.clone(),
            order: vec![],
            delay: None,
        }));

        let mut req = request("rust", 5);
        req.filters = SearchFilters {
            platforms: [Platform::Swayam].into_iter().collect(),
            ..Default::default()
        };
        let resp = agg.search(&req, &ClientMeta::default()).await.unwrap();
        assert!(resp.courses.is_empty());
        assert_eq!(ranker_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_duplicate_links_collapse_after_accounting() {
        let store = Arc::new(InMemoryAnalyticsStore::new());
        let agg = aggregator(
            vec![
                MockProvider::new("dup", Platform::Edx, 2),
                MockProvider::new("dup", Platform::Gfg, 2),
            ],
            store.clone(),
        );
        let resp = agg
            .search(&request("rust", 10), &ClientMeta::default())
            .await
            .unwrap();
        assert_eq!(resp.courses.len(), 2);
        assert!(resp.courses.iter().all(|c| c.platform == Platform::Edx));
        assert_eq!(store.records().unwrap()[0].results.total_found, 4);
    }

    #[tokio::test]
    async fn test_cache_failure_still_returns_results_and_records_failure() {
        let store = Arc::new(InMemoryAnalyticsStore::new());
        let agg = SearchAggregator::new(
            registry(vec![MockProvider::new("edx", Platform::Edx, 2)]),
            Arc::new(BrokenCache),
            store.clone(),
            store.clone(),
        );
        let resp = agg
            .search(&request("rust", 5), &ClientMeta::default())
            .await
            .unwrap();
        assert_eq!(resp.courses.len(), 2);
        let record = store.records().unwrap().remove(0);
        assert!(!record.success);
        assert!(record.error.unwrap().contains("cache offline"));
    }

    #[tokio::test]
    async fn test_analytics_failure_is_swallowed() {
        let views = Arc::new(InMemoryAnalyticsStore::new());
        let agg = SearchAggregator::new(
            registry(vec![MockProvider::new("edx", Platform::Edx, 2)]),
            Arc::new(InMemoryResultCache::new(Duration::from_secs(60))),
            Arc::new(BrokenAnalytics),
            views,
        );
        let resp = agg
            .search(&request("rust", 5), &ClientMeta::default())
            .await
            .unwrap();
        assert_eq!(resp.courses.len(), 2);
        assert!(resp.record_id.is_none());
    }

    #[tokio::test]
    async fn test_track_click() {
        let store = Arc::new(InMemoryAnalyticsStore::new());
        let agg = aggregator(vec![MockProvider::new("edx", Platform::Edx, 1)], store.clone());
        let resp = agg
            .search(&request("rust", 5), &ClientMeta::default())
            .await
            .unwrap();
        let record_id = resp.record_id.unwrap();
        let link = resp.courses[0].link.clone();

        let receipt = agg
            .track_click(&link, Some(&record_id), Some("alice"))
            .await
            .unwrap();
        assert_eq!(
            receipt,
            ClickReceipt {
                recorded: true,
                views: Some(1)
            }
        );

        let unknown = agg.track_click(&link, Some("nope"), None).await.unwrap();
        assert!(!unknown.recorded);
        assert_eq!(unknown.views, Some(2));

        assert!(agg.track_click("  ", None, None).await.is_err());
        let record = store.get_record(&record_id).await.unwrap().unwrap();
        assert_eq!(record.clicks.len(), 1);
        assert_eq!(record.clicks[0].listing_id, link);
    }

    #[tokio::test]
    async fn test_providers_get_enhanced_query_and_ranker_gets_original() {
        let p = MockProvider::new("edx", Platform::Edx, 2);
        let provider_queries = p.queries.clone();
        let ranker = RecordingRanker::default();
        let ranker_queries = ranker.queries.clone();

        let agg = aggregator(vec![p], Arc::new(InMemoryAnalyticsStore::new()))
            .with_enhancer(Arc::new(ScriptedEnhancer::Rewrite("  machine learning  ")))
            .with_ranker(Arc::new(ranker));

        let resp = agg
            .search(&request("  ml ", 5), &ClientMeta::default())
            .await
            .unwrap();
        assert_eq!(resp.courses.len(), 2);
        assert_eq!(*provider_queries.lock().unwrap(), vec!["machine learning"]);
        assert_eq!(*ranker_queries.lock().unwrap(), vec!["ml"]);
    }

    #[tokio::test]
    async fn test_enhancer_failure_or_timeout_uses_original_query() {
        for enhancer in [
            ScriptedEnhancer::Fail,
            ScriptedEnhancer::Stall,
            ScriptedEnhancer::Rewrite("   "),
        ] {
            let p = MockProvider::new("edx", Platform::Edx, 1);
            let provider_queries = p.queries.clone();
            let agg = aggregator(vec![p], Arc::new(InMemoryAnalyticsStore::new()))
                .with_enhancer(Arc::new(enhancer))
                .with_settings(AggregatorSettings {
                    enhancer_timeout: Duration::from_millis(50),
                    ..AggregatorSettings::default()
                });

            let started = Instant::now();
            let resp = agg
                .search(&request(" rust ", 5), &ClientMeta::default())
                .await
                .unwrap();
            assert_eq!(resp.courses.len(), 1);
            assert_eq!(*provider_queries.lock().unwrap(), vec!["rust"]);
            assert!(started.elapsed() < Duration::from_secs(2));
        }
    }

    #[tokio::test]
    async fn test_providers_are_queried_concurrently() {
        let delay = Duration::from_millis(200);
        let agg = aggregator(
            vec![
                MockProvider::new("edx", Platform::Edx, 1).slow(delay),
                MockProvider::new("gfg", Platform::Gfg, 1).slow(delay),
                MockProvider::new("swayam", Platform::Swayam, 1).slow(delay),
            ],
            Arc::new(InMemoryAnalyticsStore::new()),
        );

        let started = Instant::now();
        let resp = agg
            .search(&request("rust", 6), &ClientMeta::default())
            .await
            .unwrap();
        assert_eq!(resp.courses.len(), 3);
        assert!(started.elapsed() < Duration::from_millis(450));
    }
}
