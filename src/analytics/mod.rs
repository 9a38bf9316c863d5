//! Query analytics storage.
//!
//! The [`AnalyticsStore`] trait persists one [`SearchRecord`] per search
//! attempt, appends click events to it, and answers aggregate queries over
//! the stored history. Records are never deleted; after creation only clicks
//! are appended.
//!
//! # Operations
//!
//! | Method | Purpose |
//! |--------|---------|
//! | [`record_search`](AnalyticsStore::record_search) | Persist a search attempt |
//! | [`record_click`](AnalyticsStore::record_click) | Append a click to a record |
//! | [`get_record`](AnalyticsStore::get_record) | Fetch one record with its clicks |
//! | [`popular`](AnalyticsStore::popular) | Most frequent queries |
//! | [`history`](AnalyticsStore::history) | One caller's recent searches |
//! | [`trends`](AnalyticsStore::trends) | Daily query counts over a trailing window |
//! | [`platform_stats`](AnalyticsStore::platform_stats) | Per-platform yield over a trailing window |
//!
//! Queries are grouped by their normalized form (trimmed, lowercased,
//! whitespace collapsed).

pub mod memory;
pub mod sqlite;

pub use memory::InMemoryAnalyticsStore;
pub use sqlite::SqliteAnalyticsStore;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{Platform, SearchRecord};

/// A query and how often it was searched.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PopularQuery {
    pub query: String,
    pub count: i64,
    /// Mean pre-filter result count across those searches.
    pub avg_results: f64,
    pub last_searched: DateTime<Utc>,
}

/// Searches for one query on one UTC day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrendPoint {
    /// `YYYY-MM-DD`.
    pub day: String,
    pub query: String,
    pub count: i64,
}

/// Yield of one platform over a window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlatformStat {
    pub platform: Platform,
    /// Searches in which the platform returned at least one listing.
    pub searches: i64,
    pub total_courses: i64,
    pub avg_courses: f64,
}

#[async_trait]
pub trait AnalyticsStore: Send + Sync {
    /// Persist a search attempt, including any clicks already on it.
    async fn record_search(&self, record: &SearchRecord) -> Result<()>;

    /// Append a click with a server-assigned timestamp.
    ///
    /// Returns `false` when no record has that id.
    async fn record_click(&self, record_id: &str, listing_id: &str) -> Result<bool>;

    async fn get_record(&self, record_id: &str) -> Result<Option<SearchRecord>>;

    /// Most searched queries: count desc, then query asc.
    async fn popular(&self, limit: usize) -> Result<Vec<PopularQuery>>;

    /// A caller's searches, most recent first, with their clicks.
    async fn history(&self, caller_id: &str, limit: usize) -> Result<Vec<SearchRecord>>;

    /// Per-day, per-query counts over the trailing `days`: day asc, then
    /// count desc, then query asc.
    async fn trends(&self, days: u32) -> Result<Vec<TrendPoint>>;

    /// Per-platform yield over the trailing `days`, in canonical platform
    /// order. Platforms with no searches are omitted.
    async fn platform_stats(&self, days: u32) -> Result<Vec<PlatformStat>>;
}

/// Per-listing view counter, bumped on every tracked click.
#[async_trait]
pub trait ViewCounter: Send + Sync {
    /// Increment and return the new count.
    async fn increment(&self, listing_id: &str) -> Result<i64>;

    async fn views(&self, listing_id: &str) -> Result<i64>;
}

/// Start of a trailing window of `days` days ending now.
pub(crate) fn window_start(days: u32) -> DateTime<Utc> {
    Utc::now() - chrono::Duration::days(i64::from(days.max(1)))
}
