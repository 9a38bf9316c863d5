//! In-memory [`AnalyticsStore`] and [`ViewCounter`] for tests and embedding.
//!
//! Records live in a `Vec` behind `std::sync::RwLock`; aggregates are
//! computed by scanning it.

use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;

use super::{window_start, AnalyticsStore, PlatformStat, PopularQuery, TrendPoint, ViewCounter};
use crate::cache::normalize_query;
use crate::models::{ClickEvent, Platform, SearchRecord};

pub struct InMemoryAnalyticsStore {
    records: RwLock<Vec<SearchRecord>>,
    views: RwLock<HashMap<String, i64>>,
}

impl InMemoryAnalyticsStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            views: RwLock::new(HashMap::new()),
        }
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of all records in insertion order.
    pub fn records(&self) -> Result<Vec<SearchRecord>> {
        Ok(self.read()?.clone())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Vec<SearchRecord>>> {
        self.records
            .read()
            .map_err(|_| anyhow!("analytics store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Vec<SearchRecord>>> {
        self.records
            .write()
            .map_err(|_| anyhow!("analytics store lock poisoned"))
    }
}

impl Default for InMemoryAnalyticsStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AnalyticsStore for InMemoryAnalyticsStore {
    async fn record_search(&self, record: &SearchRecord) -> Result<()> {
        let mut records = self.write()?;
        if records.iter().any(|r| r.id == record.id) {
            anyhow::bail!("search record {} already exists", record.id);
        }
        records.push(record.clone());
        Ok(())
    }

    async fn record_click(&self, record_id: &str, listing_id: &str) -> Result<bool> {
        let mut records = self.write()?;
        match records.iter_mut().find(|r| r.id == record_id) {
            Some(record) => {
                record.clicks.push(ClickEvent {
                    listing_id: listing_id.to_string(),
                    clicked_at: Utc::now(),
                });
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn get_record(&self, record_id: &str) -> Result<Option<SearchRecord>> {
        Ok(self.read()?.iter().find(|r| r.id == record_id).cloned())
    }

    async fn popular(&self, limit: usize) -> Result<Vec<PopularQuery>> {
        let records = self.read()?;
        let mut groups: BTreeMap<String, (i64, i64, chrono::DateTime<Utc>)> = BTreeMap::new();
        for r in records.iter() {
            let entry = groups
                .entry(normalize_query(&r.query))
                .or_insert((0, 0, r.created_at));
            entry.0 += 1;
            entry.1 += r.results.total_found;
            entry.2 = entry.2.max(r.created_at);
        }

        let mut out: Vec<PopularQuery> = groups
            .into_iter()
            .map(|(query, (count, total, last))| PopularQuery {
                query,
                count,
                avg_results: total as f64 / count as f64,
                last_searched: last,
            })
            .collect();
        // BTreeMap iteration is query-ascending; a stable sort keeps it for ties.
        out.sort_by(|a, b| b.count.cmp(&a.count));
        out.truncate(limit);
        Ok(out)
    }

    async fn history(&self, caller_id: &str, limit: usize) -> Result<Vec<SearchRecord>> {
        let records = self.read()?;
        let mut out: Vec<SearchRecord> = records
            .iter()
            .filter(|r| r.caller_id.as_deref() == Some(caller_id))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        out.truncate(limit);
        Ok(out)
    }

    async fn trends(&self, days: u32) -> Result<Vec<TrendPoint>> {
        let since = window_start(days);
        let records = self.read()?;
        let mut counts: BTreeMap<(String, String), i64> = BTreeMap::new();
        for r in records.iter().filter(|r| r.created_at >= since) {
            let day = r.created_at.format("%Y-%m-%d").to_string();
            *counts.entry((day, normalize_query(&r.query))).or_insert(0) += 1;
        }

        let mut out: Vec<TrendPoint> = counts
            .into_iter()
            .map(|((day, query), count)| TrendPoint { day, query, count })
            .collect();
        out.sort_by(|a, b| a.day.cmp(&b.day).then(b.count.cmp(&a.count)));
        Ok(out)
    }

    async fn platform_stats(&self, days: u32) -> Result<Vec<PlatformStat>> {
        let since = window_start(days);
        let records = self.read()?;
        let mut out = Vec::new();
        for platform in Platform::ALL {
            let counts: Vec<i64> = records
                .iter()
                .filter(|r| r.created_at >= since)
                .filter_map(|r| {
                    r.results
                        .platforms
                        .iter()
                        .find(|pc| pc.platform == platform && pc.count > 0)
                        .map(|pc| pc.count)
                })
                .collect();
            if counts.is_empty() {
                continue;
            }
            let total: i64 = counts.iter().sum();
            out.push(PlatformStat {
                platform,
                searches: counts.len() as i64,
                total_courses: total,
                avg_courses: total as f64 / counts.len() as f64,
            });
        }
        Ok(out)
    }
}

#[async_trait]
impl ViewCounter for InMemoryAnalyticsStore {
    async fn increment(&self, listing_id: &str) -> Result<i64> {
        let mut views = self
            .views
            .write()
            .map_err(|_| anyhow!("view counter lock poisoned"))?;
        let n = views.entry(listing_id.to_string()).or_insert(0);
        *n += 1;
        Ok(*n)
    }

    async fn views(&self, listing_id: &str) -> Result<i64> {
        let views = self
            .views
            .read()
            .map_err(|_| anyhow!("view counter lock poisoned"))?;
        Ok(views.get(listing_id).copied().unwrap_or(0))
    }
}
