//! Result cache.
//!
//! Caches the final, ranked and size-capped listing set of a search under a
//! key derived from the normalized query, the canonical filters, and the
//! limit. Entries expire lazily: staleness is checked when an entry is read,
//! and there is no background sweep. Writes always replace.

use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::time::{Duration, Instant};

use crate::models::{CourseListing, SearchFilters};

/// Storage for ranked search results.
///
/// Async and fallible so that shared backends can implement it; the
/// aggregator treats a failing cache as an unfenced pipeline error.
#[async_trait]
pub trait ResultCache: Send + Sync {
    /// Return the cached list for `key` if present and not expired.
    async fn get(&self, key: &str) -> Result<Option<Vec<CourseListing>>>;

    /// Store `courses` under `key`, replacing any prior entry.
    async fn put(&self, key: &str, courses: &[CourseListing]) -> Result<()>;
}

struct CacheEntry {
    courses: Vec<CourseListing>,
    stored_at: Instant,
}

/// In-process cache backed by a concurrent map.
///
/// Concurrent writers to the same key resolve last-write-wins.
pub struct InMemoryResultCache {
    entries: DashMap<String, CacheEntry>,
    ttl: Duration,
}

impl InMemoryResultCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Number of stored entries, including expired ones not yet read.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}

#[async_trait]
impl ResultCache for InMemoryResultCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<CourseListing>>> {
        match self.entries.get(key) {
            Some(entry) if entry.stored_at.elapsed() < self.ttl => {
                return Ok(Some(entry.courses.clone()));
            }
            Some(_) => {}
            None => return Ok(None),
        }

        // Stale. Re-check under the shard lock so a concurrent put survives.
        self.entries
            .remove_if(key, |_, entry| entry.stored_at.elapsed() >= self.ttl);
        Ok(None)
    }

    async fn put(&self, key: &str, courses: &[CourseListing]) -> Result<()> {
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                courses: courses.to_vec(),
                stored_at: Instant::now(),
            },
        );
        Ok(())
    }
}

/// Normalize a query for cache keying and analytics grouping: trimmed,
/// lowercased, internal whitespace collapsed to single spaces.
pub fn normalize_query(query: &str) -> String {
    query
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Deterministic cache key for a `(query, filters, limit)` tuple.
///
/// SHA-256 over the normalized query, the canonical JSON form of the filters
/// (platforms are an ordered set), and the limit.
pub fn cache_key(query: &str, filters: &SearchFilters, limit: usize) -> String {
    let filters_json = serde_json::to_string(filters).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(normalize_query(query).as_bytes());
    hasher.update([0u8]);
    hasher.update(filters_json.as_bytes());
    hasher.update([0u8]);
    hasher.update(limit.to_string().as_bytes());
    hex::encode(hasher.finalize())
}
