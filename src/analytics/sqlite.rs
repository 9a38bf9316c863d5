//! SQLite-backed [`AnalyticsStore`] and [`ViewCounter`].
//!
//! Schema (see [`crate::migrate`]):
//!
//! - `search_records`: one row per search attempt, timestamps in unix
//!   milliseconds, plus the normalized query used for grouping.
//! - `search_platform_counts`: pre-filter yield per platform.
//! - `search_clicks`: click events appended to a record.
//! - `course_views`: per-listing view counters.

use std::str::FromStr;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use super::{window_start, AnalyticsStore, PlatformStat, PopularQuery, TrendPoint, ViewCounter};
use crate::cache::normalize_query;
use crate::models::{
    ClickEvent, ClientMeta, Platform, PlatformCount, ResultSummary, SearchFilters, SearchRecord,
};

pub struct SqliteAnalyticsStore {
    pool: SqlitePool,
}

impl SqliteAnalyticsStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn load_details(&self, mut record: SearchRecord) -> Result<SearchRecord> {
        let counts = sqlx::query(
            "SELECT platform, count FROM search_platform_counts WHERE search_id = ?",
        )
        .bind(&record.id)
        .fetch_all(&self.pool)
        .await?;

        let mut platforms: Vec<PlatformCount> = counts
            .iter()
            .filter_map(|row| {
                let name: String = row.get("platform");
                Platform::from_str(&name).ok().map(|platform| PlatformCount {
                    platform,
                    count: row.get("count"),
                })
            })
            .collect();
        platforms.sort_by_key(|pc| pc.platform);
        record.results.platforms = platforms;

        let clicks = sqlx::query(
            "SELECT listing_id, clicked_at FROM search_clicks WHERE search_id = ? ORDER BY id",
        )
        .bind(&record.id)
        .fetch_all(&self.pool)
        .await?;

        record.clicks = clicks
            .iter()
            .map(|row| ClickEvent {
                listing_id: row.get("listing_id"),
                clicked_at: from_millis(row.get("clicked_at")),
            })
            .collect();

        Ok(record)
    }
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

fn record_from_row(row: &SqliteRow) -> SearchRecord {
    let filters_json: String = row.get("filters_json");
    let filters: SearchFilters = serde_json::from_str(&filters_json).unwrap_or_default();

    SearchRecord {
        id: row.get("id"),
        query: row.get("query"),
        caller_id: row.get("caller_id"),
        filters,
        results: ResultSummary {
            total_found: row.get("total_found"),
            platforms: Vec::new(),
        },
        client: ClientMeta {
            user_agent: row.get("user_agent"),
            ip: row.get("ip"),
        },
        elapsed_ms: row.get("elapsed_ms"),
        success: row.get("success"),
        error: row.get("error"),
        clicks: Vec::new(),
        created_at: from_millis(row.get("created_at")),
    }
}

const RECORD_COLUMNS: &str = "id, query, caller_id, filters_json, total_found, user_agent, ip, \
                              elapsed_ms, success, error, created_at";

#[async_trait]
impl AnalyticsStore for SqliteAnalyticsStore {
    async fn record_search(&self, record: &SearchRecord) -> Result<()> {
        let filters_json = serde_json::to_string(&record.filters)?;
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO search_records (id, query, query_norm, caller_id, filters_json,
                                        total_found, user_agent, ip, elapsed_ms,
                                        success, error, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(&record.query)
        .bind(normalize_query(&record.query))
        .bind(&record.caller_id)
        .bind(&filters_json)
        .bind(record.results.total_found)
        .bind(&record.client.user_agent)
        .bind(&record.client.ip)
        .bind(record.elapsed_ms)
        .bind(record.success)
        .bind(&record.error)
        .bind(record.created_at.timestamp_millis())
        .execute(&mut *tx)
        .await?;

        for pc in &record.results.platforms {
            sqlx::query(
                "INSERT INTO search_platform_counts (search_id, platform, count) VALUES (?, ?, ?)",
            )
            .bind(&record.id)
            .bind(pc.platform.as_str())
            .bind(pc.count)
            .execute(&mut *tx)
            .await?;
        }

        for click in &record.clicks {
            sqlx::query(
                "INSERT INTO search_clicks (search_id, listing_id, clicked_at) VALUES (?, ?, ?)",
            )
            .bind(&record.id)
            .bind(&click.listing_id)
            .bind(click.clicked_at.timestamp_millis())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn record_click(&self, record_id: &str, listing_id: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO search_clicks (search_id, listing_id, clicked_at)
            SELECT id, ?, ? FROM search_records WHERE id = ?
            "#,
        )
        .bind(listing_id)
        .bind(Utc::now().timestamp_millis())
        .bind(record_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn get_record(&self, record_id: &str) -> Result<Option<SearchRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM search_records WHERE id = ?",
            RECORD_COLUMNS
        ))
        .bind(record_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.load_details(record_from_row(&row)).await?)),
            None => Ok(None),
        }
    }

    async fn popular(&self, limit: usize) -> Result<Vec<PopularQuery>> {
        let rows = sqlx::query(
            r#"
            SELECT query_norm,
                   COUNT(*) AS n,
                   AVG(total_found) AS avg_results,
                   MAX(created_at) AS last_searched
            FROM search_records
            GROUP BY query_norm
            ORDER BY n DESC, query_norm ASC
            LIMIT ?
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| PopularQuery {
                query: row.get("query_norm"),
                count: row.get("n"),
                avg_results: row.get("avg_results"),
                last_searched: from_millis(row.get("last_searched")),
            })
            .collect())
    }

    async fn history(&self, caller_id: &str, limit: usize) -> Result<Vec<SearchRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM search_records WHERE caller_id = ? ORDER BY created_at DESC LIMIT ?",
            RECORD_COLUMNS
        ))
        .bind(caller_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            out.push(self.load_details(record_from_row(row)).await?);
        }
        Ok(out)
    }

    async fn trends(&self, days: u32) -> Result<Vec<TrendPoint>> {
        let since = window_start(days).timestamp_millis();
        let rows = sqlx::query(
            r#"
            SELECT strftime('%Y-%m-%d', created_at / 1000, 'unixepoch') AS day,
                   query_norm,
                   COUNT(*) AS n
            FROM search_records
            WHERE created_at >= ?
            GROUP BY day, query_norm
            ORDER BY day ASC, n DESC, query_norm ASC
            "#,
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| TrendPoint {
                day: row.get("day"),
                query: row.get("query_norm"),
                count: row.get("n"),
            })
            .collect())
    }

    async fn platform_stats(&self, days: u32) -> Result<Vec<PlatformStat>> {
        let since = window_start(days).timestamp_millis();
        let rows = sqlx::query(
            r#"
            SELECT pc.platform AS platform,
                   COUNT(*) AS searches,
                   SUM(pc.count) AS total_courses,
                   AVG(pc.count) AS avg_courses
            FROM search_platform_counts pc
            JOIN search_records r ON r.id = pc.search_id
            WHERE r.created_at >= ? AND pc.count > 0
            GROUP BY pc.platform
            "#,
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        let mut out: Vec<PlatformStat> = rows
            .iter()
            .filter_map(|row| {
                let name: String = row.get("platform");
                Platform::from_str(&name).ok().map(|platform| PlatformStat {
                    platform,
                    searches: row.get("searches"),
                    total_courses: row.get("total_courses"),
                    avg_courses: row.get("avg_courses"),
                })
            })
            .collect();
        out.sort_by_key(|s| s.platform);
        Ok(out)
    }
}

#[async_trait]
impl ViewCounter for SqliteAnalyticsStore {
    async fn increment(&self, listing_id: &str) -> Result<i64> {
        let views: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO course_views (listing_id, views, updated_at)
            VALUES (?, 1, ?)
            ON CONFLICT(listing_id) DO UPDATE SET
                views = views + 1,
                updated_at = excluded.updated_at
            RETURNING views
            "#,
        )
        .bind(listing_id)
        .bind(Utc::now().timestamp_millis())
        .fetch_one(&self.pool)
        .await?;

        Ok(views)
    }

    async fn views(&self, listing_id: &str) -> Result<i64> {
        let views: Option<i64> =
            sqlx::query_scalar("SELECT views FROM course_views WHERE listing_id = ?")
                .bind(listing_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(views.unwrap_or(0))
    }
}
