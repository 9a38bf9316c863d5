//! `scout analytics` reports.
//!
//! Each report opens the analytics database, runs one aggregate query, and
//! prints a fixed-width table to stdout.

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::analytics::{AnalyticsStore, SqliteAnalyticsStore};
use crate::config::Config;
use crate::{db, migrate};

async fn open_store(config: &Config) -> Result<SqliteAnalyticsStore> {
    let pool = db::connect(config).await?;
    migrate::apply(&pool).await?;
    Ok(SqliteAnalyticsStore::new(pool))
}

pub async fn run_popular(config: &Config, limit: usize) -> Result<()> {
    let store = open_store(config).await?;
    let rows = store.popular(limit).await?;

    if rows.is_empty() {
        println!("No searches recorded.");
    } else {
        println!(
            "  {:<40} {:>6} {:>12}   {}",
            "QUERY", "COUNT", "AVG RESULTS", "LAST SEARCHED"
        );
        println!("  {}", "-".repeat(80));
        for r in &rows {
            println!(
                "  {:<40} {:>6} {:>12.1}   {}",
                truncate(&r.query, 40),
                r.count,
                r.avg_results,
                format_relative(r.last_searched)
            );
        }
    }

    store.pool().close().await;
    Ok(())
}

pub async fn run_history(config: &Config, caller_id: &str, limit: usize) -> Result<()> {
    let store = open_store(config).await?;
    let records = store.history(caller_id, limit).await?;

    if records.is_empty() {
        println!("No searches recorded for {}.", caller_id);
    }
    for r in &records {
        let status = if r.success { "ok" } else { "failed" };
        println!(
            "{}  \"{}\"  {} found  {} ms  {}",
            r.created_at.format("%Y-%m-%d %H:%M"),
            r.query,
            r.results.total_found,
            r.elapsed_ms,
            status
        );
        if let Some(err) = &r.error {
            println!("    error: {}", err);
        }
        for click in &r.clicks {
            println!(
                "    clicked {} at {}",
                click.listing_id,
                click.clicked_at.format("%H:%M:%S")
            );
        }
        println!("    id: {}", r.id);
    }

    store.pool().close().await;
    Ok(())
}

pub async fn run_trends(config: &Config, days: u32) -> Result<()> {
    let store = open_store(config).await?;
    let points = store.trends(days).await?;

    if points.is_empty() {
        println!("No searches in the last {} days.", days);
    } else {
        println!("  {:<12} {:>6}   {}", "DAY", "COUNT", "QUERY");
        println!("  {}", "-".repeat(60));
        for p in &points {
            println!("  {:<12} {:>6}   {}", p.day, p.count, p.query);
        }
    }

    store.pool().close().await;
    Ok(())
}

pub async fn run_platforms(config: &Config, days: u32) -> Result<()> {
    let store = open_store(config).await?;
    let stats = store.platform_stats(days).await?;

    if stats.is_empty() {
        println!("No platform results in the last {} days.", days);
    } else {
        println!(
            "  {:<16} {:>9} {:>9} {:>10}",
            "PLATFORM", "SEARCHES", "COURSES", "AVG/SEARCH"
        );
        println!("  {}", "-".repeat(48));
        for s in &stats {
            println!(
                "  {:<16} {:>9} {:>9} {:>10.1}",
                s.platform.display_name(),
                s.searches,
                s.total_courses,
                s.avg_courses
            );
        }
    }

    store.pool().close().await;
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
        out.push('…');
        out
    }
}

/// Relative time for recent timestamps, absolute otherwise.
fn format_relative(ts: DateTime<Utc>) -> String {
    let delta = (Utc::now() - ts).num_seconds();

    if delta < 0 {
        ts.format("%Y-%m-%d %H:%M").to_string()
    } else if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        ts.format("%Y-%m-%d %H:%M").to_string()
    }
}
