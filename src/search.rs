//! Aggregator wiring and the `scout search` / `scout click` commands.

use anyhow::Result;
use std::sync::Arc;

use crate::aggregator::{AggregatorSettings, SearchAggregator};
use crate::analytics::SqliteAnalyticsStore;
use crate::cache::InMemoryResultCache;
use crate::config::Config;
use crate::enhancer::create_enhancer;
use crate::models::{ClientMeta, SearchRequest, SearchResponse, NOT_AVAILABLE};
use crate::providers::ProviderRegistry;
use crate::ranker::create_ranker;
use crate::{db, migrate};

/// Build a fully configured aggregator backed by the SQLite analytics store.
///
/// Opens the database and applies the schema, so a fresh database works
/// without a separate `scout init`.
pub async fn build_aggregator(config: &Config) -> Result<SearchAggregator> {
    let pool = db::connect(config).await?;
    migrate::apply(&pool).await?;
    let store = Arc::new(SqliteAnalyticsStore::new(pool));

    let providers = ProviderRegistry::from_config(config)?;
    if providers.is_empty() {
        tracing::warn!("no providers configured; every search will return zero results");
    }

    let aggregator = SearchAggregator::new(
        Arc::new(providers),
        Arc::new(InMemoryResultCache::new(config.search.cache_ttl())),
        store.clone(),
        store,
    )
    .with_enhancer(create_enhancer(&config.enhancer)?)
    .with_ranker(create_ranker(&config.ranker)?)
    .with_settings(AggregatorSettings::from(&config.search));

    Ok(aggregator)
}

pub async fn run_search(config: &Config, request: SearchRequest, json: bool) -> Result<()> {
    let aggregator = build_aggregator(config).await?;
    let client = ClientMeta {
        user_agent: Some(format!("scout-cli/{}", env!("CARGO_PKG_VERSION"))),
        ip: None,
    };

    let response = aggregator.search(&request, &client).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        print_response(&request.query, &response);
    }
    Ok(())
}

fn print_response(query: &str, response: &SearchResponse) {
    if response.courses.is_empty() {
        println!("No results.");
        return;
    }

    println!(
        "{} result{} for \"{}\" ({} ms{})",
        response.courses.len(),
        if response.courses.len() == 1 { "" } else { "s" },
        query.trim(),
        response.elapsed_ms,
        if response.cached { ", cached" } else { "" }
    );
    println!();

    for (i, course) in response.courses.iter().enumerate() {
        println!("{}. [{}] {}", i + 1, course.platform, course.title);
        match &course.institution {
            Some(inst) => println!("    by: {} / {}", course.instructor, inst),
            None if course.instructor != NOT_AVAILABLE => {
                println!("    by: {}", course.instructor)
            }
            None => {}
        }
        println!(
            "    price: {} | rating: {} | duration: {} | level: {} | language: {}",
            course.price, course.rating, course.duration, course.level, course.language
        );
        println!("    link: {}", course.link);
        println!();
    }

    if let Some(id) = &response.record_id {
        println!("search id: {}", id);
    }
}

pub async fn run_click(
    config: &Config,
    listing_id: &str,
    record_id: Option<&str>,
    caller_id: Option<&str>,
) -> Result<()> {
    let aggregator = build_aggregator(config).await?;
    let receipt = aggregator
        .track_click(listing_id, record_id, caller_id)
        .await?;

    match (record_id, receipt.recorded) {
        (Some(id), true) => println!("Click recorded on search {}.", id),
        (Some(id), false) => println!("Search {} not found; click not attached.", id),
        (None, _) => println!("Click recorded."),
    }
    if let Some(views) = receipt.views {
        println!("Views for {}: {}", listing_id.trim(), views);
    }
    Ok(())
}
