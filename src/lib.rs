//! # Course Scout
//!
//! A federated course-search aggregator.
//!
//! One free-text query fans out concurrently to every registered course
//! platform. Results are normalized into [`models::CourseListing`], filtered,
//! re-ranked by a pluggable relevance collaborator, cached, and recorded for
//! query analytics (history, popularity, trends).
//!
//! ## Architecture
//!
//! ```text
//!              ┌──────────────┐
//!  caller ───▶ │ Rate Limiter │
//!              └──────┬───────┘
//!                     ▼
//!  ┌──────────────────────────────────────────────────┐
//!  │ Search Aggregator                                │
//!  │  cache? ─▶ enhance ─▶ fan-out ─▶ filter ─▶ rank  │
//!  └──────┬──────────────────┬───────────────┬────────┘
//!         ▼                  ▼               ▼
//!   ┌───────────┐   ┌────────────────┐ ┌────────────┐
//!   │   Cache   │   │   Providers    │ │ Analytics  │
//!   │ (DashMap) │   │ edX/GfG/SWAYAM │ │  (SQLite)  │
//!   └───────────┘   └────────────────┘ └────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! scout init
//! scout search "data structures" --max-price 0
//! scout analytics popular
//! scout serve
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`aggregator`] | Search orchestration and click tracking |
//! | [`analytics`] | Search records, clicks, view counters |
//! | [`cache`] | TTL result cache |
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`enhancer`] | Query rewriting |
//! | [`error`] | User-visible and external-call errors |
//! | [`filter`] | Price/platform/level/duration/language filters |
//! | [`llm`] | Chat-completion client (OpenAI, Ollama) |
//! | [`migrate`] | Schema migrations |
//! | [`models`] | Core data types |
//! | [`providers`] | Platform providers and registry |
//! | [`ranker`] | Relevance ranking |
//! | [`rate_limit`] | Burst and sustained per-caller limits |
//! | [`report`] | Analytics CLI output |
//! | [`search`] | Aggregator wiring and CLI search |
//! | [`server`] | HTTP API |
//! | [`sources`] | Provider status listing |

pub mod aggregator;
pub mod analytics;
pub mod cache;
pub mod config;
pub mod db;
pub mod enhancer;
pub mod error;
pub mod filter;
pub mod llm;
pub mod migrate;
pub mod models;
pub mod providers;
pub mod ranker;
pub mod rate_limit;
pub mod report;
pub mod search;
pub mod server;
pub mod sources;
