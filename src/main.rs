//! # Course Scout CLI (`scout`)
//!
//! The `scout` binary searches every configured course platform at once,
//! tracks clicks, prints query analytics, and runs the HTTP API.
//!
//! ## Usage
//!
//! ```bash
//! scout --config ./config/scout.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `scout init` | Create the SQLite database and run schema migrations |
//! | `scout providers` | List configured providers |
//! | `scout search "<query>"` | Search all providers |
//! | `scout click <listing-id>` | Record a click on a listing |
//! | `scout analytics popular` | Most searched queries |
//! | `scout analytics history --user <id>` | A caller's recent searches |
//! | `scout analytics trends` | Daily query counts |
//! | `scout analytics platforms` | Per-platform result yield |
//! | `scout serve` | Start the HTTP API |
//!
//! ## Examples
//!
//! ```bash
//! scout init
//! scout search "machine learning" --max-price 50 --platform edx --platform swayam
//! scout search "rust" --level beginner --json
//! scout click https://example.org/course/rust --record 6f1c...
//! scout analytics trends --days 14
//! scout serve
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use course_scout::config::{self, LogConfig};
use course_scout::models::{CourseLevel, Platform, SearchFilters, SearchRequest};
use course_scout::{migrate, report, search, server, sources};

/// Course Scout: one query, every course platform.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/scout.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "scout",
    about = "Course Scout: federated course search with caching, re-ranking, and query analytics",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/scout.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Idempotent. Other commands also apply the schema on startup.
    Init,

    /// List configured providers and whether they are enabled.
    Providers,

    /// Search every enabled provider.
    Search {
        /// Free-text query.
        query: String,

        /// Maximum price; free courses always pass.
        #[arg(long)]
        max_price: Option<f64>,

        /// Restrict to a platform (`edx`, `gfg`, `swayam`). Repeatable.
        #[arg(long = "platform")]
        platforms: Vec<Platform>,

        /// Course level (`beginner`, `intermediate`, `advanced`).
        #[arg(long)]
        level: Option<CourseLevel>,

        /// Maximum duration in hours.
        #[arg(long = "max-duration")]
        max_duration_hours: Option<u32>,

        /// Language, matched as a case-insensitive substring.
        #[arg(long)]
        language: Option<String>,

        /// Maximum number of results (1-20). Defaults to `[search].default_limit`.
        #[arg(long)]
        limit: Option<usize>,

        /// Caller identity recorded with the search.
        #[arg(long)]
        user: Option<String>,

        /// Print the raw response as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Record a click on a listing and bump its view counter.
    Click {
        /// Listing id (the listing's link).
        listing_id: String,

        /// Search record the click belongs to.
        #[arg(long)]
        record: Option<String>,

        #[arg(long)]
        user: Option<String>,
    },

    /// Query analytics.
    Analytics {
        #[command(subcommand)]
        report: AnalyticsReport,
    },

    /// Start the HTTP API on `[server].bind`.
    Serve,
}

#[derive(Subcommand)]
enum AnalyticsReport {
    /// Most searched queries.
    Popular {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Recent searches by one caller, newest first.
    History {
        #[arg(long)]
        user: String,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Per-day query counts.
    Trends {
        #[arg(long, default_value_t = 7)]
        days: u32,
    },
    /// Per-platform result yield.
    Platforms {
        #[arg(long, default_value_t = 30)]
        days: u32,
    },
}

/// `RUST_LOG` wins; otherwise `[log].level`, falling back to `info` when
/// that does not parse.
fn init_tracing(log: &LogConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::try_new(&log.level).unwrap_or_else(|e| {
            eprintln!("invalid log level '{}': {}; using info", log.level, e);
            EnvFilter::new("info")
        })
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if log.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;
    init_tracing(&cfg.log);

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Providers => {
            sources::list_providers(&cfg)?;
        }
        Commands::Search {
            query,
            max_price,
            platforms,
            level,
            max_duration_hours,
            language,
            limit,
            user,
            json,
        } => {
            let request = SearchRequest {
                query,
                filters: SearchFilters {
                    max_price,
                    platforms: platforms.into_iter().collect(),
                    level,
                    max_duration_hours,
                    language,
                },
                limit: limit.unwrap_or(cfg.search.default_limit),
                caller_id: user,
            };
            search::run_search(&cfg, request, json).await?;
        }
        Commands::Click {
            listing_id,
            record,
            user,
        } => {
            search::run_click(&cfg, &listing_id, record.as_deref(), user.as_deref()).await?;
        }
        Commands::Analytics { report } => match report {
            AnalyticsReport::Popular { limit } => report::run_popular(&cfg, limit).await?,
            AnalyticsReport::History { user, limit } => {
                report::run_history(&cfg, &user, limit).await?
            }
            AnalyticsReport::Trends { days } => report::run_trends(&cfg, days).await?,
            AnalyticsReport::Platforms { days } => report::run_platforms(&cfg, days).await?,
        },
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
