//! Core data models used throughout Course Scout.
//!
//! These types represent the listings, requests, and analytics records that
//! flow through the search pipeline. Listings are provider-agnostic: every
//! platform adapter normalizes into [`CourseListing`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Placeholder for any listing field a provider could not extract.
pub const NOT_AVAILABLE: &str = "N/A";

/// Price sentinel for courses without a fee.
pub const FREE: &str = "Free";

/// Default number of results per search.
pub const DEFAULT_LIMIT: usize = 7;

/// Upper bound on results per search.
pub const MAX_LIMIT: usize = 20;

/// Upper bound on query length, in characters.
pub const MAX_QUERY_CHARS: usize = 200;

/// A known content source.
///
/// Serialized in lowercase (`"edx"`, `"gfg"`, `"swayam"`); displayed with the
/// platform's own branding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Edx,
    Gfg,
    Swayam,
}

impl Platform {
    /// All known platforms, in canonical order.
    pub const ALL: [Platform; 3] = [Platform::Edx, Platform::Gfg, Platform::Swayam];

    /// Machine-readable identifier, matching the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Edx => "edx",
            Platform::Gfg => "gfg",
            Platform::Swayam => "swayam",
        }
    }

    /// Human-readable platform name.
    pub fn display_name(&self) -> &'static str {
        match self {
            Platform::Edx => "edX",
            Platform::Gfg => "GeeksforGeeks",
            Platform::Swayam => "SWAYAM",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "edx" => Ok(Platform::Edx),
            "gfg" | "geeksforgeeks" => Ok(Platform::Gfg),
            "swayam" => Ok(Platform::Swayam),
            other => Err(format!(
                "unknown platform '{}'. Use edx, gfg, or swayam.",
                other
            )),
        }
    }
}

/// Difficulty level accepted by the level filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CourseLevel {
    Beginner,
    Intermediate,
    Advanced,
}

impl CourseLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            CourseLevel::Beginner => "beginner",
            CourseLevel::Intermediate => "intermediate",
            CourseLevel::Advanced => "advanced",
        }
    }
}

impl FromStr for CourseLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "beginner" => Ok(CourseLevel::Beginner),
            "intermediate" => Ok(CourseLevel::Intermediate),
            "advanced" => Ok(CourseLevel::Advanced),
            other => Err(format!(
                "unknown level '{}'. Use beginner, intermediate, or advanced.",
                other
            )),
        }
    }
}

/// A normalized course listing from any provider.
///
/// `platform` and `link` are always meaningful. Every other string field may
/// hold the [`NOT_AVAILABLE`] sentinel, and `price` may hold [`FREE`]. The
/// sentinels are kept verbatim because the filter engine treats them as
/// tokens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseListing {
    pub title: String,
    pub description: String,
    pub instructor: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub institution: Option<String>,
    pub platform: Platform,
    pub price: String,
    pub rating: String,
    pub duration: String,
    pub level: String,
    pub language: String,
    pub image: String,
    pub link: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

impl CourseListing {
    /// Create a listing with every optional field set to its sentinel.
    pub fn new(platform: Platform, title: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: NOT_AVAILABLE.to_string(),
            instructor: NOT_AVAILABLE.to_string(),
            institution: None,
            platform,
            price: NOT_AVAILABLE.to_string(),
            rating: NOT_AVAILABLE.to_string(),
            duration: NOT_AVAILABLE.to_string(),
            level: NOT_AVAILABLE.to_string(),
            language: NOT_AVAILABLE.to_string(),
            image: NOT_AVAILABLE.to_string(),
            link: link.into(),
            category: None,
            tags: BTreeSet::new(),
        }
    }

    /// Listing identity for de-duplication and click tracking.
    pub fn id(&self) -> &str {
        &self.link
    }
}

/// Structured constraints applied by the filter engine.
///
/// Every clause is optional; an unset clause imposes no constraint.
/// `platforms` is an ordered set so the serialized form is canonical.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_price: Option<f64>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub platforms: BTreeSet<Platform>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<CourseLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_duration_hours: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl SearchFilters {
    pub fn is_empty(&self) -> bool {
        self.max_price.is_none()
            && self.platforms.is_empty()
            && self.level.is_none()
            && self.max_duration_hours.is_none()
            && self.language.is_none()
    }
}

/// One inbound search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default)]
    pub filters: SearchFilters,
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Authenticated caller identity, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caller_id: Option<String>,
}

fn default_limit() -> usize {
    DEFAULT_LIMIT
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            filters: SearchFilters::default(),
            limit: DEFAULT_LIMIT,
            caller_id: None,
        }
    }
}

/// Request metadata recorded alongside a search.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientMeta {
    pub user_agent: Option<String>,
    pub ip: Option<String>,
}

/// Number of listings one platform yielded for a search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformCount {
    pub platform: Platform,
    pub count: i64,
}

/// Provider yield for a search, computed before filtering.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultSummary {
    pub total_found: i64,
    pub platforms: Vec<PlatformCount>,
}

impl ResultSummary {
    /// Summarize the raw provider yield: total plus per-platform counts in
    /// canonical platform order, omitting platforms with no results.
    pub fn from_listings(listings: &[CourseListing]) -> Self {
        let platforms = Platform::ALL
            .iter()
            .map(|p| PlatformCount {
                platform: *p,
                count: listings.iter().filter(|l| l.platform == *p).count() as i64,
            })
            .filter(|pc| pc.count > 0)
            .collect();

        Self {
            total_found: listings.len() as i64,
            platforms,
        }
    }
}

/// A click on a listing from a search's results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClickEvent {
    pub listing_id: String,
    pub clicked_at: DateTime<Utc>,
}

/// Persisted analytics row for one search attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRecord {
    pub id: String,
    pub query: String,
    pub caller_id: Option<String>,
    pub filters: SearchFilters,
    pub results: ResultSummary,
    pub client: ClientMeta,
    pub elapsed_ms: i64,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub clicks: Vec<ClickEvent>,
    pub created_at: DateTime<Utc>,
}

impl SearchRecord {
    /// Start a record for a search attempt with a fresh id and timestamp.
    pub fn new(
        query: &str,
        caller_id: Option<String>,
        filters: SearchFilters,
        client: ClientMeta,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            query: query.to_string(),
            caller_id,
            filters,
            results: ResultSummary::default(),
            client,
            elapsed_ms: 0,
            success: true,
            error: None,
            clicks: Vec::new(),
            created_at: Utc::now(),
        }
    }
}

/// Response returned by the aggregator.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    /// Analytics record written for this call. `None` on cache hits or when
    /// the analytics write failed.
    pub record_id: Option<String>,
    pub courses: Vec<CourseListing>,
    pub cached: bool,
    pub elapsed_ms: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_parse_aliases() {
        assert_eq!("EdX".parse::<Platform>().unwrap(), Platform::Edx);
        assert_eq!("GeeksForGeeks".parse::<Platform>().unwrap(), Platform::Gfg);
        assert_eq!(" swayam ".parse::<Platform>().unwrap(), Platform::Swayam);
        assert!("coursera".parse::<Platform>().is_err());
    }

    #[test]
    fn test_platform_serde_lowercase() {
        let json = serde_json::to_string(&Platform::Gfg).unwrap();
        assert_eq!(json, "\"gfg\"");
        assert_eq!(Platform::Gfg.to_string(), "GeeksforGeeks");
    }

    #[test]
    fn test_new_listing_uses_sentinels() {
        let l = CourseListing::new(Platform::Edx, "Rust", "https://edx.org/rust");
        assert_eq!(l.price, NOT_AVAILABLE);
        assert_eq!(l.duration, NOT_AVAILABLE);
        assert_eq!(l.id(), "https://edx.org/rust");
    }

    #[test]
    fn test_summary_counts_per_platform() {
        let listings = vec![
            CourseListing::new(Platform::Swayam, "a", "l1"),
            CourseListing::new(Platform::Edx, "b", "l2"),
            CourseListing::new(Platform::Swayam, "c", "l3"),
        ];
        let summary = ResultSummary::from_listings(&listings);
        assert_eq!(summary.total_found, 3);
        assert_eq!(
            summary.platforms,
            vec![
                PlatformCount {
                    platform: Platform::Edx,
                    count: 1,
                },
                PlatformCount {
                    platform: Platform::Swayam,
                    count: 2,
                },
            ]
        );
    }

    #[test]
    fn test_filters_platforms_serialize_sorted() {
        let mut filters = SearchFilters::default();
        filters.platforms.insert(Platform::Swayam);
        filters.platforms.insert(Platform::Edx);
        let json = serde_json::to_string(&filters).unwrap();
        assert_eq!(json, r#"{"platforms":["edx","swayam"]}"#);
    }

    #[test]
    fn test_request_defaults_limit() {
        let req: SearchRequest = serde_json::from_str(r#"{"query":"rust"}"#).unwrap();
        assert_eq!(req.limit, DEFAULT_LIMIT);
        assert!(req.filters.is_empty());
    }
}
