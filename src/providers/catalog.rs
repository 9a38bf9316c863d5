//! Static catalog provider.
//!
//! Serves listings from a local JSON file: an array of course objects using
//! the same field names as [`CourseListing`], all optional except `title`,
//! `link` and `platform`. Entries missing one of those, or naming an unknown
//! platform, are skipped. Useful offline and for deterministic tests.
//!
//! ```json
//! [
//!   {"title": "Rust Fundamentals", "link": "https://example.org/rust",
//!    "platform": "edx", "price": "Free", "tags": ["rust", "systems"]}
//! ]
//! ```
//!
//! Matching counts how many query terms occur in the title, description,
//! category, tags, instructor and institution. Listings matching no term are
//! excluded; ties keep file order.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::Path;
use std::str::FromStr;

use super::{field_or_na, PlatformProvider};
use crate::config::CatalogProviderConfig;
use crate::models::{CourseListing, Platform};

#[derive(Debug, Deserialize)]
struct CatalogEntry {
    title: Option<String>,
    link: Option<String>,
    platform: Option<String>,
    description: Option<String>,
    instructor: Option<String>,
    institution: Option<String>,
    price: Option<String>,
    rating: Option<String>,
    duration: Option<String>,
    level: Option<String>,
    language: Option<String>,
    image: Option<String>,
    category: Option<String>,
    #[serde(default)]
    tags: BTreeSet<String>,
}

impl CatalogEntry {
    fn into_listing(self) -> Option<CourseListing> {
        let title = self.title.filter(|t| !t.trim().is_empty())?;
        let link = self.link.filter(|l| !l.trim().is_empty())?;
        let platform = Platform::from_str(self.platform.as_deref()?).ok()?;

        let mut listing = CourseListing::new(platform, title.trim(), link.trim());
        listing.description = field_or_na(self.description.as_deref());
        listing.instructor = field_or_na(self.instructor.as_deref());
        listing.institution = self.institution;
        listing.price = field_or_na(self.price.as_deref());
        listing.rating = field_or_na(self.rating.as_deref());
        listing.duration = field_or_na(self.duration.as_deref());
        listing.level = field_or_na(self.level.as_deref());
        listing.language = field_or_na(self.language.as_deref());
        listing.image = field_or_na(self.image.as_deref());
        listing.category = self.category;
        listing.tags = self.tags.into_iter().map(|t| t.to_lowercase()).collect();
        Some(listing)
    }
}

pub struct CatalogProvider {
    name: String,
    description: String,
    courses: Vec<CourseListing>,
}

impl CatalogProvider {
    /// Load a catalog file. Entries without a title, link, or known platform
    /// are dropped.
    pub fn load(name: String, config: &CatalogProviderConfig) -> Result<Self> {
        let courses = read_catalog(&config.path)?;
        Ok(Self::from_listings(name, courses))
    }

    pub fn from_listings(name: String, courses: Vec<CourseListing>) -> Self {
        let description = format!("Static catalog ({} courses)", courses.len());
        Self {
            name,
            description,
            courses,
        }
    }

    pub fn len(&self) -> usize {
        self.courses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.courses.is_empty()
    }
}

fn read_catalog(path: &Path) -> Result<Vec<CourseListing>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read catalog file: {}", path.display()))?;
    let entries: Vec<CatalogEntry> = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse catalog file: {}", path.display()))?;
    let total = entries.len();
    let courses: Vec<CourseListing> = entries
        .into_iter()
        .filter_map(CatalogEntry::into_listing)
        .collect();
    if courses.len() < total {
        tracing::warn!(
            path = %path.display(),
            dropped = total - courses.len(),
            "catalog entries missing title, link, or a known platform"
        );
    }
    Ok(courses)
}

fn match_score(listing: &CourseListing, terms: &[String]) -> usize {
    let haystack = [
        listing.title.as_str(),
        listing.description.as_str(),
        listing.instructor.as_str(),
        listing.institution.as_deref().unwrap_or_default(),
        listing.category.as_deref().unwrap_or_default(),
    ]
    .join(" ")
    .to_lowercase();

    terms
        .iter()
        .filter(|t| haystack.contains(t.as_str()) || listing.tags.contains(t.as_str()))
        .count()
}

#[async_trait]
impl PlatformProvider for CatalogProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn provider_type(&self) -> &str {
        "catalog"
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<CourseListing>> {
        let terms: Vec<String> = query.split_whitespace().map(|t| t.to_lowercase()).collect();
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(usize, &CourseListing)> = self
            .courses
            .iter()
            .map(|c| (match_score(c, &terms), c))
            .filter(|(score, _)| *score > 0)
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0));

        Ok(scored
            .into_iter()
            .take(limit)
            .map(|(_, c)| c.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NOT_AVAILABLE;
    use std::io::Write;

    const CATALOG: &str = r#"[
        {"title": "Rust Fundamentals", "link": "https://example.org/rust",
         "platform": "edx", "price": "Free", "tags": ["Systems"]},
        {"title": "Python for Data Science", "link": "https://example.org/py",
         "platform": "gfg", "price": "$49", "description": "pandas and numpy"},
        {"title": "Systems Programming in Rust", "link": "https://example.org/sys",
         "platform": "swayam"},
        {"title": "", "link": "https://example.org/blank", "platform": "edx"},
        {"title": "No link", "platform": "edx"}
    ]"#;

    fn provider() -> CatalogProvider {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(CATALOG.as_bytes()).unwrap();
        let cfg = CatalogProviderConfig {
            path: file.path().to_path_buf(),
        };
        CatalogProvider::load("local".to_string(), &cfg).unwrap()
    }

    #[test]
    fn test_load_drops_incomplete_entries() {
        let p = provider();
        assert_eq!(p.len(), 4);
        assert_eq!(p.courses[2].price, NOT_AVAILABLE);
        assert_eq!(p.courses[3].platform, Platform::Gfg);
        let links: Vec<&str> = p.courses.iter().map(|c| c.link.as_str()).collect();
        assert!(!links.contains(&"https://example.org/none"));
        assert!(!links.contains(&"https://example.org/other"));
        assert!(p.courses[0].tags.contains("systems"));
    }

    #[tokio::test]
    async fn test_search_orders_by_term_matches() {
        let p = provider();
        let out = p.search("rust systems", 10).await.unwrap();
        let links: Vec<&str> = out.iter().map(|c| c.link.as_str()).collect();
        assert_eq!(
            links,
            vec!["https://example.org/rust", "https://example.org/sys"]
        );
    }

    #[tokio::test]
    async fn test_search_respects_limit_and_misses() {
        let p = provider();
        assert_eq!(p.search("rust", 1).await.unwrap().len(), 1);
        assert!(p.search("haskell", 5).await.unwrap().is_empty());
        assert_eq!(p.search("NUMPY", 5).await.unwrap()[0].platform, Platform::Gfg);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let cfg = CatalogProviderConfig {
            path: "/nonexistent/catalog.json".into(),
        };
        assert!(CatalogProvider::load("x".to_string(), &cfg).is_err());
    }
}
