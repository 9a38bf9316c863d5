//! SWAYAM course listing provider.
//!
//! SWAYAM courses carry no enrolment fee, so listings without an explicit
//! price element are reported as [`FREE`](crate::models::FREE).

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use url::Url;

use super::html::{extract_cards, CardDefaults, CardSelectors};
use super::{render_search_url, PlatformProvider};
use crate::config::WebProviderConfig;
use crate::models::{CourseListing, Platform, FREE, NOT_AVAILABLE};

const DEFAULT_BASE_URL: &str = "https://swayam.gov.in";
const DEFAULT_SEARCH_PATH: &str = "/search_courses?searchText={query}";

const SELECTORS: CardSelectors = CardSelectors {
    card: ".course-card, .courseCard, div.card.course, li.course",
    title: ".course-title, h4, h3, h5",
    link: "a[href*='/course'], a[href*='/nd'], a[href]",
    description: Some(".course-description, .description"),
    instructor: Some(".course-instructor, .instructor, .faculty"),
    institution: Some(".course-institute, .institute, .coordinating-institute"),
    price: None,
    rating: None,
    duration: Some(".course-duration, .duration, .weeks"),
    level: Some(".course-level, .level, .category-level"),
    language: Some(".course-language, .language"),
    image: Some("img"),
};

const DEFAULTS: CardDefaults = CardDefaults {
    price: FREE,
    language: NOT_AVAILABLE,
};

pub struct SwayamProvider {
    client: reqwest::Client,
    base: Url,
    search_url: String,
}

impl SwayamProvider {
    pub fn new(config: &WebProviderConfig, client: reqwest::Client) -> Result<Self> {
        let base_url = config.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
        let base = Url::parse(base_url).with_context(|| {
            format!("providers.swayam.base_url is not a valid URL: {}", base_url)
        })?;
        let search_url = config.search_url.clone().unwrap_or_else(|| {
            format!("{}{}", base_url.trim_end_matches('/'), DEFAULT_SEARCH_PATH)
        });

        Ok(Self {
            client,
            base,
            search_url,
        })
    }
}

#[async_trait]
impl PlatformProvider for SwayamProvider {
    fn name(&self) -> &str {
        "swayam"
    }

    fn description(&self) -> &str {
        "SWAYAM national MOOC platform (listing page)"
    }

    fn provider_type(&self) -> &str {
        "swayam"
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<CourseListing>> {
        let url = render_search_url(&self.search_url, query, limit);
        let response = self.client.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            bail!("SWAYAM returned {}", status);
        }

        let page = response.text().await?;
        extract_cards(&page, &self.base, Platform::Swayam, &SELECTORS, &DEFAULTS, limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cards_default_to_free() {
        let page = r#"
            <div class="course-card">
              <h4 class="course-title">Programming in Java</h4>
              <a href="/nd1_noc20_cs58/preview">Enroll</a>
              <span class="course-instructor">Prof. Debasis Samanta</span>
              <span class="course-institute">IIT Kharagpur</span>
              <span class="course-duration">12 Weeks</span>
            </div>
        "#;
        let base = Url::parse(DEFAULT_BASE_URL).unwrap();
        let out = extract_cards(page, &base, Platform::Swayam, &SELECTORS, &DEFAULTS, 5).unwrap();
        assert_eq!(out.len(), 1);
        let c = &out[0];
        assert_eq!(c.price, FREE);
        assert_eq!(c.link, "https://swayam.gov.in/nd1_noc20_cs58/preview");
        assert_eq!(c.instructor, "Prof. Debasis Samanta");
        assert_eq!(c.institution.as_deref(), Some("IIT Kharagpur"));
        assert_eq!(c.duration, "12 Weeks");
    }
}
