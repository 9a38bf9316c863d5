//! GeeksforGeeks course listing provider.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use url::Url;

use super::html::{extract_cards, CardDefaults, CardSelectors};
use super::{render_search_url, PlatformProvider};
use crate::config::WebProviderConfig;
use crate::models::{CourseListing, Platform};

const DEFAULT_BASE_URL: &str = "https://www.geeksforgeeks.org";
const DEFAULT_SEARCH_PATH: &str = "/courses/search?query={query}";

const SELECTORS: CardSelectors = CardSelectors {
    card: "a[class*='courseListingPage_courseCardContainer'], div[class*='courseCard'], .course-card",
    title: "h4, h3, [class*='courseTitle'], .course-title",
    link: "a[href]",
    description: Some("[class*='courseDescription'], .course-description, p"),
    instructor: Some("[class*='courseInstructor'], .instructor"),
    institution: None,
    price: Some("[class*='coursePrice'], [class*='price'], .price"),
    rating: Some("[class*='courseRating'], [class*='rating'], .rating"),
    duration: Some("[class*='courseDuration'], [class*='duration'], .duration"),
    level: Some("[class*='courseLevel'], [class*='level'], .level"),
    language: Some("[class*='courseLanguage'], .language"),
    image: Some("img"),
};

pub struct GfgProvider {
    client: reqwest::Client,
    base: Url,
    search_url: String,
}

impl GfgProvider {
    pub fn new(config: &WebProviderConfig, client: reqwest::Client) -> Result<Self> {
        let base_url = config.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
        let base = Url::parse(base_url)
            .with_context(|| format!("providers.gfg.base_url is not a valid URL: {}", base_url))?;
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
impl PlatformProvider for GfgProvider {
    fn name(&self) -> &str {
        "gfg"
    }

    fn description(&self) -> &str {
        "GeeksforGeeks courses (listing page)"
    }

    fn provider_type(&self) -> &str {
        "gfg"
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<CourseListing>> {
        let url = render_search_url(&self.search_url, query, limit);
        let response = self.client.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            bail!("GeeksforGeeks returned {}", status);
        }

        let page = response.text().await?;
        extract_cards(
            &page,
            &self.base,
            Platform::Gfg,
            &SELECTORS,
            &CardDefaults::default(),
            limit,
        )
    }
}
