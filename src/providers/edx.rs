//! edX course catalogue provider.
//!
//! Queries the public course discovery API and normalizes each result. The
//! response is read as loose JSON so both the LMS course API shape
//! (`name`, `short_description`, `org`, `media.image`) and the marketing
//! search shape (`title`, `marketing_url`, `owners`, `image.src`) are
//! accepted.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use url::Url;

use super::{field_or_na, render_search_url, resolve_link, PlatformProvider};
use crate::config::WebProviderConfig;
use crate::models::{CourseListing, Platform, NOT_AVAILABLE};

const DEFAULT_BASE_URL: &str = "https://courses.edx.org";
const DEFAULT_SEARCH_PATH: &str = "/api/courses/v1/courses/?search_term={query}&page_size={limit}";

pub struct EdxProvider {
    client: reqwest::Client,
    base: Url,
    search_url: String,
}

impl EdxProvider {
    pub fn new(config: &WebProviderConfig, client: reqwest::Client) -> Result<Self> {
        let base_url = config.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
        let base = Url::parse(base_url)
            .with_context(|| format!("providers.edx.base_url is not a valid URL: {}", base_url))?;
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
impl PlatformProvider for EdxProvider {
    fn name(&self) -> &str {
        "edx"
    }

    fn description(&self) -> &str {
        "edX course catalogue (JSON API)"
    }

    fn provider_type(&self) -> &str {
        "edx"
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<CourseListing>> {
        let url = render_search_url(&self.search_url, query, limit);
        let response = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("edX API error {}: {}", status, body);
        }

        let json: Value = response.json().await?;
        parse_edx_response(&json, &self.base, limit)
    }
}

/// Parse an edX search response into listings, keeping source order.
///
/// Fails only when the document has no result array at all; individual
/// results without a title or link are skipped.
pub(crate) fn parse_edx_response(
    json: &Value,
    base: &Url,
    limit: usize,
) -> Result<Vec<CourseListing>> {
    let results = json
        .get("results")
        .or_else(|| json.get("courses"))
        .and_then(|r| r.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid edX response: missing results array"))?;

    Ok(results
        .iter()
        .filter_map(|item| parse_course(item, base))
        .take(limit)
        .collect())
}

fn str_at<'a>(item: &'a Value, path: &[&str]) -> Option<&'a str> {
    let mut cur = item;
    for key in path {
        cur = cur.get(*key)?;
    }
    cur.as_str().filter(|s| !s.trim().is_empty())
}

fn first_str<'a>(item: &'a Value, paths: &[&[&str]]) -> Option<&'a str> {
    paths.iter().find_map(|p| str_at(item, p))
}

fn parse_course(item: &Value, base: &Url) -> Option<CourseListing> {
    let title = first_str(item, &[&["title"], &["name"]])?;

    let link = match first_str(item, &[&["marketing_url"], &["url"], &["course_url"]]) {
        Some(href) => resolve_link(base, href)?,
        None => {
            let id = first_str(item, &[&["course_id"], &["id"], &["key"]])?;
            resolve_link(base, &format!("/courses/{}/about", id))?
        }
    };

    let mut listing = CourseListing::new(Platform::Edx, super::clean_text(title), link);
    listing.description = field_or_na(first_str(
        item,
        &[&["short_description"], &["description"]],
    ));
    listing.institution = first_str(item, &[&["org"], &["organization"]])
        .map(str::to_string)
        .or_else(|| {
            item.get("owners")
                .and_then(|o| o.as_array())
                .and_then(|o| o.first())
                .and_then(|o| str_at(o, &["name"]))
                .map(str::to_string)
        });
    listing.instructor = item
        .get("staff")
        .and_then(|s| s.as_array())
        .map(|staff| {
            staff
                .iter()
                .filter_map(|p| {
                    let given = str_at(p, &["given_name"]).unwrap_or_default();
                    let family = str_at(p, &["family_name"]).unwrap_or_default();
                    let full = format!("{} {}", given, family);
                    let full = full.trim();
                    (!full.is_empty()).then(|| full.to_string())
                })
                .collect::<Vec<_>>()
                .join(", ")
        })
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| NOT_AVAILABLE.to_string());
    listing.price = parse_price(item);
    listing.duration = parse_duration(item);
    listing.level = field_or_na(first_str(item, &[&["level_type"], &["level"]]));
    listing.language = field_or_na(first_str(item, &[&["language"], &["content_language"]]));
    listing.image = first_str(
        item,
        &[
            &["media", "image", "small"],
            &["media", "image", "raw"],
            &["media", "course_image", "uri"],
            &["image", "src"],
            &["image_url"],
        ],
    )
    .and_then(|src| resolve_link(base, src))
    .unwrap_or_else(|| NOT_AVAILABLE.to_string());
    listing.category = first_str(item, &[&["subject"], &["primary_subject"]]).map(str::to_string);
    if let Some(subjects) = item.get("subjects").and_then(|s| s.as_array()) {
        listing.tags = subjects
            .iter()
            .filter_map(|s| s.as_str().or_else(|| str_at(s, &["name"])))
            .map(|s| s.to_lowercase())
            .collect();
    }

    Some(listing)
}

fn parse_price(item: &Value) -> String {
    if let Some(price) = item.get("price") {
        match price {
            Value::Number(n) if n.as_f64() == Some(0.0) => return crate::models::FREE.to_string(),
            Value::Number(n) => return format!("${}", n),
            Value::String(s) if !s.trim().is_empty() => return s.trim().to_string(),
            _ => {}
        }
    }
    NOT_AVAILABLE.to_string()
}

fn parse_duration(item: &Value) -> String {
    if let Some(weeks) = item.get("weeks_to_complete").and_then(|w| w.as_u64()) {
        return format!("{} weeks", weeks);
    }
    field_or_na(first_str(item, &[&["effort"], &["duration"]]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn base() -> Url {
        Url::parse(DEFAULT_BASE_URL).unwrap()
    }

    #[test]
    fn test_parses_lms_shape() {
        let doc = json!({
            "results": [{
                "name": "Introduction to Computer Science",
                "course_id": "course-v1:HarvardX+CS50+X",
                "short_description": "An introduction to the intellectual enterprises of computer science.",
                "org": "HarvardX",
                "effort": "6-18 hours per week",
                "media": {"image": {"small": "/asset/cs50.jpg"}}
            }],
            "pagination": {"count": 1}
        });
        let out = parse_edx_response(&doc, &base(), 5).unwrap();
        assert_eq!(out.len(), 1);
        let c = &out[0];
        assert_eq!(c.platform, Platform::Edx);
        assert_eq!(
            c.link,
            "https://courses.edx.org/courses/course-v1:HarvardX+CS50+X/about"
        );
        assert_eq!(c.institution.as_deref(), Some("HarvardX"));
        assert_eq!(c.duration, "6-18 hours per week");
        assert_eq!(c.image, "https://courses.edx.org/asset/cs50.jpg");
        assert_eq!(c.price, NOT_AVAILABLE);
    }

    #[test]
    fn test_parses_marketing_shape() {
        let doc = json!({
            "results": [{
                "title": "Machine Learning with Python",
                "marketing_url": "https://www.edx.org/learn/machine-learning/mitx-ml",
                "owners": [{"name": "MITx"}],
                "staff": [{"given_name": "Regina", "family_name": "Barzilay"}],
                "weeks_to_complete": 15,
                "level_type": "Advanced",
                "language": "English",
                "price": 0,
                "subjects": ["Computer Science", {"name": "Data Analysis"}]
            }]
        });
        let out = parse_edx_response(&doc, &base(), 5).unwrap();
        let c = &out[0];
        assert_eq!(c.instructor, "Regina Barzilay");
        assert_eq!(c.duration, "15 weeks");
        assert_eq!(c.price, "Free");
        assert_eq!(c.level, "Advanced");
        assert!(c.tags.contains("data analysis"));
    }

    #[test]
    fn test_skips_items_without_title_or_link() {
        let doc = json!({
            "results": [
                {"name": "No link"},
                {"course_id": "course-v1:X+Y+Z"},
                {"name": "Ok", "course_id": "course-v1:A+B+C"}
            ]
        });
        let out = parse_edx_response(&doc, &base(), 5).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].title, "Ok");
    }

    #[test]
    fn test_caps_at_limit() {
        let items: Vec<Value> = (0..10)
            .map(|i| json!({"name": format!("C{}", i), "course_id": format!("c{}", i)}))
            .collect();
        let out = parse_edx_response(&json!({ "results": items }), &base(), 3).unwrap();
        assert_eq!(out.len(), 3);
        assert_eq!(out[2].title, "C2");
    }

    #[test]
    fn test_missing_results_is_an_error() {
        assert!(parse_edx_response(&json!({"detail": "nope"}), &base(), 3).is_err());
    }
}
