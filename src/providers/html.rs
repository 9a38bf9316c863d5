//! Card extraction for providers backed by an HTML listing page.
//!
//! A listing page is treated as a sequence of "cards", one per course. Each
//! field is located inside its card with a CSS selector; selectors may be
//! comma-separated lists so alternate page layouts can be covered.
//!
//! Parsing is synchronous and self-contained: the parsed document never
//! outlives [`extract_cards`], so callers can use it between awaits.

use anyhow::{anyhow, Result};
use scraper::{ElementRef, Html, Selector};
use url::Url;

use super::{clean_text, field_or_na, resolve_link};
use crate::models::{CourseListing, Platform, NOT_AVAILABLE};

/// CSS selectors locating one course card and its fields.
///
/// `link` is optional: when the card element itself is an anchor its `href`
/// is used.
#[derive(Debug, Clone)]
pub struct CardSelectors {
    pub card: &'static str,
    pub title: &'static str,
    pub link: &'static str,
    pub description: Option<&'static str>,
    pub instructor: Option<&'static str>,
    pub institution: Option<&'static str>,
    pub price: Option<&'static str>,
    pub rating: Option<&'static str>,
    pub duration: Option<&'static str>,
    pub level: Option<&'static str>,
    pub language: Option<&'static str>,
    pub image: Option<&'static str>,
}

/// Values used when a card has no element for a field.
#[derive(Debug, Clone)]
pub struct CardDefaults {
    pub price: &'static str,
    pub language: &'static str,
}

impl Default for CardDefaults {
    fn default() -> Self {
        Self {
            price: NOT_AVAILABLE,
            language: NOT_AVAILABLE,
        }
    }
}

struct Compiled {
    card: Selector,
    title: Selector,
    link: Selector,
    description: Option<Selector>,
    instructor: Option<Selector>,
    institution: Option<Selector>,
    price: Option<Selector>,
    rating: Option<Selector>,
    duration: Option<Selector>,
    level: Option<Selector>,
    language: Option<Selector>,
    image: Option<Selector>,
}

fn parse(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| anyhow!("invalid selector '{}': {:?}", selector, e))
}

fn parse_opt(selector: Option<&str>) -> Result<Option<Selector>> {
    selector.map(parse).transpose()
}

impl CardSelectors {
    fn compile(&self) -> Result<Compiled> {
        Ok(Compiled {
            card: parse(self.card)?,
            title: parse(self.title)?,
            link: parse(self.link)?,
            description: parse_opt(self.description)?,
            instructor: parse_opt(self.instructor)?,
            institution: parse_opt(self.institution)?,
            price: parse_opt(self.price)?,
            rating: parse_opt(self.rating)?,
            duration: parse_opt(self.duration)?,
            level: parse_opt(self.level)?,
            language: parse_opt(self.language)?,
            image: parse_opt(self.image)?,
        })
    }
}

/// Extract up to `limit` listings from a listing page.
///
/// Cards missing a title or a resolvable http(s) link are skipped.
pub fn extract_cards(
    html: &str,
    base: &Url,
    platform: Platform,
    selectors: &CardSelectors,
    defaults: &CardDefaults,
    limit: usize,
) -> Result<Vec<CourseListing>> {
    let sel = selectors.compile()?;
    let document = Html::parse_document(html);
    let mut out = Vec::new();

    for card in document.select(&sel.card) {
        if out.len() >= limit {
            break;
        }

        let Some(title) = first_text(card, &sel.title) else {
            continue;
        };
        let Some(link) = card_link(card, &sel.link).and_then(|href| resolve_link(base, &href))
        else {
            continue;
        };

        let mut listing = CourseListing::new(platform, title, link);
        listing.description = field_or_na(opt_text(card, &sel.description).as_deref());
        listing.instructor = field_or_na(opt_text(card, &sel.instructor).as_deref());
        listing.institution = opt_text(card, &sel.institution);
        listing.price = opt_text(card, &sel.price).unwrap_or_else(|| defaults.price.to_string());
        listing.rating = field_or_na(opt_text(card, &sel.rating).as_deref());
        listing.duration = field_or_na(opt_text(card, &sel.duration).as_deref());
        listing.level = field_or_na(opt_text(card, &sel.level).as_deref());
        listing.language =
            opt_text(card, &sel.language).unwrap_or_else(|| defaults.language.to_string());
        listing.image = sel
            .image
            .as_ref()
            .and_then(|s| card.select(s).next())
            .and_then(|img| img.value().attr("src").or(img.value().attr("data-src")))
            .and_then(|src| resolve_link(base, src))
            .unwrap_or_else(|| NOT_AVAILABLE.to_string());

        out.push(listing);
    }

    Ok(out)
}

fn element_text(el: ElementRef<'_>) -> String {
    clean_text(&el.text().collect::<Vec<_>>().join(" "))
}

fn first_text(card: ElementRef<'_>, selector: &Selector) -> Option<String> {
    card.select(selector)
        .map(element_text)
        .find(|t| !t.is_empty())
}

fn opt_text(card: ElementRef<'_>, selector: &Option<Selector>) -> Option<String> {
    selector.as_ref().and_then(|s| first_text(card, s))
}

fn card_link(card: ElementRef<'_>, selector: &Selector) -> Option<String> {
    if card.value().name() == "a" {
        if let Some(href) = card.value().attr("href") {
            return Some(href.to_string());
        }
    }
    card.select(selector)
        .filter_map(|a| a.value().attr("href"))
        .next()
        .map(str::to_string)
}
