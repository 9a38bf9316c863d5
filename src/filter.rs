//! Filter engine.
//!
//! A pure function over normalized listings. Clauses are AND-combined and an
//! unset clause imposes no constraint. Parsing is lenient: a price or duration
//! that cannot be read as a number passes rather than being rejected, and the
//! `"Free"` / `"N/A"` sentinels are treated as tokens with fixed meaning.

use crate::models::{CourseListing, SearchFilters, FREE, NOT_AVAILABLE};

/// Apply `filters` to `listings`, preserving order.
pub fn apply_filters(listings: Vec<CourseListing>, filters: &SearchFilters) -> Vec<CourseListing> {
    if filters.is_empty() {
        return listings;
    }
    listings
        .into_iter()
        .filter(|l| matches_filters(l, filters))
        .collect()
}

/// Whether a single listing satisfies every set clause.
pub fn matches_filters(listing: &CourseListing, filters: &SearchFilters) -> bool {
    if let Some(max_price) = filters.max_price {
        if !price_within(&listing.price, max_price) {
            return false;
        }
    }

    if !filters.platforms.is_empty() && !filters.platforms.contains(&listing.platform) {
        return false;
    }

    if let Some(level) = filters.level {
        if !contains_ignore_case(&listing.level, level.as_str()) {
            return false;
        }
    }

    if let Some(max_hours) = filters.max_duration_hours {
        if !duration_within(&listing.duration, max_hours) {
            return false;
        }
    }

    if let Some(ref language) = filters.language {
        if !contains_ignore_case(&listing.language, language) {
            return false;
        }
    }

    true
}

fn price_within(price: &str, max_price: f64) -> bool {
    if price.trim().eq_ignore_ascii_case(FREE) {
        return true;
    }
    match leading_number(price) {
        Some(value) => value <= max_price,
        None => true,
    }
}

fn duration_within(duration: &str, max_hours: u32) -> bool {
    if duration.trim().eq_ignore_ascii_case(NOT_AVAILABLE) {
        return true;
    }
    match leading_integer(duration) {
        Some(hours) => hours <= u64::from(max_hours),
        None => true,
    }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.trim().to_lowercase())
}

/// Parse the first numeric token in `s`, skipping currency symbols and
/// thousands separators (`"$1,299.00"` → `1299.0`, `"₹ 499"` → `499.0`).
pub fn leading_number(s: &str) -> Option<f64> {
    let start = s.find(|c: char| c.is_ascii_digit())?;
    let token: String = s[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .filter(|c| *c != ',')
        .collect();
    token.trim_end_matches('.').parse::<f64>().ok()
}

/// Parse the first integer token in `s` (`"6 weeks"` → `6`).
pub fn leading_integer(s: &str) -> Option<u64> {
    let start = s.find(|c: char| c.is_ascii_digit())?;
    let digits: String = s[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse::<u64>().ok()
}
