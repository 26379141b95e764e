//! Gift link extraction, slug splitting, and per-batch dedup.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::pipeline::types::GiftReference;

/// `t.me/nft/<slug>`, optional scheme, host matched case-insensitively.
static LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:https?://)?t\.me/nft/([A-Za-z0-9_-]+)").expect("valid link regex")
});

/// Find every gift link in `text`, then in `button_urls`.
///
/// Text matches are normalized to `https://t.me/nft/<slug>`; button URLs
/// that contain a link are appended unchanged.
pub fn extract_references(text: &str, button_urls: &[String]) -> Vec<String> {
    let mut links: Vec<String> = LINK_RE
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|slug| format!("https://t.me/nft/{}", slug.as_str()))
        .collect();

    links.extend(
        button_urls
            .iter()
            .filter(|url| LINK_RE.is_match(url))
            .cloned(),
    );
    links
}

/// Split `"LunarSnake-116780"` into `("LunarSnake", Some(116780))`.
///
/// Only an all-digit final segment after a non-empty base counts as a
/// serial; otherwise the whole slug is the base.
pub fn split_slug(full_slug: &str) -> (String, Option<u64>) {
    if let Some((base, last)) = full_slug.rsplit_once('-') {
        if !base.is_empty() && !last.is_empty() && last.chars().all(|c| c.is_ascii_digit()) {
            if let Ok(serial) = last.parse::<u64>() {
                return (base.to_string(), Some(serial));
            }
        }
    }
    (full_slug.to_string(), None)
}

impl GiftReference {
    /// Parse the first gift link found in `link`.
    pub fn parse(link: &str) -> Option<Self> {
        let full_slug = LINK_RE.captures(link)?.get(1)?.as_str().to_string();
        let (base_collection, serial) = split_slug(&full_slug);
        Some(Self {
            raw_link: link.to_string(),
            full_slug,
            base_collection,
            serial,
        })
    }

    /// Slug form the gateway expects.
    pub fn lookup_slug(&self) -> String {
        self.full_slug.to_lowercase()
    }
}

/// Drop repeated links, keeping first occurrences in order.
///
/// Scoped to one batch: nothing is remembered between calls.
pub fn dedupe(links: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::with_capacity(links.len());
    links
        .into_iter()
        .filter(|link| seen.insert(link.clone()))
        .collect()
}
