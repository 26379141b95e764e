//! Filter engine: collection and attribute matching.
//!
//! All four predicates are ANDed and each is vacuously true when its filter
//! set is empty. Evaluated in a fixed order (collections, models, backdrops,
//! symbols) with early exit on the first miss.

use std::collections::BTreeSet;

use tracing::debug;

use crate::config::FilterConfig;
use crate::pipeline::types::{AttributeSet, GiftReference};

/// Which filter rejected a gift.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterField {
    Collection,
    Model,
    Backdrop,
    Symbol,
}

impl FilterField {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Collection => "collection",
            Self::Model => "model",
            Self::Backdrop => "backdrop",
            Self::Symbol => "symbol",
        }
    }
}

/// True if the gift passes every configured filter.
pub fn matches(reference: &GiftReference, attrs: &AttributeSet, cfg: &FilterConfig) -> bool {
    first_mismatch(reference, attrs, cfg).is_none()
}

/// The first filter the gift fails, or `None` if it passes all of them.
pub fn first_mismatch(
    reference: &GiftReference,
    attrs: &AttributeSet,
    cfg: &FilterConfig,
) -> Option<FilterField> {
    let miss = if !collection_matches(&reference.base_collection, &cfg.collections) {
        Some(FilterField::Collection)
    } else if !contains_any(attrs.model.as_deref(), &cfg.models) {
        Some(FilterField::Model)
    } else if !contains_any(attrs.backdrop.as_deref(), &cfg.backdrops) {
        Some(FilterField::Backdrop)
    } else if !contains_any(attrs.symbol.as_deref(), &cfg.symbols) {
        Some(FilterField::Symbol)
    } else {
        None
    };

    if let Some(field) = miss {
        debug!(
            slug = %reference.full_slug,
            field = field.label(),
            "Gift rejected by filter"
        );
    }
    miss
}

/// Exact lowercase membership, falling back to substring containment.
fn collection_matches(base_collection: &str, collections: &BTreeSet<String>) -> bool {
    if collections.is_empty() {
        return true;
    }
    let base = base_collection.to_lowercase();
    collections.contains(&base) || collections.iter().any(|c| base.contains(c.as_str()))
}

/// Case-insensitive substring match of any needle; absent haystack is "".
fn contains_any(haystack: Option<&str>, needles: &BTreeSet<String>) -> bool {
    if needles.is_empty() {
        return true;
    }
    let h = haystack.unwrap_or_default().to_lowercase();
    needles.iter().any(|n| h.contains(n.as_str()))
}
