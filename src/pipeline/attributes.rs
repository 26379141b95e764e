//! Model / backdrop / symbol extraction from a gift's attribute list.

use crate::pipeline::types::{AttributeKind, AttributeSet, UniqueGift};

/// Scan attribute records in order; the first named record of each kind wins.
///
/// Records without a non-empty name are skipped, as are kinds the filters
/// don't care about.
pub fn extract_attributes(gift: &UniqueGift) -> AttributeSet {
    let mut set = AttributeSet::default();

    for record in &gift.attributes {
        let Some(name) = record.name.as_deref().filter(|n| !n.is_empty()) else {
            continue;
        };

        let slot = match record.kind() {
            AttributeKind::Model => &mut set.model,
            AttributeKind::Backdrop => &mut set.backdrop,
            AttributeKind::Pattern => &mut set.symbol,
            AttributeKind::Other => continue,
        };

        if slot.is_none() {
            *slot = Some(name.to_string());
        }
    }

    set
}
