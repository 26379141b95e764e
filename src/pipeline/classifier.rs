//! Message-metadata classification and owner id probing.

use crate::pipeline::types::{MessageMetaStatus, PeerRepr, UniqueGift};

/// Type-tag fragments that indicate a personalized gift.
const METADATA_TAG_MARKERS: &[&str] = &["message", "greeting", "note", "sender", "recipient"];

/// Fields whose mere presence indicates a personalized gift.
const METADATA_FIELDS: &[&str] = &[
    "message",
    "text",
    "sender",
    "recipient",
    "from_id",
    "to_id",
    "sender_name",
    "recipient_name",
];

/// Presence-only heuristic: values are never inspected.
pub fn has_metadata(gift: &UniqueGift) -> bool {
    gift.attributes.iter().any(|record| {
        let tag = record.type_tag.to_lowercase();
        METADATA_TAG_MARKERS.iter().any(|m| tag.contains(m))
            || METADATA_FIELDS.iter().any(|f| record.has_field(f))
    })
}

/// `Yes` on evidence; otherwise `No` only if the owner could be inspected.
pub fn classify(gift: &UniqueGift, owner_resolved: bool) -> MessageMetaStatus {
    if has_metadata(gift) {
        MessageMetaStatus::Yes
    } else if owner_resolved {
        MessageMetaStatus::No
    } else {
        MessageMetaStatus::Probably
    }
}

/// Best guess at the current holder's user id.
///
/// The first of `owner_id`, `seller_id`, `user_id`, `from_id` that names a
/// user decides, even when that id is zero. Only if none does is the nested
/// `owner` object consulted: its `user_id` when the key is present, else
/// `id`. A zero result means no owner.
pub fn extract_owner_id(gift: &UniqueGift) -> Option<i64> {
    [&gift.owner_id, &gift.seller_id, &gift.user_id, &gift.from_id]
        .into_iter()
        .flatten()
        .find_map(PeerRepr::user_id)
        .or_else(|| {
            let owner = gift.owner.as_ref()?;
            match owner.user_id {
                Some(user_id) => user_id,
                None => owner.id,
            }
        })
        .filter(|id| *id != 0)
}
