//! Shared types for the gift evaluation pipeline.

use std::collections::BTreeSet;
use std::fmt;
use std::io::{self, Write};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::GatewayError;

// ── Intake batch ────────────────────────────────────────────────────

/// One unit of intake: a single feed post or a single manual input line.
///
/// Dedup never reaches past a batch.
#[derive(Debug, Clone)]
pub struct IntakeBatch {
    pub id: Uuid,
    /// Source name: "feed" or "stdin".
    pub source: String,
    pub text: String,
    /// URLs of inline buttons attached to the post.
    pub button_urls: Vec<String>,
    pub received_at: DateTime<Utc>,
}

impl IntakeBatch {
    pub fn new(source: &str, text: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            source: source.to_string(),
            text: text.to_string(),
            button_urls: Vec::new(),
            received_at: Utc::now(),
        }
    }

    pub fn with_button_urls(mut self, urls: Vec<String>) -> Self {
        self.button_urls = urls;
        self
    }
}

// ── Gift reference ──────────────────────────────────────────────────

/// A parsed `t.me/nft/<slug>` reference.
///
/// Built by `GiftReference::parse`; never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GiftReference {
    /// The link exactly as it was extracted.
    pub raw_link: String,
    /// Slug as it appears in the link, case preserved (e.g. "LunarSnake-55").
    pub full_slug: String,
    /// Slug without the trailing serial number.
    pub base_collection: String,
    /// Trailing serial number, if the slug has one.
    pub serial: Option<u64>,
}

// ── Attribute records ───────────────────────────────────────────────

/// Semantic kind of an attribute record, derived from its type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeKind {
    Model,
    Backdrop,
    Pattern,
    Other,
}

impl AttributeKind {
    /// Classify a type tag like `"StarGiftAttributeModel"` (case-insensitive).
    pub fn classify(type_tag: &str) -> Self {
        let tag = type_tag.to_lowercase();
        if tag.contains("model") {
            Self::Model
        } else if tag.contains("backdrop") {
            Self::Backdrop
        } else if tag.contains("pattern") {
            Self::Pattern
        } else {
            Self::Other
        }
    }
}

/// One entry of a gift's attribute list.
///
/// Deserialized from a JSON object whose `_` key carries the type tag.
/// Every other key is recorded in `fields`, including keys whose value is
/// `null`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "Map<String, Value>")]
pub struct AttributeRecord {
    pub type_tag: String,
    pub name: Option<String>,
    pub fields: BTreeSet<String>,
}

impl AttributeRecord {
    pub fn new(type_tag: impl Into<String>, name: Option<&str>) -> Self {
        let mut fields = BTreeSet::new();
        if name.is_some() {
            fields.insert("name".to_string());
        }
        Self {
            type_tag: type_tag.into(),
            name: name.map(String::from),
            fields,
        }
    }

    /// Mark a field as present on the record.
    pub fn with_field(mut self, field: &str) -> Self {
        self.fields.insert(field.to_string());
        self
    }

    pub fn kind(&self) -> AttributeKind {
        AttributeKind::classify(&self.type_tag)
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.fields.contains(field)
    }
}

impl From<Map<String, Value>> for AttributeRecord {
    fn from(map: Map<String, Value>) -> Self {
        let type_tag = map
            .get("_")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let name = map.get("name").and_then(Value::as_str).map(String::from);
        let fields = map.keys().filter(|k| k.as_str() != "_").cloned().collect();
        Self {
            type_tag,
            name,
            fields,
        }
    }
}

/// The three named attributes the filters look at.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeSet {
    pub model: Option<String>,
    pub backdrop: Option<String>,
    /// Taken from the "pattern" attribute.
    pub symbol: Option<String>,
}

// ── Owner representations ───────────────────────────────────────────

/// A peer-shaped value found in one of the gift's owner fields.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum PeerRepr {
    /// Bare numeric user id.
    Id(i64),
    Tagged(TaggedPeer),
    /// Anything else; never yields an owner id.
    Unrecognized(Value),
}

/// Peer objects distinguished by their `_` type tag.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "_")]
pub enum TaggedPeer {
    PeerUser {
        user_id: i64,
    },
    InputPeerUser {
        user_id: i64,
        #[serde(default)]
        access_hash: i64,
    },
    User {
        id: i64,
    },
    /// Channels, chats and other non-user peers.
    #[serde(other)]
    Other,
}

impl PeerRepr {
    /// The user id this representation points at, if it is a user.
    pub fn user_id(&self) -> Option<i64> {
        match self {
            Self::Id(id) => Some(*id),
            Self::Tagged(TaggedPeer::PeerUser { user_id })
            | Self::Tagged(TaggedPeer::InputPeerUser { user_id, .. }) => Some(*user_id),
            Self::Tagged(TaggedPeer::User { id }) => Some(*id),
            Self::Tagged(TaggedPeer::Other) | Self::Unrecognized(_) => None,
        }
    }
}

/// Nested `owner` object some gift payloads carry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct OwnerObject {
    /// Outer `None`: key absent. `Some(None)`: key present but null.
    #[serde(default, deserialize_with = "present_key")]
    pub user_id: Option<Option<i64>>,
    #[serde(default)]
    pub id: Option<i64>,
}

fn present_key<'de, D>(deserializer: D) -> Result<Option<Option<i64>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<i64>::deserialize(deserializer).map(Some)
}

// ── Gift object ─────────────────────────────────────────────────────

/// A resolved unique gift as returned by `getUniqueStarGift`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UniqueGift {
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub num: Option<u64>,
    #[serde(default)]
    pub attributes: Vec<AttributeRecord>,
    #[serde(default)]
    pub owner_id: Option<PeerRepr>,
    #[serde(default)]
    pub seller_id: Option<PeerRepr>,
    #[serde(default)]
    pub user_id: Option<PeerRepr>,
    #[serde(default)]
    pub from_id: Option<PeerRepr>,
    #[serde(default)]
    pub owner: Option<OwnerObject>,
}

// ── Message metadata status ─────────────────────────────────────────

/// Whether a gift appears to carry a sender note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageMetaStatus {
    Yes,
    No,
    /// No metadata found, but the owner could not be inspected either.
    Probably,
}

impl MessageMetaStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Yes => "yes",
            Self::No => "no",
            Self::Probably => "probably",
        }
    }
}

impl fmt::Display for MessageMetaStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Peers and payments ──────────────────────────────────────────────

/// A resolved owner profile.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Identity {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
}

/// A sendable/payable target, opaque to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Peer(Value);

impl Peer {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// The operator's own account.
    pub fn input_self() -> Self {
        Self(serde_json::json!({ "_": "InputPeerSelf" }))
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

/// An operator-supplied peer identifier, parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum PeerQuery {
    Username(String),
    Id(i64),
    Raw(String),
}

impl PeerQuery {
    /// Parse `@handle`, a (possibly negative) numeric id, or anything else.
    pub fn parse(input: &str) -> Result<Self, GatewayError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(GatewayError::InvalidPeer("empty peer".into()));
        }
        if input.starts_with('@') {
            return Ok(Self::Username(input.to_string()));
        }
        let digits = input.strip_prefix('-').unwrap_or(input);
        if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
            if let Ok(id) = input.parse::<i64>() {
                return Ok(Self::Id(id));
            }
        }
        Ok(Self::Raw(input.to_string()))
    }
}

impl fmt::Display for PeerQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Username(s) | Self::Raw(s) => f.write_str(s),
            Self::Id(id) => write!(f, "{id}"),
        }
    }
}

/// Resale purchase request for one gift.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResaleInvoice {
    /// Lowercased slug.
    pub slug: String,
    #[serde(rename = "to_id")]
    pub to_peer: Peer,
    /// Pay in TON rather than Stars.
    pub ton: bool,
}

/// First phase of a purchase.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PaymentForm {
    pub form_id: i64,
}

/// Outcome reported by the payment service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PurchaseResult {
    #[serde(rename = "_", default)]
    pub kind: String,
}

// ── Collaborator traits ─────────────────────────────────────────────

/// Network capabilities the engine consumes. Pure I/O, no decisions.
#[async_trait]
pub trait GiftGateway: Send + Sync {
    /// Full attribute data for one (lowercased) slug.
    async fn fetch_gift(&self, slug: &str) -> Result<UniqueGift, GatewayError>;

    /// Best-effort lookup of a gift holder's profile.
    async fn resolve_owner(&self, owner_id: i64) -> Result<Option<Identity>, GatewayError>;

    async fn resolve_peer(&self, query: &PeerQuery) -> Result<Peer, GatewayError>;

    /// The operator's own peer; requires no lookup.
    fn self_peer(&self) -> Peer {
        Peer::input_self()
    }

    async fn send_message(&self, peer: &Peer, text: &str) -> Result<(), GatewayError>;

    async fn get_payment_form(
        &self,
        invoice: &ResaleInvoice,
    ) -> Result<PaymentForm, GatewayError>;

    async fn send_payment_form(
        &self,
        form_id: i64,
        invoice: &ResaleInvoice,
    ) -> Result<PurchaseResult, GatewayError>;
}

/// Where print-branch summary lines always go.
pub trait LogSink: Send + Sync {
    fn log_line(&self, text: &str);
}

/// Writes each summary line once to a console stream (stdout by default).
pub struct ConsoleSink<W = io::Stdout> {
    out: Mutex<W>,
}

impl ConsoleSink {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> ConsoleSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<W: Write + Send> LogSink for ConsoleSink<W> {
    fn log_line(&self, text: &str) {
        let mut out = self.out.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Err(e) = writeln!(out, "{text}").and_then(|()| out.flush()) {
            tracing::warn!(error = %e, "Failed to write summary line");
        }
    }
}
