//! Configuration types.
//!
//! Everything is read once at startup from the environment and frozen;
//! the engine only ever sees shared read-only references.

use std::collections::BTreeSet;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default feed the listener watches.
pub const DEFAULT_FEED_CHAT: &str = "giftmarketfeed";

/// Default long-poll timeout for the feed listener.
const DEFAULT_POLL_TIMEOUT_SECS: u64 = 30;

/// Operator rule on message metadata.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MessageMetaPolicy {
    #[default]
    Any,
    /// Only gifts that clearly carry a note.
    Require,
    /// Only gifts confidently without a note.
    Exclude,
}

impl MessageMetaPolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "" | "any" => Some(Self::Any),
            "require" => Some(Self::Require),
            "exclude" => Some(Self::Exclude),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::Require => "require",
            Self::Exclude => "exclude",
        }
    }
}

/// Attribute and collection filters. Empty sets mean "no constraint".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterConfig {
    /// Lowercased base collection names.
    pub collections: BTreeSet<String>,
    pub models: BTreeSet<String>,
    pub backdrops: BTreeSet<String>,
    pub symbols: BTreeSet<String>,
    pub message_meta_policy: MessageMetaPolicy,
}

/// What to do with a matching gift.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ActionMode {
    #[default]
    Print,
    Buy,
}

/// Who receives a purchased gift.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuyRecipient {
    /// The operator's own account.
    SelfPeer,
    /// `@handle` or numeric id.
    Peer(String),
}

impl BuyRecipient {
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.is_empty() {
            None
        } else if s.eq_ignore_ascii_case("self") || s.eq_ignore_ascii_case("me") {
            Some(Self::SelfPeer)
        } else {
            Some(Self::Peer(s.to_string()))
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionConfig {
    pub mode: ActionMode,
    /// Chat to forward print-mode summaries to. Console only when unset.
    pub print_destination: Option<String>,
    pub buy_recipient: Option<BuyRecipient>,
    /// Pay in TON instead of Stars. Unset means TON.
    pub pay_in_ton: Option<bool>,
}

/// Gateway and intake settings.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub token: Option<SecretString>,
    /// Username (without `@`) or numeric id of the watched feed.
    pub feed_chat: String,
    pub poll_timeout: Duration,
}

/// Everything read from the environment at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub filters: FilterConfig,
    pub action: ActionConfig,
    pub gateway: GatewayConfig,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let policy_raw = var("GIFT_MSG_META_POLICY").unwrap_or_default();
        let message_meta_policy =
            MessageMetaPolicy::parse(&policy_raw).ok_or_else(|| ConfigError::InvalidValue {
                key: "GIFT_MSG_META_POLICY".into(),
                message: format!("expected any, require or exclude, got '{policy_raw}'"),
            })?;

        let filters = FilterConfig {
            collections: csv_set(var("GIFT_COLLECTIONS").as_deref()),
            models: csv_set(var("GIFT_MODELS").as_deref()),
            backdrops: csv_set(var("GIFT_BACKDROPS").as_deref()),
            symbols: csv_set(var("GIFT_SYMBOLS").as_deref()),
            message_meta_policy,
        };

        let mode = match var("GIFT_ACTION_MODE").map(|m| m.to_lowercase()).as_deref() {
            None | Some("print") => ActionMode::Print,
            Some("buy") => ActionMode::Buy,
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    key: "GIFT_ACTION_MODE".into(),
                    message: format!("expected print or buy, got '{other}'"),
                });
            }
        };

        let pay_in_ton = match var("GIFT_PAY_IN_TON") {
            None => None,
            Some(raw) => Some(parse_bool(&raw).ok_or_else(|| ConfigError::InvalidValue {
                key: "GIFT_PAY_IN_TON".into(),
                message: format!("expected a boolean, got '{raw}'"),
            })?),
        };

        let buy_recipient = match var("GIFT_BUY_RECIPIENT") {
            Some(raw) => BuyRecipient::parse(&raw),
            None if mode == ActionMode::Buy => {
                tracing::warn!("GIFT_BUY_RECIPIENT not set; purchased gifts go to your own account");
                Some(BuyRecipient::SelfPeer)
            }
            None => None,
        };

        let action = ActionConfig {
            mode,
            print_destination: var("GIFT_PRINT_DEST"),
            buy_recipient,
            pay_in_ton,
        };

        let base_url = var("GIFT_GATEWAY_URL")
            .ok_or_else(|| ConfigError::MissingEnvVar("GIFT_GATEWAY_URL".into()))?;

        let poll_timeout_secs = match var("GIFT_POLL_TIMEOUT_SECS") {
            None => DEFAULT_POLL_TIMEOUT_SECS,
            Some(raw) => raw.parse::<u64>().map_err(|_| ConfigError::InvalidValue {
                key: "GIFT_POLL_TIMEOUT_SECS".into(),
                message: format!("expected seconds, got '{raw}'"),
            })?,
        };

        let gateway = GatewayConfig {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: var("GIFT_GATEWAY_TOKEN").map(SecretString::from),
            feed_chat: var("GIFT_FEED_CHAT")
                .map(|c| c.trim_start_matches('@').to_string())
                .unwrap_or_else(|| DEFAULT_FEED_CHAT.to_string()),
            poll_timeout: Duration::from_secs(poll_timeout_secs),
        };

        Ok(Self {
            filters,
            action,
            gateway,
        })
    }
}

/// Split a comma-separated list, trim, drop empties, lowercase.
pub fn csv_set(raw: Option<&str>) -> BTreeSet<String> {
    raw.unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn settings(vars: &[(&str, &str)]) -> Result<Settings, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn csv_set_trims_lowercases_and_drops_empties() {
        let set = csv_set(Some(" LunarSnake, StellarRocket ,, "));
        assert_eq!(
            set.into_iter().collect::<Vec<_>>(),
            vec!["lunarsnake".to_string(), "stellarrocket".to_string()]
        );
        assert!(csv_set(None).is_empty());
    }

    #[test]
    fn defaults_to_print_any_with_empty_filters() {
        let s = settings(&[("GIFT_GATEWAY_URL", "http://localhost:8081/")]).unwrap();
        assert_eq!(s.filters, FilterConfig::default());
        assert_eq!(s.action.mode, ActionMode::Print);
        assert!(s.action.buy_recipient.is_none());
        assert_eq!(s.gateway.base_url, "http://localhost:8081");
        assert_eq!(s.gateway.feed_chat, DEFAULT_FEED_CHAT);
        assert_eq!(s.gateway.poll_timeout, Duration::from_secs(30));
    }

    #[test]
    fn missing_gateway_url_is_an_error() {
        let err = settings(&[]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref k) if k == "GIFT_GATEWAY_URL"));
    }

    #[test]
    fn parses_buy_mode_settings() {
        let s = settings(&[
            ("GIFT_GATEWAY_URL", "http://gw"),
            ("GIFT_ACTION_MODE", "BUY"),
            ("GIFT_BUY_RECIPIENT", "@friend"),
            ("GIFT_PAY_IN_TON", "no"),
            ("GIFT_MSG_META_POLICY", "Exclude"),
            ("GIFT_MODELS", "Sugar Daddy"),
            ("GIFT_FEED_CHAT", "@otherfeed"),
        ])
        .unwrap();
        assert_eq!(s.action.mode, ActionMode::Buy);
        assert_eq!(
            s.action.buy_recipient,
            Some(BuyRecipient::Peer("@friend".into()))
        );
        assert_eq!(s.action.pay_in_ton, Some(false));
        assert_eq!(s.filters.message_meta_policy, MessageMetaPolicy::Exclude);
        assert!(s.filters.models.contains("sugar daddy"));
        assert_eq!(s.gateway.feed_chat, "otherfeed");
    }

    #[test]
    fn buy_mode_without_recipient_falls_back_to_self() {
        let s = settings(&[("GIFT_GATEWAY_URL", "http://gw"), ("GIFT_ACTION_MODE", "buy")])
            .unwrap();
        assert_eq!(s.action.buy_recipient, Some(BuyRecipient::SelfPeer));
    }

    #[test]
    fn rejects_unknown_policy_and_mode() {
        let err = settings(&[
            ("GIFT_GATEWAY_URL", "http://gw"),
            ("GIFT_MSG_META_POLICY", "maybe"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "GIFT_MSG_META_POLICY"));

        let err = settings(&[("GIFT_GATEWAY_URL", "http://gw"), ("GIFT_ACTION_MODE", "sell")])
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "GIFT_ACTION_MODE"));
    }

    #[test]
    fn buy_recipient_parse() {
        assert_eq!(BuyRecipient::parse("self"), Some(BuyRecipient::SelfPeer));
        assert_eq!(BuyRecipient::parse(" Me "), Some(BuyRecipient::SelfPeer));
        assert_eq!(
            BuyRecipient::parse("123"),
            Some(BuyRecipient::Peer("123".into()))
        );
        assert_eq!(BuyRecipient::parse("  "), None);
    }
}
