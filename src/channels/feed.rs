//! Feed listener — long-polls the gateway for posts in the watched feed.
//!
//! Each post becomes one batch: its text (or caption) plus the URLs of any
//! inline buttons attached to it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::channels::{BatchStream, IntakeSource};
use crate::config::GatewayConfig;
use crate::error::ChannelError;
use crate::gateway::HttpGateway;
use crate::pipeline::types::{GiftGateway, IntakeBatch, PeerQuery};

/// Pause after a failed poll before polling again.
const POLL_ERROR_PAUSE: Duration = Duration::from_secs(5);

pub struct FeedListener {
    gateway: Arc<HttpGateway>,
    feed_chat: String,
    poll_timeout: Duration,
}

impl FeedListener {
    pub fn new(gateway: Arc<HttpGateway>, config: &GatewayConfig) -> Self {
        Self {
            gateway,
            feed_chat: config.feed_chat.clone(),
            poll_timeout: config.poll_timeout,
        }
    }

    fn feed_query(&self) -> PeerQuery {
        match self.feed_chat.parse::<i64>() {
            Ok(id) => PeerQuery::Id(id),
            Err(_) => PeerQuery::Username(format!("@{}", self.feed_chat)),
        }
    }
}

#[async_trait]
impl IntakeSource for FeedListener {
    fn name(&self) -> &str {
        "feed"
    }

    async fn start(&self) -> Result<BatchStream, ChannelError> {
        self.gateway
            .resolve_peer(&self.feed_query())
            .await
            .map_err(|e| ChannelError::StartupFailed {
                name: "feed".into(),
                reason: format!("cannot resolve feed '{}': {e}", self.feed_chat),
            })?;

        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let gateway = Arc::clone(&self.gateway);
        let feed_chat = self.feed_chat.clone();
        let poll_timeout = self.poll_timeout;

        tokio::spawn(async move {
            let mut offset: i64 = 0;

            tracing::info!(feed = %feed_chat, "Feed listener polling for posts...");

            loop {
                let updates = match gateway.get_updates(offset, poll_timeout).await {
                    Ok(updates) => updates,
                    Err(e) => {
                        tracing::warn!("Feed poll error: {e}");
                        tokio::time::sleep(POLL_ERROR_PAUSE).await;
                        continue;
                    }
                };

                for update in &updates {
                    // Advance offset past this update
                    if let Some(uid) = update.get("update_id").and_then(Value::as_i64) {
                        offset = uid + 1;
                    }

                    let Some(batch) = batch_from_update(update, &feed_chat) else {
                        continue;
                    };

                    if tx.send(batch).is_err() {
                        tracing::info!("Feed listener channel closed");
                        return;
                    }
                }
            }
        });

        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|batch| (batch, rx))
        });

        Ok(Box::pin(stream))
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a batch from a `channel_post`/`message` update in the watched feed.
fn batch_from_update(update: &Value, feed_chat: &str) -> Option<IntakeBatch> {
    let post = update
        .get("channel_post")
        .or_else(|| update.get("message"))?;

    let chat = post.get("chat")?;
    let username_matches = chat
        .get("username")
        .and_then(Value::as_str)
        .is_some_and(|u| u.eq_ignore_ascii_case(feed_chat));
    let id_matches = chat
        .get("id")
        .and_then(Value::as_i64)
        .is_some_and(|id| id.to_string() == feed_chat);
    if !username_matches && !id_matches {
        return None;
    }

    let text = post
        .get("text")
        .or_else(|| post.get("caption"))
        .and_then(Value::as_str)
        .unwrap_or_default();
    let button_urls = inline_button_urls(post);

    if text.is_empty() && button_urls.is_empty() {
        return None;
    }

    Some(IntakeBatch::new("feed", text).with_button_urls(button_urls))
}

/// URLs from `reply_markup.inline_keyboard`, row by row.
fn inline_button_urls(post: &Value) -> Vec<String> {
    post.get("reply_markup")
        .and_then(|m| m.get("inline_keyboard"))
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_array)
        .flatten()
        .filter_map(|button| button.get("url").and_then(Value::as_str))
        .map(String::from)
        .collect()
}
