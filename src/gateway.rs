//! HTTP gateway — JSON-over-HTTP implementation of [`GiftGateway`].
//!
//! Every call is a `POST <base_url>/<method>` with a JSON body. Responses use
//! a Bot-API style envelope: `{"ok": true, "result": ...}` or
//! `{"ok": false, "description": "..."}`.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::pipeline::types::{
    GiftGateway, Identity, PaymentForm, Peer, PeerQuery, PurchaseResult, ResaleInvoice,
    UniqueGift,
};

/// Extra time on top of the long-poll timeout before the HTTP call gives up.
const POLL_GRACE: Duration = Duration::from_secs(10);

/// `payments.UniqueStarGift` wrapper around the gift itself.
#[derive(Debug, Deserialize)]
struct UniqueStarGiftResult {
    gift: UniqueGift,
}

pub struct HttpGateway {
    base_url: String,
    token: Option<SecretString>,
    client: reqwest::Client,
}

impl HttpGateway {
    pub fn new(config: &GatewayConfig) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self, method: &str) -> String {
        format!("{}/{method}", self.base_url)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: Value,
        timeout: Option<Duration>,
    ) -> Result<T, GatewayError> {
        let mut request = self.client.post(self.api_url(method)).json(&body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token.expose_secret());
        }
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let resp = request
            .send()
            .await
            .map_err(|e| GatewayError::RequestFailed {
                method: method.into(),
                reason: e.to_string(),
            })?;

        let status = resp.status();
        let data: Value = resp.json().await.map_err(|e| GatewayError::InvalidResponse {
            method: method.into(),
            reason: format!("HTTP {status}: {e}"),
        })?;

        parse_envelope(method, data)
    }

    /// Long-poll for feed updates after `offset`.
    pub async fn get_updates(
        &self,
        offset: i64,
        timeout: Duration,
    ) -> Result<Vec<Value>, GatewayError> {
        self.call(
            "getUpdates",
            json!({
                "offset": offset,
                "timeout": timeout.as_secs(),
                "allowed_updates": ["channel_post", "message"]
            }),
            Some(timeout + POLL_GRACE),
        )
        .await
    }
}

/// Unwrap the `{ok, result, description}` envelope.
fn parse_envelope<T: DeserializeOwned>(method: &str, data: Value) -> Result<T, GatewayError> {
    let ok = data.get("ok").and_then(Value::as_bool).unwrap_or(false);
    if !ok {
        let description = data
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or("unknown error")
            .to_string();
        return Err(GatewayError::Rejected {
            method: method.into(),
            description,
        });
    }

    let result = data.get("result").cloned().unwrap_or(Value::Null);
    serde_json::from_value(result).map_err(|e| GatewayError::InvalidResponse {
        method: method.into(),
        reason: e.to_string(),
    })
}

#[async_trait]
impl GiftGateway for HttpGateway {
    async fn fetch_gift(&self, slug: &str) -> Result<UniqueGift, GatewayError> {
        let result: UniqueStarGiftResult = self
            .call("getUniqueStarGift", json!({ "slug": slug }), None)
            .await?;
        Ok(result.gift)
    }

    async fn resolve_owner(&self, owner_id: i64) -> Result<Option<Identity>, GatewayError> {
        self.call("getUser", json!({ "id": owner_id }), None).await
    }

    async fn resolve_peer(&self, query: &PeerQuery) -> Result<Peer, GatewayError> {
        self.call("resolvePeer", json!({ "query": query }), None)
            .await
    }

    async fn send_message(&self, peer: &Peer, text: &str) -> Result<(), GatewayError> {
        let _: Value = self
            .call("sendMessage", json!({ "peer": peer, "text": text }), None)
            .await?;
        Ok(())
    }

    async fn get_payment_form(
        &self,
        invoice: &ResaleInvoice,
    ) -> Result<PaymentForm, GatewayError> {
        self.call("getPaymentForm", json!({ "invoice": invoice }), None)
            .await
    }

    async fn send_payment_form(
        &self,
        form_id: i64,
        invoice: &ResaleInvoice,
    ) -> Result<PurchaseResult, GatewayError> {
        self.call(
            "sendStarsForm",
            json!({ "form_id": form_id, "invoice": invoice }),
            None,
        )
        .await
    }
}
