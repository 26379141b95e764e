//! Action dispatcher — prints or buys a gift that already passed the
//! filters and the policy gate.
//!
//! Print mode always writes the summary to the log sink and optionally
//! forwards it to a chat. Buy mode re-checks the ambiguous-status veto,
//! resolves the recipient, then runs the two-phase resale purchase.
//! Nothing here is retried.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::config::{ActionConfig, ActionMode, BuyRecipient, MessageMetaPolicy};
use crate::error::DispatchError;
use crate::pipeline::policy::buy_vetoed;
use crate::pipeline::types::{
    AttributeSet, GiftGateway, GiftReference, LogSink, MessageMetaStatus, Peer, PeerQuery,
    PurchaseResult, ResaleInvoice,
};

/// Placeholder for an absent attribute in summaries.
const MISSING: &str = "—";

/// What the dispatcher did with a gift.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Summary logged; `delivered` is whether it also reached the destination chat.
    Printed { delivered: bool },
    /// Buy mode refused an ambiguous classification.
    BuyVetoed,
    Purchased(PurchaseResult),
}

/// Human-readable one-gift summary.
pub fn format_summary(slug: &str, attrs: &AttributeSet, status: MessageMetaStatus) -> String {
    format!(
        "Gift found! {slug} →\nModel: {} | Backdrop: {} | Symbol: {} | Message: {status}",
        attrs.model.as_deref().unwrap_or(MISSING),
        attrs.backdrop.as_deref().unwrap_or(MISSING),
        attrs.symbol.as_deref().unwrap_or(MISSING),
    )
}

pub struct ActionDispatcher {
    gateway: Arc<dyn GiftGateway>,
    sink: Arc<dyn LogSink>,
    action: Arc<ActionConfig>,
    policy: MessageMetaPolicy,
}

impl ActionDispatcher {
    pub fn new(
        gateway: Arc<dyn GiftGateway>,
        sink: Arc<dyn LogSink>,
        action: Arc<ActionConfig>,
        policy: MessageMetaPolicy,
    ) -> Self {
        Self {
            gateway,
            sink,
            action,
            policy,
        }
    }

    /// Act on a gift. Callers must have checked filters and the policy gate.
    pub async fn dispatch(
        &self,
        reference: &GiftReference,
        attrs: &AttributeSet,
        status: MessageMetaStatus,
    ) -> Result<DispatchOutcome, DispatchError> {
        let line = format_summary(&reference.full_slug, attrs, status);
        self.sink.log_line(&line);

        match self.action.mode {
            ActionMode::Print => Ok(self.print(reference, &line).await),
            ActionMode::Buy => self.buy(reference, status).await,
        }
    }

    async fn print(&self, reference: &GiftReference, line: &str) -> DispatchOutcome {
        let Some(dest) = self.action.print_destination.as_deref() else {
            return DispatchOutcome::Printed { delivered: false };
        };

        let text = format!("{line}\n{}", reference.raw_link);
        let result = match self.resolve(dest).await {
            Ok(peer) => self
                .gateway
                .send_message(&peer, &text)
                .await
                .map_err(|source| DispatchError::SendFailed {
                    slug: reference.full_slug.clone(),
                    source,
                }),
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                info!(slug = %reference.full_slug, dest, "Summary forwarded");
                DispatchOutcome::Printed { delivered: true }
            }
            Err(e) => {
                error!(slug = %reference.full_slug, dest, error = %e, "Could not forward summary");
                DispatchOutcome::Printed { delivered: false }
            }
        }
    }

    async fn buy(
        &self,
        reference: &GiftReference,
        status: MessageMetaStatus,
    ) -> Result<DispatchOutcome, DispatchError> {
        let slug = &reference.full_slug;

        if buy_vetoed(status, self.policy) {
            warn!(
                slug = %slug,
                status = %status,
                policy = self.policy.as_str(),
                "Skipping purchase: message metadata is ambiguous"
            );
            return Ok(DispatchOutcome::BuyVetoed);
        }

        let to_peer = match self.action.buy_recipient.as_ref() {
            None => return Err(DispatchError::NoRecipient),
            Some(BuyRecipient::SelfPeer) => self.gateway.self_peer(),
            Some(BuyRecipient::Peer(recipient)) => self.resolve(recipient).await?,
        };

        let invoice = ResaleInvoice {
            slug: reference.lookup_slug(),
            to_peer,
            ton: self.action.pay_in_ton.unwrap_or(true),
        };

        let purchase_failed = |source| DispatchError::PurchaseFailed {
            slug: slug.clone(),
            source,
        };
        let form = self
            .gateway
            .get_payment_form(&invoice)
            .await
            .map_err(purchase_failed)?;
        let result = self
            .gateway
            .send_payment_form(form.form_id, &invoice)
            .await
            .map_err(purchase_failed)?;

        info!(slug = %slug, form_id = form.form_id, result = %result.kind, "Purchase submitted");
        Ok(DispatchOutcome::Purchased(result))
    }

    async fn resolve(&self, identifier: &str) -> Result<Peer, DispatchError> {
        let to_err = |source| DispatchError::PeerResolution {
            peer: identifier.to_string(),
            source,
        };
        let query = PeerQuery::parse(identifier).map_err(to_err)?;
        self.gateway.resolve_peer(&query).await.map_err(to_err)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::error::GatewayError;
    use crate::pipeline::types::{Identity, PaymentForm, UniqueGift};

    #[derive(Default)]
    struct RecordingGateway {
        calls: Mutex<Vec<String>>,
        fail_send: bool,
        fail_form: bool,
    }

    impl RecordingGateway {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }
    }

    #[async_trait]
    impl GiftGateway for RecordingGateway {
        async fn fetch_gift(&self, _slug: &str) -> Result<UniqueGift, GatewayError> {
            Ok(UniqueGift::default())
        }
        async fn resolve_owner(&self, _id: i64) -> Result<Option<Identity>, GatewayError> {
            Ok(None)
        }
        async fn resolve_peer(&self, query: &PeerQuery) -> Result<Peer, GatewayError> {
            self.record(format!("resolve_peer:{query}"));
            Ok(Peer::new(serde_json::json!({ "_": "InputPeerUser", "user_id": 1 })))
        }
        async fn send_message(&self, _peer: &Peer, text: &str) -> Result<(), GatewayError> {
            self.record(format!("send_message:{text}"));
            if self.fail_send {
                return Err(GatewayError::RequestFailed {
                    method: "sendMessage".into(),
                    reason: "boom".into(),
                });
            }
            Ok(())
        }
        async fn get_payment_form(
            &self,
            invoice: &ResaleInvoice,
        ) -> Result<PaymentForm, GatewayError> {
            self.record(format!("get_payment_form:{}:{}", invoice.slug, invoice.ton));
            if self.fail_form {
                return Err(GatewayError::Rejected {
                    method: "getPaymentForm".into(),
                    description: "STARGIFT_NOT_FOUND".into(),
                });
            }
            Ok(PaymentForm { form_id: 9 })
        }
        async fn send_payment_form(
            &self,
            form_id: i64,
            _invoice: &ResaleInvoice,
        ) -> Result<PurchaseResult, GatewayError> {
            self.record(format!("send_payment_form:{form_id}"));
            Ok(PurchaseResult {
                kind: "PaymentResult".into(),
            })
        }
    }

    #[derive(Default)]
    struct RecordingSink(Mutex<Vec<String>>);

    impl LogSink for RecordingSink {
        fn log_line(&self, text: &str) {
            self.0.lock().unwrap().push(text.to_string());
        }
    }

    fn reference() -> GiftReference {
        GiftReference::parse("https://t.me/nft/LunarSnake-55").unwrap()
    }

    fn dispatcher(
        gateway: Arc<RecordingGateway>,
        sink: Arc<RecordingSink>,
        action: ActionConfig,
        policy: MessageMetaPolicy,
    ) -> ActionDispatcher {
        ActionDispatcher::new(gateway, sink, Arc::new(action), policy)
    }

    #[test]
    fn summary_uses_placeholders() {
        let attrs = AttributeSet {
            model: Some("Sugar Daddy".into()),
            ..Default::default()
        };
        let line = format_summary("LunarSnake-55", &attrs, MessageMetaStatus::Probably);
        assert!(line.contains("LunarSnake-55"));
        assert!(line.contains("Model: Sugar Daddy"));
        assert!(line.contains("Backdrop: —"));
        assert!(line.contains("Symbol: —"));
        assert!(line.ends_with("Message: probably"));
    }

    #[tokio::test]
    async fn print_without_destination_only_logs() {
        let gw = Arc::new(RecordingGateway::default());
        let sink = Arc::new(RecordingSink::default());
        let d = dispatcher(gw.clone(), sink.clone(), ActionConfig::default(), MessageMetaPolicy::Any);

        let outcome = d
            .dispatch(&reference(), &AttributeSet::default(), MessageMetaStatus::No)
            .await
            .unwrap();

        assert_eq!(outcome, DispatchOutcome::Printed { delivered: false });
        assert_eq!(sink.0.lock().unwrap().len(), 1);
        assert!(gw.calls().is_empty());
    }

    #[tokio::test]
    async fn print_forwards_line_and_link() {
        let gw = Arc::new(RecordingGateway::default());
        let sink = Arc::new(RecordingSink::default());
        let action = ActionConfig {
            print_destination: Some("@watchers".into()),
            ..Default::default()
        };
        let d = dispatcher(gw.clone(), sink, action, MessageMetaPolicy::Any);

        let outcome = d
            .dispatch(&reference(), &AttributeSet::default(), MessageMetaStatus::Yes)
            .await
            .unwrap();

        assert_eq!(outcome, DispatchOutcome::Printed { delivered: true });
        let calls = gw.calls();
        assert_eq!(calls[0], "resolve_peer:@watchers");
        assert!(calls[1].starts_with("send_message:Gift found! LunarSnake-55"));
        assert!(calls[1].ends_with("\nhttps://t.me/nft/LunarSnake-55"));
    }

    #[tokio::test]
    async fn print_delivery_failure_is_not_propagated() {
        let gw = Arc::new(RecordingGateway {
            fail_send: true,
            ..Default::default()
        });
        let sink = Arc::new(RecordingSink::default());
        let action = ActionConfig {
            print_destination: Some("12345".into()),
            ..Default::default()
        };
        let d = dispatcher(gw, sink.clone(), action, MessageMetaPolicy::Any);

        let outcome = d
            .dispatch(&reference(), &AttributeSet::default(), MessageMetaStatus::Yes)
            .await
            .unwrap();
        assert_eq!(outcome, DispatchOutcome::Printed { delivered: false });
        assert_eq!(sink.0.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn print_mode_never_vetoes_probably() {
        let gw = Arc::new(RecordingGateway::default());
        let sink = Arc::new(RecordingSink::default());
        let d = dispatcher(gw, sink, ActionConfig::default(), MessageMetaPolicy::Require);
        let outcome = d
            .dispatch(&reference(), &AttributeSet::default(), MessageMetaStatus::Probably)
            .await
            .unwrap();
        assert_eq!(outcome, DispatchOutcome::Printed { delivered: false });
    }

    fn buy_action(recipient: Option<BuyRecipient>, pay_in_ton: Option<bool>) -> ActionConfig {
        ActionConfig {
            mode: ActionMode::Buy,
            print_destination: None,
            buy_recipient: recipient,
            pay_in_ton,
        }
    }

    #[tokio::test]
    async fn buy_vetoes_probably_under_strict_policies() {
        for policy in [MessageMetaPolicy::Require, MessageMetaPolicy::Exclude] {
            let gw = Arc::new(RecordingGateway::default());
            let sink = Arc::new(RecordingSink::default());
            let d = dispatcher(
                gw.clone(),
                sink,
                buy_action(Some(BuyRecipient::SelfPeer), None),
                policy,
            );
            let outcome = d
                .dispatch(&reference(), &AttributeSet::default(), MessageMetaStatus::Probably)
                .await
                .unwrap();
            assert_eq!(outcome, DispatchOutcome::BuyVetoed);
            assert!(gw.calls().is_empty());
        }
    }

    #[tokio::test]
    async fn buy_for_self_skips_peer_lookup() {
        let gw = Arc::new(RecordingGateway::default());
        let sink = Arc::new(RecordingSink::default());
        let d = dispatcher(
            gw.clone(),
            sink,
            buy_action(Some(BuyRecipient::SelfPeer), None),
            MessageMetaPolicy::Any,
        );
        let outcome = d
            .dispatch(&reference(), &AttributeSet::default(), MessageMetaStatus::Probably)
            .await
            .unwrap();

        assert!(matches!(outcome, DispatchOutcome::Purchased(ref r) if r.kind == "PaymentResult"));
        assert_eq!(
            gw.calls(),
            vec![
                "get_payment_form:lunarsnake-55:true".to_string(),
                "send_payment_form:9".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn buy_for_peer_resolves_and_honors_currency() {
        let gw = Arc::new(RecordingGateway::default());
        let sink = Arc::new(RecordingSink::default());
        let d = dispatcher(
            gw.clone(),
            sink,
            buy_action(Some(BuyRecipient::Peer("@friend".into())), Some(false)),
            MessageMetaPolicy::Exclude,
        );
        d.dispatch(&reference(), &AttributeSet::default(), MessageMetaStatus::No)
            .await
            .unwrap();
        assert_eq!(
            gw.calls(),
            vec![
                "resolve_peer:@friend".to_string(),
                "get_payment_form:lunarsnake-55:false".to_string(),
                "send_payment_form:9".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn buy_without_recipient_aborts() {
        let gw = Arc::new(RecordingGateway::default());
        let sink = Arc::new(RecordingSink::default());
        let d = dispatcher(gw.clone(), sink, buy_action(None, None), MessageMetaPolicy::Any);
        let err = d
            .dispatch(&reference(), &AttributeSet::default(), MessageMetaStatus::Yes)
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::NoRecipient));
        assert!(gw.calls().is_empty());
    }

    #[tokio::test]
    async fn payment_form_failure_stops_before_submit() {
        let gw = Arc::new(RecordingGateway {
            fail_form: true,
            ..Default::default()
        });
        let sink = Arc::new(RecordingSink::default());
        let d = dispatcher(
            gw.clone(),
            sink,
            buy_action(Some(BuyRecipient::SelfPeer), None),
            MessageMetaPolicy::Any,
        );
        let err = d
            .dispatch(&reference(), &AttributeSet::default(), MessageMetaStatus::Yes)
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::PurchaseFailed { ref slug, .. } if slug == "LunarSnake-55"));
        assert_eq!(gw.calls().len(), 1);
    }
}
