//! Gift processor — runs one intake batch through the whole pipeline.
//!
//! Flow per batch:
//! 1. Extract links from text and buttons, dedupe within the batch
//! 2. Per link: parse → fetch gift → extract attributes → filters
//! 3. Resolve owner → classify message metadata → policy gate
//! 4. Dispatch (print or buy)
//!
//! Every failure is scoped to its link; siblings keep going.

use std::sync::Arc;

use tracing::{Instrument, debug, error, info_span, warn};

use crate::config::{ActionConfig, FilterConfig};
use crate::error::DispatchError;
use crate::pipeline::attributes::extract_attributes;
use crate::pipeline::classifier::{classify, extract_owner_id};
use crate::pipeline::dispatcher::{ActionDispatcher, DispatchOutcome};
use crate::pipeline::links::{dedupe, extract_references};
use crate::pipeline::rules::first_mismatch;
use crate::pipeline::types::{
    GiftGateway, GiftReference, IntakeBatch, LogSink, MessageMetaStatus, PurchaseResult,
    UniqueGift,
};

/// What happened to one link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The link did not contain a usable reference.
    NoReference,
    /// Gift lookup failed; nothing was dispatched.
    LookupFailed,
    Filtered,
    PolicyDenied(MessageMetaStatus),
    Printed {
        status: MessageMetaStatus,
        delivered: bool,
    },
    BuyVetoed(MessageMetaStatus),
    NoRecipient,
    Purchased(PurchaseResult),
    DispatchFailed,
}

impl Outcome {
    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::NoReference => "no_reference",
            Self::LookupFailed => "lookup_failed",
            Self::Filtered => "filtered",
            Self::PolicyDenied(_) => "policy_denied",
            Self::Printed { .. } => "printed",
            Self::BuyVetoed(_) => "buy_vetoed",
            Self::NoRecipient => "no_recipient",
            Self::Purchased(_) => "purchased",
            Self::DispatchFailed => "dispatch_failed",
        }
    }
}

/// Shared, read-only engine. One instance serves every intake source.
pub struct GiftProcessor {
    gateway: Arc<dyn GiftGateway>,
    filters: Arc<FilterConfig>,
    dispatcher: ActionDispatcher,
}

impl GiftProcessor {
    pub fn new(
        gateway: Arc<dyn GiftGateway>,
        sink: Arc<dyn LogSink>,
        filters: Arc<FilterConfig>,
        action: Arc<ActionConfig>,
    ) -> Self {
        let dispatcher = ActionDispatcher::new(
            Arc::clone(&gateway),
            sink,
            action,
            filters.message_meta_policy,
        );
        Self {
            gateway,
            filters,
            dispatcher,
        }
    }

    /// Process every distinct link in a batch, in order.
    pub async fn process_batch(&self, batch: &IntakeBatch) -> Vec<(String, Outcome)> {
        let span = info_span!("batch", id = %batch.id, source = %batch.source);
        async {
            let links = dedupe(extract_references(&batch.text, &batch.button_urls));
            if links.is_empty() {
                debug!("No gift links in batch");
                return Vec::new();
            }
            debug!(count = links.len(), "Processing gift links");

            let mut results = Vec::with_capacity(links.len());
            for link in links {
                let outcome = self.process_link(&link).await;
                debug!(link = %link, outcome = outcome.label(), "Link processed");
                results.push((link, outcome));
            }
            results
        }
        .instrument(span)
        .await
    }

    /// Run a single link through lookup, evaluation, and dispatch.
    pub async fn process_link(&self, link: &str) -> Outcome {
        let Some(reference) = GiftReference::parse(link) else {
            return Outcome::NoReference;
        };

        let gift = match self.gateway.fetch_gift(&reference.lookup_slug()).await {
            Ok(gift) => gift,
            Err(e) => {
                warn!(slug = %reference.full_slug, error = %e, "Gift lookup failed");
                return Outcome::LookupFailed;
            }
        };

        self.evaluate(&reference, &gift).await
    }

    /// Evaluate an already-fetched gift and dispatch it if it qualifies.
    pub async fn evaluate(&self, reference: &GiftReference, gift: &UniqueGift) -> Outcome {
        let attrs = extract_attributes(gift);
        if first_mismatch(reference, &attrs, &self.filters).is_some() {
            return Outcome::Filtered;
        }

        let owner_resolved = self.owner_resolved(reference, gift).await;
        let status = classify(gift, owner_resolved);
        let policy = self.filters.message_meta_policy;

        if !policy.allows(status) {
            debug!(
                slug = %reference.full_slug,
                status = %status,
                policy = policy.as_str(),
                "Gift denied by message policy"
            );
            return Outcome::PolicyDenied(status);
        }

        debug!(slug = %reference.full_slug, status = %status, "Gift matched");

        match self.dispatcher.dispatch(reference, &attrs, status).await {
            Ok(DispatchOutcome::Printed { delivered }) => Outcome::Printed { status, delivered },
            Ok(DispatchOutcome::BuyVetoed) => Outcome::BuyVetoed(status),
            Ok(DispatchOutcome::Purchased(result)) => Outcome::Purchased(result),
            Err(DispatchError::NoRecipient) => {
                warn!(slug = %reference.full_slug, "No gift recipient configured, skipping");
                Outcome::NoRecipient
            }
            Err(e) => {
                error!(slug = %reference.full_slug, error = %e, "Dispatch failed");
                Outcome::DispatchFailed
            }
        }
    }

    /// Whether the holder's profile could be looked up.
    async fn owner_resolved(&self, reference: &GiftReference, gift: &UniqueGift) -> bool {
        let Some(owner_id) = extract_owner_id(gift) else {
            return false;
        };
        match self.gateway.resolve_owner(owner_id).await {
            Ok(identity) => identity.is_some(),
            Err(e) => {
                debug!(
                    slug = %reference.full_slug,
                    owner_id,
                    error = %e,
                    "Owner lookup failed"
                );
                false
            }
        }
    }
}
