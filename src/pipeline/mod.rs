//! Gift evaluation pipeline.
//!
//! Every intake batch flows through:
//! 1. `links` — find `t.me/nft/` references, dedupe within the batch
//! 2. `GiftGateway::fetch_gift()` — resolve attributes (network)
//! 3. `attributes` + `rules` — extract model/backdrop/symbol, apply filters
//! 4. `classifier` + `policy` — message-metadata status and the policy gate
//! 5. `dispatcher` — print or buy

pub mod attributes;
pub mod classifier;
pub mod dispatcher;
pub mod links;
pub mod policy;
pub mod processor;
pub mod rules;
pub mod types;
