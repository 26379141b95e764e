//! Policy gate over message-metadata status.

use crate::config::MessageMetaPolicy;
use crate::pipeline::types::MessageMetaStatus;

impl MessageMetaPolicy {
    /// `Require` wants a clear `Yes`, `Exclude` a confident `No`.
    pub fn allows(&self, status: MessageMetaStatus) -> bool {
        match self {
            Self::Any => true,
            Self::Require => status == MessageMetaStatus::Yes,
            Self::Exclude => status == MessageMetaStatus::No,
        }
    }
}

/// Free-function form of [`MessageMetaPolicy::allows`].
pub fn allowed(status: MessageMetaStatus, policy: MessageMetaPolicy) -> bool {
    policy.allows(status)
}

/// Purchase-only veto: an ambiguous status never buys under a non-`Any` policy.
///
/// Checked by the dispatcher after the gate; print mode ignores it.
pub fn buy_vetoed(status: MessageMetaStatus, policy: MessageMetaPolicy) -> bool {
    status == MessageMetaStatus::Probably && policy != MessageMetaPolicy::Any
}
