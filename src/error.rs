//! Error types for gift-hunter.

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Errors from the external gift/peer/payment gateway.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Gateway call {method} failed: {reason}")]
    RequestFailed { method: String, reason: String },

    #[error("Gateway call {method} returned an error: {description}")]
    Rejected { method: String, description: String },

    #[error("Invalid response from {method}: {reason}")]
    InvalidResponse { method: String, reason: String },

    #[error("Invalid peer identifier: {0}")]
    InvalidPeer(String),
}

/// Intake channel errors.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Channel {name} failed to start: {reason}")]
    StartupFailed { name: String, reason: String },
}

/// Failures while acting on a matched gift.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("No gift recipient configured")]
    NoRecipient,

    #[error("Could not resolve peer '{peer}': {source}")]
    PeerResolution {
        peer: String,
        #[source]
        source: GatewayError,
    },

    #[error("Failed to deliver notification for {slug}: {source}")]
    SendFailed {
        slug: String,
        #[source]
        source: GatewayError,
    },

    #[error("Purchase failed for {slug}: {source}")]
    PurchaseFailed {
        slug: String,
        #[source]
        source: GatewayError,
    },
}
