//! Response publisher port
//!
//! Outbound messages go back to the topic the request arrived on.

use async_trait::async_trait;
use relay_domain::{OutboundMessage, SessionKey};
use thiserror::Error;

/// Errors that can occur while publishing a response
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("Failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Transport error: {0}")]
    Transport(String),
}

/// Sends [`OutboundMessage`]s to clients.
///
/// Publishing is fire-and-forget from the relay's point of view: a failed
/// publish is logged and the request carries on.
#[async_trait]
pub trait ResponsePublisher: Send + Sync {
    async fn publish(&self, topic: &SessionKey, message: &OutboundMessage)
    -> Result<(), PublishError>;
}
