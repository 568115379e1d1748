//! Adapter trait and error types.
//!
//! An adapter bridges one chat protocol to the dispatch engine. The engine
//! only needs the outbound half specified here; how events are read off the
//! wire and turned into [`InboundMessage`](crate::InboundMessage)s is the
//! adapter's own business.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::envelope::Envelope;

/// Errors that can occur delivering an outbound action.
#[derive(Debug, Clone, Error)]
pub enum AdapterError {
    /// The adapter is not connected to its backend.
    #[error("adapter is not connected")]
    NotConnected,

    /// Delivery failed.
    #[error("failed to send message: {0}")]
    SendFailed(String),

    /// Internal adapter error.
    #[error("adapter error: {0}")]
    Internal(String),
}

impl AdapterError {
    /// Creates a send failure.
    pub fn send_failed(msg: impl Into<String>) -> Self {
        Self::SendFailed(msg.into())
    }

    /// Creates an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

/// Result type for adapter operations.
pub type AdapterResult<T> = Result<T, AdapterError>;

/// The outbound interface a chat protocol exposes to the engine.
///
/// Every method receives the [`Envelope`] describing where the action is
/// addressed and the ordered strings to deliver. These are invoked as the
/// terminal step of the response middleware chain, so the strings may have
/// been rewritten by middleware on the way here.
///
/// `emote` and `locked` fall back to plain `send` for protocols without a
/// native equivalent, mirroring how most chat backends degrade.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Returns the adapter name (e.g. "shell", "irc").
    fn name(&self) -> &str;

    /// Delivers plain messages to the envelope's room.
    async fn send(&self, envelope: &Envelope, strings: &[String]) -> AdapterResult<()>;

    /// Delivers messages addressed to the envelope's user.
    async fn reply(&self, envelope: &Envelope, strings: &[String]) -> AdapterResult<()>;

    /// Sets the room topic.
    async fn topic(&self, envelope: &Envelope, strings: &[String]) -> AdapterResult<()>;

    /// Plays sounds, for protocols that support it.
    async fn play(&self, envelope: &Envelope, strings: &[String]) -> AdapterResult<()>;

    /// Delivers emotes. Defaults to plain `send`.
    async fn emote(&self, envelope: &Envelope, strings: &[String]) -> AdapterResult<()> {
        self.send(envelope, strings).await
    }

    /// Delivers messages to a locked room. Defaults to plain `send`.
    async fn locked(&self, envelope: &Envelope, strings: &[String]) -> AdapterResult<()> {
        self.send(envelope, strings).await
    }
}

/// A shared adapter trait object.
pub type BoxedAdapter = Arc<dyn Adapter>;
