//! Outbound addressing.

use std::sync::Arc;

use crate::message::InboundMessage;
use crate::user::User;

/// Where an outbound action should be delivered.
///
/// Derived from the triggering message when a `Response` is constructed;
/// adapters receive it with every outbound call.
#[derive(Debug, Clone)]
pub struct Envelope {
    /// The room to deliver to, if known.
    pub room: Option<String>,
    /// The user the action is addressed to.
    pub user: User,
    /// The message this envelope was derived from.
    pub message: Arc<InboundMessage>,
}

impl Envelope {
    /// Derives an envelope from an inbound message.
    pub fn from_message(message: Arc<InboundMessage>) -> Self {
        Self {
            room: message.room().map(str::to_owned),
            user: message.user().clone(),
            message,
        }
    }
}
