//! Inbound message model.
//!
//! A single [`InboundMessage`] is created per chat event and shared (via
//! `Arc`) with every listener for the duration of one dispatch cycle. The
//! variant lives in [`MessageBody`]; the only post-construction mutation is
//! the `done` flag, which short-circuits the listener loop once set.
//!
//! # Text capability
//!
//! Pattern-matching listeners only apply to messages that carry literal
//! text. That capability is queried with [`InboundMessage::text`] rather
//! than by inspecting the variant: both `Text` and `Topic` bodies answer
//! `Some`, everything else answers `None`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::user::User;

/// The variant payload of an inbound message.
#[derive(Debug, Clone)]
pub enum MessageBody {
    /// An event with no particular payload.
    Generic,
    /// A chat line with literal text and a protocol-stable id.
    Text {
        /// The literal message text.
        text: String,
        /// Protocol-level message id.
        id: String,
    },
    /// A user entered a room.
    Enter,
    /// A user left a room.
    Leave,
    /// A room topic change, carrying the new topic text.
    Topic {
        /// The new topic.
        text: String,
    },
    /// Wrapper produced by the dispatcher when no listener matched the
    /// original message. Dispatched exactly once per original.
    CatchAll {
        /// The message nothing matched.
        original: Arc<InboundMessage>,
    },
}

/// An inbound chat event, shared across one dispatch cycle.
#[derive(Debug)]
pub struct InboundMessage {
    user: User,
    body: MessageBody,
    /// Set via [`finish`](Self::finish); checked between listeners.
    done: AtomicBool,
}

impl InboundMessage {
    /// Creates a message with an explicit body.
    pub fn new(user: User, body: MessageBody) -> Self {
        Self {
            user,
            body,
            done: AtomicBool::new(false),
        }
    }

    /// Creates a plain event message with no payload.
    pub fn generic(user: User) -> Self {
        Self::new(user, MessageBody::Generic)
    }

    /// Creates a text message.
    pub fn text_message(user: User, text: impl Into<String>, id: impl Into<String>) -> Self {
        Self::new(
            user,
            MessageBody::Text {
                text: text.into(),
                id: id.into(),
            },
        )
    }

    /// Creates an enter event.
    pub fn enter(user: User) -> Self {
        Self::new(user, MessageBody::Enter)
    }

    /// Creates a leave event.
    pub fn leave(user: User) -> Self {
        Self::new(user, MessageBody::Leave)
    }

    /// Creates a topic-change event.
    pub fn topic(user: User, text: impl Into<String>) -> Self {
        Self::new(user, MessageBody::Topic { text: text.into() })
    }

    /// Wraps an unmatched message for the catch-all re-dispatch.
    ///
    /// The wrapper reuses the original sender so envelopes derived from it
    /// still address the right room.
    pub fn catch_all(original: Arc<InboundMessage>) -> Self {
        Self::new(
            original.user.clone(),
            MessageBody::CatchAll { original },
        )
    }

    /// Returns the sending user.
    pub fn user(&self) -> &User {
        &self.user
    }

    /// Returns the message body.
    pub fn body(&self) -> &MessageBody {
        &self.body
    }

    /// Returns the room this message arrived from, derived from the user.
    pub fn room(&self) -> Option<&str> {
        self.user.room.as_deref()
    }

    /// Returns the literal text for text-bearing variants.
    ///
    /// `Text` and `Topic` bodies carry matchable text; every other variant
    /// returns `None`, which keeps pattern listeners away from them.
    pub fn text(&self) -> Option<&str> {
        match &self.body {
            MessageBody::Text { text, .. } | MessageBody::Topic { text } => Some(text),
            _ => None,
        }
    }

    /// Returns the protocol message id, if this is a text message.
    pub fn id(&self) -> Option<&str> {
        match &self.body {
            MessageBody::Text { id, .. } => Some(id),
            _ => None,
        }
    }

    /// Returns the wrapped original for catch-all messages.
    pub fn original(&self) -> Option<&Arc<InboundMessage>> {
        match &self.body {
            MessageBody::CatchAll { original } => Some(original),
            _ => None,
        }
    }

    /// Returns `true` if this is a catch-all wrapper.
    ///
    /// The dispatcher uses this to bottom out the fallback recursion: a
    /// catch-all is never wrapped a second time.
    pub fn is_catch_all(&self) -> bool {
        matches!(self.body, MessageBody::CatchAll { .. })
    }

    /// Marks the message as finished.
    ///
    /// Listeners registered after the one that called this are skipped for
    /// the remainder of the dispatch cycle.
    pub fn finish(&self) {
        self.done.store(true, Ordering::SeqCst);
    }

    /// Returns `true` once [`finish`](Self::finish) has been called.
    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> User {
        User::new("1").with_name("alice").with_room("#general")
    }

    #[test]
    fn text_capability_covers_text_and_topic() {
        assert_eq!(
            InboundMessage::text_message(alice(), "hello", "m1").text(),
            Some("hello")
        );
        assert_eq!(
            InboundMessage::topic(alice(), "new topic").text(),
            Some("new topic")
        );
        assert_eq!(InboundMessage::enter(alice()).text(), None);
        assert_eq!(InboundMessage::leave(alice()).text(), None);
        assert_eq!(InboundMessage::generic(alice()).text(), None);
    }

    #[test]
    fn catch_all_keeps_original_and_user() {
        let original = Arc::new(InboundMessage::text_message(alice(), "nope", "m2"));
        let wrapper = InboundMessage::catch_all(Arc::clone(&original));

        assert!(wrapper.is_catch_all());
        assert!(!original.is_catch_all());
        assert_eq!(wrapper.user(), original.user());
        assert_eq!(
            wrapper.original().and_then(|m| m.text()),
            Some("nope")
        );
        // The wrapper itself carries no matchable text.
        assert_eq!(wrapper.text(), None);
    }

    #[test]
    fn finish_is_sticky() {
        let msg = InboundMessage::text_message(alice(), "stop", "m3");
        assert!(!msg.is_done());
        msg.finish();
        assert!(msg.is_done());
        msg.finish();
        assert!(msg.is_done());
    }

    #[test]
    fn room_derives_from_user() {
        let msg = InboundMessage::generic(alice());
        assert_eq!(msg.room(), Some("#general"));
        assert_eq!(InboundMessage::generic(User::new("2")).room(), None);
    }
}
