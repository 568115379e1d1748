//! Pipeline contexts.
//!
//! One context type per middleware chain, each carrying exactly what that
//! stage of the pipeline can see. Contexts are shared as `Arc`s across the
//! middleware of one execution; the only mutable slot is the outbound
//! string list on [`ResponseContext`], which middleware may rewrite or
//! replace wholesale.

use parking_lot::Mutex;
use std::sync::Arc;

use crate::listener::Listener;
use crate::response::Response;

/// Gives a middleware chain access to its context's response for error
/// reporting.
pub trait PipelineContext: Send + Sync + 'static {
    /// The response associated with this context, if one exists yet.
    fn response(&self) -> Option<&Response>;
}

// =============================================================================
// Receive pipeline
// =============================================================================

/// Context for the receive chain: runs once per inbound message, before
/// any matching.
pub struct ReceiveContext {
    /// A match-less response wrapping the inbound message. Middleware can
    /// use it to answer (or [`finish`](Response::finish)) a message before
    /// any listener sees it.
    pub response: Response,
}

impl PipelineContext for ReceiveContext {
    fn response(&self) -> Option<&Response> {
        Some(&self.response)
    }
}

// =============================================================================
// Listener pipeline
// =============================================================================

/// Context for the listener chain: runs once per listener whose matcher
/// succeeded, before its callback.
pub struct ListenerContext {
    /// The response the callback will receive.
    pub response: Response,
    /// The matched listener, exposing its id and options to middleware.
    pub listener: Arc<Listener>,
}

impl PipelineContext for ListenerContext {
    fn response(&self) -> Option<&Response> {
        Some(&self.response)
    }
}

// =============================================================================
// Response pipeline
// =============================================================================

/// Which outbound action a [`ResponseContext`] is carrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SendMethod {
    /// Plain message to the room.
    Send,
    /// Emote.
    Emote,
    /// Message addressed to the triggering user.
    Reply,
    /// Room topic change.
    Topic,
    /// Sound playback.
    Play,
    /// Message to a locked room.
    Locked,
}

impl SendMethod {
    /// Returns the method name as used in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            SendMethod::Send => "send",
            SendMethod::Emote => "emote",
            SendMethod::Reply => "reply",
            SendMethod::Topic => "topic",
            SendMethod::Play => "play",
            SendMethod::Locked => "locked",
        }
    }

    /// Whether the payload is plain text. Everything but `play` is.
    pub fn plaintext(self) -> bool {
        !matches!(self, SendMethod::Play)
    }
}

/// Context for the response chain: runs once per outbound action, before
/// the adapter call.
pub struct ResponseContext {
    /// The response performing the action.
    pub response: Response,
    /// Which outbound action this is.
    pub method: SendMethod,
    /// Whether the payload is plain text.
    pub plaintext: bool,
    /// The outgoing payload. Middleware may edit entries or replace the
    /// whole sequence; the adapter receives whatever is here when the
    /// terminal step runs.
    strings: Mutex<Vec<String>>,
}

impl ResponseContext {
    /// Creates a context for one outbound action.
    pub fn new(response: Response, method: SendMethod, strings: Vec<String>) -> Self {
        Self {
            response,
            method,
            plaintext: method.plaintext(),
            strings: Mutex::new(strings),
        }
    }

    /// Returns a snapshot of the current payload.
    pub fn strings(&self) -> Vec<String> {
        self.strings.lock().clone()
    }

    /// Replaces the payload wholesale.
    pub fn set_strings(&self, strings: Vec<String>) {
        *self.strings.lock() = strings;
    }

    /// Edits the payload in place.
    pub fn update_strings(&self, f: impl FnOnce(&mut Vec<String>)) {
        f(&mut self.strings.lock());
    }
}

impl PipelineContext for ResponseContext {
    fn response(&self) -> Option<&Response> {
        Some(&self.response)
    }
}
