//! Per-dispatch response handle.
//!
//! A [`Response`] is created for each matched listener (and once per
//! inbound message for the receive chain) and handed to the callback. It
//! binds the triggering message, the match value, and the derived
//! [`Envelope`], and exposes the outbound actions — each of which runs the
//! response middleware chain before reaching the adapter.

use std::sync::Arc;

use rand::seq::SliceRandom;
use tracing::debug;

use herald_core::{AdapterResult, Envelope, InboundMessage, User};

use crate::context::{ResponseContext, SendMethod};
use crate::listener::MatchData;
use crate::robot::Shared;

struct Inner {
    shared: Arc<Shared>,
    message: Arc<InboundMessage>,
    match_data: MatchData,
    envelope: Envelope,
}

/// The handle a matched callback answers through.
///
/// Cheap to clone; clones address the same dispatch. Not reused across
/// dispatches.
#[derive(Clone)]
pub struct Response {
    inner: Arc<Inner>,
}

impl Response {
    pub(crate) fn new(
        shared: Arc<Shared>,
        message: Arc<InboundMessage>,
        match_data: MatchData,
    ) -> Self {
        let envelope = Envelope::from_message(Arc::clone(&message));
        Self {
            inner: Arc::new(Inner {
                shared,
                message,
                match_data,
                envelope,
            }),
        }
    }

    /// The message that triggered this response.
    pub fn message(&self) -> &Arc<InboundMessage> {
        &self.inner.message
    }

    /// The match value the matcher produced (empty for the receive-chain
    /// response, which exists before any matching).
    pub fn match_data(&self) -> &MatchData {
        &self.inner.match_data
    }

    /// Where outbound actions from this response are addressed.
    pub fn envelope(&self) -> &Envelope {
        &self.inner.envelope
    }

    /// The user who triggered this response.
    pub fn user(&self) -> &User {
        self.inner.message.user()
    }

    /// Marks the triggering message as finished: listeners not yet offered
    /// the message are skipped.
    pub fn finish(&self) {
        self.inner.message.finish();
    }

    /// Picks a random element, for variety in canned replies.
    pub fn random<'a, T>(&self, choices: &'a [T]) -> Option<&'a T> {
        choices.choose(&mut rand::thread_rng())
    }

    // =========================================================================
    // Outbound actions
    // =========================================================================

    /// Sends plain messages to the room the message came from.
    pub async fn send<I, S>(&self, strings: I) -> AdapterResult<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.run(SendMethod::Send, strings).await
    }

    /// Sends emotes.
    pub async fn emote<I, S>(&self, strings: I) -> AdapterResult<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.run(SendMethod::Emote, strings).await
    }

    /// Replies, addressed to the triggering user.
    pub async fn reply<I, S>(&self, strings: I) -> AdapterResult<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.run(SendMethod::Reply, strings).await
    }

    /// Changes the room topic.
    pub async fn topic<I, S>(&self, strings: I) -> AdapterResult<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.run(SendMethod::Topic, strings).await
    }

    /// Plays sounds, where the protocol supports it.
    pub async fn play<I, S>(&self, strings: I) -> AdapterResult<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.run(SendMethod::Play, strings).await
    }

    /// Sends to a locked room.
    pub async fn locked<I, S>(&self, strings: I) -> AdapterResult<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.run(SendMethod::Locked, strings).await
    }

    /// Runs one outbound action through the response chain.
    ///
    /// The terminal step reads the (possibly rewritten) payload out of the
    /// context and calls the matching adapter method. An aborted chain
    /// means no adapter call and an `Ok` result; adapter failures are the
    /// caller's to handle.
    async fn run<I, S>(&self, method: SendMethod, strings: I) -> AdapterResult<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let strings: Vec<String> = strings.into_iter().map(Into::into).collect();
        let ctx = Arc::new(ResponseContext::new(self.clone(), method, strings));

        let shared = Arc::clone(&self.inner.shared);
        let outcome = shared
            .response_mw
            .execute(ctx, {
                let shared = Arc::clone(&self.inner.shared);
                move |ctx: Arc<ResponseContext>| async move {
                    let strings = ctx.strings();
                    let envelope = ctx.response.envelope();
                    debug!(
                        method = ctx.method.as_str(),
                        count = strings.len(),
                        "delivering outbound action"
                    );
                    match ctx.method {
                        SendMethod::Send => shared.adapter.send(envelope, &strings).await,
                        SendMethod::Emote => shared.adapter.emote(envelope, &strings).await,
                        SendMethod::Reply => shared.adapter.reply(envelope, &strings).await,
                        SendMethod::Topic => shared.adapter.topic(envelope, &strings).await,
                        SendMethod::Play => shared.adapter.play(envelope, &strings).await,
                        SendMethod::Locked => shared.adapter.locked(envelope, &strings).await,
                    }
                }
            })
            .await;

        // A middleware finishing the chain early is not a delivery error.
        outcome.unwrap_or(Ok(()))
    }
}

impl std::fmt::Debug for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Response")
            .field("room", &self.inner.envelope.room)
            .field("user", &self.inner.envelope.user.id)
            .field("match", &self.inner.match_data.full)
            .finish()
    }
}
