//! Listeners: matcher + callback pairs.
//!
//! Every inbound message is offered to every registered listener in
//! registration order. A listener's matcher either declines (`None`) or
//! produces the owned match data its callback will see. On a hit the
//! listener chain runs first, with the callback as its terminal step;
//! middleware may veto the callback, but the listener still counts as
//! matched either way.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use regex::Regex;
use tracing::{debug, trace};

use herald_core::InboundMessage;

use crate::context::ListenerContext;
use crate::middleware::MiddlewareChain;
use crate::response::Response;
use crate::robot::Shared;

/// The truthy match value a matcher produces.
///
/// Owned capture data rather than a live regex match, so it can outlive
/// the matching pass and travel with the [`Response`]. Custom matchers can
/// fill `captures` with whatever their callbacks expect.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchData {
    /// The full matched text (capture group 0 for pattern matchers).
    pub full: String,
    /// Capture groups, group 0 included. `None` entries are groups that
    /// did not participate in the match.
    pub captures: Vec<Option<String>>,
}

impl MatchData {
    /// Builds owned match data from regex captures.
    pub fn from_captures(caps: &regex::Captures<'_>) -> Self {
        Self {
            full: caps
                .get(0)
                .map(|m| m.as_str().to_owned())
                .unwrap_or_default(),
            captures: caps
                .iter()
                .map(|m| m.map(|m| m.as_str().to_owned()))
                .collect(),
        }
    }

    /// Returns capture group `index`, if it participated in the match.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.captures.get(index).and_then(|c| c.as_deref())
    }
}

/// A predicate deciding whether a listener wants a message.
///
/// `None` is a non-match; `Some` carries the match value.
pub type Matcher = Arc<dyn Fn(&InboundMessage) -> Option<MatchData> + Send + Sync>;

/// A type-erased listener callback.
pub type ListenerCallback =
    Arc<dyn Fn(Response) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// Boxes an async closure as a [`ListenerCallback`].
pub fn into_callback<F, Fut>(f: F) -> ListenerCallback
where
    F: Fn(Response) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(move |response| Box::pin(f(response)))
}

/// Options attached to a listener at registration.
///
/// The `id` identifies the listener to middleware (authorization layers
/// key on it); `extra` carries free-form values for the same audience.
#[derive(Debug, Clone, Default)]
pub struct ListenerOptions {
    /// Listener identifier, `None` for anonymous listeners.
    pub id: Option<String>,
    /// Free-form options consumed by listener middleware.
    pub extra: HashMap<String, serde_json::Value>,
}

impl ListenerOptions {
    /// Creates options with the given id.
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    /// Adds a free-form option.
    pub fn option(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

/// A registered (matcher, callback) pair.
///
/// Immutable after registration; lives as long as the robot holding it.
pub struct Listener {
    matcher: Matcher,
    options: ListenerOptions,
    callback: ListenerCallback,
}

impl Listener {
    /// Creates a listener from a type-erased matcher and callback.
    pub fn new(matcher: Matcher, options: ListenerOptions, callback: ListenerCallback) -> Self {
        Self {
            matcher,
            options,
            callback,
        }
    }

    /// Creates a pattern listener.
    ///
    /// The matcher only tests messages that carry literal text (chat lines
    /// and topic changes); every other variant is a non-match without the
    /// pattern ever running.
    pub fn for_pattern(regex: Regex, options: ListenerOptions, callback: ListenerCallback) -> Self {
        let matcher: Matcher = Arc::new(move |message: &InboundMessage| {
            let text = message.text()?;
            regex.captures(text).map(|caps| MatchData::from_captures(&caps))
        });
        Self::new(matcher, options, callback)
    }

    /// Returns the listener id, if one was registered.
    pub fn id(&self) -> Option<&str> {
        self.options.id.as_deref()
    }

    /// Returns the registration options.
    pub fn options(&self) -> &ListenerOptions {
        &self.options
    }

    /// Runs the matcher against a message.
    pub fn matches(&self, message: &InboundMessage) -> Option<MatchData> {
        (self.matcher)(message)
    }

    /// Offers a message to this listener.
    ///
    /// On a matcher miss, returns `false` without running anything else.
    /// On a hit, builds a [`Response`], runs the listener chain with the
    /// callback as its terminal step, and returns `true` — the return
    /// value reports that the matcher matched, not that the callback ran
    /// to completion: middleware may abort the chain and a failing
    /// callback only reaches the error sink.
    pub(crate) async fn call(
        self: &Arc<Self>,
        message: &Arc<InboundMessage>,
        chain: &MiddlewareChain<ListenerContext>,
        shared: &Arc<Shared>,
    ) -> bool {
        let Some(match_data) = (self.matcher)(message) else {
            return false;
        };

        trace!(
            listener = self.id().unwrap_or("anonymous"),
            "listener matched"
        );

        let response = Response::new(Arc::clone(shared), Arc::clone(message), match_data);
        let ctx = Arc::new(ListenerContext {
            response,
            listener: Arc::clone(self),
        });

        let callback = Arc::clone(&self.callback);
        let errors = Arc::clone(&shared.errors);
        let id = self.id().unwrap_or("anonymous").to_owned();

        chain
            .execute(ctx, move |ctx| async move {
                debug!(listener = %id, "executing listener callback");
                if let Err(error) = callback(ctx.response.clone()).await {
                    errors.report(error, Some(&ctx.response));
                }
            })
            .await;

        true
    }
}

impl std::fmt::Debug for Listener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listener")
            .field("id", &self.options.id)
            .finish_non_exhaustive()
    }
}
