//! The robot: listener registry and receive pipeline.
//!
//! A [`Robot`] owns the listener registry and the three middleware chains
//! for its lifetime. Registration happens up front; during dispatch the
//! registries are only read, so `receive` takes `&self` and a robot can be
//! shared behind an `Arc`.
//!
//! # Dispatch
//!
//! `receive` runs the receive chain with the listener loop as its terminal
//! step. Listeners are offered the message serially, in registration
//! order; the loop stops early once the message is marked done. When
//! nothing matched and the message is not itself a catch-all wrapper, the
//! message is re-dispatched exactly once wrapped as a catch-all — the
//! wrapper check is what bottoms the recursion out.

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use parking_lot::RwLock;
use regex::Regex;
use tracing::debug;

use herald_core::{Adapter, BoxedAdapter, InboundMessage, MessageBody};

use crate::context::{ListenerContext, ReceiveContext, ResponseContext};
use crate::error::{ErrorSink, RegistrationError, TracingErrorSink};
use crate::listener::{Listener, ListenerOptions, MatchData, Matcher, into_callback};
use crate::middleware::{MiddlewareChain, Next};
use crate::response::Response;

/// State shared between the robot and the responses it hands out.
///
/// Responses outlive the borrow of the robot that created them (callbacks
/// hold them across awaits), so the outbound half lives here behind an
/// `Arc` instead of borrowing the robot.
pub(crate) struct Shared {
    pub(crate) name: String,
    pub(crate) alias: Option<String>,
    pub(crate) adapter: BoxedAdapter,
    pub(crate) response_mw: MiddlewareChain<ResponseContext>,
    pub(crate) errors: Arc<dyn ErrorSink>,
}

/// The dispatch engine: registry, middleware chains, and receive loop.
pub struct Robot {
    shared: Arc<Shared>,
    listeners: RwLock<Vec<Arc<Listener>>>,
    receive_mw: MiddlewareChain<ReceiveContext>,
    listener_mw: MiddlewareChain<ListenerContext>,
}

impl Robot {
    /// Creates a robot with the default error sink.
    pub fn new(name: impl Into<String>, adapter: impl Adapter + 'static) -> Self {
        Self::builder(adapter).name(name).build()
    }

    /// Starts building a robot around an adapter.
    pub fn builder(adapter: impl Adapter + 'static) -> RobotBuilder {
        RobotBuilder::new(Arc::new(adapter))
    }

    /// The robot's name, used by [`respond`](Self::respond) patterns.
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// The robot's alias, if any.
    pub fn alias(&self) -> Option<&str> {
        self.shared.alias.as_deref()
    }

    /// The adapter outbound actions are delivered through.
    pub fn adapter(&self) -> &BoxedAdapter {
        &self.shared.adapter
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    // =========================================================================
    // Listener registration
    // =========================================================================

    /// Registers a listener with a custom matcher.
    pub fn listen<M, F, Fut>(&self, matcher: M, options: ListenerOptions, callback: F)
    where
        M: Fn(&InboundMessage) -> Option<MatchData> + Send + Sync + 'static,
        F: Fn(Response) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let matcher: Matcher = Arc::new(matcher);
        self.add_listener(Listener::new(matcher, options, into_callback(callback)));
    }

    /// Registers a pattern listener matched against every text-bearing
    /// message.
    pub fn hear<F, Fut>(&self, pattern: &str, callback: F) -> Result<(), RegistrationError>
    where
        F: Fn(Response) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.hear_with(pattern, ListenerOptions::default(), callback)
    }

    /// [`hear`](Self::hear) with explicit listener options.
    pub fn hear_with<F, Fut>(
        &self,
        pattern: &str,
        options: ListenerOptions,
        callback: F,
    ) -> Result<(), RegistrationError>
    where
        F: Fn(Response) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let regex = Regex::new(pattern)?;
        self.add_listener(Listener::for_pattern(regex, options, into_callback(callback)));
        Ok(())
    }

    /// Registers a pattern listener that only fires when the message is
    /// addressed to the robot by name (or alias).
    pub fn respond<F, Fut>(&self, pattern: &str, callback: F) -> Result<(), RegistrationError>
    where
        F: Fn(Response) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.respond_with(pattern, ListenerOptions::default(), callback)
    }

    /// [`respond`](Self::respond) with explicit listener options.
    pub fn respond_with<F, Fut>(
        &self,
        pattern: &str,
        options: ListenerOptions,
        callback: F,
    ) -> Result<(), RegistrationError>
    where
        F: Fn(Response) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let regex = self.respond_pattern(pattern)?;
        self.add_listener(Listener::for_pattern(regex, options, into_callback(callback)));
        Ok(())
    }

    /// Builds the address-prefixed form of a respond pattern:
    /// `(?i)^\s*@?name(?:[:,]\s*|\s+)(?:pattern)`, with the alias as an
    /// alternative prefix when configured. The name must be followed by a
    /// `:` or `,` separator or by whitespace, so a name that happens to
    /// prefix another word does not count as addressing.
    pub fn respond_pattern(&self, pattern: &str) -> Result<Regex, regex::Error> {
        let name = regex::escape(&self.shared.name);
        let prefix = match &self.shared.alias {
            Some(alias) => format!("(?:{}|{})", regex::escape(alias), name),
            None => name,
        };
        Regex::new(&format!(r"(?i)^\s*@?{prefix}(?:[:,]\s*|\s+)(?:{pattern})"))
    }

    /// Registers a listener for room-enter events.
    pub fn enter<F, Fut>(&self, callback: F)
    where
        F: Fn(Response) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.listen(
            |message| {
                matches!(message.body(), MessageBody::Enter).then(MatchData::default)
            },
            ListenerOptions::default(),
            callback,
        );
    }

    /// Registers a listener for room-leave events.
    pub fn leave<F, Fut>(&self, callback: F)
    where
        F: Fn(Response) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.listen(
            |message| {
                matches!(message.body(), MessageBody::Leave).then(MatchData::default)
            },
            ListenerOptions::default(),
            callback,
        );
    }

    /// Registers a listener for topic changes.
    pub fn topic<F, Fut>(&self, callback: F)
    where
        F: Fn(Response) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.listen(
            |message| {
                matches!(message.body(), MessageBody::Topic { .. }).then(MatchData::default)
            },
            ListenerOptions::default(),
            callback,
        );
    }

    /// Registers a fallback listener for messages nothing else matched.
    ///
    /// The callback's response wraps the catch-all message; the original
    /// is reachable via
    /// [`InboundMessage::original`](herald_core::InboundMessage::original).
    pub fn catch_all<F, Fut>(&self, callback: F)
    where
        F: Fn(Response) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.listen(
            |message| message.is_catch_all().then(MatchData::default),
            ListenerOptions::default(),
            callback,
        );
    }

    fn add_listener(&self, listener: Listener) {
        debug!(
            listener = listener.id().unwrap_or("anonymous"),
            "registered listener"
        );
        self.listeners.write().push(Arc::new(listener));
    }

    // =========================================================================
    // Middleware registration
    // =========================================================================

    /// Appends middleware to the receive chain (runs once per inbound
    /// message, before matching).
    pub fn receive_middleware<F, Fut>(&self, middleware: F)
    where
        F: Fn(Arc<ReceiveContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Next>> + Send + 'static,
    {
        self.receive_mw.register(middleware);
    }

    /// Appends middleware to the listener chain (runs once per matched
    /// listener, before its callback).
    pub fn listener_middleware<F, Fut>(&self, middleware: F)
    where
        F: Fn(Arc<ListenerContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Next>> + Send + 'static,
    {
        self.listener_mw.register(middleware);
    }

    /// Appends middleware to the response chain (runs once per outbound
    /// action, before the adapter call).
    pub fn response_middleware<F, Fut>(&self, middleware: F)
    where
        F: Fn(Arc<ResponseContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Next>> + Send + 'static,
    {
        self.shared.response_mw.register(middleware);
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    /// Dispatches one inbound message to completion.
    ///
    /// Runs the receive chain, then the listener loop, then — when nothing
    /// matched a non-catch-all message — the catch-all re-dispatch. All
    /// callback and middleware failures end up in the error sink; this
    /// method itself never fails.
    ///
    /// Returns `true` if any listener matched, for the original message or
    /// its catch-all wrapper.
    pub async fn receive(&self, message: InboundMessage) -> bool {
        self.dispatch(Arc::new(message)).await
    }

    /// Boxed so the catch-all path in `process_listeners` can call back
    /// into it recursively.
    fn dispatch(&self, message: Arc<InboundMessage>) -> BoxFuture<'_, bool> {
        Box::pin(async move {
            let response = Response::new(
                Arc::clone(&self.shared),
                Arc::clone(&message),
                MatchData::default(),
            );
            let ctx = Arc::new(ReceiveContext { response });

            self.receive_mw
                .execute(ctx, |ctx| self.process_listeners(ctx))
                .await
                .unwrap_or(false)
        })
    }

    /// The terminal step of the receive chain: the serial listener loop
    /// plus the catch-all fallback.
    async fn process_listeners(&self, ctx: Arc<ReceiveContext>) -> bool {
        let message = Arc::clone(ctx.response.message());
        let listeners: Vec<Arc<Listener>> = self.listeners.read().clone();

        let mut any_matched = false;
        for listener in &listeners {
            if message.is_done() {
                debug!("message marked done, skipping remaining listeners");
                break;
            }
            any_matched |= listener.call(&message, &self.listener_mw, &self.shared).await;
        }

        if !any_matched && !message.is_catch_all() {
            debug!("no listener matched, re-dispatching as catch-all");
            let wrapper = Arc::new(InboundMessage::catch_all(message));
            return self.dispatch(wrapper).await;
        }

        any_matched
    }
}

impl std::fmt::Debug for Robot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Robot")
            .field("name", &self.shared.name)
            .field("listeners", &self.listeners.read().len())
            .finish()
    }
}

// =============================================================================
// RobotBuilder
// =============================================================================

/// Builder for a [`Robot`].
pub struct RobotBuilder {
    name: String,
    alias: Option<String>,
    adapter: BoxedAdapter,
    errors: Arc<dyn ErrorSink>,
}

impl RobotBuilder {
    fn new(adapter: BoxedAdapter) -> Self {
        Self {
            name: "herald".to_owned(),
            alias: None,
            adapter,
            errors: Arc::new(TracingErrorSink),
        }
    }

    /// Sets the robot name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets an alias accepted as an alternative address prefix by
    /// [`Robot::respond`] listeners.
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Replaces the default (tracing) error sink.
    pub fn error_sink(mut self, errors: Arc<dyn ErrorSink>) -> Self {
        self.errors = errors;
        self
    }

    /// Builds the robot.
    pub fn build(self) -> Robot {
        let shared = Arc::new(Shared {
            name: self.name,
            alias: self.alias,
            adapter: self.adapter,
            response_mw: MiddlewareChain::new(Arc::clone(&self.errors)),
            errors: Arc::clone(&self.errors),
        });
        Robot {
            receive_mw: MiddlewareChain::new(Arc::clone(&self.errors)),
            listener_mw: MiddlewareChain::new(Arc::clone(&self.errors)),
            shared,
            listeners: RwLock::new(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use herald_core::{AdapterResult, Envelope, User};
    use parking_lot::Mutex;

    #[derive(Default)]
    struct NullAdapter;

    #[async_trait]
    impl Adapter for NullAdapter {
        fn name(&self) -> &str {
            "null"
        }

        async fn send(&self, _e: &Envelope, _s: &[String]) -> AdapterResult<()> {
            Ok(())
        }

        async fn reply(&self, _e: &Envelope, _s: &[String]) -> AdapterResult<()> {
            Ok(())
        }

        async fn topic(&self, _e: &Envelope, _s: &[String]) -> AdapterResult<()> {
            Ok(())
        }

        async fn play(&self, _e: &Envelope, _s: &[String]) -> AdapterResult<()> {
            Ok(())
        }
    }

    fn robot() -> Robot {
        Robot::builder(NullAdapter)
            .name("herald")
            .alias("h")
            .build()
    }

    #[test]
    fn respond_pattern_accepts_addressed_forms() {
        let robot = robot();
        let regex = robot.respond_pattern(r"ping").unwrap();

        assert!(regex.is_match("herald ping"));
        assert!(regex.is_match("Herald: ping"));
        assert!(regex.is_match("herald:ping"));
        assert!(regex.is_match("@herald, ping"));
        assert!(regex.is_match("  h ping"));
        assert!(!regex.is_match("ping"));
        assert!(!regex.is_match("heraldping here"));
    }

    #[test]
    fn respond_pattern_escapes_name() {
        let robot = Robot::builder(NullAdapter).name("c3+po").build();
        let regex = robot.respond_pattern("hi").unwrap();
        assert!(regex.is_match("c3+po hi"));
        assert!(!regex.is_match("c33po hi"));
    }

    #[test]
    fn invalid_pattern_is_a_registration_error() {
        let robot = robot();
        let result = robot.hear(r"(unclosed", |_res| async { Ok(()) });
        assert!(matches!(result, Err(RegistrationError::Pattern(_))));
        assert_eq!(robot.listener_count(), 0);
    }

    #[tokio::test]
    async fn enter_and_leave_listeners_match_their_variants() {
        let robot = robot();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let s = Arc::clone(&seen);
        robot.enter(move |_res| {
            let s = Arc::clone(&s);
            async move {
                s.lock().push("enter");
                Ok(())
            }
        });
        let s = Arc::clone(&seen);
        robot.leave(move |_res| {
            let s = Arc::clone(&s);
            async move {
                s.lock().push("leave");
                Ok(())
            }
        });

        let user = User::new("1").with_room("#t");
        assert!(robot.receive(InboundMessage::enter(user.clone())).await);
        assert!(robot.receive(InboundMessage::leave(user)).await);
        assert_eq!(*seen.lock(), vec!["enter", "leave"]);
    }

    #[tokio::test]
    async fn topic_listener_sees_topic_text() {
        let robot = robot();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let s = Arc::clone(&seen);
        robot.topic(move |res| {
            let s = Arc::clone(&s);
            async move {
                s.lock()
                    .push(res.message().text().unwrap_or_default().to_owned());
                Ok(())
            }
        });

        let user = User::new("1").with_room("#t");
        robot.receive(InboundMessage::topic(user, "shipping friday")).await;
        assert_eq!(*seen.lock(), vec!["shipping friday"]);
    }
}
