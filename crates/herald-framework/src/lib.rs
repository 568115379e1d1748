//! # Herald Framework
//!
//! The message-dispatch engine of the Herald bot framework.
//!
//! An inbound message flows through three middleware chains on its way to
//! user code and back out to the chat adapter:
//!
//! ```text
//! inbound ──▶ receive chain ──▶ listeners (in registration order)
//!                                  │  matcher hit
//!                                  ▼
//!                              listener chain ──▶ callback
//!                                                    │  response.send(...)
//!                                                    ▼
//!                                               response chain ──▶ adapter
//! ```
//!
//! If no listener matches, the message is re-dispatched exactly once as a
//! catch-all wrapper so fallback listeners get a look at it.
//!
//! The pieces:
//!
//! - [`Robot`] — owns the listener registry and the three chains, and runs
//!   the receive pipeline.
//! - [`Listener`] — a (matcher, callback) pair; pattern listeners only see
//!   text-bearing messages.
//! - [`MiddlewareChain`] — an ordered interceptor list with an explicit
//!   down pass and reverse unwind pass, shared by all three pipelines.
//! - [`Response`] — the per-match handle callbacks use to answer, funneling
//!   every outbound action through the response chain.
//! - [`ErrorSink`] — where callback and middleware failures go; nothing
//!   ever propagates out of [`Robot::receive`].

pub mod context;
pub mod error;
pub mod listener;
pub mod middleware;
pub mod response;
pub mod robot;

pub use context::{
    ListenerContext, PipelineContext, ReceiveContext, ResponseContext, SendMethod,
};
pub use error::{ErrorSink, RegistrationError, TracingErrorSink};
pub use listener::{
    Listener, ListenerCallback, ListenerOptions, MatchData, Matcher, into_callback,
};
pub use middleware::{BoxedMiddleware, MiddlewareChain, Next, UnwindHook};
pub use response::Response;
pub use robot::{Robot, RobotBuilder};
