//! Error types and the dispatch error sink.

use thiserror::Error;
use tracing::error;

use crate::response::Response;

/// Errors raised at listener registration time.
///
/// Registration failures are configuration errors: they are reported
/// immediately to the registering caller and nothing is added to the
/// registry. Runtime failures inside callbacks and middleware never take
/// this path; those go to the [`ErrorSink`].
#[derive(Debug, Error)]
pub enum RegistrationError {
    /// The listener pattern failed to compile.
    #[error("invalid listener pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Where dispatch-time failures are delivered.
///
/// Callback and middleware errors are caught at the boundary where they
/// occur and reported here together with the best-available [`Response`]
/// context; the pipeline then continues (one listener's failure never
/// prevents the others from running). Nothing propagates out of
/// [`Robot::receive`](crate::Robot::receive).
pub trait ErrorSink: Send + Sync {
    /// Reports a dispatch-time failure.
    ///
    /// `response` is present when the failure happened inside a matched
    /// listener's pipeline, absent when it happened before any match.
    fn report(&self, error: anyhow::Error, response: Option<&Response>);
}

/// The default sink: logs failures through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingErrorSink;

impl ErrorSink for TracingErrorSink {
    fn report(&self, error: anyhow::Error, response: Option<&Response>) {
        match response {
            Some(response) => error!(
                room = response.envelope().room.as_deref().unwrap_or("-"),
                user = %response.envelope().user.id,
                "dispatch error: {error:#}"
            ),
            None => error!("dispatch error: {error:#}"),
        }
    }
}
