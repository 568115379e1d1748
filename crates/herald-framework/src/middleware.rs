//! Middleware chains.
//!
//! A [`MiddlewareChain`] is an ordered, append-only list of interceptors
//! with two passes per execution:
//!
//! - **down pass** — middleware run in registration order; each returns a
//!   [`Next`] decision. `Continue` proceeds, `ContinueWith` proceeds and
//!   parks an unwind hook, `Done` aborts the rest of the chain and the
//!   terminal step.
//! - **unwind pass** — after the terminal step (or the abort point), parked
//!   hooks run in reverse registration order, giving middleware symmetric
//!   before/after behavior like a stack.
//!
//! The same chain type drives all three pipelines (receive, listener,
//! response); only the context type differs.
//!
//! A middleware that returns an error aborts its chain exactly like `Done`,
//! after the error is handed to the [`ErrorSink`]. A middleware that never
//! resolves stalls its message's pipeline; there is no watchdog.
//!
//! # Example
//!
//! ```rust,ignore
//! robot.receive_middleware(|ctx| async move {
//!     if is_blocked(ctx.response.message().user()) {
//!         return Ok(Next::Done); // drop the message
//!     }
//!     Ok(Next::after(|| async { /* runs on the way back out */ }))
//! });
//! ```

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use parking_lot::RwLock;
use tracing::trace;

use crate::context::PipelineContext;
use crate::error::ErrorSink;

/// A hook parked by [`Next::ContinueWith`], run during the unwind pass.
pub type UnwindHook = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

/// The decision a middleware returns on the down pass.
pub enum Next {
    /// Proceed to the next middleware, or the terminal step if this was
    /// the last one.
    Continue,
    /// Proceed, and run the hook during the unwind pass.
    ContinueWith(UnwindHook),
    /// Abort: skip the remaining middleware and the terminal step. Hooks
    /// parked by earlier middleware still unwind.
    Done,
}

impl Next {
    /// Convenience constructor for [`Next::ContinueWith`].
    pub fn after<F, Fut>(hook: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Next::ContinueWith(Box::new(move || Box::pin(hook())))
    }
}

impl std::fmt::Debug for Next {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Next::Continue => f.write_str("Continue"),
            Next::ContinueWith(_) => f.write_str("ContinueWith(..)"),
            Next::Done => f.write_str("Done"),
        }
    }
}

/// A type-erased middleware stored in a chain.
pub type BoxedMiddleware<C> =
    Arc<dyn Fn(Arc<C>) -> BoxFuture<'static, anyhow::Result<Next>> + Send + Sync>;

/// An ordered, append-only middleware chain over context type `C`.
///
/// Registration order is execution order. There is no removal. The chain
/// is safe to share: registration takes `&self` and snapshots are taken
/// per execution, so registering during a dispatch affects only later
/// dispatches.
pub struct MiddlewareChain<C> {
    stack: RwLock<Vec<BoxedMiddleware<C>>>,
    errors: Arc<dyn ErrorSink>,
}

impl<C: PipelineContext> MiddlewareChain<C> {
    /// Creates an empty chain reporting failures to `errors`.
    pub fn new(errors: Arc<dyn ErrorSink>) -> Self {
        Self {
            stack: RwLock::new(Vec::new()),
            errors,
        }
    }

    /// Appends a middleware to the chain.
    pub fn register<F, Fut>(&self, middleware: F)
    where
        F: Fn(Arc<C>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Next>> + Send + 'static,
    {
        self.stack
            .write()
            .push(Arc::new(move |ctx| Box::pin(middleware(ctx))));
    }

    /// Returns the number of registered middleware.
    pub fn len(&self) -> usize {
        self.stack.read().len()
    }

    /// Returns `true` if no middleware is registered.
    pub fn is_empty(&self) -> bool {
        self.stack.read().is_empty()
    }

    /// Runs the chain around `terminal`.
    ///
    /// Returns `Some` with the terminal step's output when the down pass
    /// completed, `None` when a middleware aborted (via [`Next::Done`] or
    /// an error). Either way, every parked unwind hook has run by the time
    /// this returns.
    pub async fn execute<T, F, Fut>(&self, ctx: Arc<C>, terminal: F) -> Option<T>
    where
        F: FnOnce(Arc<C>) -> Fut,
        Fut: Future<Output = T> + Send,
    {
        let stack: Vec<BoxedMiddleware<C>> = self.stack.read().clone();
        let mut unwinds: Vec<UnwindHook> = Vec::new();
        let mut completed = true;

        for (index, middleware) in stack.into_iter().enumerate() {
            match middleware(Arc::clone(&ctx)).await {
                Ok(Next::Continue) => {}
                Ok(Next::ContinueWith(hook)) => unwinds.push(hook),
                Ok(Next::Done) => {
                    trace!(index, "middleware finished the chain early");
                    completed = false;
                    break;
                }
                Err(error) => {
                    self.errors.report(error, ctx.response());
                    completed = false;
                    break;
                }
            }
        }

        let output = if completed {
            Some(terminal(Arc::clone(&ctx)).await)
        } else {
            None
        };

        for hook in unwinds.into_iter().rev() {
            hook().await;
        }

        output
    }
}

impl<C> std::fmt::Debug for MiddlewareChain<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MiddlewareChain")
            .field("len", &self.stack.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::Response;
    use parking_lot::Mutex;

    struct TestContext;

    impl PipelineContext for TestContext {
        fn response(&self) -> Option<&Response> {
            None
        }
    }

    #[derive(Default)]
    struct VecSink(Mutex<Vec<String>>);

    impl ErrorSink for VecSink {
        fn report(&self, error: anyhow::Error, _response: Option<&Response>) {
            self.0.lock().push(error.to_string());
        }
    }

    fn chain() -> MiddlewareChain<TestContext> {
        MiddlewareChain::new(Arc::new(VecSink::default()))
    }

    fn recorder() -> Arc<Mutex<Vec<&'static str>>> {
        Arc::new(Mutex::new(Vec::new()))
    }

    #[tokio::test]
    async fn down_then_reverse_up() {
        let chain = chain();
        let order = recorder();

        for (down, up) in [("mw1", "done1"), ("mw2", "done2"), ("mw3", "done3")] {
            let order = Arc::clone(&order);
            chain.register(move |_ctx| {
                let order = Arc::clone(&order);
                async move {
                    order.lock().push(down);
                    let order = Arc::clone(&order);
                    Ok(Next::after(move || async move {
                        order.lock().push(up);
                    }))
                }
            });
        }

        let terminal_order = Arc::clone(&order);
        let ran = chain
            .execute(Arc::new(TestContext), move |_ctx| async move {
                terminal_order.lock().push("terminal");
            })
            .await;

        assert!(ran.is_some());
        assert_eq!(
            *order.lock(),
            vec!["mw1", "mw2", "mw3", "terminal", "done3", "done2", "done1"]
        );
    }

    #[tokio::test]
    async fn done_skips_rest_and_terminal() {
        let chain = chain();
        let order = recorder();

        let o = Arc::clone(&order);
        chain.register(move |_ctx| {
            let o = Arc::clone(&o);
            async move {
                o.lock().push("mw1");
                let o = Arc::clone(&o);
                Ok(Next::after(move || async move {
                    o.lock().push("done1");
                }))
            }
        });
        let o = Arc::clone(&order);
        chain.register(move |_ctx| {
            let o = Arc::clone(&o);
            async move {
                o.lock().push("mw2");
                Ok(Next::Done)
            }
        });
        let o = Arc::clone(&order);
        chain.register(move |_ctx| {
            let o = Arc::clone(&o);
            async move {
                o.lock().push("mw3");
                Ok(Next::Continue)
            }
        });

        let t = Arc::clone(&order);
        let ran = chain
            .execute(Arc::new(TestContext), move |_ctx| async move {
                t.lock().push("terminal");
            })
            .await;

        // mw3 and the terminal never run, but mw1's hook still unwinds.
        assert!(ran.is_none());
        assert_eq!(*order.lock(), vec!["mw1", "mw2", "done1"]);
    }

    #[tokio::test]
    async fn middleware_error_aborts_and_reports() {
        let sink = Arc::new(VecSink::default());
        let chain: MiddlewareChain<TestContext> =
            MiddlewareChain::new(Arc::clone(&sink) as Arc<dyn ErrorSink>);
        let order = recorder();

        chain.register(|_ctx| async move { Err(anyhow::anyhow!("boom")) });
        let o = Arc::clone(&order);
        chain.register(move |_ctx| {
            let o = Arc::clone(&o);
            async move {
                o.lock().push("mw2");
                Ok(Next::Continue)
            }
        });

        let t = Arc::clone(&order);
        let ran = chain
            .execute(Arc::new(TestContext), move |_ctx| async move {
                t.lock().push("terminal");
            })
            .await;

        assert!(ran.is_none());
        assert!(order.lock().is_empty());
        assert_eq!(*sink.0.lock(), vec!["boom"]);
    }

    #[tokio::test]
    async fn empty_chain_runs_terminal() {
        let chain = chain();
        let out = chain
            .execute(Arc::new(TestContext), |_ctx| async move { 42 })
            .await;
        assert_eq!(out, Some(42));
    }
}
