//! Runtime orchestration: configuration, logging, and the message pump.
//!
//! [`HeraldRuntime`] wires a configured [`Robot`] to an inbound message
//! channel. Adapters (or tests) push [`InboundMessage`]s through the
//! sender half; the pump dispatches them serially, so listener ordering
//! guarantees hold across messages as well as within one.
//!
//! # Quick start
//!
//! ```rust,ignore
//! use herald_runtime::HeraldRuntime;
//!
//! // Auto-loads herald.toml from the current directory.
//! let runtime = HeraldRuntime::new(MyAdapter::connect().await?)?;
//!
//! runtime.robot().respond(r"ping", |res| async move {
//!     res.reply(["pong"]).await?;
//!     Ok(())
//! })?;
//!
//! runtime.run().await?;
//! ```

use std::sync::Arc;

use tokio::signal;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use herald_core::{Adapter, InboundMessage};
use herald_framework::Robot;

use crate::config::{ConfigLoader, HeraldConfig};
use crate::error::{RuntimeError, RuntimeResult};
use crate::logging;

/// The sender half adapters push inbound messages through.
pub type MessageSender = mpsc::Sender<InboundMessage>;

const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Owns a robot and pumps inbound messages into it.
pub struct HeraldRuntime {
    config: HeraldConfig,
    robot: Arc<Robot>,
    sender: MessageSender,
    /// Taken by the first call to [`run`](Self::run).
    receiver: Mutex<Option<mpsc::Receiver<InboundMessage>>>,
    shutdown: CancellationToken,
}

impl HeraldRuntime {
    /// Creates a runtime with automatic configuration loading.
    ///
    /// Searches the current directory for `herald.toml`, falling back to
    /// defaults when no file is found.
    pub fn new(adapter: impl Adapter + 'static) -> RuntimeResult<Self> {
        let config = ConfigLoader::new().with_current_dir().load()?;
        Ok(Self::from_config(&config, adapter))
    }

    /// Creates a runtime builder for custom configuration.
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Creates a runtime from an already loaded configuration.
    ///
    /// Initializes logging from the config; harmless if logging was
    /// already set up.
    pub fn from_config(config: &HeraldConfig, adapter: impl Adapter + 'static) -> Self {
        Self::with_capacity(config, adapter, DEFAULT_CHANNEL_CAPACITY)
    }

    fn with_capacity(
        config: &HeraldConfig,
        adapter: impl Adapter + 'static,
        capacity: usize,
    ) -> Self {
        logging::init_from_config(&config.logging);

        let mut builder = Robot::builder(adapter).name(&config.robot.name);
        if let Some(alias) = &config.robot.alias {
            builder = builder.alias(alias);
        }
        let robot = Arc::new(builder.build());

        let (sender, receiver) = mpsc::channel(capacity);

        info!(
            robot = %config.robot.name,
            log_level = %config.logging.level,
            "Runtime initialized from configuration"
        );

        Self {
            config: config.clone(),
            robot,
            sender,
            receiver: Mutex::new(Some(receiver)),
            shutdown: CancellationToken::new(),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &HeraldConfig {
        &self.config
    }

    /// Returns the robot, for listener and middleware registration.
    pub fn robot(&self) -> &Arc<Robot> {
        &self.robot
    }

    /// Returns a sender for pushing inbound messages into the pump.
    pub fn sender(&self) -> MessageSender {
        self.sender.clone()
    }

    /// Requests shutdown. Messages already queued are still dispatched
    /// before [`run`](Self::run) returns.
    pub fn stop(&self) {
        self.shutdown.cancel();
    }

    /// Runs the message pump until shutdown.
    ///
    /// The pump stops on [`stop`](Self::stop), on Ctrl+C or SIGTERM, or
    /// when every sender has been dropped. Queued messages are drained
    /// before a shutdown request is honored.
    pub async fn run(&self) -> RuntimeResult<()> {
        let mut receiver = self
            .receiver
            .lock()
            .await
            .take()
            .ok_or(RuntimeError::AlreadyRunning)?;

        info!(robot = %self.robot.name(), "Herald runtime is now running");

        let signals = Self::shutdown_signal();
        tokio::pin!(signals);

        loop {
            tokio::select! {
                // Drain queued messages before honoring shutdown.
                biased;

                next = receiver.recv() => match next {
                    Some(message) => {
                        let matched = self.robot.receive(message).await;
                        debug!(matched, "dispatched inbound message");
                    }
                    None => {
                        info!("Inbound channel closed, stopping");
                        break;
                    }
                },
                _ = self.shutdown.cancelled() => {
                    info!("Shutdown requested, stopping");
                    break;
                }
                _ = &mut signals => {
                    self.shutdown.cancel();
                    break;
                }
            }
        }

        info!("Runtime stopped");
        Ok(())
    }

    /// Runs the message pump until `shutdown` resolves.
    ///
    /// When `shutdown` fires first this requests a stop and then lets the
    /// pump run to completion, so the drain guarantee of
    /// [`run`](Self::run) holds here too.
    pub async fn run_until<F>(&self, shutdown: F) -> RuntimeResult<()>
    where
        F: std::future::Future<Output = ()>,
    {
        let pump = self.run();
        tokio::pin!(pump);

        tokio::select! {
            result = &mut pump => return result,
            () = shutdown => self.stop(),
        }

        pump.await
    }

    /// Resolves on Ctrl+C or SIGTERM.
    async fn shutdown_signal() {
        #[cfg(unix)]
        {
            let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(s) => s,
                Err(_) => {
                    // No SIGTERM stream; Ctrl+C still works.
                    let _ = signal::ctrl_c().await;
                    info!("Received Ctrl+C, shutting down");
                    return;
                }
            };

            tokio::select! {
                _ = signal::ctrl_c() => {
                    info!("Received Ctrl+C, shutting down");
                }
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down");
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = signal::ctrl_c().await;
            info!("Received Ctrl+C, shutting down");
        }
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for a [`HeraldRuntime`] with custom configuration sources.
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
    channel_capacity: usize,
}

impl RuntimeBuilder {
    /// Creates a new runtime builder.
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new().with_current_dir(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    /// Sets a specific configuration file to load.
    pub fn config_file<P: AsRef<std::path::Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    /// Sets the configuration profile (e.g. "production").
    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    /// Disables loading environment variables.
    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    /// Merges additional configuration programmatically.
    pub fn merge(mut self, config: HeraldConfig) -> Self {
        self.config_loader = self.config_loader.merge(config);
        self
    }

    /// Sets the inbound channel capacity.
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    /// Loads the configuration and builds the runtime.
    pub fn build(self, adapter: impl Adapter + 'static) -> RuntimeResult<HeraldRuntime> {
        let config = self.config_loader.load()?;
        Ok(HeraldRuntime::with_capacity(
            &config,
            adapter,
            self.channel_capacity,
        ))
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RobotConfig;
    use async_trait::async_trait;
    use herald_core::{AdapterResult, Envelope, User};
    use std::sync::atomic::{AtomicUsize, Ordering};

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

    fn runtime() -> HeraldRuntime {
        let config = HeraldConfig {
            robot: RobotConfig {
                name: "edison".to_string(),
                alias: None,
            },
            ..Default::default()
        };
        HeraldRuntime::from_config(&config, NullAdapter)
    }

    #[tokio::test]
    async fn drains_queued_messages_before_stopping() {
        let runtime = runtime();
        let hits = Arc::new(AtomicUsize::new(0));

        let h = Arc::clone(&hits);
        runtime
            .robot()
            .hear(r"^hello$", move |_res| {
                let h = Arc::clone(&h);
                async move {
                    h.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            })
            .unwrap();

        let sender = runtime.sender();
        let user = User::new("1").with_room("#t");
        sender
            .send(InboundMessage::text_message(user.clone(), "hello", "m1"))
            .await
            .unwrap();
        sender
            .send(InboundMessage::text_message(user, "hello", "m2"))
            .await
            .unwrap();

        runtime.stop();
        runtime.run().await.unwrap();

        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn run_until_drains_queued_messages_on_external_shutdown() {
        let runtime = runtime();
        let hits = Arc::new(AtomicUsize::new(0));

        let h = Arc::clone(&hits);
        runtime
            .robot()
            .hear(r"^hello$", move |_res| {
                let h = Arc::clone(&h);
                async move {
                    h.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            })
            .unwrap();

        let sender = runtime.sender();
        let user = User::new("1").with_room("#t");
        sender
            .send(InboundMessage::text_message(user.clone(), "hello", "m1"))
            .await
            .unwrap();
        sender
            .send(InboundMessage::text_message(user, "hello", "m2"))
            .await
            .unwrap();

        // Shutdown resolves immediately; the accepted messages must still
        // be dispatched before run_until returns.
        runtime.run_until(async {}).await.unwrap();

        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn second_run_is_rejected() {
        let runtime = runtime();
        runtime.stop();
        runtime.run().await.unwrap();

        assert!(matches!(
            runtime.run().await,
            Err(RuntimeError::AlreadyRunning)
        ));
    }

    #[tokio::test]
    async fn robot_takes_its_name_from_the_config() {
        let runtime = runtime();
        assert_eq!(runtime.robot().name(), "edison");
    }
}
