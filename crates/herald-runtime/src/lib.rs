//! Herald Runtime - Orchestration layer for the Herald bot framework.
//!
//! This crate provides:
//! - Runtime orchestration and the inbound message pump ([`HeraldRuntime`])
//! - Layered configuration loading ([`config::ConfigLoader`])
//! - Logging configuration ([`logging::LoggingBuilder`])
//!
//! ```ignore
//! use herald_runtime::HeraldRuntime;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // Loads herald.toml from the current directory, sets up logging.
//!     let runtime = HeraldRuntime::new(MyAdapter::connect().await?)?;
//!
//!     runtime.robot().respond(r"ping", |res| async move {
//!         res.reply(["pong"]).await?;
//!         Ok(())
//!     })?;
//!
//!     // Run until Ctrl+C or SIGTERM.
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Configuration
//!
//! Configuration is layered: built-in defaults, then `herald.toml` (with
//! an optional profile-specific variant), then `HERALD_*` environment
//! variables. See the [`config`] module for details.

pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;

// Re-exports
pub use config::{ConfigLoader, HeraldConfig, LoggingConfig, RobotConfig};
pub use error::{ConfigError, ConfigResult, RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};
pub use runtime::{HeraldRuntime, MessageSender, RuntimeBuilder};

// Re-export tracing for use by downstream crates
pub use tracing;
pub use tracing_subscriber;
