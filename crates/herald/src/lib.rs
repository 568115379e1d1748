//! # Herald
//!
//! A chat bot framework with layered middleware dispatch.
//!
//! ## Overview
//!
//! Herald separates the *what* of a bot (listeners and their callbacks)
//! from the *where* (chat protocol adapters). Inbound messages flow
//! through three middleware chains on their way to user code and back:
//!
//! ```text
//! ┌─────────────┐     ┌─────────────────┐     ┌─────────────────────────┐
//! │   Adapter   │────▶│  receive chain  │────▶│ listeners, in order     │
//! │ (chat room) │     └─────────────────┘     │   └─ listener chain     │
//! │             │     ┌─────────────────┐     │       └─ callback       │
//! │             │◀────│  response chain │◀────│           response.send │
//! └─────────────┘     └─────────────────┘     └─────────────────────────┘
//! ```
//!
//! - **Adapters** translate a chat protocol into [`core::InboundMessage`]s
//!   and deliver outbound payloads.
//! - **Listeners** pair a matcher with an async callback; pattern
//!   listeners only see text-bearing messages.
//! - **Middleware** intercepts at all three stages, with an explicit
//!   unwind pass for symmetric before/after behavior.
//! - **The runtime** loads configuration, sets up logging, and pumps
//!   messages from the adapter into the robot.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use herald::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = HeraldRuntime::new(MyAdapter::connect().await?)?;
//!
//!     runtime.robot().hear(r"badgers?", |res| async move {
//!         res.send(["Badgers? BADGERS? WE DON'T NEED NO STINKIN BADGERS"])
//!             .await?;
//!         Ok(())
//!     })?;
//!
//!     runtime.robot().respond(r"open the (\w+) doors", |res| async move {
//!         match res.match_data().get(1) {
//!             Some("pod bay") => res.reply(["I'm afraid I can't let you do that."]).await?,
//!             _ => res.reply(["Opening the doors."]).await?,
//!         }
//!         Ok(())
//!     })?;
//!
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config` (default): TOML configuration files
//! - `yaml-config`: YAML configuration files
//! - `json-log`: structured JSON log output

pub use herald_core as core;
pub use herald_framework as framework;
pub use herald_runtime as runtime;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use herald::prelude::*;
/// ```
pub mod prelude {
    // Runtime - main entry point
    pub use herald_runtime::{HeraldConfig, HeraldRuntime, MessageSender};

    // Dispatch engine - listeners, middleware, responses
    pub use herald_framework::{
        ErrorSink, Listener, ListenerOptions, MatchData, Next, Response, Robot, RobotBuilder,
        SendMethod,
    };

    // Vocabulary types shared with adapters
    pub use herald_core::{
        Adapter, AdapterError, AdapterResult, Envelope, InboundMessage, MessageBody, User,
    };
}
