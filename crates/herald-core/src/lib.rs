//! # Herald Core
//!
//! Foundation types for the Herald bot framework.
//!
//! This crate defines the vocabulary shared between adapters and the
//! dispatch engine:
//!
//! - **Users and messages**: [`User`], [`InboundMessage`], [`MessageBody`]
//! - **Outbound addressing**: [`Envelope`]
//! - **The adapter seam**: [`Adapter`] and its error types
//!
//! ## Message flow
//!
//! ```text
//! ┌─────────────┐     ┌────────────┐     ┌────────────┐
//! │   Adapter   │────▶│   Robot    │────▶│  Listener  │
//! │ (chat room) │◀────│ (dispatch) │◀────│ callbacks  │
//! └─────────────┘     └────────────┘     └────────────┘
//! ```
//!
//! Adapters construct [`InboundMessage`]s from protocol events and hand
//! them to the dispatch engine (the `herald-framework` crate). Matched
//! listeners answer through the adapter's outbound methods, addressed by
//! an [`Envelope`].

pub mod adapter;
pub mod envelope;
pub mod message;
pub mod user;

pub use adapter::{Adapter, AdapterError, AdapterResult, BoxedAdapter};
pub use envelope::Envelope;
pub use message::{InboundMessage, MessageBody};
pub use user::User;
