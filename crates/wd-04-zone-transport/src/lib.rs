//! # Zone Transport
//!
//! Carries an action call to the context that owns the action's zone and
//! brings the result or error back.
//!
//! ## Flow
//!
//! ```text
//! caller context                                   owning context
//! ──────────────                                   ──────────────
//! request(target, id, input)
//!   │ register CorrelationId → oneshot
//!   │ send {actionID, input, correlationID} ───────→ listener
//!   │                                                │ RequestHandler::handle()
//!   │                                                │   (registry → gate → handler)
//!   │ listener ←─────── {correlationID, kind, ...} ──┘
//!   │ complete(correlationID)
//!   ▼
//! Ok(output) | Err(ActionError::from_wire(code, message))
//! ```
//!
//! ## Guarantees
//!
//! | Property | Enforcement Location |
//! |----------|---------------------|
//! | At most one reply settles a request | `domain/pending.rs` - entry removed on first match |
//! | Replies only accepted from the addressed context | `domain/pending.rs` - `complete()` checks sender |
//! | Unknown envelope shapes are rejected, never guessed | `service.rs` - exhaustive `ZoneMessage` match |
//! | Bounded wait when a timeout is configured | `service.rs` - `await_reply()` |
//! | Callers of a torn-down context fail instead of hanging | `service.rs` - detach notifications |
//! | A panicking handler still answers with an error reply | `service.rs` - `serve()` |
//!
//! Late replies (after timeout or cancellation) find no pending entry and are
//! logged and dropped.

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod domain;
pub mod ports;
pub mod service;

pub use domain::{PendingReplies, PendingStats, TransportConfig};
pub use ports::RequestHandler;
pub use service::{ZoneTransport, HANDLER_PANICKED};
