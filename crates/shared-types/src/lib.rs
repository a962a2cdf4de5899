//! # Shared Types Crate
//!
//! This crate contains the identifiers, wire envelopes, and error types that
//! cross execution-zone boundaries.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: Anything serialized between zones is defined here.
//! - **Tagged Wire Protocol**: Every message is a tagged union decoded exhaustively;
//!   unknown tags are rejected, never ignored.
//! - **Zone-Agnostic Errors**: `ActionError` survives a round trip through an
//!   `error` envelope with its variant and code intact.

pub mod entities;
pub mod envelope;
pub mod errors;
pub mod ipc;

pub use entities::*;
pub use envelope::{ZoneMessage, ZoneReply, ZoneRequest};
pub use errors::*;
pub use ipc::{FrameMessage, FrameMessageError, TOKEN_SEPARATOR};
