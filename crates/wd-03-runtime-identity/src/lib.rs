//! # Runtime Identity Resolver
//!
//! Establishes the `(tabID, frameID)` pair of an execution context and lets a
//! parent document learn which of its iframe elements hosts which frame.
//!
//! ## Startup
//!
//! - Background and popup contexts are not in a tab; they use
//!   `RuntimeInfo::extension_page()`.
//! - Content contexts ask the background once (`RuntimeQuery`). The background
//!   answers from the sender address the messaging layer stamped.
//!
//! ## Frame-ID Handshake
//!
//! An iframe element carries no stable id the parent can read, so the parent
//! asks the iframe:
//!
//! ```text
//! iframe                                   parent
//! ──────                                   ──────
//! on load: post  frame-id/init  ─────────→ source untagged, nothing pending?
//!                                          │ new requestID → pending[requestID] = iframe
//!          ←──────── frame-id/request ─────┘
//! own frame id known? (else defer)
//! post  frame-id/result{requestID, id} ──→ pending.remove(requestID)
//!                                          tag iframe with id (never reassigned)
//! ```
//!
//! Every message carries the extension's secret token as a prefix; messages
//! without it are dropped before parsing.
//!
//! ## Invariants
//!
//! | Invariant | Enforcement Location |
//! |-----------|---------------------|
//! | A tagged iframe is never re-tagged | `domain/handshake.rs` - `on_result()` |
//! | A tagged iframe is never asked again | `domain/handshake.rs` - `on_init()` |
//! | Only the newest request to an iframe can tag it | `domain/handshake.rs` - `on_init()` |
//! | Results are only sent once the own frame id is known | `domain/handshake.rs` - deferred requests |

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod domain;
pub mod ports;
pub mod service;

pub use domain::*;
pub use ports::{FrameDocument, RuntimeQuery};
pub use service::resolve_runtime_info;
