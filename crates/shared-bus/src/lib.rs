//! # Shared Bus - Cross-Context Messaging
//!
//! Stands in for the browser's extension messaging primitive. Each execution
//! context attaches one endpoint at its `Address`; messages are opaque JSON
//! text, stamped with the sender's address by the bus.
//!
//! ```text
//! ┌──────────────┐                    ┌──────────────┐
//! │ Content      │  Outbox::send()    │ Background   │
//! │ tab=3 frm=0  │ ──────┐            │              │
//! └──────────────┘       │            └──────────────┘
//!                        ▼                    ↑
//!                  ┌──────────────┐          │ Inbox::recv()
//!                  │  Message Bus │ ─────────┘
//!                  └──────────────┘
//! ```
//!
//! ## Guarantees
//!
//! - Per sender/receiver pair, deliveries arrive in send order.
//! - No request/response correlation and no timeouts.
//! - Sending to a detached address fails immediately with `Unreachable`.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod events;
pub mod publisher;
pub mod subscriber;

pub use events::{BusError, Delivery};
pub use publisher::{InMemoryMessageBus, MessagePublisher};
pub use subscriber::{Inbox, Outbox};

/// Maximum deliveries buffered per endpoint before senders wait.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;
