//! # Shared State Store
//!
//! Asynchronous key-value state container that all actions read and mutate.
//!
//! ## Contract
//!
//! | Operation | Signature | Notes |
//! |-----------|-----------|-------|
//! | `get_state` | `() -> State` | Snapshot; later writes do not affect it |
//! | `set_state` | `(State -> State) -> ()` | Updater sees the latest committed state |
//!
//! The store provides no isolation across a `get_state` + `set_state` pair.
//! Actions that read then write overlapping keys must share a concurrency key;
//! the gate is the only thing preventing a lost update.
//!
//! ## Module Structure
//!
//! ```text
//! domain/   - State snapshot, StoreError
//! ports/    - StateStore trait
//! adapters/ - InMemoryStateStore with version notification
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod adapters;
pub mod domain;
pub mod ports;

pub use adapters::InMemoryStateStore;
pub use domain::{State, StoreError};
pub use ports::{StateStore, StateUpdater};
