//! # Concurrency Controller
//!
//! Wraps action execution in a keyed, FIFO, at-most-N-concurrent gate.
//!
//! ## Purpose
//!
//! Several actions mutate overlapping slices of shared state with
//! read-then-write sequences against the state store. The store has no
//! transactional isolation, so any two such sequences must be serialized at the
//! call level. A concurrency key is the contract by which unrelated actions opt
//! into mutual exclusion: they only need to agree on a key string.
//!
//! ## Domain Invariants
//!
//! | Invariant | Enforcement Location |
//! |-----------|---------------------|
//! | At most `capacity` permits per key are live | `domain/gate.rs` - `acquire()` |
//! | Waiters start in arrival order | `domain/gate.rs` - `VecDeque` per key |
//! | A failed or panicked task still advances the queue | `domain/gate.rs` - `Permit::drop` |
//! | Abandoned waiters never strand a slot | `domain/gate.rs` - `release()` skips closed waiters |
//!
//! ## Permit Hand-Over
//!
//! ```text
//! acquire(k) ──[slot free]──→ Permit ──drop──→ release(k)
//!     │                                          │
//!     └──[slot busy]──→ queue(k) ←──pop_front────┘
//!                          │
//!                          └──→ Permit moved to the next waiter (slot never freed)
//! ```
//!
//! Actions without a key never touch the gate.

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod domain;

pub use domain::*;
