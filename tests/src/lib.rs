//! # Warden Test Suite
//!
//! Cross-context tests run against the simulated extension host.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── fixtures.rs       # Harness: host, test actions, execution probe
//! └── integration/
//!     ├── scenarios.rs  # Reference scenarios (counter, FIFO, errors, liveness)
//!     ├── routing.rs    # Zone routing, round trips, cancellation, timeouts
//!     └── frames.rs     # Frame id handshake through real documents
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p warden-tests
//! cargo test -p warden-tests integration::frames::
//! ```

pub mod fixtures;
pub mod integration;
