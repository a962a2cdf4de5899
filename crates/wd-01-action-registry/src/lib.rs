//! # Action Registry
//!
//! Maps a stable action id to its descriptor: declared zone, optional
//! concurrency key, and handler.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let mut registry = ActionRegistry::<Ctx>::new();
//!
//! let inc = registry.register(
//!     ActionDescriptor::<(), i64, Ctx>::new("counter/inc", Zone::Background)
//!         .concurrency("ctr")
//!         .execute(|ctx, ()| async move { ctx.increment().await }),
//! )?;
//!
//! // Registry is frozen before any context starts serving calls.
//! let registry = Arc::new(registry);
//! ```
//!
//! ## Invariants
//!
//! | Invariant | Enforcement Location |
//! |-----------|---------------------|
//! | Ids are registered exactly once | `domain/registry.rs` - `register()` |
//! | A zone never changes after registration | no mutation API after `register()` |
//! | Registration runs no handler | `domain/descriptor.rs` - handlers are stored, not called |
//!
//! The registry is generic over the handler context `C`, so it does not depend
//! on the runtime that supplies the context.

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod domain;

pub use domain::*;
