//! # Extension Runtime Library
//!
//! Per-context action orchestration plus a simulated browser host. The
//! `warden` binary in `main.rs` boots every zone and runs the reference
//! scenarios.
//!
//! ## Architectural Patterns
//!
//! - **One registry**: every context shares the same frozen `ActionRegistry`
//! - **Location transparency**: `Invoker::call` is identical for local and
//!   cross-zone actions
//! - **Hexagonal Architecture**: the store, the document and the bus are
//!   ports; the host supplies in-memory adapters
//!
//! ## Invariants
//!
//! | Invariant | Enforcement Location |
//! |-----------|---------------------|
//! | Handlers run only in the owning zone | `orchestrator/mod.rs` - `route()`, `handle()` |
//! | Keyed actions never overlap per context | `orchestrator/mod.rs` - `admit()` |
//! | No invocation before identity resolves | `orchestrator/mod.rs` - `wait_ready()` |
//! | Remote caller identity comes from the bus | `handlers/runtime.rs` - `whoami` |

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod container;
pub mod handlers;
pub mod host;
pub mod orchestrator;

pub use container::{ConfigError, RuntimeConfig, ServiceContainer};
pub use handlers::{BuiltinActions, WHOAMI};
pub use host::{ContextHandle, ExtensionHost, FrameContext, HostBuilder, HostError, IframeLoad};
pub use orchestrator::{ActionContext, Invoker, Orchestrator, Registry, Route};
