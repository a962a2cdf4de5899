//! # Domain Layer - Action Registry
//!
//! - `descriptor`: typed `ActionDescriptor`, its erased `ActionEntry`, the `Action` handle
//! - `registry`: `ActionRegistry`

pub mod descriptor;
pub mod registry;

pub use descriptor::*;
pub use registry::*;
