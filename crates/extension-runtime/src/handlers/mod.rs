//! # Built-in Actions
//!
//! Actions every host registers before any user action.

pub mod runtime;

pub use runtime::{register_builtin_actions, BackgroundRuntimeQuery, BuiltinActions, WHOAMI};
