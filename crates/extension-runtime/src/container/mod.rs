//! # Runtime Container
//!
//! Configuration and shared services handed to every context at boot.

pub mod config;
pub mod services;

pub use config::{BusConfig, ConfigError, IdentityConfig, RuntimeConfig, TransportSettings};
pub use services::ServiceContainer;
