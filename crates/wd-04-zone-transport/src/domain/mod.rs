pub mod config;
pub mod pending;

pub use config::*;
pub use pending::*;
