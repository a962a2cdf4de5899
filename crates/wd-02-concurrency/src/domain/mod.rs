//! # Domain Layer - Concurrency Controller
//!
//! - `key`: `GateKey`, the resolved identity of a queue
//! - `gate`: `KeyedGate` and its RAII `Permit`

pub mod gate;
pub mod key;

pub use gate::*;
pub use key::*;
