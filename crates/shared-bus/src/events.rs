//! # Bus Deliveries
//!
//! What an endpoint receives, and why a send can fail.

use shared_types::Address;
use thiserror::Error;

/// A message handed to an endpoint.
///
/// `from` is stamped by the bus, not by the sender, so a receiver can trust it
/// the way an extension trusts the browser-provided message sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Address of the sending endpoint.
    pub from: Address,
    /// Serialized envelope (JSON text).
    pub payload: String,
}

/// Errors from bus operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BusError {
    /// No endpoint is attached at the destination address.
    #[error("No endpoint attached at {address}")]
    Unreachable { address: Address },

    /// The destination detached while the message was in flight.
    #[error("Endpoint at {address} closed")]
    Closed { address: Address },

    /// Another endpoint already owns this address.
    #[error("Address {address} already attached")]
    AddressInUse { address: Address },
}
