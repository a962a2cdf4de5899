//! # Ports - Zone Transport
//!
//! Inbound requests are served by whatever owns the local registry.

use async_trait::async_trait;
use serde_json::Value;
use shared_types::{ActionError, ActionId, Address};

/// Serves requests arriving from other zones.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    /// Run `action_id` locally on behalf of the context at `from`.
    ///
    /// `from` is stamped by the bus, never taken from the envelope.
    async fn handle(&self, from: Address, action_id: ActionId, input: Value) -> Result<Value, ActionError>;
}
