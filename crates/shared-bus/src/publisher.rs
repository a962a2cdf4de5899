//! # Message Publisher
//!
//! Defines the sending side of the bus and the in-memory implementation that
//! stands in for the browser's cross-context messaging primitive.

use crate::events::{BusError, Delivery};
use crate::subscriber::{Inbox, Outbox};
use crate::DEFAULT_CHANNEL_CAPACITY;
use async_trait::async_trait;
use parking_lot::RwLock;
use shared_types::Address;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, warn};

/// Trait for sending addressed messages over the bus.
///
/// The bus gives no request/response correlation, ordering across senders, or
/// timeouts. Those are the transport's job.
#[async_trait]
pub trait MessagePublisher: Send + Sync {
    /// Deliver `payload` to the endpoint at `to`, stamped with `from`.
    ///
    /// # Errors
    ///
    /// - `BusError::Unreachable` - nothing attached at `to`
    /// - `BusError::Closed` - the endpoint detached mid-send
    async fn send(&self, from: Address, to: Address, payload: String) -> Result<(), BusError>;

    /// Get the total number of messages delivered.
    fn messages_sent(&self) -> u64;
}

/// In-memory bus with one bounded channel per attached endpoint.
pub struct InMemoryMessageBus {
    /// Inbox senders by address.
    endpoints: RwLock<HashMap<Address, mpsc::Sender<Delivery>>>,

    /// Announces addresses whose endpoint went away.
    detached: broadcast::Sender<Address>,

    /// Total messages delivered.
    messages_sent: AtomicU64,

    /// Per-endpoint channel capacity.
    capacity: usize,
}

impl InMemoryMessageBus {
    /// Create a new bus with default capacity.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new bus with the given per-endpoint capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Arc<Self> {
        let (detached, _) = broadcast::channel(capacity.max(1));
        Arc::new(Self {
            endpoints: RwLock::new(HashMap::new()),
            detached,
            messages_sent: AtomicU64::new(0),
            capacity: capacity.max(1),
        })
    }

    /// Attach an endpoint at `address`.
    ///
    /// Returns the sending half and the receiving half. Dropping the `Inbox`
    /// detaches the address.
    ///
    /// # Errors
    ///
    /// `BusError::AddressInUse` if a live endpoint already owns `address`.
    pub fn attach(self: &Arc<Self>, address: Address) -> Result<(Outbox, Inbox), BusError> {
        let (tx, rx) = mpsc::channel(self.capacity);
        {
            let mut endpoints = self.endpoints.write();
            if endpoints.get(&address).is_some_and(|existing| !existing.is_closed()) {
                return Err(BusError::AddressInUse { address });
            }
            endpoints.insert(address, tx.clone());
        }

        debug!(%address, "Endpoint attached");

        let publisher: Arc<dyn MessagePublisher> = self.clone();
        Ok((
            Outbox::new(address, publisher),
            Inbox::new(address, rx, tx, Arc::downgrade(self)),
        ))
    }

    /// Remove the endpoint at `address` if it is still the one identified by `sender`.
    pub(crate) fn detach(&self, address: Address, sender: &mpsc::Sender<Delivery>) {
        let removed = {
            let mut endpoints = self.endpoints.write();
            match endpoints.get(&address) {
                Some(current) if current.same_channel(sender) => {
                    endpoints.remove(&address);
                    true
                }
                _ => false,
            }
        };

        if removed {
            debug!(%address, "Endpoint detached");
            // No listeners is fine.
            let _ = self.detached.send(address);
        }
    }

    /// Subscribe to detach notifications.
    #[must_use]
    pub fn subscribe_detached(&self) -> broadcast::Receiver<Address> {
        self.detached.subscribe()
    }

    /// Whether an endpoint is attached at `address`.
    #[must_use]
    pub fn is_attached(&self, address: &Address) -> bool {
        self.endpoints.read().contains_key(address)
    }

    /// Get the number of attached endpoints.
    #[must_use]
    pub fn endpoint_count(&self) -> usize {
        self.endpoints.read().len()
    }

    /// Get the channel capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[async_trait]
impl MessagePublisher for InMemoryMessageBus {
    async fn send(&self, from: Address, to: Address, payload: String) -> Result<(), BusError> {
        let sender = self.endpoints.read().get(&to).cloned();
        let Some(sender) = sender else {
            warn!(%from, %to, "Message dropped (no endpoint)");
            return Err(BusError::Unreachable { address: to });
        };

        sender
            .send(Delivery { from, payload })
            .await
            .map_err(|_| BusError::Closed { address: to })?;

        self.messages_sent.fetch_add(1, Ordering::Relaxed);
        debug!(%from, %to, "Message delivered");
        Ok(())
    }

    fn messages_sent(&self) -> u64 {
        self.messages_sent.load(Ordering::Relaxed)
    }
}
