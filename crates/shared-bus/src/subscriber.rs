//! # Endpoint Halves
//!
//! `Outbox` sends from a fixed address; `Inbox` receives for it. The inbox owns
//! the attachment: when it is dropped the address is detached from the bus.

use crate::events::{BusError, Delivery};
use crate::publisher::{InMemoryMessageBus, MessagePublisher};
use shared_types::Address;
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;
use tracing::debug;

/// Sending half of an endpoint. Cheap to clone.
#[derive(Clone)]
pub struct Outbox {
    address: Address,
    publisher: Arc<dyn MessagePublisher>,
}

impl Outbox {
    pub(crate) fn new(address: Address, publisher: Arc<dyn MessagePublisher>) -> Self {
        Self { address, publisher }
    }

    /// Send `payload` to `to`. The bus stamps this outbox's address as sender.
    pub async fn send(&self, to: Address, payload: String) -> Result<(), BusError> {
        self.publisher.send(self.address, to, payload).await
    }

    /// Address this outbox sends from.
    #[must_use]
    pub fn address(&self) -> Address {
        self.address
    }
}

/// Receiving half of an endpoint.
///
/// When dropped, the endpoint is detached and listeners of
/// `InMemoryMessageBus::subscribe_detached` are notified.
pub struct Inbox {
    address: Address,
    receiver: mpsc::Receiver<Delivery>,
    /// Identifies our channel when detaching, so a newer endpoint at the same
    /// address is left alone.
    identity: mpsc::Sender<Delivery>,
    bus: Weak<InMemoryMessageBus>,
}

impl Inbox {
    pub(crate) fn new(
        address: Address,
        receiver: mpsc::Receiver<Delivery>,
        identity: mpsc::Sender<Delivery>,
        bus: Weak<InMemoryMessageBus>,
    ) -> Self {
        Self {
            address,
            receiver,
            identity,
            bus,
        }
    }

    /// Receive the next delivery.
    ///
    /// # Returns
    ///
    /// - `Some(delivery)` - The next message for this address
    /// - `None` - The channel was closed
    pub async fn recv(&mut self) -> Option<Delivery> {
        self.receiver.recv().await
    }

    /// Try to receive the next delivery without waiting.
    pub fn try_recv(&mut self) -> Option<Delivery> {
        self.receiver.try_recv().ok()
    }

    /// Address this inbox receives for.
    #[must_use]
    pub fn address(&self) -> Address {
        self.address
    }
}

impl Drop for Inbox {
    fn drop(&mut self) {
        let Some(bus) = self.bus.upgrade() else {
            return;
        };
        bus.detach(self.address, &self.identity);
        debug!(address = %self.address, "Inbox dropped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_inbox_recv() {
        let bus = InMemoryMessageBus::new();
        let (popup_out, _popup_in) = bus.attach(Address::popup()).unwrap();
        let (_bg_out, mut bg_in) = bus.attach(Address::background()).unwrap();

        popup_out
            .send(Address::background(), "hello".into())
            .await
            .unwrap();

        let delivery = timeout(Duration::from_millis(100), bg_in.recv())
            .await
            .expect("timeout")
            .expect("delivery");
        assert_eq!(delivery.from, Address::popup());
        assert_eq!(delivery.payload, "hello");
    }

    #[tokio::test]
    async fn test_try_recv_empty() {
        let bus = InMemoryMessageBus::new();
        let (_out, mut inbox) = bus.attach(Address::background()).unwrap();
        assert!(inbox.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_send_to_detached_fails() {
        let bus = InMemoryMessageBus::new();
        let (bg_out, _bg_in) = bus.attach(Address::background()).unwrap();
        let (_popup_out, popup_in) = bus.attach(Address::popup()).unwrap();
        drop(popup_in);

        let result = bg_out.send(Address::popup(), "late".into()).await;
        assert!(matches!(result, Err(BusError::Unreachable { .. })));
    }

    #[test]
    fn test_outbox_address() {
        let bus = InMemoryMessageBus::new();
        let (out, inbox) = bus.attach(Address::popup()).unwrap();
        assert_eq!(out.address(), Address::popup());
        assert_eq!(inbox.address(), Address::popup());
    }
}
