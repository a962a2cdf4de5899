//! In-memory state store.

use crate::domain::{State, StoreError};
use crate::ports::{StateStore, StateUpdater};
use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::watch;
use tracing::debug;

/// Process-local store with a change counter.
///
/// Every committed `set_state` bumps the version published on a
/// `tokio::sync::watch` channel so hosts and tests can wait for writes.
pub struct InMemoryStateStore {
    state: RwLock<State>,
    version: watch::Sender<u64>,
}

impl InMemoryStateStore {
    #[must_use]
    pub fn new() -> Self {
        Self::with_state(State::new())
    }

    #[must_use]
    pub fn with_state(initial: State) -> Self {
        let (version, _) = watch::channel(0);
        Self {
            state: RwLock::new(initial),
            version,
        }
    }

    /// Receiver of the version counter, starting at the current version.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }

    /// Number of committed writes.
    #[must_use]
    pub fn version(&self) -> u64 {
        *self.version.borrow()
    }
}

impl Default for InMemoryStateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn get_state(&self) -> Result<State, StoreError> {
        Ok(self.state.read().clone())
    }

    async fn set_state(&self, updater: StateUpdater) -> Result<(), StoreError> {
        {
            let mut state = self.state.write();
            // A panicking updater leaves the committed state untouched.
            let next = updater(state.clone());
            *state = next;
        }

        self.version.send_modify(|v| *v += 1);
        debug!(version = self.version(), "State committed");
        Ok(())
    }
}
