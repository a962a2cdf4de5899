//! # Ports - State Store
//!
//! The store is an external collaborator; the runtime only depends on this trait.

use crate::domain::{State, StoreError};
use async_trait::async_trait;

/// Pure transition from the current state to the next one.
pub type StateUpdater = Box<dyn FnOnce(State) -> State + Send>;

/// Asynchronous get/set state container.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Snapshot of the current state.
    async fn get_state(&self) -> Result<State, StoreError>;

    /// Replace the state with `updater(current)`.
    ///
    /// The updater runs against the latest committed state, but nothing stops
    /// another caller from committing between this call and an earlier
    /// `get_state`.
    async fn set_state(&self, updater: StateUpdater) -> Result<(), StoreError>;
}

impl dyn StateStore {
    /// `set_state` without boxing at the call site.
    pub async fn update<F>(&self, updater: F) -> Result<(), StoreError>
    where
        F: FnOnce(State) -> State + Send + 'static,
    {
        self.set_state(Box::new(updater)).await
    }
}
