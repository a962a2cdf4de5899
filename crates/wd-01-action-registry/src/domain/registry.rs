//! # Registry
//!
//! One explicitly-constructed registry per hosting process, built during boot
//! and shared read-only (`Arc<ActionRegistry<C>>`) by every context afterwards.

use crate::domain::descriptor::{Action, ActionDescriptor, ActionEntry};
use shared_types::{ActionId, RegistryError};
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, error};

/// Action id to descriptor map.
pub struct ActionRegistry<C> {
    actions: HashMap<ActionId, ActionEntry<C>>,
}

impl<C> ActionRegistry<C> {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            actions: HashMap::new(),
        }
    }

    /// Store `descriptor` and return the typed handle callers invoke.
    ///
    /// No handler runs as a result of registration.
    ///
    /// # Errors
    ///
    /// `RegistryError::DuplicateAction` if the id is already taken. This is a
    /// programming error; boot code should propagate it and stop.
    pub fn register<I, O>(
        &mut self,
        descriptor: ActionDescriptor<I, O, C>,
    ) -> Result<Action<I, O>, RegistryError> {
        if self.actions.contains_key(descriptor.id()) {
            error!(action_id = %descriptor.id(), "Duplicate action registration");
            return Err(RegistryError::DuplicateAction {
                action_id: descriptor.id().clone(),
            });
        }

        let (handle, entry) = descriptor.into_parts();
        debug!(
            action_id = %entry.id(),
            zone = %entry.zone(),
            concurrency = ?entry.concurrency(),
            "Action registered"
        );
        self.actions.insert(entry.id().clone(), entry);
        Ok(handle)
    }

    /// Look up an entry by id.
    #[must_use]
    pub fn get(&self, id: &ActionId) -> Option<&ActionEntry<C>> {
        self.actions.get(id)
    }

    #[must_use]
    pub fn contains(&self, id: &ActionId) -> bool {
        self.actions.contains_key(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

impl<C> Default for ActionRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> fmt::Debug for ActionRegistry<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("actions", &self.actions.len())
            .finish()
    }
}
