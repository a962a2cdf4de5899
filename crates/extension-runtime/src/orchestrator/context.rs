use super::{Invoker, Orchestrator};
use crate::container::ServiceContainer;
use shared_types::{ActionError, Address, RuntimeInfo, Zone};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use wd_01_action_registry::Action;
use wd_05_state_store::StateStore;

/// Everything a handler can reach.
///
/// Built fresh for each run of a handler, in the context that owns the
/// action.
#[derive(Clone)]
pub struct ActionContext {
    /// Orchestrator of the context running the handler.
    pub orchestrator: Orchestrator,
    /// Shared state store.
    pub store: Arc<dyn StateStore>,
    /// Identity of the context running the handler.
    pub runtime_info: RuntimeInfo,
    /// Who invoked the action. For remote calls this is the bus-stamped
    /// sender; for local calls it is this context.
    pub caller: Address,
    /// Fires when the invocation is cancelled or the context shuts down.
    pub cancel: CancellationToken,
    services: Arc<ServiceContainer>,
}

impl ActionContext {
    pub(crate) fn new(
        orchestrator: Orchestrator,
        caller: Address,
        runtime_info: RuntimeInfo,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            store: Arc::clone(orchestrator.store()),
            services: Arc::clone(orchestrator.services()),
            orchestrator,
            runtime_info,
            caller,
            cancel,
        }
    }

    /// Zone the handler runs in.
    #[must_use]
    pub fn zone(&self) -> Zone {
        self.orchestrator.zone()
    }

    /// Host-supplied service of type `T`.
    #[must_use]
    pub fn service<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.services.get::<T>()
    }

    /// Invoker for a nested call. Cancelling this invocation cancels the
    /// nested one.
    #[must_use]
    pub fn use_action<I, O>(&self, action: &Action<I, O>) -> Invoker<I, O> {
        self.orchestrator
            .use_action(action)
            .inherit(self.cancel.child_token())
    }

    /// `Err(Cancelled)` once the invocation has been cancelled.
    ///
    /// # Errors
    ///
    /// `ActionError::Cancelled` when `cancel` has fired.
    pub fn check_cancelled(&self) -> Result<(), ActionError> {
        if self.cancel.is_cancelled() {
            Err(ActionError::Cancelled)
        } else {
            Ok(())
        }
    }
}

impl std::fmt::Debug for ActionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionContext")
            .field("zone", &self.zone())
            .field("runtime_info", &self.runtime_info)
            .field("caller", &self.caller)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}
