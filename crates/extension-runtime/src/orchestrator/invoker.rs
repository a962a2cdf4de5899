use super::Orchestrator;
use serde::de::DeserializeOwned;
use serde::Serialize;
use shared_types::{ActionError, RuntimeInfo};
use tokio_util::sync::CancellationToken;
use wd_01_action_registry::Action;

/// Typed call handle for one action, bound to one context.
///
/// `call` looks identical whether the handler runs here or in another zone.
pub struct Invoker<I, O> {
    orchestrator: Orchestrator,
    action: Action<I, O>,
    target: Option<RuntimeInfo>,
    inherited: Option<CancellationToken>,
}

impl<I, O> Invoker<I, O> {
    pub(crate) fn new(orchestrator: Orchestrator, action: Action<I, O>) -> Self {
        Self {
            orchestrator,
            action,
            target: None,
            inherited: None,
        }
    }

    pub(crate) fn inherit(mut self, cancel: CancellationToken) -> Self {
        self.inherited = Some(cancel);
        self
    }

    /// Direct content-zone calls at the script in `target`'s tab and frame.
    #[must_use]
    pub fn on(mut self, target: RuntimeInfo) -> Self {
        self.target = Some(target);
        self
    }

    /// The action this invoker calls.
    #[must_use]
    pub fn action(&self) -> &Action<I, O> {
        &self.action
    }
}

impl<I: Serialize, O: DeserializeOwned> Invoker<I, O> {
    /// Invoke the action and wait for its output.
    ///
    /// # Errors
    ///
    /// See [`Orchestrator::invoke`]; encoding failures surface as `Codec`.
    pub async fn call(&self, input: I) -> Result<O, ActionError> {
        let cancel = self.inherited.clone().unwrap_or_default();
        self.call_with(input, &cancel).await
    }

    /// Invoke with an explicit cancellation token.
    ///
    /// # Errors
    ///
    /// See [`Invoker::call`]; additionally `Cancelled` once `cancel` fires.
    pub async fn call_with(&self, input: I, cancel: &CancellationToken) -> Result<O, ActionError> {
        let id = self.action.id();
        let input = serde_json::to_value(input)
            .map_err(|e| ActionError::codec(format!("{id} input: {e}")))?;
        let output = self
            .orchestrator
            .invoke(id, input, self.target, cancel)
            .await?;
        serde_json::from_value(output).map_err(|e| ActionError::codec(format!("{id} output: {e}")))
    }
}

impl<I, O> Clone for Invoker<I, O> {
    fn clone(&self) -> Self {
        Self {
            orchestrator: self.orchestrator.clone(),
            action: self.action.clone(),
            target: self.target,
            inherited: self.inherited.clone(),
        }
    }
}

impl<I, O> std::fmt::Debug for Invoker<I, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Invoker")
            .field("action", &self.action)
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}
