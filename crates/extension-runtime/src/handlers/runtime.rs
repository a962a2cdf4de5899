//! # Runtime Actions
//!
//! `runtime/whoami` answers a content script's identity question: the
//! background reads the tab and frame the bus stamped on the request.

use crate::orchestrator::{ActionContext, Registry};
use async_trait::async_trait;
use serde_json::Value;
use shared_types::{ActionError, ActionId, Address, RegistryError, RuntimeInfo, Zone};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use wd_01_action_registry::{Action, ActionDescriptor};
use wd_03_runtime_identity::RuntimeQuery;
use wd_04_zone_transport::ZoneTransport;

/// Id of the identity action.
pub const WHOAMI: &str = "runtime/whoami";

/// Handles to the built-in actions.
#[derive(Debug, Clone)]
pub struct BuiltinActions {
    /// Returns the caller's `RuntimeInfo`. Owned by the background.
    pub whoami: Action<(), RuntimeInfo>,
}

/// Register the built-in actions.
///
/// # Errors
///
/// `DuplicateAction` if a user action already took a built-in id.
pub fn register_builtin_actions(registry: &mut Registry) -> Result<BuiltinActions, RegistryError> {
    let whoami = registry.register(
        ActionDescriptor::<(), RuntimeInfo, ActionContext>::builder(WHOAMI, Zone::Background)
            .execute(|ctx, ()| async move { Ok(ctx.caller.runtime) }),
    )?;
    Ok(BuiltinActions { whoami })
}

/// `RuntimeQuery` that asks the background over the transport.
///
/// Used while the context is still booting, so it bypasses the
/// orchestrator's readiness gate.
pub struct BackgroundRuntimeQuery {
    transport: Arc<ZoneTransport>,
    cancel: CancellationToken,
}

impl BackgroundRuntimeQuery {
    #[must_use]
    pub fn new(transport: Arc<ZoneTransport>, cancel: CancellationToken) -> Self {
        Self { transport, cancel }
    }
}

#[async_trait]
impl RuntimeQuery for BackgroundRuntimeQuery {
    async fn query_runtime(&self) -> Result<RuntimeInfo, ActionError> {
        let output = self
            .transport
            .request(
                Address::background(),
                &ActionId::from(WHOAMI),
                Value::Null,
                &self.cancel,
            )
            .await?;
        serde_json::from_value(output).map_err(|e| ActionError::codec(format!("{WHOAMI}: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wd_01_action_registry::ActionRegistry;

    #[test]
    fn test_whoami_is_background_owned() {
        let mut registry: Registry = ActionRegistry::new();
        let builtins = register_builtin_actions(&mut registry).unwrap();

        assert_eq!(builtins.whoami.zone(), Zone::Background);
        assert_eq!(builtins.whoami.id().as_str(), WHOAMI);
        assert!(builtins.whoami.concurrency().is_none());
        assert!(registry.contains(&ActionId::from(WHOAMI)));
    }

    #[test]
    fn test_builtins_register_once() {
        let mut registry: Registry = ActionRegistry::new();
        register_builtin_actions(&mut registry).unwrap();

        assert!(matches!(
            register_builtin_actions(&mut registry),
            Err(RegistryError::DuplicateAction { .. })
        ));
    }
}
