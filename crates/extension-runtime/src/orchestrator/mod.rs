//! # Action Orchestrator
//!
//! One orchestrator per context. It is the only path an action takes from a
//! call site to its handler.
//!
//! ## Invocation Flow
//!
//! ```text
//! Invoker::call(input)
//!     │
//!     ├─ 1. registry lookup ─────────── missing → Unresolved
//!     ├─ 2. route (local / remote) ──── Content action, no target → Unroutable
//!     ├─ 3. wait for RuntimeInfo (boot gating)
//!     ├─ 4. acquire gate permit (if the action declares a key)
//!     └─ 5. run handler locally, or ZoneTransport::request to the owner
//!                                            │
//!                     owner: Orchestrator::handle
//!                        ├─ registry lookup, owner check
//!                        ├─ wait for RuntimeInfo
//!                        ├─ acquire gate permit in the owner's gate
//!                        └─ run handler with caller = stamped sender
//! ```
//!
//! The caller gates in its own context and the owner gates again, so a key is
//! exclusive within every context and across all callers of the owner.
//!
//! A content script calling a content action `.on()` another frame sends the
//! request straight to that frame's endpoint on the bus. Browsers have no
//! content-to-content channel and would relay the call through the background
//! context; the gating and reply semantics are the same either way.

pub mod context;
pub mod invoker;

pub use context::ActionContext;
pub use invoker::Invoker;

use crate::container::ServiceContainer;
use async_trait::async_trait;
use serde_json::Value;
use shared_types::{ActionError, ActionId, Address, RuntimeInfo, Zone};
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use warden_telemetry::{
    log_action_event, metric_inc, time_histogram, ACTIONS_FAILED, ACTIONS_INVOKED, ACTION_DURATION,
};
use wd_01_action_registry::{Action, ActionEntry, ActionRegistry};
use wd_02_concurrency::{GateKey, KeyedGate, Permit};
use wd_04_zone_transport::{RequestHandler, ZoneTransport};
use wd_05_state_store::StateStore;

/// Registry type every context shares.
pub type Registry = ActionRegistry<ActionContext>;

/// Where an invocation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// In this context.
    Local,
    /// In the context at this address.
    Remote(Address),
}

impl Route {
    fn label(self) -> &'static str {
        match self {
            Route::Local => "local",
            Route::Remote(_) => "remote",
        }
    }
}

/// Per-context action orchestrator. Cheap to clone.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

struct Inner {
    address: Address,
    registry: Arc<Registry>,
    gate: KeyedGate,
    transport: Arc<ZoneTransport>,
    store: Arc<dyn StateStore>,
    services: Arc<ServiceContainer>,
    /// `None` until identity resolution finishes.
    runtime: watch::Sender<Option<RuntimeInfo>>,
    shutdown: CancellationToken,
}

impl Orchestrator {
    /// Create the orchestrator for the context `transport` is attached as.
    ///
    /// The context starts unready: invocations wait until
    /// [`Orchestrator::mark_ready`] supplies its `RuntimeInfo`.
    #[must_use]
    pub fn new(
        registry: Arc<Registry>,
        transport: Arc<ZoneTransport>,
        store: Arc<dyn StateStore>,
        services: Arc<ServiceContainer>,
        shutdown: CancellationToken,
    ) -> Self {
        let (runtime, _) = watch::channel(None);
        Self {
            inner: Arc::new(Inner {
                address: transport.address(),
                registry,
                gate: KeyedGate::new(),
                transport,
                store,
                services,
                runtime,
                shutdown,
            }),
        }
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    /// Zone of this context.
    #[must_use]
    pub fn zone(&self) -> Zone {
        self.inner.address.zone
    }

    /// Bus address of this context.
    #[must_use]
    pub fn address(&self) -> Address {
        self.inner.address
    }

    /// This context's concurrency gate.
    #[must_use]
    pub fn gate(&self) -> &KeyedGate {
        &self.inner.gate
    }

    /// The shared state store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn StateStore> {
        &self.inner.store
    }

    /// Host-supplied services.
    #[must_use]
    pub fn services(&self) -> &Arc<ServiceContainer> {
        &self.inner.services
    }

    /// Token that fires when this context shuts down.
    #[must_use]
    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.inner.shutdown
    }

    // =========================================================================
    // READINESS
    // =========================================================================

    /// Resolved identity, `None` while booting.
    #[must_use]
    pub fn runtime_info(&self) -> Option<RuntimeInfo> {
        *self.inner.runtime.borrow()
    }

    /// Whether identity resolution has finished.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.runtime_info().is_some()
    }

    /// Record the resolved identity and release waiting invocations.
    ///
    /// Returns `false` if the identity was already set; it never changes.
    pub fn mark_ready(&self, info: RuntimeInfo) -> bool {
        let set = self.inner.runtime.send_if_modified(|slot| {
            if slot.is_some() {
                return false;
            }
            *slot = Some(info);
            true
        });
        if set {
            debug!(address = %self.inner.address, runtime = %info, "Context ready");
        }
        set
    }

    /// Wait until this context is ready.
    ///
    /// # Errors
    ///
    /// `Transport` if the context shuts down first.
    pub async fn ready(&self) -> Result<RuntimeInfo, ActionError> {
        self.wait_ready(&CancellationToken::new()).await
    }

    async fn wait_ready(&self, cancel: &CancellationToken) -> Result<RuntimeInfo, ActionError> {
        let mut updates = self.inner.runtime.subscribe();
        loop {
            let current = *updates.borrow_and_update();
            if let Some(info) = current {
                return Ok(info);
            }
            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(ActionError::Cancelled),
                () = self.inner.shutdown.cancelled() => {
                    return Err(ActionError::transport(format!(
                        "{} shut down before it was ready",
                        self.inner.address
                    )));
                }
                changed = updates.changed() => {
                    if changed.is_err() {
                        return Err(ActionError::transport("readiness channel closed"));
                    }
                }
            }
        }
    }

    // =========================================================================
    // INVOCATION
    // =========================================================================

    /// Typed invoker for `action`.
    #[must_use]
    pub fn use_action<I, O>(&self, action: &Action<I, O>) -> Invoker<I, O> {
        Invoker::new(self.clone(), action.clone())
    }

    /// Invoke `action_id` with an already encoded input.
    ///
    /// `target` selects the tab and frame for content-zone actions and is
    /// ignored for singleton zones.
    ///
    /// # Errors
    ///
    /// - `Unresolved` - no action registered under `action_id`
    /// - `Unroutable` - content-zone action with no target from a
    ///   non-content context
    /// - `Cancelled` - `cancel` fired while waiting
    /// - transport failures and anything the handler returns
    pub async fn invoke(
        &self,
        action_id: &ActionId,
        input: Value,
        target: Option<RuntimeInfo>,
        cancel: &CancellationToken,
    ) -> Result<Value, ActionError> {
        let Some(entry) = self.inner.registry.get(action_id) else {
            let err = ActionError::Unresolved {
                action_id: action_id.clone(),
            };
            self.record_failure(action_id, "unresolved", &err);
            return Err(err);
        };

        let route = match self.route(entry, target) {
            Ok(route) => route,
            Err(err) => {
                self.record_failure(action_id, "unroutable", &err);
                return Err(err);
            }
        };

        let timer = time_histogram!(ACTION_DURATION, &[route.label()]);
        let outcome = async {
            let runtime_info = self.wait_ready(cancel).await?;
            let _permit = self.admit(entry, cancel).await?;
            match route {
                Route::Local => {
                    self.run_local(
                        entry,
                        input,
                        self.inner.address,
                        runtime_info,
                        cancel.child_token(),
                    )
                    .await
                }
                Route::Remote(owner) => {
                    self.inner
                        .transport
                        .request(owner, action_id, input, cancel)
                        .await
                }
            }
        }
        .await;
        drop(timer);

        self.record(entry, route.label(), &outcome);
        outcome
    }

    /// Decide where `entry` runs when invoked from this context.
    ///
    /// # Errors
    ///
    /// `Unroutable` for a content-zone action without a target when this
    /// context is not itself a content script.
    pub fn route(
        &self,
        entry: &ActionEntry<ActionContext>,
        target: Option<RuntimeInfo>,
    ) -> Result<Route, ActionError> {
        let own = self.inner.address;
        match entry.zone() {
            Zone::Content => match target {
                Some(target) if own.zone == Zone::Content && own.runtime == target => {
                    Ok(Route::Local)
                }
                Some(target) => Ok(Route::Remote(Address::content(target))),
                None if own.zone == Zone::Content => Ok(Route::Local),
                None => Err(ActionError::unroutable(format!(
                    "{} runs in content scripts; call it with .on(tab, frame) from {}",
                    entry.id(),
                    own.zone
                ))),
            },
            zone if zone == own.zone => Ok(Route::Local),
            zone => Address::singleton(zone)
                .map(Route::Remote)
                .ok_or_else(|| ActionError::unroutable(format!("no address for {zone}"))),
        }
    }

    /// Acquire the gate permit `entry` declares, if any.
    async fn admit(
        &self,
        entry: &ActionEntry<ActionContext>,
        cancel: &CancellationToken,
    ) -> Result<Option<Permit>, ActionError> {
        let Some(key) = entry.concurrency() else {
            return Ok(None);
        };
        let gate_key = GateKey::resolve(entry.id(), key);
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(ActionError::Cancelled),
            permit = self.inner.gate.acquire(gate_key, key.capacity()) => Ok(Some(permit)),
        }
    }

    async fn run_local(
        &self,
        entry: &ActionEntry<ActionContext>,
        input: Value,
        caller: Address,
        runtime_info: RuntimeInfo,
        cancel: CancellationToken,
    ) -> Result<Value, ActionError> {
        if cancel.is_cancelled() {
            return Err(ActionError::Cancelled);
        }
        debug!(action_id = %entry.id(), %caller, zone = %self.zone(), "Running action");
        let ctx = ActionContext::new(self.clone(), caller, runtime_info, cancel);
        entry.invoke(ctx, input).await
    }

    // =========================================================================
    // METRICS
    // =========================================================================

    fn record(
        &self,
        entry: &ActionEntry<ActionContext>,
        route: &'static str,
        outcome: &Result<Value, ActionError>,
    ) {
        metric_inc!(ACTIONS_INVOKED, &[entry.zone().name(), route]);
        let Err(err) = outcome else {
            return;
        };
        metric_inc!(ACTIONS_FAILED, &[err.code()]);
        if err.is_handler() && route == "served" {
            log_action_event!(
                debug,
                self.zone(),
                "Action failed",
                entry.id(),
                route,
                code = err.code()
            );
        } else if err.is_handler() {
            log_action_event!(
                error,
                self.zone(),
                "Action failed",
                entry.id(),
                route,
                code = err.code(),
                detail = %err.wire_message()
            );
        } else {
            log_action_event!(
                warn,
                self.zone(),
                "Action did not complete",
                entry.id(),
                route,
                error = %err
            );
        }
    }

    fn record_failure(&self, action_id: &ActionId, route: &'static str, err: &ActionError) {
        metric_inc!(ACTIONS_FAILED, &[err.code()]);
        log_action_event!(warn, self.zone(), "Action rejected", action_id, route, error = %err);
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("address", &self.inner.address)
            .field("ready", &self.is_ready())
            .field("actions", &self.inner.registry.len())
            .finish()
    }
}

// =============================================================================
// SERVING REMOTE CALLS
// =============================================================================

#[async_trait]
impl RequestHandler for Orchestrator {
    async fn handle(
        &self,
        from: Address,
        action_id: ActionId,
        input: Value,
    ) -> Result<Value, ActionError> {
        let Some(entry) = self.inner.registry.get(&action_id) else {
            let err = ActionError::Unresolved {
                action_id: action_id.clone(),
            };
            self.record_failure(&action_id, "served", &err);
            return Err(err);
        };
        if entry.zone() != self.zone() {
            let err = ActionError::unroutable(format!(
                "{action_id} is owned by {}, not {}",
                entry.zone(),
                self.zone()
            ));
            self.record_failure(&action_id, "served", &err);
            return Err(err);
        }

        let timer = time_histogram!(ACTION_DURATION, &["served"]);
        let cancel = self.inner.shutdown.child_token();
        let outcome = async {
            let runtime_info = self.wait_ready(&cancel).await?;
            let _permit = self.admit(entry, &cancel).await?;
            self.run_local(entry, input, from, runtime_info, cancel.clone())
                .await
        }
        .await;
        drop(timer);

        self.record(entry, "served", &outcome);
        outcome
    }
}
