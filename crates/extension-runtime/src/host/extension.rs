//! # Extension Host
//!
//! Boots contexts onto one in-memory bus, the way a browser starts an
//! extension's background worker, its popup, and a content script in every
//! frame of every tab.
//!
//! ## Boot Sequence (per context)
//!
//! ```text
//! 1. attach to the bus at the context's address
//! 2. create ZoneTransport + Orchestrator, start the listener
//! 3. (content) start the window pump, optionally announce to the parent
//! 4. resolve RuntimeInfo (content asks the background via runtime/whoami)
//! 5. (content) give the frame resolver its own frame id
//! 6. mark the orchestrator ready
//! ```
//!
//! Requests that reach a context between steps 2 and 6 wait for readiness.

use super::document::{SimDocument, WindowReceiver};
use crate::container::{ConfigError, RuntimeConfig, ServiceContainer};
use crate::handlers::{register_builtin_actions, BackgroundRuntimeQuery, BuiltinActions};
use crate::orchestrator::{ActionContext, Invoker, Orchestrator, Registry};
use shared_bus::{BusError, InMemoryMessageBus};
use shared_types::{ActionError, Address, FrameId, RegistryError, RuntimeInfo, TabId, Zone};
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use wd_01_action_registry::{Action, ActionDescriptor, ActionRegistry};
use wd_03_runtime_identity::{
    resolve_runtime_info, FrameDocument, FrameIdentityResolver, IframeHandle,
};
use wd_04_zone_transport::ZoneTransport;
use wd_05_state_store::{InMemoryStateStore, StateStore};

/// Host errors.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("bus error: {0}")]
    Bus(#[from] BusError),

    #[error("identity resolution failed: {0}")]
    Identity(#[from] ActionError),
}

/// Whether a newly mounted iframe announces itself to its parent on load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IframeLoad {
    /// Send `frame-id/init` before identity resolution finishes.
    Announce,
    /// Stay quiet; call [`FrameContext::announce`] later.
    Silent,
}

// =============================================================================
// BUILDER
// =============================================================================

/// Collects actions and services before any context boots.
pub struct HostBuilder {
    config: RuntimeConfig,
    registry: Registry,
    services: ServiceContainer,
    store: Option<Arc<dyn StateStore>>,
    builtins: BuiltinActions,
}

impl HostBuilder {
    /// Register a user action.
    ///
    /// # Errors
    ///
    /// `DuplicateAction` if the id is taken.
    pub fn register<I, O>(
        &mut self,
        descriptor: ActionDescriptor<I, O, ActionContext>,
    ) -> Result<Action<I, O>, RegistryError> {
        self.registry.register(descriptor)
    }

    /// Provide a service to handlers.
    pub fn service<T: Send + Sync + 'static>(&mut self, service: T) -> &mut Self {
        self.services.insert(service);
        self
    }

    /// Provide a service the host also keeps a handle to.
    pub fn shared_service<T: Send + Sync + 'static>(&mut self, service: Arc<T>) -> &mut Self {
        self.services.insert_arc(service);
        self
    }

    /// Use `store` instead of a fresh in-memory store.
    #[must_use]
    pub fn store(mut self, store: Arc<dyn StateStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Freeze the registry and create the host.
    #[must_use]
    pub fn build(self) -> ExtensionHost {
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(InMemoryStateStore::new()));
        info!(
            actions = self.registry.len(),
            services = self.services.len(),
            "Extension host built"
        );
        ExtensionHost {
            bus: InMemoryMessageBus::with_capacity(self.config.bus.channel_capacity),
            config: self.config,
            registry: Arc::new(self.registry),
            store,
            services: Arc::new(self.services),
            builtins: self.builtins,
        }
    }
}

// =============================================================================
// HOST
// =============================================================================

/// All contexts of one extension, sharing a bus, a registry and a store.
pub struct ExtensionHost {
    config: RuntimeConfig,
    bus: Arc<InMemoryMessageBus>,
    registry: Arc<Registry>,
    store: Arc<dyn StateStore>,
    services: Arc<ServiceContainer>,
    builtins: BuiltinActions,
}

impl ExtensionHost {
    /// Start building a host.
    ///
    /// # Errors
    ///
    /// `Config` if `config` does not validate.
    pub fn builder(config: RuntimeConfig) -> Result<HostBuilder, HostError> {
        config.validate()?;
        let mut registry = ActionRegistry::new();
        let builtins = register_builtin_actions(&mut registry)?;
        Ok(HostBuilder {
            config,
            registry,
            services: ServiceContainer::new(),
            store: None,
            builtins,
        })
    }

    #[must_use]
    pub fn bus(&self) -> &Arc<InMemoryMessageBus> {
        &self.bus
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn StateStore> {
        &self.store
    }

    #[must_use]
    pub fn builtins(&self) -> &BuiltinActions {
        &self.builtins
    }

    /// Boot the background worker.
    ///
    /// # Errors
    ///
    /// `Bus(AddressInUse)` if a background is already attached.
    pub async fn boot_background(&self) -> Result<ContextHandle, HostError> {
        self.boot_extension_page(Address::background()).await
    }

    /// Boot the popup.
    ///
    /// # Errors
    ///
    /// `Bus(AddressInUse)` if a popup is already attached.
    pub async fn boot_popup(&self) -> Result<ContextHandle, HostError> {
        self.boot_extension_page(Address::popup()).await
    }

    async fn boot_extension_page(&self, address: Address) -> Result<ContextHandle, HostError> {
        let context = self.start_context(address)?;
        let query = BackgroundRuntimeQuery::new(
            Arc::clone(&context.transport),
            context.shutdown.child_token(),
        );
        let info = resolve_runtime_info(address.zone, &query).await?;
        context.orchestrator.mark_ready(info);
        Ok(context)
    }

    /// Open a tab and boot the content script of its top frame.
    ///
    /// # Errors
    ///
    /// `Identity` when the background cannot answer `runtime/whoami`.
    pub async fn open_tab(&self, tab_id: TabId) -> Result<FrameContext, HostError> {
        let (document, window) = SimDocument::top();
        self.boot_frame(tab_id, FrameId::TOP, document, window, IframeLoad::Silent)
            .await
    }

    /// Append an iframe to `parent`'s document and boot a content script in
    /// it as frame `frame_id`.
    ///
    /// # Errors
    ///
    /// `Identity` when the background cannot answer `runtime/whoami`;
    /// `Bus(AddressInUse)` when `frame_id` is taken in the tab.
    pub async fn mount_iframe(
        &self,
        parent: &FrameContext,
        frame_id: FrameId,
        load: IframeLoad,
    ) -> Result<FrameContext, HostError> {
        let (_, document, window) = parent.document.append_iframe();
        self.boot_frame(parent.tab_id(), frame_id, document, window, load)
            .await
    }

    async fn boot_frame(
        &self,
        tab_id: TabId,
        frame_id: FrameId,
        document: Arc<SimDocument>,
        window: WindowReceiver,
        load: IframeLoad,
    ) -> Result<FrameContext, HostError> {
        let address = Address::content(RuntimeInfo::new(tab_id, frame_id));
        let context = self.start_context(address)?;

        let resolver = Arc::new(FrameIdentityResolver::new(
            self.config.identity.secret_token.clone(),
            Arc::clone(&document) as Arc<dyn FrameDocument>,
        ));
        let pump = spawn_window_pump(
            Arc::clone(&resolver),
            window,
            context.shutdown.child_token(),
        );
        if load == IframeLoad::Announce {
            resolver.announce();
        }

        let query = BackgroundRuntimeQuery::new(
            Arc::clone(&context.transport),
            context.shutdown.child_token(),
        );
        let info = match resolve_runtime_info(Zone::Content, &query).await {
            Ok(info) => info,
            Err(e) => {
                warn!(%address, error = %e, "Content script failed to boot");
                context.shutdown().await;
                pump.abort();
                return Err(e.into());
            }
        };

        let flushed = resolver.set_own_frame_id(info.frame_id);
        if flushed > 0 {
            debug!(%address, flushed, "Answered deferred frame id requests");
        }
        context.orchestrator.mark_ready(info);

        Ok(FrameContext {
            context,
            document,
            resolver,
            pump,
        })
    }

    fn start_context(&self, address: Address) -> Result<ContextHandle, HostError> {
        let (outbox, inbox) = self.bus.attach(address)?;
        let detached = self.bus.subscribe_detached();
        let transport = ZoneTransport::new(outbox, self.config.transport_config());
        let shutdown = CancellationToken::new();

        let orchestrator = Orchestrator::new(
            Arc::clone(&self.registry),
            Arc::clone(&transport),
            Arc::clone(&self.store),
            Arc::clone(&self.services),
            shutdown.clone(),
        );
        let listener = transport.spawn_listener(
            inbox,
            Arc::new(orchestrator.clone()),
            detached,
            shutdown.clone(),
        );

        info!(%address, "Context started");
        Ok(ContextHandle {
            orchestrator,
            transport,
            shutdown,
            listener,
        })
    }
}

impl std::fmt::Debug for ExtensionHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtensionHost")
            .field("actions", &self.registry.len())
            .field("contexts", &self.bus.endpoint_count())
            .finish_non_exhaustive()
    }
}

fn spawn_window_pump(
    resolver: Arc<FrameIdentityResolver>,
    mut window: WindowReceiver,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                message = window.recv() => match message {
                    Some(message) => match resolver.handle_message(message.source, &message.data) {
                        Ok(outcome) => trace!(?outcome, "Window message handled"),
                        Err(e) => trace!(error = %e, "Window message ignored"),
                    },
                    None => break,
                },
            }
        }
    })
}

// =============================================================================
// CONTEXT HANDLES
// =============================================================================

/// A running context.
pub struct ContextHandle {
    orchestrator: Orchestrator,
    transport: Arc<ZoneTransport>,
    shutdown: CancellationToken,
    listener: JoinHandle<()>,
}

impl ContextHandle {
    #[must_use]
    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    #[must_use]
    pub fn transport(&self) -> &Arc<ZoneTransport> {
        &self.transport
    }

    #[must_use]
    pub fn address(&self) -> Address {
        self.orchestrator.address()
    }

    /// Typed invoker running from this context.
    #[must_use]
    pub fn use_action<I, O>(&self, action: &Action<I, O>) -> Invoker<I, O> {
        self.orchestrator.use_action(action)
    }

    /// Stop the context and detach it from the bus.
    ///
    /// Calls other contexts still have pending here fail with `Transport`.
    pub async fn shutdown(self) {
        let address = self.address();
        self.shutdown.cancel();
        if let Err(e) = self.listener.await {
            warn!(%address, error = %e, "Listener task ended abnormally");
        }
        info!(%address, "Context stopped");
    }
}

/// A content script running in one frame of a tab.
pub struct FrameContext {
    context: ContextHandle,
    document: Arc<SimDocument>,
    resolver: Arc<FrameIdentityResolver>,
    pump: JoinHandle<()>,
}

impl FrameContext {
    #[must_use]
    pub fn orchestrator(&self) -> &Orchestrator {
        &self.context.orchestrator
    }

    #[must_use]
    pub fn document(&self) -> &Arc<SimDocument> {
        &self.document
    }

    #[must_use]
    pub fn resolver(&self) -> &Arc<FrameIdentityResolver> {
        &self.resolver
    }

    /// Tab and frame this script runs in.
    #[must_use]
    pub fn runtime_info(&self) -> RuntimeInfo {
        self.context.address().runtime
    }

    #[must_use]
    pub fn tab_id(&self) -> TabId {
        self.runtime_info().tab_id
    }

    /// This frame's iframe element in the parent document.
    #[must_use]
    pub fn iframe_handle(&self) -> Option<IframeHandle> {
        self.document.handle_in_parent()
    }

    /// Broadcast `frame-id/init` to the parent window.
    pub fn announce(&self) -> bool {
        self.resolver.announce()
    }

    /// Typed invoker running from this frame.
    #[must_use]
    pub fn use_action<I, O>(&self, action: &Action<I, O>) -> Invoker<I, O> {
        self.context.use_action(action)
    }

    /// Stop the content script.
    pub async fn shutdown(self) {
        self.context.shutdown().await;
        if let Err(e) = self.pump.await {
            warn!(error = %e, "Window pump ended abnormally");
        }
    }
}
