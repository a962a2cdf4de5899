//! # Test Fixtures
//!
//! A host preloaded with the actions the integration tests call, and a
//! probe that records when handlers start and finish.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use extension_runtime::{
    ActionContext, ContextHandle, ExtensionHost, FrameContext, HostBuilder, RuntimeConfig,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared_types::{ActionError, RuntimeInfo, TabId, Zone};
use wd_01_action_registry::{Action, ActionDescriptor};
use wd_05_state_store::{InMemoryStateStore, StateStore};

/// Token every test host signs its frame messages with.
pub const TOKEN: &str = "warden-test-extension";

/// Upper bound for anything a test awaits.
pub const WAIT: Duration = Duration::from_secs(2);

#[must_use]
pub fn test_config() -> RuntimeConfig {
    let mut config = RuntimeConfig::default();
    config.identity.secret_token = TOKEN.to_string();
    config
}

#[must_use]
pub fn config_with_timeout(request_timeout_ms: u64) -> RuntimeConfig {
    let mut config = test_config();
    config.transport.request_timeout_ms = request_timeout_ms;
    config
}

// =============================================================================
// PROBE
// =============================================================================

/// Records handler entry and exit so tests can observe overlap and order.
#[derive(Default)]
pub struct Probe {
    events: Mutex<Vec<String>>,
    running: AtomicUsize,
    peak: AtomicUsize,
}

impl Probe {
    pub fn enter(&self, label: &str) {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.events.lock().push(format!("start:{label}"));
    }

    pub fn exit(&self, label: &str) {
        self.events.lock().push(format!("end:{label}"));
        self.running.fetch_sub(1, Ordering::SeqCst);
    }

    #[must_use]
    pub fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }

    /// Labels in the order their handlers started.
    #[must_use]
    pub fn starts(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| event.strip_prefix("start:").map(str::to_string))
            .collect()
    }

    /// Most handlers ever running at once.
    #[must_use]
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

// =============================================================================
// ACTIONS
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerChange {
    pub layer: String,
    pub fail: bool,
}

impl LayerChange {
    #[must_use]
    pub fn apply(layer: &str) -> Self {
        Self {
            layer: layer.to_string(),
            fail: false,
        }
    }

    #[must_use]
    pub fn failing(layer: &str) -> Self {
        Self {
            layer: layer.to_string(),
            fail: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LayerRecord {
    owner: RuntimeInfo,
    layer: String,
}

pub struct TestActions {
    /// Background, shared key "ctr".
    pub increment: Action<(), i64>,
    /// Background, shared key "ctr".
    pub decrement: Action<(), i64>,
    /// Background, per-action key of 1, recorded by the probe.
    pub noop: Action<String, String>,
    /// Background, always fails with `MissingTOTP`.
    pub read_totp: Action<String, String>,
    /// Content, shared key "mutate-layers".
    pub mutate_layers: Action<LayerChange, Vec<String>>,
    /// Popup, returns its input.
    pub echo: Action<Value, Value>,
    /// Background, sleeps for the given milliseconds unless cancelled.
    pub linger: Action<u64, String>,
    /// Content, returns the serving frame's identity.
    pub frame_info: Action<(), RuntimeInfo>,
    /// Content, never completes.
    pub stall: Action<(), ()>,
    /// Background, shared key "vault-index". Panics on "corrupt", else echoes.
    pub explode: Action<String, String>,
}

impl TestActions {
    fn register(builder: &mut HostBuilder) -> Result<Self, shared_types::RegistryError> {
        let increment = builder.register(
            ActionDescriptor::<(), i64, ActionContext>::builder("counter/increment", Zone::Background)
                .concurrency("ctr")
                .execute(|ctx, ()| async move { adjust_counter(&ctx, 1).await }),
        )?;
        let decrement = builder.register(
            ActionDescriptor::<(), i64, ActionContext>::builder("counter/decrement", Zone::Background)
                .concurrency("ctr")
                .execute(|ctx, ()| async move { adjust_counter(&ctx, -1).await }),
        )?;
        let noop = builder.register(
            ActionDescriptor::<String, String, ActionContext>::builder("test/noop", Zone::Background)
                .concurrency(1)
                .execute(|ctx, label| async move {
                    let probe = ctx
                        .service::<Probe>()
                        .ok_or_else(|| ActionError::handler("NoProbe", "probe not provided"))?;
                    probe.enter(&label);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    probe.exit(&label);
                    Ok::<_, ActionError>(label)
                }),
        )?;
        let read_totp = builder.register(
            ActionDescriptor::<String, String, ActionContext>::builder("vault/read-totp", Zone::Background)
                .execute(|_, site| async move {
                    Err(ActionError::handler(
                        "MissingTOTP",
                        format!("no TOTP secret for {site}"),
                    ))
                }),
        )?;
        let mutate_layers = builder.register(
            ActionDescriptor::<LayerChange, Vec<String>, ActionContext>::builder(
                "page/mutate-layers",
                Zone::Content,
            )
            .concurrency("mutate-layers")
            .execute(|ctx, change| async move {
                if change.fail {
                    return Err(ActionError::handler(
                        "LayerError",
                        format!("could not apply {}", change.layer),
                    ));
                }
                let mut layers: Vec<LayerRecord> =
                    ctx.store.get_state().await?.get_or_default("layers")?;
                tokio::time::sleep(Duration::from_millis(5)).await;
                layers.push(LayerRecord {
                    owner: ctx.runtime_info,
                    layer: change.layer,
                });
                let mine: Vec<String> = layers
                    .iter()
                    .filter(|record| ctx.runtime_info.owns(&record.owner))
                    .map(|record| record.layer.clone())
                    .collect();
                let next =
                    serde_json::to_value(&layers).map_err(|e| ActionError::codec(e.to_string()))?;
                ctx.store.update(move |state| state.with("layers", next)).await?;
                Ok(mine)
            }),
        )?;
        let echo = builder.register(
            ActionDescriptor::<Value, Value, ActionContext>::builder("test/echo", Zone::Popup)
                .execute(|_, value| async move { Ok(value) }),
        )?;
        let linger = builder.register(
            ActionDescriptor::<u64, String, ActionContext>::builder("test/linger", Zone::Background)
                .execute(|ctx, ms| async move {
                    tokio::select! {
                        () = ctx.cancel.cancelled() => Err(ActionError::Cancelled),
                        () = tokio::time::sleep(Duration::from_millis(ms)) => Ok("done".to_string()),
                    }
                }),
        )?;
        let frame_info = builder.register(
            ActionDescriptor::<(), RuntimeInfo, ActionContext>::builder("test/frame-info", Zone::Content)
                .execute(|ctx, ()| async move { Ok(ctx.runtime_info) }),
        )?;
        let stall = builder.register(
            ActionDescriptor::<(), (), ActionContext>::builder("test/stall", Zone::Content)
                .execute(|_, ()| futures::future::pending::<Result<(), ActionError>>()),
        )?;
        let explode = builder.register(
            ActionDescriptor::<String, String, ActionContext>::builder("vault/reindex", Zone::Background)
                .concurrency("vault-index")
                .execute(|_, entry| async move {
                    if entry == "corrupt" {
                        panic!("index entry {entry} is unreadable");
                    }
                    Ok::<_, ActionError>(entry)
                }),
        )?;

        Ok(Self {
            increment,
            decrement,
            noop,
            read_totp,
            mutate_layers,
            echo,
            linger,
            frame_info,
            stall,
            explode,
        })
    }
}

async fn adjust_counter(ctx: &ActionContext, delta: i64) -> Result<i64, ActionError> {
    let current: i64 = ctx.store.get_state().await?.get_or_default("count")?;
    tokio::time::sleep(Duration::from_millis(10)).await;
    let next = current + delta;
    ctx.store.update(move |state| state.with("count", next)).await?;
    Ok(next)
}

// =============================================================================
// HARNESS
// =============================================================================

/// A built host with no contexts booted yet.
pub struct Harness {
    pub host: ExtensionHost,
    pub actions: TestActions,
    pub probe: Arc<Probe>,
    pub store: Arc<InMemoryStateStore>,
}

impl Harness {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    /// # Panics
    ///
    /// If `config` is invalid or the test actions collide.
    #[must_use]
    pub fn with_config(config: RuntimeConfig) -> Self {
        let store = Arc::new(InMemoryStateStore::new());
        let probe = Arc::new(Probe::default());
        let mut builder = ExtensionHost::builder(config)
            .expect("test config is valid")
            .store(Arc::clone(&store) as Arc<dyn StateStore>);
        builder.shared_service(Arc::clone(&probe));
        let actions = TestActions::register(&mut builder).expect("test actions are unique");

        Self {
            host: builder.build(),
            actions,
            probe,
            store,
        }
    }

    /// Boot background, popup and the top frame of tab 1.
    ///
    /// # Panics
    ///
    /// If any context fails to boot.
    pub async fn boot(&self) -> Contexts {
        let background = self.host.boot_background().await.expect("background boots");
        let popup = self.host.boot_popup().await.expect("popup boots");
        let top = self.host.open_tab(TabId(1)).await.expect("tab 1 boots");
        Contexts {
            background,
            popup,
            top,
        }
    }

    /// Current value of the shared counter.
    ///
    /// # Panics
    ///
    /// If the store holds a non-integer count.
    pub async fn count(&self) -> i64 {
        self.store
            .get_state()
            .await
            .expect("store readable")
            .get_or_default("count")
            .expect("count is an integer")
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

/// The contexts most tests need.
pub struct Contexts {
    pub background: ContextHandle,
    pub popup: ContextHandle,
    pub top: FrameContext,
}

impl Contexts {
    pub async fn shutdown(self) {
        self.top.shutdown().await;
        self.popup.shutdown().await;
        self.background.shutdown().await;
    }
}
