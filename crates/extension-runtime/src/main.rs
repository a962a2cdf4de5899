//! # Warden
//!
//! Boots every zone of the extension in one process and runs the reference
//! scenarios against it.
//!
//! ## Contexts
//!
//! ```text
//!   background ◄──── bus ────► popup
//!        ▲
//!        │
//!   tab 1 / frame 0 (top document)
//!        └── iframe ── tab 1 / frame 1
//! ```
//!
//! ## Startup Sequence
//!
//! 1. Initialize telemetry
//! 2. Load configuration from `WARDEN_*` variables
//! 3. Register the demo actions and services
//! 4. Boot background, popup, the top frame and its iframe
//! 5. Run the scenarios, print metrics, shut down

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use shared_types::{ActionError, FrameId, RuntimeInfo, TabId, Zone};
use tracing::{info, warn};
use uuid::Uuid;

use extension_runtime::{
    ActionContext, ContextHandle, ExtensionHost, FrameContext, HostBuilder, IframeLoad,
    RuntimeConfig,
};
use warden_telemetry::{encode_metrics, init_telemetry, TelemetryConfig};
use wd_01_action_registry::{Action, ActionDescriptor};

// =============================================================================
// DEMO ACTIONS
// =============================================================================

/// TOTP secrets by site, provided to handlers as a service.
struct TotpVault(HashMap<String, String>);

/// A layer and the frame it belongs to.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct LayerRecord {
    owner: RuntimeInfo,
    layer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LayerChange {
    layer: String,
    fail: bool,
}

struct DemoActions {
    increment: Action<(), i64>,
    decrement: Action<(), i64>,
    noop: Action<String, String>,
    read_totp: Action<String, String>,
    mutate_layers: Action<LayerChange, Vec<String>>,
}

impl DemoActions {
    fn register(builder: &mut HostBuilder) -> Result<Self> {
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
            ActionDescriptor::<String, String, ActionContext>::builder("demo/noop", Zone::Background)
                .concurrency(1)
                .execute(|_, label| async move {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    Ok(label)
                }),
        )?;
        let read_totp = builder.register(
            ActionDescriptor::<String, String, ActionContext>::builder("vault/read-totp", Zone::Background)
                .execute(|ctx, site| async move {
                    let vault = ctx
                        .service::<TotpVault>()
                        .ok_or_else(|| ActionError::handler("VaultLocked", "vault not available"))?;
                    vault.0.get(&site).cloned().ok_or_else(|| {
                        ActionError::handler("MissingTOTP", format!("no TOTP secret for {site}"))
                    })
                }),
        )?;
        let mutate_layers = builder.register(
            ActionDescriptor::<LayerChange, Vec<String>, ActionContext>::builder(
                "page/mutate-layers",
                Zone::Content,
            )
            .concurrency("mutate-layers")
            .execute(|ctx, change| async move {
                let mut layers: Vec<LayerRecord> =
                    ctx.store.get_state().await?.get_or_default("layers")?;
                tokio::time::sleep(Duration::from_millis(5)).await;
                if change.fail {
                    return Err(ActionError::handler(
                        "LayerError",
                        format!("could not apply {}", change.layer),
                    ));
                }
                layers.push(LayerRecord {
                    owner: ctx.runtime_info,
                    layer: change.layer,
                });
                let mine: Vec<String> = layers
                    .iter()
                    .filter(|record| ctx.runtime_info.owns(&record.owner))
                    .map(|record| record.layer.clone())
                    .collect();
                let next = serde_json::to_value(&layers).map_err(|e| ActionError::codec(e.to_string()))?;
                ctx.store.update(move |state| state.with("layers", next)).await?;
                Ok::<_, ActionError>(mine)
            }),
        )?;

        Ok(Self {
            increment,
            decrement,
            noop,
            read_totp,
            mutate_layers,
        })
    }
}

/// Read-modify-write of the shared counter; only safe under the "ctr" key.
async fn adjust_counter(ctx: &ActionContext, delta: i64) -> Result<i64, ActionError> {
    let current: i64 = ctx.store.get_state().await?.get_or_default("count")?;
    tokio::time::sleep(Duration::from_millis(10)).await;
    let next = current + delta;
    ctx.store.update(move |state| state.with("count", next)).await?;
    Ok(next)
}

// =============================================================================
// RUNTIME
// =============================================================================

struct WardenDemo {
    host: ExtensionHost,
    actions: DemoActions,
    background: ContextHandle,
    popup: ContextHandle,
    top: FrameContext,
    child: FrameContext,
}

impl WardenDemo {
    async fn start(config: RuntimeConfig) -> Result<Self> {
        let mut builder = ExtensionHost::builder(config).context("Invalid runtime configuration")?;
        builder.service(TotpVault(HashMap::from([(
            "bank.example".to_string(),
            "JBSWY3DPEHPK3PXP".to_string(),
        )])));
        let actions = DemoActions::register(&mut builder)?;
        let host = builder.build();

        let background = host.boot_background().await?;
        let popup = host.boot_popup().await?;
        let top = host.open_tab(TabId(1)).await?;
        let child = host
            .mount_iframe(&top, FrameId(1), IframeLoad::Announce)
            .await?;

        info!(
            contexts = host.bus().endpoint_count(),
            actions = host.registry().len(),
            "All contexts ready"
        );
        Ok(Self {
            host,
            actions,
            background,
            popup,
            top,
            child,
        })
    }

    async fn run_scenarios(&self) -> Result<()> {
        self.counter().await?;
        self.ordered_noops().await?;
        self.frame_tagging().await?;
        self.cross_zone_error().await?;
        self.queue_liveness().await?;
        Ok(())
    }

    /// Concurrent increment and decrement under one key leave the counter at 0.
    async fn counter(&self) -> Result<()> {
        let increment = self.popup.use_action(&self.actions.increment);
        let decrement = self.top.use_action(&self.actions.decrement);
        let (up, down) = tokio::join!(increment.call(()), decrement.call(()));
        up?;
        down?;

        let count: i64 = self.host.store().get_state().await?.get_or_default("count")?;
        info!(count, "Counter scenario finished");
        Ok(())
    }

    /// Calls under a per-action key of 1 complete in submission order.
    async fn ordered_noops(&self) -> Result<()> {
        let noop = self.popup.use_action(&self.actions.noop);
        let outputs = join_all(["a", "b", "c"].map(|label| noop.call(label.to_string()))).await;
        let order = outputs.into_iter().collect::<Result<Vec<_>, _>>()?;
        info!(?order, "Ordered scenario finished");
        Ok(())
    }

    /// The parent document tags the announcing iframe with its frame id.
    async fn frame_tagging(&self) -> Result<()> {
        let iframe = self
            .child
            .iframe_handle()
            .context("Child frame has no iframe element")?;
        let tag = tokio::time::timeout(
            Duration::from_secs(1),
            self.top.document().wait_for_tag(iframe),
        )
        .await
        .context("Iframe was never tagged")?;

        let whoami: RuntimeInfo = self
            .child
            .use_action(&self.host.builtins().whoami)
            .call(())
            .await?;
        info!(%iframe, ?tag, %whoami, "Frame scenario finished");
        Ok(())
    }

    /// Handler errors keep their code across zones.
    async fn cross_zone_error(&self) -> Result<()> {
        let read_totp = self.top.use_action(&self.actions.read_totp);
        match read_totp.call("mail.example".to_string()).await {
            Err(err) => info!(code = err.code(), %err, "Cross-zone error scenario finished"),
            Ok(_) => warn!("Expected MissingTOTP for mail.example"),
        }
        Ok(())
    }

    /// A failing call under a shared key does not block the next one.
    async fn queue_liveness(&self) -> Result<()> {
        let mutate = self
            .background
            .use_action(&self.actions.mutate_layers)
            .on(self.top.runtime_info());
        let (failed, applied) = tokio::join!(
            mutate.call(LayerChange {
                layer: "overlay".to_string(),
                fail: true,
            }),
            mutate.call(LayerChange {
                layer: "autofill".to_string(),
                fail: false,
            }),
        );
        let layers = applied?;
        info!(failed = failed.is_err(), ?layers, "Queue liveness scenario finished");
        Ok(())
    }

    async fn shutdown(self) {
        self.child.shutdown().await;
        self.top.shutdown().await;
        self.popup.shutdown().await;
        self.background.shutdown().await;
    }
}

fn load_config() -> Result<RuntimeConfig> {
    let mut config = RuntimeConfig::from_env().context("Failed to read WARDEN_* variables")?;
    if config.identity.secret_token.is_empty() {
        config.identity.secret_token = format!("warden-{}", Uuid::new_v4().simple());
        warn!("WARDEN_EXTENSION_ID not set; using a throwaway token");
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let _telemetry =
        init_telemetry(TelemetryConfig::from_env()).context("Failed to initialize telemetry")?;

    let config = load_config()?;
    let demo = WardenDemo::start(config).await?;
    let outcome = demo.run_scenarios().await;
    demo.shutdown().await;
    outcome?;

    println!("{}", encode_metrics().context("Failed to encode metrics")?);
    Ok(())
}
