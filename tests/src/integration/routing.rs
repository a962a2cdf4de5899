//! # Routing Tests
//!
//! Zone routing through the orchestrator and transport: payload fidelity,
//! targeted frame calls, and every way a call fails short of its handler.

#[cfg(test)]
mod tests {
    use crate::fixtures::{config_with_timeout, test_config, Contexts, Harness, WAIT};
    use extension_runtime::{ConfigError, ExtensionHost, HostError, IframeLoad, RuntimeConfig};
    use serde_json::{json, Value};
    use shared_bus::BusError;
    use shared_types::{
        ActionError, ActionId, Address, FrameId, RegistryError, RuntimeInfo, TabId, Zone,
    };
    use std::time::Duration;
    use tokio::time::{sleep, timeout};
    use tokio_util::sync::CancellationToken;
    use wd_01_action_registry::ActionDescriptor;

    #[tokio::test]
    async fn test_json_survives_cross_zone_round_trip() {
        let harness = Harness::new();
        let contexts = harness.boot().await;

        let payload = json!({
            "site": "bank.example",
            "codes": [123_456, 654_321],
            "nested": { "enabled": true, "note": "héllo ✓", "missing": null },
            "ratio": 0.25,
        });
        let echoed = timeout(
            WAIT,
            contexts
                .background
                .use_action(&harness.actions.echo)
                .call(payload.clone()),
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(echoed, payload);

        contexts.shutdown().await;
    }

    #[tokio::test]
    async fn test_whoami_reports_caller_identity() {
        let harness = Harness::new();
        let contexts = harness.boot().await;
        let child = harness
            .host
            .mount_iframe(&contexts.top, FrameId(1), IframeLoad::Silent)
            .await
            .unwrap();

        let whoami = &harness.host.builtins().whoami;
        let from_child = timeout(WAIT, child.use_action(whoami).call(())).await.unwrap().unwrap();
        let from_popup = timeout(WAIT, contexts.popup.use_action(whoami).call(()))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(from_child, RuntimeInfo::new(TabId(1), FrameId(1)));
        assert_eq!(child.runtime_info(), from_child);
        assert_eq!(from_popup, RuntimeInfo::extension_page());

        child.shutdown().await;
        contexts.shutdown().await;
    }

    #[tokio::test]
    async fn test_content_action_needs_a_frame_outside_content() {
        let harness = Harness::new();
        let contexts = harness.boot().await;

        let err = contexts
            .popup
            .use_action(&harness.actions.frame_info)
            .call(())
            .await
            .unwrap_err();
        assert_eq!(err.code(), ActionError::UNROUTABLE);

        let info = timeout(
            WAIT,
            contexts
                .popup
                .use_action(&harness.actions.frame_info)
                .on(contexts.top.runtime_info())
                .call(()),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(info, RuntimeInfo::new(TabId(1), FrameId::TOP));

        // From a content script the own frame is implied.
        let local = contexts.top.use_action(&harness.actions.frame_info).call(()).await.unwrap();
        assert_eq!(local, info);

        contexts.shutdown().await;
    }

    #[tokio::test]
    async fn test_unknown_action_is_unresolved() {
        let harness = Harness::new();
        let contexts = harness.boot().await;

        let err = contexts
            .background
            .orchestrator()
            .invoke(
                &ActionId::from("test/missing"),
                Value::Null,
                None,
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), ActionError::UNRESOLVED);

        contexts.shutdown().await;
    }

    #[tokio::test]
    async fn test_target_frame_that_never_booted() {
        let harness = Harness::new();
        let contexts = harness.boot().await;

        let err = contexts
            .background
            .use_action(&harness.actions.frame_info)
            .on(RuntimeInfo::new(TabId(9), FrameId(4)))
            .call(())
            .await
            .unwrap_err();
        assert_eq!(err.code(), ActionError::TRANSPORT);

        contexts.shutdown().await;
    }

    #[tokio::test]
    async fn test_cancel_remote_call() {
        let harness = Harness::new();
        let contexts = harness.boot().await;

        let cancel = CancellationToken::new();
        let call = {
            let invoker = contexts.popup.use_action(&harness.actions.linger);
            let cancel = cancel.clone();
            tokio::spawn(async move { invoker.call_with(5_000, &cancel).await })
        };
        sleep(Duration::from_millis(20)).await;
        cancel.cancel();

        let err = timeout(WAIT, call).await.unwrap().unwrap().unwrap_err();
        assert_eq!(err, ActionError::Cancelled);
        assert_eq!(contexts.popup.transport().pending().pending_count(), 0);

        contexts.shutdown().await;
    }

    #[tokio::test]
    async fn test_cancel_local_call_reaches_handler() {
        let harness = Harness::new();
        let contexts = harness.boot().await;

        let cancel = CancellationToken::new();
        let call = {
            let invoker = contexts.background.use_action(&harness.actions.linger);
            let cancel = cancel.clone();
            tokio::spawn(async move { invoker.call_with(5_000, &cancel).await })
        };
        sleep(Duration::from_millis(20)).await;
        cancel.cancel();

        let err = timeout(WAIT, call).await.unwrap().unwrap().unwrap_err();
        assert_eq!(err, ActionError::Cancelled);

        contexts.shutdown().await;
    }

    #[tokio::test]
    async fn test_slow_owner_times_out() {
        let harness = Harness::with_config(config_with_timeout(50));
        let contexts = harness.boot().await;

        let err = timeout(
            WAIT,
            contexts.popup.use_action(&harness.actions.linger).call(1_000),
        )
        .await
        .unwrap()
        .unwrap_err();
        assert_eq!(err.code(), ActionError::TIMED_OUT);

        // Fast calls still succeed under the same limit.
        let quick = contexts.popup.use_action(&harness.actions.linger).call(1).await.unwrap();
        assert_eq!(quick, "done");

        contexts.shutdown().await;
    }

    #[tokio::test]
    async fn test_owner_teardown_fails_pending_call() {
        let harness = Harness::new();
        let Contexts {
            background,
            popup,
            top,
        } = harness.boot().await;

        let call = {
            let invoker = popup.use_action(&harness.actions.stall).on(top.runtime_info());
            tokio::spawn(async move { invoker.call(()).await })
        };
        sleep(Duration::from_millis(20)).await;
        assert!(!call.is_finished());
        top.shutdown().await;

        let err = timeout(WAIT, call).await.unwrap().unwrap().unwrap_err();
        assert_eq!(err.code(), ActionError::TRANSPORT);

        popup.shutdown().await;
        background.shutdown().await;
    }

    #[tokio::test]
    async fn test_content_boot_needs_background() {
        let harness = Harness::new();

        let outcome = harness.host.open_tab(TabId(1)).await;
        assert!(matches!(outcome, Err(HostError::Identity(_))));

        let address = Address::content(RuntimeInfo::new(TabId(1), FrameId::TOP));
        timeout(WAIT, async {
            while harness.host.bus().is_attached(&address) {
                sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_second_background_is_rejected() {
        let harness = Harness::new();
        let background = harness.host.boot_background().await.unwrap();

        let outcome = harness.host.boot_background().await;
        assert!(matches!(
            outcome,
            Err(HostError::Bus(BusError::AddressInUse { address })) if address == Address::background()
        ));

        background.shutdown().await;
    }

    #[test]
    fn test_duplicate_action_is_rejected() {
        let Ok(mut builder) = ExtensionHost::builder(test_config()) else {
            panic!("test config is valid");
        };
        let descriptor = || {
            ActionDescriptor::<(), (), extension_runtime::ActionContext>::builder(
                "test/dup",
                Zone::Background,
            )
            .execute(|_, ()| async { Ok(()) })
        };

        builder.register(descriptor()).unwrap();
        let err = builder.register(descriptor()).unwrap_err();
        assert_eq!(
            err,
            RegistryError::DuplicateAction {
                action_id: ActionId::from("test/dup")
            }
        );

        let clash = builder.register(
            ActionDescriptor::<(), (), extension_runtime::ActionContext>::builder(
                extension_runtime::WHOAMI,
                Zone::Popup,
            )
            .execute(|_, ()| async { Ok(()) }),
        );
        assert!(clash.is_err());
    }

    #[test]
    fn test_host_requires_secret_token() {
        let outcome = ExtensionHost::builder(RuntimeConfig::default());
        assert!(matches!(
            outcome,
            Err(HostError::Config(ConfigError::MissingSecretToken))
        ));

        let mut config = test_config();
        config.identity.secret_token = "a|b".to_string();
        assert!(matches!(
            ExtensionHost::builder(config),
            Err(HostError::Config(ConfigError::InvalidSecretToken))
        ));
    }
}
