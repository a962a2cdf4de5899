//! # Reference Scenarios
//!
//! End-to-end behaviour across background, popup and a content frame:
//! shared-key exclusion, FIFO per key, handler errors crossing zones, and
//! queue liveness after a failure or a panic.

#[cfg(test)]
mod tests {
    use crate::fixtures::{config_with_timeout, Harness, LayerChange, WAIT};
    use futures::future::join_all;
    use shared_types::ActionError;
    use tokio::time::timeout;
    use wd_02_concurrency::{GateKey, KeyStats};

    #[tokio::test]
    async fn test_shared_key_serializes_counter_across_zones() {
        let harness = Harness::new();
        let contexts = harness.boot().await;

        let increment = contexts.popup.use_action(&harness.actions.increment);
        let decrement = contexts.top.use_action(&harness.actions.decrement);
        let (up, down) = timeout(WAIT, async {
            tokio::join!(increment.call(()), decrement.call(()))
        })
        .await
        .unwrap();

        let (up, down) = (up.unwrap(), down.unwrap());
        // Whichever ran second saw the first one's write.
        assert!(
            (up, down) == (1, 0) || (up, down) == (0, -1),
            "interleaved writes: up={up} down={down}"
        );
        assert_eq!(harness.count().await, 0);

        contexts.shutdown().await;
    }

    #[tokio::test]
    async fn test_many_counter_calls_never_lose_updates() {
        let harness = Harness::new();
        let contexts = harness.boot().await;

        let from_popup = contexts.popup.use_action(&harness.actions.increment);
        let from_top = contexts.top.use_action(&harness.actions.increment);
        let calls = (0..4).flat_map(|_| [from_popup.call(()), from_top.call(())]);
        let outcomes = timeout(WAIT, join_all(calls)).await.unwrap();

        assert!(outcomes.iter().all(Result::is_ok));
        assert_eq!(harness.count().await, 8);

        contexts.shutdown().await;
    }

    #[tokio::test]
    async fn test_per_action_key_runs_in_submission_order() {
        let harness = Harness::new();
        let contexts = harness.boot().await;

        let noop = contexts.popup.use_action(&harness.actions.noop);
        let outputs = timeout(
            WAIT,
            join_all(["a", "b", "c"].map(|label| noop.call(label.to_string()))),
        )
        .await
        .unwrap();

        let outputs: Vec<String> = outputs.into_iter().map(Result::unwrap).collect();
        assert_eq!(outputs, ["a", "b", "c"]);
        assert_eq!(harness.probe.starts(), ["a", "b", "c"]);
        assert_eq!(
            harness.probe.events(),
            ["start:a", "end:a", "start:b", "end:b", "start:c", "end:c"]
        );
        assert_eq!(harness.probe.peak(), 1);

        contexts.shutdown().await;
    }

    #[tokio::test]
    async fn test_per_action_key_excludes_callers_in_other_zones() {
        let harness = Harness::new();
        let contexts = harness.boot().await;

        let from_popup = contexts.popup.use_action(&harness.actions.noop);
        let from_top = contexts.top.use_action(&harness.actions.noop);
        let from_background = contexts.background.use_action(&harness.actions.noop);
        let calls = (0..3).flat_map(|n| {
            [
                from_popup.call(format!("popup-{n}")),
                from_top.call(format!("top-{n}")),
                from_background.call(format!("background-{n}")),
            ]
        });
        let outcomes = timeout(WAIT, join_all(calls)).await.unwrap();

        assert!(outcomes.iter().all(Result::is_ok));
        assert_eq!(harness.probe.starts().len(), 9);
        assert_eq!(harness.probe.peak(), 1);

        contexts.shutdown().await;
    }

    #[tokio::test]
    async fn test_handler_error_keeps_code_across_zones() {
        let harness = Harness::new();
        let contexts = harness.boot().await;

        let err = timeout(
            WAIT,
            contexts
                .top
                .use_action(&harness.actions.read_totp)
                .call("mail.example".to_string()),
        )
        .await
        .unwrap()
        .unwrap_err();

        assert!(err.is_handler());
        assert_eq!(err.code(), "MissingTOTP");
        assert_eq!(
            err,
            ActionError::handler("MissingTOTP", "no TOTP secret for mail.example")
        );

        contexts.shutdown().await;
    }

    #[tokio::test]
    async fn test_failed_call_does_not_block_shared_key() {
        let harness = Harness::new();
        let contexts = harness.boot().await;

        let mutate = contexts
            .background
            .use_action(&harness.actions.mutate_layers)
            .on(contexts.top.runtime_info());
        let (failed, applied) = timeout(WAIT, async {
            tokio::join!(
                mutate.call(LayerChange::failing("overlay")),
                mutate.call(LayerChange::apply("autofill")),
            )
        })
        .await
        .unwrap();

        assert_eq!(failed.unwrap_err().code(), "LayerError");
        assert_eq!(applied.unwrap(), ["autofill"]);

        let next = timeout(WAIT, mutate.call(LayerChange::apply("badge")))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(next, ["autofill", "badge"]);

        let key = GateKey::Shared("mutate-layers".to_string());
        assert_eq!(contexts.top.orchestrator().gate().stats(&key), KeyStats::default());
        assert_eq!(
            contexts.background.orchestrator().gate().stats(&key),
            KeyStats::default()
        );

        contexts.shutdown().await;
    }

    #[tokio::test]
    async fn test_layers_are_scoped_to_their_frame() {
        let harness = Harness::new();
        let contexts = harness.boot().await;
        let other_tab = harness
            .host
            .open_tab(shared_types::TabId(2))
            .await
            .unwrap();

        let here = contexts.top.use_action(&harness.actions.mutate_layers);
        let there = contexts
            .top
            .use_action(&harness.actions.mutate_layers)
            .on(other_tab.runtime_info());

        let mine = timeout(WAIT, here.call(LayerChange::apply("ours"))).await.unwrap().unwrap();
        let theirs = timeout(WAIT, there.call(LayerChange::apply("theirs")))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(mine, ["ours"]);
        assert_eq!(theirs, ["theirs"]);

        other_tab.shutdown().await;
        contexts.shutdown().await;
    }

    #[tokio::test]
    async fn test_remote_handler_panic_settles_and_frees_key() {
        // No timeout: only the error reply can settle the call.
        let harness = Harness::with_config(config_with_timeout(0));
        let contexts = harness.boot().await;

        let reindex = contexts.top.use_action(&harness.actions.explode);
        let err = timeout(WAIT, reindex.call("corrupt".to_string()))
            .await
            .unwrap()
            .unwrap_err();
        assert!(err.is_handler());
        assert_eq!(err.code(), wd_04_zone_transport::HANDLER_PANICKED);
        assert_eq!(err.wire_message(), "index entry corrupt is unreadable");

        let next = timeout(WAIT, reindex.call("entry-7".to_string()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(next, "entry-7");

        let key = GateKey::Shared("vault-index".to_string());
        assert_eq!(
            contexts.background.orchestrator().gate().stats(&key),
            KeyStats::default()
        );
        assert_eq!(contexts.top.orchestrator().gate().stats(&key), KeyStats::default());

        contexts.shutdown().await;
    }
}
