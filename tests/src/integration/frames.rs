//! # Frame Handshake Tests
//!
//! Frame id tagging through simulated documents: content scripts booted by
//! the host, plus resolvers driven message by message.

#[cfg(test)]
mod tests {
    use crate::fixtures::{Harness, TOKEN, WAIT};
    use extension_runtime::host::SimDocument;
    use extension_runtime::IframeLoad;
    use shared_types::{FrameId, FrameMessage, FrameMessageError, RequestId};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::{sleep, timeout};
    use wd_03_runtime_identity::{
        FrameDocument, FrameIdentityResolver, HandshakeOutcome, MessageSource,
    };

    #[tokio::test]
    async fn test_announce_tags_each_iframe_once() {
        let harness = Harness::new();
        let contexts = harness.boot().await;
        let host = &harness.host;
        let first = host
            .mount_iframe(&contexts.top, FrameId(1), IframeLoad::Silent)
            .await
            .unwrap();
        let second = host
            .mount_iframe(&contexts.top, FrameId(2), IframeLoad::Silent)
            .await
            .unwrap();
        let page = contexts.top.document();
        let first_el = first.iframe_handle().unwrap();
        let second_el = second.iframe_handle().unwrap();
        assert_eq!(page.frame_tag(first_el), None);
        assert_eq!(page.frame_tag(second_el), None);

        assert!(first.announce());
        let tag = timeout(WAIT, page.wait_for_tag(first_el)).await.unwrap();
        assert_eq!(tag, Some(FrameId(1)));
        assert_eq!(page.posted_to(first_el), 1);
        assert_eq!(page.posted_to(second_el), 0);
        assert_eq!(page.frame_tag(second_el), None);

        // A tagged iframe is never asked again.
        assert!(first.announce());
        sleep(Duration::from_millis(30)).await;
        assert_eq!(page.posted_to(first_el), 1);

        assert!(second.announce());
        let tag = timeout(WAIT, page.wait_for_tag(second_el)).await.unwrap();
        assert_eq!(tag, Some(FrameId(2)));
        assert_eq!(page.posted_to(second_el), 1);
        assert_eq!(contexts.top.resolver().pending_requests(), 0);

        first.shutdown().await;
        second.shutdown().await;
        contexts.shutdown().await;
    }

    #[tokio::test]
    async fn test_announce_during_boot_is_answered_after_resolution() {
        let harness = Harness::new();
        let contexts = harness.boot().await;

        let child = harness
            .host
            .mount_iframe(&contexts.top, FrameId(3), IframeLoad::Announce)
            .await
            .unwrap();
        let element = child.iframe_handle().unwrap();

        let tag = timeout(WAIT, contexts.top.document().wait_for_tag(element))
            .await
            .unwrap();
        assert_eq!(tag, Some(FrameId(3)));
        assert_eq!(child.resolver().own_frame_id(), Some(FrameId(3)));

        child.shutdown().await;
        contexts.shutdown().await;
    }

    #[tokio::test]
    async fn test_nested_iframe_is_tagged_by_its_own_parent() {
        let harness = Harness::new();
        let contexts = harness.boot().await;
        let child = harness
            .host
            .mount_iframe(&contexts.top, FrameId(1), IframeLoad::Announce)
            .await
            .unwrap();
        let grandchild = harness
            .host
            .mount_iframe(&child, FrameId(5), IframeLoad::Announce)
            .await
            .unwrap();

        let element = grandchild.iframe_handle().unwrap();
        let tag = timeout(WAIT, child.document().wait_for_tag(element)).await.unwrap();
        assert_eq!(tag, Some(FrameId(5)));
        // The top document only knows its direct child.
        assert_eq!(contexts.top.document().iframes().len(), 1);

        grandchild.shutdown().await;
        child.shutdown().await;
        contexts.shutdown().await;
    }

    #[tokio::test]
    async fn test_page_messages_leave_tags_alone() {
        let harness = Harness::new();
        let contexts = harness.boot().await;
        let child = harness
            .host
            .mount_iframe(&contexts.top, FrameId(1), IframeLoad::Silent)
            .await
            .unwrap();
        let page = contexts.top.document();
        let element = child.iframe_handle().unwrap();

        let forged = FrameMessage::Result {
            request_id: RequestId::new(),
            payload: FrameId(99),
        };
        page.deliver(MessageSource::Iframe(element), "{\"type\":\"page-event\"}");
        page.deliver(MessageSource::Iframe(element), forged.encode("another-extension"));
        page.deliver(MessageSource::Iframe(element), forged.encode(TOKEN));
        page.deliver(MessageSource::Other, FrameMessage::Init.encode(TOKEN));
        sleep(Duration::from_millis(30)).await;

        assert_eq!(page.frame_tag(element), None);
        assert_eq!(page.posted_to(element), 0);

        child.shutdown().await;
        contexts.shutdown().await;
    }

    #[test]
    fn test_result_must_come_from_the_asked_iframe() {
        let (page, _window) = SimDocument::top();
        let (asked, _asked_doc, _asked_rx) = page.append_iframe();
        let (other, _other_doc, _other_rx) = page.append_iframe();
        let document: Arc<dyn FrameDocument> = Arc::clone(&page) as Arc<dyn FrameDocument>;
        let resolver = FrameIdentityResolver::new(TOKEN, document);

        let outcome = resolver
            .handle_message(MessageSource::Iframe(asked), &FrameMessage::Init.encode(TOKEN))
            .unwrap();
        let HandshakeOutcome::Requested { request_id, .. } = outcome else {
            panic!("expected a request, got {outcome:?}");
        };
        assert_eq!(resolver.pending_requests(), 1);

        let result = FrameMessage::Result {
            request_id,
            payload: FrameId(4),
        }
        .encode(TOKEN);
        assert_eq!(
            resolver.handle_message(MessageSource::Iframe(other), &result),
            Ok(HandshakeOutcome::Ignored)
        );
        assert_eq!(page.frame_tag(other), None);

        assert_eq!(
            resolver.handle_message(MessageSource::Iframe(asked), &result),
            Ok(HandshakeOutcome::Tagged {
                iframe: asked,
                frame_id: FrameId(4)
            })
        );
        assert_eq!(page.frame_tag(asked), Some(FrameId(4)));
        assert_eq!(resolver.pending_requests(), 0);
    }

    #[test]
    fn test_token_mismatch_is_foreign() {
        let (page, _window) = SimDocument::top();
        let (element, _doc, _rx) = page.append_iframe();
        let document: Arc<dyn FrameDocument> = Arc::clone(&page) as Arc<dyn FrameDocument>;
        let resolver = FrameIdentityResolver::new(TOKEN, document);

        assert_eq!(
            resolver.handle_message(
                MessageSource::Iframe(element),
                &FrameMessage::Init.encode("another-extension")
            ),
            Err(FrameMessageError::ForeignSender)
        );
        assert!(matches!(
            resolver.handle_message(
                MessageSource::Iframe(element),
                &format!("{TOKEN}|not json")
            ),
            Err(FrameMessageError::Malformed(_))
        ));
        assert_eq!(page.posted_to(element), 0);
    }
}
