//! # Frame-ID Handshake
//!
//! One resolver per document. The same resolver plays both roles: parent of
//! its own iframes, and child of its parent window when framed.

use crate::domain::types::{HandshakeOutcome, IframeHandle, MessageSource};
use crate::ports::FrameDocument;
use parking_lot::Mutex;
use shared_types::{FrameId, FrameMessage, FrameMessageError, RequestId};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use warden_telemetry::{FRAME_MESSAGES_REJECTED, FRAMES_TAGGED};

#[derive(Default)]
struct HandshakeState {
    /// This document's frame id, once resolved. Never reassigned.
    own_frame: Option<FrameId>,
    /// Requests sent to our iframes, by request id.
    pending: HashMap<RequestId, IframeHandle>,
    /// Parent requests received before `own_frame` was known.
    deferred: Vec<RequestId>,
}

/// Handshake state machine for one document.
pub struct FrameIdentityResolver {
    token: String,
    document: Arc<dyn FrameDocument>,
    state: Mutex<HandshakeState>,
}

impl FrameIdentityResolver {
    /// Create a resolver that signs and checks messages with `token`.
    pub fn new(token: impl Into<String>, document: Arc<dyn FrameDocument>) -> Self {
        Self {
            token: token.into(),
            document,
            state: Mutex::new(HandshakeState::default()),
        }
    }

    /// Broadcast `frame-id/init` to the parent window on load.
    ///
    /// Returns false for top documents, which have nobody to ask.
    pub fn announce(&self) -> bool {
        if !self.document.has_parent() {
            return false;
        }
        self.document.post_to_parent(FrameMessage::Init.encode(&self.token));
        debug!("Announced frame to parent");
        true
    }

    /// This document's frame id, if resolved.
    #[must_use]
    pub fn own_frame_id(&self) -> Option<FrameId> {
        self.state.lock().own_frame
    }

    /// Record this document's frame id and answer any parent requests that
    /// arrived before it was known.
    ///
    /// The first value wins. Returns the number of deferred replies sent.
    pub fn set_own_frame_id(&self, frame_id: FrameId) -> usize {
        let deferred = {
            let mut state = self.state.lock();
            match state.own_frame {
                Some(existing) if existing != frame_id => {
                    warn!(%existing, rejected = %frame_id, "Frame id already resolved");
                    return 0;
                }
                Some(_) => return 0,
                None => {
                    state.own_frame = Some(frame_id);
                    std::mem::take(&mut state.deferred)
                }
            }
        };

        for request_id in &deferred {
            self.reply(*request_id, frame_id);
        }
        info!(%frame_id, flushed = deferred.len(), "Frame id resolved");
        deferred.len()
    }

    /// Requests sent to iframes and not yet answered.
    #[must_use]
    pub fn pending_requests(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Handle one raw window message.
    ///
    /// # Errors
    ///
    /// `FrameMessageError` when the token is missing or the body is not a
    /// handshake message. Such messages change no state.
    pub fn handle_message(
        &self,
        source: MessageSource,
        raw: &str,
    ) -> Result<HandshakeOutcome, FrameMessageError> {
        let message = FrameMessage::decode(&self.token, raw).map_err(|e| {
            // Pages post their own messages constantly; only ours are worth a warning.
            let reason = match e {
                FrameMessageError::ForeignSender => {
                    debug!(?source, "Ignored foreign window message");
                    "foreign"
                }
                FrameMessageError::Malformed(_) => {
                    warn!(?source, error = %e, "Rejected malformed handshake message");
                    "malformed"
                }
            };
            FRAME_MESSAGES_REJECTED.with_label_values(&[reason]).inc();
            e
        })?;

        Ok(match message {
            FrameMessage::Init => self.on_init(source),
            FrameMessage::Request { request_id } => self.on_request(source, request_id),
            FrameMessage::Result {
                request_id,
                payload,
            } => self.on_result(source, request_id, payload),
        })
    }

    // =========================================================================
    // PARENT ROLE
    // =========================================================================

    fn on_init(&self, source: MessageSource) -> HandshakeOutcome {
        let MessageSource::Iframe(iframe) = source else {
            debug!(?source, "Init not from one of our iframes");
            return HandshakeOutcome::Ignored;
        };
        if !self.document.iframes().contains(&iframe) {
            debug!(%iframe, "Init from unknown iframe");
            return HandshakeOutcome::Ignored;
        }
        if let Some(frame_id) = self.document.frame_tag(iframe) {
            debug!(%iframe, %frame_id, "Iframe already tagged");
            return HandshakeOutcome::Ignored;
        }

        let request_id = {
            let mut state = self.state.lock();
            // A fresh init means the iframe reloaded or lost our request.
            // Only the newest request may tag it.
            let before = state.pending.len();
            state.pending.retain(|_, pending| *pending != iframe);
            if state.pending.len() < before {
                debug!(%iframe, "Superseding stale frame id request");
            }
            let request_id = RequestId::new();
            state.pending.insert(request_id, iframe);
            request_id
        };

        self.document
            .post_to_iframe(iframe, FrameMessage::Request { request_id }.encode(&self.token));
        debug!(%iframe, %request_id, "Requested frame id");
        HandshakeOutcome::Requested { iframe, request_id }
    }

    fn on_result(
        &self,
        source: MessageSource,
        request_id: RequestId,
        frame_id: FrameId,
    ) -> HandshakeOutcome {
        let iframe = {
            let mut state = self.state.lock();
            let Some(&iframe) = state.pending.get(&request_id) else {
                FRAME_MESSAGES_REJECTED
                    .with_label_values(&["unknown_request"])
                    .inc();
                warn!(%request_id, "Result for unknown request");
                return HandshakeOutcome::Ignored;
            };
            if source != MessageSource::Iframe(iframe) {
                FRAME_MESSAGES_REJECTED
                    .with_label_values(&["unexpected_source"])
                    .inc();
                warn!(%request_id, ?source, expected = %iframe, "Result from unexpected window");
                return HandshakeOutcome::Ignored;
            }
            state.pending.remove(&request_id);
            iframe
        };

        if let Some(existing) = self.document.frame_tag(iframe) {
            warn!(%iframe, %existing, rejected = %frame_id, "Iframe already tagged, keeping tag");
            return HandshakeOutcome::Ignored;
        }

        self.document.set_frame_tag(iframe, frame_id);
        FRAMES_TAGGED.inc();
        info!(%iframe, %frame_id, "Iframe tagged");
        HandshakeOutcome::Tagged { iframe, frame_id }
    }

    // =========================================================================
    // CHILD ROLE
    // =========================================================================

    fn on_request(&self, source: MessageSource, request_id: RequestId) -> HandshakeOutcome {
        if source != MessageSource::Parent {
            FRAME_MESSAGES_REJECTED
                .with_label_values(&["unexpected_source"])
                .inc();
            warn!(%request_id, ?source, "Frame id request not from parent");
            return HandshakeOutcome::Ignored;
        }

        let own_frame = {
            let mut state = self.state.lock();
            match state.own_frame {
                Some(frame_id) => frame_id,
                None => {
                    state.deferred.push(request_id);
                    debug!(%request_id, "Frame id unknown, deferring reply");
                    return HandshakeOutcome::Deferred { request_id };
                }
            }
        };

        self.reply(request_id, own_frame);
        HandshakeOutcome::Replied { request_id }
    }

    fn reply(&self, request_id: RequestId, frame_id: FrameId) {
        self.document.post_to_parent(
            FrameMessage::Result {
                request_id,
                payload: frame_id,
            }
            .encode(&self.token),
        );
        debug!(%request_id, %frame_id, "Replied with frame id");
    }
}
