//! # Zone Transport Service
//!
//! One `ZoneTransport` per execution context. It owns the context's outbox and
//! pending replies; a listener task owns the inbox.

use crate::domain::{PendingReplies, ReplyOutcome, TransportConfig};
use crate::ports::RequestHandler;
use futures::FutureExt;
use serde_json::Value;
use shared_bus::{Delivery, Inbox, Outbox};
use shared_types::{ActionError, ActionId, Address, CorrelationId, ZoneMessage, ZoneReply, ZoneRequest};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use warden_telemetry::{ENVELOPES_RECEIVED, ENVELOPES_REJECTED, ENVELOPES_SENT};

/// Removes a pending entry when the waiting caller goes away for any reason.
struct PendingGuard<'a> {
    pending: &'a PendingReplies,
    correlation_id: CorrelationId,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        // No-op once the reply (or a timeout) already removed the entry.
        self.pending.cancel(&self.correlation_id);
    }
}

/// Error code carried back when a handler panics while serving a request.
pub const HANDLER_PANICKED: &str = "HandlerPanicked";

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "handler panicked".to_string()
    }
}

/// Request/reply marshalling over the message bus.
pub struct ZoneTransport {
    outbox: Outbox,
    pending: PendingReplies,
    config: TransportConfig,
}

impl ZoneTransport {
    #[must_use]
    pub fn new(outbox: Outbox, config: TransportConfig) -> Arc<Self> {
        Arc::new(Self {
            outbox,
            pending: PendingReplies::new(),
            config,
        })
    }

    /// Address this context sends from.
    #[must_use]
    pub fn address(&self) -> Address {
        self.outbox.address()
    }

    #[must_use]
    pub fn config(&self) -> TransportConfig {
        self.config
    }

    #[must_use]
    pub fn pending(&self) -> &PendingReplies {
        &self.pending
    }

    // =========================================================================
    // OUTBOUND
    // =========================================================================

    /// Invoke `action_id` in the context at `target` and wait for its reply.
    ///
    /// # Errors
    ///
    /// - `Transport` - target not attached, or it detached before replying
    /// - `TimedOut` - no reply within the configured timeout
    /// - `Cancelled` - `cancel` fired while waiting
    /// - any error carried back in an `error` envelope, rebuilt with `from_wire`
    pub async fn request(
        &self,
        target: Address,
        action_id: &ActionId,
        input: Value,
        cancel: &CancellationToken,
    ) -> Result<Value, ActionError> {
        if cancel.is_cancelled() {
            return Err(ActionError::Cancelled);
        }

        let correlation_id = CorrelationId::new();
        let payload = ZoneMessage::Request(ZoneRequest {
            action_id: action_id.clone(),
            input,
            correlation_id,
        })
        .encode()?;

        let reply = self.pending.register(correlation_id, target, action_id);
        let _guard = PendingGuard {
            pending: &self.pending,
            correlation_id,
        };

        self.outbox
            .send(target, payload)
            .await
            .map_err(|e| ActionError::transport(e.to_string()))?;
        ENVELOPES_SENT.with_label_values(&["request"]).inc();
        debug!(%correlation_id, %action_id, %target, "Request envelope sent");

        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                debug!(%correlation_id, %action_id, "Request cancelled by caller");
                Err(ActionError::Cancelled)
            }
            outcome = self.await_reply(reply, correlation_id, action_id, target) => outcome,
        }
    }

    async fn await_reply(
        &self,
        reply: oneshot::Receiver<ReplyOutcome>,
        correlation_id: CorrelationId,
        action_id: &ActionId,
        target: Address,
    ) -> ReplyOutcome {
        let settled = match self.config.request_timeout {
            None => reply.await,
            Some(limit) => match tokio::time::timeout(limit, reply).await {
                Ok(settled) => settled,
                Err(_) => {
                    self.pending.expire(&correlation_id);
                    return Err(ActionError::TimedOut {
                        message: format!(
                            "{action_id} on {target} after {}ms",
                            limit.as_millis()
                        ),
                    });
                }
            },
        };

        settled.unwrap_or_else(|_| Err(ActionError::transport("reply channel closed")))
    }

    // =========================================================================
    // INBOUND
    // =========================================================================

    /// Start the listener for this context.
    ///
    /// The task owns `inbox`; it stops when `shutdown` fires, which drops the
    /// inbox and detaches this context from the bus. Detach notifications for
    /// other contexts fail the requests this context still has pending there.
    pub fn spawn_listener(
        self: &Arc<Self>,
        mut inbox: Inbox,
        handler: Arc<dyn RequestHandler>,
        mut detached: broadcast::Receiver<Address>,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        let transport = Arc::clone(self);
        tokio::spawn(async move {
            let address = inbox.address();
            info!(%address, "Transport listener started");

            loop {
                tokio::select! {
                    () = shutdown.cancelled() => break,
                    delivery = inbox.recv() => match delivery {
                        Some(delivery) => transport.dispatch(delivery, &handler),
                        None => break,
                    },
                    gone = detached.recv() => match gone {
                        Ok(target) => {
                            transport.pending.fail_target(target);
                        }
                        Err(RecvError::Lagged(missed)) => {
                            warn!(%address, missed, "Missed detach notifications");
                        }
                        Err(RecvError::Closed) => break,
                    },
                }
            }

            info!(%address, "Transport listener stopped");
        })
    }

    /// Route one delivery. Anything that is not a well-formed envelope is
    /// rejected here and never reaches a handler.
    fn dispatch(self: &Arc<Self>, delivery: Delivery, handler: &Arc<dyn RequestHandler>) {
        let message = match ZoneMessage::decode(&delivery.payload) {
            Ok(message) => message,
            Err(e) => {
                ENVELOPES_REJECTED.with_label_values(&["malformed"]).inc();
                warn!(from = %delivery.from, error = %e, "Rejected malformed envelope");
                return;
            }
        };

        match message {
            ZoneMessage::Request(request) => {
                ENVELOPES_RECEIVED.with_label_values(&["request"]).inc();
                let transport = Arc::clone(self);
                let handler = Arc::clone(handler);
                tokio::spawn(async move { transport.serve(delivery.from, request, handler).await });
            }
            ZoneMessage::Reply(reply) => {
                ENVELOPES_RECEIVED.with_label_values(&["reply"]).inc();
                let correlation_id = reply.correlation_id();
                if !self
                    .pending
                    .complete(correlation_id, delivery.from, reply.into_outcome())
                {
                    ENVELOPES_REJECTED
                        .with_label_values(&["unknown_correlation"])
                        .inc();
                }
            }
        }
    }

    async fn serve(&self, from: Address, request: ZoneRequest, handler: Arc<dyn RequestHandler>) {
        let ZoneRequest {
            action_id,
            input,
            correlation_id,
        } = request;
        debug!(%correlation_id, %action_id, %from, "Serving request");

        // A panicking handler still owes the caller a reply.
        let outcome = match AssertUnwindSafe(handler.handle(from, action_id.clone(), input))
            .catch_unwind()
            .await
        {
            Ok(outcome) => outcome,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(%correlation_id, %action_id, %from, panic = %message, "Handler panicked");
                Err(ActionError::handler(HANDLER_PANICKED, message))
            }
        };
        let payload = match ZoneMessage::Reply(ZoneReply::from_outcome(correlation_id, outcome)).encode() {
            Ok(payload) => payload,
            Err(e) => {
                error!(%correlation_id, %action_id, error = %e, "Cannot encode reply");
                match ZoneMessage::Reply(ZoneReply::from_outcome(correlation_id, Err(e))).encode() {
                    Ok(payload) => payload,
                    Err(_) => return,
                }
            }
        };

        match self.outbox.send(from, payload).await {
            Ok(()) => {
                ENVELOPES_SENT.with_label_values(&["reply"]).inc();
                debug!(%correlation_id, %action_id, to = %from, "Reply envelope sent");
            }
            Err(e) => {
                warn!(%correlation_id, %action_id, to = %from, error = %e, "Reply undeliverable");
            }
        }
    }
}
