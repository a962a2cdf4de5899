//! Pending Reply Store - bridges an outbound request to its reply envelope.
//!
//! Maps correlation ids to callers waiting on another zone.

use dashmap::DashMap;
use serde_json::Value;
use shared_types::{ActionError, ActionId, Address, CorrelationId};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// What a waiting caller eventually receives.
pub type ReplyOutcome = Result<Value, ActionError>;

/// A request waiting for its reply.
struct PendingReply {
    /// Channel to the waiting caller
    sender: oneshot::Sender<ReplyOutcome>,
    /// Context the request was sent to; only it may reply
    target: Address,
    /// Action name (for logging)
    action_id: ActionId,
    /// When the request was sent
    created_at: Instant,
}

/// Statistics for the pending reply store
#[derive(Debug, Default)]
pub struct PendingStats {
    /// Total requests registered
    pub total_registered: AtomicU64,
    /// Total requests settled by a reply
    pub total_completed: AtomicU64,
    /// Total requests that gave up waiting
    pub total_timeouts: AtomicU64,
    /// Total requests abandoned by the caller
    pub total_cancelled: AtomicU64,
    /// Total requests failed because the target went away
    pub total_failed: AtomicU64,
}

/// Pending reply store.
///
/// Flow:
/// 1. Caller generates a `CorrelationId` and calls `register()`
/// 2. Caller sends the request envelope
/// 3. The listener receives the reply and calls `complete()`
/// 4. Caller awaits the receiver, times out, or is cancelled
#[derive(Default)]
pub struct PendingReplies {
    pending: DashMap<CorrelationId, PendingReply>,
    stats: PendingStats,
}

impl PendingReplies {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a request and get the receiver its reply will arrive on.
    pub fn register(
        &self,
        correlation_id: CorrelationId,
        target: Address,
        action_id: &ActionId,
    ) -> oneshot::Receiver<ReplyOutcome> {
        let (tx, rx) = oneshot::channel();
        self.pending.insert(
            correlation_id,
            PendingReply {
                sender: tx,
                target,
                action_id: action_id.clone(),
                created_at: Instant::now(),
            },
        );
        self.stats.total_registered.fetch_add(1, Ordering::Relaxed);

        debug!(%correlation_id, %action_id, %target, "Registered pending reply");
        rx
    }

    /// Settle a request with the outcome carried by a reply from `from`.
    ///
    /// Returns false for unknown or expired ids and for replies sent by a
    /// context other than the one the request was addressed to.
    pub fn complete(&self, correlation_id: CorrelationId, from: Address, outcome: ReplyOutcome) -> bool {
        let Some((_, pending)) = self
            .pending
            .remove_if(&correlation_id, |_, pending| pending.target == from)
        else {
            warn!(
                %correlation_id,
                %from,
                "Reply for unknown or expired correlation id"
            );
            return false;
        };

        let elapsed = pending.created_at.elapsed();
        if pending.sender.send(outcome).is_err() {
            // Receiver dropped between the caller giving up and the guard firing.
            self.stats.total_cancelled.fetch_add(1, Ordering::Relaxed);
            debug!(%correlation_id, action_id = %pending.action_id, "Pending reply receiver dropped");
            return false;
        }

        self.stats.total_completed.fetch_add(1, Ordering::Relaxed);
        debug!(
            %correlation_id,
            action_id = %pending.action_id,
            response_time_ms = elapsed.as_millis(),
            "Completed pending reply"
        );
        true
    }

    /// Drop a request whose caller stopped waiting.
    pub fn cancel(&self, correlation_id: &CorrelationId) -> bool {
        if self.pending.remove(correlation_id).is_some() {
            self.stats.total_cancelled.fetch_add(1, Ordering::Relaxed);
            true
        } else {
            false
        }
    }

    /// Drop a request whose timeout elapsed.
    pub fn expire(&self, correlation_id: &CorrelationId) -> bool {
        let Some((_, pending)) = self.pending.remove(correlation_id) else {
            return false;
        };
        warn!(
            %correlation_id,
            action_id = %pending.action_id,
            target = %pending.target,
            elapsed_ms = pending.created_at.elapsed().as_millis(),
            "Pending reply timed out"
        );
        self.stats.total_timeouts.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Fail every request addressed to `target` with a transport error.
    ///
    /// Returns the number of requests failed.
    pub fn fail_target(&self, target: Address) -> usize {
        let doomed: Vec<CorrelationId> = self
            .pending
            .iter()
            .filter(|entry| entry.target == target)
            .map(|entry| *entry.key())
            .collect();

        let mut failed = 0;
        for correlation_id in doomed {
            if let Some((_, pending)) = self.pending.remove(&correlation_id) {
                let _ = pending.sender.send(Err(ActionError::transport(format!(
                    "{target} went away before replying to {}",
                    pending.action_id
                ))));
                failed += 1;
            }
        }

        if failed > 0 {
            self.stats.total_failed.fetch_add(failed as u64, Ordering::Relaxed);
            warn!(%target, failed, "Failed pending replies for detached context");
        }
        failed
    }

    /// Number of requests still waiting
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn is_pending(&self, correlation_id: &CorrelationId) -> bool {
        self.pending.contains_key(correlation_id)
    }

    #[must_use]
    pub fn stats(&self) -> &PendingStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shared_types::{FrameId, RuntimeInfo, TabId};

    fn content_tab(tab: i32) -> Address {
        Address::content(RuntimeInfo::new(TabId(tab), FrameId::TOP))
    }

    #[tokio::test]
    async fn test_register_and_complete() {
        let store = PendingReplies::new();
        let id = CorrelationId::new();
        let rx = store.register(id, Address::background(), &"vault/list".into());

        assert!(store.is_pending(&id));
        assert!(store.complete(id, Address::background(), Ok(json!([1, 2]))));
        assert_eq!(rx.await.unwrap().unwrap(), json!([1, 2]));
        assert_eq!(store.pending_count(), 0);
        assert_eq!(store.stats().total_completed.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_second_reply_is_ignored() {
        let store = PendingReplies::new();
        let id = CorrelationId::new();
        let rx = store.register(id, Address::background(), &"a".into());

        assert!(store.complete(id, Address::background(), Ok(json!(1))));
        assert!(!store.complete(id, Address::background(), Ok(json!(2))));
        assert_eq!(rx.await.unwrap().unwrap(), json!(1));
    }

    #[tokio::test]
    async fn test_reply_from_wrong_sender_rejected() {
        let store = PendingReplies::new();
        let id = CorrelationId::new();
        let _rx = store.register(id, Address::background(), &"a".into());

        assert!(!store.complete(id, Address::popup(), Ok(json!("spoofed"))));
        assert!(store.is_pending(&id));
    }

    #[test]
    fn test_complete_unknown_id() {
        let store = PendingReplies::new();
        assert!(!store.complete(CorrelationId::new(), Address::popup(), Ok(json!(null))));
    }

    #[test]
    fn test_cancel_and_expire() {
        let store = PendingReplies::new();
        let a = CorrelationId::new();
        let b = CorrelationId::new();
        let _ra = store.register(a, Address::popup(), &"a".into());
        let _rb = store.register(b, Address::popup(), &"b".into());

        assert!(store.cancel(&a));
        assert!(!store.cancel(&a));
        assert!(store.expire(&b));
        assert!(!store.expire(&b));

        assert_eq!(store.stats().total_cancelled.load(Ordering::Relaxed), 1);
        assert_eq!(store.stats().total_timeouts.load(Ordering::Relaxed), 1);
        assert_eq!(store.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_fail_target_only_hits_that_target() {
        let store = PendingReplies::new();
        let gone = content_tab(3);
        let doomed = store.register(CorrelationId::new(), gone, &"layers/push".into());
        let _alive = store.register(CorrelationId::new(), content_tab(4), &"layers/push".into());

        assert_eq!(store.fail_target(gone), 1);
        let err = doomed.await.unwrap().unwrap_err();
        assert_eq!(err.code(), ActionError::TRANSPORT);
        assert_eq!(store.pending_count(), 1);
    }
}
