//! # Keyed Gate
//!
//! One FIFO queue per key, at most `capacity` permits live per key.
//!
//! A released slot is never returned to the pool while someone is waiting: the
//! releasing `Permit` builds a new permit and moves it straight into the next
//! waiter's channel. Late arrivals therefore cannot overtake queued waiters.

use crate::domain::key::GateKey;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::debug;
use warden_telemetry::{GATE_QUEUE_DEPTH, GATE_WAITS};

/// Per-key bookkeeping.
#[derive(Default)]
struct KeyState {
    /// Live permits for this key.
    running: usize,
    /// Waiters in arrival order.
    queue: VecDeque<oneshot::Sender<Permit>>,
}

#[derive(Default)]
struct GateInner {
    keys: Mutex<HashMap<GateKey, KeyState>>,
}

impl GateInner {
    /// Hand the slot held for `key` to the next live waiter, or free it.
    fn release(self: &Arc<Self>, key: &GateKey) {
        let mut keys = self.keys.lock();
        let Some(state) = keys.get_mut(key) else {
            return;
        };

        while let Some(waiter) = state.queue.pop_front() {
            GATE_QUEUE_DEPTH.dec();
            let permit = Permit::new(Arc::clone(self), key.clone());
            match waiter.send(permit) {
                Ok(()) => {
                    debug!(%key, queued = state.queue.len(), "Permit handed to next waiter");
                    return;
                }
                Err(mut abandoned) => {
                    // Waiter gave up; this permit never owned the slot.
                    abandoned.armed = false;
                }
            }
        }

        state.running = state.running.saturating_sub(1);
        if state.running == 0 {
            keys.remove(key);
            debug!(%key, "Gate key idle");
        }
    }
}

/// Proof of holding one slot of a key. Dropping it advances the queue.
pub struct Permit {
    gate: Arc<GateInner>,
    key: GateKey,
    armed: bool,
}

impl Permit {
    fn new(gate: Arc<GateInner>, key: GateKey) -> Self {
        Self {
            gate,
            key,
            armed: true,
        }
    }

    /// Key this permit belongs to.
    #[must_use]
    pub fn key(&self) -> &GateKey {
        &self.key
    }
}

impl fmt::Debug for Permit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Permit")
            .field("key", &self.key)
            .field("armed", &self.armed)
            .finish()
    }
}

impl Drop for Permit {
    fn drop(&mut self) {
        if self.armed {
            self.gate.release(&self.key);
        }
    }
}

/// Snapshot of one key's occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyStats {
    /// Permits currently held.
    pub running: usize,
    /// Waiters still interested in a permit.
    pub queued: usize,
}

/// Keyed, FIFO, at-most-N-concurrent gate. Cheap to clone; clones share queues.
#[derive(Clone, Default)]
pub struct KeyedGate {
    inner: Arc<GateInner>,
}

impl KeyedGate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for a slot of `key`.
    ///
    /// Starts immediately if fewer than `capacity` permits are live and nobody
    /// is queued; otherwise joins the back of the key's queue. A capacity of
    /// zero is treated as one.
    ///
    /// Dropping the returned future while queued abandons the place in line
    /// without leaking the slot.
    pub async fn acquire(&self, key: GateKey, capacity: usize) -> Permit {
        let capacity = capacity.max(1);
        loop {
            let waiter = {
                let mut keys = self.inner.keys.lock();
                let state = keys.entry(key.clone()).or_default();

                if state.running < capacity && state.queue.is_empty() {
                    state.running += 1;
                    debug!(%key, running = state.running, "Gate slot acquired");
                    return Permit::new(Arc::clone(&self.inner), key);
                }

                let (tx, rx) = oneshot::channel();
                state.queue.push_back(tx);
                GATE_WAITS.inc();
                GATE_QUEUE_DEPTH.inc();
                debug!(%key, queued = state.queue.len(), "Gate busy, queued");
                rx
            };

            // The sender is only dropped unsent if this receiver was already
            // gone, so a closed channel here means try again.
            if let Ok(permit) = waiter.await {
                return permit;
            }
        }
    }

    /// Run `task` while holding a slot of `key`.
    ///
    /// The slot is released when `task` settles, whether it returned an error
    /// or panicked, so one failing invocation never starves the key.
    pub async fn with_key<F, T>(&self, key: GateKey, capacity: usize, task: F) -> T
    where
        F: Future<Output = T>,
    {
        let _permit = self.acquire(key, capacity).await;
        task.await
    }

    /// Occupancy of `key`. Idle keys report zeros.
    #[must_use]
    pub fn stats(&self, key: &GateKey) -> KeyStats {
        self.inner
            .keys
            .lock()
            .get(key)
            .map(|state| KeyStats {
                running: state.running,
                queued: state.queue.iter().filter(|tx| !tx.is_closed()).count(),
            })
            .unwrap_or_default()
    }

    /// Number of keys with at least one live permit.
    #[must_use]
    pub fn active_keys(&self) -> usize {
        self.inner.keys.lock().len()
    }
}

impl fmt::Debug for KeyedGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyedGate")
            .field("active_keys", &self.active_keys())
            .finish()
    }
}
