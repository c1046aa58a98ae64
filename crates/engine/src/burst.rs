use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::debug;

use crate::schedule::StreamKey;
use crate::session::DecodeSession;

#[derive(Debug)]
struct InFlight {
    token: u64,
    abort: AbortHandle,
}

/// In-flight pre-cache bursts, at most one per stream key.
///
/// A burst removes its own entry when it settles, success or failure.
/// Must be used from inside a tokio runtime.
#[derive(Debug, Default)]
pub struct BurstPool {
    in_flight: Arc<Mutex<HashMap<StreamKey, InFlight>>>,
    next_token: AtomicU64,
}

impl BurstPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns a burst decode of `[start_ms, end_ms)` unless one is already
    /// in flight for `key`. Returns the task handle when a burst was spawned.
    pub fn spawn<S: DecodeSession>(
        &self,
        key: StreamKey,
        session: Arc<S>,
        start_ms: f64,
        end_ms: f64,
    ) -> Option<JoinHandle<bool>> {
        let mut in_flight = self.in_flight.lock();
        if in_flight.contains_key(&key) {
            return None;
        }

        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        let table = Arc::clone(&self.in_flight);
        let task_key = key.clone();
        let handle = tokio::spawn(async move {
            let ok = session.burst_decode(start_ms, end_ms).await;
            if !ok {
                debug!(stream = %task_key, start_ms, end_ms, "pre-cache burst failed");
            }
            let mut in_flight = table.lock();
            if in_flight
                .get(&task_key)
                .is_some_and(|entry| entry.token == token)
            {
                in_flight.remove(&task_key);
            }
            ok
        });

        debug!(stream = %key, start_ms, end_ms, "pre-cache burst issued");
        in_flight.insert(
            key,
            InFlight {
                token,
                abort: handle.abort_handle(),
            },
        );
        Some(handle)
    }

    pub fn contains(&self, key: &StreamKey) -> bool {
        self.in_flight.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.in_flight.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Aborts every in-flight burst and forgets them.
    pub fn abort_all(&self) {
        let drained: Vec<InFlight> = self
            .in_flight
            .lock()
            .drain()
            .map(|(_, entry)| entry)
            .collect();
        if !drained.is_empty() {
            debug!(count = drained.len(), "aborting pre-cache bursts");
        }
        for entry in drained {
            entry.abort.abort();
        }
    }
}

impl Drop for BurstPool {
    fn drop(&mut self) {
        self.abort_all();
    }
}
