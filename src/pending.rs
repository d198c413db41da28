//! Tracks outstanding RPCs and bounds how many may be in flight at once
//! (spec §4.3, §6: 1000 in-flight soft cap per endpoint).

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use remoting_wire::{Frame, RpcId};
use tokio::sync::{oneshot, OwnedSemaphorePermit, Semaphore};

use crate::error::RemotingError;

/// Holds the in-flight semaphore permit for one outstanding call. The slot
/// is freed when this is dropped, whether the call completed, was
/// cancelled, or the caller simply gave up waiting.
pub struct PendingCallGuard {
    _permit: OwnedSemaphorePermit,
}

pub struct PendingCalls {
    inner: Mutex<HashMap<RpcId, oneshot::Sender<Result<Frame, RemotingError>>>>,
    in_flight: Arc<Semaphore>,
}

impl PendingCalls {
    #[must_use]
    pub fn new(max_in_flight: usize) -> Self {
        Self { inner: Mutex::new(HashMap::new()), in_flight: Arc::new(Semaphore::new(max_in_flight)) }
    }

    /// Reserve an in-flight slot and register a waiter for `rpc_id`. Blocks
    /// while the endpoint already has `max_in_flight` calls outstanding.
    pub async fn enqueue(
        &self,
        rpc_id: RpcId,
    ) -> (PendingCallGuard, oneshot::Receiver<Result<Frame, RemotingError>>) {
        let permit = self.in_flight.clone().acquire_owned().await.expect("semaphore is never closed");
        let (tx, rx) = oneshot::channel();
        self.inner.lock().insert(rpc_id, tx);
        (PendingCallGuard { _permit: permit }, rx)
    }

    /// Resolve the waiter for `rpc_id`, if one is still registered. A
    /// response for an rpc id nobody is waiting on (the caller already timed
    /// out, or this is a stray retransmission) is silently dropped.
    pub fn complete(&self, rpc_id: RpcId, result: Result<Frame, RemotingError>) {
        if let Some(tx) = self.inner.lock().remove(&rpc_id) {
            let _ = tx.send(result);
        }
    }

    /// Fail every outstanding call, e.g. on disconnect. `make_err` is
    /// invoked once per waiter since `RemotingError` does not implement
    /// `Clone` (it wraps `std::io::Error`).
    pub fn cancel_all(&self, make_err: impl Fn() -> RemotingError) {
        let waiters: Vec<_> = self.inner.lock().drain().collect();
        for (_, tx) in waiters {
            let _ = tx.send(Err(make_err()));
        }
    }

    #[must_use]
    pub fn in_flight_count(&self) -> usize {
        self.inner.lock().len()
    }
}
