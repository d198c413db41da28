//! The heartbeat supervisor itself (spec §4.6).

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::HeartbeatConfig;
use crate::probe::{DebuggerOracle, HeartbeatProbe};

/// Why the supervisor declared the peer dead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatFailureReason {
    /// The probe call itself returned an error.
    ProbeFailed,
    /// No successful probe within `interval * skipped_threshold`.
    TimedOut,
    /// The weak probe handle no longer upgrades — the peer endpoint is gone.
    PeerGone,
}

struct State {
    last_success: Instant,
}

/// Periodically probes a remote peer's liveness and raises `OnFailure`
/// exactly once per lifetime if the peer stops responding.
///
/// `Stop`/`Dispose` halt probing; outstanding probes complete but never
/// raise afterward. Disposal is idempotent.
pub struct HeartbeatSupervisor {
    config: HeartbeatConfig,
    state: Mutex<State>,
    success_count: AtomicU64,
    failure_raised: AtomicBool,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl HeartbeatSupervisor {
    /// Start supervising. `probe` is a weak handle so the supervisor never
    /// keeps the peer proxy (and transitively the endpoint) alive on its own.
    pub fn start(
        config: HeartbeatConfig,
        probe: Weak<dyn HeartbeatProbe>,
        debugger_oracle: Arc<dyn DebuggerOracle>,
        on_failure: impl Fn(HeartbeatFailureReason) + Send + Sync + 'static,
    ) -> Arc<Self> {
        let supervisor = Arc::new(Self {
            config,
            state: Mutex::new(State { last_success: Instant::now() }),
            success_count: AtomicU64::new(0),
            failure_raised: AtomicBool::new(false),
            cancel: CancellationToken::new(),
            task: Mutex::new(None),
        });

        let task_supervisor = supervisor.clone();
        let handle = tokio::spawn(async move {
            task_supervisor.run(probe, debugger_oracle, on_failure).await;
        });
        *supervisor.task.lock() = Some(handle);
        supervisor
    }

    async fn run(
        &self,
        probe: Weak<dyn HeartbeatProbe>,
        debugger_oracle: Arc<dyn DebuggerOracle>,
        on_failure: impl Fn(HeartbeatFailureReason) + Send + Sync,
    ) {
        let mut ticker = tokio::time::interval(self.config.interval);
        loop {
            tokio::select! {
                () = self.cancel.cancelled() => return,
                _ = ticker.tick() => {}
            }

            match probe.upgrade() {
                None => {
                    self.maybe_raise(HeartbeatFailureReason::PeerGone, &debugger_oracle, &on_failure);
                    continue;
                }
                Some(probe) => {
                    tokio::select! {
                        () = self.cancel.cancelled() => return,
                        result = probe.probe() => {
                            match result {
                                Ok(()) => {
                                    self.state.lock().last_success = Instant::now();
                                    self.success_count.fetch_add(1, Ordering::Relaxed);
                                }
                                Err(e) => {
                                    tracing::debug!(error = %e, "heartbeat probe returned an error");
                                }
                            }
                        }
                    }
                }
            }

            let elapsed = self.state.lock().last_success.elapsed();
            if elapsed >= self.config.failure_window() {
                self.maybe_raise(HeartbeatFailureReason::TimedOut, &debugger_oracle, &on_failure);
            }
        }
    }

    fn maybe_raise(
        &self,
        reason: HeartbeatFailureReason,
        debugger_oracle: &Arc<dyn DebuggerOracle>,
        on_failure: &(impl Fn(HeartbeatFailureReason) + Send + Sync),
    ) {
        if !self.config.report_when_debugger_attached && debugger_oracle.is_debugger_attached() {
            tracing::debug!(?reason, "heartbeat failure suppressed: debugger attached");
            return;
        }
        if self.failure_raised.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_ok() {
            tracing::warn!(?reason, "heartbeat supervisor declaring peer failed");
            on_failure(reason);
        }
    }

    #[must_use]
    pub fn success_count(&self) -> u64 {
        self.success_count.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn has_failed(&self) -> bool {
        self.failure_raised.load(Ordering::Relaxed)
    }

    /// Halt probing. Idempotent: calling this more than once, or after the
    /// loop has already exited, is a no-op.
    pub fn stop(&self) {
        self.cancel.cancel();
    }
}

impl Drop for HeartbeatSupervisor {
    fn drop(&mut self) {
        self.stop();
    }
}
