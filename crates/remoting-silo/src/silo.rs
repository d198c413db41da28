//! Spawns and supervises a single out-of-process host (spec §4.7).

use std::ffi::OsStr;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::process::{Child, ChildStdout, Command};
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;

use crate::error::SiloError;
use crate::fault::{FaultHandling, SiloFaultReason};
use crate::handshake::HandshakeReader;

const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(1);
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy)]
pub struct SiloOptions {
    pub handshake_timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for SiloOptions {
    fn default() -> Self {
        Self { handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT, connect_timeout: DEFAULT_CONNECT_TIMEOUT }
    }
}

type FaultDetectedHook = Arc<dyn Fn(SiloFaultReason) + Send + Sync>;
type FaultHandledHook = Arc<dyn Fn(SiloFaultReason, FaultHandling) + Send + Sync>;
type HostOutputHook = Arc<dyn Fn(String) + Send + Sync>;

/// Event hooks a caller wires up to observe the silo (spec §4.7:
/// `OnFaultDetected`, `OnFaultHandled`, plus non-protocol host stdout lines).
#[derive(Clone)]
pub struct SiloCallbacks {
    pub on_fault_detected: FaultDetectedHook,
    pub on_fault_handled: FaultHandledHook,
    pub on_host_output: HostOutputHook,
}

impl Default for SiloCallbacks {
    fn default() -> Self {
        Self {
            on_fault_detected: Arc::new(|_| {}),
            on_fault_handled: Arc::new(|_, _| {}),
            on_host_output: Arc::new(|_| {}),
        }
    }
}

/// Supervises one child process: spawn, stdout handshake, and fault
/// aggregation. Does not own the RPC endpoint connected to the child — the
/// caller dials the returned port itself and reports connection faults back
/// via [`OutOfProcessSilo::report_fault`].
pub struct OutOfProcessSilo {
    child: AsyncMutex<Child>,
    options: SiloOptions,
    callbacks: SiloCallbacks,
    has_process_failed: AtomicBool,
    fault_raised: AtomicBool,
    output_task: Mutex<Option<JoinHandle<()>>>,
}

impl OutOfProcessSilo {
    /// Spawn `executable` with the current process id as its sole argument
    /// (the convention the child uses to detect parent death), then drive
    /// the stdout handshake to completion.
    pub async fn spawn(
        executable: impl AsRef<OsStr>,
        options: SiloOptions,
        callbacks: SiloCallbacks,
    ) -> Result<(Arc<Self>, u16), SiloError> {
        let parent_pid = std::process::id();
        let mut command = Command::new(executable.as_ref());
        command.arg(parent_pid.to_string()).stdout(Stdio::piped()).stdin(Stdio::null());

        let mut child = command.spawn().map_err(SiloError::SpawnFailed)?;
        let stdout = child.stdout.take().expect("stdout was piped");
        let mut lines = BufReader::new(stdout).lines();

        let handshake = tokio::time::timeout(options.handshake_timeout, async {
            let mut reader = HandshakeReader::new();
            loop {
                match lines.next_line().await? {
                    Some(line) => {
                        if let Some(port) = reader.feed(&line)? {
                            return Ok(port);
                        }
                    }
                    None => return Err(SiloError::StdoutClosedDuringHandshake),
                }
            }
        })
        .await;

        let port = match handshake {
            Ok(result) => result?,
            Err(_) => return Err(SiloError::HandshakeTimeout(options.handshake_timeout)),
        };

        let silo = Arc::new(Self {
            child: AsyncMutex::new(child),
            options,
            callbacks,
            has_process_failed: AtomicBool::new(false),
            fault_raised: AtomicBool::new(false),
            output_task: Mutex::new(None),
        });

        let pump_silo = silo.clone();
        let handle = tokio::spawn(async move {
            pump_silo.pump_host_output(lines).await;
        });
        *silo.output_task.lock() = Some(handle);

        Ok((silo, port))
    }

    async fn pump_host_output(&self, mut lines: Lines<BufReader<ChildStdout>>) {
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if line == "goodbye" {
                        return;
                    }
                    (self.callbacks.on_host_output)(line);
                }
                Ok(None) => return,
                Err(e) => {
                    tracing::debug!(error = %e, "failed reading host stdout");
                    return;
                }
            }
        }
    }

    /// Record a fault observed by the caller — typically the endpoint's read
    /// pump translating an `EndPointDisconnectReason`, or the heartbeat
    /// supervisor reporting a timeout. Idempotent: only the first call raises
    /// `OnFaultDetected`/`OnFaultHandled` and kills the child. In particular,
    /// a fault the endpoint's own read pump detected because the child
    /// already exited does not trigger a second, redundant disconnect.
    pub async fn report_fault(&self, reason: SiloFaultReason) {
        if self.fault_raised.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_err() {
            return;
        }
        self.has_process_failed.store(true, Ordering::Release);
        (self.callbacks.on_fault_detected)(reason);
        self.kill_child().await;
        (self.callbacks.on_fault_handled)(reason, FaultHandling::Shutdown);
    }

    async fn kill_child(&self) {
        let mut child = self.child.lock().await;
        if let Ok(None) = child.try_wait() {
            let _ = child.start_kill();
        }
    }

    #[must_use]
    pub fn has_process_failed(&self) -> bool {
        self.has_process_failed.load(Ordering::Acquire)
    }

    /// Whether the child is still running, per a non-blocking `try_wait`.
    pub async fn is_process_running(&self) -> bool {
        matches!(self.child.lock().await.try_wait(), Ok(None))
    }

    /// Best-effort shutdown. The caller is expected to have already sent the
    /// protocol-level `Goodbye` frame over the RPC connection; this waits up
    /// to a short grace period for the child to exit on its own, then kills
    /// it outright.
    pub async fn shutdown(&self) {
        let waited = {
            let mut child = self.child.lock().await;
            tokio::time::timeout(SHUTDOWN_GRACE, child.wait()).await
        };
        if waited.is_err() {
            self.kill_child().await;
        }
        if let Some(task) = self.output_task.lock().take() {
            task.abort();
        }
    }
}

impl Drop for OutOfProcessSilo {
    fn drop(&mut self) {
        if let Some(task) = self.output_task.lock().take() {
            task.abort();
        }
        if let Ok(mut child) = self.child.try_lock() {
            let _ = child.start_kill();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    // `OutOfProcessSilo::spawn` takes a single real host executable and
    // appends the parent pid itself, which doesn't fit a `sh -c` test
    // double. Tests instead drive `spawn_with_args` directly.
    async fn spawn_script(
        body: &str,
        options: SiloOptions,
    ) -> Result<(Arc<OutOfProcessSilo>, u16), SiloError> {
        OutOfProcessSilo::spawn_with_args("/bin/sh", vec!["-c".to_owned(), body.to_owned()], options, SiloCallbacks::default())
            .await
    }

    impl OutOfProcessSilo {
        async fn spawn_with_args(
            shell: &str,
            args: Vec<String>,
            options: SiloOptions,
            callbacks: SiloCallbacks,
        ) -> Result<(Arc<Self>, u16), SiloError> {
            let mut command = Command::new(shell);
            command.args(args).stdout(Stdio::piped()).stdin(Stdio::null());
            let mut child = command.spawn().map_err(SiloError::SpawnFailed)?;
            let stdout = child.stdout.take().expect("stdout was piped");
            let mut lines = BufReader::new(stdout).lines();

            let handshake = tokio::time::timeout(options.handshake_timeout, async {
                let mut reader = HandshakeReader::new();
                loop {
                    match lines.next_line().await? {
                        Some(line) => {
                            if let Some(port) = reader.feed(&line)? {
                                return Ok(port);
                            }
                        }
                        None => return Err(SiloError::StdoutClosedDuringHandshake),
                    }
                }
            })
            .await;

            let port = match handshake {
                Ok(result) => result?,
                Err(_) => return Err(SiloError::HandshakeTimeout(options.handshake_timeout)),
            };

            let silo = Arc::new(Self {
                child: AsyncMutex::new(child),
                options,
                callbacks,
                has_process_failed: AtomicBool::new(false),
                fault_raised: AtomicBool::new(false),
                output_task: Mutex::new(None),
            });

            let pump_silo = silo.clone();
            let handle = tokio::spawn(async move {
                pump_silo.pump_host_output(lines).await;
            });
            *silo.output_task.lock() = Some(handle);

            Ok((silo, port))
        }
    }

    #[tokio::test]
    async fn spawn_reads_the_handshake_and_returns_the_port() {
        let (silo, port) =
            spawn_script("echo booting; echo 4321; echo ready; sleep 5", SiloOptions::default())
                .await
                .unwrap();
        assert_eq!(port, 4321);
        assert!(silo.is_process_running().await);
        silo.shutdown().await;
        assert!(!silo.is_process_running().await);
    }

    #[tokio::test]
    async fn handshake_timeout_is_enforced() {
        let options = SiloOptions { handshake_timeout: Duration::from_millis(50), ..SiloOptions::default() };
        let result = spawn_script("echo booting; sleep 5", options).await;
        assert!(matches!(result, Err(SiloError::HandshakeTimeout(_))));
    }

    #[tokio::test]
    async fn report_fault_kills_the_child_and_fires_callbacks_once() {
        let detected = Arc::new(AtomicUsize::new(0));
        let handled = Arc::new(AtomicUsize::new(0));
        let detected_clone = detected.clone();
        let handled_clone = handled.clone();
        let callbacks = SiloCallbacks {
            on_fault_detected: Arc::new(move |_| {
                detected_clone.fetch_add(1, Ordering::SeqCst);
            }),
            on_fault_handled: Arc::new(move |_, _| {
                handled_clone.fetch_add(1, Ordering::SeqCst);
            }),
            on_host_output: Arc::new(|_| {}),
        };

        let (silo, _port) = OutOfProcessSilo::spawn_with_args(
            "/bin/sh",
            vec!["-c".to_owned(), "echo booting; echo 1; echo ready; sleep 5".to_owned()],
            SiloOptions::default(),
            callbacks,
        )
        .await
        .unwrap();

        silo.report_fault(SiloFaultReason::ConnectionFailure).await;
        silo.report_fault(SiloFaultReason::ConnectionFailure).await;

        assert_eq!(detected.load(Ordering::SeqCst), 1);
        assert_eq!(handled.load(Ordering::SeqCst), 1);
        assert!(silo.has_process_failed());
        assert!(!silo.is_process_running().await);
    }
}
