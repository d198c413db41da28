//! Helpers for the hosted child binary: emit the stdout handshake protocol
//! and watch for parent death (spec §4.7 — "a silo's child must not outlive
//! its parent").

use std::io::Write;
use std::time::Duration;

/// Print the `booting` handshake line.
pub fn announce_booting() {
    println!("booting");
    let _ = std::io::stdout().flush();
}

/// Print the chosen listen port.
pub fn announce_port(port: u16) {
    println!("{port}");
    let _ = std::io::stdout().flush();
}

/// Print the `ready` handshake line, completing the handshake.
pub fn announce_ready() {
    println!("ready");
    let _ = std::io::stdout().flush();
}

/// Print the `goodbye` line that precedes a clean shutdown.
pub fn announce_goodbye() {
    println!("goodbye");
    let _ = std::io::stdout().flush();
}

/// Spawn a background task that polls whether `parent_pid` is still alive
/// and invokes `on_parent_gone` the first time it finds it is not.
///
/// Detection is best-effort and Unix-only (checked via `/proc/<pid>`); on
/// other platforms the parent is always assumed alive.
pub fn watch_parent_exit(
    parent_pid: u32,
    on_parent_gone: impl Fn() + Send + 'static,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(Duration::from_millis(250)).await;
            if !parent_is_alive(parent_pid) {
                on_parent_gone();
                return;
            }
        }
    })
}

#[cfg(unix)]
fn parent_is_alive(pid: u32) -> bool {
    std::path::Path::new(&format!("/proc/{pid}")).exists()
}

#[cfg(not(unix))]
fn parent_is_alive(_pid: u32) -> bool {
    true
}
