//! A heartbeat probe double whose outcome a test controls at will.

use std::sync::atomic::{AtomicBool, Ordering};

use remoting_heartbeat::HeartbeatProbe;

/// Succeeds until [`ScriptedProbe::fail`] is called, after which every probe
/// returns an error. One-directional by design: tests that need the peer to
/// recover construct a fresh probe instead of flipping this back.
#[derive(Default)]
pub struct ScriptedProbe {
    failing: AtomicBool,
}

impl ScriptedProbe {
    pub fn fail(&self) {
        self.failing.store(true, Ordering::Release);
    }
}

#[async_trait::async_trait]
impl HeartbeatProbe for ScriptedProbe {
    async fn probe(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if self.failing.load(Ordering::Acquire) {
            Err("scripted probe failure".into())
        } else {
            Ok(())
        }
    }
}
