//! A fixed-answer debugger oracle for tests that need to pin the heartbeat
//! supervisor's suppression behavior without an actual debugger attached.

use remoting_heartbeat::DebuggerOracle;

pub struct FixedDebuggerOracle(pub bool);

impl DebuggerOracle for FixedDebuggerOracle {
    fn is_debugger_attached(&self) -> bool {
        self.0
    }
}
