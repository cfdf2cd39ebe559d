//! Subprocess termination, grounded in the graceful-then-forced shutdown
//! idiom: send a kill signal, wait up to a grace period, then force-kill.

use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::domain::ports::ProcessTerminator;

/// Terminates a process by PID using the platform's process-group signal,
/// falling back to the OS-level force kill if the grace period elapses.
pub struct SystemProcessTerminator;

#[async_trait]
impl ProcessTerminator for SystemProcessTerminator {
    async fn terminate(&self, process_id: i64, grace_period: Duration) -> anyhow::Result<()> {
        let pid = nix::unistd::Pid::from_raw(process_id as i32);

        if let Err(e) = nix::sys::signal::kill(pid, nix::sys::signal::Signal::SIGTERM) {
            if e != nix::errno::Errno::ESRCH {
                warn!(process_id, error = %e, "failed to send SIGTERM");
            }
            return Ok(());
        }

        let deadline = tokio::time::Instant::now() + grace_period;
        loop {
            if nix::sys::signal::kill(pid, None).is_err() {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                let _ = nix::sys::signal::kill(pid, nix::sys::signal::Signal::SIGKILL);
                return Ok(());
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }
}

/// No-op terminator for tests and deployments where agents are not
/// subprocesses the kernel itself owns.
pub struct NullTerminator;

#[async_trait]
impl ProcessTerminator for NullTerminator {
    async fn terminate(&self, _process_id: i64, _grace_period: Duration) -> anyhow::Result<()> {
        Ok(())
    }
}
