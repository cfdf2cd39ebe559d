//! External process termination port.
//!
//! The agent kill operation asks this port to stop a subprocess; failures are
//! logged and ignored by the caller, since the DB-side reclaim is what matters.

use async_trait::async_trait;
use std::time::Duration;

#[async_trait]
pub trait ProcessTerminator: Send + Sync {
    /// Request termination of the process, waiting up to `grace_period` for a
    /// graceful exit before escalating to a forced kill.
    async fn terminate(&self, process_id: i64, grace_period: Duration) -> anyhow::Result<()>;
}
