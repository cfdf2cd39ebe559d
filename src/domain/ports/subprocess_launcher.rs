//! Subprocess launcher port.
//!
//! Spawning an agent process and preparing its working directory (e.g. a git
//! worktree checkout) is an external concern; this kernel only defines the
//! contract `launch_agent` delegates to.

use async_trait::async_trait;

#[derive(Debug, Clone)]
pub struct LaunchRequest {
    pub persona_id: String,
    pub description: String,
    pub worktree_name: Option<String>,
    pub model: Option<String>,
    pub yolo: bool,
}

#[derive(Debug, Clone)]
pub struct LaunchedProcess {
    pub working_directory: String,
    pub process_id: Option<i64>,
}

#[async_trait]
pub trait SubprocessLauncher: Send + Sync {
    async fn launch(&self, request: LaunchRequest) -> anyhow::Result<LaunchedProcess>;
}

/// Launcher used when no real subprocess spawner is wired in (tests, or a
/// deployment where agents self-register instead of being launched).
pub struct NullLauncher;

#[async_trait]
impl SubprocessLauncher for NullLauncher {
    async fn launch(&self, request: LaunchRequest) -> anyhow::Result<LaunchedProcess> {
        Ok(LaunchedProcess {
            working_directory: request
                .worktree_name
                .unwrap_or_else(|| ".".to_string()),
            process_id: None,
        })
    }
}
