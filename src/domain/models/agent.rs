//! Agent model: a registered, possibly-running subprocess claiming work for a persona.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of an agent. `Starting` is only legal before the first
/// heartbeat; `Stopped`/`Killed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Starting,
    Running,
    Stopped,
    Killed,
}

impl AgentStatus {
    pub fn as_code(self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Killed => "killed",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "starting" => Some(Self::Starting),
            "running" => Some(Self::Running),
            "stopped" => Some(Self::Stopped),
            "killed" => Some(Self::Killed),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Stopped | Self::Killed)
    }

    pub fn is_working(self) -> bool {
        matches!(self, Self::Starting | Self::Running)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    pub persona_id: String,
    pub working_directory: String,
    pub model: Option<String>,
    pub worktree_name: Option<String>,
    pub process_id: Option<i64>,
    pub status: AgentStatus,
    pub registered_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub last_heartbeat: Option<DateTime<Utc>>,
    pub stopped_at: Option<DateTime<Utc>>,
}

/// Fields required to register a new agent.
#[derive(Debug, Clone)]
pub struct NewAgent {
    pub persona_id: String,
    pub working_directory: String,
    pub model: Option<String>,
    pub worktree_name: Option<String>,
}

/// Marker embedded in a `WorkItem::result` when an agent kill reclaimed it.
pub const AGENT_TERMINATED_MARKER: &str = "AgentTerminated";
