//! Durable audit rows persisted by the audit logger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Task,
    Agent,
    Memory,
}

impl EntityType {
    pub fn as_code(self) -> &'static str {
        match self {
            Self::Task => "Task",
            Self::Agent => "Agent",
            Self::Memory => "Memory",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSeverity {
    Information,
    Warning,
    Error,
}

impl EventSeverity {
    pub fn as_code(self) -> &'static str {
        match self {
            Self::Information => "information",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLogRow {
    pub event_id: String,
    pub event_type: String,
    pub entity_type: EntityType,
    pub entity_id: String,
    pub actor: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub severity: EventSeverity,
    pub tags: Vec<String>,
    pub payload: String,
}
