pub mod agent;
pub mod event_log;
pub mod memory;
pub mod task;

pub use agent::{Agent, AgentStatus, NewAgent, AGENT_TERMINATED_MARKER};
pub use event_log::{EntityType, EventLogRow, EventSeverity};
pub use memory::{MemoryEntry, DEFAULT_MEMORY_TYPE, DEFAULT_NAMESPACE};
pub use task::{Priority, TaskStatus, WorkItem};
