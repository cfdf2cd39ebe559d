pub mod agent_events;
pub mod agent_service;
pub mod audit_logger;
pub mod event_bus;
pub mod memory_service;
pub mod task_events;
pub mod work_item_service;

pub use agent_events::AgentNotificationService;
pub use agent_service::AgentService;
pub use audit_logger::AuditLogger;
pub use memory_service::MemoryService;
pub use task_events::TaskNotificationService;
pub use work_item_service::WorkItemService;
