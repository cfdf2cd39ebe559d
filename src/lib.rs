//! Coordhive: a coordination kernel for a multi-agent work queue.
//!
//! Owns the work queue, agent registry, and a small namespaced memory store,
//! and couples them through an in-process typed event bus. Long-running
//! agent subprocesses claim work through [`api::CoordinationApi`]; how they
//! connect (stdio, HTTP, ...) is left to a caller-supplied transport.

pub mod api;
pub mod domain;
pub mod infrastructure;
pub mod services;

use std::sync::Arc;
use std::time::Duration;

use infrastructure::config::AppConfig;
use infrastructure::database::{DatabaseConnection, ScopeFactory};
use infrastructure::process::SystemProcessTerminator;
use services::agent_events::AgentNotificationService;
use services::event_bus::{EventBus, EventBusConfig};
use services::task_events::TaskNotificationService;
use services::{AgentService, AuditLogger, MemoryService, WorkItemService};

/// Everything needed to run the coordination kernel: the wired services, the
/// background audit logger, and the two event buses (kept around so callers
/// can subscribe directly, and so `shutdown()` can dispose them).
pub struct Coordhive {
    pub api: api::CoordinationApi,
    pub work_items: WorkItemService,
    pub agents: AgentService,
    pub memory: MemoryService,
    pub task_bus: services::task_events::TaskBus,
    pub agent_bus: services::agent_events::AgentBus,
    audit_logger: Option<AuditLogger>,
}

impl Coordhive {
    pub async fn bootstrap(config: AppConfig) -> anyhow::Result<Self> {
        let database_url = format!("sqlite:{}", config.database.path);
        let db = DatabaseConnection::connect(&database_url).await?;
        db.migrate().await?;
        let scopes = ScopeFactory::new(db.pool().clone());

        let task_bus: services::task_events::TaskBus = EventBus::new(EventBusConfig {
            capacity: config.event_bus.tasks.capacity,
            overflow: config.event_bus.tasks.overflow_policy()?,
        });
        let agent_bus: services::agent_events::AgentBus = EventBus::new(EventBusConfig {
            capacity: config.event_bus.agents.capacity,
            overflow: config.event_bus.agents.overflow_policy()?,
        });

        let task_notifier = TaskNotificationService::new(task_bus.clone());
        let agent_notifier = AgentNotificationService::new(agent_bus.clone());

        let work_items = WorkItemService::new(scopes.clone(), task_notifier.clone(), config.long_poll.clone());
        let agents = AgentService::new(
            scopes.clone(),
            agent_notifier.clone(),
            task_notifier.clone(),
            Arc::new(SystemProcessTerminator),
            Duration::from_millis(config.subprocess.kill_grace_period_ms),
        );
        let memory = MemoryService::new(scopes.clone());

        let audit_logger = AuditLogger::start(scopes, task_notifier, agent_notifier).await;

        let launcher: Arc<dyn domain::ports::SubprocessLauncher> = Arc::new(domain::ports::NullLauncher);
        let api = api::CoordinationApi::new(work_items.clone(), agents.clone(), memory.clone(), launcher);

        Ok(Self {
            api,
            work_items,
            agents,
            memory,
            task_bus,
            agent_bus,
            audit_logger: Some(audit_logger),
        })
    }

    /// Dispose both event buses (outstanding subscriptions complete cleanly,
    /// further publishes fail) and drain the audit logger within its bounded
    /// window.
    pub async fn shutdown(mut self) {
        self.task_bus.shutdown().await;
        self.agent_bus.shutdown().await;
        if let Some(logger) = self.audit_logger.take() {
            logger.stop().await;
        }
    }
}
