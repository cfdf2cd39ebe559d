//! Shared fixtures for integration tests.

use std::path::PathBuf;

use coordhive::infrastructure::database::{DatabaseConnection, ScopeFactory};
use coordhive::infrastructure::config::LongPollConfig;
use coordhive::services::agent_events::AgentNotificationService;
use coordhive::services::event_bus::{EventBus, EventBusConfig};
use coordhive::services::task_events::TaskNotificationService;
use coordhive::services::{AgentService, MemoryService, WorkItemService};
use tempfile::TempDir;

/// A scratch SQLite file in its own temp directory, migrated and ready.
/// The `TempDir` must be kept alive for as long as the database is used.
pub async fn temp_db() -> (TempDir, ScopeFactory) {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let db_path: PathBuf = dir.path().join("test.db");
    let url = format!("sqlite:{}", db_path.display());

    let conn = DatabaseConnection::connect(&url)
        .await
        .expect("failed to connect to test database");
    conn.migrate().await.expect("failed to run migrations");

    (dir, ScopeFactory::new(conn.pool().clone()))
}

/// A full service triple (work items, agents, memory) wired over one
/// scratch database, with the default long-poll settings trimmed down so
/// tests that exercise the dispatcher don't sit around for minutes.
pub struct TestKernel {
    pub _dir: TempDir,
    pub work_items: WorkItemService,
    pub agents: AgentService,
    pub memory: MemoryService,
}

pub async fn test_kernel() -> TestKernel {
    let (dir, scopes) = temp_db().await;

    let task_bus: coordhive::services::task_events::TaskBus = EventBus::new(EventBusConfig::default());
    let agent_bus: coordhive::services::agent_events::AgentBus = EventBus::new(EventBusConfig::default());
    let task_notifier = TaskNotificationService::new(task_bus);
    let agent_notifier = AgentNotificationService::new(agent_bus);

    let long_poll = LongPollConfig {
        time_to_wait_for_task_ms: 500,
        polling_interval_ms: 20,
        max_retries: 50,
    };

    let work_items = WorkItemService::new(scopes.clone(), task_notifier.clone(), long_poll);
    let agents = AgentService::new(
        scopes.clone(),
        agent_notifier,
        task_notifier,
        std::sync::Arc::new(coordhive::infrastructure::process::NullTerminator),
        std::time::Duration::from_millis(50),
    );
    let memory = MemoryService::new(scopes);

    TestKernel {
        _dir: dir,
        work_items,
        agents,
        memory,
    }
}
