//! Transport-agnostic operation surface. A caller layering a wire protocol
//! (JSON-RPC, HTTP, ...) on top wraps these methods; the kernel does not
//! frame requests itself.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::domain::models::{Agent, MemoryEntry, NewAgent, Priority, TaskStatus, WorkItem};
use crate::domain::ports::{LaunchRequest, SubprocessLauncher};
use crate::services::{AgentService, MemoryService, WorkItemService};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationOutcome {
    pub success: bool,
    pub error: Option<String>,
}

impl OperationOutcome {
    fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    fn err(e: impl std::fmt::Display) -> Self {
        Self {
            success: false,
            error: Some(e.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTaskResponse {
    pub success: bool,
    pub task_id: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetNextTaskResponse {
    pub success: bool,
    pub task: Option<WorkItem>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaunchAgentResponse {
    pub success: bool,
    pub agent_id: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveMemoryResponse {
    pub success: bool,
    pub key: String,
    pub namespace: String,
}

/// Facade over the four coordination services, one method per operation in
/// the external interface table.
#[derive(Clone)]
pub struct CoordinationApi {
    work_items: WorkItemService,
    agents: AgentService,
    memory: MemoryService,
    launcher: Arc<dyn SubprocessLauncher>,
}

impl CoordinationApi {
    pub fn new(
        work_items: WorkItemService,
        agents: AgentService,
        memory: MemoryService,
        launcher: Arc<dyn SubprocessLauncher>,
    ) -> Self {
        Self {
            work_items,
            agents,
            memory,
            launcher,
        }
    }

    pub async fn create_task(
        &self,
        persona_id: &str,
        description: &str,
        agent_id: Option<&str>,
        priority: Option<Priority>,
    ) -> CreateTaskResponse {
        match self
            .work_items
            .create(persona_id, description, agent_id, priority.unwrap_or_default())
            .await
        {
            Ok(task_id) => CreateTaskResponse {
                success: true,
                task_id: Some(task_id),
                error: None,
            },
            Err(e) => CreateTaskResponse {
                success: false,
                task_id: None,
                error: Some(e.to_string()),
            },
        }
    }

    pub async fn get_next_task(&self, agent_id: &str, timeout_ms: Option<i64>) -> GetNextTaskResponse {
        match self
            .work_items
            .get_next_task(agent_id, timeout_ms, CancellationToken::new())
            .await
        {
            Ok(task) => GetNextTaskResponse {
                success: true,
                task: Some(task),
                error: None,
            },
            Err(e) => GetNextTaskResponse {
                success: false,
                task: None,
                error: Some(e.to_string()),
            },
        }
    }

    pub async fn get_task_status(&self, task_id: &str) -> Option<WorkItem> {
        self.work_items.get_by_id(task_id).await.ok().flatten()
    }

    pub async fn get_tasks_by_status(&self, status: TaskStatus) -> Vec<WorkItem> {
        self.work_items.list_by_status(status).await.unwrap_or_default()
    }

    pub async fn get_tasks_by_agent_id(&self, agent_id: &str) -> Vec<WorkItem> {
        self.work_items.list_by_agent_id(agent_id).await.unwrap_or_default()
    }

    pub async fn get_tasks_by_agent_id_and_status(&self, agent_id: &str, status: TaskStatus) -> Vec<WorkItem> {
        self.work_items
            .list_by_agent_id_and_status(agent_id, status)
            .await
            .unwrap_or_default()
    }

    pub async fn report_task_completion(&self, task_id: &str, result: &str) -> OperationOutcome {
        match self.work_items.report_completion(task_id, result).await {
            Ok(()) => OperationOutcome::ok(),
            Err(e) => OperationOutcome::err(e),
        }
    }

    pub async fn report_task_failure(&self, task_id: &str, error_message: &str) -> OperationOutcome {
        match self.work_items.report_failure(task_id, error_message).await {
            Ok(()) => OperationOutcome::ok(),
            Err(e) => OperationOutcome::err(e),
        }
    }

    pub async fn list_agents(&self, persona_filter: Option<&str>) -> Vec<Agent> {
        self.agents.list(persona_filter).await.unwrap_or_default()
    }

    pub async fn launch_agent(
        &self,
        persona_id: &str,
        description: &str,
        worktree_name: Option<&str>,
        model: Option<&str>,
        yolo: bool,
    ) -> LaunchAgentResponse {
        let launched = match self
            .launcher
            .launch(LaunchRequest {
                persona_id: persona_id.to_string(),
                description: description.to_string(),
                worktree_name: worktree_name.map(str::to_string),
                model: model.map(str::to_string),
                yolo,
            })
            .await
        {
            Ok(launched) => launched,
            Err(e) => {
                return LaunchAgentResponse {
                    success: false,
                    agent_id: None,
                    error: Some(e.to_string()),
                }
            }
        };

        match self
            .agents
            .register(NewAgent {
                persona_id: persona_id.to_string(),
                working_directory: launched.working_directory,
                model: model.map(str::to_string),
                worktree_name: worktree_name.map(str::to_string),
            })
            .await
        {
            Ok(agent_id) => {
                if let Some(pid) = launched.process_id {
                    if let Err(e) = self.agents.mark_running(&agent_id, Some(pid)).await {
                        warn!(agent_id = %agent_id, error = %e, "failed to record launched agent as running");
                    }
                }
                LaunchAgentResponse {
                    success: true,
                    agent_id: Some(agent_id),
                    error: None,
                }
            }
            Err(e) => LaunchAgentResponse {
                success: false,
                agent_id: None,
                error: Some(e.to_string()),
            },
        }
    }

    pub async fn kill_agent(&self, agent_id: &str) -> OperationOutcome {
        match self.agents.kill(agent_id).await {
            Ok(()) => OperationOutcome::ok(),
            Err(e) => OperationOutcome::err(e),
        }
    }

    pub async fn save_memory(
        &self,
        key: &str,
        value: &str,
        entry_type: Option<&str>,
        metadata: Option<&str>,
        namespace: Option<&str>,
    ) -> SaveMemoryResponse {
        match self.memory.save(key, value, namespace, entry_type, metadata).await {
            Ok(entry) => SaveMemoryResponse {
                success: true,
                key: entry.key,
                namespace: entry.namespace,
            },
            Err(_) => SaveMemoryResponse {
                success: false,
                key: key.to_string(),
                namespace: namespace.unwrap_or_default().to_string(),
            },
        }
    }

    pub async fn read_memory(&self, key: &str, namespace: Option<&str>) -> Option<MemoryEntry> {
        self.memory.read(key, namespace).await.ok().flatten()
    }
}

