//! Agent lifecycle: registration, heartbeats, graceful stop, and kill with
//! in-progress work reclamation.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::domain::errors::{CoordinationError, CoordinationResult};
use crate::domain::models::{Agent, AgentStatus, NewAgent, AGENT_TERMINATED_MARKER};
use crate::domain::ports::ProcessTerminator;
use crate::infrastructure::database::{agent_queries, task_queries, ScopeFactory};
use crate::services::agent_events::AgentNotificationService;
use crate::services::task_events::TaskNotificationService;

#[derive(Clone)]
pub struct AgentService {
    scopes: ScopeFactory,
    notifier: AgentNotificationService,
    task_notifier: TaskNotificationService,
    terminator: Arc<dyn ProcessTerminator>,
    kill_grace_period: Duration,
}

impl AgentService {
    pub fn new(
        scopes: ScopeFactory,
        notifier: AgentNotificationService,
        task_notifier: TaskNotificationService,
        terminator: Arc<dyn ProcessTerminator>,
        kill_grace_period: Duration,
    ) -> Self {
        Self {
            scopes,
            notifier,
            task_notifier,
            terminator,
            kill_grace_period,
        }
    }

    #[instrument(skip(self, new_agent), fields(persona_id = %new_agent.persona_id))]
    pub async fn register(&self, new_agent: NewAgent) -> CoordinationResult<String> {
        if new_agent.persona_id.is_empty() || new_agent.working_directory.is_empty() {
            return Err(CoordinationError::validation(
                "persona_id and working_directory must be non-empty",
            ));
        }

        let now = chrono::Utc::now();
        let agent = Agent {
            id: Uuid::new_v4().to_string(),
            persona_id: new_agent.persona_id.clone(),
            working_directory: new_agent.working_directory,
            model: new_agent.model,
            worktree_name: new_agent.worktree_name,
            process_id: None,
            status: AgentStatus::Starting,
            registered_at: now,
            started_at: None,
            last_heartbeat: Some(now),
            stopped_at: None,
        };

        let mut scope = self.scopes.write_scope().await?;
        agent_queries::insert(&mut scope, &agent).await?;
        scope.complete().await?;

        self.notifier.registered(&agent.id, &agent.persona_id).await?;
        info!(agent_id = %agent.id, "agent registered");
        Ok(agent.id)
    }

    /// Returns `false` if no such agent exists.
    #[instrument(skip(self))]
    pub async fn update_heartbeat(&self, agent_id: &str) -> CoordinationResult<bool> {
        let mut scope = self.scopes.write_scope().await?;
        let Some(agent) = agent_queries::get_by_id_tx(&mut scope, agent_id).await? else {
            return Ok(false);
        };

        let transition_to_running = agent.status == AgentStatus::Starting;
        let now = chrono::Utc::now();
        let updated = agent_queries::update_heartbeat(&mut scope, agent_id, now, transition_to_running).await?;
        scope.complete().await?;

        if transition_to_running {
            self.notifier
                .status_changed(agent_id, &agent.persona_id, AgentStatus::Starting, AgentStatus::Running)
                .await?;
        }
        Ok(updated)
    }

    #[instrument(skip(self))]
    pub async fn mark_running(&self, agent_id: &str, process_id: Option<i64>) -> CoordinationResult<()> {
        let mut scope = self.scopes.write_scope().await?;
        agent_queries::mark_running(&mut scope, agent_id, process_id, chrono::Utc::now()).await?;
        scope.complete().await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn stop(&self, agent_id: &str) -> CoordinationResult<()> {
        let mut scope = self.scopes.write_scope().await?;
        let agent = agent_queries::get_by_id_tx(&mut scope, agent_id)
            .await?
            .ok_or_else(|| CoordinationError::not_found(format!("agent not found: {agent_id}")))?;
        agent_queries::stop(&mut scope, agent_id, chrono::Utc::now()).await?;
        scope.complete().await?;

        self.notifier
            .status_changed(agent_id, &agent.persona_id, agent.status, AgentStatus::Stopped)
            .await?;
        Ok(())
    }

    /// Terminate the agent's subprocess (best effort), mark it `Killed`, and
    /// fail every `InProgress` work item it owned, all under one scope.
    #[instrument(skip(self))]
    pub async fn kill(&self, agent_id: &str) -> CoordinationResult<()> {
        let mut read = self.scopes.read_scope().await?;
        let Some(agent) = agent_queries::get_by_id_read(&mut read, agent_id).await? else {
            return Ok(());
        };
        drop(read);

        if let Some(process_id) = agent.process_id {
            if let Err(e) = self.terminator.terminate(process_id, self.kill_grace_period).await {
                warn!(agent_id, error = %e, "failed to terminate agent subprocess, proceeding with DB reclaim");
            }
        }

        let mut scope = self.scopes.write_scope().await?;
        agent_queries::kill(&mut scope, agent_id, chrono::Utc::now()).await?;
        let reclaimed = task_queries::fail_in_progress_for_agent(&mut scope, agent_id, AGENT_TERMINATED_MARKER).await?;
        scope.complete().await?;

        self.notifier.killed(agent_id, &agent.persona_id, AGENT_TERMINATED_MARKER).await?;
        for task_id in &reclaimed {
            self.task_notifier.failed(task_id, agent_id, AGENT_TERMINATED_MARKER).await?;
        }
        info!(agent_id, reclaimed = reclaimed.len(), "agent killed");
        Ok(())
    }

    pub async fn get(&self, agent_id: &str) -> CoordinationResult<Option<Agent>> {
        let mut scope = self.scopes.read_scope().await?;
        agent_queries::get_by_id_read(&mut scope, agent_id).await
    }

    pub async fn list(&self, persona_filter: Option<&str>) -> CoordinationResult<Vec<Agent>> {
        let mut scope = self.scopes.read_scope().await?;
        agent_queries::list(&mut scope, persona_filter).await
    }
}

