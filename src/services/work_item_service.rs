//! Work-item CRUD, atomic claim, and the long-poll dispatcher.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::domain::errors::{CoordinationError, CoordinationResult};
use crate::domain::models::{Priority, TaskStatus, WorkItem};
use crate::infrastructure::config::LongPollConfig;
use crate::infrastructure::database::{agent_queries, task_queries, ScopeFactory};
use crate::services::task_events::TaskNotificationService;

#[derive(Clone)]
pub struct WorkItemService {
    scopes: ScopeFactory,
    notifier: TaskNotificationService,
    long_poll: LongPollConfig,
}

impl WorkItemService {
    pub fn new(scopes: ScopeFactory, notifier: TaskNotificationService, long_poll: LongPollConfig) -> Self {
        Self {
            scopes,
            notifier,
            long_poll,
        }
    }

    #[instrument(skip(self, description), fields(persona_id = %persona_id))]
    pub async fn create(
        &self,
        persona_id: &str,
        description: &str,
        agent_id: Option<&str>,
        priority: Priority,
    ) -> CoordinationResult<String> {
        if persona_id.is_empty() || description.is_empty() {
            return Err(CoordinationError::validation(
                "persona_id and description must be non-empty",
            ));
        }

        let item = WorkItem {
            id: Uuid::new_v4().to_string(),
            persona_id: persona_id.to_string(),
            agent_id: agent_id.map(str::to_string),
            description: description.to_string(),
            priority,
            status: TaskStatus::Pending,
            created_at: chrono::Utc::now(),
            started_at: None,
            completed_at: None,
            result: None,
        };

        let mut scope = self.scopes.write_scope().await?;
        task_queries::insert(&mut scope, &item).await?;
        scope.complete().await?;

        self.notifier
            .created(&item.id, agent_id, persona_id, priority)
            .await?;
        info!(task_id = %item.id, "task created");
        Ok(item.id)
    }

    /// Attempt the atomic claim exactly once: `Pending -> InProgress` for at
    /// most one row owned by `persona_id` and claimable by `agent_id`.
    async fn try_claim(&self, agent_id: &str, persona_id: &str) -> CoordinationResult<Option<WorkItem>> {
        let mut scope = self.scopes.write_scope().await?;
        let claimed = task_queries::claim_next(&mut scope, agent_id, persona_id).await?;
        scope.complete().await?;

        if let Some(item) = &claimed {
            self.notifier.claimed(&item.id, agent_id).await?;
        }
        Ok(claimed)
    }

    /// Long-poll dispatch: resolve the agent, bump its heartbeat, attempt a
    /// fast-path claim, then wait (subscribed before waiting, so a `Created`
    /// published mid-wait cannot be missed) up to `timeout_ms` for more work.
    /// Returns a synthetic requery sentinel on timeout or retry exhaustion.
    #[instrument(skip(self))]
    pub async fn get_next_task(
        &self,
        agent_id: &str,
        timeout_ms: Option<i64>,
        cancellation: CancellationToken,
    ) -> CoordinationResult<WorkItem> {
        let deadline_ms = match timeout_ms {
            Some(ms) if ms < 0 => {
                return Err(CoordinationError::validation("timeout_ms must not be negative"))
            }
            Some(ms) => ms as u64,
            None => self.long_poll.time_to_wait_for_task_ms,
        };

        let persona_id = {
            let mut scope = self.scopes.write_scope().await?;
            let agent = agent_queries::get_by_id_tx(&mut scope, agent_id)
                .await?
                .ok_or_else(|| CoordinationError::not_found(format!("agent not registered: {agent_id}")))?;
            if agent.status.is_terminal() {
                return Err(CoordinationError::state_conflict(format!(
                    "agent {agent_id} is not in a working status"
                )));
            }
            let transition = agent.status == crate::domain::models::AgentStatus::Starting;
            agent_queries::update_heartbeat(&mut scope, agent_id, chrono::Utc::now(), transition).await?;
            scope.complete().await?;
            agent.persona_id
        };

        if let Some(item) = self.try_claim(agent_id, &persona_id).await? {
            return Ok(item);
        }

        if deadline_ms == 0 {
            return Ok(self.requery_sentinel(agent_id));
        }

        let mut subscription = self
            .notifier
            .subscribe_for_agent_or_persona(agent_id, &persona_id)
            .await;

        let deadline = tokio::time::Instant::now() + Duration::from_millis(deadline_ms);
        let polling_interval = Duration::from_millis(self.long_poll.polling_interval_ms.max(1));
        let mut retries: u32 = 0;

        let result = loop {
            if retries >= self.long_poll.max_retries {
                break self.requery_sentinel(agent_id);
            }
            if tokio::time::Instant::now() >= deadline {
                break self.requery_sentinel(agent_id);
            }

            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            let tick = tokio::time::sleep(remaining.min(polling_interval));

            tokio::select! {
                biased;
                _ = cancellation.cancelled() => {
                    break self.requery_sentinel(agent_id);
                }
                hint = subscription.recv() => {
                    if hint.is_none() {
                        break self.requery_sentinel(agent_id);
                    }
                }
                () = tick => {}
            }

            match self.try_claim(agent_id, &persona_id).await? {
                Some(item) => break item,
                None => {
                    retries += 1;
                }
            }
        };

        subscription.cancel();
        Ok(result)
    }

    fn requery_sentinel(&self, agent_id: &str) -> WorkItem {
        WorkItem {
            id: WorkItem::requery_sentinel(agent_id),
            persona_id: String::new(),
            agent_id: Some(agent_id.to_string()),
            description: String::new(),
            priority: Priority::Normal,
            status: TaskStatus::Pending,
            created_at: chrono::Utc::now(),
            started_at: None,
            completed_at: None,
            result: None,
        }
    }

    #[instrument(skip(self, result))]
    pub async fn report_completion(&self, task_id: &str, result: &str) -> CoordinationResult<()> {
        self.finish(task_id, TaskStatus::Completed, result).await?;
        let mut scope = self.scopes.read_scope().await?;
        let item = task_queries::get_by_id_read(&mut scope, task_id)
            .await?
            .ok_or_else(|| CoordinationError::not_found(format!("task not found: {task_id}")))?;
        let agent_id = item
            .agent_id
            .ok_or_else(|| CoordinationError::state_conflict("task has no owning agent"))?;
        self.notifier.completed(task_id, &agent_id).await?;
        Ok(())
    }

    #[instrument(skip(self, error_message))]
    pub async fn report_failure(&self, task_id: &str, error_message: &str) -> CoordinationResult<()> {
        self.finish(task_id, TaskStatus::Failed, error_message).await?;
        let mut scope = self.scopes.read_scope().await?;
        let item = task_queries::get_by_id_read(&mut scope, task_id)
            .await?
            .ok_or_else(|| CoordinationError::not_found(format!("task not found: {task_id}")))?;
        let agent_id = item
            .agent_id
            .ok_or_else(|| CoordinationError::state_conflict("task has no owning agent"))?;
        self.notifier.failed(task_id, &agent_id, error_message).await?;
        Ok(())
    }

    async fn finish(&self, task_id: &str, status: TaskStatus, result: &str) -> CoordinationResult<()> {
        let mut scope = self.scopes.write_scope().await?;
        let item = task_queries::get_by_id_tx(&mut scope, task_id)
            .await?
            .ok_or_else(|| CoordinationError::not_found(format!("task not found: {task_id}")))?;

        // Completed -> Completed is rejected; Failed -> Completed is a legal retry-then-succeed.
        // Any terminal status blocks a fail report, since a task cannot un-finish into Failed.
        let already_done = match status {
            TaskStatus::Completed => item.status == TaskStatus::Completed,
            _ => item.status.is_terminal(),
        };
        if already_done {
            warn!(task_id, current = item.status.as_code(), "task already terminal");
            return Err(CoordinationError::state_conflict(format!(
                "task {task_id} is already {}",
                item.status.as_code()
            )));
        }

        task_queries::complete(&mut scope, task_id, status, result).await?;
        scope.complete().await?;
        Ok(())
    }

    pub async fn get_by_id(&self, task_id: &str) -> CoordinationResult<Option<WorkItem>> {
        let mut scope = self.scopes.read_scope().await?;
        task_queries::get_by_id_read(&mut scope, task_id).await
    }

    pub async fn list_by_status(&self, status: TaskStatus) -> CoordinationResult<Vec<WorkItem>> {
        let mut scope = self.scopes.read_scope().await?;
        task_queries::list_by_status(&mut scope, status).await
    }

    pub async fn list_by_agent_id(&self, agent_id: &str) -> CoordinationResult<Vec<WorkItem>> {
        let mut scope = self.scopes.read_scope().await?;
        task_queries::list_by_agent_id(&mut scope, agent_id).await
    }

    pub async fn list_by_agent_id_and_status(
        &self,
        agent_id: &str,
        status: TaskStatus,
    ) -> CoordinationResult<Vec<WorkItem>> {
        let mut scope = self.scopes.read_scope().await?;
        task_queries::list_by_agent_id_and_status(&mut scope, agent_id, status).await
    }
}
