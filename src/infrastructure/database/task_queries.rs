//! Work-item persistence, including the atomic claim primitive.

use sqlx::Row;

use crate::domain::errors::{CoordinationError, CoordinationResult};
use crate::domain::models::{Priority, TaskStatus, WorkItem};
use crate::infrastructure::database::scope::{ReadScope, WriteScope};
use crate::infrastructure::database::utils::{format_datetime, parse_datetime};

fn row_to_work_item(row: &sqlx::sqlite::SqliteRow) -> CoordinationResult<WorkItem> {
    Ok(WorkItem {
        id: row.get("id"),
        persona_id: row.get("persona_id"),
        agent_id: row.get("agent_id"),
        description: row.get("description"),
        priority: Priority::from_code(&row.get::<String, _>("priority"))
            .ok_or_else(|| CoordinationError::Fatal("corrupt priority code".into()))?,
        status: TaskStatus::from_code(&row.get::<String, _>("status"))
            .ok_or_else(|| CoordinationError::Fatal("corrupt status code".into()))?,
        created_at: parse_datetime(&row.get::<String, _>("created_at"))?,
        started_at: row
            .get::<Option<String>, _>("started_at")
            .as_deref()
            .map(parse_datetime)
            .transpose()?,
        completed_at: row
            .get::<Option<String>, _>("completed_at")
            .as_deref()
            .map(parse_datetime)
            .transpose()?,
        result: row.get("result"),
    })
}

pub async fn insert(scope: &mut WriteScope, item: &WorkItem) -> CoordinationResult<()> {
    sqlx::query(
        "INSERT INTO work_items
            (id, persona_id, agent_id, description, priority, status, created_at, started_at, completed_at, result)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&item.id)
    .bind(&item.persona_id)
    .bind(&item.agent_id)
    .bind(&item.description)
    .bind(item.priority.as_code())
    .bind(item.status.as_code())
    .bind(format_datetime(item.created_at))
    .bind(item.started_at.map(format_datetime))
    .bind(item.completed_at.map(format_datetime))
    .bind(&item.result)
    .execute(scope.tx())
    .await?;
    Ok(())
}

pub async fn get_by_id_read(scope: &mut ReadScope, id: &str) -> CoordinationResult<Option<WorkItem>> {
    let row = sqlx::query("SELECT * FROM work_items WHERE id = ?")
        .bind(id)
        .fetch_optional(scope.conn())
        .await?;
    row.as_ref().map(row_to_work_item).transpose()
}

pub async fn get_by_id_tx(scope: &mut WriteScope, id: &str) -> CoordinationResult<Option<WorkItem>> {
    let row = sqlx::query("SELECT * FROM work_items WHERE id = ?")
        .bind(id)
        .fetch_optional(scope.tx())
        .await?;
    row.as_ref().map(row_to_work_item).transpose()
}

pub async fn list_by_status(scope: &mut ReadScope, status: TaskStatus) -> CoordinationResult<Vec<WorkItem>> {
    let rows = sqlx::query("SELECT * FROM work_items WHERE status = ? ORDER BY created_at ASC")
        .bind(status.as_code())
        .fetch_all(scope.conn())
        .await?;
    rows.iter().map(row_to_work_item).collect()
}

pub async fn list_by_agent_id(scope: &mut ReadScope, agent_id: &str) -> CoordinationResult<Vec<WorkItem>> {
    let rows = sqlx::query("SELECT * FROM work_items WHERE agent_id = ? ORDER BY created_at ASC")
        .bind(agent_id)
        .fetch_all(scope.conn())
        .await?;
    rows.iter().map(row_to_work_item).collect()
}

pub async fn list_by_agent_id_and_status(
    scope: &mut ReadScope,
    agent_id: &str,
    status: TaskStatus,
) -> CoordinationResult<Vec<WorkItem>> {
    let rows = sqlx::query(
        "SELECT * FROM work_items WHERE agent_id = ? AND status = ? ORDER BY created_at ASC",
    )
    .bind(agent_id)
    .bind(status.as_code())
    .fetch_all(scope.conn())
    .await?;
    rows.iter().map(row_to_work_item).collect()
}

/// Atomically claim the next ready work item for `persona_id`, preferring
/// rows pinned to `agent_id` or unpinned, highest priority first, oldest
/// first within a priority tier. Returns `None` without modifying anything
/// if no eligible row exists or the conditional update lost a race.
pub async fn claim_next(
    scope: &mut WriteScope,
    agent_id: &str,
    persona_id: &str,
) -> CoordinationResult<Option<WorkItem>> {
    let row = sqlx::query(
        "SELECT id FROM work_items
         WHERE persona_id = ? AND status = 'pending' AND (agent_id IS NULL OR agent_id = ?)
         ORDER BY
            CASE priority WHEN 'critical' THEN 3 WHEN 'high' THEN 2 WHEN 'normal' THEN 1 ELSE 0 END DESC,
            created_at ASC
         LIMIT 1",
    )
    .bind(persona_id)
    .bind(agent_id)
    .fetch_optional(scope.tx())
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };
    let task_id: String = row.get("id");

    let now = format_datetime(chrono::Utc::now());
    let update_result = sqlx::query(
        "UPDATE work_items SET status = 'in_progress', agent_id = ?, started_at = ?
         WHERE id = ? AND status = 'pending'",
    )
    .bind(agent_id)
    .bind(&now)
    .bind(&task_id)
    .execute(scope.tx())
    .await?;

    if update_result.rows_affected() == 0 {
        // Lost the race to another claimant between SELECT and UPDATE.
        return Ok(None);
    }

    get_by_id_tx(scope, &task_id).await
}

pub async fn complete(
    scope: &mut WriteScope,
    id: &str,
    status: TaskStatus,
    result: &str,
) -> CoordinationResult<()> {
    let now = format_datetime(chrono::Utc::now());
    sqlx::query("UPDATE work_items SET status = ?, result = ?, completed_at = ? WHERE id = ?")
        .bind(status.as_code())
        .bind(result)
        .bind(&now)
        .bind(id)
        .execute(scope.tx())
        .await?;
    Ok(())
}

/// Fail every `in_progress` row owned by `agent_id`, used when an agent is
/// killed. Returns the ids that were reclaimed.
pub async fn fail_in_progress_for_agent(
    scope: &mut WriteScope,
    agent_id: &str,
    reason: &str,
) -> CoordinationResult<Vec<String>> {
    let rows = sqlx::query("SELECT id FROM work_items WHERE agent_id = ? AND status = 'in_progress'")
        .bind(agent_id)
        .fetch_all(scope.tx())
        .await?;
    let ids: Vec<String> = rows.iter().map(|r| r.get::<String, _>("id")).collect();
    if ids.is_empty() {
        return Ok(ids);
    }

    let now = format_datetime(chrono::Utc::now());
    for id in &ids {
        sqlx::query(
            "UPDATE work_items SET status = 'failed', result = ?, completed_at = ?
             WHERE id = ? AND status = 'in_progress'",
        )
        .bind(reason)
        .bind(&now)
        .bind(id)
        .execute(scope.tx())
        .await?;
    }

    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::database::{DatabaseConnection, ScopeFactory};

    async fn setup() -> (tempfile::TempDir, ScopeFactory) {
        let dir = tempfile::tempdir().expect("temp dir");
        let url = format!("sqlite:{}", dir.path().join("test.db").display());
        let conn = DatabaseConnection::connect(&url).await.expect("connect");
        conn.migrate().await.expect("migrate");
        (dir, ScopeFactory::new(conn.pool().clone()))
    }

    fn new_item(persona_id: &str, priority: Priority) -> WorkItem {
        WorkItem {
            id: uuid::Uuid::new_v4().to_string(),
            persona_id: persona_id.to_string(),
            agent_id: None,
            description: "test item".to_string(),
            priority,
            status: TaskStatus::Pending,
            created_at: chrono::Utc::now(),
            started_at: None,
            completed_at: None,
            result: None,
        }
    }

    #[tokio::test]
    async fn claim_next_prefers_higher_priority_regardless_of_creation_order() {
        let (_dir, scopes) = setup().await;
        let mut scope = scopes.write_scope().await.unwrap();

        let low = new_item("worker", Priority::Low);
        let critical = new_item("worker", Priority::Critical);
        insert(&mut scope, &low).await.unwrap();
        insert(&mut scope, &critical).await.unwrap();

        let claimed = claim_next(&mut scope, "agent-1", "worker").await.unwrap().unwrap();
        assert_eq!(claimed.id, critical.id);
    }

    #[tokio::test]
    async fn claim_next_returns_none_once_the_queue_is_exhausted() {
        let (_dir, scopes) = setup().await;
        let mut scope = scopes.write_scope().await.unwrap();

        let item = new_item("worker", Priority::Normal);
        insert(&mut scope, &item).await.unwrap();

        assert!(claim_next(&mut scope, "agent-1", "worker").await.unwrap().is_some());
        assert!(claim_next(&mut scope, "agent-2", "worker").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn claim_next_ignores_items_pinned_to_another_agent() {
        let (_dir, scopes) = setup().await;
        let mut scope = scopes.write_scope().await.unwrap();

        let mut pinned = new_item("worker", Priority::Normal);
        pinned.agent_id = Some("agent-only".to_string());
        insert(&mut scope, &pinned).await.unwrap();

        assert!(claim_next(&mut scope, "agent-other", "worker").await.unwrap().is_none());
        assert!(claim_next(&mut scope, "agent-only", "worker").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn fail_in_progress_for_agent_only_touches_that_agents_in_progress_rows() {
        let (_dir, scopes) = setup().await;
        let mut scope = scopes.write_scope().await.unwrap();

        let item = new_item("worker", Priority::Normal);
        insert(&mut scope, &item).await.unwrap();
        claim_next(&mut scope, "agent-1", "worker").await.unwrap();

        let other_pending = new_item("worker", Priority::Normal);
        insert(&mut scope, &other_pending).await.unwrap();

        let reclaimed = fail_in_progress_for_agent(&mut scope, "agent-1", "AgentTerminated")
            .await
            .unwrap();
        assert_eq!(reclaimed, vec![item.id.clone()]);

        let still_pending = get_by_id_tx(&mut scope, &other_pending.id).await.unwrap().unwrap();
        assert_eq!(still_pending.status, TaskStatus::Pending);
    }
}
