//! Agent persistence.

use sqlx::Row;

use crate::domain::errors::{CoordinationError, CoordinationResult};
use crate::domain::models::{Agent, AgentStatus};
use crate::infrastructure::database::scope::{ReadScope, WriteScope};
use crate::infrastructure::database::utils::{format_datetime, parse_datetime};

fn row_to_agent(row: &sqlx::sqlite::SqliteRow) -> CoordinationResult<Agent> {
    Ok(Agent {
        id: row.get("id"),
        persona_id: row.get("persona_id"),
        working_directory: row.get("working_directory"),
        model: row.get("model"),
        worktree_name: row.get("worktree_name"),
        process_id: row.get("process_id"),
        status: AgentStatus::from_code(&row.get::<String, _>("status"))
            .ok_or_else(|| CoordinationError::Fatal("corrupt agent status code".into()))?,
        registered_at: parse_datetime(&row.get::<String, _>("registered_at"))?,
        started_at: row
            .get::<Option<String>, _>("started_at")
            .as_deref()
            .map(parse_datetime)
            .transpose()?,
        last_heartbeat: row
            .get::<Option<String>, _>("last_heartbeat")
            .as_deref()
            .map(parse_datetime)
            .transpose()?,
        stopped_at: row
            .get::<Option<String>, _>("stopped_at")
            .as_deref()
            .map(parse_datetime)
            .transpose()?,
    })
}

pub async fn insert(scope: &mut WriteScope, agent: &Agent) -> CoordinationResult<()> {
    sqlx::query(
        "INSERT INTO agents
            (id, persona_id, working_directory, model, worktree_name, process_id, status,
             registered_at, started_at, last_heartbeat, stopped_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&agent.id)
    .bind(&agent.persona_id)
    .bind(&agent.working_directory)
    .bind(&agent.model)
    .bind(&agent.worktree_name)
    .bind(agent.process_id)
    .bind(agent.status.as_code())
    .bind(format_datetime(agent.registered_at))
    .bind(agent.started_at.map(format_datetime))
    .bind(agent.last_heartbeat.map(format_datetime))
    .bind(agent.stopped_at.map(format_datetime))
    .execute(scope.tx())
    .await?;
    Ok(())
}

pub async fn get_by_id_read(scope: &mut ReadScope, id: &str) -> CoordinationResult<Option<Agent>> {
    let row = sqlx::query("SELECT * FROM agents WHERE id = ?")
        .bind(id)
        .fetch_optional(scope.conn())
        .await?;
    row.as_ref().map(row_to_agent).transpose()
}

pub async fn get_by_id_tx(scope: &mut WriteScope, id: &str) -> CoordinationResult<Option<Agent>> {
    let row = sqlx::query("SELECT * FROM agents WHERE id = ?")
        .bind(id)
        .fetch_optional(scope.tx())
        .await?;
    row.as_ref().map(row_to_agent).transpose()
}

pub async fn list(scope: &mut ReadScope, persona_filter: Option<&str>) -> CoordinationResult<Vec<Agent>> {
    let rows = match persona_filter {
        Some(persona) => {
            sqlx::query("SELECT * FROM agents WHERE persona_id = ? ORDER BY registered_at ASC")
                .bind(persona)
                .fetch_all(scope.conn())
                .await?
        }
        None => {
            sqlx::query("SELECT * FROM agents ORDER BY registered_at ASC")
                .fetch_all(scope.conn())
                .await?
        }
    };
    rows.iter().map(row_to_agent).collect()
}

/// Returns `false` if the row does not exist.
pub async fn update_heartbeat(
    scope: &mut WriteScope,
    id: &str,
    now: chrono::DateTime<chrono::Utc>,
    transition_to_running: bool,
) -> CoordinationResult<bool> {
    let rows_affected = if transition_to_running {
        sqlx::query(
            "UPDATE agents SET status = 'running', started_at = COALESCE(started_at, ?), last_heartbeat = ?
             WHERE id = ?",
        )
        .bind(format_datetime(now))
        .bind(format_datetime(now))
        .bind(id)
        .execute(scope.tx())
        .await?
        .rows_affected()
    } else {
        sqlx::query("UPDATE agents SET last_heartbeat = ? WHERE id = ?")
            .bind(format_datetime(now))
            .bind(id)
            .execute(scope.tx())
            .await?
            .rows_affected()
    };
    Ok(rows_affected > 0)
}

pub async fn mark_running(
    scope: &mut WriteScope,
    id: &str,
    process_id: Option<i64>,
    now: chrono::DateTime<chrono::Utc>,
) -> CoordinationResult<()> {
    sqlx::query(
        "UPDATE agents SET status = 'running', process_id = COALESCE(?, process_id),
         started_at = COALESCE(started_at, ?) WHERE id = ?",
    )
    .bind(process_id)
    .bind(format_datetime(now))
    .bind(id)
    .execute(scope.tx())
    .await?;
    Ok(())
}

pub async fn stop(scope: &mut WriteScope, id: &str, now: chrono::DateTime<chrono::Utc>) -> CoordinationResult<()> {
    sqlx::query("UPDATE agents SET status = 'stopped', stopped_at = ? WHERE id = ?")
        .bind(format_datetime(now))
        .bind(id)
        .execute(scope.tx())
        .await?;
    Ok(())
}

pub async fn kill(scope: &mut WriteScope, id: &str, now: chrono::DateTime<chrono::Utc>) -> CoordinationResult<()> {
    sqlx::query("UPDATE agents SET status = 'killed', stopped_at = ? WHERE id = ?")
        .bind(format_datetime(now))
        .bind(id)
        .execute(scope.tx())
        .await?;
    Ok(())
}
