//! Durable audit row persistence.

use crate::domain::errors::CoordinationResult;
use crate::domain::models::{EntityType, EventLogRow, EventSeverity};
use crate::infrastructure::database::scope::WriteScope;
use crate::infrastructure::database::utils::format_datetime;

pub async fn insert(scope: &mut WriteScope, row: &EventLogRow) -> CoordinationResult<()> {
    sqlx::query(
        "INSERT INTO event_log (event_id, event_type, entity_type, entity_id, actor, timestamp, severity, tags, payload)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&row.event_id)
    .bind(&row.event_type)
    .bind(entity_type_code(row.entity_type))
    .bind(&row.entity_id)
    .bind(&row.actor)
    .bind(format_datetime(row.timestamp))
    .bind(severity_code(row.severity))
    .bind(serde_json::to_string(&row.tags)?)
    .bind(&row.payload)
    .execute(scope.tx())
    .await?;
    Ok(())
}

fn entity_type_code(entity_type: EntityType) -> &'static str {
    entity_type.as_code()
}

fn severity_code(severity: EventSeverity) -> &'static str {
    severity.as_code()
}
