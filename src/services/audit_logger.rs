//! Background subscriber that persists bus events to the `event_log` table.
//!
//! Fire-and-forget from the publisher's perspective: a write failure here is
//! logged and swallowed, never surfaced to the operation that published the
//! originating event.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::warn;

use crate::domain::models::{EntityType, EventLogRow, EventSeverity};
use crate::infrastructure::database::{event_log_queries, ScopeFactory};
use crate::services::agent_events::{AgentEventType, AgentNotificationService};
use crate::services::event_bus::Overflow;
use crate::services::task_events::{TaskEventPayload, TaskEventType, TaskNotificationService};

const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

pub struct AuditLogger {
    task_handle: JoinHandle<()>,
    agent_handle: JoinHandle<()>,
}

impl AuditLogger {
    pub async fn start(
        scopes: ScopeFactory,
        task_notifier: TaskNotificationService,
        agent_notifier: AgentNotificationService,
    ) -> Self {
        let mut task_sub = task_notifier
            .bus()
            .subscribe_with_config(
                Default::default(),
                crate::services::event_bus::EventBusConfig {
                    capacity: 256,
                    overflow: Overflow::DropOldest,
                },
            )
            .await;
        let task_scopes = scopes.clone();
        let task_handle = tokio::spawn(async move {
            while let Some(envelope) = task_sub.recv().await {
                let row = task_envelope_to_row(&envelope);
                if let Err(e) = persist(&task_scopes, row).await {
                    warn!(error = %e, "audit logger failed to persist task event");
                }
            }
        });

        let mut agent_sub = agent_notifier
            .bus()
            .subscribe_with_config(
                Default::default(),
                crate::services::event_bus::EventBusConfig {
                    capacity: 256,
                    overflow: Overflow::DropOldest,
                },
            )
            .await;
        let agent_scopes = scopes.clone();
        let agent_handle = tokio::spawn(async move {
            while let Some(envelope) = agent_sub.recv().await {
                let row = EventLogRow {
                    event_id: envelope.id.to_string(),
                    event_type: format!("{:?}", envelope.event_type),
                    entity_type: EntityType::Agent,
                    entity_id: envelope.payload.agent_id.clone(),
                    actor: Some(envelope.payload.agent_id.clone()),
                    timestamp: envelope.timestamp,
                    severity: match envelope.event_type {
                        AgentEventType::Killed => EventSeverity::Warning,
                        _ => EventSeverity::Information,
                    },
                    tags: vec![format!("persona:{}", envelope.payload.persona_id)],
                    payload: serde_json::to_string(&serde_json::json!({
                        "agent_id": envelope.payload.agent_id,
                        "previous_status": envelope.payload.previous_status.map(|s| s.as_code()),
                        "new_status": envelope.payload.new_status.map(|s| s.as_code()),
                        "reason": envelope.payload.reason,
                    }))
                    .unwrap_or_default(),
                };
                if let Err(e) = persist(&agent_scopes, row).await {
                    warn!(error = %e, "audit logger failed to persist agent event");
                }
            }
        });

        Self {
            task_handle,
            agent_handle,
        }
    }

    /// Stop accepting new events and wait (bounded) for in-flight writes to
    /// finish. The subscriptions themselves are torn down by bus shutdown.
    pub async fn stop(self) {
        let _ = tokio::time::timeout(DRAIN_TIMEOUT, self.task_handle).await;
        let _ = tokio::time::timeout(DRAIN_TIMEOUT, self.agent_handle).await;
    }
}

fn task_envelope_to_row(
    envelope: &crate::services::event_bus::Envelope<TaskEventType, TaskEventPayload>,
) -> EventLogRow {
    let mut tags = Vec::new();
    if envelope.event_type == TaskEventType::Created {
        tags.push(format!("persona:{}", envelope.payload.persona_id));
    }

    EventLogRow {
        event_id: envelope.id.to_string(),
        event_type: format!("{:?}", envelope.event_type),
        entity_type: EntityType::Task,
        entity_id: envelope.payload.task_id.clone(),
        actor: envelope.payload.agent_id.clone(),
        timestamp: envelope.timestamp,
        severity: TaskEventPayload::severity(envelope.event_type),
        tags,
        payload: serde_json::to_string(&serde_json::json!({
            "task_id": envelope.payload.task_id,
            "agent_id": envelope.payload.agent_id,
            "persona_id": envelope.payload.persona_id,
            "reason": envelope.payload.reason,
        }))
        .unwrap_or_default(),
    }
}

async fn persist(scopes: &ScopeFactory, row: EventLogRow) -> crate::domain::errors::CoordinationResult<()> {
    let mut scope = scopes.write_scope().await?;
    event_log_queries::insert(&mut scope, &row).await?;
    scope.complete().await
}
