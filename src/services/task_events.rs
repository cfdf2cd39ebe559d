//! Work-item lifecycle events and the notification service built on top of
//! the generic bus.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::domain::errors::{CoordinationError, CoordinationResult};
use crate::domain::models::{EventSeverity, Priority};
use crate::services::event_bus::{EventBus, EventFilter, Subscription};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskEventType {
    Created,
    Claimed,
    Completed,
    Failed,
}

#[derive(Debug, Clone)]
pub struct TaskEventPayload {
    pub task_id: String,
    pub agent_id: Option<String>,
    pub persona_id: String,
    pub priority: Option<Priority>,
    pub reason: Option<String>,
}

impl TaskEventPayload {
    pub fn severity(event_type: TaskEventType) -> EventSeverity {
        match event_type {
            TaskEventType::Created | TaskEventType::Claimed | TaskEventType::Completed => {
                EventSeverity::Information
            }
            TaskEventType::Failed => EventSeverity::Warning,
        }
    }
}

pub type TaskBus = EventBus<TaskEventType, TaskEventPayload>;
pub type TaskSubscription = Subscription<TaskEventType, TaskEventPayload>;

/// A single-delivery `Created` hint for an agent that's long-polling.
#[derive(Debug, Clone)]
pub struct TaskCreatedHint {
    pub task_id: String,
    pub persona_id: String,
}

struct HintMailbox {
    slots: Mutex<std::collections::HashMap<String, TaskCreatedHint>>,
}

/// Publishes work-item lifecycle events and exposes the subscription helpers
/// the long-poll dispatcher relies on.
#[derive(Clone)]
pub struct TaskNotificationService {
    bus: TaskBus,
    hints: Arc<HintMailbox>,
}

impl TaskNotificationService {
    pub fn new(bus: TaskBus) -> Self {
        Self {
            bus,
            hints: Arc::new(HintMailbox {
                slots: Mutex::new(std::collections::HashMap::new()),
            }),
        }
    }

    pub fn bus(&self) -> &TaskBus {
        &self.bus
    }

    pub async fn created(
        &self,
        task_id: &str,
        agent_id: Option<&str>,
        persona_id: &str,
        priority: Priority,
    ) -> CoordinationResult<()> {
        if task_id.is_empty() || persona_id.is_empty() {
            return Err(CoordinationError::validation(
                "task_id and persona_id must be non-empty",
            ));
        }

        // Drop a single-delivery hint for whoever is waiting on this
        // persona (or this specific agent, if pinned). A later consumer
        // replaces any hint left unconsumed by an earlier creation.
        let hint_key = agent_id.unwrap_or(persona_id).to_string();
        self.hints.slots.lock().unwrap().insert(
            hint_key,
            TaskCreatedHint {
                task_id: task_id.to_string(),
                persona_id: persona_id.to_string(),
            },
        );

        self.bus
            .publish(
                TaskEventType::Created,
                TaskEventPayload {
                    task_id: task_id.to_string(),
                    agent_id: agent_id.map(str::to_string),
                    persona_id: persona_id.to_string(),
                    priority: Some(priority),
                    reason: None,
                },
            )
            .await
    }

    pub async fn claimed(&self, task_id: &str, agent_id: &str) -> CoordinationResult<()> {
        if task_id.is_empty() || agent_id.is_empty() {
            return Err(CoordinationError::validation("task_id and agent_id must be non-empty"));
        }
        self.bus
            .publish(
                TaskEventType::Claimed,
                TaskEventPayload {
                    task_id: task_id.to_string(),
                    agent_id: Some(agent_id.to_string()),
                    persona_id: String::new(),
                    priority: None,
                    reason: None,
                },
            )
            .await
    }

    pub async fn completed(&self, task_id: &str, agent_id: &str) -> CoordinationResult<()> {
        if task_id.is_empty() || agent_id.is_empty() {
            return Err(CoordinationError::validation("task_id and agent_id must be non-empty"));
        }
        self.bus
            .publish(
                TaskEventType::Completed,
                TaskEventPayload {
                    task_id: task_id.to_string(),
                    agent_id: Some(agent_id.to_string()),
                    persona_id: String::new(),
                    priority: None,
                    reason: None,
                },
            )
            .await
    }

    pub async fn failed(&self, task_id: &str, agent_id: &str, reason: &str) -> CoordinationResult<()> {
        if task_id.is_empty() || agent_id.is_empty() {
            return Err(CoordinationError::validation("task_id and agent_id must be non-empty"));
        }
        self.bus
            .publish(
                TaskEventType::Failed,
                TaskEventPayload {
                    task_id: task_id.to_string(),
                    agent_id: Some(agent_id.to_string()),
                    persona_id: String::new(),
                    priority: None,
                    reason: Some(reason.to_string()),
                },
            )
            .await
    }

    pub async fn subscribe_for_agent(&self, agent_id: &str) -> TaskSubscription {
        let agent_id = agent_id.to_string();
        self.bus
            .subscribe(EventFilter {
                types: None,
                predicate: Some(Arc::new(move |p: &TaskEventPayload| {
                    p.agent_id.as_deref() == Some(agent_id.as_str())
                })),
                max_age: None,
            })
            .await
    }

    pub async fn subscribe_for_persona(&self, persona: &str) -> TaskSubscription {
        let persona = persona.to_string();
        self.bus
            .subscribe(EventFilter {
                types: Some(vec![TaskEventType::Created]),
                predicate: Some(Arc::new(move |p: &TaskEventPayload| {
                    p.agent_id.is_none() && p.persona_id == persona
                })),
                max_age: None,
            })
            .await
    }

    pub async fn subscribe_for_agent_or_persona(&self, agent_id: &str, persona: &str) -> TaskSubscription {
        let agent_id = agent_id.to_string();
        let persona = persona.to_string();
        self.bus
            .subscribe(EventFilter {
                types: None,
                predicate: Some(Arc::new(move |p: &TaskEventPayload| {
                    p.agent_id.as_deref() == Some(agent_id.as_str())
                        || (p.agent_id.is_none() && p.persona_id == persona)
                })),
                max_age: None,
            })
            .await
    }

    pub async fn subscribe_for_task_ids(&self, ids: &HashSet<String>) -> CoordinationResult<TaskSubscription> {
        if ids.is_empty() {
            return Err(CoordinationError::validation("task id set must be non-empty"));
        }
        let ids = ids.clone();
        Ok(self
            .bus
            .subscribe(EventFilter {
                types: Some(vec![TaskEventType::Completed, TaskEventType::Failed]),
                predicate: Some(Arc::new(move |p: &TaskEventPayload| ids.contains(&p.task_id))),
                max_age: None,
            })
            .await)
    }

    pub async fn subscribe_for_all_task_events(&self) -> TaskSubscription {
        self.bus.subscribe(EventFilter::default()).await
    }

    /// Non-blocking peek-and-take of the most recent `Created` hint
    /// addressed to this agent (by id or by persona-pool membership).
    pub fn try_consume_task_created(&self, agent_id: &str, persona: &str) -> Option<TaskCreatedHint> {
        let mut slots = self.hints.slots.lock().unwrap();
        if let Some(hint) = slots.remove(agent_id) {
            return Some(hint);
        }
        slots.remove(persona)
    }
}
