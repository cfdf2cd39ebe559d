//! Agent lifecycle events and their notification service.

use std::sync::Arc;

use crate::domain::errors::CoordinationResult;
use crate::domain::models::AgentStatus;
use crate::services::event_bus::{EventBus, EventFilter, Subscription};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentEventType {
    Registered,
    Killed,
    StatusChanged,
}

#[derive(Debug, Clone)]
pub struct AgentEventPayload {
    pub agent_id: String,
    pub persona_id: String,
    pub previous_status: Option<AgentStatus>,
    pub new_status: Option<AgentStatus>,
    pub reason: Option<String>,
}

pub type AgentBus = EventBus<AgentEventType, AgentEventPayload>;
pub type AgentSubscription = Subscription<AgentEventType, AgentEventPayload>;

#[derive(Clone)]
pub struct AgentNotificationService {
    bus: AgentBus,
}

impl AgentNotificationService {
    pub fn new(bus: AgentBus) -> Self {
        Self { bus }
    }

    pub fn bus(&self) -> &AgentBus {
        &self.bus
    }

    pub async fn registered(&self, agent_id: &str, persona_id: &str) -> CoordinationResult<()> {
        self.bus
            .publish(
                AgentEventType::Registered,
                AgentEventPayload {
                    agent_id: agent_id.to_string(),
                    persona_id: persona_id.to_string(),
                    previous_status: None,
                    new_status: Some(AgentStatus::Starting),
                    reason: None,
                },
            )
            .await
    }

    pub async fn status_changed(
        &self,
        agent_id: &str,
        persona_id: &str,
        previous: AgentStatus,
        new: AgentStatus,
    ) -> CoordinationResult<()> {
        self.bus
            .publish(
                AgentEventType::StatusChanged,
                AgentEventPayload {
                    agent_id: agent_id.to_string(),
                    persona_id: persona_id.to_string(),
                    previous_status: Some(previous),
                    new_status: Some(new),
                    reason: None,
                },
            )
            .await
    }

    pub async fn killed(&self, agent_id: &str, persona_id: &str, reason: &str) -> CoordinationResult<()> {
        self.bus
            .publish(
                AgentEventType::Killed,
                AgentEventPayload {
                    agent_id: agent_id.to_string(),
                    persona_id: persona_id.to_string(),
                    previous_status: None,
                    new_status: Some(AgentStatus::Killed),
                    reason: Some(reason.to_string()),
                },
            )
            .await
    }

    pub async fn subscribe_for_all_agent_events(&self) -> AgentSubscription {
        self.bus.subscribe(EventFilter::default()).await
    }

    pub async fn subscribe_for_agent(&self, agent_id: &str) -> AgentSubscription {
        let agent_id = agent_id.to_string();
        self.bus
            .subscribe(EventFilter {
                types: None,
                predicate: Some(Arc::new(move |p: &AgentEventPayload| p.agent_id == agent_id)),
                max_age: None,
            })
            .await
    }
}
