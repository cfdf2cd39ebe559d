//! Agent registration, heartbeats, and kill-with-reclaim.

mod common;

use coordhive::domain::models::{AgentStatus, NewAgent, Priority, TaskStatus};

#[tokio::test]
async fn register_starts_an_agent_in_starting_status() {
    let kernel = common::test_kernel().await;

    let agent_id = kernel
        .agents
        .register(NewAgent {
            persona_id: "builder".to_string(),
            working_directory: "/work/builder".to_string(),
            model: Some("sonnet".to_string()),
            worktree_name: None,
        })
        .await
        .expect("register agent");

    let agent = kernel.agents.get(&agent_id).await.expect("query").expect("exists");
    assert_eq!(agent.status, AgentStatus::Starting);
    assert!(agent.last_heartbeat.is_some());
}

#[tokio::test]
async fn first_heartbeat_transitions_starting_to_running() {
    let kernel = common::test_kernel().await;

    let agent_id = kernel
        .agents
        .register(NewAgent {
            persona_id: "builder".to_string(),
            working_directory: "/work/builder".to_string(),
            model: None,
            worktree_name: None,
        })
        .await
        .expect("register agent");

    let updated = kernel.agents.update_heartbeat(&agent_id).await.expect("heartbeat");
    assert!(updated);

    let agent = kernel.agents.get(&agent_id).await.expect("query").expect("exists");
    assert_eq!(agent.status, AgentStatus::Running);
    assert!(agent.started_at.is_some());
}

#[tokio::test]
async fn killing_an_agent_reclaims_its_in_progress_work() {
    let kernel = common::test_kernel().await;

    let agent_id = kernel
        .agents
        .register(NewAgent {
            persona_id: "doomed".to_string(),
            working_directory: "/work/doomed".to_string(),
            model: None,
            worktree_name: None,
        })
        .await
        .expect("register agent");

    kernel
        .work_items
        .create("doomed", "half-finished work", None, Priority::Normal)
        .await
        .expect("create task");

    let claimed = kernel
        .work_items
        .get_next_task(&agent_id, Some(0), tokio_util::sync::CancellationToken::new())
        .await
        .expect("claim");
    assert_eq!(claimed.status, TaskStatus::InProgress);

    kernel.agents.kill(&agent_id).await.expect("kill agent");

    let agent = kernel.agents.get(&agent_id).await.expect("query").expect("exists");
    assert_eq!(agent.status, AgentStatus::Killed);

    let reclaimed = kernel
        .work_items
        .get_by_id(&claimed.id)
        .await
        .expect("query")
        .expect("task exists");
    assert_eq!(reclaimed.status, TaskStatus::Failed);
    assert_eq!(
        reclaimed.result.as_deref(),
        Some(coordhive::domain::models::AGENT_TERMINATED_MARKER)
    );
}

#[tokio::test]
async fn killing_an_agent_with_no_work_still_succeeds() {
    let kernel = common::test_kernel().await;

    let agent_id = kernel
        .agents
        .register(NewAgent {
            persona_id: "idle".to_string(),
            working_directory: "/work/idle".to_string(),
            model: None,
            worktree_name: None,
        })
        .await
        .expect("register agent");

    kernel.agents.kill(&agent_id).await.expect("kill agent with no work");

    let agent = kernel.agents.get(&agent_id).await.expect("query").expect("exists");
    assert_eq!(agent.status, AgentStatus::Killed);
}

#[tokio::test]
async fn get_next_task_rejects_a_killed_agent() {
    let kernel = common::test_kernel().await;

    let agent_id = kernel
        .agents
        .register(NewAgent {
            persona_id: "gone".to_string(),
            working_directory: "/work/gone".to_string(),
            model: None,
            worktree_name: None,
        })
        .await
        .expect("register agent");

    kernel.agents.kill(&agent_id).await.expect("kill agent");

    let result = kernel
        .work_items
        .get_next_task(&agent_id, Some(0), tokio_util::sync::CancellationToken::new())
        .await;
    assert!(result.is_err(), "a killed agent must not be able to claim work");
}
