//! Work-item creation, atomic claim, and completion/failure transitions.

mod common;

use coordhive::domain::models::{NewAgent, Priority, TaskStatus};

#[tokio::test]
async fn create_then_claim_transitions_pending_to_in_progress() {
    let kernel = common::test_kernel().await;

    let agent_id = kernel
        .agents
        .register(NewAgent {
            persona_id: "reviewer".to_string(),
            working_directory: "/work/reviewer".to_string(),
            model: None,
            worktree_name: None,
        })
        .await
        .expect("register agent");

    let task_id = kernel
        .work_items
        .create("reviewer", "review PR #42", None, Priority::Normal)
        .await
        .expect("create task");

    let task = kernel
        .work_items
        .get_by_id(&task_id)
        .await
        .expect("query")
        .expect("task exists");
    assert_eq!(task.status, TaskStatus::Pending);

    let claimed = kernel
        .work_items
        .get_next_task(&agent_id, Some(0), tokio_util::sync::CancellationToken::new())
        .await
        .expect("get_next_task");

    assert_eq!(claimed.id, task_id);
    assert_eq!(claimed.status, TaskStatus::InProgress);
    assert_eq!(claimed.agent_id.as_deref(), Some(agent_id.as_str()));
}

#[tokio::test]
async fn two_agents_racing_for_one_task_only_one_wins() {
    let kernel = common::test_kernel().await;

    let agent_a = kernel
        .agents
        .register(NewAgent {
            persona_id: "worker".to_string(),
            working_directory: "/work/a".to_string(),
            model: None,
            worktree_name: None,
        })
        .await
        .expect("register a");
    let agent_b = kernel
        .agents
        .register(NewAgent {
            persona_id: "worker".to_string(),
            working_directory: "/work/b".to_string(),
            model: None,
            worktree_name: None,
        })
        .await
        .expect("register b");

    kernel
        .work_items
        .create("worker", "only one task", None, Priority::Normal)
        .await
        .expect("create task");

    let (a, b) = tokio::join!(
        kernel
            .work_items
            .get_next_task(&agent_a, Some(200), tokio_util::sync::CancellationToken::new()),
        kernel
            .work_items
            .get_next_task(&agent_b, Some(200), tokio_util::sync::CancellationToken::new()),
    );

    let a = a.expect("a result");
    let b = b.expect("b result");

    let real_claims = [&a, &b]
        .into_iter()
        .filter(|t| !coordhive::domain::models::WorkItem::is_requery_sentinel(&t.id))
        .count();
    assert_eq!(real_claims, 1, "exactly one agent should have claimed the only task");
}

#[tokio::test]
async fn get_next_task_with_no_work_returns_requery_sentinel_immediately() {
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

    let result = kernel
        .work_items
        .get_next_task(&agent_id, Some(0), tokio_util::sync::CancellationToken::new())
        .await
        .expect("get_next_task");

    assert!(coordhive::domain::models::WorkItem::is_requery_sentinel(&result.id));
}

#[tokio::test]
async fn report_completion_is_rejected_once_task_is_already_terminal() {
    let kernel = common::test_kernel().await;

    let agent_id = kernel
        .agents
        .register(NewAgent {
            persona_id: "closer".to_string(),
            working_directory: "/work/closer".to_string(),
            model: None,
            worktree_name: None,
        })
        .await
        .expect("register agent");

    kernel
        .work_items
        .create("closer", "finish the thing", None, Priority::High)
        .await
        .expect("create task");

    let task = kernel
        .work_items
        .get_next_task(&agent_id, Some(0), tokio_util::sync::CancellationToken::new())
        .await
        .expect("claim");

    kernel
        .work_items
        .report_completion(&task.id, "done")
        .await
        .expect("first completion succeeds");

    let second = kernel.work_items.report_completion(&task.id, "done again").await;
    assert!(second.is_err(), "completing an already-terminal task must fail");
}

#[tokio::test]
async fn report_completion_succeeds_after_a_prior_failure() {
    let kernel = common::test_kernel().await;

    let agent_id = kernel
        .agents
        .register(NewAgent {
            persona_id: "retrier".to_string(),
            working_directory: "/work/retrier".to_string(),
            model: None,
            worktree_name: None,
        })
        .await
        .expect("register agent");

    kernel
        .work_items
        .create("retrier", "flaky step", None, Priority::Normal)
        .await
        .expect("create task");

    let task = kernel
        .work_items
        .get_next_task(&agent_id, Some(0), tokio_util::sync::CancellationToken::new())
        .await
        .expect("claim");

    kernel
        .work_items
        .report_failure(&task.id, "transient error")
        .await
        .expect("failure report succeeds");

    let failed = kernel
        .work_items
        .get_by_id(&task.id)
        .await
        .expect("query")
        .expect("task exists");
    assert_eq!(failed.status, TaskStatus::Failed);

    kernel
        .work_items
        .report_completion(&task.id, "succeeded on retry")
        .await
        .expect("a Failed task must still be able to transition to Completed");

    let completed = kernel
        .work_items
        .get_by_id(&task.id)
        .await
        .expect("query")
        .expect("task exists");
    assert_eq!(completed.status, TaskStatus::Completed);
    assert_eq!(completed.result.as_deref(), Some("succeeded on retry"));
}

#[tokio::test]
async fn a_created_task_wakes_a_long_polling_agent() {
    let kernel = common::test_kernel().await;

    let agent_id = kernel
        .agents
        .register(NewAgent {
            persona_id: "waiter".to_string(),
            working_directory: "/work/waiter".to_string(),
            model: None,
            worktree_name: None,
        })
        .await
        .expect("register agent");

    let work_items = kernel.work_items.clone();
    let waiting_agent = agent_id.clone();
    let waiter = tokio::spawn(async move {
        work_items
            .get_next_task(&waiting_agent, Some(2_000), tokio_util::sync::CancellationToken::new())
            .await
    });

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    let task_id = kernel
        .work_items
        .create("waiter", "arrives late", None, Priority::Normal)
        .await
        .expect("create task");

    let claimed = tokio::time::timeout(std::time::Duration::from_secs(2), waiter)
        .await
        .expect("waiter did not time out")
        .expect("waiter task panicked")
        .expect("get_next_task result");

    assert_eq!(claimed.id, task_id);
}
