//! Namespaced memory store round-trips.

mod common;

#[tokio::test]
async fn save_then_read_round_trips_and_touches_last_accessed() {
    let kernel = common::test_kernel().await;

    let saved = kernel
        .memory
        .save("project-goal", "ship the coordination kernel", None, None, None)
        .await
        .expect("save");
    assert!(saved.last_accessed_at.is_none());

    let read = kernel
        .memory
        .read("project-goal", None)
        .await
        .expect("read")
        .expect("entry exists");
    assert_eq!(read.value, "ship the coordination kernel");
    assert!(read.last_accessed_at.is_some());
}

#[tokio::test]
async fn save_is_an_upsert_on_namespace_and_key() {
    let kernel = common::test_kernel().await;

    kernel
        .memory
        .save("k", "v1", Some("scratch"), None, None)
        .await
        .expect("first save");
    let updated = kernel
        .memory
        .save("k", "v2", Some("scratch"), None, None)
        .await
        .expect("second save");

    assert_eq!(updated.value, "v2");

    let entries_in_other_namespace = kernel.memory.read("k", None).await.expect("read default namespace");
    assert!(
        entries_in_other_namespace.is_none(),
        "a key saved under one namespace must not leak into another"
    );
}

#[tokio::test]
async fn delete_removes_the_entry_and_reports_whether_one_existed() {
    let kernel = common::test_kernel().await;

    let missing = kernel.memory.delete("never-saved", None).await.expect("delete");
    assert!(!missing);

    kernel.memory.save("temp", "value", None, None, None).await.expect("save");
    let removed = kernel.memory.delete("temp", None).await.expect("delete");
    assert!(removed);

    let gone = kernel.memory.read("temp", None).await.expect("read");
    assert!(gone.is_none());
}
