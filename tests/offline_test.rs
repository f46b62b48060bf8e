use eventeye::offline::{FailureOutcome, NewAction, OfflineManager};
use serde_json::json;
use std::time::Duration;
use tempfile::tempdir;

fn put(url: &str) -> NewAction {
    NewAction::json("db_set", "PUT", url, &json!({ "name": "Asha" }))
}

#[test]
fn queued_action_is_retrievable_until_removed() {
    let manager = OfflineManager::in_memory(None);
    let id = manager.queue_action(put("https://db.example/a.json")).unwrap();

    let pending = manager.pending_actions();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, id);
    assert_eq!(pending[0].method, "PUT");
    assert_eq!(pending[0].body.as_deref(), Some(r#"{"name":"Asha"}"#));
    assert!(
        pending[0]
            .headers
            .iter()
            .any(|(k, v)| k.eq_ignore_ascii_case("content-type") && v == "application/json")
    );

    assert!(manager.remove_pending_action(id).unwrap());
    assert!(manager.pending_actions().is_empty());
    assert!(!manager.remove_pending_action(id).unwrap());
}

#[test]
fn failed_replay_keeps_action_and_counts_retries() {
    let manager = OfflineManager::in_memory(None);
    let id = manager.queue_action(put("https://db.example/a.json")).unwrap();

    assert_eq!(manager.record_failure(id, "offline").unwrap(), FailureOutcome::Retained(1));
    assert_eq!(manager.record_failure(id, "offline").unwrap(), FailureOutcome::Retained(2));

    let action = &manager.pending_actions()[0];
    assert_eq!(action.retries, 2);
    assert_eq!(action.last_error.as_deref(), Some("offline"));
    assert_eq!(manager.record_failure(999, "x").unwrap(), FailureOutcome::Missing);
}

#[test]
fn dead_letters_can_be_requeued() {
    let manager = OfflineManager::in_memory(Some(1));
    let id = manager.queue_action(put("https://db.example/a.json")).unwrap();
    assert_eq!(manager.record_failure(id, "500").unwrap(), FailureOutcome::DeadLettered);
    assert!(manager.pending_actions().is_empty());
    assert_eq!(manager.dead_letters().len(), 1);

    assert_eq!(manager.requeue_dead_letters().unwrap(), 1);
    let pending = manager.pending_actions();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].retries, 0);
    assert!(manager.dead_letters().is_empty());
}

#[test]
fn cache_respects_ttl() {
    let manager = OfflineManager::in_memory(None);
    let ttl = Duration::from_secs(10);
    manager
        .cache_data_at("participants:hack", &json!([1, 2]), "participants", ttl, 1_000)
        .unwrap();
    manager
        .cache_data_at("other", &json!("x"), "misc", Duration::from_secs(100), 1_000)
        .unwrap();

    assert_eq!(
        manager.get_cached_data_at("participants:hack", 5_000).unwrap(),
        Some(json!([1, 2]))
    );
    assert_eq!(manager.cleanup_expired_at(20_000).unwrap(), 1);
    assert_eq!(manager.get_cached_data_at("participants:hack", 20_000).unwrap(), None);
    assert_eq!(manager.storage_info().cached_items, 1);
}

#[test]
fn user_actions_are_newest_first_and_limited() {
    let manager = OfflineManager::in_memory(None);
    for i in 0..5 {
        manager
            .store_user_action("admin@x.com", "upload", &json!({ "n": i }))
            .unwrap();
    }
    manager.store_user_action("other@x.com", "upload", &json!({})).unwrap();

    let actions = manager.user_actions("admin@x.com", 3);
    assert_eq!(actions.len(), 3);
    assert_eq!(actions[0].metadata_json()["n"], 4);
    assert_eq!(actions[2].metadata_json()["n"], 2);
    assert_eq!(manager.storage_info().user_actions, 6);
}

#[test]
fn store_survives_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested").join("offline.bin.gz");
    {
        let manager = OfflineManager::open(&path, None).unwrap();
        manager.queue_action(put("https://db.example/a.json")).unwrap();
        manager
            .cache_data("k", &json!({ "v": 1 }), "misc", Duration::from_secs(3600))
            .unwrap();
    }

    let reopened = OfflineManager::open(&path, None).unwrap();
    assert_eq!(reopened.pending_actions().len(), 1);
    assert_eq!(reopened.get_cached_data("k").unwrap(), Some(json!({ "v": 1 })));

    let next = reopened.queue_action(put("https://db.example/b.json")).unwrap();
    assert_eq!(next, 2);
}

#[test]
fn failed_write_leaves_store_unchanged() {
    let dir = tempdir().unwrap();
    let nested = dir.path().join("nested");
    let manager = OfflineManager::open(nested.join("offline.bin.gz"), None).unwrap();
    manager.queue_action(put("https://db.example/a.json")).unwrap();

    std::fs::remove_dir_all(&nested).unwrap();
    assert!(manager.queue_action(put("https://db.example/b.json")).is_err());

    let pending = manager.pending_actions();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].url, "https://db.example/a.json");
}

#[test]
fn corrupt_store_is_reported() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("offline.bin.gz");
    std::fs::write(&path, b"not gzip").unwrap();
    assert!(OfflineManager::open(&path, None).is_err());
}

#[cfg(feature = "web")]
mod replay {
    use super::*;
    use async_trait::async_trait;
    use eventeye::error::{AppError, Result};
    use eventeye::offline::{ActionExecutor, OfflineAction};
    use std::sync::Mutex;

    /// Fails every action whose URL contains "fail"
    #[derive(Default)]
    struct FakeExecutor {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ActionExecutor for FakeExecutor {
        async fn execute(&self, action: &OfflineAction) -> Result<()> {
            self.seen.lock().unwrap().push(action.url.clone());
            if action.url.contains("fail") {
                Err(AppError::Network("connection refused".to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn sync_replays_in_order_and_keeps_failures() {
        let manager = OfflineManager::in_memory(None);
        manager.queue_action(put("https://db.example/1.json")).unwrap();
        manager.queue_action(put("https://db.example/fail.json")).unwrap();
        manager.queue_action(put("https://db.example/3.json")).unwrap();

        let executor = FakeExecutor::default();
        let report = manager.sync_pending(&executor).await.unwrap();

        assert_eq!((report.attempted, report.succeeded, report.failed), (3, 2, 1));
        assert_eq!(
            *executor.seen.lock().unwrap(),
            vec![
                "https://db.example/1.json",
                "https://db.example/fail.json",
                "https://db.example/3.json"
            ]
        );
        let pending = manager.pending_actions();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].retries, 1);
    }

    #[tokio::test]
    async fn sync_dead_letters_at_cutoff() {
        let manager = OfflineManager::in_memory(Some(2));
        manager.queue_action(put("https://db.example/fail.json")).unwrap();
        let executor = FakeExecutor::default();

        let first = manager.sync_pending(&executor).await.unwrap();
        assert_eq!(first.failed, 1);
        let second = manager.sync_pending(&executor).await.unwrap();
        assert_eq!(second.dead_lettered, 1);
        assert_eq!(manager.storage_info().dead_letters, 1);
        assert_eq!(manager.sync_pending(&executor).await.unwrap().attempted, 0);
    }

    /// Counts executions and yields so concurrent passes interleave
    #[derive(Default)]
    struct SlowExecutor {
        calls: Mutex<usize>,
    }

    #[async_trait]
    impl ActionExecutor for SlowExecutor {
        async fn execute(&self, _action: &OfflineAction) -> Result<()> {
            *self.calls.lock().unwrap() += 1;
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn concurrent_syncs_replay_each_action_once() {
        let manager = OfflineManager::in_memory(None);
        manager.queue_action(put("https://db.example/1.json")).unwrap();
        manager.queue_action(put("https://db.example/2.json")).unwrap();

        let executor = SlowExecutor::default();
        let (a, b) = tokio::join!(
            manager.sync_pending(&executor),
            manager.sync_pending(&executor)
        );

        assert_eq!(a.unwrap().succeeded + b.unwrap().succeeded, 2);
        assert_eq!(*executor.calls.lock().unwrap(), 2);
        assert!(manager.pending_actions().is_empty());
    }
}
