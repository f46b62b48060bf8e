#![cfg(feature = "web")]

use eventeye::config::FirebaseConfig;
use eventeye::db::{Database, Registration, WriteOutcome};
use eventeye::delivery::{Channel, DeliveryState};
use eventeye::offline::OfflineManager;
use eventeye::participant::ParticipantInput;
use eventeye::store::{DocumentStore, FirebaseStore, MemoryStore};
use serde_json::{Value, json};
use std::sync::Arc;

fn unreachable_firebase() -> Arc<dyn DocumentStore> {
    Arc::new(FirebaseStore::new(
        reqwest::Client::new(),
        &FirebaseConfig {
            // Nothing listens on port 9 locally
            database_url: "http://127.0.0.1:9".to_string(),
            auth_token: None,
        },
    ))
}

#[tokio::test]
async fn participants_round_trip_under_event() {
    let memory = Arc::new(MemoryStore::new());
    let db = Database::new(memory.clone(), None);
    let inputs = vec![
        ParticipantInput::named("Asha Rao", "asha@example.com", ""),
        ParticipantInput::named("Ravi Kumar", "", "555"),
    ];

    let (saved, outcome) = db.save_participants("Hack.2025", &inputs).await.unwrap();
    assert_eq!(outcome, WriteOutcome::Written { key: None });
    assert_eq!(saved.len(), 2);

    let snapshot = memory.snapshot();
    assert!(snapshot["EventEye"]["participants"]["Hack_2025"]["phone:555"].is_object());

    let mut listed = db.list_participants("Hack.2025").await.unwrap();
    listed.sort_by(|a, b| a.name.cmp(&b.name));
    assert_eq!(listed[0].name, "Asha Rao");
    assert_eq!(listed[1].id, "phone:555");
    assert!(db.list_participants("other").await.unwrap().is_empty());
}

#[tokio::test]
async fn supplied_ids_are_sanitized_into_one_key() {
    let memory = Arc::new(MemoryStore::new());
    let db = Database::new(memory.clone(), None);
    let input = ParticipantInput {
        id: Some("team/1.a".to_string()),
        ..ParticipantInput::named("Asha Rao", "asha@example.com", "")
    };

    db.save_participants("hack", &[input.clone()]).await.unwrap();
    db.update_participant("hack", &input).await.unwrap();

    let snapshot = memory.snapshot();
    let event = snapshot["EventEye"]["participants"]["hack"].as_object().unwrap();
    assert_eq!(event.keys().collect::<Vec<_>>(), vec!["team_1_a"]);

    let listed = db.list_participants("hack").await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, "team/1.a");
}

#[tokio::test]
async fn queue_and_registrations_are_pushed() {
    let memory = Arc::new(MemoryStore::new());
    let db = Database::new(memory.clone(), None);

    let outcome = db
        .queue_send_certificate("hack", "email:a@x_com", Channel::Email, json!({ "templateId": 2 }))
        .await
        .unwrap();
    let WriteOutcome::Written { key: Some(key) } = outcome else {
        panic!("expected a pushed key");
    };
    let snapshot = memory.snapshot();
    let job = &snapshot["EventEye"]["queues"]["certificates"]["hack"][&key];
    assert_eq!(job["participantId"], "email:a@x_com");
    assert_eq!(job["status"], "queued");

    db.save_registration(&Registration {
        name: "Asha".to_string(),
        email: "asha@example.com".to_string(),
        ..Registration::default()
    })
    .await
    .unwrap();
    let regs = memory.snapshot()["EventEye"]["registrations"].clone();
    let first = regs.as_object().unwrap().values().next().unwrap().clone();
    assert!(first["submittedAt"].as_i64().unwrap() > 0);
}

#[tokio::test]
async fn delivery_status_overwrites_previous_state() {
    let db = Database::new(Arc::new(MemoryStore::new()), None);
    db.set_delivery_status("e", "p1", DeliveryState::Queued, Value::Null)
        .await
        .unwrap();
    db.set_delivery_status("e", "p1", DeliveryState::Sent, json!({ "certificateId": "CERT-1" }))
        .await
        .unwrap();

    let statuses = db.delivery_statuses("e").await.unwrap();
    assert_eq!(statuses.len(), 1);
    assert_eq!(statuses["p1"].status, DeliveryState::Sent);
    assert_eq!(db.delivery_stats("e").await.unwrap().sent, 1);
}

#[tokio::test]
async fn unreachable_store_queues_writes_offline() {
    let offline = Arc::new(OfflineManager::in_memory(None));
    let db = Database::new(unreachable_firebase(), Some(offline.clone()));

    let outcome = db.test_connection().await.unwrap();
    assert!(outcome.is_queued());
    let outcome = db.push("EventEye/registrations", json!({ "name": "Asha" })).await.unwrap();
    assert!(outcome.is_queued());

    let pending = offline.pending_actions();
    assert_eq!(pending.len(), 2);
    assert_eq!(pending[0].method, "PUT");
    assert_eq!(pending[0].url, "http://127.0.0.1:9/EventEye/test.json");
    assert_eq!(pending[1].kind, "db_push");
}

#[tokio::test]
async fn unreachable_store_without_queue_fails() {
    let db = Database::new(unreachable_firebase(), None);
    let err = db.test_connection().await.unwrap_err();
    assert!(err.is_network());
}
