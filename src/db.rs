use crate::csv_import::CsvSnapshotRow;
use crate::delivery::{Channel, DeliveryState, DeliveryStats, DeliveryStatus, SendJob};
use crate::error::Result;
use crate::offline::{NewAction, OfflineManager, now_ms};
use crate::participant::{Participant, ParticipantInput, sanitize_key};
use crate::store::DocumentStore;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::sync::Arc;

pub const ROOT: &str = "EventEye";

pub fn participants_path(event_id: &str) -> String {
    format!("{ROOT}/participants/{}", sanitize_key(event_id))
}

pub fn deliveries_path(event_id: &str) -> String {
    format!("{ROOT}/deliveries/{}", sanitize_key(event_id))
}

pub fn send_queue_path(event_id: &str) -> String {
    format!("{ROOT}/queues/certificates/{}", sanitize_key(event_id))
}

/// How a write ended up being handled
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum WriteOutcome {
    /// Stored remotely; `key` is set for pushes
    Written { key: Option<String> },
    /// The store was unreachable and the write was saved for replay
    Queued { action_id: u64 },
}

impl WriteOutcome {
    pub fn is_queued(&self) -> bool {
        matches!(self, WriteOutcome::Queued { .. })
    }
}

/// Public fill-form submission
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub college_reg_no: String,
    #[serde(default)]
    pub college: String,
    #[serde(default)]
    pub event_type: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub submitted_at: i64,
}

/// Data access layer over a [`DocumentStore`]
///
/// With an offline manager attached, writes that fail because the store could
/// not be reached are queued as HTTP actions and reported as
/// [`WriteOutcome::Queued`].
#[derive(Clone)]
pub struct Database {
    store: Arc<dyn DocumentStore>,
    offline: Option<Arc<OfflineManager>>,
}

impl Database {
    pub fn new(store: Arc<dyn DocumentStore>, offline: Option<Arc<OfflineManager>>) -> Self {
        Self { store, offline }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Shareable link to `path`; carries no credentials
    pub fn url_for(&self, path: &str) -> Option<String> {
        self.store.public_url(path)
    }

    fn queue(&self, kind: &str, method: &str, path: &str, value: &Value) -> Option<u64> {
        let offline = self.offline.as_ref()?;
        let url = self.store.rest_url(path)?;
        match offline.queue_action(NewAction::json(kind, method, &url, value)) {
            Ok(id) => {
                warn!("{} unreachable, queued {method} {path} as offline action {id}", self.store.name());
                Some(id)
            }
            Err(e) => {
                warn!("Could not queue offline write to {path}: {e}");
                None
            }
        }
    }

    pub async fn set(&self, path: &str, value: Value) -> Result<WriteOutcome> {
        match self.store.set(path, value.clone()).await {
            Ok(()) => Ok(WriteOutcome::Written { key: None }),
            Err(e) if e.is_network() => match self.queue("db_set", "PUT", path, &value) {
                Some(action_id) => Ok(WriteOutcome::Queued { action_id }),
                None => Err(e),
            },
            Err(e) => Err(e),
        }
    }

    pub async fn push(&self, path: &str, value: Value) -> Result<WriteOutcome> {
        match self.store.push(path, value.clone()).await {
            Ok(key) => Ok(WriteOutcome::Written { key: Some(key) }),
            Err(e) if e.is_network() => match self.queue("db_push", "POST", path, &value) {
                Some(action_id) => Ok(WriteOutcome::Queued { action_id }),
                None => Err(e),
            },
            Err(e) => Err(e),
        }
    }

    pub async fn get(&self, path: &str) -> Result<Option<Value>> {
        self.store.get(path).await
    }

    pub async fn remove(&self, path: &str) -> Result<()> {
        self.store.remove(path).await
    }

    /// Write a marker document to check that the store accepts writes
    pub async fn test_connection(&self) -> Result<WriteOutcome> {
        self.set(
            &format!("{ROOT}/test"),
            json!({
                "message": "Hello from EventEye!",
                "timestamp": now_ms(),
            }),
        )
        .await
    }

    /// Replace the participant list of an event
    ///
    /// # Arguments
    /// * `event_id` - Event key, sanitized before use
    /// * `inputs` - Raw records; each is trimmed and given its derived id
    ///
    /// # Returns
    /// * `Result<(Vec<Participant>, WriteOutcome)>` - The normalized records as written
    pub async fn save_participants(
        &self,
        event_id: &str,
        inputs: &[ParticipantInput],
    ) -> Result<(Vec<Participant>, WriteOutcome)> {
        let now = now_ms();
        let participants: Vec<Participant> = inputs.iter().map(|p| p.normalize(now)).collect();

        let mut map = Map::new();
        for p in &participants {
            map.insert(sanitize_key(&p.id), serde_json::to_value(p)?);
        }

        let outcome = self
            .set(&participants_path(event_id), Value::Object(map))
            .await?;
        info!("Saved {} participants for {event_id}", participants.len());
        Ok((participants, outcome))
    }

    pub async fn update_participant(
        &self,
        event_id: &str,
        input: &ParticipantInput,
    ) -> Result<(Participant, WriteOutcome)> {
        let participant = input.normalize(now_ms());
        let path = format!(
            "{}/{}",
            participants_path(event_id),
            sanitize_key(&participant.id)
        );
        let outcome = self.set(&path, serde_json::to_value(&participant)?).await?;
        Ok((participant, outcome))
    }

    pub async fn list_participants(&self, event_id: &str) -> Result<Vec<Participant>> {
        let Some(Value::Object(map)) = self.get(&participants_path(event_id)).await? else {
            return Ok(Vec::new());
        };
        let mut participants = Vec::with_capacity(map.len());
        for (id, value) in map {
            match serde_json::from_value::<Participant>(value) {
                Ok(p) => participants.push(p),
                Err(e) => warn!("Skipping malformed participant {id}: {e}"),
            }
        }
        Ok(participants)
    }

    pub async fn set_delivery_status(
        &self,
        event_id: &str,
        participant_id: &str,
        status: DeliveryState,
        meta: Value,
    ) -> Result<WriteOutcome> {
        let record = DeliveryStatus {
            status,
            meta,
            updated_at: now_ms(),
        };
        let path = format!(
            "{}/{}",
            deliveries_path(event_id),
            sanitize_key(participant_id)
        );
        self.set(&path, serde_json::to_value(&record)?).await
    }

    pub async fn delivery_statuses(&self, event_id: &str) -> Result<HashMap<String, DeliveryStatus>> {
        let Some(Value::Object(map)) = self.get(&deliveries_path(event_id)).await? else {
            return Ok(HashMap::new());
        };
        let mut statuses = HashMap::with_capacity(map.len());
        for (id, value) in map {
            match serde_json::from_value::<DeliveryStatus>(value) {
                Ok(s) => {
                    statuses.insert(id, s);
                }
                Err(e) => warn!("Skipping malformed delivery status {id}: {e}"),
            }
        }
        Ok(statuses)
    }

    pub async fn delivery_stats(&self, event_id: &str) -> Result<DeliveryStats> {
        Ok(DeliveryStats::from_statuses(
            &self.delivery_statuses(event_id).await?,
        ))
    }

    /// Push a send request onto the event's certificate queue
    pub async fn queue_send_certificate(
        &self,
        event_id: &str,
        participant_id: &str,
        channel: Channel,
        payload: Value,
    ) -> Result<WriteOutcome> {
        let job = SendJob {
            participant_id: participant_id.to_string(),
            channel,
            payload,
            created_at: now_ms(),
            status: DeliveryState::Queued,
        };
        self.push(&send_queue_path(event_id), serde_json::to_value(&job)?)
            .await
    }

    /// Overwrite the `EventEye/CSV` snapshot
    pub async fn save_csv_data(&self, rows: &[CsvSnapshotRow]) -> Result<WriteOutcome> {
        self.set(
            &format!("{ROOT}/CSV"),
            json!({
                "updatedAt": now_ms(),
                "rows": rows,
            }),
        )
        .await
    }

    pub async fn save_registration(&self, form: &Registration) -> Result<WriteOutcome> {
        let mut form = form.clone();
        if form.submitted_at == 0 {
            form.submitted_at = now_ms();
        }
        self.push(
            &format!("{ROOT}/registrations"),
            serde_json::to_value(&form)?,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn db() -> Database {
        Database::new(Arc::new(MemoryStore::new()), None)
    }

    #[tokio::test]
    async fn resaving_same_email_keeps_one_record() {
        let db = db();
        let input = ParticipantInput::named("Asha Rao", "asha@example.com", "");
        db.save_participants("hack", &[input.clone()]).await.unwrap();
        db.update_participant("hack", &input).await.unwrap();

        let list = db.list_participants("hack").await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].id, "email:asha@example_com");
    }

    #[tokio::test]
    async fn stats_cover_all_states() {
        let db = db();
        db.set_delivery_status("e", "a", DeliveryState::Sent, Value::Null)
            .await
            .unwrap();
        db.set_delivery_status("e", "b", DeliveryState::Bounced, Value::Null)
            .await
            .unwrap();
        let stats = db.delivery_stats("e").await.unwrap();
        assert_eq!((stats.sent, stats.bounced, stats.failed), (1, 1, 0));

        let json = serde_json::to_value(stats).unwrap();
        for key in ["queued", "sent", "bounced", "failed", "pending"] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
    }
}
