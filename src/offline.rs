//! Local offline store.
//!
//! Holds outbound actions that could not be delivered, a small expiring cache,
//! a per-user action log and the actions that exhausted their retries. The whole
//! store is kept in memory and written back to one gzip-compressed bincode file
//! after every mutation.

use crate::error::{AppError, Result};
use bincode::{deserialize_from, serialize_into};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

#[cfg(feature = "web")]
use async_trait::async_trait;
#[cfg(feature = "web")]
use std::sync::Arc;

pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// An HTTP request waiting to be replayed
///
/// JSON bodies are stored as text; bincode cannot encode `serde_json::Value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfflineAction {
    pub id: u64,
    pub kind: String,
    pub url: String,
    pub method: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
    pub timestamp: i64,
    pub retries: u32,
    pub last_error: Option<String>,
}

/// Fields supplied when queueing an action; the store assigns the rest
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewAction {
    pub kind: String,
    pub url: String,
    pub method: String,
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    #[serde(default)]
    pub body: Option<String>,
}

impl NewAction {
    /// A JSON request, e.g. a queued database write
    pub fn json(kind: &str, method: &str, url: &str, body: &Value) -> Self {
        Self {
            kind: kind.to_string(),
            url: url.to_string(),
            method: method.to_string(),
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            body: Some(body.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub data: String,
    pub kind: String,
    pub timestamp: i64,
    pub ttl_ms: i64,
    pub expires_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserAction {
    pub id: u64,
    pub user_id: String,
    pub action: String,
    pub metadata: String,
    pub timestamp: i64,
}

impl UserAction {
    pub fn metadata_json(&self) -> Value {
        serde_json::from_str(&self.metadata).unwrap_or(Value::Null)
    }
}

/// Entry counts of each local store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageInfo {
    pub pending_actions: usize,
    pub cached_items: usize,
    pub user_actions: usize,
    pub dead_letters: usize,
}

/// What happened to an action after a failed replay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    /// Still queued with this many failed attempts
    Retained(u32),
    DeadLettered,
    Missing,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct OfflineData {
    next_action_id: u64,
    next_user_action_id: u64,
    actions: BTreeMap<u64, OfflineAction>,
    cache: HashMap<String, CacheEntry>,
    user_actions: Vec<UserAction>,
    dead_letters: Vec<OfflineAction>,
}

pub struct OfflineManager {
    path: Option<PathBuf>,
    max_retries: Option<u32>,
    data: Mutex<OfflineData>,
    /// Held for the whole of a replay pass
    #[cfg(feature = "web")]
    sync_lock: tokio::sync::Mutex<()>,
}

impl OfflineManager {
    /// Open (or create) the store file at `path`
    ///
    /// # Arguments
    /// * `path` - Location of the compressed store file
    /// * `max_retries` - Failed replays after which an action is dead-lettered; `None` never gives up
    pub fn open(path: impl AsRef<Path>, max_retries: Option<u32>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let data = if path.exists() {
            let data = load(&path)?;
            info!(
                "Opened offline store {} ({} pending actions)",
                path.display(),
                data.actions.len()
            );
            data
        } else {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            OfflineData::default()
        };
        Ok(Self {
            path: Some(path),
            max_retries,
            data: Mutex::new(data),
            #[cfg(feature = "web")]
            sync_lock: tokio::sync::Mutex::new(()),
        })
    }

    /// A store that is never written to disk
    pub fn in_memory(max_retries: Option<u32>) -> Self {
        Self {
            path: None,
            max_retries,
            data: Mutex::new(OfflineData::default()),
            #[cfg(feature = "web")]
            sync_lock: tokio::sync::Mutex::new(()),
        }
    }

    // The change only becomes visible once it is on disk
    fn mutate<T>(&self, f: impl FnOnce(&mut OfflineData) -> T) -> Result<T> {
        let mut data = self.data.lock().unwrap();
        let Some(path) = &self.path else {
            return Ok(f(&mut data));
        };
        let mut next = data.clone();
        let out = f(&mut next);
        save(&next, path)?;
        *data = next;
        Ok(out)
    }

    pub fn queue_action(&self, action: NewAction) -> Result<u64> {
        let id = self.mutate(|d| {
            d.next_action_id += 1;
            let id = d.next_action_id;
            d.actions.insert(
                id,
                OfflineAction {
                    id,
                    kind: action.kind,
                    url: action.url,
                    method: action.method,
                    headers: action.headers,
                    body: action.body,
                    timestamp: now_ms(),
                    retries: 0,
                    last_error: None,
                },
            );
            id
        })?;
        debug!("Queued offline action {id}");
        Ok(id)
    }

    /// Queued actions, oldest first
    pub fn pending_actions(&self) -> Vec<OfflineAction> {
        self.data.lock().unwrap().actions.values().cloned().collect()
    }

    pub fn remove_pending_action(&self, id: u64) -> Result<bool> {
        self.mutate(|d| d.actions.remove(&id).is_some())
    }

    /// Count a failed replay; moves the action to the dead letters once the cutoff is reached
    pub fn record_failure(&self, id: u64, error: &str) -> Result<FailureOutcome> {
        let max = self.max_retries;
        self.mutate(|d| {
            let Some(action) = d.actions.get_mut(&id) else {
                return FailureOutcome::Missing;
            };
            action.retries += 1;
            action.last_error = Some(error.to_string());
            let retries = action.retries;
            match max {
                Some(limit) if retries >= limit => {
                    if let Some(action) = d.actions.remove(&id) {
                        d.dead_letters.push(action);
                    }
                    FailureOutcome::DeadLettered
                }
                _ => FailureOutcome::Retained(retries),
            }
        })
    }

    pub fn dead_letters(&self) -> Vec<OfflineAction> {
        self.data.lock().unwrap().dead_letters.clone()
    }

    /// Put every dead-lettered action back in the queue with its retry count reset
    pub fn requeue_dead_letters(&self) -> Result<usize> {
        self.mutate(|d| {
            let letters = std::mem::take(&mut d.dead_letters);
            let count = letters.len();
            for mut action in letters {
                action.retries = 0;
                d.actions.insert(action.id, action);
            }
            count
        })
    }

    pub fn cache_data(&self, key: &str, data: &Value, kind: &str, ttl: Duration) -> Result<()> {
        self.cache_data_at(key, data, kind, ttl, now_ms())
    }

    pub fn cache_data_at(
        &self,
        key: &str,
        data: &Value,
        kind: &str,
        ttl: Duration,
        now: i64,
    ) -> Result<()> {
        let ttl_ms = ttl.as_millis() as i64;
        self.mutate(|d| {
            d.cache.insert(
                key.to_string(),
                CacheEntry {
                    key: key.to_string(),
                    data: data.to_string(),
                    kind: kind.to_string(),
                    timestamp: now,
                    ttl_ms,
                    expires_at: now + ttl_ms,
                },
            );
        })
    }

    /// Cached value for `key`; an expired entry is dropped and reads as absent
    pub fn get_cached_data(&self, key: &str) -> Result<Option<Value>> {
        self.get_cached_data_at(key, now_ms())
    }

    pub fn get_cached_data_at(&self, key: &str, now: i64) -> Result<Option<Value>> {
        let entry = self.data.lock().unwrap().cache.get(key).cloned();
        match entry {
            None => Ok(None),
            Some(entry) if entry.expires_at <= now => {
                self.remove_cached_data(key)?;
                Ok(None)
            }
            Some(entry) => Ok(Some(serde_json::from_str(&entry.data)?)),
        }
    }

    pub fn remove_cached_data(&self, key: &str) -> Result<bool> {
        self.mutate(|d| d.cache.remove(key).is_some())
    }

    pub fn store_user_action(&self, user_id: &str, action: &str, metadata: &Value) -> Result<u64> {
        self.mutate(|d| {
            d.next_user_action_id += 1;
            let id = d.next_user_action_id;
            d.user_actions.push(UserAction {
                id,
                user_id: user_id.to_string(),
                action: action.to_string(),
                metadata: metadata.to_string(),
                timestamp: now_ms(),
            });
            id
        })
    }

    /// Up to `limit` actions of one user, newest first
    pub fn user_actions(&self, user_id: &str, limit: usize) -> Vec<UserAction> {
        let data = self.data.lock().unwrap();
        let mut actions: Vec<UserAction> = data
            .user_actions
            .iter()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect();
        actions.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        actions.truncate(limit);
        actions
    }

    /// Drop every expired cache entry, returning how many were removed
    pub fn cleanup_expired(&self) -> Result<usize> {
        self.cleanup_expired_at(now_ms())
    }

    pub fn cleanup_expired_at(&self, now: i64) -> Result<usize> {
        let removed = self.mutate(|d| {
            let before = d.cache.len();
            d.cache.retain(|_, e| e.expires_at > now);
            before - d.cache.len()
        })?;
        if removed > 0 {
            info!("Removed {removed} expired cache entries");
        }
        Ok(removed)
    }

    pub fn storage_info(&self) -> StorageInfo {
        let d = self.data.lock().unwrap();
        StorageInfo {
            pending_actions: d.actions.len(),
            cached_items: d.cache.len(),
            user_actions: d.user_actions.len(),
            dead_letters: d.dead_letters.len(),
        }
    }
}

fn load(path: &Path) -> Result<OfflineData> {
    let file = File::open(path)?;
    let decoder = GzDecoder::new(file);
    let mut reader = BufReader::new(decoder);

    deserialize_from(&mut reader)
        .map_err(|e| AppError::Storage(format!("Corrupt offline store {}: {e}", path.display())))
}

fn save(data: &OfflineData, path: &Path) -> Result<()> {
    // Write beside the target, then rename over it
    let tmp = path.with_extension("tmp");
    let file = File::create(&tmp)?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut writer = BufWriter::new(encoder);

    serialize_into(&mut writer, data).map_err(|e| AppError::Storage(e.to_string()))?;
    writer.flush()?;
    let encoder = writer
        .into_inner()
        .map_err(|e| AppError::Storage(e.to_string()))?;
    encoder.finish()?;

    fs::rename(&tmp, path)?;
    Ok(())
}

/// Performs the HTTP request stored in an [`OfflineAction`]
#[cfg(feature = "web")]
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    async fn execute(&self, action: &OfflineAction) -> Result<()>;
}

#[cfg(feature = "web")]
pub struct HttpExecutor {
    client: reqwest::Client,
}

#[cfg(feature = "web")]
impl HttpExecutor {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[cfg(feature = "web")]
#[async_trait]
impl ActionExecutor for HttpExecutor {
    async fn execute(&self, action: &OfflineAction) -> Result<()> {
        let method = reqwest::Method::from_bytes(action.method.as_bytes())
            .map_err(|_| AppError::InvalidInput(format!("Bad HTTP method {}", action.method)))?;
        let mut request = self.client.request(method, &action.url);
        for (name, value) in &action.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &action.body {
            request = request.body(body.clone());
        }
        request.send().await?.error_for_status()?;
        Ok(())
    }
}

/// Result of one replay pass
#[cfg(feature = "web")]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub dead_lettered: usize,
}

#[cfg(feature = "web")]
impl OfflineManager {
    /// Replay every pending action in queue order
    ///
    /// A successful action is removed; a failed one stays queued with its retry
    /// count bumped. One failure does not stop the pass. Concurrent calls run
    /// one after another, so an action is never replayed twice.
    pub async fn sync_pending(&self, executor: &dyn ActionExecutor) -> Result<SyncReport> {
        let _pass = self.sync_lock.lock().await;
        let mut report = SyncReport::default();
        for action in self.pending_actions() {
            report.attempted += 1;
            match executor.execute(&action).await {
                Ok(()) => {
                    self.remove_pending_action(action.id)?;
                    report.succeeded += 1;
                }
                Err(e) => {
                    warn!("Offline action {} ({}) failed: {e}", action.id, action.kind);
                    match self.record_failure(action.id, &e.to_string())? {
                        FailureOutcome::DeadLettered => report.dead_lettered += 1,
                        _ => report.failed += 1,
                    }
                }
            }
        }
        if report.attempted > 0 {
            info!(
                "Offline sync: {} replayed, {} failed, {} dead-lettered",
                report.succeeded, report.failed, report.dead_lettered
            );
        }
        Ok(report)
    }
}

/// Replay the queue every `interval` until the runtime shuts down
#[cfg(feature = "web")]
pub fn spawn_background_sync(
    manager: Arc<OfflineManager>,
    executor: Arc<dyn ActionExecutor>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(e) = manager.sync_pending(executor.as_ref()).await {
                warn!("Background sync failed: {e}");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn expired_entries_read_as_absent() {
        let store = OfflineManager::in_memory(None);
        store
            .cache_data_at("k", &json!({"a": 1}), "participants", Duration::from_secs(10), 1_000)
            .unwrap();
        assert_eq!(store.get_cached_data_at("k", 5_000).unwrap(), Some(json!({"a": 1})));
        assert_eq!(store.get_cached_data_at("k", 11_000).unwrap(), None);
        assert_eq!(store.storage_info().cached_items, 0);
    }

    #[test]
    fn cutoff_moves_action_to_dead_letters() {
        let store = OfflineManager::in_memory(Some(2));
        let id = store.queue_action(NewAction::default()).unwrap();
        assert_eq!(store.record_failure(id, "boom").unwrap(), FailureOutcome::Retained(1));
        assert_eq!(store.record_failure(id, "boom").unwrap(), FailureOutcome::DeadLettered);
        assert!(store.pending_actions().is_empty());
        assert_eq!(store.dead_letters()[0].last_error.as_deref(), Some("boom"));

        assert_eq!(store.requeue_dead_letters().unwrap(), 1);
        assert_eq!(store.pending_actions()[0].retries, 0);
    }
}
