//! Hierarchical JSON document stores.
//!
//! Paths are `/`-separated keys into one JSON tree, the model of the Firebase
//! Realtime Database. [`FirebaseStore`] talks to the real service over REST;
//! [`MemoryStore`] and [`FileStore`] keep the tree locally for tests and for
//! running without a Firebase project.

use crate::config::FirebaseConfig;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use log::{debug, info};
use rand::Rng;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Replace the value at `path`; writing `null` removes it
    async fn set(&self, path: &str, value: Value) -> Result<()>;

    /// Value at `path`, or `None` when nothing is stored there
    async fn get(&self, path: &str) -> Result<Option<Value>>;

    async fn remove(&self, path: &str) -> Result<()>;

    /// Store `value` under a new generated child key of `path` and return the key
    async fn push(&self, path: &str, value: Value) -> Result<String>;

    /// REST endpoint of `path` including credentials, when the store has one
    ///
    /// Only for replaying queued writes; never hand it to users.
    fn rest_url(&self, _path: &str) -> Option<String> {
        None
    }

    /// Credential-free link to `path`, safe to store and share
    fn public_url(&self, _path: &str) -> Option<String> {
        None
    }

    fn name(&self) -> &'static str;
}

fn segments(path: &str) -> Result<Vec<&str>> {
    let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if parts.is_empty() {
        return Err(AppError::InvalidInput("Empty database path".to_string()));
    }
    Ok(parts)
}

const PUSH_CHARS: &[u8] = b"-0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ_abcdefghijklmnopqrstuvwxyz";

lazy_static::lazy_static! {
    static ref LAST_PUSH: Mutex<(i64, [u8; 12])> = Mutex::new((0, [0; 12]));
}

/// Generate a 20-character push key that sorts by creation time
///
/// Keys created within the same millisecond stay ordered by incrementing the
/// random suffix of the previous key.
pub fn push_key(now_ms: i64) -> String {
    let mut last = LAST_PUSH.lock().unwrap();
    let mut rand_part = [0u8; 12];
    if now_ms == last.0 {
        rand_part = last.1;
        for i in (0..12).rev() {
            if rand_part[i] == 63 {
                rand_part[i] = 0;
            } else {
                rand_part[i] += 1;
                break;
            }
        }
    } else {
        let mut rng = rand::thread_rng();
        for slot in rand_part.iter_mut() {
            *slot = rng.gen_range(0..64);
        }
    }
    *last = (now_ms, rand_part);

    let mut time_part = [0u8; 8];
    let mut t = now_ms.max(0) as u64;
    for slot in time_part.iter_mut().rev() {
        *slot = PUSH_CHARS[(t % 64) as usize];
        t /= 64;
    }

    time_part
        .iter()
        .map(|&c| c as char)
        .chain(rand_part.iter().map(|&i| PUSH_CHARS[i as usize] as char))
        .collect()
}

/// In-process JSON tree
pub struct MemoryStore {
    root: RwLock<Value>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            root: RwLock::new(Value::Object(Map::new())),
        }
    }

    pub fn with_root(root: Value) -> Self {
        Self {
            root: RwLock::new(root),
        }
    }

    /// Copy of the whole tree
    pub fn snapshot(&self) -> Value {
        self.root.read().unwrap().clone()
    }

    fn set_sync(&self, path: &str, value: Value) -> Result<()> {
        let parts = segments(path)?;
        let mut root = self.root.write().unwrap();
        if value.is_null() {
            remove_at(&mut root, &parts);
        } else {
            insert_at(&mut root, &parts, value);
        }
        Ok(())
    }

    fn get_sync(&self, path: &str) -> Result<Option<Value>> {
        let parts = segments(path)?;
        let root = self.root.read().unwrap();
        let mut node = &*root;
        for part in parts {
            match node.get(part) {
                Some(child) => node = child,
                None => return Ok(None),
            }
        }
        Ok(Some(node.clone()))
    }
}

fn insert_at(node: &mut Value, parts: &[&str], value: Value) {
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    if let Value::Object(map) = node {
        match parts {
            [leaf] => {
                map.insert(leaf.to_string(), value);
            }
            [head, rest @ ..] => {
                let child = map.entry(head.to_string()).or_insert(Value::Null);
                insert_at(child, rest, value);
            }
            [] => {}
        }
    }
}

// Remove the leaf and prune parents left empty
fn remove_at(node: &mut Value, parts: &[&str]) -> bool {
    let Some(map) = node.as_object_mut() else {
        return false;
    };
    if parts.len() == 1 {
        map.remove(parts[0]);
    } else if let Some(child) = map.get_mut(parts[0]) {
        if remove_at(child, &parts[1..]) {
            map.remove(parts[0]);
        }
    }
    map.is_empty()
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn set(&self, path: &str, value: Value) -> Result<()> {
        self.set_sync(path, value)
    }

    async fn get(&self, path: &str) -> Result<Option<Value>> {
        self.get_sync(path)
    }

    async fn remove(&self, path: &str) -> Result<()> {
        self.set_sync(path, Value::Null)
    }

    async fn push(&self, path: &str, value: Value) -> Result<String> {
        let key = push_key(chrono::Utc::now().timestamp_millis());
        self.set_sync(&format!("{path}/{key}"), value)?;
        Ok(key)
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// JSON tree persisted to a single file after every write
pub struct FileStore {
    path: PathBuf,
    tree: MemoryStore,
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let root = if path.exists() {
            let text = std::fs::read_to_string(&path)?;
            if text.trim().is_empty() {
                Value::Object(Map::new())
            } else {
                serde_json::from_str(&text)?
            }
        } else {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            Value::Object(Map::new())
        };
        info!("Using local document store at {}", path.display());
        Ok(Self {
            path,
            tree: MemoryStore::with_root(root),
            write_lock: Mutex::new(()),
        })
    }

    // Apply to a copy, write it out, then swap it in
    fn commit(&self, path: &str, value: Value) -> Result<()> {
        let parts = segments(path)?;
        let _guard = self.write_lock.lock().unwrap();
        let mut next = self.tree.snapshot();
        if value.is_null() {
            remove_at(&mut next, &parts);
        } else {
            insert_at(&mut next, &parts, value);
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(&next)?)?;
        *self.tree.root.write().unwrap() = next;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for FileStore {
    async fn set(&self, path: &str, value: Value) -> Result<()> {
        self.commit(path, value)
    }

    async fn get(&self, path: &str) -> Result<Option<Value>> {
        self.tree.get_sync(path)
    }

    async fn remove(&self, path: &str) -> Result<()> {
        self.commit(path, Value::Null)
    }

    async fn push(&self, path: &str, value: Value) -> Result<String> {
        let key = push_key(chrono::Utc::now().timestamp_millis());
        self.commit(&format!("{path}/{key}"), value)?;
        Ok(key)
    }

    fn name(&self) -> &'static str {
        "file"
    }
}

/// Firebase Realtime Database over its REST API
pub struct FirebaseStore {
    client: reqwest::Client,
    base_url: String,
    auth_token: Option<String>,
}

impl FirebaseStore {
    pub fn new(client: reqwest::Client, config: &FirebaseConfig) -> Self {
        Self {
            client,
            base_url: config.database_url.trim_end_matches('/').to_string(),
            auth_token: config.auth_token.clone(),
        }
    }

    fn public(&self, path: &str) -> String {
        format!("{}/{}.json", self.base_url, path.trim_matches('/'))
    }

    fn url(&self, path: &str) -> String {
        match &self.auth_token {
            Some(token) => format!("{}?auth={}", self.public(path), urlencoding::encode(token)),
            None => self.public(path),
        }
    }
}

async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        let body = response.text().await.unwrap_or_default();
        Err(AppError::Remote {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl DocumentStore for FirebaseStore {
    async fn set(&self, path: &str, value: Value) -> Result<()> {
        segments(path)?;
        debug!("PUT {path}");
        let response = self.client.put(self.url(path)).json(&value).send().await?;
        check(response).await?;
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Option<Value>> {
        segments(path)?;
        let response = self.client.get(self.url(path)).send().await?;
        let value: Value = check(response).await?.json().await?;
        Ok(if value.is_null() { None } else { Some(value) })
    }

    async fn remove(&self, path: &str) -> Result<()> {
        segments(path)?;
        debug!("DELETE {path}");
        let response = self.client.delete(self.url(path)).send().await?;
        check(response).await?;
        Ok(())
    }

    async fn push(&self, path: &str, value: Value) -> Result<String> {
        segments(path)?;
        debug!("POST {path}");
        let response = self.client.post(self.url(path)).json(&value).send().await?;
        let body: Value = check(response).await?.json().await?;
        body.get("name")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| AppError::Storage("Push response carried no key".to_string()))
    }

    fn rest_url(&self, path: &str) -> Option<String> {
        Some(self.url(path))
    }

    fn public_url(&self, path: &str) -> Option<String> {
        Some(self.public(path))
    }

    fn name(&self) -> &'static str {
        "firebase"
    }
}
