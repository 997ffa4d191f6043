//! In-process document store.
//!
//! Used for local development, demo deployments and tests. Collections keep
//! insertion order. Every write publishes the changed collection path on a
//! broadcast channel; each watch re-reads its collection when it sees its own
//! path go by.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde_json::{Map, Value};
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use condot_core::{
    CollectionPath, CollectionStream, Document, DocumentPath, DocumentStore, DocumentStream, Error,
    Result,
};

const CHANGE_CHANNEL_CAPACITY: usize = 128;

struct Inner {
    collections: Mutex<HashMap<String, Vec<Document>>>,
    denied: Mutex<Vec<String>>,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
    changes: broadcast::Sender<String>,
}

impl Inner {
    fn lock_collections(&self) -> MutexGuard<'_, HashMap<String, Vec<Document>>> {
        match self.collections.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn is_denied(&self, path: &str) -> bool {
        let denied = match self.denied.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        denied.iter().any(|prefix| path.starts_with(prefix.as_str()))
    }

    fn snapshot(&self, collection: &str) -> Vec<Document> {
        self.lock_collections()
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    fn find(&self, path: &DocumentPath) -> Option<Document> {
        self.lock_collections()
            .get(path.collection().as_str())
            .and_then(|docs| docs.iter().find(|d| d.id == path.id()).cloned())
    }

    fn check_write(&self, collection: &str) -> Result<()> {
        if self.is_denied(collection) {
            return Err(Error::PermissionDenied(collection.to_string()));
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::Store(format!("write to {} failed", collection)));
        }
        Ok(())
    }

    fn publish(&self, collection: &str) {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let _ = self.changes.send(collection.to_string());
    }
}

/// Document store kept entirely in memory.
///
/// Cloning shares the underlying data.
#[derive(Clone)]
pub struct MemoryDocumentStore {
    inner: Arc<Inner>,
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                collections: Mutex::new(HashMap::new()),
                denied: Mutex::new(Vec::new()),
                fail_writes: AtomicBool::new(false),
                writes: AtomicUsize::new(0),
                changes,
            }),
        }
    }

    /// Deny access to every path starting with `prefix`.
    ///
    /// Open watches under the prefix receive `PermissionDenied` and end;
    /// later watches and writes fail the same way.
    pub fn deny(&self, prefix: impl Into<String>) {
        let prefix = prefix.into();
        match self.inner.denied.lock() {
            Ok(mut denied) => denied.push(prefix.clone()),
            Err(poisoned) => poisoned.into_inner().push(prefix.clone()),
        }
        let _ = self.inner.changes.send(prefix);
    }

    /// Make every write fail with a store error until switched back off.
    pub fn fail_writes(&self, fail: bool) {
        self.inner.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful writes so far.
    pub fn write_count(&self) -> usize {
        self.inner.writes.load(Ordering::SeqCst)
    }

    /// Current documents of a collection.
    pub fn documents(&self, path: &CollectionPath) -> Vec<Document> {
        self.inner.snapshot(path.as_str())
    }

    /// Write a document directly under a chosen id, bypassing failure switches.
    pub fn insert(&self, path: &DocumentPath, data: Value) {
        let collection = path.collection().as_str().to_string();
        {
            let mut collections = self.inner.lock_collections();
            let docs = collections.entry(collection.clone()).or_default();
            match docs.iter_mut().find(|d| d.id == path.id()) {
                Some(doc) => doc.data = data,
                None => docs.push(Document::new(path.id(), data)),
            }
        }
        self.inner.publish(&collection);
    }
}

enum WatchPhase {
    Initial,
    Listening,
    Done,
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn watch_collection(&self, path: &CollectionPath) -> Result<CollectionStream> {
        let inner = self.inner.clone();
        let key = path.as_str().to_string();
        let rx = inner.changes.subscribe();

        debug!(
            subsystem = "store",
            component = "memory",
            collection = %key,
            "Opening collection watch"
        );

        let stream = stream::unfold(
            (inner, key, rx, WatchPhase::Initial),
            |(inner, key, mut rx, phase)| async move {
                match phase {
                    WatchPhase::Done => None,
                    WatchPhase::Initial => {
                        if inner.is_denied(&key) {
                            let err = Error::PermissionDenied(key.clone());
                            return Some((Err(err), (inner, key, rx, WatchPhase::Done)));
                        }
                        let snapshot = inner.snapshot(&key);
                        Some((Ok(snapshot), (inner, key, rx, WatchPhase::Listening)))
                    }
                    WatchPhase::Listening => loop {
                        let changed = match rx.recv().await {
                            Ok(changed) => changed,
                            // Missed notifications: re-read to catch up.
                            Err(broadcast::error::RecvError::Lagged(_)) => key.clone(),
                            Err(broadcast::error::RecvError::Closed) => return None,
                        };
                        if inner.is_denied(&key) {
                            let err = Error::PermissionDenied(key.clone());
                            return Some((Err(err), (inner, key, rx, WatchPhase::Done)));
                        }
                        if changed == key {
                            let snapshot = inner.snapshot(&key);
                            return Some((Ok(snapshot), (inner, key, rx, WatchPhase::Listening)));
                        }
                    },
                }
            },
        );
        Ok(stream.boxed())
    }

    async fn watch_document(&self, path: &DocumentPath) -> Result<DocumentStream> {
        let inner = self.inner.clone();
        let path = path.clone();
        let rx = inner.changes.subscribe();

        // Last delivered value; unchanged documents are not re-sent.
        let last: Option<Option<Document>> = None;
        let stream = stream::unfold(
            (inner, path, rx, last, false),
            |(inner, path, mut rx, last, done)| async move {
                if done {
                    return None;
                }
                let key = path.collection().as_str().to_string();
                if last.is_none() {
                    if inner.is_denied(&key) {
                        let err = Error::PermissionDenied(path.to_string());
                        return Some((Err(err), (inner, path, rx, last, true)));
                    }
                    let current = inner.find(&path);
                    return Some((Ok(current.clone()), (inner, path, rx, Some(current), false)));
                }
                loop {
                    let changed = match rx.recv().await {
                        Ok(changed) => changed,
                        Err(broadcast::error::RecvError::Lagged(_)) => key.clone(),
                        Err(broadcast::error::RecvError::Closed) => return None,
                    };
                    if inner.is_denied(&key) {
                        let err = Error::PermissionDenied(path.to_string());
                        return Some((Err(err), (inner, path, rx, last, true)));
                    }
                    if changed != key {
                        continue;
                    }
                    let current = inner.find(&path);
                    if last.as_ref() != Some(&current) {
                        return Some((Ok(current.clone()), (inner, path, rx, Some(current), false)));
                    }
                }
            },
        );
        Ok(stream.boxed())
    }

    async fn add_document(
        &self,
        path: &CollectionPath,
        mut data: Value,
        server_timestamp_field: Option<&str>,
    ) -> Result<String> {
        self.inner.check_write(path.as_str())?;

        if let (Some(field), Value::Object(map)) = (server_timestamp_field, &mut data) {
            map.insert(field.to_string(), Value::String(Utc::now().to_rfc3339()));
        }
        let id = Uuid::now_v7().simple().to_string();
        self.inner
            .lock_collections()
            .entry(path.as_str().to_string())
            .or_default()
            .push(Document::new(id.clone(), data));
        self.inner.publish(path.as_str());
        Ok(id)
    }

    async fn set_document_merge(&self, path: &DocumentPath, data: Value) -> Result<()> {
        let collection = path.collection().as_str();
        self.inner.check_write(collection)?;
        {
            let mut collections = self.inner.lock_collections();
            let docs = collections.entry(collection.to_string()).or_default();
            match docs.iter_mut().find(|d| d.id == path.id()) {
                Some(doc) => merge_shallow(&mut doc.data, data),
                None => docs.push(Document::new(path.id(), data)),
            }
        }
        self.inner.publish(collection);
        Ok(())
    }

    async fn delete_document(&self, path: &DocumentPath) -> Result<()> {
        let collection = path.collection().as_str();
        self.inner.check_write(collection)?;
        if let Some(docs) = self.inner.lock_collections().get_mut(collection) {
            docs.retain(|d| d.id != path.id());
        }
        self.inner.publish(collection);
        Ok(())
    }
}

/// Top-level merge: keys in `patch` overwrite, other keys stay.
fn merge_shallow(target: &mut Value, patch: Value) {
    match (target, patch) {
        (Value::Object(existing), Value::Object(patch)) => {
            for (k, v) in patch {
                existing.insert(k, v);
            }
        }
        (target, patch) => {
            *target = match patch {
                Value::Object(map) => Value::Object(map),
                other => {
                    let mut map = Map::new();
                    map.insert("value".to_string(), other);
                    Value::Object(map)
                }
            };
        }
    }
}
