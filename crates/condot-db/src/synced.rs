//! Store adapter shared by every per-principal collection.
//!
//! A [`SyncedCollection`] keeps an in-memory list that is replaced wholesale by
//! every remote snapshot and mutated optimistically by local writes. Remote
//! write failures never roll back the local list; the next snapshot is the
//! only reconciliation.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use condot_core::defaults::{CREATED_AT_FIELD, LOCAL_ID_PREFIX};
use condot_core::{
    is_local_id, Card, CollectionPath, Document, DocumentStore, Error, EventBus, JobApplication,
    Result, ServerEvent, SyncMode,
};

use crate::sync_mode::SyncModeHandle;

// =============================================================================
// RECORDS
// =============================================================================

/// A record type stored one-per-document in a collection.
pub trait CollectionRecord:
    Clone + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Short name used in logs.
    const KIND: &'static str;

    fn id(&self) -> Option<&str>;
    fn set_id(&mut self, id: String);
    fn set_created_at(&mut self, at: DateTime<Utc>);
}

impl CollectionRecord for Card {
    const KIND: &'static str = "card";

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }

    fn set_created_at(&mut self, at: DateTime<Utc>) {
        self.created_at = Some(at);
    }
}

impl CollectionRecord for JobApplication {
    const KIND: &'static str = "application";

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }

    fn set_created_at(&mut self, at: DateTime<Utc>) {
        self.created_at = Some(at);
    }
}

/// What a permission-denied subscription falls back to.
#[derive(Debug, Clone)]
pub enum OfflinePolicy<T> {
    /// Switch the session offline and show this fixed dataset.
    SampleData(Vec<T>),
    /// Keep the last known list and leave the sync mode alone.
    KeepState,
}

/// Where a created record ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    /// Written to the store under this id; it arrives with the next snapshot.
    Remote(String),
    /// Prepended to the local list under this locally minted id.
    Local(String),
}

impl CreateOutcome {
    pub fn id(&self) -> &str {
        match self {
            CreateOutcome::Remote(id) | CreateOutcome::Local(id) => id,
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, CreateOutcome::Local(_))
    }
}

// =============================================================================
// SYNCED COLLECTION
// =============================================================================

struct Shared<T> {
    store: Arc<dyn DocumentStore>,
    path: CollectionPath,
    principal: String,
    mode: SyncModeHandle,
    policy: OfflinePolicy<T>,
    records: watch::Sender<Vec<T>>,
    events: Arc<EventBus>,
}

impl<T: CollectionRecord> Shared<T> {
    fn emit_replaced(&self, count: usize) {
        self.events.emit_for(
            &self.principal,
            ServerEvent::CollectionReplaced {
                collection: self.path.name().to_string(),
                count,
                mode: self.mode.get(),
            },
        );
    }

    fn set_mode(&self, mode: SyncMode) {
        if self.mode.set(mode) {
            self.events
                .emit_for(&self.principal, ServerEvent::SyncModeChanged { mode });
        }
    }

    fn apply_snapshot(&self, docs: Vec<Document>) {
        let mut records = Vec::with_capacity(docs.len());
        for doc in docs {
            match doc.decode::<T>() {
                Ok(mut record) => {
                    record.set_id(doc.id);
                    records.push(record);
                }
                Err(e) => warn!(
                    subsystem = "store",
                    component = "synced_collection",
                    collection = %self.path,
                    doc_id = %doc.id,
                    error = %e,
                    "Skipping malformed {}",
                    T::KIND
                ),
            }
        }
        let count = records.len();
        self.records.send_replace(records);
        self.set_mode(SyncMode::Online);
        debug!(
            subsystem = "store",
            component = "synced_collection",
            collection = %self.path,
            record_count = count,
            "Snapshot applied"
        );
        self.emit_replaced(count);
    }

    fn apply_error(&self, e: Error) {
        if !e.is_permission_denied() {
            warn!(
                subsystem = "store",
                component = "synced_collection",
                collection = %self.path,
                error = %e,
                "Collection watch failed, keeping last known state"
            );
            return;
        }
        match &self.policy {
            OfflinePolicy::SampleData(sample) => {
                warn!(
                    subsystem = "store",
                    component = "synced_collection",
                    collection = %self.path,
                    record_count = sample.len(),
                    "Store access denied, activating offline mode with sample data"
                );
                self.set_mode(SyncMode::Offline);
                self.records.send_replace(sample.clone());
                self.emit_replaced(sample.len());
            }
            OfflinePolicy::KeepState => {
                warn!(
                    subsystem = "store",
                    component = "synced_collection",
                    collection = %self.path,
                    "Store access denied, keeping last known state"
                );
            }
        }
    }

    async fn run_watch(self: Arc<Self>) {
        let mut stream = match self.store.watch_collection(&self.path).await {
            Ok(stream) => stream,
            Err(e) => {
                self.apply_error(e);
                return;
            }
        };
        while let Some(item) = stream.next().await {
            match item {
                Ok(docs) => self.apply_snapshot(docs),
                Err(e) => self.apply_error(e),
            }
        }
        debug!(
            subsystem = "store",
            component = "synced_collection",
            collection = %self.path,
            "Collection watch ended"
        );
    }
}

/// Live, optimistically-updated view of one remote collection.
pub struct SyncedCollection<T: CollectionRecord> {
    shared: Arc<Shared<T>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl<T: CollectionRecord> SyncedCollection<T> {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        path: CollectionPath,
        principal: impl Into<String>,
        mode: SyncModeHandle,
        policy: OfflinePolicy<T>,
        events: Arc<EventBus>,
    ) -> Self {
        let (records, _) = watch::channel(Vec::new());
        Self {
            shared: Arc::new(Shared {
                store,
                path,
                principal: principal.into(),
                mode,
                policy,
                records,
                events,
            }),
            task: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &CollectionPath {
        &self.shared.path
    }

    pub fn mode(&self) -> &SyncModeHandle {
        &self.shared.mode
    }

    /// Current records, newest local creates first.
    pub fn records(&self) -> Vec<T> {
        self.shared.records.borrow().clone()
    }

    /// Receiver notified on every replace or local mutation.
    pub fn watch(&self) -> watch::Receiver<Vec<T>> {
        self.shared.records.subscribe()
    }

    pub fn get(&self, id: &str) -> Option<T> {
        self.shared
            .records
            .borrow()
            .iter()
            .find(|r| r.id() == Some(id))
            .cloned()
    }

    /// Replace the local list without touching the store.
    pub fn seed(&self, records: Vec<T>) {
        let count = records.len();
        self.shared.records.send_replace(records);
        self.shared.emit_replaced(count);
    }

    /// Start following the remote collection.
    ///
    /// Local-only sessions never subscribe. A previous watch is replaced.
    pub fn subscribe(&self) {
        if self.shared.mode.get() == SyncMode::LocalOnly {
            debug!(
                subsystem = "store",
                component = "synced_collection",
                collection = %self.shared.path,
                "Local-only session, not subscribing"
            );
            return;
        }
        info!(
            subsystem = "store",
            component = "synced_collection",
            op = "subscribe",
            collection = %self.shared.path,
            principal = %self.shared.principal,
            "Subscribing to collection"
        );
        let handle = tokio::spawn(self.shared.clone().run_watch());
        if let Some(previous) = self.lock_task().replace(handle) {
            previous.abort();
        }
    }

    /// Stop following the remote collection. The local list is kept.
    pub fn unsubscribe(&self) {
        if let Some(handle) = self.lock_task().take() {
            handle.abort();
            debug!(
                subsystem = "store",
                component = "synced_collection",
                op = "unsubscribe",
                collection = %self.shared.path,
                "Unsubscribed from collection"
            );
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.lock_task()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    fn lock_task(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        match self.task.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Serialized body of a record, without the id and creation time.
    fn document_body(record: &T, drop_created_at: bool) -> Result<Value> {
        let mut data = serde_json::to_value(record)?;
        if let Value::Object(map) = &mut data {
            map.remove("id");
            if drop_created_at {
                map.remove(CREATED_AT_FIELD);
            }
        }
        Ok(data)
    }

    fn create_local(&self, mut record: T) -> CreateOutcome {
        let id = format!("{}{}", LOCAL_ID_PREFIX, Uuid::now_v7().simple());
        record.set_id(id.clone());
        record.set_created_at(Utc::now());
        let mut count = 0;
        self.shared.records.send_modify(|records| {
            records.insert(0, record);
            count = records.len();
        });
        self.shared.emit_replaced(count);
        CreateOutcome::Local(id)
    }

    /// Create a record.
    ///
    /// Online, the record is written without an id and with a store-assigned
    /// creation time; the local list is left for the next snapshot to fill.
    /// In local modes, or when the write fails, it is prepended locally.
    pub async fn create(&self, record: T) -> Result<CreateOutcome> {
        if self.shared.mode.is_local() {
            debug!(
                subsystem = "store",
                component = "synced_collection",
                op = "create",
                sync_mode = %self.shared.mode.get(),
                "Local mode, creating {} locally",
                T::KIND
            );
            return Ok(self.create_local(record));
        }

        let data = Self::document_body(&record, true)?;
        match self
            .shared
            .store
            .add_document(&self.shared.path, data, Some(CREATED_AT_FIELD))
            .await
        {
            Ok(id) => {
                debug!(
                    subsystem = "store",
                    component = "synced_collection",
                    op = "create",
                    collection = %self.shared.path,
                    doc_id = %id,
                    "Created {}",
                    T::KIND
                );
                Ok(CreateOutcome::Remote(id))
            }
            Err(e) => {
                warn!(
                    subsystem = "store",
                    component = "synced_collection",
                    op = "create",
                    collection = %self.shared.path,
                    error = %e,
                    "Saving {} locally due to store error",
                    T::KIND
                );
                Ok(self.create_local(record))
            }
        }
    }

    /// Replace a record locally, then merge it into the store.
    ///
    /// The remote write is skipped in local modes and for locally minted ids;
    /// a remote failure is logged and the local change stands.
    pub async fn update(&self, record: T) -> Result<()> {
        let id = record
            .id()
            .map(str::to_string)
            .ok_or_else(|| Error::InvalidInput(format!("{} has no id", T::KIND)))?;

        let mut found = false;
        let mut count = 0;
        let body = Self::document_body(&record, false)?;
        self.shared.records.send_if_modified(|records| {
            if let Some(slot) = records.iter_mut().find(|r| r.id() == Some(id.as_str())) {
                *slot = record;
                found = true;
            }
            count = records.len();
            found
        });
        if !found {
            return Err(Error::NotFound(format!("{} {}", T::KIND, id)));
        }
        self.shared.emit_replaced(count);

        if self.skip_remote(&id, "update") {
            return Ok(());
        }
        if let Err(e) = self
            .shared
            .store
            .set_document_merge(&self.shared.path.doc(&id), body)
            .await
        {
            warn!(
                subsystem = "store",
                component = "synced_collection",
                op = "update",
                doc_id = %id,
                error = %e,
                "Remote update failed, keeping local change"
            );
        }
        Ok(())
    }

    /// Apply `change` to the record with `id` and update it.
    pub async fn modify<F>(&self, id: &str, change: F) -> Result<T>
    where
        F: FnOnce(&mut T),
    {
        let mut record = self
            .get(id)
            .ok_or_else(|| Error::NotFound(format!("{} {}", T::KIND, id)))?;
        change(&mut record);
        self.update(record.clone()).await?;
        Ok(record)
    }

    /// Remove a record locally, then delete it from the store.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let mut found = false;
        let mut count = 0;
        self.shared.records.send_if_modified(|records| {
            let before = records.len();
            records.retain(|r| r.id() != Some(id));
            found = records.len() != before;
            count = records.len();
            found
        });
        if !found {
            return Err(Error::NotFound(format!("{} {}", T::KIND, id)));
        }
        self.shared.emit_replaced(count);

        if self.skip_remote(id, "delete") {
            return Ok(());
        }
        if let Err(e) = self
            .shared
            .store
            .delete_document(&self.shared.path.doc(id))
            .await
        {
            warn!(
                subsystem = "store",
                component = "synced_collection",
                op = "delete",
                doc_id = %id,
                error = %e,
                "Remote delete failed, keeping local change"
            );
        }
        Ok(())
    }

    fn skip_remote(&self, id: &str, op: &str) -> bool {
        let skip = self.shared.mode.is_local() || is_local_id(id);
        if skip {
            debug!(
                subsystem = "store",
                component = "synced_collection",
                op,
                doc_id = %id,
                sync_mode = %self.shared.mode.get(),
                "Skipping remote write"
            );
        }
        skip
    }
}

impl<T: CollectionRecord> Drop for SyncedCollection<T> {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
