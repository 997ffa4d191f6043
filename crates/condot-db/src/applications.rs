//! Job application tracking.

use std::sync::Arc;

use tokio::sync::watch;

use condot_core::{
    ApplicationStatus, CollectionPath, DocumentStore, EventBus, JobApplication, Result,
};

use crate::sync_mode::SyncModeHandle;
use crate::synced::{CreateOutcome, OfflinePolicy, SyncedCollection};

/// Job applications of one principal.
///
/// Read failures of any kind leave the list as it was.
pub struct ApplicationStore {
    applications: SyncedCollection<JobApplication>,
}

impl ApplicationStore {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        app_id: &str,
        principal: &str,
        mode: SyncModeHandle,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            applications: SyncedCollection::new(
                store,
                CollectionPath::applications(app_id, principal),
                principal,
                mode,
                OfflinePolicy::KeepState,
                events,
            ),
        }
    }

    pub fn collection(&self) -> &SyncedCollection<JobApplication> {
        &self.applications
    }

    pub fn subscribe(&self) {
        self.applications.subscribe();
    }

    pub fn unsubscribe(&self) {
        self.applications.unsubscribe();
    }

    pub fn applications(&self) -> Vec<JobApplication> {
        self.applications.records()
    }

    pub fn watch(&self) -> watch::Receiver<Vec<JobApplication>> {
        self.applications.watch()
    }

    pub fn get(&self, id: &str) -> Option<JobApplication> {
        self.applications.get(id)
    }

    pub async fn create(&self, application: JobApplication) -> Result<CreateOutcome> {
        self.applications.create(application).await
    }

    pub async fn update(&self, application: JobApplication) -> Result<()> {
        self.applications.update(application).await
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        self.applications.delete(id).await
    }

    /// Move an application to any pipeline stage.
    pub async fn set_status(&self, id: &str, status: ApplicationStatus) -> Result<JobApplication> {
        self.applications.modify(id, |a| a.status = status).await
    }
}
