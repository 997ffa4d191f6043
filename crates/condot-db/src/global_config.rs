//! Global Config Sync: the shared feature-flag document.

use std::sync::{Arc, Mutex};

use futures::StreamExt;
use serde_json::json;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use condot_core::{DocumentPath, DocumentStore, Error, EventBus, GlobalConfig, Result, ServerEvent};

/// Follows the shared config document, falling back to the local copy.
pub struct GlobalConfigSync {
    store: Arc<dyn DocumentStore>,
    path: DocumentPath,
    config: Arc<watch::Sender<GlobalConfig>>,
    events: Arc<EventBus>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl GlobalConfigSync {
    pub fn new(store: Arc<dyn DocumentStore>, app_id: &str, events: Arc<EventBus>) -> Self {
        let (config, _) = watch::channel(GlobalConfig::default());
        Self {
            store,
            path: DocumentPath::global_config(app_id),
            config: Arc::new(config),
            events,
            task: Mutex::new(None),
        }
    }

    pub fn current(&self) -> GlobalConfig {
        *self.config.borrow()
    }

    pub fn watch(&self) -> watch::Receiver<GlobalConfig> {
        self.config.subscribe()
    }

    fn replace(config: &watch::Sender<GlobalConfig>, events: &EventBus, next: GlobalConfig) {
        config.send_replace(next);
        events.emit(ServerEvent::ConfigChanged {
            is_test_mode: next.is_test_mode,
        });
    }

    /// Start following the config document.
    ///
    /// Present documents replace the local config wholesale; absence and
    /// errors leave it untouched.
    pub fn subscribe(&self) {
        let store = self.store.clone();
        let path = self.path.clone();
        let config = self.config.clone();
        let events = self.events.clone();

        info!(
            subsystem = "store",
            component = "global_config",
            op = "subscribe",
            path = %path,
            "Subscribing to global config"
        );

        let handle = tokio::spawn(async move {
            let mut stream = match store.watch_document(&path).await {
                Ok(stream) => stream,
                Err(e) => {
                    warn!(
                        subsystem = "store",
                        component = "global_config",
                        error = %e,
                        "Config sync failed, keeping local config"
                    );
                    return;
                }
            };
            while let Some(item) = stream.next().await {
                match item {
                    Ok(Some(doc)) => match doc.decode::<GlobalConfig>() {
                        Ok(next) => Self::replace(&config, &events, next),
                        Err(e) => warn!(
                            subsystem = "store",
                            component = "global_config",
                            error = %e,
                            "Ignoring malformed config document"
                        ),
                    },
                    Ok(None) => debug!(
                        subsystem = "store",
                        component = "global_config",
                        "Config document absent, keeping local config"
                    ),
                    Err(e) => warn!(
                        subsystem = "store",
                        component = "global_config",
                        error = %e,
                        "Config sync failed, keeping local config"
                    ),
                }
            }
        });

        let mut task = match self.task.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(previous) = task.replace(handle) {
            previous.abort();
        }
    }

    pub fn unsubscribe(&self) {
        let mut task = match self.task.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(handle) = task.take() {
            handle.abort();
        }
    }

    /// Flip the test-mode flag. Admins only.
    ///
    /// The negated flag is merge-written; the local copy then follows the
    /// subscription. If the write fails the local copy is flipped directly.
    /// Returns the value the flag was set to.
    pub async fn toggle(&self, actor_is_admin: bool) -> Result<bool> {
        if !actor_is_admin {
            return Err(Error::Forbidden(
                "only the administrator can change the global config".to_string(),
            ));
        }
        let target = !self.current().is_test_mode;
        match self
            .store
            .set_document_merge(&self.path, json!({ "isTestMode": target }))
            .await
        {
            Ok(()) => {
                info!(
                    subsystem = "store",
                    component = "global_config",
                    op = "toggle",
                    is_test_mode = target,
                    "Global config updated"
                );
            }
            Err(e) => {
                warn!(
                    subsystem = "store",
                    component = "global_config",
                    op = "toggle",
                    error = %e,
                    "Config write failed, flipping local config"
                );
                let mut next = self.current();
                next.is_test_mode = !next.is_test_mode;
                Self::replace(&self.config, &self.events, next);
            }
        }
        Ok(target)
    }
}

impl Drop for GlobalConfigSync {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
