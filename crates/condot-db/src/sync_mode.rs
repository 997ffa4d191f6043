//! Session-wide sync mode shared by every adapter of one session.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, warn};

use condot_core::SyncMode;

/// Shared handle to the session's sync mode.
///
/// `LocalOnly` is terminal: once a session is local-only (demo principals),
/// no later transition leaves it.
#[derive(Clone)]
pub struct SyncModeHandle {
    tx: Arc<watch::Sender<SyncMode>>,
}

impl SyncModeHandle {
    pub fn new(initial: SyncMode) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    /// Handle for a demo session: local-only from the start.
    pub fn local_only() -> Self {
        Self::new(SyncMode::LocalOnly)
    }

    pub fn get(&self) -> SyncMode {
        *self.tx.borrow()
    }

    /// True when store operations are served locally only.
    pub fn is_local(&self) -> bool {
        self.get().is_local()
    }

    /// Move to `mode`. Returns whether the mode changed.
    pub fn set(&self, mode: SyncMode) -> bool {
        let mut changed = false;
        self.tx.send_if_modified(|current| {
            if *current == mode || *current == SyncMode::LocalOnly {
                return false;
            }
            if mode == SyncMode::Offline {
                warn!(
                    subsystem = "sync",
                    sync_mode = %mode,
                    previous = %current,
                    "Session switched to offline mode"
                );
            } else {
                debug!(subsystem = "sync", sync_mode = %mode, previous = %current, "Sync mode changed");
            }
            *current = mode;
            changed = true;
            true
        });
        changed
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncMode> {
        self.tx.subscribe()
    }
}

impl Default for SyncModeHandle {
    fn default() -> Self {
        Self::new(SyncMode::Connecting)
    }
}
