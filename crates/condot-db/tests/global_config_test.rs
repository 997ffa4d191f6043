//! Shared config document: admin toggle, local fallback, and subscription.

use std::sync::Arc;
use std::time::Duration;

use condot_core::{DocumentPath, Error, EventBus, GlobalConfig};
use condot_db::{GlobalConfigSync, MemoryDocumentStore};
use serde_json::json;
use tokio::sync::watch;

const APP: &str = "condot";

fn setup() -> (MemoryDocumentStore, GlobalConfigSync) {
    let store = MemoryDocumentStore::new();
    let sync = GlobalConfigSync::new(Arc::new(store.clone()), APP, Arc::new(EventBus::default()));
    (store, sync)
}

async fn wait_for_config<F>(rx: &mut watch::Receiver<GlobalConfig>, predicate: F)
where
    F: FnMut(&GlobalConfig) -> bool,
{
    tokio::time::timeout(Duration::from_secs(2), rx.wait_for(predicate))
        .await
        .expect("config not reached in time")
        .expect("channel closed");
}

#[tokio::test]
async fn test_defaults_to_test_mode() {
    let (_, sync) = setup();
    assert!(sync.current().is_test_mode);
}

#[tokio::test]
async fn test_non_admin_toggle_is_forbidden() {
    let (store, sync) = setup();
    let result = sync.toggle(false).await;
    assert!(matches!(result, Err(Error::Forbidden(_))));
    assert!(sync.current().is_test_mode);
    assert_eq!(store.write_count(), 0);
}

#[tokio::test]
async fn test_admin_toggle_writes_and_follows_subscription() {
    let (store, sync) = setup();
    let mut rx = sync.watch();
    sync.subscribe();

    let target = sync.toggle(true).await.unwrap();
    assert!(!target);

    let path = DocumentPath::global_config(APP);
    let docs = store.documents(path.collection());
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].id, path.id());
    assert_eq!(docs[0].data, json!({ "isTestMode": false }));

    wait_for_config(&mut rx, |c| !c.is_test_mode).await;
    assert!(!sync.current().is_test_mode);
}

#[tokio::test]
async fn test_failed_write_flips_local_copy() {
    let (store, sync) = setup();
    store.fail_writes(true);

    assert!(!sync.toggle(true).await.unwrap());
    assert!(!sync.current().is_test_mode);

    assert!(sync.toggle(true).await.unwrap());
    assert!(sync.current().is_test_mode);
}

#[tokio::test]
async fn test_existing_document_replaces_local_config() {
    let (store, sync) = setup();
    store.insert(
        &DocumentPath::global_config(APP),
        json!({ "isTestMode": false }),
    );
    let mut rx = sync.watch();
    sync.subscribe();
    wait_for_config(&mut rx, |c| !c.is_test_mode).await;
}

#[tokio::test]
async fn test_absent_or_denied_document_keeps_local_config() {
    let (store, sync) = setup();
    store.deny("artifacts/condot/config");
    sync.subscribe();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(sync.current().is_test_mode);

    let (_, fresh) = setup();
    fresh.subscribe();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(fresh.current().is_test_mode);
}
