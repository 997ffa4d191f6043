//! Card Store Adapter: the principal's experience cards.

use std::sync::Arc;

use tokio::sync::watch;

use condot_core::defaults::sample_cards;
use condot_core::{
    Attachment, Card, Category, CollectionPath, DocumentStore, Error, EventBus, Result,
};

use crate::sync_mode::SyncModeHandle;
use crate::synced::{CreateOutcome, OfflinePolicy, SyncedCollection};

/// Experience cards of one principal.
///
/// A permission-denied subscription switches the session offline and shows
/// the built-in sample cards.
pub struct CardStore {
    cards: SyncedCollection<Card>,
}

impl CardStore {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        app_id: &str,
        principal: &str,
        mode: SyncModeHandle,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            cards: SyncedCollection::new(
                store,
                CollectionPath::experiences(app_id, principal),
                principal,
                mode,
                OfflinePolicy::SampleData(sample_cards()),
                events,
            ),
        }
    }

    pub fn collection(&self) -> &SyncedCollection<Card> {
        &self.cards
    }

    pub fn subscribe(&self) {
        self.cards.subscribe();
    }

    pub fn unsubscribe(&self) {
        self.cards.unsubscribe();
    }

    pub fn cards(&self) -> Vec<Card> {
        self.cards.records()
    }

    pub fn watch(&self) -> watch::Receiver<Vec<Card>> {
        self.cards.watch()
    }

    pub fn get(&self, id: &str) -> Option<Card> {
        self.cards.get(id)
    }

    /// Show the sample cards (demo sessions start from these).
    pub fn seed_samples(&self) {
        self.cards.seed(sample_cards());
    }

    pub async fn create(&self, card: Card) -> Result<CreateOutcome> {
        self.cards.create(card).await
    }

    pub async fn update(&self, card: Card) -> Result<()> {
        self.cards.update(card).await
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        self.cards.delete(id).await
    }

    pub async fn move_category(&self, id: &str, category: Category) -> Result<Card> {
        self.cards.modify(id, |card| card.category = category).await
    }

    pub async fn toggle_favorite(&self, id: &str) -> Result<Card> {
        self.cards
            .modify(id, |card| card.is_favorite = !card.is_favorite)
            .await
    }

    /// Attach file metadata to a card. No bytes are uploaded.
    pub async fn add_attachment(&self, id: &str, name: &str, size_bytes: u64) -> Result<Attachment> {
        if name.trim().is_empty() {
            return Err(Error::InvalidInput("attachment name is required".to_string()));
        }
        let attachment = Attachment::from_upload(name, size_bytes);
        let added = attachment.clone();
        self.cards
            .modify(id, move |card| card.attachments.push(added))
            .await?;
        Ok(attachment)
    }

    pub async fn remove_attachment(&self, id: &str, attachment_id: &str) -> Result<Card> {
        let card = self
            .get(id)
            .ok_or_else(|| Error::NotFound(format!("card {}", id)))?;
        if !card.attachments.iter().any(|a| a.id == attachment_id) {
            return Err(Error::NotFound(format!("attachment {}", attachment_id)));
        }
        self.cards
            .modify(id, |card| card.attachments.retain(|a| a.id != attachment_id))
            .await
    }
}
