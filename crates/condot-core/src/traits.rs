//! Ports to the external collaborators: document store, identity provider,
//! and text-generation backend.

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::watch;

use crate::error::AuthError;
use crate::paths::{CollectionPath, DocumentPath};
use crate::Result;

// =============================================================================
// DOCUMENT STORE
// =============================================================================

/// A stored JSON document and its store-assigned id.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub data: Value,
}

impl Document {
    pub fn new(id: impl Into<String>, data: Value) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }

    /// Deserialize the document body.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.data.clone())?)
    }
}

/// Stream of full collection snapshots.
pub type CollectionStream = BoxStream<'static, Result<Vec<Document>>>;

/// Stream of single-document snapshots (`None` when the document is absent).
pub type DocumentStream = BoxStream<'static, Result<Option<Document>>>;

/// Remote document store.
///
/// Watches yield the current snapshot first, then a full snapshot after every
/// change. A permission failure is delivered as an `Err` item (or as the
/// error of the watch call itself), after which the stream ends.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Watch every document in a collection.
    async fn watch_collection(&self, path: &CollectionPath) -> Result<CollectionStream>;

    /// Watch one document.
    async fn watch_document(&self, path: &DocumentPath) -> Result<DocumentStream>;

    /// Add a document with a store-assigned id.
    ///
    /// When `server_timestamp_field` is set, the store writes its own clock
    /// into that top-level field.
    async fn add_document(
        &self,
        path: &CollectionPath,
        data: Value,
        server_timestamp_field: Option<&str>,
    ) -> Result<String>;

    /// Shallow-merge `data` into a document, creating it when absent.
    async fn set_document_merge(&self, path: &DocumentPath, data: Value) -> Result<()>;

    /// Delete a document. Deleting an absent document succeeds.
    async fn delete_document(&self, path: &DocumentPath) -> Result<()>;
}

// =============================================================================
// IDENTITY PROVIDER
// =============================================================================

/// A user as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderUser {
    pub uid: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub photo_url: Option<String>,
}

/// Third-party authentication.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> std::result::Result<ProviderUser, AuthError>;

    /// Create an account and set its display name.
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> std::result::Result<ProviderUser, AuthError>;

    /// Popup-style OAuth sign-in with the named provider (e.g. `"google"`).
    async fn sign_in_with_oauth(&self, provider: &str)
        -> std::result::Result<ProviderUser, AuthError>;

    async fn send_password_reset(&self, email: &str) -> std::result::Result<(), AuthError>;

    async fn sign_out(&self) -> std::result::Result<(), AuthError>;

    /// Auth-state channel; `None` means signed out.
    fn auth_state(&self) -> watch::Receiver<Option<ProviderUser>>;
}

// =============================================================================
// GENERATION BACKEND
// =============================================================================

/// A strict JSON schema the model output must conform to.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputSchema {
    /// Short identifier (`experience_card`, `career_predictions`, ...).
    pub name: String,
    pub schema: Value,
}

/// Black-box text generation.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Free-form text generation.
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Generation constrained to `schema`; returns the raw JSON text.
    async fn generate_structured(&self, prompt: &str, schema: &OutputSchema) -> Result<String>;

    /// Get the model name being used.
    fn model_name(&self) -> &str;
}
