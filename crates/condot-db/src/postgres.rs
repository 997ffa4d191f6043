//! PostgreSQL-backed document store.
//!
//! All collections share one `documents` table keyed by `(collection, id)`.
//! Writes announce the changed collection with `pg_notify`; watches hold a
//! dedicated `LISTEN` connection and re-read the whole collection for each
//! notification that names it.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde_json::Value;
use sqlx::postgres::{PgListener, PgPool};
use sqlx::Row;
use tracing::{debug, info, warn};
use uuid::Uuid;

use condot_core::{
    CollectionPath, CollectionStream, Document, DocumentPath, DocumentStore, DocumentStream, Error,
    Result,
};

/// Notification channel carrying changed collection paths.
pub const NOTIFY_CHANNEL: &str = "condot_documents";

/// SQLSTATE for `insufficient_privilege`.
const INSUFFICIENT_PRIVILEGE: &str = "42501";

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS documents (
    collection TEXT NOT NULL,
    id TEXT NOT NULL,
    data JSONB NOT NULL DEFAULT '{}'::jsonb,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    PRIMARY KEY (collection, id)
)";

/// Map a driver error, recognizing permission failures.
fn map_db_error(e: sqlx::Error, path: &str) -> Error {
    if let sqlx::Error::Database(db) = &e {
        if db.code().as_deref() == Some(INSUFFICIENT_PRIVILEGE) {
            return Error::PermissionDenied(path.to_string());
        }
    }
    Error::Database(e)
}

/// PostgreSQL document store.
#[derive(Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the documents table if it does not exist.
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(CREATE_TABLE)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        info!(
            subsystem = "database",
            component = "documents",
            op = "ensure_schema",
            "Document table ready"
        );
        Ok(())
    }

    async fn read_collection(pool: &PgPool, collection: &str) -> Result<Vec<Document>> {
        let rows = sqlx::query(
            "SELECT id, data FROM documents WHERE collection = $1 ORDER BY created_at, id",
        )
        .bind(collection)
        .fetch_all(pool)
        .await
        .map_err(|e| map_db_error(e, collection))?;

        rows.iter()
            .map(|row| {
                let id: String = row.try_get("id").map_err(Error::Database)?;
                let data: Value = row.try_get("data").map_err(Error::Database)?;
                Ok(Document::new(id, data))
            })
            .collect()
    }

    async fn read_document(pool: &PgPool, path: &DocumentPath) -> Result<Option<Document>> {
        let row = sqlx::query("SELECT data FROM documents WHERE collection = $1 AND id = $2")
            .bind(path.collection().as_str())
            .bind(path.id())
            .fetch_optional(pool)
            .await
            .map_err(|e| map_db_error(e, &path.to_string()))?;

        match row {
            Some(row) => {
                let data: Value = row.try_get("data").map_err(Error::Database)?;
                Ok(Some(Document::new(path.id(), data)))
            }
            None => Ok(None),
        }
    }

    async fn notify(&self, collection: &str) {
        if let Err(e) = sqlx::query("SELECT pg_notify($1, $2)")
            .bind(NOTIFY_CHANNEL)
            .bind(collection)
            .execute(&self.pool)
            .await
        {
            warn!(
                subsystem = "database",
                component = "documents",
                collection,
                error = %e,
                "Change notification failed"
            );
        }
    }

    async fn listen(&self) -> Result<PgListener> {
        let mut listener = PgListener::connect_with(&self.pool)
            .await
            .map_err(Error::Database)?;
        listener
            .listen(NOTIFY_CHANNEL)
            .await
            .map_err(Error::Database)?;
        Ok(listener)
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn watch_collection(&self, path: &CollectionPath) -> Result<CollectionStream> {
        let listener = self.listen().await?;
        let pool = self.pool.clone();
        let key = path.as_str().to_string();

        debug!(
            subsystem = "database",
            component = "documents",
            collection = %key,
            "Opening collection watch"
        );

        let stream = stream::unfold(
            (pool, listener, key, Some(true)),
            |(pool, mut listener, key, state)| async move {
                // state: Some(true) = initial read pending, Some(false) = listening, None = ended
                let initial = state?;
                if !initial {
                    loop {
                        match listener.recv().await {
                            Ok(note) if note.payload() == key => break,
                            Ok(_) => continue,
                            Err(e) => {
                                return Some((Err(Error::Database(e)), (pool, listener, key, None)))
                            }
                        }
                    }
                }
                match Self::read_collection(&pool, &key).await {
                    Ok(docs) => Some((Ok(docs), (pool, listener, key, Some(false)))),
                    Err(e) => Some((Err(e), (pool, listener, key, None))),
                }
            },
        );
        Ok(stream.boxed())
    }

    async fn watch_document(&self, path: &DocumentPath) -> Result<DocumentStream> {
        let listener = self.listen().await?;
        let pool = self.pool.clone();
        let path = path.clone();
        let last: Option<Option<Document>> = None;

        let stream = stream::unfold(
            (pool, listener, path, last, false),
            |(pool, mut listener, path, last, ended)| async move {
                if ended {
                    return None;
                }
                loop {
                    if last.is_some() {
                        match listener.recv().await {
                            Ok(note) if note.payload() == path.collection().as_str() => {}
                            Ok(_) => continue,
                            Err(e) => {
                                return Some((Err(Error::Database(e)), (pool, listener, path, last, true)))
                            }
                        }
                    }
                    match Self::read_document(&pool, &path).await {
                        Ok(current) => {
                            if last.as_ref() == Some(&current) {
                                continue;
                            }
                            return Some((
                                Ok(current.clone()),
                                (pool, listener, path, Some(current), false),
                            ));
                        }
                        Err(e) => return Some((Err(e), (pool, listener, path, last, true))),
                    }
                }
            },
        );
        Ok(stream.boxed())
    }

    async fn add_document(
        &self,
        path: &CollectionPath,
        data: Value,
        server_timestamp_field: Option<&str>,
    ) -> Result<String> {
        let id = Uuid::now_v7().simple().to_string();
        sqlx::query(
            "INSERT INTO documents (collection, id, data)
             VALUES ($1, $2, CASE WHEN $4::text IS NULL THEN $3::jsonb
                                  ELSE jsonb_set($3::jsonb, ARRAY[$4::text], to_jsonb(now())) END)",
        )
        .bind(path.as_str())
        .bind(&id)
        .bind(&data)
        .bind(server_timestamp_field)
        .execute(&self.pool)
        .await
        .map_err(|e| map_db_error(e, path.as_str()))?;

        self.notify(path.as_str()).await;
        Ok(id)
    }

    async fn set_document_merge(&self, path: &DocumentPath, data: Value) -> Result<()> {
        sqlx::query(
            "INSERT INTO documents (collection, id, data) VALUES ($1, $2, $3)
             ON CONFLICT (collection, id)
             DO UPDATE SET data = documents.data || EXCLUDED.data, updated_at = now()",
        )
        .bind(path.collection().as_str())
        .bind(path.id())
        .bind(&data)
        .execute(&self.pool)
        .await
        .map_err(|e| map_db_error(e, &path.to_string()))?;

        self.notify(path.collection().as_str()).await;
        Ok(())
    }

    async fn delete_document(&self, path: &DocumentPath) -> Result<()> {
        sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
            .bind(path.collection().as_str())
            .bind(path.id())
            .execute(&self.pool)
            .await
            .map_err(|e| map_db_error(e, &path.to_string()))?;

        self.notify(path.collection().as_str()).await;
        Ok(())
    }
}
