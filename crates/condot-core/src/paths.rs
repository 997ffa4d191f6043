//! Store paths for the per-deployment namespace.
//!
//! ```text
//! artifacts/{app_id}/users/{principal}/experiences/{card_id}
//! artifacts/{app_id}/users/{principal}/applications/{application_id}
//! artifacts/{app_id}/config/global
//! ```

use std::fmt;

use crate::defaults;

/// Path of a document collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionPath(String);

impl CollectionPath {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into().trim_matches('/').to_string())
    }

    fn user_collection(app_id: &str, principal: &str, name: &str) -> Self {
        Self(format!(
            "{}/{}/users/{}/{}",
            defaults::ROOT_COLLECTION,
            app_id,
            principal,
            name
        ))
    }

    /// A principal's card collection.
    pub fn experiences(app_id: &str, principal: &str) -> Self {
        Self::user_collection(app_id, principal, defaults::EXPERIENCES_COLLECTION)
    }

    /// A principal's job application collection.
    pub fn applications(app_id: &str, principal: &str) -> Self {
        Self::user_collection(app_id, principal, defaults::APPLICATIONS_COLLECTION)
    }

    /// Collection holding shared deployment config.
    pub fn config(app_id: &str) -> Self {
        Self(format!(
            "{}/{}/{}",
            defaults::ROOT_COLLECTION,
            app_id,
            defaults::CONFIG_COLLECTION
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last path segment (`experiences`, `applications`, ...).
    pub fn name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    pub fn doc(&self, id: impl Into<String>) -> DocumentPath {
        DocumentPath {
            collection: self.clone(),
            id: id.into(),
        }
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Path of a single document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentPath {
    collection: CollectionPath,
    id: String,
}

impl DocumentPath {
    /// The shared config document.
    pub fn global_config(app_id: &str) -> Self {
        CollectionPath::config(app_id).doc(defaults::GLOBAL_CONFIG_DOC)
    }

    pub fn collection(&self) -> &CollectionPath {
        &self.collection
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}
