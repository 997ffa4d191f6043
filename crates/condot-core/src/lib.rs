//! # condot-core
//!
//! Core types, traits, and abstractions for the CONDOT career archive.
//!
//! This crate provides the experience-card data model, the ports to the
//! external document store, identity provider and generation backend, the
//! shared event bus, and the read-only card views every other crate builds on.

pub mod defaults;
pub mod error;
pub mod events;
pub mod logging;
pub mod models;
pub mod paths;
pub mod traits;
pub mod views;

// Re-export commonly used types at crate root
pub use error::{AuthError, AuthErrorCode, Error, Result};
pub use events::{EventBus, EventEnvelope, ServerEvent};
pub use models::*;
pub use paths::{CollectionPath, DocumentPath};
pub use traits::*;
pub use views::{Folder, TimelineGroup};
