//! # condot-session
//!
//! Session layer for CONDOT: the drafting conversation, identity binding with
//! demo fallback, and the runtime that owns one principal's stores.
//!
//! This crate provides:
//! - [`Conversation`]: the card-drafting state machine
//! - [`IdentityBinding`]: provider users to profiles, demo-login fallback
//! - [`MemoryIdentityProvider`]: in-process accounts for local use and tests
//! - [`SessionRuntime`]: builds and tears down [`ActiveSession`]s as the
//!   signed-in principal changes
//! - [`CareerService`]: cover letters, reference materials and career
//!   recommendations

pub mod career;
pub mod conversation;
pub mod identity;
pub mod provider;
pub mod runtime;

pub use career::{CareerAccess, CareerService, CoverLetter};
pub use conversation::{
    Conversation, ConversationError, ConversationSnapshot, ConversationState, Speaker,
    SubmitOutcome, Turn,
};
pub use identity::{profile_from_provider, IdentityBinding, PrincipalId, SessionContext};
pub use provider::MemoryIdentityProvider;
pub use runtime::{ActiveSession, SessionConfig, SessionRuntime};
