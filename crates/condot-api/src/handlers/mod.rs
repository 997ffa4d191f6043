//! HTTP handlers for condot-api.

pub mod applications;
pub mod cards;
pub mod career;
pub mod conversation;
pub mod events;
pub mod session;
