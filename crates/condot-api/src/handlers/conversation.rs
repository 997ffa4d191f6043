//! Chat-driven card drafting.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use condot_core::CardEdit;
use condot_session::SubmitOutcome;

use crate::{ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    #[serde(default)]
    pub text: String,
}

pub async fn get_conversation(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let session = state.runtime.require_session()?;
    Ok(Json(session.conversation().snapshot()))
}

/// Submit an utterance. A classifier failure is not an HTTP error: the
/// conversation keeps its state and asks the user to try again.
pub async fn post_message(
    State(state): State<AppState>,
    Json(body): Json<MessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state.runtime.require_session()?;
    let conversation = session.conversation();
    let outcome = conversation.submit(&body.text).await?;

    let result = match outcome {
        SubmitOutcome::Drafted(card) => json!({ "outcome": "drafted", "card": card }),
        SubmitOutcome::Modified(card) => json!({ "outcome": "modified", "card": card }),
        SubmitOutcome::Failed(e) => json!({ "outcome": "failed", "error": e.to_string() }),
        SubmitOutcome::Discarded => json!({ "outcome": "discarded" }),
    };
    Ok(Json(json!({
        "result": result,
        "conversation": conversation.snapshot(),
    })))
}

pub async fn start_edit(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let session = state.runtime.require_session()?;
    Ok(Json(session.conversation().start_manual_edit()?))
}

pub async fn edit(
    State(state): State<AppState>,
    Json(body): Json<CardEdit>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state.runtime.require_session()?;
    Ok(Json(session.conversation().edit(&body)?))
}

pub async fn commit_edit(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let session = state.runtime.require_session()?;
    Ok(Json(session.conversation().commit_manual_edit()?))
}

pub async fn cancel_edit(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let session = state.runtime.require_session()?;
    session.conversation().cancel_manual_edit()?;
    Ok(StatusCode::NO_CONTENT)
}

/// Save the draft into the archive. `saved: false` means the store write
/// failed and the draft was dropped.
pub async fn save(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let session = state.runtime.require_session()?;
    let outcome = session.conversation().save(session.cards()).await?;
    let body = match outcome {
        Some(outcome) => json!({
            "saved": true,
            "id": outcome.id(),
            "savedLocally": outcome.is_local(),
        }),
        None => json!({ "saved": false }),
    };
    Ok(Json(body))
}

pub async fn cancel(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let session = state.runtime.require_session()?;
    let cancelled = session.conversation().cancel()?;
    Ok(Json(json!({ "cancelled": cancelled })))
}
