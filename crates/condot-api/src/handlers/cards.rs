//! Archive views and card edits.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use condot_core::{views, Card, Category};

use crate::{ApiError, AppState};

/// The timeline shows favorites unless `favorites=false` is passed.
#[derive(Debug, Deserialize)]
pub struct TimelineQuery {
    #[serde(default = "favorites_by_default")]
    pub favorites: bool,
}

fn favorites_by_default() -> bool {
    true
}

#[derive(Debug, Deserialize, Default)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Deserialize)]
pub struct MoveRequest {
    pub category: Category,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub size_bytes: u64,
}

pub async fn list_cards(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let session = state.runtime.require_session()?;
    Ok(Json(session.cards().cards()))
}

pub async fn timeline(
    State(state): State<AppState>,
    Query(query): Query<TimelineQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state.runtime.require_session()?;
    Ok(Json(views::timeline(&session.cards().cards(), query.favorites)))
}

pub async fn folders(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let session = state.runtime.require_session()?;
    Ok(Json(views::folders(&session.cards().cards())))
}

pub async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state.runtime.require_session()?;
    Ok(Json(views::search(&session.cards().cards(), &query.q)))
}

/// Replace a card. The path id wins over any id in the body.
pub async fn update_card(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(mut card): Json<Card>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state.runtime.require_session()?;
    card.id = Some(id);
    session.cards().update(card.clone()).await?;
    Ok(Json(card))
}

pub async fn delete_card(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state.runtime.require_session()?;
    session.cards().delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn move_card(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<MoveRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state.runtime.require_session()?;
    Ok(Json(session.cards().move_category(&id, body.category).await?))
}

pub async fn toggle_favorite(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state.runtime.require_session()?;
    Ok(Json(session.cards().toggle_favorite(&id).await?))
}

fn require_attachments(state: &AppState) -> Result<(), ApiError> {
    if state.runtime.config().enable_attachments {
        Ok(())
    } else {
        Err(ApiError::NotFound("attachments are disabled".to_string()))
    }
}

pub async fn add_attachment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<AttachmentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_attachments(&state)?;
    let session = state.runtime.require_session()?;
    let attachment = session
        .cards()
        .add_attachment(&id, &body.name, body.size_bytes)
        .await?;
    Ok((StatusCode::CREATED, Json(attachment)))
}

pub async fn remove_attachment(
    State(state): State<AppState>,
    Path((id, attachment_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    require_attachments(&state)?;
    let session = state.runtime.require_session()?;
    Ok(Json(
        session.cards().remove_attachment(&id, &attachment_id).await?,
    ))
}
