//! Shared config toggle and career features.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use condot_inference::PostingContext;

use crate::{ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct ReferenceRequest {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GapRequest {
    #[serde(default)]
    pub target_role: String,
}

pub async fn get_config(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.runtime.global_config())
}

pub async fn toggle_config(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let is_test_mode = state.runtime.toggle_test_mode().await?;
    Ok(Json(json!({ "isTestMode": is_test_mode })))
}

pub async fn cover_letter(
    State(state): State<AppState>,
    Json(posting): Json<PostingContext>,
) -> Result<impl IntoResponse, ApiError> {
    let letter = state.runtime.generate_cover_letter(&posting).await?;
    Ok((StatusCode::CREATED, Json(letter)))
}

pub async fn add_reference(
    State(state): State<AppState>,
    Json(body): Json<ReferenceRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let reference = state.runtime.add_reference(&body.text).await?;
    Ok((StatusCode::CREATED, Json(reference)))
}

pub async fn predictions(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.runtime.predict_careers().await?))
}

pub async fn gap(
    State(state): State<AppState>,
    Json(body): Json<GapRequest>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.runtime.analyze_gap(&body.target_role).await?))
}

/// Unlock predictions for the rest of this session.
pub async fn start_trial(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    state.runtime.start_trial()?;
    Ok(Json(json!({ "careerUnlocked": state.runtime.career_unlocked()? })))
}
