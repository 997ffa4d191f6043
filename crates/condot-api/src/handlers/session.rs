//! Sign-in, sign-up and sign-out. Demo identities are only reached through
//! the provider fallbacks of these routes.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::{ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub display_name: String,
}

#[derive(Debug, Deserialize)]
pub struct OAuthRequest {
    #[serde(default = "default_oauth_provider")]
    pub provider: String,
}

fn default_oauth_provider() -> String {
    "google".to_string()
}

#[derive(Debug, Deserialize)]
pub struct PasswordResetRequest {
    #[serde(default)]
    pub email: String,
}

/// Current principal, sync mode and career gate.
pub async fn get_session(State(state): State<AppState>) -> impl IntoResponse {
    match state.runtime.active() {
        Some(session) => Json(json!({
            "session": session.context(),
            "syncMode": session.sync_mode(),
            "careerUnlocked": state.runtime.career_unlocked().unwrap_or(false),
        })),
        None => Json(json!({ "session": null })),
    }
}

pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let context = state.runtime.sign_in(&body.email, &body.password).await?;
    Ok(Json(context))
}

pub async fn sign_up(
    State(state): State<AppState>,
    Json(body): Json<SignUpRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let context = state
        .runtime
        .sign_up(&body.email, &body.password, &body.display_name)
        .await?;
    Ok((StatusCode::CREATED, Json(context)))
}

pub async fn oauth(
    State(state): State<AppState>,
    Json(body): Json<OAuthRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let context = state.runtime.sign_in_with_oauth(&body.provider).await?;
    Ok(Json(context))
}

pub async fn password_reset(
    State(state): State<AppState>,
    Json(body): Json<PasswordResetRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state.runtime.send_password_reset(&body.email).await?;
    Ok(StatusCode::ACCEPTED)
}

pub async fn logout(State(state): State<AppState>) -> impl IntoResponse {
    state.runtime.sign_out().await;
    StatusCode::NO_CONTENT
}
