//! Job application tracking.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use condot_core::{ApplicationStatus, JobApplication};

use crate::{ApiError, AppState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateApplicationRequest {
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub position: String,
    pub date: Option<String>,
    pub status: Option<ApplicationStatus>,
    #[serde(default)]
    pub job_posting_url: String,
    #[serde(default)]
    pub cover_letter: String,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: ApplicationStatus,
}

pub async fn list_applications(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state.runtime.require_session()?;
    Ok(Json(session.applications().applications()))
}

pub async fn create_application(
    State(state): State<AppState>,
    Json(body): Json<CreateApplicationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if body.company.trim().is_empty() {
        return Err(ApiError::BadRequest("company is required".to_string()));
    }
    let session = state.runtime.require_session()?;

    let mut application = JobApplication::new(body.company.trim(), body.position.trim());
    if let Some(date) = body.date.filter(|d| !d.trim().is_empty()) {
        application.date = date;
    }
    if let Some(status) = body.status {
        application.status = status;
    }
    application.job_posting_url = body.job_posting_url;
    application.cover_letter = body.cover_letter;

    let outcome = session.applications().create(application).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "id": outcome.id(),
            "savedLocally": outcome.is_local(),
        })),
    ))
}

pub async fn update_application(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(mut application): Json<JobApplication>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state.runtime.require_session()?;
    application.id = Some(id);
    session.applications().update(application.clone()).await?;
    Ok(Json(application))
}

pub async fn set_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<StatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state.runtime.require_session()?;
    Ok(Json(session.applications().set_status(&id, body.status).await?))
}

pub async fn delete_application(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state.runtime.require_session()?;
    session.applications().delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
