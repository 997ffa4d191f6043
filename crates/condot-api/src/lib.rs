//! # condot-api
//!
//! HTTP surface of the CONDOT session: JSON endpoints under `/api/v1` and a
//! server-sent event stream of everything the session emits.

pub mod config;
pub mod error;
pub mod handlers;

use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, HeaderValue, Method};
use axum::response::IntoResponse;
use axum::routing::{get, patch, post, put};
use axum::{Json, Router};
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use condot_session::SessionRuntime;

pub use config::{parse_allowed_origins, ServerConfig, StoreBackend};
pub use error::ApiError;

use handlers::{applications, cards, career, conversation, events, session};

/// Largest accepted request body.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub runtime: Arc<SessionRuntime>,
}

impl AppState {
    pub fn new(runtime: Arc<SessionRuntime>) -> Self {
        Self { runtime }
    }
}

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

fn cors_layer(allowed_origins: Vec<HeaderValue>) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed_origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600))
}

/// Build the full router with tracing, CORS and a body limit.
pub fn router(state: AppState, allowed_origins: Vec<HeaderValue>) -> Router {
    let api = Router::new()
        .route("/health", get(health_check))
        // Session
        .route("/session", get(session::get_session))
        .route("/session/login", post(session::login))
        .route("/session/signup", post(session::sign_up))
        .route("/session/oauth", post(session::oauth))
        .route("/session/password-reset", post(session::password_reset))
        .route("/session/logout", post(session::logout))
        // Conversation
        .route("/conversation", get(conversation::get_conversation))
        .route("/conversation/messages", post(conversation::post_message))
        .route("/conversation/edit/start", post(conversation::start_edit))
        .route("/conversation/edit", patch(conversation::edit))
        .route("/conversation/edit/commit", post(conversation::commit_edit))
        .route("/conversation/edit/cancel", post(conversation::cancel_edit))
        .route("/conversation/save", post(conversation::save))
        .route("/conversation/cancel", post(conversation::cancel))
        // Cards
        .route("/cards", get(cards::list_cards))
        .route("/cards/timeline", get(cards::timeline))
        .route("/cards/folders", get(cards::folders))
        .route("/cards/search", get(cards::search))
        .route(
            "/cards/:id",
            put(cards::update_card).delete(cards::delete_card),
        )
        .route("/cards/:id/move", post(cards::move_card))
        .route("/cards/:id/favorite", post(cards::toggle_favorite))
        .route("/cards/:id/attachments", post(cards::add_attachment))
        .route(
            "/cards/:id/attachments/:attachment_id",
            axum::routing::delete(cards::remove_attachment),
        )
        // Applications
        .route(
            "/applications",
            get(applications::list_applications).post(applications::create_application),
        )
        .route(
            "/applications/:id",
            put(applications::update_application).delete(applications::delete_application),
        )
        .route("/applications/:id/status", post(applications::set_status))
        // Shared config
        .route("/config", get(career::get_config))
        .route("/config/toggle", post(career::toggle_config))
        // Career
        .route("/career/cover-letter", post(career::cover_letter))
        .route("/career/references", post(career::add_reference))
        .route("/career/predictions", post(career::predictions))
        .route("/career/gap", post(career::gap))
        .route("/career/trial", post(career::start_trial))
        // Events
        .route("/events", get(events::sse_events));

    Router::new()
        .nest("/api/v1", api)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(allowed_origins)),
        )
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .with_state(state)
}
