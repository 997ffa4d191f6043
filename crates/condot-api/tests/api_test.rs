//! Router-level tests over an in-memory store and a scripted backend.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use condot_api::{parse_allowed_origins, router, AppState, MAX_BODY_BYTES};
use condot_core::defaults::sample_cards;
use condot_db::MemoryDocumentStore;
use condot_inference::{Classifier, MockGenerationBackend};
use condot_session::{MemoryIdentityProvider, SessionConfig, SessionRuntime};

struct TestApp {
    app: Router,
    backend: MockGenerationBackend,
    store: MemoryDocumentStore,
    provider: Arc<MemoryIdentityProvider>,
}

fn test_app_with(config: SessionConfig) -> TestApp {
    let store = MemoryDocumentStore::new();
    let backend = MockGenerationBackend::new();
    let provider = Arc::new(MemoryIdentityProvider::new());
    let runtime = SessionRuntime::new(
        config,
        Arc::new(store.clone()),
        provider.clone(),
        Arc::new(Classifier::new(Arc::new(backend.clone()))),
    );
    runtime.start();
    let app = router(
        AppState::new(runtime),
        parse_allowed_origins("http://localhost:3000"),
    );
    TestApp {
        app,
        backend,
        store,
        provider,
    }
}

fn test_app() -> TestApp {
    test_app_with(SessionConfig::default())
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(value) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };
    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

/// Sign in while the provider rejects passwords, which lands on a demo
/// identity derived from the email.
async fn demo_login_as(t: &TestApp, email: &str) -> Value {
    t.provider.disable_password_auth(true);
    let (status, body) = send(
        &t.app,
        Method::POST,
        "/api/v1/session/login",
        Some(json!({ "email": email, "password": "whatever" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body
}

async fn demo_login(t: &TestApp) {
    let body = demo_login_as(t, "tester@uos.ac.kr").await;
    assert_eq!(body["principal"], "demo-testeruosackr");
}

fn hackathon_draft() -> String {
    json!({
        "title": "교내 해커톤 대상",
        "dateRange": "2024.05",
        "year": 2024,
        "summary": "해커톤에 참여해 대상을 수상함.",
        "category": "공모전",
        "keywords": ["해커톤", "React"],
        "content": {
            "overview": "24시간 해커톤",
            "role": "팀장",
            "skills_used": ["React"],
            "outcomes": ["대상"],
            "learned": "협업"
        }
    })
    .to_string()
}

#[tokio::test]
async fn test_health() {
    let t = test_app();
    let (status, body) = send(&t.app, Method::GET, "/api/v1/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_cards_require_session() {
    let t = test_app();
    let (status, body) = send(&t.app, Method::GET, "/api/v1/cards", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].as_str().unwrap().contains("sign in"));

    let (_, session) = send(&t.app, Method::GET, "/api/v1/session", None).await;
    assert!(session["session"].is_null());
}

#[tokio::test]
async fn test_login_with_missing_password_is_bad_request() {
    let t = test_app();
    let (status, _) = send(
        &t.app,
        Method::POST,
        "/api/v1/session/login",
        Some(json!({ "email": "kim@uos.ac.kr", "password": "" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, session) = send(&t.app, Method::GET, "/api/v1/session", None).await;
    assert!(session["session"].is_null());
}

#[tokio::test]
async fn test_signup_then_session_reports_principal() {
    let t = test_app();
    let (status, body) = send(
        &t.app,
        Method::POST,
        "/api/v1/session/signup",
        Some(json!({ "email": "kim@uos.ac.kr", "password": "secret123", "displayName": "김서울" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user"]["name"], "김서울");

    let (_, session) = send(&t.app, Method::GET, "/api/v1/session", None).await;
    assert_eq!(session["session"]["principal"], body["principal"]);

    let (status, _) = send(&t.app, Method::POST, "/api/v1/session/logout", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&t.app, Method::GET, "/api/v1/cards", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_demo_session_serves_sample_views() {
    let t = test_app();
    demo_login(&t).await;

    let (status, cards) = send(&t.app, Method::GET, "/api/v1/cards", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cards.as_array().unwrap().len(), sample_cards().len());

    let (_, folders) = send(&t.app, Method::GET, "/api/v1/cards/folders", None).await;
    assert_eq!(folders.as_array().unwrap().len(), 12);

    let (_, none) = send(&t.app, Method::GET, "/api/v1/cards/search?q=%20", None).await;
    assert!(none.as_array().unwrap().is_empty());

    let (_, session) = send(&t.app, Method::GET, "/api/v1/session", None).await;
    assert_eq!(session["syncMode"], json!(condot_core::SyncMode::LocalOnly));
    assert_eq!(t.store.write_count(), 0);
}

fn timeline_card_ids(groups: &Value) -> Vec<String> {
    groups
        .as_array()
        .unwrap()
        .iter()
        .flat_map(|g| g["cards"].as_array().unwrap().iter())
        .map(|c| c["id"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_timeline_defaults_to_favorites() {
    let t = test_app();
    demo_login(&t).await;
    let favorites: Vec<String> = sample_cards()
        .into_iter()
        .filter(|c| c.is_favorite)
        .filter_map(|c| c.id)
        .collect();
    assert!(!favorites.is_empty());
    assert!(favorites.len() < sample_cards().len());

    let (status, groups) = send(&t.app, Method::GET, "/api/v1/cards/timeline", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(timeline_card_ids(&groups), favorites);

    let (_, all) = send(
        &t.app,
        Method::GET,
        "/api/v1/cards/timeline?favorites=false",
        None,
    )
    .await;
    assert_eq!(timeline_card_ids(&all).len(), sample_cards().len());
}

#[tokio::test]
async fn test_toggle_favorite_on_sample_card() {
    let t = test_app();
    demo_login(&t).await;
    let first = sample_cards().remove(0);
    let id = first.id.clone().unwrap();

    let (status, card) = send(
        &t.app,
        Method::POST,
        &format!("/api/v1/cards/{}/favorite", id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(card["isFavorite"], json!(!first.is_favorite));

    let (status, _) = send(
        &t.app,
        Method::POST,
        "/api/v1/cards/no-such-card/favorite",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_conversation_draft_and_save() {
    let t = test_app();
    demo_login(&t).await;
    t.backend.push_response(hackathon_draft());

    let (status, body) = send(
        &t.app,
        Method::POST,
        "/api/v1/conversation/messages",
        Some(json!({ "text": "지난 학기에 교내 해커톤에서 대상을 받았어" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["outcome"], "drafted");
    assert_eq!(body["result"]["card"]["title"], "교내 해커톤 대상");
    assert_eq!(body["conversation"]["state"], "draft_active");

    let (status, saved) = send(&t.app, Method::POST, "/api/v1/conversation/save", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(saved["saved"], true);
    assert_eq!(saved["savedLocally"], true);

    let (_, cards) = send(&t.app, Method::GET, "/api/v1/cards", None).await;
    assert_eq!(cards.as_array().unwrap().len(), sample_cards().len() + 1);
    assert_eq!(cards[0]["title"], "교내 해커톤 대상");
}

#[tokio::test]
async fn test_classifier_failure_is_reported_in_body() {
    let t = test_app();
    demo_login(&t).await;
    t.backend.push_failure("upstream timeout");

    let (status, body) = send(
        &t.app,
        Method::POST,
        "/api/v1/conversation/messages",
        Some(json!({ "text": "봉사활동을 했어" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["outcome"], "failed");
    assert_eq!(body["conversation"]["state"], "idle");
}

#[tokio::test]
async fn test_empty_message_makes_no_call() {
    let t = test_app();
    demo_login(&t).await;
    let (status, _) = send(
        &t.app,
        Method::POST,
        "/api/v1/conversation/messages",
        Some(json!({ "text": "   " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(t.backend.call_count(), 0);
}

#[tokio::test]
async fn test_edit_commands_without_draft_conflict() {
    let t = test_app();
    demo_login(&t).await;
    let (status, _) = send(&t.app, Method::POST, "/api/v1/conversation/edit/start", None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (status, _) = send(&t.app, Method::POST, "/api/v1/conversation/save", None).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_config_toggle_is_admin_only() {
    let t = test_app();
    let (_, config) = send(&t.app, Method::GET, "/api/v1/config", None).await;
    assert_eq!(config["isTestMode"], true);

    demo_login(&t).await;
    let (status, _) = send(&t.app, Method::POST, "/api/v1/config/toggle", None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(t.store.write_count(), 0);
}

#[tokio::test]
async fn test_demo_login_with_admin_email_cannot_toggle_config() {
    let t = test_app();
    let body = demo_login_as(&t, "admin@uos.ac.kr").await;
    assert_eq!(body["principal"], "demo-adminuosackr");
    assert_eq!(body["user"]["isAdmin"], false);

    let (status, _) = send(&t.app, Method::POST, "/api/v1/config/toggle", None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (_, config) = send(&t.app, Method::GET, "/api/v1/config", None).await;
    assert_eq!(config["isTestMode"], true);
    assert_eq!(t.store.write_count(), 0);

    let (status, _) = send(
        &t.app,
        Method::POST,
        "/api/v1/session/demo",
        Some(json!({ "email": "admin@uos.ac.kr", "name": "관리자" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cover_letter_requires_company_and_posting() {
    let t = test_app();
    demo_login(&t).await;
    let (status, body) = send(
        &t.app,
        Method::POST,
        "/api/v1/career/cover-letter",
        Some(json!({ "company": "", "jobDescription": "백엔드 개발자 채용" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "기업명과 공고 내용을 입력해주세요.");
    assert_eq!(t.backend.call_count(), 0);
}

#[tokio::test]
async fn test_cover_letter_files_application() {
    let t = test_app();
    demo_login(&t).await;
    t.backend.push_response("저는 협업을 통해 성장해 온 개발자입니다.");

    let (status, letter) = send(
        &t.app,
        Method::POST,
        "/api/v1/career/cover-letter",
        Some(json!({
            "company": "NAVER",
            "companyType": "대기업",
            "jobRole": "백엔드",
            "experienceLevel": "신입",
            "jobDescription": "백엔드 개발자 채용"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(letter["savedLocally"], true);

    let (_, applications) = send(&t.app, Method::GET, "/api/v1/applications", None).await;
    assert_eq!(applications[0]["company"], "NAVER");
    assert_eq!(applications[0]["status"], "준비중");
    assert_eq!(applications[0]["id"], letter["applicationId"]);
}

#[tokio::test]
async fn test_application_lifecycle() {
    let t = test_app();
    demo_login(&t).await;

    let (status, _) = send(
        &t.app,
        Method::POST,
        "/api/v1/applications",
        Some(json!({ "company": " " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, created) = send(
        &t.app,
        Method::POST,
        "/api/v1/applications",
        Some(json!({ "company": "카카오", "position": "프론트엔드" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["id"].as_str().unwrap().to_string();

    let (status, updated) = send(
        &t.app,
        Method::POST,
        &format!("/api/v1/applications/{}/status", id),
        Some(json!({ "status": "서류합격" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["status"], "서류합격");

    let (status, _) = send(
        &t.app,
        Method::DELETE,
        &format!("/api/v1/applications/{}", id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, applications) = send(&t.app, Method::GET, "/api/v1/applications", None).await;
    assert!(applications.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_attachments_disabled() {
    let t = test_app_with(SessionConfig {
        enable_attachments: false,
        ..SessionConfig::default()
    });
    demo_login(&t).await;
    let id = sample_cards()[0].id.clone().unwrap();
    let (status, _) = send(
        &t.app,
        Method::POST,
        &format!("/api/v1/cards/{}/attachments", id),
        Some(json!({ "name": "award.pdf", "sizeBytes": 1048576 })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_add_and_remove_attachment() {
    let t = test_app();
    demo_login(&t).await;
    let id = sample_cards()[0].id.clone().unwrap();

    let (status, attachment) = send(
        &t.app,
        Method::POST,
        &format!("/api/v1/cards/{}/attachments", id),
        Some(json!({ "name": "award.pdf", "sizeBytes": 1048576 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(attachment["size"], "1.00 MB");

    let attachment_id = attachment["id"].as_str().unwrap();
    let (status, card) = send(
        &t.app,
        Method::DELETE,
        &format!("/api/v1/cards/{}/attachments/{}", id, attachment_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(card["attachments"]
        .as_array()
        .unwrap()
        .iter()
        .all(|a| a["id"] != attachment["id"]));
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let t = test_app();
    demo_login(&t).await;
    let body = json!({ "text": "가".repeat(MAX_BODY_BYTES / 3 + 1) }).to_string();
    assert!(body.len() > MAX_BODY_BYTES);

    let response = t
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/api/v1/conversation/messages")
                .header(header::CONTENT_TYPE, "application/json")
                .header(header::CONTENT_LENGTH, body.len())
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(t.backend.call_count(), 0);
}

#[tokio::test]
async fn test_event_stream_headers() {
    let t = test_app();
    let response = t
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/events")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/event-stream"
    );
}
