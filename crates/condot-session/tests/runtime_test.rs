//! Session lifecycle, config toggling and career gating through the runtime.

use std::sync::Arc;
use std::time::Duration;

use condot_core::defaults::sample_cards;
use condot_core::{
    ApplicationStatus, CollectionPath, DocumentPath, Error, IdentityProvider, ProviderUser, SyncMode,
};
use condot_db::MemoryDocumentStore;
use condot_inference::{Classifier, MockGenerationBackend, PostingContext};
use condot_session::{MemoryIdentityProvider, SessionConfig, SessionRuntime};
use serde_json::json;

const ADMIN: &str = "admin@uos.ac.kr";

struct Harness {
    store: MemoryDocumentStore,
    provider: Arc<MemoryIdentityProvider>,
    backend: MockGenerationBackend,
    runtime: Arc<SessionRuntime>,
}

fn harness() -> Harness {
    let store = MemoryDocumentStore::new();
    let provider = Arc::new(MemoryIdentityProvider::new());
    let backend = MockGenerationBackend::new();
    let runtime = SessionRuntime::new(
        SessionConfig::default(),
        Arc::new(store.clone()),
        provider.clone(),
        Arc::new(Classifier::new(Arc::new(backend.clone()))),
    );
    Harness {
        store,
        provider,
        backend,
        runtime,
    }
}

async fn eventually<F>(mut check: F)
where
    F: FnMut() -> bool,
{
    tokio::time::timeout(Duration::from_secs(2), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[tokio::test]
async fn test_no_session_is_unauthorized() {
    let h = harness();
    assert!(matches!(h.runtime.require_session(), Err(Error::Unauthorized(_))));
    assert!(matches!(
        h.runtime.toggle_test_mode().await,
        Err(Error::Unauthorized(_))
    ));
}

#[tokio::test]
async fn test_demo_session_is_local_only_with_samples() {
    let h = harness();
    h.runtime.start();
    h.runtime.demo_login("tester@uos.ac.kr", "테스터");

    let session = h.runtime.require_session().unwrap();
    assert_eq!(session.sync_mode(), SyncMode::LocalOnly);
    assert_eq!(session.cards().cards(), sample_cards());
    assert!(!session.cards().collection().is_subscribed());
    assert_eq!(h.store.write_count(), 0);
}

#[tokio::test]
async fn test_signed_in_session_follows_store() {
    let h = harness();
    h.provider.sign_up("kim@uos.ac.kr", "secret123", "김서울").await.unwrap();
    h.runtime.start();

    let context = h.runtime.sign_in("kim@uos.ac.kr", "secret123").await.unwrap();
    let cards_path = CollectionPath::experiences("condot", context.principal.as_str());
    h.store.insert(
        &cards_path.doc("doc-1"),
        serde_json::to_value(&sample_cards()[1]).unwrap(),
    );

    let session = h.runtime.require_session().unwrap();
    eventually(|| session.cards().cards().len() == 1).await;
    assert_eq!(session.sync_mode(), SyncMode::Online);
    assert_eq!(session.cards().cards()[0].id.as_deref(), Some("doc-1"));
}

#[tokio::test]
async fn test_principal_change_tears_down_previous_session() {
    let h = harness();
    h.runtime.start();
    h.provider.sign_up("a@b.c", "secret123", "A").await.unwrap();
    h.runtime.sign_in("a@b.c", "secret123").await.unwrap();
    let first = h.runtime.require_session().unwrap();
    assert!(first.cards().collection().is_subscribed());

    h.runtime.demo_login("tester@uos.ac.kr", "테스터");
    let second = h.runtime.require_session().unwrap();
    assert_ne!(first.principal(), second.principal());
    assert!(!first.cards().collection().is_subscribed());

    h.runtime.sign_out().await;
    assert!(h.runtime.active().is_none());
}

#[tokio::test]
async fn test_profile_update_refreshes_session_in_place() {
    let h = harness();
    h.runtime.start();
    let context = h.runtime.sign_up("kim@uos.ac.kr", "secret123", "김서울").await.unwrap();
    let session = h.runtime.require_session().unwrap();
    assert!(session.cards().collection().is_subscribed());

    h.provider.set_auth_state(Some(ProviderUser {
        uid: context.principal.to_string(),
        display_name: Some("김서울시립".to_string()),
        email: Some("kim@uos.ac.kr".to_string()),
        photo_url: Some("https://example.com/kim.png".to_string()),
    }));
    eventually(|| session.context().user.name == "김서울시립").await;

    let current = h.runtime.require_session().unwrap();
    assert!(Arc::ptr_eq(&session, &current));
    assert_eq!(current.context().user.avatar_url, "https://example.com/kim.png");
    assert!(current.cards().collection().is_subscribed());
}

#[tokio::test]
async fn test_provider_sign_out_ends_real_session_only() {
    let h = harness();
    h.runtime.start();
    h.provider.sign_up("a@b.c", "secret123", "A").await.unwrap();
    eventually(|| h.runtime.active().is_some()).await;

    h.provider.set_auth_state(None);
    eventually(|| h.runtime.active().is_none()).await;

    h.runtime.demo_login("tester@uos.ac.kr", "테스터");
    h.provider.set_auth_state(None);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(h.runtime.active().is_some());
}

#[tokio::test]
async fn test_only_admin_toggles_test_mode() {
    let h = harness();
    h.runtime.start();
    h.runtime.demo_login("user@uos.ac.kr", "사용자");
    assert!(matches!(
        h.runtime.toggle_test_mode().await,
        Err(Error::Forbidden(_))
    ));

    h.runtime.demo_login(ADMIN, "관리자");
    assert!(matches!(
        h.runtime.toggle_test_mode().await,
        Err(Error::Forbidden(_))
    ));
    assert_eq!(h.store.write_count(), 0);

    h.runtime.sign_up(ADMIN, "secret123", "관리자").await.unwrap();
    assert!(!h.runtime.toggle_test_mode().await.unwrap());
    eventually(|| !h.runtime.global_config().is_test_mode).await;
}

#[tokio::test]
async fn test_cover_letter_files_preparing_application() {
    let h = harness();
    h.runtime.start();
    h.runtime.demo_login("tester@uos.ac.kr", "테스터");
    h.backend.push_response("저는 해커톤 경험을 바탕으로...");

    let posting = PostingContext {
        company: "NAVER".to_string(),
        company_type: "대기업".to_string(),
        job_role: "프론트엔드".to_string(),
        experience_level: "신입".to_string(),
        job_description: "React 경험자 우대".to_string(),
    };
    let letter = h.runtime.generate_cover_letter(&posting).await.unwrap();
    assert!(letter.saved_locally);

    let session = h.runtime.require_session().unwrap();
    let apps = session.applications().applications();
    assert_eq!(apps.len(), 1);
    assert_eq!(apps[0].status, ApplicationStatus::Preparing);
    assert_eq!(apps[0].cover_letter, letter.text);
    assert_eq!(apps[0].company_type.as_deref(), Some("대기업"));

    let prompt = &h.backend.get_calls()[0].input;
    assert!(prompt.contains("Target Company: NAVER, Type: 대기업"));
    assert!(prompt.contains("교내 해커톤 대상 수상"));
}

#[tokio::test]
async fn test_cover_letter_validation_and_failure_save_nothing() {
    let h = harness();
    h.runtime.demo_login("tester@uos.ac.kr", "테스터");

    let missing = PostingContext {
        company: "NAVER".to_string(),
        ..Default::default()
    };
    assert!(matches!(
        h.runtime.generate_cover_letter(&missing).await,
        Err(Error::InvalidInput(_))
    ));
    assert_eq!(h.backend.call_count(), 0);

    h.backend.push_failure("quota exceeded");
    let posting = PostingContext {
        company: "NAVER".to_string(),
        job_description: "공고".to_string(),
        ..Default::default()
    };
    assert!(h.runtime.generate_cover_letter(&posting).await.is_err());
    let session = h.runtime.require_session().unwrap();
    assert!(session.applications().applications().is_empty());
}

#[tokio::test]
async fn test_career_predictions_gated_until_trial() {
    let h = harness();
    h.store.insert(
        &DocumentPath::global_config("condot"),
        json!({ "isTestMode": false }),
    );
    h.runtime.start();
    eventually(|| !h.runtime.global_config().is_test_mode).await;
    h.runtime.demo_login("tester@uos.ac.kr", "테스터");

    assert!(matches!(
        h.runtime.predict_careers().await,
        Err(Error::Forbidden(_))
    ));
    assert!(!h.runtime.career_unlocked().unwrap());

    h.runtime.start_trial().unwrap();
    h.backend.push_response(
        json!({"predictions": [{
            "role": "프론트엔드 개발자",
            "compatibility": 87,
            "reasoning": "해커톤에서 React를 사용함",
            "recommendedExperiences": ["교내 해커톤 대상 수상"]
        }]})
        .to_string(),
    );
    let predictions = h.runtime.predict_careers().await.unwrap();
    assert_eq!(predictions[0].compatibility, 87);
}

#[tokio::test]
async fn test_reference_materials_are_admin_only() {
    let h = harness();
    h.runtime.demo_login("tester@uos.ac.kr", "테스터");
    assert!(matches!(
        h.runtime.add_reference("합격 자소서").await,
        Err(Error::Forbidden(_))
    ));

    h.runtime.sign_up(ADMIN, "secret123", "관리자").await.unwrap();
    h.backend.push_response(
        json!({
            "company": "카카오",
            "jobRole": "백엔드",
            "question": "지원동기",
            "answer": "합격 자소서",
            "keyCapabilities": ["문제해결"]
        })
        .to_string(),
    );
    let reference = h.runtime.add_reference("합격 자소서").await.unwrap();
    assert_eq!(reference.company, "카카오");
    let session = h.runtime.require_session().unwrap();
    assert_eq!(session.references(), vec![reference]);
}

#[tokio::test]
async fn test_gap_analysis_requires_role() {
    let h = harness();
    h.runtime.demo_login("tester@uos.ac.kr", "테스터");
    assert!(matches!(
        h.runtime.analyze_gap("  ").await,
        Err(Error::InvalidInput(_))
    ));
    assert_eq!(h.backend.call_count(), 0);
}
