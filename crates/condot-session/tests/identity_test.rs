//! Identity binding over the in-memory provider.

use std::sync::Arc;
use std::time::Duration;

use condot_core::{AuthErrorCode, EventBus, IdentityProvider, ProviderUser, ServerEvent};
use condot_session::{IdentityBinding, MemoryIdentityProvider, SessionContext};
use tokio::sync::watch;

const ADMIN: &str = "admin@uos.ac.kr";

fn setup() -> (Arc<MemoryIdentityProvider>, IdentityBinding, Arc<EventBus>) {
    let provider = Arc::new(MemoryIdentityProvider::new());
    let events = Arc::new(EventBus::default());
    let binding = IdentityBinding::new(provider.clone(), ADMIN, events.clone());
    (provider, binding, events)
}

async fn wait_for_session<F>(rx: &mut watch::Receiver<Option<SessionContext>>, predicate: F)
where
    F: FnMut(&Option<SessionContext>) -> bool,
{
    tokio::time::timeout(Duration::from_secs(2), rx.wait_for(predicate))
        .await
        .expect("session state not reached in time")
        .expect("channel closed");
}

#[tokio::test]
async fn test_password_sign_in_binds_profile() {
    let (provider, binding, _) = setup();
    provider.sign_up(ADMIN, "secret123", "관리자").await.unwrap();

    let context = binding.sign_in(ADMIN, "secret123").await.unwrap();
    assert!(!context.is_demo());
    assert!(context.is_admin());
    assert_eq!(context.user.name, "관리자");
    assert_eq!(binding.current(), Some(context));
}

#[tokio::test]
async fn test_disabled_password_auth_falls_back_to_demo() {
    let (provider, binding, events) = setup();
    provider.disable_password_auth(true);
    let mut bus = events.subscribe();

    let context = binding.sign_in("kim@uos.ac.kr", "whatever").await.unwrap();
    assert_eq!(context.principal.as_str(), "demo-kimuosackr");
    assert_eq!(context.user.name, "Demo User");
    assert_eq!(context.user.avatar_url, "");
    assert!(!context.is_admin());

    let envelope = bus.try_recv().unwrap();
    assert_eq!(
        envelope.payload,
        ServerEvent::SessionChanged {
            principal: Some("demo-kimuosackr".to_string()),
            demo: true,
        }
    );
}

#[tokio::test]
async fn test_sign_up_fallback_keeps_requested_name() {
    let (provider, binding, _) = setup();
    provider.disable_password_auth(true);
    let context = binding
        .sign_up("lee@uos.ac.kr", "secret123", "이서울")
        .await
        .unwrap();
    assert!(context.is_demo());
    assert_eq!(context.user.name, "이서울");
}

#[tokio::test]
async fn test_oauth_unauthorized_domain_uses_google_demo() {
    let (provider, binding, _) = setup();
    provider.reject_oauth_domain(true);
    let context = binding.sign_in_with_oauth("google").await.unwrap();
    assert_eq!(context.principal.as_str(), "demo-demogooglecom");
    assert_eq!(context.user.name, "Google Demo");
    assert_eq!(context.user.email, "demo@google.com");
}

#[tokio::test]
async fn test_other_failures_surface_without_session() {
    let (provider, binding, _) = setup();
    provider.sign_up("a@b.c", "secret123", "A").await.unwrap();
    provider.sign_out().await.unwrap();

    let err = binding.sign_in("a@b.c", "wrong-pass").await.unwrap_err();
    assert_eq!(err.code, AuthErrorCode::InvalidCredential);
    assert!(binding.current().is_none());

    let err = binding.sign_in("", "secret123").await.unwrap_err();
    assert_eq!(err.code, AuthErrorCode::MissingField);
}

#[tokio::test]
async fn test_demo_fallback_with_admin_email_is_not_admin() {
    let (provider, binding, _) = setup();
    provider.disable_password_auth(true);

    let context = binding.sign_in(ADMIN, "anything").await.unwrap();
    assert!(context.is_demo());
    assert!(!context.is_admin());
    assert!(!binding.demo_login(ADMIN, "관리자").is_admin());
}

#[tokio::test]
async fn test_provider_sign_out_keeps_demo_session() {
    let (provider, binding, _) = setup();
    binding.listen();
    let demo = binding.demo_login("tester@uos.ac.kr", "테스터");

    provider.set_auth_state(None);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(binding.current(), Some(demo));
}

#[tokio::test]
async fn test_provider_sign_out_clears_real_session() {
    let (provider, binding, _) = setup();
    binding.listen();
    let mut rx = binding.watch();

    provider.set_auth_state(Some(ProviderUser {
        uid: "uid-7".to_string(),
        display_name: Some("박서울".to_string()),
        email: Some("park@uos.ac.kr".to_string()),
        photo_url: None,
    }));
    wait_for_session(&mut rx, |s| s.is_some()).await;
    assert_eq!(binding.current().unwrap().principal.as_str(), "uid-7");

    provider.set_auth_state(None);
    wait_for_session(&mut rx, |s| s.is_none()).await;
}

#[tokio::test]
async fn test_explicit_sign_out_clears_demo_session() {
    let (_, binding, _) = setup();
    binding.demo_login("tester@uos.ac.kr", "테스터");
    binding.sign_out().await;
    assert!(binding.current().is_none());
}

#[tokio::test]
async fn test_password_reset_passes_through() {
    let (provider, binding, _) = setup();
    provider.sign_up("a@b.c", "secret123", "A").await.unwrap();
    binding.send_password_reset("a@b.c").await.unwrap();
    assert_eq!(provider.password_resets(), vec!["a@b.c"]);
    let err = binding.send_password_reset(" ").await.unwrap_err();
    assert_eq!(err.code, AuthErrorCode::MissingField);
}
