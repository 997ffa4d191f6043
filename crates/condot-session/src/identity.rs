//! Session/Identity Binding.
//!
//! Maps provider users to display profiles, tracks the current session, and
//! falls back to a locally manufactured demo identity when the provider's
//! sign-in method is unavailable.

use std::fmt;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use condot_core::defaults::{
    AVATAR_SERVICE_URL, DEFAULT_DISPLAY_NAME, DEMO_DISPLAY_NAME, DEMO_PREFIX, OAUTH_DEMO_EMAIL,
    OAUTH_DEMO_NAME,
};
use condot_core::{
    AuthError, AuthErrorCode, EventBus, IdentityProvider, ProviderUser, ServerEvent, UserProfile,
};

// =============================================================================
// PRINCIPAL
// =============================================================================

/// Store partition key of a session: a provider uid or a `demo-` id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct PrincipalId(String);

impl PrincipalId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// `demo-` followed by the ASCII alphanumerics of the email.
    pub fn demo_from_email(email: &str) -> Self {
        let local: String = email.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
        Self(format!("{}{}", DEMO_PREFIX, local))
    }

    pub fn is_demo(&self) -> bool {
        self.0.starts_with(DEMO_PREFIX)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The signed-in principal and its profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionContext {
    pub principal: PrincipalId,
    pub user: UserProfile,
}

impl SessionContext {
    pub fn is_demo(&self) -> bool {
        self.principal.is_demo()
    }

    pub fn is_admin(&self) -> bool {
        self.user.is_admin
    }
}

fn generated_avatar(name: &str) -> String {
    format!(
        "{}?name={}&background=random",
        AVATAR_SERVICE_URL,
        name.replace(' ', "+")
    )
}

/// Profile shown for a provider user. Admin status is an exact email match.
pub fn profile_from_provider(user: &ProviderUser, admin_email: &str) -> UserProfile {
    let name = user
        .display_name
        .clone()
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| DEFAULT_DISPLAY_NAME.to_string());
    let email = user.email.clone().unwrap_or_default();
    let avatar_url = user
        .photo_url
        .clone()
        .filter(|u| !u.is_empty())
        .unwrap_or_else(|| generated_avatar(&name));
    UserProfile {
        is_admin: !email.is_empty() && email == admin_email,
        name,
        email,
        avatar_url,
    }
}

// =============================================================================
// BINDING
// =============================================================================

/// Holds the current session and follows the provider's auth state.
pub struct IdentityBinding {
    provider: Arc<dyn IdentityProvider>,
    admin_email: String,
    session: Arc<watch::Sender<Option<SessionContext>>>,
    events: Arc<EventBus>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl IdentityBinding {
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        admin_email: impl Into<String>,
        events: Arc<EventBus>,
    ) -> Self {
        let (session, _) = watch::channel(None);
        Self {
            provider,
            admin_email: admin_email.into(),
            session: Arc::new(session),
            events,
            task: Mutex::new(None),
        }
    }

    pub fn current(&self) -> Option<SessionContext> {
        self.session.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<Option<SessionContext>> {
        self.session.subscribe()
    }

    fn announce(events: &EventBus, session: Option<&SessionContext>) {
        events.emit(ServerEvent::SessionChanged {
            principal: session.map(|s| s.principal.to_string()),
            demo: session.is_some_and(SessionContext::is_demo),
        });
    }

    /// Apply one provider auth-state transition.
    ///
    /// A signed-in user replaces the session. A sign-out clears it unless the
    /// current session is a demo identity, which the provider never knew about.
    fn apply_provider_state(
        session: &watch::Sender<Option<SessionContext>>,
        events: &EventBus,
        admin_email: &str,
        user: Option<ProviderUser>,
    ) {
        match user {
            Some(user) => {
                let next = SessionContext {
                    principal: PrincipalId::new(user.uid.clone()),
                    user: profile_from_provider(&user, admin_email),
                };
                let changed = session.send_if_modified(|current| {
                    if current.as_ref() == Some(&next) {
                        return false;
                    }
                    *current = Some(next.clone());
                    true
                });
                if changed {
                    info!(
                        subsystem = "identity",
                        component = "binding",
                        principal = %next.principal,
                        is_admin = next.user.is_admin,
                        "Session bound"
                    );
                    Self::announce(events, Some(&next));
                }
            }
            None => {
                let cleared = session.send_if_modified(|current| match current {
                    Some(ctx) if ctx.is_demo() => false,
                    Some(_) => {
                        *current = None;
                        true
                    }
                    None => false,
                });
                if cleared {
                    info!(
                        subsystem = "identity",
                        component = "binding",
                        "Session cleared by provider"
                    );
                    Self::announce(events, None);
                } else {
                    debug!(
                        subsystem = "identity",
                        component = "binding",
                        "Provider sign-out ignored"
                    );
                }
            }
        }
    }

    /// Apply a provider auth-state value directly.
    pub fn handle_auth_state(&self, user: Option<ProviderUser>) {
        Self::apply_provider_state(&self.session, &self.events, &self.admin_email, user);
    }

    /// Follow the provider's auth-state channel until [`stop`](Self::stop).
    pub fn listen(&self) {
        let mut rx = self.provider.auth_state();
        let session = self.session.clone();
        let events = self.events.clone();
        let admin_email = self.admin_email.clone();

        let handle = tokio::spawn(async move {
            let initial = rx.borrow_and_update().clone();
            Self::apply_provider_state(&session, &events, &admin_email, initial);
            while rx.changed().await.is_ok() {
                let user = rx.borrow_and_update().clone();
                Self::apply_provider_state(&session, &events, &admin_email, user);
            }
        });

        let mut task = match self.task.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(previous) = task.replace(handle) {
            previous.abort();
        }
    }

    pub fn stop(&self) {
        let mut task = match self.task.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(handle) = task.take() {
            handle.abort();
        }
    }

    /// Bind a local demo identity. The store is never contacted for it, and
    /// a demo principal is never an admin whatever email it claims.
    pub fn demo_login(&self, email: &str, name: &str) -> SessionContext {
        let context = SessionContext {
            principal: PrincipalId::demo_from_email(email),
            user: UserProfile {
                name: name.to_string(),
                email: email.to_string(),
                avatar_url: String::new(),
                is_admin: false,
            },
        };
        warn!(
            subsystem = "identity",
            component = "binding",
            op = "demo_login",
            principal = %context.principal,
            "Switching to demo identity"
        );
        self.session.send_replace(Some(context.clone()));
        Self::announce(&self.events, Some(&context));
        context
    }

    fn bind_provider_user(&self, user: ProviderUser) -> SessionContext {
        self.handle_auth_state(Some(user.clone()));
        SessionContext {
            principal: PrincipalId::new(user.uid.clone()),
            user: profile_from_provider(&user, &self.admin_email),
        }
    }

    fn require(value: &str, field: &str) -> Result<(), AuthError> {
        if value.trim().is_empty() {
            return Err(AuthError::new(
                AuthErrorCode::MissingField,
                format!("{} is required", field),
            ));
        }
        Ok(())
    }

    /// Email/password sign-in. Falls back to a demo identity when the
    /// provider has the method disabled.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<SessionContext, AuthError> {
        Self::require(email, "email")?;
        Self::require(password, "password")?;
        match self.provider.sign_in_with_password(email, password).await {
            Ok(user) => Ok(self.bind_provider_user(user)),
            Err(e) if e.code.allows_demo_fallback() => {
                Ok(self.demo_login(email, DEMO_DISPLAY_NAME))
            }
            Err(e) => Err(e),
        }
    }

    /// Sign-up with a display name. Falls back to a demo identity named
    /// after the requested display name.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<SessionContext, AuthError> {
        Self::require(email, "email")?;
        Self::require(password, "password")?;
        Self::require(display_name, "display name")?;
        match self.provider.sign_up(email, password, display_name).await {
            Ok(user) => Ok(self.bind_provider_user(user)),
            Err(e) if e.code.allows_demo_fallback() => Ok(self.demo_login(email, display_name)),
            Err(e) => Err(e),
        }
    }

    /// OAuth sign-in. Falls back to the shared OAuth demo identity.
    pub async fn sign_in_with_oauth(&self, provider: &str) -> Result<SessionContext, AuthError> {
        match self.provider.sign_in_with_oauth(provider).await {
            Ok(user) => Ok(self.bind_provider_user(user)),
            Err(e) if e.code.allows_demo_fallback() => {
                Ok(self.demo_login(OAUTH_DEMO_EMAIL, OAUTH_DEMO_NAME))
            }
            Err(e) => Err(e),
        }
    }

    pub async fn send_password_reset(&self, email: &str) -> Result<(), AuthError> {
        Self::require(email, "email")?;
        self.provider.send_password_reset(email).await
    }

    /// Explicit sign-out. Clears any session, demo included.
    pub async fn sign_out(&self) {
        if let Err(e) = self.provider.sign_out().await {
            warn!(
                subsystem = "identity",
                component = "binding",
                op = "sign_out",
                error = %e,
                "Provider sign-out failed, clearing session anyway"
            );
        }
        let had_session = self.session.send_replace(None).is_some();
        if had_session {
            info!(
                subsystem = "identity",
                component = "binding",
                op = "sign_out",
                "Session cleared"
            );
            Self::announce(&self.events, None);
        }
    }
}

impl Drop for IdentityBinding {
    fn drop(&mut self) {
        self.stop();
    }
}
