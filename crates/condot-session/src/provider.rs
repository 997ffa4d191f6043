//! In-process identity provider.
//!
//! Accounts live in memory with SHA-256 password digests. Switches simulate
//! the two provider failures that trigger the demo-login fallback.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::sync::watch;
use tracing::{debug, info};
use uuid::Uuid;

use condot_core::{AuthError, AuthErrorCode, IdentityProvider, ProviderUser};

/// Shortest password the provider accepts.
const MIN_PASSWORD_LEN: usize = 6;

struct Account {
    user: ProviderUser,
    password_digest: String,
}

fn digest(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Identity provider backed by an in-memory account table.
pub struct MemoryIdentityProvider {
    accounts: Mutex<HashMap<String, Account>>,
    oauth_users: Mutex<HashMap<String, ProviderUser>>,
    password_resets: Mutex<Vec<String>>,
    state: watch::Sender<Option<ProviderUser>>,
    password_disabled: AtomicBool,
    domain_unauthorized: AtomicBool,
}

impl Default for MemoryIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl MemoryIdentityProvider {
    pub fn new() -> Self {
        let (state, _) = watch::channel(None);
        Self {
            accounts: Mutex::new(HashMap::new()),
            oauth_users: Mutex::new(HashMap::new()),
            password_resets: Mutex::new(Vec::new()),
            state,
            password_disabled: AtomicBool::new(false),
            domain_unauthorized: AtomicBool::new(false),
        }
    }

    /// Reject email/password sign-in and sign-up with `operation-not-allowed`.
    pub fn disable_password_auth(&self, disabled: bool) {
        self.password_disabled.store(disabled, Ordering::SeqCst);
    }

    /// Reject OAuth sign-in with `unauthorized-domain`.
    pub fn reject_oauth_domain(&self, rejected: bool) {
        self.domain_unauthorized.store(rejected, Ordering::SeqCst);
    }

    /// Make `provider` available for OAuth sign-in as `user`.
    pub fn register_oauth_user(&self, provider: &str, user: ProviderUser) {
        lock(&self.oauth_users).insert(provider.to_lowercase(), user);
    }

    /// Emails that were sent a password reset, oldest first.
    pub fn password_resets(&self) -> Vec<String> {
        lock(&self.password_resets).clone()
    }

    /// Push an auth-state change as if it originated inside the provider
    /// (token expiry, sign-out in another tab).
    pub fn set_auth_state(&self, user: Option<ProviderUser>) {
        self.state.send_replace(user);
    }

    fn check_password_auth(&self) -> Result<(), AuthError> {
        if self.password_disabled.load(Ordering::SeqCst) {
            return Err(AuthError::new(
                AuthErrorCode::OperationNotAllowed,
                "email/password sign-in is disabled",
            ));
        }
        Ok(())
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
}

#[async_trait]
impl IdentityProvider for MemoryIdentityProvider {
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<ProviderUser, AuthError> {
        Self::require(email, "email")?;
        Self::require(password, "password")?;
        self.check_password_auth()?;

        let user = {
            let accounts = lock(&self.accounts);
            match accounts.get(&normalize_email(email)) {
                Some(account) if account.password_digest == digest(password) => {
                    account.user.clone()
                }
                _ => {
                    return Err(AuthError::new(
                        AuthErrorCode::InvalidCredential,
                        "wrong email or password",
                    ))
                }
            }
        };

        debug!(
            subsystem = "identity",
            component = "memory_provider",
            op = "sign_in",
            uid = %user.uid,
            "Password sign-in accepted"
        );
        self.state.send_replace(Some(user.clone()));
        Ok(user)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<ProviderUser, AuthError> {
        Self::require(email, "email")?;
        Self::require(password, "password")?;
        self.check_password_auth()?;
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::new(
                AuthErrorCode::WeakPassword,
                format!("password must be at least {} characters", MIN_PASSWORD_LEN),
            ));
        }

        let key = normalize_email(email);
        let user = {
            let mut accounts = lock(&self.accounts);
            if accounts.contains_key(&key) {
                return Err(AuthError::new(
                    AuthErrorCode::EmailAlreadyInUse,
                    "an account already exists for this email",
                ));
            }
            let user = ProviderUser {
                uid: Uuid::new_v4().simple().to_string(),
                display_name: Some(display_name.trim().to_string()).filter(|n| !n.is_empty()),
                email: Some(email.trim().to_string()),
                photo_url: None,
            };
            accounts.insert(
                key,
                Account {
                    user: user.clone(),
                    password_digest: digest(password),
                },
            );
            user
        };

        info!(
            subsystem = "identity",
            component = "memory_provider",
            op = "sign_up",
            uid = %user.uid,
            "Account created"
        );
        self.state.send_replace(Some(user.clone()));
        Ok(user)
    }

    async fn sign_in_with_oauth(&self, provider: &str) -> Result<ProviderUser, AuthError> {
        if self.domain_unauthorized.load(Ordering::SeqCst) {
            return Err(AuthError::new(
                AuthErrorCode::UnauthorizedDomain,
                "this domain is not authorized for OAuth sign-in",
            ));
        }
        let user = lock(&self.oauth_users)
            .get(&provider.to_lowercase())
            .cloned()
            .ok_or_else(|| {
                AuthError::new(
                    AuthErrorCode::OperationNotAllowed,
                    format!("OAuth provider {} is not enabled", provider),
                )
            })?;
        self.state.send_replace(Some(user.clone()));
        Ok(user)
    }

    async fn send_password_reset(&self, email: &str) -> Result<(), AuthError> {
        Self::require(email, "email")?;
        let key = normalize_email(email);
        if !lock(&self.accounts).contains_key(&key) {
            return Err(AuthError::new(
                AuthErrorCode::UserNotFound,
                "no account for this email",
            ));
        }
        lock(&self.password_resets).push(key);
        Ok(())
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.state.send_replace(None);
        Ok(())
    }

    fn auth_state(&self) -> watch::Receiver<Option<ProviderUser>> {
        self.state.subscribe()
    }
}
