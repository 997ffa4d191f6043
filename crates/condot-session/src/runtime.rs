//! Session runtime: builds and tears down the per-principal session as the
//! identity binding changes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use tokio::task::JoinHandle;
use tracing::{debug, info};

use condot_core::defaults::{ADMIN_EMAIL, APP_ID};
use condot_core::{
    AuthError, CareerGapAnalysis, CareerPrediction, DocumentStore, Error, EventBus, GlobalConfig,
    IdentityProvider, ReferenceMaterial, Result, SyncMode,
};
use condot_db::{ApplicationStore, CardStore, GlobalConfigSync, SyncModeHandle};
use condot_inference::{CareerAdvisor, ExperienceClassifier, PostingContext};

use crate::career::{CareerAccess, CareerService, CoverLetter};
use crate::conversation::Conversation;
use crate::identity::{IdentityBinding, PrincipalId, SessionContext};

// =============================================================================
// CONFIG
// =============================================================================

/// Deployment settings for the session layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Store namespace (`artifacts/{app_id}/...`).
    pub app_id: String,
    pub admin_email: String,
    pub enable_attachments: bool,
    pub enable_career: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            app_id: APP_ID.to_string(),
            admin_email: ADMIN_EMAIL.to_string(),
            enable_attachments: true,
            enable_career: true,
        }
    }
}

fn env_flag(name: &str, default: bool) -> Result<bool> {
    match std::env::var(name) {
        Ok(value) => match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => Err(Error::Config(format!(
                "{} must be a boolean, got {:?}",
                name, other
            ))),
        },
        Err(_) => Ok(default),
    }
}

impl SessionConfig {
    /// Read `CONDOT_APP_ID`, `CONDOT_ADMIN_EMAIL`, `CONDOT_ENABLE_ATTACHMENTS`
    /// and `CONDOT_ENABLE_CAREER`, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            app_id: std::env::var("CONDOT_APP_ID").unwrap_or(defaults.app_id),
            admin_email: std::env::var("CONDOT_ADMIN_EMAIL").unwrap_or(defaults.admin_email),
            enable_attachments: env_flag("CONDOT_ENABLE_ATTACHMENTS", defaults.enable_attachments)?,
            enable_career: env_flag("CONDOT_ENABLE_CAREER", defaults.enable_career)?,
        })
    }
}

// =============================================================================
// ACTIVE SESSION
// =============================================================================

/// Everything owned by one signed-in principal.
pub struct ActiveSession {
    principal: PrincipalId,
    context: Mutex<SessionContext>,
    mode: SyncModeHandle,
    cards: CardStore,
    applications: ApplicationStore,
    conversation: Conversation,
    references: Mutex<Vec<ReferenceMaterial>>,
    trial: AtomicBool,
}

impl ActiveSession {
    fn build(
        context: SessionContext,
        store: Arc<dyn DocumentStore>,
        classifier: Arc<dyn ExperienceClassifier>,
        app_id: &str,
        events: Arc<EventBus>,
    ) -> Self {
        let principal = context.principal.to_string();
        let mode = if context.is_demo() {
            SyncModeHandle::local_only()
        } else {
            SyncModeHandle::default()
        };
        let cards = CardStore::new(
            store.clone(),
            app_id,
            &principal,
            mode.clone(),
            events.clone(),
        );
        let applications =
            ApplicationStore::new(store, app_id, &principal, mode.clone(), events.clone());
        let conversation = Conversation::new(classifier, principal.clone(), events);

        if context.is_demo() {
            cards.seed_samples();
        } else {
            cards.subscribe();
            applications.subscribe();
        }

        info!(
            subsystem = "session",
            component = "runtime",
            principal = %principal,
            sync_mode = %mode.get(),
            "Session started"
        );

        Self {
            principal: context.principal.clone(),
            context: Mutex::new(context),
            mode,
            cards,
            applications,
            conversation,
            references: Mutex::new(Vec::new()),
            trial: AtomicBool::new(false),
        }
    }

    fn teardown(&self) {
        self.cards.unsubscribe();
        self.applications.unsubscribe();
        info!(
            subsystem = "session",
            component = "runtime",
            principal = %self.principal,
            "Session torn down"
        );
    }

    fn lock_context(&self) -> MutexGuard<'_, SessionContext> {
        match self.context.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Principal and profile as last reported by the identity binding.
    pub fn context(&self) -> SessionContext {
        self.lock_context().clone()
    }

    pub fn principal(&self) -> &str {
        self.principal.as_str()
    }

    pub fn is_admin(&self) -> bool {
        self.lock_context().is_admin()
    }

    /// Swap in a newer profile for the same principal. Returns whether
    /// anything changed.
    fn refresh_context(&self, next: SessionContext) -> bool {
        let mut context = self.lock_context();
        if *context == next {
            return false;
        }
        *context = next;
        true
    }

    pub fn sync_mode(&self) -> SyncMode {
        self.mode.get()
    }

    pub fn cards(&self) -> &CardStore {
        &self.cards
    }

    pub fn applications(&self) -> &ApplicationStore {
        &self.applications
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    fn lock_references(&self) -> MutexGuard<'_, Vec<ReferenceMaterial>> {
        match self.references.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn references(&self) -> Vec<ReferenceMaterial> {
        self.lock_references().clone()
    }

    /// Unlock career recommendations for this session only.
    pub fn start_trial(&self) {
        self.trial.store(true, Ordering::SeqCst);
    }

    pub fn trial_active(&self) -> bool {
        self.trial.load(Ordering::SeqCst)
    }
}

// =============================================================================
// RUNTIME
// =============================================================================

/// The single interactive session hosted by this process.
pub struct SessionRuntime {
    config: SessionConfig,
    store: Arc<dyn DocumentStore>,
    classifier: Arc<dyn ExperienceClassifier>,
    career: CareerService,
    identity: IdentityBinding,
    global_config: GlobalConfigSync,
    events: Arc<EventBus>,
    active: Mutex<Option<Arc<ActiveSession>>>,
    follower: Mutex<Option<JoinHandle<()>>>,
}

impl SessionRuntime {
    pub fn new<C>(
        config: SessionConfig,
        store: Arc<dyn DocumentStore>,
        provider: Arc<dyn IdentityProvider>,
        classifier: Arc<C>,
    ) -> Arc<Self>
    where
        C: ExperienceClassifier + CareerAdvisor + 'static,
    {
        let events = Arc::new(EventBus::default());
        let identity = IdentityBinding::new(provider, config.admin_email.clone(), events.clone());
        let global_config = GlobalConfigSync::new(store.clone(), &config.app_id, events.clone());
        let advisor: Arc<dyn CareerAdvisor> = classifier.clone();
        Arc::new(Self {
            config,
            store,
            classifier,
            career: CareerService::new(advisor),
            identity,
            global_config,
            events,
            active: Mutex::new(None),
            follower: Mutex::new(None),
        })
    }

    /// Subscribe to the shared config, follow the provider's auth state and
    /// keep the active session in step with it.
    pub fn start(self: &Arc<Self>) {
        self.global_config.subscribe();
        self.identity.listen();

        let weak: Weak<Self> = Arc::downgrade(self);
        let mut rx = self.identity.watch();
        let handle = tokio::spawn(async move {
            loop {
                let context = rx.borrow_and_update().clone();
                match weak.upgrade() {
                    Some(runtime) => runtime.rebind(context),
                    None => break,
                }
                if rx.changed().await.is_err() {
                    break;
                }
            }
        });

        let mut follower = match self.follower.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(previous) = follower.replace(handle) {
            previous.abort();
        }
    }

    /// Stop every background task and tear down the active session.
    pub fn shutdown(&self) {
        if let Some(handle) = self.take_follower() {
            handle.abort();
        }
        self.identity.stop();
        self.global_config.unsubscribe();
        self.rebind(None);
    }

    fn take_follower(&self) -> Option<JoinHandle<()>> {
        let mut follower = match self.follower.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        follower.take()
    }

    fn lock_active(&self) -> MutexGuard<'_, Option<Arc<ActiveSession>>> {
        match self.active.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Make the active session match `context`. Same principal is a no-op.
    fn rebind(&self, context: Option<SessionContext>) {
        let mut active = self.lock_active();
        match (active.as_ref(), context.as_ref()) {
            (Some(current), Some(next)) if current.principal == next.principal => {
                if current.refresh_context(next.clone()) {
                    info!(
                        subsystem = "session",
                        component = "runtime",
                        principal = %next.principal,
                        is_admin = next.user.is_admin,
                        "Session profile refreshed"
                    );
                } else {
                    debug!(
                        subsystem = "session",
                        component = "runtime",
                        "Session unchanged"
                    );
                }
                return;
            }
            (None, None) => {
                debug!(
                    subsystem = "session",
                    component = "runtime",
                    "Session unchanged"
                );
                return;
            }
            _ => {}
        }
        if let Some(previous) = active.take() {
            previous.teardown();
        }
        *active = context.map(|context| {
            Arc::new(ActiveSession::build(
                context,
                self.store.clone(),
                self.classifier.clone(),
                &self.config.app_id,
                self.events.clone(),
            ))
        });
    }

    fn sync_with_identity(&self) {
        self.rebind(self.identity.current());
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn identity(&self) -> &IdentityBinding {
        &self.identity
    }

    pub fn global_config(&self) -> GlobalConfig {
        self.global_config.current()
    }

    pub fn active(&self) -> Option<Arc<ActiveSession>> {
        self.lock_active().clone()
    }

    /// The active session, or `Unauthorized` when nobody is signed in.
    pub fn require_session(&self) -> Result<Arc<ActiveSession>> {
        self.active()
            .ok_or_else(|| Error::Unauthorized("sign in first".to_string()))
    }

    // =========================================================================
    // IDENTITY
    // =========================================================================

    pub async fn sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> std::result::Result<SessionContext, AuthError> {
        let context = self.identity.sign_in(email, password).await?;
        self.sync_with_identity();
        Ok(context)
    }

    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> std::result::Result<SessionContext, AuthError> {
        let context = self.identity.sign_up(email, password, display_name).await?;
        self.sync_with_identity();
        Ok(context)
    }

    pub async fn sign_in_with_oauth(
        &self,
        provider: &str,
    ) -> std::result::Result<SessionContext, AuthError> {
        let context = self.identity.sign_in_with_oauth(provider).await?;
        self.sync_with_identity();
        Ok(context)
    }

    pub fn demo_login(&self, email: &str, name: &str) -> SessionContext {
        let context = self.identity.demo_login(email, name);
        self.sync_with_identity();
        context
    }

    pub async fn send_password_reset(&self, email: &str) -> std::result::Result<(), AuthError> {
        self.identity.send_password_reset(email).await
    }

    pub async fn sign_out(&self) {
        self.identity.sign_out().await;
        self.sync_with_identity();
    }

    // =========================================================================
    // GLOBAL CONFIG
    // =========================================================================

    /// Flip the shared test-mode flag. Admins only.
    pub async fn toggle_test_mode(&self) -> Result<bool> {
        let session = self.require_session()?;
        self.global_config.toggle(session.is_admin()).await
    }

    // =========================================================================
    // CAREER
    // =========================================================================

    fn career_access(&self, session: &ActiveSession) -> CareerAccess {
        CareerAccess {
            is_test_mode: self.global_config.current().is_test_mode,
            is_admin: session.is_admin(),
            trial: session.trial_active(),
        }
    }

    fn require_career(&self) -> Result<()> {
        if self.config.enable_career {
            Ok(())
        } else {
            Err(Error::NotFound("career features are disabled".to_string()))
        }
    }

    pub async fn generate_cover_letter(&self, posting: &PostingContext) -> Result<CoverLetter> {
        let session = self.require_session()?;
        self.career
            .generate_cover_letter(
                posting,
                &session.cards.cards(),
                &session.references(),
                &session.applications,
            )
            .await
    }

    /// Parse and keep a reference material for later cover letters.
    pub async fn add_reference(&self, raw: &str) -> Result<ReferenceMaterial> {
        let session = self.require_session()?;
        let reference = self
            .career
            .add_reference(session.is_admin(), raw)
            .await?;
        session.lock_references().push(reference.clone());
        Ok(reference)
    }

    pub async fn predict_careers(&self) -> Result<Vec<CareerPrediction>> {
        self.require_career()?;
        let session = self.require_session()?;
        let access = self.career_access(&session);
        self.career.predict(access, &session.cards.cards()).await
    }

    pub async fn analyze_gap(&self, target_role: &str) -> Result<CareerGapAnalysis> {
        self.require_career()?;
        let session = self.require_session()?;
        let access = self.career_access(&session);
        self.career
            .analyze_gap(access, target_role, &session.cards.cards())
            .await
    }

    pub fn start_trial(&self) -> Result<()> {
        self.require_career()?;
        self.require_session()?.start_trial();
        Ok(())
    }

    pub fn career_unlocked(&self) -> Result<bool> {
        let session = self.require_session()?;
        Ok(self.config.enable_career && self.career_access(&session).allows())
    }
}

impl Drop for SessionRuntime {
    fn drop(&mut self) {
        if let Some(handle) = self.take_follower() {
            handle.abort();
        }
    }
}
