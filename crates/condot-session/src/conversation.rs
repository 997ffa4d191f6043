//! Conversation State Machine.
//!
//! ```text
//! Idle                  --submit-->        AwaitingClassification
//! AwaitingClassification --ok-->           DraftActive   (fail: Idle)
//! DraftActive           --submit-->        AwaitingModification
//! AwaitingModification  --ok / fail-->     DraftActive
//! DraftActive           --start edit-->    ManualEditing
//! ManualEditing         --commit / cancel--> DraftActive
//! DraftActive | ManualEditing --save / cancel--> Idle
//! ```
//!
//! The state lock is never held across a classifier call. Each call records
//! the epoch it started in; `cancel` and `save` advance the epoch, so a result
//! arriving afterwards is discarded instead of resurrecting a draft.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, warn};

use condot_core::{Card, CardDraft, CardEdit, EventBus, ServerEvent};
use condot_db::{CardStore, CreateOutcome};
use condot_inference::{ClassifyError, ExperienceClassifier};

// =============================================================================
// ASSISTANT COPY
// =============================================================================

pub const GREETING: &str = "안녕하세요! 당신의 소중한 경험을 기록해드릴게요. 어떤 활동을 하셨나요? (예: \"지난달에 해커톤에 참여해서 대상을 받았어\")";
pub const DRAFT_CREATED: &str = "짜잔! 경험 카드를 만들었어요. 내용을 확인해보세요.";
pub const DRAFT_MODIFIED: &str = "카드를 수정했습니다. 더 수정하거나 저장할 수 있습니다.";
pub const ANALYSIS_FAILED: &str = "죄송합니다. 분석에 실패했습니다. 다시 말씀해 주시겠어요?";
pub const SAVED: &str = "보관함에 저장했습니다! 또 다른 경험이 있으신가요?";
pub const CANCELLED: &str = "카드 생성을 취소했습니다. 새로운 경험을 이야기해주세요.";

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationState {
    Idle,
    AwaitingClassification,
    DraftActive,
    ManualEditing,
    AwaitingModification,
}

impl ConversationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::AwaitingClassification => "awaiting_classification",
            Self::DraftActive => "draft_active",
            Self::ManualEditing => "manual_editing",
            Self::AwaitingModification => "awaiting_modification",
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            Self::AwaitingClassification | Self::AwaitingModification
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    Assistant,
    User,
}

/// One message in the transcript. Assistant turns may carry the card they
/// produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Turn {
    pub id: u64,
    pub speaker: Speaker,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card: Option<Card>,
}

/// Point-in-time copy of the conversation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationSnapshot {
    pub state: ConversationState,
    pub turns: Vec<Turn>,
    pub draft: Option<Card>,
    /// Uncommitted manual-edit buffer.
    pub editing: Option<Card>,
}

/// Why a conversation command was rejected. No classifier call was made.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConversationError {
    #[error("utterance is empty")]
    EmptyUtterance,

    #[error("a classifier call is already in flight")]
    Busy,

    #[error("수정을 완료하거나 취소한 후 메시지를 보내주세요.")]
    ManualEditingActive,

    #[error("no draft is active")]
    NoActiveDraft,

    #[error("manual editing is not open")]
    NotEditing,
}

/// What a submitted utterance led to.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// A new draft was structured from the utterance.
    Drafted(Card),
    /// The active draft was replaced by a modified one.
    Modified(Card),
    /// The classifier failed; the previous state is kept and a retry prompt
    /// was appended.
    Failed(ClassifyError),
    /// The conversation was cancelled or saved while the call was pending.
    Discarded,
}

enum Route {
    Structure,
    Modify(Card),
}

struct Inner {
    state: ConversationState,
    turns: Vec<Turn>,
    draft: Option<Card>,
    editing: Option<Card>,
    epoch: u64,
    next_turn_id: u64,
}

impl Inner {
    fn push(&mut self, speaker: Speaker, text: &str, card: Option<Card>) {
        let id = self.next_turn_id;
        self.next_turn_id += 1;
        self.turns.push(Turn {
            id,
            speaker,
            text: text.to_string(),
            card,
        });
    }
}

// =============================================================================
// CONVERSATION
// =============================================================================

/// Drafting conversation of one session. At most one draft is active.
pub struct Conversation {
    classifier: Arc<dyn ExperienceClassifier>,
    principal: String,
    events: Arc<EventBus>,
    inner: Mutex<Inner>,
}

impl Conversation {
    pub fn new(
        classifier: Arc<dyn ExperienceClassifier>,
        principal: impl Into<String>,
        events: Arc<EventBus>,
    ) -> Self {
        let mut inner = Inner {
            state: ConversationState::Idle,
            turns: Vec::new(),
            draft: None,
            editing: None,
            epoch: 0,
            next_turn_id: 1,
        };
        inner.push(Speaker::Assistant, GREETING, None);
        Self {
            classifier,
            principal: principal.into(),
            events,
            inner: Mutex::new(inner),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn announce(&self, inner: &Inner) {
        self.events.emit_for(
            &self.principal,
            ServerEvent::ConversationChanged {
                state: inner.state.as_str().to_string(),
                turns: inner.turns.len(),
            },
        );
    }

    pub fn state(&self) -> ConversationState {
        self.lock().state
    }

    pub fn snapshot(&self) -> ConversationSnapshot {
        let inner = self.lock();
        ConversationSnapshot {
            state: inner.state,
            turns: inner.turns.clone(),
            draft: inner.draft.clone(),
            editing: inner.editing.clone(),
        }
    }

    /// Submit a user utterance.
    ///
    /// With no draft it is structured into a new one; with an active draft it
    /// is an edit instruction for that draft. Rejected without a classifier
    /// call when empty, while a call is pending, or during manual editing.
    pub async fn submit(&self, text: &str) -> Result<SubmitOutcome, ConversationError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ConversationError::EmptyUtterance);
        }

        let (route, epoch) = {
            let mut inner = self.lock();
            let route = match inner.state {
                ConversationState::AwaitingClassification
                | ConversationState::AwaitingModification => {
                    return Err(ConversationError::Busy)
                }
                ConversationState::ManualEditing => {
                    return Err(ConversationError::ManualEditingActive)
                }
                ConversationState::Idle => {
                    inner.state = ConversationState::AwaitingClassification;
                    Route::Structure
                }
                ConversationState::DraftActive => match inner.draft.clone() {
                    Some(card) => {
                        inner.state = ConversationState::AwaitingModification;
                        Route::Modify(card)
                    }
                    None => {
                        inner.state = ConversationState::AwaitingClassification;
                        Route::Structure
                    }
                },
            };
            inner.push(Speaker::User, text, None);
            self.announce(&inner);
            (route, inner.epoch)
        };

        let start = Instant::now();
        match route {
            Route::Structure => {
                debug!(
                    subsystem = "session",
                    component = "conversation",
                    op = "structure",
                    principal = %self.principal,
                    "Routing utterance to structure"
                );
                let result = self.classifier.structure(text).await;
                Ok(self.finish_structure(epoch, result, start))
            }
            Route::Modify(current) => {
                debug!(
                    subsystem = "session",
                    component = "conversation",
                    op = "modify",
                    principal = %self.principal,
                    "Routing utterance to modify the active draft"
                );
                let result = self.classifier.modify(&current.to_draft(), text).await;
                Ok(self.finish_modify(epoch, current, result, start))
            }
        }
    }

    fn finish_structure(
        &self,
        epoch: u64,
        result: Result<CardDraft, ClassifyError>,
        start: Instant,
    ) -> SubmitOutcome {
        let mut inner = self.lock();
        if inner.epoch != epoch {
            debug!(
                subsystem = "session",
                component = "conversation",
                principal = %self.principal,
                "Discarding structure result from a cancelled turn"
            );
            return SubmitOutcome::Discarded;
        }
        let outcome = match result {
            Ok(draft) => {
                let card = Card::from_draft(draft);
                inner.state = ConversationState::DraftActive;
                inner.draft = Some(card.clone());
                inner.push(Speaker::Assistant, DRAFT_CREATED, Some(card.clone()));
                info!(
                    subsystem = "session",
                    component = "conversation",
                    op = "structure",
                    principal = %self.principal,
                    category = %card.category,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Draft created"
                );
                SubmitOutcome::Drafted(card)
            }
            Err(e) => {
                inner.state = ConversationState::Idle;
                inner.push(Speaker::Assistant, ANALYSIS_FAILED, None);
                warn!(
                    subsystem = "session",
                    component = "conversation",
                    op = "structure",
                    principal = %self.principal,
                    error = %e,
                    "Structuring failed, asking for a retry"
                );
                SubmitOutcome::Failed(e)
            }
        };
        self.announce(&inner);
        outcome
    }

    fn finish_modify(
        &self,
        epoch: u64,
        current: Card,
        result: Result<CardDraft, ClassifyError>,
        start: Instant,
    ) -> SubmitOutcome {
        let mut inner = self.lock();
        if inner.epoch != epoch {
            debug!(
                subsystem = "session",
                component = "conversation",
                principal = %self.principal,
                "Discarding modify result from a cancelled turn"
            );
            return SubmitOutcome::Discarded;
        }
        inner.state = ConversationState::DraftActive;
        let outcome = match result {
            Ok(draft) => {
                let mut card = current;
                card.apply_draft(draft);
                inner.draft = Some(card.clone());
                inner.push(Speaker::Assistant, DRAFT_MODIFIED, Some(card.clone()));
                info!(
                    subsystem = "session",
                    component = "conversation",
                    op = "modify",
                    principal = %self.principal,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Draft modified"
                );
                SubmitOutcome::Modified(card)
            }
            Err(e) => {
                inner.push(Speaker::Assistant, ANALYSIS_FAILED, None);
                warn!(
                    subsystem = "session",
                    component = "conversation",
                    op = "modify",
                    principal = %self.principal,
                    error = %e,
                    "Modification failed, keeping the previous draft"
                );
                SubmitOutcome::Failed(e)
            }
        };
        self.announce(&inner);
        outcome
    }

    // =========================================================================
    // MANUAL EDITING
    // =========================================================================

    /// Open the active draft for direct field edits.
    pub fn start_manual_edit(&self) -> Result<Card, ConversationError> {
        let mut inner = self.lock();
        match inner.state {
            ConversationState::DraftActive => {}
            ConversationState::ManualEditing => return Err(ConversationError::ManualEditingActive),
            state if state.is_pending() => return Err(ConversationError::Busy),
            _ => return Err(ConversationError::NoActiveDraft),
        }
        let draft = inner.draft.clone().ok_or(ConversationError::NoActiveDraft)?;
        inner.editing = Some(draft.clone());
        inner.state = ConversationState::ManualEditing;
        self.announce(&inner);
        Ok(draft)
    }

    /// Apply field edits to the edit buffer. The draft is untouched until commit.
    pub fn edit(&self, edit: &CardEdit) -> Result<Card, ConversationError> {
        let mut inner = self.lock();
        if inner.state != ConversationState::ManualEditing {
            return Err(ConversationError::NotEditing);
        }
        let buffer = inner.editing.as_mut().ok_or(ConversationError::NotEditing)?;
        edit.apply_to(buffer);
        Ok(buffer.clone())
    }

    /// Replace the draft with the edit buffer and return to `DraftActive`.
    pub fn commit_manual_edit(&self) -> Result<Card, ConversationError> {
        let mut inner = self.lock();
        if inner.state != ConversationState::ManualEditing {
            return Err(ConversationError::NotEditing);
        }
        let edited = inner.editing.take().ok_or(ConversationError::NotEditing)?;
        inner.draft = Some(edited.clone());
        if let Some(turn) = inner.turns.iter_mut().rev().find(|t| t.card.is_some()) {
            turn.card = Some(edited.clone());
        }
        inner.state = ConversationState::DraftActive;
        self.announce(&inner);
        Ok(edited)
    }

    /// Drop the edit buffer and return to `DraftActive` unchanged.
    pub fn cancel_manual_edit(&self) -> Result<(), ConversationError> {
        let mut inner = self.lock();
        if inner.state != ConversationState::ManualEditing {
            return Err(ConversationError::NotEditing);
        }
        inner.editing = None;
        inner.state = ConversationState::DraftActive;
        self.announce(&inner);
        Ok(())
    }

    // =========================================================================
    // SAVE / CANCEL
    // =========================================================================

    /// Hand the active draft to the card store and return to `Idle`.
    ///
    /// Rejected while a manual edit is open; the edit must be committed or
    /// cancelled first. Store failures are absorbed by the
    /// store's local fallback; if the store still reports an error it is
    /// logged and `None` is returned, and the conversation is `Idle` either way.
    pub async fn save(
        &self,
        cards: &CardStore,
    ) -> Result<Option<CreateOutcome>, ConversationError> {
        let card = {
            let mut inner = self.lock();
            match inner.state {
                ConversationState::DraftActive => {}
                ConversationState::ManualEditing => {
                    return Err(ConversationError::ManualEditingActive)
                }
                state if state.is_pending() => return Err(ConversationError::Busy),
                _ => return Err(ConversationError::NoActiveDraft),
            }
            let card = inner.draft.take().ok_or(ConversationError::NoActiveDraft)?;
            inner.state = ConversationState::Idle;
            inner.epoch += 1;
            inner.push(Speaker::Assistant, SAVED, None);
            self.announce(&inner);
            card
        };

        match cards.create(card).await {
            Ok(outcome) => {
                info!(
                    subsystem = "session",
                    component = "conversation",
                    op = "save",
                    principal = %self.principal,
                    card_id = outcome.id(),
                    local = outcome.is_local(),
                    "Draft saved"
                );
                Ok(Some(outcome))
            }
            Err(e) => {
                warn!(
                    subsystem = "session",
                    component = "conversation",
                    op = "save",
                    principal = %self.principal,
                    error = %e,
                    "Card store rejected the draft"
                );
                Ok(None)
            }
        }
    }

    /// Discard the active draft and return to `Idle`.
    ///
    /// Also abandons a pending classifier call. Rejected while a manual edit
    /// is open. Returns `false` when there was nothing to cancel; repeated
    /// calls are no-ops.
    pub fn cancel(&self) -> Result<bool, ConversationError> {
        let mut inner = self.lock();
        if inner.state == ConversationState::ManualEditing {
            return Err(ConversationError::ManualEditingActive);
        }
        if inner.state == ConversationState::Idle && inner.draft.is_none() {
            return Ok(false);
        }
        inner.draft = None;
        inner.state = ConversationState::Idle;
        inner.epoch += 1;
        inner.push(Speaker::Assistant, CANCELLED, None);
        self.announce(&inner);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use condot_core::{Category, PortfolioContent};
    use condot_inference::ClassifyResult;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fake classifier: `structure` echoes the text into the title, `modify`
    /// appends the instruction as a keyword.
    #[derive(Default)]
    struct Echo {
        structure_calls: AtomicUsize,
        modify_calls: AtomicUsize,
    }

    #[async_trait]
    impl ExperienceClassifier for Echo {
        async fn structure(&self, text: &str) -> ClassifyResult<CardDraft> {
            self.structure_calls.fetch_add(1, Ordering::SeqCst);
            if text == "실패" {
                return Err(ClassifyError::MalformedJson("not json".into()));
            }
            Ok(CardDraft {
                title: text.to_string(),
                date_range: "2024.05".to_string(),
                year: 2024,
                summary: String::new(),
                category: Category::Competition,
                keywords: Vec::new(),
                content: PortfolioContent::default(),
            })
        }

        async fn modify(&self, current: &CardDraft, instruction: &str) -> ClassifyResult<CardDraft> {
            self.modify_calls.fetch_add(1, Ordering::SeqCst);
            let mut next = current.clone();
            next.keywords.push(instruction.to_string());
            Ok(next)
        }
    }

    fn conversation() -> (Arc<Echo>, Conversation) {
        let echo = Arc::new(Echo::default());
        let conv = Conversation::new(echo.clone(), "user-1", Arc::new(EventBus::default()));
        (echo, conv)
    }

    #[test]
    fn test_starts_idle_with_greeting() {
        let (_, conv) = conversation();
        let snap = conv.snapshot();
        assert_eq!(snap.state, ConversationState::Idle);
        assert_eq!(snap.turns.len(), 1);
        assert_eq!(snap.turns[0].text, GREETING);
    }

    #[tokio::test]
    async fn test_second_utterance_modifies_instead_of_structuring() {
        let (echo, conv) = conversation();
        conv.submit("해커톤 대상").await.unwrap();
        let outcome = conv.submit("리더십").await.unwrap();

        assert!(matches!(outcome, SubmitOutcome::Modified(ref c) if c.keywords == vec!["리더십"]));
        assert_eq!(echo.structure_calls.load(Ordering::SeqCst), 1);
        assert_eq!(echo.modify_calls.load(Ordering::SeqCst), 1);
        assert_eq!(conv.state(), ConversationState::DraftActive);
    }

    #[tokio::test]
    async fn test_structure_failure_returns_to_idle() {
        let (_, conv) = conversation();
        let outcome = conv.submit("실패").await.unwrap();
        assert!(matches!(outcome, SubmitOutcome::Failed(ClassifyError::MalformedJson(_))));
        let snap = conv.snapshot();
        assert_eq!(snap.state, ConversationState::Idle);
        assert!(snap.draft.is_none());
        assert_eq!(snap.turns.last().unwrap().text, ANALYSIS_FAILED);
    }

    #[tokio::test]
    async fn test_blank_utterance_makes_no_call() {
        let (echo, conv) = conversation();
        assert_eq!(conv.submit("   ").await, Err(ConversationError::EmptyUtterance));
        assert_eq!(echo.structure_calls.load(Ordering::SeqCst), 0);
        assert_eq!(conv.snapshot().turns.len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_is_idempotent() {
        let (_, conv) = conversation();
        conv.submit("봉사활동").await.unwrap();
        assert_eq!(conv.cancel(), Ok(true));
        let once = conv.snapshot();
        assert_eq!(conv.cancel(), Ok(false));
        assert_eq!(conv.snapshot(), once);
        assert_eq!(once.state, ConversationState::Idle);
        assert!(once.draft.is_none());
    }

    #[tokio::test]
    async fn test_manual_edit_commit_updates_card_turn() {
        let (_, conv) = conversation();
        conv.submit("인턴").await.unwrap();
        conv.start_manual_edit().unwrap();
        let buffer = conv
            .edit(&CardEdit {
                title: Some("하계 인턴".to_string()),
                ..CardEdit::default()
            })
            .unwrap();
        assert_eq!(buffer.title, "하계 인턴");
        assert_eq!(conv.snapshot().draft.unwrap().title, "인턴");

        let committed = conv.commit_manual_edit().unwrap();
        let snap = conv.snapshot();
        assert_eq!(snap.state, ConversationState::DraftActive);
        assert_eq!(snap.draft, Some(committed.clone()));
        assert_eq!(snap.turns.last().unwrap().card, Some(committed));
    }

    #[tokio::test]
    async fn test_manual_edit_requires_draft() {
        let (_, conv) = conversation();
        assert_eq!(conv.start_manual_edit(), Err(ConversationError::NoActiveDraft));
        assert_eq!(conv.cancel_manual_edit(), Err(ConversationError::NotEditing));
        assert_eq!(
            conv.edit(&CardEdit::default()),
            Err(ConversationError::NotEditing)
        );
    }
}
