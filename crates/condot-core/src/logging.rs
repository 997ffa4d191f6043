//! Structured logging field names shared by every CONDOT crate.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Process cannot continue (startup misconfiguration) |
//! | WARN  | Automatic fallback applied: offline substitution, local-only create, demo login |
//! | INFO  | Lifecycle events: startup, session bound/unbound, subscription opened |
//! | DEBUG | Decision points: routing an utterance, skipping a remote write |
//! | TRACE | Per-document iteration |
//!
//! A degradation the user can keep working through is never logged at ERROR.

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "api", "store", "inference", "session", "identity"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "synced_collection", "global_config", "conversation", "openai"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "subscribe", "create", "structure", "modify", "toggle"
pub const OPERATION: &str = "op";

/// Store partition key of the signed-in principal.
pub const PRINCIPAL: &str = "principal";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Card id being operated on.
pub const CARD_ID: &str = "card_id";

/// Store collection path.
pub const COLLECTION: &str = "collection";

/// Conversation state at the time of the event.
pub const CONVERSATION_STATE: &str = "conversation_state";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of records in a snapshot.
pub const RECORD_COUNT: &str = "record_count";

/// Byte length of a prompt.
pub const PROMPT_LEN: &str = "prompt_len";

/// Byte length of a model response.
pub const RESPONSE_LEN: &str = "response_len";

// ─── Store fields ──────────────────────────────────────────────────────────

/// Current sync mode ("connecting", "online", "offline", "local_only").
pub const SYNC_MODE: &str = "sync_mode";

// ─── Inference fields ──────────────────────────────────────────────────────

/// Model name used for inference.
pub const MODEL: &str = "model";

/// Name of the strict output schema sent with the request.
pub const SCHEMA: &str = "schema";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
