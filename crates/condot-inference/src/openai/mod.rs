//! OpenAI-compatible generation backend.
//!
//! Works against any endpoint that speaks the chat-completions protocol with
//! `response_format: json_schema` (OpenAI, Azure OpenAI, vLLM, recent Ollama).
//!
//! # Example
//!
//! ```rust,no_run
//! use condot_inference::openai::{OpenAIBackend, OpenAIConfig};
//! use condot_core::GenerationBackend;
//!
//! #[tokio::main]
//! async fn main() {
//!     let backend = OpenAIBackend::from_env().unwrap();
//!     let text = backend.generate("자기소개를 한 문장으로").await.unwrap();
//!     println!("{text}");
//! }
//! ```

mod backend;
mod error;
mod types;

pub use backend::{OpenAIBackend, OpenAIConfig, DEFAULT_OPENAI_URL};
pub use error::{to_core_error, OpenAIErrorCode};
pub use types::*;
