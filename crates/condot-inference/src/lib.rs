//! # condot-inference
//!
//! Classifier gateway for CONDOT.
//!
//! This crate provides:
//! - [`Classifier`]: card structuring, instruction-driven modification, cover
//!   letters, reference parsing and career recommendations
//! - Strict output schemas derived from the card types, with parse-and-validate
//! - OpenAI-compatible generation backend (feature `openai`, default)
//! - Scripted mock backend (feature `mock`)
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use condot_inference::{Classifier, ExperienceClassifier, OpenAIBackend};
//!
//! #[tokio::main]
//! async fn main() {
//!     let backend = OpenAIBackend::from_env().unwrap();
//!     let classifier = Classifier::new(Arc::new(backend));
//!     let draft = classifier.structure("지난 학기에 교내 해커톤에서 대상을 받았어").await.unwrap();
//!     println!("{}", draft.title);
//! }
//! ```

pub mod classifier;
pub mod error;
pub mod prompts;
pub mod schema;

#[cfg(feature = "openai")]
pub mod openai;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use classifier::{CareerAdvisor, Classifier, ClassifyResult, ExperienceClassifier};
pub use error::ClassifyError;
pub use prompts::PostingContext;
pub use schema::{open_objects, output_schema, parse_strict};

#[cfg(feature = "openai")]
pub use openai::{OpenAIBackend, OpenAIConfig};

#[cfg(any(test, feature = "mock"))]
pub use mock::MockGenerationBackend;
