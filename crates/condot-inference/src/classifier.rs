//! Classifier gateway: the two card operations plus the career-feature calls,
//! all over one structured-generation call shape.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use schemars::JsonSchema;
use serde::{de::DeserializeOwned, Deserialize};
use tracing::{debug, warn};

use condot_core::defaults::COVER_LETTER_FALLBACK;
use condot_core::{
    Card, CardDraft, CareerGapAnalysis, CareerPrediction, GenerationBackend, ReferenceMaterial,
};

use crate::error::ClassifyError;
use crate::prompts::{self, PostingContext};
use crate::schema::{output_schema, parse_strict};

/// Result of a classifier call.
pub type ClassifyResult<T> = std::result::Result<T, ClassifyError>;

// =============================================================================
// TRAITS
// =============================================================================

/// The two card operations the conversation depends on.
#[async_trait]
pub trait ExperienceClassifier: Send + Sync {
    /// Structure free text into a card draft.
    async fn structure(&self, text: &str) -> ClassifyResult<CardDraft>;

    /// Apply an edit instruction, returning a full replacement draft.
    async fn modify(&self, current: &CardDraft, instruction: &str) -> ClassifyResult<CardDraft>;
}

/// Cover letters, reference parsing, and career recommendations.
#[async_trait]
pub trait CareerAdvisor: Send + Sync {
    async fn cover_letter(
        &self,
        posting: &PostingContext,
        cards: &[Card],
        references: &[ReferenceMaterial],
    ) -> ClassifyResult<String>;

    async fn parse_reference(&self, raw: &str) -> ClassifyResult<ReferenceMaterial>;

    async fn predict_careers(&self, cards: &[Card]) -> ClassifyResult<Vec<CareerPrediction>>;

    async fn analyze_gap(&self, target_role: &str, cards: &[Card])
        -> ClassifyResult<CareerGapAnalysis>;
}

// =============================================================================
// WIRE SHAPES
// =============================================================================

/// Schema advertised for reference extraction. Every field is requested.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
#[allow(dead_code)]
struct ReferenceSchema {
    company: String,
    job_role: String,
    question: String,
    answer: String,
    key_capabilities: Vec<String>,
}

/// What is accepted back for reference extraction; gaps are filled in.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ReferenceAnswer {
    company: Option<String>,
    job_role: Option<String>,
    question: Option<String>,
    answer: Option<String>,
    key_capabilities: Vec<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct PredictionAnswer {
    role: String,
    compatibility: f64,
    reasoning: String,
    recommended_experiences: Vec<String>,
}

/// Predictions are wrapped in an object; structured output needs an object root.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
struct PredictionsAnswer {
    predictions: Vec<PredictionAnswer>,
}

fn non_blank(value: Option<String>, fallback: &str) -> String {
    value
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| fallback.to_string())
}

// =============================================================================
// CLASSIFIER
// =============================================================================

/// Classifier gateway over any [`GenerationBackend`]. Stateless between calls.
#[derive(Clone)]
pub struct Classifier {
    backend: Arc<dyn GenerationBackend>,
}

impl Classifier {
    pub fn new(backend: Arc<dyn GenerationBackend>) -> Self {
        Self { backend }
    }

    pub fn model_name(&self) -> &str {
        self.backend.model_name()
    }

    async fn call_structured<S, T>(&self, op: &str, schema_name: &str, prompt: &str) -> ClassifyResult<T>
    where
        S: JsonSchema,
        T: DeserializeOwned,
    {
        let schema = output_schema::<S>(schema_name)?;
        let start = Instant::now();
        let raw = self
            .backend
            .generate_structured(prompt, &schema)
            .await
            .map_err(|e| {
                warn!(
                    subsystem = "inference",
                    component = "classifier",
                    op,
                    model = self.backend.model_name(),
                    error = %e,
                    "Generation call failed"
                );
                ClassifyError::from(e)
            })?;

        debug!(
            subsystem = "inference",
            component = "classifier",
            op,
            schema = schema_name,
            model = self.backend.model_name(),
            prompt_len = prompt.len(),
            response_len = raw.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Generation call complete"
        );

        parse_strict(&raw).inspect_err(|e| {
            warn!(
                subsystem = "inference",
                component = "classifier",
                op,
                error = %e,
                "Rejected model output"
            );
        })
    }
}

#[async_trait]
impl ExperienceClassifier for Classifier {
    async fn structure(&self, text: &str) -> ClassifyResult<CardDraft> {
        self.call_structured::<CardDraft, CardDraft>(
            "structure",
            "experience_card",
            &prompts::structure(text),
        )
        .await
    }

    async fn modify(&self, current: &CardDraft, instruction: &str) -> ClassifyResult<CardDraft> {
        let prompt = prompts::modify(&prompts::draft_json(current), instruction);
        self.call_structured::<CardDraft, CardDraft>("modify", "experience_card", &prompt)
            .await
    }
}

#[async_trait]
impl CareerAdvisor for Classifier {
    async fn cover_letter(
        &self,
        posting: &PostingContext,
        cards: &[Card],
        references: &[ReferenceMaterial],
    ) -> ClassifyResult<String> {
        let prompt = prompts::cover_letter(posting, cards, references);
        let text = self.backend.generate(&prompt).await?;
        debug!(
            subsystem = "inference",
            component = "classifier",
            op = "cover_letter",
            prompt_len = prompt.len(),
            response_len = text.len(),
            "Cover letter generated"
        );
        if text.trim().is_empty() {
            return Ok(COVER_LETTER_FALLBACK.to_string());
        }
        Ok(text)
    }

    async fn parse_reference(&self, raw: &str) -> ClassifyResult<ReferenceMaterial> {
        let answer: ReferenceAnswer = self
            .call_structured::<ReferenceSchema, ReferenceAnswer>(
                "parse_reference",
                "reference_material",
                &prompts::parse_reference(raw),
            )
            .await?;
        Ok(ReferenceMaterial {
            id: uuid::Uuid::now_v7().to_string(),
            company: non_blank(answer.company, "Unknown"),
            job_role: non_blank(answer.job_role, "Unknown"),
            question: non_blank(answer.question, "Motivation"),
            answer: non_blank(answer.answer, raw),
            key_capabilities: answer.key_capabilities,
            created_at: Utc::now(),
        })
    }

    async fn predict_careers(&self, cards: &[Card]) -> ClassifyResult<Vec<CareerPrediction>> {
        let answer: PredictionsAnswer = self
            .call_structured::<PredictionsAnswer, PredictionsAnswer>(
                "predict_careers",
                "career_predictions",
                &prompts::predict_careers(cards),
            )
            .await?;
        Ok(answer
            .predictions
            .into_iter()
            .map(|p| CareerPrediction {
                role: p.role,
                compatibility: p.compatibility.round().clamp(0.0, 100.0) as u8,
                reasoning: p.reasoning,
                recommended_experiences: p.recommended_experiences,
            })
            .collect())
    }

    async fn analyze_gap(
        &self,
        target_role: &str,
        cards: &[Card],
    ) -> ClassifyResult<CareerGapAnalysis> {
        self.call_structured::<CareerGapAnalysis, CareerGapAnalysis>(
            "analyze_gap",
            "career_gap",
            &prompts::analyze_gap(target_role, cards),
        )
        .await
    }
}
