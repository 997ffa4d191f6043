//! Career features: cover letters, reference materials, career predictions
//! and gap analysis.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use condot_core::{
    Card, CareerGapAnalysis, CareerPrediction, Error, JobApplication, ReferenceMaterial, Result,
};
use condot_db::ApplicationStore;
use condot_inference::{CareerAdvisor, PostingContext};

/// Who may see predictions and gap analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CareerAccess {
    pub is_test_mode: bool,
    pub is_admin: bool,
    pub trial: bool,
}

impl CareerAccess {
    pub fn allows(&self) -> bool {
        self.is_test_mode || self.is_admin || self.trial
    }

    fn check(&self) -> Result<()> {
        if self.allows() {
            Ok(())
        } else {
            Err(Error::Forbidden(
                "career recommendations are not open yet".to_string(),
            ))
        }
    }
}

/// A generated cover letter and the application it was filed under.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverLetter {
    pub text: String,
    pub application_id: String,
    pub saved_locally: bool,
}

fn require(value: &str, message: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::InvalidInput(message.to_string()));
    }
    Ok(())
}

/// Stateless front for the career calls. Storage stays with the caller.
#[derive(Clone)]
pub struct CareerService {
    advisor: Arc<dyn CareerAdvisor>,
}

impl CareerService {
    pub fn new(advisor: Arc<dyn CareerAdvisor>) -> Self {
        Self { advisor }
    }

    /// Write a cover letter from the whole archive and file it as a new
    /// `준비중` application. Nothing is saved when generation fails.
    pub async fn generate_cover_letter(
        &self,
        posting: &PostingContext,
        cards: &[Card],
        references: &[ReferenceMaterial],
        applications: &ApplicationStore,
    ) -> Result<CoverLetter> {
        if posting.company.trim().is_empty() || posting.job_description.trim().is_empty() {
            return Err(Error::InvalidInput(
                "기업명과 공고 내용을 입력해주세요.".to_string(),
            ));
        }

        let text = self
            .advisor
            .cover_letter(posting, cards, references)
            .await
            .map_err(Error::from)?;

        let mut application = JobApplication::new(posting.company.trim(), posting.job_role.trim());
        application.cover_letter = text.clone();
        application.job_role = Some(posting.job_role.clone());
        application.experience_level = Some(posting.experience_level.clone());
        application.company_type = Some(posting.company_type.clone());

        let outcome = applications.create(application).await?;
        info!(
            subsystem = "session",
            component = "career",
            op = "cover_letter",
            application_id = outcome.id(),
            card_count = cards.len(),
            reference_count = references.len(),
            "Cover letter filed"
        );
        Ok(CoverLetter {
            text,
            application_id: outcome.id().to_string(),
            saved_locally: outcome.is_local(),
        })
    }

    /// Parse a raw successful cover letter into a reference. Admins only.
    pub async fn add_reference(&self, is_admin: bool, raw: &str) -> Result<ReferenceMaterial> {
        if !is_admin {
            return Err(Error::Forbidden(
                "only the administrator can add reference materials".to_string(),
            ));
        }
        require(raw, "reference text is required")?;
        let reference = self.advisor.parse_reference(raw).await.map_err(|e| {
            warn!(
                subsystem = "session",
                component = "career",
                op = "parse_reference",
                error = %e,
                "Reference parsing failed"
            );
            Error::from(e)
        })?;
        Ok(reference)
    }

    pub async fn predict(
        &self,
        access: CareerAccess,
        cards: &[Card],
    ) -> Result<Vec<CareerPrediction>> {
        access.check()?;
        if cards.is_empty() {
            return Err(Error::InvalidInput(
                "분석할 경험 데이터가 없습니다. 먼저 경험을 입력해주세요.".to_string(),
            ));
        }
        Ok(self.advisor.predict_careers(cards).await?)
    }

    pub async fn analyze_gap(
        &self,
        access: CareerAccess,
        target_role: &str,
        cards: &[Card],
    ) -> Result<CareerGapAnalysis> {
        access.check()?;
        require(target_role, "목표 직무를 입력해주세요.")?;
        Ok(self.advisor.analyze_gap(target_role.trim(), cards).await?)
    }
}
