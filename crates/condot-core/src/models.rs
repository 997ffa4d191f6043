//! Domain models for the career archive.
//!
//! Field names on the wire follow the stored document layout: card and
//! application fields are camelCase (`dateRange`, `isFavorite`), while the
//! nested portfolio record keeps its snake_case keys (`skills_used`).

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::defaults;
use crate::Error;

// =============================================================================
// CATEGORY
// =============================================================================

/// Closed set of folders a card can live in.
///
/// Serialized as the Korean display label, which is also what the classifier
/// is constrained to emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum Category {
    #[serde(rename = "공모전")]
    Competition,
    #[serde(rename = "수업/교육")]
    Class,
    #[serde(rename = "외부 교육")]
    Training,
    #[serde(rename = "봉사활동")]
    Volunteer,
    #[serde(rename = "프로젝트")]
    Project,
    #[serde(rename = "논문/연구")]
    Paper,
    #[serde(rename = "인턴십")]
    Internship,
    #[serde(rename = "자격증")]
    Certificate,
    #[serde(rename = "어학")]
    Language,
    #[serde(rename = "동아리/학회")]
    Club,
    #[serde(rename = "아르바이트")]
    Work,
    #[serde(rename = "기타")]
    Other,
}

impl Category {
    /// All categories in folder display order.
    pub const ALL: [Category; 12] = [
        Category::Competition,
        Category::Class,
        Category::Training,
        Category::Volunteer,
        Category::Project,
        Category::Paper,
        Category::Internship,
        Category::Certificate,
        Category::Language,
        Category::Club,
        Category::Work,
        Category::Other,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Category::Competition => "공모전",
            Category::Class => "수업/교육",
            Category::Training => "외부 교육",
            Category::Volunteer => "봉사활동",
            Category::Project => "프로젝트",
            Category::Paper => "논문/연구",
            Category::Internship => "인턴십",
            Category::Certificate => "자격증",
            Category::Language => "어학",
            Category::Club => "동아리/학회",
            Category::Work => "아르바이트",
            Category::Other => "기타",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Category {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Category::ALL
            .iter()
            .copied()
            .find(|c| c.label() == s)
            .ok_or_else(|| Error::InvalidInput(format!("Unknown category: {}", s)))
    }
}

// =============================================================================
// EXPERIENCE CARD
// =============================================================================

/// Structured portfolio body of a card. Every field is always present.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct PortfolioContent {
    pub overview: String,
    pub role: String,
    pub skills_used: Vec<String>,
    pub outcomes: Vec<String>,
    pub learned: String,
}

/// Logical attachment type, inferred from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    Ppt,
    Report,
    Other,
}

impl AttachmentKind {
    pub fn from_file_name(name: &str) -> Self {
        let ext = name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "ppt" | "pptx" => AttachmentKind::Ppt,
            "pdf" | "doc" | "docx" | "hwp" => AttachmentKind::Report,
            _ => AttachmentKind::Other,
        }
    }
}

/// File metadata attached to a card. No bytes are uploaded; `url` is a
/// placeholder reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: String,
    pub name: String,
    pub url: String,
    #[serde(rename = "type")]
    pub kind: AttachmentKind,
    #[serde(default)]
    pub size: String,
}

impl Attachment {
    /// Build attachment metadata for an uploaded file of `size_bytes` bytes.
    pub fn from_upload(name: &str, size_bytes: u64) -> Self {
        let id = uuid::Uuid::now_v7().simple().to_string();
        Self {
            url: format!("attachment://{}/{}", id, name),
            kind: AttachmentKind::from_file_name(name),
            size: format_megabytes(size_bytes),
            name: name.to_string(),
            id,
        }
    }
}

/// Render a byte count as `"x.xx MB"`.
pub fn format_megabytes(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / 1024.0 / 1024.0)
}

/// The classifier's output contract: a card without store-managed fields.
///
/// Deserialization is strict. Every field is required, unknown fields are
/// rejected, and `category` must be one of the twelve labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CardDraft {
    pub title: String,
    pub date_range: String,
    pub year: i32,
    pub summary: String,
    pub category: Category,
    pub keywords: Vec<String>,
    pub content: PortfolioContent,
}

/// An experience card.
///
/// `id` is `None` for drafts and for records about to be written; the store
/// assigns it. Offline and sample records carry `local-`/`mock-` ids that are
/// never reconciled with store ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub title: String,
    pub date_range: String,
    pub year: i32,
    pub summary: String,
    pub category: Category,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub content: PortfolioContent,
    #[serde(default)]
    pub is_favorite: bool,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Card {
    /// A fresh, unsaved card from classifier output.
    pub fn from_draft(draft: CardDraft) -> Self {
        Self {
            id: None,
            title: draft.title,
            date_range: draft.date_range,
            year: draft.year,
            summary: draft.summary,
            category: draft.category,
            keywords: draft.keywords,
            content: draft.content,
            is_favorite: false,
            attachments: Vec::new(),
            created_at: None,
        }
    }

    /// The classifier-facing view of this card.
    pub fn to_draft(&self) -> CardDraft {
        CardDraft {
            title: self.title.clone(),
            date_range: self.date_range.clone(),
            year: self.year,
            summary: self.summary.clone(),
            category: self.category,
            keywords: self.keywords.clone(),
            content: self.content.clone(),
        }
    }

    /// Replace the classifier-owned fields, keeping id, favorite flag,
    /// attachments and creation time.
    pub fn apply_draft(&mut self, draft: CardDraft) {
        self.title = draft.title;
        self.date_range = draft.date_range;
        self.year = draft.year;
        self.summary = draft.summary;
        self.category = draft.category;
        self.keywords = draft.keywords;
        self.content = draft.content;
    }

    /// True when the id was minted locally (offline create or sample data).
    pub fn is_local(&self) -> bool {
        self.id.as_deref().is_some_and(is_local_id)
    }
}

/// Ids minted on the client side: offline creates and the built-in sample set.
pub fn is_local_id(id: &str) -> bool {
    id.starts_with(defaults::LOCAL_ID_PREFIX) || id.starts_with(defaults::SAMPLE_ID_PREFIX)
}

/// Partial field patch applied during manual editing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardEdit {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_range: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keywords: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<PortfolioContent>,
}

impl CardEdit {
    pub fn is_empty(&self) -> bool {
        *self == CardEdit::default()
    }

    pub fn apply_to(&self, card: &mut Card) {
        if let Some(title) = &self.title {
            card.title = title.clone();
        }
        if let Some(date_range) = &self.date_range {
            card.date_range = date_range.clone();
        }
        if let Some(year) = self.year {
            card.year = year;
        }
        if let Some(summary) = &self.summary {
            card.summary = summary.clone();
        }
        if let Some(category) = self.category {
            card.category = category;
        }
        if let Some(keywords) = &self.keywords {
            card.keywords = keywords.clone();
        }
        if let Some(content) = &self.content {
            card.content = content.clone();
        }
    }
}

// =============================================================================
// JOB APPLICATIONS
// =============================================================================

/// Pipeline stage of a job application. Any stage may follow any other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApplicationStatus {
    #[serde(rename = "준비중")]
    Preparing,
    #[serde(rename = "지원완료")]
    Applied,
    #[serde(rename = "서류합격")]
    DocumentPassed,
    #[serde(rename = "1차면접 합격")]
    FirstInterviewPassed,
    #[serde(rename = "2차면접 합격")]
    SecondInterviewPassed,
    #[serde(rename = "최종합격")]
    FinalPassed,
    #[serde(rename = "불합격")]
    Rejected,
}

impl ApplicationStatus {
    pub const ALL: [ApplicationStatus; 7] = [
        ApplicationStatus::Preparing,
        ApplicationStatus::Applied,
        ApplicationStatus::DocumentPassed,
        ApplicationStatus::FirstInterviewPassed,
        ApplicationStatus::SecondInterviewPassed,
        ApplicationStatus::FinalPassed,
        ApplicationStatus::Rejected,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ApplicationStatus::Preparing => "준비중",
            ApplicationStatus::Applied => "지원완료",
            ApplicationStatus::DocumentPassed => "서류합격",
            ApplicationStatus::FirstInterviewPassed => "1차면접 합격",
            ApplicationStatus::SecondInterviewPassed => "2차면접 합격",
            ApplicationStatus::FinalPassed => "최종합격",
            ApplicationStatus::Rejected => "불합격",
        }
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A tracked job application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobApplication {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub company: String,
    #[serde(default)]
    pub position: String,
    /// Free-form application date.
    #[serde(default)]
    pub date: String,
    pub status: ApplicationStatus,
    #[serde(default)]
    pub job_posting_url: String,
    #[serde(default)]
    pub cover_letter: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experience_level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl JobApplication {
    pub fn new(company: impl Into<String>, position: impl Into<String>) -> Self {
        Self {
            id: None,
            company: company.into(),
            position: position.into(),
            date: Utc::now().format("%Y-%m-%d").to_string(),
            status: ApplicationStatus::Preparing,
            job_posting_url: String::new(),
            cover_letter: String::new(),
            job_role: None,
            experience_level: None,
            company_type: None,
            created_at: None,
        }
    }
}

// =============================================================================
// GLOBAL CONFIG AND SESSION
// =============================================================================

/// The single shared feature-flag document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalConfig {
    #[serde(default = "default_test_mode")]
    pub is_test_mode: bool,
}

fn default_test_mode() -> bool {
    defaults::TEST_MODE
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            is_test_mode: defaults::TEST_MODE,
        }
    }
}

/// Display profile of the signed-in principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub name: String,
    pub email: String,
    pub avatar_url: String,
    pub is_admin: bool,
}

/// Whether store operations currently reach the remote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// Subscription requested, no snapshot yet.
    Connecting,
    /// Last snapshot came from the store.
    Online,
    /// Store refused access; serving local data.
    Offline,
    /// Demo identity; the store is never contacted.
    LocalOnly,
}

impl SyncMode {
    /// Writes stay in memory in these modes.
    pub fn is_local(&self) -> bool {
        matches!(self, SyncMode::Offline | SyncMode::LocalOnly)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SyncMode::Connecting => "connecting",
            SyncMode::Online => "online",
            SyncMode::Offline => "offline",
            SyncMode::LocalOnly => "local_only",
        }
    }
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// CAREER FEATURES
// =============================================================================

/// A successful cover-letter example used as a style reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceMaterial {
    pub id: String,
    pub company: String,
    pub job_role: String,
    pub question: String,
    pub answer: String,
    #[serde(default)]
    pub key_capabilities: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// One predicted career path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CareerPrediction {
    pub role: String,
    /// 0-100.
    pub compatibility: u8,
    pub reasoning: String,
    pub recommended_experiences: Vec<String>,
}

/// Gap between the archive and a target role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CareerGapAnalysis {
    pub target_role: String,
    pub current_match: Vec<String>,
    pub missing_skills: Vec<String>,
    pub action_plan: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_draft() -> CardDraft {
        CardDraft {
            title: "교내 해커톤 대상 수상".to_string(),
            date_range: "2024.05".to_string(),
            year: 2024,
            summary: "핀테크 앱 프로토타입 개발".to_string(),
            category: Category::Competition,
            keywords: vec!["해커톤".to_string()],
            content: PortfolioContent::default(),
        }
    }

    #[test]
    fn test_category_serializes_as_label() {
        let json = serde_json::to_string(&Category::Class).unwrap();
        assert_eq!(json, r#""수업/교육""#);
        let parsed: Category = serde_json::from_str(r#""동아리/학회""#).unwrap();
        assert_eq!(parsed, Category::Club);
    }

    #[test]
    fn test_category_rejects_unknown_label() {
        assert!(serde_json::from_str::<Category>(r#""운동""#).is_err());
        assert!("운동".parse::<Category>().is_err());
        assert_eq!("외부 교육".parse::<Category>().unwrap(), Category::Training);
    }

    #[test]
    fn test_category_all_has_twelve_distinct_labels() {
        let labels: std::collections::HashSet<_> =
            Category::ALL.iter().map(|c| c.label()).collect();
        assert_eq!(labels.len(), 12);
    }

    #[test]
    fn test_card_document_field_names() {
        let mut card = Card::from_draft(sample_draft());
        card.content.skills_used = vec!["React".to_string()];
        let value = serde_json::to_value(&card).unwrap();
        assert_eq!(value["dateRange"], "2024.05");
        assert_eq!(value["isFavorite"], false);
        assert_eq!(value["content"]["skills_used"][0], "React");
        assert!(value.get("id").is_none());
        assert!(value.get("createdAt").is_none());
    }

    #[test]
    fn test_card_tolerates_missing_optional_fields() {
        let card: Card = serde_json::from_value(json!({
            "title": "t",
            "dateRange": "2023",
            "year": 2023,
            "summary": "s",
            "category": "기타",
            "content": {"overview": "", "role": "", "skills_used": [], "outcomes": [], "learned": ""}
        }))
        .unwrap();
        assert!(card.keywords.is_empty());
        assert!(!card.is_favorite);
        assert!(card.attachments.is_empty());
    }

    #[test]
    fn test_draft_requires_all_content_fields() {
        let result = serde_json::from_value::<CardDraft>(json!({
            "title": "t",
            "dateRange": "2023",
            "year": 2023,
            "summary": "s",
            "category": "기타",
            "keywords": [],
            "content": {"overview": "", "role": "", "outcomes": [], "learned": ""}
        }));
        assert!(result.is_err(), "missing skills_used must be rejected");
    }

    #[test]
    fn test_apply_draft_keeps_store_fields() {
        let mut card = Card::from_draft(sample_draft());
        card.id = Some("abc".to_string());
        card.is_favorite = true;
        card.attachments.push(Attachment::from_upload("deck.pptx", 1024));

        let mut draft = sample_draft();
        draft.keywords.push("리더십".to_string());
        card.apply_draft(draft);

        assert_eq!(card.id.as_deref(), Some("abc"));
        assert!(card.is_favorite);
        assert_eq!(card.attachments.len(), 1);
        assert_eq!(card.keywords, vec!["해커톤", "리더십"]);
    }

    #[test]
    fn test_card_edit_applies_only_set_fields() {
        let mut card = Card::from_draft(sample_draft());
        let edit = CardEdit {
            title: Some("새 제목".to_string()),
            category: Some(Category::Project),
            ..Default::default()
        };
        edit.apply_to(&mut card);
        assert_eq!(card.title, "새 제목");
        assert_eq!(card.category, Category::Project);
        assert_eq!(card.date_range, "2024.05");
        assert!(!edit.is_empty());
        assert!(CardEdit::default().is_empty());
    }

    #[test]
    fn test_attachment_kind_from_extension() {
        assert_eq!(AttachmentKind::from_file_name("발표.PPTX"), AttachmentKind::Ppt);
        assert_eq!(AttachmentKind::from_file_name("final.ppt"), AttachmentKind::Ppt);
        assert_eq!(AttachmentKind::from_file_name("report.pdf"), AttachmentKind::Report);
        assert_eq!(AttachmentKind::from_file_name("결과보고서.hwp"), AttachmentKind::Report);
        assert_eq!(AttachmentKind::from_file_name("photo.png"), AttachmentKind::Other);
        assert_eq!(AttachmentKind::from_file_name("README"), AttachmentKind::Other);
    }

    #[test]
    fn test_attachment_from_upload() {
        let a = Attachment::from_upload("deck.pptx", 3 * 1024 * 1024 / 2);
        assert_eq!(a.size, "1.50 MB");
        assert_eq!(a.kind, AttachmentKind::Ppt);
        assert!(a.url.starts_with("attachment://"));
        assert!(a.url.ends_with("/deck.pptx"));
        let json = serde_json::to_value(&a).unwrap();
        assert_eq!(json["type"], "ppt");
    }

    #[test]
    fn test_local_ids() {
        assert!(is_local_id("local-0190"));
        assert!(is_local_id("mock-1"));
        assert!(!is_local_id("Xy12abc"));
    }

    #[test]
    fn test_application_status_labels() {
        let json = serde_json::to_string(&ApplicationStatus::FirstInterviewPassed).unwrap();
        assert_eq!(json, r#""1차면접 합격""#);
        assert_eq!(ApplicationStatus::ALL.len(), 7);
    }

    #[test]
    fn test_new_application_defaults() {
        let app = JobApplication::new("NAVER", "백엔드");
        assert_eq!(app.status, ApplicationStatus::Preparing);
        assert_eq!(app.date.len(), 10);
        assert_eq!(&app.date[4..5], "-");
    }

    #[test]
    fn test_global_config_default_and_missing_field() {
        assert!(GlobalConfig::default().is_test_mode);
        let parsed: GlobalConfig = serde_json::from_value(json!({})).unwrap();
        assert!(parsed.is_test_mode);
        let parsed: GlobalConfig = serde_json::from_value(json!({"isTestMode": false})).unwrap();
        assert!(!parsed.is_test_mode);
    }

    #[test]
    fn test_sync_mode_locality() {
        assert!(SyncMode::Offline.is_local());
        assert!(SyncMode::LocalOnly.is_local());
        assert!(!SyncMode::Online.is_local());
        assert!(!SyncMode::Connecting.is_local());
    }
}
