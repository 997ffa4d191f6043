//! Centralized default constants for CONDOT.
//!
//! **This module is the single source of truth** for shared default values.
//! Crates reference these constants instead of defining their own magic
//! numbers or strings.

use crate::models::{Card, Category, PortfolioContent};

// =============================================================================
// DEPLOYMENT
// =============================================================================

/// Application name used in logs and the health endpoint.
pub const APP_NAME: &str = "CONDOT";

/// Default store namespace (`artifacts/{APP_ID}/...`).
pub const APP_ID: &str = "condot";

/// Email address whose owner is treated as administrator.
pub const ADMIN_EMAIL: &str = "admin@uos.ac.kr";

/// Default for the shared test-mode flag when the config document is absent.
pub const TEST_MODE: bool = true;

// =============================================================================
// STORE LAYOUT
// =============================================================================

/// Root collection of every per-deployment namespace.
pub const ROOT_COLLECTION: &str = "artifacts";

/// Per-principal card collection name.
pub const EXPERIENCES_COLLECTION: &str = "experiences";

/// Per-principal job application collection name.
pub const APPLICATIONS_COLLECTION: &str = "applications";

/// Collection holding the shared config document.
pub const CONFIG_COLLECTION: &str = "config";

/// Id of the shared config document.
pub const GLOBAL_CONFIG_DOC: &str = "global";

/// Field stamped with the store's clock on create.
pub const CREATED_AT_FIELD: &str = "createdAt";

// =============================================================================
// IDENTITY
// =============================================================================

/// Prefix marking a locally manufactured demo principal.
pub const DEMO_PREFIX: &str = "demo-";

/// Display name when the provider has none.
pub const DEFAULT_DISPLAY_NAME: &str = "User";

/// Demo display name used when password sign-in falls back.
pub const DEMO_DISPLAY_NAME: &str = "Demo User";

/// Demo identity used when OAuth sign-in falls back.
pub const OAUTH_DEMO_EMAIL: &str = "demo@google.com";
pub const OAUTH_DEMO_NAME: &str = "Google Demo";

/// Generated avatar service for profiles without a photo.
pub const AVATAR_SERVICE_URL: &str = "https://ui-avatars.com/api/";

// =============================================================================
// LOCAL RECORDS
// =============================================================================

/// Prefix of ids minted for records created without the store.
pub const LOCAL_ID_PREFIX: &str = "local-";

/// Prefix of the built-in sample dataset ids.
pub const SAMPLE_ID_PREFIX: &str = "mock-";

// =============================================================================
// INFERENCE
// =============================================================================

/// Default generation model.
pub const GEN_MODEL: &str = "gpt-4o-mini";

/// Default generation timeout in seconds.
pub const GEN_TIMEOUT_SECS: u64 = 120;

/// Number of career paths requested from the predictor.
pub const CAREER_PREDICTION_COUNT: usize = 3;

/// Text stored when the cover-letter model answers with nothing.
pub const COVER_LETTER_FALLBACK: &str = "자기소개서 생성에 실패했습니다.";

// =============================================================================
// EVENTS / SERVER
// =============================================================================

/// Broadcast buffer for the event bus.
pub const EVENT_BUS_CAPACITY: usize = 256;

/// Default HTTP server port.
pub const SERVER_PORT: u16 = 3000;

/// SSE keep-alive interval in seconds.
pub const SSE_KEEPALIVE_SECS: u64 = 15;

// =============================================================================
// KEYWORDS
// =============================================================================

/// Vocabulary the classifier prefers when suggesting card keywords.
pub const PREDEFINED_KEYWORDS: [&str; 50] = [
    "리더십",
    "팀워크",
    "문제해결",
    "데이터분석",
    "기획력",
    "의사소통",
    "창의성",
    "도전정신",
    "성실함",
    "책임감",
    "발표능력",
    "문서작성",
    "코딩",
    "디자인",
    "마케팅",
    "영업",
    "회계",
    "글로벌",
    "외국어",
    "멘토링",
    "봉사",
    "수상",
    "자격증",
    "협상",
    "위기관리",
    "시간관리",
    "적응력",
    "분석력",
    "논리적사고",
    "전략수립",
    "프로젝트관리",
    "연구",
    "실험",
    "개발",
    "고객응대",
    "판매",
    "운영",
    "관리",
    "교육",
    "상담",
    "영상편집",
    "UI/UX",
    "브랜딩",
    "카피라이팅",
    "SNS운영",
    "시장조사",
    "통계",
    "머신러닝",
    "AI",
    "클라우드",
];

// =============================================================================
// SAMPLE DATASET
// =============================================================================

/// The fixed dataset shown when the store refuses access and for demo sessions.
pub fn sample_cards() -> Vec<Card> {
    vec![
        Card {
            id: Some("mock-1".to_string()),
            title: "교내 해커톤 대상 수상".to_string(),
            date_range: "2024.05".to_string(),
            year: 2024,
            summary: "24시간 동안 핀테크 앱 프로토타입을 개발하여 대상을 수상함.".to_string(),
            category: Category::Competition,
            keywords: vec!["해커톤".to_string(), "핀테크".to_string()],
            content: PortfolioContent {
                overview: String::new(),
                role: "팀장".to_string(),
                skills_used: vec!["React".to_string()],
                outcomes: vec!["대상".to_string()],
                learned: "협업".to_string(),
            },
            is_favorite: true,
            attachments: Vec::new(),
            created_at: None,
        },
        Card {
            id: Some("mock-2".to_string()),
            title: "스타트업 하계 인턴".to_string(),
            date_range: "2023.07 - 2023.08".to_string(),
            year: 2023,
            summary: "데이터 분석 직무로 2개월간 근무하며 고객 데이터를 분석함.".to_string(),
            category: Category::Internship,
            keywords: vec!["인턴".to_string(), "SQL".to_string()],
            content: PortfolioContent {
                overview: String::new(),
                role: "인턴".to_string(),
                skills_used: vec!["Python".to_string()],
                outcomes: vec!["리포트".to_string()],
                learned: "실무".to_string(),
            },
            is_favorite: false,
            attachments: Vec::new(),
            created_at: None,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_cards_shape() {
        let cards = sample_cards();
        assert_eq!(cards.len(), 2);
        assert_eq!(cards[0].id.as_deref(), Some("mock-1"));
        assert_eq!(cards[1].id.as_deref(), Some("mock-2"));
        assert!(cards.iter().all(|c| c.is_local()));
    }

    #[test]
    fn test_keyword_vocabulary_unique() {
        let set: std::collections::HashSet<_> = PREDEFINED_KEYWORDS.iter().collect();
        assert_eq!(set.len(), PREDEFINED_KEYWORDS.len());
    }
}
