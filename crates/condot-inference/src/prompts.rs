//! Prompt builders for the six classifier calls.
//!
//! All output the user sees is Korean; the instructions themselves are English.

use condot_core::defaults::{CAREER_PREDICTION_COUNT, PREDEFINED_KEYWORDS};
use condot_core::{Card, CardDraft, Category, ReferenceMaterial};
use serde::{Deserialize, Serialize};

/// Maximum characters of a reference answer quoted into the cover-letter prompt.
const REFERENCE_EXCERPT_CHARS: usize = 200;

fn category_list() -> String {
    Category::ALL
        .iter()
        .map(|c| c.label())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Structure a free-text experience description into a card.
pub fn structure(text: &str) -> String {
    format!(
        r#"You are a career archivist. Turn the user's description of an experience (written in Korean) into a structured career record.

User input:
"{text}"

Rules:
1. category must be exactly one of: {categories}.
2. Extract a short title and a date range formatted as YYYY.MM or YYYY.MM - YYYY.MM. If the year is unclear, estimate it or use the current year; set year to the starting year.
3. summary is a single sentence.
4. Prefer keywords from this vocabulary: {keywords}.
5. content must contain overview (one line), role (what the user did), skills_used, outcomes, and learned. Use empty strings or empty lists when the input says nothing about a field.
6. Write every text value in Korean."#,
        text = text,
        categories = category_list(),
        keywords = PREDEFINED_KEYWORDS.join(", "),
    )
}

/// Apply an edit instruction to an existing card.
pub fn modify(current_json: &str, instruction: &str) -> String {
    format!(
        r#"You maintain structured career records. Apply the user's instruction to the record below and return the complete updated record in the same structure.

Change only the fields the instruction asks for or clearly implies. Copy every other field exactly as it is, including list order.
category must remain one of: {categories}.

Current record:
{current_json}

Instruction:
"{instruction}""#,
        categories = category_list(),
    )
}

/// Inputs describing the posting a cover letter is written for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PostingContext {
    pub company: String,
    pub company_type: String,
    pub job_role: String,
    pub experience_level: String,
    pub job_description: String,
}

impl PostingContext {
    fn render(&self) -> String {
        format!(
            "Target Company: {}, Type: {}\nRole: {}, Level: {}\n\nJob Description:\n{}",
            self.company,
            self.company_type,
            self.job_role,
            self.experience_level,
            self.job_description
        )
    }
}

fn experience_context(cards: &[Card]) -> String {
    cards
        .iter()
        .map(|c| {
            format!(
                "- Title: {}\n- Category: {}\n- Role: {}\n- Outcome: {}\n- Learned: {}",
                c.title,
                c.category,
                c.content.role,
                c.content.outcomes.join(", "),
                c.content.learned
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn reference_context(references: &[ReferenceMaterial]) -> String {
    if references.is_empty() {
        return "None provided.".to_string();
    }
    references
        .iter()
        .map(|r| {
            let excerpt: String = r.answer.chars().take(REFERENCE_EXCERPT_CHARS).collect();
            format!(
                "- Company: {}\n- Role: {}\n- Q: {}\n- A: {}...",
                r.company, r.job_role, r.question, excerpt
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Write a cover letter from the archive, using references as a style guide.
pub fn cover_letter(
    posting: &PostingContext,
    cards: &[Card],
    references: &[ReferenceMaterial],
) -> String {
    format!(
        r#"You are a career consultant. Write a Korean cover letter (자기소개서) for the posting below, grounded in the user's experience archive.

Treat the reference examples as a guide to tone and structure only. Do not reuse their content.

Posting:
"{posting}"

Experience archive:
{experiences}

Reference examples:
{references}

Structure the letter as an introduction with motivation, body paragraphs that tie specific experiences to the posting's requirements, and a closing with the applicant's goals. Keep it professional and sincere, around 500-700 words."#,
        posting = posting.render(),
        experiences = experience_context(cards),
        references = reference_context(references),
    )
}

/// Extract a reference example from pasted text.
pub fn parse_reference(raw: &str) -> String {
    format!(
        r#"The text below contains a successful job application essay. Extract the company name, the job role, the question that was asked, the answer text, and the key capabilities the answer demonstrates.

Text:
"{raw}""#
    )
}

/// Predict career paths from the archive.
pub fn predict_careers(cards: &[Card]) -> String {
    let history = cards
        .iter()
        .map(|c| format!("{} ({}): {}", c.title, c.category, c.keywords.join(", ")))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        r#"Based on this university student's experience history, predict {count} job roles they are well suited for. For each role give a compatibility score from 0 to 100, the reasoning, and concrete additional experiences that would strengthen the case. Answer in Korean.

History:
{history}"#,
        count = CAREER_PREDICTION_COUNT,
    )
}

/// Compare the archive against a target role.
pub fn analyze_gap(target_role: &str, cards: &[Card]) -> String {
    let history = cards
        .iter()
        .map(|c| format!("{}: {}", c.title, c.keywords.join(", ")))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        r#"The user wants to work as "{target_role}". Compare their experience list with what the industry expects for that role. List the relevant things they already have, the skills that are missing, and concrete action steps. Answer in Korean.

Experience:
{history}"#
    )
}

/// Pretty JSON of the classifier-owned card fields, for the modify prompt.
pub fn draft_json(draft: &CardDraft) -> String {
    serde_json::to_string_pretty(draft).unwrap_or_else(|_| format!("{:?}", draft))
}
