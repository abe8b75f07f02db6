//! Rule-based review checks.
//!
//! Significant terms are lowercase alphanumeric tokens of at least
//! [`MIN_TERM_CHARS`] characters that are not stop words, compared by their
//! first [`STEM_CHARS`] characters so inflected forms ("договора", "договор")
//! match.

use std::collections::BTreeSet;

use lex_core::config::ReviewConfig;

use super::CheckKind;
use crate::guardrails::extract_citations;

pub const MIN_TERM_CHARS: usize = 4;
pub const STEM_CHARS: usize = 5;
/// Ending a legal keyword may carry and still count ("закона", "договором").
pub const MAX_INFLECTION_CHARS: usize = 3;

const STOP_WORDS: &[&str] = &[
    // ru
    "могу", "можно", "может", "если", "когда", "какой", "какая", "какие", "каким", "который",
    "которая", "которые", "чтобы", "этот", "этого", "этом", "также", "только", "после", "перед",
    "более", "менее", "очень", "есть", "было", "будет", "быть", "свой", "своего", "меня", "мной",
    "тебя", "него", "нему", "вами", "ваши", "ваша", "нужно", "надо", "разве", "почему", "зачем",
    "где", "ответ", "вопрос", "совет", "основание",
    // en
    "what", "when", "where", "which", "with", "without", "that", "this", "from", "have", "does",
    "should", "would", "could", "there", "their", "about", "into", "your", "yours", "they",
    "them", "then", "than", "will", "been", "being", "answer", "question",
];

/// Stems of the significant terms in `text`.
pub fn significant_terms(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .map(str::to_lowercase)
        .filter(|w| w.chars().count() >= MIN_TERM_CHARS)
        .filter(|w| !w.chars().all(|c| c.is_ascii_digit()))
        .filter(|w| !STOP_WORDS.contains(&w.as_str()))
        .map(|w| w.chars().take(STEM_CHARS).collect())
        .collect()
}

/// Shared-term count the response must reach: the configured minimum, lowered
/// to what a short query can offer, but never below one.
pub fn required_overlap(configured: usize, query_terms: usize) -> usize {
    configured.min(query_terms).max(1)
}

#[derive(Debug, Clone)]
pub struct RuleChecker {
    settings: ReviewConfig,
}

impl RuleChecker {
    pub fn new(settings: ReviewConfig) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ReviewConfig {
        &self.settings
    }

    /// Every failing rule; empty means all rules pass.
    pub fn check(&self, query: &str, response: &str) -> BTreeSet<CheckKind> {
        let mut failed = BTreeSet::new();
        let trimmed = response.trim();

        if trimmed.chars().count() < self.settings.min_chars {
            failed.insert(CheckKind::MinLength);
        }

        if !self.has_legal_context(trimmed) {
            failed.insert(CheckKind::LegalContext);
        }

        let query_terms = significant_terms(query);
        let response_terms = significant_terms(trimmed);
        let shared = query_terms.intersection(&response_terms).count();
        if shared < required_overlap(self.settings.min_shared_terms, query_terms.len()) {
            failed.insert(CheckKind::QueryOverlap);
        }

        failed
    }

    fn has_legal_context(&self, response: &str) -> bool {
        if !extract_citations(response).is_empty() {
            return true;
        }
        let keywords: Vec<String> = self
            .settings
            .legal_keywords
            .iter()
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        response
            .split(|c: char| !c.is_alphanumeric())
            .map(str::to_lowercase)
            .any(|token| keywords.iter().any(|k| is_keyword_form(&token, k)))
    }
}

/// `token` is `keyword` or `keyword` plus a short inflectional ending; words
/// that merely contain the keyword ("правильно", "flaw") do not count.
fn is_keyword_form(token: &str, keyword: &str) -> bool {
    token.starts_with(keyword) && token.chars().count() - keyword.chars().count() <= MAX_INFLECTION_CHARS
}
