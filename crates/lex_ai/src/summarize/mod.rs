//! Condense over-length answers.
//!
//! The abstractive path asks a model for a summary and keeps it only if it
//! lands near the target length, fits the hard cap and still carries every
//! article citation of the input.
//! Otherwise sentences are selected extractively; citation sentences are kept
//! first and any citation that still does not fit is listed in a footer.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use lex_core::config::{GenerationConfig, SummaryConfig};
use lex_core::error::AppError;
use lex_core::memory::truncate_chars;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::guardrails::{extract_citations, missing_citations};
use crate::llm::{GenerationRequest, Llm};
use crate::prompts;
use crate::retry::RetryPolicy;
use crate::review::significant_terms;
use crate::sentences::split_sentences;

/// Headroom over `target_chars` an abstractive summary may use, in percent.
pub const ABSTRACTIVE_SLACK_PERCENT: usize = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryMethod {
    Unchanged,
    Abstractive,
    Extractive,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub text: String,
    pub method: SummaryMethod,
}

pub struct Summarizer {
    llm: Option<Arc<dyn Llm>>,
    model: String,
    settings: SummaryConfig,
    generation: GenerationConfig,
    retry: RetryPolicy,
}

impl Summarizer {
    /// `llm = None` always uses the extractive path.
    pub fn new(llm: Option<Arc<dyn Llm>>, model: impl Into<String>, settings: SummaryConfig, retry: RetryPolicy) -> Self {
        Self {
            llm,
            model: model.into(),
            settings,
            generation: GenerationConfig::default(),
            retry,
        }
    }

    /// Output budget and temperature for the abstractive call.
    pub fn with_generation(mut self, generation: GenerationConfig) -> Self {
        self.generation = generation;
        self
    }

    pub fn settings(&self) -> &SummaryConfig {
        &self.settings
    }

    /// Longest abstractive summary that is accepted.
    pub fn abstractive_limit(&self) -> usize {
        let target = self.settings.target_chars;
        (target + target * ABSTRACTIVE_SLACK_PERCENT / 100).min(self.settings.hard_cap_chars)
    }

    pub fn summarize(&self, text: &str) -> Summary {
        let len = text.chars().count();
        if len <= self.settings.condense_threshold_chars && len <= self.settings.hard_cap_chars {
            return Summary {
                text: text.to_string(),
                method: SummaryMethod::Unchanged,
            };
        }

        if let Some(llm) = &self.llm {
            match self.abstractive(llm.as_ref(), text) {
                Ok(summary) => {
                    debug!(from = len, to = summary.chars().count(), "abstractive summary accepted");
                    return Summary {
                        text: summary,
                        method: SummaryMethod::Abstractive,
                    };
                }
                Err(e) => warn!(error = %e, "abstractive summary unusable; falling back to extractive"),
            }
        }

        Summary {
            text: extractive_summary(text, self.settings.target_chars, self.settings.hard_cap_chars),
            method: SummaryMethod::Extractive,
        }
    }

    fn abstractive(&self, llm: &dyn Llm, text: &str) -> Result<String, AppError> {
        let prompt = prompts::summary_prompt(text, self.settings.target_chars);
        let req = GenerationRequest {
            model: &self.model,
            prompt: &prompt,
            max_tokens: self.generation.max_tokens,
            temperature: self.generation.temperature,
        };
        let out = self.retry.run("summary", || llm.generate(&req))?;
        let out = out.trim().to_string();

        let invalid = |msg: &str| AppError::new("SUMMARY_INVALID", msg.to_string());
        if out.is_empty() {
            return Err(invalid("Summary was empty"));
        }
        let out_len = out.chars().count();
        let limit = self.abstractive_limit();
        if out_len > limit || out_len >= text.chars().count() {
            return Err(invalid("Summary did not condense to the target length")
                .with_details(format!("chars={out_len}; limit={limit}")));
        }
        let missing = missing_citations(text, &out);
        if !missing.is_empty() {
            return Err(invalid("Summary dropped article citations")
                .with_details(format!("missing={missing:?}")));
        }
        Ok(out)
    }
}

/// Select sentences until `target` characters, never exceeding `hard_cap` and
/// never losing a citation present in `text`.
pub fn extractive_summary(text: &str, target: usize, hard_cap: usize) -> String {
    let budget = target.min(hard_cap);
    let sentences: Vec<&str> = split_sentences(text)
        .into_iter()
        .filter(|s| !s.trim().is_empty())
        .collect();

    let frequency = term_frequency(&sentences);
    let mut mandatory: Vec<usize> = Vec::new();
    let mut scored: Vec<(usize, f32)> = Vec::new();
    for (pos, s) in sentences.iter().enumerate() {
        if !extract_citations(s).is_empty() {
            mandatory.push(pos);
        } else {
            scored.push((pos, sentence_score(s, pos, &frequency)));
        }
    }
    scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

    let mut chosen: BTreeSet<usize> = BTreeSet::new();
    let mut used = 0usize;
    for pos in mandatory.into_iter().chain(scored.into_iter().map(|(p, _)| p)) {
        let len = sentences[pos].trim().chars().count() + 1;
        if used + len <= budget {
            chosen.insert(pos);
            used += len;
        }
    }

    let body = chosen
        .iter()
        .map(|&p| sentences[p].trim())
        .collect::<Vec<_>>()
        .join(" ");
    let missing = missing_citations(text, &body);
    if missing.is_empty() && body.chars().count() <= hard_cap {
        return body;
    }

    // Some citations did not fit: list every input citation in a footer and
    // shorten the body to make room for it.
    let footer = citation_footer(&extract_citations(text));
    let footer_len = footer.chars().count();
    if footer_len >= hard_cap {
        let clipped = truncate_chars(&footer, hard_cap);
        warn!(
            footer_chars = footer_len,
            hard_cap,
            dropped = missing_citations(text, &clipped).len(),
            "citation footer exceeds the hard cap; citations dropped"
        );
        return clipped;
    }
    let room = hard_cap - footer_len - 1;
    let body = truncate_chars(&body, room).trim_end().to_string();
    if body.is_empty() {
        footer
    } else {
        format!("{body}\n{footer}")
    }
}

fn citation_footer(ids: &BTreeSet<String>) -> String {
    let list = ids
        .iter()
        .map(|id| format!("Статья {id}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!("Основание: {list}.")
}

fn term_frequency(sentences: &[&str]) -> BTreeMap<String, usize> {
    let mut freq = BTreeMap::new();
    for s in sentences {
        for t in significant_terms(s) {
            *freq.entry(t).or_insert(0) += 1;
        }
    }
    freq
}

/// Keyword density (document-frequent terms per word) plus a decaying bonus
/// for early sentences.
fn sentence_score(sentence: &str, position: usize, freq: &BTreeMap<String, usize>) -> f32 {
    let words = sentence.split_whitespace().count().max(1) as f32;
    let weight: usize = significant_terms(sentence)
        .iter()
        .map(|t| freq.get(t).copied().unwrap_or(0))
        .sum();
    weight as f32 / words + 1.0 / (1.0 + position as f32)
}
