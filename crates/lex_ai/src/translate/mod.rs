//! Language detection and chunked translation.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use lex_core::error::{codes, AppError};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::llm::{GenerationRequest, Llm};
use crate::prompts;
use crate::retry::RetryPolicy;
use crate::sentences::split_sentences;

/// Share of script-specific letters among all letters that selects a language.
pub const SCRIPT_RATIO_THRESHOLD: f32 = 0.5;

const KYRGYZ_LETTERS: [char; 3] = ['ң', 'ө', 'ү'];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Ru,
    En,
    Ky,
}

impl Language {
    pub fn code(self) -> &'static str {
        match self {
            Language::Ru => "ru",
            Language::En => "en",
            Language::Ky => "ky",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_lowercase().as_str() {
            "ru" => Some(Language::Ru),
            "en" => Some(Language::En),
            "ky" => Some(Language::Ky),
            _ => None,
        }
    }

    pub fn english_name(self) -> &'static str {
        match self {
            Language::Ru => "Russian",
            Language::En => "English",
            Language::Ky => "Kyrgyz",
        }
    }

    /// Direction key used in configuration, e.g. `"ru-en"`.
    pub fn direction(from: Language, to: Language) -> String {
        format!("{}-{}", from.code(), to.code())
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Ordered script-ratio rules; text without enough letters of any script gets
/// `fallback`.
pub fn detect_language(text: &str, fallback: Language) -> Language {
    let mut letters = 0usize;
    let mut cyrillic = 0usize;
    let mut latin = 0usize;
    let mut kyrgyz = 0usize;
    for c in text.chars().filter(|c| c.is_alphabetic()) {
        letters += 1;
        if ('\u{0400}'..='\u{04FF}').contains(&c) {
            cyrillic += 1;
            if KYRGYZ_LETTERS.contains(&c.to_lowercase().next().unwrap_or(c)) {
                kyrgyz += 1;
            }
        } else if c.is_ascii_alphabetic() {
            latin += 1;
        }
    }
    if letters == 0 {
        return fallback;
    }
    let ratio = |n: usize| n as f32 / letters as f32;
    if ratio(cyrillic) > SCRIPT_RATIO_THRESHOLD {
        if kyrgyz > 0 {
            Language::Ky
        } else {
            Language::Ru
        }
    } else if ratio(latin) > SCRIPT_RATIO_THRESHOLD {
        Language::En
    } else {
        fallback
    }
}

/// One translation call on text that already fits the chunk cap.
pub trait TranslationEngine: Send + Sync {
    fn supports(&self, from: Language, to: Language) -> bool;
    fn translate_chunk(&self, text: &str, from: Language, to: Language) -> Result<String, AppError>;
}

/// Translation over the generation endpoint, one model per direction.
pub struct LlmTranslationEngine {
    llm: Arc<dyn Llm>,
    models: BTreeMap<String, String>,
    retry: RetryPolicy,
}

impl LlmTranslationEngine {
    pub fn new(llm: Arc<dyn Llm>, models: BTreeMap<String, String>, retry: RetryPolicy) -> Self {
        Self { llm, models, retry }
    }
}

impl TranslationEngine for LlmTranslationEngine {
    fn supports(&self, from: Language, to: Language) -> bool {
        self.models.contains_key(&Language::direction(from, to))
    }

    fn translate_chunk(&self, text: &str, from: Language, to: Language) -> Result<String, AppError> {
        let direction = Language::direction(from, to);
        let model = self.models.get(&direction).ok_or_else(|| {
            AppError::new(codes::MODEL_UNAVAILABLE, "No translation model for direction")
                .with_details(format!("direction={direction}"))
        })?;
        let prompt = prompts::translation_prompt(text, from.english_name(), to.english_name());
        let req = GenerationRequest {
            model,
            prompt: &prompt,
            // Translations run a little longer than the source.
            max_tokens: (text.chars().count() as u32).saturating_mul(2).max(64),
            temperature: 0.0,
        };
        self.retry.run("translation", || self.llm.generate(&req))
    }
}

pub struct Translator {
    engine: Arc<dyn TranslationEngine>,
    chunk_cap: usize,
}

impl Translator {
    pub fn new(engine: Arc<dyn TranslationEngine>, chunk_cap: usize) -> Self {
        Self {
            engine,
            chunk_cap: chunk_cap.max(1),
        }
    }

    pub fn supports(&self, from: Language, to: Language) -> bool {
        from == to || self.engine.supports(from, to)
    }

    /// Translate sentence-packed chunks independently and rejoin them in
    /// order. Whitespace around each chunk is carried over from the source.
    pub fn translate(&self, text: &str, from: Language, to: Language) -> Result<String, AppError> {
        if from == to || text.trim().is_empty() {
            return Ok(text.to_string());
        }
        if !self.engine.supports(from, to) {
            return Err(AppError::new(codes::MODEL_UNAVAILABLE, "Translation direction not configured")
                .with_details(format!("direction={}", Language::direction(from, to))));
        }

        let chunks = pack_sentences(text, self.chunk_cap);
        debug!(%from, %to, chunks = chunks.len(), "translating");
        let mut out = String::with_capacity(text.len());
        for chunk in chunks {
            let core = chunk.trim();
            if core.is_empty() {
                out.push_str(chunk);
                continue;
            }
            let lead = &chunk[..chunk.len() - chunk.trim_start().len()];
            let trail = &chunk[chunk.trim_end().len()..];
            let translated = self.engine.translate_chunk(core, from, to)?;
            out.push_str(lead);
            out.push_str(translated.trim());
            out.push_str(trail);
        }
        Ok(out)
    }
}

/// Greedily pack whole sentences into chunks of at most `cap` characters. A
/// sentence longer than `cap` becomes a chunk of its own and is never split.
pub fn pack_sentences(text: &str, cap: usize) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0usize;
    let mut end = 0usize;
    let mut chars = 0usize;
    for sentence in split_sentences(text) {
        let n = sentence.chars().count();
        if chars > 0 && chars + n > cap {
            out.push(&text[start..end]);
            start = end;
            chars = 0;
        }
        end += sentence.len();
        chars += n;
    }
    if start < end {
        out.push(&text[start..end]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn detects_by_script_ratio() {
        assert_eq!(detect_language("Могу ли я вернуть товар без чека?", Language::Ru), Language::Ru);
        assert_eq!(detect_language("Can I return an item without a receipt?", Language::Ru), Language::En);
        assert_eq!(detect_language("Мен товарды кайтара аламбы, чек жок болсо? Өтүнүч", Language::Ru), Language::Ky);
        assert_eq!(detect_language("12345 !!!", Language::Ru), Language::Ru);
    }

    #[test]
    fn packing_respects_cap_and_sentence_boundaries() {
        let text = "Один два три. Четыре пять. Шесть семь восемь девять. Десять.";
        let chunks = pack_sentences(text, 30);
        assert_eq!(chunks.concat(), text);
        for c in &chunks {
            assert!(c.chars().count() <= 30 || split_sentences(c).len() == 1);
        }
        assert_eq!(chunks[0], "Один два три. Четыре пять. ");
    }

    #[test]
    fn oversized_sentence_stays_whole() {
        let long = "а".repeat(50) + ". Б.";
        let chunks = pack_sentences(&long, 10);
        assert_eq!(chunks[0].trim_end(), format!("{}.", "а".repeat(50)));
    }
}
