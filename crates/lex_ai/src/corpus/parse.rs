use std::collections::HashSet;

use lex_core::error::{codes, AppError};
use sha2::{Digest, Sha256};

use super::model::{Article, CharSpan};

const HEADING_WORDS: [&str; 2] = ["Статья", "Article"];
const ID_PREFIXES: [&str; 6] = ["статья", "article", "art.", "ст.", "№", "#"];

/// Corpus text plus its article table. Spans are in characters; the byte
/// offset table lets slicing stay O(1) for non-ASCII text.
#[derive(Debug, Clone)]
pub struct Corpus {
    text: String,
    byte_at: Vec<usize>,
    articles: Vec<Article>,
}

impl Corpus {
    pub fn parse(text: &str) -> Result<Self, AppError> {
        if text.trim().is_empty() {
            return Err(AppError::new(codes::CORPUS_INVALID, "Corpus text is empty"));
        }

        let mut byte_at: Vec<usize> = text.char_indices().map(|(b, _)| b).collect();
        byte_at.push(text.len());
        let total_chars = byte_at.len() - 1;

        let mut headings: Vec<(usize, String, String)> = Vec::new();
        let mut char_pos = 0usize;
        for line in text.split('\n') {
            if let Some(id) = heading_id(line) {
                headings.push((char_pos, id, line.trim().to_string()));
            }
            char_pos += line.chars().count() + 1;
        }

        if headings.is_empty() {
            return Err(AppError::new(
                codes::CORPUS_INVALID,
                "Corpus has no recognizable article headings",
            ));
        }

        let mut seen = HashSet::new();
        let mut articles = Vec::with_capacity(headings.len());
        for (i, (start, id, heading)) in headings.iter().enumerate() {
            if !seen.insert(id.clone()) {
                return Err(AppError::new(codes::CORPUS_INVALID, "Duplicate article identifier")
                    .with_details(format!("id={id}; heading={heading}")));
            }
            let end = headings.get(i + 1).map(|h| h.0).unwrap_or(total_chars);
            articles.push(Article {
                id: id.clone(),
                heading: heading.clone(),
                span: CharSpan { start: *start, end },
            });
        }

        Ok(Self {
            text: text.to_string(),
            byte_at,
            articles,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn char_len(&self) -> usize {
        self.byte_at.len() - 1
    }

    pub fn articles(&self) -> &[Article] {
        &self.articles
    }

    pub fn slice(&self, span: CharSpan) -> &str {
        let end = span.end.min(self.char_len());
        let start = span.start.min(end);
        &self.text[self.byte_at[start]..self.byte_at[end]]
    }

    /// Exact identifier match; `"37"` never matches `"379"`.
    pub fn article(&self, id: &str) -> Option<&Article> {
        self.articles.iter().find(|a| a.id == id)
    }

    /// Article ids whose spans overlap `span`, in corpus order.
    pub fn articles_in(&self, span: CharSpan) -> Vec<String> {
        self.articles
            .iter()
            .filter(|a| a.span.intersects(&span))
            .map(|a| a.id.clone())
            .collect()
    }

    pub fn sha256(&self) -> String {
        hex::encode(Sha256::digest(self.text.as_bytes()))
    }
}

fn heading_id(line: &str) -> Option<String> {
    let trimmed = line.trim_start();
    let rest = HEADING_WORDS.iter().find_map(|w| trimmed.strip_prefix(w))?;
    // Require a separator so "Статьями" or "Articles" are not headings.
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let rest = rest.trim_start();
    let (id, consumed) = parse_id_token(rest)?;
    match rest[consumed..].chars().next() {
        None => Some(id),
        Some(c) if c.is_alphanumeric() => None,
        Some(_) => Some(id),
    }
}

/// Digits, optionally followed by `-digits` (e.g. `22-1`).
pub(crate) fn parse_id_token(s: &str) -> Option<(String, usize)> {
    let digits = s.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }
    let mut end = digits;
    let tail = &s[digits..];
    if let Some(after_dash) = tail.strip_prefix('-') {
        let more = after_dash.bytes().take_while(u8::is_ascii_digit).count();
        if more > 0 {
            end += 1 + more;
        }
    }
    Some((s[..end].to_string(), end))
}

/// Reduce user input such as `"ст. 37"` or `"Статья 37."` to `"37"`.
pub fn normalize_identifier(raw: &str) -> Option<String> {
    let lowered = raw.trim().to_lowercase();
    let mut rest = lowered.as_str();
    loop {
        let before = rest;
        for prefix in ID_PREFIXES {
            if let Some(r) = rest.strip_prefix(prefix) {
                rest = r.trim_start();
            }
        }
        if rest == before {
            break;
        }
    }
    let rest = rest.trim_end_matches('.').trim_end();
    let (id, consumed) = parse_id_token(rest)?;
    (consumed == rest.len()).then_some(id)
}
