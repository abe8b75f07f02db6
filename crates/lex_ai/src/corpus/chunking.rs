//! Boundary-aware overlapping chunker.
//!
//! Chunks target `target` characters. Near the target the cut snaps to the
//! closest article heading within `±tolerance`, otherwise to the closest
//! sentence end within `[target - tolerance, target]`, otherwise it is a hard
//! cut at `target`. The next chunk starts exactly `overlap` characters before
//! the cut, so dropping the first `overlap` characters of every chunk but the
//! first reconstructs the corpus.

use lex_core::config::ChunkingConfig;
use lex_core::error::{codes, AppError};
use sha2::{Digest, Sha256};

use super::model::{CharSpan, Chunk};
use super::parse::Corpus;

const SENTENCE_TERMINATORS: [char; 5] = ['.', '!', '?', '…', ';'];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    target: usize,
    overlap: usize,
    tolerance: usize,
}

impl Chunker {
    pub fn new(cfg: &ChunkingConfig) -> Result<Self, AppError> {
        if cfg.target_chars == 0
            || cfg.tolerance_chars >= cfg.target_chars
            || cfg.overlap_chars >= cfg.target_chars - cfg.tolerance_chars
        {
            return Err(AppError::new(
                codes::CONFIG_INVALID,
                "Chunking requires overlap < target - tolerance",
            )
            .with_details(format!(
                "target={}; overlap={}; tolerance={}",
                cfg.target_chars, cfg.overlap_chars, cfg.tolerance_chars
            )));
        }
        Ok(Self {
            target: cfg.target_chars,
            overlap: cfg.overlap_chars,
            tolerance: cfg.tolerance_chars,
        })
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    pub fn max_chunk_chars(&self) -> usize {
        self.target + self.tolerance
    }

    pub fn chunk(&self, corpus: &Corpus) -> Vec<Chunk> {
        self.spans(corpus)
            .into_iter()
            .enumerate()
            .map(|(ordinal, span)| {
                let text = corpus.slice(span).to_string();
                let text_sha256 = hex::encode(Sha256::digest(text.as_bytes()));
                let chunk_id = chunk_id(ordinal as u32, &text_sha256);
                Chunk {
                    chunk_id,
                    ordinal: ordinal as u32,
                    source_article_ids: corpus.articles_in(span),
                    text,
                    span,
                    text_sha256,
                }
            })
            .collect()
    }

    fn spans(&self, corpus: &Corpus) -> Vec<CharSpan> {
        let chars: Vec<char> = corpus.text().chars().collect();
        let n = chars.len();
        let article_starts: Vec<usize> = corpus
            .articles()
            .iter()
            .map(|a| a.span.start)
            .filter(|&s| s > 0)
            .collect();
        let sentence_ends = sentence_boundaries(&chars);

        let mut out = Vec::new();
        let mut start = 0usize;
        loop {
            // The tail fits within the tolerance: keep it whole.
            if n - start <= self.target + self.tolerance {
                out.push(CharSpan { start, end: n });
                break;
            }

            let ideal = start + self.target;
            let lo = ideal - self.tolerance;
            let hi = ideal + self.tolerance;

            let cut = nearest_in(&article_starts, lo, hi, ideal)
                .or_else(|| nearest_in(&sentence_ends, lo, ideal, ideal))
                .unwrap_or(ideal);

            out.push(CharSpan { start, end: cut });
            start = cut - self.overlap;
        }
        out
    }
}

/// Positions just past a sentence terminator followed by whitespace, and just
/// past every newline.
fn sentence_boundaries(chars: &[char]) -> Vec<usize> {
    let mut out = Vec::new();
    for (i, &c) in chars.iter().enumerate() {
        if c == '\n' {
            out.push(i + 1);
        } else if SENTENCE_TERMINATORS.contains(&c)
            && chars.get(i + 1).map_or(false, |n| n.is_whitespace())
        {
            out.push(i + 1);
        }
    }
    out
}

/// The candidate in `[lo, hi]` closest to `ideal`; ties prefer the earlier one.
fn nearest_in(sorted: &[usize], lo: usize, hi: usize, ideal: usize) -> Option<usize> {
    let from = sorted.partition_point(|&p| p < lo);
    sorted[from..]
        .iter()
        .take_while(|&&p| p <= hi)
        .copied()
        .min_by_key(|&p| p.abs_diff(ideal))
}

fn chunk_id(ordinal: u32, text_sha256: &str) -> String {
    let digest = Sha256::digest(format!("{ordinal}:{text_sha256}").as_bytes());
    hex::encode(&digest[..8])
}

/// Concatenate chunks, dropping the leading `overlap` characters of every chunk
/// after the first.
pub fn reassemble(chunks: &[Chunk], overlap: usize) -> String {
    let mut out = String::new();
    for (i, c) in chunks.iter().enumerate() {
        if i == 0 {
            out.push_str(&c.text);
        } else {
            out.extend(c.text.chars().skip(overlap));
        }
    }
    out
}
