use serde::{Deserialize, Serialize};

/// Half-open character range `[start, end)` into the corpus text.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CharSpan {
    pub start: usize,
    pub end: usize,
}

impl CharSpan {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn intersects(&self, other: &CharSpan) -> bool {
        self.start < other.end && other.start < self.end
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Article {
    /// Bare identifier such as `"22"` or `"22-1"`.
    pub id: String,
    pub heading: String,
    pub span: CharSpan,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    pub chunk_id: String,
    pub ordinal: u32,
    /// Articles overlapping this chunk, in corpus order.
    pub source_article_ids: Vec<String>,
    pub text: String,
    pub span: CharSpan,
    pub text_sha256: String,
}

impl Chunk {
    pub fn belongs_to(&self, article_id: &str) -> bool {
        self.source_article_ids.iter().any(|id| id == article_id)
    }
}
