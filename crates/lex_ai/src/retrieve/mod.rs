use std::sync::Arc;

use lex_core::error::{codes, AppError};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::corpus::{normalize_identifier, Article, Chunk, Chunker, Corpus};
use crate::embeddings::Embedder;
use crate::index::similarity::relevance_from_distance;
use crate::index::VectorIndex;

/// Corpus, chunk array and vector index kept in lockstep by position.
#[derive(Debug, Clone)]
pub struct KnowledgeBase {
    corpus: Corpus,
    chunks: Vec<Chunk>,
    index: VectorIndex,
}

impl KnowledgeBase {
    /// Parse, chunk and embed a corpus. Corpus problems are `CORPUS_INVALID`.
    pub fn build(corpus_text: &str, chunker: &Chunker, embedder: &dyn Embedder) -> Result<Self, AppError> {
        let corpus = Corpus::parse(corpus_text)?;
        let chunks = chunker.chunk(&corpus);
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = embedder.embed_batch(&texts)?;
        Self::from_parts(corpus, chunks, &vectors)
    }

    pub fn from_parts(corpus: Corpus, chunks: Vec<Chunk>, vectors: &[Vec<f32>]) -> Result<Self, AppError> {
        if chunks.len() != vectors.len() {
            return Err(AppError::new(
                codes::INDEX_UNAVAILABLE,
                "Chunk array and vectors are out of lockstep",
            )
            .with_details(format!("chunks={}; vectors={}", chunks.len(), vectors.len())));
        }
        let index = VectorIndex::build(vectors)?;
        Ok(Self { corpus, chunks, index })
    }

    pub fn corpus(&self) -> &Corpus {
        &self.corpus
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievalResult {
    pub chunk: Chunk,
    pub relevance_score: f32,
    pub distance: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArticleHit<'a> {
    pub article: &'a Article,
    /// Verbatim article text with trailing whitespace removed.
    pub text: &'a str,
    pub chunks: Vec<&'a Chunk>,
}

/// Embedder plus index. Shared read-only across concurrent requests.
pub struct Retriever {
    kb: KnowledgeBase,
    embedder: Arc<dyn Embedder>,
}

impl std::fmt::Debug for Retriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retriever")
            .field("kb", &self.kb)
            .finish_non_exhaustive()
    }
}

impl Retriever {
    pub fn new(kb: KnowledgeBase, embedder: Arc<dyn Embedder>) -> Self {
        Self { kb, embedder }
    }

    pub fn knowledge_base(&self) -> &KnowledgeBase {
        &self.kb
    }

    /// Top-`k` chunks by relevance, highest first. A blank query yields no results.
    pub fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RetrievalResult>, AppError> {
        let q = query.trim();
        if q.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let qv = self.embedder.embed(q)?;
        let hits = self.kb.index.search(&qv, k)?;

        let mut out = Vec::with_capacity(hits.len());
        for hit in hits {
            let chunk = self.kb.chunks.get(hit.position).ok_or_else(|| {
                AppError::new(codes::INDEX_UNAVAILABLE, "Index position has no chunk")
                    .with_details(format!("position={}", hit.position))
            })?;
            out.push(RetrievalResult {
                chunk: chunk.clone(),
                relevance_score: relevance_from_distance(hit.distance),
                distance: hit.distance,
            });
        }
        debug!(k, hits = out.len(), "retrieval complete");
        Ok(out)
    }

    /// Exact identifier lookup; accepts forms like `"ст. 37"` and never
    /// matches a longer identifier such as `"379"`.
    pub fn lookup_by_identifier(&self, raw_id: &str) -> Result<ArticleHit<'_>, AppError> {
        let not_found = || {
            AppError::new(codes::ARTICLE_NOT_FOUND, "Article not found")
                .with_details(format!("id={}", raw_id.trim()))
        };
        let id = normalize_identifier(raw_id).ok_or_else(not_found)?;
        let article = self.kb.corpus.article(&id).ok_or_else(not_found)?;
        let chunks = self.kb.chunks.iter().filter(|c| c.belongs_to(&id)).collect();
        Ok(ArticleHit {
            article,
            text: self.kb.corpus.slice(article.span).trim_end(),
            chunks,
        })
    }
}
