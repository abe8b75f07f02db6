use std::fs;
use std::path::{Path, PathBuf};

use lex_core::config::ChunkingConfig;
use lex_core::error::{codes, AppError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::info;

use crate::corpus::{Chunk, Corpus};
use crate::retrieve::KnowledgeBase;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexStatus {
    pub ready: bool,
    pub model: Option<String>,
    pub dims: Option<u32>,
    pub chunk_count: u32,
    #[serde(default)]
    pub article_count: u32,
    pub corpus_sha256: Option<String>,
    pub chunking: Option<ChunkingConfig>,
    pub updated_at: Option<String>,
}

impl IndexStatus {
    fn not_ready() -> Self {
        Self {
            ready: false,
            model: None,
            dims: None,
            chunk_count: 0,
            article_count: 0,
            corpus_sha256: None,
            chunking: None,
            updated_at: None,
        }
    }
}

/// On-disk persistence for a [`KnowledgeBase`]: corpus text, chunk array and
/// vectors plus a status record, each written tmp -> rename.
#[derive(Debug, Clone)]
pub struct IndexStore {
    root: PathBuf,
}

impl IndexStore {
    pub fn open(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn status_path(&self) -> PathBuf {
        self.root.join("index_status.json")
    }

    fn corpus_path(&self) -> PathBuf {
        self.root.join("corpus.txt")
    }

    fn chunks_path(&self) -> PathBuf {
        self.root.join("chunks.json")
    }

    fn vectors_path(&self) -> PathBuf {
        self.root.join("vectors.json")
    }

    fn ensure_dirs(&self) -> Result<(), AppError> {
        fs::create_dir_all(&self.root).map_err(|e| {
            AppError::new("INDEX_WRITE_FAILED", "Failed to create index directory")
                .with_details(format!("path={}; err={}", self.root.display(), e))
        })
    }

    pub fn status(&self) -> Result<IndexStatus, AppError> {
        let path = self.status_path();
        if !path.exists() {
            return Ok(IndexStatus::not_ready());
        }
        read_json(&path)
    }

    /// Persist a built knowledge base. The status file is written last so a
    /// crash mid-save leaves the previous status (or none) in place.
    pub fn save(
        &self,
        kb: &KnowledgeBase,
        model: &str,
        chunking: ChunkingConfig,
        updated_at: &str,
    ) -> Result<IndexStatus, AppError> {
        self.ensure_dirs()?;

        let vectors: Vec<Vec<f32>> = kb.index().vectors().map(|v| v.to_vec()).collect();
        write_atomic(&self.corpus_path(), kb.corpus().text().as_bytes())?;
        write_json(&self.chunks_path(), kb.chunks())?;
        write_json(&self.vectors_path(), &vectors)?;

        let status = IndexStatus {
            ready: true,
            model: Some(model.to_string()),
            dims: Some(kb.index().dims() as u32),
            chunk_count: kb.chunks().len() as u32,
            article_count: kb.corpus().articles().len() as u32,
            corpus_sha256: Some(kb.corpus().sha256()),
            chunking: Some(chunking),
            updated_at: Some(updated_at.to_string()),
        };
        write_json(&self.status_path(), &status)?;
        info!(
            chunks = status.chunk_count,
            articles = status.article_count,
            dims = kb.index().dims(),
            "index saved"
        );
        Ok(status)
    }

    /// Load and verify lockstep between corpus, chunks and vectors. Any
    /// inconsistency is `INDEX_UNAVAILABLE`.
    pub fn load(&self) -> Result<(KnowledgeBase, IndexStatus), AppError> {
        let status = self.status().map_err(unavailable)?;
        if !status.ready {
            return Err(AppError::new(
                codes::INDEX_UNAVAILABLE,
                "Index not ready; build the index before querying",
            )
            .with_details(format!("root={}", self.root.display())));
        }

        let corpus_text = fs::read_to_string(self.corpus_path()).map_err(|e| {
            AppError::new(codes::INDEX_UNAVAILABLE, "Failed to read persisted corpus")
                .with_details(e.to_string())
        })?;
        let corpus = Corpus::parse(&corpus_text).map_err(unavailable)?;
        if status.corpus_sha256.as_deref() != Some(corpus.sha256().as_str()) {
            return Err(AppError::new(
                codes::INDEX_UNAVAILABLE,
                "Persisted corpus does not match index status",
            ));
        }

        let chunks: Vec<Chunk> = read_json(&self.chunks_path()).map_err(unavailable)?;
        let vectors: Vec<Vec<f32>> = read_json(&self.vectors_path()).map_err(unavailable)?;

        if chunks.len() != status.chunk_count as usize {
            return Err(AppError::new(
                codes::INDEX_UNAVAILABLE,
                "Chunk count does not match index status",
            )
            .with_details(format!("status={}; chunks={}", status.chunk_count, chunks.len())));
        }
        for (pos, c) in chunks.iter().enumerate() {
            let actual = hex::encode(Sha256::digest(c.text.as_bytes()));
            if c.ordinal as usize != pos || actual != c.text_sha256 || corpus.slice(c.span) != c.text {
                return Err(AppError::new(
                    codes::INDEX_UNAVAILABLE,
                    "Persisted chunk does not match corpus",
                )
                .with_details(format!("position={pos}; chunk_id={}", c.chunk_id)));
            }
        }
        if let (Some(dims), Some(first)) = (status.dims, vectors.first()) {
            if first.len() != dims as usize {
                return Err(AppError::new(
                    codes::INDEX_UNAVAILABLE,
                    "Vector dims do not match index status",
                )
                .with_details(format!("status={dims}; vectors={}", first.len())));
            }
        }

        let kb = KnowledgeBase::from_parts(corpus, chunks, &vectors)?;
        Ok((kb, status))
    }
}

fn unavailable(e: AppError) -> AppError {
    AppError::new(codes::INDEX_UNAVAILABLE, "Index is missing or corrupt")
        .with_details(e.to_string())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, AppError> {
    let bytes = fs::read(path).map_err(|e| {
        AppError::new("INDEX_READ_FAILED", "Failed to read index file")
            .with_details(format!("path={}; err={}", path.display(), e))
    })?;
    serde_json::from_slice(&bytes).map_err(|e| {
        AppError::new("INDEX_READ_FAILED", "Failed to decode index file")
            .with_details(format!("path={}; err={}", path.display(), e))
    })
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), AppError> {
    let json = serde_json::to_vec(value).map_err(|e| {
        AppError::new("INDEX_WRITE_FAILED", "Failed to encode index file")
            .with_details(e.to_string())
    })?;
    write_atomic(path, &json)
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), AppError> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes).map_err(|e| {
        AppError::new("INDEX_WRITE_FAILED", "Failed to write index file")
            .with_details(format!("path={}; err={}", tmp.display(), e))
    })?;
    fs::rename(&tmp, path).map_err(|e| {
        AppError::new("INDEX_WRITE_FAILED", "Failed to finalize index file write")
            .with_details(format!("tmp={}; dest={}; err={}", tmp.display(), path.display(), e))
    })
}
