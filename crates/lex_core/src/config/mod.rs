//! Application configuration.
//!
//! Every field has a default so an empty JSON object is a valid config file.
//! Environment variables override a small set of deployment-specific values.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{codes, AppError};

/// Hard ceiling on review correction attempts regardless of configuration.
pub const MAX_CORRECTION_ATTEMPTS: u32 = 2;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub endpoint: EndpointConfig,
    pub models: ModelConfig,
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalConfig,
    pub generation: GenerationConfig,
    pub review: ReviewConfig,
    pub summary: SummaryConfig,
    pub translation: TranslationConfig,
    pub memory: MemoryConfig,
    pub retry: RetryConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            endpoint: EndpointConfig::default(),
            models: ModelConfig::default(),
            chunking: ChunkingConfig::default(),
            retrieval: RetrievalConfig::default(),
            generation: GenerationConfig::default(),
            review: ReviewConfig::default(),
            summary: SummaryConfig::default(),
            translation: TranslationConfig::default(),
            memory: MemoryConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EndpointConfig {
    pub base_url: String,
    pub timeout_ms: u64,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:11434".to_string(),
            timeout_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ModelConfig {
    pub embedding: String,
    pub primary: String,
    pub fallback: String,
    /// Secondary LLM review is skipped when unset.
    pub judge: Option<String>,
    pub summarizer: String,
    /// Translation model per direction, keyed like `"ru-en"`.
    pub translation: BTreeMap<String, String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        let mut translation = BTreeMap::new();
        translation.insert("ru-en".to_string(), "llama3:8b-instruct".to_string());
        translation.insert("en-ru".to_string(), "llama3:8b-instruct".to_string());
        Self {
            embedding: "all-minilm".to_string(),
            primary: "llama3:8b-instruct".to_string(),
            fallback: "phi3:mini".to_string(),
            judge: None,
            summarizer: "llama3:8b-instruct".to_string(),
            translation,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChunkingConfig {
    pub target_chars: usize,
    pub overlap_chars: usize,
    pub tolerance_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            target_chars: 700,
            overlap_chars: 100,
            tolerance_chars: 100,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: 3 }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GenerationConfig {
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_tokens: 400,
            temperature: 0.2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ReviewConfig {
    pub min_chars: usize,
    pub min_shared_terms: usize,
    pub correction_attempts: u32,
    pub rejection_log_capacity: usize,
    pub legal_keywords: Vec<String>,
}

impl ReviewConfig {
    /// Configured attempts, clamped to [`MAX_CORRECTION_ATTEMPTS`].
    pub fn effective_attempts(&self) -> u32 {
        self.correction_attempts.min(MAX_CORRECTION_ATTEMPTS)
    }
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            min_chars: 20,
            min_shared_terms: 2,
            correction_attempts: 1,
            rejection_log_capacity: 100,
            legal_keywords: [
                "статья", "статьи", "статье", "статьей", "статью", "статей", "закон",
                "законодательств", "кодекс", "право", "договор", "договорн", "суд",
                "обязательств", "article", "law", "legal", "contract", "court", "statute",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SummaryConfig {
    /// Responses longer than this are condensed.
    pub condense_threshold_chars: usize,
    pub target_chars: usize,
    /// Transport limit; output never exceeds it.
    pub hard_cap_chars: usize,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            condense_threshold_chars: 500,
            target_chars: 500,
            hard_cap_chars: 4000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TranslationConfig {
    pub chunk_cap_chars: usize,
    pub native_language: String,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            chunk_cap_chars: 400,
            native_language: "ru".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MemoryConfig {
    pub capacity: usize,
    pub response_chars: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            capacity: 20,
            response_chars: 500,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetryConfig {
    pub retries: u32,
    pub backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            retries: 1,
            backoff_ms: 500,
        }
    }
}

impl AppConfig {
    /// Load from an optional JSON file, apply env overrides, then validate.
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        let mut cfg = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        cfg.apply_env(|k| std::env::var(k).ok());
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_file(path: &Path) -> Result<Self, AppError> {
        let raw = fs::read_to_string(path).map_err(|e| {
            AppError::new(codes::CONFIG_INVALID, "Failed to read config file")
                .with_details(format!("path={}; err={}", path.display(), e))
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            AppError::new(codes::CONFIG_INVALID, "Failed to decode config file")
                .with_details(format!("path={}; err={}", path.display(), e))
        })
    }

    /// Apply `LEXBOT_*` overrides using `lookup` (injectable for tests).
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |k: &str| lookup(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        if let Some(v) = get("LEXBOT_ENDPOINT") {
            self.endpoint.base_url = v;
        }
        if let Some(v) = get("LEXBOT_EMBED_MODEL") {
            self.models.embedding = v;
        }
        if let Some(v) = get("LEXBOT_PRIMARY_MODEL") {
            self.models.primary = v;
        }
        if let Some(v) = get("LEXBOT_FALLBACK_MODEL") {
            self.models.fallback = v;
        }
        if let Some(v) = get("LEXBOT_DATA_DIR") {
            self.data_dir = PathBuf::from(v);
        }
    }

    pub fn validate(&self) -> Result<(), AppError> {
        let invalid = |msg: &str, details: String| {
            Err(AppError::new(codes::CONFIG_INVALID, msg.to_string()).with_details(details))
        };

        let c = &self.chunking;
        if c.target_chars == 0 || c.tolerance_chars >= c.target_chars {
            return invalid(
                "Chunk target must be positive and larger than the tolerance",
                format!("target={}; tolerance={}", c.target_chars, c.tolerance_chars),
            );
        }
        if c.overlap_chars >= c.target_chars - c.tolerance_chars {
            return invalid(
                "Chunk overlap must be smaller than target minus tolerance",
                format!(
                    "target={}; tolerance={}; overlap={}",
                    c.target_chars, c.tolerance_chars, c.overlap_chars
                ),
            );
        }
        if self.retrieval.top_k == 0 {
            return invalid("retrieval.top_k must be at least 1", String::new());
        }
        if self.summary.hard_cap_chars == 0
            || self.summary.target_chars > self.summary.hard_cap_chars
        {
            return invalid(
                "Summary target must be positive and not exceed the hard cap",
                format!(
                    "target={}; hard_cap={}",
                    self.summary.target_chars, self.summary.hard_cap_chars
                ),
            );
        }
        if self.translation.chunk_cap_chars == 0 {
            return invalid("translation.chunk_cap_chars must be positive", String::new());
        }
        if self.memory.capacity == 0 {
            return invalid("memory.capacity must be positive", String::new());
        }
        if !(0.0..=2.0).contains(&self.generation.temperature) {
            return invalid(
                "generation.temperature must be within 0..=2",
                format!("temperature={}", self.generation.temperature),
            );
        }
        if self.models.primary.trim().is_empty() || self.models.embedding.trim().is_empty() {
            return invalid("Primary and embedding models must be set", String::new());
        }
        Ok(())
    }

    pub fn index_dir(&self) -> PathBuf {
        self.data_dir.join("index")
    }

    pub fn memory_db_path(&self) -> PathBuf {
        self.data_dir.join("memory.sqlite")
    }
}
