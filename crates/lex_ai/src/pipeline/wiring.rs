use std::fs;
use std::path::Path;
use std::sync::Arc;

use lex_core::clock::now_rfc3339_utc;
use lex_core::config::AppConfig;
use lex_core::error::{codes, AppError};
use lex_core::memory::MemoryStore;
use tracing::{info, warn};

use super::{Orchestrator, PipelineSettings, Services};
use crate::corpus::Chunker;
use crate::embeddings::ollama_embed::OllamaEmbedder;
use crate::embeddings::Embedder;
use crate::generate::Generator;
use crate::index::{IndexStatus, IndexStore};
use crate::llm::ollama_llm::OllamaLlm;
use crate::llm::Llm;
use crate::ollama::OllamaClient;
use crate::retrieve::{KnowledgeBase, Retriever};
use crate::retry::RetryPolicy;
use crate::review::{LlmJudge, ReviewJudge, Reviewer};
use crate::summarize::Summarizer;
use crate::translate::{LlmTranslationEngine, Translator};

fn embedder_for(cfg: &AppConfig, client: &OllamaClient) -> OllamaEmbedder {
    OllamaEmbedder::new(client.clone(), cfg.models.embedding.clone(), RetryPolicy::from_config(&cfg.retry))
}

/// Parse, chunk, embed and persist the corpus at `corpus_path`.
pub fn build_index(cfg: &AppConfig, corpus_path: &Path) -> Result<IndexStatus, AppError> {
    let corpus_text = fs::read_to_string(corpus_path).map_err(|e| {
        AppError::new(codes::CORPUS_INVALID, "Failed to read corpus file")
            .with_details(format!("path={}; err={}", corpus_path.display(), e))
    })?;
    let client = OllamaClient::from_config(&cfg.endpoint)?;
    let embedder = embedder_for(cfg, &client);
    let chunker = Chunker::new(&cfg.chunking)?;

    let kb = KnowledgeBase::build(&corpus_text, &chunker, &embedder)?;
    info!(
        articles = kb.corpus().articles().len(),
        chunks = kb.chunks().len(),
        "knowledge base built"
    );
    IndexStore::open(cfg.index_dir()).save(&kb, embedder.model(), cfg.chunking, &now_rfc3339_utc()?)
}

/// Load the persisted index for `embedder`. A status written for another
/// embedding model is treated as unavailable.
pub fn load_retriever(cfg: &AppConfig, embedder: Arc<dyn Embedder>) -> Result<Retriever, AppError> {
    let (kb, status) = IndexStore::open(cfg.index_dir()).load()?;
    if status.model.as_deref() != Some(cfg.models.embedding.as_str()) {
        return Err(AppError::new(
            codes::INDEX_UNAVAILABLE,
            "Index was built with a different embedding model",
        )
        .with_details(format!(
            "index_model={}; configured={}",
            status.model.unwrap_or_default(),
            cfg.models.embedding
        )));
    }
    Ok(Retriever::new(kb, embedder))
}

/// Wire Ollama-backed services from configuration. An unusable index is kept
/// as a per-request failure rather than a startup error.
pub fn orchestrator_from_config(cfg: &AppConfig) -> Result<Orchestrator, AppError> {
    let settings = PipelineSettings::from_config(cfg)?;
    let client = OllamaClient::from_config(&cfg.endpoint)?;
    let retry = RetryPolicy::from_config(&cfg.retry);
    let embedder: Arc<dyn Embedder> = Arc::new(embedder_for(cfg, &client));
    let llm: Arc<dyn Llm> = Arc::new(OllamaLlm::new(client));

    let retriever = load_retriever(cfg, embedder).map(Arc::new);
    if let Err(e) = &retriever {
        warn!(error = %e, "index unavailable; requests will fail until it is rebuilt");
    }

    let judge = cfg
        .models
        .judge
        .as_deref()
        .filter(|m| !m.trim().is_empty())
        .map(|m| Arc::new(LlmJudge::new(llm.clone(), m, retry)) as Arc<dyn ReviewJudge>);

    let services = Services {
        retriever,
        generator: Generator::new(llm.clone(), &cfg.models, cfg.generation, retry),
        reviewer: Reviewer::new(cfg.review.clone(), judge),
        summarizer: Summarizer::new(Some(llm.clone()), cfg.models.summarizer.clone(), cfg.summary, retry)
            .with_generation(cfg.generation),
        translator: Translator::new(
            Arc::new(LlmTranslationEngine::new(llm, cfg.models.translation.clone(), retry)),
            cfg.translation.chunk_cap_chars,
        ),
        memory: Arc::new(MemoryStore::open(&cfg.memory_db_path(), cfg.memory)?),
    };
    Ok(Orchestrator::new(services, settings))
}
