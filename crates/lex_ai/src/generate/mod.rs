use std::sync::Arc;

use lex_core::config::{GenerationConfig, ModelConfig};
use lex_core::error::{codes, AppError};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::corpus::Chunk;
use crate::llm::{GenerationRequest, Llm};
use crate::prompts;
use crate::retrieve::RetrievalResult;
use crate::retry::RetryPolicy;

/// Generator output. Untrusted until it passes review.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Interpretation {
    pub text: String,
    pub source_chunks: Vec<Chunk>,
    /// Model that produced `text`.
    pub model: String,
}

pub struct Generator {
    llm: Arc<dyn Llm>,
    primary: String,
    fallback: Option<String>,
    settings: GenerationConfig,
    retry: RetryPolicy,
}

impl Generator {
    pub fn new(llm: Arc<dyn Llm>, models: &ModelConfig, settings: GenerationConfig, retry: RetryPolicy) -> Self {
        let fallback = Some(models.fallback.trim())
            .filter(|f| !f.is_empty() && *f != models.primary)
            .map(str::to_string);
        Self {
            llm,
            primary: models.primary.clone(),
            fallback,
            settings,
            retry,
        }
    }

    /// Primary model (with one retry), then the fallback model (with one
    /// retry). Both failing is `MODEL_UNAVAILABLE`.
    pub fn generate(
        &self,
        question: &str,
        sources: &[RetrievalResult],
        correction: Option<&str>,
    ) -> Result<Interpretation, AppError> {
        let prompt = prompts::interpretation_prompt(question, &source_blocks(sources), correction);
        let source_chunks: Vec<Chunk> = sources.iter().map(|r| r.chunk.clone()).collect();

        let primary_err = match self.attempt(&self.primary, &prompt) {
            Ok(text) => {
                return Ok(Interpretation {
                    text,
                    source_chunks,
                    model: self.primary.clone(),
                })
            }
            Err(e) => e,
        };

        let Some(fallback) = self.fallback.as_deref() else {
            return Err(exhausted(&self.primary, None, primary_err));
        };
        warn!(primary = %self.primary, fallback, error = %primary_err, "primary model failed; using fallback");
        match self.attempt(fallback, &prompt) {
            Ok(text) => Ok(Interpretation {
                text,
                source_chunks,
                model: fallback.to_string(),
            }),
            Err(e) => Err(exhausted(&self.primary, Some(fallback), e)),
        }
    }

    fn attempt(&self, model: &str, prompt: &str) -> Result<String, AppError> {
        let req = GenerationRequest {
            model,
            prompt,
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
        };
        let text = self.retry.run("generation", || self.llm.generate(&req))?;
        let text = text.trim().to_string();
        debug!(model, chars = text.chars().count(), "generation complete");
        Ok(text)
    }
}

fn exhausted(primary: &str, fallback: Option<&str>, last: AppError) -> AppError {
    AppError::new(codes::MODEL_UNAVAILABLE, "Generation failed on every configured model").with_details(
        format!(
            "primary={primary}; fallback={}; last_error={last}",
            fallback.unwrap_or("none")
        ),
    )
}

/// Source chunks with their article citations, most relevant first.
pub fn source_blocks(sources: &[RetrievalResult]) -> String {
    sources
        .iter()
        .map(|r| {
            let cite = if r.chunk.source_article_ids.is_empty() {
                "Преамбула".to_string()
            } else {
                r.chunk
                    .source_article_ids
                    .iter()
                    .map(|id| format!("Статья {id}"))
                    .collect::<Vec<_>>()
                    .join(", ")
            };
            format!("[{cite}]\n{}", r.chunk.text.trim())
        })
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}
