use lex_core::error::{codes, AppError};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::Embedder;
use crate::ollama::OllamaClient;
use crate::retry::RetryPolicy;

// Longer inputs are clipped before the request.
const MAX_INPUT_CHARS: usize = 12_000;
const MAX_BATCH: usize = 64;

#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    client: OllamaClient,
    model: String,
    retry: RetryPolicy,
}

impl OllamaEmbedder {
    pub fn new(client: OllamaClient, model: impl Into<String>, retry: RetryPolicy) -> Self {
        Self {
            client,
            model: model.into(),
            retry,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn call(&self, batch: &[String]) -> Result<Vec<Vec<f32>>, AppError> {
        let input: Vec<&str> = batch
            .iter()
            .map(|t| {
                let clipped = clip(t);
                if clipped.len() < t.len() {
                    warn!(
                        model = %self.model,
                        chars = t.chars().count(),
                        kept = MAX_INPUT_CHARS,
                        "embedding input clipped"
                    );
                }
                clipped
            })
            .collect();
        let req = EmbedRequest {
            model: &self.model,
            input,
        };
        let resp: EmbedResponse = self
            .retry
            .run("embed", || self.client.post_json("/api/embed", "embeddings", &req))?;

        if resp.embeddings.len() != batch.len() {
            return Err(AppError::new(
                codes::MODEL_UNAVAILABLE,
                "Embeddings response count does not match request",
            )
            .with_details(format!("expected={}; got={}", batch.len(), resp.embeddings.len())));
        }
        if resp.embeddings.iter().any(|v| v.is_empty()) {
            return Err(AppError::new(codes::MODEL_UNAVAILABLE, "Embeddings response was empty"));
        }
        Ok(resp.embeddings)
    }
}

#[derive(Debug, Clone, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
}

#[derive(Debug, Clone, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

fn clip(text: &str) -> &str {
    match text.char_indices().nth(MAX_INPUT_CHARS) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

impl Embedder for OllamaEmbedder {
    fn embed(&self, input: &str) -> Result<Vec<f32>, AppError> {
        let mut out = self.call(&[input.to_string()])?;
        out.pop()
            .ok_or_else(|| AppError::new(codes::MODEL_UNAVAILABLE, "Embeddings response was empty"))
    }

    fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, AppError> {
        let mut out = Vec::with_capacity(inputs.len());
        for batch in inputs.chunks(MAX_BATCH) {
            out.extend(self.call(batch)?);
        }
        Ok(out)
    }
}
