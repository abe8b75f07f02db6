use lex_core::error::{codes, AppError};
use serde::{Deserialize, Serialize};

use super::{GenerationRequest, Llm};
use crate::ollama::OllamaClient;

/// Single-shot generation client. Retry and model fallback are the caller's
/// policy, so this performs exactly one request per call.
#[derive(Debug, Clone)]
pub struct OllamaLlm {
    client: OllamaClient,
}

impl OllamaLlm {
    pub fn new(client: OllamaClient) -> Self {
        Self { client }
    }
}

#[derive(Debug, Clone, Serialize)]
struct GenerateOptions {
    num_predict: u32,
    temperature: f32,
}

#[derive(Debug, Clone, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Clone, Deserialize)]
struct GenerateResponse {
    response: String,
}

impl Llm for OllamaLlm {
    fn generate(&self, req: &GenerationRequest<'_>) -> Result<String, AppError> {
        let body = GenerateRequest {
            model: req.model,
            prompt: req.prompt,
            stream: false,
            options: GenerateOptions {
                num_predict: req.max_tokens,
                temperature: req.temperature,
            },
        };
        let v: GenerateResponse = self.client.post_json("/api/generate", "generation", &body)?;
        if v.response.trim().is_empty() {
            return Err(AppError::new(codes::MODEL_UNAVAILABLE, "Generation response was empty")
                .with_details(format!("model={}", req.model)));
        }
        Ok(v.response)
    }
}
