use lex_core::error::AppError;

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest<'a> {
    pub model: &'a str,
    pub prompt: &'a str,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Prompt in, text out. Shared across threads by the pipeline.
pub trait Llm: Send + Sync {
    fn generate(&self, req: &GenerationRequest<'_>) -> Result<String, AppError>;
}

pub mod ollama_llm;
