use lex_core::error::AppError;

/// Text to fixed-length vector. Implementations must be deterministic for a
/// fixed model and must report failures instead of returning zero vectors.
pub trait Embedder: Send + Sync {
    fn embed(&self, input: &str) -> Result<Vec<f32>, AppError>;

    fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, AppError> {
        inputs.iter().map(|t| self.embed(t)).collect()
    }
}

pub mod ollama_embed;
