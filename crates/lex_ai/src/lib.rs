pub mod cancel;
pub mod corpus;
pub mod embeddings;
pub mod format;
pub mod generate;
pub mod guardrails;
pub mod index;
pub mod llm;
pub mod ollama;
pub mod pipeline;
mod prompts;
pub mod retrieve;
pub mod retry;
pub mod review;
pub mod sentences;
pub mod summarize;
pub mod translate;

pub use cancel::CancelToken;
pub use pipeline::{ArticleText, Orchestrator, PipelineResponse, PipelineSettings, ResponseKind, Services};
