use std::sync::Arc;

use lex_core::config::GenerationConfig;
use lex_core::error::{codes, AppError};
use tracing::debug;

use crate::llm::{GenerationRequest, Llm};
use crate::prompts;
use crate::retry::RetryPolicy;

const JUDGE_MAX_TOKENS: u32 = 150;
const JUDGE_SOURCES_CHARS: usize = 1500;

/// Secondary review. Consulted only after every rule check has passed.
pub trait ReviewJudge: Send + Sync {
    /// `Ok(true)` approves. Errors mean the judge is unavailable.
    fn judge(&self, question: &str, sources: &str, response: &str) -> Result<bool, AppError>;
}

pub struct LlmJudge {
    llm: Arc<dyn Llm>,
    model: String,
    retry: RetryPolicy,
}

impl LlmJudge {
    pub fn new(llm: Arc<dyn Llm>, model: impl Into<String>, retry: RetryPolicy) -> Self {
        Self {
            llm,
            model: model.into(),
            retry,
        }
    }
}

impl ReviewJudge for LlmJudge {
    fn judge(&self, question: &str, sources: &str, response: &str) -> Result<bool, AppError> {
        let sources: String = sources.chars().take(JUDGE_SOURCES_CHARS).collect();
        let prompt = prompts::review_judge_prompt(question, &sources, response);
        let req = GenerationRequest {
            model: &self.model,
            prompt: &prompt,
            max_tokens: JUDGE_MAX_TOKENS,
            temperature: GenerationConfig::default().temperature,
        };
        let raw = self.retry.run("review judge", || self.llm.generate(&req))?;
        let verdict = parse_verdict(&raw).ok_or_else(|| {
            AppError::new(codes::MODEL_UNAVAILABLE, "Judge reply had no verdict line")
                .with_details(format!("model={}", self.model))
        })?;
        debug!(model = %self.model, approved = verdict, "judge verdict");
        Ok(verdict)
    }
}

/// Reads `APPROVED: yes|no` (or `ОДОБРЕНО: да|нет`) from the judge reply.
pub fn parse_verdict(raw: &str) -> Option<bool> {
    raw.lines().find_map(|line| {
        let lower = line.trim().to_lowercase();
        let value = lower
            .strip_prefix("approved:")
            .or_else(|| lower.strip_prefix("одобрено:"))?
            .trim_start();
        if value.starts_with("yes") || value.starts_with("да") {
            Some(true)
        } else if value.starts_with("no") || value.starts_with("нет") {
            Some(false)
        } else {
            None
        }
    })
}
