//! Review gate and the bounded self-correction loop.
//!
//! `generate -> check -> {approved | retry | rejected}`. Retries are capped by
//! [`lex_core::config::MAX_CORRECTION_ATTEMPTS`] whatever the configuration
//! says, and a rejected interpretation is never handed back as an answer.

use std::collections::BTreeSet;
use std::sync::Arc;

use lex_core::clock::now_rfc3339_utc;
use lex_core::config::ReviewConfig;
use lex_core::error::{codes, AppError};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cancel::CancelToken;
use crate::generate::{source_blocks, Generator, Interpretation};
use crate::retrieve::RetrievalResult;

pub mod judge;
pub mod log;
pub mod rules;

pub use judge::{LlmJudge, ReviewJudge};
pub use log::{RejectionEntry, RejectionLog};
pub use rules::{significant_terms, RuleChecker};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    MinLength,
    LegalContext,
    QueryOverlap,
    JudgeRejected,
}

impl CheckKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CheckKind::MinLength => "min_length",
            CheckKind::LegalContext => "legal_context",
            CheckKind::QueryOverlap => "query_overlap",
            CheckKind::JudgeRejected => "judge_rejected",
        }
    }

    /// Corrective instruction appended to the prompt on the next attempt.
    pub fn correction(self) -> &'static str {
        match self {
            CheckKind::MinLength => "ответ слишком короткий, дай полный ответ в 3-5 предложениях",
            CheckKind::LegalContext => {
                "укажи правовое основание со ссылкой на статью в форме \"Статья N\""
            }
            CheckKind::QueryOverlap => "ответ не касается вопроса, ответь именно на заданный вопрос",
            CheckKind::JudgeRejected => {
                "проверка качества отклонила ответ, опирайся строго на приведенные статьи"
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewVerdict {
    pub approved: bool,
    pub failed_checks: BTreeSet<CheckKind>,
}

impl ReviewVerdict {
    fn from_failed(failed_checks: BTreeSet<CheckKind>) -> Self {
        Self {
            approved: failed_checks.is_empty(),
            failed_checks,
        }
    }

    /// `REVIEW_EXHAUSTED` describing why the last of `attempts` was rejected.
    pub fn exhausted_error(&self, attempts: u32) -> AppError {
        let failed: Vec<&str> = self.failed_checks.iter().map(|c| c.as_str()).collect();
        AppError::new(codes::REVIEW_EXHAUSTED, "Review rejected every attempt")
            .with_details(format!("attempts={attempts}; failed={}", failed.join(",")))
    }

    pub fn correction(&self) -> Option<String> {
        if self.approved {
            return None;
        }
        Some(
            self.failed_checks
                .iter()
                .map(|c| c.correction())
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReviewOutcome {
    Approved {
        interpretation: Interpretation,
        attempts: u32,
    },
    Rejected {
        verdict: ReviewVerdict,
        attempts: u32,
    },
}

pub struct Reviewer {
    rules: RuleChecker,
    judge: Option<Arc<dyn ReviewJudge>>,
    log: Arc<RejectionLog>,
    max_corrections: u32,
}

impl Reviewer {
    pub fn new(settings: ReviewConfig, judge: Option<Arc<dyn ReviewJudge>>) -> Self {
        let log = Arc::new(RejectionLog::new(settings.rejection_log_capacity));
        let max_corrections = settings.effective_attempts();
        Self {
            rules: RuleChecker::new(settings),
            judge,
            log,
            max_corrections,
        }
    }

    pub fn rejection_log(&self) -> &Arc<RejectionLog> {
        &self.log
    }

    pub fn max_corrections(&self) -> u32 {
        self.max_corrections
    }

    /// Rule checks, then the judge when every rule passes. The judge can only
    /// add a rejection; an unavailable judge approves.
    pub fn review(&self, question: &str, sources: &[RetrievalResult], response: &str) -> ReviewVerdict {
        let mut failed = self.rules.check(question, response);
        if failed.is_empty() {
            if let Some(judge) = &self.judge {
                match judge.judge(question, &source_blocks(sources), response) {
                    Ok(true) => {}
                    Ok(false) => {
                        failed.insert(CheckKind::JudgeRejected);
                    }
                    Err(e) => warn!(error = %e, "review judge unavailable; accepting rule verdict"),
                }
            }
        }
        ReviewVerdict::from_failed(failed)
    }

    /// Generate and review, regenerating with a corrective instruction at most
    /// `max_corrections` times. Generation errors propagate.
    pub fn run(
        &self,
        generator: &Generator,
        question: &str,
        sources: &[RetrievalResult],
        cancel: &CancelToken,
    ) -> Result<ReviewOutcome, AppError> {
        let mut correction: Option<String> = None;
        let mut attempt = 0u32;
        loop {
            cancel.check()?;
            let interpretation = generator.generate(question, sources, correction.as_deref())?;
            cancel.check()?;
            let verdict = self.review(question, sources, &interpretation.text);
            if verdict.approved {
                debug!(attempt, model = %interpretation.model, "review approved");
                return Ok(ReviewOutcome::Approved {
                    interpretation,
                    attempts: attempt + 1,
                });
            }

            let failed: Vec<CheckKind> = verdict.failed_checks.iter().copied().collect();
            warn!(attempt, failed = ?failed, "review rejected interpretation");
            let ts = now_rfc3339_utc().unwrap_or_default();
            self.log.record(ts, attempt, failed, &interpretation.text);

            if attempt >= self.max_corrections {
                return Ok(ReviewOutcome::Rejected {
                    verdict,
                    attempts: attempt + 1,
                });
            }
            correction = verdict.correction();
            attempt += 1;
        }
    }
}
