//! Request orchestration.
//!
//! `detect -> translate in? -> retrieve -> generate/review -> summarize? ->
//! translate out? -> format -> memory append`. Every stage failure is caught
//! here and mapped to a non-empty reply; only cancellation escapes `process`
//! as an error. Requests of one user run one at a time, end to end.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use lex_core::clock::now_rfc3339_utc;
use lex_core::config::AppConfig;
use lex_core::error::{codes, AppError};
use lex_core::memory::MemoryStore;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::format;
use crate::generate::Generator;
use crate::retrieve::Retriever;
use crate::review::{ReviewOutcome, Reviewer};
use crate::summarize::{SummaryMethod, Summarizer};
use crate::translate::{detect_language, Language, Translator};

pub mod wiring;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ResponseKind {
    Answered {
        model: String,
        attempts: u32,
        summary: SummaryMethod,
    },
    /// Nothing relevant was retrieved; the user is asked to rephrase.
    Clarification,
    /// Review rejected every attempt; a fixed apology was returned instead.
    ReviewExhausted(AppError),
    /// Retrieval or generation was unavailable. No memory is written.
    Failed(AppError),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineResponse {
    pub text: String,
    pub kind: ResponseKind,
    pub language: Language,
    pub memory_written: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArticleText {
    pub id: String,
    pub heading: String,
    pub text: String,
}

#[derive(Debug, Clone, Copy)]
pub struct PipelineSettings {
    pub native: Language,
    pub top_k: usize,
    pub hard_cap_chars: usize,
}

impl PipelineSettings {
    pub fn from_config(cfg: &AppConfig) -> Result<Self, AppError> {
        let native = Language::from_code(&cfg.translation.native_language).ok_or_else(|| {
            AppError::new(codes::CONFIG_INVALID, "Unsupported native language")
                .with_details(format!("native_language={}", cfg.translation.native_language))
        })?;
        Ok(Self {
            native,
            top_k: cfg.retrieval.top_k,
            hard_cap_chars: cfg.summary.hard_cap_chars,
        })
    }
}

/// Injectable stage handles. The retriever is a `Result` so a missing or
/// corrupt index degrades each request instead of the whole service.
pub struct Services {
    pub retriever: Result<Arc<Retriever>, AppError>,
    pub generator: Generator,
    pub reviewer: Reviewer,
    pub summarizer: Summarizer,
    pub translator: Translator,
    pub memory: Arc<MemoryStore>,
}

struct Reply {
    text: String,
    kind: ResponseKind,
}

pub struct Orchestrator {
    services: Services,
    settings: PipelineSettings,
    user_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Orchestrator {
    pub fn new(services: Services, settings: PipelineSettings) -> Self {
        Self {
            services,
            settings,
            user_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn reviewer(&self) -> &Reviewer {
        &self.services.reviewer
    }

    pub fn memory(&self) -> &Arc<MemoryStore> {
        &self.services.memory
    }

    /// Answer `raw_query` for `user_id`. Returns `Err(REQUEST_CANCELLED)` only
    /// when `cancel` fires; nothing is written to memory in that case.
    pub fn process(&self, raw_query: &str, user_id: &str, cancel: &CancelToken) -> Result<PipelineResponse, AppError> {
        let lock = self.user_lock(user_id);
        let result = {
            let _serial = lock.lock().unwrap_or_else(|p| p.into_inner());
            self.process_serialized(raw_query, user_id, cancel)
        };
        self.release_user_lock(user_id, lock);
        result
    }

    fn process_serialized(&self, raw_query: &str, user_id: &str, cancel: &CancelToken) -> Result<PipelineResponse, AppError> {
        let started = Instant::now();
        let language = detect_language(raw_query, self.settings.native);
        info!(user_id, chars = raw_query.chars().count(), lang = %language, "request received");

        let reply = match self.run_stages(raw_query, language, cancel) {
            Ok(reply) => reply,
            Err(e) if e.is(codes::REQUEST_CANCELLED) => {
                info!(user_id, "request cancelled");
                return Err(e);
            }
            Err(e) => {
                warn!(user_id, error = %e, "request failed");
                Reply {
                    text: format::failure(language),
                    kind: ResponseKind::Failed(e),
                }
            }
        };

        let mut memory_written = false;
        if !matches!(reply.kind, ResponseKind::Failed(_)) {
            cancel.check()?;
            memory_written = self.append_memory(user_id, raw_query, &reply.text);
        }

        info!(
            user_id,
            elapsed_ms = started.elapsed().as_millis() as u64,
            memory_written,
            outcome = outcome_label(&reply.kind),
            "request complete"
        );
        Ok(PipelineResponse {
            text: reply.text,
            kind: reply.kind,
            language,
            memory_written,
        })
    }

    fn run_stages(&self, raw_query: &str, language: Language, cancel: &CancelToken) -> Result<Reply, AppError> {
        let native = self.settings.native;
        let query = raw_query.trim();
        if query.is_empty() {
            return Ok(clarification(language));
        }

        cancel.check()?;
        let normalized = if language == native {
            query.to_string()
        } else {
            self.translate_or_pass(query, language, native, "in")
        };

        cancel.check()?;
        let retriever = self.services.retriever.as_ref().map_err(Clone::clone)?;
        let results = retriever.retrieve(&normalized, self.settings.top_k)?;
        debug!(hits = results.len(), "retrieve stage");
        if results.is_empty() {
            return Ok(clarification(language));
        }

        let outcome = self
            .services
            .reviewer
            .run(&self.services.generator, &normalized, &results, cancel)?;
        let (interpretation, attempts) = match outcome {
            ReviewOutcome::Approved {
                interpretation,
                attempts,
            } => (interpretation, attempts),
            ReviewOutcome::Rejected { verdict, attempts } => {
                let error = verdict.exhausted_error(attempts);
                warn!(code = %error.code, attempts, failed = ?verdict.failed_checks, "review exhausted");
                return Ok(Reply {
                    text: format::review_apology(language),
                    kind: ResponseKind::ReviewExhausted(error),
                });
            }
        };

        cancel.check()?;
        let summary = self.services.summarizer.summarize(&interpretation.text);
        debug!(method = ?summary.method, chars = summary.text.chars().count(), "summarize stage");

        cancel.check()?;
        let body = if language == native {
            summary.text
        } else {
            self.translate_or_pass(&summary.text, native, language, "out")
        };

        let mut article_ids: Vec<String> = Vec::new();
        for r in &results {
            for id in &r.chunk.source_article_ids {
                if !article_ids.contains(id) {
                    article_ids.push(id.clone());
                }
            }
        }

        Ok(Reply {
            text: format::answer(language, &body, &article_ids, self.settings.hard_cap_chars),
            kind: ResponseKind::Answered {
                model: interpretation.model,
                attempts,
                summary: summary.method,
            },
        })
    }

    fn translate_or_pass(&self, text: &str, from: Language, to: Language, stage: &str) -> String {
        match self.services.translator.translate(text, from, to) {
            Ok(t) => t,
            Err(e) => {
                warn!(stage, %from, %to, error = %e, "translation degraded; passing text through");
                text.to_string()
            }
        }
    }

    fn append_memory(&self, user_id: &str, query: &str, response: &str) -> bool {
        let at = match now_rfc3339_utc() {
            Ok(at) => at,
            Err(e) => {
                warn!(user_id, error = %e, "memory write skipped");
                return false;
            }
        };
        match self.services.memory.append(user_id, query, response, &at) {
            Ok(_) => true,
            Err(e) => {
                warn!(user_id, error = %e, "memory write failed");
                false
            }
        }
    }

    /// Verbatim article text by identifier. Bypasses generation and review.
    pub fn get_article(&self, identifier: &str) -> Result<ArticleText, AppError> {
        let retriever = self.services.retriever.as_ref().map_err(Clone::clone)?;
        let hit = retriever.lookup_by_identifier(identifier)?;
        debug!(id = %hit.article.id, chunks = hit.chunks.len(), "article lookup");
        Ok(ArticleText {
            id: hit.article.id.clone(),
            heading: hit.article.heading.clone(),
            text: hit.text.to_string(),
        })
    }

    fn user_lock(&self, user_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.user_locks.lock().unwrap_or_else(|p| p.into_inner());
        locks.entry(user_id.to_string()).or_default().clone()
    }

    fn release_user_lock(&self, user_id: &str, lock: Arc<Mutex<()>>) {
        let mut locks = self.user_locks.lock().unwrap_or_else(|p| p.into_inner());
        // Only the map and this caller still hold it: nobody is waiting.
        if Arc::strong_count(&lock) == 2 {
            locks.remove(user_id);
        }
    }
}

fn clarification(language: Language) -> Reply {
    Reply {
        text: format::clarification(language),
        kind: ResponseKind::Clarification,
    }
}

fn outcome_label(kind: &ResponseKind) -> &'static str {
    match kind {
        ResponseKind::Answered { .. } => "answered",
        ResponseKind::Clarification => "clarification",
        ResponseKind::ReviewExhausted(_) => "review_exhausted",
        ResponseKind::Failed(_) => "failed",
    }
}
