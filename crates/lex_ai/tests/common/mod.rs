#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use lex_ai::corpus::Chunker;
use lex_ai::embeddings::Embedder;
use lex_ai::generate::Generator;
use lex_ai::llm::{GenerationRequest, Llm};
use lex_ai::retrieve::{KnowledgeBase, Retriever};
use lex_ai::retry::RetryPolicy;
use lex_ai::review::{significant_terms, Reviewer};
use lex_ai::sentences::split_sentences;
use lex_ai::summarize::Summarizer;
use lex_ai::translate::{Language, TranslationEngine, Translator};
use lex_ai::{Orchestrator, PipelineSettings, Services};
use lex_core::config::AppConfig;
use lex_core::error::{codes, AppError};
use lex_core::memory::MemoryStore;

pub const ARTICLE_22: &str = "Статья 22. Отсутствие кассового или товарного чека\nОтсутствие у потребителя кассового или товарного чека не является основанием для отказа в удовлетворении его требований о возврате товара. Потребитель вправе вернуть товар без чека и ссылаться на свидетельские показания.";

pub fn sample_corpus() -> String {
    format!(
        "Закон Кыргызской Республики о защите прав потребителей\n\n\
Статья 1. Основные понятия\nПотребитель - гражданин, имеющий намерение заказать или приобрести товары для личных нужд. Продавец - организация, реализующая товары потребителям по договору купли-продажи.\n\n\
{ARTICLE_22}\n\n\
Статья 37. Сроки удовлетворения требований\nТребования потребителя о возврате уплаченной суммы подлежат удовлетворению продавцом в течение десяти дней со дня предъявления.\n\n\
Статья 379. Договор дарения\nПо договору дарения одна сторона безвозмездно передает или обязуется передать другой стороне вещь в собственность.\n"
    )
}

/// Unit-length bag of stemmed terms hashed into a fixed number of buckets.
pub struct HashEmbedder;

const DIMS: usize = 128;

impl Embedder for HashEmbedder {
    fn embed(&self, input: &str) -> Result<Vec<f32>, AppError> {
        let mut v = vec![0f32; DIMS];
        for term in significant_terms(input) {
            let mut h: u64 = 0xcbf29ce484222325;
            for b in term.as_bytes() {
                h ^= *b as u64;
                h = h.wrapping_mul(0x100000001b3);
            }
            v[(h % DIMS as u64) as usize] += 1.0;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm == 0.0 {
            v[0] = 1.0;
        } else {
            v.iter_mut().for_each(|x| *x /= norm);
        }
        Ok(v)
    }
}

pub fn knowledge_base() -> KnowledgeBase {
    let chunker = Chunker::new(&AppConfig::default().chunking).expect("chunker");
    KnowledgeBase::build(&sample_corpus(), &chunker, &HashEmbedder).expect("kb")
}

pub fn retriever() -> Retriever {
    Retriever::new(knowledge_base(), Arc::new(HashEmbedder))
}

type Script = dyn Fn(&GenerationRequest<'_>) -> Result<String, AppError> + Send + Sync;

/// LLM double driven by a closure; records the model of every call.
pub struct ScriptedLlm {
    script: Box<Script>,
    pub calls: Mutex<Vec<String>>,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub delay: Duration,
}

impl ScriptedLlm {
    pub fn new(script: impl Fn(&GenerationRequest<'_>) -> Result<String, AppError> + Send + Sync + 'static) -> Self {
        Self {
            script: Box::new(script),
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            delay: Duration::ZERO,
        }
    }

    pub fn answering(text: &'static str) -> Self {
        Self::new(move |_| Ok(text.to_string()))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl Llm for ScriptedLlm {
    fn generate(&self, req: &GenerationRequest<'_>) -> Result<String, AppError> {
        self.calls.lock().unwrap().push(req.model.to_string());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        let out = (self.script)(req);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        out
    }
}

pub fn timeout() -> AppError {
    AppError::new(codes::MODEL_UNAVAILABLE, "timed out").with_retryable(true)
}

/// Exact phrasebook entries first; anything else is translated sentence by
/// sentence by tagging it with the target language.
pub struct PhrasebookEngine {
    pub phrases: Vec<(Language, Language, &'static str, &'static str)>,
    pub received: Mutex<Vec<String>>,
}

impl PhrasebookEngine {
    pub fn new(phrases: Vec<(Language, Language, &'static str, &'static str)>) -> Self {
        Self {
            phrases,
            received: Mutex::new(Vec::new()),
        }
    }
}

impl TranslationEngine for PhrasebookEngine {
    fn supports(&self, from: Language, to: Language) -> bool {
        matches!((from, to), (Language::Ru, Language::En) | (Language::En, Language::Ru))
    }

    fn translate_chunk(&self, text: &str, from: Language, to: Language) -> Result<String, AppError> {
        self.received.lock().unwrap().push(text.to_string());
        if let Some((_, _, _, out)) = self.phrases.iter().find(|(f, t, src, _)| *f == from && *t == to && *src == text) {
            return Ok(out.to_string());
        }
        Ok(split_sentences(text)
            .into_iter()
            .map(|s| {
                let s = s.strip_prefix("[ru] ").or_else(|| s.strip_prefix("[en] ")).unwrap_or(s);
                format!("[{to}] {s}")
            })
            .collect())
    }
}

pub fn retry() -> RetryPolicy {
    RetryPolicy::new(1, Duration::ZERO)
}

pub fn orchestrator_with(
    llm: Arc<ScriptedLlm>,
    engine: Arc<dyn TranslationEngine>,
    memory: Arc<MemoryStore>,
    retriever: Result<Arc<Retriever>, AppError>,
) -> Orchestrator {
    let cfg = AppConfig::default();
    let services = Services {
        retriever,
        generator: Generator::new(llm.clone(), &cfg.models, cfg.generation, retry()),
        reviewer: Reviewer::new(cfg.review.clone(), None),
        summarizer: Summarizer::new(Some(llm), cfg.models.summarizer.clone(), cfg.summary, retry())
            .with_generation(cfg.generation),
        translator: Translator::new(engine, cfg.translation.chunk_cap_chars),
        memory,
    };
    Orchestrator::new(services, PipelineSettings::from_config(&cfg).expect("settings"))
}

pub fn orchestrator(llm: Arc<ScriptedLlm>) -> (Orchestrator, Arc<MemoryStore>) {
    let memory = Arc::new(MemoryStore::open_in_memory(AppConfig::default().memory).expect("memory"));
    let engine = Arc::new(PhrasebookEngine::new(Vec::new()));
    (
        orchestrator_with(llm, engine, memory.clone(), Ok(Arc::new(retriever()))),
        memory,
    )
}

pub const GOOD_ANSWER: &str = "Ответ: Вы можете вернуть товар без чека, отсутствие чека не является основанием для отказа. Основание: Статья 22. Совет: сохраните свидетельские показания.";
