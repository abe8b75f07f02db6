mod common;

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use common::*;
use lex_ai::summarize::SummaryMethod;
use lex_ai::translate::Language;
use lex_ai::{CancelToken, ResponseKind};
use lex_core::clock::parse_rfc3339;
use lex_core::config::AppConfig;
use lex_core::error::{codes, AppError};
use lex_core::memory::MemoryStore;

#[test]
fn scenario_a_native_query_is_answered_without_translation_or_summary() {
    let llm = Arc::new(ScriptedLlm::answering(GOOD_ANSWER));
    let (orch, memory) = orchestrator(llm.clone());

    let resp = orch
        .process("Могу ли я вернуть товар без чека?", "u1", &CancelToken::new())
        .expect("process");

    match &resp.kind {
        ResponseKind::Answered { model, attempts, summary } => {
            assert_eq!(model, "llama3:8b-instruct");
            assert_eq!(*attempts, 1);
            assert_eq!(*summary, SummaryMethod::Unchanged);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(resp.language, Language::Ru);
    assert!(resp.text.contains(GOOD_ANSWER));
    assert!(resp.text.contains("Статья 22"));
    assert!(resp.memory_written);
    assert_eq!(llm.calls(), vec!["llama3:8b-instruct"]);

    let mem = memory.read("u1").unwrap().expect("memory");
    assert_eq!(mem.records.len(), 1);
    assert_eq!(mem.records[0].query, "Могу ли я вернуть товар без чека?");
}

#[test]
fn scenario_b_direct_lookup_bypasses_generation() {
    let llm = Arc::new(ScriptedLlm::answering(GOOD_ANSWER));
    let (orch, memory) = orchestrator(llm.clone());

    let article = orch.get_article("22").expect("article");
    assert_eq!(article.id, "22");
    assert_eq!(article.text, ARTICLE_22);
    assert!(llm.calls().is_empty());
    assert_eq!(memory.user_count().unwrap(), 0);
}

#[test]
fn lookup_37_never_returns_379() {
    let (orch, _) = orchestrator(Arc::new(ScriptedLlm::answering(GOOD_ANSWER)));

    let a37 = orch.get_article("ст. 37").expect("37");
    assert!(a37.heading.starts_with("Статья 37."));
    assert!(!a37.text.contains("дарения"));

    let a379 = orch.get_article("Статья 379").expect("379");
    assert!(a379.text.contains("дарения"));

    let err = orch.get_article("3").expect_err("missing");
    assert_eq!(err.code, codes::ARTICLE_NOT_FOUND);
}

#[test]
fn scenario_c_foreign_query_is_translated_both_ways() {
    let english = "Can I return an item without a receipt?";
    let engine = Arc::new(PhrasebookEngine::new(vec![(
        Language::En,
        Language::Ru,
        english,
        "Могу ли я вернуть товар без чека?",
    )]));
    let llm = Arc::new(ScriptedLlm::answering(GOOD_ANSWER));
    let memory = Arc::new(MemoryStore::open_in_memory(AppConfig::default().memory).unwrap());
    let orch = orchestrator_with(llm, engine.clone(), memory, Ok(Arc::new(retriever())));

    let resp = orch.process(english, "u-en", &CancelToken::new()).expect("process");

    assert!(matches!(resp.kind, ResponseKind::Answered { .. }), "{:?}", resp.kind);
    assert_eq!(resp.language, Language::En);
    assert!(resp.text.starts_with("Legal consultation"));
    assert!(resp.text.contains("[en] Ответ:"));
    assert!(resp.text.contains("Sources: Article"));
    assert!(resp.text.contains("Article 22"));

    let received = engine.received.lock().unwrap().clone();
    assert_eq!(received[0], english);
    assert!(received.len() >= 2);
}

#[test]
fn scenario_d_primary_times_out_twice_then_fallback_answers() {
    let llm = Arc::new(ScriptedLlm::new(|req| {
        if req.model == "llama3:8b-instruct" {
            Err(timeout())
        } else {
            Ok(GOOD_ANSWER.to_string())
        }
    }));
    let (orch, memory) = orchestrator(llm.clone());

    let resp = orch
        .process("Могу ли я вернуть товар без чека?", "u-d", &CancelToken::new())
        .expect("process");

    match &resp.kind {
        ResponseKind::Answered { model, .. } => assert_eq!(model, "phi3:mini"),
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(llm.calls(), vec!["llama3:8b-instruct", "llama3:8b-instruct", "phi3:mini"]);
    assert!(memory.read("u-d").unwrap().is_some());
}

#[test]
fn scenario_d_every_model_failing_is_fatal_and_writes_no_memory() {
    let llm = Arc::new(ScriptedLlm::new(|_| Err(timeout())));
    let (orch, memory) = orchestrator(llm.clone());

    let resp = orch
        .process("Могу ли я вернуть товар без чека?", "u-fail", &CancelToken::new())
        .expect("process");

    match &resp.kind {
        ResponseKind::Failed(e) => assert_eq!(e.code, codes::MODEL_UNAVAILABLE),
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert!(!resp.text.is_empty());
    assert!(!resp.memory_written);
    assert_eq!(llm.calls().len(), 4);
    assert!(memory.read("u-fail").unwrap().is_none());
}

#[test]
fn review_exhaustion_returns_apology_and_still_writes_memory() {
    let llm = Arc::new(ScriptedLlm::answering("Не знаю."));
    let (orch, memory) = orchestrator(llm.clone());

    let resp = orch
        .process("Могу ли я вернуть товар без чека?", "u-r", &CancelToken::new())
        .expect("process");

    match &resp.kind {
        ResponseKind::ReviewExhausted(e) => {
            assert_eq!(e.code, codes::REVIEW_EXHAUSTED);
            let details = e.details.as_deref().unwrap_or_default();
            assert!(details.contains("attempts=2"), "{details}");
            assert!(details.contains("min_length"), "{details}");
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert!(!resp.text.contains("Не знаю"));
    assert!(resp.memory_written);
    // One attempt plus one correction.
    assert_eq!(llm.calls().len(), 2);
    assert_eq!(orch.reviewer().rejection_log().len(), 2);
    assert!(memory.read("u-r").unwrap().is_some());
}

#[test]
fn blank_query_short_circuits_to_clarification() {
    let llm = Arc::new(ScriptedLlm::answering(GOOD_ANSWER));
    let (orch, _) = orchestrator(llm.clone());

    let resp = orch.process("   ", "u-blank", &CancelToken::new()).expect("process");
    assert_eq!(resp.kind, ResponseKind::Clarification);
    assert!(llm.calls().is_empty());
}

#[test]
fn missing_index_fails_per_request_without_crashing() {
    let llm = Arc::new(ScriptedLlm::answering(GOOD_ANSWER));
    let memory = Arc::new(MemoryStore::open_in_memory(AppConfig::default().memory).unwrap());
    let engine = Arc::new(PhrasebookEngine::new(Vec::new()));
    let orch = orchestrator_with(
        llm,
        engine,
        memory,
        Err(AppError::new(codes::INDEX_UNAVAILABLE, "Index not ready")),
    );

    let resp = orch.process("вернуть товар", "u", &CancelToken::new()).expect("process");
    assert!(matches!(resp.kind, ResponseKind::Failed(ref e) if e.is(codes::INDEX_UNAVAILABLE)));
    assert_eq!(orch.get_article("22").unwrap_err().code, codes::INDEX_UNAVAILABLE);
}

#[test]
fn cancellation_before_start_writes_no_memory() {
    let llm = Arc::new(ScriptedLlm::answering(GOOD_ANSWER));
    let (orch, memory) = orchestrator(llm.clone());
    let cancel = CancelToken::new();
    cancel.cancel();

    let err = orch.process("вернуть товар без чека", "u-c", &cancel).expect_err("cancelled");
    assert_eq!(err.code, codes::REQUEST_CANCELLED);
    assert!(llm.calls().is_empty());
    assert!(memory.read("u-c").unwrap().is_none());
}

#[test]
fn cancellation_during_generation_aborts_later_stages() {
    let cancel = CancelToken::new();
    let trigger = cancel.clone();
    let llm = Arc::new(ScriptedLlm::new(move |_| {
        trigger.cancel();
        Ok(GOOD_ANSWER.to_string())
    }));
    let (orch, memory) = orchestrator(llm.clone());

    let err = orch.process("вернуть товар без чека", "u-mid", &cancel).expect_err("cancelled");
    assert!(err.is(codes::REQUEST_CANCELLED));
    assert_eq!(llm.calls().len(), 1);
    assert_eq!(memory.user_count().unwrap(), 0);
}

#[test]
fn same_user_requests_are_serialized() {
    let llm = Arc::new(ScriptedLlm::answering(GOOD_ANSWER).with_delay(Duration::from_millis(20)));
    let (orch, memory) = orchestrator(llm.clone());
    let orch = Arc::new(orch);

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let orch = orch.clone();
            thread::spawn(move || {
                orch.process(&format!("Могу ли я вернуть товар без чека? {i}"), "same-user", &CancelToken::new())
                    .expect("process")
            })
        })
        .collect();
    for h in handles {
        assert!(h.join().unwrap().memory_written);
    }

    assert_eq!(llm.max_in_flight.load(std::sync::atomic::Ordering::SeqCst), 1);
    let mem = memory.read("same-user").unwrap().unwrap();
    assert_eq!(mem.records.len(), 4);
    let stamps: Vec<_> = mem
        .records
        .iter()
        .map(|r| parse_rfc3339(&r.timestamp).unwrap())
        .collect();
    assert!(stamps.windows(2).all(|w| w[0] <= w[1]));
    assert!(parse_rfc3339(&mem.first_interaction).unwrap() <= stamps[0]);
}
