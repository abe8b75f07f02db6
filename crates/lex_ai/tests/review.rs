mod common;

use std::sync::Arc;

use common::*;
use lex_ai::generate::Generator;
use lex_ai::review::{CheckKind, ReviewOutcome, Reviewer, RuleChecker};
use lex_ai::CancelToken;
use lex_core::config::{AppConfig, ReviewConfig, MAX_CORRECTION_ATTEMPTS};

const QUERY: &str = "Могу ли я вернуть товар без чека по договору купли-продажи?";

fn rules(min_shared_terms: usize) -> RuleChecker {
    RuleChecker::new(ReviewConfig {
        min_shared_terms,
        ..ReviewConfig::default()
    })
}

#[test]
fn short_responses_are_always_rejected() {
    for response in ["", "Статья 22.", "Да, по закону.", "вернуть товар чека"] {
        let failed = rules(0).check(QUERY, response);
        assert!(failed.contains(&CheckKind::MinLength), "{response:?}");
    }
}

#[test]
fn responses_sharing_no_terms_are_always_rejected() {
    let response = "Согласно статье 379 кодекса, дарение оформляется безвозмездно и письменно.";
    for threshold in 0..5 {
        let failed = rules(threshold).check(QUERY, response);
        assert!(failed.contains(&CheckKind::QueryOverlap), "threshold {threshold}");
    }
}

#[test]
fn overlap_check_is_monotonic_in_threshold() {
    // Shares "верну", "товар" and "чека" with the query.
    let response = "Основание: статья 22 позволяет вернуть товар без чека магазину.";
    let passes: Vec<bool> = (0..8)
        .map(|t| !rules(t).check(QUERY, response).contains(&CheckKind::QueryOverlap))
        .collect();
    let first_fail = passes.iter().position(|p| !p).expect("some threshold fails");
    assert!(passes[..first_fail].iter().all(|p| *p));
    assert!(passes[first_fail..].iter().all(|p| !*p));
    assert_eq!(first_fail, 4);
}

#[test]
fn correction_loop_is_bounded_whatever_the_configuration() {
    let llm = Arc::new(ScriptedLlm::answering("Нет."));
    let cfg = AppConfig::default();
    let generator = Generator::new(llm.clone(), &cfg.models, cfg.generation, retry());
    let reviewer = Reviewer::new(
        ReviewConfig {
            correction_attempts: 1_000,
            ..ReviewConfig::default()
        },
        None,
    );

    let outcome = reviewer
        .run(&generator, QUERY, &[], &CancelToken::new())
        .expect("run");
    match outcome {
        ReviewOutcome::Rejected { verdict, attempts } => {
            assert_eq!(attempts, MAX_CORRECTION_ATTEMPTS + 1);
            assert!(!verdict.approved);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(llm.calls().len() as u32, MAX_CORRECTION_ATTEMPTS + 1);

    let log = reviewer.rejection_log().entries();
    assert_eq!(log.len() as u32, MAX_CORRECTION_ATTEMPTS + 1);
    assert!(log.iter().all(|e| e.failed_checks.contains(&CheckKind::MinLength)));
}

#[test]
fn corrective_instruction_reaches_the_second_attempt() {
    let llm = Arc::new(ScriptedLlm::new(|req| {
        if req.prompt.contains("Исправление") {
            Ok(GOOD_ANSWER.to_string())
        } else {
            Ok("Не знаю.".to_string())
        }
    }));
    let cfg = AppConfig::default();
    let generator = Generator::new(llm.clone(), &cfg.models, cfg.generation, retry());
    let reviewer = Reviewer::new(cfg.review.clone(), None);

    let outcome = reviewer
        .run(&generator, QUERY, &[], &CancelToken::new())
        .expect("run");
    match outcome {
        ReviewOutcome::Approved { interpretation, attempts } => {
            assert_eq!(attempts, 2);
            assert_eq!(interpretation.text, GOOD_ANSWER);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(reviewer.rejection_log().len(), 1);
}
