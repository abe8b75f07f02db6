mod common;

use std::sync::Arc;

use common::*;
use lex_ai::sentences::{count_sentences, split_sentences};
use lex_ai::translate::{detect_language, Language, Translator};
use lex_core::error::codes;

fn long_russian_text() -> String {
    let mut text = String::new();
    for i in 1..=25 {
        text.push_str(&format!(
            "Предложение {i} описывает порядок возврата товара согласно ст. {i} закона. "
        ));
        if i % 7 == 0 {
            text.push('\n');
        }
    }
    text.push_str("Последнее предложение!");
    text
}

#[test]
fn ru_en_ru_round_trip_preserves_sentence_count() {
    let engine = Arc::new(PhrasebookEngine::new(Vec::new()));
    let translator = Translator::new(engine.clone(), 400);
    let text = long_russian_text();
    assert!(text.chars().count() > 400);

    let en = translator.translate(&text, Language::Ru, Language::En).expect("ru->en");
    let back = translator.translate(&en, Language::En, Language::Ru).expect("en->ru");

    assert_eq!(count_sentences(&en), count_sentences(&text));
    assert_eq!(count_sentences(&back), count_sentences(&text));
    assert_eq!(back.replace("[ru] ", ""), text);
}

#[test]
fn chunks_sent_to_the_engine_hold_whole_sentences_within_the_cap() {
    let engine = Arc::new(PhrasebookEngine::new(Vec::new()));
    let translator = Translator::new(engine.clone(), 400);
    let text = long_russian_text();
    translator.translate(&text, Language::Ru, Language::En).expect("translate");

    let source_sentences: Vec<String> = split_sentences(&text).iter().map(|s| s.trim().to_string()).collect();
    let received = engine.received.lock().unwrap().clone();
    assert!(received.len() > 1);
    for chunk in &received {
        assert!(chunk.chars().count() <= 400);
        for sentence in split_sentences(chunk) {
            assert!(
                source_sentences.contains(&sentence.trim().to_string()),
                "sentence cut at a chunk seam: {sentence:?}"
            );
        }
    }
}

#[test]
fn same_language_is_identity_and_missing_direction_errors() {
    let translator = Translator::new(Arc::new(PhrasebookEngine::new(Vec::new())), 400);
    assert_eq!(translator.translate("Текст.", Language::Ru, Language::Ru).unwrap(), "Текст.");
    let err = translator.translate("Текст.", Language::Ru, Language::Ky).unwrap_err();
    assert_eq!(err.code, codes::MODEL_UNAVAILABLE);
}

#[test]
fn detection_falls_back_for_mixed_or_empty_text() {
    assert_eq!(detect_language("", Language::Ru), Language::Ru);
    assert_eq!(detect_language("", Language::En), Language::En);
    assert_eq!(detect_language("abc где", Language::En), Language::En);
    assert_eq!(detect_language("ab где", Language::Ru), Language::Ru);
}
