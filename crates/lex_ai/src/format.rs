//! Plain-text response layout and fixed templates, localised for Russian and
//! English. Kyrgyz replies use the Russian templates.

use lex_core::memory::truncate_chars;

use crate::sentences::split_sentences;
use crate::translate::Language;

struct Templates {
    header: &'static str,
    sources: &'static str,
    article: &'static str,
    disclaimer: &'static str,
    clarification: &'static str,
    review_apology: &'static str,
    not_found: &'static str,
    failure: &'static str,
}

const RU: Templates = Templates {
    header: "Юридическая консультация",
    sources: "Источники",
    article: "Статья",
    disclaimer: "Информация носит справочный характер и не заменяет консультацию юриста.",
    clarification: "Не удалось найти подходящие статьи. Уточните, пожалуйста, вопрос: опишите ситуацию подробнее или укажите номер статьи.",
    review_apology: "К сожалению, не удалось подготовить надежный ответ на этот вопрос. Пожалуйста, переформулируйте его или обратитесь к юристу.",
    not_found: "Статья {id} не найдена.",
    failure: "Сервис временно недоступен. Пожалуйста, попробуйте позже.",
};

const EN: Templates = Templates {
    header: "Legal consultation",
    sources: "Sources",
    article: "Article",
    disclaimer: "This information is for reference only and is not a substitute for advice from a lawyer.",
    clarification: "No matching articles were found. Please clarify your question: describe the situation in more detail or give an article number.",
    review_apology: "Sorry, a reliable answer to this question could not be prepared. Please rephrase it or consult a lawyer.",
    not_found: "Article {id} was not found.",
    failure: "The service is temporarily unavailable. Please try again later.",
};

fn templates(lang: Language) -> &'static Templates {
    match lang {
        Language::En => &EN,
        Language::Ru | Language::Ky => &RU,
    }
}

/// Header, answer body, cited source articles and disclaimer. The body is cut
/// at a sentence end when needed so the whole reply fits `hard_cap`.
pub fn answer(lang: Language, body: &str, article_ids: &[String], hard_cap: usize) -> String {
    let t = templates(lang);
    let head = format!("{}\n\n", t.header);
    let mut tail = String::new();
    if !article_ids.is_empty() {
        let list = article_ids
            .iter()
            .map(|id| format!("{} {id}", t.article))
            .collect::<Vec<_>>()
            .join(", ");
        tail.push_str(&format!("\n\n{}: {list}", t.sources));
    }
    tail.push_str(&format!("\n\n{}", t.disclaimer));

    let overhead = head.chars().count() + tail.chars().count();
    let body = fit_sentences(body.trim(), hard_cap.saturating_sub(overhead));
    let out = format!("{head}{body}{tail}");
    truncate_chars(&out, hard_cap)
}

pub fn clarification(lang: Language) -> String {
    templates(lang).clarification.to_string()
}

pub fn review_apology(lang: Language) -> String {
    templates(lang).review_apology.to_string()
}

pub fn not_found(lang: Language, id: &str) -> String {
    templates(lang).not_found.replace("{id}", id.trim())
}

pub fn failure(lang: Language) -> String {
    templates(lang).failure.to_string()
}

/// Longest prefix of whole sentences within `max_chars`; falls back to a hard
/// cut when even the first sentence is too long.
fn fit_sentences(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out = String::new();
    let mut used = 0usize;
    for s in split_sentences(text) {
        let n = s.chars().count();
        if used + n > max_chars {
            break;
        }
        out.push_str(s);
        used += n;
    }
    if out.trim().is_empty() {
        return truncate_chars(text, max_chars);
    }
    out.trim_end().to_string()
}
