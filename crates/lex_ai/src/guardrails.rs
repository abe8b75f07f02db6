use std::collections::BTreeSet;

use crate::corpus::parse::parse_id_token;

// Longest first so "статьей" is not consumed as "статье".
const CITATION_MARKERS: [&str; 7] = [
    "статьей", "статье", "статьи", "статья", "article", "art.", "ст.",
];

/// Article identifiers cited in `text`, e.g. `"Статья 22"`, `"ст. 37"` or
/// `"Article 22-1"`.
pub fn extract_citations(text: &str) -> BTreeSet<String> {
    let lower = text.to_lowercase();
    let mut out = BTreeSet::new();
    let mut prev: Option<char> = None;

    for (i, c) in lower.char_indices() {
        let at_word_start = prev.map_or(true, |p| !p.is_alphanumeric());
        prev = Some(c);
        if !at_word_start {
            continue;
        }
        let Some(marker) = CITATION_MARKERS.iter().find(|m| lower[i..].starts_with(*m)) else {
            continue;
        };
        if let Some(id) = cited_id(&lower[i + marker.len()..], marker.ends_with('.')) {
            out.insert(id);
        }
    }
    out
}

fn cited_id(rest: &str, abbreviated: bool) -> Option<String> {
    let trimmed = rest.trim_start();
    if !abbreviated && trimmed.len() == rest.len() {
        return None;
    }
    let trimmed = trimmed.strip_prefix('№').map_or(trimmed, str::trim_start);
    let (id, consumed) = parse_id_token(trimmed)?;
    match trimmed[consumed..].chars().next() {
        Some(c) if c.is_alphanumeric() => None,
        _ => Some(id),
    }
}

/// Citations present in `input` but absent from `output`.
pub fn missing_citations(input: &str, output: &str) -> BTreeSet<String> {
    let kept = extract_citations(output);
    extract_citations(input)
        .into_iter()
        .filter(|id| !kept.contains(id))
        .collect()
}
