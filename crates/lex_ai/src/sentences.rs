/// Split `text` into sentences. Each piece keeps its trailing whitespace, so
/// concatenating the pieces gives back `text` exactly.
///
/// A sentence ends after `.`, `!`, `?` or `…` followed by whitespace, unless the
/// next word starts with a lowercase letter or a digit (`"ст. 22"`,
/// `"т. е."`). A newline always ends a sentence.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let mut out = Vec::new();
    let mut start = 0usize;
    let mut i = 0usize;

    while i < chars.len() {
        let (_, c) = chars[i];
        let ends = if c == '\n' {
            true
        } else if matches!(c, '.' | '!' | '?' | '…') {
            let next_ws = chars.get(i + 1).map_or(false, |(_, n)| n.is_whitespace());
            let next_word = chars[i + 1..].iter().map(|(_, n)| *n).find(|n| !n.is_whitespace());
            next_ws && !matches!(next_word, Some(w) if w.is_lowercase() || w.is_ascii_digit())
        } else {
            false
        };

        if ends {
            // Swallow the whitespace run so it stays with this sentence.
            let mut j = i + 1;
            while j < chars.len() && chars[j].1.is_whitespace() && chars[j - 1].1 != '\n' {
                j += 1;
            }
            let end = chars.get(j).map_or(text.len(), |(b, _)| *b);
            out.push(&text[start..end]);
            start = end;
            i = j;
            continue;
        }
        i += 1;
    }
    if start < text.len() {
        out.push(&text[start..]);
    }
    out
}

/// Number of sentences with visible content.
pub fn count_sentences(text: &str) -> usize {
    split_sentences(text).iter().filter(|s| !s.trim().is_empty()).count()
}
