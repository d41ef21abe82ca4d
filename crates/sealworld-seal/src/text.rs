//! Word-level text helpers shared by extraction, substitution and retrieval

use once_cell::sync::Lazy;
use regex::Regex;
use std::ops::Range;

static WORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\p{L}\p{N}](?:[\p{L}\p{N}_\-]*[\p{L}\p{N}])?").expect("word regex is valid")
});

/// Function words never treated as identifying
pub const STOPWORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "all", "also", "an", "and", "any", "appendix", "are",
    "as", "at", "be", "because", "been", "before", "being", "between", "both", "but", "by", "can",
    "could", "did", "do", "does", "each", "eq", "equation", "few", "figure", "for", "from",
    "further", "had", "has", "have", "here", "how", "however", "if", "in", "into", "is", "it",
    "its", "more", "most", "no", "nor", "not", "of", "on", "only", "or", "other", "our", "over",
    "same", "section", "should", "so", "some", "such", "table", "than", "that", "the", "their",
    "them", "then", "there", "these", "they", "this", "those", "through", "to", "under", "until",
    "up", "uses", "using", "very", "was", "we", "were", "what", "when", "where", "which", "while",
    "who", "why", "will", "with", "would", "yet",
];

/// Byte spans of every word token, left to right
///
/// A word is a run of letters and digits, optionally joined by `-` or `_`
/// (`ResNet-50` is one word).
#[must_use]
pub fn word_spans(text: &str) -> Vec<Range<usize>> {
    WORD.find_iter(text).map(|m| m.range()).collect()
}

/// Lowercased word tokens
#[must_use]
pub fn lowercase_tokens(text: &str) -> Vec<String> {
    WORD.find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .collect()
}

/// Lowercase and collapse whitespace
#[must_use]
pub fn normalize_term(term: &str) -> String {
    term.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Is `word` a function word
#[must_use]
pub fn is_stopword(word: &str) -> bool {
    STOPWORDS.binary_search(&word.to_lowercase().as_str()).is_ok()
}

/// Digits with optional separators, sign or percent, and nothing else
#[must_use]
pub fn is_numeric_string(s: &str) -> bool {
    let s = s.trim();
    let cleaned: String = s.chars().filter(|c| !matches!(c, ',' | '%')).collect();
    s.chars().any(|c| c.is_ascii_digit()) && cleaned.parse::<f64>().is_ok()
}

/// Four-digit year between 1900 and 2099
#[must_use]
pub fn as_year(token: &str) -> Option<u16> {
    if token.len() != 4 || !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    token.parse::<u16>().ok().filter(|y| (1900..=2099).contains(y))
}

/// Uppercase the first character
#[must_use]
pub fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Does the word starting at byte `start` open a sentence
#[must_use]
pub fn is_sentence_initial(text: &str, start: usize) -> bool {
    let before = text[..start].trim_end_matches(|c: char| {
        c.is_whitespace() || matches!(c, '"' | '\'' | '(' | '“' | '‘' | '[')
    });
    match before.chars().last() {
        None => true,
        Some(c) => matches!(c, '.' | '!' | '?' | '\n'),
    }
}

/// Is the text between two spans pure whitespace
#[must_use]
pub fn only_whitespace_between(text: &str, left: &Range<usize>, right: &Range<usize>) -> bool {
    left.end < right.start && text[left.end..right.start].chars().all(char::is_whitespace)
}

/// Word joined from parts by `-` or `_` (`Transformer-based`)
#[must_use]
pub fn is_compound(word: &str) -> bool {
    word.contains(['-', '_'])
}

/// Byte spans of the `-`/`_`-separated parts of the word at `word`
#[must_use]
pub fn segment_spans(text: &str, word: &Range<usize>) -> Vec<Range<usize>> {
    let mut spans = Vec::new();
    let mut start = word.start;
    for (offset, c) in text[word.clone()].char_indices() {
        if matches!(c, '-' | '_') {
            let at = word.start + offset;
            if at > start {
                spans.push(start..at);
            }
            start = at + c.len_utf8();
        }
    }
    if word.end > start {
        spans.push(start..word.end);
    }
    spans
}
