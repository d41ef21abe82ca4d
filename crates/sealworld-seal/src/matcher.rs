//! Longest-match term finder over a radix trie
//!
//! Keys are word sequences joined by a single space. Matching walks word
//! spans left to right and extends a candidate while the trie still has a
//! descendant for the growing key, keeping the longest complete key seen.

use crate::codebook::Codebook;
use crate::text::{is_compound, only_whitespace_between, segment_spans, word_spans};
use radix_trie::{Trie, TrieCommon};
use std::ops::Range;

const PLURAL_SUFFIXES: &[&str] = &["es", "s"];

/// One matched term occurrence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermMatch {
    /// Byte range of the matched words
    pub span: Range<usize>,
    /// Normalised term
    pub term: String,
    /// Plural suffix as it appeared in text, if matched through a plural
    pub plural_suffix: Option<String>,
}

/// Word-boundary, longest-match-first term finder
#[derive(Debug)]
pub struct TermMatcher {
    trie: Trie<String, String>,
    case_insensitive: bool,
    plurals: bool,
}

impl TermMatcher {
    /// Matcher over a codebook's terms
    ///
    /// Case-insensitive matchers key on normalised terms; exact-case
    /// matchers key on the surface forms observed during extraction.
    #[must_use]
    pub fn new(codebook: &Codebook, case_insensitive: bool, plurals: bool) -> Self {
        let mut trie = Trie::new();
        if case_insensitive {
            for (term, _) in codebook.terms() {
                trie.insert(term.to_string(), term.to_string());
            }
        } else {
            for (surface, term) in codebook.surfaces() {
                trie.insert(surface.to_string(), term.to_string());
            }
        }
        Self {
            trie,
            case_insensitive,
            plurals,
        }
    }

    /// Case-insensitive matcher over arbitrary terms
    #[must_use]
    pub fn from_terms<'t>(terms: impl IntoIterator<Item = &'t str>, plurals: bool) -> Self {
        let mut trie = Trie::new();
        for term in terms {
            let key = crate::text::normalize_term(term);
            if !key.is_empty() {
                trie.insert(key.clone(), key);
            }
        }
        Self {
            trie,
            case_insensitive: true,
            plurals,
        }
    }

    /// No keys
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.trie.is_empty()
    }

    /// Non-overlapping matches, left to right
    ///
    /// Whole words are tried first. A compound word (`Transformer-based`)
    /// that matches no key as a whole is searched again part by part, with
    /// its own joiners between parts, so `transformer` and `cifar-10` are
    /// found inside `Transformer-based` and `CIFAR-10-style`.
    #[must_use]
    pub fn find(&self, text: &str) -> Vec<TermMatch> {
        if self.trie.is_empty() {
            return Vec::new();
        }
        let spans = word_spans(text);
        let mut matches = self.longest_matches(text, &spans, |left, right| {
            only_whitespace_between(text, left, right).then_some(" ")
        });

        for span in &spans {
            let covered = matches
                .iter()
                .any(|m| m.span.start < span.end && span.start < m.span.end);
            if covered || !is_compound(&text[span.clone()]) {
                continue;
            }
            let parts = segment_spans(text, span);
            matches.extend(self.longest_matches(text, &parts, |left, right| {
                text.get(left.end..right.start)
            }));
        }
        matches.sort_by_key(|m| m.span.start);
        matches
    }

    /// Greedy longest match over `spans`; `joiner` gives the key separator
    /// between two neighbours, or `None` where a key may not continue
    fn longest_matches<'t>(
        &self,
        text: &'t str,
        spans: &[Range<usize>],
        joiner: impl Fn(&Range<usize>, &Range<usize>) -> Option<&'t str>,
    ) -> Vec<TermMatch> {
        let mut matches = Vec::new();
        let mut i = 0;
        while i < spans.len() {
            let mut key = String::new();
            let mut best: Option<(usize, String, Option<String>)> = None;

            for j in i..spans.len() {
                if j > i {
                    let Some(sep) = joiner(&spans[j - 1], &spans[j]) else {
                        break;
                    };
                    key.push_str(sep);
                }
                let word = &text[spans[j].clone()];
                if self.case_insensitive {
                    key.push_str(&word.to_lowercase());
                } else {
                    key.push_str(word);
                }

                if let Some(term) = self.trie.get(&key) {
                    best = Some((j, term.clone(), None));
                } else if let Some((term, suffix)) = self.plural_match(&key, word) {
                    best = Some((j, term, Some(suffix)));
                }

                if self.trie.get_raw_descendant(&key).is_none() {
                    break;
                }
            }

            match best {
                Some((end, term, plural_suffix)) => {
                    matches.push(TermMatch {
                        span: spans[i].start..spans[end].end,
                        term,
                        plural_suffix,
                    });
                    i = end + 1;
                }
                None => i += 1,
            }
        }
        matches
    }

    /// Number of matches in `text`
    #[must_use]
    pub fn count(&self, text: &str) -> usize {
        self.find(text).len()
    }

    fn plural_match(&self, key: &str, last_word: &str) -> Option<(String, String)> {
        if !self.plurals {
            return None;
        }
        PLURAL_SUFFIXES.iter().find_map(|suffix| {
            let cut = key.len().checked_sub(suffix.len())?;
            if cut < 3 || !key.get(cut..)?.eq_ignore_ascii_case(suffix) {
                return None;
            }
            let stem = key.get(..cut)?.to_string();
            let surface_suffix = last_word.get(last_word.len().checked_sub(suffix.len())?..)?;
            self.trie
                .get(&stem)
                .map(|term| (term.clone(), surface_suffix.to_string()))
        })
    }
}
