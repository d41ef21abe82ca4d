//! Identifying vocabulary
//!
//! The sealable vocabulary of a subset is the union of a caller-supplied
//! [`TermLexicon`] and terms harvested automatically from free text. Which
//! harvesters run is decided by [`LexicalConfig`]; text inside denylist
//! matches is masked first so URLs and DOIs never leak into the codebook.

use crate::denylist::Denylist;
use crate::knob::LexicalConfig;
use crate::matcher::TermMatcher;
use crate::text::{
    self, as_year, is_compound, is_numeric_string, is_sentence_initial, is_stopword,
};
use sealworld_core::PaperRecord;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;

/// Known identifying terms, by category
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TermLexicon {
    /// Author and lab names
    pub names: BTreeSet<String>,
    /// Dataset names
    pub datasets: BTreeSet<String>,
    /// Model and method names
    pub models: BTreeSet<String>,
    /// Venues
    pub venues: BTreeSet<String>,
    /// Anything else
    pub other: BTreeSet<String>,
}

impl TermLexicon {
    /// Every term across categories
    pub fn terms(&self) -> impl Iterator<Item = &str> {
        self.names
            .iter()
            .chain(&self.datasets)
            .chain(&self.models)
            .chain(&self.venues)
            .chain(&self.other)
            .map(String::as_str)
    }

    /// No terms at all
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.terms().next().is_none()
    }

    /// Builder-style model name
    #[must_use]
    pub fn with_model(mut self, term: impl Into<String>) -> Self {
        self.models.insert(term.into());
        self
    }

    /// Builder-style dataset name
    #[must_use]
    pub fn with_dataset(mut self, term: impl Into<String>) -> Self {
        self.datasets.insert(term.into());
        self
    }

    /// Builder-style author or lab name
    #[must_use]
    pub fn with_name(mut self, term: impl Into<String>) -> Self {
        self.names.insert(term.into());
        self
    }
}

/// Harvested vocabulary
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Vocabulary {
    /// Surface forms as they appear in text (multi-word allowed)
    pub terms: BTreeSet<String>,
    /// Years to map onto era labels
    pub years: BTreeSet<u16>,
}

impl Vocabulary {
    /// Distinct normalised terms
    #[must_use]
    pub fn normalized_terms(&self) -> BTreeSet<String> {
        self.terms.iter().map(|t| text::normalize_term(t)).collect()
    }

    /// Nothing to seal
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty() && self.years.is_empty()
    }
}

/// Harvests the identifying vocabulary of a record set
#[derive(Debug)]
pub struct VocabularyExtractor<'a> {
    config: &'a LexicalConfig,
    lexicon: &'a TermLexicon,
}

impl<'a> VocabularyExtractor<'a> {
    /// Extractor for one sealing configuration
    #[must_use]
    pub fn new(config: &'a LexicalConfig, lexicon: &'a TermLexicon) -> Self {
        Self { config, lexicon }
    }

    /// Vocabulary over every free-text field of `records`
    ///
    /// `texts` overrides record text (paraphrased prose), keyed by
    /// `(record index, field name)`.
    #[must_use]
    pub fn extract(
        &self,
        records: &[PaperRecord],
        texts: &BTreeMap<(usize, String), String>,
    ) -> Vocabulary {
        let mut vocab = Vocabulary::default();
        if !self.config.enabled {
            return vocab;
        }

        let documents: Vec<String> = records
            .iter()
            .enumerate()
            .map(|(idx, record)| {
                record
                    .text_fields()
                    .map(|(field, raw)| {
                        let body = texts
                            .get(&(idx, field.to_string()))
                            .map_or(raw, String::as_str);
                        mask_denylisted(body)
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .collect();

        let surfaces: BTreeMap<String, &str> = self
            .lexicon
            .terms()
            .map(|t| (text::normalize_term(t), t))
            .filter(|(n, _)| !n.is_empty())
            .collect();
        let lexicon = TermMatcher::from_terms(surfaces.values().copied(), false);

        let document_frequency = self.rare_token_df(&documents);

        for doc in &documents {
            for found in lexicon.find(doc) {
                if let Some(surface) = surfaces.get(&found.term) {
                    vocab.terms.insert((*surface).to_string());
                }
                let observed = doc[found.span].split_whitespace().collect::<Vec<_>>().join(" ");
                vocab.terms.insert(observed);
            }

            for span in text::word_spans(doc) {
                let word = &doc[span.clone()];
                if let Some(year) = as_year(word) {
                    if self.config.seal_years {
                        vocab.years.insert(year);
                    }
                    continue;
                }
                if is_numeric_string(word) {
                    continue;
                }
                if self.config.extract_identifiers && is_identifier(word) {
                    vocab.terms.insert(word.to_string());
                    continue;
                }
                if is_compound(word) {
                    self.harvest_parts(doc, &span, &mut vocab);
                    continue;
                }
                if self.config.extract_capitalized
                    && is_capitalized_word(word)
                    && !is_sentence_initial(doc, span.start)
                    && !is_stopword(word)
                {
                    vocab.terms.insert(word.to_string());
                    continue;
                }
                if let Some(max_df) = self.config.rare_token_df_max {
                    if is_content_token(word)
                        && document_frequency
                            .get(word.to_lowercase().as_str())
                            .is_some_and(|df| *df <= max_df)
                    {
                        vocab.terms.insert(word.to_string());
                    }
                }
            }
        }

        tracing::debug!(
            "Extracted vocabulary: {} terms, {} years",
            vocab.terms.len(),
            vocab.years.len()
        );
        vocab
    }

    /// Identifier and capitalised parts of a compound word
    fn harvest_parts(&self, doc: &str, word: &Range<usize>, vocab: &mut Vocabulary) {
        for part in text::segment_spans(doc, word) {
            let token = &doc[part.clone()];
            if as_year(token).is_some() || is_numeric_string(token) {
                continue;
            }
            if self.config.extract_identifiers && is_identifier(token) {
                vocab.terms.insert(token.to_string());
            } else if self.config.extract_capitalized
                && is_capitalized_word(token)
                && !(part.start == word.start && is_sentence_initial(doc, word.start))
                && !is_stopword(token)
            {
                vocab.terms.insert(token.to_string());
            }
        }
    }

    fn rare_token_df(&self, documents: &[String]) -> BTreeMap<String, usize> {
        let mut df = BTreeMap::new();
        if self.config.rare_token_df_max.is_none() {
            return df;
        }
        for doc in documents {
            let distinct: BTreeSet<String> = text::lowercase_tokens(doc).into_iter().collect();
            for token in distinct {
                *df.entry(token).or_insert(0) += 1;
            }
        }
        df
    }
}

/// Replace denylisted spans with spaces so harvesting skips them
fn mask_denylisted(text: &str) -> String {
    let spans = Denylist::standard().masked_spans(text);
    if spans.is_empty() {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for span in spans {
        out.push_str(&text[cursor..span.start]);
        out.push(' ');
        cursor = span.end;
    }
    out.push_str(&text[cursor..]);
    out
}

/// CamelCase, digit-bearing or acronym token
fn is_identifier(word: &str) -> bool {
    let has_alpha = word.chars().any(char::is_alphabetic);
    let has_digit = word.chars().any(|c| c.is_ascii_digit());
    let upper = word.chars().filter(|c| c.is_uppercase()).count();
    let lower = word.chars().filter(|c| c.is_lowercase()).count();

    let camel = word
        .chars()
        .zip(word.chars().skip(1))
        .any(|(a, b)| a.is_lowercase() && b.is_uppercase());
    let acronym = upper >= 2 && lower == 0;
    let mixed_case_acronym = upper >= 2 && word.chars().next().is_some_and(char::is_uppercase);

    has_alpha && (camel || acronym || mixed_case_acronym || has_digit)
}

/// `Transformer`: one leading capital, lowercase rest
fn is_capitalized_word(word: &str) -> bool {
    let mut chars = word.chars();
    chars.next().is_some_and(char::is_uppercase)
        && word.chars().count() >= 3
        && chars.all(|c| c.is_lowercase())
}

/// Lowercase alphabetic content word
fn is_content_token(word: &str) -> bool {
    word.chars().count() >= 4 && word.chars().all(char::is_lowercase) && !is_stopword(word)
}
