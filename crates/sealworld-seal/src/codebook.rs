//! Private codebook
//!
//! A [`Codebook`] is created once per `(seed, subset)` by the builder and is
//! immutable afterwards. It holds:
//! - term → pseudonym (injective, never self-mapping)
//! - year → era label (order preserving)
//! - formula label → symbol label
//! - the frozen per-metric numeric maps
//!
//! Pseudonyms are consonant-vowel words drawn from a `ChaCha8Rng` keyed by
//! `(seed, normalised term, salt)`. A collision with an earlier pseudonym,
//! with the term itself, or with any other real term bumps the salt.

use crate::numeric::NumericTable;
use crate::text::{self, capitalize, is_numeric_string};
use once_cell::sync::Lazy;
use rand::seq::SliceRandom;
use regex::Regex;
use sealworld_core::{BuildScope, ConfigError, ContentHash, HashError, SeedStream};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

const ONSETS: &[&str] = &[
    "b", "d", "f", "g", "k", "l", "m", "n", "p", "r", "s", "t", "v", "z",
];
const VOWELS: &[&str] = &["a", "e", "i", "o", "u"];
const CODAS: &[&str] = &["n", "r", "s", "l", "x"];

static PSEUDONYM_SHAPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:[bdfgklmnprstvz][aeiou]){3,}[nrslx]$").expect("pseudonym regex is valid")
});

/// Does `word` already look like a generated pseudonym
#[must_use]
pub fn is_pseudonym(word: &str) -> bool {
    PSEUDONYM_SHAPE.is_match(&word.to_lowercase())
}

/// Give `pseudonym` the leading case of `surface`
#[must_use]
pub fn apply_case(surface: &str, pseudonym: &str) -> String {
    if surface.chars().next().is_some_and(char::is_uppercase) {
        capitalize(pseudonym)
    } else {
        pseudonym.to_string()
    }
}

/// Private term, year, symbol and numeric tables for one sealed world
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Codebook {
    scope: BuildScope,
    terms: BTreeMap<String, String>,
    surfaces: BTreeMap<String, String>,
    years: BTreeMap<u16, String>,
    symbols: BTreeMap<String, String>,
    numeric: NumericTable,
}

impl Codebook {
    /// Generate term and year tables
    ///
    /// `vocabulary` holds surface forms; numeric strings and terms that
    /// already look like pseudonyms are skipped.
    ///
    /// # Errors
    /// Returns [`ConfigError::EmptyVocabulary`] when nothing is left to seal
    pub fn generate(
        scope: &BuildScope,
        vocabulary: &BTreeSet<String>,
        years: &BTreeSet<u16>,
    ) -> Result<Self, ConfigError> {
        let mut surfaces = BTreeMap::new();
        let mut observed = BTreeSet::new();
        for surface in vocabulary {
            let normalized = text::normalize_term(surface);
            observed.insert(normalized.clone());
            if normalized.is_empty() || is_numeric_string(&normalized) || is_pseudonym(&normalized)
            {
                continue;
            }
            surfaces.insert(surface.split_whitespace().collect::<Vec<_>>().join(" "), normalized);
        }

        let real: BTreeSet<&str> = surfaces.values().map(String::as_str).collect();
        if real.is_empty() && years.is_empty() {
            return Err(ConfigError::EmptyVocabulary);
        }

        let stream = SeedStream::new(scope.seed);
        let mut used = BTreeSet::new();
        let mut terms = BTreeMap::new();
        for normalized in &real {
            let mut salt: u32 = 0;
            let pseudonym = loop {
                let candidate = derive_pseudonym(&stream, normalized, salt);
                if candidate != *normalized
                    && !observed.contains(&candidate)
                    && !used.contains(&candidate)
                {
                    break candidate;
                }
                salt += 1;
            };
            used.insert(pseudonym.clone());
            terms.insert((*normalized).to_string(), pseudonym);
        }

        let years = years
            .iter()
            .enumerate()
            .map(|(idx, year)| (*year, format!("era-{}", idx + 1)))
            .collect();

        tracing::debug!(
            "Generated codebook for {}: {} terms, {} surfaces",
            scope,
            terms.len(),
            surfaces.len()
        );

        Ok(Self {
            scope: scope.clone(),
            terms,
            surfaces,
            years,
            symbols: BTreeMap::new(),
            numeric: NumericTable::default(),
        })
    }

    /// Codebook with no term or year entries
    #[must_use]
    pub fn empty(scope: &BuildScope) -> Self {
        Self {
            scope: scope.clone(),
            terms: BTreeMap::new(),
            surfaces: BTreeMap::new(),
            years: BTreeMap::new(),
            symbols: BTreeMap::new(),
            numeric: NumericTable::default(),
        }
    }

    /// Attach the formula symbol table; labels already covered by a term entry
    /// or that are numeric constants are left out
    #[must_use]
    pub(crate) fn with_symbols<'l>(mut self, labels: impl IntoIterator<Item = &'l str>) -> Self {
        let mut pending: Vec<String> = labels
            .into_iter()
            .filter(|l| !l.is_empty() && !is_numeric_string(l))
            .filter(|l| !self.terms.contains_key(&text::normalize_term(l)))
            .map(str::to_string)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        pending.shuffle(&mut SeedStream::new(self.scope.seed).rng("codebook symbols", &[]));
        self.symbols = pending
            .into_iter()
            .enumerate()
            .map(|(idx, label)| (label, format!("s{idx}")))
            .collect();
        self
    }

    /// Attach the frozen numeric maps
    #[must_use]
    pub(crate) fn with_numeric(mut self, numeric: NumericTable) -> Self {
        self.numeric = numeric;
        self
    }

    /// Scope the codebook was generated for
    #[inline]
    #[must_use]
    pub fn scope(&self) -> &BuildScope {
        &self.scope
    }

    /// Pseudonym for a term, case-insensitive
    #[must_use]
    pub fn lookup(&self, term: &str) -> Option<&str> {
        self.terms
            .get(&text::normalize_term(term))
            .map(String::as_str)
    }

    /// Era label for a year
    #[must_use]
    pub fn era(&self, year: u16) -> Option<&str> {
        self.years.get(&year).map(String::as_str)
    }

    /// Sealed form of a formula label
    ///
    /// Term entries win over the symbol table; numeric constants and unknown
    /// labels pass through.
    #[must_use]
    pub fn seal_label(&self, label: &str) -> String {
        if label.is_empty() || is_numeric_string(label) {
            return label.to_string();
        }
        if let Some(pseudonym) = self.lookup(label) {
            return apply_case(label, pseudonym);
        }
        self.symbols
            .get(label)
            .cloned()
            .unwrap_or_else(|| label.to_string())
    }

    /// Normalised term → pseudonym
    pub fn terms(&self) -> impl Iterator<Item = (&str, &str)> {
        self.terms.iter().map(|(t, p)| (t.as_str(), p.as_str()))
    }

    /// Surface form → normalised term
    pub fn surfaces(&self) -> impl Iterator<Item = (&str, &str)> {
        self.surfaces.iter().map(|(s, n)| (s.as_str(), n.as_str()))
    }

    /// Year → era label
    pub fn years(&self) -> impl Iterator<Item = (u16, &str)> {
        self.years.iter().map(|(y, e)| (*y, e.as_str()))
    }

    /// Formula label → symbol label
    pub fn symbols(&self) -> impl Iterator<Item = (&str, &str)> {
        self.symbols.iter().map(|(l, s)| (l.as_str(), s.as_str()))
    }

    /// Frozen numeric maps
    #[inline]
    #[must_use]
    pub fn numeric(&self) -> &NumericTable {
        &self.numeric
    }

    /// Number of term entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    /// No term entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Number of year and symbol entries
    #[must_use]
    pub fn year_and_symbol_counts(&self) -> (usize, usize) {
        (self.years.len(), self.symbols.len())
    }

    /// Sealed token → real token, across terms, eras and symbols
    ///
    /// For white-box analysis only.
    #[must_use]
    pub fn invert(&self) -> BTreeMap<String, String> {
        let mut inverse: BTreeMap<String, String> = self
            .terms
            .iter()
            .map(|(term, pseudonym)| (pseudonym.clone(), term.clone()))
            .collect();
        for (year, era) in &self.years {
            inverse.insert(era.clone(), year.to_string());
        }
        for (label, symbol) in &self.symbols {
            inverse.insert(symbol.clone(), label.clone());
        }
        inverse
    }

    /// No two terms share a pseudonym and none maps to itself
    #[must_use]
    pub fn is_injective(&self) -> bool {
        let distinct: BTreeSet<&String> = self.terms.values().collect();
        distinct.len() == self.terms.len() && self.terms.iter().all(|(t, p)| t != p)
    }

    /// Content hash for the manifest
    ///
    /// # Errors
    /// Returns [`HashError::Serialization`] if serialization fails
    pub fn content_hash(&self) -> Result<ContentHash, HashError> {
        ContentHash::compute_serializable(self)
    }

    /// Pretty JSON for white-box tooling; never part of the public artifacts
    ///
    /// # Errors
    /// Returns the serializer error
    pub fn to_private_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

fn derive_pseudonym(stream: &SeedStream, normalized: &str, salt: u32) -> String {
    let mut rng = stream.rng("codebook term", &[normalized.as_bytes(), &salt.to_le_bytes()]);
    let syllables = 3 + (salt / 8).min(3) as usize;
    let mut word = String::with_capacity(syllables * 2 + 1);
    for _ in 0..syllables {
        word.push_str(ONSETS.choose(&mut rng).copied().unwrap_or("k"));
        word.push_str(VOWELS.choose(&mut rng).copied().unwrap_or("a"));
    }
    word.push_str(CODAS.choose(&mut rng).copied().unwrap_or("n"));
    word
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use sealworld_core::Seed;

    fn scope(seed: u64) -> BuildScope {
        BuildScope::new("vision", "s1", Seed::new(seed))
    }

    fn vocab(terms: &[&str]) -> BTreeSet<String> {
        terms.iter().map(|t| (*t).to_string()).collect()
    }

    #[test]
    fn empty_vocabulary_is_a_configuration_error() {
        let err = Codebook::generate(&scope(1), &BTreeSet::new(), &BTreeSet::new()).unwrap_err();
        assert_eq!(err, ConfigError::EmptyVocabulary);
    }

    #[test]
    fn numeric_and_pseudonymous_terms_are_skipped() {
        let book = Codebook::generate(
            &scope(1),
            &vocab(&["2019", "0.91", "kavorin", "ImageNet"]),
            &BTreeSet::new(),
        )
        .unwrap();
        assert_eq!(book.len(), 1);
        assert!(book.lookup("imagenet").is_some());
        assert!(book.lookup("2019").is_none());
    }

    #[test]
    fn generation_is_deterministic_per_seed() {
        let v = vocab(&["ImageNet", "Transformer", "BERT"]);
        let a = Codebook::generate(&scope(42), &v, &BTreeSet::new()).unwrap();
        let b = Codebook::generate(&scope(42), &v, &BTreeSet::new()).unwrap();
        let c = Codebook::generate(&scope(43), &v, &BTreeSet::new()).unwrap();
        assert_eq!(a.content_hash().unwrap(), b.content_hash().unwrap());
        assert_ne!(a.lookup("ImageNet"), c.lookup("ImageNet"));
    }

    #[test]
    fn case_variants_share_one_entry() {
        let book =
            Codebook::generate(&scope(7), &vocab(&["ImageNet", "imagenet"]), &BTreeSet::new())
                .unwrap();
        assert_eq!(book.len(), 1);
        assert_eq!(book.surfaces().count(), 2);
    }

    #[test]
    fn eras_preserve_year_order() {
        let years: BTreeSet<u16> = [2019, 2012, 2017].into_iter().collect();
        let book = Codebook::generate(&scope(1), &BTreeSet::new(), &years).unwrap();
        assert_eq!(book.era(2012), Some("era-1"));
        assert_eq!(book.era(2017), Some("era-2"));
        assert_eq!(book.era(2019), Some("era-3"));
    }

    #[test]
    fn invert_recovers_terms_and_years() {
        let years: BTreeSet<u16> = [2017].into_iter().collect();
        let book = Codebook::generate(&scope(5), &vocab(&["ImageNet"]), &years).unwrap();
        let inverse = book.invert();
        let pseudonym = book.lookup("ImageNet").unwrap();
        assert_eq!(inverse.get(pseudonym).map(String::as_str), Some("imagenet"));
        assert_eq!(inverse.get("era-1").map(String::as_str), Some("2017"));
    }

    #[test]
    fn symbols_skip_terms_and_constants() {
        let book = Codebook::generate(&scope(3), &vocab(&["Softmax"]), &BTreeSet::new())
            .unwrap()
            .with_symbols(["Q", "K", "softmax", "0.5"]);
        assert_eq!(book.year_and_symbol_counts().1, 2);
        assert!(book.seal_label("Q").starts_with('s'));
        assert_eq!(book.seal_label("0.5"), "0.5");
        assert_ne!(book.seal_label("softmax"), "softmax");
    }

    #[test]
    fn pseudonym_shape() {
        assert!(is_pseudonym("Kavorin"));
        assert!(!is_pseudonym("ImageNet"));
        assert_eq!(apply_case("ImageNet", "kavorin"), "Kavorin");
        assert_eq!(apply_case("imagenet", "kavorin"), "kavorin");
    }

    proptest! {
        #[test]
        fn pseudonyms_are_injective(
            terms in proptest::collection::btree_set("[A-Za-z]{3,10}", 1..60),
            seed in 0u64..500,
        ) {
            let book = Codebook::generate(&scope(seed), &terms, &BTreeSet::new());
            if let Ok(book) = book {
                prop_assert!(book.is_injective());
                let real: BTreeSet<String> = terms.iter().map(|t| t.to_lowercase()).collect();
                for (_, pseudonym) in book.terms() {
                    prop_assert!(!real.contains(pseudonym));
                }
            }
        }
    }
}
