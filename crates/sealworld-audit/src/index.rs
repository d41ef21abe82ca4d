//! TF-IDF cosine retrieval index
//!
//! Documents and queries are bags of lowercase unigram tokens. Ranking is
//! by cosine score, ties broken by key so retrieval is deterministic.

use sealworld_core::PaperKey;
use std::collections::BTreeMap;

/// One ranked result
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalHit {
    /// Document key
    pub key: PaperKey,
    /// Cosine similarity in `[0, 1]`
    pub score: f64,
}

#[derive(Debug, Clone)]
struct IndexedDoc {
    key: PaperKey,
    weights: BTreeMap<String, f64>,
}

/// Read-only retrieval index over a sealed corpus
#[derive(Debug, Clone, Default)]
pub struct RetrievalIndex {
    docs: Vec<IndexedDoc>,
    idf: BTreeMap<String, f64>,
}

impl RetrievalIndex {
    /// Index `(key, tokens)` documents
    #[must_use]
    pub fn build<I>(documents: I) -> Self
    where
        I: IntoIterator<Item = (PaperKey, Vec<String>)>,
    {
        let raw: Vec<(PaperKey, BTreeMap<String, usize>)> = documents
            .into_iter()
            .map(|(key, tokens)| (key, term_counts(&tokens)))
            .collect();

        let mut df: BTreeMap<&str, usize> = BTreeMap::new();
        for (_, counts) in &raw {
            for token in counts.keys() {
                *df.entry(token.as_str()).or_insert(0) += 1;
            }
        }
        let n = raw.len() as f64;
        let idf: BTreeMap<String, f64> = df
            .into_iter()
            .map(|(token, df)| (token.to_string(), ((1.0 + n) / (1.0 + df as f64)).ln() + 1.0))
            .collect();

        let docs = raw
            .into_iter()
            .map(|(key, counts)| IndexedDoc {
                key,
                weights: normalize(weigh(&counts, &idf)),
            })
            .collect();
        Self { docs, idf }
    }

    /// Number of documents
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    /// No documents
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Token occurs in some document
    #[must_use]
    pub fn contains_token(&self, token: &str) -> bool {
        self.idf.contains_key(token)
    }

    /// Top `k` documents for `query`, best first
    ///
    /// Tokens absent from the corpus carry no weight. Documents sharing no
    /// weighted token with the query are not hits, so a query with no known
    /// token returns nothing.
    #[must_use]
    pub fn search(&self, query: &[String], k: usize) -> Vec<RetrievalHit> {
        let q = normalize(weigh(&term_counts(query), &self.idf));
        let mut hits: Vec<RetrievalHit> = self
            .docs
            .iter()
            .map(|doc| RetrievalHit {
                key: doc.key.clone(),
                score: q
                    .iter()
                    .filter_map(|(t, w)| doc.weights.get(t).map(|d| d * w))
                    .sum(),
            })
            .filter(|hit| hit.score > 0.0)
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.key.cmp(&b.key)));
        hits.truncate(k);
        hits
    }

    /// Every indexed token
    pub fn vocabulary(&self) -> impl Iterator<Item = &str> {
        self.idf.keys().map(String::as_str)
    }
}

fn term_counts(tokens: &[String]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for token in tokens {
        *counts.entry(token.clone()).or_insert(0) += 1;
    }
    counts
}

fn weigh(counts: &BTreeMap<String, usize>, idf: &BTreeMap<String, f64>) -> BTreeMap<String, f64> {
    counts
        .iter()
        .filter_map(|(t, c)| idf.get(t).map(|w| (t.clone(), *c as f64 * w)))
        .collect()
}

fn normalize(mut weights: BTreeMap<String, f64>) -> BTreeMap<String, f64> {
    let norm = weights.values().map(|w| w * w).sum::<f64>().sqrt();
    if norm > 0.0 {
        for w in weights.values_mut() {
            *w /= norm;
        }
    }
    weights
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(s: &str) -> Vec<String> {
        s.split_whitespace().map(str::to_string).collect()
    }

    fn index() -> RetrievalIndex {
        RetrievalIndex::build([
            (PaperKey::new("a"), toks("residual blocks skip connections resnet")),
            (PaperKey::new("b"), toks("attention queries keys values transformer")),
            (PaperKey::new("c"), toks("attention windows shifted swin")),
        ])
    }

    #[test]
    fn exact_document_ranks_first() {
        let hits = index().search(&toks("queries keys transformer"), 2);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].key.as_str(), "b");
        assert!(hits[0].score > hits[1].score);
        assert!(hits[0].score <= 1.0 + 1e-9);
    }

    #[test]
    fn disjoint_query_retrieves_nothing() {
        assert!(index().search(&toks("nothing matches"), 3).is_empty());
    }

    #[test]
    fn only_overlapping_documents_are_hits() {
        let hits = index().search(&toks("attention"), 3);
        let mut keys: Vec<&str> = hits.iter().map(|h| h.key.as_str()).collect();
        keys.sort_unstable();
        assert_eq!(keys, vec!["b", "c"]);
        assert!(hits.iter().all(|h| h.score > 0.0));
    }

    #[test]
    fn vocabulary_lookup() {
        let idx = index();
        assert!(idx.contains_token("swin"));
        assert!(!idx.contains_token("vit"));
        assert_eq!(idx.len(), 3);
    }
}
