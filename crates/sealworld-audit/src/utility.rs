//! Utility scoring
//!
//! The benchmark subsystem grades proposals through [`UtilityScorer`]; the
//! audit only consumes the scalar. [`StructuralUtility`] is the built-in
//! proxy used when no external scorer is wired in.

use sealworld_core::{PaperRecord, PublicSealedRecord};
use sealworld_seal::text::{is_stopword, lowercase_tokens};
use std::collections::{BTreeMap, BTreeSet};

/// Scores how much task-relevant structure a sealed world keeps
#[cfg_attr(test, mockall::automock)]
pub trait UtilityScorer: Send + Sync {
    /// Utility in `[0, 1]` of `sealed` relative to `original`
    fn score(&self, original: &[PaperRecord], sealed: &[PublicSealedRecord]) -> f64;
}

/// Mean of metric ordering fidelity, text token retention and topology
/// preservation
///
/// Components with nothing to measure are left out of the mean; a corpus
/// with nothing measurable scores 1.0.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralUtility;

impl UtilityScorer for StructuralUtility {
    fn score(&self, original: &[PaperRecord], sealed: &[PublicSealedRecord]) -> f64 {
        let by_key: BTreeMap<_, _> = sealed.iter().map(|r| (&r.paper_key, r)).collect();
        let pairs: Vec<(&PaperRecord, &PublicSealedRecord)> = original
            .iter()
            .filter_map(|r| by_key.get(&r.paper_key).map(|s| (r, *s)))
            .collect();

        let components: Vec<f64> = [
            ordering_fidelity(&pairs),
            token_retention(&pairs),
            topology_preservation(&pairs),
        ]
        .into_iter()
        .flatten()
        .collect();

        if components.is_empty() {
            1.0
        } else {
            (components.iter().sum::<f64>() / components.len() as f64).clamp(0.0, 1.0)
        }
    }
}

/// Concordant 1, tie 0.5, inverted 0, over every raw `a < b` pair per metric
fn ordering_fidelity(pairs: &[(&PaperRecord, &PublicSealedRecord)]) -> Option<f64> {
    let mut per_metric: BTreeMap<&str, Vec<(f64, f64)>> = BTreeMap::new();
    for (raw, sealed) in pairs {
        for (_, metric, value) in raw.metrics() {
            if let Some(s) = sealed.metric(metric) {
                per_metric
                    .entry(metric)
                    .or_default()
                    .push((value.value, s.sealed.as_f64()));
            }
        }
    }

    let (mut credit, mut total) = (0.0, 0usize);
    for values in per_metric.values() {
        for (i, (ra, sa)) in values.iter().enumerate() {
            for (rb, sb) in &values[i + 1..] {
                if ra == rb {
                    continue;
                }
                total += 1;
                let raw_up = rb > ra;
                credit += if sa == sb {
                    0.5
                } else if (sb > sa) == raw_up {
                    1.0
                } else {
                    0.0
                };
            }
        }
    }
    (total > 0).then(|| credit / total as f64)
}

fn content_tokens(text: &str) -> BTreeSet<String> {
    lowercase_tokens(text)
        .into_iter()
        .filter(|t| !is_stopword(t))
        .collect()
}

/// Share of original content tokens still present in the same field
fn token_retention(pairs: &[(&PaperRecord, &PublicSealedRecord)]) -> Option<f64> {
    let mut fractions = Vec::new();
    for (raw, sealed) in pairs {
        let sealed_fields: BTreeMap<&str, &str> = sealed.text_fields().collect();
        for (field, text) in raw.text_fields() {
            let before = content_tokens(text);
            if before.is_empty() {
                continue;
            }
            let after = sealed_fields.get(field).map(|t| content_tokens(t)).unwrap_or_default();
            let kept = before.intersection(&after).count();
            fractions.push(kept as f64 / before.len() as f64);
        }
    }
    (!fractions.is_empty()).then(|| fractions.iter().sum::<f64>() / fractions.len() as f64)
}

/// Share of graphs whose topology signature survived
fn topology_preservation(pairs: &[(&PaperRecord, &PublicSealedRecord)]) -> Option<f64> {
    let (mut kept, mut total) = (0usize, 0usize);
    for (raw, sealed) in pairs {
        let sealed_graphs: BTreeMap<&str, _> = sealed.formula_fields().collect();
        for (field, graph) in raw.formula_fields() {
            total += 1;
            if sealed_graphs
                .get(field)
                .is_some_and(|g| g.topology() == graph.topology())
            {
                kept += 1;
            }
        }
    }
    (total > 0).then(|| kept as f64 / total as f64)
}
