//! Formula graph sealing
//!
//! Transforms, in order:
//! - associative regrouping `(a∘b)∘c → a∘(b∘c)`, only when the inner node
//!   feeds nothing else (acyclic graphs only)
//! - commutative operand slot permutation
//! - id relabelling to `n0…`, labels through the codebook, node and edge
//!   order shuffle
//!
//! The topology signature must survive exactly. Acyclic graphs must also
//! keep their canonical expression form; cyclic graphs are checked on
//! topology alone.

use crate::codebook::Codebook;
use crate::equivalence::{check_equivalence, is_cyclic, Equivalence};
use crate::error::IntegrityCheck;
use crate::knob::StructuralConfig;
use rand::seq::SliceRandom;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use sealworld_core::{is_associative, is_commutative, EdgeKind, FormulaGraph, SeedStream, TopologySignature};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// How the semantic check went for one graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticCheck {
    /// Canonical forms matched
    Verified,
    /// Graph is cyclic; topology only
    SkippedCyclic,
    /// No transform ran
    NotRequired,
}

/// Sealed graph plus what was done to it
#[derive(Debug, Clone, PartialEq)]
pub struct StructuralOutcome {
    /// Sealed graph
    pub graph: FormulaGraph,
    /// Associative regroupings applied
    pub regrouped: usize,
    /// Commutative nodes whose operand slots moved
    pub reordered: usize,
    /// Semantic check result
    pub semantic: SemanticCheck,
}

/// Post-transform verification failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StructuralViolation {
    /// Node count, edge count or op multiset changed
    #[error("topology changed: {before:?} -> {after:?}")]
    Topology {
        /// Signature before sealing
        before: TopologySignature,
        /// Signature after sealing
        after: TopologySignature,
    },

    /// Canonical expression changed
    #[error("semantic drift: {0}")]
    Semantic(String),
}

impl StructuralViolation {
    /// Integrity gate this violation maps to
    #[must_use]
    pub const fn check(&self) -> IntegrityCheck {
        match self {
            Self::Topology { .. } => IntegrityCheck::TopologyChanged,
            Self::Semantic(_) => IntegrityCheck::SemanticDrift,
        }
    }
}

/// Seals formula graphs against one codebook
#[derive(Debug, Clone, Copy)]
pub struct StructuralSealer<'a> {
    config: &'a StructuralConfig,
    codebook: &'a Codebook,
}

impl<'a> StructuralSealer<'a> {
    /// Sealer for one build
    #[must_use]
    pub const fn new(config: &'a StructuralConfig, codebook: &'a Codebook) -> Self {
        Self { config, codebook }
    }

    /// Seal `graph`; `context` (record key and field) keys the RNG
    ///
    /// # Errors
    /// Returns [`StructuralViolation`] if verification fails
    pub fn seal(&self, graph: &FormulaGraph, context: &str) -> Result<StructuralOutcome, StructuralViolation> {
        if !self.config.is_active() {
            return Ok(StructuralOutcome {
                graph: graph.clone(),
                regrouped: 0,
                reordered: 0,
                semantic: SemanticCheck::NotRequired,
            });
        }

        let stream = SeedStream::new(self.codebook.scope().seed);
        let mut rng = stream.rng("structural", &[context.as_bytes()]);
        let cyclic = is_cyclic(graph);
        let mut work = graph.clone();

        let regrouped = if self.config.regroup_associative && !cyclic {
            regroup(&mut work, &mut rng)
        } else {
            0
        };
        let reordered = if self.config.reorder_commutative {
            reorder(&mut work, &mut rng)
        } else {
            0
        };
        if self.config.relabel {
            relabel(&mut work, self.codebook, &mut rng);
        }

        let (before, after) = (graph.topology(), work.topology());
        if before != after {
            return Err(StructuralViolation::Topology { before, after });
        }

        let semantic = if cyclic {
            SemanticCheck::SkippedCyclic
        } else {
            let relabel_on = self.config.relabel;
            let verdict = check_equivalence(graph, &work, |label| {
                if relabel_on {
                    self.codebook.seal_label(label)
                } else {
                    label.to_string()
                }
            });
            match verdict {
                Equivalence::Equivalent => SemanticCheck::Verified,
                Equivalence::Cyclic => SemanticCheck::SkippedCyclic,
                Equivalence::Diverged(detail) => return Err(StructuralViolation::Semantic(detail)),
            }
        };

        tracing::trace!(
            "Sealed graph {}: {} regrouped, {} reordered, {:?}",
            context,
            regrouped,
            reordered,
            semantic
        );

        Ok(StructuralOutcome {
            graph: work,
            regrouped,
            reordered,
            semantic,
        })
    }
}

fn data_edge_index(graph: &FormulaGraph, from: &str, to: &str, slot: u32) -> Option<usize> {
    graph
        .edges
        .iter()
        .position(|e| e.kind == EdgeKind::Data && e.from == from && e.to == to && e.slot == slot)
}

/// Rewrite `x = (a∘b)∘c` as `x = a∘(c∘b)` for single-consumer inner nodes
fn regroup(graph: &mut FormulaGraph, rng: &mut ChaCha8Rng) -> usize {
    let mut ids: Vec<String> = graph.nodes.iter().map(|n| n.id.clone()).collect();
    ids.sort();
    let ops: BTreeMap<String, (String, String)> = graph
        .nodes
        .iter()
        .map(|n| (n.id.clone(), (n.op.clone(), n.label.clone())))
        .collect();

    let mut touched: BTreeSet<String> = BTreeSet::new();
    let mut count = 0;
    for x in ids {
        let Some((op, label)) = ops.get(&x) else { continue };
        if touched.contains(&x) || !is_associative(op) {
            continue;
        }

        let inputs: Vec<(String, u32)> = graph
            .data_inputs(&x)
            .into_iter()
            .map(|e| (e.from.clone(), e.slot))
            .collect();
        if inputs.len() < 2 {
            continue;
        }

        let inner = inputs.iter().position(|(y, _)| {
            *y != x
                && !touched.contains(y)
                && ops.get(y).is_some_and(|(y_op, y_label)| y_op == op && y_label == label)
                && graph.out_degree(y) == 1
                && graph.data_inputs(y).len() == 2
        });
        let Some(inner) = inner else { continue };
        if !rng.gen_bool(0.5) {
            continue;
        }

        let (y, y_slot) = inputs[inner].clone();
        let Some((c, c_slot)) = inputs.iter().enumerate().find(|(i, _)| *i != inner).map(|(_, e)| e.clone()) else {
            continue;
        };
        let y_inputs: Vec<(String, u32)> = graph
            .data_inputs(&y)
            .into_iter()
            .map(|e| (e.from.clone(), e.slot))
            .collect();
        let (a, a_slot) = y_inputs[0].clone();

        let (Some(a_edge), Some(y_edge), Some(c_edge)) = (
            data_edge_index(graph, &a, &y, a_slot),
            data_edge_index(graph, &y, &x, y_slot),
            data_edge_index(graph, &c, &x, c_slot),
        ) else {
            continue;
        };
        if a_edge == c_edge {
            continue;
        }

        graph.edges[a_edge].to = x.clone();
        graph.edges[a_edge].slot = y_slot;
        graph.edges[y_edge].slot = c_slot;
        graph.edges[c_edge].to = y.clone();
        graph.edges[c_edge].slot = a_slot;

        touched.insert(x);
        touched.insert(y);
        count += 1;
    }
    count
}

/// Permute operand slots of commutative nodes
fn reorder(graph: &mut FormulaGraph, rng: &mut ChaCha8Rng) -> usize {
    let mut commutative: Vec<String> = graph
        .nodes
        .iter()
        .filter(|n| is_commutative(&n.op))
        .map(|n| n.id.clone())
        .collect();
    commutative.sort();

    let mut count = 0;
    for id in commutative {
        let positions: Vec<usize> = graph
            .edges
            .iter()
            .enumerate()
            .filter(|(_, e)| e.to == id && e.kind == EdgeKind::Data)
            .map(|(i, _)| i)
            .collect();
        if positions.len() < 2 {
            continue;
        }
        let original: Vec<u32> = positions.iter().map(|i| graph.edges[*i].slot).collect();
        let mut shuffled = original.clone();
        shuffled.shuffle(rng);
        if shuffled != original {
            count += 1;
        }
        for (pos, slot) in positions.iter().zip(shuffled) {
            graph.edges[*pos].slot = slot;
        }
    }
    count
}

/// Fresh ids, sealed labels, shuffled node and edge order
fn relabel(graph: &mut FormulaGraph, codebook: &Codebook, rng: &mut ChaCha8Rng) {
    let mut order: Vec<usize> = (0..graph.nodes.len()).collect();
    order.shuffle(rng);
    let ids: BTreeMap<String, String> = graph
        .nodes
        .iter()
        .zip(&order)
        .map(|(node, fresh)| (node.id.clone(), format!("n{fresh}")))
        .collect();

    for node in &mut graph.nodes {
        if let Some(fresh) = ids.get(&node.id) {
            node.id.clone_from(fresh);
        }
        node.label = codebook.seal_label(&node.label);
    }
    for edge in &mut graph.edges {
        if let Some(fresh) = ids.get(&edge.from) {
            edge.from.clone_from(fresh);
        }
        if let Some(fresh) = ids.get(&edge.to) {
            edge.to.clone_from(fresh);
        }
    }

    graph.nodes.shuffle(rng);
    graph.edges.shuffle(rng);
}
