//! Semantic equivalence of formula graphs
//!
//! Beyond the topology signature, two acyclic graphs are considered
//! equivalent when every sink computes the same canonical expression:
//! operands of commutative operations are sorted, nested applications of the
//! same associative operation are flattened, and non-commutative operands
//! keep slot order. Labels of the first graph are mapped through the
//! relabel table before comparison. Cyclic graphs have no canonical form.

use petgraph::algo::{is_cyclic_directed, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use sealworld_core::{is_associative, is_commutative, ContentHasher, EdgeKind, FormulaGraph};
use std::collections::BTreeMap;

/// Canonical form of one node
#[derive(Debug, Clone)]
struct Canon {
    op: String,
    label: String,
    operands: Vec<String>,
    digest: String,
}

/// Outcome of an equivalence check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Equivalence {
    /// Same canonical sinks
    Equivalent,
    /// One of the graphs has a cycle
    Cyclic,
    /// Canonical sinks differ
    Diverged(String),
}

fn to_petgraph(graph: &FormulaGraph) -> (DiGraph<usize, ()>, BTreeMap<&str, NodeIndex>) {
    let mut g = DiGraph::with_capacity(graph.nodes.len(), graph.edges.len());
    let mut index = BTreeMap::new();
    for (pos, node) in graph.nodes.iter().enumerate() {
        index.insert(node.id.as_str(), g.add_node(pos));
    }
    for edge in &graph.edges {
        if let (Some(from), Some(to)) = (index.get(edge.from.as_str()), index.get(edge.to.as_str())) {
            g.add_edge(*from, *to, ());
        }
    }
    (g, index)
}

/// Does the graph contain a directed cycle
#[must_use]
pub fn is_cyclic(graph: &FormulaGraph) -> bool {
    let (g, _) = to_petgraph(graph);
    is_cyclic_directed(&g)
}

/// Sorted canonical digests of every sink, or `None` for cyclic graphs
pub fn canonical_sinks(graph: &FormulaGraph, label_of: impl Fn(&str) -> String) -> Option<Vec<String>> {
    let (g, _) = to_petgraph(graph);
    let order = toposort(&g, None).ok()?;

    let mut canon: BTreeMap<&str, Canon> = BTreeMap::new();
    for idx in order {
        let node = &graph.nodes[g[idx]];
        let label = label_of(&node.label);

        let mut inputs: Vec<(u32, &Canon)> = graph
            .data_inputs(&node.id)
            .into_iter()
            .filter_map(|e| canon.get(e.from.as_str()).map(|c| (e.slot, c)))
            .collect();
        inputs.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.digest.cmp(&b.1.digest)));

        let mut operands = Vec::with_capacity(inputs.len());
        for (_, child) in inputs {
            if is_associative(&node.op) && child.op == node.op && child.label == label {
                operands.extend(child.operands.iter().cloned());
            } else {
                operands.push(child.digest.clone());
            }
        }
        if is_commutative(&node.op) {
            operands.sort();
        }

        let mut controls: Vec<String> = graph
            .edges
            .iter()
            .filter(|e| e.to == node.id && e.kind == EdgeKind::Control)
            .filter_map(|e| canon.get(e.from.as_str()).map(|c| c.digest.clone()))
            .collect();
        controls.sort();

        let mut hasher = ContentHasher::new("sealworld formula canon v1");
        hasher.part(node.op.as_bytes()).part(label.as_bytes());
        for operand in &operands {
            hasher.part(operand.as_bytes());
        }
        hasher.part(b"|control|");
        for control in &controls {
            hasher.part(control.as_bytes());
        }

        canon.insert(
            node.id.as_str(),
            Canon {
                op: node.op.clone(),
                label,
                operands,
                digest: hasher.finish().to_string(),
            },
        );
    }

    let mut sinks: Vec<String> = graph
        .nodes
        .iter()
        .filter(|n| graph.out_degree(&n.id) == 0)
        .filter_map(|n| canon.get(n.id.as_str()).map(|c| c.digest.clone()))
        .collect();
    sinks.sort();
    Some(sinks)
}

/// Compare `original` (labels mapped through `relabel`) with `sealed`
pub fn check_equivalence(
    original: &FormulaGraph,
    sealed: &FormulaGraph,
    relabel: impl Fn(&str) -> String,
) -> Equivalence {
    let before = canonical_sinks(original, relabel);
    let after = canonical_sinks(sealed, str::to_string);
    match (before, after) {
        (Some(before), Some(after)) if before == after => Equivalence::Equivalent,
        (Some(before), Some(after)) => Equivalence::Diverged(format!(
            "{} canonical sinks before, {} after, {} differ",
            before.len(),
            after.len(),
            before.iter().filter(|d| !after.contains(d)).count()
        )),
        _ => Equivalence::Cyclic,
    }
}
