//! Mechanism / formula graphs
//!
//! Nodes are operations or symbols, edges carry data or control flow from an
//! operand to its consumer. `slot` orders the inputs of a consumer; for
//! commutative operations the order carries no meaning.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One node of a formula graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormulaNode {
    /// Node identifier, unique within the graph
    pub id: String,
    /// Operation type (`add`, `mul`, `softmax`, `symbol`, ...)
    pub op: String,
    /// Display label (symbol name, constant text)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub label: String,
}

impl FormulaNode {
    /// Create a node
    #[must_use]
    pub fn new(id: impl Into<String>, op: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            op: op.into(),
            label: label.into(),
        }
    }
}

/// Edge kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// Operand feeds an operation
    #[default]
    Data,
    /// Sequencing / gating without data flow
    Control,
}

/// Directed edge `from → to`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormulaEdge {
    /// Operand node
    pub from: String,
    /// Consumer node
    pub to: String,
    /// Input position at the consumer
    #[serde(default)]
    pub slot: u32,
    /// Edge kind
    #[serde(default)]
    pub kind: EdgeKind,
}

impl FormulaEdge {
    /// Data edge
    #[must_use]
    pub fn data(from: impl Into<String>, to: impl Into<String>, slot: u32) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            slot,
            kind: EdgeKind::Data,
        }
    }
}

/// Operations whose operand order is irrelevant
pub const COMMUTATIVE_OPS: &[&str] = &["add", "mul", "max", "min", "and", "or", "eq"];

/// Operations that may be regrouped `(a∘b)∘c → a∘(b∘c)`
pub const ASSOCIATIVE_OPS: &[&str] = &["add", "mul", "max", "min", "and", "or"];

/// Is `op` commutative
#[must_use]
pub fn is_commutative(op: &str) -> bool {
    COMMUTATIVE_OPS.contains(&op)
}

/// Is `op` associative
#[must_use]
pub fn is_associative(op: &str) -> bool {
    ASSOCIATIVE_OPS.contains(&op)
}

/// The part of a graph's shape that sealing must keep exactly
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologySignature {
    /// Number of nodes
    pub node_count: usize,
    /// Number of edges
    pub edge_count: usize,
    /// Sorted op types, with repetition
    pub op_multiset: Vec<String>,
}

/// Formula graph
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FormulaGraph {
    /// Nodes
    pub nodes: Vec<FormulaNode>,
    /// Edges
    pub edges: Vec<FormulaEdge>,
}

impl FormulaGraph {
    /// Topology signature
    #[must_use]
    pub fn topology(&self) -> TopologySignature {
        let mut op_multiset: Vec<String> = self.nodes.iter().map(|n| n.op.clone()).collect();
        op_multiset.sort();
        TopologySignature {
            node_count: self.nodes.len(),
            edge_count: self.edges.len(),
            op_multiset,
        }
    }

    /// Node by id
    #[must_use]
    pub fn node(&self, id: &str) -> Option<&FormulaNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Data inputs of `id` in slot order
    #[must_use]
    pub fn data_inputs(&self, id: &str) -> Vec<&FormulaEdge> {
        let mut inputs: Vec<&FormulaEdge> = self
            .edges
            .iter()
            .filter(|e| e.to == id && e.kind == EdgeKind::Data)
            .collect();
        inputs.sort_by(|a, b| a.slot.cmp(&b.slot).then_with(|| a.from.cmp(&b.from)));
        inputs
    }

    /// Number of edges (any kind) leaving `id`
    #[must_use]
    pub fn out_degree(&self, id: &str) -> usize {
        self.edges.iter().filter(|e| e.from == id).count()
    }

    /// Non-empty labels in node order
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.nodes
            .iter()
            .map(|n| n.label.as_str())
            .filter(|l| !l.is_empty())
    }

    /// Check ids are unique and edges reference existing nodes
    ///
    /// # Errors
    /// Returns [`ConfigError::MalformedFormula`] naming `field`
    pub fn validate(&self, field: &str) -> Result<(), ConfigError> {
        let mut ids = BTreeSet::new();
        for node in &self.nodes {
            if !ids.insert(node.id.as_str()) {
                return Err(ConfigError::MalformedFormula {
                    field: field.to_string(),
                    reason: format!("duplicate node id {}", node.id),
                });
            }
        }
        for edge in &self.edges {
            for end in [&edge.from, &edge.to] {
                if !ids.contains(end.as_str()) {
                    return Err(ConfigError::MalformedFormula {
                        field: field.to_string(),
                        reason: format!("edge references unknown node {end}"),
                    });
                }
            }
        }
        Ok(())
    }

    /// Op type histogram
    #[must_use]
    pub fn op_histogram(&self) -> BTreeMap<&str, usize> {
        let mut hist = BTreeMap::new();
        for node in &self.nodes {
            *hist.entry(node.op.as_str()).or_insert(0) += 1;
        }
        hist
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attention() -> FormulaGraph {
        FormulaGraph {
            nodes: vec![
                FormulaNode::new("q", "symbol", "Q"),
                FormulaNode::new("k", "symbol", "K"),
                FormulaNode::new("qk", "matmul", ""),
                FormulaNode::new("sm", "softmax", ""),
            ],
            edges: vec![
                FormulaEdge::data("q", "qk", 0),
                FormulaEdge::data("k", "qk", 1),
                FormulaEdge::data("qk", "sm", 0),
            ],
        }
    }

    #[test]
    fn topology_counts_and_sorted_ops() {
        let topo = attention().topology();
        assert_eq!(topo.node_count, 4);
        assert_eq!(topo.edge_count, 3);
        assert_eq!(topo.op_multiset, vec!["matmul", "softmax", "symbol", "symbol"]);
    }

    #[test]
    fn inputs_follow_slot_order() {
        let graph = attention();
        let inputs: Vec<&str> = graph.data_inputs("qk").iter().map(|e| e.from.as_str()).collect();
        assert_eq!(inputs, vec!["q", "k"]);
        assert_eq!(graph.out_degree("qk"), 1);
    }

    #[test]
    fn validate_rejects_dangling_edges() {
        let mut graph = attention();
        graph.edges.push(FormulaEdge::data("v", "sm", 1));
        assert!(matches!(
            graph.validate("mechanism_graph"),
            Err(ConfigError::MalformedFormula { .. })
        ));
    }

    #[test]
    fn op_classes() {
        assert!(is_commutative("add"));
        assert!(!is_commutative("matmul"));
        assert!(is_associative("mul"));
        assert!(!is_associative("eq"));
    }
}
