//! Testing utilities for the sealed world workspace
//!
//! Shared paper corpora and tracing setup.

#![allow(missing_docs)]

use once_cell::sync::OnceCell;
use sealworld_core::{
    BuildScope, FieldValue, FormulaEdge, FormulaGraph, FormulaNode, PaperRecord, Seed,
};
use tracing_subscriber::EnvFilter;

static TRACING: OnceCell<()> = OnceCell::new();

/// Install a `fmt` subscriber once per test process (`RUST_LOG`, default `warn`)
pub fn init_tracing() {
    TRACING.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

pub fn scope(seed: u64) -> BuildScope {
    BuildScope::new("vision", "s1", Seed::new(seed))
}

/// `softmax(Q·K) · V` with a commutative scale
pub fn attention_graph() -> FormulaGraph {
    FormulaGraph {
        nodes: vec![
            FormulaNode::new("q", "symbol", "Q"),
            FormulaNode::new("k", "symbol", "K"),
            FormulaNode::new("v", "symbol", "V"),
            FormulaNode::new("tau", "symbol", "tau"),
            FormulaNode::new("qk", "matmul", ""),
            FormulaNode::new("scaled", "mul", ""),
            FormulaNode::new("sm", "softmax", ""),
            FormulaNode::new("out", "matmul", ""),
        ],
        edges: vec![
            FormulaEdge::data("q", "qk", 0),
            FormulaEdge::data("k", "qk", 1),
            FormulaEdge::data("qk", "scaled", 0),
            FormulaEdge::data("tau", "scaled", 1),
            FormulaEdge::data("scaled", "sm", 0),
            FormulaEdge::data("sm", "out", 0),
            FormulaEdge::data("v", "out", 1),
        ],
    }
}

/// `(a + b) + c` residual sum, regroupable
pub fn residual_graph() -> FormulaGraph {
    FormulaGraph {
        nodes: vec![
            FormulaNode::new("x", "symbol", "x"),
            FormulaNode::new("fx", "symbol", "F"),
            FormulaNode::new("g", "symbol", "G"),
            FormulaNode::new("inner", "add", ""),
            FormulaNode::new("outer", "add", ""),
        ],
        edges: vec![
            FormulaEdge::data("x", "inner", 0),
            FormulaEdge::data("fx", "inner", 1),
            FormulaEdge::data("inner", "outer", 0),
            FormulaEdge::data("g", "outer", 1),
        ],
    }
}

/// Small vision track: eight papers, a dependency chain, two metrics
pub fn vision_corpus() -> Vec<PaperRecord> {
    vec![
        PaperRecord::new("V_001")
            .with_text(
                "background",
                "Deep residual learning with ResNet reached strong results on ImageNet in 2015.",
            )
            .with_text(
                "mechanism",
                "Identity shortcuts let the ResNet stack skip connections around residual blocks.",
            )
            .with_field("mechanism_graph", FieldValue::FormulaGraph(residual_graph()))
            .with_metric("top1_acc", 0.764)
            .with_metric("val_loss", 1.12),
        PaperRecord::new("V_002")
            .with_text(
                "background",
                "Building on ResNet, the DenseNet design connects every layer on CIFAR-10.",
            )
            .with_text("mechanism", "Dense blocks concatenate feature maps from all earlier layers.")
            .with_metric("top1_acc", 0.771)
            .with_metric("val_loss", 1.05)
            .with_dependencies(["V_001"]),
        PaperRecord::new("V_003")
            .with_text(
                "background",
                "The Transformer architecture from Vaswani replaced recurrence with attention in 2017.",
            )
            .with_text(
                "mechanism",
                "Scaled dot-product attention mixes Values weighted by softmax of Queries against Keys.",
            )
            .with_field("mechanism_graph", FieldValue::FormulaGraph(attention_graph()))
            .with_metric("top1_acc", 0.702)
            .with_metric("val_loss", 1.31),
        PaperRecord::new("V_004")
            .with_text(
                "background",
                "ViT applies the Transformer directly to image patches on ImageNet and JFT300M.",
            )
            .with_text(
                "mechanism",
                "Patch embeddings plus a class token feed a standard encoder stack.",
            )
            .with_field("mechanism_graph", FieldValue::FormulaGraph(attention_graph()))
            .with_metric("top1_acc", 0.815)
            .with_metric("val_loss", 0.92)
            .with_dependencies(["V_003"]),
        PaperRecord::new("V_005")
            .with_text(
                "background",
                "DeiT trains ViT efficiently with distillation from a RegNet teacher.",
            )
            .with_text(
                "mechanism",
                "A distillation token learns from the teacher alongside the class token.",
            )
            .with_metric("top1_acc", 0.831)
            .with_metric("val_loss", 0.88)
            .with_dependencies(["V_004"]),
        PaperRecord::new("V_006")
            .with_text(
                "background",
                "Swin introduces shifted windows so the Transformer scales to COCO detection.",
            )
            .with_text(
                "mechanism",
                "Window attention alternates with shifted partitions between successive blocks.",
            )
            .with_field("mechanism_graph", FieldValue::FormulaGraph(attention_graph()))
            .with_metric("top1_acc", 0.853)
            .with_metric("val_loss", 0.81)
            .with_dependencies(["V_004"]),
        PaperRecord::new("V_007")
            .with_text(
                "background",
                "ConvNeXt modernizes ResNet with ideas borrowed from Swin.",
            )
            .with_text(
                "mechanism",
                "Depthwise convolutions with large kernels and inverted bottlenecks.",
            )
            .with_field("mechanism_graph", FieldValue::FormulaGraph(residual_graph()))
            .with_metric("top1_acc", 0.871)
            .with_metric("val_loss", 0.77)
            .with_dependencies(["V_001", "V_006"]),
        PaperRecord::new("V_008")
            .with_text(
                "background",
                "MAE pretrains ViT by reconstructing masked patches, see https://example.org/mae.",
            )
            .with_text(
                "mechanism",
                "An asymmetric encoder sees visible patches while a light decoder rebuilds pixels.",
            )
            .with_metric("top1_acc", 0.859)
            .with_metric("val_loss", 0.79)
            .with_dependencies(["V_004"]),
    ]
}

/// Names a lexicon would carry for [`vision_corpus`]
pub const VISION_TERMS: &[&str] = &[
    "ResNet",
    "ImageNet",
    "DenseNet",
    "CIFAR-10",
    "Transformer",
    "Vaswani",
    "ViT",
    "JFT300M",
    "DeiT",
    "RegNet",
    "Swin",
    "COCO",
    "ConvNeXt",
    "MAE",
];

/// The two-record scenario in legacy flat layout
pub fn scenario_records() -> Vec<PaperRecord> {
    let first = serde_json::json!({
        "paper_id": "A_001",
        "background": "uses a Transformer on ImageNet, DOI:10.1/xyz",
        "results": {"acc": 0.91}
    });
    let sibling = serde_json::json!({
        "paper_id": "A_002",
        "background": "builds on a convolutional baseline",
        "results": {"acc": 0.85},
        "dependencies": ["A_001"]
    });
    [first, sibling]
        .iter()
        .map(|raw| PaperRecord::from_flat_json(raw).unwrap())
        .collect()
}
