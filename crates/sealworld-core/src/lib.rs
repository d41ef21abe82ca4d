//! Sealed World Core
//!
//! Shared vocabulary of the sealing pipeline and its leakage audit.
//!
//! # Core Concepts
//!
//! - [`PaperRecord`]: raw record keyed by [`PaperKey`], fields tagged by [`FieldValue`]
//! - [`PublicSealedRecord`]: exported counterpart with [`SealedField`]s
//! - [`FormulaGraph`]: mechanism graph with a [`TopologySignature`]
//! - [`BuildScope`]: the `(track, subset, seed)` a sealed world belongs to
//! - [`ContentHash`]: 32-byte Blake3 hash for manifests
//! - [`SeedStream`]: deterministic, domain-separated RNG streams
//!
//! # Example
//!
//! ```rust
//! use sealworld_core::{BuildScope, PaperRecord, Seed};
//!
//! let record = PaperRecord::new("A_001")
//!     .with_text("background", "uses a Transformer on ImageNet")
//!     .with_metric("acc", 0.91);
//! let scope = BuildScope::new("vision", "s1", Seed::new(42));
//!
//! assert_eq!(record.metrics().count(), 1);
//! assert_eq!(scope.to_string(), "vision/s1@seed=42");
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod error;
mod formula;
mod hash;
pub mod io;
mod merkle;
mod record;
mod scope;
mod sealed;
mod seed;

// Re-exports
pub use error::ConfigError;
pub use formula::{
    is_associative, is_commutative, EdgeKind, FormulaEdge, FormulaGraph, FormulaNode,
    TopologySignature, ASSOCIATIVE_OPS, COMMUTATIVE_OPS,
};
pub use hash::{ContentHash, ContentHasher, HashError};
pub use merkle::{Blake3Hasher, RecordMerkle, RecordProof};
pub use record::{FieldKind, FieldValue, MetricTable, MetricValue, PaperKey, PaperRecord};
pub use scope::{BuildScope, Seed};
pub use sealed::{PublicSealedRecord, SealedField, SealedMetric, SealedValue};
pub use seed::SeedStream;

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with records and scopes
    pub use crate::{
        BuildScope, ConfigError, ContentHash, FieldKind, FieldValue, FormulaGraph, PaperKey,
        PaperRecord, PublicSealedRecord, SealedField, SealedValue, Seed, SeedStream,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
