//! Sealed World Sealing
//!
//! Seed-keyed transformation of paper records into a publicly exportable
//! sealed world plus a private codebook.
//!
//! # Overview
//!
//! - **Codebook**: deterministic term → pseudonym, year → era and symbol tables
//! - **LexicalSealer**: longest-match substitution followed by the denylist pass
//! - **StructuralSealer**: relabel, reorder and regroup formula graphs
//! - **NumericSealer**: order-preserving binning or perturbation
//! - **DefenseKnobController**: strength level → [`SealingConfig`]
//! - **SealedWorldBuilder**: runs the stages and gates every record
//!
//! # Example
//!
//! ```rust
//! use sealworld_core::{BuildScope, PaperRecord, Seed};
//! use sealworld_seal::SealedWorldBuilder;
//!
//! let records = vec![
//!     PaperRecord::new("A_001")
//!         .with_text("background", "uses a Transformer on ImageNet")
//!         .with_metric("acc", 0.91),
//!     PaperRecord::new("A_002")
//!         .with_text("background", "extends the same idea")
//!         .with_metric("acc", 0.85)
//!         .with_dependencies(["A_001"]),
//! ];
//! let scope = BuildScope::new("vision", "s1", Seed::new(42));
//!
//! let world = SealedWorldBuilder::for_level(2)
//!     .unwrap()
//!     .build(&records, &scope)
//!     .unwrap();
//! assert_eq!(world.manifest.record_count, 2);
//! ```

#![warn(missing_docs)]

pub mod builder;
pub mod codebook;
pub mod denylist;
pub mod equivalence;
pub mod error;
pub mod knob;
pub mod lexical;
pub mod manifest;
pub mod matcher;
pub mod numeric;
pub mod paraphrase;
pub mod structural;
pub mod text;
pub mod vocabulary;

// Re-exports
pub use builder::{validate_records, SealedWorld, SealedWorldBuilder};
pub use codebook::Codebook;
pub use denylist::{Denylist, DenylistClass, DenylistHit};
pub use equivalence::{check_equivalence, Equivalence};
pub use error::{IntegrityCheck, SealError};
pub use knob::{
    DefenseKnobController, DenylistAction, LexicalConfig, NumericPolicy, SealingConfig,
    StructuralConfig,
};
pub use lexical::{DenylistRejection, LexicalOutcome, LexicalSealer};
pub use manifest::{
    CodebookEntries, FieldCoverage, LexicalStats, Manifest, NumericStats, StructuralStats,
};
pub use matcher::{TermMatch, TermMatcher};
pub use numeric::{Knot, MetricMap, NumericSealer, NumericTable, OrderViolation};
pub use paraphrase::{ParaphraseFailure, Paraphraser, WhitespaceParaphraser};
pub use structural::{SemanticCheck, StructuralOutcome, StructuralSealer, StructuralViolation};
pub use vocabulary::{TermLexicon, Vocabulary, VocabularyExtractor};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for building sealed worlds
    pub use crate::{
        Codebook, DefenseKnobController, IntegrityCheck, Manifest, SealError, SealedWorld,
        SealedWorldBuilder, SealingConfig, TermLexicon,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
