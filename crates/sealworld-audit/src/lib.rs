//! Sealed World Audit
//!
//! Measures how much a sealed world still leaks, and what sealing costs in
//! utility.
//!
//! # Overview
//!
//! - **AttackEngine**: black-box and white-box re-identification and term
//!   recovery under a probe budget, plus the adaptive budget sweep
//! - **StatsEngine**: seeded bootstrap intervals, permutation p-values and
//!   effect sizes
//! - **LeakageUtilityReporter**: per-level tradeoff curves and the knee
//!   recommendation
//! - **SweepRunner**: parallel `(seed, level)` units with a unit cap and a
//!   deadline
//! - **ArtifactWriter**: public records, manifests, reports and curves on
//!   disk
//!
//! # Example
//!
//! ```rust
//! use sealworld_audit::{AttackConfig, AttackEngine, AttackTargets, ThreatSetup};
//! use sealworld_core::{BuildScope, PaperRecord, Seed};
//! use sealworld_seal::SealedWorldBuilder;
//!
//! let records = vec![
//!     PaperRecord::new("A_001")
//!         .with_text("background", "uses a Transformer on ImageNet")
//!         .with_metric("acc", 0.91),
//!     PaperRecord::new("A_002")
//!         .with_text("background", "extends the Transformer idea")
//!         .with_metric("acc", 0.85),
//! ];
//! let scope = BuildScope::new("vision", "s1", Seed::new(42));
//! let world = SealedWorldBuilder::for_level(2)
//!     .unwrap()
//!     .build(&records, &scope)
//!     .unwrap();
//!
//! let terms = vec!["ImageNet".to_string()];
//! let targets = AttackTargets { held_out: &records, known_terms: &terms };
//! let engine = AttackEngine::new(
//!     &world.public,
//!     targets,
//!     ThreatSetup::BlackBox,
//!     AttackConfig::default(),
//! )
//! .unwrap();
//! let metrics = engine.run(0).unwrap();
//! assert_eq!(metrics.leakage_score, 0.0);
//! ```

#![warn(missing_docs)]

pub mod artifacts;
pub mod attack;
pub mod config;
pub mod error;
pub mod index;
pub mod reporter;
pub mod stats;
pub mod sweep;
pub mod utility;

// Re-exports
pub use artifacts::ArtifactWriter;
pub use attack::{
    allowed_transitions, validate_transition, AttackConfig, AttackEngine, AttackMetrics,
    AttackPhase, AttackReport, AttackRun, AttackTargets, BudgetCurve, BudgetPoint, QueryStatus,
    ThreatModel, ThreatSetup, DEFAULT_BUDGETS,
};
pub use config::AuditConfig;
pub use error::{AuditError, Result};
pub use index::{RetrievalHit, RetrievalIndex};
pub use reporter::{
    leakage_reduction, recommend, CurvePoint, KneePolicy, LeakageUtilityReporter, LevelSample,
    Recommendation, TradeoffCurve,
};
pub use stats::{Comparison, MeanInterval, Pairing, StatsConfig, StatsEngine};
pub use sweep::{
    SkipReason, SkippedUnit, SweepOutcome, SweepPlan, SweepRunner, SweepUnit, UnitOutcome,
};
pub use utility::{StructuralUtility, UtilityScorer};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for running audits
    pub use crate::{
        ArtifactWriter, AttackConfig, AttackEngine, AuditConfig, AuditError, StatsEngine,
        StructuralUtility, SweepPlan, SweepRunner, ThreatModel, UtilityScorer,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
