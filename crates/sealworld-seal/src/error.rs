//! Sealing errors
//!
//! Three families, all fatal for the build that raised them:
//! - configuration and input validation ([`ConfigError`] plus scope)
//! - post-seal integrity gates ([`IntegrityCheck`])
//! - paraphrase failures
//!
//! Nothing partial is ever returned alongside an error.

use crate::paraphrase::ParaphraseFailure;
use sealworld_core::{BuildScope, ConfigError, PaperKey};
use std::fmt::{self, Display, Formatter};

/// Integrity gate that rejected a sealed record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntegrityCheck {
    /// A denylisted identifier pattern survived sealing
    DenylistSurvived,
    /// Node count, edge count or op multiset changed
    TopologyChanged,
    /// Canonical formula form changed
    SemanticDrift,
    /// Two sealed values ordered against their raw values
    OrderInverted,
}

impl IntegrityCheck {
    /// Stable check name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DenylistSurvived => "denylist_survived",
            Self::TopologyChanged => "topology_changed",
            Self::SemanticDrift => "semantic_drift",
            Self::OrderInverted => "order_inverted",
        }
    }
}

impl Display for IntegrityCheck {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sealing failure
#[derive(Debug, thiserror::Error)]
pub enum SealError {
    /// Invalid configuration or input
    #[error("configuration error in {scope} [{check}]: {source}", check = .source.check())]
    Configuration {
        /// Unit being built
        scope: BuildScope,
        /// Validation failure
        #[source]
        source: ConfigError,
    },

    /// A sealed record failed an integrity gate
    #[error(
        "integrity violation in {scope}: record {paper_key}, field {field}, check {check}: {detail}"
    )]
    Integrity {
        /// Unit being built
        scope: BuildScope,
        /// Offending record
        paper_key: PaperKey,
        /// Offending field
        field: String,
        /// Gate that fired
        check: IntegrityCheck,
        /// Human-readable detail
        detail: String,
    },

    /// The paraphrase hook failed
    #[error("paraphrase failed in {scope}: record {paper_key}, field {field}: {source}")]
    Paraphrase {
        /// Unit being built
        scope: BuildScope,
        /// Record being paraphrased
        paper_key: PaperKey,
        /// Field being paraphrased
        field: String,
        /// Hook failure
        #[source]
        source: ParaphraseFailure,
    },
}

impl SealError {
    /// Wrap a configuration error with the scope it occurred in
    #[must_use]
    pub fn config(scope: &BuildScope, source: ConfigError) -> Self {
        Self::Configuration {
            scope: scope.clone(),
            source,
        }
    }

    /// Scope the failure belongs to
    #[must_use]
    pub fn scope(&self) -> &BuildScope {
        match self {
            Self::Configuration { scope, .. }
            | Self::Integrity { scope, .. }
            | Self::Paraphrase { scope, .. } => scope,
        }
    }

    /// Integrity check name, if this is an integrity failure
    #[must_use]
    pub fn integrity_check(&self) -> Option<IntegrityCheck> {
        match self {
            Self::Integrity { check, .. } => Some(*check),
            _ => None,
        }
    }
}
