//! Audit errors
//!
//! Budget exhaustion and degenerate statistics are outcomes, not errors;
//! they travel in [`QueryStatus`](crate::attack::QueryStatus) and `None`
//! sentinels.

use crate::attack::AttackPhase;
use sealworld_core::io::ArtifactIoError;
use sealworld_core::ConfigError;
use sealworld_seal::SealError;
use std::path::PathBuf;

/// Audit failure
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    /// Attack run driven out of order
    #[error("invalid attack transition: {from} -> {to}")]
    InvalidTransition {
        /// Current phase
        from: AttackPhase,
        /// Requested phase
        to: AttackPhase,
    },

    /// Invalid configuration or statistics input
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Building the sealed world failed
    #[error(transparent)]
    Seal(#[from] SealError),

    /// Artifact read or write failed
    #[error(transparent)]
    Artifact(#[from] ArtifactIoError),

    /// Filesystem error outside artifact files
    #[error("I/O error on {path}: {source}")]
    Io {
        /// Path involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Serialization failure
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result alias for audit operations
pub type Result<T> = std::result::Result<T, AuditError>;
