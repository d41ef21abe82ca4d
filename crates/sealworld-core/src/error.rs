//! Configuration and input errors shared by every layer
//!
//! These are fail-fast errors: nothing here is retried. Each variant maps to
//! a stable check name via [`ConfigError::check`] so callers can report which
//! validation rejected a build.

/// Invalid configuration or invalid input records
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// Nothing to seal
    #[error("empty vocabulary: no sealable terms were observed")]
    EmptyVocabulary,

    /// Seed outside the accepted range
    #[error("invalid seed {value}: {reason}")]
    InvalidSeed {
        /// Seed as supplied by the caller
        value: i64,
        /// Why it was rejected
        reason: String,
    },

    /// Strength level outside the controller table
    #[error("strength level {level} outside controller table 0..={max}")]
    InvalidLevel {
        /// Requested level
        level: u8,
        /// Highest level in the table
        max: u8,
    },

    /// No records supplied
    #[error("record set is empty")]
    EmptyRecordSet,

    /// Two records share a key
    #[error("duplicate paper_key {0}")]
    DuplicateKey(String),

    /// Dependency names a key that is neither in the set nor built earlier
    #[error("record {paper_key} depends on unknown key {dependency}")]
    DanglingDependency {
        /// Record holding the edge
        paper_key: String,
        /// Unresolved target
        dependency: String,
    },

    /// Record could not be interpreted
    #[error("malformed record: {0}")]
    MalformedRecord(String),

    /// Formula graph is internally inconsistent
    #[error("malformed formula graph in field {field}: {reason}")]
    MalformedFormula {
        /// Field holding the graph
        field: String,
        /// What is wrong
        reason: String,
    },

    /// Statistics arguments that cannot produce an estimate
    #[error("invalid statistics input: {0}")]
    InvalidStatsInput(String),

    /// Any other out-of-range parameter
    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter {
        /// Parameter name
        name: &'static str,
        /// Why it was rejected
        reason: String,
    },

    /// Config document failed to parse
    #[error("config parse error: {0}")]
    Parse(String),
}

impl ConfigError {
    /// Stable name of the check that failed
    #[must_use]
    pub fn check(&self) -> &'static str {
        match self {
            Self::EmptyVocabulary => "empty_vocabulary",
            Self::InvalidSeed { .. } => "seed_range",
            Self::InvalidLevel { .. } => "strength_level",
            Self::EmptyRecordSet => "non_empty_records",
            Self::DuplicateKey(_) => "unique_paper_key",
            Self::DanglingDependency { .. } => "dependency_closure",
            Self::MalformedRecord(_) => "record_shape",
            Self::MalformedFormula { .. } => "formula_shape",
            Self::InvalidStatsInput(_) => "stats_input",
            Self::InvalidParameter { .. } => "parameter_range",
            Self::Parse(_) => "config_parse",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_names_are_stable() {
        assert_eq!(ConfigError::EmptyVocabulary.check(), "empty_vocabulary");
        assert_eq!(
            ConfigError::InvalidLevel { level: 9, max: 4 }.check(),
            "strength_level"
        );
    }

    #[test]
    fn display_mentions_offending_values() {
        let err = ConfigError::DanglingDependency {
            paper_key: "A_002".into(),
            dependency: "Z_999".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("A_002"));
        assert!(msg.contains("Z_999"));
    }
}
