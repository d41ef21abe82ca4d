//! Build scope: which `(track, subset, seed)` a sealed world belongs to

use crate::error::ConfigError;
use crate::record::PaperKey;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::{self, Display, Formatter};

/// Sealing seed
///
/// Seeds arrive from configs as signed integers; negative values are
/// rejected rather than wrapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Seed(u64);

impl Seed {
    /// Wrap an unsigned seed
    #[inline]
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Convert a config-supplied signed seed
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidSeed`] for negative values
    pub fn from_signed(value: i64) -> Result<Self, ConfigError> {
        u64::try_from(value)
            .map(Self)
            .map_err(|_| ConfigError::InvalidSeed {
                value,
                reason: "seeds must be non-negative".to_string(),
            })
    }

    /// Raw value
    #[inline]
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl Display for Seed {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies one sealing unit
///
/// `prior_keys` lists keys built in earlier subsets; dependencies may point
/// at them without being present in the current record set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildScope {
    /// Research track
    pub track: String,
    /// Subset within the track
    pub subset: String,
    /// Sealing seed
    pub seed: Seed,
    /// Keys sealed by earlier subsets
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub prior_keys: BTreeSet<PaperKey>,
}

impl BuildScope {
    /// Create a scope with no prior subsets
    #[must_use]
    pub fn new(track: impl Into<String>, subset: impl Into<String>, seed: Seed) -> Self {
        Self {
            track: track.into(),
            subset: subset.into(),
            seed,
            prior_keys: BTreeSet::new(),
        }
    }

    /// Allow dependencies on keys from earlier subsets
    #[must_use]
    pub fn with_prior_keys(mut self, keys: impl IntoIterator<Item = PaperKey>) -> Self {
        self.prior_keys.extend(keys);
        self
    }

    /// Same track and subset under another seed
    #[must_use]
    pub fn reseeded(&self, seed: Seed) -> Self {
        Self {
            seed,
            ..self.clone()
        }
    }
}

impl Display for BuildScope {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@seed={}", self.track, self.subset, self.seed)
    }
}
