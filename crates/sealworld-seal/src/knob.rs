//! Sealing configuration and the strength-level table
//!
//! [`DefenseKnobController`] maps an integer level to a [`SealingConfig`].
//! The table is monotone: every level enables a superset of the previous
//! level's lexical and structural transforms and a coarser numeric policy.
//!
//! | level | lexical | structural | numeric |
//! |---|---|---|---|
//! | 0 | denylist redaction only | off | identity |
//! | 1 | lexicon + identifiers, exact case | relabel | perturb |
//! | 2 | + capitalised words, case-insensitive, plurals | + commutative reorder | perturb |
//! | 3 | + years, rare tokens df ≤ 1, quotes > 12 words | + associative regroup | quantile 8 |
//! | 4 | rare tokens df ≤ 2, in-text numbers, quotes > 6 words | all | quantile 4 |

use sealworld_core::{ConfigError, ContentHash};
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

/// What to do when a denylisted pattern is found in text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenylistAction {
    /// Replace the match with a class placeholder such as `[URL]`
    #[default]
    Redact,
    /// Fail the build
    Reject,
}

/// Free-text sealing switches
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LexicalConfig {
    /// Substitute codebook terms at all
    pub enabled: bool,
    /// Harvest CamelCase, digit-bearing identifiers and acronyms
    pub extract_identifiers: bool,
    /// Harvest capitalised words that do not start a sentence
    pub extract_capitalized: bool,
    /// Match terms regardless of case
    pub case_insensitive: bool,
    /// Also match `term + s` / `term + es`
    pub match_plurals: bool,
    /// Replace years with era labels
    pub seal_years: bool,
    /// Harvest lowercase content tokens with document frequency at most this
    pub rare_token_df_max: Option<usize>,
    /// Replace remaining standalone numbers with `[NUM]`
    pub redact_numbers_in_text: bool,
    /// Replace quotations longer than this many words with `[QUOTE]`
    pub max_quote_words: Option<usize>,
    /// Denylist behaviour
    pub denylist_action: DenylistAction,
}

impl Default for LexicalConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            extract_identifiers: false,
            extract_capitalized: false,
            case_insensitive: false,
            match_plurals: false,
            seal_years: false,
            rare_token_df_max: None,
            redact_numbers_in_text: false,
            max_quote_words: None,
            denylist_action: DenylistAction::Redact,
        }
    }
}

/// Formula graph sealing switches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StructuralConfig {
    /// Relabel ids and labels, shuffle node and edge order
    pub relabel: bool,
    /// Permute operand slots of commutative operations
    pub reorder_commutative: bool,
    /// Regroup single-consumer associative chains
    pub regroup_associative: bool,
}

impl StructuralConfig {
    /// Whether any transform is active
    #[inline]
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.relabel || self.reorder_commutative || self.regroup_associative
    }
}

/// Numeric sealing policy
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum NumericPolicy {
    /// Emit raw values (unsealed baseline)
    #[default]
    Identity,
    /// Quantile bin index
    Quantile {
        /// Number of bins
        bins: u32,
    },
    /// Seeded strictly increasing piecewise-linear map
    Perturb {
        /// Number of linear segments over the observed range
        knots: usize,
        /// Spread of the log-slopes
        log_slope_sigma: f64,
    },
}

impl NumericPolicy {
    /// Short policy name used in manifests
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Identity => "identity",
            Self::Quantile { .. } => "quantile",
            Self::Perturb { .. } => "perturb",
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        match *self {
            Self::Identity => Ok(()),
            Self::Quantile { bins } if bins < 2 => Err(ConfigError::InvalidParameter {
                name: "numeric.bins",
                reason: format!("need at least 2 bins, got {bins}"),
            }),
            Self::Quantile { .. } => Ok(()),
            Self::Perturb { knots, .. } if knots == 0 => Err(ConfigError::InvalidParameter {
                name: "numeric.knots",
                reason: "need at least one segment".to_string(),
            }),
            Self::Perturb {
                log_slope_sigma, ..
            } if !log_slope_sigma.is_finite() || log_slope_sigma < 0.0 => {
                Err(ConfigError::InvalidParameter {
                    name: "numeric.log_slope_sigma",
                    reason: format!("must be finite and non-negative, got {log_slope_sigma}"),
                })
            }
            Self::Perturb { .. } => Ok(()),
        }
    }
}

/// Complete sealing configuration for one build
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SealingConfig {
    /// Strength level this configuration was derived from
    pub level: u8,
    /// Free-text sealing
    #[serde(default)]
    pub lexical: LexicalConfig,
    /// Formula graph sealing
    #[serde(default)]
    pub structural: StructuralConfig,
    /// Numeric sealing
    #[serde(default)]
    pub numeric: NumericPolicy,
}

impl SealingConfig {
    /// Check parameter ranges
    ///
    /// # Errors
    /// Returns the first [`ConfigError`] found
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.level > DefenseKnobController::MAX_LEVEL {
            return Err(ConfigError::InvalidLevel {
                level: self.level,
                max: DefenseKnobController::MAX_LEVEL,
            });
        }
        if self.lexical.max_quote_words == Some(0) {
            return Err(ConfigError::InvalidParameter {
                name: "lexical.max_quote_words",
                reason: "must be at least 1 when set".to_string(),
            });
        }
        self.numeric.validate()
    }

    /// Content hash recorded in the manifest
    ///
    /// # Errors
    /// Returns [`ConfigError::Parse`] if the config cannot be serialized
    pub fn content_hash(&self) -> Result<ContentHash, ConfigError> {
        ContentHash::compute_serializable(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

/// Maps a strength level to a sealing configuration; holds no state
#[derive(Debug, Clone, Copy, Default)]
pub struct DefenseKnobController;

impl DefenseKnobController {
    /// Highest level in the table
    pub const MAX_LEVEL: u8 = 4;

    /// Every level in the table, gentlest first
    #[must_use]
    pub const fn levels() -> RangeInclusive<u8> {
        0..=Self::MAX_LEVEL
    }

    /// Configuration for `level`
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidLevel`] outside `0..=MAX_LEVEL`
    pub fn level_to_config(level: u8) -> Result<SealingConfig, ConfigError> {
        if level > Self::MAX_LEVEL {
            return Err(ConfigError::InvalidLevel {
                level,
                max: Self::MAX_LEVEL,
            });
        }

        let lexical = LexicalConfig {
            enabled: level >= 1,
            extract_identifiers: level >= 1,
            extract_capitalized: level >= 2,
            case_insensitive: level >= 2,
            match_plurals: level >= 2,
            seal_years: level >= 3,
            rare_token_df_max: match level {
                3 => Some(1),
                4 => Some(2),
                _ => None,
            },
            redact_numbers_in_text: level >= 4,
            max_quote_words: match level {
                3 => Some(12),
                4 => Some(6),
                _ => None,
            },
            denylist_action: DenylistAction::Redact,
        };

        let structural = StructuralConfig {
            relabel: level >= 1,
            reorder_commutative: level >= 2,
            regroup_associative: level >= 3,
        };

        let numeric = match level {
            0 => NumericPolicy::Identity,
            1 | 2 => NumericPolicy::Perturb {
                knots: 8,
                log_slope_sigma: 0.5,
            },
            3 => NumericPolicy::Quantile { bins: 8 },
            _ => NumericPolicy::Quantile { bins: 4 },
        };

        Ok(SealingConfig {
            level,
            lexical,
            structural,
            numeric,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_outside_table_is_rejected() {
        assert_eq!(
            DefenseKnobController::level_to_config(5),
            Err(ConfigError::InvalidLevel { level: 5, max: 4 })
        );
    }

    #[test]
    fn level_zero_is_redaction_only() {
        let cfg = DefenseKnobController::level_to_config(0).unwrap();
        assert!(!cfg.lexical.enabled);
        assert!(!cfg.structural.is_active());
        assert_eq!(cfg.numeric, NumericPolicy::Identity);
    }

    #[test]
    fn switches_only_turn_on_as_level_rises() {
        let configs: Vec<SealingConfig> = DefenseKnobController::levels()
            .map(|l| DefenseKnobController::level_to_config(l).unwrap())
            .collect();
        for pair in configs.windows(2) {
            let (lo, hi) = (&pair[0], &pair[1]);
            assert!(hi.lexical.enabled >= lo.lexical.enabled);
            assert!(hi.lexical.extract_capitalized >= lo.lexical.extract_capitalized);
            assert!(hi.lexical.case_insensitive >= lo.lexical.case_insensitive);
            assert!(hi.lexical.seal_years >= lo.lexical.seal_years);
            assert!(hi.structural.relabel >= lo.structural.relabel);
            assert!(hi.structural.reorder_commutative >= lo.structural.reorder_commutative);
            assert!(hi.structural.regroup_associative >= lo.structural.regroup_associative);
            assert!(
                hi.lexical.rare_token_df_max.unwrap_or(0) >= lo.lexical.rare_token_df_max.unwrap_or(0)
            );
        }
    }

    #[test]
    fn every_table_entry_validates() {
        for level in DefenseKnobController::levels() {
            let cfg = DefenseKnobController::level_to_config(level).unwrap();
            assert!(cfg.validate().is_ok(), "level {level}");
        }
    }

    #[test]
    fn degenerate_numeric_policies_fail_validation() {
        let mut cfg = DefenseKnobController::level_to_config(3).unwrap();
        cfg.numeric = NumericPolicy::Quantile { bins: 1 };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidParameter { name: "numeric.bins", .. })
        ));
    }

    #[test]
    fn config_hash_tracks_content() {
        let a = DefenseKnobController::level_to_config(1).unwrap();
        let b = DefenseKnobController::level_to_config(2).unwrap();
        assert_eq!(a.content_hash().unwrap(), a.content_hash().unwrap());
        assert_ne!(a.content_hash().unwrap(), b.content_hash().unwrap());
    }

    #[test]
    fn numeric_policy_is_internally_tagged() {
        let cfg = DefenseKnobController::level_to_config(4).unwrap();
        let json = serde_json::to_string(&cfg.numeric).unwrap();
        assert_eq!(json, "{\"policy\":\"quantile\",\"bins\":4}");
    }
}
