//! Audit configuration
//!
//! Loaded from TOML:
//!
//! ```toml
//! track = "vision"
//! subset = "s1"
//! seeds = [1, 2, 3]
//! levels = [0, 1, 2, 3, 4]
//! threat_models = ["black_box", "white_box"]
//! budget = 64
//! adaptive_budgets = [8, 16, 32, 64, 128]
//! unit_cap = 30
//! deadline_secs = 600
//!
//! [attack]
//! top_k = 5
//!
//! [stats]
//! n_boot = 4000
//!
//! [knee]
//! utility_tolerance = 0.1
//! leakage_threshold = 0.2
//! ```

use crate::attack::{AttackConfig, ThreatModel, DEFAULT_BUDGETS};
use crate::error::{AuditError, Result};
use crate::reporter::KneePolicy;
use crate::stats::StatsConfig;
use crate::sweep::SweepPlan;
use sealworld_core::{ConfigError, ContentHash, Seed};
use sealworld_seal::DefenseKnobController;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// On-disk layout, before validation
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawAuditConfig {
    track: String,
    subset: String,
    seeds: Vec<i64>,
    #[serde(default = "all_levels")]
    levels: Vec<i64>,
    #[serde(default = "black_box_only")]
    threat_models: Vec<ThreatModel>,
    #[serde(default = "default_budget")]
    budget: usize,
    #[serde(default = "default_adaptive")]
    adaptive_budgets: Vec<usize>,
    #[serde(default)]
    unit_cap: Option<usize>,
    #[serde(default)]
    deadline_secs: Option<u64>,
    #[serde(default)]
    attack: AttackConfig,
    #[serde(default)]
    stats: StatsConfig,
    #[serde(default)]
    knee: KneePolicy,
}

fn all_levels() -> Vec<i64> {
    DefenseKnobController::levels().map(i64::from).collect()
}

fn black_box_only() -> Vec<ThreatModel> {
    vec![ThreatModel::BlackBox]
}

fn default_budget() -> usize {
    64
}

fn default_adaptive() -> Vec<usize> {
    DEFAULT_BUDGETS.to_vec()
}

/// Validated audit configuration
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditConfig {
    /// Research track
    pub track: String,
    /// Subset within the track
    pub subset: String,
    /// Sealing seeds, deduplicated
    pub seeds: Vec<Seed>,
    /// Defense levels, sorted and deduplicated
    pub levels: Vec<u8>,
    /// Threat models
    pub threat_models: Vec<ThreatModel>,
    /// Headline budget
    pub budget: usize,
    /// Adaptive sweep, sorted and deduplicated
    pub adaptive_budgets: Vec<usize>,
    /// Unit cap
    pub unit_cap: Option<usize>,
    /// Wall-clock cap
    pub deadline: Option<Duration>,
    /// Attack parameters
    pub attack: AttackConfig,
    /// Resampling parameters
    pub stats: StatsConfig,
    /// Knee policy
    pub knee: KneePolicy,
}

impl AuditConfig {
    /// Parse and validate a TOML document
    ///
    /// # Errors
    /// Returns [`ConfigError::Parse`] for malformed TOML, otherwise the first
    /// failing validation
    pub fn from_toml_str(text: &str) -> std::result::Result<Self, ConfigError> {
        let raw: RawAuditConfig =
            toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Self::validate(raw)
    }

    /// Read and validate a TOML file
    ///
    /// # Errors
    /// Filesystem errors or [`from_toml_str`](Self::from_toml_str) errors
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| AuditError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!("Loading audit config from {}", path.display());
        Ok(Self::from_toml_str(&text)?)
    }

    fn validate(raw: RawAuditConfig) -> std::result::Result<Self, ConfigError> {
        if raw.track.trim().is_empty() || raw.subset.trim().is_empty() {
            return Err(ConfigError::InvalidParameter {
                name: "track",
                reason: "track and subset must be non-empty".into(),
            });
        }
        if raw.seeds.is_empty() {
            return Err(ConfigError::InvalidParameter {
                name: "seeds",
                reason: "at least one seed is required".into(),
            });
        }
        let mut seeds = raw
            .seeds
            .into_iter()
            .map(Seed::from_signed)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        seeds.sort_unstable();
        seeds.dedup();

        let mut levels = raw
            .levels
            .into_iter()
            .map(|l| {
                let level = u8::try_from(l).unwrap_or(u8::MAX);
                DefenseKnobController::level_to_config(level).map(|_| level)
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;
        levels.sort_unstable();
        levels.dedup();
        if levels.is_empty() {
            return Err(ConfigError::InvalidParameter {
                name: "levels",
                reason: "at least one level is required".into(),
            });
        }

        let mut threat_models = raw.threat_models;
        threat_models.sort_unstable();
        threat_models.dedup();
        if threat_models.is_empty() {
            return Err(ConfigError::InvalidParameter {
                name: "threat_models",
                reason: "at least one threat model is required".into(),
            });
        }

        let mut adaptive_budgets = raw.adaptive_budgets;
        adaptive_budgets.sort_unstable();
        adaptive_budgets.dedup();

        raw.attack.validate()?;
        raw.stats.validate()?;
        raw.knee.validate()?;

        Ok(Self {
            track: raw.track,
            subset: raw.subset,
            seeds,
            levels,
            threat_models,
            budget: raw.budget,
            adaptive_budgets,
            unit_cap: raw.unit_cap,
            deadline: raw.deadline_secs.map(Duration::from_secs),
            attack: raw.attack,
            stats: raw.stats,
            knee: raw.knee,
        })
    }

    /// Sweep plan for this configuration
    #[must_use]
    pub fn plan(&self) -> SweepPlan {
        SweepPlan {
            track: self.track.clone(),
            subset: self.subset.clone(),
            seeds: self.seeds.clone(),
            levels: self.levels.clone(),
            threat_models: self.threat_models.clone(),
            budget: self.budget,
            adaptive_budgets: self.adaptive_budgets.clone(),
            unit_cap: self.unit_cap,
            deadline: self.deadline,
        }
    }

    /// Hash of the validated configuration, for reproducibility records
    ///
    /// # Errors
    /// Serialization failure
    pub fn content_hash(&self) -> Result<ContentHash> {
        Ok(ContentHash::compute(&serde_json::to_vec(self)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const MINIMAL: &str = r#"
        track = "vision"
        subset = "s1"
        seeds = [3, 1, 3]
    "#;

    #[test]
    fn defaults_fill_the_rest() {
        let config = AuditConfig::from_toml_str(MINIMAL).unwrap();
        assert_eq!(config.seeds, vec![Seed::new(1), Seed::new(3)]);
        assert_eq!(config.levels, vec![0, 1, 2, 3, 4]);
        assert_eq!(config.threat_models, vec![ThreatModel::BlackBox]);
        assert_eq!(config.adaptive_budgets, DEFAULT_BUDGETS.to_vec());
        assert_eq!(config.stats.n_boot, 4000);
        assert_eq!(config.plan().units().len(), 10);
    }

    #[test]
    fn full_document() {
        let text = r#"
            track = "nlp"
            subset = "s2"
            seeds = [7]
            levels = [4, 0, 2]
            threat_models = ["white_box", "black_box"]
            budget = 32
            adaptive_budgets = [64, 8, 8]
            unit_cap = 2
            deadline_secs = 60

            [attack]
            top_k = 3
            retrieval_weight = 0.7
            term_weight = 0.3

            [stats]
            n_boot = 2000
            n_perm = 2000
            seed = 9

            [knee]
            utility_tolerance = 0.05
            leakage_threshold = 0.3
        "#;
        let config = AuditConfig::from_toml_str(text).unwrap();
        assert_eq!(config.levels, vec![0, 2, 4]);
        assert_eq!(
            config.threat_models,
            vec![ThreatModel::BlackBox, ThreatModel::WhiteBox]
        );
        assert_eq!(config.adaptive_budgets, vec![8, 64]);
        assert_eq!(config.deadline, Some(Duration::from_secs(60)));
        assert_eq!(config.attack.top_k, 3);
        assert_eq!(config.stats.seed, Seed::new(9));
    }

    #[test]
    fn negative_seed_rejected() {
        let err = AuditConfig::from_toml_str(
            r#"
            track = "vision"
            subset = "s1"
            seeds = [1, -4]
        "#,
        )
        .unwrap_err();
        assert_eq!(err.check(), "seed_range");
    }

    #[test]
    fn unknown_level_rejected() {
        let err = AuditConfig::from_toml_str(
            r#"
            track = "vision"
            subset = "s1"
            seeds = [1]
            levels = [0, 7]
        "#,
        )
        .unwrap_err();
        assert_eq!(err, ConfigError::InvalidLevel { level: 7, max: 4 });
    }

    #[test]
    fn too_few_resamples_rejected() {
        let err = AuditConfig::from_toml_str(
            r#"
            track = "vision"
            subset = "s1"
            seeds = [1]

            [stats]
            n_boot = 50
        "#,
        )
        .unwrap_err();
        assert_eq!(err.check(), "parameter_range");
    }

    #[test]
    fn malformed_toml_is_parse_error() {
        let err = AuditConfig::from_toml_str("track = ").unwrap_err();
        assert_eq!(err.check(), "config_parse");
    }

    #[test]
    fn hash_is_stable() {
        let a = AuditConfig::from_toml_str(MINIMAL).unwrap();
        let b = AuditConfig::from_toml_str(MINIMAL).unwrap();
        assert_eq!(a.content_hash().unwrap(), b.content_hash().unwrap());
    }
}
