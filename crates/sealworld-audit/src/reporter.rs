//! Leakage / utility tradeoff curves and knee recommendation

use crate::attack::ThreatModel;
use crate::stats::StatsEngine;
use sealworld_core::{ConfigError, Seed};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One `(level, seed)` measurement
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LevelSample {
    /// Defense level
    pub level: u8,
    /// Sealing seed
    pub seed: Seed,
    /// Utility in `[0, 1]`
    pub utility: f64,
    /// Leakage score in `[0, 1]`
    pub leakage: f64,
}

/// Aggregated level; one entry of `tradeoff_curve.json`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurvePoint {
    /// Defense level
    pub level: u8,
    /// Mean utility across seeds
    pub utility_mean: f64,
    /// Mean leakage across seeds
    pub leakage_mean: f64,
    /// 95% bootstrap interval of utility
    pub utility_ci: (f64, f64),
    /// 95% bootstrap interval of leakage
    pub leakage_ci: (f64, f64),
    /// Seeds aggregated
    pub n_seeds: usize,
}

/// Points ordered by level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeoffCurve {
    /// Research track
    pub track: String,
    /// Threat model the leakage was measured under
    pub threat_model: ThreatModel,
    /// Ascending by level
    pub points: Vec<CurvePoint>,
}

/// Knee selection rule
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KneePolicy {
    /// Allowed utility loss relative to the baseline, as a fraction
    pub utility_tolerance: f64,
    /// Highest acceptable leakage
    pub leakage_threshold: f64,
}

impl Default for KneePolicy {
    fn default() -> Self {
        Self {
            utility_tolerance: 0.1,
            leakage_threshold: 0.2,
        }
    }
}

impl KneePolicy {
    /// Both bounds within `[0, 1]`
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidParameter`] naming the field
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, v) in [
            ("utility_tolerance", self.utility_tolerance),
            ("leakage_threshold", self.leakage_threshold),
        ] {
            if !(0.0..=1.0).contains(&v) {
                return Err(ConfigError::InvalidParameter {
                    name,
                    reason: format!("{v} is outside [0, 1]"),
                });
            }
        }
        Ok(())
    }
}

/// Outcome of [`recommend`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Recommendation {
    /// Lowest level meeting the policy
    Knee {
        /// Recommended level
        level: u8,
        /// Utility relative to the baseline point
        utility_retention: f64,
        /// Mean leakage at that level
        leakage: f64,
    },
    /// No level meets the policy
    NoKnee {
        /// Why
        reason: String,
    },
}

impl Recommendation {
    /// Recommended level, if any
    #[must_use]
    pub fn level(&self) -> Option<u8> {
        match self {
            Self::Knee { level, .. } => Some(*level),
            Self::NoKnee { .. } => None,
        }
    }
}

/// Builds tradeoff curves from per-seed samples
#[derive(Debug, Clone)]
pub struct LeakageUtilityReporter {
    stats: StatsEngine,
}

impl LeakageUtilityReporter {
    /// Reporter drawing intervals from `stats`
    #[must_use]
    pub fn new(stats: StatsEngine) -> Self {
        Self { stats }
    }

    /// Aggregate samples per level
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidStatsInput`] for no samples, a repeated
    /// `(level, seed)` pair or non-finite values
    pub fn build_curve(
        &self,
        track: &str,
        threat_model: ThreatModel,
        samples: &[LevelSample],
    ) -> Result<TradeoffCurve, ConfigError> {
        if samples.is_empty() {
            return Err(ConfigError::InvalidStatsInput(
                "tradeoff curve needs at least one sample".into(),
            ));
        }

        let mut seen = BTreeSet::new();
        let mut by_level: BTreeMap<u8, (Vec<f64>, Vec<f64>)> = BTreeMap::new();
        for sample in samples {
            if !seen.insert((sample.level, sample.seed)) {
                return Err(ConfigError::InvalidStatsInput(format!(
                    "duplicate sample for level {} seed {}",
                    sample.level, sample.seed
                )));
            }
            let entry = by_level.entry(sample.level).or_default();
            entry.0.push(sample.utility);
            entry.1.push(sample.leakage);
        }

        let points = by_level
            .into_iter()
            .map(|(level, (utility, leakage))| {
                let u = self.stats.mean_ci(&utility)?;
                let l = self.stats.mean_ci(&leakage)?;
                Ok(CurvePoint {
                    level,
                    utility_mean: u.mean,
                    leakage_mean: l.mean,
                    utility_ci: u.bounds(),
                    leakage_ci: l.bounds(),
                    n_seeds: utility.len(),
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        tracing::info!(
            "Tradeoff curve {} / {}: {} levels from {} samples",
            track,
            threat_model,
            points.len(),
            samples.len()
        );
        Ok(TradeoffCurve {
            track: track.to_string(),
            threat_model,
            points,
        })
    }
}

/// Lowest level within the utility tolerance of the baseline and at or below
/// the leakage threshold
///
/// The baseline is level 0 when present, otherwise the first point.
#[must_use]
pub fn recommend(curve: &TradeoffCurve, policy: &KneePolicy) -> Recommendation {
    let Some(baseline) = curve
        .points
        .iter()
        .find(|p| p.level == 0)
        .or_else(|| curve.points.first())
    else {
        return Recommendation::NoKnee {
            reason: "curve has no points".into(),
        };
    };

    for point in &curve.points {
        let retention = if baseline.utility_mean > f64::EPSILON {
            point.utility_mean / baseline.utility_mean
        } else {
            1.0
        };
        if retention >= 1.0 - policy.utility_tolerance && point.leakage_mean <= policy.leakage_threshold
        {
            return Recommendation::Knee {
                level: point.level,
                utility_retention: retention,
                leakage: point.leakage_mean,
            };
        }
    }

    let min_leakage = curve
        .points
        .iter()
        .map(|p| p.leakage_mean)
        .fold(f64::INFINITY, f64::min);
    Recommendation::NoKnee {
        reason: format!(
            "no level keeps utility within {:.0}% of level {} with leakage <= {} (lowest leakage {:.3})",
            policy.utility_tolerance * 100.0,
            baseline.level,
            policy.leakage_threshold,
            min_leakage
        ),
    }
}

/// `leakage(baseline) - leakage(level)` per level
#[must_use]
pub fn leakage_reduction(curve: &TradeoffCurve) -> BTreeMap<u8, f64> {
    let Some(baseline) = curve
        .points
        .iter()
        .find(|p| p.level == 0)
        .or_else(|| curve.points.first())
    else {
        return BTreeMap::new();
    };
    curve
        .points
        .iter()
        .map(|p| (p.level, baseline.leakage_mean - p.leakage_mean))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::StatsConfig;
    use pretty_assertions::assert_eq;

    fn reporter() -> LeakageUtilityReporter {
        LeakageUtilityReporter::new(StatsEngine::new(StatsConfig {
            n_boot: 500,
            n_perm: 500,
            seed: Seed::new(3),
        }))
    }

    fn samples(rows: &[(u8, f64, f64)]) -> Vec<LevelSample> {
        rows.iter()
            .flat_map(|&(level, utility, leakage)| {
                (0..3).map(move |s| LevelSample {
                    level,
                    seed: Seed::new(s),
                    utility,
                    leakage,
                })
            })
            .collect()
    }

    fn curve(rows: &[(u8, f64, f64)]) -> TradeoffCurve {
        reporter()
            .build_curve("vision", ThreatModel::BlackBox, &samples(rows))
            .unwrap()
    }

    #[test]
    fn points_sorted_by_level() {
        let c = curve(&[(2, 0.8, 0.2), (0, 1.0, 0.9), (1, 0.95, 0.5)]);
        let levels: Vec<u8> = c.points.iter().map(|p| p.level).collect();
        assert_eq!(levels, vec![0, 1, 2]);
        assert_eq!(c.points[0].n_seeds, 3);
        let (lo, hi) = c.points[0].utility_ci;
        assert!((lo - 1.0).abs() < 1e-12 && (hi - 1.0).abs() < 1e-12);
    }

    #[test]
    fn duplicates_rejected() {
        let mut s = samples(&[(0, 1.0, 0.9)]);
        s.push(s[0]);
        assert!(matches!(
            reporter().build_curve("vision", ThreatModel::BlackBox, &s),
            Err(ConfigError::InvalidStatsInput(_))
        ));
    }

    #[test]
    fn knee_is_lowest_qualifying_level() {
        let c = curve(&[(0, 1.0, 0.9), (1, 0.97, 0.4), (2, 0.92, 0.15), (3, 0.91, 0.1)]);
        let rec = recommend(&c, &KneePolicy::default());
        assert_eq!(rec.level(), Some(2));
        assert_eq!(recommend(&c, &KneePolicy::default()), rec);
    }

    #[test]
    fn no_knee_explains_itself() {
        let c = curve(&[(0, 1.0, 0.9), (1, 0.5, 0.1)]);
        match recommend(&c, &KneePolicy::default()) {
            Recommendation::NoKnee { reason } => assert!(reason.contains("lowest leakage 0.100")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn reduction_is_relative_to_level_zero() {
        let c = curve(&[(0, 1.0, 0.9), (2, 0.9, 0.3)]);
        let r = leakage_reduction(&c);
        assert!((r[&0]).abs() < 1e-12);
        assert!((r[&2] - 0.6).abs() < 1e-12);
    }
}
