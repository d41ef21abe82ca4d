//! Parallel seed × level sweeps
//!
//! Each `(seed, level)` unit builds its own sealed world, codebook and RNGs
//! and attacks it under every requested threat model. Units share nothing
//! but the read-only input records, so rayon may run them in any order;
//! results come back in plan order.

use crate::attack::{
    AttackConfig, AttackEngine, AttackReport, AttackTargets, ThreatModel, ThreatSetup,
};
use crate::error::Result;
use crate::reporter::{LeakageUtilityReporter, LevelSample, TradeoffCurve};
use crate::stats::{StatsConfig, StatsEngine};
use crate::utility::UtilityScorer;
use rayon::prelude::*;
use sealworld_core::{BuildScope, PaperRecord, PublicSealedRecord, Seed};
use sealworld_seal::{Manifest, SealedWorldBuilder};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};

/// What to sweep
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepPlan {
    /// Research track
    pub track: String,
    /// Subset within the track
    pub subset: String,
    /// Sealing seeds
    pub seeds: Vec<Seed>,
    /// Defense levels
    pub levels: Vec<u8>,
    /// Threat models attacked per unit
    pub threat_models: Vec<ThreatModel>,
    /// Headline attack budget
    pub budget: usize,
    /// Adaptive budget sweep; empty skips it
    #[serde(default)]
    pub adaptive_budgets: Vec<usize>,
    /// Start at most this many units
    #[serde(default)]
    pub unit_cap: Option<usize>,
    /// Do not start units after this much wall-clock time
    #[serde(default)]
    pub deadline: Option<Duration>,
}

impl SweepPlan {
    /// Units in plan order: seeds outer, levels inner
    #[must_use]
    pub fn units(&self) -> Vec<SweepUnit> {
        self.seeds
            .iter()
            .flat_map(|&seed| self.levels.iter().map(move |&level| SweepUnit { seed, level }))
            .collect()
    }

    fn scope(&self, seed: Seed) -> BuildScope {
        BuildScope::new(self.track.clone(), self.subset.clone(), seed)
    }
}

/// One `(seed, level)` unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SweepUnit {
    /// Sealing seed
    pub seed: Seed,
    /// Defense level
    pub level: u8,
}

impl SweepUnit {
    /// Variant name used in reports
    #[must_use]
    pub fn variant(&self) -> String {
        format!("level-{}", self.level)
    }
}

/// Why a unit did not run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Beyond `unit_cap`
    UnitCap,
    /// Deadline passed before it started
    Deadline,
}

/// A unit that was not started
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedUnit {
    /// The unit
    pub unit: SweepUnit,
    /// Why
    pub reason: SkipReason,
}

/// Results of one unit; the codebook is dropped once the attacks finish
#[derive(Debug, Clone)]
pub struct UnitOutcome {
    /// The unit
    pub unit: SweepUnit,
    /// Sealed public records
    pub public: Vec<PublicSealedRecord>,
    /// Build manifest
    pub manifest: Manifest,
    /// Utility score
    pub utility: f64,
    /// One report per threat model
    pub reports: Vec<AttackReport>,
}

impl UnitOutcome {
    /// Headline leakage under `model`
    #[must_use]
    pub fn leakage(&self, model: ThreatModel) -> Option<f64> {
        self.reports
            .iter()
            .find(|r| r.threat_model == model)
            .and_then(AttackReport::metrics)
            .map(|m| m.leakage_score)
    }
}

/// Everything a sweep produced
#[derive(Debug, Clone, Default)]
pub struct SweepOutcome {
    /// Completed units, in plan order
    pub units: Vec<UnitOutcome>,
    /// One curve per threat model
    pub curves: Vec<TradeoffCurve>,
    /// Units never started
    pub skipped: Vec<SkippedUnit>,
}

/// Drives a [`SweepPlan`]
pub struct SweepRunner<'a> {
    records: &'a [PaperRecord],
    known_terms: &'a [String],
    builder: SealedWorldBuilder,
    scorer: &'a dyn UtilityScorer,
    attack: AttackConfig,
    stats: StatsConfig,
}

impl fmt::Debug for SweepRunner<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SweepRunner")
            .field("records", &self.records.len())
            .field("known_terms", &self.known_terms.len())
            .field("builder", &self.builder)
            .field("attack", &self.attack)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl<'a> SweepRunner<'a> {
    /// Runner over `records`
    ///
    /// `builder` supplies the lexicon and paraphraser; its configuration is
    /// replaced per unit by the level's.
    #[must_use]
    pub fn new(
        records: &'a [PaperRecord],
        known_terms: &'a [String],
        builder: SealedWorldBuilder,
        scorer: &'a dyn UtilityScorer,
    ) -> Self {
        Self {
            records,
            known_terms,
            builder,
            scorer,
            attack: AttackConfig::default(),
            stats: StatsConfig::default(),
        }
    }

    /// Attack parameters
    #[must_use]
    pub fn with_attack(mut self, attack: AttackConfig) -> Self {
        self.attack = attack;
        self
    }

    /// Resampling parameters for the curves
    #[must_use]
    pub fn with_stats(mut self, stats: StatsConfig) -> Self {
        self.stats = stats;
        self
    }

    /// Run every unit the cap and deadline allow, then build curves
    ///
    /// # Errors
    /// The first failing unit's error; skipped units are not errors
    pub fn run(&self, plan: &SweepPlan) -> Result<SweepOutcome> {
        self.attack.validate()?;
        self.stats.validate()?;

        let units = plan.units();
        let cap = plan.unit_cap.unwrap_or(units.len());
        tracing::info!(
            "Sweep {}/{}: {} units, cap {}, threat models {:?}",
            plan.track,
            plan.subset,
            units.len(),
            cap,
            plan.threat_models
        );

        let started = Instant::now();
        let results = units
            .par_iter()
            .enumerate()
            .map(|(i, unit)| {
                if i >= cap {
                    return Ok(Err(SkippedUnit {
                        unit: *unit,
                        reason: SkipReason::UnitCap,
                    }));
                }
                if plan.deadline.is_some_and(|d| started.elapsed() >= d) {
                    return Ok(Err(SkippedUnit {
                        unit: *unit,
                        reason: SkipReason::Deadline,
                    }));
                }
                self.run_unit(plan, *unit).map(Ok)
            })
            .collect::<Result<Vec<_>>>()?;

        let mut outcome = SweepOutcome::default();
        for result in results {
            match result {
                Ok(unit) => outcome.units.push(unit),
                Err(skipped) => {
                    tracing::warn!(
                        "Skipped unit seed={} level={}: {:?}",
                        skipped.unit.seed,
                        skipped.unit.level,
                        skipped.reason
                    );
                    outcome.skipped.push(skipped);
                }
            }
        }

        if !outcome.units.is_empty() {
            let reporter = LeakageUtilityReporter::new(StatsEngine::new(self.stats));
            for &model in &plan.threat_models {
                let samples: Vec<LevelSample> = outcome
                    .units
                    .iter()
                    .filter_map(|u| {
                        u.leakage(model).map(|leakage| LevelSample {
                            level: u.unit.level,
                            seed: u.unit.seed,
                            utility: u.utility,
                            leakage,
                        })
                    })
                    .collect();
                outcome
                    .curves
                    .push(reporter.build_curve(&plan.track, model, &samples)?);
            }
        }

        tracing::info!(
            "Sweep {}/{} finished: {} units run, {} skipped",
            plan.track,
            plan.subset,
            outcome.units.len(),
            outcome.skipped.len()
        );
        Ok(outcome)
    }

    fn run_unit(&self, plan: &SweepPlan, unit: SweepUnit) -> Result<UnitOutcome> {
        let scope = plan.scope(unit.seed);
        let world = self.builder.build_level(self.records, &scope, unit.level)?;
        let utility = self.scorer.score(self.records, &world.public);

        let targets = AttackTargets {
            held_out: self.records,
            known_terms: self.known_terms,
        };
        let mut reports = Vec::with_capacity(plan.threat_models.len());
        for &model in &plan.threat_models {
            let threat = match model {
                ThreatModel::BlackBox => ThreatSetup::BlackBox,
                ThreatModel::WhiteBox => ThreatSetup::WhiteBox(&world.codebook),
            };
            let engine = AttackEngine::new(&world.public, targets, threat, self.attack)?;
            let metrics = engine.run(plan.budget)?;
            let mut report = AttackReport::new(
                plan.track.clone(),
                unit.seed,
                unit.variant(),
                model,
                plan.budget,
                metrics,
            );
            if !plan.adaptive_budgets.is_empty() {
                report = report.with_curve(engine.run_adaptive(&plan.adaptive_budgets)?);
            }
            reports.push(report);
        }

        tracing::debug!(
            "Unit seed={} level={}: utility {:.3}",
            unit.seed,
            unit.level,
            utility
        );
        Ok(UnitOutcome {
            unit,
            public: world.public,
            manifest: world.manifest,
            utility,
            reports,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utility::StructuralUtility;
    use sealworld_test_utils::{vision_corpus, VISION_TERMS};

    fn plan() -> SweepPlan {
        SweepPlan {
            track: "vision".into(),
            subset: "s1".into(),
            seeds: vec![Seed::new(1), Seed::new(2)],
            levels: vec![0, 2],
            threat_models: vec![ThreatModel::BlackBox],
            budget: 64,
            adaptive_budgets: Vec::new(),
            unit_cap: None,
            deadline: None,
        }
    }

    fn stats() -> StatsConfig {
        StatsConfig {
            n_boot: 200,
            n_perm: 200,
            seed: Seed::new(0),
        }
    }

    #[test]
    fn units_in_plan_order() {
        let units = plan().units();
        assert_eq!(units.len(), 4);
        assert_eq!(units[1], SweepUnit { seed: Seed::new(1), level: 2 });
        assert_eq!(units[1].variant(), "level-2");
    }

    #[test]
    fn unit_cap_skips_the_tail() {
        let records = vision_corpus();
        let terms: Vec<String> = VISION_TERMS.iter().map(|t| (*t).to_string()).collect();
        let runner = SweepRunner::new(
            &records,
            &terms,
            SealedWorldBuilder::for_level(0).unwrap(),
            &StructuralUtility,
        )
        .with_stats(stats());
        let plan = SweepPlan {
            unit_cap: Some(3),
            ..plan()
        };
        let outcome = runner.run(&plan).unwrap();
        assert_eq!(outcome.units.len(), 3);
        assert_eq!(
            outcome.skipped,
            vec![SkippedUnit {
                unit: SweepUnit { seed: Seed::new(2), level: 2 },
                reason: SkipReason::UnitCap,
            }]
        );
        assert_eq!(outcome.curves.len(), 1);
    }

    #[test]
    fn expired_deadline_starts_nothing() {
        let records = vision_corpus();
        let runner = SweepRunner::new(
            &records,
            &[],
            SealedWorldBuilder::for_level(0).unwrap(),
            &StructuralUtility,
        );
        let plan = SweepPlan {
            deadline: Some(Duration::ZERO),
            ..plan()
        };
        let outcome = runner.run(&plan).unwrap();
        assert!(outcome.units.is_empty());
        assert!(outcome.curves.is_empty());
        assert!(outcome
            .skipped
            .iter()
            .all(|s| s.reason == SkipReason::Deadline));
    }
}
