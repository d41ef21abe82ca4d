//! Bootstrap confidence intervals, permutation tests and effect sizes
//!
//! Every resample draws from its own `ChaCha8Rng` keyed by the configured
//! seed and the resample index, so results do not depend on how rayon
//! schedules the work.

use rand::seq::SliceRandom;
use rand::Rng;
use rayon::prelude::*;
use sealworld_core::{ConfigError, Seed, SeedStream};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Fewest resamples accepted
pub const MIN_RESAMPLES: usize = 100;

/// Resample count below which results are flagged as coarse
pub const RECOMMENDED_RESAMPLES: usize = 2000;

const EPS: f64 = 1e-12;

/// Resampling parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsConfig {
    /// Bootstrap resamples
    pub n_boot: usize,
    /// Permutation resamples
    pub n_perm: usize,
    /// Resampling seed
    pub seed: Seed,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            n_boot: 4000,
            n_perm: 4000,
            seed: Seed::new(0),
        }
    }
}

impl StatsConfig {
    /// Reject resample counts below [`MIN_RESAMPLES`]
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidParameter`] naming the field
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [("n_boot", self.n_boot), ("n_perm", self.n_perm)] {
            if value < MIN_RESAMPLES {
                return Err(ConfigError::InvalidParameter {
                    name,
                    reason: format!("{value} is below the minimum of {MIN_RESAMPLES}"),
                });
            }
            if value < RECOMMENDED_RESAMPLES {
                tracing::warn!(
                    "{} = {} is below {}; intervals will be coarse",
                    name,
                    value,
                    RECOMMENDED_RESAMPLES
                );
            }
        }
        Ok(())
    }
}

/// How the two samples relate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pairing {
    /// `a[i]` and `b[i]` come from the same unit (same seed)
    Paired,
    /// Independent samples
    Unpaired,
}

/// Result of [`StatsEngine::compare`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    /// `mean(a) - mean(b)`
    pub diff: f64,
    /// 2.5th bootstrap percentile of the difference
    pub ci95_low: f64,
    /// 97.5th bootstrap percentile of the difference
    pub ci95_high: f64,
    /// Two-sided permutation p-value
    pub p_perm_two_sided: f64,
    /// Effect size; `None` when the pooled spread is zero but the means differ
    pub cohens_d: Option<f64>,
    /// Pairing used
    pub pairing: Pairing,
}

/// Mean with a bootstrap interval
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeanInterval {
    /// Sample mean
    pub mean: f64,
    /// 2.5th percentile
    pub low: f64,
    /// 97.5th percentile
    pub high: f64,
}

impl MeanInterval {
    /// `(low, high)`
    #[inline]
    #[must_use]
    pub fn bounds(&self) -> (f64, f64) {
        (self.low, self.high)
    }
}

/// Seeded two-sample statistics
#[derive(Debug, Clone)]
pub struct StatsEngine {
    config: StatsConfig,
    stream: SeedStream,
}

impl StatsEngine {
    /// Engine for `config`
    #[must_use]
    pub fn new(config: StatsConfig) -> Self {
        Self {
            config,
            stream: SeedStream::new(config.seed),
        }
    }

    /// Active configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &StatsConfig {
        &self.config
    }

    /// Difference of means with bootstrap CI, permutation p-value and Cohen's d
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidStatsInput`] for empty or non-finite
    /// samples and for paired samples of unequal length, and
    /// [`ConfigError::InvalidParameter`] for too few resamples
    pub fn compare(&self, a: &[f64], b: &[f64], pairing: Pairing) -> Result<Comparison, ConfigError> {
        self.config.validate()?;
        check_sample("a", a)?;
        check_sample("b", b)?;
        if pairing == Pairing::Paired && a.len() != b.len() {
            return Err(ConfigError::InvalidStatsInput(format!(
                "paired samples differ in length ({} vs {})",
                a.len(),
                b.len()
            )));
        }

        let diff = mean(a) - mean(b);
        let (boot, p_perm_two_sided, cohens_d) = match pairing {
            Pairing::Paired => {
                let d: Vec<f64> = a.iter().zip(b).map(|(x, y)| x - y).collect();
                (
                    self.bootstrap_paired(&d),
                    self.sign_flip_p(&d),
                    effect_size(diff, stddev(&d)),
                )
            }
            Pairing::Unpaired => (
                self.bootstrap_unpaired(a, b),
                self.label_shuffle_p(a, b, diff),
                effect_size(diff, pooled_sd(a, b)),
            ),
        };

        Ok(Comparison {
            diff,
            ci95_low: quantile(&boot, 0.025),
            ci95_high: quantile(&boot, 0.975),
            p_perm_two_sided,
            cohens_d,
            pairing,
        })
    }

    /// Mean of `samples` with a percentile bootstrap interval
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidStatsInput`] for empty or non-finite input
    pub fn mean_ci(&self, samples: &[f64]) -> Result<MeanInterval, ConfigError> {
        self.config.validate()?;
        check_sample("samples", samples)?;
        let boot: Vec<f64> = (0..self.config.n_boot)
            .into_par_iter()
            .map(|i| {
                let mut rng = self.stream.rng("stats mean ci", &[&(i as u64).to_le_bytes()]);
                resample_mean(samples, &mut rng)
            })
            .collect();
        Ok(MeanInterval {
            mean: mean(samples),
            low: quantile(&boot, 0.025),
            high: quantile(&boot, 0.975),
        })
    }

    fn bootstrap_paired(&self, d: &[f64]) -> Vec<f64> {
        (0..self.config.n_boot)
            .into_par_iter()
            .map(|i| {
                let mut rng = self.stream.rng("stats bootstrap paired", &[&(i as u64).to_le_bytes()]);
                resample_mean(d, &mut rng)
            })
            .collect()
    }

    fn bootstrap_unpaired(&self, a: &[f64], b: &[f64]) -> Vec<f64> {
        (0..self.config.n_boot)
            .into_par_iter()
            .map(|i| {
                let mut rng =
                    self.stream.rng("stats bootstrap unpaired", &[&(i as u64).to_le_bytes()]);
                resample_mean(a, &mut rng) - resample_mean(b, &mut rng)
            })
            .collect()
    }

    fn label_shuffle_p(&self, a: &[f64], b: &[f64], observed: f64) -> f64 {
        let pooled: Vec<f64> = a.iter().chain(b).copied().collect();
        let extreme = (0..self.config.n_perm)
            .into_par_iter()
            .filter(|i| {
                let mut rng = self.stream.rng("stats permutation", &[&(*i as u64).to_le_bytes()]);
                let mut shuffled = pooled.clone();
                shuffled.shuffle(&mut rng);
                let (pa, pb) = shuffled.split_at(a.len());
                (mean(pa) - mean(pb)).abs() >= observed.abs() - EPS
            })
            .count();
        phipson_smyth(extreme, self.config.n_perm)
    }

    fn sign_flip_p(&self, d: &[f64]) -> f64 {
        let observed = mean(d);
        let extreme = (0..self.config.n_perm)
            .into_par_iter()
            .filter(|i| {
                let mut rng = self.stream.rng("stats sign flip", &[&(*i as u64).to_le_bytes()]);
                let flipped = d
                    .iter()
                    .map(|x| if rng.gen_bool(0.5) { -x } else { *x })
                    .sum::<f64>()
                    / d.len() as f64;
                flipped.abs() >= observed.abs() - EPS
            })
            .count();
        phipson_smyth(extreme, self.config.n_perm)
    }
}

fn check_sample(name: &str, values: &[f64]) -> Result<(), ConfigError> {
    if values.is_empty() {
        return Err(ConfigError::InvalidStatsInput(format!("sample {name} is empty")));
    }
    if values.iter().any(|v| !v.is_finite()) {
        return Err(ConfigError::InvalidStatsInput(format!(
            "sample {name} holds a non-finite value"
        )));
    }
    Ok(())
}

/// Permutation p-values are never zero
fn phipson_smyth(extreme: usize, n: usize) -> f64 {
    (extreme as f64 + 1.0) / (n as f64 + 1.0)
}

fn effect_size(diff: f64, spread: f64) -> Option<f64> {
    if spread > EPS {
        Some(diff / spread)
    } else if diff.abs() <= EPS {
        Some(0.0)
    } else {
        None
    }
}

fn resample_mean(values: &[f64], rng: &mut impl Rng) -> f64 {
    let n = values.len();
    (0..n).map(|_| values[rng.gen_range(0..n)]).sum::<f64>() / n as f64
}

pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Sample standard deviation (n - 1)
fn stddev(values: &[f64]) -> f64 {
    if values.len() <= 1 {
        return 0.0;
    }
    let center = mean(values);
    let var = values.iter().map(|v| (v - center).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    var.sqrt()
}

fn pooled_sd(a: &[f64], b: &[f64]) -> f64 {
    let dof = (a.len() + b.len()).saturating_sub(2);
    if dof == 0 {
        return 0.0;
    }
    let ss = |xs: &[f64]| {
        let m = mean(xs);
        xs.iter().map(|x| (x - m).powi(2)).sum::<f64>()
    };
    ((ss(a) + ss(b)) / dof as f64).sqrt()
}

/// Linear-interpolated quantile
pub(crate) fn quantile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let q = q.clamp(0.0, 1.0);
    let idx = q * (sorted.len() - 1) as f64;
    let lo = idx.floor() as usize;
    let hi = idx.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        let t = idx - lo as f64;
        sorted[lo] * (1.0 - t) + sorted[hi] * t
    }
}
