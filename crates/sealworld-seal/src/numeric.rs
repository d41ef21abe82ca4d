//! Numeric sealing
//!
//! Each metric name gets one [`MetricMap`], fitted on the observed values of
//! the subset and frozen in the codebook. Every map is monotone
//! non-decreasing, so `a < b` never seals to `a' > b'`. Binning may collapse
//! ties; perturbation is strictly increasing before rounding.

use crate::knob::NumericPolicy;
use rand::Rng;
use sealworld_core::{PaperRecord, SealedValue, SeedStream};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

const PERTURB_DECIMALS: f64 = 1e6;

/// One knot of a piecewise-linear map
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Knot {
    /// Raw value
    pub x: f64,
    /// Sealed value
    pub y: f64,
}

/// Frozen per-metric map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "map", rename_all = "snake_case")]
pub enum MetricMap {
    /// Pass values through
    Identity,
    /// Bin index by boundary search
    Bins {
        /// Strictly increasing inner boundaries
        boundaries: Vec<f64>,
    },
    /// Piecewise-linear, strictly increasing
    Perturb {
        /// Knots ordered by `x`, `y` rising from 0 to 1
        knots: Vec<Knot>,
    },
}

impl MetricMap {
    /// Seal one value
    #[must_use]
    pub fn apply(&self, value: f64) -> SealedValue {
        match self {
            Self::Identity => SealedValue::Raw(value),
            Self::Bins { boundaries } => {
                let bin = boundaries.partition_point(|b| *b <= value);
                SealedValue::Bin(u32::try_from(bin).unwrap_or(u32::MAX))
            }
            Self::Perturb { knots } => SealedValue::Value(round6(interpolate(knots, value))),
        }
    }
}

fn round6(v: f64) -> f64 {
    (v * PERTURB_DECIMALS).round() / PERTURB_DECIMALS
}

fn interpolate(knots: &[Knot], value: f64) -> f64 {
    match knots {
        [] => value,
        [only] => only.y + (value - only.x),
        _ => {
            let idx = knots.partition_point(|k| k.x <= value);
            let i = idx.clamp(1, knots.len() - 1) - 1;
            let (left, right) = (knots[i], knots[i + 1]);
            let slope = (right.y - left.y) / (right.x - left.x);
            left.y + (value - left.x) * slope
        }
    }
}

/// Per-metric maps for one build
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NumericTable {
    policy: NumericPolicy,
    metrics: BTreeMap<String, MetricMap>,
}

impl NumericTable {
    /// Fit one map per metric name over every finite value in `records`
    #[must_use]
    pub fn fit(policy: &NumericPolicy, records: &[PaperRecord], stream: &SeedStream) -> Self {
        let mut observed: BTreeMap<String, Vec<f64>> = BTreeMap::new();
        for record in records {
            for (_, metric, value) in record.metrics() {
                if value.value.is_finite() {
                    observed.entry(metric.to_string()).or_default().push(value.value);
                }
            }
        }

        let metrics = observed
            .into_iter()
            .map(|(metric, mut values)| {
                values.sort_by(f64::total_cmp);
                let map = match *policy {
                    NumericPolicy::Identity => MetricMap::Identity,
                    NumericPolicy::Quantile { bins } => MetricMap::Bins {
                        boundaries: quantile_boundaries(&values, bins),
                    },
                    NumericPolicy::Perturb {
                        knots,
                        log_slope_sigma,
                    } => {
                        let mut rng = stream.rng("numeric perturb", &[metric.as_bytes()]);
                        MetricMap::Perturb {
                            knots: perturb_knots(&values, knots, log_slope_sigma, &mut rng),
                        }
                    }
                };
                (metric, map)
            })
            .collect();

        Self {
            policy: *policy,
            metrics,
        }
    }

    /// Policy the maps were fitted under
    #[inline]
    #[must_use]
    pub fn policy(&self) -> &NumericPolicy {
        &self.policy
    }

    /// Map for `metric`
    #[must_use]
    pub fn get(&self, metric: &str) -> Option<&MetricMap> {
        self.metrics.get(metric)
    }

    /// Seal a value under the map for `metric`; unknown metrics fall back to the policy default
    #[must_use]
    pub fn seal(&self, metric: &str, value: f64) -> SealedValue {
        match self.metrics.get(metric) {
            Some(map) => map.apply(value),
            None => match self.policy {
                NumericPolicy::Identity => SealedValue::Raw(value),
                NumericPolicy::Quantile { .. } => SealedValue::Bin(0),
                NumericPolicy::Perturb { .. } => SealedValue::Value(0.5),
            },
        }
    }

    /// Number of metric names
    #[must_use]
    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    /// No metrics were observed
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }
}

/// Inner quantile boundaries of sorted `values`, deduplicated
fn quantile_boundaries(sorted: &[f64], bins: u32) -> Vec<f64> {
    if sorted.is_empty() || bins < 2 {
        return Vec::new();
    }
    let last = (sorted.len() - 1) as f64;
    let mut boundaries: Vec<f64> = (1..bins)
        .map(|i| {
            let pos = last * f64::from(i) / f64::from(bins);
            let lo = pos.floor() as usize;
            let hi = pos.ceil() as usize;
            let frac = pos - pos.floor();
            sorted[lo] + (sorted[hi] - sorted[lo]) * frac
        })
        .collect();
    boundaries.dedup_by(|a, b| a <= b);
    boundaries
}

/// Seeded strictly increasing map over a padded observed range, rescaled to [0, 1]
fn perturb_knots<R: Rng>(sorted: &[f64], segments: usize, sigma: f64, rng: &mut R) -> Vec<Knot> {
    let (lo, hi) = match (sorted.first(), sorted.last()) {
        (Some(lo), Some(hi)) => (*lo, *hi),
        _ => (0.0, 1.0),
    };
    let span = hi - lo;
    let pad = if span > 0.0 {
        span * 0.1
    } else {
        lo.abs().max(1.0) * 0.1
    };
    let (a, b) = (lo - pad, hi + pad);
    let segments = segments.max(1);
    let step = (b - a) / segments as f64;

    let mut knots = Vec::with_capacity(segments + 1);
    let mut y = 0.0;
    knots.push(Knot { x: a, y });
    for i in 1..=segments {
        let slope = (sigma * rng.gen_range(-1.0..=1.0)).exp();
        y += slope * step;
        knots.push(Knot {
            x: a + step * i as f64,
            y,
        });
    }

    let top = y;
    for knot in &mut knots {
        knot.y /= top;
    }
    knots
}

/// A pair of values sealed against their raw order
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrderViolation {
    /// Position of the smaller raw value in the input
    pub lower_index: usize,
    /// Position of the larger raw value in the input
    pub higher_index: usize,
    /// Smaller raw value
    pub lower: f64,
    /// Larger raw value
    pub higher: f64,
    /// Sealed form of `lower`
    pub sealed_lower: SealedValue,
    /// Sealed form of `higher`
    pub sealed_higher: SealedValue,
}

/// Stateless numeric sealer
#[derive(Debug, Clone, Copy, Default)]
pub struct NumericSealer;

impl NumericSealer {
    /// Seal every value under one frozen map
    #[must_use]
    pub fn seal(values: &[f64], map: &MetricMap) -> Vec<SealedValue> {
        values.iter().map(|v| map.apply(*v)).collect()
    }

    /// Verify that sealing never inverted a pair
    ///
    /// # Errors
    /// Returns the first adjacent pair (in raw order) whose sealed values
    /// compare as greater or are incomparable
    pub fn check_order(raw: &[f64], sealed: &[SealedValue]) -> Result<(), OrderViolation> {
        let mut order: Vec<usize> = (0..raw.len().min(sealed.len())).collect();
        order.sort_by(|a, b| raw[*a].total_cmp(&raw[*b]));
        for pair in order.windows(2) {
            let (i, j) = (pair[0], pair[1]);
            let ordered = matches!(
                sealed[i].compare(&sealed[j]),
                Some(Ordering::Less | Ordering::Equal)
            );
            if !ordered {
                return Err(OrderViolation {
                    lower_index: i,
                    higher_index: j,
                    lower: raw[i],
                    higher: raw[j],
                    sealed_lower: sealed[i],
                    sealed_higher: sealed[j],
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use sealworld_core::Seed;

    fn records(values: &[f64]) -> Vec<PaperRecord> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| PaperRecord::new(format!("P_{i}").as_str()).with_metric("acc", *v))
            .collect()
    }

    fn table(policy: NumericPolicy, values: &[f64]) -> NumericTable {
        NumericTable::fit(&policy, &records(values), &SeedStream::new(Seed::new(42)))
    }

    #[test]
    fn scenario_values_keep_strict_order_under_perturbation() {
        let policy = NumericPolicy::Perturb {
            knots: 8,
            log_slope_sigma: 0.5,
        };
        let table = table(policy, &[0.91, 0.85]);
        let high = table.seal("acc", 0.91);
        let low = table.seal("acc", 0.85);
        assert!(low < high);
        assert!(matches!(high, SealedValue::Value(_)));
    }

    #[test]
    fn quantile_bins_collapse_but_never_invert() {
        let values = [0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8];
        let table = table(NumericPolicy::Quantile { bins: 4 }, &values);
        let sealed: Vec<SealedValue> = values.iter().map(|v| table.seal("acc", *v)).collect();
        assert_eq!(sealed.first(), Some(&SealedValue::Bin(0)));
        assert_eq!(sealed.last(), Some(&SealedValue::Bin(3)));
        assert!(NumericSealer::check_order(&values, &sealed).is_ok());
    }

    #[test]
    fn identical_values_produce_one_bin() {
        let table = table(NumericPolicy::Quantile { bins: 4 }, &[0.5, 0.5, 0.5]);
        assert_eq!(table.seal("acc", 0.5), table.seal("acc", 0.5));
    }

    #[test]
    fn identity_is_the_raw_baseline() {
        let table = table(NumericPolicy::Identity, &[0.91]);
        assert_eq!(table.seal("acc", 0.91), SealedValue::Raw(0.91));
    }

    #[test]
    fn perturbation_is_seed_dependent() {
        let policy = NumericPolicy::Perturb {
            knots: 8,
            log_slope_sigma: 0.5,
        };
        let data = records(&[0.1, 0.5, 0.9]);
        let a = NumericTable::fit(&policy, &data, &SeedStream::new(Seed::new(1)));
        let b = NumericTable::fit(&policy, &data, &SeedStream::new(Seed::new(2)));
        assert_ne!(a.seal("acc", 0.5), b.seal("acc", 0.5));
    }

    #[test]
    fn inverted_pair_is_reported() {
        let raw = [0.1, 0.2];
        let sealed = [SealedValue::Bin(2), SealedValue::Bin(1)];
        let violation = NumericSealer::check_order(&raw, &sealed).unwrap_err();
        assert!((violation.lower - 0.1).abs() < f64::EPSILON);
        assert_eq!((violation.lower_index, violation.higher_index), (0, 1));
    }

    proptest! {
        #[test]
        fn sealing_preserves_order(
            values in proptest::collection::vec(-1.0e3f64..1.0e3, 1..40),
            seed in 0u64..1000,
            quantile in any::<bool>(),
        ) {
            let policy = if quantile {
                NumericPolicy::Quantile { bins: 4 }
            } else {
                NumericPolicy::Perturb { knots: 8, log_slope_sigma: 0.5 }
            };
            let table = NumericTable::fit(&policy, &records(&values), &SeedStream::new(Seed::new(seed)));
            let map = table.get("acc").unwrap();
            let sealed = NumericSealer::seal(&values, map);
            prop_assert!(NumericSealer::check_order(&values, &sealed).is_ok());
        }
    }
}
