//! Build manifest
//!
//! Everything a reader needs to reproduce or audit one sealed world without
//! seeing the codebook: scope, level, content hashes and coverage numbers.

use crate::structural::{SemanticCheck, StructuralOutcome};
use sealworld_core::{ContentHash, Seed};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Identifying-token coverage for one field name
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FieldCoverage {
    /// Known identifying occurrences before sealing
    pub found: usize,
    /// Occurrences still present after sealing
    pub surviving: usize,
    /// `1 - surviving / found`, 1.0 when nothing was found
    pub fraction: f64,
}

impl FieldCoverage {
    /// Accumulate one text
    pub fn record(&mut self, found: usize, surviving: usize) {
        self.found += found;
        self.surviving += surviving.min(found);
        self.fraction = if self.found == 0 {
            1.0
        } else {
            1.0 - self.surviving as f64 / self.found as f64
        };
    }

    /// Every known occurrence was substituted
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.surviving == 0
    }
}

/// Free-text sealing totals
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LexicalStats {
    /// Term and year substitutions
    pub substitutions: usize,
    /// Quotations stripped
    pub quotes_stripped: usize,
    /// Numbers redacted
    pub numbers_redacted: usize,
    /// Denylist redactions by class
    pub redactions: BTreeMap<String, usize>,
}

/// Formula sealing totals
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuralStats {
    /// Graphs sealed
    pub graphs: usize,
    /// Graphs whose canonical form was verified
    pub semantic_verified: usize,
    /// Cyclic graphs checked on topology only
    pub topology_only: usize,
    /// Associative regroupings
    pub regrouped: usize,
    /// Commutative nodes reordered
    pub reordered: usize,
}

impl StructuralStats {
    /// Accumulate one sealed graph
    pub fn record(&mut self, outcome: &StructuralOutcome) {
        self.graphs += 1;
        self.regrouped += outcome.regrouped;
        self.reordered += outcome.reordered;
        match outcome.semantic {
            SemanticCheck::Verified => self.semantic_verified += 1,
            SemanticCheck::SkippedCyclic => self.topology_only += 1,
            SemanticCheck::NotRequired => {}
        }
    }
}

/// Numeric sealing totals
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumericStats {
    /// Policy name
    pub policy: String,
    /// Distinct metric names
    pub metrics: usize,
    /// Values sealed
    pub values: usize,
}

/// Codebook sizes; the entries themselves stay private
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodebookEntries {
    /// Term entries
    pub terms: usize,
    /// Year entries
    pub years: usize,
    /// Formula symbol entries
    pub symbols: usize,
    /// Numeric maps
    pub metrics: usize,
}

/// `manifest.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// Research track
    pub track: String,
    /// Subset within the track
    pub subset: String,
    /// Sealing seed
    pub seed: Seed,
    /// Strength level
    pub level: u8,
    /// Hash of the sealing configuration
    pub config_hash: ContentHash,
    /// Number of public records
    pub record_count: usize,
    /// Hash of the exact `public_records.jsonl` bytes
    pub public_records_hash: ContentHash,
    /// Merkle root over the JSONL lines
    pub public_merkle_root: ContentHash,
    /// Hash of the private codebook
    pub codebook_hash: ContentHash,
    /// Codebook sizes
    pub codebook_entries: CodebookEntries,
    /// Coverage by free-text field name
    pub coverage: BTreeMap<String, FieldCoverage>,
    /// Coverage across all fields
    pub overall_coverage: FieldCoverage,
    /// Free-text totals
    pub lexical: LexicalStats,
    /// Formula totals
    pub structural: StructuralStats,
    /// Numeric totals
    pub numeric: NumericStats,
    /// Producing crate and version
    pub generator: String,
}

impl Manifest {
    /// `track/subset@seed=N`
    #[must_use]
    pub fn unit_id(&self) -> String {
        format!("{}/{}@seed={}", self.track, self.subset, self.seed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coverage_fraction_tracks_survivors() {
        let mut cov = FieldCoverage::default();
        cov.record(0, 0);
        assert!((cov.fraction - 1.0).abs() < f64::EPSILON);
        cov.record(4, 1);
        assert!((cov.fraction - 0.75).abs() < 1e-12);
        assert!(!cov.is_complete());
    }

    #[test]
    fn structural_stats_count_check_kinds() {
        let mut stats = StructuralStats::default();
        let outcome = StructuralOutcome {
            graph: sealworld_core::FormulaGraph::default(),
            regrouped: 1,
            reordered: 2,
            semantic: SemanticCheck::SkippedCyclic,
        };
        stats.record(&outcome);
        assert_eq!(stats.topology_only, 1);
        assert_eq!(stats.regrouped, 1);
        assert_eq!(stats.reordered, 2);
    }
}
