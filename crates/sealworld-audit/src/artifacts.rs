//! Public artifact writer
//!
//! Layout under the root directory:
//!
//! ```text
//! <track>/seed-<seed>/<variant>/public_records.jsonl
//! <track>/seed-<seed>/<variant>/manifest.json
//! <track>/seed-<seed>/<variant>/<threat_model>/budget-<budget>/attack_report.json
//! <track>/<threat_model>/tradeoff_curve.json
//! ```
//!
//! The writer takes public types only; no method accepts a codebook.

use crate::attack::AttackReport;
use crate::error::{AuditError, Result};
use crate::reporter::TradeoffCurve;
use crate::sweep::{SweepOutcome, UnitOutcome};
use sealworld_core::{io, PublicSealedRecord, Seed};
use sealworld_seal::Manifest;
use std::path::{Path, PathBuf};

/// Public records file name
pub const PUBLIC_RECORDS_FILE: &str = "public_records.jsonl";
/// Manifest file name
pub const MANIFEST_FILE: &str = "manifest.json";
/// Attack report file name
pub const ATTACK_REPORT_FILE: &str = "attack_report.json";
/// Tradeoff curve file name
pub const TRADEOFF_CURVE_FILE: &str = "tradeoff_curve.json";

/// Writes public artifacts below one root
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    root: PathBuf,
}

impl ArtifactWriter {
    /// Writer rooted at `root`, created if missing
    ///
    /// # Errors
    /// Returns [`AuditError::Io`] if the directory cannot be created
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        create_dir(&root)?;
        Ok(Self { root })
    }

    /// Root directory
    #[inline]
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of one sealed unit
    #[must_use]
    pub fn unit_dir(&self, track: &str, seed: Seed, variant: &str) -> PathBuf {
        self.root
            .join(track)
            .join(format!("seed-{seed}"))
            .join(variant)
    }

    /// Write `public_records.jsonl`
    ///
    /// # Errors
    /// Serialization or filesystem errors
    pub fn write_public_records(
        &self,
        dir: &Path,
        records: &[PublicSealedRecord],
    ) -> Result<PathBuf> {
        create_dir(dir)?;
        let path = dir.join(PUBLIC_RECORDS_FILE);
        io::write_lines(&path, &io::to_jsonl_lines(records)?)?;
        Ok(path)
    }

    /// Write `manifest.json`
    ///
    /// # Errors
    /// Serialization or filesystem errors
    pub fn write_manifest(&self, dir: &Path, manifest: &Manifest) -> Result<PathBuf> {
        create_dir(dir)?;
        let path = dir.join(MANIFEST_FILE);
        io::write_json(&path, manifest)?;
        Ok(path)
    }

    /// Write `attack_report.json` at the path its fields name
    ///
    /// # Errors
    /// Serialization or filesystem errors
    pub fn write_attack_report(&self, report: &AttackReport) -> Result<PathBuf> {
        let dir = self
            .unit_dir(&report.track, report.seed, &report.variant)
            .join(report.threat_model.as_str())
            .join(format!("budget-{}", report.budget));
        create_dir(&dir)?;
        let path = dir.join(ATTACK_REPORT_FILE);
        io::write_json(&path, report)?;
        Ok(path)
    }

    /// Write `tradeoff_curve.json` as the ordered point list
    ///
    /// # Errors
    /// Serialization or filesystem errors
    pub fn write_curve(&self, curve: &TradeoffCurve) -> Result<PathBuf> {
        let dir = self.root.join(&curve.track).join(curve.threat_model.as_str());
        create_dir(&dir)?;
        let path = dir.join(TRADEOFF_CURVE_FILE);
        io::write_json(&path, &curve.points)?;
        Ok(path)
    }

    /// Every artifact of one unit
    ///
    /// # Errors
    /// Serialization or filesystem errors
    pub fn write_unit(&self, track: &str, unit: &UnitOutcome) -> Result<Vec<PathBuf>> {
        let dir = self.unit_dir(track, unit.unit.seed, &unit.unit.variant());
        let mut written = vec![
            self.write_public_records(&dir, &unit.public)?,
            self.write_manifest(&dir, &unit.manifest)?,
        ];
        for report in &unit.reports {
            written.push(self.write_attack_report(report)?);
        }
        Ok(written)
    }

    /// Every artifact of a sweep
    ///
    /// # Errors
    /// Serialization or filesystem errors
    pub fn write_sweep(&self, track: &str, outcome: &SweepOutcome) -> Result<Vec<PathBuf>> {
        let mut written = Vec::new();
        for unit in &outcome.units {
            written.extend(self.write_unit(track, unit)?);
        }
        for curve in &outcome.curves {
            written.push(self.write_curve(curve)?);
        }
        tracing::info!(
            "Wrote {} artifacts under {}",
            written.len(),
            self.root.display()
        );
        Ok(written)
    }
}

fn create_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).map_err(|source| AuditError::Io {
        path: dir.to_path_buf(),
        source,
    })
}
