//! Sealed world builder
//!
//! One `build` call seals one `(track, subset, seed, level)` unit. Stages
//! run in a fixed order because each depends on the codebook:
//!
//! 1. input validation
//! 2. optional paraphrase
//! 3. vocabulary extraction and codebook generation
//! 4. lexical sealing of free text
//! 5. structural sealing of formula graphs
//! 6. numeric sealing per metric, with the order check
//! 7. manifest
//!
//! Every record passes the integrity gates or the whole build fails.

use crate::codebook::Codebook;
use crate::denylist::Denylist;
use crate::error::{IntegrityCheck, SealError};
use crate::knob::{DefenseKnobController, SealingConfig};
use crate::lexical::LexicalSealer;
use crate::manifest::{
    CodebookEntries, FieldCoverage, LexicalStats, Manifest, NumericStats, StructuralStats,
};
use crate::matcher::TermMatcher;
use crate::numeric::{NumericSealer, NumericTable};
use crate::paraphrase::Paraphraser;
use crate::structural::StructuralSealer;
use crate::vocabulary::{TermLexicon, VocabularyExtractor};
use sealworld_core::{
    io, BuildScope, ConfigError, ContentHash, FieldValue, MetricValue, PaperKey, PaperRecord,
    PublicSealedRecord, RecordMerkle, SealedField, SealedMetric, SeedStream,
};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

/// Public records, private codebook and manifest of one unit
#[derive(Debug, Clone)]
pub struct SealedWorld {
    /// Sealed records, sorted by key
    pub public: Vec<PublicSealedRecord>,
    /// Private codebook; never written with the public artifacts
    pub codebook: Codebook,
    /// Build manifest
    pub manifest: Manifest,
}

impl SealedWorld {
    /// Exact JSONL lines hashed into the manifest
    ///
    /// # Errors
    /// Returns the serializer error
    pub fn public_jsonl(&self) -> Result<Vec<Vec<u8>>, serde_json::Error> {
        io::to_jsonl_lines(&self.public)
    }

    /// Sealed record by key
    #[must_use]
    pub fn record(&self, key: &PaperKey) -> Option<&PublicSealedRecord> {
        self.public.iter().find(|r| &r.paper_key == key)
    }
}

/// Seals record sets under one configuration
#[derive(Clone)]
pub struct SealedWorldBuilder {
    config: SealingConfig,
    lexicon: TermLexicon,
    paraphraser: Option<Arc<dyn Paraphraser>>,
}

impl fmt::Debug for SealedWorldBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SealedWorldBuilder")
            .field("config", &self.config)
            .field("lexicon", &self.lexicon)
            .field("paraphraser", &self.paraphraser.is_some())
            .finish()
    }
}

impl SealedWorldBuilder {
    /// Builder with an explicit configuration
    #[must_use]
    pub fn new(config: SealingConfig) -> Self {
        Self {
            config,
            lexicon: TermLexicon::default(),
            paraphraser: None,
        }
    }

    /// Builder for a strength level
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidLevel`] outside the controller table
    pub fn for_level(level: u8) -> Result<Self, ConfigError> {
        DefenseKnobController::level_to_config(level).map(Self::new)
    }

    /// Known identifying terms
    #[must_use]
    pub fn with_lexicon(mut self, lexicon: TermLexicon) -> Self {
        self.lexicon = lexicon;
        self
    }

    /// Paraphrase free text before sealing
    #[must_use]
    pub fn with_paraphraser(mut self, paraphraser: impl Paraphraser + 'static) -> Self {
        self.paraphraser = Some(Arc::new(paraphraser));
        self
    }

    /// Shared paraphraser, for sweeps that build many units
    #[must_use]
    pub fn with_shared_paraphraser(mut self, paraphraser: Arc<dyn Paraphraser>) -> Self {
        self.paraphraser = Some(paraphraser);
        self
    }

    /// Active configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &SealingConfig {
        &self.config
    }

    /// Same lexicon and paraphraser under the configuration for `level`
    ///
    /// # Errors
    /// Returns [`SealError::Configuration`] for an unknown level, otherwise
    /// whatever [`build`](Self::build) returns
    pub fn build_level(
        &self,
        records: &[PaperRecord],
        scope: &BuildScope,
        level: u8,
    ) -> Result<SealedWorld, SealError> {
        let config = DefenseKnobController::level_to_config(level)
            .map_err(|e| SealError::config(scope, e))?;
        Self {
            config,
            ..self.clone()
        }
        .build(records, scope)
    }

    /// Seal `records` for `scope`
    ///
    /// # Errors
    /// - [`SealError::Configuration`] for invalid config or input records
    /// - [`SealError::Paraphrase`] if the paraphrase hook fails
    /// - [`SealError::Integrity`] if any record fails a post-seal gate
    pub fn build(
        &self,
        records: &[PaperRecord],
        scope: &BuildScope,
    ) -> Result<SealedWorld, SealError> {
        tracing::info!(
            "Building sealed world {} at level {} ({} records)",
            scope,
            self.config.level,
            records.len()
        );

        self.config
            .validate()
            .map_err(|e| SealError::config(scope, e))?;
        validate_records(records, scope).map_err(|e| SealError::config(scope, e))?;

        let texts = self.paraphrase(records, scope)?;

        let vocabulary =
            VocabularyExtractor::new(&self.config.lexical, &self.lexicon).extract(records, &texts);
        let numeric = NumericTable::fit(&self.config.numeric, records, &SeedStream::new(scope.seed));
        let mut codebook = if self.config.lexical.enabled {
            Codebook::generate(scope, &vocabulary.terms, &vocabulary.years)
                .map_err(|e| SealError::config(scope, e))?
        } else {
            Codebook::empty(scope)
        };
        if self.config.structural.relabel {
            codebook = codebook.with_symbols(
                records
                    .iter()
                    .flat_map(|r| r.formula_fields().flat_map(|(_, g)| g.labels())),
            );
        }
        let codebook = codebook.with_numeric(numeric);

        let mut order: Vec<usize> = (0..records.len()).collect();
        order.sort_by(|a, b| records[*a].paper_key.cmp(&records[*b].paper_key));

        let mut stats = BuildStats::default();
        let mut public = Vec::with_capacity(records.len());
        {
            let lexical = LexicalSealer::new(&self.config.lexical, &codebook);
            let structural = StructuralSealer::new(&self.config.structural, &codebook);
            let coverage = TermMatcher::from_terms(codebook.terms().map(|(t, _)| t), true);

            for &idx in &order {
                let record = &records[idx];
                gate_keys(record, scope)?;
                let metric_values: Vec<f64> = record.metrics().map(|(_, _, m)| m.value).collect();
                let mut fields = BTreeMap::new();
                for (name, value) in &record.fields {
                    let sealed = match value {
                        FieldValue::FreeText(raw) => {
                            let text = texts
                                .get(&(idx, name.clone()))
                                .map_or(raw.as_str(), String::as_str);
                            let outcome = lexical
                                .seal_with_metrics(text, &metric_values)
                                .map_err(|rejection| {
                                    integrity(
                                        scope,
                                        record,
                                        name,
                                        IntegrityCheck::DenylistSurvived,
                                        rejection.to_string(),
                                    )
                                })?;
                            gate_text(scope, record, name, &outcome.text)?;

                            stats
                                .coverage
                                .entry(name.clone())
                                .or_default()
                                .record(coverage.count(text), coverage.count(&outcome.text));
                            stats.lexical.substitutions += outcome.substitutions;
                            stats.lexical.quotes_stripped += outcome.quotes_stripped;
                            stats.lexical.numbers_redacted += outcome.numbers_redacted;
                            for class in &outcome.redactions {
                                *stats
                                    .lexical
                                    .redactions
                                    .entry(class.as_str().to_string())
                                    .or_insert(0) += 1;
                            }
                            SealedField::FreeText(outcome.text)
                        }
                        FieldValue::FormulaGraph(graph) => {
                            let context = format!("{}/{}", record.paper_key, name);
                            let outcome = structural.seal(graph, &context).map_err(|violation| {
                                integrity(scope, record, name, violation.check(), violation.to_string())
                            })?;
                            for label in outcome.graph.labels() {
                                gate_text(scope, record, name, label)?;
                            }
                            stats.structural.record(&outcome);
                            SealedField::FormulaGraph(outcome.graph)
                        }
                        FieldValue::NumericMetric(_) => SealedField::NumericMetric(BTreeMap::new()),
                        FieldValue::DependencyList(deps) => SealedField::DependencyList(deps.clone()),
                    };
                    fields.insert(name.clone(), sealed);
                }
                tracing::debug!("Sealed record {} ({} fields)", record.paper_key, fields.len());
                public.push(PublicSealedRecord {
                    paper_key: record.paper_key.clone(),
                    fields,
                });
            }
        }

        stats.numeric = seal_metrics(records, &order, &codebook, &mut public, scope)?;

        let manifest = self.manifest(scope, &public, &codebook, stats)?;
        for (field, cov) in &manifest.coverage {
            if !cov.is_complete() {
                tracing::warn!(
                    "Coverage below 1.0 in {} field {}: {} of {} identifying occurrences survived",
                    scope,
                    field,
                    cov.surviving,
                    cov.found
                );
            }
        }
        tracing::info!(
            "Sealed world {} built: {} records, root {}",
            scope,
            manifest.record_count,
            manifest.public_merkle_root.short()
        );

        Ok(SealedWorld {
            public,
            codebook,
            manifest,
        })
    }

    fn paraphrase(
        &self,
        records: &[PaperRecord],
        scope: &BuildScope,
    ) -> Result<BTreeMap<(usize, String), String>, SealError> {
        let mut texts = BTreeMap::new();
        let Some(paraphraser) = &self.paraphraser else {
            return Ok(texts);
        };
        for (idx, record) in records.iter().enumerate() {
            for (field, text) in record.text_fields() {
                let rewritten =
                    paraphraser
                        .paraphrase(field, text)
                        .map_err(|source| SealError::Paraphrase {
                            scope: scope.clone(),
                            paper_key: record.paper_key.clone(),
                            field: field.to_string(),
                            source,
                        })?;
                texts.insert((idx, field.to_string()), rewritten);
            }
        }
        Ok(texts)
    }

    fn manifest(
        &self,
        scope: &BuildScope,
        public: &[PublicSealedRecord],
        codebook: &Codebook,
        stats: BuildStats,
    ) -> Result<Manifest, SealError> {
        let hash_err = |e: &dyn fmt::Display| {
            SealError::config(scope, ConfigError::Parse(format!("hashing failed: {e}")))
        };

        let lines = io::to_jsonl_lines(public).map_err(|e| hash_err(&e))?;
        let mut bytes = Vec::new();
        for line in &lines {
            bytes.extend_from_slice(line);
            bytes.push(b'\n');
        }
        let leaves: Vec<ContentHash> = lines.iter().map(|l| RecordMerkle::leaf_for_line(l)).collect();

        let mut overall = FieldCoverage::default();
        for cov in stats.coverage.values() {
            overall.record(cov.found, cov.surviving);
        }
        let (years, symbols) = codebook.year_and_symbol_counts();

        Ok(Manifest {
            track: scope.track.clone(),
            subset: scope.subset.clone(),
            seed: scope.seed,
            level: self.config.level,
            config_hash: self
                .config
                .content_hash()
                .map_err(|e| SealError::config(scope, e))?,
            record_count: public.len(),
            public_records_hash: ContentHash::compute(&bytes),
            public_merkle_root: RecordMerkle::from_leaves(&leaves).root(),
            codebook_hash: codebook.content_hash().map_err(|e| hash_err(&e))?,
            codebook_entries: CodebookEntries {
                terms: codebook.len(),
                years,
                symbols,
                metrics: codebook.numeric().len(),
            },
            coverage: stats.coverage,
            overall_coverage: overall,
            lexical: stats.lexical,
            structural: stats.structural,
            numeric: stats.numeric,
            generator: format!("sealworld-seal {}", crate::VERSION),
        })
    }
}

#[derive(Debug, Default)]
struct BuildStats {
    coverage: BTreeMap<String, FieldCoverage>,
    lexical: LexicalStats,
    structural: StructuralStats,
    numeric: NumericStats,
}

fn integrity(
    scope: &BuildScope,
    record: &PaperRecord,
    field: &str,
    check: IntegrityCheck,
    detail: String,
) -> SealError {
    SealError::Integrity {
        scope: scope.clone(),
        paper_key: record.paper_key.clone(),
        field: field.to_string(),
        check,
        detail,
    }
}

fn gate_text(
    scope: &BuildScope,
    record: &PaperRecord,
    field: &str,
    text: &str,
) -> Result<(), SealError> {
    match Denylist::standard().scan(text).first() {
        None => Ok(()),
        Some(hit) => Err(integrity(
            scope,
            record,
            field,
            IntegrityCheck::DenylistSurvived,
            format!("{} pattern at byte {}", hit.class, hit.span.start),
        )),
    }
}

/// Keys travel verbatim, so they must already be clean
fn gate_keys(record: &PaperRecord, scope: &BuildScope) -> Result<(), SealError> {
    gate_text(scope, record, "paper_key", record.paper_key.as_str())?;
    for dep in record.dependencies() {
        gate_text(scope, record, "dependencies", dep.as_str())?;
    }
    Ok(())
}

/// Seal every metric name in one pass so the order check sees all values
fn seal_metrics(
    records: &[PaperRecord],
    order: &[usize],
    codebook: &Codebook,
    public: &mut [PublicSealedRecord],
    scope: &BuildScope,
) -> Result<NumericStats, SealError> {
    let mut by_metric: BTreeMap<&str, Vec<(usize, &str, MetricValue)>> = BTreeMap::new();
    for (pos, idx) in order.iter().enumerate() {
        for (field, metric, value) in records[*idx].metrics() {
            by_metric.entry(metric).or_default().push((pos, field, value));
        }
    }

    let mut stats = NumericStats {
        policy: codebook.numeric().policy().name().to_string(),
        metrics: by_metric.len(),
        values: 0,
    };

    for (metric, entries) in by_metric {
        let raw: Vec<f64> = entries.iter().map(|(_, _, v)| v.value).collect();
        let sealed = match codebook.numeric().get(metric) {
            Some(map) => NumericSealer::seal(&raw, map),
            None => raw.iter().map(|v| codebook.numeric().seal(metric, *v)).collect(),
        };

        if let Err(violation) = NumericSealer::check_order(&raw, &sealed) {
            let (pos, field, _) = entries[violation.higher_index];
            let record = &records[order[pos]];
            return Err(integrity(
                scope,
                record,
                field,
                IntegrityCheck::OrderInverted,
                format!(
                    "{metric}: {} < {} sealed to {:?} / {:?}",
                    violation.lower, violation.higher, violation.sealed_lower, violation.sealed_higher
                ),
            ));
        }

        for ((pos, field, value), sealed) in entries.into_iter().zip(sealed) {
            if let Some(SealedField::NumericMetric(table)) = public[pos].fields.get_mut(field) {
                table.insert(
                    metric.to_string(),
                    SealedMetric {
                        sealed,
                        higher_is_better: value.higher_is_better,
                    },
                );
                stats.values += 1;
            }
        }
    }
    Ok(stats)
}

/// Non-empty, unique keys, closed dependencies, finite metrics, valid graphs
///
/// # Errors
/// Returns the first failing [`ConfigError`]
pub fn validate_records(records: &[PaperRecord], scope: &BuildScope) -> Result<(), ConfigError> {
    if records.is_empty() {
        return Err(ConfigError::EmptyRecordSet);
    }

    let mut keys: BTreeSet<&PaperKey> = BTreeSet::new();
    for record in records {
        if !keys.insert(&record.paper_key) {
            return Err(ConfigError::DuplicateKey(record.paper_key.to_string()));
        }
    }

    for record in records {
        for dep in record.dependencies() {
            if !keys.contains(dep) && !scope.prior_keys.contains(dep) {
                return Err(ConfigError::DanglingDependency {
                    paper_key: record.paper_key.to_string(),
                    dependency: dep.to_string(),
                });
            }
        }
        for (_, metric, value) in record.metrics() {
            if !value.value.is_finite() {
                return Err(ConfigError::MalformedRecord(format!(
                    "record {}: metric {metric} is not finite",
                    record.paper_key
                )));
            }
        }
        for (field, graph) in record.formula_fields() {
            graph.validate(field)?;
        }
    }
    Ok(())
}
