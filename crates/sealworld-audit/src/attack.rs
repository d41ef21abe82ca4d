//! Adversarial attacks on a sealed corpus
//!
//! One [`AttackRun`] walks `Setup → Observe → Query* → Score → Done`:
//!
//! - **Setup** fixes the threat model, the budget and [`AttackConfig`]
//! - **Observe** indexes the sealed corpus; a white-box attacker first
//!   de-seals it with the codebook
//! - **Query** issues probes in a seeded order, one budget unit each
//! - **Score** turns hit counts into rates over the full probe population
//!
//! Rates divide by the population rather than the probes issued, so they
//! never decrease as the budget grows and are exactly zero at budget 0.

use crate::error::{AuditError, Result};
use crate::index::{RetrievalHit, RetrievalIndex};
use rand::seq::SliceRandom;
use rayon::prelude::*;
use sealworld_core::{
    ConfigError, PaperKey, PaperRecord, PublicSealedRecord, SealedValue, Seed, SeedStream,
};
use sealworld_seal::text::lowercase_tokens;
use sealworld_seal::{Codebook, TermMatcher};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{self, Display, Formatter};

/// Budgets swept by [`AttackEngine::run_adaptive`] when none are given
pub const DEFAULT_BUDGETS: &[usize] = &[8, 16, 32, 64, 128];

/// Phase of an attack run
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttackPhase {
    /// Threat model and budget fixed
    Setup,
    /// Corpus indexed
    Observe,
    /// Probes issued
    Query,
    /// Metrics computed
    Score,
    /// Terminal
    Done,
}

impl Display for AttackPhase {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Setup => "setup",
            Self::Observe => "observe",
            Self::Query => "query",
            Self::Score => "score",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// Phases reachable from `from`
#[must_use]
pub fn allowed_transitions(from: AttackPhase) -> &'static [AttackPhase] {
    use AttackPhase::*;
    match from {
        Setup => &[Observe],
        Observe => &[Query, Score],
        Query => &[Score],
        Score => &[Done],
        Done => &[],
    }
}

/// Check one transition against the table
///
/// # Errors
/// Returns [`AuditError::InvalidTransition`] for anything not in the table
pub fn validate_transition(from: AttackPhase, to: AttackPhase) -> Result<()> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(AuditError::InvalidTransition { from, to })
    }
}

/// Information available to the attacker
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreatModel {
    /// Public sealed records only
    BlackBox,
    /// Public records plus the private codebook
    WhiteBox,
}

impl ThreatModel {
    /// Both models
    pub const ALL: [Self; 2] = [Self::BlackBox, Self::WhiteBox];

    /// Snake-case name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BlackBox => "black_box",
            Self::WhiteBox => "white_box",
        }
    }
}

impl Display for ThreatModel {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Threat model with its privileged material
///
/// The codebook is borrowed for the run only; nothing here can persist it.
#[derive(Debug, Clone, Copy)]
pub enum ThreatSetup<'a> {
    /// Public sealed records only
    BlackBox,
    /// Public records plus the unit's codebook
    WhiteBox(&'a Codebook),
}

impl ThreatSetup<'_> {
    /// Model tag
    #[must_use]
    pub fn model(&self) -> ThreatModel {
        match self {
            Self::BlackBox => ThreatModel::BlackBox,
            Self::WhiteBox(_) => ThreatModel::WhiteBox,
        }
    }
}

/// Attack parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttackConfig {
    /// Retrieval depth for top-k hits
    pub top_k: usize,
    /// Weight of the top-1 re-identification rate in the leakage score
    pub retrieval_weight: f64,
    /// Weight of the term recovery rate in the leakage score
    pub term_weight: f64,
    /// Seed for probe order
    pub probe_seed: Seed,
}

impl Default for AttackConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            retrieval_weight: 0.5,
            term_weight: 0.5,
            probe_seed: Seed::new(0),
        }
    }
}

impl AttackConfig {
    /// Check ranges
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidParameter`] naming the field
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.top_k == 0 {
            return Err(ConfigError::InvalidParameter {
                name: "top_k",
                reason: "must be at least 1".into(),
            });
        }
        for (name, w) in [
            ("retrieval_weight", self.retrieval_weight),
            ("term_weight", self.term_weight),
        ] {
            if !w.is_finite() || w < 0.0 {
                return Err(ConfigError::InvalidParameter {
                    name,
                    reason: format!("{w} is not a finite non-negative weight"),
                });
            }
        }
        if self.retrieval_weight + self.term_weight <= 0.0 {
            return Err(ConfigError::InvalidParameter {
                name: "term_weight",
                reason: "weights sum to zero".into(),
            });
        }
        Ok(())
    }
}

/// What the attacker knows about the real world
#[derive(Debug, Clone, Copy)]
pub struct AttackTargets<'a> {
    /// Real records to re-identify among the sealed ones
    pub held_out: &'a [PaperRecord],
    /// Real identifying terms to recover
    pub known_terms: &'a [String],
}

/// How the query loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryStatus {
    /// No query phase ran
    NotStarted,
    /// Budget spent before the probes ran out
    BudgetExhausted,
    /// Every probe issued
    ProbesExhausted,
}

/// Scored outcome of one run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AttackMetrics {
    /// Re-identification probes whose best match is the true record
    pub top1_hit_rate: f64,
    /// Re-identification probes with the true record in the top k
    pub topk_hit_rate: f64,
    /// Known terms recovered
    pub term_recovery_rate: f64,
    /// Weighted combination of top-1 and term recovery rates
    pub leakage_score: f64,
    /// Probes issued
    pub queries_issued: usize,
    /// Re-identification probe population
    pub reid_probes: usize,
    /// Term probe population
    pub term_probes: usize,
    /// Loop termination
    pub status: QueryStatus,
}

#[derive(Debug, Clone, Copy)]
enum Probe<'a> {
    Reidentify(&'a PaperRecord),
    Term(&'a str),
}

#[derive(Debug, Default)]
struct Tally {
    top1: usize,
    topk: usize,
    terms: usize,
}

/// State of one attack run
pub struct AttackRun<'a> {
    phase: AttackPhase,
    threat: ThreatSetup<'a>,
    budget: usize,
    config: AttackConfig,
    index: RetrievalIndex,
    corpus_text: Vec<String>,
    sealed_vocabulary: BTreeSet<String>,
    probes: Vec<Probe<'a>>,
    reid_population: usize,
    term_population: usize,
    issued: usize,
    tally: Tally,
    status: QueryStatus,
    metrics: Option<AttackMetrics>,
}

impl fmt::Debug for AttackRun<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttackRun")
            .field("phase", &self.phase)
            .field("threat", &self.threat.model())
            .field("budget", &self.budget)
            .field("issued", &self.issued)
            .field("status", &self.status)
            .finish()
    }
}

impl<'a> AttackRun<'a> {
    /// Run in `Setup`
    #[must_use]
    pub fn new(threat: ThreatSetup<'a>, budget: usize, config: AttackConfig) -> Self {
        Self {
            phase: AttackPhase::Setup,
            threat,
            budget,
            config,
            index: RetrievalIndex::default(),
            corpus_text: Vec::new(),
            sealed_vocabulary: BTreeSet::new(),
            probes: Vec::new(),
            reid_population: 0,
            term_population: 0,
            issued: 0,
            tally: Tally::default(),
            status: QueryStatus::NotStarted,
            metrics: None,
        }
    }

    /// Current phase
    #[inline]
    #[must_use]
    pub fn phase(&self) -> AttackPhase {
        self.phase
    }

    /// Threat model of this run
    #[inline]
    #[must_use]
    pub fn threat_model(&self) -> ThreatModel {
        self.threat.model()
    }

    fn advance(&mut self, to: AttackPhase) -> Result<()> {
        validate_transition(self.phase, to)?;
        self.phase = to;
        Ok(())
    }

    /// Index the sealed corpus and queue the probes
    ///
    /// # Errors
    /// Invalid transition or invalid [`AttackConfig`]
    pub fn observe(
        &mut self,
        corpus: &[PublicSealedRecord],
        targets: &AttackTargets<'a>,
    ) -> Result<()> {
        self.config.validate()?;
        self.advance(AttackPhase::Observe)?;

        let deseal = match self.threat {
            ThreatSetup::BlackBox => None,
            ThreatSetup::WhiteBox(codebook) => Some(Deseal::new(codebook)),
        };
        self.index = RetrievalIndex::build(
            corpus
                .iter()
                .map(|r| (r.paper_key.clone(), sealed_tokens(r, deseal.as_ref()))),
        );
        for record in corpus {
            for (_, text) in record.text_fields() {
                self.sealed_vocabulary.extend(lowercase_tokens(text));
                self.corpus_text.push(text.to_string());
            }
            for (_, graph) in record.formula_fields() {
                self.corpus_text.extend(graph.labels().map(str::to_string));
            }
        }

        let held_out: &'a [PaperRecord] = targets.held_out;
        let known_terms: &'a [String] = targets.known_terms;
        self.reid_population = held_out.len();
        self.term_population = known_terms.len();
        self.probes = held_out
            .iter()
            .map(Probe::Reidentify)
            .chain(known_terms.iter().map(|t| Probe::Term(t.as_str())))
            .collect();
        let mut rng = SeedStream::new(self.config.probe_seed).rng("attack probes", &[]);
        self.probes.shuffle(&mut rng);

        tracing::debug!(
            "Observed {} sealed records ({} index tokens), {} probes queued",
            self.index.len(),
            self.index.vocabulary().count(),
            self.probes.len()
        );
        Ok(())
    }

    /// Issue probes until the budget or the probes run out
    ///
    /// # Errors
    /// Invalid transition
    pub fn query(&mut self) -> Result<QueryStatus> {
        self.advance(AttackPhase::Query)?;

        while self.issued < self.budget && self.issued < self.probes.len() {
            let probe = self.probes[self.issued];
            self.issued += 1;
            match probe {
                Probe::Reidentify(record) => {
                    let query = probe_tokens(record, &self.threat);
                    let hits = self.index.search(&query, self.config.top_k);
                    if is_unique_top(&hits, &record.paper_key) {
                        self.tally.top1 += 1;
                    }
                    if hits.iter().any(|h| h.key == record.paper_key) {
                        self.tally.topk += 1;
                    }
                }
                Probe::Term(term) => {
                    if self.recovers(term) {
                        self.tally.terms += 1;
                    }
                }
            }
        }

        self.status = if self.issued == self.probes.len() {
            QueryStatus::ProbesExhausted
        } else {
            QueryStatus::BudgetExhausted
        };
        tracing::debug!(
            "Query loop ended after {} of {} probes: {:?}",
            self.issued,
            self.probes.len(),
            self.status
        );
        Ok(self.status)
    }

    fn recovers(&self, term: &str) -> bool {
        let matcher = TermMatcher::from_terms([term], true);
        if self.corpus_text.iter().any(|text| matcher.count(text) > 0) {
            return true;
        }
        match self.threat {
            ThreatSetup::BlackBox => false,
            ThreatSetup::WhiteBox(codebook) => codebook
                .lookup(term)
                .is_some_and(|p| self.sealed_vocabulary.contains(&p.to_lowercase())),
        }
    }

    /// Compute rates from the hits so far
    ///
    /// # Errors
    /// Invalid transition
    pub fn score(&mut self) -> Result<AttackMetrics> {
        self.advance(AttackPhase::Score)?;

        let rate = |hits: usize, population: usize| {
            if population == 0 {
                0.0
            } else {
                hits as f64 / population as f64
            }
        };
        let top1_hit_rate = rate(self.tally.top1, self.reid_population);
        let term_recovery_rate = rate(self.tally.terms, self.term_population);

        let rw = if self.reid_population > 0 {
            self.config.retrieval_weight
        } else {
            0.0
        };
        let tw = if self.term_population > 0 {
            self.config.term_weight
        } else {
            0.0
        };
        let leakage_score = if rw + tw > 0.0 {
            (rw * top1_hit_rate + tw * term_recovery_rate) / (rw + tw)
        } else {
            0.0
        };

        let metrics = AttackMetrics {
            top1_hit_rate,
            topk_hit_rate: rate(self.tally.topk, self.reid_population),
            term_recovery_rate,
            leakage_score,
            queries_issued: self.issued,
            reid_probes: self.reid_population,
            term_probes: self.term_population,
            status: self.status,
        };
        self.metrics = Some(metrics);
        Ok(metrics)
    }

    /// Close the run
    ///
    /// # Errors
    /// Invalid transition
    pub fn finish(&mut self) -> Result<AttackMetrics> {
        let from = self.phase;
        self.advance(AttackPhase::Done)?;
        self.metrics.ok_or(AuditError::InvalidTransition {
            from,
            to: AttackPhase::Done,
        })
    }
}

/// Pseudonym / era / symbol → real tokens
struct Deseal {
    inverse: BTreeMap<String, Vec<String>>,
}

impl Deseal {
    fn new(codebook: &Codebook) -> Self {
        let inverse = codebook
            .invert()
            .into_iter()
            .map(|(sealed, real)| (sealed.to_lowercase(), lowercase_tokens(&real)))
            .collect();
        Self { inverse }
    }

    fn push(&self, token: String, out: &mut Vec<String>) {
        match self.inverse.get(&token) {
            Some(real) => out.extend(real.iter().cloned()),
            None => out.push(token),
        }
    }
}

fn push_token(token: String, deseal: Option<&Deseal>, out: &mut Vec<String>) {
    match deseal {
        Some(d) => d.push(token, out),
        None => out.push(token),
    }
}

fn metric_token(metric: &str, value: &SealedValue) -> String {
    format!("{metric}={}", value.token())
}

/// Index tokens of a sealed record
fn sealed_tokens(record: &PublicSealedRecord, deseal: Option<&Deseal>) -> Vec<String> {
    let mut tokens = Vec::new();
    for (_, text) in record.text_fields() {
        for token in lowercase_tokens(text) {
            push_token(token, deseal, &mut tokens);
        }
    }
    for (_, graph) in record.formula_fields() {
        for node in &graph.nodes {
            tokens.push(format!("op:{}", node.op));
            for token in lowercase_tokens(&node.label) {
                push_token(token, deseal, &mut tokens);
            }
        }
    }
    for (_, metric, value) in record.metrics() {
        tokens.push(metric_token(metric, &value.sealed));
    }
    tokens
}

/// `key` ranks first with a score strictly above the runner-up
fn is_unique_top(hits: &[RetrievalHit], key: &PaperKey) -> bool {
    match hits {
        [first, rest @ ..] => {
            first.key == *key && !rest.first().is_some_and(|second| second.score >= first.score)
        }
        [] => false,
    }
}

/// Query tokens the attacker derives from a real record
fn probe_tokens(record: &PaperRecord, threat: &ThreatSetup<'_>) -> Vec<String> {
    let mut tokens = Vec::new();
    for (_, text) in record.text_fields() {
        tokens.extend(lowercase_tokens(text));
    }
    for (_, graph) in record.formula_fields() {
        for node in &graph.nodes {
            tokens.push(format!("op:{}", node.op));
            tokens.extend(lowercase_tokens(&node.label));
        }
    }
    for (_, metric, value) in record.metrics() {
        let guess = match threat {
            ThreatSetup::BlackBox => SealedValue::Raw(value.value),
            ThreatSetup::WhiteBox(codebook) => codebook.numeric().seal(metric, value.value),
        };
        tokens.push(metric_token(metric, &guess));
    }
    tokens
}

/// Metrics at one budget
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BudgetPoint {
    /// Probe budget
    pub budget: usize,
    /// Metrics at that budget
    pub metrics: AttackMetrics,
}

/// Budget-vs-leakage curve of the adaptive attacker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetCurve {
    /// Threat model
    pub threat_model: ThreatModel,
    /// Points in ascending budget order
    pub points: Vec<BudgetPoint>,
}

impl BudgetCurve {
    /// Top-1 and leakage never decrease along the curve
    #[must_use]
    pub fn is_monotone(&self) -> bool {
        self.points.windows(2).all(|w| {
            w[1].metrics.top1_hit_rate >= w[0].metrics.top1_hit_rate
                && w[1].metrics.leakage_score >= w[0].metrics.leakage_score
        })
    }

    /// Highest leakage on the curve
    #[must_use]
    pub fn max_leakage(&self) -> f64 {
        self.points
            .iter()
            .map(|p| p.metrics.leakage_score)
            .fold(0.0, f64::max)
    }
}

/// Runs attacks against one sealed corpus
#[derive(Debug, Clone, Copy)]
pub struct AttackEngine<'a> {
    corpus: &'a [PublicSealedRecord],
    targets: AttackTargets<'a>,
    threat: ThreatSetup<'a>,
    config: AttackConfig,
}

impl<'a> AttackEngine<'a> {
    /// Engine over `corpus`
    ///
    /// # Errors
    /// Returns [`AuditError::Config`] for an invalid [`AttackConfig`]
    pub fn new(
        corpus: &'a [PublicSealedRecord],
        targets: AttackTargets<'a>,
        threat: ThreatSetup<'a>,
        config: AttackConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            corpus,
            targets,
            threat,
            config,
        })
    }

    /// One full run at `budget`
    ///
    /// # Errors
    /// Propagates run errors; none occur when the phases are driven in order
    pub fn run(&self, budget: usize) -> Result<AttackMetrics> {
        tracing::info!(
            "Attack run: {} at budget {} over {} records",
            self.threat.model(),
            budget,
            self.corpus.len()
        );
        let mut run = AttackRun::new(self.threat, budget, self.config);
        run.observe(self.corpus, &self.targets)?;
        run.query()?;
        run.score()?;
        let metrics = run.finish()?;
        tracing::info!(
            "Attack run {} at budget {}: top1 {:.3}, terms {:.3}, leakage {:.3}",
            self.threat.model(),
            budget,
            metrics.top1_hit_rate,
            metrics.term_recovery_rate,
            metrics.leakage_score
        );
        Ok(metrics)
    }

    /// Independent runs over a sorted, deduplicated budget sweep
    ///
    /// An empty `budgets` slice sweeps [`DEFAULT_BUDGETS`].
    ///
    /// # Errors
    /// Propagates the first failing run
    pub fn run_adaptive(&self, budgets: &[usize]) -> Result<BudgetCurve> {
        let mut sweep: Vec<usize> = if budgets.is_empty() {
            DEFAULT_BUDGETS.to_vec()
        } else {
            budgets.to_vec()
        };
        sweep.sort_unstable();
        sweep.dedup();

        let points = sweep
            .par_iter()
            .map(|&budget| self.run(budget).map(|metrics| BudgetPoint { budget, metrics }))
            .collect::<Result<Vec<_>>>()?;
        Ok(BudgetCurve {
            threat_model: self.threat.model(),
            points,
        })
    }
}

/// `attack_report.json` contents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttackReport {
    /// Research track
    pub track: String,
    /// Sealing seed
    pub seed: Seed,
    /// Sealing variant, e.g. `level-2`
    pub variant: String,
    /// Threat model
    pub threat_model: ThreatModel,
    /// Budget of the headline run
    pub budget: usize,
    /// Black-box metrics
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub black_box: Option<AttackMetrics>,
    /// White-box metrics
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub white_box: Option<AttackMetrics>,
    /// Adaptive sweep, when run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget_curve: Option<BudgetCurve>,
}

impl AttackReport {
    /// Report for one headline run
    #[must_use]
    pub fn new(
        track: impl Into<String>,
        seed: Seed,
        variant: impl Into<String>,
        threat_model: ThreatModel,
        budget: usize,
        metrics: AttackMetrics,
    ) -> Self {
        let (black_box, white_box) = match threat_model {
            ThreatModel::BlackBox => (Some(metrics), None),
            ThreatModel::WhiteBox => (None, Some(metrics)),
        };
        Self {
            track: track.into(),
            seed,
            variant: variant.into(),
            threat_model,
            budget,
            black_box,
            white_box,
            budget_curve: None,
        }
    }

    /// Attach the adaptive sweep
    #[must_use]
    pub fn with_curve(mut self, curve: BudgetCurve) -> Self {
        self.budget_curve = Some(curve);
        self
    }

    /// Headline metrics
    #[must_use]
    pub fn metrics(&self) -> Option<&AttackMetrics> {
        self.black_box.as_ref().or(self.white_box.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sealworld_seal::SealedWorldBuilder;
    use sealworld_test_utils::{scope, vision_corpus, VISION_TERMS};

    fn terms() -> Vec<String> {
        VISION_TERMS.iter().map(|t| (*t).to_string()).collect()
    }

    #[test]
    fn transition_table() {
        assert!(validate_transition(AttackPhase::Setup, AttackPhase::Observe).is_ok());
        assert!(validate_transition(AttackPhase::Observe, AttackPhase::Score).is_ok());
        assert!(validate_transition(AttackPhase::Setup, AttackPhase::Query).is_err());
        assert!(allowed_transitions(AttackPhase::Done).is_empty());
    }

    #[test]
    fn phases_must_run_in_order() {
        let mut run = AttackRun::new(ThreatSetup::BlackBox, 4, AttackConfig::default());
        let err = run.query().unwrap_err();
        assert!(matches!(
            err,
            AuditError::InvalidTransition {
                from: AttackPhase::Setup,
                to: AttackPhase::Query
            }
        ));
        assert_eq!(err.to_string(), "invalid attack transition: setup -> query");
    }

    #[test]
    fn unsealed_corpus_is_fully_reidentified() {
        let records = vision_corpus();
        let world = SealedWorldBuilder::for_level(0)
            .unwrap()
            .build(&records, &scope(1))
            .unwrap();
        let terms = terms();
        let targets = AttackTargets {
            held_out: &records,
            known_terms: &terms,
        };
        let engine = AttackEngine::new(
            &world.public,
            targets,
            ThreatSetup::BlackBox,
            AttackConfig::default(),
        )
        .unwrap();
        let metrics = engine.run(1_000).unwrap();
        assert_eq!(metrics.status, QueryStatus::ProbesExhausted);
        assert_eq!(metrics.top1_hit_rate, 1.0);
        assert_eq!(metrics.term_recovery_rate, 1.0);
        assert_eq!(metrics.queries_issued, records.len() + terms.len());
    }

    fn black_box_run(public: &[&str], held_out: PaperRecord) -> AttackMetrics {
        let records: Vec<PaperRecord> = public
            .iter()
            .enumerate()
            .map(|(i, text)| PaperRecord::new(format!("A_{:03}", i + 1).as_str()).with_text("background", *text))
            .collect();
        let world = SealedWorldBuilder::for_level(0)
            .unwrap()
            .build(&records, &scope(1))
            .unwrap();
        let held_out = [held_out];
        let targets = AttackTargets {
            held_out: &held_out,
            known_terms: &[],
        };
        AttackEngine::new(&world.public, targets, ThreatSetup::BlackBox, AttackConfig::default())
            .unwrap()
            .run(10)
            .unwrap()
    }

    #[test]
    fn disjoint_vocabulary_reidentifies_nothing() {
        let metrics = black_box_run(
            &["Kavorin Melsat", "Dravik Olund", "Tesmar Quillon"],
            PaperRecord::new("A_001").with_text("background", "Transformer ImageNet"),
        );
        assert_eq!(metrics.reid_probes, 1);
        assert_eq!(metrics.top1_hit_rate, 0.0);
        assert_eq!(metrics.topk_hit_rate, 0.0);
        assert_eq!(metrics.leakage_score, 0.0);
    }

    #[test]
    fn tied_top_score_is_not_a_top1_hit() {
        let metrics = black_box_run(
            &["Kavorin Melsat", "Kavorin Melsat", "Tesmar Quillon"],
            PaperRecord::new("A_001").with_text("background", "Kavorin Melsat"),
        );
        assert_eq!(metrics.top1_hit_rate, 0.0);
        assert_eq!(metrics.topk_hit_rate, 1.0);
    }

    #[test]
    fn white_box_sees_through_pseudonyms() {
        let records = vision_corpus();
        let world = SealedWorldBuilder::for_level(2)
            .unwrap()
            .build(&records, &scope(3))
            .unwrap();
        let terms = vec!["ResNet".to_string(), "ImageNet".to_string()];
        let targets = AttackTargets {
            held_out: &records,
            known_terms: &terms,
        };

        let black = AttackEngine::new(&world.public, targets, ThreatSetup::BlackBox, AttackConfig::default())
            .unwrap()
            .run(64)
            .unwrap();
        let white = AttackEngine::new(
            &world.public,
            targets,
            ThreatSetup::WhiteBox(&world.codebook),
            AttackConfig::default(),
        )
        .unwrap()
        .run(64)
        .unwrap();

        assert_eq!(black.term_recovery_rate, 0.0);
        assert_eq!(white.term_recovery_rate, 1.0);
        assert!(white.leakage_score >= black.leakage_score);
    }

    #[test]
    fn report_carries_one_threat_section() {
        let metrics = AttackMetrics {
            top1_hit_rate: 0.0,
            topk_hit_rate: 0.0,
            term_recovery_rate: 0.0,
            leakage_score: 0.0,
            queries_issued: 0,
            reid_probes: 2,
            term_probes: 0,
            status: QueryStatus::BudgetExhausted,
        };
        let report = AttackReport::new("vision", Seed::new(1), "level-2", ThreatModel::BlackBox, 0, metrics);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["threat_model"], "black_box");
        assert!(json.get("black_box").is_some());
        assert!(json.get("white_box").is_none());
    }

    #[test]
    fn config_validation() {
        let bad = AttackConfig {
            top_k: 0,
            ..AttackConfig::default()
        };
        assert!(bad.validate().is_err());
        let zero = AttackConfig {
            retrieval_weight: 0.0,
            term_weight: 0.0,
            ..AttackConfig::default()
        };
        assert!(zero.validate().is_err());
    }
}
