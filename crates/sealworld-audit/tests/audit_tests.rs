use pretty_assertions::assert_eq;
use proptest::prelude::*;
use sealworld_audit::prelude::*;
use sealworld_audit::{
    leakage_reduction, recommend, AttackReport, AttackTargets, KneePolicy, Pairing, QueryStatus,
    Recommendation, StatsConfig, ThreatSetup,
};
use sealworld_core::{io, PublicSealedRecord, Seed};
use sealworld_seal::{Manifest, SealedWorld, SealedWorldBuilder, TermLexicon};
use sealworld_test_utils::{init_tracing, scope, vision_corpus, VISION_TERMS};
use std::path::Path;

fn lexicon() -> TermLexicon {
    VISION_TERMS
        .iter()
        .fold(TermLexicon::default(), |lex, term| lex.with_model(*term))
}

fn terms() -> Vec<String> {
    VISION_TERMS.iter().map(|t| (*t).to_string()).collect()
}

fn world(level: u8, seed: u64) -> SealedWorld {
    SealedWorldBuilder::for_level(level)
        .unwrap()
        .with_lexicon(lexicon())
        .build(&vision_corpus(), &scope(seed))
        .unwrap()
}

fn fast_stats() -> StatsConfig {
    StatsConfig {
        n_boot: 200,
        n_perm: 200,
        seed: Seed::new(5),
    }
}

fn plan(seeds: &[u64], levels: &[u8], threat_models: &[ThreatModel]) -> SweepPlan {
    SweepPlan {
        track: "vision".into(),
        subset: "s1".into(),
        seeds: seeds.iter().copied().map(Seed::new).collect(),
        levels: levels.to_vec(),
        threat_models: threat_models.to_vec(),
        budget: 64,
        adaptive_budgets: Vec::new(),
        unit_cap: None,
        deadline: None,
    }
}

#[test]
fn test_budget_zero_leaks_nothing() {
    init_tracing();
    let records = vision_corpus();
    let terms = terms();
    let targets = AttackTargets {
        held_out: &records,
        known_terms: &terms,
    };

    for level in [0, 2, 4] {
        let world = world(level, 11);
        for threat in [ThreatSetup::BlackBox, ThreatSetup::WhiteBox(&world.codebook)] {
            let engine =
                AttackEngine::new(&world.public, targets, threat, AttackConfig::default()).unwrap();
            let metrics = engine.run(0).unwrap();
            assert_eq!(metrics.top1_hit_rate, 0.0);
            assert_eq!(metrics.topk_hit_rate, 0.0);
            assert_eq!(metrics.term_recovery_rate, 0.0);
            assert_eq!(metrics.leakage_score, 0.0);
            assert_eq!(metrics.queries_issued, 0);
            assert_eq!(metrics.status, QueryStatus::BudgetExhausted);
        }
    }
}

#[test]
fn test_adaptive_curve_is_monotone_in_budget() {
    let records = vision_corpus();
    let terms = terms();
    let targets = AttackTargets {
        held_out: &records,
        known_terms: &terms,
    };
    let budgets: Vec<usize> = (0..=24).collect();

    for level in [1, 3] {
        let world = world(level, 3);
        for threat in [ThreatSetup::BlackBox, ThreatSetup::WhiteBox(&world.codebook)] {
            let engine =
                AttackEngine::new(&world.public, targets, threat, AttackConfig::default()).unwrap();
            let curve = engine.run_adaptive(&budgets).unwrap();
            assert_eq!(curve.points.len(), budgets.len());
            assert!(curve.is_monotone(), "level {level}: {curve:?}");
            let last = curve.points.last().unwrap().metrics;
            assert_eq!(last.status, QueryStatus::ProbesExhausted);
            assert_eq!(last.queries_issued, records.len() + terms.len());
        }
    }
}

#[test]
fn test_white_box_leaks_at_least_black_box() {
    let records = vision_corpus();
    let terms = terms();
    let targets = AttackTargets {
        held_out: &records,
        known_terms: &terms,
    };
    let world = world(4, 21);

    let run = |threat| {
        AttackEngine::new(&world.public, targets, threat, AttackConfig::default())
            .unwrap()
            .run(128)
            .unwrap()
    };
    let black = run(ThreatSetup::BlackBox);
    let white = run(ThreatSetup::WhiteBox(&world.codebook));
    assert!(white.term_recovery_rate >= black.term_recovery_rate);
    assert!(white.term_recovery_rate > 0.0);
}

#[test]
fn test_identical_samples_show_no_difference() {
    let engine = StatsEngine::new(fast_stats());
    let samples = [0.42, 0.51, 0.47, 0.39, 0.55];

    for pairing in [Pairing::Paired, Pairing::Unpaired] {
        let cmp = engine.compare(&samples, &samples, pairing).unwrap();
        assert!(cmp.diff.abs() < 1e-12);
        assert!(cmp.ci95_low <= 1e-12 && cmp.ci95_high >= -1e-12);
        assert!(cmp.p_perm_two_sided > 0.99, "{pairing:?}: {cmp:?}");
        assert_eq!(cmp.cohens_d, Some(0.0));
    }
}

#[test]
fn test_knob_reduces_leakage_across_seeds() {
    init_tracing();
    let records = vision_corpus();
    let terms = terms();
    let scorer = StructuralUtility;
    let builder = SealedWorldBuilder::for_level(0)
        .unwrap()
        .with_lexicon(lexicon());
    let runner = SweepRunner::new(&records, &terms, builder, &scorer).with_stats(fast_stats());

    let outcome = runner
        .run(&plan(&[1, 2, 3], &[0, 1, 2, 3, 4], &[ThreatModel::BlackBox]))
        .unwrap();
    assert_eq!(outcome.units.len(), 15);
    assert!(outcome.skipped.is_empty());

    let curve = &outcome.curves[0];
    assert_eq!(curve.points.len(), 5);
    assert!(curve.points.iter().all(|p| p.n_seeds == 3));

    let reduction = leakage_reduction(curve);
    assert_eq!(reduction[&0], 0.0);
    assert!(reduction[&1] > 0.0);
    for level in 2..=4u8 {
        assert!(
            reduction[&level] >= reduction[&1] - 1e-9,
            "level {level} reduces less than level 1: {reduction:?}"
        );
    }

    let baseline = &curve.points[0];
    assert!((baseline.leakage_mean - 1.0).abs() < 1e-9);
}

#[test]
fn test_knee_recommendation_from_sweep() {
    let records = vision_corpus();
    let terms = terms();
    let scorer = StructuralUtility;
    let builder = SealedWorldBuilder::for_level(0)
        .unwrap()
        .with_lexicon(lexicon());
    let runner = SweepRunner::new(&records, &terms, builder, &scorer).with_stats(fast_stats());
    let outcome = runner
        .run(&plan(&[1, 2, 3], &[0, 1, 2], &[ThreatModel::BlackBox]))
        .unwrap();

    let strict = KneePolicy {
        utility_tolerance: 0.0,
        leakage_threshold: 0.0,
    };
    assert!(matches!(
        recommend(&outcome.curves[0], &strict),
        Recommendation::NoKnee { .. }
    ));

    let lenient = KneePolicy {
        utility_tolerance: 1.0,
        leakage_threshold: 1.0,
    };
    assert_eq!(recommend(&outcome.curves[0], &lenient).level(), Some(0));
}

#[test]
fn test_sweep_artifacts_are_public_only() {
    let records = vision_corpus();
    let terms = terms();
    let scorer = StructuralUtility;
    let builder = SealedWorldBuilder::for_level(0)
        .unwrap()
        .with_lexicon(lexicon());
    let mut sweep = plan(
        &[8],
        &[0, 3],
        &[ThreatModel::BlackBox, ThreatModel::WhiteBox],
    );
    sweep.adaptive_budgets = vec![0, 8, 32];
    let outcome = SweepRunner::new(&records, &terms, builder, &scorer)
        .with_stats(fast_stats())
        .run(&sweep)
        .unwrap();
    assert_eq!(outcome.curves.len(), 2);

    let dir = tempfile::tempdir().unwrap();
    let writer = ArtifactWriter::new(dir.path()).unwrap();
    let written = writer.write_sweep("vision", &outcome).unwrap();
    assert!(!written.is_empty());

    let unit_dir = writer.unit_dir("vision", Seed::new(8), "level-3");
    let public: Vec<PublicSealedRecord> =
        io::read_jsonl(&unit_dir.join("public_records.jsonl")).unwrap();
    assert_eq!(public.len(), records.len());
    let manifest: Manifest = io::read_json(&unit_dir.join("manifest.json")).unwrap();
    assert_eq!(manifest.record_count, records.len());

    let report: AttackReport = io::read_json(
        &unit_dir
            .join("white_box")
            .join("budget-64")
            .join("attack_report.json"),
    )
    .unwrap();
    assert_eq!(report.threat_model, ThreatModel::WhiteBox);
    assert!(report.white_box.is_some() && report.black_box.is_none());
    assert_eq!(report.budget_curve.map(|c| c.points.len()), Some(3));

    let mut files = Vec::new();
    collect_files(dir.path(), &mut files);
    assert_eq!(files.len(), written.len());
    for file in &files {
        let name = file.file_name().unwrap().to_string_lossy().to_string();
        assert!(
            [
                "public_records.jsonl",
                "manifest.json",
                "attack_report.json",
                "tradeoff_curve.json"
            ]
            .contains(&name.as_str()),
            "unexpected artifact {name}"
        );
    }
}

fn collect_files(dir: &Path, out: &mut Vec<std::path::PathBuf>) {
    for entry in std::fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        if path.is_dir() {
            collect_files(&path, out);
        } else {
            out.push(path);
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn top1_never_drops_with_more_budget(level in 0u8..=4, b1 in 0usize..30, extra in 0usize..30) {
        let records = vision_corpus();
        let terms = terms();
        let targets = AttackTargets { held_out: &records, known_terms: &terms };
        let world = world(level, 17);
        let engine = AttackEngine::new(
            &world.public,
            targets,
            ThreatSetup::BlackBox,
            AttackConfig::default(),
        )
        .unwrap();

        let low = engine.run(b1).unwrap();
        let high = engine.run(b1 + extra).unwrap();
        prop_assert!(high.top1_hit_rate >= low.top1_hit_rate);
        prop_assert!(high.leakage_score >= low.leakage_score);
    }
}
