use pretty_assertions::assert_eq;
use proptest::prelude::*;
use sealworld_core::{
    FieldValue, FormulaEdge, FormulaGraph, FormulaNode, PaperKey, PaperRecord, SealedField,
};
use sealworld_seal::prelude::*;
use sealworld_seal::{
    Denylist, DefenseKnobController, Equivalence, TermMatcher, WhitespaceParaphraser,
};
use sealworld_test_utils::{init_tracing, scenario_records, scope, vision_corpus, VISION_TERMS};

fn lexicon() -> TermLexicon {
    VISION_TERMS
        .iter()
        .fold(TermLexicon::default(), |lex, term| lex.with_model(*term))
}

fn sealed_background(world: &SealedWorld, key: &str) -> String {
    match &world.record(&PaperKey::new(key)).unwrap().fields["background"] {
        SealedField::FreeText(text) => text.clone(),
        other => panic!("background is {other:?}"),
    }
}

#[test]
fn test_scenario_at_level_two() {
    init_tracing();
    let world = SealedWorldBuilder::for_level(2)
        .unwrap()
        .build(&scenario_records(), &scope(42))
        .unwrap();

    let background = sealed_background(&world, "A_001");
    for leaked in ["Transformer", "ImageNet", "10.1/xyz"] {
        assert!(!background.contains(leaked), "{leaked} survived in {background}");
    }

    let a = world.record(&PaperKey::new("A_001")).unwrap().metric("acc").unwrap();
    let b = world.record(&PaperKey::new("A_002")).unwrap().metric("acc").unwrap();
    assert!(b.sealed < a.sealed);
}

#[test]
fn test_builds_are_byte_identical() {
    let builder = SealedWorldBuilder::for_level(3).unwrap().with_lexicon(lexicon());
    let first = builder.build(&vision_corpus(), &scope(7)).unwrap();
    let second = builder.build(&vision_corpus(), &scope(7)).unwrap();

    assert_eq!(first.public_jsonl().unwrap(), second.public_jsonl().unwrap());
    assert_eq!(
        first.manifest.public_records_hash,
        second.manifest.public_records_hash
    );
    assert_eq!(first.manifest.codebook_hash, second.manifest.codebook_hash);
    assert_eq!(
        first.codebook.to_private_json().unwrap(),
        second.codebook.to_private_json().unwrap()
    );
}

#[test]
fn test_seeds_produce_different_worlds() {
    let builder = SealedWorldBuilder::for_level(2).unwrap().with_lexicon(lexicon());
    let a = builder.build(&vision_corpus(), &scope(1)).unwrap();
    let b = builder.build(&vision_corpus(), &scope(2)).unwrap();
    assert_ne!(a.manifest.codebook_hash, b.manifest.codebook_hash);
    assert_ne!(a.codebook.lookup("resnet"), b.codebook.lookup("resnet"));
}

#[test]
fn test_lexicon_terms_never_survive() {
    for level in 2..=DefenseKnobController::MAX_LEVEL {
        let world = SealedWorldBuilder::for_level(level)
            .unwrap()
            .with_lexicon(lexicon())
            .build(&vision_corpus(), &scope(11))
            .unwrap();
        for record in &world.public {
            for (field, text) in record.text_fields() {
                for term in VISION_TERMS {
                    assert!(
                        !text.contains(term),
                        "level {level}: {term} survived in {}/{field}: {text}",
                        record.paper_key
                    );
                }
            }
        }
        assert!(world.manifest.overall_coverage.is_complete());
    }
}

#[test]
fn test_level_zero_only_redacts() {
    let world = SealedWorldBuilder::for_level(0)
        .unwrap()
        .build(&vision_corpus(), &scope(3))
        .unwrap();
    assert!(world.codebook.is_empty());
    let mae = sealed_background(&world, "V_008");
    assert!(mae.contains("MAE"));
    assert!(mae.contains("[URL]"));
    assert!(!mae.contains("example.org"));
}

#[test]
fn test_topology_preserved_for_every_graph() {
    let corpus = vision_corpus();
    for level in DefenseKnobController::levels() {
        let world = SealedWorldBuilder::for_level(level)
            .unwrap()
            .with_lexicon(lexicon())
            .build(&corpus, &scope(5))
            .unwrap();
        for original in &corpus {
            let sealed = world.record(&original.paper_key).unwrap();
            for (field, graph) in original.formula_fields() {
                let (_, sealed_graph) = sealed
                    .formula_fields()
                    .find(|(name, _)| *name == field)
                    .unwrap();
                assert_eq!(graph.topology(), sealed_graph.topology());
            }
        }
        if level >= 1 {
            assert!(world.manifest.structural.semantic_verified > 0);
        }
    }
}

#[test]
fn test_relabelled_graph_is_equivalent() {
    let corpus = vision_corpus();
    let world = SealedWorldBuilder::for_level(4)
        .unwrap()
        .build(&corpus, &scope(9))
        .unwrap();
    let original = corpus.iter().find(|r| r.paper_key.as_str() == "V_003").unwrap();
    let (_, graph) = original.formula_fields().next().unwrap();
    let (_, sealed) = world
        .record(&original.paper_key)
        .unwrap()
        .formula_fields()
        .next()
        .unwrap();
    assert_eq!(
        sealworld_seal::check_equivalence(graph, sealed, |label| world.codebook.seal_label(label)),
        Equivalence::Equivalent
    );
}

#[test]
fn test_dependencies_on_prior_subsets() {
    let records = vec![PaperRecord::new("S2_001")
        .with_text("background", "extends ResNet")
        .with_dependencies(["S1_009"])];

    let err = SealedWorldBuilder::for_level(1)
        .unwrap()
        .build(&records, &scope(1))
        .unwrap_err();
    assert!(err.to_string().contains("dependency_closure"));

    let prior = scope(1).with_prior_keys([PaperKey::new("S1_009")]);
    let world = SealedWorldBuilder::for_level(1)
        .unwrap()
        .build(&records, &prior)
        .unwrap();
    let deps: Vec<&PaperKey> = world.public[0].dependencies().collect();
    assert_eq!(deps, vec![&PaperKey::new("S1_009")]);
}

#[test]
fn test_reject_action_fails_the_whole_build() {
    let mut config = DefenseKnobController::level_to_config(2).unwrap();
    config.lexical.denylist_action = sealworld_seal::DenylistAction::Reject;
    let err = SealedWorldBuilder::new(config)
        .with_lexicon(lexicon())
        .build(&vision_corpus(), &scope(4))
        .unwrap_err();

    assert_eq!(err.integrity_check(), Some(IntegrityCheck::DenylistSurvived));
    let msg = err.to_string();
    assert!(msg.contains("vision/s1@seed=4"));
    assert!(msg.contains("V_008"));
    assert!(msg.contains("denylist_survived"));
}

#[test]
fn test_malformed_graph_is_configuration_error() {
    let graph = FormulaGraph {
        nodes: vec![FormulaNode::new("a", "symbol", "A")],
        edges: vec![FormulaEdge::data("a", "missing", 0)],
    };
    let records = vec![PaperRecord::new("G_1")
        .with_text("background", "uses ResNet")
        .with_field("mechanism_graph", FieldValue::FormulaGraph(graph))];
    let err = SealedWorldBuilder::for_level(1)
        .unwrap()
        .build(&records, &scope(1))
        .unwrap_err();
    assert!(matches!(err, SealError::Configuration { .. }));
    assert!(err.to_string().contains("formula_shape"));
}

#[test]
fn test_whitespace_paraphraser_feeds_sealing() {
    let records = vec![PaperRecord::new("P_1").with_text("background", "uses   ResNet\n\n  daily")];
    let world = SealedWorldBuilder::for_level(1)
        .unwrap()
        .with_paraphraser(WhitespaceParaphraser)
        .build(&records, &scope(2))
        .unwrap();
    let text = sealed_background(&world, "P_1");
    assert!(!text.contains("  "));
    assert!(!text.contains("ResNet"));
}

#[test]
fn test_knob_levels_tighten_monotonically() {
    let configs: Vec<SealingConfig> = DefenseKnobController::levels()
        .map(|l| DefenseKnobController::level_to_config(l).unwrap())
        .collect();
    for pair in configs.windows(2) {
        assert!(pair[1].lexical.enabled >= pair[0].lexical.enabled);
        assert!(pair[1].structural.relabel >= pair[0].structural.relabel);
        assert!(pair[1].lexical.case_insensitive >= pair[0].lexical.case_insensitive);
    }
}

fn noisy_text() -> impl Strategy<Value = String> {
    let word = prop_oneof![
        Just("model".to_string()),
        Just("ResNet".to_string()),
        Just("training".to_string()),
        Just("https://arxiv.org/abs/1512.03385".to_string()),
        Just("doi:10.1145/3065386".to_string()),
        Just("2103.14030".to_string()),
        Just("author@lab.example.com".to_string()),
        Just("1234567".to_string()),
        Just("0.7642".to_string()),
        Just("ImageNet".to_string()),
    ];
    prop::collection::vec(word, 1..24).prop_map(|words| words.join(" "))
}

const AFFIXES: &[&str] = &["based", "style", "scale", "pretrained", "like"];
const JOINERS: &[&str] = &["-", "_"];

fn compound_text() -> impl Strategy<Value = String> {
    let compound = (
        prop::sample::select(VISION_TERMS),
        prop::sample::select(AFFIXES),
        prop::sample::select(JOINERS),
        any::<bool>(),
    )
        .prop_map(|(term, affix, joiner, leading)| {
            if leading {
                format!("{term}{joiner}{affix}")
            } else {
                format!("{affix}{joiner}{term}")
            }
        });
    prop::collection::vec(compound, 1..6)
        .prop_map(|words| format!("we compare {} baselines", words.join(" and ")))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_compounded_terms_never_survive(
        texts in prop::collection::vec(compound_text(), 1..4),
        level in 2u8..=4,
        seed in 0u64..1000,
    ) {
        let records: Vec<PaperRecord> = texts
            .iter()
            .enumerate()
            .map(|(i, t)| PaperRecord::new(format!("C_{i}").as_str()).with_text("background", t.as_str()))
            .collect();
        let world = SealedWorldBuilder::for_level(level)
            .unwrap()
            .with_lexicon(lexicon())
            .build(&records, &scope(seed))
            .unwrap();
        let known = TermMatcher::from_terms(VISION_TERMS.iter().copied(), true);
        for record in &world.public {
            for (_, text) in record.text_fields() {
                prop_assert_eq!(known.count(text), 0, "{}", text);
                for part in text.split(|c: char| !c.is_alphanumeric()) {
                    prop_assert!(
                        !VISION_TERMS.iter().any(|t| t.eq_ignore_ascii_case(part)),
                        "{} survived in {}",
                        part,
                        text
                    );
                }
            }
        }
        prop_assert!(world.manifest.overall_coverage.is_complete());
    }

    #[test]
    fn prop_sealed_text_is_denylist_clean(
        texts in prop::collection::vec(noisy_text(), 1..5),
        level in 0u8..=4,
        seed in 0u64..1000,
    ) {
        let records: Vec<PaperRecord> = texts
            .iter()
            .enumerate()
            .map(|(i, t)| PaperRecord::new(format!("P_{i}").as_str()).with_text("background", format!("ResNet {t}")))
            .collect();
        let world = SealedWorldBuilder::for_level(level)
            .unwrap()
            .build(&records, &scope(seed))
            .unwrap();
        for record in &world.public {
            for (_, text) in record.text_fields() {
                prop_assert!(Denylist::standard().is_clean(text), "{}", text);
            }
        }
    }

    #[test]
    fn prop_perturbed_metrics_keep_order(
        values in prop::collection::vec(0.0f64..1.0, 2..12),
        seed in 0u64..1000,
    ) {
        let records: Vec<PaperRecord> = values
            .iter()
            .enumerate()
            .map(|(i, v)| PaperRecord::new(format!("M_{i}").as_str()).with_text("background", "ResNet").with_metric("acc", *v))
            .collect();
        let world = SealedWorldBuilder::for_level(1)
            .unwrap()
            .build(&records, &scope(seed))
            .unwrap();
        let sealed = |i: usize| {
            world
                .record(&PaperKey::new(format!("M_{i}")))
                .and_then(|r| r.metric("acc"))
                .unwrap()
                .sealed
        };
        for (i, a) in values.iter().enumerate() {
            for (j, b) in values.iter().enumerate() {
                if a < b {
                    prop_assert!(sealed(i) <= sealed(j));
                }
            }
        }
    }
}
