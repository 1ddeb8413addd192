use cladewick::clade::{BitsetScheme, CladeSystem, FingerprintScheme, KeyScheme};
use cladewick::error::CladeError;
use cladewick::model::Tree;
use cladewick::newick::NewickParser;
use cladewick::summary::{HipstrBuilder, MajorityRuleBuilder, MccSelector};

const EPSILON: f64 = 1e-12;

/// Two frequent cherries never sampled together: HIPSTR combines them
/// into (((Tui,Bellbird),Stitchbird),((Saddleback,Kokako),Fantail)).
const MIXED: [&str; 5] = [
    "(((Tui,Bellbird),Stitchbird),(Saddleback,(Kokako,Fantail)));",
    "(((Tui,Bellbird),Stitchbird),(Saddleback,(Kokako,Fantail)));",
    "(((Saddleback,Kokako),Fantail),(Tui,(Bellbird,Stitchbird)));",
    "(((Saddleback,Kokako),Fantail),(Tui,(Bellbird,Stitchbird)));",
    "(((Tui,Bellbird),(Saddleback,Kokako)),(Stitchbird,Fantail));",
];

const COMBINED: &str = "(((Tui,Bellbird),Stitchbird),((Saddleback,Kokako),Fantail));";

fn sample(newicks: &[&str]) -> (Vec<Tree>, NewickParser) {
    let mut parser = NewickParser::new();
    let trees = newicks.iter().map(|n| parser.parse_str(n).unwrap()).collect();
    (trees, parser)
}

fn system_for<S: KeyScheme>(scheme: S, trees: &[Tree]) -> CladeSystem<S> {
    let mut system = CladeSystem::new(scheme, true);
    system.add_all(trees).unwrap();
    system.calculate_clade_credibilities(trees.len()).unwrap();
    system
}

/// Whether two trees over the same taxa have the same clades.
fn same_topology(a: &Tree, b: &Tree) -> bool {
    let first = CladeSystem::from_tree(BitsetScheme, a).unwrap();
    let second = CladeSystem::from_tree(BitsetScheme, b).unwrap();
    first.clade_count() == second.clade_count() && first.common_clade_count(&second) == first.clade_count()
}

// --- TESTS HIPSTR ---
#[test]
fn test_hipstr_combines_clades_of_different_trees() {
    let (trees, mut parser) = sample(&MIXED);
    let mut system = system_for(BitsetScheme, &trees);
    let expected = parser.parse_str(COMBINED).unwrap();

    let result = HipstrBuilder::new().build(&mut system).unwrap();
    assert!(same_topology(&result.tree, &expected));
    assert!(!trees.iter().any(|t| same_topology(t, &expected)));

    let expected_score = 2.0 * 0.8f64.ln() + 2.0 * 0.6f64.ln();
    assert!((result.score - expected_score).abs() < EPSILON);

    // Beats every sampled tree
    let mcc = MccSelector::select(&system, trees.clone()).unwrap().unwrap();
    assert!(result.score > mcc.score);
}

#[test]
fn test_hipstr_score_is_log_clade_credibility() {
    let (trees, _) = sample(&MIXED);
    let mut system = system_for(BitsetScheme, &trees);
    let result = HipstrBuilder::new().build(&mut system).unwrap();

    let rescored = system.log_clade_credibility(&result.tree).unwrap();
    assert!((result.score - rescored).abs() < EPSILON);
}

#[test]
fn test_hipstr_tree_shape() {
    let (trees, _) = sample(&MIXED);
    let mut system = system_for(BitsetScheme, &trees);
    let tree = HipstrBuilder::new().build(&mut system).unwrap().tree;

    assert_eq!(tree.num_leaves(), 6);
    assert_eq!(tree.num_internal(), 5);
    assert!(tree.is_valid());
    assert!(tree.is_binary());
    assert!(tree.vertices().iter().all(|v| tree.height(v.index()) == 0.0));
}

#[test]
fn test_hipstr_memoizes_scores() {
    let (trees, _) = sample(&MIXED);
    let mut system = system_for(BitsetScheme, &trees);
    let first = HipstrBuilder::new().build(&mut system).unwrap();

    let root = system.clade(system.root_clade().unwrap());
    assert_eq!(root.best_score(), Some(first.score));
    let (left, right) = root.best_sub_clades().unwrap();
    assert!(system.clade(left).size() <= system.clade(right).size());
    for tip in 0..6 {
        let clade = system.clade(system.tip_clade(tip).unwrap());
        assert_eq!(clade.best_score(), Some(0.0));
    }

    // Rebuilding starts from scratch and gives the same tree
    let second = HipstrBuilder::new().build(&mut system).unwrap();
    assert_eq!(first.score, second.score);
    assert!(same_topology(&first.tree, &second.tree));
}

#[test]
fn test_hipstr_with_fingerprint_keys() {
    let (trees, mut parser) = sample(&MIXED);
    let mut system = system_for(FingerprintScheme::with_seed(99), &trees);
    let expected = parser.parse_str(COMBINED).unwrap();

    let result = HipstrBuilder::new().build(&mut system).unwrap();
    assert!(same_topology(&result.tree, &expected));
}

#[test]
fn test_majority_rule_hipstr_adds_bonus() {
    let (trees, _) = sample(&MIXED);
    let mut system = system_for(BitsetScheme, &trees);
    let plain = HipstrBuilder::new().build(&mut system).unwrap();
    let majority = HipstrBuilder::new().majority_rule(true).build(&mut system).unwrap();

    // Root (6), {Tui,Bellbird,Stitchbird} (3), {Saddleback,Kokako,Fantail} (3) and both cherries (2)
    assert!((majority.score - plain.score - 16.0).abs() < 1e-9);
    assert!(same_topology(&plain.tree, &majority.tree));
}

#[test]
fn test_majority_rule_hipstr_prefers_majority_clades() {
    // {Kea,Kaka} is in 11 of 20 trees but split between two shapes;
    // the conflicting ((Kea,Kakapo),(Kaka,Kokako)) is the single most
    // frequent tree
    let mut newicks = Vec::new();
    newicks.extend(["((Kea,Kaka),(Kakapo,Kokako));"; 6]);
    newicks.extend(["(((Kea,Kaka),Kakapo),Kokako);"; 5]);
    newicks.extend(["((Kea,Kakapo),(Kaka,Kokako));"; 9]);
    let (trees, mut parser) = sample(&newicks);
    let mut system = system_for(BitsetScheme, &trees);
    let conflicting = parser.parse_str("((Kea,Kakapo),(Kaka,Kokako));").unwrap();
    let majority_tree = parser.parse_str("((Kea,Kaka),(Kakapo,Kokako));").unwrap();

    let plain = HipstrBuilder::new().build(&mut system).unwrap();
    assert!(same_topology(&plain.tree, &conflicting));
    assert!((plain.score - 2.0 * 0.45f64.ln()).abs() < EPSILON);

    let majority = HipstrBuilder::new().majority_rule(true).build(&mut system).unwrap();
    assert!(same_topology(&majority.tree, &majority_tree));
    // Bonus of the root (4) and {Kea,Kaka} (2)
    let expected = 0.55f64.ln() + 0.3f64.ln() + 6.0;
    assert!((majority.score - expected).abs() < 1e-9);
}

/// Root pairs (Kea, {Kaka,Kakapo,Kokako}) and (Kokako, {Kea,Kaka,Kakapo})
/// score ln(5/18 * 12/18) and ln(6/18 * 10/18): equal, while the second
/// has the higher summed credibility.
const TIED: [(&str, usize); 4] = [
    ("(Kea,(Kaka,(Kakapo,Kokako)));", 5),
    ("(Kokako,(Kakapo,(Kea,Kaka)));", 6),
    ("(Kaka,(Kea,(Kakapo,Kokako)));", 3),
    ("((Kea,Kaka),(Kakapo,Kokako));", 4),
];

#[test]
fn test_hipstr_breaks_ties_by_credibility() {
    let newicks: Vec<&str> = TIED
        .iter()
        .flat_map(|&(newick, copies)| std::iter::repeat_n(newick, copies))
        .collect();
    let (trees, mut parser) = sample(&newicks);
    let mut system = system_for(BitsetScheme, &trees);
    let expected_score = (5.0f64 / 18.0).ln() + (12.0f64 / 18.0).ln();

    let broken = HipstrBuilder::new().break_ties(true).build(&mut system).unwrap();
    let higher_credibility = parser.parse_str(TIED[1].0).unwrap();
    assert!(same_topology(&broken.tree, &higher_credibility));
    assert!((broken.score - expected_score).abs() < EPSILON);

    // Without tie breaking the first recorded pair stays
    let kept = HipstrBuilder::new().break_ties(false).build(&mut system).unwrap();
    let first_recorded = parser.parse_str(TIED[0].0).unwrap();
    assert!(same_topology(&kept.tree, &first_recorded));
    assert!((kept.score - expected_score).abs() < EPSILON);
}

#[test]
fn test_hipstr_needs_sub_clades() {
    let (trees, _) = sample(&MIXED);
    let mut system = CladeSystem::new(BitsetScheme, false);
    system.add_all(&trees).unwrap();
    system.calculate_clade_credibilities(trees.len()).unwrap();

    let error = HipstrBuilder::new().build(&mut system).unwrap_err();
    assert!(matches!(error, CladeError::MissingSubClades { .. }));
}

#[test]
fn test_hipstr_on_empty_system() {
    let mut system = CladeSystem::new(BitsetScheme, true);
    assert_eq!(
        HipstrBuilder::new().build(&mut system).unwrap_err(),
        CladeError::EmptySystem
    );
}

// --- TESTS MCC ---
#[test]
fn test_mcc_first_of_equal_trees_wins() {
    let (trees, _) = sample(&[
        "((Kea,Kakapo),(Kaka,Kokako));",
        "((Kea,Kaka),(Kakapo,Kokako));",
        "((Kaka,Kea),(Kokako,Kakapo));",
        "((Kea,Kaka),(Kakapo,Kokako));",
    ]);
    let system = system_for(BitsetScheme, &trees);

    let mut selector = MccSelector::new();
    for tree in trees.iter().cloned() {
        selector.consider(&system, tree).unwrap();
    }
    assert_eq!(selector.considered(), 4);

    let best = selector.finish().unwrap();
    assert_eq!(best.tree_number, 2);
    let expected = 0.75f64.ln() * 2.0;
    assert!((best.score - expected).abs() < EPSILON);
}

#[test]
fn test_mcc_returns_sampled_tree() {
    let (trees, _) = sample(&MIXED);
    let system = system_for(BitsetScheme, &trees);
    let best = MccSelector::select(&system, trees.clone()).unwrap().unwrap();

    let scores: Vec<f64> = trees
        .iter()
        .map(|t| system.log_clade_credibility(t).unwrap())
        .collect();
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let first_best = scores.iter().position(|&s| s == max).unwrap();

    assert_eq!(best.score, max);
    assert_eq!(best.tree_number, first_best + 1);
    assert!(same_topology(&best.tree, &trees[first_best]));
}

#[test]
fn test_mcc_without_trees() {
    let system: CladeSystem<BitsetScheme> = CladeSystem::new(BitsetScheme, false);
    assert!(MccSelector::select(&system, Vec::new()).unwrap().is_none());
    assert!(MccSelector::new().best().is_none());
}

// --- TESTS MAJORITY RULE ---
#[test]
fn test_majority_rule_keeps_frequent_clades() {
    let (trees, mut parser) = sample(&MIXED);
    let system = system_for(BitsetScheme, &trees);
    let tree = MajorityRuleBuilder::new().build(&system).unwrap();

    // Clades above one half: both triplets and both cherries of the combined tree
    let expected = parser.parse_str(COMBINED).unwrap();
    assert!(same_topology(&tree, &expected));
    assert!(tree.is_valid());
    assert_eq!(tree.num_leaves(), 6);
}

#[test]
fn test_majority_rule_resolves_polytomies() {
    let (trees, _) = sample(&[
        "(((Kea,Kaka),Kakapo),Kokako);",
        "(((Kea,Kaka),Kokako),Kakapo);",
        "((Kea,Kaka),(Kakapo,Kokako));",
    ]);
    let system = system_for(BitsetScheme, &trees);
    let tree = MajorityRuleBuilder::new().build(&system).unwrap();

    // Only {Kea,Kaka} is kept: (Kakapo,Kokako,(Kea,Kaka))
    assert_eq!(tree.num_internal(), 2);
    assert_eq!(tree.root().children().len(), 3);
    assert!(!tree.is_binary());
}

#[test]
fn test_majority_rule_with_lower_threshold() {
    let (trees, _) = sample(&[
        "(((Kea,Kaka),Kakapo),Kokako);",
        "(((Kea,Kaka),Kakapo),Kokako);",
        "((Kea,Kaka),(Kakapo,Kokako));",
        "((Kea,Kakapo),(Kaka,Kokako));",
    ]);
    let system = system_for(BitsetScheme, &trees);

    // {Kea,Kaka,Kakapo} has credibility exactly one half
    assert_eq!(MajorityRuleBuilder::new().build(&system).unwrap().num_internal(), 2);
    let tree = MajorityRuleBuilder::new().with_threshold(0.4).build(&system).unwrap();
    assert_eq!(tree.num_internal(), 3);
    assert!(tree.is_binary());
}
