use cladewick::action::{AnnotationAction, CollectionAction, HeightsSummary, SetHeightsAction};
use cladewick::clade::{BitsetScheme, CladeSystem};
use cladewick::model::{AnnotationValue, Tree};
use cladewick::newick::NewickParser;
use cladewick::stats;
use cladewick::summary::{HipstrBuilder, MajorityRuleBuilder, MccSelector};

fn sample(newicks: &[&str]) -> (Vec<Tree>, NewickParser) {
    let mut parser = NewickParser::new();
    let trees = newicks.iter().map(|n| parser.parse_str(n).unwrap()).collect();
    (trees, parser)
}

fn system_for(trees: &[Tree]) -> CladeSystem<BitsetScheme> {
    let mut system = CladeSystem::new(BitsetScheme, true);
    system.add_all(trees).unwrap();
    system.calculate_clade_credibilities(trees.len()).unwrap();
    system
}

fn credibility_of(system: &CladeSystem<BitsetScheme>, taxa: &[usize]) -> Option<f64> {
    system
        .clades()
        .iter()
        .find(|c| !c.is_tip() && system.taxa_of(c.index()).unwrap() == taxa)
        .map(|c| c.credibility())
}

#[test]
fn test_identical_trees() {
    let (trees, _) = sample(&["((Kea:1,Kaka:1):1,(Kakapo:1,Kokako:1):1);"; 10]);
    let system = system_for(&trees);

    assert_eq!(credibility_of(&system, &[0, 1]), Some(1.0));
    assert_eq!(credibility_of(&system, &[2, 3]), Some(1.0));
    let root = system.clade(system.root_clade().unwrap());
    assert_eq!(root.size(), 4);
    assert_eq!(root.credibility(), 1.0);

    let mcc = MccSelector::select(&system, trees).unwrap().unwrap();
    assert_eq!(mcc.score, 0.0);
    assert_eq!(mcc.tree_number, 1);
}

#[test]
fn test_evenly_split_trees() {
    let mut newicks = vec!["((Kea,Kaka),(Kakapo,Kokako));"; 5];
    newicks.extend(["((Kea,Kakapo),(Kaka,Kokako));"; 5]);
    let (trees, _) = sample(&newicks);
    let system = system_for(&trees);

    assert_eq!(credibility_of(&system, &[0, 1]), Some(0.5));
    assert_eq!(credibility_of(&system, &[0, 2]), Some(0.5));

    // Consensus keeps clades strictly above one half: a single polytomy
    let consensus = MajorityRuleBuilder::new().build(&system).unwrap();
    assert_eq!(consensus.num_internal(), 1);
    assert_eq!(consensus.root().children().len(), 4);

    // Neither split earns the majority bonus
    let mut system = system;
    let plain = HipstrBuilder::new().build(&mut system).unwrap();
    let majority = HipstrBuilder::new().majority_rule(true).build(&mut system).unwrap();
    assert!((majority.score - plain.score - 4.0).abs() < 1e-12);
    assert_eq!(system.top_clade_count(0.5), 5);
}

#[test]
fn test_single_taxon() {
    let (trees, _) = sample(&["Kea;"]);
    let mut system = system_for(&trees);

    let root = system.clade(system.root_clade().unwrap());
    assert_eq!(root.size(), 1);
    assert!(root.is_tip());
    assert_eq!(system.clade_count(), 0);

    let hipstr = HipstrBuilder::new().build(&mut system).unwrap();
    assert_eq!(hipstr.score, 0.0);
    assert_eq!(hipstr.tree.num_vertices(), 1);
    assert_eq!(hipstr.tree.root().taxon(), Some(0));

    let consensus = MajorityRuleBuilder::new().build(&system).unwrap();
    assert_eq!(consensus.num_vertices(), 1);
}

#[test]
fn test_skewed_height_sample() {
    let heights = [1.0, 2.0, 2.0, 3.0, 100.0];
    assert!((stats::mean(&heights) - 21.6).abs() < 1e-12);
    assert_eq!(stats::median(&heights), Some(2.0));
    assert_eq!(stats::hpd_interval(&heights, 0.8), Some((1.0, 3.0)));
}

#[test]
fn test_skewed_heights_through_annotation() {
    // {Kea,Kaka} at heights 1, 2, 2, 3 and 100 below a root at 200
    let (mut trees, _) = sample(&[
        "((Kea:1,Kaka:1):199,Kakapo:200);",
        "((Kea:2,Kaka:2):198,Kakapo:200);",
        "((Kea:2,Kaka:2):198,Kakapo:200);",
        "((Kea:3,Kaka:3):197,Kakapo:200);",
        "((Kea:100,Kaka:100):100,Kakapo:200);",
    ]);
    let mut system = system_for(&trees);

    let mut collection = CollectionAction::new(["height"]);
    for tree in trees.iter_mut() {
        system.traverse_tree(tree, &mut collection).unwrap();
    }

    let mut target = trees[0].clone();
    let mut set_heights = SetHeightsAction::new(collection.take_root_heights(), 0);
    system.traverse_tree(&mut target, &mut set_heights).unwrap();
    let mut annotation = AnnotationAction::new(HeightsSummary::Median, ["height"]);
    system.traverse_tree(&mut target, &mut annotation).unwrap();

    let (cherry, _) = target.root().binary_children().unwrap();
    let mean = target.attribute(cherry, "height_mean").and_then(|v| v.as_f64()).unwrap();
    assert!((mean - 21.6).abs() < 1e-9);
    assert_eq!(target.attribute(cherry, "height_median"), Some(&AnnotationValue::Float(2.0)));
    assert_eq!(
        target.attribute(cherry, "height_range"),
        Some(&AnnotationValue::pair(1.0, 100.0))
    );
    // 95% of five samples is the whole sample
    assert_eq!(
        target.attribute(cherry, "height_95%_HPD"),
        Some(&AnnotationValue::pair(1.0, 100.0))
    );
    assert_eq!(target.height(cherry), 2.0);
    assert_eq!(target.height(target.root_index()), 200.0);
}
