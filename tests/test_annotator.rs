use cladewick::action::HeightsSummary;
use cladewick::annotator::{AnnotationReport, Burnin, KeySchemeKind, Target, TreeAnnotatorBuilder};
use cladewick::clade::{BitsetScheme, CladeSystem};
use cladewick::error::AnnotatorError;
use cladewick::model::{AnnotationValue, Tree, VertexIndex};
use cladewick::newick::NewickParser;
use cladewick::nexus::NexusReader;
use cladewick::stats::ContourPath;
use std::fs;
use std::path::{Path, PathBuf};

const EPSILON: f64 = 1e-9;

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn sample_file() -> PathBuf {
    fixture("parrots_t10_n4_annotated.trees")
}

/// Path in the system temp directory, unique per test process.
fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("cladewick_{}_{name}", std::process::id()))
}

fn write_temp(name: &str, content: &str) -> PathBuf {
    let path = temp_path(name);
    fs::write(&path, content).unwrap();
    path
}

fn annotate(builder: TreeAnnotatorBuilder) -> Result<AnnotationReport, AnnotatorError> {
    builder.with_progress(false).build()?.annotate()
}

fn annotate_sample(target: Target) -> AnnotationReport {
    annotate(TreeAnnotatorBuilder::for_file(sample_file()).with_target(target)).unwrap()
}

/// Internal vertex spanning exactly `taxa`.
fn vertex_of(tree: &Tree, taxa: &[usize]) -> Option<VertexIndex> {
    tree.vertices()
        .iter()
        .map(|v| v.index())
        .find(|&v| tree[v].is_internal() && tree.taxa_below(v) == taxa)
}

fn float(tree: &Tree, vertex: VertexIndex, key: &str) -> f64 {
    tree.attribute(vertex, key).and_then(|v| v.as_f64()).unwrap()
}

fn same_topology(report: &AnnotationReport, newick: &str) -> bool {
    let mut parser = NewickParser::with_taxa(report.taxa.clone());
    let expected = parser.parse_str(newick).unwrap();
    let first = CladeSystem::from_tree(BitsetScheme, &report.tree).unwrap();
    let second = CladeSystem::from_tree(BitsetScheme, &expected).unwrap();
    first.clade_count() == second.clade_count() && first.common_clade_count(&second) == first.clade_count()
}

// --- TESTS TARGETS ---
#[test]
fn test_hipstr_target() {
    let report = annotate_sample(Target::Hipstr);

    assert_eq!(report.total_trees, 10);
    assert_eq!(report.burnin, 0);
    assert_eq!(report.trees_used, 10);
    assert_eq!(report.unique_clades, 6);
    assert_eq!(report.reference_clades, None);
    assert!((report.target_score - 0.42f64.ln()).abs() < EPSILON);
    assert!(same_topology(&report, "((Kea,Kaka),(Kakapo,Kokako));"));
    assert_eq!(report.tree.name(), Some("TREE1"));
}

#[test]
fn test_other_targets_agree_on_sample() {
    for target in [Target::MrHipstr, Target::Mcc, Target::MajorityRule] {
        let report = annotate_sample(target.clone());
        assert!(same_topology(&report, "((Kea,Kaka),(Kakapo,Kokako));"), "{target:?}");
        assert!((report.target_score - 0.42f64.ln()).abs() < EPSILON, "{target:?}");
    }
}

#[test]
fn test_mean_heights_and_posteriors() {
    let report = annotate_sample(Target::Hipstr);
    let tree = &report.tree;
    let cherry = vertex_of(tree, &[0, 1]).unwrap();
    let wattle = vertex_of(tree, &[2, 3]).unwrap();
    let root = tree.root_index();

    assert!((float(tree, cherry, "posterior") - 0.7).abs() < EPSILON);
    assert!((float(tree, wattle, "posterior") - 0.6).abs() < EPSILON);
    assert!((float(tree, root, "posterior") - 1.0).abs() < EPSILON);

    assert!((tree.height(cherry) - 9.4 / 7.0).abs() < EPSILON);
    assert!((tree.height(wattle) - 1.625).abs() < EPSILON);
    assert!((tree.height(root) - 3.45).abs() < EPSILON);
    assert!((float(tree, cherry, "height_median") - 1.3).abs() < EPSILON);

    let Some(AnnotationValue::Array(hpd)) = tree.attribute(cherry, "height_95%_HPD") else {
        panic!("missing height HPD");
    };
    assert_eq!(hpd.len(), 2);
    assert!(tree.attribute(cherry, "height_range").is_some());
}

#[test]
fn test_attribute_annotations() {
    let report = annotate_sample(Target::Hipstr);
    let tree = &report.tree;
    let cherry = vertex_of(tree, &[0, 1]).unwrap();

    // Fiordland in 5 of the 7 trees with {Kea,Kaka}
    assert_eq!(
        tree.attribute(cherry, "location"),
        Some(&AnnotationValue::String("Fiordland".to_string()))
    );
    assert!((float(tree, cherry, "location.prob") - 5.0 / 7.0).abs() < EPSILON);
    assert!(tree.attribute(cherry, "location.set").is_some());
    assert!(tree.attribute(cherry, "location.set.prob").is_some());

    assert!((float(tree, cherry, "rate") - 8.2 / 7.0).abs() < EPSILON);
    assert!(tree.attribute(cherry, "rate_95%_HPD").is_some());
    assert!(tree.attribute(cherry, "rate_signDistribution").is_some());

    let kea = tree
        .vertices()
        .iter()
        .find(|v| v.taxon() == Some(0))
        .map(|v| v.index())
        .unwrap();
    assert!((float(tree, kea, "rate") - 1.225).abs() < EPSILON);
    assert_eq!(tree.attribute(kea, "posterior"), None);
}

#[test]
fn test_median_and_kept_heights() {
    let median = annotate(
        TreeAnnotatorBuilder::for_file(sample_file()).with_heights(HeightsSummary::Median),
    )
    .unwrap();
    let cherry = vertex_of(&median.tree, &[0, 1]).unwrap();
    assert!((median.tree.height(cherry) - 1.3).abs() < EPSILON);

    // The MCC tree (STATE_0) keeps its own heights
    let kept = annotate(
        TreeAnnotatorBuilder::for_file(sample_file())
            .with_target(Target::Mcc)
            .with_heights(HeightsSummary::Keep),
    )
    .unwrap();
    let cherry = vertex_of(&kept.tree, &[0, 1]).unwrap();
    assert!((kept.tree.height(cherry) - 1.0).abs() < EPSILON);
    assert!((kept.tree.height(kept.tree.root_index()) - 3.0).abs() < EPSILON);

    // Constructed trees have no heights of their own and get the means
    let constructed = annotate(
        TreeAnnotatorBuilder::for_file(sample_file()).with_heights(HeightsSummary::Keep),
    )
    .unwrap();
    let cherry = vertex_of(&constructed.tree, &[0, 1]).unwrap();
    assert!((constructed.tree.height(cherry) - 9.4 / 7.0).abs() < EPSILON);
}

#[test]
fn test_count_limit_filters_rare_clades() {
    let report = annotate(
        TreeAnnotatorBuilder::for_file(sample_file())
            .with_target(Target::UserTree(write_temp(
                "rare_target.tree",
                "(((Kea,Kaka),Kakapo),Kokako);",
            )))
            .with_count_limit(2),
    )
    .unwrap();
    let tree = &report.tree;
    let rare = vertex_of(tree, &[0, 1, 2]).unwrap();

    assert!((float(tree, rare, "posterior") - 0.1).abs() < EPSILON);
    assert_eq!(tree.attribute(rare, "location"), None);
    assert_eq!(tree.attribute(rare, "height_median"), None);
    assert!((report.target_score - (0.1f64.ln() + 0.7f64.ln())).abs() < EPSILON);
}

#[test]
fn test_fingerprint_keys_and_threads() {
    let report = annotate(
        TreeAnnotatorBuilder::for_file(sample_file())
            .with_key_scheme(KeySchemeKind::Fingerprint)
            .with_seed(7)
            .with_threads(2)
            .with_batch_size(3),
    )
    .unwrap();
    assert_eq!(report.unique_clades, 6);
    assert!((report.target_score - 0.42f64.ln()).abs() < EPSILON);
    assert!(same_topology(&report, "((Kea,Kaka),(Kakapo,Kokako));"));
}

#[test]
fn test_enrichment_keeps_best_tree() {
    let report = annotate(TreeAnnotatorBuilder::for_file(sample_file()).with_enrichment(1, 1)).unwrap();
    assert!(same_topology(&report, "((Kea,Kaka),(Kakapo,Kokako));"));
}

// --- TESTS ARRAY ATTRIBUTES ---
fn location_sample(hpd_2d: Vec<f64>) -> AnnotationReport {
    annotate(TreeAnnotatorBuilder::for_file(fixture("parrots_t20_n3_location.trees")).with_hpd_2d(hpd_2d)).unwrap()
}

fn floats(tree: &Tree, vertex: VertexIndex, key: &str) -> Vec<f64> {
    tree.attribute(vertex, key).and_then(|v| v.as_f64_array()).unwrap()
}

#[test]
fn test_paired_attribute_components() {
    let report = location_sample(vec![0.8]);
    let tree = &report.tree;
    let cherry = vertex_of(tree, &[0, 1]).unwrap();

    assert!((float(tree, cherry, "location1") - 2.4).abs() < EPSILON);
    assert!((float(tree, cherry, "location2") - 2.9).abs() < EPSILON);
    assert_eq!(float(tree, cherry, "location1_median"), 2.4);
    assert_eq!(float(tree, cherry, "location2_median"), 2.9);
    assert_eq!(
        tree.attribute(cherry, "location1_range"),
        Some(&AnnotationValue::pair(1.98, 2.82))
    );
    assert_eq!(
        tree.attribute(cherry, "location2_range"),
        Some(&AnnotationValue::pair(2.38, 3.42))
    );
    assert_eq!(float(tree, cherry, "location1_positiveProb"), 1.0);

    // Both components vary: a joint region instead of per-component intervals
    assert_eq!(tree.attribute(cherry, "location1_95%_HPD"), None);
    assert_eq!(tree.attribute(cherry, "location2_95%_HPD"), None);

    // Constant at the root: means only
    let root = report.tree.root_index();
    assert_eq!(float(tree, root, "location1"), 1.0);
    assert_eq!(float(tree, root, "location2"), 1.0);
    assert_eq!(tree.attribute(root, "location1_median"), None);
    assert_eq!(tree.attribute(root, "location_80%HPD_modality"), None);
}

#[test]
fn test_paired_attribute_hpd_region() {
    let report = location_sample(vec![0.8, 0.95]);
    let tree = &report.tree;
    let cherry = vertex_of(tree, &[0, 1]).unwrap();

    for percent in [80, 95] {
        assert_eq!(
            tree.attribute(cherry, &format!("location_{percent}%HPD_modality")),
            Some(&AnnotationValue::Int(1))
        );
        let xs = floats(tree, cherry, &format!("location1_{percent}%HPD_1"));
        let ys = floats(tree, cherry, &format!("location2_{percent}%HPD_1"));
        assert_eq!(xs.len(), ys.len());
        assert!(xs.len() > 3);
        assert_eq!((xs[0], ys[0]), (xs[xs.len() - 1], ys[ys.len() - 1]));
        assert_eq!(tree.attribute(cherry, &format!("location1_{percent}%HPD_2")), None);

        let region = ContourPath { xs, ys };
        assert!(region.contains(2.4, 2.9));
        assert!(!region.contains(1.98, 2.38));
    }
}

#[test]
fn test_single_varying_component_gets_interval() {
    let report = location_sample(vec![0.8]);
    let tree = &report.tree;
    let cherry = vertex_of(tree, &[0, 1]).unwrap();

    // origin = {x, 1.5} with x in -0.5, -0.4, ..., 1.3 and 5.0
    assert!((float(tree, cherry, "origin1") - 0.63).abs() < EPSILON);
    assert!((float(tree, cherry, "origin1_median") - 0.45).abs() < EPSILON);
    assert_eq!(
        tree.attribute(cherry, "origin1_range"),
        Some(&AnnotationValue::pair(-0.5, 5.0))
    );
    assert!((float(tree, cherry, "origin1_positiveProb") - 0.75).abs() < EPSILON);
    assert_eq!(
        tree.attribute(cherry, "origin1_95%_HPD"),
        Some(&AnnotationValue::pair(-0.5, 1.3))
    );

    assert_eq!(float(tree, cherry, "origin2"), 1.5);
    assert_eq!(tree.attribute(cherry, "origin2_median"), None);
    assert_eq!(tree.attribute(cherry, "origin2_95%_HPD"), None);
    assert_eq!(tree.attribute(cherry, "origin_80%HPD_modality"), None);
}

// --- TESTS BURN-IN ---
#[test]
fn test_burnin_by_trees() {
    let report = annotate(
        TreeAnnotatorBuilder::for_file(sample_file()).with_burnin(Burnin::Trees(6)),
    )
    .unwrap();
    assert_eq!(report.burnin, 6);
    assert_eq!(report.trees_used, 4);
    assert!(same_topology(&report, "((Kea,Kakapo),(Kaka,Kokako));"));
    assert!((report.target_score - 2.0 * 0.75f64.ln()).abs() < EPSILON);
}

#[test]
fn test_burnin_by_states() {
    let report = annotate(
        TreeAnnotatorBuilder::for_file(sample_file()).with_burnin(Burnin::States(5500)),
    )
    .unwrap();
    assert_eq!(report.burnin, 6);
    assert_eq!(report.trees_used, 4);
}

#[test]
fn test_burnin_by_percentage() {
    let report = annotate(
        TreeAnnotatorBuilder::for_file(sample_file()).with_burnin(Burnin::Percentage(0.2)),
    )
    .unwrap();
    assert_eq!(report.burnin, 2);
    assert_eq!(report.trees_used, 8);
}

#[test]
fn test_burnin_too_large() {
    let result = annotate(TreeAnnotatorBuilder::for_file(sample_file()).with_burnin(Burnin::Trees(10)));
    assert!(matches!(
        result,
        Err(AnnotatorError::BurninTooLarge { burnin: 10, total: 10 })
    ));

    let result = annotate(TreeAnnotatorBuilder::for_file(sample_file()).with_burnin(Burnin::States(10_000)));
    assert!(matches!(result, Err(AnnotatorError::BurninTooLarge { .. })));
}

#[test]
fn test_state_burnin_needs_state_names() {
    let path = write_temp(
        "unnamed_states.trees",
        "#NEXUS\nBegin trees;\n tree first = ((Kea,Kaka),Kakapo);\n tree second = ((Kea,Kaka),Kakapo);\nEnd;\n",
    );
    let result = annotate(TreeAnnotatorBuilder::for_file(&path).with_burnin(Burnin::States(1)));
    assert!(matches!(result, Err(AnnotatorError::MissingState(name)) if name == "first"));
}

// --- TESTS ERRORS ---
#[test]
fn test_no_trees() {
    let empty_block = write_temp(
        "empty_trees_block.trees",
        "#NEXUS\nBegin taxa;\n Dimensions ntax=2;\n Taxlabels Kea Kaka;\nEnd;\nBegin trees;\nEnd;\n",
    );
    assert!(matches!(
        annotate(TreeAnnotatorBuilder::for_file(&empty_block)),
        Err(AnnotatorError::NoTrees)
    ));

    let no_block = write_temp(
        "no_trees_block.trees",
        "#NEXUS\nBegin taxa;\n Dimensions ntax=2;\n Taxlabels Kea Kaka;\nEnd;\n",
    );
    assert!(matches!(
        annotate(TreeAnnotatorBuilder::for_file(&no_block)),
        Err(AnnotatorError::NoTrees)
    ));
}

#[test]
fn test_missing_input() {
    let result = annotate(TreeAnnotatorBuilder::for_file(temp_path("does_not_exist.trees")));
    assert!(matches!(result, Err(AnnotatorError::Io { .. })));
}

#[test]
fn test_unsupported_settings() {
    let common_ancestor = TreeAnnotatorBuilder::for_file(sample_file())
        .with_heights(HeightsSummary::CommonAncestor)
        .build();
    assert!(matches!(common_ancestor, Err(AnnotatorError::Unsupported(_))));

    let enrich_fingerprints = TreeAnnotatorBuilder::for_file(sample_file())
        .with_key_scheme(KeySchemeKind::Fingerprint)
        .with_enrichment(1, 1)
        .build();
    assert!(matches!(enrich_fingerprints, Err(AnnotatorError::Unsupported(_))));
}

#[test]
fn test_non_binary_sample_rejected() {
    let path = write_temp(
        "polytomy.trees",
        "#NEXUS\nBegin trees;\n tree STATE_0 = ((Kea,Kaka),Kakapo);\n tree STATE_1 = (Kea,Kaka,Kakapo);\nEnd;\n",
    );
    let result = annotate(TreeAnnotatorBuilder::for_file(&path));
    assert!(matches!(result, Err(AnnotatorError::Clade(_))));
}

// --- TESTS USER AND REFERENCE TREES ---
#[test]
fn test_user_target_tree() {
    let target = write_temp("user_target.tree", "((Kea:1,Kakapo:1):1,(Kaka:1,Kokako:1):1);");
    let report = annotate_sample(Target::UserTree(target));

    assert!(same_topology(&report, "((Kea,Kakapo),(Kaka,Kokako));"));
    assert!((report.target_score - 2.0 * 0.3f64.ln()).abs() < EPSILON);
    let pair = vertex_of(&report.tree, &[0, 2]).unwrap();
    assert!((float(&report.tree, pair, "posterior") - 0.3).abs() < EPSILON);
}

#[test]
fn test_non_binary_user_target() {
    let target = write_temp(
        "user_polytomy.trees",
        "#NEXUS\nBegin trees;\n tree consensus = ((Kea,Kaka),Kakapo,Kokako);\nEnd;\n",
    );
    let report = annotate_sample(Target::UserTree(target));
    let tree = &report.tree;

    assert_eq!(tree.root().children().len(), 3);
    let cherry = vertex_of(tree, &[0, 1]).unwrap();
    assert!((float(tree, cherry, "posterior") - 0.7).abs() < EPSILON);
    assert!((tree.height(cherry) - 9.4 / 7.0).abs() < EPSILON);
}

#[test]
fn test_user_target_with_unknown_taxon() {
    let target = write_temp("user_unknown.tree", "((Kea,Kaka),(Kakapo,Kereru));");
    let result = annotate(TreeAnnotatorBuilder::for_file(sample_file()).with_target(Target::UserTree(target)));
    assert!(matches!(result, Err(AnnotatorError::Parse(_))));
}

#[test]
fn test_reference_tree() {
    let reference = write_temp("reference.tree", "((Kea,Kaka),Kakapo,Kokako);");
    let report = annotate(TreeAnnotatorBuilder::for_file(sample_file()).with_reference(&reference)).unwrap();
    // {Kea,Kaka} and the root
    assert_eq!(report.reference_clades, Some((2, 2)));
}

// --- TESTS METRICS ---
fn metric_rows(path: &Path) -> Vec<String> {
    fs::read_to_string(path).unwrap().lines().map(str::to_string).collect()
}

#[test]
fn test_tree_metrics() {
    let metrics = temp_path("metrics.tsv");
    let report = annotate(TreeAnnotatorBuilder::for_file(sample_file()).with_metrics(&metrics)).unwrap();
    assert!(same_topology(&report, "((Kea,Kaka),(Kakapo,Kokako));"));

    let rows = metric_rows(&metrics);
    assert_eq!(rows.len(), 11);
    assert_eq!(rows[0], "tree\tstate\trobinson_foulds");
    assert_eq!(rows[1], "0\t0\t0");
    assert_eq!(rows[6], "5\t5000\t0");
    // ((Kea,Kakapo),(Kaka,Kokako)) shares only the root
    for row in &rows[7..10] {
        assert!(row.ends_with("\t4"), "{row}");
    }
    // (((Kea,Kaka),Kakapo),Kokako) shares the cherry and the root
    assert_eq!(rows[10], "9\t9000\t2");
}

#[test]
fn test_tree_metrics_skip_burnin() {
    let metrics = temp_path("metrics_burnin.tsv");
    annotate(
        TreeAnnotatorBuilder::for_file(sample_file())
            .with_burnin(Burnin::Trees(6))
            .with_metrics(&metrics),
    )
    .unwrap();

    let rows = metric_rows(&metrics);
    assert_eq!(rows.len(), 5);
    assert_eq!(rows[1], "6\t6000\t0");
    assert_eq!(rows[4], "9\t9000\t4");
}

// --- TESTS OUTPUT ---
#[test]
fn test_run_writes_nexus() {
    let output = temp_path("annotated_output.tree");
    let mut annotator = TreeAnnotatorBuilder::for_file(sample_file())
        .with_output(&output)
        .with_progress(false)
        .build()
        .unwrap();
    assert_eq!(annotator.taxa().len(), 4);
    let report = annotator.run().unwrap();

    let written = fs::read_to_string(&output).unwrap();
    assert!(written.starts_with("#NEXUS"));
    assert!(written.contains("tree TREE1 = [&R] "));

    let mut reader = NexusReader::for_file(&output).unwrap();
    let tree = reader.next_tree().unwrap().unwrap();
    assert_eq!(reader.taxa(), &report.taxa);
    assert_eq!(tree.name(), Some("TREE1"));
    let cherry = vertex_of(&tree, &[0, 1]).unwrap();
    assert!((float(&tree, cherry, "posterior") - 0.7).abs() < 1e-6);
    assert_eq!(
        tree.attribute(cherry, "location"),
        Some(&AnnotationValue::String("Fiordland".to_string()))
    );
}
