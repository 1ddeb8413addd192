use cladewick::model::{AnnotationValue, TaxonSet, Tree};

#[test]
fn test_building_tree() {
    let mut tree = Tree::with_capacity(3);
    let index_l1 = tree.add_leaf(0, 0.0);
    let index_l2 = tree.add_leaf(1, 0.0);
    let index_l3 = tree.add_leaf(2, 1.0);
    let index_i1 = tree.add_internal(&[index_l1, index_l2], 1.0);
    let index_root = tree.add_internal(&[index_l3, index_i1], 2.5);
    tree.set_root(index_root);

    // Counts
    assert_eq!(tree.num_leaves(), 3);
    assert_eq!(tree.num_internal(), 2);
    assert_eq!(tree.num_vertices(), 5);
    assert!(tree.is_valid());
    assert!(tree.is_binary());

    // Root
    let root = tree.root();
    assert_eq!(root.index(), index_root);
    assert!(root.is_root());
    assert_eq!(root.parent(), None);
    assert_eq!(tree.branch_length(index_root), None);

    // Leaf
    let l2 = &tree[index_l2];
    assert!(l2.is_leaf());
    assert_eq!(l2.index(), index_l2);
    assert_eq!(l2.taxon(), Some(1));
    assert!(l2.children().is_empty());
    assert_eq!(l2.binary_children(), None);

    // Internal
    let inti = &tree[index_i1];
    assert!(inti.is_internal());
    assert_eq!(inti.taxon(), None);
    assert_eq!(inti.parent(), Some(index_root));
    assert_eq!(inti.binary_children(), Some((index_l1, index_l2)));
    assert_eq!(tree.branch_length(index_i1), Some(1.5));
    assert_eq!(tree.branch_length(index_l3), Some(1.5));
}

#[test]
fn test_attach_builds_polytomies() {
    let mut tree = Tree::new();
    let root = tree.add_internal(&[], 1.0);
    tree.set_root(root);
    for taxon in 0..4 {
        let leaf = tree.add_leaf(taxon, 0.0);
        tree.attach(root, leaf);
    }

    assert_eq!(tree.root().children().len(), 4);
    assert!(!tree.is_binary());
    assert!(tree.is_valid());
    assert_eq!(tree.taxa_below(root), vec![0, 1, 2, 3]);
}

#[test]
fn test_invalid_trees() {
    // No root
    let mut tree = Tree::new();
    let kea = tree.add_leaf(0, 0.0);
    let kaka = tree.add_leaf(1, 0.0);
    assert!(!tree.is_valid());

    // Child above its parent
    let root = tree.add_internal(&[kea, kaka], 1.0);
    tree.set_root(root);
    assert!(tree.is_valid());
    tree.set_height(kea, 2.0);
    assert!(!tree.is_valid());
}

#[test]
fn test_traversal_orders() {
    let mut tree = Tree::new();
    let a = tree.add_leaf(0, 0.0);
    let b = tree.add_leaf(1, 0.0);
    let c = tree.add_leaf(2, 0.0);
    let cherry = tree.add_internal(&[a, b], 1.0);
    let root = tree.add_internal(&[cherry, c], 2.0);
    tree.set_root(root);

    let post: Vec<usize> = tree.post_order_iter().map(|v| v.index()).collect();
    assert_eq!(post.len(), 5);
    assert_eq!(post.last(), Some(&root));
    let position = |v| post.iter().position(|&x| x == v).unwrap();
    assert!(position(a) < position(cherry));
    assert!(position(b) < position(cherry));

    let pre: Vec<usize> = tree.pre_order_iter().map(|v| v.index()).collect();
    assert_eq!(pre.first(), Some(&root));
    assert_eq!(pre.len(), 5);
}

#[test]
fn test_heights_from_branch_lengths() {
    let mut tree = Tree::new();
    let a = tree.add_leaf(0, 0.0);
    let b = tree.add_leaf(1, 0.0);
    let root = tree.add_internal(&[a, b], 0.0);
    tree.set_root(root);
    tree.set_heights_from_branch_lengths(&[Some(1.0), Some(3.0), None]);

    assert_eq!(tree.height(root), 3.0);
    assert_eq!(tree.height(a), 2.0);
    assert_eq!(tree.height(b), 0.0);
}

#[test]
#[should_panic]
fn test_get_root_panics_on_empty_tree() {
    let tree = Tree::new();
    tree.root(); // Should panic
}

#[test]
#[should_panic]
fn test_get_vertex_out_of_bounds() {
    let tree = Tree::new();
    let _ = &tree[55];
}

// ============= Annotation Tests =============

#[test]
fn test_vertex_annotations() {
    let mut tree = Tree::new();
    let leaf = tree.add_leaf(0, 0.0);
    tree.set_root(leaf);
    tree.set_attribute(leaf, "rate", 0.5);
    tree.set_attribute(leaf, "location", "Kaikoura");
    tree.set_attribute(leaf, "height_95%_HPD", AnnotationValue::pair(0.1, 0.9));

    assert_eq!(tree.attribute(leaf, "rate"), Some(&AnnotationValue::Float(0.5)));
    assert_eq!(tree.attribute(leaf, "rate").and_then(|v| v.as_f64()), Some(0.5));
    assert_eq!(
        tree.attribute(leaf, "height_95%_HPD").and_then(|v| v.as_f64_array()),
        Some(vec![0.1, 0.9])
    );
    assert_eq!(tree.attribute(leaf, "missing"), None);

    let mut keys: Vec<&str> = tree.annotations().keys().collect();
    keys.sort_unstable();
    assert_eq!(keys, vec!["height_95%_HPD", "location", "rate"]);
}

#[test]
fn test_annotation_display() {
    assert_eq!(AnnotationValue::Float(1.0).to_string(), "1.0");
    assert_eq!(AnnotationValue::Int(3).to_string(), "3");
    assert_eq!(AnnotationValue::Bool(true).to_string(), "true");
    assert_eq!(AnnotationValue::String("Otago".to_string()).to_string(), "\"Otago\"");
    assert_eq!(AnnotationValue::pair(0.25, 2.0).to_string(), "{0.25,2.0}");
}

// ============= TaxonSet Tests =============

#[test]
fn test_get_or_insert_new_label() {
    let mut taxa = TaxonSet::new();
    let index_wrybill = taxa.get_or_insert("Anarhynchus frontalis");
    assert_eq!(index_wrybill, 0);
    assert!(taxa.contains_label("Anarhynchus frontalis"));
}

#[test]
fn test_get_or_insert_returns_same_index_for_duplicate() {
    let mut taxa = TaxonSet::with_capacity(3);
    let first = taxa.get_or_insert("Charadrius obscurus");
    let second = taxa.get_or_insert("Thinornis novaeseelandiae");
    assert_eq!(taxa.get_or_insert("Charadrius obscurus"), first);
    assert_eq!(second, 1);
    assert_eq!(taxa.len(), 2);
}

#[test]
fn test_from_labels_and_lookup() {
    let taxa = TaxonSet::from_labels(["Kea", "Kaka", "Kea", "Kakapo"]);
    assert_eq!(taxa.len(), 3);
    assert_eq!(taxa.labels(), &["Kea", "Kaka", "Kakapo"]);
    assert_eq!(taxa.index_of("Kakapo"), Some(2));
    assert_eq!(taxa.label(1), Some("Kaka"));
    assert_eq!(taxa.label(42), None);
    assert_eq!(taxa.index_of("Takahe"), None);
}
