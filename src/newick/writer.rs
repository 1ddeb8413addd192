//! Newick string and file writing.

use crate::model::{TaxonSet, Tree, VertexIndex};
use crate::newick::defs::BUFFER_CHARS;
use crate::parser::utils::{escape_label, format_float};
use std::io::{self, Write};

/// Style for serializing tree to Newick format,
/// controlling how leaf labels are represented in the output string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NewickStyle {
    /// Use full taxon labels from the [TaxonSet]
    #[default]
    Label,
    /// Use 0-based indices (0, 1, 2, ...)
    ZeroIndexed,
    /// Use 1-based indices (1, 2, 3, ...) (as in Nexus files with TRANSLATE)
    OneIndexed,
}

/// Writes trees in Newick format, one tree per line.
///
/// # Errors
/// Returns an I/O error if writing fails.
pub fn write_newick<W: Write>(mut writer: W, trees: &[Tree], taxa: &TaxonSet, style: NewickStyle) -> io::Result<()> {
    let Some(first) = trees.first() else {
        return Ok(());
    };

    let estimated_capacity = estimate_newick_len(style, first, taxa, false);
    for tree in trees {
        let newick = to_newick_with_capacity(style, tree, taxa, false, estimated_capacity);
        writer.write_all(newick.as_bytes())?;
        writer.write_all(b"\n")?;
    }
    writer.flush()
}

/// Returns the Newick representation of a tree with closing semicolon.
///
/// Branch lengths are written for all vertices but the root; annotations
/// are left out.
///
/// # Example
/// ```
/// use cladewick::model::{TaxonSet, Tree};
/// use cladewick::newick::{NewickStyle, to_newick};
///
/// let taxa = TaxonSet::from_labels(["Little Spotted Kiwi", "Great Spotted Kiwi", "Rowi"]);
/// let mut tree = Tree::new();
/// let little = tree.add_leaf(0, 0.0);
/// let great = tree.add_leaf(1, 0.0);
/// let rowi = tree.add_leaf(2, 0.0);
/// let spotted = tree.add_internal(&[little, great], 1.0);
/// let root = tree.add_internal(&[spotted, rowi], 1.5);
/// tree.set_root(root);
///
/// assert_eq!(
///     to_newick(&tree, &taxa, NewickStyle::Label),
///     "(('Little Spotted Kiwi':1.0,'Great Spotted Kiwi':1.0):0.5,Rowi:1.5);"
/// );
/// assert_eq!(to_newick(&tree, &taxa, NewickStyle::OneIndexed), "((1:1.0,2:1.0):0.5,3:1.5);");
/// ```
pub fn to_newick(tree: &Tree, taxa: &TaxonSet, style: NewickStyle) -> String {
    let estimated_capacity = estimate_newick_len(style, tree, taxa, false);
    to_newick_with_capacity(style, tree, taxa, false, estimated_capacity)
}

/// Like [to_newick], with every annotated vertex followed by its
/// `[&key=value,...]` comment.
pub fn to_annotated_newick(tree: &Tree, taxa: &TaxonSet, style: NewickStyle) -> String {
    let estimated_capacity = estimate_newick_len(style, tree, taxa, true);
    to_newick_with_capacity(style, tree, taxa, true, estimated_capacity)
}

/// Steps of the iterative Newick writer.
enum Step {
    Enter(VertexIndex),
    Separator,
    Close(VertexIndex),
}

/// Returns the Newick representation of a tree with pre-allocated capacity.
pub(crate) fn to_newick_with_capacity(style: NewickStyle, tree: &Tree, taxa: &TaxonSet, annotated: bool, estimated_capacity: usize) -> String {
    let mut newick = String::with_capacity(estimated_capacity);
    if !tree.is_root_set() {
        newick.push(';');
        return newick;
    }

    let mut steps = vec![Step::Enter(tree.root_index())];
    while let Some(step) = steps.pop() {
        match step {
            Step::Enter(index) => {
                let vertex = &tree[index];
                if let Some(taxon) = vertex.taxon() {
                    push_taxon(&mut newick, style, taxa, taxon);
                    push_vertex_suffix(&mut newick, tree, index, annotated);
                    continue;
                }
                newick.push('(');
                steps.push(Step::Close(index));
                for (i, &child) in vertex.children().iter().enumerate().rev() {
                    steps.push(Step::Enter(child));
                    if i > 0 {
                        steps.push(Step::Separator);
                    }
                }
            }
            Step::Separator => newick.push(','),
            Step::Close(index) => {
                newick.push(')');
                push_vertex_suffix(&mut newick, tree, index, annotated);
            }
        }
    }

    newick.push(';');
    newick
}

fn push_taxon(newick: &mut String, style: NewickStyle, taxa: &TaxonSet, taxon: usize) {
    match style {
        NewickStyle::Label => match taxa.label(taxon) {
            Some(label) => newick.push_str(&escape_label(label)),
            None => newick.push_str(&(taxon + 1).to_string()),
        },
        NewickStyle::ZeroIndexed => newick.push_str(&taxon.to_string()),
        NewickStyle::OneIndexed => newick.push_str(&(taxon + 1).to_string()),
    }
}

/// Annotation comment (if requested) and branch length of a vertex.
fn push_vertex_suffix(newick: &mut String, tree: &Tree, index: VertexIndex, annotated: bool) {
    if annotated && tree.annotations().has_any(index) {
        newick.push_str("[&");
        for (i, (key, value)) in tree.annotations().for_vertex(index).enumerate() {
            if i > 0 {
                newick.push(',');
            }
            newick.push_str(key);
            newick.push('=');
            newick.push_str(&value.to_string());
        }
        newick.push(']');
    }
    if let Some(length) = tree.branch_length(index) {
        newick.push(':');
        newick.push_str(&format_float(length));
    }
}

/// Estimates the number of characters of the Newick string of a tree.
pub(crate) fn estimate_newick_len(style: NewickStyle, tree: &Tree, taxa: &TaxonSet, annotated: bool) -> usize {
    // "(,)" per internal vertex
    const INTERNAL_VERTEX_CHARS: usize = 3;
    // e.g. ":0.009529961339106089"
    const BRANCH_LENGTH_CHARS: usize = 20;
    // e.g. ",posterior=0.9512195121951219"
    const ANNOTATION_CHARS: usize = 30;

    let num_leaves = tree.num_leaves();
    let structure_capacity = tree.num_internal() * INTERNAL_VERTEX_CHARS;
    let label_capacity = match style {
        NewickStyle::Label => taxa.labels().iter().map(|s| escape_label(s).len()).sum(),
        NewickStyle::ZeroIndexed => calculate_index_digit_capacity(num_leaves, true),
        NewickStyle::OneIndexed => calculate_index_digit_capacity(num_leaves, false),
    };
    let branch_capacity = tree.num_vertices().saturating_sub(1) * BRANCH_LENGTH_CHARS;
    let annotation_capacity = if annotated {
        tree.num_vertices() * tree.annotations().keys().count() * ANNOTATION_CHARS
    } else {
        0
    };

    structure_capacity + label_capacity + branch_capacity + annotation_capacity + BUFFER_CHARS
}

/// Calculates the total number of characters needed to represent all indices.
///
/// # Examples
/// - 14 leaves, 1-indexed (1-14): 14*2 - 9 = 19 chars
/// - 102 leaves, 1-indexed (1-102): 102*3 - 9 - 90 = 198 chars
/// - 10 leaves, 0-indexed (0-9): 10*1 = 10 chars
fn calculate_index_digit_capacity(count: usize, zero_indexed: bool) -> usize {
    if count == 0 {
        return 0;
    }

    let max_index = if zero_indexed { count - 1 } else { count };
    if max_index == 0 {
        return 1;
    }

    let max_digits = max_index.ilog10() as usize + 1;
    let mut total = max_index * max_digits;

    // Subtract overcounting for lower digit counts: 9, then 99, then 999, ...
    let mut cumulative_count = 9;
    for digits in 1..max_digits {
        total -= cumulative_count * (max_digits - digits);
        cumulative_count = cumulative_count * 10 + 9;
    }

    // The extra one-digit 0
    if zero_indexed {
        total += 1;
    }
    total
}
