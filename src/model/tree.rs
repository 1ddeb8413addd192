//! Rooted phylogenetic trees with vertex heights and annotations.
//!
//! [Tree] is an arena of [Vertex] referenced by [VertexIndex]. Trees read
//! from a posterior sample, user target trees and the constructed summary
//! trees all share this representation.

use crate::model::annotation::{AnnotationValue, Annotations};
use crate::model::taxon_set::TaxonIndex;
use crate::model::vertex::{Children, Vertex};

/// Float comparison tolerance
const EPSILON: f64 = 1e-7;

/// Index of a vertex in a tree (arena).
pub type VertexIndex = usize;

/// *During construction only*, index for unset root.
const NO_ROOT_SET_INDEX: VertexIndex = usize::MAX;

// =$========================================================================$=
// TREE
// =$========================================================================$=
/// A rooted phylogenetic tree represented using the arena pattern on [Vertex].
///
/// # Structure
/// - All vertices (root, internal, and leaves) are stored in the arena.
/// - Index of root is maintained.
/// - No assumption on order of indices is made.
/// - Internal vertices may have any number of children; algorithms that
///   need bifurcating trees check [Tree::is_binary] or the vertex arity.
/// - Heights are stored per vertex; branch lengths derive from them.
///
/// # Construction
/// Add leaves and internal vertices bottom-up, then mark the root with
/// [Tree::set_root]. Test validity with [Tree::is_valid].
///
/// # Example
/// ```
/// use cladewick::model::Tree;
///
/// let mut tree = Tree::new();
/// let a = tree.add_leaf(0, 0.0);
/// let b = tree.add_leaf(1, 0.0);
/// let root = tree.add_internal(&[a, b], 1.5);
/// tree.set_root(root);
///
/// assert!(tree.is_valid());
/// assert_eq!(tree.branch_length(a), Some(1.5));
/// assert_eq!(tree.branch_length(root), None);
/// ```
#[derive(Debug, Clone)]
pub struct Tree {
    /// Vertices of this tree (arena pattern)
    vertices: Vec<Vertex>,

    /// Index of the root of this tree
    root_index: VertexIndex,

    /// Name of tree; optional, e.g. when parsed from Nexus file
    name: Option<String>,

    /// Per-vertex `[&key=value]` data
    annotations: Annotations,
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// New, Getters / Accessors, etc. (pub)
// ============================================================================
impl Tree {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Creates an empty tree with room for a binary tree on `num_leaves` leaves.
    pub fn with_capacity(num_leaves: usize) -> Self {
        Tree {
            vertices: Vec::with_capacity((2 * num_leaves).saturating_sub(1)),
            root_index: NO_ROOT_SET_INDEX,
            name: None,
            annotations: Annotations::new(),
        }
    }

    /// Attaches a name to this tree.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Adds a leaf for `taxon` at the given height, returning its index.
    pub fn add_leaf(&mut self, taxon: TaxonIndex, height: f64) -> VertexIndex {
        let index = self.vertices.len();
        self.vertices.push(Vertex::new_leaf(index, taxon, height));
        index
    }

    /// Adds an internal vertex above the given children, returning its index.
    ///
    /// # Panics
    /// Panics if a child index is out of bounds.
    pub fn add_internal(&mut self, children: &[VertexIndex], height: f64) -> VertexIndex {
        let index = self.vertices.len();
        self.vertices
            .push(Vertex::new_internal(index, Children::from_slice(children), height));
        for &child in children {
            self.vertices[child].set_parent(index);
        }
        index
    }

    /// Appends `child` to the children of `parent`.
    pub fn attach(&mut self, parent: VertexIndex, child: VertexIndex) {
        self.vertices[parent].push_child(child);
        self.vertices[child].set_parent(parent);
    }

    /// Marks the given vertex as root.
    pub fn set_root(&mut self, index: VertexIndex) {
        self.root_index = index;
    }

    /// Returns whether root of tree has been set.
    pub fn is_root_set(&self) -> bool {
        self.root_index != NO_ROOT_SET_INDEX
    }

    /// Returns the index of the root.
    pub fn root_index(&self) -> VertexIndex {
        self.root_index
    }

    /// Returns a reference to the root vertex.
    ///
    /// # Panics
    /// Panics if the root hasn't been set.
    pub fn root(&self) -> &Vertex {
        &self.vertices[self.root_index]
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    pub fn vertex(&self, index: VertexIndex) -> &Vertex {
        &self.vertices[index]
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    /// Returns the number of leaves in this tree.
    pub fn num_leaves(&self) -> usize {
        self.vertices.iter().filter(|v| v.is_leaf()).count()
    }

    /// Returns the number of internal vertices in this tree.
    pub fn num_internal(&self) -> usize {
        self.vertices.iter().filter(|v| v.is_internal()).count()
    }

    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    /// Returns whether every internal vertex has exactly two children.
    pub fn is_binary(&self) -> bool {
        self.vertices
            .iter()
            .all(|v| v.is_leaf() || v.children().len() == 2)
    }

    pub fn height(&self, index: VertexIndex) -> f64 {
        self.vertices[index].height()
    }

    pub fn set_height(&mut self, index: VertexIndex, height: f64) {
        self.vertices[index].set_height(height);
    }

    /// Returns the length of the branch above `index`: parent height minus
    /// own height, or `None` for the root.
    pub fn branch_length(&self, index: VertexIndex) -> Option<f64> {
        self.vertices[index]
            .parent()
            .map(|parent| self.vertices[parent].height() - self.vertices[index].height())
    }

    /// Sets all heights from branch lengths, the deepest leaf at height 0.
    ///
    /// # Arguments
    /// * `branch_lengths` - Length above each vertex, by index; missing
    ///   lengths count as 0
    pub fn set_heights_from_branch_lengths(&mut self, branch_lengths: &[Option<f64>]) {
        if !self.is_root_set() {
            return;
        }
        let mut depths = vec![0.0; self.vertices.len()];
        let order: Vec<VertexIndex> = self.pre_order_iter().map(Vertex::index).collect();
        for &index in &order {
            if let Some(parent) = self.vertices[index].parent() {
                let length = branch_lengths.get(index).copied().flatten().unwrap_or(0.0);
                depths[index] = depths[parent] + length;
            }
        }
        let max_depth = order.iter().map(|&i| depths[i]).fold(0.0, f64::max);
        for index in order {
            self.vertices[index].set_height(max_depth - depths[index]);
        }
    }

    /// Returns the taxa below the given vertex, sorted.
    pub fn taxa_below(&self, index: VertexIndex) -> Vec<TaxonIndex> {
        let mut taxa = Vec::new();
        let mut stack = vec![index];
        while let Some(current) = stack.pop() {
            let vertex = &self.vertices[current];
            if let Some(taxon) = vertex.taxon() {
                taxa.push(taxon);
            }
            stack.extend_from_slice(vertex.children());
        }
        taxa.sort_unstable();
        taxa
    }

    pub fn annotations(&self) -> &Annotations {
        &self.annotations
    }

    pub fn annotations_mut(&mut self) -> &mut Annotations {
        &mut self.annotations
    }

    /// Returns the annotation `key` of the given vertex.
    pub fn attribute(&self, index: VertexIndex, key: &str) -> Option<&AnnotationValue> {
        self.annotations.get(key, index)
    }

    /// Sets the annotation `key` of the given vertex.
    pub fn set_attribute(&mut self, index: VertexIndex, key: impl Into<String>, value: impl Into<AnnotationValue>) {
        self.annotations.set(key, index, value.into());
    }

    /// Validates the tree structure and all index references.
    ///
    /// Checks:
    /// - Root index is set, in bounds, and the root has no parent
    /// - All vertex indices match their position in the arena
    /// - Parent and child references agree in both directions
    /// - Leaves carry a taxon, internal vertices don't
    /// - No vertex is lower than one of its children
    /// - Every vertex is reachable from the root
    pub fn is_valid(&self) -> bool {
        if self.root_index >= self.vertices.len() || self.root().parent().is_some() {
            return false;
        }

        for (index, vertex) in self.vertices.iter().enumerate() {
            if vertex.index() != index {
                return false;
            }
            if vertex.is_leaf() != vertex.taxon().is_some() {
                return false;
            }
            for &child in vertex.children() {
                if child >= self.vertices.len() || self.vertices[child].parent() != Some(index) {
                    return false;
                }
                if self.vertices[child].height() > vertex.height() + EPSILON {
                    return false;
                }
            }
            if index != self.root_index {
                match vertex.parent() {
                    Some(parent) if parent < self.vertices.len() => {
                        if !self.vertices[parent].children().contains(&index) {
                            return false;
                        }
                    }
                    _ => return false,
                }
            }
        }

        self.pre_order_iter().count() == self.vertices.len()
    }
}

impl std::ops::Index<VertexIndex> for Tree {
    type Output = Vertex;

    fn index(&self, index: VertexIndex) -> &Self::Output {
        &self.vertices[index]
    }
}

impl std::ops::IndexMut<VertexIndex> for Tree {
    fn index_mut(&mut self, index: VertexIndex) -> &mut Self::Output {
        &mut self.vertices[index]
    }
}

// =$========================================================================$=
// ITERATORS
// =$========================================================================$=
impl Tree {
    /// Returns an iterator over the tree in post-order (children before parents).
    pub fn post_order_iter(&self) -> PostOrderIter<'_> {
        PostOrderIter::new(self)
    }

    /// Returns an iterator over the tree in pre-order (parents before children).
    pub fn pre_order_iter(&self) -> PreOrderIter<'_> {
        PreOrderIter::new(self)
    }
}

/// Iterator for post-order traversal (children before parents).
///
/// Stack-based, so deep (caterpillar) trees don't overflow.
pub struct PostOrderIter<'a> {
    tree: &'a Tree,
    stack: Vec<(VertexIndex, bool)>, // (index, children_visited)
}

impl<'a> PostOrderIter<'a> {
    fn new(tree: &'a Tree) -> Self {
        let mut stack = Vec::new();
        if tree.is_root_set() {
            stack.push((tree.root_index, false));
        }
        PostOrderIter { tree, stack }
    }
}

impl<'a> Iterator for PostOrderIter<'a> {
    type Item = &'a Vertex;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((index, children_visited)) = self.stack.pop() {
            let vertex = &self.tree[index];

            if children_visited || vertex.is_leaf() {
                return Some(vertex);
            }
            self.stack.push((index, true));
            // Reversed, so the first child is processed first
            for &child in vertex.children().iter().rev() {
                self.stack.push((child, false));
            }
        }
        None
    }
}

/// Iterator for pre-order traversal (parents before children).
pub struct PreOrderIter<'a> {
    tree: &'a Tree,
    stack: Vec<VertexIndex>,
}

impl<'a> PreOrderIter<'a> {
    fn new(tree: &'a Tree) -> Self {
        let mut stack = Vec::new();
        if tree.is_root_set() {
            stack.push(tree.root_index);
        }
        PreOrderIter { tree, stack }
    }
}

impl<'a> Iterator for PreOrderIter<'a> {
    type Item = &'a Vertex;

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.stack.pop()?;
        let vertex = &self.tree[index];
        for &child in vertex.children().iter().rev() {
            self.stack.push(child);
        }
        Some(vertex)
    }
}
