//! Vertex of a rooted phylogenetic tree.

use crate::model::taxon_set::TaxonIndex;
use crate::model::tree::VertexIndex;
use smallvec::SmallVec;

/// Child list; binary vertices stay inline.
pub type Children = SmallVec<[VertexIndex; 2]>;

// =#========================================================================#=
// VERTEX
// =#========================================================================#=
/// A vertex (node) in a [Tree](crate::model::Tree) arena.
///
/// A vertex is either:
/// - **Root**: no parent
/// - **Internal**: at least one child, no taxon
/// - **Leaf**: no children, references a taxon
///
/// # Invariants
/// - `index` is the position of this vertex in the arena
/// - `height` is the time before present; a parent is never lower than its children
/// - Leaves carry a `taxon`, internal vertices do not
#[derive(PartialEq, Debug, Clone)]
pub struct Vertex {
    index: VertexIndex,
    parent: Option<VertexIndex>,
    children: Children,
    taxon: Option<TaxonIndex>,
    height: f64,
}

impl Vertex {
    /// Creates a new leaf vertex for the given taxon.
    pub fn new_leaf(index: VertexIndex, taxon: TaxonIndex, height: f64) -> Self {
        Vertex {
            index,
            parent: None,
            children: Children::new(),
            taxon: Some(taxon),
            height,
        }
    }

    /// Creates a new internal vertex with the given children.
    pub fn new_internal(index: VertexIndex, children: Children, height: f64) -> Self {
        Vertex {
            index,
            parent: None,
            children,
            taxon: None,
            height,
        }
    }

    pub fn index(&self) -> VertexIndex {
        self.index
    }

    pub fn parent(&self) -> Option<VertexIndex> {
        self.parent
    }

    pub(crate) fn set_parent(&mut self, parent: VertexIndex) {
        self.parent = Some(parent);
    }

    pub fn children(&self) -> &[VertexIndex] {
        &self.children
    }

    pub(crate) fn push_child(&mut self, child: VertexIndex) {
        self.children.push(child);
    }

    /// Returns both children if this vertex is bifurcating.
    pub fn binary_children(&self) -> Option<(VertexIndex, VertexIndex)> {
        match self.children.as_slice() {
            [left, right] => Some((*left, *right)),
            _ => None,
        }
    }

    pub fn taxon(&self) -> Option<TaxonIndex> {
        self.taxon
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn set_height(&mut self, height: f64) {
        self.height = height;
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn is_internal(&self) -> bool {
        !self.children.is_empty()
    }
}
