//! Data model for rooted phylogenetic trees.
//!
//! # Tree representation
//! Trees are represented by [Tree], which uses the arena pattern to store
//! [Vertex] nodes referenced by [VertexIndex]. Vertices carry heights;
//! branch lengths are derived from them. Internal vertices may have any
//! arity, so consensus trees with polytomies share the representation.
//!
//! # Taxa
//! All trees of a run share one [TaxonSet]; leaves store a [TaxonIndex].
//! While parsing, labels flow through a [LabelResolver] that applies a
//! Nexus TRANSLATE table where present.
//!
//! # Annotations
//! `[&key=value,...]` comments on vertices are kept per tree in
//! [Annotations] as [AnnotationValue]s.

pub mod annotation;
pub mod label_resolver;
pub mod taxon_set;
pub mod tree;
pub mod vertex;

pub use annotation::{AnnotationValue, Annotations};
pub use label_resolver::LabelResolver;
pub use taxon_set::{TaxonIndex, TaxonSet};
pub use tree::{Tree, VertexIndex};
pub use vertex::Vertex;
