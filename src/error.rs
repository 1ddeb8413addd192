//! Error types of the clade system and the annotation driver.
//!
//! Parsing failures have their own [ParsingError]; the driver's
//! [AnnotatorError] wraps it together with [CladeError].

use crate::model::{TaxonIndex, VertexIndex};
use crate::parser::ParsingError;
use std::path::PathBuf;
use thiserror::Error;

/// Structural and contract violations raised by the clade system,
/// the traversal actions and the summary builders.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CladeError {
    #[error("vertex {vertex} has {arity} children, but a bifurcating tree is required")]
    NonBinaryVertex { vertex: VertexIndex, arity: usize },

    #[error("clade below vertex {vertex} is not present in the clade system")]
    MissingClade { vertex: VertexIndex },

    #[error("tree has {found} taxa, but the clade system was built on {expected}")]
    TaxonCountMismatch { expected: usize, found: usize },

    #[error("root clade of tree differs from the root clade of previous trees")]
    RootMismatch,

    #[error("clade observed {count} times, but only {total} trees were used")]
    CountExceedsTrees { count: usize, total: usize },

    #[error("clade of size {size} has no recorded sub-clades")]
    MissingSubClades { size: usize },

    #[error("taxon {0} is unknown to the clade system")]
    UnknownTaxon(TaxonIndex),

    #[error("sub-clade enrichment requires exact (bitset) clade keys")]
    EnrichmentUnsupported,

    #[error("clade system contains no trees")]
    EmptySystem,
}

/// Errors of a tree annotation run.
#[derive(Error, Debug)]
pub enum AnnotatorError {
    #[error("cannot access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Parse(#[from] ParsingError),

    #[error(transparent)]
    Clade(#[from] CladeError),

    #[error("no trees found in input")]
    NoTrees,

    #[error("burn-in of {burnin} removes all {total} trees")]
    BurninTooLarge { burnin: usize, total: usize },

    #[error("tree name '{0}' does not carry a state number (STATE_<n>)")]
    MissingState(String),

    #[error("unsupported option: {0}")]
    Unsupported(String),

    #[error("no target tree could be selected")]
    NoTargetTree,

    #[error("cannot start worker threads: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}
