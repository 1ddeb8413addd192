//! Cladewick is a library to summarize posterior samples of phylogenetic
//! trees into a single annotated summary tree.
//!
//! This crate reads the tree sample of a Bayesian MCMC analysis (Nexus),
//! counts every clade across the sample and builds or selects the best
//! supported summary tree, annotated with clade credibilities and summary
//! statistics of heights and vertex attributes.
//! Core functionality provided:
//! - Clades: bitset or fingerprint [clade keys](crate::clade::key), and a
//!   [CladeSystem](crate::clade::CladeSystem) accumulating counts,
//!   sub-clade pairs and attribute samples over all trees.
//! - Summary trees (see [crate::summary]):
//!   - HIPSTR and MrHIPSTR: the tree of highest product of independent
//!     clade credibilities, built by dynamic programming
//!   - MCC: the sampled tree of maximum clade credibility
//!   - Majority-rule consensus
//! - Annotation: heights (mean, median or kept) and per-clade statistics
//!   such as posterior, 95% HPD intervals, ranges, discrete trait sets and
//!   2-D HPD contours (see [crate::action] and [crate::stats]).
//! - I/O: a lazy, resettable [Nexus reader](crate::nexus::NexusReader), a
//!   [Newick parser](crate::newick::NewickParser) with `[&key=value]`
//!   annotations, and writers for both.
//! - Driver: [TreeAnnotator](crate::annotator::TreeAnnotator) running the
//!   whole pipeline on its own thread pool.
//!
//! Limitations:
//! - Sample trees must be bifurcating and share one taxon set
//! - Common-ancestor heights are not supported
//!
//! # Usage patterns
//! 1. Run the full pipeline with the
//!    [TreeAnnotatorBuilder](crate::annotator::TreeAnnotatorBuilder) (or
//!    the `cladewick` binary).
//! 2. Assemble the pieces yourself: read trees, fill a clade system and
//!    use the builders and actions directly.
//!
//! ## Example Pipeline
//! ```no_run
//! use cladewick::annotator::{Burnin, Target, TreeAnnotatorBuilder};
//!
//! let mut annotator = TreeAnnotatorBuilder::for_file("mcmc_samples.trees")
//!     .with_target(Target::Hipstr)
//!     .with_burnin(Burnin::Percentage(0.1))
//!     .with_output("summary.tree")
//!     .build()?;
//! annotator.run()?;
//! # Ok::<(), cladewick::error::AnnotatorError>(())
//! ```
//!
//! ## Example Building Blocks
//! ```
//! use cladewick::clade::{BitsetScheme, CladeSystem};
//! use cladewick::newick::NewickParser;
//! use cladewick::summary::HipstrBuilder;
//!
//! let mut parser = NewickParser::new();
//! let trees = vec![
//!     parser.parse_str("((Kea:1,Kaka:1):1,Kakapo:2);").unwrap(),
//!     parser.parse_str("((Kea:1,Kaka:1):1,Kakapo:2);").unwrap(),
//!     parser.parse_str("((Kea:1,Kakapo:1):1,Kaka:2);").unwrap(),
//! ];
//!
//! let mut system = CladeSystem::new(BitsetScheme, true);
//! system.add_all(&trees).unwrap();
//! system.calculate_clade_credibilities(trees.len()).unwrap();
//!
//! let hipstr = HipstrBuilder::new().build(&mut system).unwrap();
//! assert!((hipstr.score - (2.0f64 / 3.0).ln()).abs() < 1e-12);
//! ```

pub mod action;
pub mod annotator;
pub mod clade;
pub mod error;
pub mod model;
pub mod newick;
pub mod nexus;
pub mod parser;
pub mod progress;
pub mod stats;
pub mod summary;

use crate::model::{TaxonSet, Tree};
use crate::parser::ParsingError;
use std::path::Path;

// ============================================================================
// Quick API
// ============================================================================
/// Parses all trees of a NEXUS file, returning them with their shared
/// [TaxonSet].
///
/// See [`nexus::parse_file`] for full documentation.
pub fn parse_nexus_file<P: AsRef<Path>>(path: P) -> Result<(Vec<Tree>, TaxonSet), ParsingError> {
    nexus::parse_file(path)
}

/// Parses a single Newick string with a fresh taxon set.
pub fn parse_newick_str<S: AsRef<str>>(newick: S) -> Result<Tree, ParsingError> {
    newick::NewickParser::new().parse_str(newick.as_ref())
}

/// Parses a file of semicolon-terminated Newick strings, returning the
/// trees with their shared [TaxonSet].
///
/// See [`newick::parse_file`] for full documentation.
pub fn parse_newick_file<P: AsRef<Path>>(path: P) -> Result<(Vec<Tree>, TaxonSet), ParsingError> {
    newick::parse_file(path)
}
