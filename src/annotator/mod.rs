//! Summarizing a posterior tree sample into one annotated tree.
//!
//! A [TreeAnnotator] is configured with a [TreeAnnotatorBuilder] and
//! walks the input sample in several passes:
//!
//! 1. count the trees and resolve the [Burnin]
//! 2. accumulate all clades of the used trees into a clade system
//! 3. optionally enrich the recorded sub-clade pairs
//! 4. select or construct the [Target] tree
//! 5. optionally compare the target with a reference tree
//! 6. collect heights and vertex annotations per clade
//! 7. set heights and annotate the target, then write it as Nexus
//! 8. optionally write a table of per-tree distances to the target
//!
//! # Example
//! ```no_run
//! use cladewick::annotator::{Burnin, Target, TreeAnnotatorBuilder};
//! use cladewick::action::HeightsSummary;
//!
//! let mut annotator = TreeAnnotatorBuilder::for_file("falconidae.trees")
//!     .with_target(Target::Hipstr)
//!     .with_burnin(Burnin::Percentage(0.1))
//!     .with_heights(HeightsSummary::Median)
//!     .with_output("falconidae.tree")
//!     .build()?;
//! annotator.run()?;
//! # Ok::<(), cladewick::error::AnnotatorError>(())
//! ```

mod builder;
mod driver;

pub use builder::TreeAnnotatorBuilder;
pub use driver::{AnnotationReport, TreeAnnotator};

use std::path::PathBuf;

// =#========================================================================#=
// TARGET
// =#========================================================================#=
/// The tree that gets annotated.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Target {
    /// Highest independent posterior subtree reconstruction
    #[default]
    Hipstr,
    /// HIPSTR with a bonus for majority clades
    MrHipstr,
    /// The sampled tree with the highest log clade credibility
    Mcc,
    /// Majority-rule consensus tree, possibly non-binary
    MajorityRule,
    /// The first tree of a Nexus or Newick file
    UserTree(PathBuf),
}

impl Target {
    /// Whether the target is built from recorded sub-clade pairs.
    pub(crate) fn needs_sub_clades(&self) -> bool {
        matches!(self, Target::Hipstr | Target::MrHipstr | Target::MajorityRule)
    }

    /// Whether the target is constructed rather than taken from a file,
    /// so it carries no heights of its own.
    pub(crate) fn is_constructed(&self) -> bool {
        self.needs_sub_clades()
    }
}

// =#========================================================================#=
// BURNIN
// =#========================================================================#=
/// Specifies how many initial trees of the sample are discarded.
///
/// The first tree meeting the threshold fixes the burn-in for every pass.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Burnin {
    /// Use all trees
    #[default]
    None,
    /// Skip a fixed number of trees
    Trees(usize),
    /// Skip all trees whose `STATE_<n>` name has a state below the given one
    States(u64),
    /// Skip a fraction in [0.0, 1.0) of all trees
    Percentage(f64),
}

impl Burnin {
    /// Resolves the number of skipped trees.
    ///
    /// `names` is only consulted for [Burnin::States]; the name of the
    /// first tree with a state of at least the threshold decides.
    pub(crate) fn to_count(&self, total_trees: usize, names: &[String]) -> Result<usize, String> {
        match *self {
            Burnin::None => Ok(0),
            Burnin::Trees(n) => Ok(n),
            Burnin::Percentage(p) => Ok((total_trees as f64 * p).floor() as usize),
            Burnin::States(min_state) => {
                for (i, name) in names.iter().enumerate() {
                    let state = parse_state(name).ok_or_else(|| name.clone())?;
                    if state >= min_state {
                        return Ok(i);
                    }
                }
                Ok(names.len())
            }
        }
    }
}

/// State number of a tree named `STATE_<n>`.
pub(crate) fn parse_state(name: &str) -> Option<u64> {
    name.trim().strip_prefix("STATE_")?.parse().ok()
}

// =#========================================================================#=
// KEY SCHEME KIND
// =#========================================================================#=
/// Clade keys used for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeySchemeKind {
    /// Exact keys, one bit per taxon
    #[default]
    Bitset,
    /// 64-bit hashed keys; no sub-clade enrichment
    Fingerprint,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_burnin_trees_and_percentage() {
        assert_eq!(Burnin::None.to_count(100, &[]), Ok(0));
        assert_eq!(Burnin::Trees(10).to_count(100, &[]), Ok(10));
        assert_eq!(Burnin::Percentage(0.25).to_count(10, &[]), Ok(2));
    }

    #[test]
    fn test_burnin_states() {
        let states = names(&["STATE_0", "STATE_1000", "STATE_2000", "STATE_3000"]);
        assert_eq!(Burnin::States(1500).to_count(4, &states), Ok(2));
        assert_eq!(Burnin::States(2000).to_count(4, &states), Ok(2));
        assert_eq!(Burnin::States(0).to_count(4, &states), Ok(0));
        assert_eq!(Burnin::States(5000).to_count(4, &states), Ok(4));
    }

    #[test]
    fn test_burnin_states_without_state_name() {
        let states = names(&["STATE_0", "tree_two"]);
        assert_eq!(
            Burnin::States(10).to_count(2, &states),
            Err("tree_two".to_string())
        );
    }
}
