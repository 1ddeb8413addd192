//! Highest independent posterior subtree reconstruction (HIPSTR).
//!
//! HIPSTR builds a summary tree from the clade DAG rather than picking
//! one of the sampled trees. Each clade is scored as its own log
//! credibility plus the best score over its recorded sub-clade pairs;
//! memoizing per clade keeps the work linear in the size of the DAG.

use crate::clade::{CladeIndex, CladeSystem, KeyScheme, SubCladePair};
use crate::error::CladeError;
use crate::model::{Tree, VertexIndex};
use tracing::debug;

/// Relative tolerance for treating two pair scores as tied.
const TIE_TOLERANCE: f64 = 1e-12;

/// A reconstructed tree with its score.
#[derive(Debug, Clone)]
pub struct HipstrResult {
    /// Binary tree over all taxa; all heights are 0
    pub tree: Tree,
    /// Score of the root clade
    pub score: f64,
}

/// Builds HIPSTR (and majority-rule MrHIPSTR) trees.
///
/// # Example
/// ```
/// use cladewick::clade::{BitsetScheme, CladeSystem};
/// use cladewick::newick::NewickParser;
/// use cladewick::summary::HipstrBuilder;
///
/// let mut parser = NewickParser::new();
/// let mut system = CladeSystem::new(BitsetScheme, true);
/// for newick in ["((Tui,Bellbird),(Saddleback,Stitchbird));", "((Tui,Bellbird),(Stitchbird,Saddleback));"] {
///     system.add(&parser.parse_str(newick).unwrap()).unwrap();
/// }
/// system.calculate_clade_credibilities(2).unwrap();
///
/// let result = HipstrBuilder::new().build(&mut system).unwrap();
/// assert_eq!(result.score, 0.0);
/// assert_eq!(result.tree.num_leaves(), 4);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct HipstrBuilder {
    majority_rule: bool,
    break_ties: bool,
}

impl Default for HipstrBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl HipstrBuilder {
    pub fn new() -> Self {
        HipstrBuilder {
            majority_rule: false,
            break_ties: true,
        }
    }

    /// MrHIPSTR: clades with credibility above 0.5 earn a bonus equal to
    /// their size.
    pub fn majority_rule(mut self, majority_rule: bool) -> Self {
        self.majority_rule = majority_rule;
        self
    }

    /// Among equally scored pairs, prefer the one with the highest summed
    /// credibility (default); otherwise the first pair wins.
    ///
    /// Pair scores count as equal when they differ by at most a relative
    /// `1e-12`, so scores that only differ by rounding are ties too.
    pub fn break_ties(mut self, break_ties: bool) -> Self {
        self.break_ties = break_ties;
        self
    }

    /// Scores the clade DAG and materializes the best tree.
    ///
    /// Requires calculated credibilities and recorded sub-clades.
    ///
    /// # Errors
    /// - [CladeError::EmptySystem] if the system has no root
    /// - [CladeError::MissingSubClades] if a clade of size > 1 has no pairs
    pub fn build<S: KeyScheme>(&self, system: &mut CladeSystem<S>) -> Result<HipstrResult, CladeError> {
        let root = system.root_clade().ok_or(CladeError::EmptySystem)?;
        for clade in system.clades_mut() {
            clade.best_score = None;
            clade.best_sub_clades = None;
        }

        let score = self.score(system, root)?;
        let tree = materialize(system, root)?;
        debug!(score, vertices = tree.num_vertices(), "built HIPSTR tree");
        Ok(HipstrResult { tree, score })
    }

    fn base_score<S: KeyScheme>(&self, system: &CladeSystem<S>, index: CladeIndex) -> f64 {
        let clade = system.clade(index);
        let credibility = clade.credibility();
        let bonus = if self.majority_rule && credibility > 0.5 {
            clade.size() as f64
        } else {
            0.0
        };
        credibility.ln() + bonus
    }

    /// Scores `root` and everything below it, bottom-up with an explicit stack.
    fn score<S: KeyScheme>(&self, system: &mut CladeSystem<S>, root: CladeIndex) -> Result<f64, CladeError> {
        let mut stack: Vec<(CladeIndex, bool)> = vec![(root, false)];
        while let Some((index, children_scored)) = stack.pop() {
            let clade = system.clade(index);
            if clade.best_score().is_some() {
                continue;
            }
            if clade.is_tip() {
                system.clades_mut()[index].best_score = Some(0.0);
                continue;
            }
            let pairs = clade.sub_clades();
            if pairs.is_empty() {
                return Err(CladeError::MissingSubClades { size: clade.size() });
            }

            if !children_scored {
                stack.push((index, true));
                for &(left, right) in &pairs {
                    for side in [left, right] {
                        if system.clade(side).best_score().is_none() {
                            stack.push((side, false));
                        }
                    }
                }
                continue;
            }

            let (best_pair, best_sum) = self.best_pair(system, &pairs);
            let (left, right) = best_pair;
            let oriented = if system.clade(left).size() > system.clade(right).size() {
                (right, left)
            } else {
                (left, right)
            };
            let score = self.base_score(system, index) + best_sum;
            let clade = &mut system.clades_mut()[index];
            clade.best_sub_clades = Some(oriented);
            clade.best_score = Some(score);
        }
        Ok(system.clade(root).best_score().unwrap_or(0.0))
    }

    /// The pair with the highest summed score among scored pairs.
    fn best_pair<S: KeyScheme>(&self, system: &CladeSystem<S>, pairs: &[SubCladePair]) -> (SubCladePair, f64) {
        let score_of = |i: CladeIndex| system.clade(i).best_score().unwrap_or(f64::NEG_INFINITY);
        let credibility_of = |(l, r): SubCladePair| system.clade(l).credibility() + system.clade(r).credibility();

        let mut best = pairs[0];
        let mut best_sum = score_of(best.0) + score_of(best.1);
        for &pair in &pairs[1..] {
            let sum = score_of(pair.0) + score_of(pair.1);
            let tied = (sum - best_sum).abs() <= TIE_TOLERANCE * best_sum.abs().max(1.0);
            if tied {
                if self.break_ties && credibility_of(pair) > credibility_of(best) {
                    best = pair;
                    best_sum = sum;
                }
            } else if sum > best_sum {
                best = pair;
                best_sum = sum;
            }
        }
        (best, best_sum)
    }
}

/// Walks the best sub-clade links from `root` into a tree with heights 0.
pub(crate) fn materialize<S: KeyScheme>(system: &CladeSystem<S>, root: CladeIndex) -> Result<Tree, CladeError> {
    let mut tree = Tree::with_capacity(system.clade(root).size());
    let mut work: Vec<(CladeIndex, bool)> = vec![(root, false)];
    let mut built: Vec<VertexIndex> = Vec::new();

    while let Some((index, expanded)) = work.pop() {
        let clade = system.clade(index);
        if let Some(taxon) = clade.taxon() {
            built.push(tree.add_leaf(taxon, 0.0));
            continue;
        }
        let (left, right) = clade
            .best_sub_clades()
            .ok_or(CladeError::MissingSubClades { size: clade.size() })?;
        if expanded {
            let right_vertex = built.pop();
            let left_vertex = built.pop();
            if let (Some(l), Some(r)) = (left_vertex, right_vertex) {
                built.push(tree.add_internal(&[l, r], 0.0));
            }
        } else {
            work.push((index, true));
            work.push((right, false));
            work.push((left, false));
        }
    }

    if let Some(root_vertex) = built.pop() {
        tree.set_root(root_vertex);
    }
    Ok(tree)
}
