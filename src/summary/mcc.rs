//! Maximum clade credibility (MCC) tree selection.

use crate::clade::{CladeSystem, KeyScheme};
use crate::error::CladeError;
use crate::model::Tree;

/// The selected tree with its score.
#[derive(Debug, Clone)]
pub struct MccResult {
    pub tree: Tree,
    /// Log clade credibility of the tree
    pub score: f64,
    /// 1-based position among the considered trees
    pub tree_number: usize,
}

/// Picks the tree with the highest log clade credibility from a stream.
///
/// Trees are offered one by one after credibilities were calculated. A
/// later tree only replaces the current best with a strictly higher
/// score, so the first of several equally good trees wins.
#[derive(Debug, Default)]
pub struct MccSelector {
    best: Option<MccResult>,
    considered: usize,
}

impl MccSelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scores `tree` and keeps it if it beats the current best.
    ///
    /// # Returns
    /// The tree's log clade credibility
    pub fn consider<S: KeyScheme>(&mut self, system: &CladeSystem<S>, tree: Tree) -> Result<f64, CladeError> {
        let score = system.log_clade_credibility(&tree)?;
        self.considered += 1;
        let better = self.best.as_ref().is_none_or(|best| score > best.score);
        if better {
            self.best = Some(MccResult {
                tree,
                score,
                tree_number: self.considered,
            });
        }
        Ok(score)
    }

    /// Number of trees considered so far.
    pub fn considered(&self) -> usize {
        self.considered
    }

    pub fn best(&self) -> Option<&MccResult> {
        self.best.as_ref()
    }

    pub fn finish(self) -> Option<MccResult> {
        self.best
    }

    /// Selects the MCC tree among `trees`.
    pub fn select<S, I>(system: &CladeSystem<S>, trees: I) -> Result<Option<MccResult>, CladeError>
    where
        S: KeyScheme,
        I: IntoIterator<Item = Tree>,
    {
        let mut selector = MccSelector::new();
        for tree in trees {
            selector.consider(system, tree)?;
        }
        Ok(selector.finish())
    }
}
