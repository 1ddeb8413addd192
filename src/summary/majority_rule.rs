//! Majority-rule consensus trees.

use crate::clade::{CladeIndex, CladeSystem, KeyScheme};
use crate::error::CladeError;
use crate::model::{TaxonIndex, Tree, VertexIndex};
use tracing::debug;

/// Credibility a clade must exceed to enter the consensus.
pub const MAJORITY: f64 = 0.5;

/// Builds the majority-rule consensus tree of a clade system.
///
/// Every internal clade with credibility strictly above one half is kept,
/// plus the root. Clades above one half are pairwise compatible, so they
/// nest: each kept clade hangs below the smallest kept clade containing
/// it, and each taxon below the smallest kept clade containing it. The
/// result may have polytomies; all heights are 0.
///
/// # Example
/// ```
/// use cladewick::clade::{BitsetScheme, CladeSystem};
/// use cladewick::newick::NewickParser;
/// use cladewick::summary::MajorityRuleBuilder;
///
/// let mut parser = NewickParser::new();
/// let mut system = CladeSystem::new(BitsetScheme, true);
/// for newick in ["((Kea,Kaka),(Kakapo,Kokako));", "((Kea,Kakapo),(Kaka,Kokako));"] {
///     system.add(&parser.parse_str(newick).unwrap()).unwrap();
/// }
/// system.calculate_clade_credibilities(2).unwrap();
///
/// let tree = MajorityRuleBuilder::new().build(&system).unwrap();
/// assert_eq!(tree.num_internal(), 1);
/// assert_eq!(tree.root().children().len(), 4);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct MajorityRuleBuilder {
    threshold: f64,
}

impl Default for MajorityRuleBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MajorityRuleBuilder {
    pub fn new() -> Self {
        MajorityRuleBuilder { threshold: MAJORITY }
    }

    /// Keeps clades with credibility strictly above `threshold` instead.
    /// Thresholds below one half may produce incompatible clades; the
    /// larger clade wins in that case.
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// # Errors
    /// - [CladeError::EmptySystem] if the system has no root
    /// - [CladeError::MissingSubClades] if a kept clade's taxa cannot be derived
    pub fn build<S: KeyScheme>(&self, system: &CladeSystem<S>) -> Result<Tree, CladeError> {
        let root = system.root_clade().ok_or(CladeError::EmptySystem)?;
        let num_taxa = system.num_taxa();
        let mut tree = Tree::with_capacity(num_taxa);

        if let Some(taxon) = system.clade(root).taxon() {
            let leaf = tree.add_leaf(taxon, 0.0);
            tree.set_root(leaf);
            return Ok(tree);
        }

        let mut kept: Vec<CladeIndex> = system
            .clades()
            .iter()
            .filter(|c| !c.is_tip() && c.index() != root && c.credibility() > self.threshold)
            .map(|c| c.index())
            .collect();
        kept.sort_by(|&a, &b| {
            system
                .clade(b)
                .size()
                .cmp(&system.clade(a).size())
                .then(a.cmp(&b))
        });

        let root_vertex = tree.add_internal(&[], 0.0);
        tree.set_root(root_vertex);
        // Smallest kept clade seen so far that contains each taxon
        let mut deepest: Vec<VertexIndex> = vec![root_vertex; taxon_slots(system)];

        for index in kept {
            let taxa = system.taxa_of(index)?;
            let Some(&first) = taxa.first() else {
                continue;
            };
            let parent = deepest[first];
            if taxa.iter().any(|&t| deepest[t] != parent) {
                debug!(clade = index, "skipping clade incompatible with larger kept clades");
                continue;
            }
            let vertex = tree.add_internal(&[], 0.0);
            tree.attach(parent, vertex);
            for &taxon in &taxa {
                deepest[taxon] = vertex;
            }
        }

        for taxon in tip_taxa(system) {
            let leaf = tree.add_leaf(taxon, 0.0);
            tree.attach(deepest[taxon], leaf);
        }

        debug!(
            internal = tree.num_internal(),
            leaves = tree.num_leaves(),
            "built majority-rule consensus tree"
        );
        Ok(tree)
    }
}

fn taxon_slots<S: KeyScheme>(system: &CladeSystem<S>) -> usize {
    tip_taxa(system).max().map_or(0, |t| t + 1)
}

fn tip_taxa<S: KeyScheme>(system: &CladeSystem<S>) -> impl Iterator<Item = TaxonIndex> + '_ {
    system.clades().iter().filter_map(|c| c.taxon())
}
