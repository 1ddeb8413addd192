//! Sub-clade enrichment ("embiggening").
//!
//! Trees of the sample record only the sub-clade pairs they actually
//! contain. Enrichment searches all pairs of frequent clades for disjoint
//! unions that are themselves registered clades and records them as
//! additional decompositions, giving HIPSTR more ways to build a tree.

use crate::clade::key::{CladeKey, KeyScheme};
use crate::clade::node::CladeIndex;
use crate::clade::system::CladeSystem;
use crate::error::CladeError;
use crate::progress::ProgressBar;
use rayon::prelude::*;
use tracing::info;

/// Outcome of [CladeSystem::enrich_sub_clades].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EnrichmentStats {
    /// Candidate pairs whose union was checked
    pub examined: usize,
    /// Pairs newly recorded as sub-clades
    pub added: usize,
}

impl<S: KeyScheme> CladeSystem<S> {
    /// Records every disjoint pair of frequent clades whose union is a
    /// registered clade as a sub-clade pair of that clade.
    ///
    /// Candidates are all clades (tips included) seen in at least
    /// `min_clade_count` trees with at least `min_clade_size` taxa,
    /// excluding the root. The first clade of a pair has at least two
    /// taxa. Pairs are scanned in parallel on the current rayon pool;
    /// only sub-clade sets are mutated, each under its clade's lock.
    /// With `show_progress`, a star bar is drawn on stderr.
    ///
    /// # Errors
    /// [CladeError::EnrichmentUnsupported] for keys that cannot decide
    /// disjointness.
    pub fn enrich_sub_clades(
        &self,
        min_clade_size: usize,
        min_clade_count: usize,
        show_progress: bool,
    ) -> Result<EnrichmentStats, CladeError> {
        if !S::Key::SUPPORTS_ENRICHMENT {
            return Err(CladeError::EnrichmentUnsupported);
        }
        let num_taxa = self.num_taxa();
        let min_clade_size = min_clade_size.max(1);

        let mut candidates: Vec<CladeIndex> = self
            .clades()
            .iter()
            .filter(|c| c.count() >= min_clade_count && c.size() < num_taxa)
            .map(|c| c.index())
            .collect();
        candidates.sort_by(|&a, &b| self.clade(b).count().cmp(&self.clade(a).count()));
        candidates.sort_by(|&a, &b| self.clade(b).size().cmp(&self.clade(a).size()));
        candidates.retain(|&c| self.clade(c).size() >= min_clade_size);

        info!(candidates = candidates.len(), "enriching sub-clades");
        let bar = if show_progress {
            ProgressBar::new(candidates.len())
        } else {
            ProgressBar::hidden(candidates.len())
        };

        let (examined, added) = (0..candidates.len())
            .into_par_iter()
            .map(|i| {
                let stats = self.enrich_from(&candidates, i, num_taxa);
                bar.tick();
                stats
            })
            .reduce(|| (0, 0), |a, b| (a.0 + b.0, a.1 + b.1));
        bar.finish();

        info!(examined, added, "additional clade pairs");
        Ok(EnrichmentStats { examined, added })
    }

    /// Pairs `candidates[i]` with every later candidate small enough to fit.
    fn enrich_from(&self, candidates: &[CladeIndex], i: usize, num_taxa: usize) -> (usize, usize) {
        let clade1 = self.clade(candidates[i]);
        if clade1.size() < 2 {
            return (0, 0);
        }
        let max_size2 = num_taxa - clade1.size();
        // Candidates are sorted by descending size
        let start = (i + 1).max(candidates.partition_point(|&c| self.clade(c).size() > max_size2));

        let mut examined = 0;
        let mut added = 0;
        for &index2 in &candidates[start..] {
            let clade2 = self.clade(index2);
            examined += 1;
            let combined = clade1.size() + clade2.size();
            let Some(union) = clade1.key().disjoint_union(clade2.key(), combined) else {
                continue;
            };
            if let Some(parent) = self.clade_by_key(&union) {
                let (a, b) = (clade1.index(), clade2.index());
                if self.clade(parent).add_sub_clades((a.min(b), a.max(b))) {
                    added += 1;
                }
            }
        }
        (examined, added)
    }
}
