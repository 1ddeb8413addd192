//! A clade of the clade DAG.

use crate::model::{AnnotationValue, TaxonIndex};
use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Index of a clade in a [CladeSystem](crate::clade::CladeSystem) arena.
pub type CladeIndex = usize;

/// Two clades whose disjoint union builds a parent clade.
pub type SubCladePair = (CladeIndex, CladeIndex);

/// Summary of the height samples of a clade, cached by the set-heights action.
#[derive(Debug, Clone, PartialEq)]
pub struct HeightSummary {
    pub mean: f64,
    pub median: f64,
    /// `(min, max)`, only for samples with spread
    pub range: Option<(f64, f64)>,
    /// 95% HPD interval, only for samples with spread
    pub hpd: Option<(f64, f64)>,
}

// =#========================================================================#=
// CLADE
// =#========================================================================#=
/// One unique set of taxa observed across the tree sample.
///
/// The key and size never change after construction. The count is
/// atomic so trees can be accumulated in parallel; the sub-clade pairs
/// sit behind their own lock for the same reason.
#[derive(Debug)]
pub struct Clade<K> {
    key: K,
    index: CladeIndex,
    size: usize,
    taxon: Option<TaxonIndex>,
    count: AtomicUsize,
    credibility: f64,
    sub_clades: Mutex<FxHashSet<SubCladePair>>,

    /// Per-occurrence attribute tuples (one entry per tree)
    pub(crate) attribute_values: Vec<Vec<Option<AnnotationValue>>>,
    /// Per-occurrence vertex heights
    pub(crate) height_values: Vec<f64>,

    pub(crate) best_sub_clades: Option<SubCladePair>,
    pub(crate) best_score: Option<f64>,
    pub(crate) height_summary: Option<HeightSummary>,
}

impl<K> Clade<K> {
    /// Creates a tip clade for a single taxon.
    pub(crate) fn new_tip(index: CladeIndex, key: K, taxon: TaxonIndex) -> Self {
        Self::new(index, key, 1, Some(taxon))
    }

    /// Creates an internal clade of the given size.
    pub(crate) fn new_internal(index: CladeIndex, key: K, size: usize) -> Self {
        Self::new(index, key, size, None)
    }

    fn new(index: CladeIndex, key: K, size: usize, taxon: Option<TaxonIndex>) -> Self {
        Clade {
            key,
            index,
            size,
            taxon,
            count: AtomicUsize::new(0),
            credibility: 0.0,
            sub_clades: Mutex::new(FxHashSet::default()),
            attribute_values: Vec::new(),
            height_values: Vec::new(),
            best_sub_clades: None,
            best_score: None,
            height_summary: None,
        }
    }

    pub fn key(&self) -> &K {
        &self.key
    }

    pub fn index(&self) -> CladeIndex {
        self.index
    }

    /// Number of taxa in the clade.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Taxon of a tip clade.
    pub fn taxon(&self) -> Option<TaxonIndex> {
        self.taxon
    }

    pub fn is_tip(&self) -> bool {
        self.size == 1
    }

    /// Number of trees containing this clade.
    pub fn count(&self) -> usize {
        self.count.load(Ordering::Relaxed)
    }

    pub(crate) fn increment(&self) {
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    /// Fraction of used trees containing this clade; 0 until credibilities
    /// are calculated.
    pub fn credibility(&self) -> f64 {
        self.credibility
    }

    pub(crate) fn set_credibility(&mut self, credibility: f64) {
        self.credibility = credibility;
    }

    /// Records another way of building this clade.
    ///
    /// # Returns
    /// `true` if the pair was not known before
    pub(crate) fn add_sub_clades(&self, pair: SubCladePair) -> bool {
        self.sub_clades.lock().insert(pair)
    }

    /// All recorded sub-clade pairs, sorted for deterministic iteration.
    pub fn sub_clades(&self) -> Vec<SubCladePair> {
        let mut pairs: Vec<SubCladePair> = self.sub_clades.lock().iter().copied().collect();
        pairs.sort_unstable();
        pairs
    }

    pub fn num_sub_clades(&self) -> usize {
        self.sub_clades.lock().len()
    }

    /// Attribute tuples collected so far, one per occurrence.
    pub fn attribute_values(&self) -> &[Vec<Option<AnnotationValue>>] {
        &self.attribute_values
    }

    /// Height samples collected so far.
    pub fn height_values(&self) -> &[f64] {
        &self.height_values
    }

    /// Best sub-clade pair chosen by HIPSTR, smaller side first.
    pub fn best_sub_clades(&self) -> Option<SubCladePair> {
        self.best_sub_clades
    }

    /// Memoized HIPSTR score of the subtree below this clade.
    pub fn best_score(&self) -> Option<f64> {
        self.best_score
    }

    pub fn height_summary(&self) -> Option<&HeightSummary> {
        self.height_summary.as_ref()
    }
}
