//! Taxon identities shared by all trees of a run.

use rustc_hash::FxHashMap;
use std::fmt;

/// Index of a taxon in a [TaxonSet]; stable for the whole run.
pub type TaxonIndex = usize;

// =#========================================================================#=
// TAXON SET
// =#========================================================================#=
/// Bidirectional mapping between taxon labels and [TaxonIndex].
///
/// All trees of a sample share one `TaxonSet`, so leaves only store the
/// index. Indices are handed out in insertion order and never change.
///
/// # Example
/// ```
/// use cladewick::model::TaxonSet;
///
/// let mut taxa = TaxonSet::new();
/// let kea = taxa.get_or_insert("Kea");
/// let kaka = taxa.get_or_insert("Kaka");
/// assert_eq!(taxa.get_or_insert("Kea"), kea);
/// assert_eq!(taxa.label(kaka), Some("Kaka"));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaxonSet {
    labels: Vec<String>,
    map: FxHashMap<String, TaxonIndex>,
}

impl TaxonSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty set with room for `num_taxa` labels.
    pub fn with_capacity(num_taxa: usize) -> Self {
        TaxonSet {
            labels: Vec::with_capacity(num_taxa),
            map: FxHashMap::with_capacity_and_hasher(num_taxa, Default::default()),
        }
    }

    /// Builds a set from labels in the given order.
    ///
    /// Duplicate labels keep their first index.
    pub fn from_labels<I, T>(labels: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let mut taxa = TaxonSet::new();
        for label in labels {
            taxa.get_or_insert(label.as_ref());
        }
        taxa
    }

    /// Returns the index of `label`, inserting it if it is new.
    pub fn get_or_insert(&mut self, label: &str) -> TaxonIndex {
        if let Some(&index) = self.map.get(label) {
            return index;
        }
        let index = self.labels.len();
        self.labels.push(label.to_string());
        self.map.insert(label.to_string(), index);
        index
    }

    pub fn index_of(&self, label: &str) -> Option<TaxonIndex> {
        self.map.get(label).copied()
    }

    pub fn label(&self, index: TaxonIndex) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    pub fn contains_label(&self, label: &str) -> bool {
        self.map.contains_key(label)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Labels in index order.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }
}

impl fmt::Display for TaxonSet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "TaxonSet ({} taxa):", self.labels.len())?;
        for (index, label) in self.labels.iter().enumerate() {
            writeln!(f, "  [{index}] {label}")?;
        }
        Ok(())
    }
}

impl std::ops::Index<TaxonIndex> for TaxonSet {
    type Output = str;

    fn index(&self, index: TaxonIndex) -> &Self::Output {
        &self.labels[index]
    }
}
