//! Clade keys: compact identities for sets of taxa.
//!
//! Two interchangeable schemes are provided:
//!
//! | Scheme | Key | Composition | Equality |
//! |--------|-----|-------------|----------|
//! | [BitsetScheme] | [BitsetKey], one bit per taxon | OR | exact |
//! | [FingerprintScheme] | [FingerprintKey], random 64-bit value | XOR | with overwhelming probability |
//!
//! Composition is commutative and associative in both schemes, so the
//! children of a clade may be combined in any order. Composing keys of
//! overlapping taxon sets is not meaningful; bifurcating trees only ever
//! compose disjoint subtrees.

use crate::model::TaxonIndex;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rustc_hash::{FxHashMap, FxHashSet};
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

const WORD_BITS: usize = 64;

// =#========================================================================#=
// TRAITS
// =#========================================================================#=
/// Identity of a set of taxa.
pub trait CladeKey: Clone + Eq + Hash + Send + Sync + Debug {
    /// Whether [CladeKey::disjoint_union] can decide overlap.
    const SUPPORTS_ENRICHMENT: bool;

    /// Key of the union of two disjoint taxon sets.
    fn compose(&self, other: &Self) -> Self;

    /// Key of the union of `self` and `other`, if they are disjoint.
    ///
    /// `combined_size` is the sum of both set sizes. Schemes that cannot
    /// decide overlap return `None`.
    fn disjoint_union(&self, other: &Self, combined_size: usize) -> Option<Self>;

    /// Taxa of the set in ascending order, if the key can enumerate them.
    fn taxon_list(&self) -> Option<Vec<TaxonIndex>> {
        None
    }
}

/// Hands out keys for taxa and composes keys of children.
pub trait KeyScheme: Clone + Send + Sync {
    type Key: CladeKey;

    /// Key for a single taxon; stable for the scheme's lifetime.
    fn taxon_key(&self, taxon: TaxonIndex) -> Self::Key;

    /// Key of the parent of two clades.
    fn parent_key(&self, key1: &Self::Key, key2: &Self::Key) -> Self::Key {
        key1.compose(key2)
    }
}

// =#========================================================================#=
// BITSET
// =#========================================================================#=
/// Growable bit vector with one bit per taxon.
///
/// Always normalized: no trailing zero words, so equal sets have equal
/// representations regardless of how they were built.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Default)]
pub struct BitsetKey(Vec<u64>);

impl BitsetKey {
    /// Key with exactly the given taxon set.
    pub fn single(taxon: TaxonIndex) -> Self {
        let mut words = vec![0u64; taxon / WORD_BITS + 1];
        words[taxon / WORD_BITS] = 1u64 << (taxon % WORD_BITS);
        BitsetKey(words)
    }

    /// Number of taxa in the set.
    pub fn cardinality(&self) -> usize {
        self.0.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn contains(&self, taxon: TaxonIndex) -> bool {
        self.0
            .get(taxon / WORD_BITS)
            .is_some_and(|w| w & (1u64 << (taxon % WORD_BITS)) != 0)
    }

    /// Taxa of the set in ascending order.
    pub fn taxa(&self) -> Vec<TaxonIndex> {
        let mut taxa = Vec::with_capacity(self.cardinality());
        for (i, &word) in self.0.iter().enumerate() {
            let mut bits = word;
            while bits != 0 {
                let offset = bits.trailing_zeros() as usize;
                taxa.push(i * WORD_BITS + offset);
                bits &= bits - 1;
            }
        }
        taxa
    }

    fn union(&self, other: &Self) -> Self {
        let (long, short) = if self.0.len() >= other.0.len() {
            (&self.0, &other.0)
        } else {
            (&other.0, &self.0)
        };
        let mut words = long.clone();
        for (word, &bits) in words.iter_mut().zip(short.iter()) {
            *word |= bits;
        }
        BitsetKey(words)
    }
}

impl CladeKey for BitsetKey {
    const SUPPORTS_ENRICHMENT: bool = true;

    fn compose(&self, other: &Self) -> Self {
        self.union(other)
    }

    fn disjoint_union(&self, other: &Self, combined_size: usize) -> Option<Self> {
        let union = self.union(other);
        (union.cardinality() == combined_size).then_some(union)
    }

    fn taxon_list(&self) -> Option<Vec<TaxonIndex>> {
        Some(self.taxa())
    }
}

/// Stateless scheme producing [BitsetKey]s.
#[derive(Clone, Copy, Debug, Default)]
pub struct BitsetScheme;

impl KeyScheme for BitsetScheme {
    type Key = BitsetKey;

    fn taxon_key(&self, taxon: TaxonIndex) -> BitsetKey {
        BitsetKey::single(taxon)
    }
}

// =#========================================================================#=
// FINGERPRINT
// =#========================================================================#=
/// XOR of random per-taxon 64-bit fingerprints.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct FingerprintKey(pub u64);

impl CladeKey for FingerprintKey {
    const SUPPORTS_ENRICHMENT: bool = false;

    fn compose(&self, other: &Self) -> Self {
        FingerprintKey(self.0 ^ other.0)
    }

    fn disjoint_union(&self, _other: &Self, _combined_size: usize) -> Option<Self> {
        None
    }
}

/// Registry of taxon fingerprints.
///
/// Each taxon gets a random non-zero value on first use, distinct from
/// all values handed out before. Values stay fixed until [reset](Self::reset).
/// Shared between threads through [FingerprintScheme].
#[derive(Debug)]
pub struct FingerprintRegistry {
    inner: Mutex<RegistryState>,
}

#[derive(Debug)]
struct RegistryState {
    rng: StdRng,
    by_taxon: FxHashMap<TaxonIndex, u64>,
    used: FxHashSet<u64>,
}

impl FingerprintRegistry {
    /// Registry seeded from system entropy.
    pub fn new() -> Self {
        Self::from_rng(StdRng::from_entropy())
    }

    /// Registry with reproducible fingerprints.
    pub fn with_seed(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(rng: StdRng) -> Self {
        FingerprintRegistry {
            inner: Mutex::new(RegistryState {
                rng,
                by_taxon: FxHashMap::default(),
                used: FxHashSet::default(),
            }),
        }
    }

    /// Returns the fingerprint of `taxon`, drawing one if needed.
    pub fn fingerprint(&self, taxon: TaxonIndex) -> u64 {
        let mut state = self.inner.lock();
        if let Some(&value) = state.by_taxon.get(&taxon) {
            return value;
        }
        let value = loop {
            let candidate: u64 = state.rng.r#gen();
            if candidate != 0 && !state.used.contains(&candidate) {
                break candidate;
            }
        };
        state.used.insert(value);
        state.by_taxon.insert(taxon, value);
        value
    }

    /// Number of taxa with a fingerprint.
    pub fn len(&self) -> usize {
        self.inner.lock().by_taxon.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forgets all fingerprints. Keys created before are invalidated.
    pub fn reset(&self) {
        let mut state = self.inner.lock();
        state.by_taxon.clear();
        state.used.clear();
    }
}

impl Default for FingerprintRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Scheme producing [FingerprintKey]s from a shared registry.
#[derive(Clone, Debug, Default)]
pub struct FingerprintScheme {
    registry: Arc<FingerprintRegistry>,
}

impl FingerprintScheme {
    pub fn new(registry: Arc<FingerprintRegistry>) -> Self {
        FingerprintScheme { registry }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self::new(Arc::new(FingerprintRegistry::with_seed(seed)))
    }

    pub fn registry(&self) -> &Arc<FingerprintRegistry> {
        &self.registry
    }
}

impl KeyScheme for FingerprintScheme {
    type Key = FingerprintKey;

    fn taxon_key(&self, taxon: TaxonIndex) -> FingerprintKey {
        FingerprintKey(self.registry.fingerprint(taxon))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bitset_keys_stay_normalized() {
        let high = BitsetKey::single(130);
        let low = BitsetKey::single(3);
        let both = high.compose(&low);
        assert_eq!(both, low.compose(&high));
        assert_eq!(both.taxa(), vec![3, 130]);
        assert_eq!(low.0.len(), 1);
        assert!(both.contains(130) && !both.contains(64));
    }

    #[test]
    fn bitset_disjoint_union_rejects_overlap() {
        let ab = BitsetKey::single(0).compose(&BitsetKey::single(1));
        let bc = BitsetKey::single(1).compose(&BitsetKey::single(2));
        let c = BitsetKey::single(2);
        assert_eq!(ab.disjoint_union(&bc, 4), None);
        assert_eq!(ab.disjoint_union(&c, 3).map(|k| k.cardinality()), Some(3));
    }

    #[test]
    fn fingerprints_are_stable_and_distinct() {
        let registry = FingerprintRegistry::with_seed(42);
        let first = registry.fingerprint(7);
        assert_ne!(first, 0);
        assert_eq!(registry.fingerprint(7), first);
        assert_ne!(registry.fingerprint(8), first);
        assert_eq!(registry.len(), 2);

        registry.reset();
        assert!(registry.is_empty());
    }

    #[test]
    fn seeded_registries_agree() {
        let a = FingerprintScheme::with_seed(1);
        let b = FingerprintScheme::with_seed(1);
        assert_eq!(a.taxon_key(0), b.taxon_key(0));
        assert_eq!(a.taxon_key(1), b.taxon_key(1));
    }

    #[test]
    fn fingerprint_composition_cancels_itself() {
        let scheme = FingerprintScheme::with_seed(3);
        let a = scheme.taxon_key(0);
        let b = scheme.taxon_key(1);
        assert_eq!(scheme.parent_key(&a, &b), scheme.parent_key(&b, &a));
        assert_eq!(a.compose(&b).compose(&b), a);
    }
}
