//! The clade system: registry and accumulator of all clades of a tree sample.

use crate::action::CladeAction;
use crate::clade::key::{CladeKey, KeyScheme};
use crate::clade::node::{Clade, CladeIndex, SubCladePair};
use crate::error::CladeError;
use crate::model::{TaxonIndex, Tree, VertexIndex};
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use tracing::debug;

// =#========================================================================#=
// CLADE SYSTEM
// =#========================================================================#=
/// Maps clade keys to [Clade] records and accumulates them over trees.
///
/// Clades live in an arena and are referenced by [CladeIndex]. Tip clades
/// are addressed by taxon, internal clades by key. Tip clades are created
/// from the first tree added and reused afterwards.
///
/// # Invariants
/// - Every clade of size > 1 was built by composing two registered clades
///   (or, for [CladeSystem::from_tree], all children of a vertex)
/// - The root clade is the same for every tree and has size = number of taxa
///
/// # Example
/// ```
/// use cladewick::clade::{BitsetScheme, CladeSystem};
/// use cladewick::newick::NewickParser;
///
/// let mut parser = NewickParser::new();
/// let tree = parser.parse_str("((Kea,Kaka),(Kakapo,Kokako));").unwrap();
///
/// let mut system = CladeSystem::new(BitsetScheme, false);
/// system.add(&tree).unwrap();
/// system.calculate_clade_credibilities(1).unwrap();
///
/// assert_eq!(system.clade_count(), 3);
/// assert_eq!(system.log_clade_credibility(&tree).unwrap(), 0.0);
/// ```
#[derive(Debug)]
pub struct CladeSystem<S: KeyScheme> {
    scheme: S,
    clades: Vec<Clade<S::Key>>,
    /// Tip clade of each taxon, indexed by [TaxonIndex]
    tip_clades: Vec<Option<CladeIndex>>,
    /// Internal clades by key
    by_key: FxHashMap<S::Key, CladeIndex>,
    root: Option<CladeIndex>,
    tree_count: usize,
    num_taxa: usize,
    keep_sub_clades: bool,
}

/// Keys of one tree, computed before any clade gets registered.
struct TreeKeys<K> {
    post_order: Vec<VertexIndex>,
    keys: Vec<Option<K>>,
}

// ============================================================================
// New, Getters
// ============================================================================
impl<S: KeyScheme> CladeSystem<S> {
    /// Creates an empty system.
    ///
    /// # Arguments
    /// * `scheme` - Key scheme for all clades of this system
    /// * `keep_sub_clades` - Whether to record every observed pair of
    ///   sub-clades per clade (required for HIPSTR and consensus trees)
    pub fn new(scheme: S, keep_sub_clades: bool) -> Self {
        CladeSystem {
            scheme,
            clades: Vec::new(),
            tip_clades: Vec::new(),
            by_key: FxHashMap::default(),
            root: None,
            tree_count: 0,
            num_taxa: 0,
            keep_sub_clades,
        }
    }

    /// Builds a system from a single tree of any arity, e.g. a reference tree.
    pub fn from_tree(scheme: S, tree: &Tree) -> Result<Self, CladeError> {
        let mut system = CladeSystem::new(scheme, false);
        system.seed_tips(tree);

        let tree_keys = system.compute_keys(tree, false)?;
        let mut vertex_clades: Vec<CladeIndex> = vec![0; tree.num_vertices()];
        let mut keys = tree_keys.keys;
        for &v in &tree_keys.post_order {
            let vertex = &tree[v];
            let clade_index = match vertex.taxon() {
                Some(taxon) => system.tip_index(taxon)?,
                None => {
                    let size = vertex
                        .children()
                        .iter()
                        .map(|&c| system.clades[vertex_clades[c]].size())
                        .sum();
                    let key = keys[v].take().ok_or(CladeError::MissingClade { vertex: v })?;
                    system.register(key, size, None)
                }
            };
            system.clades[clade_index].increment();
            vertex_clades[v] = clade_index;
        }

        system.root = Some(vertex_clades[tree.root_index()]);
        system.tree_count = 1;
        Ok(system)
    }

    pub fn scheme(&self) -> &S {
        &self.scheme
    }

    /// Number of trees added.
    pub fn tree_count(&self) -> usize {
        self.tree_count
    }

    /// Number of taxa, fixed by the first tree.
    pub fn num_taxa(&self) -> usize {
        self.num_taxa
    }

    pub fn keeps_sub_clades(&self) -> bool {
        self.keep_sub_clades
    }

    /// All clades, tips included.
    pub fn clades(&self) -> &[Clade<S::Key>] {
        &self.clades
    }

    pub fn clade(&self, index: CladeIndex) -> &Clade<S::Key> {
        &self.clades[index]
    }

    pub(crate) fn clades_mut(&mut self) -> &mut [Clade<S::Key>] {
        &mut self.clades
    }

    /// Internal clade with the given key.
    pub fn clade_by_key(&self, key: &S::Key) -> Option<CladeIndex> {
        self.by_key.get(key).copied()
    }

    /// Tip clade of a taxon.
    pub fn tip_clade(&self, taxon: TaxonIndex) -> Option<CladeIndex> {
        self.tip_clades.get(taxon).copied().flatten()
    }

    pub fn root_clade(&self) -> Option<CladeIndex> {
        self.root
    }

    /// Number of unique internal clades.
    pub fn clade_count(&self) -> usize {
        self.by_key.len()
    }

    pub(crate) fn internal_clades(&self) -> impl Iterator<Item = &Clade<S::Key>> {
        self.by_key.values().map(move |&i| &self.clades[i])
    }

    fn tip_index(&self, taxon: TaxonIndex) -> Result<CladeIndex, CladeError> {
        self.tip_clade(taxon).ok_or(CladeError::UnknownTaxon(taxon))
    }
}

// ============================================================================
// Accumulation
// ============================================================================
impl<S: KeyScheme> CladeSystem<S> {
    /// Adds the clades of one bifurcating tree.
    ///
    /// The first tree fixes the taxa and seeds the tip clades. Every vertex
    /// increments the count of its clade by one.
    ///
    /// # Errors
    /// - [CladeError::NonBinaryVertex] if an internal vertex has other than two children
    /// - [CladeError::TaxonCountMismatch] if the tree has a different number of taxa
    /// - [CladeError::UnknownTaxon] if a leaf's taxon has no tip clade
    /// - [CladeError::RootMismatch] if the tree spans a different taxon set
    pub fn add(&mut self, tree: &Tree) -> Result<(), CladeError> {
        self.add_all(std::slice::from_ref(tree))
    }

    /// Adds the clades of a batch of bifurcating trees.
    ///
    /// Keys are computed in parallel, new clades registered in tree order,
    /// and counts incremented in parallel. The outcome equals calling
    /// [CladeSystem::add] for each tree in order. If any tree of the batch
    /// is rejected, the system is left unchanged.
    pub fn add_all(&mut self, trees: &[Tree]) -> Result<(), CladeError> {
        let Some(first) = trees.first() else {
            return Ok(());
        };
        let seeding = self.root.is_none() && self.num_taxa == 0;
        if seeding {
            self.seed_tips(first);
        }
        let result = self.add_batch(trees);
        if seeding && result.is_err() {
            self.clades.clear();
            self.tip_clades.clear();
            self.by_key.clear();
            self.root = None;
            self.num_taxa = 0;
        }
        result
    }

    /// Validates, registers and counts a batch once the tips are seeded.
    fn add_batch(&mut self, trees: &[Tree]) -> Result<(), CladeError> {
        // 1. Compute and validate keys
        let tree_keys: Vec<TreeKeys<S::Key>> = trees
            .par_iter()
            .map(|tree| {
                let found = tree.num_leaves();
                if found != self.num_taxa {
                    return Err(CladeError::TaxonCountMismatch {
                        expected: self.num_taxa,
                        found,
                    });
                }
                self.compute_keys(tree, true)
            })
            .collect::<Result<_, _>>()?;

        let mut root_key = self.root.map(|r| self.clades[r].key().clone());
        for (tree, keys) in trees.iter().zip(&tree_keys) {
            let key = keys.keys[tree.root_index()].as_ref();
            match (&root_key, key) {
                (Some(expected), Some(found)) if expected != found => {
                    return Err(CladeError::RootMismatch);
                }
                (None, Some(found)) => root_key = Some(found.clone()),
                _ => {}
            }
        }

        // 2. Register clades in tree order
        let mut tree_clades: Vec<Vec<CladeIndex>> = Vec::with_capacity(trees.len());
        for (tree, keys) in trees.iter().zip(tree_keys) {
            let clades = self.register_tree(tree, keys)?;
            let root = clades[tree.root_index()];
            if self.clades[root].size() != tree.num_leaves() {
                return Err(CladeError::TaxonCountMismatch {
                    expected: tree.num_leaves(),
                    found: self.clades[root].size(),
                });
            }
            self.root = Some(root);
            tree_clades.push(clades);
        }

        // 3. Count
        let clades = &self.clades;
        tree_clades.par_iter().for_each(|indices| {
            for &index in indices {
                clades[index].increment();
            }
        });

        self.tree_count += trees.len();
        debug!(
            trees = self.tree_count,
            clades = self.by_key.len(),
            "accumulated tree batch"
        );
        Ok(())
    }

    /// Returns the clade composed of the two given clades, creating it if
    /// it is new. With sub-clade retention, the pair is recorded as a way
    /// to build the clade.
    pub fn get_or_add_clade(&mut self, clade1: CladeIndex, clade2: CladeIndex) -> CladeIndex {
        let key = self
            .scheme
            .parent_key(self.clades[clade1].key(), self.clades[clade2].key());
        let size = self.clades[clade1].size() + self.clades[clade2].size();
        self.register(key, size, Some((clade1, clade2)))
    }

    /// Sets `credibility = count / total_trees_used` for every clade.
    ///
    /// # Errors
    /// - [CladeError::EmptySystem] if `total_trees_used` is 0
    /// - [CladeError::CountExceedsTrees] if any clade was seen more often
    pub fn calculate_clade_credibilities(&mut self, total_trees_used: usize) -> Result<(), CladeError> {
        if total_trees_used == 0 {
            return Err(CladeError::EmptySystem);
        }
        for clade in &mut self.clades {
            let count = clade.count();
            if count > total_trees_used {
                return Err(CladeError::CountExceedsTrees {
                    count,
                    total: total_trees_used,
                });
            }
            clade.set_credibility(count as f64 / total_trees_used as f64);
        }
        Ok(())
    }

    fn seed_tips(&mut self, tree: &Tree) {
        for vertex in tree.vertices() {
            if let Some(taxon) = vertex.taxon() {
                if self.tip_clades.len() <= taxon {
                    self.tip_clades.resize(taxon + 1, None);
                }
                if self.tip_clades[taxon].is_none() {
                    let index = self.clades.len();
                    let key = self.scheme.taxon_key(taxon);
                    self.clades.push(Clade::new_tip(index, key, taxon));
                    self.tip_clades[taxon] = Some(index);
                    self.num_taxa += 1;
                }
            }
        }
    }

    /// Registers all clades of a tree whose keys were already checked.
    fn register_tree(&mut self, tree: &Tree, tree_keys: TreeKeys<S::Key>) -> Result<Vec<CladeIndex>, CladeError> {
        let TreeKeys { post_order, mut keys } = tree_keys;
        let mut vertex_clades: Vec<CladeIndex> = vec![0; tree.num_vertices()];
        for v in post_order {
            let vertex = &tree[v];
            vertex_clades[v] = match (vertex.taxon(), vertex.binary_children()) {
                (Some(taxon), _) => self.tip_index(taxon)?,
                (None, Some((left, right))) => {
                    let (c1, c2) = (vertex_clades[left], vertex_clades[right]);
                    let size = self.clades[c1].size() + self.clades[c2].size();
                    let key = keys[v].take().ok_or(CladeError::MissingClade { vertex: v })?;
                    self.register(key, size, Some((c1, c2)))
                }
                (None, None) => {
                    return Err(CladeError::NonBinaryVertex {
                        vertex: v,
                        arity: vertex.children().len(),
                    });
                }
            };
        }
        Ok(vertex_clades)
    }

    fn register(&mut self, key: S::Key, size: usize, pair: Option<SubCladePair>) -> CladeIndex {
        let index = match self.by_key.get(&key) {
            Some(&index) => index,
            None => {
                let index = self.clades.len();
                self.clades.push(Clade::new_internal(index, key.clone(), size));
                self.by_key.insert(key, index);
                index
            }
        };
        if self.keep_sub_clades {
            if let Some((c1, c2)) = pair {
                self.clades[index].add_sub_clades((c1.min(c2), c1.max(c2)));
            }
        }
        index
    }

    /// Computes the key of every vertex bottom-up.
    ///
    /// # Arguments
    /// * `binary` - Whether to reject vertices with other than two children
    fn compute_keys(&self, tree: &Tree, binary: bool) -> Result<TreeKeys<S::Key>, CladeError> {
        let post_order: Vec<VertexIndex> = tree.post_order_iter().map(|v| v.index()).collect();
        let mut keys: Vec<Option<S::Key>> = vec![None; tree.num_vertices()];
        for &v in &post_order {
            let vertex = &tree[v];
            let key = match vertex.taxon() {
                Some(taxon) => {
                    self.tip_index(taxon)?;
                    self.scheme.taxon_key(taxon)
                }
                None => {
                    let children = vertex.children();
                    if binary && children.len() != 2 {
                        return Err(CladeError::NonBinaryVertex {
                            vertex: v,
                            arity: children.len(),
                        });
                    }
                    let mut child_keys = children.iter().filter_map(|&c| keys[c].as_ref());
                    let first = child_keys
                        .next()
                        .ok_or(CladeError::MissingClade { vertex: v })?
                        .clone();
                    child_keys.fold(first, |acc, k| self.scheme.parent_key(&acc, k))
                }
            };
            keys[v] = Some(key);
        }
        Ok(TreeKeys { post_order, keys })
    }
}

// ============================================================================
// Traversal
// ============================================================================
impl<S: KeyScheme> CladeSystem<S> {
    /// Walks a bifurcating tree bottom-up and hands each vertex with its
    /// clade to `action`.
    ///
    /// # Errors
    /// - [CladeError::NonBinaryVertex] on a vertex with other than two children
    /// - [CladeError::MissingClade] if a vertex's clade is not registered
    ///   and the action expects all clades
    /// - Any error raised by the action
    pub fn traverse_tree<A: CladeAction<S::Key>>(&mut self, tree: &mut Tree, action: &mut A) -> Result<(), CladeError> {
        self.traverse(tree, action, true)
    }

    /// Like [CladeSystem::traverse_tree], for trees of any arity.
    pub fn traverse_tree_nary<A: CladeAction<S::Key>>(&mut self, tree: &mut Tree, action: &mut A) -> Result<(), CladeError> {
        self.traverse(tree, action, false)
    }

    fn traverse<A: CladeAction<S::Key>>(&mut self, tree: &mut Tree, action: &mut A, binary: bool) -> Result<(), CladeError> {
        let (post_order, resolved) = self.resolve_clades(tree, binary)?;
        for v in post_order {
            match resolved[v] {
                Some(clade_index) => action.act_on_clade(&mut self.clades[clade_index], tree, v)?,
                None if action.expect_all_clades() => {
                    return Err(CladeError::MissingClade { vertex: v });
                }
                None => {}
            }
        }
        Ok(())
    }

    /// Resolves the registered clade of every vertex, in post-order.
    fn resolve_clades(&self, tree: &Tree, binary: bool) -> Result<(Vec<VertexIndex>, Vec<Option<CladeIndex>>), CladeError> {
        let post_order: Vec<VertexIndex> = tree.post_order_iter().map(|v| v.index()).collect();
        let mut keys: Vec<Option<S::Key>> = vec![None; tree.num_vertices()];
        let mut resolved: Vec<Option<CladeIndex>> = vec![None; tree.num_vertices()];
        for &v in &post_order {
            let vertex = &tree[v];
            match vertex.taxon() {
                Some(taxon) => {
                    keys[v] = Some(self.scheme.taxon_key(taxon));
                    resolved[v] = self.tip_clade(taxon);
                }
                None => {
                    let children = vertex.children();
                    if binary && children.len() != 2 {
                        return Err(CladeError::NonBinaryVertex {
                            vertex: v,
                            arity: children.len(),
                        });
                    }
                    let mut child_keys = children.iter().filter_map(|&c| keys[c].as_ref());
                    if let Some(first) = child_keys.next() {
                        let key = child_keys.fold(first.clone(), |acc, k| self.scheme.parent_key(&acc, k));
                        resolved[v] = self.by_key.get(&key).copied();
                        keys[v] = Some(key);
                    }
                }
            }
        }
        Ok((post_order, resolved))
    }
}

// ============================================================================
// Queries
// ============================================================================
impl<S: KeyScheme> CladeSystem<S> {
    /// Credibility of every vertex's clade (0 for unregistered clades).
    fn vertex_credibilities(&self, tree: &Tree) -> Result<Vec<(VertexIndex, f64)>, CladeError> {
        let (post_order, resolved) = self.resolve_clades(tree, false)?;
        Ok(post_order
            .into_iter()
            .map(|v| (v, resolved[v].map_or(0.0, |c| self.clades[c].credibility())))
            .collect())
    }

    fn internal_credibilities(&self, tree: &Tree) -> Result<Vec<f64>, CladeError> {
        Ok(self
            .vertex_credibilities(tree)?
            .into_iter()
            .filter(|&(v, _)| tree[v].is_internal())
            .map(|(_, c)| c)
            .collect())
    }

    /// Sum of the log credibilities of the clades of all vertices.
    ///
    /// Tips contribute `ln(1) = 0`. A clade absent from the system has
    /// credibility 0, making the result `-inf`.
    pub fn log_clade_credibility(&self, tree: &Tree) -> Result<f64, CladeError> {
        Ok(self
            .vertex_credibilities(tree)?
            .into_iter()
            .map(|(_, c)| c.ln())
            .sum())
    }

    /// Lowest credibility over all vertices of the tree.
    pub fn minimum_clade_credibility(&self, tree: &Tree) -> Result<f64, CladeError> {
        Ok(self
            .vertex_credibilities(tree)?
            .into_iter()
            .map(|(_, c)| c)
            .fold(f64::INFINITY, f64::min))
    }

    /// Mean credibility over internal vertices; `None` without any.
    pub fn mean_clade_credibility(&self, tree: &Tree) -> Result<Option<f64>, CladeError> {
        let values = self.internal_credibilities(tree)?;
        Ok((!values.is_empty()).then(|| crate::stats::mean(&values)))
    }

    /// Median credibility over internal vertices; `None` without any.
    pub fn median_clade_credibility(&self, tree: &Tree) -> Result<Option<f64>, CladeError> {
        let values = self.internal_credibilities(tree)?;
        Ok(crate::stats::median(&values))
    }

    /// Number of internal vertices whose clade credibility is at least `threshold`.
    pub fn top_clade_count_in_tree(&self, tree: &Tree, threshold: f64) -> Result<usize, CladeError> {
        Ok(self
            .internal_credibilities(tree)?
            .into_iter()
            .filter(|&c| c >= threshold)
            .count())
    }

    /// Number of internal clades of the system with credibility at least `threshold`.
    pub fn top_clade_count(&self, threshold: f64) -> usize {
        self.internal_clades()
            .filter(|c| c.credibility() >= threshold)
            .count()
    }

    /// Number of internal clades observed in exactly `count` trees.
    pub fn clade_frequency_count(&self, count: usize) -> usize {
        self.internal_clades().filter(|c| c.count() == count).count()
    }

    /// Number of internal clades present in both systems.
    ///
    /// Both systems must share the key scheme (and, for fingerprints,
    /// the registry).
    pub fn common_clade_count(&self, other: &CladeSystem<S>) -> usize {
        self.by_key
            .keys()
            .filter(|key| other.by_key.contains_key(*key))
            .count()
    }

    /// Rooted Robinson-Foulds distance: the number of internal clades
    /// found in only one of the two systems.
    ///
    /// Meant for systems built with [CladeSystem::from_tree]; shares the
    /// requirements of [CladeSystem::common_clade_count].
    pub fn robinson_foulds_distance(&self, other: &CladeSystem<S>) -> usize {
        self.clade_count() + other.clade_count() - 2 * self.common_clade_count(other)
    }

    /// The taxa of a clade, sorted.
    ///
    /// Follows recorded sub-clades down to the tips, falling back to the
    /// key where sub-clades were not recorded.
    ///
    /// # Errors
    /// [CladeError::MissingSubClades] if neither is available.
    pub fn taxa_of(&self, index: CladeIndex) -> Result<Vec<TaxonIndex>, CladeError> {
        let mut taxa = Vec::with_capacity(self.clades[index].size());
        let mut stack = vec![index];
        while let Some(current) = stack.pop() {
            let clade = &self.clades[current];
            if let Some(taxon) = clade.taxon() {
                taxa.push(taxon);
            } else if let Some(&(left, right)) = clade.sub_clades().first() {
                stack.push(left);
                stack.push(right);
            } else if let Some(list) = clade.key().taxon_list() {
                taxa.extend(list);
            } else {
                return Err(CladeError::MissingSubClades { size: clade.size() });
            }
        }
        taxa.sort_unstable();
        Ok(taxa)
    }
}
