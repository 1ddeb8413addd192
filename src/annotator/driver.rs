//! The passes of an annotation run.

use crate::action::collection::{HEIGHT, LENGTH};
use crate::action::{AnnotationAction, CollectionAction, HeightsSummary, SetHeightsAction};
use crate::annotator::{parse_state, Burnin, KeySchemeKind, Target};
use crate::clade::{BitsetScheme, CladeSystem, FingerprintRegistry, FingerprintScheme, KeyScheme};
use crate::error::AnnotatorError;
use crate::model::{TaxonSet, Tree};
use crate::newick::NewickParser;
use crate::nexus::{NexusReader, NexusWriter};
use crate::parser::byte_parser::ByteParser;
use crate::parser::byte_source::InMemoryByteSource;
use crate::progress::ProgressBar;
use crate::summary::{HipstrBuilder, MajorityRuleBuilder, MccSelector};
use rayon::ThreadPool;
use std::fs::File;
use std::io;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Credibility thresholds of the clade count report.
const REPORT_THRESHOLDS: [f64; 4] = [1.0, 0.99, 0.95, 0.5];

/// Header of the per-tree metrics table.
const METRICS_HEADER: &str = "tree\tstate\trobinson_foulds";

/// Name of the written summary tree.
const OUTPUT_TREE_NAME: &str = "TREE1";

const NEXUS_MAGIC: &[u8] = b"#NEXUS";

/// Settings collected by the [TreeAnnotatorBuilder](crate::annotator::TreeAnnotatorBuilder).
#[derive(Debug, Clone)]
pub(crate) struct Settings {
    pub(crate) target: Target,
    pub(crate) burnin: Burnin,
    pub(crate) heights: HeightsSummary,
    pub(crate) posterior_limit: f64,
    pub(crate) count_limit: usize,
    pub(crate) hpd_2d: Vec<f64>,
    pub(crate) force_discrete: bool,
    pub(crate) key_scheme: KeySchemeKind,
    pub(crate) seed: Option<u64>,
    pub(crate) threads: usize,
    pub(crate) reference: Option<PathBuf>,
    pub(crate) enrichment: Option<(usize, usize)>,
    pub(crate) metrics: Option<PathBuf>,
    pub(crate) output: Option<PathBuf>,
    pub(crate) batch_size: usize,
    pub(crate) show_progress: bool,
}

/// Outcome of [TreeAnnotator::annotate].
#[derive(Debug, Clone)]
pub struct AnnotationReport {
    /// The annotated target tree, named "TREE1"
    pub tree: Tree,
    /// Taxa of the sample
    pub taxa: TaxonSet,
    pub total_trees: usize,
    /// Number of discarded initial trees
    pub burnin: usize,
    pub trees_used: usize,
    /// Distinct internal clades of the sample
    pub unique_clades: usize,
    /// Log clade credibility of the target before annotation
    pub target_score: f64,
    /// Clades shared with the reference tree, out of the reference's clades
    pub reference_clades: Option<(usize, usize)>,
}

// =#========================================================================#=
// TREE ANNOTATOR
// =#========================================================================#=
/// Summarizes a tree sample held in memory into one annotated tree.
///
/// Created by [TreeAnnotatorBuilder](crate::annotator::TreeAnnotatorBuilder).
/// All passes run on the annotator's own rayon pool; the sample is
/// re-read from the start for every pass.
pub struct TreeAnnotator {
    settings: Settings,
    reader: NexusReader<InMemoryByteSource>,
    pool: ThreadPool,
}

impl TreeAnnotator {
    pub(crate) fn new(settings: Settings, reader: NexusReader<InMemoryByteSource>, pool: ThreadPool) -> Self {
        TreeAnnotator {
            settings,
            reader,
            pool,
        }
    }

    /// Taxa of the sample.
    pub fn taxa(&self) -> &TaxonSet {
        self.reader.taxa()
    }

    /// Runs all passes and returns the annotated target without writing it.
    ///
    /// # Errors
    /// - [AnnotatorError::NoTrees] if the TREES block is empty
    /// - [AnnotatorError::BurninTooLarge] if the burn-in discards every tree
    /// - [AnnotatorError::MissingState] for a state burn-in on trees
    ///   without `STATE_<n>` names
    /// - [AnnotatorError::Parse] for any invalid tree, and
    ///   [AnnotatorError::Clade] for trees the clade system rejects
    pub fn annotate(&mut self) -> Result<AnnotationReport, AnnotatorError> {
        let TreeAnnotator {
            settings,
            reader,
            pool,
        } = self;
        let settings = &*settings;
        pool.install(|| match settings.key_scheme {
            KeySchemeKind::Bitset => Run::new(settings, reader, BitsetScheme).execute(),
            KeySchemeKind::Fingerprint => {
                let scheme = match settings.seed {
                    Some(seed) => FingerprintScheme::with_seed(seed),
                    None => FingerprintScheme::new(Arc::new(FingerprintRegistry::new())),
                };
                Run::new(settings, reader, scheme).execute()
            }
        })
    }

    /// Annotates the target and writes it to the configured output.
    pub fn run(&mut self) -> Result<AnnotationReport, AnnotatorError> {
        let report = self.annotate()?;
        match &self.settings.output {
            Some(path) => {
                let file = File::create(path).map_err(|source| io_error(path, source))?;
                write_report(&report, file).map_err(|source| io_error(path, source))?;
                info!(path = %path.display(), "written annotated tree");
            }
            None => {
                write_report(&report, io::stdout().lock())
                    .map_err(|source| io_error(Path::new("<stdout>"), source))?;
            }
        }
        Ok(report)
    }
}

fn write_report<W: Write>(report: &AnnotationReport, writer: W) -> io::Result<()> {
    NexusWriter::new(writer).write_nexus(std::slice::from_ref(&report.tree), &report.taxa)
}

fn io_error(path: &Path, source: io::Error) -> AnnotatorError {
    AnnotatorError::Io {
        path: path.to_path_buf(),
        source,
    }
}

// =#========================================================================#=
// RUN
// =#========================================================================#=
/// State of one annotation run with a fixed key scheme.
struct Run<'a, S: KeyScheme> {
    settings: &'a Settings,
    reader: &'a mut NexusReader<InMemoryByteSource>,
    system: CladeSystem<S>,
    total_trees: usize,
    burnin: usize,
    trees_used: usize,
}

impl<'a, S: KeyScheme> Run<'a, S> {
    fn new(settings: &'a Settings, reader: &'a mut NexusReader<InMemoryByteSource>, scheme: S) -> Self {
        Run {
            settings,
            reader,
            system: CladeSystem::new(scheme, settings.target.needs_sub_clades()),
            total_trees: 0,
            burnin: 0,
            trees_used: 0,
        }
    }

    fn execute(mut self) -> Result<AnnotationReport, AnnotatorError> {
        self.count_trees()?;
        self.accumulate()?;
        self.enrich()?;
        let (mut target, target_score) = self.select_target()?;
        let reference_clades = self.compare_with_reference(&target)?;
        let (names, root_heights) = self.collect_attributes()?;
        self.annotate_target(&mut target, names, root_heights)?;
        target.set_name(OUTPUT_TREE_NAME);
        self.write_metrics(&target)?;

        Ok(AnnotationReport {
            tree: target,
            taxa: self.reader.taxa().clone(),
            total_trees: self.total_trees,
            burnin: self.burnin,
            trees_used: self.trees_used,
            unique_clades: self.system.clade_count(),
            target_score,
            reference_clades,
        })
    }

    // ------------------------------------------------------------------------
    // Count & accumulate
    // ------------------------------------------------------------------------
    fn count_trees(&mut self) -> Result<(), AnnotatorError> {
        let total = self.reader.count_trees()?;
        if total == 0 {
            return Err(AnnotatorError::NoTrees);
        }
        let names = match self.settings.burnin {
            Burnin::States(_) => self.reader.tree_names()?,
            _ => Vec::new(),
        };
        let burnin = self
            .settings
            .burnin
            .to_count(total, &names)
            .map_err(AnnotatorError::MissingState)?;
        if burnin >= total {
            return Err(AnnotatorError::BurninTooLarge { burnin, total });
        }
        info!(total, "counted trees");
        self.total_trees = total;
        self.burnin = burnin;
        Ok(())
    }

    /// Positions the reader on the first tree after the burn-in.
    fn rewind(&mut self) -> Result<(), AnnotatorError> {
        self.reader.reset();
        self.reader.skip_trees(self.burnin)?;
        Ok(())
    }

    fn progress_bar(&self, steps: usize) -> ProgressBar {
        if self.settings.show_progress {
            ProgressBar::new(steps)
        } else {
            ProgressBar::hidden(steps)
        }
    }

    fn accumulate(&mut self) -> Result<(), AnnotatorError> {
        info!("reading trees");
        self.rewind()?;
        let bar = self.progress_bar(self.total_trees - self.burnin);
        let batch_size = self.settings.batch_size;

        let mut batch = Vec::with_capacity(batch_size);
        while let Some(tree) = self.reader.next_tree()? {
            batch.push(tree);
            if batch.len() >= batch_size {
                self.add_batch(&mut batch, &bar)?;
            }
        }
        self.add_batch(&mut batch, &bar)?;
        bar.finish();

        if self.trees_used == 0 {
            return Err(AnnotatorError::BurninTooLarge {
                burnin: self.burnin,
                total: self.total_trees,
            });
        }
        self.system.calculate_clade_credibilities(self.trees_used)?;

        let unique = self.system.clade_count();
        info!(
            total = self.total_trees,
            tips = self.system.num_taxa(),
            burnin = self.burnin,
            "total trees read"
        );
        info!(
            unique,
            in_more_than_one_tree = unique - self.system.clade_frequency_count(1),
            "total unique clades"
        );
        Ok(())
    }

    fn add_batch(&mut self, batch: &mut Vec<Tree>, bar: &ProgressBar) -> Result<(), AnnotatorError> {
        if batch.is_empty() {
            return Ok(());
        }
        self.system.add_all(batch)?;
        self.trees_used += batch.len();
        bar.advance(batch.len());
        batch.clear();
        Ok(())
    }

    fn enrich(&mut self) -> Result<(), AnnotatorError> {
        let Some((min_size, min_count)) = self.settings.enrichment else {
            return Ok(());
        };
        if !self.settings.target.needs_sub_clades() {
            warn!("sub-clade enrichment only affects constructed targets, skipped");
            return Ok(());
        }
        self.system
            .enrich_sub_clades(min_size, min_count, self.settings.show_progress)?;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Target selection & reports
    // ------------------------------------------------------------------------
    fn select_target(&mut self) -> Result<(Tree, f64), AnnotatorError> {
        let settings = self.settings;
        let target = match &settings.target {
            Target::Mcc => self.mcc_tree()?,
            Target::Hipstr | Target::MrHipstr => {
                let majority_rule = settings.target == Target::MrHipstr;
                info!(majority_rule, "finding highest independent posterior subtree reconstruction");
                HipstrBuilder::new()
                    .majority_rule(majority_rule)
                    .build(&mut self.system)?
                    .tree
            }
            Target::MajorityRule => {
                info!("finding majority-rule consensus tree");
                MajorityRuleBuilder::new().build(&self.system)?
            }
            Target::UserTree(path) => {
                info!(path = %path.display(), "reading user target tree");
                read_tree_file(path, self.reader.taxa())?
            }
        };

        let score = self.system.log_clade_credibility(&target)?;
        info!(score = %format!("{score:.4}"), "target tree's log clade credibility");
        self.report_statistics(&target)?;
        Ok((target, score))
    }

    fn mcc_tree(&mut self) -> Result<Tree, AnnotatorError> {
        info!(trees = self.trees_used, "finding maximum clade credibility tree");
        self.rewind()?;
        let bar = self.progress_bar(self.trees_used);
        let mut selector = MccSelector::new();
        while let Some(tree) = self.reader.next_tree()? {
            selector.consider(&self.system, tree)?;
            bar.tick();
        }
        bar.finish();

        let best = selector.finish().ok_or(AnnotatorError::NoTargetTree)?;
        info!(
            name = best.tree.name().unwrap_or_default(),
            number = self.burnin + best.tree_number,
            "best tree"
        );
        Ok(best.tree)
    }

    fn report_statistics(&self, tree: &Tree) -> Result<(), AnnotatorError> {
        let system = &self.system;
        let lowest = system.minimum_clade_credibility(tree)?;
        let mean = system.mean_clade_credibility(tree)?.unwrap_or(f64::NAN);
        let median = system.median_clade_credibility(tree)?.unwrap_or(f64::NAN);
        info!(
            lowest = %format!("{lowest:.4}"),
            mean = %format!("{mean:.4}"),
            median = %format!("{median:.4}"),
            "individual clade credibility"
        );

        for threshold in REPORT_THRESHOLDS {
            let in_tree = system.top_clade_count_in_tree(tree, threshold)?;
            let in_sample = system.top_clade_count(threshold);
            if in_tree < in_sample {
                info!(threshold, clades = in_tree, in_sample, "clades with credibility at least threshold");
            } else {
                info!(threshold, clades = in_tree, "clades with credibility at least threshold");
            }
        }
        Ok(())
    }

    fn compare_with_reference(&self, target: &Tree) -> Result<Option<(usize, usize)>, AnnotatorError> {
        let Some(path) = &self.settings.reference else {
            return Ok(None);
        };
        info!(path = %path.display(), "reading reference tree");
        let reference = read_tree_file(path, self.reader.taxa())?;

        let scheme = self.system.scheme().clone();
        let target_system = CladeSystem::from_tree(scheme.clone(), target)?;
        let reference_system = CladeSystem::from_tree(scheme, &reference)?;
        let common = target_system.common_clade_count(&reference_system);
        let total = reference_system.clade_count();
        info!(common, total, "clades in common with reference tree");
        Ok(Some((common, total)))
    }

    // ------------------------------------------------------------------------
    // Collect & annotate
    // ------------------------------------------------------------------------
    /// Collects heights and annotations of every used tree.
    ///
    /// # Returns
    /// The collected attribute names, "height" first, and the root heights
    fn collect_attributes(&mut self) -> Result<(Vec<String>, Vec<f64>), AnnotatorError> {
        info!("collecting node information");
        self.rewind()?;
        let bar = self.progress_bar(self.trees_used);

        let mut collection: Option<CollectionAction> = None;
        while let Some(mut tree) = self.reader.next_tree()? {
            let action = collection.get_or_insert_with(|| CollectionAction::new(attribute_names(&tree)));
            self.system.traverse_tree(&mut tree, action)?;
            bar.tick();
        }
        bar.finish();

        let mut collection = collection.ok_or(AnnotatorError::NoTrees)?;
        let mut names = vec![HEIGHT.to_string()];
        names.extend(collection.tuple_names().iter().cloned());
        Ok((names, collection.take_root_heights()))
    }

    fn annotate_target(&mut self, target: &mut Tree, names: Vec<String>, root_heights: Vec<f64>) -> Result<(), AnnotatorError> {
        info!("annotating target tree");
        let settings = self.settings;
        let mut set_heights = SetHeightsAction::new(root_heights, settings.count_limit)
            .assign_heights(settings.target.is_constructed() && settings.heights == HeightsSummary::Keep);
        let mut annotation = AnnotationAction::new(settings.heights, names)
            .with_posterior_limit(settings.posterior_limit)
            .with_count_limit(settings.count_limit)
            .with_hpd_2d(settings.hpd_2d.clone())
            .force_discrete(settings.force_discrete);

        if target.is_binary() {
            self.system.traverse_tree(target, &mut set_heights)?;
            self.system.traverse_tree(target, &mut annotation)?;
        } else {
            self.system.traverse_tree_nary(target, &mut set_heights)?;
            self.system.traverse_tree_nary(target, &mut annotation)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Metrics
    // ------------------------------------------------------------------------
    /// Writes the distance of every used tree to the target, if asked to.
    fn write_metrics(&mut self, target: &Tree) -> Result<(), AnnotatorError> {
        let settings = self.settings;
        let Some(path) = settings.metrics.as_deref() else {
            return Ok(());
        };
        info!(path = %path.display(), trees = self.trees_used, "writing tree metrics");
        let file = File::create(path).map_err(|source| io_error(path, source))?;
        let mut out = BufWriter::new(file);
        writeln!(out, "{METRICS_HEADER}").map_err(|source| io_error(path, source))?;

        let scheme = self.system.scheme().clone();
        let target_system = CladeSystem::from_tree(scheme.clone(), target)?;
        self.rewind()?;
        let bar = self.progress_bar(self.trees_used);
        let mut position = self.burnin;
        while let Some(tree) = self.reader.next_tree()? {
            let tree_system = CladeSystem::from_tree(scheme.clone(), &tree)?;
            let distance = target_system.robinson_foulds_distance(&tree_system);
            let state = tree
                .name()
                .and_then(parse_state)
                .map_or_else(|| "NA".to_string(), |state| state.to_string());
            writeln!(out, "{position}\t{state}\t{distance}")
                .map_err(|source| io_error(path, source))?;
            position += 1;
            bar.tick();
        }
        bar.finish();
        out.flush().map_err(|source| io_error(path, source))
    }
}

/// "height", "length" and the annotation keys of `tree`, the latter sorted
/// case-insensitively without case-insensitive duplicates.
fn attribute_names(tree: &Tree) -> Vec<String> {
    let mut keys: Vec<&str> = tree
        .annotations()
        .keys()
        .filter(|&key| key != HEIGHT && key != LENGTH)
        .collect();
    keys.sort_by_cached_key(|key| key.to_lowercase());
    keys.dedup_by(|a, b| a.eq_ignore_ascii_case(b));

    [HEIGHT, LENGTH]
        .into_iter()
        .chain(keys)
        .map(String::from)
        .collect()
}

/// Reads the first tree of a Nexus or Newick file, resolving its labels
/// against `taxa` only.
fn read_tree_file(path: &Path, taxa: &TaxonSet) -> Result<Tree, AnnotatorError> {
    let bytes = std::fs::read(path).map_err(|source| io_error(path, source))?;
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    let is_nexus = bytes[start..]
        .get(..NEXUS_MAGIC.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(NEXUS_MAGIC));

    let mut byte_parser = ByteParser::new(InMemoryByteSource::from_vec(bytes));
    if is_nexus {
        let mut reader = NexusReader::with_taxa(byte_parser, taxa.clone())?;
        reader.next_tree()?.ok_or(AnnotatorError::NoTargetTree)
    } else {
        Ok(NewickParser::with_taxa(taxa.clone()).parse(&mut byte_parser)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_names_sorted_case_insensitively() {
        let mut parser = NewickParser::new();
        let tree = parser
            .parse_str("((Kea[&rate=1.0,Location=\"Otago\"]:1.0,Kaka[&rate=2.0]:1.0)[&height=1.0,beta=2]:1.0,Kakapo:2.0);")
            .unwrap();
        assert_eq!(
            attribute_names(&tree),
            vec!["height", "length", "beta", "Location", "rate"]
        );
    }

    #[test]
    fn test_attribute_names_without_annotations() {
        let mut parser = NewickParser::new();
        let tree = parser.parse_str("(Kea:1.0,Kaka:1.0);").unwrap();
        assert_eq!(attribute_names(&tree), vec!["height", "length"]);
    }
}
