//! Configuration of a [TreeAnnotator] run.

use crate::action::HeightsSummary;
use crate::annotator::driver::{Settings, TreeAnnotator};
use crate::annotator::{Burnin, KeySchemeKind, Target};
use crate::error::AnnotatorError;
use crate::nexus::NexusReader;
use crate::parser::byte_parser::ByteParser;
use crate::parser::byte_source::InMemoryByteSource;
use crate::parser::ParsingErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default number of trees accumulated per batch.
const DEFAULT_BATCH_SIZE: usize = 500;

// =#========================================================================#=
// TREE ANNOTATOR BUILDER
// =#========================================================================#=
/// Builder for configuring and creating a [TreeAnnotator].
///
/// # Configuration Options
///
/// * **Target**: [with_target()](Self::with_target), HIPSTR by default
/// * **Burn-in**: [with_burnin()](Self::with_burnin), none by default
/// * **Heights**: [with_heights()](Self::with_heights), mean clade heights by default
/// * **Annotation limits**:
///   - [with_posterior_limit()](Self::with_posterior_limit) - minimum credibility of annotated clades (0.0)
///   - [with_count_limit()](Self::with_count_limit) - minimum number of samples (5)
///   - [with_hpd_2d()](Self::with_hpd_2d) - masses of 2-D HPD regions (0.80)
///   - [force_discrete()](Self::force_discrete) - integer attributes as categories
/// * **Clade keys**: [with_key_scheme()](Self::with_key_scheme) and [with_seed()](Self::with_seed)
/// * **Threads**: [with_threads()](Self::with_threads), 0 for the rayon default
/// * **Extras**: [with_reference()](Self::with_reference), [with_enrichment()](Self::with_enrichment),
///   [with_metrics()](Self::with_metrics)
/// * **Output**: [with_output()](Self::with_output), stdout by default
///
/// # Example
/// ```no_run
/// use cladewick::annotator::{Burnin, Target, TreeAnnotatorBuilder};
///
/// let mut annotator = TreeAnnotatorBuilder::for_file("psittaciformes.trees")
///     .with_target(Target::Mcc)
///     .with_burnin(Burnin::Trees(1000))
///     .with_posterior_limit(0.5)
///     .with_threads(4)
///     .build()?;
/// let report = annotator.annotate()?;
/// println!("{} of {} trees used", report.trees_used, report.total_trees);
/// # Ok::<(), cladewick::error::AnnotatorError>(())
/// ```
#[derive(Debug, Clone)]
pub struct TreeAnnotatorBuilder {
    input: PathBuf,
    settings: Settings,
}

// ============================================================================
// Building (pub)
// ============================================================================
impl TreeAnnotatorBuilder {
    /// Creates a builder for the tree sample in `input` with default settings.
    ///
    /// The file is only read by [build()](Self::build).
    pub fn for_file<P: AsRef<Path>>(input: P) -> Self {
        TreeAnnotatorBuilder {
            input: input.as_ref().to_path_buf(),
            settings: Settings {
                target: Target::default(),
                burnin: Burnin::default(),
                heights: HeightsSummary::default(),
                posterior_limit: 0.0,
                count_limit: 5,
                hpd_2d: vec![0.8],
                force_discrete: false,
                key_scheme: KeySchemeKind::default(),
                seed: None,
                threads: 0,
                reference: None,
                enrichment: None,
                metrics: None,
                output: None,
                batch_size: DEFAULT_BATCH_SIZE,
                show_progress: true,
            },
        }
    }

    pub fn with_target(mut self, target: Target) -> Self {
        self.settings.target = target;
        self
    }

    pub fn with_burnin(mut self, burnin: Burnin) -> Self {
        self.settings.burnin = burnin;
        self
    }

    /// How the heights of the target are set.
    ///
    /// [HeightsSummary::CommonAncestor] makes [build()](Self::build) fail.
    /// Constructed targets get mean heights with [HeightsSummary::Keep].
    pub fn with_heights(mut self, heights: HeightsSummary) -> Self {
        self.settings.heights = heights;
        self
    }

    /// Clades below this credibility only get their posterior annotated.
    pub fn with_posterior_limit(mut self, limit: f64) -> Self {
        self.settings.posterior_limit = limit;
        self
    }

    /// Clades seen in fewer trees only get their posterior annotated.
    pub fn with_count_limit(mut self, limit: usize) -> Self {
        self.settings.count_limit = limit;
        self
    }

    pub fn with_hpd_2d(mut self, levels: Vec<f64>) -> Self {
        self.settings.hpd_2d = levels;
        self
    }

    pub fn force_discrete(mut self) -> Self {
        self.settings.force_discrete = true;
        self
    }

    pub fn with_key_scheme(mut self, key_scheme: KeySchemeKind) -> Self {
        self.settings.key_scheme = key_scheme;
        self
    }

    /// Seed of the taxon fingerprints; entropy if unset.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.settings.seed = Some(seed);
        self
    }

    /// Number of worker threads; 0 uses the rayon default.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.settings.threads = threads;
        self
    }

    /// Reports the clades the target shares with the first tree of `path`.
    pub fn with_reference<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.settings.reference = Some(path.as_ref().to_path_buf());
        self
    }

    /// Enriches the recorded sub-clade pairs before the target is built.
    ///
    /// Only clades with at least `min_size` taxa seen in at least
    /// `min_count` trees take part. Requires bitset keys.
    pub fn with_enrichment(mut self, min_size: usize, min_count: usize) -> Self {
        self.settings.enrichment = Some((min_size, min_count));
        self
    }

    /// Writes a tab-separated table comparing every used tree with the
    /// annotated target to `path`.
    ///
    /// One row per tree: its position in the file, the state number of
    /// its `STATE_<n>` name (`NA` otherwise) and its rooted
    /// Robinson-Foulds distance to the target.
    pub fn with_metrics<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.settings.metrics = Some(path.as_ref().to_path_buf());
        self
    }

    /// Writes the annotated tree to `path` instead of stdout.
    pub fn with_output<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.settings.output = Some(path.as_ref().to_path_buf());
        self
    }

    /// Number of trees handed to the clade system at once.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.settings.batch_size = batch_size.max(1);
        self
    }

    /// Draws progress bars on stderr (default).
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.settings.show_progress = show_progress;
        self
    }

    /// Validates the settings, reads the input into memory and parses it
    /// up to the first tree.
    ///
    /// # Errors
    /// - [AnnotatorError::Unsupported] for common-ancestor heights, or
    ///   enrichment with fingerprint keys
    /// - [AnnotatorError::Io] if the input cannot be read
    /// - [AnnotatorError::NoTrees] if the input has no TREES block
    /// - [AnnotatorError::Parse] if the Nexus header or blocks are invalid
    /// - [AnnotatorError::ThreadPool] if the worker threads cannot be started
    pub fn build(self) -> Result<TreeAnnotator, AnnotatorError> {
        let TreeAnnotatorBuilder { input, settings } = self;

        if settings.heights == HeightsSummary::CommonAncestor {
            return Err(AnnotatorError::Unsupported(
                "common ancestor heights; use a HIPSTR target instead".to_string(),
            ));
        }
        if settings.enrichment.is_some() && settings.key_scheme == KeySchemeKind::Fingerprint {
            return Err(AnnotatorError::Unsupported(
                "sub-clade enrichment with fingerprint keys".to_string(),
            ));
        }

        let source = InMemoryByteSource::from_file(&input).map_err(|source| AnnotatorError::Io {
            path: input.clone(),
            source,
        })?;
        debug!(path = %input.display(), bytes = source.len(), "loaded tree sample");

        let reader = NexusReader::new(ByteParser::new(source)).map_err(|e| match e.kind() {
            ParsingErrorKind::NoTree => AnnotatorError::NoTrees,
            _ => AnnotatorError::Parse(e),
        })?;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(settings.threads)
            .build()?;

        Ok(TreeAnnotator::new(settings, reader, pool))
    }
}
