use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use cladewick::action::HeightsSummary;
use cladewick::annotator::{Burnin, KeySchemeKind, Target, TreeAnnotatorBuilder};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Summarizes a posterior sample of trees into one annotated tree.
#[derive(Parser, Debug)]
#[command(name = "cladewick")]
#[command(version)]
#[command(after_help = "Examples:\n  \
    cladewick test.trees out.tree\n  \
    cladewick --burnin-trees 100 --heights mean test.trees out.tree\n  \
    cladewick --type mcc --limit 0.5 test.trees out.tree")]
struct Cli {
    /// Summary tree to build
    #[arg(long = "type", value_enum, default_value_t = TargetArg::Hipstr)]
    target_type: TargetArg,

    /// Heights of the summary tree
    #[arg(long, value_enum, default_value_t = HeightsArg::Mean)]
    heights: HeightsArg,

    /// Burn-in as number of states, read from STATE_<n> tree names
    #[arg(long, value_name = "STATES", conflicts_with = "burnin_trees")]
    burnin: Option<u64>,

    /// Burn-in as number of trees
    #[arg(long, value_name = "TREES")]
    burnin_trees: Option<usize>,

    /// Minimum posterior probability of clades to annotate fully
    #[arg(long, default_value_t = 0.0)]
    limit: f64,

    /// Minimum number of trees a clade must be seen in to annotate fully
    #[arg(long, default_value_t = 5)]
    limit_count: usize,

    /// Annotate this tree (Nexus or Newick) instead of building one
    #[arg(long, value_name = "FILE")]
    target: Option<PathBuf>,

    /// Report the clades shared with this tree (Nexus or Newick)
    #[arg(long, value_name = "FILE")]
    reference: Option<PathBuf>,

    /// Write the Robinson-Foulds distance of every tree to the target to this file
    #[arg(long, value_name = "FILE")]
    metrics: Option<PathBuf>,

    /// Number of worker threads, 0 for one per core
    #[arg(long, default_value_t = 0)]
    threads: usize,

    /// Treat integer attributes as discrete traits
    #[arg(long)]
    force_discrete: bool,

    /// Masses of the 2-D HPD regions of paired attributes
    #[arg(long = "hpd-2d", value_delimiter = ',', default_value = "0.80")]
    hpd_2d: Vec<f64>,

    /// Clade keys
    #[arg(long, value_enum, default_value_t = KeysArg::Bitset)]
    keys: KeysArg,

    /// Seed of the fingerprint keys
    #[arg(long)]
    seed: Option<u64>,

    /// Enrich sub-clade pairs of clades with at least MIN_SIZE taxa seen in MIN_COUNT trees
    #[arg(long, value_name = "MIN_SIZE,MIN_COUNT", value_parser = parse_pair)]
    embiggen: Option<(usize, usize)>,

    /// Input tree sample (Nexus)
    input: PathBuf,

    /// Output file, stdout if omitted
    output: Option<PathBuf>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum TargetArg {
    Hipstr,
    Mrhipstr,
    Mcc,
    Mrc,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum HeightsArg {
    Keep,
    Median,
    Mean,
    Ca,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum KeysArg {
    Bitset,
    Fingerprint,
}

fn parse_pair(s: &str) -> Result<(usize, usize), String> {
    let (first, second) = s
        .split_once(',')
        .ok_or_else(|| format!("expected MIN_SIZE,MIN_COUNT, found '{s}'"))?;
    let parse = |v: &str| {
        v.trim()
            .parse::<usize>()
            .map_err(|e| format!("invalid number '{v}': {e}"))
    };
    Ok((parse(first)?, parse(second)?))
}

impl Cli {
    fn into_builder(self) -> TreeAnnotatorBuilder {
        let target = match (self.target, self.target_type) {
            (Some(path), _) => Target::UserTree(path),
            (None, TargetArg::Hipstr) => Target::Hipstr,
            (None, TargetArg::Mrhipstr) => Target::MrHipstr,
            (None, TargetArg::Mcc) => Target::Mcc,
            (None, TargetArg::Mrc) => Target::MajorityRule,
        };
        let burnin = match (self.burnin, self.burnin_trees) {
            (Some(states), _) if states > 0 => Burnin::States(states),
            (_, Some(trees)) if trees > 0 => Burnin::Trees(trees),
            _ => Burnin::None,
        };
        let heights = match self.heights {
            HeightsArg::Keep => HeightsSummary::Keep,
            HeightsArg::Median => HeightsSummary::Median,
            HeightsArg::Mean => HeightsSummary::Mean,
            HeightsArg::Ca => HeightsSummary::CommonAncestor,
        };
        let keys = match self.keys {
            KeysArg::Bitset => KeySchemeKind::Bitset,
            KeysArg::Fingerprint => KeySchemeKind::Fingerprint,
        };

        let mut builder = TreeAnnotatorBuilder::for_file(&self.input)
            .with_target(target)
            .with_burnin(burnin)
            .with_heights(heights)
            .with_posterior_limit(self.limit)
            .with_count_limit(self.limit_count)
            .with_hpd_2d(self.hpd_2d)
            .with_key_scheme(keys)
            .with_threads(self.threads);
        if self.force_discrete {
            builder = builder.force_discrete();
        }
        if let Some(seed) = self.seed {
            builder = builder.with_seed(seed);
        }
        if let Some(reference) = self.reference {
            builder = builder.with_reference(reference);
        }
        if let Some(metrics) = self.metrics {
            builder = builder.with_metrics(metrics);
        }
        if let Some((min_size, min_count)) = self.embiggen {
            builder = builder.with_enrichment(min_size, min_count);
        }
        if let Some(output) = self.output {
            builder = builder.with_output(output);
        }
        builder
    }
}

fn run(cli: Cli) -> Result<()> {
    let input = cli.input.clone();
    let mut annotator = cli
        .into_builder()
        .build()
        .with_context(|| format!("cannot prepare annotation of {}", input.display()))?;
    let report = annotator
        .run()
        .with_context(|| format!("annotation of {} failed", input.display()))?;
    tracing::info!(
        trees_used = report.trees_used,
        clades = report.unique_clades,
        "done"
    );
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
