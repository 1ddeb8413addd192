use cladewick::clade::{BitsetScheme, CladeSystem, FingerprintScheme, KeyScheme};
use cladewick::model::{Tree, VertexIndex};
use cladewick::nexus::NexusReader;
use cladewick::summary::{HipstrBuilder, MccSelector};
use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::hint::black_box;

/// (name, taxa, trees) of the synthetic samples.
const SAMPLES: &[(&str, usize, usize)] = &[("n50-1k", 50, 1000), ("n200-1k", 200, 1000)];

const FIXTURE: &str = "tests/fixtures/parrots_t10_n4_annotated.trees";

/// Yule-like sample: random joins of the remaining lineages, with a few
/// "backbone" trees repeated so that clades recur across the sample.
fn random_sample(num_taxa: usize, num_trees: usize, seed: u64) -> Vec<Tree> {
    let mut rng = StdRng::seed_from_u64(seed);
    let backbones: Vec<Tree> = (0..5).map(|_| random_tree(num_taxa, &mut rng)).collect();
    (0..num_trees)
        .map(|i| {
            if i % 2 == 0 {
                backbones[i % backbones.len()].clone()
            } else {
                random_tree(num_taxa, &mut rng)
            }
        })
        .collect()
}

fn random_tree(num_taxa: usize, rng: &mut StdRng) -> Tree {
    let mut tree = Tree::with_capacity(num_taxa);
    let mut pool: Vec<VertexIndex> = (0..num_taxa).map(|t| tree.add_leaf(t, 0.0)).collect();
    let mut height = 0.0;
    while pool.len() > 1 {
        let first = pool.swap_remove(rng.gen_range(0..pool.len()));
        let second = pool.swap_remove(rng.gen_range(0..pool.len()));
        height += rng.r#gen::<f64>();
        pool.push(tree.add_internal(&[first, second], height));
    }
    tree.set_root(pool[0]);
    tree
}

fn filled_system<S: KeyScheme>(scheme: S, trees: &[Tree]) -> CladeSystem<S> {
    let mut system = CladeSystem::new(scheme, true);
    system.add_all(trees).unwrap();
    system.calculate_clade_credibilities(trees.len()).unwrap();
    system
}

fn clade_accumulation(c: &mut Criterion) {
    for &(name, num_taxa, num_trees) in SAMPLES {
        let trees = random_sample(num_taxa, num_trees, 42);
        c.bench_function(&format!("accumulate bitset {name}"), |b| {
            b.iter(|| filled_system(BitsetScheme, black_box(&trees)));
        });
        c.bench_function(&format!("accumulate fingerprint {name}"), |b| {
            b.iter(|| filled_system(FingerprintScheme::with_seed(42), black_box(&trees)));
        });
    }
}

fn summary_trees(c: &mut Criterion) {
    for &(name, num_taxa, num_trees) in SAMPLES {
        let trees = random_sample(num_taxa, num_trees, 7);
        let system = filled_system(BitsetScheme, &trees);

        c.bench_function(&format!("hipstr {name}"), |b| {
            b.iter_batched(
                || system_clone(&trees),
                |mut system| HipstrBuilder::new().build(&mut system).unwrap(),
                BatchSize::LargeInput,
            );
        });
        c.bench_function(&format!("mcc {name}"), |b| {
            b.iter(|| MccSelector::select(&system, trees.iter().cloned()).unwrap());
        });
    }
}

/// Fresh system for each HIPSTR run, so memoized scores do not carry over.
fn system_clone(trees: &[Tree]) -> CladeSystem<BitsetScheme> {
    filled_system(BitsetScheme, trees)
}

fn nexus_reading(c: &mut Criterion) {
    c.bench_function("read parrots fixture", |b| {
        b.iter(|| {
            let mut reader = NexusReader::for_file(FIXTURE).unwrap();
            while let Some(tree) = reader.next_tree().unwrap() {
                black_box(tree);
            }
        });
    });
}

criterion_group!(regression, nexus_reading);
criterion_group! {
    name = reporting;
    config = Criterion::default().sample_size(10);
    targets = clade_accumulation, summary_trees
}
criterion_main!(regression, reporting);
