//! Clades and the clade system.
//!
//! A clade is the set of taxa below a vertex. Across a posterior sample,
//! every unique clade becomes one [Clade] in a [CladeSystem], identified
//! by a key from a [KeyScheme]. With sub-clade retention, each clade also
//! remembers every pair of sub-clades it was built from, which turns the
//! collection into a DAG that HIPSTR reconstructs trees from.
//!
//! # Key schemes
//! - [BitsetScheme]: exact, memory grows with the number of taxa
//! - [FingerprintScheme]: one `u64` per clade, collisions negligible
//!
//! The scheme is a type parameter chosen once per run.

pub mod enrichment;
pub mod key;
pub mod node;
pub mod system;

pub use enrichment::EnrichmentStats;
pub use key::{
    BitsetKey, BitsetScheme, CladeKey, FingerprintKey, FingerprintRegistry, FingerprintScheme,
    KeyScheme,
};
pub use node::{Clade, CladeIndex, HeightSummary, SubCladePair};
pub use system::CladeSystem;
