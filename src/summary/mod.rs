//! Summary trees built from an accumulated [CladeSystem](crate::clade::CladeSystem).
//!
//! - [MccSelector]: the sampled tree with the highest product of clade
//!   credibilities
//! - [HipstrBuilder]: the highest-scoring tree assembled from the clade
//!   DAG, optionally with the majority-rule bonus (MrHIPSTR)
//! - [MajorityRuleBuilder]: the consensus of all clades in more than half
//!   of the trees
//!
//! Constructed trees (HIPSTR, majority rule) have all heights at 0; the
//! annotator sets them from the clades' height samples afterwards.

pub mod hipstr;
pub mod majority_rule;
pub mod mcc;

pub use hipstr::{HipstrBuilder, HipstrResult};
pub use majority_rule::MajorityRuleBuilder;
pub use mcc::{MccResult, MccSelector};
