//! Visitors walking a concrete tree in lock-step with a clade system.
//!
//! [CladeSystem::traverse_tree](crate::clade::CladeSystem::traverse_tree)
//! resolves the clade of every vertex bottom-up and hands both to a
//! [CladeAction]:
//!
//! | Action | Reads | Writes | All clades expected |
//! |--------|-------|--------|---------------------|
//! | [CollectionAction] | vertex heights and annotations | clade samples | yes |
//! | [SetHeightsAction] | clade height samples | height summary, vertex heights | no |
//! | [AnnotationAction] | clade samples and credibility | vertex annotations | no |

pub mod annotation;
pub mod collection;
pub mod set_heights;

pub use annotation::{AnnotationAction, HeightsSummary};
pub use collection::CollectionAction;
pub use set_heights::SetHeightsAction;

use crate::clade::Clade;
use crate::error::CladeError;
use crate::model::{Tree, VertexIndex};

/// Visitor invoked for each vertex of a tree together with its clade.
pub trait CladeAction<K> {
    /// Acts on `clade`, the clade of `vertex` in `tree`.
    fn act_on_clade(
        &mut self,
        clade: &mut Clade<K>,
        tree: &mut Tree,
        vertex: VertexIndex,
    ) -> Result<(), CladeError>;

    /// Whether a vertex without a registered clade is an error
    /// (`true`) or silently skipped (`false`).
    fn expect_all_clades(&self) -> bool;
}
