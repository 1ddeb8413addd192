//! Summarizes the height samples of the clades of a target tree.

use crate::action::CladeAction;
use crate::clade::{Clade, HeightSummary};
use crate::error::CladeError;
use crate::model::{Tree, VertexIndex};
use crate::stats;

/// Spread below which range and HPD are not reported.
const MIN_SPREAD: f64 = 1e-8;

/// Computes a [HeightSummary] for every visited clade and caches it there.
///
/// The root vertex is summarized from the separately collected root
/// heights, every other vertex from its clade's height samples. Range and
/// 95% HPD are only computed for samples with spread and more than
/// `count_limit` values.
///
/// With [assign_heights](Self::assign_heights), the vertex height is set
/// to the mean; constructed summary trees get their heights this way.
#[derive(Debug, Clone)]
pub struct SetHeightsAction {
    root_heights: Vec<f64>,
    count_limit: usize,
    assign_heights: bool,
}

impl SetHeightsAction {
    pub fn new(root_heights: Vec<f64>, count_limit: usize) -> Self {
        SetHeightsAction {
            root_heights,
            count_limit,
            assign_heights: false,
        }
    }

    pub fn assign_heights(mut self, assign: bool) -> Self {
        self.assign_heights = assign;
        self
    }

    fn summarize(&self, heights: &[f64]) -> Option<HeightSummary> {
        let mean = stats::mean(heights);
        let median = stats::median(heights)?;
        let (min, max) = stats::range(heights)?;
        let spread = max - min > MIN_SPREAD && heights.len() > self.count_limit;
        Some(HeightSummary {
            mean,
            median,
            range: spread.then_some((min, max)),
            hpd: if spread {
                stats::hpd_interval(heights, 0.95)
            } else {
                None
            },
        })
    }
}

impl<K> CladeAction<K> for SetHeightsAction {
    fn act_on_clade(
        &mut self,
        clade: &mut Clade<K>,
        tree: &mut Tree,
        vertex: VertexIndex,
    ) -> Result<(), CladeError> {
        let heights = if vertex == tree.root_index() && !self.root_heights.is_empty() {
            &self.root_heights
        } else {
            &clade.height_values
        };
        let summary = self.summarize(heights);
        if self.assign_heights {
            if let Some(summary) = &summary {
                tree.set_height(vertex, summary.mean);
            }
        }
        clade.height_summary = summary;
        Ok(())
    }

    fn expect_all_clades(&self) -> bool {
        false
    }
}
