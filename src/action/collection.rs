//! Collects per-occurrence samples from the trees of the posterior.

use crate::action::CladeAction;
use crate::clade::Clade;
use crate::error::CladeError;
use crate::model::{AnnotationValue, Tree, VertexIndex};

/// Name of the vertex height attribute.
pub const HEIGHT: &str = "height";
/// Name of the branch length attribute.
pub const LENGTH: &str = "length";

/// Appends the attribute values of each visited vertex to its clade.
///
/// "height" samples go to the clade's height list; every other attribute
/// forms one tuple per occurrence, in the order of
/// [tuple_names](Self::tuple_names). "length" reads the branch length
/// (absent at the root), all other names read vertex annotations.
///
/// The root height of every visited tree is kept separately and can be
/// taken with [take_root_heights](Self::take_root_heights).
#[derive(Debug, Clone, Default)]
pub struct CollectionAction {
    collect_heights: bool,
    tuple_names: Vec<String>,
    root_heights: Vec<f64>,
}

impl CollectionAction {
    pub fn new<I, T>(attribute_names: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let mut action = CollectionAction::default();
        for name in attribute_names {
            let name = name.into();
            if name == HEIGHT {
                action.collect_heights = true;
            } else if !action.tuple_names.contains(&name) {
                action.tuple_names.push(name);
            }
        }
        action
    }

    /// Names of the tuple entries, "height" excluded.
    pub fn tuple_names(&self) -> &[String] {
        &self.tuple_names
    }

    pub fn root_heights(&self) -> &[f64] {
        &self.root_heights
    }

    /// Returns the collected root heights, leaving the list empty.
    pub fn take_root_heights(&mut self) -> Vec<f64> {
        std::mem::take(&mut self.root_heights)
    }
}

impl<K> CladeAction<K> for CollectionAction {
    fn act_on_clade(
        &mut self,
        clade: &mut Clade<K>,
        tree: &mut Tree,
        vertex: VertexIndex,
    ) -> Result<(), CladeError> {
        let height = tree.height(vertex);
        if self.collect_heights {
            clade.height_values.push(height);
        }
        if vertex == tree.root_index() {
            self.root_heights.push(height);
        }

        if !self.tuple_names.is_empty() {
            let tuple = self
                .tuple_names
                .iter()
                .map(|name| match name.as_str() {
                    LENGTH => tree.branch_length(vertex).map(AnnotationValue::Float),
                    _ => tree.attribute(vertex, name).cloned(),
                })
                .collect();
            clade.attribute_values.push(tuple);
        }
        Ok(())
    }

    fn expect_all_clades(&self) -> bool {
        true
    }
}
