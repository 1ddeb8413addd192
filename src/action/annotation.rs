//! Writes clade statistics onto the vertices of a target tree.

use crate::action::CladeAction;
use crate::action::collection::HEIGHT;
use crate::clade::Clade;
use crate::error::CladeError;
use crate::model::{AnnotationValue, Tree, VertexIndex};
use crate::stats;
use std::collections::BTreeMap;
use tracing::warn;

/// Mass of the one-dimensional HPD intervals.
const HPD_MASS: f64 = 0.95;

/// How vertex heights of the target tree are set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HeightsSummary {
    /// Keep the heights of the target tree
    Keep,
    /// Mean of the clade's height samples
    #[default]
    Mean,
    /// Median of the clade's height samples
    Median,
    /// Common ancestor heights; not supported by the annotator
    CommonAncestor,
}

// =#========================================================================#=
// ANNOTATION ACTION
// =#========================================================================#=
/// Annotates each visited vertex with the statistics of its clade.
///
/// Internal vertices always get `posterior`. A vertex whose clade falls
/// below the posterior or count limit is *filtered*: it keeps only the
/// posterior and its height, no further statistics.
///
/// Per attribute, the type of the first sample decides what is written:
///
/// | Samples | Annotations |
/// |---------|-------------|
/// | numbers | `name`, and if they vary `name_median`, `name_95%_HPD`, `name_range`, `name_signDistribution` |
/// | booleans | `name` (fraction true) |
/// | strings (or integers, if forced discrete) | `name`, `name.prob`, `name.set`, `name.set.prob` |
/// | number arrays | per component `name{k}`, ..., and 2-D HPD regions for pairs |
#[derive(Debug, Clone)]
pub struct AnnotationAction {
    heights: HeightsSummary,
    posterior_limit: f64,
    count_limit: usize,
    hpd_2d: Vec<f64>,
    force_discrete: bool,
    annotate_heights: bool,
    tuple_names: Vec<String>,
}

impl AnnotationAction {
    /// Creates an annotation action.
    ///
    /// # Arguments
    /// * `heights` - Height policy
    /// * `attribute_names` - Attribute names in the order they were
    ///   collected; "height" selects the height statistics
    pub fn new<I, T>(heights: HeightsSummary, attribute_names: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let mut annotate_heights = false;
        let mut tuple_names: Vec<String> = Vec::new();
        for name in attribute_names {
            let name = name.into();
            if name == HEIGHT {
                annotate_heights = true;
            } else if !tuple_names.contains(&name) {
                tuple_names.push(name);
            }
        }
        AnnotationAction {
            heights,
            posterior_limit: 0.0,
            count_limit: 5,
            hpd_2d: vec![0.8],
            force_discrete: false,
            annotate_heights,
            tuple_names,
        }
    }

    pub fn with_posterior_limit(mut self, limit: f64) -> Self {
        self.posterior_limit = limit;
        self
    }

    pub fn with_count_limit(mut self, limit: usize) -> Self {
        self.count_limit = limit;
        self
    }

    /// Masses of the 2-D HPD regions of paired attributes.
    pub fn with_hpd_2d(mut self, levels: Vec<f64>) -> Self {
        self.hpd_2d = levels;
        self
    }

    /// Treat integer attributes as discrete categories.
    pub fn force_discrete(mut self, force: bool) -> Self {
        self.force_discrete = force;
        self
    }

    fn annotate_height<K>(&self, clade: &Clade<K>, tree: &mut Tree, vertex: VertexIndex, filter: bool) {
        let Some(summary) = clade.height_summary() else {
            return;
        };
        if !filter {
            tree.set_attribute(vertex, "height_mean", summary.mean);
            tree.set_attribute(vertex, "height_median", summary.median);
            if let Some((lower, upper)) = summary.hpd {
                tree.set_attribute(vertex, "height_95%_HPD", AnnotationValue::pair(lower, upper));
            }
            if let Some((min, max)) = summary.range {
                tree.set_attribute(vertex, "height_range", AnnotationValue::pair(min, max));
            }
        }
        match self.heights {
            HeightsSummary::Mean => tree.set_height(vertex, summary.mean),
            HeightsSummary::Median => tree.set_height(vertex, summary.median),
            HeightsSummary::Keep | HeightsSummary::CommonAncestor => {}
        }
    }

    fn annotate_attribute(&self, tree: &mut Tree, vertex: VertexIndex, name: &str, samples: &[&AnnotationValue]) {
        let Some(first) = samples.first() else {
            return;
        };
        match first {
            AnnotationValue::Bool(_) => {
                let values: Vec<f64> = samples.iter().filter_map(|v| v.as_f64()).collect();
                tree.set_attribute(vertex, name, stats::mean(&values));
            }
            AnnotationValue::String(_) => annotate_discrete(tree, vertex, name, samples),
            AnnotationValue::Int(_) if self.force_discrete => {
                annotate_discrete(tree, vertex, name, samples)
            }
            AnnotationValue::Int(_) | AnnotationValue::Float(_) => {
                let values: Vec<f64> = samples
                    .iter()
                    .filter(|v| matches!(v, AnnotationValue::Int(_) | AnnotationValue::Float(_)))
                    .filter_map(|v| v.as_f64())
                    .collect();
                annotate_numeric(tree, vertex, name, &values);
            }
            AnnotationValue::Array(_) => {
                if let Some(width) = first.as_f64_array().map(|a| a.len()) {
                    let mut components = vec![Vec::with_capacity(samples.len()); width];
                    for array in samples.iter().filter_map(|v| v.as_f64_array()) {
                        if array.len() == width {
                            for (k, value) in array.into_iter().enumerate() {
                                components[k].push(value);
                            }
                        }
                    }
                    self.annotate_array(tree, vertex, name, &components);
                }
            }
        }
    }

    fn annotate_array(&self, tree: &mut Tree, vertex: VertexIndex, name: &str, components: &[Vec<f64>]) {
        let want_2d = components.len() == 2 && name != "dmv";
        let varies: Vec<bool> = components
            .iter()
            .map(|values| stats::range(values).is_some_and(|(min, max)| min < max))
            .collect();

        for (k, values) in components.iter().enumerate() {
            let component = format!("{name}{}", k + 1);
            tree.set_attribute(vertex, component.as_str(), stats::mean(values));
            if !varies[k] {
                continue;
            }
            if let Some(median) = stats::median(values) {
                tree.set_attribute(vertex, format!("{component}_median"), median);
            }
            if let Some((min, max)) = stats::range(values) {
                tree.set_attribute(vertex, format!("{component}_range"), AnnotationValue::pair(min, max));
            }
            tree.set_attribute(
                vertex,
                format!("{component}_positiveProb"),
                1.0 - stats::negative_probability(values),
            );
            if !want_2d {
                set_hpd(tree, vertex, &format!("{component}_95%_HPD"), values);
            }
        }

        if !want_2d {
            return;
        }
        match (varies[0], varies[1]) {
            (true, false) => set_hpd(tree, vertex, &format!("{name}1_95%_HPD"), &components[0]),
            (false, true) => set_hpd(tree, vertex, &format!("{name}2_95%_HPD"), &components[1]),
            (true, true) => {
                for &mass in &self.hpd_2d {
                    if !(0.0..=1.0).contains(&mass) {
                        warn!(mass, "no 2D HPD for proportion outside [0, 1]");
                        continue;
                    }
                    annotate_2d_hpd(tree, vertex, name, mass, &components[0], &components[1]);
                }
            }
            (false, false) => {}
        }
    }
}

impl<K> CladeAction<K> for AnnotationAction {
    fn act_on_clade(
        &mut self,
        clade: &mut Clade<K>,
        tree: &mut Tree,
        vertex: VertexIndex,
    ) -> Result<(), CladeError> {
        let mut filter = false;
        if tree[vertex].is_internal() {
            let posterior = clade.credibility();
            tree.set_attribute(vertex, "posterior", posterior);
            filter = posterior < self.posterior_limit || clade.count() < self.count_limit;
        }

        if self.annotate_heights {
            self.annotate_height(clade, tree, vertex, filter);
        }
        if filter {
            return Ok(());
        }

        for (i, name) in self.tuple_names.iter().enumerate() {
            let samples: Vec<&AnnotationValue> = clade
                .attribute_values()
                .iter()
                .filter_map(|tuple| tuple.get(i).and_then(Option::as_ref))
                .collect();
            self.annotate_attribute(tree, vertex, name, &samples);
        }
        Ok(())
    }

    fn expect_all_clades(&self) -> bool {
        false
    }
}

// ============================================================================
// Helpers
// ============================================================================
fn set_hpd(tree: &mut Tree, vertex: VertexIndex, label: &str, values: &[f64]) {
    if let Some((lower, upper)) = stats::hpd_interval(values, HPD_MASS) {
        tree.set_attribute(vertex, label, AnnotationValue::pair(lower, upper));
    }
}

fn annotate_numeric(tree: &mut Tree, vertex: VertexIndex, name: &str, values: &[f64]) {
    if values.is_empty() {
        return;
    }
    tree.set_attribute(vertex, name, stats::mean(values));
    let Some((min, max)) = stats::range(values) else {
        return;
    };
    if min < max {
        if let Some(median) = stats::median(values) {
            tree.set_attribute(vertex, format!("{name}_median"), median);
        }
        set_hpd(tree, vertex, &format!("{name}_95%_HPD"), values);
        tree.set_attribute(vertex, format!("{name}_range"), AnnotationValue::pair(min, max));
        let negative = stats::negative_probability(values);
        tree.set_attribute(
            vertex,
            format!("{name}_signDistribution"),
            AnnotationValue::pair(negative, 1.0 - negative),
        );
    }
}

/// Mode (ties joined with `+`), its probability, and the frequency of
/// every observed category.
fn annotate_discrete(tree: &mut Tree, vertex: VertexIndex, name: &str, samples: &[&AnnotationValue]) {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for sample in samples {
        let category = match sample {
            AnnotationValue::String(s) => s.clone(),
            other => other.to_string(),
        };
        *counts.entry(category).or_default() += 1;
    }
    let total: usize = counts.values().sum();
    if total == 0 {
        return;
    }

    let mut mode: Vec<&str> = Vec::new();
    let mut max_count = 0;
    for (category, &count) in &counts {
        if count > max_count {
            max_count = count;
            mode.clear();
            mode.push(category);
        } else if count == max_count {
            mode.push(category);
        }
    }
    let probability = max_count as f64 / total as f64 * mode.len() as f64;
    tree.set_attribute(vertex, name, mode.join("+"));
    tree.set_attribute(vertex, format!("{name}.prob"), probability);

    let set: Vec<String> = counts.keys().cloned().collect();
    let frequencies: Vec<f64> = counts
        .values()
        .map(|&c| c as f64 / total as f64)
        .collect();
    tree.set_attribute(vertex, format!("{name}.set"), set);
    tree.set_attribute(vertex, format!("{name}.set.prob"), frequencies);
}

fn annotate_2d_hpd(tree: &mut Tree, vertex: VertexIndex, name: &str, mass: f64, xs: &[f64], ys: &[f64]) {
    let percent = (100.0 * mass) as i64;
    let paths = stats::hpd_contours(xs, ys, mass);
    tree.set_attribute(vertex, format!("{name}_{percent}%HPD_modality"), paths.len());
    if paths.len() > 1 {
        warn!(
            vertex,
            attribute = name,
            "disjoint {percent}% HPD region, may be an artifact; try decreasing the mass or adding samples"
        );
    }
    for (i, path) in paths.into_iter().enumerate() {
        tree.set_attribute(vertex, format!("{name}1_{percent}%HPD_{}", i + 1), path.xs);
        tree.set_attribute(vertex, format!("{name}2_{percent}%HPD_{}", i + 1), path.ys);
    }
}
