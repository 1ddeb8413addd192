//! Vertex annotations for phylogenetic trees.
//!
//! [Annotations] stores the `[&key=value,...]` data of a tree's vertices,
//! one column per key. Values are captured by [AnnotationValue].

use crate::model::VertexIndex;
use crate::parser::utils::format_float;
use std::collections::BTreeMap;
use std::fmt;

// =#========================================================================#=
// ANNOTATIONS
// =#========================================================================#=
/// Vertex annotations for multiple keys.
///
/// Each key owns a column indexed by [VertexIndex]; a vertex without a
/// value for that key holds `None`. Columns grow on demand, so annotations
/// can be added while a tree is still being built. Keys iterate in sorted
/// order, which keeps written output stable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Annotations {
    columns: BTreeMap<String, Vec<Option<AnnotationValue>>>,
}

impl Annotations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value stored for `key` at the given vertex.
    pub fn get(&self, key: &str, vertex_index: VertexIndex) -> Option<&AnnotationValue> {
        self.columns
            .get(key)
            .and_then(|column| column.get(vertex_index))
            .and_then(Option::as_ref)
    }

    /// Sets the value for `key` at the given vertex, replacing any previous one.
    pub fn set(&mut self, key: impl Into<String>, vertex_index: VertexIndex, value: AnnotationValue) {
        let column = self.columns.entry(key.into()).or_default();
        if column.len() <= vertex_index {
            column.resize(vertex_index + 1, None);
        }
        column[vertex_index] = Some(value);
    }

    /// Removes the value for `key` at the given vertex, returning it.
    pub fn remove(&mut self, key: &str, vertex_index: VertexIndex) -> Option<AnnotationValue> {
        self.columns
            .get_mut(key)
            .and_then(|column| column.get_mut(vertex_index))
            .and_then(Option::take)
    }

    /// All keys with at least one column, in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    /// All `(key, value)` pairs present on the given vertex, keys sorted.
    pub fn for_vertex(&self, vertex_index: VertexIndex) -> impl Iterator<Item = (&str, &AnnotationValue)> {
        self.columns.iter().filter_map(move |(key, column)| {
            column
                .get(vertex_index)
                .and_then(Option::as_ref)
                .map(|value| (key.as_str(), value))
        })
    }

    /// Returns whether the given vertex carries any annotation.
    pub fn has_any(&self, vertex_index: VertexIndex) -> bool {
        self.for_vertex(vertex_index).next().is_some()
    }

    /// Drops all annotations.
    pub fn clear(&mut self) {
        self.columns.clear();
    }
}

// =#========================================================================#=
// ANNOTATION VALUE
// =#========================================================================#=
/// A parsed or computed annotation value.
#[derive(Debug, Clone, PartialEq)]
pub enum AnnotationValue {
    Float(f64),
    Int(i64),
    Bool(bool),
    String(String),
    /// `{a,b,...}` lists such as HPD intervals or coordinates
    Array(Vec<AnnotationValue>),
}

impl AnnotationValue {
    /// Numeric view of the value (`Bool` maps to 1/0).
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AnnotationValue::Float(v) => Some(*v),
            AnnotationValue::Int(v) => Some(*v as f64),
            AnnotationValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// Returns the components if this is an array of numbers only.
    pub fn as_f64_array(&self) -> Option<Vec<f64>> {
        match self {
            AnnotationValue::Array(values) if !values.is_empty() => values
                .iter()
                .map(|v| match v {
                    AnnotationValue::Float(x) => Some(*x),
                    AnnotationValue::Int(x) => Some(*x as f64),
                    _ => None,
                })
                .collect(),
            _ => None,
        }
    }

    /// Builds a two-element array, e.g. an interval.
    pub fn pair(first: f64, second: f64) -> Self {
        AnnotationValue::Array(vec![AnnotationValue::Float(first), AnnotationValue::Float(second)])
    }
}

impl fmt::Display for AnnotationValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AnnotationValue::Float(v) => write!(f, "{}", format_float(*v)),
            AnnotationValue::Int(v) => write!(f, "{v}"),
            AnnotationValue::Bool(v) => write!(f, "{v}"),
            AnnotationValue::String(s) => write!(f, "\"{}\"", s.replace('"', "\"\"")),
            AnnotationValue::Array(values) => {
                write!(f, "{{")?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{value}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<f64> for AnnotationValue {
    fn from(v: f64) -> Self {
        AnnotationValue::Float(v)
    }
}

impl From<i64> for AnnotationValue {
    fn from(v: i64) -> Self {
        AnnotationValue::Int(v)
    }
}

impl From<usize> for AnnotationValue {
    fn from(v: usize) -> Self {
        AnnotationValue::Int(v as i64)
    }
}

impl From<bool> for AnnotationValue {
    fn from(v: bool) -> Self {
        AnnotationValue::Bool(v)
    }
}

impl From<String> for AnnotationValue {
    fn from(v: String) -> Self {
        AnnotationValue::String(v)
    }
}

impl From<&str> for AnnotationValue {
    fn from(v: &str) -> Self {
        AnnotationValue::String(v.to_string())
    }
}

impl From<Vec<f64>> for AnnotationValue {
    fn from(values: Vec<f64>) -> Self {
        AnnotationValue::Array(values.into_iter().map(AnnotationValue::Float).collect())
    }
}

impl From<Vec<String>> for AnnotationValue {
    fn from(values: Vec<String>) -> Self {
        AnnotationValue::Array(values.into_iter().map(AnnotationValue::String).collect())
    }
}
