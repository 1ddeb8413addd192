//! Newick format parser and writer for phylogenetic trees.
//!
//! [`NewickParser`] turns Newick strings into [`Tree`]s sharing one
//! [`TaxonSet`]. It is used directly for Newick input and by the Nexus
//! reader for the tree commands of a TREES block.
//!
//! # Quick API
//! * [`parse_file`] - parses a file of `;`-terminated Newick strings
//! * [`to_newick`] / [`to_annotated_newick`] - serialize a tree
//!
//! # Annotations
//! Extended Newick comments of the form `[&key=value,...]` following a
//! leaf label, a closing parenthesis or a branch length are parsed into
//! the tree's [`Annotations`](crate::model::Annotations):
//! * `A[&rate=0.543]:2.1`
//! * `(A,B)[&posterior=0.95,height_95%_HPD={1.2,3.4}]:6.7`
//! * `A:2.1[&location="Fiordland"]`
//!
//! Other comments are skipped.

mod defs;
mod parser;
pub(crate) mod writer;

pub use self::parser::NewickParser;
pub use self::writer::{NewickStyle, to_annotated_newick, to_newick, write_newick};

use crate::model::{TaxonSet, Tree};
use crate::parser::byte_parser::ByteParser;
use crate::parser::ParsingError;
use std::path::Path;

/// Parses all Newick strings of a file with a fresh parser.
///
/// # Returns
/// All trees and their shared taxon set
///
/// # Errors
/// Returns an error if the file cannot be read or a tree is invalid.
pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<(Vec<Tree>, TaxonSet), ParsingError> {
    let mut byte_parser = ByteParser::for_file(path)?;
    let mut newick_parser = NewickParser::new();
    let trees = newick_parser.parse_all(&mut byte_parser)?;
    Ok((trees, newick_parser.into_taxa()))
}
