//! NEXUS format reader and writer for phylogenetic trees.
//!
//! This module provides:
//! - [NexusReader]: lazy, resettable reading of the trees of a NEXUS file
//! - [NexusWriter]: writing annotated trees to a NEXUS file
//!
//! # Format
//! A NEXUS file of a posterior tree sample typically contains:
//! - A TAXA block defining the taxon labels
//! - A TREES block containing many trees, one `tree` command each
//! - An optional TRANSLATE command mapping short keys to full taxon labels
//!
//! Other blocks (DATA, CHARACTERS, ...) are skipped.

mod defs;
mod reader;
mod writer;

pub use self::reader::NexusReader;
pub use self::writer::NexusWriter;

use crate::model::{TaxonSet, Tree};
use crate::parser::ParsingError;
use std::path::Path;

/// Parses all trees of a NEXUS file.
///
/// # Returns
/// All trees in file order and their shared taxon set
///
/// # Errors
/// Returns an error if the file cannot be read or parsed.
pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<(Vec<Tree>, TaxonSet), ParsingError> {
    let mut reader = NexusReader::for_file(path)?;
    let trees = reader.by_ref().collect::<Result<Vec<_>, _>>()?;
    Ok((trees, reader.into_taxa()))
}
