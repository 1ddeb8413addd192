//! Parsing infrastructure shared by the Nexus and Newick readers.
//!
//! The byte-level [ByteParser](byte_parser::ByteParser) works on a
//! seekable [ByteSource](byte_source::ByteSource) so that a tree sample can
//! be read more than once without touching the file system again.

pub mod byte_parser;
pub mod byte_source;
pub mod parsing_error;
pub mod utils;

pub use parsing_error::{ParsingError, ParsingErrorKind};
