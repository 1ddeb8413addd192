//! Error type for Nexus and Newick parsing.
//!
//! A [ParsingError] carries the [ParsingErrorKind], the byte position at
//! which the parser gave up and a short excerpt of the input following it.

use crate::parser::byte_parser::ByteParser;
use crate::parser::byte_source::ByteSource;
use std::fmt;
use thiserror::Error;

/// Number of bytes of input quoted in error messages.
const DEFAULT_CONTEXT_LENGTH: usize = 50;

// =#========================================================================#=
// PARSING ERROR KIND
// =#========================================================================#=
/// What went wrong while parsing.
#[derive(Error, PartialEq, Debug, Clone)]
pub enum ParsingErrorKind {
    #[error("IO error - {0}")]
    Io(String),
    #[error("Unexpected end of file")]
    UnexpectedEof,
    #[error("File does not start with #NEXUS header")]
    MissingNexusHeader,
    #[error("Invalid block name")]
    InvalidBlockName,
    #[error("Invalid TAXA block format - {0}")]
    InvalidTaxaBlock(String),
    #[error("Invalid TREES block format - {0}")]
    InvalidTreesBlock(String),
    #[error("Unclosed comment")]
    UnclosedComment,
    #[error("Invalid newick string: {0}")]
    InvalidNewickString(String),
    #[error("Invalid annotation - {0}")]
    InvalidAnnotation(String),
    #[error("Could not resolve taxon label - {0}")]
    UnresolvedLabel(String),
    #[error("No tree found")]
    NoTree,
}

// =#========================================================================#=
// PARSING ERROR
// =#========================================================================#=
/// Parsing error with position and a snippet of the offending input.
#[derive(Debug, Clone)]
pub struct ParsingError {
    kind: ParsingErrorKind,
    position: usize,
    context: String,
}

impl ParsingError {
    /// Creates an error from a kind and the current parser state.
    pub fn from_parser<S: ByteSource>(kind: ParsingErrorKind, parser: &ByteParser<S>) -> Self {
        Self {
            kind,
            position: parser.position(),
            context: parser.get_context_as_string(DEFAULT_CONTEXT_LENGTH),
        }
    }

    /// Creates an error without parser context.
    pub fn without_context(kind: ParsingErrorKind) -> Self {
        Self { kind, position: 0, context: String::new() }
    }

    pub fn unexpected_eof<S: ByteSource>(parser: &ByteParser<S>) -> Self {
        Self::from_parser(ParsingErrorKind::UnexpectedEof, parser)
    }

    pub fn missing_nexus_header<S: ByteSource>(parser: &ByteParser<S>) -> Self {
        Self::from_parser(ParsingErrorKind::MissingNexusHeader, parser)
    }

    pub fn invalid_block_name<S: ByteSource>(parser: &ByteParser<S>) -> Self {
        Self::from_parser(ParsingErrorKind::InvalidBlockName, parser)
    }

    pub fn invalid_taxa_block<S: ByteSource>(parser: &ByteParser<S>, msg: String) -> Self {
        Self::from_parser(ParsingErrorKind::InvalidTaxaBlock(msg), parser)
    }

    pub fn invalid_trees_block<S: ByteSource>(parser: &ByteParser<S>, msg: String) -> Self {
        Self::from_parser(ParsingErrorKind::InvalidTreesBlock(msg), parser)
    }

    pub fn unclosed_comment<S: ByteSource>(parser: &ByteParser<S>) -> Self {
        Self::from_parser(ParsingErrorKind::UnclosedComment, parser)
    }

    pub fn invalid_newick_string<S: ByteSource>(parser: &ByteParser<S>, msg: String) -> Self {
        Self::from_parser(ParsingErrorKind::InvalidNewickString(msg), parser)
    }

    pub fn invalid_annotation<S: ByteSource>(parser: &ByteParser<S>, msg: String) -> Self {
        Self::from_parser(ParsingErrorKind::InvalidAnnotation(msg), parser)
    }

    pub fn unresolved_label<S: ByteSource>(parser: &ByteParser<S>, msg: String) -> Self {
        Self::from_parser(ParsingErrorKind::UnresolvedLabel(msg), parser)
    }

    /// Returns the error kind.
    pub fn kind(&self) -> &ParsingErrorKind {
        &self.kind
    }

    /// Returns the byte offset at which parsing failed.
    pub fn position(&self) -> usize {
        self.position
    }
}

impl fmt::Display for ParsingError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} at position {}", self.kind, self.position)?;

        if !self.context.is_empty() {
            write!(f, "\n  Context (next {} bytes): {}", self.context.len(), self.context)?;
        }

        Ok(())
    }
}

impl std::error::Error for ParsingError {}

impl From<std::io::Error> for ParsingError {
    fn from(err: std::io::Error) -> Self {
        ParsingError::without_context(ParsingErrorKind::Io(err.to_string()))
    }
}
