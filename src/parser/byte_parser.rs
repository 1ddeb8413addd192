//! Low-level byte-by-byte parser for ASCII text.
//!
//! [ByteParser] offers peeking, consuming and case-insensitive matching on
//! top of a [ByteSource], plus the label and comment handling shared by the
//! Nexus and Newick parsers.

use crate::parser::byte_source::{ByteSource, InMemoryByteSource};
use crate::parser::parsing_error::ParsingError;
use std::path::Path;

// =#========================================================================#=
// BYTE PARSER
// =#========================================================================#=
/// A byte-by-byte parser for ASCII text.
///
/// # Example
/// ```
/// use cladewick::parser::byte_parser::ByteParser;
///
/// let mut parser = ByteParser::for_str("BEGIN TREES;");
/// assert!(parser.consume_if_sequence(b"begin"));
/// parser.skip_whitespace();
/// assert!(parser.peek_is_sequence(b"TREES"));
/// ```
pub struct ByteParser<S: ByteSource> {
    source: S,
}

impl ByteParser<InMemoryByteSource> {
    /// Creates a parser over a copy of the given string.
    pub fn for_str(input: &str) -> Self {
        Self::new(InMemoryByteSource::from_vec(input.as_bytes().to_vec()))
    }

    /// Creates a parser over the complete content of a file.
    ///
    /// # Errors
    /// Returns a [ParsingError] wrapping the I/O error if the file cannot be read.
    pub fn for_file<P: AsRef<Path>>(path: P) -> Result<Self, ParsingError> {
        Ok(Self::new(InMemoryByteSource::from_file(path)?))
    }
}

impl<S: ByteSource> ByteParser<S> {
    /// Creates a new parser from a byte source.
    pub fn new(source: S) -> Self {
        Self { source }
    }

    #[inline(always)]
    pub fn peek(&self) -> Option<u8> {
        self.source.peek()
    }

    #[inline(always)]
    pub fn next_byte(&mut self) -> Option<u8> {
        self.source.next_byte()
    }

    /// Skips spaces, tabs and line breaks.
    pub fn skip_whitespace(&mut self) {
        while let Some(b) = self.peek() {
            if b == b' ' || b == b'\t' || b == b'\n' || b == b'\r' {
                self.next_byte();
            } else {
                break;
            }
        }
    }

    /// Skips a `[...]` comment if one starts here.
    ///
    /// # Returns
    /// * `Ok(true)` - A comment was consumed
    /// * `Ok(false)` - No comment at current position
    ///
    /// # Errors
    /// Returns an error if the comment is never closed.
    pub fn skip_comment(&mut self) -> Result<bool, ParsingError> {
        if self.consume_if(b'[') {
            if !self.consume_until(b']') {
                return Err(ParsingError::unclosed_comment(self));
            }
            self.next_byte();
            return Ok(true);
        }

        Ok(false)
    }

    /// Skips all consecutive whitespace and comments, annotation comments
    /// (`[&...]`) included.
    pub fn skip_comment_and_whitespace(&mut self) -> Result<(), ParsingError> {
        self.skip_whitespace();
        while self.skip_comment()? {
            self.skip_whitespace();
        }
        Ok(())
    }

    /// Skips whitespace and plain comments but stops in front of an
    /// annotation comment `[&...]`.
    pub fn skip_plain_comments_and_whitespace(&mut self) -> Result<(), ParsingError> {
        self.skip_whitespace();
        while self.peek() == Some(b'[') && !self.peek_is_sequence(b"[&") {
            self.skip_comment()?;
            self.skip_whitespace();
        }
        Ok(())
    }

    /// Checks if the current byte matches `ch`, ignoring ASCII case.
    pub fn peek_is(&self, ch: u8) -> bool {
        self.peek().is_some_and(|b| b.eq_ignore_ascii_case(&ch))
    }

    /// Checks if the upcoming bytes match `sequence`, ignoring ASCII case.
    #[inline]
    pub fn peek_is_sequence(&self, sequence: &[u8]) -> bool {
        let context = self.source.peek_slice(sequence.len());
        context.len() == sequence.len() && context.eq_ignore_ascii_case(sequence)
    }

    /// Consumes the current byte if it matches `ch` (case-insensitive).
    pub fn consume_if(&mut self, ch: u8) -> bool {
        if self.peek_is(ch) {
            self.next_byte();
            true
        } else {
            false
        }
    }

    /// Consumes `sequence` if the upcoming bytes match it (case-insensitive).
    pub fn consume_if_sequence(&mut self, sequence: &[u8]) -> bool {
        if !self.peek_is_sequence(sequence) {
            return false;
        }
        for _ in 0..sequence.len() {
            self.next_byte();
        }
        true
    }

    /// Consumes bytes up to, but not including, `target`.
    ///
    /// # Returns
    /// `true` if the target was found, `false` if EOF was reached first
    pub fn consume_until(&mut self, target: u8) -> bool {
        while let Some(b) = self.peek() {
            if b == target {
                return true;
            }
            self.next_byte();
        }
        false
    }

    /// Consumes bytes up to and including the next `;` outside of quotes
    /// and comments.
    ///
    /// # Returns
    /// `true` if a terminating semicolon was consumed
    pub fn consume_statement(&mut self) -> bool {
        while let Some(b) = self.next_byte() {
            match b {
                b';' => return true,
                b'\'' | b'"' => {
                    if !self.consume_until(b) {
                        return false;
                    }
                    self.next_byte();
                }
                b'[' => {
                    if !self.consume_until(b']') {
                        return false;
                    }
                    self.next_byte();
                }
                _ => {}
            }
        }
        false
    }

    pub fn is_eof(&self) -> bool {
        self.source.is_eof()
    }

    pub fn position(&self) -> usize {
        self.source.position()
    }

    pub fn set_position(&mut self, pos: usize) {
        self.source.set_position(pos);
    }

    /// Returns up to `k` upcoming bytes as (lossy) string, for error messages.
    pub fn get_context_as_string(&self, k: usize) -> String {
        String::from_utf8_lossy(self.source.peek_slice(k)).into_owned()
    }

    /// Parses a quoted or unquoted label.
    ///
    /// # Arguments
    /// * `delimiters` - Bytes that end an unquoted label
    pub fn parse_label(&mut self, delimiters: &[u8]) -> Result<String, ParsingError> {
        self.skip_plain_comments_and_whitespace()?;

        match self.peek() {
            Some(quote @ (b'\'' | b'"')) => self.parse_quoted_label(quote),
            _ => Ok(self.parse_unquoted_label(delimiters)),
        }
    }

    /// Parses a label enclosed in `quote` characters; a doubled quote
    /// inside the label stands for one literal quote (`'Baillon''s Crake'`).
    ///
    /// # Errors
    /// Returns an error if the closing quote is missing.
    pub fn parse_quoted_label(&mut self, quote: u8) -> Result<String, ParsingError> {
        self.next_byte();

        let mut bytes = Vec::new();
        loop {
            match self.next_byte() {
                Some(b) if b == quote => {
                    if self.peek() == Some(quote) {
                        bytes.push(quote);
                        self.next_byte();
                    } else {
                        break;
                    }
                }
                Some(b) => bytes.push(b),
                None => return Err(ParsingError::unexpected_eof(self)),
            }
        }

        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Parses an unquoted label up to any of the given delimiters (or EOF).
    pub fn parse_unquoted_label(&mut self, delimiters: &[u8]) -> String {
        let mut bytes = Vec::new();
        while let Some(b) = self.peek() {
            if delimiters.contains(&b) {
                break;
            }
            bytes.push(b);
            self.next_byte();
        }
        String::from_utf8_lossy(&bytes).into_owned()
    }

    /// Consumes the characters of a floating point literal
    /// (digits, sign, decimal point, exponent) and returns them.
    pub fn parse_number_str(&mut self) -> String {
        let mut number = String::new();
        while let Some(b) = self.peek() {
            if b.is_ascii_digit() || matches!(b, b'.' | b'-' | b'+' | b'e' | b'E') {
                number.push(b as char);
                self.next_byte();
            } else {
                break;
            }
        }
        number
    }
}
