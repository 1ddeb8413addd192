//! Byte sources feeding the [ByteParser](crate::parser::byte_parser::ByteParser).
//!
//! Tree samples are re-read several times by the annotator (counting,
//! accumulating, collecting), so the only source kept is an in-memory one
//! that supports seeking back to a saved position.

use std::fs;
use std::path::Path;

// =#========================================================================#=
// BYTE SOURCE (Trait)
// =#========================================================================#=
/// Random-access byte stream used by the parsers.
pub trait ByteSource {
    /// Returns the current byte without consuming it, `None` at EOF.
    fn peek(&self) -> Option<u8>;

    /// Returns the current byte and advances past it, `None` at EOF.
    fn next_byte(&mut self) -> Option<u8>;

    /// Returns the current byte offset.
    fn position(&self) -> usize;

    /// Moves to the given byte offset.
    ///
    /// # Arguments
    /// * `pos` - Offset previously obtained from [position](Self::position)
    fn set_position(&mut self, pos: usize);

    /// Returns up to `k` bytes from the current position without consuming them.
    fn peek_slice(&self, k: usize) -> &[u8];

    /// Returns whether the source is exhausted.
    fn is_eof(&self) -> bool;
}

// =#========================================================================#=
// IN MEMORY BYTE SOURCE
// =#========================================================================#=
/// Byte source owning the complete input.
pub struct InMemoryByteSource {
    input: Vec<u8>,
    pos: usize,
}

impl InMemoryByteSource {
    /// Creates a source over the given bytes, positioned at the start.
    pub fn from_vec(bytes: Vec<u8>) -> Self {
        Self { input: bytes, pos: 0 }
    }

    /// Reads a whole file into memory.
    ///
    /// # Errors
    /// Returns the underlying I/O error if the file cannot be read.
    pub fn from_file<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        Ok(Self::from_vec(fs::read(path)?))
    }

    /// Number of bytes in the source.
    pub fn len(&self) -> usize {
        self.input.len()
    }

    /// Returns whether the source holds no bytes at all.
    pub fn is_empty(&self) -> bool {
        self.input.is_empty()
    }
}

impl ByteSource for InMemoryByteSource {
    #[inline(always)]
    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    #[inline(always)]
    fn next_byte(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.pos += 1;
        Some(byte)
    }

    #[inline]
    fn position(&self) -> usize {
        self.pos
    }

    #[inline]
    fn set_position(&mut self, pos: usize) {
        self.pos = pos.min(self.input.len());
    }

    #[inline(always)]
    fn peek_slice(&self, k: usize) -> &[u8] {
        let end = (self.pos + k).min(self.input.len());
        &self.input[self.pos..end]
    }

    fn is_eof(&self) -> bool {
        self.pos >= self.input.len()
    }
}
