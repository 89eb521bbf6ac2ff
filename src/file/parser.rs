//! Cursor-based byte parser for LK container headers.
//!
//! This module provides the [`crate::file::parser::Parser`] type, a bounds-checked cursor over
//! a byte slice. Every read validates data availability first, so malformed or truncated input
//! surfaces as [`crate::Error::Truncated`] instead of a panic.
//!
//! # Usage Examples
//!
//! ```rust
//! use lkpatch::Parser;
//!
//! let data = [0x88, 0x16, 0x88, 0x58, 0x00, 0x02, 0x00, 0x00];
//! let mut parser = Parser::new(&data);
//!
//! let magic = parser.read_le::<u32>()?;
//! assert_eq!(magic, 0x5888_1688);
//!
//! assert_eq!(parser.read_bytes(2)?, &[0x00, 0x02]);
//! assert_eq!(parser.pos(), 6);
//! assert!(parser.read_le::<u32>().is_err());
//! # Ok::<(), lkpatch::Error>(())
//! ```

use crate::{
    file::io::{read_le_at, LkIO},
    Result,
};

/// A generic binary data parser for reading LK header structures.
///
/// The parser maintains an internal position cursor and provides bounds checking
/// to prevent buffer overruns when reading malformed or truncated data.
pub struct Parser<'a> {
    /// The binary data being parsed
    data: &'a [u8],
    /// Current position within the data buffer
    position: usize,
}

impl<'a> Parser<'a> {
    /// Create a new [`crate::file::parser::Parser`] from a byte slice.
    ///
    /// # Arguments
    /// * `data` - The byte slice to read from
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Parser { data, position: 0 }
    }

    /// Returns the length of the underlying data buffer.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the parser has no data.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns `true` if there is more data available to parse.
    #[must_use]
    pub fn has_more_data(&self) -> bool {
        self.position < self.data.len()
    }

    /// Move the position forward by the specified number of bytes.
    ///
    /// # Errors
    /// Returns [`crate::Error::Truncated`] if advancing by step would exceed the data length.
    pub fn advance_by(&mut self, step: usize) -> Result<()> {
        match self.position.checked_add(step) {
            Some(end) if end <= self.data.len() => {
                self.position = end;
                Ok(())
            }
            _ => Err(truncated_error!("skip", self.position, step, self.data.len())),
        }
    }

    /// Get the current position of the parser within the data buffer.
    #[must_use]
    pub fn pos(&self) -> usize {
        self.position
    }

    /// Get access to the underlying data buffer.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        self.data
    }

    /// Read a type `T` from the current position in little-endian format and advance the position.
    ///
    /// # Errors
    /// Returns [`crate::Error::Truncated`] if reading would exceed the data length.
    pub fn read_le<T: LkIO>(&mut self) -> Result<T> {
        read_le_at::<T>(self.data, &mut self.position)
    }

    /// Read `len` raw bytes from the current position and advance past them.
    ///
    /// # Errors
    /// Returns [`crate::Error::Truncated`] if fewer than `len` bytes remain.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let start = self.position;
        self.advance_by(len)?;
        Ok(&self.data[start..self.position])
    }
}
