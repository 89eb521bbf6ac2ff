//! Bounds-checked binary access used by the LK container decoder.
//!
//! # Key Components
//!
//! - [`crate::file::parser::Parser`] - Cursor over a byte slice for sequential header decoding
//! - [`crate::file::io`] - Little-endian read/write helpers built on the [`crate::file::io::LkIO`] trait
//!
//! The container itself is supplied by the caller as an in-memory buffer; reading it from disk
//! is the caller's responsibility.

pub mod io;
pub mod parser;
