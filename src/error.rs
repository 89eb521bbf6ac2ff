use thiserror::Error;

macro_rules! format_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Format {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Format {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

macro_rules! truncated_error {
    ($what:expr, $offset:expr, $length:expr, $available:expr) => {
        crate::Error::Truncated {
            what: $what,
            offset: $offset as u64,
            length: $length as u64,
            available: $available,
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// # Error Categories
///
/// ## Image Parsing Errors
/// - [`Error::Format`] - The buffer is not a valid LK container
/// - [`Error::Truncated`] - A declared header or data region runs past the buffer
///
/// ## Lookup Errors
/// - [`Error::NotFound`] - Unknown partition or patch category
///
/// ## Patching Errors
/// - [`Error::InvalidPatch`] - Malformed hex in a patch rule
/// - [`Error::IncompletePatch`] - Strict mode, and some rules were missing or invalid
/// - [`Error::Verification`] - Strict mode, and patched bytes did not read back as expected
///
/// ## External Errors
/// - [`Error::Configuration`] - Invalid configuration or patch source text
/// - [`Error::Io`] - Failure while handing bytes to a caller-provided sink
///
/// # Examples
///
/// ```rust
/// use lkpatch::{Error, Image};
///
/// match Image::parse(&[0x00, 0x01, 0x02, 0x03]) {
///     Ok(_) => unreachable!(),
///     Err(Error::Format { message, .. }) => println!("Not an LK image: {}", message),
///     Err(e) => println!("Other error: {}", e),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The buffer does not follow the LK container layout.
    ///
    /// Raised for a missing partition magic, an invalid header size or alignment,
    /// a non-ASCII partition name, or a repeated partition name. The source location
    /// where the problem was detected is included for debugging purposes.
    #[error("Invalid image format - {file}:{line}: {message}")]
    Format {
        /// The message to be printed for the Format error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// A declared region extends beyond the end of the buffer.
    #[error("Truncated image - {what} at {offset:#x} with length {length:#x} exceeds buffer of {available:#x} bytes")]
    Truncated {
        /// Which structure was being decoded
        what: &'static str,
        /// Start of the declared region
        offset: u64,
        /// Declared length of the region
        length: u64,
        /// Length of the buffer
        available: usize,
    },

    /// A partition or category with the given name does not exist.
    #[error("{kind} '{name}' not found")]
    NotFound {
        /// What was looked up, e.g. `partition` or `category`
        kind: &'static str,
        /// The name that was requested
        name: String,
    },

    /// A patch rule could not be decoded.
    #[error("Invalid patch {needle} -> {replacement}: {reason}")]
    InvalidPatch {
        /// Needle text as supplied
        needle: String,
        /// Replacement text as supplied
        replacement: String,
        /// Why the rule was rejected
        reason: String,
    },

    /// Strict mode only: one or more rules were missing or invalid after a completed run.
    ///
    /// Every valid rule that was found has already been applied when this error is
    /// returned. Each entry has the form `category:needle`.
    #[error("Incomplete patch - {} rule(s) missing or invalid: {}", .rules.len(), .rules.join(", "))]
    IncompletePatch {
        /// The offending rules
        rules: Vec<String>,
    },

    /// Strict mode only: patched bytes did not match the expected replacement.
    #[error("Verification failed - {} mismatch(es): {}", .mismatches.len(), .mismatches.join("; "))]
    Verification {
        /// Human-readable description of each mismatch
        mismatches: Vec<String>,
    },

    /// Configuration or patch source text could not be interpreted.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// I/O error raised by a caller-provided sink.
    #[error("{0}")]
    Io(#[from] std::io::Error),
}
