//! # lkpatch Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and functions
//! from the lkpatch library. Import this module to get quick access to everything needed to
//! load, inspect and patch an LK image.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all lkpatch operations
pub use crate::Error;

/// The result type used throughout lkpatch
pub use crate::Result;

/// Configuration shared by every stage of the pipeline
pub use crate::Config;

// ================================================================================================
// Main Entry Points
// ================================================================================================

/// High-level patcher and the sink used for partition extraction
pub use crate::patcher::{sanitize_name, LkPatcher, PartitionSink};

/// Low-level header parsing
pub use crate::Parser;

// ================================================================================================
// Image Model
// ================================================================================================

/// Decoded container, partitions and lifecycle state
pub use crate::image::{partition::PartitionEntry, Image, ImageState};

/// Partition header layout
pub use crate::image::header::{ExtendedHeader, PartitionHeader};

/// Serialization of a (patched) image
pub use crate::image::writer::{serialize, to_bytes, write_to};

// ================================================================================================
// Patching
// ================================================================================================

/// Rules and rule sets
pub use crate::patch::{PatchCategory, PatchRule, PatchSet};

/// Rule loading and merge modes
pub use crate::patch::{MergeMode, PatchDatabase, PatchSource};

/// Engine, report and verification
pub use crate::patch::{
    apply, verify, Mismatch, Occurrence, PatchEngine, PatchOutcome, PatchReport,
    VerificationResult,
};

// ================================================================================================
// Inspection
// ================================================================================================

/// Read-only analysis
pub use crate::inspect::{
    analyze_image, dump_partition, partition_info, ImageSummary, PartitionInfo,
};
