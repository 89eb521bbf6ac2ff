// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![deny(unsafe_code)]

//! # lkpatch
//!
//! A library for parsing, inspecting and binary-patching MediaTek LK ("Little Kernel")
//! bootloader images.
//!
//! An LK image is a chain of named partitions (`lk`, `lk_main_dtb`, `bmp`, ...), each preceded
//! by a 512-byte header. `lkpatch` decodes that chain, lets you look at every partition, and
//! applies exact byte substitutions ("patches") that neutralize vendor checks such as the
//! fastboot unlock gate or the orange/red state warnings.
//!
//! ## Features
//!
//! - **📦 Strict decoding** - Bounds-checked header parsing with precise truncation errors
//! - **🔧 Patch rules** - Built-in rule set, extensible or replaceable by a JSON patch source
//! - **⚡ Parallel scanning** - Partitions are scanned on rayon with deterministic results
//! - **🔍 Dry runs** - Full reports without modifying a single byte
//! - **🛡️ Verification** - Every written occurrence is read back after patching
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use lkpatch::prelude::*;
//!
//! let input = std::fs::read("lk.img")?;
//! let mut patcher = LkPatcher::new(input, None, Config::default())?;
//!
//! for name in patcher.image().get_partition_list() {
//!     println!("{}", name);
//! }
//!
//! let (patched, report) = patcher.patch(None)?;
//! println!(
//!     "{} of {} rules applied",
//!     report.applied().count(),
//!     report.total_rules()
//! );
//! std::fs::write("lk-patched.img", patched)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ### Lower-level pipeline
//!
//! ```rust,no_run
//! use lkpatch::{image::writer, patch, Config, Image, PatchDatabase};
//!
//! let config = Config { dry_run: true, ..Config::default() };
//! let mut image = Image::from_mem(std::fs::read("lk.img")?)?;
//! let rules = PatchDatabase::from_source(None, &config)?;
//!
//! let report = patch::apply(&mut image, &rules, &config)?;
//! for outcome in report.missing() {
//!     println!("not found: {}", outcome.id());
//! }
//! assert_eq!(writer::to_bytes(&image), image.data());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Logging
//!
//! All diagnostics are emitted through the [`log`](https://docs.rs/log) facade. The crate never
//! installs a logger.

#[macro_use]
pub(crate) mod error;
pub(crate) mod file;

/// Shared functionality which is used in unit-tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types.
///
/// # Example
///
/// ```rust,no_run
/// use lkpatch::prelude::*;
///
/// let image = Image::from_mem(std::fs::read("lk.img")?)?;
/// println!("{}", analyze_image(&image).to_json()?);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub mod prelude;

/// Run configuration shared by every stage of the pipeline.
pub mod config;

/// LK container decoding, partition model and re-serialization.
pub mod image;

/// Read-only listing, digests and partition dumps.
pub mod inspect;

/// Patch rules, rule loading, the patch engine and verification.
pub mod patch;

/// The [`LkPatcher`] facade.
pub mod patcher;

/// `lkpatch` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `lkpatch` Error type
///
/// # Examples
///
/// ```rust
/// use lkpatch::{Error, Image};
///
/// match Image::parse(&[0x00; 16]) {
///     Ok(_) => println!("Loaded successfully"),
///     Err(Error::Format { message, .. }) => println!("Not an LK image: {}", message),
///     Err(e) => println!("Error: {}", e),
/// }
/// ```
pub use error::Error;

/// Run configuration. See [`config::Config`].
pub use config::Config;

/// Decoded LK container and its partitions.
pub use image::{partition::PartitionEntry, Image, ImageState};

/// Patch rules, rule loading, engine and report types.
pub use patch::{
    MergeMode, PatchDatabase, PatchEngine, PatchOutcome, PatchReport, PatchRule, PatchSet,
    PatchSource, VerificationResult,
};

/// One-stop patcher.
pub use patcher::{LkPatcher, PartitionSink};

/// Low-level little-endian access to raw header bytes.
///
/// # Example
///
/// ```rust
/// use lkpatch::Parser;
///
/// let bytes = [0x88, 0x16, 0x88, 0x58];
/// let mut parser = Parser::new(&bytes);
/// assert_eq!(parser.read_le::<u32>()?, 0x5888_1688);
/// # Ok::<(), lkpatch::Error>(())
/// ```
pub use file::{io::LkIO, parser::Parser};
