//! Patch rules, the patch database, and the engine that applies them.
//!
//! The pipeline is:
//!
//! 1. [`loader::PatchDatabase`] builds a [`rule::PatchSet`] from the built-in defaults, an
//!    optional JSON patch source and the category filters of a [`crate::Config`]
//! 2. [`engine::PatchEngine`] scans every partition of an [`crate::Image`] and writes the
//!    replacements, producing a [`report::PatchReport`]
//! 3. [`verify::verify`] reads every recorded occurrence back
//!
//! # Examples
//!
//! ```rust,no_run
//! use lkpatch::{patch, Config, Image, PatchDatabase};
//!
//! let config = Config::strict();
//! let mut image = Image::from_mem(std::fs::read("lk.img")?)?;
//! let rules = PatchDatabase::from_source(Some(r#"{ "fastboot": { "aabb": "ccdd" } }"#), &config)?;
//!
//! let report = patch::apply(&mut image, &rules, &config)?;
//! patch::verify(&mut image, &report, &config)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod engine;
pub mod hex;
pub mod loader;
pub mod report;
pub mod rule;
pub mod verify;

pub use engine::{apply, PatchEngine};
pub use loader::{MergeMode, PatchDatabase, PatchSource};
pub use report::{Occurrence, PatchOutcome, PatchReport};
pub use rule::{PatchCategory, PatchRule, PatchSet};
pub use verify::{verify, Mismatch, VerificationResult};
