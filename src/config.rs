//! Configuration of a patch run.
//!
//! A [`Config`] is constructed once by the caller and passed by reference into every core
//! operation. It can be built in code or deserialized from a JSON object whose recognized keys
//! mirror the field names; unrecognized keys are ignored.
//!
//! ```rust
//! use lkpatch::Config;
//!
//! let config = Config::from_json(r#"{ "dry_run": true, "exclude_categories": ["red_state"] }"#)?;
//! assert!(config.dry_run);
//! assert!(config.verify_patch);
//! assert!(!config.should_apply_category("red_state"));
//! # Ok::<(), lkpatch::Error>(())
//! ```

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Options controlling loading, application and verification of patches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Re-read patched bytes after a real run (default: `true`)
    pub verify_patch: bool,

    /// Downgrade missing, invalid and unverifiable rules to warnings (default: `true`)
    pub allow_incomplete: bool,

    /// Compute the full report without modifying the image (default: `false`)
    pub dry_run: bool,

    /// Only apply these categories; empty means all
    pub patch_categories: BTreeSet<String>,

    /// Never apply these categories; checked after `patch_categories`
    pub exclude_categories: BTreeSet<String>,

    /// Scan partitions on the rayon thread pool (default: `true`)
    pub parallel: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            verify_patch: true,
            allow_incomplete: true,
            dry_run: false,
            patch_categories: BTreeSet::new(),
            exclude_categories: BTreeSet::new(),
            parallel: true,
        }
    }
}

impl Config {
    /// Every missing, invalid or mismatching rule is an error.
    #[must_use]
    pub fn strict() -> Self {
        Self {
            allow_incomplete: false,
            ..Self::default()
        }
    }

    /// Parse a configuration from a JSON object.
    ///
    /// # Errors
    /// Returns [`crate::Error::Configuration`] if the text is not valid JSON or a recognized
    /// key has the wrong type.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::Configuration(e.to_string()))
    }

    /// Serialize the configuration to pretty-printed JSON.
    ///
    /// # Errors
    /// Returns [`crate::Error::Configuration`] if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Configuration(e.to_string()))
    }

    /// Returns `true` if rules of `category` pass the allow-list and deny-list.
    #[must_use]
    pub fn should_apply_category(&self, category: &str) -> bool {
        if !self.patch_categories.is_empty() && !self.patch_categories.contains(category) {
            return false;
        }

        !self.exclude_categories.contains(category)
    }
}
