//! Patch database: built-in defaults, external patch sources and merge semantics.
//!
//! An external patch source is a JSON object. The optional `mode` key selects how it combines
//! with the defaults; every other key is a category mapping needle hex to replacement hex:
//!
//! ```json
//! {
//!     "mode": "update",
//!     "fastboot": { "2de9f04fadf5ac5d": "00207047adf5ac5d" },
//!     "custom": { "aabbccdd": "00000000" }
//! }
//! ```
//!
//! Under [`MergeMode::Update`] the defaults are kept and source rules are added, overriding
//! default rules with the same needle in the same category. Under [`MergeMode::Replace`] only
//! the source rules are used. Category filters from [`crate::Config`] are applied afterwards.

use std::collections::BTreeSet;

use serde_json::Value;
use strum::{Display, EnumString};

use crate::{
    config::Config,
    patch::rule::{PatchRule, PatchSet},
    Error, Result,
};

/// How an external patch source combines with the built-in defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum MergeMode {
    /// Defaults plus source rules; source wins on needle collisions
    #[default]
    Update,
    /// Defaults are discarded
    Replace,
}

/// Built-in rules as `(category, needle, replacement)`.
///
/// Each rule turns the start of a vendor check function into `movs r0, #0; bx lr` (Thumb),
/// so the function returns 0 immediately. Replacements are written at full needle width; the
/// bytes after the first four are the original instruction bytes.
const DEFAULT_RULES: &[(&str, &str, &str)] = &[
    // unlock check in oplusreserve
    ("fastboot", "2de9f04fadf5ac5d", "00207047adf5ac5d"),
    ("fastboot", "f0b5adf5925d", "00207047925d"),
    // vbmeta state check behind the unlock warning
    ("dm_verity", "30b583b002ab0022", "0020704702ab0022"),
    // LCS state check behind the orange state warning
    ("orange_state", "08b50a4b7b441b681b68022b", "002070477b441b681b68022b"),
    ("orange_state", "08b50e4b7b441b681b68022b", "002070477b441b681b68022b"),
    // device verification warning
    ("red_state", "f0b5002489b0", "0020704789b0"),
];

/// A decoded but not yet merged external patch source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchSource {
    /// Merge mode requested by the source, if any
    pub mode: Option<MergeMode>,
    /// Rules in source order
    pub rules: Vec<PatchRule>,
    /// Categories in source order, including empty ones
    pub categories: Vec<String>,
}

impl PatchSource {
    /// Parse a JSON patch source.
    ///
    /// Categories whose value is not an object are skipped with a warning.
    ///
    /// # Errors
    /// - [`crate::Error::Configuration`] if the text is not a JSON object or `mode` is unknown
    /// - [`crate::Error::InvalidPatch`] if a needle or replacement is not strict hex, or a
    ///   replacement is not a string
    pub fn from_json(text: &str) -> Result<Self> {
        let root: Value =
            serde_json::from_str(text).map_err(|e| Error::Configuration(format!("Invalid JSON: {}", e)))?;
        let Value::Object(root) = root else {
            return Err(Error::Configuration(
                "Patch source must contain a JSON object".to_string(),
            ));
        };

        let mut source = PatchSource::default();

        for (key, value) in &root {
            if key == "mode" {
                let Some(mode) = value.as_str() else {
                    return Err(Error::Configuration("'mode' must be a string".to_string()));
                };
                let mode = mode.parse::<MergeMode>().map_err(|_| {
                    Error::Configuration(format!(
                        "Unknown mode '{}', expected 'update' or 'replace'",
                        mode
                    ))
                })?;
                source.mode = Some(mode);
                continue;
            }

            let Value::Object(entries) = value else {
                log::warn!(
                    "Skipping invalid category '{}': patches must be an object",
                    key
                );
                continue;
            };

            source.categories.push(key.clone());
            for (needle, replacement) in entries {
                let Some(replacement) = replacement.as_str() else {
                    return Err(Error::InvalidPatch {
                        needle: needle.clone(),
                        replacement: replacement.to_string(),
                        reason: format!("replacement in category '{}' is not a string", key),
                    });
                };
                source
                    .rules
                    .push(PatchRule::from_hex(key.as_str(), needle, replacement)?);
            }
        }

        Ok(source)
    }
}

/// Builds the [`PatchSet`] handed to the engine.
pub struct PatchDatabase;

impl PatchDatabase {
    /// The built-in default rules.
    #[must_use]
    pub fn defaults() -> PatchSet {
        let mut set = PatchSet::new();
        for (category, needle, replacement) in DEFAULT_RULES {
            set.insert(PatchRule {
                category: (*category).to_string(),
                needle: decode_builtin(needle),
                replacement: decode_builtin(replacement),
            });
        }
        set
    }

    /// Merge `defaults` with an optional external source and apply category filters.
    ///
    /// Category order is the defaults' order followed by new source categories in source
    /// order. An empty `allow_list` allows every category; `deny_list` is applied after it.
    #[must_use]
    pub fn load(
        defaults: PatchSet,
        external: Option<&PatchSource>,
        mode: MergeMode,
        allow_list: &BTreeSet<String>,
        deny_list: &BTreeSet<String>,
    ) -> PatchSet {
        let mut set = match mode {
            MergeMode::Update => defaults,
            MergeMode::Replace => PatchSet::new(),
        };

        if let Some(source) = external {
            for category in &source.categories {
                set.ensure_category(category);
            }
            for rule in &source.rules {
                set.insert(rule.clone());
            }
        }

        for name in allow_list {
            if !set.contains_category(name) {
                log::warn!("Requested category '{}' does not exist", name);
            }
        }

        if !allow_list.is_empty() {
            set.retain_categories(|name| allow_list.contains(name));
        }
        set.retain_categories(|name| !deny_list.contains(name));

        let invalid = set.iter().filter(|rule| !rule.is_valid()).count();
        if invalid > 0 {
            log::warn!(
                "{} rule(s) have mismatched needle and replacement lengths and will not be applied",
                invalid
            );
        }

        log::info!(
            "Loaded {} patches in {} categories",
            set.len(),
            set.categories().len()
        );

        set
    }

    /// Build the rule set for `config` from the defaults and an optional JSON source.
    ///
    /// The merge mode is taken from the source's `mode` key and defaults to
    /// [`MergeMode::Update`].
    ///
    /// # Errors
    /// Propagates errors from [`PatchSource::from_json`].
    pub fn from_source(source: Option<&str>, config: &Config) -> Result<PatchSet> {
        let source = source.map(PatchSource::from_json).transpose()?;
        let mode = source.as_ref().and_then(|s| s.mode).unwrap_or_default();

        Ok(PatchDatabase::load(
            PatchDatabase::defaults(),
            source.as_ref(),
            mode,
            &config.patch_categories,
            &config.exclude_categories,
        ))
    }
}

fn decode_builtin(text: &str) -> Vec<u8> {
    // Built-in tables are checked by `builtin_rules_are_valid`.
    crate::patch::hex::decode(text).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set_of(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn builtin_rules_are_valid() {
        let defaults = PatchDatabase::defaults();
        assert_eq!(
            defaults.category_names(),
            vec!["fastboot", "dm_verity", "orange_state", "red_state"]
        );
        assert_eq!(defaults.len(), DEFAULT_RULES.len());
        assert!(defaults.iter().all(PatchRule::is_valid));
    }

    #[test]
    fn mode_parsing() {
        assert_eq!("update".parse::<MergeMode>().unwrap(), MergeMode::Update);
        assert_eq!("REPLACE".parse::<MergeMode>().unwrap(), MergeMode::Replace);
        assert!("merge".parse::<MergeMode>().is_err());
        assert_eq!(MergeMode::Replace.to_string(), "replace");
    }

    #[test]
    fn replace_mode_discards_defaults() {
        let set = PatchDatabase::from_source(
            Some(r#"{ "mode": "replace", "fastboot": { "aabbccdd": "00207047" } }"#),
            &Config::default(),
        )
        .unwrap();

        assert_eq!(set.category_names(), vec!["fastboot"]);
        let rules = set.category("fastboot").unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].needle_hex(), "aabbccdd");
        assert_eq!(rules[0].replacement_hex(), "00207047");
        assert!(set.category("dm_verity").is_err());
    }

    #[test]
    fn update_mode_overrides_and_appends() {
        let set = PatchDatabase::from_source(
            Some(
                r#"{
                    "custom": { "aabb": "ccdd" },
                    "fastboot": { "F0B5ADF5925D": "000000000000", "1122": "3344" }
                }"#,
            ),
            &Config::default(),
        )
        .unwrap();

        assert_eq!(
            set.category_names(),
            vec!["fastboot", "dm_verity", "orange_state", "red_state", "custom"]
        );

        let fastboot = set.category("fastboot").unwrap();
        assert_eq!(fastboot.len(), 3);
        assert_eq!(fastboot[1].needle_hex(), "f0b5adf5925d");
        assert_eq!(fastboot[1].replacement_hex(), "000000000000");
        assert_eq!(fastboot[2].needle_hex(), "1122");
    }

    #[test]
    fn default_mode_is_update() {
        let set = PatchDatabase::from_source(Some(r#"{ "x": {} }"#), &Config::default()).unwrap();
        assert!(set.contains_category("fastboot"));
        assert!(set.contains_category("x"));
        assert!(set.category("x").unwrap().is_empty());
    }

    #[test]
    fn filters_apply_after_merge() {
        let source = PatchSource::from_json(r#"{ "custom": { "aabb": "ccdd" } }"#).unwrap();

        let set = PatchDatabase::load(
            PatchDatabase::defaults(),
            Some(&source),
            MergeMode::Update,
            &set_of(&["fastboot", "custom", "red_state"]),
            &set_of(&["red_state"]),
        );

        assert_eq!(set.category_names(), vec!["fastboot", "custom"]);
    }

    #[test]
    fn deny_list_without_allow_list() {
        let set = PatchDatabase::load(
            PatchDatabase::defaults(),
            None,
            MergeMode::Update,
            &BTreeSet::new(),
            &set_of(&["dm_verity", "orange_state"]),
        );

        assert_eq!(set.category_names(), vec!["fastboot", "red_state"]);
    }

    #[test]
    fn mismatched_lengths_are_kept_for_reporting() {
        let source =
            PatchSource::from_json(r#"{ "fastboot": { "2de9f04fadf5ac5d": "00207047" } }"#).unwrap();
        assert_eq!(source.rules.len(), 1);
        assert!(!source.rules[0].is_valid());
    }

    #[test]
    fn source_errors() {
        assert!(matches!(
            PatchSource::from_json("not json"),
            Err(Error::Configuration(_))
        ));
        assert!(matches!(
            PatchSource::from_json(r#"["fastboot"]"#),
            Err(Error::Configuration(_))
        ));
        assert!(matches!(
            PatchSource::from_json(r#"{ "mode": "merge" }"#),
            Err(Error::Configuration(_))
        ));
        assert!(matches!(
            PatchSource::from_json(r#"{ "x": { "abc": "00" } }"#),
            Err(Error::InvalidPatch { .. })
        ));
        assert!(matches!(
            PatchSource::from_json(r#"{ "x": { "ab": "zz" } }"#),
            Err(Error::InvalidPatch { .. })
        ));
        assert!(matches!(
            PatchSource::from_json(r#"{ "x": { "ab": 12 } }"#),
            Err(Error::InvalidPatch { .. })
        ));
    }

    #[test]
    fn non_object_category_is_skipped() {
        let source = PatchSource::from_json(r#"{ "x": "oops", "y": { "aa": "bb" } }"#).unwrap();
        assert_eq!(source.categories, vec!["y".to_string()]);
        assert_eq!(source.rules.len(), 1);
    }
}
