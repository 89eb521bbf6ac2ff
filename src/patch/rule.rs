//! Patch rules and the ordered, category-keyed rule set.

use serde_json::{Map, Value};

use crate::{patch::hex, Error, Result};

/// A single byte-level substitution.
///
/// A rule is only applicable when `needle` and `replacement` have the same length; otherwise
/// it is kept in the set so it can be reported, but the engine never scans for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchRule {
    /// Category the rule belongs to
    pub category: String,
    /// Exact byte pattern to search for
    pub needle: Vec<u8>,
    /// Bytes written over every occurrence of `needle`
    pub replacement: Vec<u8>,
}

impl PatchRule {
    /// Create a rule from raw bytes.
    pub fn new(category: impl Into<String>, needle: Vec<u8>, replacement: Vec<u8>) -> Self {
        PatchRule {
            category: category.into(),
            needle,
            replacement,
        }
    }

    /// Create a rule from hexadecimal needle and replacement text.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidPatch`] if either string is not strict hex. A length
    /// mismatch is not an error here; see [`PatchRule::is_valid`].
    pub fn from_hex(category: impl Into<String>, needle: &str, replacement: &str) -> Result<Self> {
        let invalid = |what: &str, reason: String| Error::InvalidPatch {
            needle: needle.to_string(),
            replacement: replacement.to_string(),
            reason: format!("{} - {}", what, reason),
        };

        let needle_bytes = hex::decode(needle).map_err(|e| invalid("needle", e))?;
        let replacement_bytes = hex::decode(replacement).map_err(|e| invalid("replacement", e))?;

        Ok(PatchRule::new(category, needle_bytes, replacement_bytes))
    }

    /// Returns `true` if the rule can be applied without resizing anything.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.needle.is_empty() && self.needle.len() == self.replacement.len()
    }

    /// Needle as lowercase hex.
    #[must_use]
    pub fn needle_hex(&self) -> String {
        hex::encode(&self.needle)
    }

    /// Replacement as lowercase hex.
    #[must_use]
    pub fn replacement_hex(&self) -> String {
        hex::encode(&self.replacement)
    }

    /// `category:needle`, used to identify the rule in messages.
    #[must_use]
    pub fn id(&self) -> String {
        format!("{}:{}", self.category, self.needle_hex())
    }
}

/// Rules belonging to one category, in insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchCategory {
    name: String,
    rules: Vec<PatchRule>,
}

impl PatchCategory {
    /// Category name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rules in insertion order.
    #[must_use]
    pub fn rules(&self) -> &[PatchRule] {
        &self.rules
    }
}

/// Ordered mapping of category name to ordered rules.
///
/// Iteration order is deterministic: categories in the order they were first inserted, rules
/// in the order they were first inserted within their category. Inserting a rule whose needle
/// already exists in its category replaces that rule in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchSet {
    categories: Vec<PatchCategory>,
}

impl PatchSet {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        PatchSet::default()
    }

    /// Insert a rule, overriding any rule with the same needle in the same category.
    pub fn insert(&mut self, rule: PatchRule) {
        let category = self.ensure_category(&rule.category);
        match category.rules.iter_mut().find(|r| r.needle == rule.needle) {
            Some(existing) => *existing = rule,
            None => category.rules.push(rule),
        }
    }

    /// Make sure a category exists, creating it empty at the end if needed.
    pub(crate) fn ensure_category(&mut self, name: &str) -> &mut PatchCategory {
        let index = match self.categories.iter().position(|c| c.name == name) {
            Some(index) => index,
            None => {
                self.categories.push(PatchCategory {
                    name: name.to_string(),
                    rules: Vec::new(),
                });
                self.categories.len() - 1
            }
        };
        &mut self.categories[index]
    }

    /// Keep only the categories for which `keep` returns `true`.
    pub fn retain_categories<F: FnMut(&str) -> bool>(&mut self, mut keep: F) {
        self.categories.retain(|c| keep(&c.name));
    }

    /// Look up the rules of one category.
    ///
    /// # Errors
    /// Returns [`crate::Error::NotFound`] if the category does not exist.
    pub fn category(&self, name: &str) -> Result<&[PatchRule]> {
        self.categories
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.rules.as_slice())
            .ok_or_else(|| Error::NotFound {
                kind: "category",
                name: name.to_string(),
            })
    }

    /// Returns `true` if the set contains the category.
    #[must_use]
    pub fn contains_category(&self, name: &str) -> bool {
        self.categories.iter().any(|c| c.name == name)
    }

    /// Category names in iteration order.
    #[must_use]
    pub fn category_names(&self) -> Vec<&str> {
        self.categories.iter().map(|c| c.name.as_str()).collect()
    }

    /// Categories in iteration order.
    #[must_use]
    pub fn categories(&self) -> &[PatchCategory] {
        &self.categories
    }

    /// All rules, category by category.
    pub fn iter(&self) -> impl Iterator<Item = &PatchRule> {
        self.categories.iter().flat_map(|c| c.rules.iter())
    }

    /// Total number of rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.categories.iter().map(|c| c.rules.len()).sum()
    }

    /// Returns `true` if the set holds no rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Export the set in the patch source format (without a `mode` key).
    ///
    /// # Errors
    /// Returns [`crate::Error::Configuration`] if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        let mut root = Map::new();
        for category in &self.categories {
            let mut rules = Map::new();
            for rule in &category.rules {
                rules.insert(rule.needle_hex(), Value::String(rule.replacement_hex()));
            }
            root.insert(category.name.clone(), Value::Object(rules));
        }

        serde_json::to_string_pretty(&Value::Object(root))
            .map_err(|e| Error::Configuration(e.to_string()))
    }
}
