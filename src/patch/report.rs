//! Per-rule outcomes and the aggregate report of a patch run.

use serde::Serialize;

use crate::{patch::hex, patch::rule::PatchRule, Error, Result};

/// One place where a needle was found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Occurrence {
    /// Partition the needle was found in
    pub partition: String,
    /// Offset relative to the start of the partition's data region
    pub offset: usize,
}

/// What happened to a single rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatchOutcome {
    /// Category of the rule
    pub category: String,
    /// Needle bytes
    #[serde(serialize_with = "hex::serialize")]
    pub needle: Vec<u8>,
    /// Replacement bytes
    #[serde(serialize_with = "hex::serialize")]
    pub replacement: Vec<u8>,
    /// Number of occurrences replaced (or that would be replaced in a dry run)
    pub applied_count: usize,
    /// Every occurrence, partitions in table order, offsets ascending
    pub occurrences: Vec<Occurrence>,
    /// `false` if needle and replacement lengths differ; such rules are never scanned
    pub valid: bool,
}

impl PatchOutcome {
    pub(crate) fn new(rule: &PatchRule, occurrences: Vec<Occurrence>) -> Self {
        PatchOutcome {
            category: rule.category.clone(),
            needle: rule.needle.clone(),
            replacement: rule.replacement.clone(),
            applied_count: occurrences.len(),
            occurrences,
            valid: rule.is_valid(),
        }
    }

    /// A valid rule that matched nowhere.
    #[must_use]
    pub fn is_missing(&self) -> bool {
        self.valid && self.applied_count == 0
    }

    /// `category:needle`, used to identify the rule in messages.
    #[must_use]
    pub fn id(&self) -> String {
        format!("{}:{}", self.category, hex::encode(&self.needle))
    }
}

/// Aggregate result of [`crate::PatchEngine::apply`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PatchReport {
    /// One outcome per rule, in processing order
    pub outcomes: Vec<PatchOutcome>,
    /// Whether the run was a dry run
    pub dry_run: bool,
    /// Whether missing or invalid rules were treated as errors
    pub strict: bool,
    /// Conditions that were downgraded from errors
    pub warnings: Vec<String>,
}

impl PatchReport {
    /// Number of rules processed.
    #[must_use]
    pub fn total_rules(&self) -> usize {
        self.outcomes.len()
    }

    /// Rules that matched at least once.
    pub fn applied(&self) -> impl Iterator<Item = &PatchOutcome> {
        self.outcomes.iter().filter(|o| o.applied_count > 0)
    }

    /// Valid rules that matched nowhere.
    pub fn missing(&self) -> impl Iterator<Item = &PatchOutcome> {
        self.outcomes.iter().filter(|o| o.is_missing())
    }

    /// Rules excluded because of a length mismatch.
    pub fn invalid(&self) -> impl Iterator<Item = &PatchOutcome> {
        self.outcomes.iter().filter(|o| !o.valid)
    }

    /// Total number of replaced occurrences across all rules.
    #[must_use]
    pub fn total_occurrences(&self) -> usize {
        self.outcomes.iter().map(|o| o.applied_count).sum()
    }

    /// Returns `true` if every rule was valid and matched at least once.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.outcomes.iter().all(|o| o.valid && o.applied_count > 0)
    }

    /// Find the outcome of a rule by category and needle.
    #[must_use]
    pub fn outcome(&self, category: &str, needle: &[u8]) -> Option<&PatchOutcome> {
        self.outcomes
            .iter()
            .find(|o| o.category == category && o.needle == needle)
    }

    /// Serialize the report to pretty-printed JSON.
    ///
    /// # Errors
    /// Returns [`crate::Error::Configuration`] if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Configuration(e.to_string()))
    }
}
