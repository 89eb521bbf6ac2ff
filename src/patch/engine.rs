//! Patch engine: exact-match search and in-place replacement over partition bytes.
//!
//! # Ordering
//!
//! Rules are processed category by category in [`crate::PatchSet`] order, and in insertion
//! order within a category. Every rule gets a fresh scan over the *current* bytes of each
//! partition, so a later rule observes what earlier rules wrote. Within one rule, matches are
//! non-overlapping and found left to right; scanning resumes right after each replaced region,
//! so freshly written bytes are never matched again by the same rule.
//!
//! # Parallelism
//!
//! Partitions share no bytes. With [`crate::Config::parallel`] each partition is handed to one
//! rayon worker that runs the complete rule list over it; hits are merged back in table order.
//! The result is identical to the sequential path.
//!
//! # Dry runs
//!
//! A dry run performs the same work on scratch copies of the partition data. The report lists
//! exactly what a real run would have done, and the image stays byte-identical.

use rayon::prelude::*;
use sha1::{Digest, Sha1};

use crate::{
    config::Config,
    image::{partition::PartitionEntry, Image, ImageState},
    patch::{
        report::{Occurrence, PatchOutcome, PatchReport},
        rule::{PatchRule, PatchSet},
    },
    Error, Result,
};

/// Applies a [`PatchSet`] to an [`Image`].
///
/// # Examples
///
/// ```rust,no_run
/// use lkpatch::{Config, Image, PatchDatabase, PatchEngine};
///
/// let mut image = Image::from_mem(std::fs::read("lk.img")?)?;
/// let config = Config::default();
/// let rules = PatchDatabase::from_source(None, &config)?;
///
/// let report = PatchEngine::new(&config).apply(&mut image, &rules)?;
/// for outcome in report.applied() {
///     println!("{} applied {} time(s)", outcome.id(), outcome.applied_count);
/// }
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct PatchEngine<'a> {
    config: &'a Config,
}

impl<'a> PatchEngine<'a> {
    /// Create an engine bound to `config`.
    #[must_use]
    pub fn new(config: &'a Config) -> Self {
        PatchEngine { config }
    }

    /// Apply every rule of `patch_set` to `image`.
    ///
    /// # Errors
    /// Returns [`crate::Error::IncompletePatch`] if this is a real run, `allow_incomplete` is
    /// off, and at least one rule was missing or invalid. All valid, found rules have already
    /// been written into the image at that point; nothing is rolled back.
    ///
    /// A real run moves a [`ImageState::Loaded`] or [`ImageState::Simulated`] image to
    /// [`ImageState::Patched`]; an image that is already further along keeps its state.
    pub fn apply(&self, image: &mut Image, patch_set: &PatchSet) -> Result<PatchReport> {
        let dry_run = self.config.dry_run;
        let rules: Vec<&PatchRule> = patch_set.iter().collect();

        log::info!(
            "Starting {}patching with {} rule(s) in {} categories",
            if dry_run { "dry-run " } else { "" },
            rules.len(),
            patch_set.categories().len()
        );

        let digest_before = (!dry_run).then(|| image_digest(image));

        let hits = if self.config.parallel {
            image
                .partitions_mut()
                .par_iter_mut()
                .map(|partition| scan_partition(partition, &rules, dry_run))
                .collect::<Vec<_>>()
        } else {
            image
                .partitions_mut()
                .iter_mut()
                .map(|partition| scan_partition(partition, &rules, dry_run))
                .collect::<Vec<_>>()
        };

        let names = image.get_partition_list();
        let mut report = PatchReport {
            outcomes: Vec::with_capacity(rules.len()),
            dry_run,
            strict: !self.config.allow_incomplete,
            warnings: Vec::new(),
        };

        for (index, rule) in rules.iter().enumerate() {
            let occurrences = names
                .iter()
                .zip(&hits)
                .flat_map(|(name, per_rule)| {
                    per_rule[index].iter().map(|&offset| Occurrence {
                        partition: (*name).to_string(),
                        offset,
                    })
                })
                .collect::<Vec<_>>();

            let outcome = PatchOutcome::new(rule, occurrences);
            if !outcome.valid {
                log::warn!(
                    "Rule {} is invalid: needle is {} bytes, replacement is {} bytes",
                    outcome.id(),
                    rule.needle.len(),
                    rule.replacement.len()
                );
            } else if outcome.applied_count == 0 {
                log::debug!("Needle not found: {}", outcome.id());
            } else {
                log::debug!(
                    "{} {} -> {} at {} location(s)",
                    if dry_run { "Would apply" } else { "Applied" },
                    outcome.id(),
                    short_hex(&rule.replacement),
                    outcome.applied_count
                );
            }
            report.outcomes.push(outcome);
        }

        log::info!(
            "Patching summary: {}/{} rules applied, {} missing, {} invalid",
            report.applied().count(),
            report.total_rules(),
            report.missing().count(),
            report.invalid().count()
        );

        if dry_run {
            if image.state() == ImageState::Loaded {
                image.set_state(ImageState::Simulated);
            }
        } else {
            if matches!(image.state(), ImageState::Loaded | ImageState::Simulated) {
                image.set_state(ImageState::Patched);
            }

            let digest_after = image_digest(image);
            log::debug!(
                "Partition data SHA-1 {} -> {}",
                digest_before.as_deref().unwrap_or("-"),
                digest_after
            );
            if digest_before.as_deref() == Some(digest_after.as_str())
                && report.applied().any(|o| o.needle != o.replacement)
            {
                let message = "Image digest unchanged despite applying patches".to_string();
                log::warn!("{}", message);
                report.warnings.push(message);
            }
        }

        let incomplete: Vec<String> = report
            .outcomes
            .iter()
            .filter(|o| !o.valid || o.applied_count == 0)
            .map(PatchOutcome::id)
            .collect();

        if !incomplete.is_empty() {
            if !dry_run && !self.config.allow_incomplete {
                return Err(Error::IncompletePatch { rules: incomplete });
            }

            for id in incomplete {
                let message = format!("Rule {} was not applied", id);
                log::warn!("{}", message);
                report.warnings.push(message);
            }
        }

        Ok(report)
    }
}

/// Apply `patch_set` to `image` under `config`. See [`PatchEngine::apply`].
///
/// # Errors
/// See [`PatchEngine::apply`].
pub fn apply(image: &mut Image, patch_set: &PatchSet, config: &Config) -> Result<PatchReport> {
    PatchEngine::new(config).apply(image, patch_set)
}

/// Run every rule over one partition. Returns the hit offsets per rule, indexed like `rules`.
fn scan_partition(partition: &mut PartitionEntry, rules: &[&PatchRule], dry_run: bool) -> Vec<Vec<usize>> {
    let mut scratch;
    let bytes: &mut [u8] = if dry_run {
        scratch = partition.data().to_vec();
        &mut scratch
    } else {
        partition.data_mut()
    };

    rules
        .iter()
        .map(|rule| {
            if rule.is_valid() {
                replace_all(bytes, &rule.needle, &rule.replacement)
            } else {
                Vec::new()
            }
        })
        .collect()
}

/// Replace every non-overlapping occurrence of `needle`, left to right.
///
/// `needle` and `replacement` must have the same non-zero length.
fn replace_all(haystack: &mut [u8], needle: &[u8], replacement: &[u8]) -> Vec<usize> {
    debug_assert_eq!(needle.len(), replacement.len());

    let mut hits = Vec::new();
    let mut position = 0;

    while let Some(found) = find(&haystack[position..], needle) {
        let start = position + found;
        let end = start + needle.len();
        haystack[start..end].copy_from_slice(replacement);
        hits.push(start);
        position = end;
    }

    hits
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }

    let first = needle[0];
    let last_start = haystack.len() - needle.len();
    let mut start = 0;

    while start <= last_start {
        let candidate = haystack[start..=last_start].iter().position(|&b| b == first)? + start;
        if &haystack[candidate..candidate + needle.len()] == needle {
            return Some(candidate);
        }
        start = candidate + 1;
    }

    None
}

fn image_digest(image: &Image) -> String {
    let mut hasher = Sha1::new();
    for partition in image.partitions() {
        hasher.update(partition.data());
    }
    crate::patch::hex::encode(&hasher.finalize())
}

fn short_hex(bytes: &[u8]) -> String {
    let hex = crate::patch::hex::encode(bytes);
    if hex.len() > 10 {
        format!("{}...", &hex[..10])
    } else {
        hex
    }
}
