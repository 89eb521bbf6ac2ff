//! Post-patch verification.
//!
//! After a real run, every recorded occurrence is read back from the image. The bytes must
//! equal the replacement and, for rules that actually change something, must no longer equal
//! the needle.

use crate::{
    config::Config,
    image::{Image, ImageState},
    patch::{
        hex,
        report::{PatchOutcome, PatchReport},
    },
    Error, Result,
};

/// One occurrence whose bytes did not read back as expected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    /// `category:needle` of the rule
    pub rule: String,
    /// Partition the occurrence was recorded in
    pub partition: String,
    /// Offset within the partition data
    pub offset: usize,
    /// What was read back, or `None` if the partition or range does not exist
    pub found: Option<Vec<u8>>,
}

impl std::fmt::Display for Mismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.found {
            Some(bytes) => write!(
                f,
                "{} at {}+{:#x}: found {}",
                self.rule,
                self.partition,
                self.offset,
                hex::encode(bytes)
            ),
            None => write!(
                f,
                "{} at {}+{:#x}: location not present in image",
                self.rule, self.partition, self.offset
            ),
        }
    }
}

/// Result of [`verify`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerificationResult {
    /// Verification was disabled or the report came from a dry run
    pub skipped: bool,
    /// Number of occurrences that were read back
    pub checked: usize,
    /// Occurrences that failed the check
    pub mismatches: Vec<Mismatch>,
    /// Mismatches downgraded to warnings
    pub warnings: Vec<String>,
}

impl VerificationResult {
    /// Returns `true` if every checked occurrence held the replacement bytes.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.mismatches.is_empty()
    }
}

/// Check that every applied occurrence in `report` is present in `image`.
///
/// Skipped (and the state left alone) when `config.verify_patch` is off or the report is from a
/// dry run. Otherwise a patched image advances to [`ImageState::Verified`]; so does a loaded
/// image when the report contains no rules at all.
///
/// # Errors
/// Returns [`crate::Error::Verification`] on any mismatch unless `config.allow_incomplete` is
/// set, in which case the mismatches are logged and returned as warnings.
pub fn verify(image: &mut Image, report: &PatchReport, config: &Config) -> Result<VerificationResult> {
    let mut result = VerificationResult::default();

    if !config.verify_patch || report.dry_run {
        log::debug!("Skipping patch verification");
        result.skipped = true;
        return Ok(result);
    }

    for outcome in report.outcomes.iter().filter(|o| o.applied_count > 0) {
        check_outcome(image, outcome, &mut result);
    }

    log::info!(
        "Verified {} occurrence(s), {} mismatch(es)",
        result.checked,
        result.mismatches.len()
    );

    if !result.mismatches.is_empty() {
        if !config.allow_incomplete {
            return Err(Error::Verification {
                mismatches: result.mismatches.iter().map(ToString::to_string).collect(),
            });
        }

        for mismatch in &result.mismatches {
            let message = format!("Verification failed for {}", mismatch);
            log::warn!("{}", message);
            result.warnings.push(message);
        }
    }

    match image.state() {
        ImageState::Patched => image.set_state(ImageState::Verified),
        ImageState::Loaded if report.outcomes.is_empty() => image.set_state(ImageState::Verified),
        _ => {}
    }

    Ok(result)
}

fn check_outcome(image: &Image, outcome: &PatchOutcome, result: &mut VerificationResult) {
    let width = outcome.replacement.len();

    for occurrence in &outcome.occurrences {
        result.checked += 1;

        let found = image
            .get_partition(&occurrence.partition)
            .ok()
            .and_then(|p| p.data().get(occurrence.offset..occurrence.offset.checked_add(width)?));

        let ok = match found {
            Some(bytes) => {
                bytes == outcome.replacement.as_slice()
                    && (outcome.needle == outcome.replacement || bytes != outcome.needle.as_slice())
            }
            None => false,
        };

        if !ok {
            result.mismatches.push(Mismatch {
                rule: outcome.id(),
                partition: occurrence.partition.clone(),
                offset: occurrence.offset,
                found: found.map(<[u8]>::to_vec),
            });
        }
    }
}
