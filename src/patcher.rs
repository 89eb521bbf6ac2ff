//! High-level patcher combining image, rule set and configuration.
//!
//! [`LkPatcher`] is the entry point most callers want: it parses the image, builds the rule
//! set from the defaults and an optional JSON patch source, and runs the whole
//! apply, verify and serialize pipeline in one call.
//!
//! The patcher never touches the filesystem. Output goes to any [`std::io::Write`], and
//! extracted partitions go to a [`PartitionSink`].
//!
//! # Examples
//!
//! ```rust,no_run
//! use lkpatch::{Config, LkPatcher};
//!
//! let input = std::fs::read("lk.img")?;
//! let mut patcher = LkPatcher::new(input, None, Config::default())?;
//!
//! let mut output = std::fs::File::create("lk-patched.img")?;
//! let (_, report) = patcher.patch(Some(&mut output))?;
//! println!("{}", report.to_json()?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::io::Write;

use crate::{
    config::Config,
    image::{writer, Image},
    inspect::{self, ImageSummary, PartitionInfo},
    patch::{verify, PatchDatabase, PatchEngine, PatchReport, PatchSet},
    Result,
};

/// Receives partitions from [`LkPatcher::extract_all_partitions`].
pub trait PartitionSink {
    /// Store one partition.
    ///
    /// `file_name` is `name` with every non-alphanumeric character replaced by `_`.
    ///
    /// # Errors
    /// Implementations return an error if the partition could not be stored; extraction stops.
    fn write_partition(&mut self, file_name: &str, name: &str, data: &[u8]) -> Result<()>;
}

impl<F> PartitionSink for F
where
    F: FnMut(&str, &str, &[u8]) -> Result<()>,
{
    fn write_partition(&mut self, file_name: &str, name: &str, data: &[u8]) -> Result<()> {
        self(file_name, name, data)
    }
}

/// Replace every character that is not ASCII alphanumeric with `_`.
#[must_use]
pub fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// An LK image together with the rules to apply and the configuration to apply them with.
pub struct LkPatcher {
    image: Image,
    patch_set: PatchSet,
    config: Config,
}

impl LkPatcher {
    /// Parse `image` and build the rule set from the defaults and `patch_source`.
    ///
    /// # Errors
    /// Returns parse errors from [`Image::from_mem`] and patch source errors from
    /// [`PatchDatabase::from_source`].
    pub fn new(image: Vec<u8>, patch_source: Option<&str>, config: Config) -> Result<LkPatcher> {
        let patch_set = PatchDatabase::from_source(patch_source, &config)?;
        let image = Image::from_mem(image)?;

        log::info!(
            "Loaded image of {} bytes with {} partitions",
            image.len(),
            image.partition_count()
        );

        Ok(LkPatcher {
            image,
            patch_set,
            config,
        })
    }

    /// Build a patcher from an already parsed image and a prepared rule set.
    #[must_use]
    pub fn with_patch_set(image: Image, patch_set: PatchSet, config: Config) -> LkPatcher {
        LkPatcher {
            image,
            patch_set,
            config,
        }
    }

    /// Apply, verify and serialize.
    ///
    /// Returns the output buffer and the report. Verification warnings are appended to the
    /// report's warnings. If `output` is given and this is not a dry run, the buffer is also
    /// written to it. A dry run returns the unchanged image bytes.
    ///
    /// # Errors
    /// - [`crate::Error::IncompletePatch`] or [`crate::Error::Verification`] in strict mode
    /// - [`crate::Error::Io`] if writing to `output` fails
    pub fn patch(&mut self, output: Option<&mut dyn Write>) -> Result<(Vec<u8>, PatchReport)> {
        if self.patch_set.is_empty() {
            log::warn!("No applicable patches based on current configuration");
        }

        let mut report = PatchEngine::new(&self.config).apply(&mut self.image, &self.patch_set)?;

        let verification = verify(&mut self.image, &report, &self.config)?;
        report.warnings.extend(verification.warnings);

        if report.dry_run {
            return Ok((writer::to_bytes(&self.image), report));
        }

        let bytes = writer::serialize(&mut self.image);
        if let Some(output) = output {
            output.write_all(&bytes)?;
            log::info!("Wrote {} bytes of patched image", bytes.len());
        }

        Ok((bytes, report))
    }

    /// Hand every partition to `sink`, in table order.
    ///
    /// Returns the sanitized names that were written.
    ///
    /// # Errors
    /// Returns the first error reported by `sink`.
    pub fn extract_all_partitions(&self, sink: &mut dyn PartitionSink) -> Result<Vec<String>> {
        let mut written = Vec::with_capacity(self.image.partition_count());

        for partition in self.image.partitions() {
            let file_name = sanitize_name(&partition.name);
            sink.write_partition(&file_name, &partition.name, partition.data())?;
            log::info!("Extracted partition {} as {}", partition.name, file_name);
            written.push(file_name);
        }

        Ok(written)
    }

    /// Current bytes of one partition.
    ///
    /// # Errors
    /// Returns [`crate::Error::NotFound`] if there is no such partition.
    pub fn dump_partition(&self, name: &str) -> Result<&[u8]> {
        inspect::dump_partition(&self.image, name).inspect_err(|_| {
            log::error!("Partition not found: {}", name);
            log::info!("Available partitions: {:?}", self.image.get_partition_list());
        })
    }

    /// Details of one partition.
    ///
    /// # Errors
    /// Returns [`crate::Error::NotFound`] if there is no such partition.
    pub fn partition_info(&self, name: &str) -> Result<PartitionInfo> {
        inspect::partition_info(&self.image, name)
    }

    /// Summary of the whole image.
    #[must_use]
    pub fn analyze_image(&self) -> ImageSummary {
        inspect::analyze_image(&self.image)
    }

    /// Export the active rule set in the patch source format.
    ///
    /// # Errors
    /// Returns [`crate::Error::Configuration`] if serialization fails.
    pub fn export_patches(&self) -> Result<String> {
        self.patch_set.to_json()
    }

    /// The image being patched.
    #[must_use]
    pub fn image(&self) -> &Image {
        &self.image
    }

    /// The active rule set.
    #[must_use]
    pub fn patch_set(&self) -> &PatchSet {
        &self.patch_set
    }

    /// The configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{image::ImageState, test::LkImageBuilder, Error};

    const NEEDLE: [u8; 8] = [0x2D, 0xE9, 0xF0, 0x4F, 0xAD, 0xF5, 0xAC, 0x5D];

    fn image_with_needle() -> Vec<u8> {
        let mut lk = vec![0x00; 64];
        lk[16..24].copy_from_slice(&NEEDLE);
        LkImageBuilder::new()
            .partition("lk", &lk)
            .partition("lk_main_dtb", &[0x11; 8])
            .build()
    }

    fn fastboot_only() -> Config {
        let mut config = Config::default();
        config.patch_categories.insert("fastboot".to_string());
        config
    }

    #[test]
    fn sanitize() {
        assert_eq!(sanitize_name("lk_main-dtb.v2"), "lk_main_dtb_v2");
        assert_eq!(sanitize_name("bmp"), "bmp");
    }

    #[test]
    fn patch_writes_output() {
        let data = image_with_needle();
        let mut patcher = LkPatcher::new(data.clone(), None, fastboot_only()).unwrap();

        let mut sink = Vec::new();
        let (bytes, report) = patcher.patch(Some(&mut sink)).unwrap();

        assert_eq!(bytes, sink);
        assert_eq!(bytes.len(), data.len());
        assert_eq!(report.total_occurrences(), 1);
        assert_eq!(patcher.image().state(), ImageState::Serialized);

        let offset = patcher.image().get_partition("lk").unwrap().offset;
        assert_eq!(&bytes[offset + 16..offset + 20], &[0x00, 0x20, 0x70, 0x47]);
        // the second fastboot rule is missing and reported as a warning
        assert_eq!(report.missing().count(), 1);
        assert!(!report.warnings.is_empty());
    }

    #[test]
    fn dry_run_writes_nothing() {
        let data = image_with_needle();
        let config = Config {
            dry_run: true,
            ..fastboot_only()
        };
        let mut patcher = LkPatcher::new(data.clone(), None, config).unwrap();

        let mut sink = Vec::new();
        let (bytes, report) = patcher.patch(Some(&mut sink)).unwrap();

        assert!(sink.is_empty());
        assert_eq!(bytes, data);
        assert_eq!(report.total_occurrences(), 1);
        assert_eq!(patcher.image().state(), ImageState::Simulated);
    }

    #[test]
    fn strict_patch_fails() {
        let config = Config {
            allow_incomplete: false,
            ..fastboot_only()
        };
        let mut patcher = LkPatcher::new(image_with_needle(), None, config).unwrap();

        assert!(matches!(
            patcher.patch(None),
            Err(Error::IncompletePatch { .. })
        ));
    }

    #[test]
    fn repeated_patch_keeps_serialized_state() {
        let mut patcher = LkPatcher::new(image_with_needle(), None, fastboot_only()).unwrap();

        let (first, _) = patcher.patch(None).unwrap();
        assert_eq!(patcher.image().state(), ImageState::Serialized);

        let (second, report) = patcher.patch(None).unwrap();
        assert_eq!(report.total_occurrences(), 0);
        assert_eq!(second, first);
        assert_eq!(patcher.image().state(), ImageState::Serialized);
    }

    #[test]
    fn extract_partitions() {
        let data = LkImageBuilder::new()
            .partition("lk", &[1, 2])
            .partition("lk-main.dtb", &[3])
            .build();
        let patcher = LkPatcher::new(data, None, Config::default()).unwrap();

        let mut extracted = Vec::new();
        let mut sink = |file_name: &str, name: &str, data: &[u8]| -> Result<()> {
            extracted.push((file_name.to_string(), name.to_string(), data.to_vec()));
            Ok(())
        };
        let names = patcher.extract_all_partitions(&mut sink).unwrap();

        assert_eq!(names, vec!["lk", "lk_main_dtb"]);
        assert_eq!(
            extracted[1],
            ("lk_main_dtb".to_string(), "lk-main.dtb".to_string(), vec![3])
        );
    }

    #[test]
    fn extract_stops_on_sink_error() {
        let data = LkImageBuilder::new()
            .partition("lk", &[1])
            .partition("logo", &[2])
            .build();
        let patcher = LkPatcher::new(data, None, Config::default()).unwrap();

        let mut seen = Vec::new();
        let mut sink = |file_name: &str, _name: &str, _data: &[u8]| -> Result<()> {
            seen.push(file_name.to_string());
            Err(Error::Io(std::io::Error::other("disk full")))
        };

        assert!(matches!(
            patcher.extract_all_partitions(&mut sink),
            Err(Error::Io(_))
        ));
        assert_eq!(seen, vec!["lk"]);
    }

    #[test]
    fn accessors() {
        let patcher = LkPatcher::new(image_with_needle(), None, fastboot_only()).unwrap();

        assert_eq!(patcher.patch_set().category_names(), vec!["fastboot"]);
        assert_eq!(patcher.analyze_image().partition_count, 2);
        assert_eq!(patcher.partition_info("lk_main_dtb").unwrap().size, 8);
        assert_eq!(patcher.dump_partition("lk_main_dtb").unwrap(), &[0x11; 8]);
        assert!(patcher.dump_partition("boot").is_err());
        assert!(patcher.export_patches().unwrap().contains("2de9f04fadf5ac5d"));
        assert!(patcher.config().allow_incomplete);
    }
}
