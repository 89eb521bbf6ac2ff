//! Read-only inspection of LK images.
//!
//! Nothing in this module changes an [`Image`] or its state. All summary types serialize to
//! JSON with `serde`, so callers can hand them straight to a reporting layer.

use md5::Md5;
use serde::Serialize;
use sha1::{Digest, Sha1};

use crate::{
    image::{partition::PartitionEntry, Image},
    patch::hex,
    Result,
};

/// Number of leading data bytes included in [`PartitionInfo::preview`].
pub const PREVIEW_LENGTH: usize = 64;

/// Details of one partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartitionInfo {
    /// Partition name
    pub name: String,
    /// Offset of the header within the image
    pub header_offset: usize,
    /// Offset of the data region within the image
    pub offset: usize,
    /// Size of the data region
    pub size: usize,
    /// Load address
    pub memory_address: u64,
    /// Address mode field
    pub address_mode: u32,
    /// Whether the header carries the extended fields
    pub extended: bool,
    /// Vendor image type, for extended headers
    pub image_type: Option<u32>,
    /// MD5 of the current data, lowercase hex
    pub md5: String,
    /// SHA-1 of the current data, lowercase hex
    pub sha1: String,
    /// First [`PREVIEW_LENGTH`] data bytes, lowercase hex
    pub preview: String,
}

impl From<&PartitionEntry> for PartitionInfo {
    fn from(partition: &PartitionEntry) -> Self {
        let data = partition.data();

        let mut md5 = Md5::new();
        md5.update(data);
        let mut sha1 = Sha1::new();
        sha1.update(data);

        PartitionInfo {
            name: partition.name.clone(),
            header_offset: partition.header_offset,
            offset: partition.offset,
            size: partition.size,
            memory_address: partition.header.memory_address(),
            address_mode: partition.header.memory_address_mode,
            extended: partition.header.is_extended(),
            image_type: partition.header.extended.map(|ext| ext.image_type),
            md5: hex::encode(&md5.finalize()),
            sha1: hex::encode(&sha1.finalize()),
            preview: hex::encode(&data[..data.len().min(PREVIEW_LENGTH)]),
        }
    }
}

/// Overview of a whole image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageSummary {
    /// Length of the image buffer
    pub image_size: usize,
    /// Number of partitions
    pub partition_count: usize,
    /// Sum of all partition data sizes
    pub data_size: usize,
    /// Bytes from the start of the image to the end of the last partition's data
    pub covered_size: usize,
    /// Per-partition details, in table order
    pub partitions: Vec<PartitionInfo>,
}

impl ImageSummary {
    /// Serialize the summary to pretty-printed JSON.
    ///
    /// # Errors
    /// Returns [`crate::Error::Configuration`] if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| crate::Error::Configuration(e.to_string()))
    }
}

/// Summarize `image`.
#[must_use]
pub fn analyze_image(image: &Image) -> ImageSummary {
    let partitions: Vec<PartitionInfo> = image.partitions().iter().map(PartitionInfo::from).collect();

    ImageSummary {
        image_size: image.len(),
        partition_count: partitions.len(),
        data_size: partitions.iter().map(|p| p.size).sum(),
        covered_size: image
            .partitions()
            .last()
            .map_or(0, PartitionEntry::end_offset),
        partitions,
    }
}

/// Details of the partition called `name`.
///
/// # Errors
/// Returns [`crate::Error::NotFound`] if there is no such partition.
pub fn partition_info(image: &Image, name: &str) -> Result<PartitionInfo> {
    image.get_partition(name).map(PartitionInfo::from)
}

/// Current data bytes of the partition called `name`.
///
/// # Errors
/// Returns [`crate::Error::NotFound`] if there is no such partition.
pub fn dump_partition<'a>(image: &'a Image, name: &str) -> Result<&'a [u8]> {
    image.get_partition(name).map(PartitionEntry::data)
}
