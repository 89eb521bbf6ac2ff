//! LK container model and decoder.
//!
//! An LK image is a chain of partitions, each consisting of a [`header::PartitionHeader`]
//! followed by its data region. The next header starts at the end of the data, rounded up to
//! the alignment of the current partition. The chain ends when a header sets the image list end
//! flag, when the buffer is exhausted, or when the next candidate does not start with
//! [`header::PARTITION_MAGIC`] (trailing signatures and padding are kept untouched).
//!
//! # Key Components
//!
//! - [`crate::Image`] - The parsed container, owning the original buffer and all partitions
//! - [`crate::PartitionEntry`] - One named partition
//! - [`crate::ImageState`] - Lifecycle of an image through the patch pipeline
//! - [`writer`] - Re-serialization into a buffer of the original size
//!
//! # Examples
//!
//! ```rust,no_run
//! use lkpatch::Image;
//!
//! let data = std::fs::read("lk.img")?;
//! let image = Image::from_mem(data)?;
//!
//! for name in image.get_partition_list() {
//!     let partition = image.get_partition(name)?;
//!     println!("{}: {} bytes at {:#x}", name, partition.size, partition.offset);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod header;
pub mod partition;
pub mod writer;

use std::collections::HashSet;

use strum::{Display, EnumString};

use crate::{
    file::io::read_le,
    image::{
        header::{PartitionHeader, PARTITION_MAGIC},
        partition::PartitionEntry,
    },
    Error, Result,
};

/// Lifecycle of an [`Image`] within the patch pipeline.
///
/// `Loaded → (Simulated | Patched) → Verified → Serialized`. A dry run leaves the image in
/// `Simulated`; only a real run reaches `Patched`, and there is no way back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum ImageState {
    /// Freshly decoded
    Loaded,
    /// A dry run has been performed; bytes are unchanged
    Simulated,
    /// Rules have been written into the partitions
    Patched,
    /// Patched bytes have been checked
    Verified,
    /// The image has been written back into a buffer
    Serialized,
}

/// A decoded LK container.
///
/// Owns the original buffer and the ordered list of partitions. Header bytes are immutable;
/// only partition data regions are modified, and only by the patch engine.
#[derive(Debug, Clone)]
pub struct Image {
    data: Vec<u8>,
    partitions: Vec<PartitionEntry>,
    state: ImageState,
}

impl Image {
    /// Parse an LK container from a borrowed buffer.
    ///
    /// # Errors
    /// See [`Image::from_mem`].
    pub fn parse(data: &[u8]) -> Result<Image> {
        Image::from_mem(data.to_vec())
    }

    /// Parse an LK container, taking ownership of the buffer.
    ///
    /// # Errors
    /// - [`crate::Error::Format`] if the buffer does not start with a partition header, a header
    ///   is invalid, or a partition name repeats
    /// - [`crate::Error::Truncated`] if a header or a declared data region runs past the buffer
    pub fn from_mem(data: Vec<u8>) -> Result<Image> {
        if data.len() < 4 || read_le::<u32>(&data)? != PARTITION_MAGIC {
            return Err(format_error!("Buffer does not start with an LK partition header"));
        }

        let mut partitions: Vec<PartitionEntry> = Vec::new();
        let mut names = HashSet::new();
        let mut offset = 0_usize;

        loop {
            let header = PartitionHeader::parse(&data, offset)?;

            let Some(data_offset) = offset.checked_add(header.header_size()) else {
                return Err(truncated_error!("partition data", offset, header.header_size(), data.len()));
            };
            let data_size = header.data_size();
            let data_end = usize::try_from(data_size)
                .ok()
                .and_then(|size| data_offset.checked_add(size));
            let data_end = match data_end {
                Some(end) if end <= data.len() => end,
                _ => return Err(truncated_error!("partition data", data_offset, data_size, data.len())),
            };

            if !names.insert(header.name.clone()) {
                return Err(format_error!(
                    "Duplicate partition name '{}' at offset {:#x}",
                    header.name,
                    offset
                ));
            }

            let is_last = header.is_image_list_end();
            let alignment = header.alignment();

            partitions.push(PartitionEntry::new(
                header,
                offset,
                data_offset,
                data[data_offset..data_end].to_vec(),
            ));

            if is_last {
                break;
            }

            let Some(next) = align_up(data_end, alignment) else {
                break;
            };
            if next.checked_add(4).is_none_or(|end| end > data.len()) {
                break;
            }
            if read_le::<u32>(&data[next..])? != PARTITION_MAGIC {
                break;
            }

            offset = next;
        }

        log::debug!(
            "Parsed LK image of {} bytes with {} partition(s)",
            data.len(),
            partitions.len()
        );

        Ok(Image {
            data,
            partitions,
            state: ImageState::Loaded,
        })
    }

    /// Names of all partitions, in table order.
    #[must_use]
    pub fn get_partition_list(&self) -> Vec<&str> {
        self.partitions.iter().map(|p| p.name.as_str()).collect()
    }

    /// Look up a partition by name.
    ///
    /// # Errors
    /// Returns [`crate::Error::NotFound`] if no partition has this name.
    pub fn get_partition(&self, name: &str) -> Result<&PartitionEntry> {
        self.partitions
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| Error::NotFound {
                kind: "partition",
                name: name.to_string(),
            })
    }

    /// All partitions, in table order.
    #[must_use]
    pub fn partitions(&self) -> &[PartitionEntry] {
        &self.partitions
    }

    pub(crate) fn partitions_mut(&mut self) -> &mut [PartitionEntry] {
        &mut self.partitions
    }

    /// Number of partitions.
    #[must_use]
    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }

    /// The original buffer the image was parsed from, without any patches applied.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Length of the original buffer.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Always `false` for a successfully parsed image; provided for API symmetry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ImageState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: ImageState) {
        if self.state != state {
            log::debug!("Image state {} -> {}", self.state, state);
            self.state = state;
        }
    }
}

fn align_up(value: usize, alignment: usize) -> Option<usize> {
    let mask = alignment - 1;
    value.checked_add(mask).map(|v| v & !mask)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::header::HEADER_SIZE;
    use crate::test::LkImageBuilder;

    #[test]
    fn parse_chain() {
        let data = LkImageBuilder::new()
            .partition("lk", &[0x01; 100])
            .partition("lk_main_dtb", &[0x02; 33])
            .partition("bmp", &[0x03; 16])
            .build();

        let image = Image::parse(&data).unwrap();
        assert_eq!(image.get_partition_list(), vec!["lk", "lk_main_dtb", "bmp"]);
        assert_eq!(image.len(), data.len());
        assert_eq!(image.state(), ImageState::Loaded);

        let lk = image.get_partition("lk").unwrap();
        assert_eq!(lk.header_offset, 0);
        assert_eq!(lk.offset, HEADER_SIZE);
        assert_eq!(lk.size, 100);
        assert!(lk.data().iter().all(|&b| b == 0x01));

        // 512 + 100 rounded up to 16
        let dtb = image.get_partition("lk_main_dtb").unwrap();
        assert_eq!(dtb.header_offset, 624);
        assert_eq!(dtb.offset, 624 + HEADER_SIZE);
        assert_eq!(dtb.size, 33);

        let bmp = image.get_partition("bmp").unwrap();
        assert_eq!(bmp.header_offset, 1184);
    }

    #[test]
    fn parse_extended_chain_stops_at_list_end() {
        let data = LkImageBuilder::new()
            .extended()
            .alignment(8)
            .partition("lk", &[0x01; 13])
            .partition("lk_main_dtb", &[0x02; 7])
            .trailer(&LkImageBuilder::new().partition("ghost", &[0; 4]).build())
            .build();

        let image = Image::parse(&data).unwrap();
        assert_eq!(image.get_partition_list(), vec!["lk", "lk_main_dtb"]);
        assert_eq!(image.get_partition("lk_main_dtb").unwrap().header_offset, 528);
    }

    #[test]
    fn trailing_bytes_end_chain() {
        let data = LkImageBuilder::new()
            .partition("lk", &[0x01; 16])
            .trailer(&[0xCE; 300])
            .build();

        let image = Image::parse(&data).unwrap();
        assert_eq!(image.partition_count(), 1);
        assert_eq!(image.len(), HEADER_SIZE + 16 + 300);
    }

    #[test]
    fn empty_and_bad_magic() {
        assert!(matches!(Image::parse(&[]), Err(Error::Format { .. })));
        assert!(matches!(Image::parse(&[0x88, 0x16]), Err(Error::Format { .. })));
        assert!(matches!(
            Image::parse(&[0u8; 1024]),
            Err(Error::Format { .. })
        ));
    }

    #[test]
    fn truncated_header() {
        let data = LkImageBuilder::new().partition("lk", &[0x01; 16]).build();
        assert!(matches!(
            Image::parse(&data[..100]),
            Err(Error::Truncated { .. })
        ));
    }

    #[test]
    fn truncated_data() {
        let data = LkImageBuilder::new().partition("lk", &[0x01; 64]).build();
        assert!(matches!(
            Image::parse(&data[..HEADER_SIZE + 63]),
            Err(Error::Truncated { .. })
        ));
    }

    #[test]
    fn huge_declared_size() {
        let mut data = LkImageBuilder::new().partition("lk", &[0x01; 8]).build();
        data[4..8].copy_from_slice(&u32::MAX.to_le_bytes());
        assert!(matches!(Image::parse(&data), Err(Error::Truncated { .. })));
    }

    #[test]
    fn declared_header_size_shifts_data() {
        let data = LkImageBuilder::new()
            .extended()
            .header_size(0x80)
            .partition("lk", &[0x5A; 16])
            .build();
        assert_eq!(data.len(), 144);

        let image = Image::parse(&data).unwrap();
        let lk = image.get_partition("lk").unwrap();
        assert_eq!(lk.header_offset, 0);
        assert_eq!(lk.offset, 0x80);
        assert_eq!(lk.size, 16);
        assert_eq!(lk.data(), &[0x5A; 16]);
    }

    #[test]
    fn compact_headers_chain() {
        let data = LkImageBuilder::new()
            .extended()
            .header_size(0x60)
            .alignment(32)
            .partition("lk", &[0x01; 10])
            .partition("logo", &[0x02; 4])
            .build();

        let image = Image::parse(&data).unwrap();
        // 0x60 + 10 rounded up to 32
        let logo = image.get_partition("logo").unwrap();
        assert_eq!(logo.header_offset, 0x80);
        assert_eq!(logo.offset, 0xE0);
        assert_eq!(logo.data(), &[0x02; 4]);
    }

    #[test]
    fn undersized_header_is_format_error() {
        let data = LkImageBuilder::new()
            .extended()
            .header_size(0x20)
            .partition("lk", &[0x01; 16])
            .build();
        assert!(matches!(Image::parse(&data), Err(Error::Format { .. })));
    }

    #[test]
    fn high_data_size_is_truncated() {
        let data = LkImageBuilder::new()
            .extended()
            .data_size_high(1)
            .partition("lk", &[0x01; 16])
            .build();

        match Image::parse(&data) {
            Err(Error::Truncated {
                what,
                offset,
                length,
                ..
            }) => {
                assert_eq!(what, "partition data");
                assert_eq!(offset, HEADER_SIZE as u64);
                assert_eq!(length, 0x1_0000_0010);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn duplicate_names() {
        let data = LkImageBuilder::new()
            .partition("lk", &[0x01; 16])
            .partition("lk", &[0x02; 16])
            .build();
        assert!(matches!(Image::parse(&data), Err(Error::Format { .. })));
    }

    #[test]
    fn unknown_partition() {
        let data = LkImageBuilder::new().partition("lk", &[0x01; 16]).build();
        let image = Image::parse(&data).unwrap();

        match image.get_partition("nonexistent") {
            Err(Error::NotFound { kind, name }) => {
                assert_eq!(kind, "partition");
                assert_eq!(name, "nonexistent");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn align() {
        assert_eq!(align_up(0, 16), Some(0));
        assert_eq!(align_up(1, 16), Some(16));
        assert_eq!(align_up(16, 16), Some(16));
        assert_eq!(align_up(usize::MAX, 16), None);
    }
}
