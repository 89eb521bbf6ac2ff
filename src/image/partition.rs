//! In-memory model of a single LK partition.

use std::fmt;

use crate::image::header::PartitionHeader;

/// One named partition of an LK container.
///
/// The data region is a copy of the bytes found between the end of the header and the
/// declared data size. Its length is fixed at parse time: the patch engine overwrites bytes
/// in place but never grows or shrinks the region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionEntry {
    /// Partition name, unique within its image
    pub name: String,
    /// Decoded header
    pub header: PartitionHeader,
    /// Offset of the header within the original buffer
    pub header_offset: usize,
    /// Offset of the data region within the original buffer
    pub offset: usize,
    /// Length of the data region
    pub size: usize,
    data: Vec<u8>,
}

impl PartitionEntry {
    pub(crate) fn new(header: PartitionHeader, header_offset: usize, offset: usize, data: Vec<u8>) -> Self {
        PartitionEntry {
            name: header.name.clone(),
            header,
            header_offset,
            offset,
            size: data.len(),
            data,
        }
    }

    /// The current bytes of the data region.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Mutable access to the data region. Exposed as a slice so the region can't be resized.
    pub(crate) fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Length of the data region in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the partition carries no data.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Offset one past the last data byte within the original buffer.
    #[must_use]
    pub fn end_offset(&self) -> usize {
        self.offset + self.size
    }
}

impl fmt::Display for PartitionEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Name            : {}", self.name)?;
        writeln!(f, "Header offset   : {:#x}", self.header_offset)?;
        writeln!(f, "Data offset     : {:#x}", self.offset)?;
        writeln!(f, "Data size       : {}", self.size)?;
        writeln!(f, "Memory address  : {:#010x}", self.header.memory_address())?;
        writeln!(f, "Address mode    : {:#010x}", self.header.memory_address_mode)?;
        write!(f, "Extended header : {}", self.header.is_extended())?;
        if let Some(ext) = &self.header.extended {
            writeln!(f)?;
            writeln!(f, "Header size     : {:#x}", ext.header_size)?;
            writeln!(f, "Header version  : {}", ext.header_version)?;
            writeln!(f, "Image type      : {:#x}", ext.image_type)?;
            write!(f, "Alignment       : {}", self.header.alignment())?;
        }
        Ok(())
    }
}
