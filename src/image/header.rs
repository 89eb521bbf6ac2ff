//! MediaTek LK partition header.
//!
//! Every partition in an LK container starts with a little-endian header:
//!
//! | Offset | Size | Field                                      |
//! |-------:|-----:|--------------------------------------------|
//! | 0x00   | 4    | magic `0x58881688`                         |
//! | 0x04   | 4    | data size (low 32 bits)                    |
//! | 0x08   | 32   | name, NUL padded                           |
//! | 0x28   | 4    | memory address                             |
//! | 0x2C   | 4    | memory address mode                        |
//! | 0x30   | 4    | extended magic `0x58891689`                |
//! | 0x34   | 4    | header size                                |
//! | 0x38   | 4    | header version                             |
//! | 0x3C   | 4    | image type                                 |
//! | 0x40   | 4    | image list end flag                        |
//! | 0x44   | 4    | alignment                                  |
//! | 0x48   | 4    | data size (high 32 bits)                   |
//! | 0x4C   | 4    | memory address (high 32 bits)              |
//!
//! Fields from 0x34 onwards are only meaningful when the extended magic is present. Legacy
//! headers are always [`HEADER_SIZE`] bytes long and align the next partition to
//! [`DEFAULT_ALIGNMENT`]. Extended headers declare their own size, at least
//! [`EXTENDED_FIELDS_END`] bytes, and the data follows right after it.

use crate::{file::parser::Parser, Result};

/// Magic value at the start of every partition header
pub const PARTITION_MAGIC: u32 = 0x5888_1688;

/// Magic value marking a header with extended fields
pub const EXTENDED_MAGIC: u32 = 0x5889_1689;

/// On-disk size of a legacy partition header
pub const HEADER_SIZE: usize = 512;

/// Width of the NUL padded name field
pub const NAME_LENGTH: usize = 32;

/// Alignment used when the header does not declare one
pub const DEFAULT_ALIGNMENT: usize = 16;

/// Number of bytes occupied by the fixed header fields of an extended header
pub const EXTENDED_FIELDS_END: usize = 0x50;

/// Value of the address mode field when the memory address is meaningless
pub const ADDRESS_MODE_NONE: u32 = 0xFFFF_FFFF;

/// Decoded fields of the extended part of a partition header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtendedHeader {
    /// Declared size of the header; data starts right after it
    pub header_size: u32,
    /// Header format version
    pub header_version: u32,
    /// Vendor image type
    pub image_type: u32,
    /// Non-zero if this is the last partition in the container
    pub image_list_end: u32,
    /// Alignment of the following partition; zero selects [`DEFAULT_ALIGNMENT`]
    pub alignment: u32,
    /// Upper 32 bits of the data size
    pub data_size_high: u32,
    /// Upper 32 bits of the memory address
    pub memory_address_high: u32,
}

/// A decoded LK partition header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionHeader {
    /// Lower 32 bits of the data size
    pub data_size: u32,
    /// Partition name, without trailing NUL padding
    pub name: String,
    /// Lower 32 bits of the load address
    pub memory_address: u32,
    /// Address mode; [`ADDRESS_MODE_NONE`] if unused
    pub memory_address_mode: u32,
    /// Extended fields, if the extended magic is present
    pub extended: Option<ExtendedHeader>,
}

impl PartitionHeader {
    /// Decode a partition header starting at `offset` within `data`.
    ///
    /// The caller has already checked the magic at `offset`; a header that does not fit
    /// in the remaining buffer is a truncation, not a format error. The fixed fields are read
    /// first, then the whole header must fit: [`HEADER_SIZE`] bytes for a legacy header, the
    /// declared size for an extended one.
    ///
    /// # Errors
    /// - [`crate::Error::Truncated`] if the fixed fields or the full header run past the buffer
    /// - [`crate::Error::Format`] for a bad magic, a non-ASCII name, an undersized extended
    ///   header or an alignment that is not a power of two
    pub fn parse(data: &[u8], offset: usize) -> Result<PartitionHeader> {
        let fields_end = match offset.checked_add(EXTENDED_FIELDS_END) {
            Some(end) if end <= data.len() => end,
            _ => {
                return Err(truncated_error!("partition header", offset, EXTENDED_FIELDS_END, data.len()));
            }
        };

        let mut parser = Parser::new(&data[offset..fields_end]);

        let magic = parser.read_le::<u32>()?;
        if magic != PARTITION_MAGIC {
            return Err(format_error!(
                "Invalid partition magic {:#010x} at offset {:#x}",
                magic,
                offset
            ));
        }

        let data_size = parser.read_le::<u32>()?;
        let name = decode_name(parser.read_bytes(NAME_LENGTH)?, offset)?;
        let memory_address = parser.read_le::<u32>()?;
        let memory_address_mode = parser.read_le::<u32>()?;

        let extended = if parser.read_le::<u32>()? == EXTENDED_MAGIC {
            let ext = ExtendedHeader {
                header_size: parser.read_le::<u32>()?,
                header_version: parser.read_le::<u32>()?,
                image_type: parser.read_le::<u32>()?,
                image_list_end: parser.read_le::<u32>()?,
                alignment: parser.read_le::<u32>()?,
                data_size_high: parser.read_le::<u32>()?,
                memory_address_high: parser.read_le::<u32>()?,
            };

            if (ext.header_size as usize) < EXTENDED_FIELDS_END {
                return Err(format_error!(
                    "Partition '{}' declares a header size of {:#x}, smaller than its fields",
                    name,
                    ext.header_size
                ));
            }
            if ext.alignment != 0 && !ext.alignment.is_power_of_two() {
                return Err(format_error!(
                    "Partition '{}' declares alignment {} which is not a power of two",
                    name,
                    ext.alignment
                ));
            }

            Some(ext)
        } else {
            None
        };

        let header = PartitionHeader {
            data_size,
            name,
            memory_address,
            memory_address_mode,
            extended,
        };

        let header_size = header.header_size();
        if offset.checked_add(header_size).is_none_or(|end| end > data.len()) {
            return Err(truncated_error!("partition header", offset, header_size, data.len()));
        }

        Ok(header)
    }

    /// Returns `true` if the header carries the extended fields.
    #[must_use]
    pub fn is_extended(&self) -> bool {
        self.extended.is_some()
    }

    /// Number of bytes between the start of the header and the start of the data.
    #[must_use]
    pub fn header_size(&self) -> usize {
        match &self.extended {
            Some(ext) => ext.header_size as usize,
            None => HEADER_SIZE,
        }
    }

    /// Full data size, combining the high half for extended headers.
    #[must_use]
    pub fn data_size(&self) -> u64 {
        let high = self.extended.map_or(0, |ext| ext.data_size_high);
        (u64::from(high) << 32) | u64::from(self.data_size)
    }

    /// Full load address, combining the high half for extended headers.
    #[must_use]
    pub fn memory_address(&self) -> u64 {
        let high = self.extended.map_or(0, |ext| ext.memory_address_high);
        (u64::from(high) << 32) | u64::from(self.memory_address)
    }

    /// Alignment of the partition that follows this one.
    #[must_use]
    pub fn alignment(&self) -> usize {
        match &self.extended {
            Some(ext) if ext.alignment != 0 => ext.alignment as usize,
            _ => DEFAULT_ALIGNMENT,
        }
    }

    /// Returns `true` if this header marks the end of the partition chain.
    #[must_use]
    pub fn is_image_list_end(&self) -> bool {
        self.extended.is_some_and(|ext| ext.image_list_end != 0)
    }
}

fn decode_name(raw: &[u8], offset: usize) -> Result<String> {
    let len = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    let name = &raw[..len];

    if !name.is_ascii() {
        return Err(format_error!(
            "Partition name at offset {:#x} is not ASCII",
            offset
        ));
    }

    Ok(String::from_utf8_lossy(name).into_owned())
}
