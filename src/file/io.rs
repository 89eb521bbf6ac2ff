//! Low-level byte order and safe reading/writing utilities for LK header parsing.
//!
//! All LK container fields are little-endian. This module provides the [`crate::file::io::LkIO`]
//! trait, implemented for the unsigned integer widths found in partition headers, together with
//! bounds-checked functions that read those values at a given offset.
//!
//! # Error Handling
//!
//! All functions return [`crate::Result<T>`] and fail with [`crate::Error::Truncated`] if there
//! are insufficient bytes in the buffer to complete the operation.
//!
//! # Thread Safety
//!
//! All functions are pure operations on the provided slices and can be called concurrently.

use crate::Result;

/// Trait for implementing type-specific safe binary data reading operations.
///
/// Each implementation defines a `Bytes` associated type that represents the fixed-size
/// byte array required for that particular type (e.g., `[u8; 4]` for `u32`).
pub trait LkIO: Sized {
    /// Associated type representing the byte array type for this numeric type.
    type Bytes: Sized + AsRef<[u8]> + for<'a> TryFrom<&'a [u8]>;

    /// Read T from a byte buffer in little-endian
    fn from_le_bytes(bytes: Self::Bytes) -> Self;

    /// Write T to a byte buffer in little-endian
    fn to_le_bytes(self) -> Self::Bytes;
}

macro_rules! impl_lk_io {
    ($($ty:ty => $len:expr),* $(,)?) => {
        $(
            impl LkIO for $ty {
                type Bytes = [u8; $len];

                fn from_le_bytes(bytes: Self::Bytes) -> Self {
                    <$ty>::from_le_bytes(bytes)
                }

                fn to_le_bytes(self) -> Self::Bytes {
                    <$ty>::to_le_bytes(self)
                }
            }
        )*
    };
}

impl_lk_io!(u8 => 1, u16 => 2, u32 => 4, u64 => 8);

/// Safely reads a value of type `T` in little-endian byte order from the start of a buffer.
///
/// # Errors
/// Returns [`crate::Error::Truncated`] if there are insufficient bytes.
pub fn read_le<T: LkIO>(data: &[u8]) -> Result<T> {
    let mut offset = 0_usize;
    read_le_at(data, &mut offset)
}

/// Safely reads a value of type `T` in little-endian byte order at a specific offset.
///
/// The offset is advanced by the size of `T` on success and left untouched on failure.
///
/// # Errors
/// Returns [`crate::Error::Truncated`] if there are insufficient bytes.
pub fn read_le_at<T: LkIO>(data: &[u8], offset: &mut usize) -> Result<T> {
    let type_len = std::mem::size_of::<T>();
    let Some(end) = offset.checked_add(type_len) else {
        return Err(truncated_error!("field", *offset, type_len, data.len()));
    };
    if end > data.len() {
        return Err(truncated_error!("field", *offset, type_len, data.len()));
    }

    let Ok(read) = data[*offset..end].try_into() else {
        return Err(truncated_error!("field", *offset, type_len, data.len()));
    };

    *offset = end;

    Ok(T::from_le_bytes(read))
}

/// Safely writes a value of type `T` in little-endian byte order at a specific offset.
///
/// The offset is advanced by the size of `T` on success.
///
/// # Errors
/// Returns [`crate::Error::Truncated`] if the buffer is too small.
#[cfg(test)]
pub fn write_le_at<T: LkIO>(data: &mut [u8], offset: &mut usize, value: T) -> Result<()> {
    let bytes = value.to_le_bytes();
    let bytes = bytes.as_ref();
    let Some(end) = offset.checked_add(bytes.len()) else {
        return Err(truncated_error!("field", *offset, bytes.len(), data.len()));
    };
    if end > data.len() {
        return Err(truncated_error!("field", *offset, bytes.len(), data.len()));
    }

    data[*offset..end].copy_from_slice(bytes);
    *offset = end;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    const TEST_BUFFER: [u8; 8] = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];

    #[test]
    fn read_le_u8() {
        let result = read_le::<u8>(&TEST_BUFFER).unwrap();
        assert_eq!(result, 0x01);
    }

    #[test]
    fn read_le_u16() {
        let result = read_le::<u16>(&TEST_BUFFER).unwrap();
        assert_eq!(result, 0x0201);
    }

    #[test]
    fn read_le_u32() {
        let result = read_le::<u32>(&TEST_BUFFER).unwrap();
        assert_eq!(result, 0x0403_0201);
    }

    #[test]
    fn read_le_u64() {
        let result = read_le::<u64>(&TEST_BUFFER).unwrap();
        assert_eq!(result, 0x0807_0605_0403_0201);
    }

    #[test]
    fn read_le_at_advances() {
        let mut offset = 2;
        let value = read_le_at::<u32>(&TEST_BUFFER, &mut offset).unwrap();
        assert_eq!(value, 0x0605_0403);
        assert_eq!(offset, 6);
    }

    #[test]
    fn read_past_end_is_truncated() {
        let mut offset = 6;
        let result = read_le_at::<u32>(&TEST_BUFFER, &mut offset);
        assert!(matches!(result, Err(Error::Truncated { .. })));
        assert_eq!(offset, 6);

        let mut offset = usize::MAX;
        assert!(read_le_at::<u8>(&TEST_BUFFER, &mut offset).is_err());
    }

    #[test]
    fn write_then_read() {
        let mut buffer = [0u8; 8];
        let mut offset = 0;
        write_le_at(&mut buffer, &mut offset, 0x5888_1688_u32).unwrap();
        write_le_at(&mut buffer, &mut offset, 0x0200_u16).unwrap();
        assert_eq!(offset, 6);
        assert_eq!(buffer[..6], [0x88, 0x16, 0x88, 0x58, 0x00, 0x02]);

        let mut offset = 4;
        assert!(write_le_at(&mut buffer, &mut offset, 0_u64).is_err());
    }
}
