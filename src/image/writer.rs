//! Re-serialization of a (possibly patched) image.
//!
//! Partitions are never resized, so serialization is a copy of the original buffer with each
//! partition's current data written back at its unchanged offset. Headers, inter-partition
//! padding and trailing bytes pass through untouched.

use std::io::Write;

use crate::{
    image::{Image, ImageState},
    Result,
};

/// Build the output buffer without touching the image state.
#[must_use]
pub fn to_bytes(image: &Image) -> Vec<u8> {
    let mut output = image.data().to_vec();
    for partition in image.partitions() {
        output[partition.offset..partition.end_offset()].copy_from_slice(partition.data());
    }
    output
}

/// Serialize `image` into a buffer of exactly the original length.
pub fn serialize(image: &mut Image) -> Vec<u8> {
    let output = to_bytes(image);
    image.set_state(ImageState::Serialized);
    output
}

/// Serialize `image` into `writer`.
///
/// # Errors
/// Returns [`crate::Error::Io`] if the writer fails.
pub fn write_to<W: Write>(image: &mut Image, mut writer: W) -> Result<usize> {
    let output = serialize(image);
    writer.write_all(&output)?;
    Ok(output.len())
}
