//! Synthetic LK images for integration tests.

#![allow(dead_code)]

pub const HEADER_SIZE: usize = 512;

/// One partition: name, data, load address.
pub type Part<'a> = (&'a str, &'a [u8], u32);

/// Extended header fields: alignment, list end, header size.
type Ext = (u32, bool, u32);

fn header(name: &str, data_len: usize, address: u32, extended: Option<Ext>) -> Vec<u8> {
    let header_len = extended.map_or(HEADER_SIZE, |(_, _, size)| (size as usize).max(0x50));
    let mut header = vec![0xFF_u8; header_len];
    header[0..4].copy_from_slice(&0x5888_1688_u32.to_le_bytes());
    header[4..8].copy_from_slice(&(data_len as u32).to_le_bytes());
    header[8..40].fill(0);
    header[8..8 + name.len()].copy_from_slice(name.as_bytes());
    header[40..44].copy_from_slice(&address.to_le_bytes());
    header[44..48].copy_from_slice(&0xFFFF_FFFF_u32.to_le_bytes());

    if let Some((alignment, last, header_size)) = extended {
        let fields: [u32; 8] = [
            0x5889_1689,
            header_size,
            1,
            0,
            u32::from(last),
            alignment,
            0,
            0,
        ];
        for (index, value) in fields.iter().enumerate() {
            let at = 48 + index * 4;
            header[at..at + 4].copy_from_slice(&value.to_le_bytes());
        }
    }

    header
}

fn assemble(parts: &[Part], extended: Option<(u32, u32)>, trailer: &[u8]) -> Vec<u8> {
    let alignment = match extended {
        Some((a, _)) if a != 0 => a as usize,
        _ => 16,
    };

    let mut out = Vec::new();
    for (index, (name, data, address)) in parts.iter().enumerate() {
        let ext = extended.map(|(a, size)| (a, index + 1 == parts.len(), size));
        out.extend_from_slice(&header(name, data.len(), *address, ext));
        out.extend_from_slice(data);
        while out.len() % alignment != 0 {
            out.push(0);
        }
    }
    out.extend_from_slice(trailer);
    out
}

/// Legacy image, 16-byte alignment.
pub fn legacy_image(parts: &[Part], trailer: &[u8]) -> Vec<u8> {
    assemble(parts, None, trailer)
}

/// Extended image with the given alignment; the last partition ends the list.
pub fn extended_image(parts: &[Part], alignment: u32, trailer: &[u8]) -> Vec<u8> {
    assemble(parts, Some((alignment, HEADER_SIZE as u32)), trailer)
}

/// Extended image whose headers declare `header_size` bytes instead of 512.
pub fn compact_image(parts: &[Part], header_size: u32, trailer: &[u8]) -> Vec<u8> {
    assemble(parts, Some((0, header_size)), trailer)
}

/// A realistic three-partition image containing every default needle once, plus one
/// needle twice.
pub fn vendor_image() -> Vec<u8> {
    let mut lk = vec![0x00_u8; 4096];
    let needles: [(usize, &[u8]); 6] = [
        (0x100, &[0x2D, 0xE9, 0xF0, 0x4F, 0xAD, 0xF5, 0xAC, 0x5D]),
        (0x200, &[0xF0, 0xB5, 0xAD, 0xF5, 0x92, 0x5D]),
        (0x300, &[0x30, 0xB5, 0x83, 0xB0, 0x02, 0xAB, 0x00, 0x22]),
        (0x400, &[0x08, 0xB5, 0x0A, 0x4B, 0x7B, 0x44, 0x1B, 0x68, 0x1B, 0x68, 0x02, 0x2B]),
        (0x500, &[0xF0, 0xB5, 0x00, 0x24, 0x89, 0xB0]),
        (0x600, &[0xF0, 0xB5, 0x00, 0x24, 0x89, 0xB0]),
    ];
    for (offset, needle) in needles {
        lk[offset..offset + needle.len()].copy_from_slice(needle);
    }

    let dtb = vec![0xD0_u8; 300];
    let mut bmp = vec![0x42_u8; 1000];
    bmp[10..18].copy_from_slice(&[0x2D, 0xE9, 0xF0, 0x4F, 0xAD, 0xF5, 0xAC, 0x5D]);

    legacy_image(
        &[
            ("lk", &lk, 0x4C40_0000),
            ("lk_main_dtb", &dtb, 0),
            ("bmp", &bmp, 0),
        ],
        &[0xCE; 256],
    )
}
