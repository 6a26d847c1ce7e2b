// Copyright (c) Node Map Runtime Contributors
// SPDX-License-Identifier: Apache-2.0

//! The compressor seam and the CompressedBlob sub-protocol that recurs
//! throughout NIDMAP, NODEINFO, and PPN (SPEC_FULL.md §4.1).

use ndmap_types::error::{Error, Result};
use ndmap_wire::TaggedBuffer;

/// `compress` returns `Some` if the compressed form should be used in place
/// of the original, `None` to opt out (SPEC_FULL.md §6). `decompress` fails
/// with [`Error::DecompressFail`] on corruption or a size mismatch.
pub trait Compressor {
    fn compress(&self, data: &[u8]) -> Option<Vec<u8>>;
    fn decompress(&self, data: &[u8], expected_len: usize) -> Result<Vec<u8>>;
}

/// The one shipped `Compressor`, wrapping the `lz4` crate's block API.
/// Below `min_bytes_to_compress` the heuristic opt-out kicks in without
/// even attempting compression; above it, the compressed form is used only
/// if it is actually smaller than the input.
#[derive(Debug, Clone, Copy)]
pub struct Lz4Compressor {
    pub min_bytes_to_compress: usize,
}

impl Default for Lz4Compressor {
    fn default() -> Self {
        Self { min_bytes_to_compress: 128 }
    }
}

impl Compressor for Lz4Compressor {
    fn compress(&self, data: &[u8]) -> Option<Vec<u8>> {
        if data.len() < self.min_bytes_to_compress {
            return None;
        }
        match lz4::block::compress(data, None, false) {
            Ok(compressed) if compressed.len() < data.len() => Some(compressed),
            Ok(_) => None,
            Err(error) => {
                tracing::debug!(%error, "lz4 compression failed, falling back to raw payload");
                None
            }
        }
    }

    fn decompress(&self, data: &[u8], expected_len: usize) -> Result<Vec<u8>> {
        lz4::block::decompress(data, Some(expected_len as i32)).map_err(|error| {
            Error::DecompressFail { expected: expected_len, reason: error.to_string() }
        })
    }
}

/// Packs the body of a CompressedBlob: the optional uncompressed size
/// followed by the byte-object payload. The discriminator itself (a plain
/// `bool` for Variant A/B, a richer enum for the two NODEINFO sites) is
/// packed by the caller immediately before calling this.
pub fn write_blob_body(buf: &mut TaggedBuffer, uncompressed_len: Option<usize>, payload: &[u8]) {
    if let Some(len) = uncompressed_len {
        buf.pack_size(len as u64);
    }
    buf.pack_bytes(payload);
}

/// Reads the body of a CompressedBlob given the already-unpacked
/// `compressed` discriminator.
pub fn read_blob_body(
    buf: &mut TaggedBuffer,
    compressor: &dyn Compressor,
    field: &'static str,
    compressed: bool,
) -> Result<Vec<u8>> {
    if compressed {
        let expected = buf.unpack_size(field)? as usize;
        let payload = buf.unpack_bytes(field)?;
        compressor.decompress(&payload, expected)
    } else {
        buf.unpack_bytes(field)
    }
}

/// Variant A: `{flag: bool, [uncompressed_size if flag], byte_object}`.
/// Used by NIDMAP node names, PPN apps, and the two NODEINFO topology
/// blobs (SPEC_FULL.md §4.1).
pub fn write_blob_variant_a(buf: &mut TaggedBuffer, compressor: &dyn Compressor, data: &[u8]) {
    match compressor.compress(data) {
        Some(payload) => {
            buf.pack_bool(true);
            write_blob_body(buf, Some(data.len()), &payload);
        }
        None => {
            buf.pack_bool(false);
            write_blob_body(buf, None, data);
        }
    }
}

pub fn read_blob_variant_a(
    buf: &mut TaggedBuffer,
    compressor: &dyn Compressor,
    field: &'static str,
) -> Result<Vec<u8>> {
    let compressed = buf.unpack_bool(field)?;
    read_blob_body(buf, compressor, field, compressed)
}

/// Variant B: `{flag: bool, nbytes_per_vpid: u8, [uncompressed_size if
/// flag], byte_object}` — used only by the NIDMAP vpids block. The element
/// width is packed *between* the flag and the optional size; do not
/// reorder (SPEC_FULL.md §4.1).
pub fn write_blob_variant_b(
    buf: &mut TaggedBuffer,
    compressor: &dyn Compressor,
    nbytes: u8,
    data: &[u8],
) {
    match compressor.compress(data) {
        Some(payload) => {
            buf.pack_bool(true);
            buf.pack_u8(nbytes);
            write_blob_body(buf, Some(data.len()), &payload);
        }
        None => {
            buf.pack_bool(false);
            buf.pack_u8(nbytes);
            write_blob_body(buf, None, data);
        }
    }
}

pub fn read_blob_variant_b(
    buf: &mut TaggedBuffer,
    compressor: &dyn Compressor,
    field: &'static str,
) -> Result<(u8, Vec<u8>)> {
    let compressed = buf.unpack_bool(field)?;
    let nbytes = buf.unpack_u8(field)?;
    let data = read_blob_body(buf, compressor, field, compressed)?;
    Ok((nbytes, data))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NeverCompress;
    impl Compressor for NeverCompress {
        fn compress(&self, _data: &[u8]) -> Option<Vec<u8>> {
            None
        }
        fn decompress(&self, _data: &[u8], _expected_len: usize) -> Result<Vec<u8>> {
            unreachable!("never asked to decompress")
        }
    }

    #[test]
    fn variant_a_round_trips_uncompressed() {
        let data = b"a small payload".to_vec();
        let mut buf = TaggedBuffer::new();
        write_blob_variant_a(&mut buf, &NeverCompress, &data);
        let mut buf = TaggedBuffer::load(buf.unload());
        let out = read_blob_variant_a(&mut buf, &NeverCompress, "f").unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn variant_a_round_trips_compressed() {
        let compressor = Lz4Compressor { min_bytes_to_compress: 0 };
        let data: Vec<u8> = std::iter::repeat(b'x').take(4096).collect();
        let mut buf = TaggedBuffer::new();
        write_blob_variant_a(&mut buf, &compressor, &data);
        let mut buf = TaggedBuffer::load(buf.unload());
        let out = read_blob_variant_a(&mut buf, &compressor, "f").unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn variant_b_carries_element_width_between_flag_and_size() {
        let compressor = Lz4Compressor { min_bytes_to_compress: 0 };
        let data: Vec<u8> = std::iter::repeat(b'y').take(4096).collect();
        let mut buf = TaggedBuffer::new();
        write_blob_variant_b(&mut buf, &compressor, 2, &data);
        let mut buf = TaggedBuffer::load(buf.unload());
        let (nbytes, out) = read_blob_variant_b(&mut buf, &compressor, "f").unwrap();
        assert_eq!(nbytes, 2);
        assert_eq!(out, data);
    }

    #[test]
    fn decompress_failure_surfaces_decompress_fail() {
        let compressor = Lz4Compressor::default();
        let err = compressor.decompress(&[0xFF, 0xFF, 0xFF], 100).unwrap_err();
        assert!(matches!(err, Error::DecompressFail { expected: 100, .. }));
    }

    #[test]
    fn below_threshold_never_compresses() {
        let compressor = Lz4Compressor { min_bytes_to_compress: 1024 };
        assert!(compressor.compress(&[0u8; 100]).is_none());
    }
}
