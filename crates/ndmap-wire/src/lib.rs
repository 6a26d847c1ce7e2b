// Copyright (c) Node Map Runtime Contributors
// SPDX-License-Identifier: Apache-2.0

//! `TaggedBuffer`: a growable byte buffer with a read cursor, supporting
//! packing/unpacking of the primitive typed values the node-map codecs
//! exchange (SPEC_FULL.md §4.0, §6). All multi-byte integers are
//! little-endian; this is a fixed, documented convention of this crate, not
//! negotiated with the peer.

use byteorder::{ByteOrder, LittleEndian};
use ndmap_types::error::{Error, Result};

/// Wire representation of a byte-object: a `u32` length prefix followed by
/// the raw bytes (SPEC_FULL.md §6).
#[derive(Debug)]
pub struct TaggedBuffer {
    bytes: Vec<u8>,
    cursor: usize,
}

impl Default for TaggedBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl TaggedBuffer {
    pub fn new() -> Self {
        Self { bytes: Vec::new(), cursor: 0 }
    }

    /// Installs external bytes into an empty buffer for reading.
    pub fn load(bytes: Vec<u8>) -> Self {
        Self { bytes, cursor: 0 }
    }

    /// Transfers ownership of the underlying bytes to the caller. Replaces
    /// the source's raw-pointer-pair `unload` with an ordinary move
    /// (SPEC_FULL.md §9).
    pub fn unload(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Resets the buffer to empty so it can be reused for the next write,
    /// rather than allocating a fresh one (PPN encode reuses one scratch
    /// buffer across apps, SPEC_FULL.md §4.4).
    pub fn clear(&mut self) {
        self.bytes.clear();
        self.cursor = 0;
    }

    /// Bytes left to read before the cursor reaches the end of the buffer.
    pub fn remaining(&self) -> usize {
        self.bytes.len().saturating_sub(self.cursor)
    }

    fn take(&mut self, n: usize, field: &'static str) -> Result<&[u8]> {
        if self.cursor + n > self.bytes.len() {
            return Err(Error::ReadPastEndOfBuffer { field });
        }
        let slice = &self.bytes[self.cursor..self.cursor + n];
        self.cursor += n;
        Ok(slice)
    }

    pub fn pack_bool(&mut self, value: bool) {
        self.bytes.push(value as u8);
    }

    pub fn unpack_bool(&mut self, field: &'static str) -> Result<bool> {
        Ok(self.take(1, field)?[0] != 0)
    }

    pub fn pack_u8(&mut self, value: u8) {
        self.bytes.push(value);
    }

    pub fn unpack_u8(&mut self, field: &'static str) -> Result<u8> {
        Ok(self.take(1, field)?[0])
    }

    pub fn pack_i8(&mut self, value: i8) {
        self.bytes.push(value as u8);
    }

    pub fn unpack_i8(&mut self, field: &'static str) -> Result<i8> {
        Ok(self.take(1, field)?[0] as i8)
    }

    pub fn pack_u16(&mut self, value: u16) {
        let mut buf = [0u8; 2];
        LittleEndian::write_u16(&mut buf, value);
        self.bytes.extend_from_slice(&buf);
    }

    pub fn unpack_u16(&mut self, field: &'static str) -> Result<u16> {
        Ok(LittleEndian::read_u16(self.take(2, field)?))
    }

    pub fn pack_i16(&mut self, value: i16) {
        let mut buf = [0u8; 2];
        LittleEndian::write_i16(&mut buf, value);
        self.bytes.extend_from_slice(&buf);
    }

    pub fn unpack_i16(&mut self, field: &'static str) -> Result<i16> {
        Ok(LittleEndian::read_i16(self.take(2, field)?))
    }

    pub fn pack_u32(&mut self, value: u32) {
        let mut buf = [0u8; 4];
        LittleEndian::write_u32(&mut buf, value);
        self.bytes.extend_from_slice(&buf);
    }

    pub fn unpack_u32(&mut self, field: &'static str) -> Result<u32> {
        Ok(LittleEndian::read_u32(self.take(4, field)?))
    }

    pub fn pack_i32(&mut self, value: i32) {
        let mut buf = [0u8; 4];
        LittleEndian::write_i32(&mut buf, value);
        self.bytes.extend_from_slice(&buf);
    }

    pub fn unpack_i32(&mut self, field: &'static str) -> Result<i32> {
        Ok(LittleEndian::read_i32(self.take(4, field)?))
    }

    /// The `SIZE` primitive: an unsigned 64-bit value used for the
    /// CompressedBlob's out-of-band uncompressed length (SPEC_FULL.md §4.1).
    pub fn pack_size(&mut self, value: u64) {
        let mut buf = [0u8; 8];
        LittleEndian::write_u64(&mut buf, value);
        self.bytes.extend_from_slice(&buf);
    }

    pub fn unpack_size(&mut self, field: &'static str) -> Result<u64> {
        Ok(LittleEndian::read_u64(self.take(8, field)?))
    }

    /// NUL-terminated string.
    pub fn pack_string(&mut self, value: &str) {
        self.bytes.extend_from_slice(value.as_bytes());
        self.bytes.push(0);
    }

    pub fn unpack_string(&mut self, field: &'static str) -> Result<String> {
        let start = self.cursor;
        let nul_offset = self.bytes[start..]
            .iter()
            .position(|&b| b == 0)
            .ok_or(Error::ReadPastEndOfBuffer { field })?;
        let raw = &self.bytes[start..start + nul_offset];
        let s = String::from_utf8(raw.to_vec()).map_err(|_| Error::UnpackFail { field })?;
        self.cursor = start + nul_offset + 1;
        Ok(s)
    }

    /// `BYTE_OBJECT`: a `u32` length prefix followed by the raw bytes.
    pub fn pack_bytes(&mut self, value: &[u8]) {
        self.pack_u32(value.len() as u32);
        self.bytes.extend_from_slice(value);
    }

    pub fn unpack_bytes(&mut self, field: &'static str) -> Result<Vec<u8>> {
        let len = self.unpack_u32(field)? as usize;
        Ok(self.take(len, field)?.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn primitives_round_trip() {
        let mut buf = TaggedBuffer::new();
        buf.pack_bool(true);
        buf.pack_u8(0xAB);
        buf.pack_i8(-7);
        buf.pack_u16(0xBEEF);
        buf.pack_i16(-1234);
        buf.pack_u32(0xDEAD_BEEF);
        buf.pack_i32(-123_456);
        buf.pack_size(9_876_543_210);
        buf.pack_string("hello");
        buf.pack_bytes(&[1, 2, 3, 4]);

        let mut buf = TaggedBuffer::load(buf.unload());
        assert!(buf.unpack_bool("b").unwrap());
        assert_eq!(buf.unpack_u8("u8").unwrap(), 0xAB);
        assert_eq!(buf.unpack_i8("i8").unwrap(), -7);
        assert_eq!(buf.unpack_u16("u16").unwrap(), 0xBEEF);
        assert_eq!(buf.unpack_i16("i16").unwrap(), -1234);
        assert_eq!(buf.unpack_u32("u32").unwrap(), 0xDEAD_BEEF);
        assert_eq!(buf.unpack_i32("i32").unwrap(), -123_456);
        assert_eq!(buf.unpack_size("size").unwrap(), 9_876_543_210);
        assert_eq!(buf.unpack_string("s").unwrap(), "hello");
        assert_eq!(buf.unpack_bytes("bo").unwrap(), vec![1, 2, 3, 4]);
        assert_eq!(buf.remaining(), 0);
    }

    #[test]
    fn unpack_past_end_reports_read_past_end() {
        let mut buf = TaggedBuffer::new();
        buf.pack_u8(1);
        let mut buf = TaggedBuffer::load(buf.unload());
        buf.unpack_u8("only").unwrap();
        assert!(matches!(
            buf.unpack_u32("missing"),
            Err(Error::ReadPastEndOfBuffer { field: "missing" })
        ));
    }

    #[test]
    fn unterminated_string_is_read_past_end() {
        let mut buf = TaggedBuffer::load(vec![b'h', b'i']);
        assert!(matches!(
            buf.unpack_string("s"),
            Err(Error::ReadPastEndOfBuffer { field: "s" })
        ));
    }

    proptest! {
        #[test]
        fn bytes_round_trip(data in proptest::collection::vec(any::<u8>(), 0..256)) {
            let mut buf = TaggedBuffer::new();
            buf.pack_bytes(&data);
            let mut buf = TaggedBuffer::load(buf.unload());
            prop_assert_eq!(buf.unpack_bytes("data").unwrap(), data);
        }

        #[test]
        fn string_round_trip(s in "[a-zA-Z0-9,]{0,64}") {
            let mut buf = TaggedBuffer::new();
            buf.pack_string(&s);
            let mut buf = TaggedBuffer::load(buf.unload());
            prop_assert_eq!(buf.unpack_string("s").unwrap(), s);
        }
    }
}
