//! Decoder for the chunked container format shared by `resources.arsc`
//! and Android binary XML.
//!
//! Every persisted structure in either format begins with the same
//! eight-byte [`ChunkHeader`]; the `chunk_size` field is the authoritative
//! means of advancing a cursor through a stream of chunks.

pub mod error;
pub mod string_pool;
pub mod table;
pub mod value;

use once_cell::sync::Lazy;
use std::collections::BTreeMap;

use error::{DecodeError, DecodeResult};

pub(crate) const RES_STRING_POOL_TYPE: u16 = 0x0001;
pub(crate) const RES_TABLE_TYPE: u16 = 0x0002;
pub(crate) const RES_XML_TYPE: u16 = 0x0003;
pub(crate) const RES_XML_START_NAMESPACE_TYPE: u16 = 0x0100;
pub(crate) const RES_XML_END_NAMESPACE_TYPE: u16 = 0x0101;
pub(crate) const RES_XML_START_ELEMENT_TYPE: u16 = 0x0102;
pub(crate) const RES_XML_END_ELEMENT_TYPE: u16 = 0x0103;
pub(crate) const RES_XML_CDATA_TYPE: u16 = 0x0104;
pub(crate) const RES_XML_RESOURCE_MAP_TYPE: u16 = 0x0180;
pub(crate) const RES_TABLE_PACKAGE_TYPE: u16 = 0x0200;
pub(crate) const RES_TABLE_TYPE_TYPE: u16 = 0x0201;
pub(crate) const RES_TABLE_TYPE_SPEC_TYPE: u16 = 0x0202;

/// Index sentinel meaning "no entry" wherever a u32 index is stored.
pub(crate) const NO_ENTRY_INDEX: u32 = 0xFFFF_FFFF;

static CHUNK_NAMES: Lazy<BTreeMap<u16, &'static str>> = Lazy::new(|| {
    BTreeMap::from([
        (RES_STRING_POOL_TYPE, "RES_STRING_POOL"),
        (RES_TABLE_TYPE, "RES_TABLE"),
        (RES_XML_TYPE, "RES_XML"),
        (RES_XML_START_NAMESPACE_TYPE, "RES_XML_START_NAMESPACE"),
        (RES_XML_END_NAMESPACE_TYPE, "RES_XML_END_NAMESPACE"),
        (RES_XML_START_ELEMENT_TYPE, "RES_XML_START_ELEMENT"),
        (RES_XML_END_ELEMENT_TYPE, "RES_XML_END_ELEMENT"),
        (RES_XML_CDATA_TYPE, "RES_XML_CDATA"),
        (RES_XML_RESOURCE_MAP_TYPE, "RES_XML_RESOURCE_MAP"),
        (RES_TABLE_PACKAGE_TYPE, "RES_TABLE_PACKAGE"),
        (RES_TABLE_TYPE_TYPE, "RES_TABLE_TYPE"),
        (RES_TABLE_TYPE_SPEC_TYPE, "RES_TABLE_TYPE_SPEC"),
    ])
});

pub(crate) fn chunk_name(chunk_type: u16) -> &'static str {
    CHUNK_NAMES.get(&chunk_type).copied().unwrap_or("UNKNOWN")
}

/// Offset-based accessor over a contiguous little-endian byte buffer.
///
/// Out-of-range reads yield zero (strings yield the empty string) rather
/// than failing; structural validity is established by chunk-size bounds,
/// not by the reader.
pub struct BinReader<'a> {
    data: &'a [u8],
}

impl<'a> BinReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        BinReader { data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn u8(&self, offset: usize) -> u8 {
        self.data.get(offset).copied().unwrap_or(0)
    }

    pub fn u16_le(&self, offset: usize) -> u16 {
        u16::from_le_bytes([self.u8(offset), self.u8(offset + 1)])
    }

    pub fn u32_le(&self, offset: usize) -> u32 {
        u32::from_le_bytes([
            self.u8(offset),
            self.u8(offset + 1),
            self.u8(offset + 2),
            self.u8(offset + 3),
        ])
    }

    /// Decode `len` bytes at `offset` as UTF-8, lossily.
    pub fn str_utf8(&self, offset: usize, len: usize) -> String {
        match self.data.get(offset..offset.saturating_add(len)) {
            Some(slice) => String::from_utf8_lossy(slice).into_owned(),
            None => String::new(),
        }
    }

    /// Decode up to `byte_len` bytes at `offset` as UTF-16LE, stopping at
    /// the first NUL code unit.
    pub fn str_utf16le(&self, offset: usize, byte_len: usize) -> String {
        let units: Vec<u16> = (0..byte_len / 2)
            .map(|i| self.u16_le(offset + 2 * i))
            .take_while(|&unit| unit != 0)
            .collect();
        String::from_utf16_lossy(&units)
    }
}

/// The common chunk preamble: `type`, `header_size`, `chunk_size`.
#[derive(Clone, Copy, Debug)]
pub struct ChunkHeader {
    pub chunk_type: u16,
    pub header_size: u16,
    pub chunk_size: u32,
    pub start: usize,
}

impl ChunkHeader {
    /// Read and validate a chunk header at `start`. The chunk must lie
    /// entirely within the buffer.
    pub fn parse(reader: &BinReader<'_>, start: usize) -> DecodeResult<ChunkHeader> {
        if start + 8 > reader.len() {
            return Err(DecodeError::Malformed(format!(
                "truncated chunk header at offset 0x{start:x}"
            )));
        }
        let chunk_type = reader.u16_le(start);
        let header_size = reader.u16_le(start + 2);
        let chunk_size = reader.u32_le(start + 4);
        if header_size < 8 || chunk_size < u32::from(header_size) {
            return Err(DecodeError::Malformed(format!(
                "invalid {} chunk sizing at offset 0x{start:x} (header {header_size}, chunk {chunk_size})",
                chunk_name(chunk_type)
            )));
        }
        start
            .checked_add(chunk_size as usize)
            .filter(|&end| end <= reader.len())
            .ok_or_else(|| {
                DecodeError::Malformed(format!(
                    "{} chunk at offset 0x{start:x} extends past end of buffer",
                    chunk_name(chunk_type)
                ))
            })?;
        Ok(ChunkHeader {
            chunk_type,
            header_size,
            chunk_size,
            start,
        })
    }

    /// First byte past the chunk.
    pub fn end(&self) -> usize {
        self.start + self.chunk_size as usize
    }

    /// First byte of the chunk body (past the header).
    pub fn body(&self) -> usize {
        self.start + self.header_size as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_reads_are_zero() {
        let reader = BinReader::new(&[0x01, 0x02]);
        assert_eq!(reader.u8(0), 0x01);
        assert_eq!(reader.u8(5), 0);
        assert_eq!(reader.u16_le(0), 0x0201);
        assert_eq!(reader.u16_le(1), 0x0002);
        assert_eq!(reader.u32_le(10), 0);
        assert_eq!(reader.str_utf8(7, 4), "");
    }

    #[test]
    fn utf16_stops_at_nul() {
        let mut data = Vec::new();
        for unit in "hi".encode_utf16() {
            data.extend_from_slice(&unit.to_le_bytes());
        }
        data.extend_from_slice(&[0, 0, b'x', 0]);
        let reader = BinReader::new(&data);
        assert_eq!(reader.str_utf16le(0, data.len()), "hi");
    }

    #[test]
    fn chunk_header_rejects_oversized_chunk() {
        let mut data = Vec::new();
        data.extend_from_slice(&RES_TABLE_TYPE.to_le_bytes());
        data.extend_from_slice(&12u16.to_le_bytes());
        data.extend_from_slice(&100u32.to_le_bytes());
        data.extend_from_slice(&1u32.to_le_bytes());
        let reader = BinReader::new(&data);
        assert!(ChunkHeader::parse(&reader, 0).is_err());
    }
}
