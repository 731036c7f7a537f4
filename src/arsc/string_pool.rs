use bitflags::bitflags;

use crate::arsc::error::{DecodeError, DecodeResult};
use crate::arsc::{BinReader, ChunkHeader, NO_ENTRY_INDEX};

bitflags! {
    /// Flags carried by a string pool chunk header.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct PoolFlags: u32 {
        const SORTED = 0x0001;
        const UTF8 = 0x0100;
    }
}

/// An interned, indexed block of strings shared by a chunk stream.
///
/// Both binary formats store every piece of text in one of these pools and
/// refer to it by zero-based index; `0xFFFF_FFFF` is the "absent" sentinel.
#[derive(Debug)]
pub struct StringPool {
    flags: PoolFlags,
    strings: Vec<String>,
}

impl StringPool {
    /// Parse a pool from the chunk described by `header`.
    ///
    /// Style spans are skipped over; their contents are not exposed.
    pub fn parse(reader: &BinReader<'_>, header: &ChunkHeader) -> DecodeResult<StringPool> {
        let at = header.start;
        let string_count = reader.u32_le(at + 8) as usize;
        let flags = PoolFlags::from_bits_retain(reader.u32_le(at + 16));
        let strings_start = reader.u32_le(at + 20) as usize;

        let limit = header.end();
        let offsets_at = at + header.header_size as usize;
        if offsets_at + 4 * string_count > limit {
            return Err(DecodeError::Malformed(format!(
                "string pool index table ({string_count} entries) exceeds chunk bounds"
            )));
        }

        let base = at + strings_start;
        let mut strings = Vec::with_capacity(string_count);
        for i in 0..string_count {
            let offset = reader.u32_le(offsets_at + 4 * i) as usize;
            let text = if flags.contains(PoolFlags::UTF8) {
                read_utf8_entry(reader, base + offset, limit)?
            } else {
                read_utf16_entry(reader, base + offset, limit)?
            };
            strings.push(text);
        }

        Ok(StringPool { flags, strings })
    }

    /// Look up a string by pool index. Returns `None` for the sentinel
    /// index and for indices past the end of the pool.
    pub fn get(&self, idx: u32) -> Option<&str> {
        if idx == NO_ENTRY_INDEX {
            return None;
        }
        self.strings.get(idx as usize).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    pub fn is_utf8(&self) -> bool {
        self.flags.contains(PoolFlags::UTF8)
    }

    /// All interned strings in pool order.
    pub fn strings(&self) -> &[String] {
        &self.strings
    }
}

/// UTF-8 entries carry two length prefixes: character count, then byte
/// count. The byte count governs the payload; the trailing NUL is ignored.
fn read_utf8_entry(reader: &BinReader<'_>, at: usize, limit: usize) -> DecodeResult<String> {
    let (_char_count, first_len) = read_utf8_length(reader, at, limit)?;
    let (byte_count, second_len) = read_utf8_length(reader, at + first_len, limit)?;
    let payload = at + first_len + second_len;
    if payload + byte_count > limit {
        return Err(DecodeError::Malformed(format!(
            "UTF-8 string at offset 0x{at:x} exceeds pool bounds"
        )));
    }
    Ok(reader.str_utf8(payload, byte_count))
}

/// UTF-16 entries carry a single code-unit count; the trailing NUL unit is
/// ignored.
fn read_utf16_entry(reader: &BinReader<'_>, at: usize, limit: usize) -> DecodeResult<String> {
    let (unit_count, prefix_len) = read_utf16_length(reader, at, limit)?;
    let payload = at + prefix_len;
    let byte_len = unit_count * 2;
    if payload + byte_len > limit {
        return Err(DecodeError::Malformed(format!(
            "UTF-16 string at offset 0x{at:x} exceeds pool bounds"
        )));
    }
    Ok(reader.str_utf16le(payload, byte_len))
}

fn read_utf8_length(
    reader: &BinReader<'_>,
    at: usize,
    limit: usize,
) -> DecodeResult<(usize, usize)> {
    if at >= limit {
        return Err(DecodeError::Malformed(format!(
            "string length prefix at offset 0x{at:x} outside pool"
        )));
    }
    let first = reader.u8(at);
    if first & 0x80 == 0 {
        Ok((first as usize, 1))
    } else {
        if at + 1 >= limit {
            return Err(DecodeError::Malformed(format!(
                "truncated UTF-8 length prefix at offset 0x{at:x}"
            )));
        }
        let second = reader.u8(at + 1);
        Ok(((((first & 0x7F) as usize) << 8) | second as usize, 2))
    }
}

fn read_utf16_length(
    reader: &BinReader<'_>,
    at: usize,
    limit: usize,
) -> DecodeResult<(usize, usize)> {
    if at + 2 > limit {
        return Err(DecodeError::Malformed(format!(
            "string length prefix at offset 0x{at:x} outside pool"
        )));
    }
    let first = reader.u16_le(at);
    if first & 0x8000 == 0 {
        Ok((first as usize, 2))
    } else {
        if at + 4 > limit {
            return Err(DecodeError::Malformed(format!(
                "truncated UTF-16 length prefix at offset 0x{at:x}"
            )));
        }
        let second = reader.u16_le(at + 2);
        Ok(((((first & 0x7FFF) as usize) << 16) | second as usize, 4))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arsc::RES_STRING_POOL_TYPE;
    use crate::tests::fixtures::StringPoolBuilder;

    fn utf8_pool(strings: &[&str]) -> Vec<u8> {
        let mut data = Vec::new();
        let mut offsets = Vec::new();
        for s in strings {
            offsets.push(data.len() as u32);
            data.push(s.chars().count() as u8);
            data.push(s.len() as u8);
            data.extend_from_slice(s.as_bytes());
            data.push(0);
        }
        while data.len() % 4 != 0 {
            data.push(0);
        }

        let header_size = 28u16;
        let strings_start = u32::from(header_size) + 4 * strings.len() as u32;
        let mut chunk = Vec::new();
        chunk.extend_from_slice(&RES_STRING_POOL_TYPE.to_le_bytes());
        chunk.extend_from_slice(&header_size.to_le_bytes());
        chunk.extend_from_slice(&0u32.to_le_bytes()); // chunk size placeholder
        chunk.extend_from_slice(&(strings.len() as u32).to_le_bytes());
        chunk.extend_from_slice(&0u32.to_le_bytes()); // style count
        chunk.extend_from_slice(&PoolFlags::UTF8.bits().to_le_bytes());
        chunk.extend_from_slice(&strings_start.to_le_bytes());
        chunk.extend_from_slice(&0u32.to_le_bytes()); // styles start
        for offset in offsets {
            chunk.extend_from_slice(&offset.to_le_bytes());
        }
        chunk.extend_from_slice(&data);
        let size = chunk.len() as u32;
        chunk[4..8].copy_from_slice(&size.to_le_bytes());
        chunk
    }

    fn parse(chunk: &[u8]) -> DecodeResult<StringPool> {
        let reader = BinReader::new(chunk);
        let header = ChunkHeader::parse(&reader, 0).expect("pool header");
        StringPool::parse(&reader, &header)
    }

    #[test]
    fn utf8_pool_roundtrip() {
        let chunk = utf8_pool(&["manifest", "versionCode", "übermaß"]);
        let pool = parse(&chunk).expect("parse utf-8 pool");
        assert!(pool.is_utf8());
        assert_eq!(pool.get(0), Some("manifest"));
        assert_eq!(pool.get(1), Some("versionCode"));
        assert_eq!(pool.get(2), Some("übermaß"));
        assert_eq!(pool.get(3), None);
        assert_eq!(pool.get(NO_ENTRY_INDEX), None);
    }

    #[test]
    fn utf16_pool_roundtrip() {
        let mut builder = StringPoolBuilder::new();
        builder.intern("android");
        builder.intern("http://schemas.android.com/apk/res/android");
        let chunk = builder.to_chunk();
        let pool = parse(&chunk).expect("parse utf-16 pool");
        assert!(!pool.is_utf8());
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.get(0), Some("android"));
        assert_eq!(
            pool.get(1),
            Some("http://schemas.android.com/apk/res/android")
        );
    }

    #[test]
    fn string_walking_past_chunk_end_is_an_error() {
        let mut chunk = utf8_pool(&["ok"]);
        // Corrupt the byte-count prefix of the first string so the payload
        // would run past the end of the chunk.
        let data_start = chunk.len() - 8;
        chunk[data_start + 1] = 0x7F;
        assert!(parse(&chunk).is_err());
    }
}
