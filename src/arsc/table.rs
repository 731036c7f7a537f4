use bitflags::bitflags;
use log::debug;
use std::collections::BTreeMap;

use crate::arsc::error::{DecodeError, DecodeResult};
use crate::arsc::string_pool::StringPool;
use crate::arsc::value::TypedValue;
use crate::arsc::{
    chunk_name, BinReader, ChunkHeader, NO_ENTRY_INDEX, RES_STRING_POOL_TYPE,
    RES_TABLE_PACKAGE_TYPE, RES_TABLE_TYPE, RES_TABLE_TYPE_SPEC_TYPE, RES_TABLE_TYPE_TYPE,
};

bitflags! {
    /// Flags carried by a resource table entry.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct EntryFlags: u16 {
        /// The entry is a complex (aggregate) resource; its map payload is
        /// not decoded here.
        const COMPLEX = 0x0001;
        /// The entry has been declared public.
        const PUBLIC = 0x0002;
    }
}

/// Multi-axis device configuration qualifier identifying which variant of
/// a resource applies. Two keys are equal iff all eight axes are equal;
/// the all-zero key is the default configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConfigKey {
    pub imsi: u32,
    pub locale: u32,
    pub screen_type: u32,
    pub input: u32,
    pub screen_size: u32,
    pub version: u32,
    pub screen_config: u32,
    pub screen_size_dp: u32,
}

impl ConfigKey {
    pub fn is_default(&self) -> bool {
        *self == ConfigKey::default()
    }

    /// Read a configuration key at `at`. The on-disk structure leads with
    /// its own byte length; axes beyond that length read as zero and
    /// trailing bytes beyond the eight known axes are skipped verbatim.
    fn parse(reader: &BinReader<'_>, at: usize) -> (ConfigKey, usize) {
        let size = reader.u32_le(at) as usize;
        let axis = |index: usize| {
            if 4 + (index + 1) * 4 <= size {
                reader.u32_le(at + 4 + index * 4)
            } else {
                0
            }
        };
        let key = ConfigKey {
            imsi: axis(0),
            locale: axis(1),
            screen_type: axis(2),
            input: axis(3),
            screen_size: axis(4),
            version: axis(5),
            screen_config: axis(6),
            screen_size_dp: axis(7),
        };
        (key, size)
    }
}

/// A single decoded resource value under one configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct Entry {
    pub flags: EntryFlags,
    pub key: String,
    pub value: TypedValue,
}

impl Entry {
    pub fn is_complex(&self) -> bool {
        self.flags.contains(EntryFlags::COMPLEX)
    }

    pub fn is_public(&self) -> bool {
        self.flags.contains(EntryFlags::PUBLIC)
    }
}

/// Entry storage for one resource type: the first configuration seen plus
/// a per-slot variant map that later configurations merge into.
#[derive(Debug)]
pub struct TypeChunk {
    pub config: ConfigKey,
    pub entries: Vec<BTreeMap<ConfigKey, Entry>>,
}

/// A type-spec chunk and the type chunks accumulated under it.
#[derive(Debug)]
pub struct TypeSpec {
    /// 1-based index into the package's type-name pool.
    pub type_id: u8,
    pub entry_count: u32,
    pub flags: Vec<u32>,
    pub chunk: Option<TypeChunk>,
}

/// One package inside the resource table, typically id `0x7F` for
/// application resources.
#[derive(Debug)]
pub struct Package {
    pub id: u8,
    pub name: String,
    pub type_strings: StringPool,
    pub key_strings: StringPool,
    pub specs: Vec<TypeSpec>,
}

impl Package {
    fn spec(&self, type_id: u8) -> Option<&TypeSpec> {
        self.specs.iter().find(|spec| spec.type_id == type_id)
    }
}

/// A 32-bit resource id split into its `PPTTIIII` parts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResourceId {
    pub package: u8,
    /// 1-based type index within the package.
    pub type_index: u8,
    /// Zero-based entry index within the type.
    pub entry: u16,
}

impl From<u32> for ResourceId {
    fn from(id: u32) -> Self {
        ResourceId {
            package: (id >> 24) as u8,
            type_index: (id >> 16) as u8,
            entry: id as u16,
        }
    }
}

/// The decoded `resources.arsc` table: the global string pool and every
/// package's type specs with their per-configuration entries. Immutable
/// once constructed.
pub struct ResourceTable {
    global_strings: StringPool,
    packages: BTreeMap<u8, Package>,
}

impl ResourceTable {
    /// Parse a complete `resources.arsc` buffer.
    pub fn parse(data: &[u8]) -> DecodeResult<ResourceTable> {
        let reader = BinReader::new(data);
        let header = ChunkHeader::parse(&reader, 0)?;
        if header.chunk_type != RES_TABLE_TYPE {
            return Err(DecodeError::UnexpectedChunk {
                expected: RES_TABLE_TYPE,
                found: header.chunk_type,
            });
        }
        let package_count = reader.u32_le(8) as usize;

        let pool_header = ChunkHeader::parse(&reader, header.body())?;
        if pool_header.chunk_type != RES_STRING_POOL_TYPE {
            return Err(DecodeError::UnexpectedChunk {
                expected: RES_STRING_POOL_TYPE,
                found: pool_header.chunk_type,
            });
        }
        let global_strings = StringPool::parse(&reader, &pool_header)?;

        let mut packages = BTreeMap::new();
        let mut cursor = pool_header.end();
        for _ in 0..package_count {
            if cursor >= header.end() {
                break;
            }
            let package_header = ChunkHeader::parse(&reader, cursor)?;
            if package_header.chunk_type != RES_TABLE_PACKAGE_TYPE {
                return Err(DecodeError::UnexpectedChunk {
                    expected: RES_TABLE_PACKAGE_TYPE,
                    found: package_header.chunk_type,
                });
            }
            let package = parse_package(&reader, &package_header)?;
            packages.insert(package.id, package);
            cursor = package_header.end();
        }

        Ok(ResourceTable {
            global_strings,
            packages,
        })
    }

    /// The table's global string pool.
    pub fn strings(&self) -> &StringPool {
        &self.global_strings
    }

    pub fn packages(&self) -> impl Iterator<Item = &Package> {
        self.packages.values()
    }

    /// Resolve a resource id to its key, formatted as `@type/key` when
    /// `xml_form` is set and `R.type.key` otherwise. Unknown ids come back
    /// as `None`.
    pub fn key_for(&self, res_id: u32, xml_form: bool) -> Option<String> {
        let (package, spec, variants) = self.variants_of(res_id)?;
        let entry = variants.values().next()?;
        let type_name = package
            .type_strings
            .get(u32::from(spec.type_id).checked_sub(1)?)?;
        Some(if xml_form {
            format!("@{type_name}/{}", entry.key)
        } else {
            format!("R.{type_name}.{}", entry.key)
        })
    }

    /// The entry for the default (all-zero) configuration, if present.
    pub fn default_value(&self, res_id: u32) -> Option<&Entry> {
        self.variants_of(res_id)?.2.get(&ConfigKey::default())
    }

    /// Every configuration variant recorded for a resource id.
    pub fn all_values(&self, res_id: u32) -> Option<&BTreeMap<ConfigKey, Entry>> {
        Some(self.variants_of(res_id)?.2)
    }

    /// Key-name pool contents per package.
    pub fn all_keys(&self) -> BTreeMap<u8, Vec<String>> {
        self.packages
            .iter()
            .map(|(&id, package)| (id, package.key_strings.strings().to_vec()))
            .collect()
    }

    /// Type-name pool contents per package.
    pub fn all_types(&self) -> BTreeMap<u8, Vec<String>> {
        self.packages
            .iter()
            .map(|(&id, package)| (id, package.type_strings.strings().to_vec()))
            .collect()
    }

    /// Global string pool contents.
    pub fn all_strings(&self) -> Vec<String> {
        self.global_strings.strings().to_vec()
    }

    fn variants_of(
        &self,
        res_id: u32,
    ) -> Option<(&Package, &TypeSpec, &BTreeMap<ConfigKey, Entry>)> {
        let id = ResourceId::from(res_id);
        let package = self.packages.get(&id.package)?;
        let spec = package.spec(id.type_index)?;
        let chunk = spec.chunk.as_ref()?;
        let variants = chunk.entries.get(id.entry as usize)?;
        if variants.is_empty() {
            return None;
        }
        Some((package, spec, variants))
    }
}

fn parse_package(reader: &BinReader<'_>, header: &ChunkHeader) -> DecodeResult<Package> {
    let at = header.start;
    let id = (reader.u32_le(at + 8) & 0xFF) as u8;
    let name = reader.str_utf16le(at + 12, 256);
    let type_strings_off = reader.u32_le(at + 268) as usize;
    let key_strings_off = reader.u32_le(at + 276) as usize;
    // last_type (+272) and last_key (+280) are not consulted

    let type_pool_header = ChunkHeader::parse(reader, at + type_strings_off)?;
    if type_pool_header.chunk_type != RES_STRING_POOL_TYPE {
        return Err(DecodeError::UnexpectedChunk {
            expected: RES_STRING_POOL_TYPE,
            found: type_pool_header.chunk_type,
        });
    }
    let type_strings = StringPool::parse(reader, &type_pool_header)?;

    let key_pool_header = ChunkHeader::parse(reader, at + key_strings_off)?;
    if key_pool_header.chunk_type != RES_STRING_POOL_TYPE {
        return Err(DecodeError::UnexpectedChunk {
            expected: RES_STRING_POOL_TYPE,
            found: key_pool_header.chunk_type,
        });
    }
    let key_strings = StringPool::parse(reader, &key_pool_header)?;

    let mut specs: Vec<TypeSpec> = Vec::new();
    let mut cursor = type_pool_header.end().max(key_pool_header.end());
    while cursor < header.end() {
        let chunk = ChunkHeader::parse(reader, cursor)?;
        match chunk.chunk_type {
            RES_TABLE_TYPE_SPEC_TYPE => specs.push(parse_type_spec(reader, &chunk)?),
            RES_TABLE_TYPE_TYPE => merge_type_chunk(reader, &chunk, &mut specs, &key_strings)?,
            RES_TABLE_PACKAGE_TYPE => break,
            other => {
                debug!(
                    "skipping {} chunk (0x{other:04x}) in package body",
                    chunk_name(other)
                );
            }
        }
        cursor = chunk.end();
    }

    Ok(Package {
        id,
        name,
        type_strings,
        key_strings,
        specs,
    })
}

fn parse_type_spec(reader: &BinReader<'_>, chunk: &ChunkHeader) -> DecodeResult<TypeSpec> {
    let at = chunk.start;
    let type_id = reader.u8(at + 8);
    let entry_count = reader.u32_le(at + 12);
    if 16 + 4 * entry_count as usize > chunk.chunk_size as usize {
        return Err(DecodeError::Malformed(format!(
            "type spec 0x{type_id:02x} flag table ({entry_count} entries) exceeds chunk bounds"
        )));
    }
    let flags = (0..entry_count as usize)
        .map(|i| reader.u32_le(at + 16 + 4 * i))
        .collect();
    Ok(TypeSpec {
        type_id,
        entry_count,
        flags,
        chunk: None,
    })
}

/// Merge one type chunk's entries into its spec. The first chunk for a
/// spec fixes the stored configuration; later chunks for the same type id
/// accumulate their variants into the same per-slot maps.
fn merge_type_chunk(
    reader: &BinReader<'_>,
    chunk: &ChunkHeader,
    specs: &mut [TypeSpec],
    key_strings: &StringPool,
) -> DecodeResult<()> {
    let at = chunk.start;
    let type_id = reader.u8(at + 8);
    let entry_count = reader.u32_le(at + 12) as usize;
    let entries_start = reader.u32_le(at + 16) as usize;

    let (config, config_size) = ConfigKey::parse(reader, at + 20);
    if config_size < 4 || 20 + config_size > chunk.chunk_size as usize {
        return Err(DecodeError::Malformed(format!(
            "type chunk 0x{type_id:02x} has invalid configuration size {config_size}"
        )));
    }
    let offsets_at = at + 20 + config_size;
    if 20 + config_size + 4 * entry_count > chunk.chunk_size as usize {
        return Err(DecodeError::Malformed(format!(
            "type chunk 0x{type_id:02x} offset table ({entry_count} entries) exceeds chunk bounds"
        )));
    }
    if entries_start > chunk.chunk_size as usize {
        return Err(DecodeError::Malformed(format!(
            "type chunk 0x{type_id:02x} entry payload starts past chunk end"
        )));
    }

    let spec = specs
        .iter_mut()
        .rev()
        .find(|spec| spec.type_id == type_id)
        .ok_or_else(|| {
            DecodeError::Malformed(format!(
                "type chunk 0x{type_id:02x} without a preceding type spec"
            ))
        })?;
    let stored = spec.chunk.get_or_insert_with(|| TypeChunk {
        config,
        entries: Vec::new(),
    });
    if stored.entries.len() < entry_count {
        stored.entries.resize_with(entry_count, BTreeMap::new);
    }

    let payload_limit = chunk.chunk_size as usize - entries_start;
    for slot in 0..entry_count {
        let offset = reader.u32_le(offsets_at + 4 * slot);
        if offset == NO_ENTRY_INDEX {
            continue;
        }
        let offset = offset as usize;
        if offset >= payload_limit {
            return Err(DecodeError::Malformed(format!(
                "entry {slot} of type chunk 0x{type_id:02x} has offset 0x{offset:x} outside the chunk"
            )));
        }
        let entry = parse_entry(reader, at + entries_start + offset, key_strings)?;
        stored.entries[slot].insert(config, entry);
    }
    Ok(())
}

fn parse_entry(
    reader: &BinReader<'_>,
    at: usize,
    key_strings: &StringPool,
) -> DecodeResult<Entry> {
    let flags = EntryFlags::from_bits_retain(reader.u16_le(at + 2));
    let key_index = reader.u32_le(at + 4);
    let key = key_strings
        .get(key_index)
        .ok_or_else(|| {
            DecodeError::Malformed(format!(
                "entry key index {key_index} outside the key-name pool"
            ))
        })?
        .to_string();

    if flags.contains(EntryFlags::COMPLEX) {
        // Aggregate resources (attrs, styles, plurals, arrays) keep only
        // their raw parent word; the map payload is left undecoded.
        let parent = reader.u32_le(at + 8);
        debug!("complex resource entry '{key}' left undecoded");
        return Ok(Entry {
            flags,
            key,
            value: TypedValue::Opaque(0, parent),
        });
    }

    let data_type = reader.u8(at + 11);
    let data = reader.u32_le(at + 12);
    Ok(Entry {
        flags,
        key,
        value: TypedValue::decode(data_type, data),
    })
}
