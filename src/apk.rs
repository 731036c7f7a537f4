//! The public facade: open an APK, look up resources by id, and decode
//! binary XML members with reference resolution.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use crate::arsc::error::DecodeError;
use crate::arsc::table::{ConfigKey, Entry, ResourceTable};
use crate::axml::{XmlDecoder, XmlDocument};
use crate::zip::{ApkArchive, ArchiveError};

/// Result alias for facade operations.
pub type ApkResult<T> = Result<T, ApkError>;

/// Errors surfaced when opening or querying an APK.
#[derive(Debug)]
pub enum ApkError {
    Archive(ArchiveError),
    Decode(DecodeError),
    MissingEntry(String),
}

impl fmt::Display for ApkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApkError::Archive(err) => write!(f, "{err}"),
            ApkError::Decode(err) => write!(f, "{err}"),
            ApkError::MissingEntry(name) => write!(f, "APK has no entry named {name}"),
        }
    }
}

impl std::error::Error for ApkError {}

impl From<ArchiveError> for ApkError {
    fn from(value: ArchiveError) -> Self {
        ApkError::Archive(value)
    }
}

impl From<DecodeError> for ApkError {
    fn from(value: DecodeError) -> Self {
        ApkError::Decode(value)
    }
}

/// An opened APK with its resource table parsed eagerly.
///
/// The table is immutable after construction; decoding an XML member
/// borrows it only for the duration of the call.
pub struct Apk {
    archive: ApkArchive,
    table: ResourceTable,
}

impl Apk {
    /// Open an APK file and parse its `resources.arsc`.
    pub fn open(path: impl AsRef<Path>) -> ApkResult<Apk> {
        let archive = ApkArchive::from_file(path)?;
        let arsc = archive
            .entry("resources.arsc")
            .ok_or_else(|| ApkError::MissingEntry("resources.arsc".to_string()))?;
        let table = ResourceTable::parse(arsc)?;
        Ok(Apk { archive, table })
    }

    /// Resolve a resource id to `@type/key` (`xml_form`) or `R.type.key`.
    pub fn resource_key(&self, res_id: u32, xml_form: bool) -> Option<String> {
        self.table.key_for(res_id, xml_form)
    }

    /// The entry for the default configuration of a resource id.
    pub fn resource_default(&self, res_id: u32) -> Option<&Entry> {
        self.table.default_value(res_id)
    }

    /// Every configuration variant recorded for a resource id.
    pub fn resource_all(&self, res_id: u32) -> Option<&BTreeMap<ConfigKey, Entry>> {
        self.table.all_values(res_id)
    }

    /// Key-name pool contents per package id.
    pub fn all_keys(&self) -> BTreeMap<u8, Vec<String>> {
        self.table.all_keys()
    }

    /// Global string pool contents.
    pub fn all_strings(&self) -> Vec<String> {
        self.table.all_strings()
    }

    /// Type-name pool contents per package id.
    pub fn all_types(&self) -> BTreeMap<u8, Vec<String>> {
        self.table.all_types()
    }

    /// Decode a binary XML member by entry name.
    ///
    /// `pretty` selects the indented text form; `resolve` replaces
    /// attribute references with their default resource values where the
    /// table has them.
    pub fn parse_xml(&self, name: &str, pretty: bool, resolve: bool) -> ApkResult<XmlDocument> {
        let bytes = self
            .archive
            .entry(name)
            .ok_or_else(|| ApkError::MissingEntry(name.to_string()))?;
        let decoder = XmlDecoder::with_table(&self.table).resolve_references(resolve);
        Ok(decoder.decode(bytes, pretty)?)
    }

    /// The parsed resource table.
    pub fn resource_table(&self) -> &ResourceTable {
        &self.table
    }

    /// Names of all entries in the APK container.
    pub fn entry_names(&self) -> impl Iterator<Item = &str> {
        self.archive.entry_names()
    }
}
