//! Read-only access to the APK (ZIP) container.
//!
//! Only retrieval of entry bytes by name is needed by the decoders, so the
//! archive is read eagerly into memory and exposed as a deterministic map.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Component, Path};
use zip::read::ZipArchive;

/// Result alias for APK (ZIP) container operations.
pub type ArchiveResult<T> = Result<T, ArchiveError>;

/// Errors surfaced by the APK container layer.
#[derive(Debug)]
pub enum ArchiveError {
    Io(io::Error),
    Zip(zip::result::ZipError),
    InvalidInput(String),
}

impl std::fmt::Display for ArchiveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArchiveError::Io(err) => write!(f, "I/O error: {err}"),
            ArchiveError::Zip(err) => write!(f, "ZIP error: {err}"),
            ArchiveError::InvalidInput(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for ArchiveError {}

impl From<io::Error> for ArchiveError {
    fn from(value: io::Error) -> Self {
        ArchiveError::Io(value)
    }
}

impl From<zip::result::ZipError> for ArchiveError {
    fn from(value: zip::result::ZipError) -> Self {
        ArchiveError::Zip(value)
    }
}

/// An in-memory, read-only view of an APK's entries.
///
/// Entries are stored in a `BTreeMap`, so iteration order is deterministic
/// and independent of the on-disk directory order.
pub struct ApkArchive {
    entries: BTreeMap<String, Vec<u8>>,
}

impl ApkArchive {
    /// Load an APK from disk into memory, skipping directory entries.
    pub fn from_file(path: impl AsRef<Path>) -> ArchiveResult<Self> {
        let file = File::open(path.as_ref())?;
        let mut archive = ZipArchive::new(file)?;
        let mut entries = BTreeMap::new();
        for idx in 0..archive.len() {
            let mut entry = archive.by_index(idx)?;
            if entry.name().ends_with('/') {
                continue;
            }
            let mut data = Vec::with_capacity(entry.size() as usize);
            entry.read_to_end(&mut data)?;
            #[allow(deprecated)]
            let sanitized = entry.sanitized_name();
            let name = path_to_entry_name(&sanitized)?;
            entries.insert(name, data);
        }
        Ok(ApkArchive { entries })
    }

    /// Borrow an entry's bytes by name (e.g., `resources.arsc`).
    pub fn entry(&self, name: &str) -> Option<&[u8]> {
        self.entries.get(name).map(Vec::as_slice)
    }

    /// Iterate over entry names.
    pub fn entry_names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn path_to_entry_name(path: &Path) -> ArchiveResult<String> {
    let mut components = Vec::new();
    for comp in path.components() {
        match comp {
            Component::Normal(part) => components.push(part.to_string_lossy().replace('\\', "/")),
            Component::CurDir => {}
            Component::RootDir | Component::Prefix(_) => {
                return Err(ArchiveError::InvalidInput(format!(
                    "invalid entry path component in {}",
                    path.display()
                )));
            }
            Component::ParentDir => {
                return Err(ArchiveError::InvalidInput(
                    "entry paths may not contain parent components".to_string(),
                ));
            }
        }
    }
    if components.is_empty() {
        return Err(ArchiveError::InvalidInput(
            "entry name must not be empty".to_string(),
        ));
    }
    Ok(components.join("/"))
}
