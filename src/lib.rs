//! # apkres
//!
//! A library for reading compiled Android resources out of APK files.
//!
//! An APK carries two related binary formats: the resource table
//! (`resources.arsc`), which maps 32-bit resource ids to typed values per
//! device configuration, and binary XML documents such as
//! `AndroidManifest.xml`, whose attributes may reference entries in that
//! table. This crate decodes both and resolves references between them.
//!
//! ```no_run
//! use apkres::Apk;
//!
//! let apk = Apk::open("app.apk").unwrap();
//! let manifest = apk.parse_xml("AndroidManifest.xml", true, true).unwrap();
//! println!("{}", manifest.text);
//! if let Some(key) = apk.resource_key(0x7F010000, true) {
//!     println!("{key}");
//! }
//! ```

pub mod apk;
pub mod arsc;
pub mod axml;
pub mod zip;

pub use apk::{Apk, ApkError, ApkResult};
pub use arsc::error::{DecodeError, DecodeResult};
pub use arsc::string_pool::StringPool;
pub use arsc::table::{ConfigKey, Entry, EntryFlags, Package, ResourceId, ResourceTable, TypeSpec};
pub use arsc::value::{ColorFormat, DimensionUnit, FractionUnit, TypedValue};
pub use axml::{XmlAttribute, XmlDecoder, XmlDocument, XmlElement};
pub use zip::ApkArchive;

#[cfg(test)]
mod tests;
