use std::fmt;

use crate::arsc::chunk_name;

/// Result alias for binary resource decoding.
pub type DecodeResult<T> = Result<T, DecodeError>;

/// Errors surfaced while decoding the resource table or binary XML.
///
/// Lookup misses (unknown package, type, or entry slot) are not errors;
/// they come back as absent values from the lookup operations.
#[derive(Debug)]
pub enum DecodeError {
    /// The buffer does not have the structure the format requires.
    Malformed(String),
    /// A chunk of one type was required but another was found.
    UnexpectedChunk { expected: u16, found: u16 },
    /// Text XML generation failure.
    Xml(String),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Malformed(msg) => write!(f, "malformed resource data: {msg}"),
            DecodeError::UnexpectedChunk { expected, found } => write!(
                f,
                "expected a {} chunk but found {} (0x{found:04x})",
                chunk_name(*expected),
                chunk_name(*found)
            ),
            DecodeError::Xml(msg) => write!(f, "XML error: {msg}"),
        }
    }
}

impl std::error::Error for DecodeError {}

impl From<quick_xml::Error> for DecodeError {
    fn from(value: quick_xml::Error) -> Self {
        DecodeError::Xml(value.to_string())
    }
}
