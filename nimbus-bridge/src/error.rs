// Bridge-side error types.

use std::fmt;

use nimbus_core::VariantKind;

/// A value could not cross the managed boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarshalError {
    /// The kind is outside the closed marshalling table.
    Unsupported(VariantKind),
    /// Wire data did not decode to a known kind/payload shape.
    Malformed(String),
}

impl fmt::Display for MarshalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarshalError::Unsupported(kind) => {
                write!(f, "kind is not marshallable: {}", kind.name())
            }
            MarshalError::Malformed(msg) => write!(f, "malformed wire value: {msg}"),
        }
    }
}

impl std::error::Error for MarshalError {}

/// scripts_metadata loading failures.
#[derive(Debug)]
pub enum MetadataError {
    Io(std::io::Error),
    Parse(serde_json::Error),
}

impl fmt::Display for MetadataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataError::Io(e) => write!(f, "cannot read scripts metadata: {e}"),
            MetadataError::Parse(e) => write!(f, "invalid scripts metadata: {e}"),
        }
    }
}

impl std::error::Error for MetadataError {}

impl From<std::io::Error> for MetadataError {
    fn from(e: std::io::Error) -> Self {
        MetadataError::Io(e)
    }
}

impl From<serde_json::Error> for MetadataError {
    fn from(e: serde_json::Error) -> Self {
        MetadataError::Parse(e)
    }
}

/// Hot-reload failures. The coordinator recovers from all of these by
/// leaving placeholders in place; the error is surfaced once to the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadError {
    AssemblyMissing(String),
    ApiHashMismatch { expected: String, found: String },
    DomainLoadFailed(String),
    ClassMissing(String),
}

impl fmt::Display for ReloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReloadError::AssemblyMissing(path) => write!(f, "managed assembly missing: {path}"),
            ReloadError::ApiHashMismatch { expected, found } => write!(
                f,
                "API hash mismatch: engine has {expected}, assembly built against {found}"
            ),
            ReloadError::DomainLoadFailed(msg) => write!(f, "managed domain failed to load: {msg}"),
            ReloadError::ClassMissing(name) => {
                write!(f, "class missing after reload: {name}")
            }
        }
    }
}

impl std::error::Error for ReloadError {}
