//! Error types for supersast-pom.
//!
//! Only descriptor loading and writing can fail. Version conflicts found while
//! merging are data (see [`crate::PluginVersionConflict`]), not errors.

use camino::Utf8PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DescriptorError {
    /// The descriptor could not be read.
    #[error("read build descriptor {path}")]
    Read {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The descriptor is not well-formed XML.
    #[error("malformed build descriptor {path}: {message}")]
    MalformedDocument { path: Utf8PathBuf, message: String },

    /// The in-memory tree could not be encoded.
    #[error("serialize build descriptor {path}: {message}")]
    Serialize { path: Utf8PathBuf, message: String },

    /// The serialized descriptor could not be written.
    #[error("write build descriptor {path}")]
    Write {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl DescriptorError {
    /// True when the document itself is broken (as opposed to an I/O failure).
    pub fn is_malformed(&self) -> bool {
        matches!(self, DescriptorError::MalformedDocument { .. })
    }
}

/// Result type alias using DescriptorError.
pub type DescriptorResult<T> = Result<T, DescriptorError>;
