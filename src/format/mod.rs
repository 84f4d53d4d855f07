//! Output formats and their post-processing.
//!
//! - `c4z`: a zip archive written directly by the emitter, optionally
//!   extracted next to itself afterwards
//! - `c4i`: a single descriptor file with the squished Lua inlined as CDATA,
//!   assembled after the emitter's throwaway archive is discarded

pub mod single_file;

use std::fmt;

use crate::error::ManifestError;

pub use single_file::{STAGING_PREFIX, SingleFileAssembly, locate_staging_dir};

/// Package output format, selected by the manifest `type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PackageFormat {
    /// `.c4z` zip archive
    Archive,
    /// `.c4i` single-file descriptor
    SingleFile,
}

impl PackageFormat {
    /// Parse a manifest `type` value.
    pub fn from_type(value: &str) -> Result<Self, ManifestError> {
        match value {
            "c4z" => Ok(Self::Archive),
            "c4i" => Ok(Self::SingleFile),
            other => Err(ManifestError::UnsupportedFormat {
                format: other.to_string(),
            }),
        }
    }

    /// File extension, identical to the manifest `type`.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Archive => "c4z",
            Self::SingleFile => "c4i",
        }
    }

    /// Format only works with squished Lua.
    pub fn requires_squish(self) -> bool {
        matches!(self, Self::SingleFile)
    }

    /// The packaged descriptor comes from the in-memory buffer instead of
    /// being listed as an ordinary file.
    pub fn embeds_descriptor_bytes(self) -> bool {
        matches!(self, Self::Archive)
    }

    /// Injected documentation keeps the original `file` attribute.
    pub fn keeps_documentation_file(self) -> bool {
        matches!(self, Self::Archive)
    }
}

impl fmt::Display for PackageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}
