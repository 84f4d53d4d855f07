//! Archive emission and extraction.
//!
//! The pipeline hands a resolved item set to an [`ArchiveEmitter`] and never
//! touches the archive format directly. [`ZipEmitter`] is the default
//! implementation and writes a deflated zip container.

pub mod emitter;
pub mod error;
pub mod extract;
pub mod fs;

pub use emitter::{ArchiveEmitter, EmitRequest, ZipEmitter};
pub use error::{Context, Error, ErrorExt, Result};
pub use extract::extract_beside;

/// Archive entry name the in-memory descriptor is written under.
pub const DESCRIPTOR_ENTRY: &str = crate::descriptor::DESCRIPTOR_FILENAME;
