//! Error types for archive emission and extraction.
//!
//! Provides contextual error chaining, filesystem errors that carry the
//! offending path, and a `bail!` macro for early returns.
//!
//! # Example
//!
//! ```no_run
//! # use std::path::{Path, PathBuf};
//! # type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;
//! #
//! # trait ErrorExt<T> {
//! #     fn fs_context(self, context: &'static str, path: impl Into<PathBuf>) -> Result<T>;
//! # }
//! # impl<T> ErrorExt<T> for std::result::Result<T, std::io::Error> {
//! #     fn fs_context(self, context: &'static str, path: impl Into<PathBuf>) -> Result<T> {
//! #         self.map_err(|e| Box::new(e) as Box<dyn std::error::Error>)
//! #     }
//! # }
//! #
//! fn read_entry(path: &Path) -> Result<Vec<u8>> {
//!     let bytes = std::fs::read(path).fs_context("reading archive entry", path)?;
//!     Ok(bytes)
//! }
//! ```

use std::{
    fmt::Display,
    io,
    path::{self, PathBuf},
};
use thiserror::Error as DeriveError;

/// Errors returned by the archive layer.
#[derive(Debug, DeriveError)]
#[non_exhaustive]
pub enum Error {
    /// Error with context. Created by the [`Context`] trait.
    #[error("{0}: {1}")]
    Context(String, Box<Self>),

    /// File system error with path context.
    ///
    /// Created by the [`ErrorExt`] trait's `fs_context` method.
    #[error("{context} {path}: {error}")]
    Fs {
        /// Context describing the operation (e.g., "reading archive entry")
        context: &'static str,
        /// Path that was being accessed
        path: PathBuf,
        /// The underlying I/O error
        error: io::Error,
    },

    /// Generic I/O error.
    #[error("{0}")]
    IoError(#[from] io::Error),

    /// Error walking a packaged directory.
    #[error("{0}")]
    WalkdirError(#[from] walkdir::Error),

    /// Path prefix stripping error.
    #[error("{0}")]
    StripError(#[from] path::StripPrefixError),

    /// ZIP archive creation/extraction error.
    #[error("{0}")]
    ZipError(#[from] zip::result::ZipError),

    /// A path could not be represented as an archive entry name.
    #[error("path is not valid UTF-8: {0}")]
    NonUtf8Path(PathBuf),

    /// Generic error with custom message.
    #[error("{0}")]
    GenericError(String),
}

impl Error {
    /// The underlying OS error code, if this error came from the filesystem.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Error::Context(_, inner) => inner.raw_os_error(),
            Error::Fs { error, .. } | Error::IoError(error) => error.raw_os_error(),
            _ => None,
        }
    }
}

/// Convenient type alias for Result.
pub type Result<T> = std::result::Result<T, Error>;

/// Trait for adding context to errors.
pub trait Context<T> {
    /// Add context to an error using a closure (lazy evaluation).
    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C;
}

impl<T> Context<T> for Result<T> {
    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C,
    {
        self.map_err(|e| Error::Context(f().to_string(), Box::new(e)))
    }
}

/// Extension trait for filesystem operations with automatic path context.
pub trait ErrorExt<T> {
    /// Add filesystem context to an I/O error.
    ///
    /// The `context` should be a present-tense verb phrase describing the operation,
    /// e.g., "reading file", "creating directory".
    fn fs_context(self, context: &'static str, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> ErrorExt<T> for std::result::Result<T, std::io::Error> {
    fn fs_context(self, context: &'static str, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|error| Error::Fs {
            context,
            path: path.into(),
            error,
        })
    }
}

/// Macro for early return with error.
///
/// Converts the message into a [`Error::GenericError`] and returns immediately.
///
/// ```ignore
/// bail!("archive writer failed");
/// bail!("invalid entry: {}", name);
/// ```
#[macro_export]
macro_rules! bail {
    ($msg:literal $(,)?) => {
        return Err($crate::archive::Error::GenericError($msg.into()))
    };
    ($err:expr $(,)?) => {
        return Err($crate::archive::Error::GenericError($err.to_string()))
    };
    ($fmt:expr, $($arg:tt)*) => {
        return Err($crate::archive::Error::GenericError(format!($fmt, $($arg)*)))
    };
}
