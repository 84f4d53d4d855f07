//! # Driver Packager
//!
//! Builds Control4 driver packages from a driver source directory.
//!
//! A build is driven by a manifest (a `.c4zproj` file) that names the output
//! format, the package name and the files and directories to include. Two
//! formats are produced:
//!
//! - **c4z**: a zip archive holding `driver.xml` and the driver's resources
//! - **c4i**: a single XML file with the squished Lua source embedded in the
//!   descriptor
//!
//! Without a manifest the source directory is packaged as a c4z named after
//! the directory.
//!
//! ## Usage
//!
//! ```bash
//! driver-packager ./MyDriver ./out                  # package ./MyDriver/MyDriver.c4zproj
//! driver-packager ./MyDriver ./out custom.c4zproj   # explicit manifest
//! driver-packager -v -u ./MyDriver ./out            # verbose, extract after build
//! driver-packager --update-modified --driver-version 42 ./MyDriver ./out
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod archive;
pub mod cli;
pub mod descriptor;
pub mod error;
pub mod execute;
pub mod format;
pub mod manifest;
pub mod pipeline;
pub mod shell;
pub mod squish;
pub mod state;
pub mod xml;

pub use archive::{ArchiveEmitter, ZipEmitter};
pub use cli::Args;
pub use descriptor::DescriptorUpdate;
pub use error::{CliError, PackagerError, Result};
pub use format::PackageFormat;
pub use manifest::{BuildSettings, Manifest};
pub use pipeline::{PackagedArtifact, Packager};
pub use squish::SquishTool;
pub use state::{BuildPhase, BuildState};

use std::path::PathBuf;

/// Configuration for one build
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Driver source directory
    pub source_root: PathBuf,
    /// Directory the package is written to
    pub destination_root: PathBuf,
    /// Manifest file name, relative to the source directory
    pub manifest_filename: Option<String>,
    /// Verbose logging and squish output
    pub verbose: bool,
    /// Extract a c4z next to itself after building
    pub unzip: bool,
    /// Enable interactive execution in the packaged driver
    pub allow_execute: bool,
    /// Stamp `<modified>` in the packaged descriptor
    pub update_modified: bool,
    /// Replace `<version>` in the packaged descriptor
    pub driver_version: Option<String>,
    /// Parent of the squish staging directories
    pub temp_root: PathBuf,
}

impl BuildConfig {
    /// Configuration with every option off.
    pub fn new(source_root: impl Into<PathBuf>, destination_root: impl Into<PathBuf>) -> Self {
        Self {
            source_root: source_root.into(),
            destination_root: destination_root.into(),
            manifest_filename: None,
            verbose: false,
            unzip: false,
            allow_execute: false,
            update_modified: false,
            driver_version: None,
            temp_root: std::env::temp_dir(),
        }
    }

    /// Descriptor changes requested by this configuration.
    pub fn descriptor_update(&self) -> DescriptorUpdate {
        DescriptorUpdate {
            update_modified: self.update_modified,
            version: self.driver_version.clone(),
        }
    }
}
