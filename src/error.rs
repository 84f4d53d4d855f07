//! Error types for driver packaging operations.
//!
//! Every fatal failure in the pipeline is a [`PackagerError`]. The orchestrator
//! is the only place that turns one into a process exit code.

use std::path::PathBuf;
use thiserror::Error;

use crate::xml::XmlError;

/// Result type alias for packaging operations
pub type Result<T> = std::result::Result<T, PackagerError>;

/// Exit code for business-rule violations and other non-OS failures.
pub const GENERIC_FAILURE_EXIT_CODE: i32 = 255;

/// Exit code for malformed manifest or descriptor XML.
pub const XML_ERROR_EXIT_CODE: i32 = 65;

/// Main error type for all packaging operations
#[derive(Error, Debug)]
pub enum PackagerError {
    /// Manifest validation errors
    #[error("DriverPackager: {0}")]
    Manifest(#[from] ManifestError),

    /// Driver descriptor errors
    #[error("DriverPackager: {0}")]
    Descriptor(#[from] DescriptorError),

    /// Lua squish errors
    #[error("DriverPackager: {0}")]
    Squish(#[from] SquishError),

    /// CLI argument errors
    #[error("CLI error: {0}")]
    Cli(#[from] CliError),

    /// Malformed XML in a manifest or descriptor
    #[error("DriverPackager: Invalid XML ({path}): {source}")]
    Xml {
        /// File that failed to parse
        path: PathBuf,
        /// Parser diagnostic
        #[source]
        source: XmlError,
    },

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Archive emission or extraction errors
    #[error("Archive error: {0}")]
    Archive(#[from] crate::archive::Error),
}

/// Manifest and item validation errors
#[derive(Error, Debug)]
pub enum ManifestError {
    /// Root element is not the manifest root
    #[error("Invalid XML: Missing tag 'Driver' (found '{found}')")]
    InvalidRoot {
        /// Tag that was found instead
        found: String,
    },

    /// Required root attribute is absent
    #[error("Invalid XML: Missing tag '{attribute}'")]
    MissingAttribute {
        /// Attribute name
        attribute: &'static str,
    },

    /// Manifest has no item list
    #[error("Invalid XML: Missing tag 'Items'")]
    MissingItems,

    /// Item is missing a required attribute
    #[error("Invalid XML: Missing tag 'Item' subtag '{attribute}'")]
    MissingItemAttribute {
        /// Attribute name
        attribute: &'static str,
    },

    /// Manifest `type` is not a supported output format
    #[error("Unsupported driver type '{format}'. Supported types: c4z, c4i")]
    UnsupportedFormat {
        /// Requested type
        format: String,
    },

    /// Declared directory item is missing from the source tree
    #[error("Error, manifest 'dir' Item '{name}' does not exist.")]
    DirectoryNotFound {
        /// Item name
        name: String,
    },

    /// Declared file item is missing from the source tree
    #[error("Error, manifest 'file' Item '{name}' does not exist in {root}.")]
    FileNotFound {
        /// Item name
        name: String,
        /// Source root searched
        root: PathBuf,
    },

    /// The descriptor was never declared as a file item
    #[error("Error, manifest 'file' Item 'driver.xml' was not found.")]
    DescriptorNotDeclared,

    /// Single-file format requested without squishing
    #[error(
        "You are attempting to build a driver of type 'c4i', but 'squishLua' is set to false in the project file/manifest.  This needs to be set to true."
    )]
    SquishRequired,

    /// Single-file format requested for a driver with an encrypted script
    #[error(
        "Encryption was detected in the driver.xml.  When building drivers of type 'c4i', encryption must be disabled.  Please remove the attribute and value of encryption='2' from the <script> element in the driver.xml"
    )]
    EncryptionNotSupported,
}

/// Driver descriptor errors
#[derive(Error, Debug)]
pub enum DescriptorError {
    /// A node that must be updated is absent
    #[error("Unable to update driver.xml: <{node}> tag not found")]
    MissingNode {
        /// Node name
        node: &'static str,
    },

    /// The version node has no prior text
    #[error("Unable to update driver.xml: empty <version> tag")]
    EmptyVersion,

    /// The descriptor has no configuration section
    #[error("driver.xml has no <config> section")]
    MissingConfig,
}

/// Lua squish errors
#[derive(Error, Debug)]
pub enum SquishError {
    /// The squish tool could not be located
    #[error("Unable to locate the squish tool: {reason}")]
    ToolNotFound {
        /// Reason for the error
        reason: String,
    },

    /// The squish process could not be started
    #[error("Error squishing lua in {directory}: {command}: {source}")]
    Launch {
        /// Command line that was attempted
        command: String,
        /// Directory being squished
        directory: PathBuf,
        /// Launch error
        #[source]
        source: std::io::Error,
    },

    /// The squish process exited unsuccessfully
    #[error("Lua squish failed: {status} while processing {directory}")]
    Failed {
        /// Exit status description
        status: String,
        /// Directory being squished
        directory: PathBuf,
    },
}

/// CLI-specific errors
#[derive(Error, Debug)]
pub enum CliError {
    /// Invalid command line arguments
    #[error("Invalid arguments: {reason}")]
    InvalidArguments {
        /// Reason for the error
        reason: String,
    },
}

impl PackagerError {
    /// Wrap an XML error with the file it came from.
    pub fn xml(path: impl Into<PathBuf>, source: XmlError) -> Self {
        PackagerError::Xml {
            path: path.into(),
            source,
        }
    }

    /// Process exit code for this error.
    ///
    /// I/O failures report the OS errno, malformed XML reports
    /// [`XML_ERROR_EXIT_CODE`] and everything else reports
    /// [`GENERIC_FAILURE_EXIT_CODE`].
    pub fn exit_code(&self) -> i32 {
        let code = match self {
            PackagerError::Io(e) => e.raw_os_error(),
            PackagerError::Archive(e) => e.raw_os_error(),
            PackagerError::Xml { .. } => Some(XML_ERROR_EXIT_CODE),
            _ => None,
        };
        match code {
            Some(code) if code != 0 => code,
            _ => GENERIC_FAILURE_EXIT_CODE,
        }
    }

    /// Get actionable recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            PackagerError::Manifest(ManifestError::SquishRequired) => vec![
                "Set squishLua=\"true\" on the <Driver> element of the manifest".to_string(),
            ],
            PackagerError::Manifest(ManifestError::EncryptionNotSupported) => vec![
                "Remove encryption=\"2\" from the <script> element of driver.xml".to_string(),
            ],
            PackagerError::Manifest(ManifestError::DescriptorNotDeclared) => vec![
                "Add <Item type=\"file\" name=\"driver.xml\"/> to the manifest <Items>".to_string(),
            ],
            PackagerError::Manifest(ManifestError::FileNotFound { name, .. })
            | PackagerError::Manifest(ManifestError::DirectoryNotFound { name }) => vec![
                format!("Check that '{}' exists in the source directory", name),
                "Mark the item exclude=\"true\" if it should not be packaged".to_string(),
            ],
            PackagerError::Squish(SquishError::ToolNotFound { .. })
            | PackagerError::Squish(SquishError::Launch { .. }) => vec![
                "Install luajit and place the squish script next to the packager executable"
                    .to_string(),
            ],
            PackagerError::Xml { path, .. } => {
                vec![format!("Fix the XML syntax in {}", path.display())]
            }
            _ => vec!["Check the error message above for specific details".to_string()],
        }
    }

    /// Whether rerunning the same build could succeed without editing the
    /// manifest or descriptor.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            PackagerError::Manifest(_)
                | PackagerError::Descriptor(_)
                | PackagerError::Xml { .. }
                | PackagerError::Cli(_)
        )
    }
}
