//! Driver descriptor (`driver.xml`) handling.
//!
//! The descriptor is the driver's own metadata document. Packaging reads it
//! to find encrypted scripts, rewrites its documentation section, stamps its
//! modification time and version, and serializes it into the package.

pub mod documentation;
pub mod script;
pub mod updater;

use std::path::Path;

use crate::error::{PackagerError, Result};
use crate::xml::Document;

pub use documentation::{DocumentationOutcome, inject_documentation};
pub use script::{encrypted_script_name, squish_output_filename, strip_encrypted_suffix};
pub use updater::{DescriptorUpdate, TIMESTAMP_FORMAT};

/// File name of the driver descriptor in the source root and in packages.
pub const DESCRIPTOR_FILENAME: &str = "driver.xml";

/// Suffix of the descriptor backup written before documentation changes.
pub const BACKUP_SUFFIX: &str = ".bak";

/// Configuration section holding documentation and script nodes.
pub const CONFIG_TAG: &str = "config";

/// Read and parse a descriptor, reporting the path on malformed XML.
pub async fn load(path: &Path) -> Result<Document> {
    let xml = tokio::fs::read_to_string(path).await?;
    Document::parse(&xml).map_err(|e| PackagerError::xml(path, e))
}

/// Serialize a descriptor back to disk.
pub async fn save(path: &Path, document: &Document) -> Result<()> {
    let bytes = document
        .to_bytes()
        .map_err(|e| PackagerError::xml(path, e))?;
    tokio::fs::write(path, bytes).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_load_reports_offending_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(DESCRIPTOR_FILENAME);
        std::fs::write(&path, "<devicedata><config></devicedata>").expect("write");

        let err = load(&path).await.unwrap_err();
        assert!(matches!(err, PackagerError::Xml { .. }));
        assert!(err.to_string().contains("driver.xml"));
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(DESCRIPTOR_FILENAME);
        let xml = "<devicedata>\n  <version>3</version>\n</devicedata>";
        std::fs::write(&path, xml).expect("write");

        let document = load(&path).await.expect("load");
        save(&path, &document).await.expect("save");
        assert_eq!(std::fs::read_to_string(&path).expect("read"), xml);
    }
}
