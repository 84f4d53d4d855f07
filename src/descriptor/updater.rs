//! Timestamp and version stamping.

use std::path::Path;

use chrono::{DateTime, Local};

use crate::error::{DescriptorError, PackagerError, Result};
use crate::xml::Document;

/// `modified` timestamp layout, e.g. `03/07/2025 02:41 PM`.
pub const TIMESTAMP_FORMAT: &str = "%m/%d/%Y %I:%M %p";

/// Requested descriptor changes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DescriptorUpdate {
    /// Stamp `<modified>` with the current local time
    pub update_modified: bool,
    /// Replace the text of `<version>`
    pub version: Option<String>,
}

impl DescriptorUpdate {
    /// Apply the update using the current local time.
    pub fn apply(&self, document: &mut Document) -> std::result::Result<(), DescriptorError> {
        self.apply_at(document, Local::now())
    }

    /// Apply the update with an explicit timestamp.
    pub fn apply_at(
        &self,
        document: &mut Document,
        now: DateTime<Local>,
    ) -> std::result::Result<(), DescriptorError> {
        let root = document.root_mut();

        if self.update_modified {
            let modified = root
                .child_mut("modified")
                .ok_or(DescriptorError::MissingNode { node: "modified" })?;
            let timestamp = now.format(TIMESTAMP_FORMAT).to_string();
            log::info!("Build timestamp {}", timestamp);
            modified.set_text(timestamp);
        }

        if let Some(version) = &self.version {
            let node = root
                .child_mut("version")
                .ok_or(DescriptorError::MissingNode { node: "version" })?;
            if !node.has_text() {
                return Err(DescriptorError::EmptyVersion);
            }
            log::info!("Driver version {} -> {}", node.text().trim(), version);
            node.set_text(version.clone());
        }

        Ok(())
    }

    /// Load the descriptor at `path`, apply the update and serialize the
    /// result without an XML declaration. The file itself is left untouched.
    pub async fn render(&self, path: &Path) -> Result<Vec<u8>> {
        let mut document = super::load(path).await?;
        self.apply(&mut document)?;
        document
            .to_bytes()
            .map_err(|e| PackagerError::xml(path, e))
    }
}
