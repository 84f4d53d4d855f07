//! `.c4i` assembly.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::descriptor::{self, CONFIG_TAG, DESCRIPTOR_FILENAME, DescriptorUpdate};
use crate::error::{DescriptorError, ManifestError, PackagerError, Result};
use crate::xml::Element;

/// Name prefix of squish staging directories under the temp root.
pub const STAGING_PREFIX: &str = "Squished_Lua_";

/// Script-less descriptor written into the staging directory.
pub const INTERMEDIATE_DESCRIPTOR: &str = "driver2.xml";

/// Inputs for turning an emitted package into a single-file driver.
#[derive(Debug, Clone, Copy)]
pub struct SingleFileAssembly<'a> {
    /// Source root holding `driver.xml` and the squished Lua
    pub source_root: &'a Path,
    /// Directory searched for squish staging directories
    pub temp_root: &'a Path,
    /// Squished Lua file, relative to the source root
    pub squish_output: &'a str,
    /// Timestamp and version changes to re-apply
    pub update: &'a DescriptorUpdate,
}

impl SingleFileAssembly<'_> {
    /// Replace the emitted archive at `package` with the single-file driver.
    ///
    /// Returns the staging directory that was used.
    pub async fn assemble(&self, package: &Path) -> Result<PathBuf> {
        crate::archive::fs::remove_file(package).await?;

        let staging = locate_staging_dir(self.temp_root)
            .await?
            .ok_or(ManifestError::EncryptionNotSupported)?;
        log::info!("Using squish staging directory {}", staging.display());

        let source_descriptor = self.source_root.join(DESCRIPTOR_FILENAME);
        let mut document = descriptor::load(&source_descriptor).await?;
        self.update.apply(&mut document)?;

        let config = document
            .root_mut()
            .child_mut(CONFIG_TAG)
            .ok_or(DescriptorError::MissingConfig)?;
        let removed = config.remove_children_named("script");
        log::debug!("Removed {} script node(s)", removed);

        let intermediate = staging.join(INTERMEDIATE_DESCRIPTOR);
        descriptor::save(&intermediate, &document).await?;

        let squished_path = self.source_root.join(self.squish_output);
        let squished = tokio::fs::read_to_string(&squished_path).await?;

        let mut script = Element::new("script");
        script.set_cdata(squished);
        document
            .root_mut()
            .child_mut(CONFIG_TAG)
            .ok_or(DescriptorError::MissingConfig)?
            .append_element(script);

        let bytes = document
            .to_bytes()
            .map_err(|e| PackagerError::xml(package, e))?;
        tokio::fs::write(package, bytes).await?;
        Ok(staging)
    }
}

/// Most recently created squish staging directory under `temp_root`.
///
/// Falls back to modification time where the platform does not record
/// creation time.
pub async fn locate_staging_dir(temp_root: &Path) -> Result<Option<PathBuf>> {
    let mut newest: Option<(SystemTime, PathBuf)> = None;
    let mut entries = tokio::fs::read_dir(temp_root).await?;

    while let Some(entry) = entries.next_entry().await? {
        let is_staging = entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with(STAGING_PREFIX));
        if !is_staging {
            continue;
        }
        let metadata = entry.metadata().await?;
        if !metadata.is_dir() {
            continue;
        }
        let stamp = metadata.created().or_else(|_| metadata.modified())?;
        if newest.as_ref().is_none_or(|(best, _)| stamp >= *best) {
            newest = Some((stamp, entry.path()));
        }
    }

    Ok(newest.map(|(_, path)| path))
}
