//! Manifest location.
//!
//! In priority order: the manifest named on the command line, a
//! `<dirname>.c4zproj` project file in the source root, or no manifest at all.

use std::path::{Path, PathBuf};

use path_absolutize::Absolutize;

use crate::BuildConfig;
use crate::descriptor::{self, script::SQUISH_CONFIG_FILENAME};
use crate::error::{CliError, Result};
use crate::manifest::{Manifest, PROJECT_FILE_EXTENSION};

/// Where the build's manifest comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestSource {
    /// Named on the command line
    Explicit(PathBuf),
    /// Project file matching the source directory name
    ProjectFile(PathBuf),
    /// No manifest; package the source directory as is
    Directory,
}

/// Pick the manifest for a build.
pub async fn locate_manifest(config: &BuildConfig) -> Result<ManifestSource> {
    if let Some(filename) = &config.manifest_filename {
        return Ok(ManifestSource::Explicit(config.source_root.join(filename)));
    }

    let name = directory_name(&config.source_root)?;
    let mut entries = tokio::fs::read_dir(&config.source_root).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_project = path
            .extension()
            .is_some_and(|ext| ext == PROJECT_FILE_EXTENSION)
            && path.file_stem().is_some_and(|stem| *stem == *name);
        if is_project && entry.file_type().await?.is_file() {
            return Ok(ManifestSource::ProjectFile(path));
        }
    }

    Ok(ManifestSource::Directory)
}

/// Manifest for a source root without one: every file directly in the root,
/// packaged as an archive named after the directory, squished when a
/// `squishy` configuration is present. The squish output is listed even
/// before the squish has produced it.
pub async fn directory_manifest(source_root: &Path) -> Result<Manifest> {
    let name = directory_name(source_root)?;
    let squish = tokio::fs::metadata(source_root.join(SQUISH_CONFIG_FILENAME))
        .await
        .is_ok_and(|m| m.is_file());

    let mut files = Vec::new();
    let mut entries = tokio::fs::read_dir(source_root).await?;
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }
        match entry.file_name().into_string() {
            Ok(file) => files.push(file),
            Err(file) => log::warn!("Skipping non UTF-8 file name {:?}", file),
        }
    }
    files.sort();

    if squish {
        let output = descriptor::squish_output_filename(source_root).await;
        if !files.contains(&output) {
            log::debug!("Adding squish output '{}' to the package", output);
            files.push(output);
        }
    }

    log::info!(
        "Building driver from directory {}...",
        source_root.absolutize()?.display()
    );
    Ok(Manifest::for_directory(name, squish, files))
}

fn directory_name(source_root: &Path) -> Result<String> {
    let absolute = source_root.absolutize()?;
    absolute
        .file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| {
            CliError::InvalidArguments {
                reason: format!(
                    "cannot derive a driver name from {}",
                    source_root.display()
                ),
            }
            .into()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::PackageFormat;
    use crate::manifest::Entry;

    fn config(root: &Path) -> BuildConfig {
        BuildConfig::new(root, root.join("out"))
    }

    #[tokio::test]
    async fn test_explicit_manifest_wins() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut config = config(dir.path());
        config.manifest_filename = Some("custom.xml".into());
        assert_eq!(
            locate_manifest(&config).await.expect("locate"),
            ManifestSource::Explicit(dir.path().join("custom.xml"))
        );
    }

    #[tokio::test]
    async fn test_project_file_must_match_directory_name() {
        let parent = tempfile::tempdir().expect("tempdir");
        let root = parent.path().join("Lights");
        std::fs::create_dir(&root).expect("mkdir");
        std::fs::write(root.join("Other.c4zproj"), "").expect("write");
        assert_eq!(
            locate_manifest(&config(&root)).await.expect("locate"),
            ManifestSource::Directory
        );

        std::fs::write(root.join("Lights.c4zproj"), "").expect("write");
        assert_eq!(
            locate_manifest(&config(&root)).await.expect("locate"),
            ManifestSource::ProjectFile(root.join("Lights.c4zproj"))
        );
    }

    #[tokio::test]
    async fn test_directory_manifest() {
        let parent = tempfile::tempdir().expect("tempdir");
        let root = parent.path().join("Blinds");
        std::fs::create_dir_all(root.join("www")).expect("mkdir");
        std::fs::write(root.join("driver.xml"), "<devicedata/>").expect("write");
        std::fs::write(root.join("driver.lua"), "").expect("write");

        let manifest = directory_manifest(&root).await.expect("manifest");
        assert_eq!(manifest.settings.name, "Blinds");
        assert_eq!(manifest.settings.format, PackageFormat::Archive);
        assert!(!manifest.settings.squish);
        let names: Vec<String> = manifest
            .items
            .iter()
            .filter_map(|entry| match entry {
                Entry::Declared(item) => item.name.clone(),
                Entry::Unexpected { .. } => None,
            })
            .collect();
        assert_eq!(names, vec!["driver.lua", "driver.xml"]);

        std::fs::write(root.join(SQUISH_CONFIG_FILENAME), "Main \"driver.lua\"").expect("write");
        let manifest = directory_manifest(&root).await.expect("manifest");
        assert!(manifest.settings.squish);
        assert!(matches!(
            manifest.items.last(),
            Some(Entry::Declared(item)) if item.name.as_deref() == Some("driver.lua.squished")
        ));
    }
}
