//! Post-build extraction of archive packages.

use std::fs::File;
use std::path::{Path, PathBuf};

use super::error::{Error, ErrorExt, Result};

/// Unpack `archive` into a sibling directory named after it without its
/// extension, replacing any previous extraction.
///
/// Returns the extraction directory.
pub async fn extract_beside(archive: &Path) -> Result<PathBuf> {
    let target = archive.with_extension("");
    super::fs::remove_dir_all(&target).await?;

    let source = archive.to_path_buf();
    let destination = target.clone();
    tokio::task::spawn_blocking(move || -> Result<()> {
        let file = File::open(&source).fs_context("opening package", &source)?;
        let mut zip = zip::ZipArchive::new(file)?;
        zip.extract(&destination)?;
        Ok(())
    })
    .await
    .map_err(|e| Error::GenericError(format!("Extraction task failed: {}", e)))??;

    log::info!("Extracted {} to {}", archive.display(), target.display());
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::{SimpleFileOptions, ZipWriter};

    #[tokio::test]
    async fn test_extract_replaces_previous_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let archive = dir.path().join("Lights.c4z");

        let mut writer = ZipWriter::new(File::create(&archive).expect("create"));
        writer
            .start_file("driver.xml", SimpleFileOptions::default())
            .expect("start");
        writer.write_all(b"<devicedata/>").expect("write");
        writer.finish().expect("finish");

        let stale = dir.path().join("Lights/stale.txt");
        std::fs::create_dir_all(stale.parent().expect("parent")).expect("mkdir");
        std::fs::write(&stale, "old").expect("write");

        let target = extract_beside(&archive).await.expect("extract");
        assert_eq!(target, dir.path().join("Lights"));
        assert!(target.join("driver.xml").is_file());
        assert!(!stale.exists());
    }
}
