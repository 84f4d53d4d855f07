//! File system utilities for packaging.
//!
//! Thin async wrappers that attach the offending path to every failure.

use crate::archive::error::{Error, ErrorExt, Result};
use std::path::Path;
use tokio::fs;

/// Creates all of the directories of the specified path.
pub async fn create_dir_all(path: &Path) -> Result<()> {
    fs::create_dir_all(path)
        .await
        .fs_context("creating directory", path)
}

/// Removes the directory and its contents if it exists.
pub async fn remove_dir_all(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_dir_all(path)
            .await
            .fs_context("removing directory", path)
    } else {
        Ok(())
    }
}

/// Removes a file if it exists.
pub async fn remove_file(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_file(path).await.fs_context("removing file", path)
    } else {
        Ok(())
    }
}

/// Copies a regular file from one path to another, creating any parent
/// directories of the destination path as necessary.
///
/// Fails if the source path is a directory or doesn't exist.
pub async fn copy_file(from: &Path, to: &Path) -> Result<()> {
    if !from.exists() {
        return Err(Error::GenericError(format!("{from:?} does not exist")));
    }
    if !from.is_file() {
        return Err(Error::GenericError(format!("{from:?} is not a file")));
    }
    if let Some(dest_dir) = to.parent() {
        fs::create_dir_all(dest_dir)
            .await
            .fs_context("creating directory", dest_dir)?;
    }
    fs::copy(from, to).await.fs_context("copying file", from)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_copy_file_creates_parents() {
        let dir = tempfile::tempdir().expect("tempdir");
        let from = dir.path().join("driver.xml");
        std::fs::write(&from, "<devicedata/>").expect("write");

        let to = dir.path().join("nested/backup/driver.xml.bak");
        copy_file(&from, &to).await.expect("copy");
        assert_eq!(std::fs::read_to_string(to).expect("read"), "<devicedata/>");
    }

    #[tokio::test]
    async fn test_copy_missing_file_fails() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = copy_file(&dir.path().join("nope"), &dir.path().join("out"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[tokio::test]
    async fn test_removals_are_idempotent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let sub = dir.path().join("extracted");
        create_dir_all(&sub).await.expect("create");
        create_dir_all(&sub).await.expect("create again");
        std::fs::write(sub.join("stale.txt"), "x").expect("write");

        remove_dir_all(&sub).await.expect("remove");
        assert!(!sub.exists());
        remove_dir_all(&sub).await.expect("remove again");
        remove_file(&dir.path().join("missing")).await.expect("no-op");
    }
}
