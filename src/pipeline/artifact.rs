//! Summary of the produced package.

use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::format::PackageFormat;

/// A package written by a successful build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackagedArtifact {
    /// Output format
    pub format: PackageFormat,
    /// Package file
    pub path: PathBuf,
    /// Size in bytes
    pub size: u64,
    /// SHA-256 checksum, hex encoded
    pub sha256: String,
    /// Directory the package was extracted into, with `--unzip`
    pub extracted_to: Option<PathBuf>,
}

impl PackagedArtifact {
    /// Describe the package at `path`.
    pub async fn describe(format: PackageFormat, path: &Path) -> Result<Self> {
        let size = tokio::fs::metadata(path).await?.len();
        let sha256 = calculate_sha256(path).await?;
        Ok(Self {
            format,
            path: path.to_path_buf(),
            size,
            sha256,
            extracted_to: None,
        })
    }
}

/// Calculates the SHA-256 checksum of a file.
///
/// Reads in 8KB chunks and returns the hex-encoded digest (64 characters).
pub async fn calculate_sha256(path: &Path) -> Result<String> {
    use sha2::{Digest, Sha256};
    use tokio::io::AsyncReadExt;

    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 8192];

    loop {
        let n = file.read(&mut buffer).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_describe_known_digest() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("x.c4z");
        std::fs::write(&path, "abc").expect("write");

        let artifact = PackagedArtifact::describe(PackageFormat::Archive, &path)
            .await
            .expect("describe");
        assert_eq!(artifact.size, 3);
        assert_eq!(
            artifact.sha256,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
