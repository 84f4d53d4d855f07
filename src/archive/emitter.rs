//! Archive emitters.

use std::collections::HashSet;
use std::fs::File;
use std::future::Future;
use std::io::{self, Write};
use std::path::PathBuf;

use zip::CompressionMethod;
use zip::write::{SimpleFileOptions, ZipWriter};

use super::DESCRIPTOR_ENTRY;
use super::error::{Error, ErrorExt, Result};
use crate::manifest::ResolvedItemSet;

/// Everything an emitter needs to write one package.
#[derive(Debug, Clone)]
pub struct EmitRequest {
    /// Archive file to create
    pub destination: PathBuf,
    /// Source root item names are relative to
    pub root: PathBuf,
    /// Resolved directories and files
    pub items: ResolvedItemSet,
    /// Serialized descriptor that replaces the on-disk `driver.xml`
    pub descriptor: Option<Vec<u8>>,
}

/// Writes a resolved item set to a package file.
pub trait ArchiveEmitter {
    /// Write the archive described by `request`.
    fn emit(&self, request: EmitRequest) -> impl Future<Output = Result<()>> + Send;
}

/// Writes deflated zip archives.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipEmitter;

impl ArchiveEmitter for ZipEmitter {
    async fn emit(&self, request: EmitRequest) -> Result<()> {
        tokio::task::spawn_blocking(move || write_zip(&request))
            .await
            .map_err(|e| Error::GenericError(format!("Archive task failed: {}", e)))?
    }
}

fn write_zip(request: &EmitRequest) -> Result<()> {
    let entries = request.items.entries(&request.root)?;

    if let Some(script) = &request.items.encrypted_script {
        log::info!(
            "Script '{}' is marked for encryption; packaging plaintext, encryption is left to the Control4 tool chain",
            script
        );
    }

    if let Some(parent) = request.destination.parent() {
        std::fs::create_dir_all(parent).fs_context("creating package directory", parent)?;
    }
    let file = File::create(&request.destination)
        .fs_context("creating package", &request.destination)?;
    let mut writer = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut written = HashSet::new();
    if let Some(descriptor) = &request.descriptor {
        writer.start_file(DESCRIPTOR_ENTRY, options)?;
        writer.write_all(descriptor)?;
        written.insert(DESCRIPTOR_ENTRY.to_string());
        log::debug!("Added {} from updated descriptor", DESCRIPTOR_ENTRY);
    }

    for entry in entries {
        if !written.insert(entry.archive_path.clone()) {
            log::warn!(
                "Skipping duplicate archive entry '{}' from {}",
                entry.archive_path,
                entry.source.display()
            );
            continue;
        }

        let mut source =
            File::open(&entry.source).fs_context("opening package entry", &entry.source)?;
        writer.start_file(entry.archive_path.as_str(), options)?;
        io::copy(&mut source, &mut writer).fs_context("reading package entry", &entry.source)?;
        log::debug!("Added {}", entry.archive_path);
    }

    let mut file = writer.finish()?;
    file.flush()
        .fs_context("writing package", &request.destination)?;
    Ok(())
}
