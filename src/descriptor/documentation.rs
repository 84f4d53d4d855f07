//! Inline documentation from an external text file.
//!
//! A descriptor may point its first `<documentation>` node at a text file via
//! `textfile="..."`. Injection replaces every documentation node with a single
//! node holding that file's contents.

use std::path::{Path, PathBuf};

use super::{BACKUP_SUFFIX, CONFIG_TAG};
use crate::error::Result;
use crate::format::PackageFormat;
use crate::xml::Element;

/// Result of a documentation injection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentationOutcome {
    /// No documentation node references a text file.
    NotRequested,
    /// Documentation was rewritten.
    Injected {
        /// Backup of the descriptor taken before the rewrite
        backup: PathBuf,
        /// Referenced text file that could not be read
        missing_text_file: Option<PathBuf>,
    },
}

/// Rewrite the documentation section of the descriptor at `descriptor_path`.
///
/// The referenced text file is resolved against `source_root`. An unreadable
/// text file is not an error; the new node is left empty.
pub async fn inject_documentation(
    descriptor_path: &Path,
    source_root: &Path,
    format: PackageFormat,
) -> Result<DocumentationOutcome> {
    let mut document = super::load(descriptor_path).await?;

    let Some(config) = document.root_mut().child_mut(CONFIG_TAG) else {
        return Ok(DocumentationOutcome::NotRequested);
    };
    let Some(first) = config.child("documentation") else {
        return Ok(DocumentationOutcome::NotRequested);
    };
    let Some(text_file) = first.attr("textfile").map(str::to_string) else {
        return Ok(DocumentationOutcome::NotRequested);
    };
    let output_file = first.attr("file").map(str::to_string);

    let backup = PathBuf::from(format!("{}{}", descriptor_path.display(), BACKUP_SUFFIX));
    crate::archive::fs::copy_file(descriptor_path, &backup).await?;

    let text_path = source_root.join(&text_file);
    let (text, missing_text_file) = match tokio::fs::read_to_string(&text_path).await {
        Ok(text) => (text, None),
        Err(e) => {
            log::warn!(
                "Unable to find the file '{}' referenced in the 'textfile' attribute of the '<documentation>' element in your driver.xml: {}",
                text_file,
                e
            );
            (String::new(), Some(text_path))
        }
    };

    let removed = config.remove_children_named("documentation");
    let mut documentation = Element::new("documentation");
    if format.keeps_documentation_file() {
        if let Some(file) = output_file {
            documentation.set_attr("file", file);
        }
    }
    documentation.set_text(text);
    config.append_element(documentation);
    log::info!(
        "Replaced {} documentation node(s) with the contents of {}",
        removed,
        text_file
    );

    super::save(descriptor_path, &document).await?;
    Ok(DocumentationOutcome::Injected {
        backup,
        missing_text_file,
    })
}
