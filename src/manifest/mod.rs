//! Manifest (`.c4zproj`) model and parsing.
//!
//! A manifest is a `<Driver>` document naming the package, its output type,
//! whether Lua should be squished, the files and directories to package and
//! any shell commands to run before and after packaging:
//!
//! ```xml
//! <Driver type="c4z" name="MyDriver" squishLua="false">
//!   <PrepackageCommands>
//!     <PrepackageCommand>scripts/generate.sh</PrepackageCommand>
//!   </PrepackageCommands>
//!   <Items>
//!     <Item type="dir" name="www" recurse="true" c4zDir="www"/>
//!     <Item type="file" name="driver.xml"/>
//!     <Item type="file" name="driver.lua"/>
//!   </Items>
//! </Driver>
//! ```
//!
//! Parsing validates the header eagerly. Items are kept as raw
//! declarations and validated by the [`resolver`] in document order.

pub mod resolver;

use std::path::Path;

use crate::error::{ManifestError, PackagerError, Result};
use crate::format::PackageFormat;
use crate::xml::{Document, Element};

pub use resolver::{
    DirectorySpec, FileSpec, PackageEntry, PendingMutation, Resolution, ResolvedItemSet,
    resolve_items,
};

/// Root tag of a manifest document.
pub const MANIFEST_ROOT_TAG: &str = "Driver";

/// Extension of project files that double as manifests.
pub const PROJECT_FILE_EXTENSION: &str = "c4zproj";

/// A child of a manifest list section, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry<T> {
    /// A child with the expected tag.
    Declared(T),
    /// A child with some other tag; skipped with a warning.
    Unexpected {
        /// Tag that was found
        tag: String,
        /// Tag that was expected
        expected: &'static str,
    },
}

/// An `<Item>` exactly as written in the manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemDecl {
    /// `type` attribute
    pub kind: Option<String>,
    /// `name` attribute
    pub name: Option<String>,
    /// `exclude="true"`
    pub exclude: bool,
    /// `recurse="true"`
    pub recurse: bool,
    /// `c4zDir` attribute
    pub target_subdirectory: Option<String>,
}

/// What an item refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemKind {
    /// `type="dir"`
    Directory {
        /// Include nested directories
        recurse: bool,
    },
    /// `type="file"`
    File,
    /// Any other type; skipped with a warning.
    Other(String),
}

/// A validated item declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    /// Item kind
    pub kind: ItemKind,
    /// Path relative to the source root
    pub name: String,
    /// Item is declared but not packaged
    pub excluded: bool,
    /// Directory inside the package to place the item under
    pub target_subdirectory: Option<String>,
}

impl ItemDecl {
    fn from_element(element: &Element) -> Self {
        Self {
            kind: element.attr("type").map(str::to_string),
            name: element.attr("name").map(str::to_string),
            exclude: is_true(element.attr("exclude")),
            recurse: is_true(element.attr("recurse")),
            target_subdirectory: element
                .attr("c4zDir")
                .filter(|dir| !dir.is_empty())
                .map(str::to_string),
        }
    }

    /// Declare a plain file item.
    pub fn file(name: impl Into<String>) -> Self {
        Self {
            kind: Some("file".to_string()),
            name: Some(name.into()),
            ..Default::default()
        }
    }

    /// Check the mandatory attributes and classify the item.
    pub fn validate(&self) -> std::result::Result<Item, ManifestError> {
        let kind = self
            .kind
            .as_deref()
            .ok_or(ManifestError::MissingItemAttribute { attribute: "type" })?;
        let name = self
            .name
            .clone()
            .ok_or(ManifestError::MissingItemAttribute { attribute: "name" })?;

        let kind = match kind {
            "dir" => ItemKind::Directory {
                recurse: self.recurse,
            },
            "file" => ItemKind::File,
            other => ItemKind::Other(other.to_string()),
        };

        Ok(Item {
            kind,
            name,
            excluded: self.exclude,
            target_subdirectory: self.target_subdirectory.clone(),
        })
    }
}

/// Build-wide settings taken from the manifest header.
///
/// Resolved once before any item is processed and passed by reference to
/// every stage that needs them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSettings {
    /// Output format
    pub format: PackageFormat,
    /// Package base name
    pub name: String,
    /// Squish Lua sources into one file
    pub squish: bool,
}

impl BuildSettings {
    /// File name of the produced package, e.g. `MyDriver.c4z`.
    pub fn package_filename(&self) -> String {
        format!("{}.{}", self.name, self.format.extension())
    }

    /// Reject format and squish combinations that cannot be built.
    pub fn check(&self) -> std::result::Result<(), ManifestError> {
        if self.format.requires_squish() && !self.squish {
            return Err(ManifestError::SquishRequired);
        }
        Ok(())
    }
}

/// A parsed manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    /// Header settings
    pub settings: BuildSettings,
    /// Commands run before items are resolved
    pub prepackage_commands: Vec<Entry<String>>,
    /// Item declarations in document order
    pub items: Vec<Entry<ItemDecl>>,
    /// Commands run after the package is written
    pub postpackage_commands: Vec<Entry<String>>,
}

impl Manifest {
    /// Read and parse a manifest file.
    pub async fn load(path: &Path) -> Result<Self> {
        let xml = tokio::fs::read_to_string(path).await?;
        let document = Document::parse(&xml).map_err(|e| PackagerError::xml(path, e))?;
        Ok(Self::from_document(&document)?)
    }

    /// Validate a parsed manifest document.
    ///
    /// Fails on a wrong root tag, a missing `type` or `name`, an unsupported
    /// `type`, or a missing `<Items>` section.
    pub fn from_document(document: &Document) -> std::result::Result<Self, ManifestError> {
        let root = document.root();
        if root.name != MANIFEST_ROOT_TAG {
            return Err(ManifestError::InvalidRoot {
                found: root.name.clone(),
            });
        }

        let format = root
            .attr("type")
            .ok_or(ManifestError::MissingAttribute { attribute: "type" })?;
        let name = root
            .attr("name")
            .ok_or(ManifestError::MissingAttribute { attribute: "name" })?;
        let format = PackageFormat::from_type(format)?;

        let items = root
            .child("Items")
            .ok_or(ManifestError::MissingItems)?
            .elements()
            .map(|element| {
                if element.name == "Item" {
                    Entry::Declared(ItemDecl::from_element(element))
                } else {
                    Entry::Unexpected {
                        tag: element.name.clone(),
                        expected: "Item",
                    }
                }
            })
            .collect();

        Ok(Self {
            settings: BuildSettings {
                format,
                name: name.to_string(),
                squish: is_true(root.attr("squishLua")),
            },
            prepackage_commands: commands(root, "PrepackageCommands", "PrepackageCommand"),
            items,
            postpackage_commands: commands(root, "PostpackageCommands", "PostpackageCommand"),
        })
    }

    /// Manifest for a source directory that has none: every listed file is
    /// packaged into an archive named after the directory.
    pub fn for_directory(name: impl Into<String>, squish: bool, files: Vec<String>) -> Self {
        Self {
            settings: BuildSettings {
                format: PackageFormat::Archive,
                name: name.into(),
                squish,
            },
            prepackage_commands: Vec::new(),
            items: files
                .into_iter()
                .map(|file| Entry::Declared(ItemDecl::file(file)))
                .collect(),
            postpackage_commands: Vec::new(),
        }
    }
}

fn commands(root: &Element, section: &str, tag: &'static str) -> Vec<Entry<String>> {
    let Some(section) = root.child(section) else {
        return Vec::new();
    };
    section
        .elements()
        .map(|element| {
            if element.name == tag {
                Entry::Declared(element.text())
            } else {
                Entry::Unexpected {
                    tag: element.name.clone(),
                    expected: tag,
                }
            }
        })
        .collect()
}

fn is_true(value: Option<&str>) -> bool {
    value == Some("true")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(xml: &str) -> std::result::Result<Manifest, ManifestError> {
        Manifest::from_document(&Document::parse(xml).expect("well-formed"))
    }

    #[test]
    fn test_parse_full_manifest() {
        let manifest = parse(
            r#"<Driver type="c4z" name="Lights" squishLua="true">
                 <PrepackageCommands>
                   <PrepackageCommand>echo before</PrepackageCommand>
                   <Bogus/>
                 </PrepackageCommands>
                 <Items>
                   <Item type="dir" name="www" recurse="true" c4zDir="web"/>
                   <Item type="file" name="driver.xml"/>
                   <Item type="file" name="notes.txt" exclude="true"/>
                   <Thing/>
                 </Items>
                 <PostpackageCommands>
                   <PostpackageCommand>echo after</PostpackageCommand>
                 </PostpackageCommands>
               </Driver>"#,
        )
        .expect("valid manifest");

        assert_eq!(manifest.settings.format, PackageFormat::Archive);
        assert_eq!(manifest.settings.name, "Lights");
        assert!(manifest.settings.squish);
        assert_eq!(manifest.settings.package_filename(), "Lights.c4z");

        assert_eq!(manifest.prepackage_commands.len(), 2);
        assert_eq!(
            manifest.prepackage_commands[0],
            Entry::Declared("echo before".to_string())
        );
        assert!(matches!(
            manifest.prepackage_commands[1],
            Entry::Unexpected { ref tag, .. } if tag == "Bogus"
        ));

        assert_eq!(manifest.items.len(), 4);
        let Entry::Declared(dir) = &manifest.items[0] else {
            panic!("expected item");
        };
        assert_eq!(dir.target_subdirectory.as_deref(), Some("web"));
        assert!(dir.recurse);
        let Entry::Declared(excluded) = &manifest.items[2] else {
            panic!("expected item");
        };
        assert!(excluded.exclude);
        assert!(matches!(manifest.items[3], Entry::Unexpected { .. }));
        assert_eq!(manifest.postpackage_commands.len(), 1);
    }

    #[test]
    fn test_missing_type_or_name_is_fatal() {
        assert!(matches!(
            parse(r#"<Driver name="x"><Items/></Driver>"#),
            Err(ManifestError::MissingAttribute { attribute: "type" })
        ));
        assert!(matches!(
            parse(r#"<Driver type="c4z"><Items/></Driver>"#),
            Err(ManifestError::MissingAttribute { attribute: "name" })
        ));
    }

    #[test]
    fn test_wrong_root_and_missing_items() {
        assert!(matches!(
            parse(r#"<Package type="c4z" name="x"/>"#),
            Err(ManifestError::InvalidRoot { .. })
        ));
        assert!(matches!(
            parse(r#"<Driver type="c4z" name="x"/>"#),
            Err(ManifestError::MissingItems)
        ));
        assert!(matches!(
            parse(r#"<Driver type="zip" name="x"><Items/></Driver>"#),
            Err(ManifestError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn test_squish_defaults_to_false() {
        let manifest = parse(r#"<Driver type="c4i" name="x" squishLua="yes"><Items/></Driver>"#)
            .expect("valid");
        assert!(!manifest.settings.squish);
        assert_eq!(manifest.settings.package_filename(), "x.c4i");
        assert!(matches!(
            manifest.settings.check(),
            Err(ManifestError::SquishRequired)
        ));
    }

    #[test]
    fn test_item_validation() {
        let missing_type = ItemDecl {
            name: Some("a".into()),
            ..Default::default()
        };
        assert!(matches!(
            missing_type.validate(),
            Err(ManifestError::MissingItemAttribute { attribute: "type" })
        ));

        let missing_name = ItemDecl {
            kind: Some("file".into()),
            ..Default::default()
        };
        assert!(matches!(
            missing_name.validate(),
            Err(ManifestError::MissingItemAttribute { attribute: "name" })
        ));

        let dir = ItemDecl {
            kind: Some("dir".into()),
            name: Some("www".into()),
            ..Default::default()
        };
        assert_eq!(
            dir.validate().expect("valid").kind,
            ItemKind::Directory { recurse: false }
        );
    }
}
