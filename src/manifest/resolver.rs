//! Item resolution.
//!
//! Resolution walks the manifest items in document order and checks them
//! against the source tree without changing it. Changes the items imply
//! (documentation injection, squishing) are returned as
//! [`PendingMutation`]s for the caller to apply afterwards, in order.

use std::path::{Component, Path, PathBuf};

use super::{Entry, ItemKind, Manifest};
use crate::archive;
use crate::descriptor::{self, CONFIG_TAG, DESCRIPTOR_FILENAME};
use crate::error::{ManifestError, Result};

/// A directory to package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectorySpec {
    /// Path relative to the source root
    pub name: String,
    /// Include nested directories
    pub recurse: bool,
    /// Package directory to place the contents under
    pub target_subdirectory: Option<String>,
}

/// A file to package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSpec {
    /// Path relative to the source root
    pub name: String,
    /// Package directory to place the file under
    pub target_subdirectory: Option<String>,
}

/// Directories and files that make up a package.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedItemSet {
    /// Directories in document order
    pub directories: Vec<DirectorySpec>,
    /// Files in document order
    pub files: Vec<FileSpec>,
    /// Script marked for encryption by the descriptor
    pub encrypted_script: Option<String>,
}

/// One file in a package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageEntry {
    /// File on disk
    pub source: PathBuf,
    /// `/`-separated path inside the package
    pub archive_path: String,
}

impl ResolvedItemSet {
    /// Expand directories into their files and pair every file with its
    /// path inside the package.
    pub fn entries(&self, root: &Path) -> archive::Result<Vec<PackageEntry>> {
        let mut entries = Vec::new();

        for dir in &self.directories {
            let base = dir.target_subdirectory.as_deref().unwrap_or(&dir.name);
            let dir_path = root.join(&dir.name);
            let max_depth = if dir.recurse { usize::MAX } else { 1 };

            let walker = walkdir::WalkDir::new(&dir_path)
                .min_depth(1)
                .max_depth(max_depth)
                .sort_by_file_name();
            for entry in walker {
                let entry = entry?;
                if !entry.file_type().is_file() {
                    continue;
                }
                let relative = entry.path().strip_prefix(&dir_path)?;
                entries.push(PackageEntry {
                    source: entry.path().to_path_buf(),
                    archive_path: archive_path(base, relative)?,
                });
            }
        }

        for file in &self.files {
            let archive_path = match &file.target_subdirectory {
                Some(target) => {
                    let file_name = Path::new(&file.name)
                        .file_name()
                        .map(Path::new)
                        .unwrap_or_else(|| Path::new(&file.name));
                    archive_path(target, file_name)?
                }
                None => archive_path("", Path::new(&file.name))?,
            };
            entries.push(PackageEntry {
                source: root.join(&file.name),
                archive_path,
            });
        }

        Ok(entries)
    }
}

/// Join `base` and `relative` into a `/`-separated package path.
fn archive_path(base: &str, relative: &Path) -> archive::Result<String> {
    let mut parts: Vec<String> = base
        .split(['/', '\\'])
        .filter(|part| !part.is_empty() && *part != ".")
        .map(str::to_string)
        .collect();

    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(
                part.to_str()
                    .ok_or_else(|| archive::Error::NonUtf8Path(relative.to_path_buf()))?
                    .to_string(),
            ),
            Component::CurDir => {}
            _ => {
                crate::bail!("unsupported package path {}", relative.display());
            }
        }
    }

    Ok(parts.join("/"))
}

/// A change to the source tree implied by the manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingMutation {
    /// Inline the descriptor's referenced documentation text file
    InjectDocumentation {
        /// Descriptor to rewrite
        descriptor: PathBuf,
    },
    /// Squish the Lua sources
    Squish {
        /// Directory to squish
        directory: PathBuf,
        /// Create a staging directory for single-file assembly
        stage: bool,
    },
}

/// Outcome of resolving a manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    /// Resolved items
    pub items: ResolvedItemSet,
    /// Mutations to apply, in order
    pub mutations: Vec<PendingMutation>,
    /// File items produced by a pending mutation, checked after it runs
    pub deferred_checks: Vec<String>,
    /// Squish output file, when squishing is enabled
    pub squish_output: Option<String>,
    /// Recoverable problems
    pub warnings: Vec<String>,
}

impl Resolution {
    /// Confirm that files produced by mutations now exist.
    pub fn verify_deferred(&self, source_root: &Path) -> Result<()> {
        for name in &self.deferred_checks {
            if !source_root.join(name).exists() {
                return Err(ManifestError::FileNotFound {
                    name: name.clone(),
                    root: source_root.to_path_buf(),
                }
                .into());
            }
        }
        Ok(())
    }
}

/// Resolve the manifest items against `source_root`.
///
/// Fails on an item without `type` or `name`, a missing non-excluded item,
/// a malformed descriptor, or a manifest that never declares `driver.xml`.
pub async fn resolve_items(manifest: &Manifest, source_root: &Path) -> Result<Resolution> {
    let settings = &manifest.settings;
    settings.check()?;

    let mut resolution = Resolution::default();
    if settings.squish {
        resolution.squish_output = Some(descriptor::squish_output_filename(source_root).await);
    }
    let mut descriptor_found = false;

    for entry in &manifest.items {
        let decl = match entry {
            Entry::Declared(decl) => decl,
            Entry::Unexpected { tag, expected } => {
                resolution.warnings.push(format!(
                    "Invalid XML: Found tag '{}', should be '{}'",
                    tag, expected
                ));
                continue;
            }
        };

        let item = decl.validate()?;
        if item.excluded {
            log::debug!("Skipping excluded item '{}'", item.name);
            continue;
        }

        match item.kind {
            ItemKind::Directory { recurse } => {
                if !source_root.join(&item.name).is_dir() {
                    return Err(ManifestError::DirectoryNotFound { name: item.name }.into());
                }
                resolution.items.directories.push(DirectorySpec {
                    name: item.name,
                    recurse,
                    target_subdirectory: item.target_subdirectory,
                });
            }
            ItemKind::File => {
                let name = if resolution.items.encrypted_script.is_some() {
                    descriptor::strip_encrypted_suffix(&item.name).to_string()
                } else {
                    item.name.clone()
                };

                if !source_root.join(&name).exists() {
                    if resolution.squish_output.as_deref() == Some(name.as_str()) {
                        log::debug!("'{}' will be produced by squishing", name);
                        resolution.deferred_checks.push(name.clone());
                    } else {
                        return Err(ManifestError::FileNotFound {
                            name,
                            root: source_root.to_path_buf(),
                        }
                        .into());
                    }
                }

                let is_descriptor = name == DESCRIPTOR_FILENAME;
                if is_descriptor {
                    if descriptor_found {
                        resolution.warnings.push(format!(
                            "'{}' is declared more than once",
                            DESCRIPTOR_FILENAME
                        ));
                    } else {
                        descriptor_found = true;
                        inspect_descriptor(source_root, &mut resolution).await?;
                    }
                }

                if is_descriptor && settings.format.embeds_descriptor_bytes() {
                    continue;
                }
                resolution.items.files.push(FileSpec {
                    name,
                    target_subdirectory: item.target_subdirectory,
                });
            }
            ItemKind::Other(kind) => {
                resolution.warnings.push(format!(
                    "Unknown item type '{}' for '{}', skipping",
                    kind, item.name
                ));
            }
        }
    }

    if !descriptor_found {
        return Err(ManifestError::DescriptorNotDeclared.into());
    }
    Ok(resolution)
}

async fn inspect_descriptor(source_root: &Path, resolution: &mut Resolution) -> Result<()> {
    let path = source_root.join(DESCRIPTOR_FILENAME);
    let document = descriptor::load(&path).await?;

    resolution.items.encrypted_script =
        descriptor::encrypted_script_name(&document, resolution.squish_output.as_deref());
    if let Some(script) = &resolution.items.encrypted_script {
        log::info!("Encrypted script detected: {}", script);
    }

    let wants_documentation = document
        .root()
        .child(CONFIG_TAG)
        .and_then(|config| config.child("documentation"))
        .is_some_and(|doc| doc.attr("textfile").is_some());
    if wants_documentation {
        resolution
            .mutations
            .push(PendingMutation::InjectDocumentation { descriptor: path });
    }

    if resolution.squish_output.is_some() {
        resolution.mutations.push(PendingMutation::Squish {
            directory: source_root.to_path_buf(),
            stage: resolution.items.encrypted_script.is_none(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::Document;

    fn manifest(xml: &str) -> Manifest {
        Manifest::from_document(&Document::parse(xml).expect("parse")).expect("manifest")
    }

    fn tree(files: &[(&str, &str)]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().expect("tempdir");
        for (name, contents) in files {
            let path = dir.path().join(name);
            std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
            std::fs::write(path, contents).expect("write");
        }
        dir
    }

    const PLAIN_DESCRIPTOR: &str =
        "<devicedata><config><script file=\"driver.lua\"/></config></devicedata>";
    const ENCRYPTED_DESCRIPTOR: &str =
        "<devicedata><config><script file=\"driver.lua\" encryption=\"2\"/></config></devicedata>";

    #[tokio::test]
    async fn test_excluded_items_never_resolve() {
        let dir = tree(&[("driver.xml", PLAIN_DESCRIPTOR), ("driver.lua", "")]);
        let manifest = manifest(
            r#"<Driver type="c4z" name="T"><Items>
                 <Item type="file" name="driver.xml"/>
                 <Item type="file" name="driver.lua"/>
                 <Item type="file" name="missing.lua" exclude="true"/>
                 <Item type="dir" name="missing_dir" exclude="true"/>
               </Items></Driver>"#,
        );

        let resolution = resolve_items(&manifest, dir.path()).await.expect("resolve");
        let names: Vec<&str> = resolution
            .items
            .files
            .iter()
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(names, vec!["driver.lua"]);
        assert!(resolution.items.directories.is_empty());
        assert!(resolution.mutations.is_empty());
    }

    #[tokio::test]
    async fn test_missing_items_fail() {
        let dir = tree(&[("driver.xml", PLAIN_DESCRIPTOR)]);
        let err = resolve_items(
            &manifest(
                r#"<Driver type="c4z" name="T"><Items><Item type="file" name="nope.lua"/></Items></Driver>"#,
            ),
            dir.path(),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("'nope.lua' does not exist"));

        let err = resolve_items(
            &manifest(
                r#"<Driver type="c4z" name="T"><Items><Item type="dir" name="www"/></Items></Driver>"#,
            ),
            dir.path(),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("'dir' Item 'www'"));
    }

    #[tokio::test]
    async fn test_encrypted_suffix_stripped_only_after_detection() {
        let dir = tree(&[("driver.xml", ENCRYPTED_DESCRIPTOR), ("driver.lua", "")]);
        let resolution = resolve_items(
            &manifest(
                r#"<Driver type="c4z" name="T"><Items>
                     <Item type="file" name="driver.xml"/>
                     <Item type="file" name="driver.lua.encrypted"/>
                   </Items></Driver>"#,
            ),
            dir.path(),
        )
        .await
        .expect("resolve");
        assert_eq!(resolution.items.encrypted_script.as_deref(), Some("driver.lua"));
        assert_eq!(resolution.items.files[0].name, "driver.lua");

        let dir = tree(&[("driver.xml", PLAIN_DESCRIPTOR), ("notes.encrypted", "")]);
        let resolution = resolve_items(
            &manifest(
                r#"<Driver type="c4z" name="T"><Items>
                     <Item type="file" name="driver.xml"/>
                     <Item type="file" name="notes.encrypted"/>
                   </Items></Driver>"#,
            ),
            dir.path(),
        )
        .await
        .expect("resolve");
        assert_eq!(resolution.items.encrypted_script, None);
        assert_eq!(resolution.items.files[0].name, "notes.encrypted");
    }

    #[tokio::test]
    async fn test_suffix_kept_for_items_before_descriptor() {
        let dir = tree(&[("driver.xml", ENCRYPTED_DESCRIPTOR), ("driver.lua.encrypted", "")]);
        let resolution = resolve_items(
            &manifest(
                r#"<Driver type="c4z" name="T"><Items>
                     <Item type="file" name="driver.lua.encrypted"/>
                     <Item type="file" name="driver.xml"/>
                   </Items></Driver>"#,
            ),
            dir.path(),
        )
        .await
        .expect("resolve");
        assert_eq!(resolution.items.files[0].name, "driver.lua.encrypted");
    }

    #[tokio::test]
    async fn test_descriptor_must_be_declared() {
        let dir = tree(&[("driver.lua", "")]);
        let err = resolve_items(
            &manifest(
                r#"<Driver type="c4z" name="T"><Items><Item type="file" name="driver.lua"/></Items></Driver>"#,
            ),
            dir.path(),
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            crate::error::PackagerError::Manifest(ManifestError::DescriptorNotDeclared)
        ));
    }

    #[tokio::test]
    async fn test_descriptor_listed_only_for_single_file() {
        let dir = tree(&[("driver.xml", PLAIN_DESCRIPTOR), ("driver.lua", "")]);
        let resolution = resolve_items(
            &manifest(
                r#"<Driver type="c4i" name="T" squishLua="true"><Items>
                     <Item type="file" name="driver.xml"/>
                     <Item type="file" name="driver.lua.squished"/>
                     <Bogus/>
                   </Items></Driver>"#,
            ),
            dir.path(),
        )
        .await
        .expect("resolve");

        let names: Vec<&str> = resolution
            .items
            .files
            .iter()
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(names, vec!["driver.xml", "driver.lua.squished"]);
        assert_eq!(resolution.deferred_checks, vec!["driver.lua.squished".to_string()]);
        assert_eq!(
            resolution.mutations,
            vec![PendingMutation::Squish {
                directory: dir.path().to_path_buf(),
                stage: true,
            }]
        );
        assert_eq!(resolution.warnings.len(), 1);
        assert!(resolution.verify_deferred(dir.path()).is_err());
    }

    #[tokio::test]
    async fn test_documentation_mutation_recorded_without_writing() {
        let descriptor =
            r#"<devicedata><config><documentation textfile="doc.txt"/></config></devicedata>"#;
        let dir = tree(&[("driver.xml", descriptor), ("doc.txt", "hello")]);
        let resolution = resolve_items(
            &manifest(
                r#"<Driver type="c4z" name="T"><Items><Item type="file" name="driver.xml"/></Items></Driver>"#,
            ),
            dir.path(),
        )
        .await
        .expect("resolve");

        assert_eq!(
            resolution.mutations,
            vec![PendingMutation::InjectDocumentation {
                descriptor: dir.path().join("driver.xml"),
            }]
        );
        assert_eq!(
            std::fs::read_to_string(dir.path().join("driver.xml")).expect("read"),
            descriptor
        );
        assert!(!dir.path().join("driver.xml.bak").exists());
    }

    #[test]
    fn test_entries_recurse_and_remap() {
        let dir = tree(&[
            ("www/index.html", ""),
            ("www/css/site.css", ""),
            ("www/css/fonts/a.woff", ""),
            ("lib/json.lua", ""),
        ]);

        let mut items = ResolvedItemSet {
            directories: vec![DirectorySpec {
                name: "www".into(),
                recurse: true,
                target_subdirectory: None,
            }],
            files: vec![FileSpec {
                name: "lib/json.lua".into(),
                target_subdirectory: Some("common".into()),
            }],
            encrypted_script: None,
        };

        let paths: Vec<String> = items
            .entries(dir.path())
            .expect("entries")
            .into_iter()
            .map(|e| e.archive_path)
            .collect();
        assert_eq!(
            paths,
            vec![
                "www/css/fonts/a.woff",
                "www/css/site.css",
                "www/index.html",
                "common/json.lua"
            ]
        );

        items.directories[0].recurse = false;
        items.directories[0].target_subdirectory = Some("web".into());
        let paths: Vec<String> = items
            .entries(dir.path())
            .expect("entries")
            .into_iter()
            .map(|e| e.archive_path)
            .collect();
        assert_eq!(paths, vec!["web/index.html", "common/json.lua"]);
    }
}
