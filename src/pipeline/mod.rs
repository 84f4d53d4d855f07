//! Packaging pipeline.
//!
//! [`Packager`] drives one build through its phases:
//!
//! `LocateManifest → Validate → Prepackage → ResolveItems → UpdateDescriptor →
//! EmitArchive → PostprocessFormat → Postpackage → Cleanup → Done`
//!
//! A fatal error in any phase releases the build's temporary resources and
//! ends the build in `Failed`. Stages never overlap.

mod artifact;
mod cleanup;
mod locate;

pub use artifact::{PackagedArtifact, calculate_sha256};
pub use cleanup::BuildResources;
pub use locate::{ManifestSource, directory_manifest, locate_manifest};

use crate::BuildConfig;
use crate::archive::{self, ArchiveEmitter, Context, EmitRequest, ZipEmitter};
use crate::descriptor::{self, DESCRIPTOR_FILENAME, DocumentationOutcome};
use crate::error::{ManifestError, Result};
use crate::execute::AllowExecuteGuard;
use crate::format::{PackageFormat, SingleFileAssembly};
use crate::manifest::{
    BuildSettings, Entry, Manifest, PendingMutation, Resolution, resolve_items,
};
use crate::shell;
use crate::squish::{self, SquishTool};
use crate::state::{BuildPhase, BuildState};

/// Builds one driver package.
#[derive(Debug)]
pub struct Packager<E = ZipEmitter> {
    config: BuildConfig,
    emitter: E,
    squish_tool: Option<SquishTool>,
    state: BuildState,
}

impl Packager<ZipEmitter> {
    /// Packager writing zip archives.
    pub fn new(config: BuildConfig) -> Self {
        Self::with_emitter(config, ZipEmitter)
    }
}

impl<E: ArchiveEmitter> Packager<E> {
    /// Packager using a custom archive emitter.
    pub fn with_emitter(config: BuildConfig, emitter: E) -> Self {
        Self {
            config,
            emitter,
            squish_tool: None,
            state: BuildState::new(),
        }
    }

    /// Use `tool` instead of locating `luajit` and `squish` at run time.
    pub fn with_squish_tool(mut self, tool: SquishTool) -> Self {
        self.squish_tool = Some(tool);
        self
    }

    /// Build configuration.
    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// State of the current or last build.
    pub fn state(&self) -> &BuildState {
        &self.state
    }

    /// Run the build.
    pub async fn run(&mut self) -> Result<PackagedArtifact> {
        self.state = BuildState::new();
        let mut resources = BuildResources::default();

        match self.build(&mut resources).await {
            Ok(artifact) => {
                self.state.set_phase(BuildPhase::Cleanup);
                if let Err(e) = resources.release().await {
                    self.state.fail();
                    return Err(e);
                }
                self.state.add_checkpoint("temporary files released");
                self.state.set_phase(BuildPhase::Done);
                log::info!("{}", self.state.summary());
                Ok(artifact)
            }
            Err(e) => {
                log::error!("Build failed in {}: {}", self.state.current_phase, e);
                if let Err(cleanup) = resources.release().await {
                    log::warn!("Cleanup after failure was incomplete: {}", cleanup);
                }
                self.state.fail();
                Err(e)
            }
        }
    }

    async fn build(&mut self, resources: &mut BuildResources) -> Result<PackagedArtifact> {
        self.state.set_phase(BuildPhase::LocateManifest);
        let source = locate_manifest(&self.config).await?;
        self.state.add_checkpoint(format!("{:?}", source));

        self.state.set_phase(BuildPhase::Validate);
        let manifest = match &source {
            ManifestSource::Explicit(path) | ManifestSource::ProjectFile(path) => {
                log::info!("Building driver from manifest {}...", path.display());
                Manifest::load(path).await?
            }
            ManifestSource::Directory => directory_manifest(&self.config.source_root).await?,
        };
        let settings = manifest.settings.clone();
        settings.check()?;
        self.state.add_checkpoint(format!(
            "{} '{}' (squish: {})",
            settings.format, settings.name, settings.squish
        ));

        self.state.set_phase(BuildPhase::Prepackage);
        self.run_commands(&manifest.prepackage_commands, "prepackage").await;

        self.state.set_phase(BuildPhase::ResolveItems);
        if self.config.allow_execute {
            resources.hold_execute(AllowExecuteGuard::enable(&self.config.source_root).await?);
        }
        let resolution = resolve_items(&manifest, &self.config.source_root).await?;
        for warning in &resolution.warnings {
            self.state.add_warning(warning.clone());
        }
        self.apply_mutations(&resolution, &settings, resources).await?;
        resolution.verify_deferred(&self.config.source_root)?;
        self.state.add_checkpoint(format!(
            "{} director(ies), {} file(s)",
            resolution.items.directories.len(),
            resolution.items.files.len()
        ));

        self.state.set_phase(BuildPhase::UpdateDescriptor);
        let update = self.config.descriptor_update();
        let descriptor_bytes = update
            .render(&self.config.source_root.join(DESCRIPTOR_FILENAME))
            .await?;
        let descriptor_override = settings
            .format
            .embeds_descriptor_bytes()
            .then_some(descriptor_bytes);

        self.state.set_phase(BuildPhase::EmitArchive);
        let destination = self
            .config
            .destination_root
            .join(settings.package_filename());
        self.emitter
            .emit(EmitRequest {
                destination: destination.clone(),
                root: self.config.source_root.clone(),
                items: resolution.items.clone(),
                descriptor: descriptor_override,
            })
            .await
            .with_context(|| format!("Building {} failed", settings.package_filename()))?;
        resources.restore_script().await?;
        self.state.add_checkpoint(destination.display().to_string());

        self.state.set_phase(BuildPhase::PostprocessFormat);
        let extracted_to = match settings.format {
            PackageFormat::Archive if self.config.unzip => {
                Some(archive::extract_beside(&destination).await?)
            }
            PackageFormat::Archive => None,
            PackageFormat::SingleFile => {
                if resolution.items.encrypted_script.is_some() {
                    archive::fs::remove_file(&destination).await?;
                    return Err(ManifestError::EncryptionNotSupported.into());
                }
                let squish_output = resolution
                    .squish_output
                    .as_deref()
                    .unwrap_or(descriptor::script::DEFAULT_SQUISH_OUTPUT);
                let staging = SingleFileAssembly {
                    source_root: &self.config.source_root,
                    temp_root: &self.config.temp_root,
                    squish_output,
                    update: &update,
                }
                .assemble(&destination)
                .await?;
                resources.hold_staging(staging);
                None
            }
        };

        self.state.set_phase(BuildPhase::Postpackage);
        self.run_commands(&manifest.postpackage_commands, "postpackage").await;

        let mut artifact = PackagedArtifact::describe(settings.format, &destination).await?;
        artifact.extracted_to = extracted_to;
        Ok(artifact)
    }

    async fn run_commands(&mut self, commands: &[Entry<String>], kind: &str) {
        for command in commands {
            match command {
                Entry::Declared(command) => {
                    if let Err(e) = shell::run_command(command, &self.config.source_root).await {
                        self.state
                            .add_warning(format!("Failed to execute {} command: {}", kind, e));
                    }
                }
                Entry::Unexpected { tag, expected } => {
                    self.state.add_warning(format!(
                        "Invalid XML: Found tag '{}', should be '{}'",
                        tag, expected
                    ));
                }
            }
        }
    }

    async fn apply_mutations(
        &mut self,
        resolution: &Resolution,
        settings: &BuildSettings,
        resources: &mut BuildResources,
    ) -> Result<()> {
        for mutation in &resolution.mutations {
            match mutation {
                PendingMutation::InjectDocumentation { descriptor: path } => {
                    let outcome = descriptor::inject_documentation(
                        path,
                        &self.config.source_root,
                        settings.format,
                    )
                    .await?;
                    if let DocumentationOutcome::Injected {
                        backup,
                        missing_text_file,
                    } = outcome
                    {
                        if let Some(missing) = missing_text_file {
                            self.state.add_warning(format!(
                                "Documentation text file {} not found; documentation left empty",
                                missing.display()
                            ));
                        }
                        self.state.add_checkpoint(format!(
                            "documentation injected, backup {}",
                            backup.display()
                        ));
                    }
                }
                PendingMutation::Squish { directory, stage } => {
                    let tool = match &self.squish_tool {
                        Some(tool) => tool.clone(),
                        None => SquishTool::locate()?,
                    };
                    tool.squish(directory, self.config.verbose).await?;
                    if *stage {
                        resources.hold_staging(squish::create_staging_dir(&self.config.temp_root)?);
                    }
                    self.state.add_checkpoint(format!("squished {}", directory.display()));
                }
            }
        }
        Ok(())
    }
}
