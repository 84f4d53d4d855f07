//! Build state tracking.

use std::fmt;

/// Phase of a packaging build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BuildPhase {
    /// Choosing between an explicit manifest, a project file or none
    LocateManifest,
    /// Parsing the manifest and checking build-wide settings
    Validate,
    /// Running pre-package commands
    Prepackage,
    /// Resolving items and applying descriptor mutations
    ResolveItems,
    /// Stamping and serializing the descriptor
    UpdateDescriptor,
    /// Writing the package archive
    EmitArchive,
    /// Format-specific post-processing
    PostprocessFormat,
    /// Running post-package commands
    Postpackage,
    /// Releasing temporary files
    Cleanup,
    /// Build completed successfully
    Done,
    /// Build failed
    Failed,
}

impl BuildPhase {
    /// True for `Done` and `Failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, BuildPhase::Done | BuildPhase::Failed)
    }
}

impl fmt::Display for BuildPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildPhase::LocateManifest => write!(f, "Locate Manifest"),
            BuildPhase::Validate => write!(f, "Validate"),
            BuildPhase::Prepackage => write!(f, "Prepackage"),
            BuildPhase::ResolveItems => write!(f, "Resolve Items"),
            BuildPhase::UpdateDescriptor => write!(f, "Update Descriptor"),
            BuildPhase::EmitArchive => write!(f, "Emit Archive"),
            BuildPhase::PostprocessFormat => write!(f, "Postprocess Format"),
            BuildPhase::Postpackage => write!(f, "Postpackage"),
            BuildPhase::Cleanup => write!(f, "Cleanup"),
            BuildPhase::Done => write!(f, "Done"),
            BuildPhase::Failed => write!(f, "Failed"),
        }
    }
}

/// Checkpoint reached during a build
#[derive(Debug, Clone)]
pub struct BuildCheckpoint {
    /// Checkpoint name
    pub name: String,
    /// Phase this checkpoint belongs to
    pub phase: BuildPhase,
    /// Timestamp when checkpoint was reached
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// A recoverable problem that did not stop the build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildWarning {
    /// Warning message
    pub message: String,
    /// Phase where it occurred
    pub phase: BuildPhase,
}

/// Progress of a single build
#[derive(Debug, Clone)]
pub struct BuildState {
    /// Current phase
    pub current_phase: BuildPhase,
    /// Timestamp when the build started
    pub started_at: chrono::DateTime<chrono::Utc>,
    /// Timestamp of the last change
    pub updated_at: chrono::DateTime<chrono::Utc>,
    /// Checkpoints passed
    pub checkpoints: Vec<BuildCheckpoint>,
    /// Recoverable problems
    pub warnings: Vec<BuildWarning>,
    /// Phase the build failed in, if it failed
    pub failed_in: Option<BuildPhase>,
}

impl Default for BuildState {
    fn default() -> Self {
        Self::new()
    }
}

impl BuildState {
    /// Create a state at `LocateManifest`
    pub fn new() -> Self {
        let now = chrono::Utc::now();
        Self {
            current_phase: BuildPhase::LocateManifest,
            started_at: now,
            updated_at: now,
            checkpoints: Vec::new(),
            warnings: Vec::new(),
            failed_in: None,
        }
    }

    /// Enter a phase
    pub fn set_phase(&mut self, phase: BuildPhase) {
        log::info!("Phase: {}", phase);
        self.current_phase = phase;
        self.updated_at = chrono::Utc::now();
    }

    /// Record a checkpoint in the current phase
    pub fn add_checkpoint(&mut self, name: impl Into<String>) {
        let name = name.into();
        log::debug!("Checkpoint [{}]: {}", self.current_phase, name);
        self.checkpoints.push(BuildCheckpoint {
            name,
            phase: self.current_phase,
            timestamp: chrono::Utc::now(),
        });
        self.updated_at = chrono::Utc::now();
    }

    /// Record a recoverable problem in the current phase
    pub fn add_warning(&mut self, message: impl Into<String>) {
        let message = message.into();
        log::warn!("{}", message);
        self.warnings.push(BuildWarning {
            message,
            phase: self.current_phase,
        });
        self.updated_at = chrono::Utc::now();
    }

    /// Move to `Failed`, remembering where the failure happened
    pub fn fail(&mut self) {
        if self.failed_in.is_none() {
            self.failed_in = Some(self.current_phase);
        }
        self.set_phase(BuildPhase::Failed);
    }

    /// Check if a phase has recorded a checkpoint
    pub fn has_completed(&self, phase: BuildPhase) -> bool {
        self.checkpoints.iter().any(|cp| cp.phase == phase)
    }

    /// Get elapsed time
    pub fn elapsed_time(&self) -> chrono::Duration {
        self.updated_at - self.started_at
    }

    /// Create a summary of the build state
    pub fn summary(&self) -> String {
        format!(
            "{} - {} checkpoint(s), {} warning(s) - {} elapsed",
            self.current_phase,
            self.checkpoints.len(),
            self.warnings.len(),
            format_duration(self.elapsed_time())
        )
    }
}

fn format_duration(duration: chrono::Duration) -> String {
    let total_ms = duration.num_milliseconds();
    let seconds = total_ms / 1000;
    let minutes = seconds / 60;

    if minutes > 0 {
        format!("{}m {}s", minutes, seconds % 60)
    } else if seconds > 0 {
        format!("{}.{:03}s", seconds, total_ms % 1000)
    } else {
        format!("{}ms", total_ms)
    }
}
