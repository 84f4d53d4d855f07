//! Lua squishing through the external `squish` tool.
//!
//! Squishing collapses a driver's Lua sources into one file, named by the
//! `squishy` configuration in the source root. The tool is a Lua script run
//! by `luajit`, shipped next to the packager executable.
//!
//! The run blocks until the tool exits. There is no timeout.

mod guard;

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use path_absolutize::Absolutize;
use tokio::process::Command;

pub use guard::EnvironmentGuard;

use crate::error::{PackagerError, Result, SquishError};
use crate::format::STAGING_PREFIX;

/// Default Lua interpreter.
pub const DEFAULT_INTERPRETER: &str = "luajit";

/// File name of the squish script next to the executable.
pub const SQUISH_SCRIPT: &str = "squish";

#[cfg(test)]
pub(crate) static ENVIRONMENT_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

/// An interpreter and squish script pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SquishTool {
    interpreter: PathBuf,
    script: PathBuf,
    search_dir: PathBuf,
}

impl SquishTool {
    /// Use an explicit interpreter and script.
    ///
    /// `search_dir` is prepended to `PATH` while the tool runs. A bare
    /// interpreter name is looked up on that extended `PATH`.
    pub fn new(
        interpreter: impl Into<PathBuf>,
        script: impl Into<PathBuf>,
        search_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            interpreter: interpreter.into(),
            script: script.into(),
            search_dir: search_dir.into(),
        }
    }

    /// `luajit` plus the `squish` script in the running executable's directory.
    pub fn locate() -> Result<Self> {
        let exe = std::env::current_exe().map_err(|e| SquishError::ToolNotFound {
            reason: format!("cannot determine executable path: {}", e),
        })?;
        let exe = exe.canonicalize().unwrap_or(exe);
        let dir = exe
            .parent()
            .ok_or_else(|| SquishError::ToolNotFound {
                reason: format!("{} has no parent directory", exe.display()),
            })?
            .to_path_buf();

        Ok(Self::new(DEFAULT_INTERPRETER, dir.join(SQUISH_SCRIPT), dir))
    }

    /// Arguments passed to the interpreter for squishing `dir`.
    pub fn arguments(&self, dir: &Path, verbose: bool) -> Vec<OsString> {
        let mut args = vec![self.script.clone().into_os_string(), "--no-minify".into()];
        if verbose {
            args.push("--vv".into());
        }
        args.push(dir.as_os_str().to_os_string());
        args
    }

    /// Squish the Lua sources in `dir`.
    ///
    /// Runs with `dir` as the working directory and the tool directory on
    /// `PATH`; both are restored afterwards even when the tool fails.
    pub async fn squish(&self, dir: &Path, verbose: bool) -> Result<()> {
        let dir = dir.absolutize()?.into_owned();
        log::info!("Squishing Lua source in {}", dir.display());

        let _guard = EnvironmentGuard::enter(&dir, &self.search_dir)?;

        let interpreter = which::which(&self.interpreter).map_err(|e| {
            SquishError::ToolNotFound {
                reason: format!(
                    "{} while processing {}: {}",
                    self.interpreter.display(),
                    dir.display(),
                    e
                ),
            }
        })?;
        let args = self.arguments(&dir, verbose);
        let command_line = format!(
            "{} {}",
            interpreter.display(),
            args.iter()
                .map(|a| a.to_string_lossy())
                .collect::<Vec<_>>()
                .join(" ")
        );
        log::info!("Command line: {}", command_line);

        let status = Command::new(&interpreter)
            .args(&args)
            .status()
            .await
            .map_err(|source| SquishError::Launch {
                command: command_line.clone(),
                directory: dir.clone(),
                source,
            })?;

        if !status.success() {
            return Err(PackagerError::Squish(SquishError::Failed {
                status: status.to_string(),
                directory: dir,
            }));
        }
        Ok(())
    }
}

/// Create a fresh `Squished_Lua_*` staging directory under `temp_root`.
///
/// The directory outlives this call; the caller removes it.
pub fn create_staging_dir(temp_root: &Path) -> Result<PathBuf> {
    let dir = tempfile::Builder::new()
        .prefix(STAGING_PREFIX)
        .tempdir_in(temp_root)?
        .keep();
    log::debug!("Created squish staging directory {}", dir.display());
    Ok(dir)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    fn fake_squish(dir: &Path, body: &str) -> PathBuf {
        let script = dir.join("squish");
        std::fs::write(&script, body).expect("write");
        let mut perms = std::fs::metadata(&script).expect("metadata").permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&script, perms).expect("chmod");
        script
    }

    #[test]
    fn test_arguments() {
        let tool = SquishTool::new("luajit", "/opt/squish/squish", "/opt/squish");
        let args = tool.arguments(Path::new("/src"), true);
        assert_eq!(
            args,
            vec![
                OsString::from("/opt/squish/squish"),
                OsString::from("--no-minify"),
                OsString::from("--vv"),
                OsString::from("/src"),
            ]
        );
        assert_eq!(tool.arguments(Path::new("/src"), false).len(), 3);
    }

    #[tokio::test]
    async fn test_squish_runs_in_source_directory() {
        let _lock = ENVIRONMENT_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let tools = tempfile::tempdir().expect("tempdir");
        let source = tempfile::tempdir().expect("tempdir");
        let script = fake_squish(tools.path(), "cat driver.lua > driver.lua.squished\n");
        std::fs::write(source.path().join("driver.lua"), "print('x')\n").expect("write");

        let before = std::env::current_dir().expect("cwd");
        SquishTool::new("sh", script, tools.path())
            .squish(source.path(), false)
            .await
            .expect("squish");

        assert_eq!(std::env::current_dir().expect("cwd"), before);
        assert_eq!(
            std::fs::read_to_string(source.path().join("driver.lua.squished")).expect("read"),
            "print('x')\n"
        );
    }

    #[tokio::test]
    async fn test_failed_squish_restores_environment() {
        let _lock = ENVIRONMENT_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let tools = tempfile::tempdir().expect("tempdir");
        let source = tempfile::tempdir().expect("tempdir");
        let script = fake_squish(tools.path(), "exit 3\n");

        let before_dir = std::env::current_dir().expect("cwd");
        let before_path = std::env::var_os("PATH");
        let err = SquishTool::new("sh", script, tools.path())
            .squish(source.path(), true)
            .await
            .unwrap_err();

        assert!(matches!(err, PackagerError::Squish(SquishError::Failed { .. })));
        assert!(err.to_string().contains("while processing"));
        assert_eq!(std::env::current_dir().expect("cwd"), before_dir);
        assert_eq!(std::env::var_os("PATH"), before_path);
    }

    #[tokio::test]
    async fn test_missing_interpreter() {
        let _lock = ENVIRONMENT_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let source = tempfile::tempdir().expect("tempdir");
        let err = SquishTool::new("no-such-lua-interpreter", "squish", source.path())
            .squish(source.path(), false)
            .await
            .unwrap_err();
        assert!(matches!(err, PackagerError::Squish(SquishError::ToolNotFound { .. })));
        assert!(err.to_string().contains(&source.path().display().to_string()));
    }

    #[test]
    fn test_staging_dir_prefix() {
        let temp = tempfile::tempdir().expect("tempdir");
        let staging = create_staging_dir(temp.path()).expect("staging");
        assert!(staging.is_dir());
        assert!(
            staging
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(STAGING_PREFIX))
        );
    }
}
