//! RAII guard for the process environment around a squish run.
//!
//! The squish tool expects to run from the directory it squishes and to find
//! its helpers on `PATH`. Both are process-wide, so the guard records them on
//! entry and puts them back when dropped, whichever way the run ends.

use std::env;
use std::ffi::{OsStr, OsString};
use std::io;
use std::path::{Path, PathBuf};

/// Restores the working directory and `PATH` when dropped.
#[derive(Debug)]
pub struct EnvironmentGuard {
    working_dir: PathBuf,
    search_path: Option<OsString>,
}

impl EnvironmentGuard {
    /// Switch to `dir` with `search_dir` prepended to `PATH`.
    pub fn enter(dir: &Path, search_dir: &Path) -> io::Result<Self> {
        let guard = Self {
            working_dir: env::current_dir()?,
            search_path: env::var_os("PATH"),
        };

        let mut paths = vec![search_dir.to_path_buf()];
        if let Some(current) = &guard.search_path {
            paths.extend(env::split_paths(current));
        }
        let joined = env::join_paths(paths).map_err(io::Error::other)?;
        set_search_path(Some(&joined));

        env::set_current_dir(dir)?;
        log::debug!("Squish environment: cwd={} PATH={:?}", dir.display(), joined);
        Ok(guard)
    }
}

impl Drop for EnvironmentGuard {
    fn drop(&mut self) {
        set_search_path(self.search_path.as_deref());
        if let Err(e) = env::set_current_dir(&self.working_dir) {
            log::warn!(
                "Failed to restore working directory {}: {}",
                self.working_dir.display(),
                e
            );
        }
    }
}

#[allow(unsafe_code)]
fn set_search_path(value: Option<&OsStr>) {
    // SAFETY: a build runs its stages in sequence on one thread and spawns
    // no other process while a squish is running. Tests that touch PATH or
    // spawn processes serialize on ENVIRONMENT_LOCK.
    unsafe {
        match value {
            Some(value) => env::set_var("PATH", value),
            None => env::remove_var("PATH"),
        }
    }
}
