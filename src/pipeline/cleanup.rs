//! Temporary resources held during a build.
//!
//! Everything registered here is released by [`BuildResources::release`] on
//! the normal path, or by `Drop` if a stage returns early.

use std::path::PathBuf;

use crate::error::Result;
use crate::execute::AllowExecuteGuard;

/// Resources a build must give back on every exit path.
#[derive(Debug, Default)]
pub struct BuildResources {
    execute: Option<AllowExecuteGuard>,
    staging: Vec<PathBuf>,
}

impl BuildResources {
    /// Hold the modified `driver.lua` until release.
    pub fn hold_execute(&mut self, guard: AllowExecuteGuard) {
        self.execute = Some(guard);
    }

    /// Remove a squish staging directory on release.
    pub fn hold_staging(&mut self, dir: PathBuf) {
        self.staging.push(dir);
    }

    /// Restore `driver.lua` if it was modified.
    pub async fn restore_script(&mut self) -> Result<()> {
        if let Some(guard) = self.execute.take() {
            guard.restore().await?;
        }
        Ok(())
    }

    /// Release everything.
    pub async fn release(&mut self) -> Result<()> {
        self.restore_script().await?;
        for dir in self.staging.drain(..) {
            crate::archive::fs::remove_dir_all(&dir).await?;
            log::debug!("Removed staging directory {}", dir.display());
        }
        Ok(())
    }
}

impl Drop for BuildResources {
    fn drop(&mut self) {
        for dir in self.staging.drain(..) {
            if dir.exists()
                && let Err(e) = std::fs::remove_dir_all(&dir)
            {
                log::warn!("Unable to remove {}: {}", dir.display(), e);
            }
        }
    }
}
