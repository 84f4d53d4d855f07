//! Development builds that allow Lua command-window execution.
//!
//! `--allowexecute` appends two statements to `driver.lua` for the duration
//! of the build. The original file is kept as `driver.lua.tmp` and copied back
//! when the guard is restored or dropped.

use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;

use crate::error::Result;

/// Lua entry point in the source root.
pub const DRIVER_SCRIPT: &str = "driver.lua";

/// Backup of the entry point while it is modified.
pub const DRIVER_SCRIPT_BACKUP: &str = "driver.lua.tmp";

const ALLOW_EXECUTE_LINES: &str =
    "\nC4:AllowExecute(true)\n\ngIsDevelopmentVersionOfDriver = true\n";

/// Holds the modified `driver.lua` until restored.
#[derive(Debug)]
pub struct AllowExecuteGuard {
    script: PathBuf,
    backup: PathBuf,
    restored: bool,
}

impl AllowExecuteGuard {
    /// Back up `driver.lua` in `source_root` and enable execution in it.
    pub async fn enable(source_root: &Path) -> Result<Self> {
        let script = source_root.join(DRIVER_SCRIPT);
        let backup = source_root.join(DRIVER_SCRIPT_BACKUP);

        tokio::fs::copy(&script, &backup).await?;
        let guard = Self {
            script,
            backup,
            restored: false,
        };

        log::info!("C4:AllowExecute(true) being added to {}", guard.script.display());
        let mut file = tokio::fs::OpenOptions::new()
            .append(true)
            .open(&guard.script)
            .await?;
        file.write_all(ALLOW_EXECUTE_LINES.as_bytes()).await?;
        file.flush().await?;

        Ok(guard)
    }

    /// Put the original `driver.lua` back and remove the backup.
    pub async fn restore(mut self) -> Result<()> {
        self.restored = true;
        tokio::fs::copy(&self.backup, &self.script).await?;
        tokio::fs::remove_file(&self.backup).await?;
        log::debug!("Restored {}", self.script.display());
        Ok(())
    }
}

impl Drop for AllowExecuteGuard {
    fn drop(&mut self) {
        if self.restored {
            return;
        }
        let result = std::fs::copy(&self.backup, &self.script)
            .and_then(|_| std::fs::remove_file(&self.backup));
        if let Err(e) = result {
            log::warn!(
                "Unable to restore {} from {}: {}",
                self.script.display(),
                self.backup.display(),
                e
            );
        }
    }
}
