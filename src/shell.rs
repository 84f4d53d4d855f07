//! Pre- and post-package shell commands.

use std::path::{MAIN_SEPARATOR, Path};
use std::process::ExitStatus;

use thiserror::Error;
use tokio::process::Command;

/// A manifest command that did not succeed.
#[derive(Error, Debug)]
pub enum CommandError {
    /// The shell could not be started
    #[error("failed to launch '{command}': {source}")]
    Launch {
        /// Command text after normalization
        command: String,
        /// Launch error
        #[source]
        source: std::io::Error,
    },

    /// The command ran and exited unsuccessfully
    #[error("'{command}' exited with {status}")]
    Exit {
        /// Command text after normalization
        command: String,
        /// Exit status
        status: ExitStatus,
    },
}

/// Rewrite both `/` and `\` to the platform path separator.
pub fn normalize_separators(command: &str) -> String {
    command
        .chars()
        .map(|c| if c == '/' || c == '\\' { MAIN_SEPARATOR } else { c })
        .collect()
}

/// Run one manifest command through the platform shell from `working_dir`.
pub async fn run_command(command: &str, working_dir: &Path) -> Result<(), CommandError> {
    let command = normalize_separators(command.trim());
    log::info!("Running command: {}", command);

    let mut shell = if cfg!(windows) {
        let mut shell = Command::new("cmd");
        shell.arg("/C");
        shell
    } else {
        let mut shell = Command::new("sh");
        shell.arg("-c");
        shell
    };

    let status = shell
        .arg(&command)
        .current_dir(working_dir)
        .status()
        .await
        .map_err(|source| CommandError::Launch {
            command: command.clone(),
            source,
        })?;

    if status.success() {
        Ok(())
    } else {
        Err(CommandError::Exit { command, status })
    }
}
