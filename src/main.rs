//! driver-packager: build Control4 driver packages from a source directory.

use driver_packager::cli;
use driver_packager::cli::OutputManager;
use std::process;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    match cli::run().await {
        Ok(exit_code) => {
            process::exit(exit_code);
        }
        Err(e) => {
            let output = OutputManager::new(false);
            output.error(&format!("Fatal error: {e}"));

            let suggestions = e.recovery_suggestions();
            if !suggestions.is_empty() {
                let _ = output.info("Recovery suggestions:");
                for suggestion in suggestions {
                    let _ = output.indent(&suggestion);
                }
            }

            process::exit(e.exit_code());
        }
    }
}
