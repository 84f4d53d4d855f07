//! Command line interface for driver-packager.

mod args;
mod output;

pub use args::Args;
pub use output::OutputManager;

use crate::BuildConfig;
use crate::error::Result;
use crate::pipeline::Packager;

/// Main CLI entry point. Returns the process exit code.
pub async fn run() -> Result<i32> {
    let args = Args::parse_args();
    init_logging(args.verbose);
    execute(&args).await
}

/// Build the package described by `args`.
pub async fn execute(args: &Args) -> Result<i32> {
    let output = OutputManager::new(false);

    if let Err(e) = args.validate() {
        output.error(&format!("Invalid arguments: {}", e));
        return Ok(crate::error::GENERIC_FAILURE_EXIT_CODE);
    }

    let config = BuildConfig::from(args);
    crate::archive::fs::create_dir_all(&config.destination_root).await?;

    output.section(&format!("Packaging {}", config.source_root.display()))?;

    let mut packager = Packager::new(config);
    match packager.run().await {
        Ok(artifact) => {
            output.artifact(&artifact, &packager.state().warnings)?;
            Ok(0)
        }
        Err(e) => {
            output.error(&e.to_string());
            for warning in &packager.state().warnings {
                output.warn(&format!("[{}] {}", warning.phase, warning.message))?;
            }

            let suggestions = e.recovery_suggestions();
            if !suggestions.is_empty() {
                output.info("Recovery suggestions:")?;
                for suggestion in suggestions {
                    output.indent(&format!("• {}", suggestion))?;
                }
            }
            if e.is_recoverable() {
                output.indent("• Rerun the build once the problem is fixed")?;
            }

            Ok(e.exit_code())
        }
    }
}

/// Initialise `env_logger`: `warn` by default, `info` with `--verbose`.
/// `RUST_LOG` always wins.
pub fn init_logging(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_timestamp(None)
        .try_init();
}
