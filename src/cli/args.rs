//! Command line argument parsing and validation.

use std::path::PathBuf;

use clap::Parser;

use crate::BuildConfig;
use crate::error::CliError;

/// Control4 driver packager
#[derive(Parser, Debug, Clone)]
#[command(
    name = "driver-packager",
    version,
    about = "Build Control4 driver packages (.c4z / .c4i)",
    long_about = "Build a Control4 driver package from a driver source directory.

The manifest is taken from the command line, or from <dirname>.c4zproj in the
source directory. Without either, every file in the source directory is
packaged into <dirname>.c4z.

Usage:
  driver-packager ./MyDriver ./out
  driver-packager ./MyDriver ./out MyDriver-debug.c4zproj
  driver-packager -v --update-modified --driver-version 42 ./MyDriver ./out"
)]
pub struct Args {
    /// Driver source directory
    #[arg(index = 1, value_name = "SOURCE_DIRECTORY")]
    pub source_directory: PathBuf,

    /// Directory the package is written to (created if missing)
    #[arg(index = 2, value_name = "DESTINATION_DIRECTORY")]
    pub destination_directory: PathBuf,

    /// Manifest file, relative to the source directory
    #[arg(index = 3, value_name = "MANIFEST")]
    pub manifest: Option<String>,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Extract the package into a directory next to it after building
    #[arg(short, long)]
    pub unzip: bool,

    /// Enable interactive execution (C4:AllowExecute) in the packaged driver
    #[arg(long = "allowexecute", visible_alias = "ae")]
    pub allow_execute: bool,

    /// Stamp <modified> in the packaged driver.xml with the current time
    #[arg(long)]
    pub update_modified: bool,

    /// Replace <version> in the packaged driver.xml
    #[arg(long, value_name = "VERSION")]
    pub driver_version: Option<String>,

    /// Parent directory for squish staging directories
    #[arg(long, value_name = "DIR", env = "DRIVER_PACKAGER_TEMP")]
    pub temp_dir: Option<PathBuf>,
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate arguments for consistency
    pub fn validate(&self) -> Result<(), CliError> {
        if !self.source_directory.is_dir() {
            return Err(CliError::InvalidArguments {
                reason: format!(
                    "source directory {} does not exist",
                    self.source_directory.display()
                ),
            });
        }

        if let Some(manifest) = &self.manifest
            && manifest.trim().is_empty()
        {
            return Err(CliError::InvalidArguments {
                reason: "manifest file name is empty".to_string(),
            });
        }

        if let Some(version) = &self.driver_version
            && version.trim().is_empty()
        {
            return Err(CliError::InvalidArguments {
                reason: "--driver-version needs a non-empty value".to_string(),
            });
        }

        Ok(())
    }
}

impl From<&Args> for BuildConfig {
    fn from(args: &Args) -> Self {
        let mut config = BuildConfig::new(&args.source_directory, &args.destination_directory);
        config.manifest_filename = args.manifest.clone();
        config.verbose = args.verbose;
        config.unzip = args.unzip;
        config.allow_execute = args.allow_execute;
        config.update_modified = args.update_modified;
        config.driver_version = args.driver_version.clone();
        if let Some(temp_dir) = &args.temp_dir {
            config.temp_root = temp_dir.clone();
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_command_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_flags() {
        let args = Args::try_parse_from([
            "driver-packager",
            "src",
            "out",
            "custom.c4zproj",
            "-v",
            "-u",
            "--ae",
            "--update-modified",
            "--driver-version",
            "7",
        ])
        .expect("parse");

        assert_eq!(args.manifest.as_deref(), Some("custom.c4zproj"));
        let config = BuildConfig::from(&args);
        assert!(config.verbose);
        assert!(config.unzip);
        assert!(config.allow_execute);
        assert!(config.update_modified);
        assert_eq!(config.driver_version.as_deref(), Some("7"));
        assert_eq!(config.source_root, PathBuf::from("src"));
        assert_eq!(config.destination_root, PathBuf::from("out"));
    }

    #[test]
    fn test_destination_is_required() {
        assert!(Args::try_parse_from(["driver-packager", "src"]).is_err());
    }

    #[test]
    fn test_validate_rejects_missing_source() {
        let args = Args::try_parse_from([
            "driver-packager",
            "/definitely/not/a/driver",
            "out",
        ])
        .expect("parse");
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_version() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = dir.path().to_string_lossy().into_owned();
        let args = Args::try_parse_from([
            "driver-packager",
            source.as_str(),
            "out",
            "--driver-version",
            " ",
        ])
        .expect("parse");
        assert!(args.validate().is_err());
    }
}
