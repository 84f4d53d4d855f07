//! Script encryption detection.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use super::CONFIG_TAG;
use crate::xml::Document;

/// Suffix of encrypted companion files.
pub const ENCRYPTED_SUFFIX: &str = ".encrypted";

/// `encryption` attribute value of the current encryption scheme.
pub const ENCRYPTION_MARKER: &str = "2";

/// Squish configuration file in the source root.
pub const SQUISH_CONFIG_FILENAME: &str = "squishy";

/// Squish output used when the configuration names none.
pub const DEFAULT_SQUISH_OUTPUT: &str = "driver.lua.squished";

/// Name of the script that will be encrypted, if any.
///
/// Only `<script encryption="2">` qualifies. When Lua is squished the squish
/// output replaces the script's own `file` attribute. The last qualifying
/// script wins.
pub fn encrypted_script_name(document: &Document, squish_output: Option<&str>) -> Option<String> {
    let config = document.root().child(CONFIG_TAG)?;
    config
        .children_named("script")
        .filter(|script| script.attr("encryption") == Some(ENCRYPTION_MARKER))
        .filter_map(|script| match squish_output {
            Some(output) => Some(output.to_string()),
            None => script.attr("file").map(str::to_string),
        })
        .last()
}

/// Output file named by the `squishy` configuration in `source_root`.
pub async fn squish_output_filename(source_root: &Path) -> String {
    static OUTPUT_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r#"(?m)^\s*Output\s*\(?\s*["']([^"']+)["']"#)
            .expect("squishy Output regex is valid")
    });

    let config = source_root.join(SQUISH_CONFIG_FILENAME);
    match tokio::fs::read_to_string(&config).await {
        Ok(contents) => OUTPUT_RE
            .captures(&contents)
            .map(|caps| caps[1].to_string())
            .unwrap_or_else(|| DEFAULT_SQUISH_OUTPUT.to_string()),
        Err(e) => {
            log::debug!("No squish configuration at {}: {}", config.display(), e);
            DEFAULT_SQUISH_OUTPUT.to_string()
        }
    }
}

/// `name` without the encrypted-companion suffix, if it has one.
pub fn strip_encrypted_suffix(name: &str) -> &str {
    name.strip_suffix(ENCRYPTED_SUFFIX).unwrap_or(name)
}
