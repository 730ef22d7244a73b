//! Command implementations.

pub mod run;
pub mod serve;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use kiln_tasks::Config;

const KILN_TOML: &str = "kiln.toml";
const PACKAGE_JSON: &str = "package.json";

/// Pick the configuration file: the explicit path if given, otherwise
/// `kiln.toml` in `dir`, falling back to `package.json`.
pub fn config_path(explicit: Option<&Path>, dir: &Path) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }

    [KILN_TOML, PACKAGE_JSON]
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
        .with_context(|| {
            format!(
                "No {} or {} found in {}",
                KILN_TOML,
                PACKAGE_JSON,
                dir.display()
            )
        })
}

/// Load the configuration, resolving its directories against the file's
/// own directory.
pub fn load_config(path: &Path) -> Result<Config> {
    let mut config = Config::load(path).context("Failed to load configuration")?;

    let root = path.parent().unwrap_or(Path::new(""));
    config.directories = config.directories.rooted_at(root);

    tracing::debug!(
        "source: {}, build: {}",
        config.directories.source().display(),
        config.directories.build().display()
    );
    Ok(config)
}
