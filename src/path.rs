// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Determine where the configuration lives, and what name a repository goes
//! by, from nothing but the invocation.

use std::{
    ffi::OsString,
    path::{Path, PathBuf},
};

/// Environment variable that overrides the configuration path.
pub const CONFIG_ENV: &str = "SVN_MAILER_CONFIG";

/// Determine basename of repository path.
///
/// Trailing slashes are ignored, so `/srv/svn/asf/` yields `asf`.
pub fn repos_basename(repos_path: impl AsRef<Path>) -> String {
    repos_path
        .as_ref()
        .components()
        .next_back()
        .map(|part| part.as_os_str().to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Default configuration path for repository.
///
/// Uses `REPOS/conf/mailer.conf`, next to the repository's own
/// configuration. Does not check if the path returned actually exists.
pub fn default_config_path(repos_path: impl AsRef<Path>) -> PathBuf {
    repos_path.as_ref().join("conf").join("mailer.conf")
}

/// Pick configuration path for invocation.
///
/// [`CONFIG_ENV`] wins over the command line, which wins over
/// [`default_config_path`]. The result has `~` and `$VAR` references
/// expanded.
///
/// # Errors
///
/// - Return [`PathError`] if shell expansion fails.
pub fn resolve_config_path(
    env_override: Option<OsString>,
    cli: Option<PathBuf>,
    repos_path: impl AsRef<Path>,
) -> Result<PathBuf> {
    let path = env_override
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .or(cli)
        .unwrap_or_else(|| default_config_path(repos_path));

    expand_path(path)
}

/// Perform shell expansion on path.
///
/// # Errors
///
/// - Return [`PathError`] if a referenced variable is not set.
pub fn expand_path(path: impl AsRef<Path>) -> Result<PathBuf> {
    let raw = path.as_ref().to_string_lossy();
    let expanded = shellexpand::full(raw.as_ref()).map_err(|err| PathError {
        path: raw.clone().into_owned(),
        source: err,
    })?;

    Ok(PathBuf::from(expanded.into_owned()))
}

/// Shell expansion of path fails.
#[derive(Clone, Debug, thiserror::Error)]
#[error("cannot expand path {path:?}")]
pub struct PathError {
    path: String,
    #[source]
    source: shellexpand::LookupError<std::env::VarError>,
}

/// Friendly result alias :3
pub type Result<T, E = PathError> = std::result::Result<T, E>;
