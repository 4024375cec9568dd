//! Where carlink finds its account and vehicle settings.
//!
//! Two TOML files are read and merged, the second winning on conflicts:
//! the per-user `config.toml` under the carlink config directory, then a
//! `carlink.toml` next to where the command runs. Command-line flags are
//! applied by the binary on top of the result.

use std::io;
use std::path::{Path, PathBuf};

use crate::{CarlinkConfig, ConfigError, Result};

const PROJECT_CONFIG_FILE: &str = "carlink.toml";
const USER_CONFIG_FILE: &str = "config.toml";
const APP_NAME: &str = "carlink";

/// Points the user config directory somewhere else, mainly for tests.
const CONFIG_DIR_ENV: &str = "CARLINK_CONFIG_DIR";

/// One config file that discovery looked at.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    pub path: PathBuf,
    /// False when the file is absent or failed to parse.
    pub loaded: bool,
}

/// Merged configuration plus the files it came from.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: CarlinkConfig,
    /// Checked files, lowest precedence first.
    pub sources: Vec<ConfigSource>,
    /// Non-fatal problems: unreadable layers, plaintext secrets.
    pub warnings: Vec<String>,
}

impl LoadedConfig {
    /// Files that contributed settings.
    pub fn loaded_paths(&self) -> Vec<&Path> {
        self.sources
            .iter()
            .filter(|s| s.loaded)
            .map(|s| s.path.as_path())
            .collect()
    }
}

/// Read the user file and the `carlink.toml` in `project_dir` (or the
/// working directory).
pub fn load_config(project_dir: Option<&Path>) -> Result<LoadedConfig> {
    load_config_from(project_dir, None)
}

/// Like [`load_config`], with the user file taken from `config_dir` when
/// given instead of [`user_config_dir`].
pub fn load_config_from(
    project_dir: Option<&Path>,
    config_dir: Option<&Path>,
) -> Result<LoadedConfig> {
    let mut config = CarlinkConfig::new();
    let mut sources = Vec::new();
    let mut warnings = Vec::new();

    let user_file = match config_dir {
        Some(dir) => Some(dir.join(USER_CONFIG_FILE)),
        None => user_config_path(),
    };
    if let Some(path) = user_file {
        sources.push(load_layer(&mut config, &path, &mut warnings)?);
    }

    let project_path = project_dir
        .map(|d| d.join(PROJECT_CONFIG_FILE))
        .unwrap_or_else(|| PathBuf::from(PROJECT_CONFIG_FILE));
    sources.push(load_layer(&mut config, &project_path, &mut warnings)?);

    check_plaintext_secrets(&config, &mut warnings);

    Ok(LoadedConfig {
        config,
        sources,
        warnings,
    })
}

/// Parse one config file.
pub fn load_config_file(path: &Path) -> Result<CarlinkConfig> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.display().to_string(),
        source: e,
    })?;
    CarlinkConfig::from_toml(&contents)
}

/// Write `config` as TOML to `path`. Missing directories are created.
pub fn save_config(config: &CarlinkConfig, path: &Path) -> Result<()> {
    let contents = config.to_toml()?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| write_error(parent, e))?;
    }
    std::fs::write(path, contents).map_err(|e| write_error(path, e))
}

fn write_error(path: &Path, source: io::Error) -> ConfigError {
    ConfigError::WriteFile {
        path: path.display().to_string(),
        source,
    }
}

/// `config.toml` inside [`user_config_dir`].
pub fn user_config_path() -> Option<PathBuf> {
    user_config_dir().map(|d| d.join(USER_CONFIG_FILE))
}

/// `$CARLINK_CONFIG_DIR` when set and non-empty, else `carlink` under the
/// platform config directory (`~/.config` on Linux).
pub fn user_config_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV)
        && !dir.is_empty()
    {
        return Some(PathBuf::from(dir));
    }
    dirs::config_dir().map(|d| d.join(APP_NAME))
}

/// Merge the file at `path` into `config` if it exists.
///
/// A file that fails to parse is skipped with a warning.
fn load_layer(
    config: &mut CarlinkConfig,
    path: &Path,
    warnings: &mut Vec<String>,
) -> Result<ConfigSource> {
    let loaded = path.is_file()
        && match load_config_file(path) {
            Ok(layer) => {
                tracing::debug!(path = %path.display(), "merged config layer");
                config.merge(layer);
                true
            }
            Err(e) => {
                warnings.push(format!("Skipping {}: {}", path.display(), e));
                false
            }
        };
    Ok(ConfigSource {
        path: path.to_path_buf(),
        loaded,
    })
}

/// Warn about passwords and PINs stored in plaintext.
fn check_plaintext_secrets(config: &CarlinkConfig, warnings: &mut Vec<String>) {
    let mut accounts: Vec<_> = config
        .account
        .iter()
        .filter(|(_, a)| a.has_plaintext_password())
        .map(|(n, _)| n)
        .collect();
    accounts.sort();
    for name in accounts {
        warnings.push(format!(
            "[account.{}] contains a plaintext password. \
             Consider using the system keyring or an environment variable instead.",
            name
        ));
    }

    let mut vehicles: Vec<_> = config
        .vehicle
        .iter()
        .filter(|(_, v)| v.has_plaintext_pin())
        .map(|(n, _)| n)
        .collect();
    vehicles.sort();
    for name in vehicles {
        warnings.push(format!(
            "[vehicle.{}] contains a plaintext security PIN. \
             Consider using the system keyring or an environment variable instead.",
            name
        ));
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
