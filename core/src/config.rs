//! Persisted plugin settings.
//!
//! Settings live in a TOML file managed by `confy` under the user's config
//! directory; rule files sit in a `rules` folder next to it by default.

use std::path::{Path, PathBuf};

use npcinv_types::PluginSettings;
use thiserror::Error;

pub const APP_NAME: &str = "npcinv";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load settings: {0}")]
    Load(#[source] confy::ConfyError),

    #[error("failed to store settings: {0}")]
    Store(#[source] confy::ConfyError),

    #[error("no configuration directory on this platform")]
    NoConfigDir,
}

/// Load settings from the default location, creating the file with
/// defaults when it does not exist. Values are clamped to their ranges.
pub fn load_settings() -> Result<PluginSettings, ConfigError> {
    confy::load::<PluginSettings>(APP_NAME, None)
        .map(PluginSettings::normalized)
        .map_err(ConfigError::Load)
}

pub fn store_settings(settings: &PluginSettings) -> Result<(), ConfigError> {
    confy::store(APP_NAME, None, settings).map_err(ConfigError::Store)
}

pub fn load_settings_from(path: &Path) -> Result<PluginSettings, ConfigError> {
    confy::load_path::<PluginSettings>(path)
        .map(PluginSettings::normalized)
        .map_err(ConfigError::Load)
}

pub fn store_settings_to(path: &Path, settings: &PluginSettings) -> Result<(), ConfigError> {
    confy::store_path(path, settings).map_err(ConfigError::Store)
}

pub fn settings_path() -> Result<PathBuf, ConfigError> {
    confy::get_configuration_file_path(APP_NAME, None).map_err(ConfigError::Load)
}

/// Default rule folder. Custom rule folders are resolved against its parent.
pub fn default_rule_dir() -> Result<PathBuf, ConfigError> {
    dirs::config_dir()
        .map(|dir| dir.join(APP_NAME).join("rules"))
        .ok_or(ConfigError::NoConfigDir)
}
