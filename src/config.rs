use std::path::PathBuf;

use directories::ProjectDirs;
use serde::Deserialize;

use crate::generator::curve::CustomCurveConfig;

/// Application configuration loaded from TOML config file.
/// All fields have defaults; the config file is optional.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Custom database path (overrides XDG default).
    pub db_path: Option<PathBuf>,
    /// Source label for imports when `--source` is not given.
    pub default_source: String,
    /// Set generation defaults.
    pub generation: GenerationConfig,
    /// Custom energy curves (merged with the built-in curves).
    pub curves: Vec<CustomCurveConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            default_source: crate::DEFAULT_SOURCE.to_string(),
            generation: GenerationConfig::default(),
            curves: Vec::new(),
        }
    }
}

/// Defaults applied to `generate` when flags are omitted.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Energy curve used when none is requested.
    pub default_energy_curve: String,
    /// Set length used when `--duration-minutes` is omitted.
    pub default_duration_minutes: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            default_energy_curve: "linear_up".to_string(),
            default_duration_minutes: 60,
        }
    }
}

impl AppConfig {
    /// Load config from `~/.config/setforge/config.toml`.
    /// Returns default config if file doesn't exist.
    /// Logs a warning if the file exists but can't be parsed.
    pub fn load() -> Self {
        let config_path = Self::config_path();
        match config_path {
            Some(path) if path.exists() => match std::fs::read_to_string(&path) {
                Ok(contents) => match Self::from_toml(&contents) {
                    Ok(config) => {
                        log::info!("Loaded config from {}", path.display());
                        config
                    }
                    Err(e) => {
                        log::warn!(
                            "Failed to parse {}: {}. Using defaults.",
                            path.display(),
                            e
                        );
                        Self::default()
                    }
                },
                Err(e) => {
                    log::warn!(
                        "Failed to read {}: {}. Using defaults.",
                        path.display(),
                        e
                    );
                    Self::default()
                }
            },
            _ => {
                log::debug!("No config file found, using defaults");
                Self::default()
            }
        }
    }

    pub fn from_toml(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Get the config file path.
    fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", crate::APP_NAME)
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}

/// Resolve the default database path using XDG data directory.
pub fn default_db_path() -> PathBuf {
    if let Some(dirs) = ProjectDirs::from("", "", crate::APP_NAME) {
        let data_dir = dirs.data_dir();
        std::fs::create_dir_all(data_dir).ok();
        data_dir.join("setforge.db")
    } else {
        // Fallback: current directory
        PathBuf::from("setforge.db")
    }
}
