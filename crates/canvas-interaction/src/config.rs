//! Backend endpoint configuration.
//!
//! Resolution order: the `INNERCANVAS_API_BASE_URL` environment variable,
//! then `~/.config/innercanvas/config.json`, then the localhost default.

use canvas_core::Result;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

const ENV_BASE_URL: &str = "INNERCANVAS_API_BASE_URL";
const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Backend connection settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendConfig {
    /// Base URL of the backend, without a trailing slash.
    pub api_base_url: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

impl BackendConfig {
    /// Loads the configuration, preferring the environment variable over
    /// the config file, with a localhost default when neither exists.
    ///
    /// # Errors
    ///
    /// Returns an error only if a config file exists but cannot be read or
    /// parsed; absence is not an error.
    pub fn load() -> Result<Self> {
        if let Ok(url) = std::env::var(ENV_BASE_URL) {
            if !url.trim().is_empty() {
                return Ok(Self {
                    api_base_url: url.trim_end_matches('/').to_string(),
                });
            }
        }

        match config_path() {
            Some(path) if path.exists() => Self::load_from_path(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Loads the configuration from a specific JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let mut config: Self = serde_json::from_str(&content)?;
        config.api_base_url = config.api_base_url.trim_end_matches('/').to_string();
        Ok(config)
    }
}

/// Returns the path to the configuration file: ~/.config/innercanvas/config.json
fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".config").join("innercanvas").join("config.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn load_from_path_parses_and_normalizes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut file = fs::File::create(&path).unwrap();
        write!(file, r#"{{"apiBaseUrl": "https://canvas.example.com/"}}"#).unwrap();

        let config = BackendConfig::load_from_path(&path).unwrap();
        assert_eq!(config.api_base_url, "https://canvas.example.com");
    }

    #[test]
    fn load_from_path_rejects_malformed_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "not json").unwrap();

        assert!(BackendConfig::load_from_path(&path).is_err());
    }

    #[test]
    fn default_points_at_localhost() {
        assert_eq!(BackendConfig::default().api_base_url, "http://localhost:8000");
    }

    #[test]
    fn env_override_wins_and_normalizes() {
        // SAFETY: no other test in this crate touches this variable.
        unsafe { std::env::set_var(ENV_BASE_URL, "https://env.example.com/") };
        let config = BackendConfig::load().unwrap();
        unsafe { std::env::remove_var(ENV_BASE_URL) };

        assert_eq!(config.api_base_url, "https://env.example.com");
    }
}
