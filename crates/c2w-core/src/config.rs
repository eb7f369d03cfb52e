//! Configuration management for c2w.
//!
//! The config file lives at a platform-appropriate location:
//! - Linux: `~/.config/c2w/config.toml`
//! - macOS: `~/Library/Application Support/c2w/config.toml`
//!
//! Both `c2wd` and `c2w` read the same file; each only looks at the
//! fields relevant to its role (the server ignores `user_name` and
//! `server_addr`, the client ignores `bind_port`).
//!
//! # Config File Format (TOML)
//!
//! ```toml
//! bind_port = 7878
//! drop_probability = 0.0
//! # user_name = "alice"
//! # server_addr = "192.168.1.10:7878"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default UDP port the server binds and the client dials by default.
pub const DEFAULT_PORT: u16 = 7878;

/// Errors that can occur when loading or saving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file at {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file at {path}: {source}")]
    ParseFile {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("failed to write config file at {path}: {source}")]
    WriteFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("could not determine config directory for this platform")]
    NoConfigDir,

    #[error("drop_probability must be within [0.0, 1.0], got {0}")]
    InvalidDropProbability(f64),
}

/// The persisted configuration shared by the server and client binaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// UDP port the server binds to.
    #[serde(default = "default_port")]
    pub bind_port: u16,

    /// Fraction of outbound datagrams the lossy transport drops, for
    /// exercising the retransmission path against a real loss rate
    /// instead of an idealized network. `0.0` disables simulated loss.
    #[serde(default)]
    pub drop_probability: f64,

    /// The client's login name. Optional in the file since the server
    /// never reads it; the client CLI can also supply it directly.
    #[serde(default)]
    pub user_name: Option<String>,

    /// The client's target `host:port`. Optional for the same reason.
    #[serde(default)]
    pub server_addr: Option<String>,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_port: DEFAULT_PORT,
            drop_probability: 0.0,
            user_name: None,
            server_addr: None,
        }
    }
}

impl AppConfig {
    /// Returns the platform-appropriate config directory path.
    pub fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("c2w"))
    }

    /// Returns the full path to the config file.
    pub fn config_file_path() -> Result<PathBuf, ConfigError> {
        Ok(Self::config_dir()
            .ok_or(ConfigError::NoConfigDir)?
            .join("config.toml"))
    }

    /// Returns the platform-appropriate data directory for log files.
    pub fn data_dir() -> Option<PathBuf> {
        dirs::data_dir().map(|d| d.join("c2w"))
    }

    /// Validates fields whose constraints aren't expressible in the type
    /// alone (`drop_probability` must be a probability).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.drop_probability) {
            return Err(ConfigError::InvalidDropProbability(self.drop_probability));
        }
        Ok(())
    }

    /// Loads the config from the default config file path.
    ///
    /// Returns `Ok(None)` if the config file doesn't exist yet, in which
    /// case callers should fall back to `AppConfig::default()`.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        let path = Self::config_file_path()?;
        Self::load_from(&path)
    }

    /// Loads the config from a specific file path. Returns `Ok(None)` if
    /// the file doesn't exist.
    pub fn load_from(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.to_owned(),
            source: e,
        })?;
        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseFile {
            path: path.to_owned(),
            source: e,
        })?;
        config.validate()?;
        Ok(Some(config))
    }

    /// Saves this config to the default config file path. Creates the
    /// parent directory if it doesn't exist.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::config_file_path()?;
        self.save_to(&path)
    }

    /// Saves this config to a specific file path. Creates the parent
    /// directory if it doesn't exist.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::WriteFile {
                path: path.to_owned(),
                source: e,
            })?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| ConfigError::WriteFile {
            path: path.to_owned(),
            source: e,
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn config_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");

        let config = AppConfig {
            bind_port: 9876,
            drop_probability: 0.1,
            user_name: Some("alice".to_string()),
            server_addr: Some("192.168.1.10:7878".to_string()),
        };

        config.save_to(&path).unwrap();
        let loaded = AppConfig::load_from(&path).unwrap().unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn config_missing_file_returns_none() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nonexistent.toml");
        assert!(AppConfig::load_from(&path).unwrap().is_none());
    }

    #[test]
    fn config_creates_parent_dirs() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("deep").join("nested").join("config.toml");

        AppConfig::default().save_to(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn default_has_no_simulated_loss() {
        assert_eq!(AppConfig::default().drop_probability, 0.0);
    }

    #[test]
    fn out_of_range_drop_probability_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "bind_port = 1\ndrop_probability = 1.5\n").unwrap();
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ConfigError::InvalidDropProbability(_))
        ));
    }
}
