//! Configuration module for viewbar
//!
//! Settings are stored as TOML in the platform config directory:
//! - **Linux**: `~/.config/dev.viewbar/config.toml`
//! - **macOS**: `~/Library/Application Support/dev.viewbar/config.toml`
//! - **Windows**: `%APPDATA%\dev.viewbar\config.toml`
//!
//! Every section and field defaults when missing, so a partial file (or
//! none at all) is valid.
//!
//! # Example
//!
//! ```ignore
//! use viewbar::config::ViewBarConfig;
//!
//! let config = ViewBarConfig::load_or_default();
//! let timeout = config.session.sync_timeout();
//! ```

pub mod keymap;

pub use keymap::Keymap;

use crate::error::{Result, ViewBarError};
use crate::stage::StageKind;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application identifier for config and data directories
pub const APP_ID: &str = "dev.viewbar";

/// Config filename
pub const CONFIG_FILE: &str = "config.toml";

/// Default session endpoint
pub const DEFAULT_ENDPOINT: &str = "localhost:5151";

/// Default time a sync may stay unanswered, in milliseconds
pub const DEFAULT_SYNC_TIMEOUT_MS: u64 = 10_000;

/// Default time an attach may stay unanswered, in milliseconds
pub const DEFAULT_ATTACH_TIMEOUT_MS: u64 = 5_000;

/// Get the path to the config file
pub fn config_path() -> Option<PathBuf> {
    dirs_next::config_dir().map(|p| p.join(APP_ID).join(CONFIG_FILE))
}

/// Directory for rolling log files
pub fn log_dir() -> Option<PathBuf> {
    dirs_next::data_dir().map(|p| p.join(APP_ID).join("logs"))
}

// ==================== Session Config ====================

/// Backend session settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Transport endpoint of the backend session
    pub endpoint: String,

    /// A sync unanswered for this long is a channel fault
    pub sync_timeout_ms: u64,

    /// An attach unanswered for this long is a channel fault
    pub attach_timeout_ms: u64,

    /// Capacity of the request channel (UI → worker)
    pub request_capacity: usize,

    /// Capacity of the event channel (worker → UI)
    pub event_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            sync_timeout_ms: DEFAULT_SYNC_TIMEOUT_MS,
            attach_timeout_ms: DEFAULT_ATTACH_TIMEOUT_MS,
            request_capacity: 256,
            event_capacity: 1024,
        }
    }
}

impl SessionConfig {
    pub fn sync_timeout(&self) -> Duration {
        Duration::from_millis(self.sync_timeout_ms)
    }

    pub fn attach_timeout(&self) -> Duration {
        Duration::from_millis(self.attach_timeout_ms)
    }
}

// ==================== Editor Config ====================

/// Stage editing behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Kind given to a stage typed into the tail without a `kind:` prefix
    pub default_kind: StageKind,

    /// Whether the bar owns keyboard focus when a session starts
    pub bar_focused_on_start: bool,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            default_kind: StageKind::Match,
            bar_focused_on_start: true,
        }
    }
}

// ==================== Logging Config ====================

/// Log output settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Also write a daily rolling log file
    pub log_to_file: bool,

    /// Filter directive used when `RUST_LOG` is not set
    pub filter: Option<String>,
}

// ==================== ViewBar Config ====================

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewBarConfig {
    pub session: SessionConfig,
    pub editor: EditorConfig,
    pub logging: LoggingConfig,
    pub keymap: Keymap,
}

impl ViewBarConfig {
    /// Load from the default location (defaults if the file is missing)
    pub fn load() -> Result<Self> {
        let path = config_path().ok_or_else(|| {
            ViewBarError::Config("Could not determine config directory".to_string())
        })?;

        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Load from an explicit path
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ViewBarError::Config(format!("Failed to read config {:?}: {}", path, e))
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| {
            ViewBarError::Config(format!("Failed to parse config {:?}: {}", path, e))
        })?;
        config.keymap.validate()?;
        Ok(config)
    }

    /// Load config, returning defaults on any error
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|e| {
            tracing::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save to the default location
    pub fn save(&self) -> Result<()> {
        let path = config_path().ok_or_else(|| {
            ViewBarError::Config("Could not determine config directory".to_string())
        })?;
        self.save_to(path)
    }

    /// Save as TOML to `path`, creating parent directories
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ViewBarError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| ViewBarError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content).map_err(|e| {
            ViewBarError::Config(format!("Failed to write config {:?}: {}", path, e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::event::{KeyAction, KeyChord};

    #[test]
    fn test_defaults() {
        let config = ViewBarConfig::default();
        assert_eq!(config.session.endpoint, "localhost:5151");
        assert_eq!(config.session.sync_timeout(), Duration::from_secs(10));
        assert_eq!(config.session.attach_timeout(), Duration::from_secs(5));
        assert_eq!(config.editor.default_kind, StageKind::Match);
        assert!(config.editor.bar_focused_on_start);
        assert!(!config.logging.log_to_file);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE);

        let mut config = ViewBarConfig::default();
        config.session.sync_timeout_ms = 250;
        config.editor.default_kind = StageKind::Limit;
        config.keymap.bind(KeyChord::new("Tab"), KeyAction::NavigateRight);
        config.save_to(&path).unwrap();

        let loaded = ViewBarConfig::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_defaults_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(
            &path,
            "[session]\nendpoint = \"backend:9000\"\n\n[editor]\ndefault_kind = \"sort_by\"\n",
        )
        .unwrap();

        let config = ViewBarConfig::load_from(&path).unwrap();
        assert_eq!(config.session.endpoint, "backend:9000");
        assert_eq!(config.session.sync_timeout_ms, DEFAULT_SYNC_TIMEOUT_MS);
        assert_eq!(config.editor.default_kind, StageKind::SortBy);
        assert_eq!(
            config.keymap.resolve(&KeyChord::new("Enter")),
            Some(KeyAction::Commit)
        );
    }

    #[test]
    fn test_bad_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "[editor]\ndefault_kind = \"group_by\"\n").unwrap();
        assert!(matches!(
            ViewBarConfig::load_from(&path),
            Err(ViewBarError::Config(_))
        ));

        assert!(ViewBarConfig::load_from(dir.path().join("missing.toml")).is_err());
    }
}
