//! Runtime configuration for wordhunt sessions.

use std::path::Path;
use std::str::FromStr;

use derive_getters::Getters;
use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};
use wordhunt_grid::{Category, GridSize};

use crate::DEFAULT_HIGHLIGHT_COLOR;

/// Top-level configuration, loaded from TOML and overlaid with
/// `WORDHUNT_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize)]
pub struct WordhuntConfig {
    /// Category used when none is requested.
    #[serde(default = "default_category")]
    default_category: String,

    /// Grid columns for new games.
    #[serde(default = "default_dimension")]
    grid_width: usize,

    /// Grid rows for new games.
    #[serde(default = "default_dimension")]
    grid_height: usize,

    /// Commit attempts before a contended operation gives up.
    #[serde(default = "default_max_commit_attempts")]
    max_commit_attempts: usize,

    /// Highlight color for players without one in their profile.
    #[serde(default = "default_color")]
    default_color: String,

    /// Undelivered updates buffered per session by the broadcast channel.
    #[serde(default = "default_channel_capacity")]
    channel_capacity: usize,

    /// SQLite database file. Sessions stay in memory when unset.
    #[serde(default)]
    database_path: Option<String>,
}

fn default_category() -> String {
    Category::default().to_string()
}

fn default_dimension() -> usize {
    10
}

fn default_max_commit_attempts() -> usize {
    5
}

fn default_color() -> String {
    DEFAULT_HIGHLIGHT_COLOR.to_string()
}

fn default_channel_capacity() -> usize {
    crate::DEFAULT_CHANNEL_CAPACITY
}

impl Default for WordhuntConfig {
    fn default() -> Self {
        Self {
            default_category: default_category(),
            grid_width: default_dimension(),
            grid_height: default_dimension(),
            max_commit_attempts: default_max_commit_attempts(),
            default_color: default_color(),
            channel_capacity: default_channel_capacity(),
            database_path: None,
        }
    }
}

impl WordhuntConfig {
    /// Loads configuration from a TOML file. Missing keys take defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed, or if a
    /// value is out of range.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        debug!("Loading config from file");
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::new(format!("Failed to read config file: {}", e)))?;
        Self::from_toml(&content)
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the text is not valid TOML or a value is
    /// out of range.
    #[instrument(skip(content))]
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ConfigError::new(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        info!(category = %config.default_category, "Config loaded successfully");
        Ok(config)
    }

    /// Defaults overlaid with `WORDHUNT_*` variables from the process
    /// environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a variable does not parse.
    #[instrument]
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().overlay_env(|key| std::env::var(key).ok())
    }

    /// Overlays `WORDHUNT_*` values returned by `lookup` onto `self`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a value does not parse or is out of range.
    #[instrument(skip(self, lookup))]
    pub fn overlay_env<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(category) = lookup("WORDHUNT_DEFAULT_CATEGORY") {
            self.default_category = category;
        }
        if let Some(width) = lookup("WORDHUNT_GRID_WIDTH") {
            self.grid_width = parse_var("WORDHUNT_GRID_WIDTH", &width)?;
        }
        if let Some(height) = lookup("WORDHUNT_GRID_HEIGHT") {
            self.grid_height = parse_var("WORDHUNT_GRID_HEIGHT", &height)?;
        }
        if let Some(attempts) = lookup("WORDHUNT_MAX_COMMIT_ATTEMPTS") {
            self.max_commit_attempts = parse_var("WORDHUNT_MAX_COMMIT_ATTEMPTS", &attempts)?;
        }
        if let Some(color) = lookup("WORDHUNT_DEFAULT_COLOR") {
            self.default_color = color;
        }
        if let Some(capacity) = lookup("WORDHUNT_CHANNEL_CAPACITY") {
            self.channel_capacity = parse_var("WORDHUNT_CHANNEL_CAPACITY", &capacity)?;
        }
        if let Some(path) = lookup("WORDHUNT_DATABASE_PATH") {
            self.database_path = Some(path).filter(|p| !p.trim().is_empty());
        }
        self.validate()?;
        debug!(config = ?self, "Environment overlay applied");
        Ok(self)
    }

    /// Grid size for new games.
    pub fn grid_size(&self) -> GridSize {
        GridSize::new(self.grid_width, self.grid_height)
    }

    /// Resolved default category. Unknown names fall back to the catalog
    /// default.
    pub fn category(&self) -> Category {
        Category::resolve(&self.default_category)
    }

    /// Settings handed to each coordinator.
    pub fn coordinator_settings(&self) -> CoordinatorSettings {
        CoordinatorSettings::new(self.max_commit_attempts, self.default_color.clone())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.grid_width == 0 || self.grid_height == 0 {
            return Err(ConfigError::new(format!(
                "Grid must be at least 1x1, got {}x{}",
                self.grid_width, self.grid_height
            )));
        }
        if self.max_commit_attempts == 0 {
            return Err(ConfigError::new("max_commit_attempts must be at least 1"));
        }
        if self.channel_capacity == 0 {
            return Err(ConfigError::new("channel_capacity must be at least 1"));
        }
        Ok(())
    }
}

#[track_caller]
fn parse_var<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| ConfigError::new(format!("{} = {:?}: {}", key, value, e)))
}

/// Retry bound and color fallback used by a
/// [`SessionCoordinator`](crate::SessionCoordinator).
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
pub struct CoordinatorSettings {
    max_commit_attempts: usize,
    default_color: String,
}

impl CoordinatorSettings {
    /// Creates settings. At least one commit attempt is always made.
    pub fn new(max_commit_attempts: usize, default_color: String) -> Self {
        Self {
            max_commit_attempts: max_commit_attempts.max(1),
            default_color,
        }
    }
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        WordhuntConfig::default().coordinator_settings()
    }
}

/// Configuration that could not be read or does not validate.
#[derive(Debug, Clone, Display, Error)]
#[display("Invalid configuration: {} ({}:{})", message, file, line)]
pub struct ConfigError {
    /// What was wrong.
    pub message: String,
    /// Line that raised the error.
    pub line: u32,
    /// File that raised the error.
    pub file: &'static str,
}

impl ConfigError {
    /// Creates a configuration error located at the caller.
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message: message.into(),
            line: loc.line(),
            file: loc.file(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = WordhuntConfig::default();
        assert_eq!(config.default_category(), "animals");
        assert_eq!(config.grid_size(), GridSize::new(10, 10));
        assert_eq!(*config.max_commit_attempts(), 5);
        assert_eq!(config.default_color(), "#8B5CF6");
        assert_eq!(*config.channel_capacity(), 64);
        assert!(config.database_path().is_none());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config = WordhuntConfig::from_toml(
            r#"
            default_category = "Sports"
            grid_width = 14
            "#,
        )
        .expect("parse");
        assert_eq!(config.category(), Category::Sports);
        assert_eq!(config.grid_size(), GridSize::new(14, 10));
        assert_eq!(*config.max_commit_attempts(), 5);
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let err = WordhuntConfig::from_toml("max_commit_attempts = 0").expect_err("invalid");
        assert!(err.message.contains("max_commit_attempts"));
    }

    #[test]
    fn test_env_overlay() {
        let vars: HashMap<&str, &str> = [
            ("WORDHUNT_GRID_HEIGHT", "12"),
            ("WORDHUNT_DEFAULT_COLOR", "#00FF00"),
            ("WORDHUNT_DATABASE_PATH", "games.db"),
        ]
        .into_iter()
        .collect();
        let config = WordhuntConfig::default()
            .overlay_env(|key| vars.get(key).map(|v| v.to_string()))
            .expect("overlay");
        assert_eq!(config.grid_size(), GridSize::new(10, 12));
        assert_eq!(config.coordinator_settings().default_color(), "#00FF00");
        assert_eq!(config.database_path().as_deref(), Some("games.db"));
    }

    #[test]
    fn test_env_overlay_rejects_garbage() {
        let result = WordhuntConfig::default().overlay_env(|key| {
            (key == "WORDHUNT_GRID_WIDTH").then(|| "wide".to_string())
        });
        assert!(result.is_err());
    }
}
