//! Configuration for the layout engine

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use super::priority::Priority;

/// Errors from loading a configuration file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Configuration options for the layout engine
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Priority a freshly vended attribute starts with
    pub default_priority: Priority,

    /// Duration of `keep_animated` batches, in seconds
    pub animation_duration: f64,

    /// Frames closer than this are not reported as changed
    pub frame_tolerance: f64,

    /// Strength holding an unconstrained subview at its last frame
    pub frame_anchor_priority: Priority,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            default_priority: Priority::REQUIRED,
            animation_duration: 0.25,
            frame_tolerance: 0.001,
            frame_anchor_priority: Priority::new(1.0),
        }
    }
}

impl LayoutConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a configuration from TOML; missing keys keep their defaults
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// Set the priority new attributes start with
    pub fn with_default_priority(mut self, priority: Priority) -> Self {
        self.default_priority = priority;
        self
    }

    /// Set the default animation duration
    pub fn with_animation_duration(mut self, duration: f64) -> Self {
        self.animation_duration = duration;
        self
    }

    pub fn with_frame_tolerance(mut self, tolerance: f64) -> Self {
        self.frame_tolerance = tolerance;
        self
    }

    pub fn with_frame_anchor_priority(mut self, priority: Priority) -> Self {
        self.frame_anchor_priority = priority;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LayoutConfig::default();
        assert_eq!(config.default_priority, Priority::REQUIRED);
        assert_eq!(config.animation_duration, 0.25);
        assert_eq!(config.frame_tolerance, 0.001);
        assert_eq!(config.frame_anchor_priority, Priority::new(1.0));
    }

    #[test]
    fn test_builder_pattern() {
        let config = LayoutConfig::new()
            .with_default_priority(Priority::HIGH)
            .with_animation_duration(0.5);

        assert_eq!(config.default_priority, Priority::HIGH);
        assert_eq!(config.animation_duration, 0.5);
    }

    #[test]
    fn test_from_toml_keeps_missing_defaults() {
        let config = LayoutConfig::from_toml_str(
            r#"
            default_priority = "high"
            animation_duration = 0.4
            "#,
        )
        .unwrap();

        assert_eq!(config.default_priority, Priority::HIGH);
        assert_eq!(config.animation_duration, 0.4);
        assert_eq!(config.frame_tolerance, 0.001);
    }

    #[test]
    fn test_from_toml_numeric_priority() {
        let config = LayoutConfig::from_toml_str("frame_anchor_priority = 10").unwrap();
        assert_eq!(config.frame_anchor_priority, Priority::new(10.0));
    }

    #[test]
    fn test_from_toml_rejects_bad_priority() {
        let err = LayoutConfig::from_toml_str("default_priority = \"urgent\"").unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = LayoutConfig::from_file("/nonexistent/keep-layout.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
