//! Error types for loading and laying out scenes

use thiserror::Error;

use crate::layout::{ConfigError, LayoutError};

/// Errors that can occur while loading or applying a scene description
#[derive(Error, Debug)]
pub enum SceneError {
    #[error("Failed to read scene file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse scene TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid layout config: {0}")]
    Config(#[from] ConfigError),

    /// A rule or parent refers to a view the scene never declared
    #[error("unknown view '{0}'")]
    UnknownView(String),

    #[error("view '{0}' is declared twice")]
    DuplicateView(String),

    /// `keep` names neither an attribute nor a grouping
    #[error("unknown keep '{0}'")]
    UnknownKeep(String),

    #[error("rule {rule} ({keep}): {message}")]
    InvalidRule {
        rule: usize,
        keep: String,
        message: String,
    },

    #[error("layout error: {0}")]
    Layout(#[from] LayoutError),
}
