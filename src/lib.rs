//! Keep Layout - declarative view layout over a constraint solver
//!
//! Spatial relationships between views (size, insets, relative center,
//! offsets, alignment, aspect ratio) are kept as reusable attribute handles.
//! Setting a handle's value installs or updates exactly one linear
//! constraint on the nearest view that contains everything it reads.
//!
//! # Example
//!
//! ```rust
//! use keep_layout::{Frame, KeepLayout, Priority, Size};
//!
//! let mut layout = KeepLayout::new();
//! let screen = layout.add_root(Some("screen"), Frame::new(0.0, 0.0, 320.0, 480.0));
//! let button = layout.add_subview(screen, Some("button")).unwrap();
//!
//! layout.keep_size(button, Size::new(100.0, 40.0), Priority::REQUIRED).unwrap();
//! layout.keep_centered(button).unwrap();
//! layout.layout_if_needed(screen).unwrap();
//!
//! let frame = layout.frame(button).unwrap();
//! assert!((frame.x - 110.0).abs() < 1e-6);
//! ```

use std::path::Path;

pub mod error;
pub mod layout;
pub mod scene;

pub use error::SceneError;
pub use layout::{
    AnimatedBatch, AttributeId, AttributeKind, EdgeInsets, Frame, KeepLayout, LayoutConfig,
    LayoutError, Offset, Point, Priority, Proxy, ProxyKind, Relation, Size, ViewId,
};
pub use scene::{LaidOutScene, Scene};

/// Lay out a TOML scene with the default configuration and return the
/// frame report
///
/// # Example
///
/// ```rust
/// use keep_layout::layout_scene;
///
/// let report = layout_scene(r#"
///     [[view]]
///     name = "screen"
///     frame = { x = 0.0, y = 0.0, width = 100.0, height = 100.0 }
///
///     [[view]]
///     name = "box"
///     parent = "screen"
///
///     [[rule]]
///     view = "box"
///     keep = "insets"
///     value = 10.0
/// "#).unwrap();
///
/// assert!(report.contains("box x=10.0 y=10.0 w=80.0 h=80.0"));
/// ```
pub fn layout_scene(source: &str) -> Result<String, SceneError> {
    layout_scene_with_config(source, LayoutConfig::default())
}

/// Lay out a TOML scene with a custom configuration
pub fn layout_scene_with_config(source: &str, config: LayoutConfig) -> Result<String, SceneError> {
    let scene = Scene::from_toml_str(source)?;
    let laid_out = scene.build(config)?;
    Ok(laid_out.report()?)
}

/// Lay out a scene file, optionally with a configuration file
pub fn layout_scene_file(path: &Path, config: Option<&Path>) -> Result<String, SceneError> {
    let config = match config {
        Some(config) => LayoutConfig::from_file(config)?,
        None => LayoutConfig::default(),
    };
    let scene = Scene::from_file(path)?;
    Ok(scene.build(config)?.report()?)
}
