//! Attribute-based layout over a linear constraint solver
//!
//! Views live in a [`ViewTree`]. Spatial relationships between them are
//! expressed as [`Attribute`] handles vended by [`KeepLayout`]; each handle
//! owns at most one constraint, installed on the nearest view that contains
//! every view it reads. [`Proxy`] groups several handles under one value and
//! [`AnimatedBatch`] defers mutations to the animation timeline.

pub mod animation;
pub mod attribute;
pub mod config;
pub mod engine;
pub mod error;
pub mod priority;
pub mod proxy;
pub mod relation;
pub mod solver;
pub mod tree;
pub mod types;

pub use animation::{
    AnimatedBatch, AnimationCurve, AnimationOptions, Animator, BatchId, BatchState, FrameChange,
    RecordingAnimator, Transaction, TransactionRecord,
};
pub use attribute::{Attribute, AttributeId, AttributeState};
pub use config::{ConfigError, LayoutConfig};
pub use engine::KeepLayout;
pub use error::LayoutError;
pub use priority::{ParsePriorityError, Priority};
pub use proxy::{Proxy, ProxyKind, ProxyValue};
pub use relation::{Anchor, AttributeKind, Relation};
pub use solver::{AnchorRef, ConstraintId, ConstraintOrigin, LayoutConstraint, SolverError};
pub use tree::{ViewId, ViewTree};
pub use types::*;
