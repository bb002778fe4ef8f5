//! Error types for the layout engine

use thiserror::Error;

use super::attribute::AttributeId;
use super::relation::AttributeKind;
use super::solver::{ConstraintId, SolverError};
use super::tree::ViewId;

/// Errors raised while building or mutating layout attributes.
///
/// All of these are programmer errors at the call site; none is transient.
#[derive(Debug, Error)]
pub enum LayoutError {
    /// The two views share no ancestor
    #[error("views {first} and {second} are not in the same hierarchy")]
    DisconnectedHierarchy { first: ViewId, second: ViewId },

    /// A relationship between two views was requested without the second view
    #[error("{kind} requires a target view")]
    MissingTarget { kind: AttributeKind },

    /// A single-view relationship was given a target view
    #[error("{kind} does not take a target view")]
    UnexpectedTarget { kind: AttributeKind },

    /// A relationship to the superview was requested on a root view
    #[error("{kind} on view {view} requires a superview")]
    NoSuperview { view: ViewId, kind: AttributeKind },

    #[error("unknown view {0}")]
    UnknownView(ViewId),

    #[error("unknown attribute {0}")]
    UnknownAttribute(AttributeId),

    #[error("constraint {0} is not installed on any view")]
    UnknownConstraint(ConstraintId),

    /// A structured proxy value does not match the proxy's member count
    #[error("{kind} proxy has {expected} members but the value has {found} components")]
    ValueArity {
        kind: &'static str,
        expected: usize,
        found: usize,
    },

    /// Constraint solver error
    #[error("constraint solver error: {0}")]
    Solver(#[from] SolverError),
}

impl LayoutError {
    /// Create a disconnected hierarchy error
    pub fn disconnected(first: ViewId, second: ViewId) -> Self {
        Self::DisconnectedHierarchy { first, second }
    }

    /// True for errors caused by the shape of the view tree
    pub fn is_hierarchy_error(&self) -> bool {
        matches!(
            self,
            Self::DisconnectedHierarchy { .. } | Self::NoSuperview { .. } | Self::UnknownView(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disconnected_display() {
        let err = LayoutError::disconnected(ViewId(1), ViewId(4));
        assert_eq!(
            err.to_string(),
            "views #1 and #4 are not in the same hierarchy"
        );
        assert!(err.is_hierarchy_error());
    }

    #[test]
    fn test_missing_target_display() {
        let err = LayoutError::MissingTarget {
            kind: AttributeKind::LeftOffset,
        };
        assert!(err.to_string().contains("left offset"));
        assert!(!err.is_hierarchy_error());
    }

    #[test]
    fn test_solver_error_conversion() {
        let err: LayoutError = SolverError::Internal("boom".to_string()).into();
        assert!(err.to_string().contains("boom"));
    }
}
