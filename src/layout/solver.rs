//! Constraint solver integration for layout computation
//!
//! This module provides a wrapper around the kasuari Cassowary constraint solver,
//! translating view-level constraints into the solver's format and extracting
//! solved frames.

use std::collections::{HashMap, HashSet};
use std::fmt;

use kasuari::{
    Constraint as KasuariConstraint, Expression, Solver as KasuariSolver, Strength,
    Variable as KasuariVariable, WeightedRelation::*,
};
use thiserror::Error;
use tracing::debug;

use super::attribute::AttributeId;
use super::priority::Priority;
use super::relation::{Anchor, Axis, Relation};
use super::tree::{ViewId, ViewTree};
use super::types::Frame;

// ============================================================================
// Variables
// ============================================================================

/// Base properties stored as solver variables. Every other anchor is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayoutProperty {
    X,
    Y,
    Width,
    Height,
}

impl LayoutProperty {
    pub fn all() -> &'static [LayoutProperty] {
        &[Self::X, Self::Y, Self::Width, Self::Height]
    }
}

/// A variable in the constraint system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LayoutVariable {
    pub view: ViewId,
    pub property: LayoutProperty,
}

impl LayoutVariable {
    pub fn new(view: ViewId, property: LayoutProperty) -> Self {
        Self { view, property }
    }
}

/// One anchor of one view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AnchorRef {
    pub view: ViewId,
    pub anchor: Anchor,
}

impl AnchorRef {
    pub fn new(view: ViewId, anchor: Anchor) -> Self {
        Self { view, anchor }
    }
}

impl fmt::Display for AnchorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:?}", self.view, self.anchor)
    }
}

// ============================================================================
// Constraints
// ============================================================================

/// Identity of a constraint installed in the solver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConstraintId(pub usize);

impl fmt::Display for ConstraintId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

/// Where a constraint came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintOrigin {
    /// Managed by an attribute handle
    Attribute(AttributeId),
    /// Added directly by the caller
    Manual,
}

/// `first (relation) multiplier × second + constant`, evaluated in the
/// coordinate space of `owner`.
///
/// Position anchors are measured from the owner's origin, so the owner's own
/// right edge equals its width. Without a `second` anchor the right-hand side
/// is just the constant.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutConstraint {
    pub first: AnchorRef,
    pub relation: Relation,
    pub second: Option<AnchorRef>,
    pub multiplier: f64,
    pub constant: f64,
    pub priority: Priority,
    pub owner: ViewId,
    pub origin: ConstraintOrigin,
}

impl LayoutConstraint {
    /// A manual `first = second + constant` constraint at required priority
    pub fn equal(first: AnchorRef, second: AnchorRef, constant: f64, owner: ViewId) -> Self {
        Self {
            first,
            relation: Relation::Equal,
            second: Some(second),
            multiplier: 1.0,
            constant,
            priority: Priority::REQUIRED,
            owner,
            origin: ConstraintOrigin::Manual,
        }
    }

    /// Views this constraint reads from
    pub fn views(&self) -> impl Iterator<Item = ViewId> {
        std::iter::once(self.first.view).chain(self.second.map(|s| s.view))
    }

    fn describe(&self) -> String {
        match self.second {
            Some(second) => format!(
                "{} {} {} * {} + {} @{}",
                self.first,
                self.relation.symbol(),
                self.multiplier,
                second,
                self.constant,
                self.priority
            ),
            None => format!(
                "{} {} {} @{}",
                self.first,
                self.relation.symbol(),
                self.constant,
                self.priority
            ),
        }
    }
}

impl fmt::Display for LayoutConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Errors from the constraint solver
#[derive(Debug, Error)]
pub enum SolverError {
    #[error("Unsatisfiable constraint: {constraint}")]
    Unsatisfiable { constraint: String },

    #[error("Unknown constraint {0}")]
    UnknownConstraint(ConstraintId),

    #[error("Internal solver error: {0}")]
    Internal(String),
}

// ============================================================================
// ConstraintSolver
// ============================================================================

struct Installed {
    spec: LayoutConstraint,
    handle: KasuariConstraint,
}

/// Wrapper around kasuari solver
pub struct ConstraintSolver {
    solver: KasuariSolver,
    /// Maps our variables to kasuari variables
    variables: HashMap<LayoutVariable, KasuariVariable>,
    /// Last solved value of each kasuari variable
    values: HashMap<KasuariVariable, f64>,
    constraints: HashMap<ConstraintId, Installed>,
    /// Required constraints holding root views at their frame
    pins: HashMap<ViewId, Vec<KasuariConstraint>>,
    /// Views whose base variables are edit variables
    registered: HashSet<ViewId>,
    next_id: usize,
}

impl fmt::Debug for ConstraintSolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstraintSolver")
            .field("variables", &self.variables.len())
            .field("constraints", &self.constraints.len())
            .field("pinned", &self.pins.len())
            .finish()
    }
}

impl ConstraintSolver {
    pub fn new() -> Self {
        Self {
            solver: KasuariSolver::new(),
            variables: HashMap::new(),
            values: HashMap::new(),
            constraints: HashMap::new(),
            pins: HashMap::new(),
            registered: HashSet::new(),
            next_id: 0,
        }
    }

    /// Get or create a kasuari variable for a base property
    fn var(&mut self, view: ViewId, property: LayoutProperty) -> KasuariVariable {
        *self
            .variables
            .entry(LayoutVariable::new(view, property))
            .or_insert_with(KasuariVariable::new)
    }

    /// Expression for `anchor` in absolute coordinates
    fn absolute_expression(&mut self, anchor: AnchorRef, baseline: Option<f64>) -> Expression {
        let view = anchor.view;
        match anchor.anchor {
            Anchor::Left => self.var(view, LayoutProperty::X).into(),
            Anchor::Top => self.var(view, LayoutProperty::Y).into(),
            Anchor::Width => self.var(view, LayoutProperty::Width).into(),
            Anchor::Height => self.var(view, LayoutProperty::Height).into(),
            Anchor::Right => {
                let x = self.var(view, LayoutProperty::X);
                let width = self.var(view, LayoutProperty::Width);
                x + width
            }
            Anchor::Bottom => {
                let y = self.var(view, LayoutProperty::Y);
                let height = self.var(view, LayoutProperty::Height);
                y + height
            }
            Anchor::CenterX => {
                // center_x = x + width / 2
                let x = self.var(view, LayoutProperty::X);
                let width = self.var(view, LayoutProperty::Width);
                x + width * 0.5
            }
            Anchor::CenterY => {
                let y = self.var(view, LayoutProperty::Y);
                let height = self.var(view, LayoutProperty::Height);
                y + height * 0.5
            }
            Anchor::Baseline => {
                let y = self.var(view, LayoutProperty::Y);
                match baseline {
                    Some(offset) => Expression::from(y) + offset,
                    None => {
                        let height = self.var(view, LayoutProperty::Height);
                        y + height
                    }
                }
            }
        }
    }

    /// Expression for `anchor` measured from the origin of `owner`
    fn expression(&mut self, anchor: AnchorRef, owner: ViewId, tree: &ViewTree) -> Expression {
        let baseline = tree.node(anchor.view).ok().and_then(|n| n.baseline);
        if anchor.anchor.is_dimension() {
            return self.absolute_expression(anchor, baseline);
        }
        if anchor.view == owner {
            // The owner's own origin is zero in its coordinate space
            let origin = match anchor.anchor.axis() {
                Axis::Horizontal => Anchor::Left,
                Axis::Vertical => Anchor::Top,
            };
            if anchor.anchor == origin {
                return Expression::from_constant(0.0);
            }
            return match anchor.anchor {
                Anchor::Right => self.var(owner, LayoutProperty::Width).into(),
                Anchor::Bottom => self.var(owner, LayoutProperty::Height).into(),
                Anchor::CenterX => Expression::from(self.var(owner, LayoutProperty::Width) * 0.5),
                Anchor::CenterY => Expression::from(self.var(owner, LayoutProperty::Height) * 0.5),
                Anchor::Baseline => match baseline {
                    Some(offset) => Expression::from_constant(offset),
                    None => self.var(owner, LayoutProperty::Height).into(),
                },
                _ => Expression::from_constant(0.0),
            };
        }
        let origin = match anchor.anchor.axis() {
            Axis::Horizontal => self.var(owner, LayoutProperty::X),
            Axis::Vertical => self.var(owner, LayoutProperty::Y),
        };
        self.absolute_expression(anchor, baseline) - origin
    }

    fn build(&mut self, spec: &LayoutConstraint, tree: &ViewTree) -> KasuariConstraint {
        let lhs = self.expression(spec.first, spec.owner, tree);
        let rhs = match spec.second {
            Some(second) => {
                spec.multiplier * self.expression(second, spec.owner, tree) + spec.constant
            }
            None => Expression::from_constant(spec.constant),
        };
        let strength = spec.priority.to_strength();
        match spec.relation {
            Relation::Equal => lhs | EQ(strength) | rhs,
            Relation::AtLeast => lhs | GE(strength) | rhs,
            Relation::AtMost => lhs | LE(strength) | rhs,
        }
    }
}

impl Default for ConstraintSolver {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Installing, updating and removing constraints
// ============================================================================

impl ConstraintSolver {
    /// Convert a kasuari error to a SolverError with context
    fn convert_kasuari_error(e: kasuari::AddConstraintError, desc: &str) -> SolverError {
        match e {
            kasuari::AddConstraintError::UnsatisfiableConstraint => SolverError::Unsatisfiable {
                constraint: desc.to_string(),
            },
            kasuari::AddConstraintError::DuplicateConstraint => {
                SolverError::Internal(format!("Duplicate constraint: {}", desc))
            }
            kasuari::AddConstraintError::InternalSolverError(msg) => {
                SolverError::Internal(format!("Internal solver error for {}: {}", desc, msg))
            }
        }
    }

    /// Add a constraint to the solver
    pub fn add_constraint(
        &mut self,
        spec: LayoutConstraint,
        tree: &ViewTree,
    ) -> Result<ConstraintId, SolverError> {
        let handle = self.build(&spec, tree);
        self.solver
            .add_constraint(handle.clone())
            .map_err(|e| Self::convert_kasuari_error(e, &spec.describe()))?;
        let id = ConstraintId(self.next_id);
        self.next_id += 1;
        debug!(constraint = %id, "added {}", spec);
        self.constraints.insert(id, Installed { spec, handle });
        Ok(id)
    }

    /// Replace the constraint behind `id`, keeping its identity.
    ///
    /// The solver cannot edit a constraint in place, so the old one is
    /// removed and the new one added. If the new one is rejected the old one
    /// is put back and the error returned.
    pub fn update_constraint(
        &mut self,
        id: ConstraintId,
        spec: LayoutConstraint,
        tree: &ViewTree,
    ) -> Result<(), SolverError> {
        let current = self.constraint(id).ok_or(SolverError::UnknownConstraint(id))?;
        if *current == spec {
            return Ok(());
        }
        self.replace(id, spec, tree)?;
        if let Some(spec) = self.constraint(id) {
            debug!(constraint = %id, "updated to {}", spec);
        }
        Ok(())
    }

    /// Rebuild a constraint from its description after the geometry it
    /// reads (a baseline) changed
    pub fn rebuild_constraint(&mut self, id: ConstraintId, tree: &ViewTree) -> Result<(), SolverError> {
        let spec = self
            .constraint(id)
            .cloned()
            .ok_or(SolverError::UnknownConstraint(id))?;
        self.replace(id, spec, tree)
    }

    fn replace(
        &mut self,
        id: ConstraintId,
        spec: LayoutConstraint,
        tree: &ViewTree,
    ) -> Result<(), SolverError> {
        let old = self
            .constraints
            .get(&id)
            .map(|installed| installed.handle.clone())
            .ok_or(SolverError::UnknownConstraint(id))?;
        self.solver
            .remove_constraint(&old)
            .map_err(|e| SolverError::Internal(format!("Failed to remove {}: {}", id, e)))?;

        let handle = self.build(&spec, tree);
        if let Err(e) = self.solver.add_constraint(handle.clone()) {
            self.solver.add_constraint(old).map_err(|restore| {
                SolverError::Internal(format!("Failed to restore {}: {}", id, restore))
            })?;
            return Err(Self::convert_kasuari_error(e, &spec.describe()));
        }
        self.constraints.insert(id, Installed { spec, handle });
        Ok(())
    }

    /// Remove a constraint, returning what it was
    pub fn remove_constraint(&mut self, id: ConstraintId) -> Result<LayoutConstraint, SolverError> {
        let installed = self
            .constraints
            .remove(&id)
            .ok_or(SolverError::UnknownConstraint(id))?;
        self.solver
            .remove_constraint(&installed.handle)
            .map_err(|e| SolverError::Internal(format!("Failed to remove {}: {}", id, e)))?;
        debug!(constraint = %id, "removed {}", installed.spec);
        Ok(installed.spec)
    }

    pub fn constraint(&self, id: ConstraintId) -> Option<&LayoutConstraint> {
        self.constraints.get(&id).map(|installed| &installed.spec)
    }

    /// Installed constraints in installation order
    pub fn constraints(&self) -> Vec<(ConstraintId, &LayoutConstraint)> {
        let mut all: Vec<_> = self
            .constraints
            .iter()
            .map(|(id, installed)| (*id, &installed.spec))
            .collect();
        all.sort_by_key(|(id, _)| *id);
        all
    }

    pub fn has_constraint(&self, id: ConstraintId) -> bool {
        self.constraints.contains_key(&id)
    }

    /// Number of installed constraints, excluding root frame pins
    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }
}

// ============================================================================
// View registration and frame pinning
// ============================================================================

impl ConstraintSolver {
    /// Hold a view near `frame` with an edit variable per base property.
    ///
    /// Views that are not fully constrained stay where they are instead of
    /// collapsing to the origin.
    pub fn register_view(
        &mut self,
        view: ViewId,
        frame: Frame,
        anchor: Priority,
    ) -> Result<(), SolverError> {
        if !self.registered.insert(view) {
            return Ok(());
        }
        let strength = if anchor.is_required() {
            (anchor - 1.0).to_strength()
        } else {
            anchor.to_strength()
        };
        for (property, value) in Self::frame_values(frame) {
            let kvar = self.var(view, property);
            self.solver
                .add_edit_variable(kvar, strength)
                .map_err(|e| SolverError::Internal(format!("Failed to add edit variable: {}", e)))?;
            self.solver
                .suggest_value(kvar, value)
                .map_err(|e| SolverError::Internal(format!("Failed to suggest value: {}", e)))?;
        }
        Ok(())
    }

    /// Move the resting frame of a registered view to `frame`
    pub fn suggest_frame(&mut self, view: ViewId, frame: Frame) -> Result<(), SolverError> {
        if !self.registered.contains(&view) {
            return Ok(());
        }
        for (property, value) in Self::frame_values(frame) {
            let kvar = self.var(view, property);
            self.solver
                .suggest_value(kvar, value)
                .map_err(|e| SolverError::Internal(format!("Failed to suggest value: {}", e)))?;
        }
        Ok(())
    }

    /// Drop the edit variables and pins of a view that left the hierarchy
    pub fn unregister_view(&mut self, view: ViewId) -> Result<(), SolverError> {
        self.unpin(view)?;
        if !self.registered.remove(&view) {
            return Ok(());
        }
        for property in LayoutProperty::all() {
            let kvar = self.var(view, *property);
            self.solver.remove_edit_variable(kvar).map_err(|e| {
                SolverError::Internal(format!("Failed to remove edit variable: {}", e))
            })?;
        }
        Ok(())
    }

    /// Fix a root view's frame with required constraints. A rejected frame
    /// leaves the previous pins in place.
    pub fn pin_frame(&mut self, view: ViewId, frame: Frame) -> Result<(), SolverError> {
        let previous = self.pins.remove(&view).unwrap_or_default();
        self.remove_pins(view, &previous)?;

        let mut pins = Vec::with_capacity(4);
        for (property, value) in Self::frame_values(frame) {
            let kvar = self.var(view, property);
            let pin = kvar | EQ(Strength::REQUIRED) | value;
            if let Err(e) = self.solver.add_constraint(pin.clone()) {
                let err = Self::convert_kasuari_error(e, &format!("{}.{:?} = {}", view, property, value));
                self.remove_pins(view, &pins)?;
                for old in &previous {
                    self.solver.add_constraint(old.clone()).map_err(|e| {
                        SolverError::Internal(format!("Failed to restore pin on {}: {}", view, e))
                    })?;
                }
                self.pins.insert(view, previous);
                return Err(err);
            }
            pins.push(pin);
        }
        self.pins.insert(view, pins);
        Ok(())
    }

    fn unpin(&mut self, view: ViewId) -> Result<(), SolverError> {
        let pins = self.pins.remove(&view).unwrap_or_default();
        self.remove_pins(view, &pins)
    }

    fn remove_pins(&mut self, view: ViewId, pins: &[KasuariConstraint]) -> Result<(), SolverError> {
        for pin in pins {
            self.solver
                .remove_constraint(pin)
                .map_err(|e| SolverError::Internal(format!("Failed to unpin {}: {}", view, e)))?;
        }
        Ok(())
    }

    fn frame_values(frame: Frame) -> [(LayoutProperty, f64); 4] {
        [
            (LayoutProperty::X, frame.x),
            (LayoutProperty::Y, frame.y),
            (LayoutProperty::Width, frame.width),
            (LayoutProperty::Height, frame.height),
        ]
    }
}

// ============================================================================
// Solution
// ============================================================================

/// Solution from the constraint solver
#[derive(Debug, Clone, Default)]
pub struct Solution {
    pub values: HashMap<LayoutVariable, f64>,
}

impl Solution {
    /// Get value for a variable
    pub fn get(&self, var: &LayoutVariable) -> Option<f64> {
        self.values.get(var).copied()
    }

    /// Frame of a view; properties the solver never touched read as zero
    pub fn frame(&self, view: ViewId) -> Frame {
        let value = |property| {
            self.get(&LayoutVariable::new(view, property))
                .unwrap_or(0.0)
        };
        Frame::new(
            value(LayoutProperty::X),
            value(LayoutProperty::Y),
            value(LayoutProperty::Width),
            value(LayoutProperty::Height),
        )
    }
}

impl ConstraintSolver {
    /// Solve the constraint system
    pub fn solve(&mut self) -> Solution {
        // kasuari only reports variables that changed since the last fetch
        for (kvar, value) in self.solver.fetch_changes() {
            self.values.insert(*kvar, *value);
        }

        let values = self
            .variables
            .iter()
            .map(|(our_var, kvar)| (*our_var, self.values.get(kvar).copied().unwrap_or(0.0)))
            .collect();
        Solution { values }
    }
}
