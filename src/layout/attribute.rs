//! Attribute handles
//!
//! An [`Attribute`] binds one relationship (kind, source view, optional target
//! view) to at most one live solver constraint. Handles are vended and cached
//! by [`KeepLayout::attribute`], so asking twice for the same relationship
//! yields the same [`AttributeId`] and never a second constraint.
//!
//! Lifecycle:
//!
//! ```text
//! Vended --set_value/activate--> Active <--activate/deactivate--> Inactive
//! ```
//!
//! Setting a value on an `Inactive` attribute only stages it; the staged
//! values are restored exactly when the attribute is activated again.

use std::fmt;

use tracing::{debug, warn};

use super::engine::KeepLayout;
use super::error::LayoutError;
use super::priority::Priority;
use super::relation::{AttributeKind, Counterpart, Relation, ValueKind};
use super::solver::{AnchorRef, ConstraintId, ConstraintOrigin, LayoutConstraint};
use super::tree::ViewId;

/// Handle to an attribute owned by a [`KeepLayout`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttributeId(pub usize);

impl fmt::Display for AttributeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "attr{}", self.0)
    }
}

/// Where an attribute is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeState {
    /// Never activated; the first value set builds the constraint
    Vended,
    Active(ConstraintId),
    /// Explicitly deactivated; values are staged until reactivation
    Inactive,
}

/// One layout relationship and its staged values
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    kind: AttributeKind,
    view: ViewId,
    target: Option<ViewId>,
    owner: Option<ViewId>,
    constant: f64,
    multiplier: f64,
    relation: Relation,
    priority: Priority,
    state: AttributeState,
}

impl Attribute {
    fn new(kind: AttributeKind, view: ViewId, target: Option<ViewId>, priority: Priority) -> Self {
        let (constant, multiplier) = match kind.rule().value_kind {
            ValueKind::Constant => (kind.default_value(), 1.0),
            ValueKind::Multiplier => (0.0, kind.default_value()),
        };
        Self {
            kind,
            view,
            target,
            owner: None,
            constant,
            multiplier,
            relation: Relation::Equal,
            priority,
            state: AttributeState::Vended,
        }
    }

    pub fn kind(&self) -> AttributeKind {
        self.kind
    }

    pub fn view(&self) -> ViewId {
        self.view
    }

    pub fn target(&self) -> Option<ViewId> {
        self.target
    }

    /// View the constraint is installed on, once resolved
    pub fn owner(&self) -> Option<ViewId> {
        self.owner
    }

    /// Caller-visible value: the multiplier for ratio-like kinds, the
    /// constant for everything else
    pub fn value(&self) -> f64 {
        match self.kind.rule().value_kind {
            ValueKind::Constant => self.constant,
            ValueKind::Multiplier => self.multiplier,
        }
    }

    pub fn constant(&self) -> f64 {
        self.constant
    }

    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    pub fn relation(&self) -> Relation {
        self.relation
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn state(&self) -> AttributeState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, AttributeState::Active(_))
    }

    pub fn constraint(&self) -> Option<ConstraintId> {
        match self.state {
            AttributeState::Active(id) => Some(id),
            _ => None,
        }
    }

    /// Views this attribute depends on besides its owner
    pub(crate) fn touches(&self, view: ViewId) -> bool {
        self.view == view || self.target == Some(view) || self.owner == Some(view)
    }

    fn set_value(&mut self, value: f64) {
        match self.kind.rule().value_kind {
            ValueKind::Constant => self.constant = value,
            ValueKind::Multiplier => self.multiplier = value,
        }
    }
}

/// A pending mutation of one attribute
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Change {
    Value { value: f64, priority: Priority },
    ConstantAndMultiplier {
        constant: f64,
        multiplier: f64,
        priority: Priority,
    },
    Priority(Priority),
    Relation(Relation),
    Activate,
}

impl Change {
    fn stage(self, attribute: &mut Attribute) {
        match self {
            Self::Value { value, priority } => {
                attribute.set_value(value);
                attribute.priority = priority;
            }
            Self::ConstantAndMultiplier {
                constant,
                multiplier,
                priority,
            } => {
                attribute.constant = constant;
                attribute.multiplier = multiplier;
                attribute.priority = priority;
            }
            Self::Priority(priority) => attribute.priority = priority,
            Self::Relation(relation) => attribute.relation = relation,
            Self::Activate => {}
        }
    }

    /// Whether applying this change must touch the solver. Only a value or
    /// an explicit activation builds the constraint of a vended attribute.
    fn needs_constraint(self, state: AttributeState) -> bool {
        match self {
            Self::Activate => true,
            Self::Value { .. } | Self::ConstantAndMultiplier { .. } => {
                state != AttributeState::Inactive
            }
            Self::Priority(_) | Self::Relation(_) => matches!(state, AttributeState::Active(_)),
        }
    }
}

struct Planned {
    id: AttributeId,
    next: Attribute,
    constraint: Option<LayoutConstraint>,
}

impl KeepLayout {
    /// Vend the attribute for `(view, kind, target)`, creating it on first use.
    ///
    /// Kinds that relate two views need a target; single-view kinds must not
    /// get one.
    pub fn attribute(
        &mut self,
        view: ViewId,
        kind: AttributeKind,
        target: Option<ViewId>,
    ) -> Result<AttributeId, LayoutError> {
        match (kind.requires_target(), target) {
            (true, None) => return Err(LayoutError::MissingTarget { kind }),
            (false, Some(_)) => return Err(LayoutError::UnexpectedTarget { kind }),
            (_, Some(target)) => {
                self.tree.node(target)?;
            }
            (false, None) => {}
        }
        if let Some(id) = self.tree.node(view)?.attributes.get(&(kind, target)) {
            return Ok(*id);
        }

        let id = AttributeId(self.attributes.len());
        self.attributes.push(Attribute::new(
            kind,
            view,
            target,
            self.config.default_priority,
        ));
        self.tree.node_mut(view)?.attributes.insert((kind, target), id);
        Ok(id)
    }

    /// Read access to an attribute's staged values and state
    pub fn attribute_info(&self, id: AttributeId) -> Result<&Attribute, LayoutError> {
        self.attributes
            .get(id.0)
            .ok_or(LayoutError::UnknownAttribute(id))
    }

    pub fn value(&self, id: AttributeId) -> Result<f64, LayoutError> {
        Ok(self.attribute_info(id)?.value())
    }

    pub fn is_active(&self, id: AttributeId) -> Result<bool, LayoutError> {
        Ok(self.attribute_info(id)?.is_active())
    }

    /// Set the attribute's value and priority, building or updating its
    /// constraint unless the attribute was deactivated.
    pub fn set_value(
        &mut self,
        id: AttributeId,
        value: f64,
        priority: Priority,
    ) -> Result<(), LayoutError> {
        self.apply_changes(&[(id, Change::Value { value, priority })])
    }

    /// Set both the constant and the multiplier, whatever the kind's
    /// primary value is
    pub fn set_constant_and_multiplier(
        &mut self,
        id: AttributeId,
        constant: f64,
        multiplier: f64,
        priority: Priority,
    ) -> Result<(), LayoutError> {
        self.apply_changes(&[(
            id,
            Change::ConstantAndMultiplier {
                constant,
                multiplier,
                priority,
            },
        )])
    }

    pub fn set_priority(&mut self, id: AttributeId, priority: Priority) -> Result<(), LayoutError> {
        self.apply_changes(&[(id, Change::Priority(priority))])
    }

    pub fn set_relation(&mut self, id: AttributeId, relation: Relation) -> Result<(), LayoutError> {
        self.apply_changes(&[(id, Change::Relation(relation))])
    }

    /// Install the attribute's constraint. Activating an active attribute is
    /// a no-op.
    pub fn activate(&mut self, id: AttributeId) -> Result<(), LayoutError> {
        if self.attribute_info(id)?.is_active() {
            return Ok(());
        }
        self.apply_changes(&[(id, Change::Activate)])
    }

    /// Remove the attribute's constraint, keeping its staged values
    pub fn deactivate(&mut self, id: AttributeId) -> Result<(), LayoutError> {
        let attribute = self.attribute_info(id)?;
        let (state, owner) = (attribute.state, attribute.owner);
        if let AttributeState::Active(constraint) = state {
            self.solver.remove_constraint(constraint)?;
            if let Some(owner) = owner {
                if let Ok(node) = self.tree.node_mut(owner) {
                    node.constraints.retain(|c| *c != constraint);
                }
            }
            debug!(attribute = %id, %constraint, "deactivated");
        }
        self.attributes[id.0].state = AttributeState::Inactive;
        Ok(())
    }

    /// Apply changes to several attributes as one operation.
    ///
    /// Every constraint is resolved and compiled before anything is mutated,
    /// so hierarchy errors leave all attributes untouched. If the solver
    /// rejects one of the constraints, the members applied before it are
    /// restored.
    pub(crate) fn apply_changes(
        &mut self,
        changes: &[(AttributeId, Change)],
    ) -> Result<(), LayoutError> {
        let mut plan = Vec::with_capacity(changes.len());
        for (id, change) in changes {
            let mut next = self.attribute_info(*id)?.clone();
            change.stage(&mut next);
            let constraint = if change.needs_constraint(next.state) {
                Some(self.compile(*id, &next)?)
            } else {
                None
            };
            plan.push(Planned {
                id: *id,
                next,
                constraint,
            });
        }

        let mut applied: Vec<(AttributeId, Attribute)> = Vec::with_capacity(plan.len());
        for planned in plan {
            let previous = self.attributes[planned.id.0].clone();
            match self.commit(planned) {
                Ok(id) => applied.push((id, previous)),
                Err(err) => {
                    for (id, previous) in applied.into_iter().rev() {
                        if let Err(restore) = self.restore(id, previous) {
                            warn!(attribute = %id, error = %restore, "rollback failed");
                        }
                    }
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    /// Resolve the owner and build the constraint `attribute` describes
    fn compile(&self, id: AttributeId, attribute: &Attribute) -> Result<LayoutConstraint, LayoutError> {
        let rule = attribute.kind.rule();
        let view = attribute.view;
        self.tree.node(view)?;

        let (second, owner) = match rule.second {
            None => (None, view),
            Some((Counterpart::Itself, anchor)) => (Some(AnchorRef::new(view, anchor)), view),
            Some((Counterpart::Superview, anchor)) => {
                let superview = self.tree.superview(view)?.ok_or(LayoutError::NoSuperview {
                    view,
                    kind: attribute.kind,
                })?;
                (Some(AnchorRef::new(superview, anchor)), superview)
            }
            Some((Counterpart::Target, anchor)) => {
                let target = attribute.target.ok_or(LayoutError::MissingTarget {
                    kind: attribute.kind,
                })?;
                let owner = self.tree.common_superview(view, target)?;
                (Some(AnchorRef::new(target, anchor)), owner)
            }
        };

        let compiled = rule.compile(attribute.constant, attribute.multiplier, attribute.relation);
        Ok(LayoutConstraint {
            first: AnchorRef::new(view, rule.first),
            relation: compiled.relation,
            second,
            multiplier: compiled.multiplier,
            constant: compiled.constant,
            priority: attribute.priority,
            owner,
            origin: ConstraintOrigin::Attribute(id),
        })
    }

    fn commit(&mut self, planned: Planned) -> Result<AttributeId, LayoutError> {
        let Planned {
            id,
            mut next,
            constraint,
        } = planned;
        if let Some(spec) = constraint {
            let owner = spec.owner;
            match next.state {
                AttributeState::Active(existing) => {
                    self.solver.update_constraint(existing, spec, &self.tree)?;
                    if next.owner != Some(owner) {
                        self.move_constraint(existing, next.owner, owner)?;
                    }
                }
                AttributeState::Vended | AttributeState::Inactive => {
                    let constraint = self.solver.add_constraint(spec, &self.tree)?;
                    self.tree.node_mut(owner)?.constraints.push(constraint);
                    next.state = AttributeState::Active(constraint);
                    debug!(attribute = %id, %constraint, owner = %owner, kind = %next.kind, "activated");
                }
            }
            next.owner = Some(owner);
        }
        self.attributes[id.0] = next;
        Ok(id)
    }

    /// Put an attribute back the way it was before a failed group change
    fn restore(&mut self, id: AttributeId, previous: Attribute) -> Result<(), LayoutError> {
        let current = self.attributes[id.0].state;
        let result = self.restore_constraint(id, &previous, current);
        self.attributes[id.0] = previous;
        result
    }

    fn restore_constraint(
        &mut self,
        id: AttributeId,
        previous: &Attribute,
        current: AttributeState,
    ) -> Result<(), LayoutError> {
        match (previous.state, current) {
            (AttributeState::Active(old), AttributeState::Active(_)) => {
                let spec = self.compile(id, previous)?;
                let owner = spec.owner;
                self.solver.update_constraint(old, spec, &self.tree)?;
                let current_owner = self.attributes[id.0].owner;
                if current_owner != Some(owner) {
                    self.move_constraint(old, current_owner, owner)?;
                }
            }
            (_, AttributeState::Active(added)) => {
                self.solver.remove_constraint(added)?;
                if let Some(owner) = self.attributes[id.0].owner {
                    self.tree.node_mut(owner)?.constraints.retain(|c| *c != added);
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn move_constraint(
        &mut self,
        constraint: ConstraintId,
        from: Option<ViewId>,
        to: ViewId,
    ) -> Result<(), LayoutError> {
        if let Some(from) = from {
            if let Ok(node) = self.tree.node_mut(from) {
                node.constraints.retain(|c| *c != constraint);
            }
        }
        self.tree.node_mut(to)?.constraints.push(constraint);
        Ok(())
    }

    /// Deactivate every attribute that involves one of `views`
    pub(crate) fn teardown_attributes(&mut self, views: &[ViewId]) -> Result<(), LayoutError> {
        let doomed: Vec<_> = self
            .attributes
            .iter()
            .enumerate()
            .filter(|(_, a)| views.iter().any(|v| a.touches(*v)))
            .map(|(i, _)| AttributeId(i))
            .collect();
        for id in doomed {
            self.deactivate(id)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::types::Frame;

    const EPSILON: f64 = 0.001;

    fn setup() -> (KeepLayout, ViewId, ViewId, ViewId) {
        let mut layout = KeepLayout::new();
        let root = layout.add_root(Some("root"), Frame::new(0.0, 0.0, 300.0, 200.0));
        let a = layout.add_subview(root, Some("a")).unwrap();
        let b = layout.add_subview(root, Some("b")).unwrap();
        (layout, root, a, b)
    }

    #[test]
    fn test_same_relationship_returns_same_handle() {
        let (mut layout, _, a, b) = setup();
        let first = layout.attribute(a, AttributeKind::Width, None).unwrap();
        let second = layout.attribute(a, AttributeKind::Width, None).unwrap();
        assert_eq!(first, second);

        let to_b = layout.attribute(a, AttributeKind::LeftOffset, Some(b)).unwrap();
        let to_b_again = layout.attribute(a, AttributeKind::LeftOffset, Some(b)).unwrap();
        let from_b = layout.attribute(b, AttributeKind::LeftOffset, Some(a)).unwrap();
        assert_eq!(to_b, to_b_again);
        assert_ne!(to_b, from_b);
    }

    #[test]
    fn test_missing_and_unexpected_target() {
        let (mut layout, _, a, b) = setup();
        assert!(matches!(
            layout.attribute(a, AttributeKind::TopAlign, None),
            Err(LayoutError::MissingTarget {
                kind: AttributeKind::TopAlign
            })
        ));
        assert!(matches!(
            layout.attribute(a, AttributeKind::Height, Some(b)),
            Err(LayoutError::UnexpectedTarget { .. })
        ));
    }

    #[test]
    fn test_vending_does_not_create_constraint() {
        let (mut layout, _, a, _) = setup();
        let width = layout.attribute(a, AttributeKind::Width, None).unwrap();
        assert_eq!(layout.constraint_count(), 0);
        assert_eq!(
            layout.attribute_info(width).unwrap().state(),
            AttributeState::Vended
        );
    }

    #[test]
    fn test_first_set_value_activates() {
        let (mut layout, _, a, _) = setup();
        let width = layout.attribute(a, AttributeKind::Width, None).unwrap();
        layout.set_value(width, 120.0, Priority::REQUIRED).unwrap();

        let info = layout.attribute_info(width).unwrap();
        assert!(info.is_active());
        assert_eq!(info.owner(), Some(a));
        assert_eq!(layout.constraints_on(a).unwrap().len(), 1);
    }

    #[test]
    fn test_repeated_set_updates_single_constraint() {
        let (mut layout, root, a, b) = setup();
        let offset = layout.attribute(a, AttributeKind::LeftOffset, Some(b)).unwrap();
        layout.set_value(offset, 20.0, Priority::REQUIRED).unwrap();
        let constraint = layout.attribute_info(offset).unwrap().constraint();
        layout.set_value(offset, 5.0, Priority::REQUIRED).unwrap();

        assert_eq!(layout.constraint_count(), 1);
        assert_eq!(layout.attribute_info(offset).unwrap().constraint(), constraint);
        assert_eq!(layout.constraints_on(root).unwrap().len(), 1);
        let id = constraint.unwrap();
        assert_eq!(layout.constraint(id).unwrap().constant, 5.0);
    }

    #[test]
    fn test_inverted_value_reads_back_unchanged() {
        let (mut layout, root, a, _) = setup();
        let right = layout.attribute(a, AttributeKind::RightInset, None).unwrap();
        layout.set_value(right, 10.0, Priority::REQUIRED).unwrap();

        assert_eq!(layout.value(right).unwrap(), 10.0);
        let constraint = layout.attribute_info(right).unwrap().constraint().unwrap();
        let spec = layout.constraint(constraint).unwrap();
        assert_eq!(spec.constant, -10.0);
        assert_eq!(spec.owner, root);
    }

    #[test]
    fn test_deactivate_then_stage_then_reactivate() {
        let (mut layout, _, a, _) = setup();
        let height = layout.attribute(a, AttributeKind::Height, None).unwrap();
        layout.set_value(height, 40.0, Priority::HIGH).unwrap();
        layout.deactivate(height).unwrap();
        layout.deactivate(height).unwrap();
        assert_eq!(layout.constraint_count(), 0);

        layout.set_value(height, 70.0, Priority::LOW).unwrap();
        assert_eq!(layout.constraint_count(), 0, "inactive set only stages");

        layout.activate(height).unwrap();
        layout.activate(height).unwrap();
        assert_eq!(layout.constraint_count(), 1);
        let info = layout.attribute_info(height).unwrap();
        assert_eq!(info.value(), 70.0);
        assert_eq!(info.priority(), Priority::LOW);
    }

    #[test]
    fn test_disconnected_target_fails_without_side_effects() {
        let (mut layout, _, a, _) = setup();
        let other_root = layout.add_root(Some("other"), Frame::zero());
        let stranger = layout.add_subview(other_root, None).unwrap();
        let align = layout.attribute(a, AttributeKind::LeftAlign, Some(stranger)).unwrap();

        let err = layout.set_value(align, 3.0, Priority::REQUIRED).unwrap_err();
        assert!(matches!(err, LayoutError::DisconnectedHierarchy { .. }));
        let info = layout.attribute_info(align).unwrap();
        assert_eq!(info.state(), AttributeState::Vended);
        assert_eq!(info.value(), 0.0);
        assert_eq!(layout.constraint_count(), 0);
    }

    #[test]
    fn test_relation_and_priority_only_stage_on_fresh_handle() {
        let (mut layout, _, a, _) = setup();
        let width = layout.attribute(a, AttributeKind::Width, None).unwrap();
        layout.set_relation(width, Relation::AtMost).unwrap();
        layout.set_priority(width, Priority::LOW).unwrap();

        assert_eq!(layout.constraint_count(), 0);
        let info = layout.attribute_info(width).unwrap();
        assert_eq!(info.state(), AttributeState::Vended);
        assert_eq!(info.relation(), Relation::AtMost);
        assert_eq!(info.priority(), Priority::LOW);

        layout.set_value(width, 80.0, Priority::LOW).unwrap();
        assert_eq!(layout.constraint_count(), 1);
    }

    #[test]
    fn test_staging_relation_does_not_conflict_with_insets() {
        let (mut layout, root, a, _) = setup();
        layout
            .keep_horizontal_insets(a, 0.0, Priority::REQUIRED)
            .unwrap();
        let width = layout.keep_width(a).unwrap();
        let before = layout.constraint_count();

        layout.set_relation(width, Relation::AtMost).unwrap();
        assert_eq!(layout.constraint_count(), before);
        layout.layout_if_needed(root).unwrap();
        assert!((layout.frame(a).unwrap().width - 300.0).abs() < EPSILON);
    }

    #[test]
    fn test_inset_on_root_requires_superview() {
        let (mut layout, root, _, _) = setup();
        let inset = layout.attribute(root, AttributeKind::TopInset, None).unwrap();
        assert!(matches!(
            layout.activate(inset),
            Err(LayoutError::NoSuperview { .. })
        ));
    }

    #[test]
    fn test_relation_at_least_on_inverted_edge() {
        let (mut layout, root, a, _) = setup();
        let right = layout.attribute(a, AttributeKind::RightInset, None).unwrap();
        layout.set_relation(right, Relation::AtLeast).unwrap();
        layout.set_value(right, 30.0, Priority::REQUIRED).unwrap();
        // pull the view toward the right edge with a weaker preference
        let left = layout.attribute(a, AttributeKind::LeftInset, None).unwrap();
        layout.set_value(left, 290.0, Priority::LOW).unwrap();
        let width = layout.attribute(a, AttributeKind::Width, None).unwrap();
        layout.set_value(width, 20.0, Priority::REQUIRED).unwrap();

        layout.layout_if_needed(root).unwrap();
        let frame = layout.frame(a).unwrap();
        assert!(frame.right() <= 300.0 - 30.0 + EPSILON, "right = {}", frame.right());
    }
}
