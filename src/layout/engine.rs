//! The layout engine
//!
//! [`KeepLayout`] owns the view tree, the constraint solver, every attribute
//! vended so far and the animation timeline. Attributes are created through
//! it and mutated through it; the named `keep_*` accessors below are the
//! everyday surface.
//!
//! Layout runs in two steps:
//!
//! 1. **Constraint installation**: setting an attribute's value builds or
//!    updates its constraint on the owning view right away.
//! 2. **Layout pass**: [`KeepLayout::layout_if_needed`] solves the system and
//!    writes the solved frames back into the tree.

use std::fmt;

use tracing::{debug, warn};

use super::animation::{Animator, FrameChange, RecordingAnimator, Scheduler};
use super::attribute::{Attribute, AttributeId};
use super::config::LayoutConfig;
use super::error::LayoutError;
use super::priority::Priority;
use super::proxy::{Proxy, ProxyKind, ProxyValue};
use super::relation::{Anchor, AttributeKind};
use super::solver::{ConstraintId, ConstraintOrigin, ConstraintSolver, LayoutConstraint};
use super::tree::{ViewId, ViewTree};
use super::types::{EdgeInsets, Frame, Offset, Point, Size};

/// Attribute-based layout over a constraint solver
pub struct KeepLayout {
    pub(crate) config: LayoutConfig,
    pub(crate) tree: ViewTree,
    pub(crate) solver: ConstraintSolver,
    pub(crate) attributes: Vec<Attribute>,
    pub(crate) scheduler: Scheduler,
    pub(crate) animator: Box<dyn Animator>,
}

impl fmt::Debug for KeepLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeepLayout")
            .field("config", &self.config)
            .field("tree", &self.tree)
            .field("solver", &self.solver)
            .field("attributes", &self.attributes.len())
            .field("scheduler", &self.scheduler)
            .finish()
    }
}

impl Default for KeepLayout {
    fn default() -> Self {
        Self::new()
    }
}

impl KeepLayout {
    pub fn new() -> Self {
        Self::with_config(LayoutConfig::default())
    }

    pub fn with_config(config: LayoutConfig) -> Self {
        Self {
            config,
            tree: ViewTree::new(),
            solver: ConstraintSolver::new(),
            attributes: Vec::new(),
            scheduler: Scheduler::default(),
            animator: Box::new(RecordingAnimator::new()),
        }
    }

    /// Present animated batches with `animator`
    pub fn with_animator(mut self, animator: Box<dyn Animator>) -> Self {
        self.animator = animator;
        self
    }

    pub fn set_animator(&mut self, animator: Box<dyn Animator>) {
        self.animator = animator;
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    pub fn tree(&self) -> &ViewTree {
        &self.tree
    }
}

// ============================================================================
// Hierarchy
// ============================================================================

impl KeepLayout {
    /// Add a root view whose frame is fixed at `frame`
    pub fn add_root(&mut self, name: Option<&str>, frame: Frame) -> ViewId {
        let root = self.tree.add_root(name, frame);
        // Fresh variables cannot conflict with anything yet
        if let Err(err) = self.solver.pin_frame(root, frame) {
            warn!(view = %root, error = %err, "failed to pin root frame");
        }
        debug!(view = %root, ?name, "added root");
        root
    }

    /// Add `parent`'s last child. Until constraints say otherwise it rests
    /// at a zero frame.
    pub fn add_subview(&mut self, parent: ViewId, name: Option<&str>) -> Result<ViewId, LayoutError> {
        let view = self.tree.add_subview(parent, name)?;
        self.solver
            .register_view(view, Frame::zero(), self.config.frame_anchor_priority)?;
        debug!(%view, %parent, ?name, "added subview");
        Ok(view)
    }

    /// Move a view. Roots are pinned to `frame`; subviews only rest there
    /// when their constraints leave room.
    pub fn set_frame(&mut self, view: ViewId, frame: Frame) -> Result<(), LayoutError> {
        if self.tree.superview(view)?.is_none() {
            self.solver.pin_frame(view, frame)?;
        } else {
            self.solver.suggest_frame(view, frame)?;
        }
        self.tree.node_mut(view)?.frame = frame;
        Ok(())
    }

    /// Set the baseline as a distance below the view's top edge, or `None`
    /// for its bottom edge. Constraints aligning the baseline are rebuilt.
    pub fn set_baseline(&mut self, view: ViewId, baseline: Option<f64>) -> Result<(), LayoutError> {
        self.tree.node_mut(view)?.baseline = baseline;
        let reads_baseline = |c: &LayoutConstraint| {
            let anchors = std::iter::once(c.first).chain(c.second);
            anchors
                .filter(|a| a.view == view)
                .any(|a| a.anchor == Anchor::Baseline)
        };
        let affected: Vec<_> = self
            .solver
            .constraints()
            .into_iter()
            .filter(|(_, c)| reads_baseline(*c))
            .map(|(id, _)| id)
            .collect();
        for id in affected {
            self.solver.rebuild_constraint(id, &self.tree)?;
        }
        Ok(())
    }

    /// Remove `view` and its subtree.
    ///
    /// Every attribute whose source, target or owner is in the subtree is
    /// deactivated, and manual constraints touching it are removed.
    pub fn remove_view(&mut self, view: ViewId) -> Result<(), LayoutError> {
        let subtree = self.tree.subtree(view)?;
        self.teardown_attributes(&subtree)?;

        let manual: Vec<_> = self
            .solver
            .constraints()
            .into_iter()
            .filter(|(_, c)| subtree.contains(&c.owner) || c.views().any(|v| subtree.contains(&v)))
            .map(|(id, c)| (id, c.owner))
            .collect();
        for (id, owner) in manual {
            self.solver.remove_constraint(id)?;
            if let Ok(node) = self.tree.node_mut(owner) {
                node.constraints.retain(|c| *c != id);
            }
        }

        for id in &subtree {
            self.solver.unregister_view(*id)?;
        }
        self.tree.remove_view(view)?;
        debug!(%view, removed = subtree.len(), "removed view");
        Ok(())
    }
}

// ============================================================================
// Layout passes
// ============================================================================

impl KeepLayout {
    /// Last frame written by a layout pass
    pub fn frame(&self, view: ViewId) -> Result<Frame, LayoutError> {
        self.tree.frame(view)
    }

    /// Solve now and write frames for the hierarchy containing `view`,
    /// returning the views that moved
    pub fn layout_if_needed(&mut self, view: ViewId) -> Result<Vec<FrameChange>, LayoutError> {
        self.layout_pass(view)
    }

    pub(crate) fn layout_pass(&mut self, view: ViewId) -> Result<Vec<FrameChange>, LayoutError> {
        let root = self
            .tree
            .ancestors(view)?
            .last()
            .copied()
            .unwrap_or(view);
        let solution = self.solver.solve();
        let tolerance = self.config.frame_tolerance;

        let mut changes = Vec::new();
        for id in self.tree.subtree(root)? {
            let to = solution.frame(id);
            let node = self.tree.node_mut(id)?;
            let from = node.frame;
            if from.approx_eq(&to, tolerance) {
                continue;
            }
            node.frame = to;
            // A view left unconstrained later stays where it was laid out
            self.solver.suggest_frame(id, to)?;
            changes.push(FrameChange { view: id, from, to });
        }
        debug!(%root, changed = changes.len(), "layout pass");
        Ok(changes)
    }
}

// ============================================================================
// Constraints
// ============================================================================

impl KeepLayout {
    /// Installed constraints, attribute-managed and manual
    pub fn constraint_count(&self) -> usize {
        self.solver.len()
    }

    /// Constraints owned by `view`
    pub fn constraints_on(&self, view: ViewId) -> Result<&[ConstraintId], LayoutError> {
        Ok(&self.tree.node(view)?.constraints)
    }

    pub fn constraint(&self, id: ConstraintId) -> Option<&LayoutConstraint> {
        self.solver.constraint(id)
    }

    /// Live constraint of an attribute, if it is active
    pub fn constraint_of(&self, attribute: AttributeId) -> Result<Option<ConstraintId>, LayoutError> {
        Ok(self.attribute_info(attribute)?.constraint())
    }

    /// View the attribute's constraint was installed on
    pub fn owner_of(&self, attribute: AttributeId) -> Result<Option<ViewId>, LayoutError> {
        Ok(self.attribute_info(attribute)?.owner())
    }

    /// Install a hand-written constraint on the nearest view containing
    /// every view it reads. The `owner` and `origin` fields are overwritten.
    pub fn add_constraint_to_common_superview(
        &mut self,
        mut constraint: LayoutConstraint,
    ) -> Result<ConstraintId, LayoutError> {
        let first = constraint.first.view;
        let owner = match constraint.second {
            Some(second) => self.tree.common_superview(first, second.view)?,
            None => {
                self.tree.node(first)?;
                first
            }
        };
        constraint.owner = owner;
        constraint.origin = ConstraintOrigin::Manual;
        let id = self.solver.add_constraint(constraint, &self.tree)?;
        self.tree.node_mut(owner)?.constraints.push(id);
        Ok(id)
    }

    /// Remove a constraint from the view that owns it. Removing an
    /// attribute's constraint deactivates the attribute.
    pub fn remove_constraint_from_common_superview(
        &mut self,
        id: ConstraintId,
    ) -> Result<(), LayoutError> {
        let constraint = self
            .solver
            .constraint(id)
            .ok_or(LayoutError::UnknownConstraint(id))?;
        let owner = constraint.owner;
        if let ConstraintOrigin::Attribute(attribute) = constraint.origin {
            return self.deactivate(attribute);
        }
        self.solver.remove_constraint(id)?;
        if let Ok(node) = self.tree.node_mut(owner) {
            node.constraints.retain(|c| *c != id);
        }
        Ok(())
    }

    /// Install several hand-written constraints. Either all of them are
    /// installed or none are.
    pub fn add_constraints_to_common_superview<I>(
        &mut self,
        constraints: I,
    ) -> Result<Vec<ConstraintId>, LayoutError>
    where
        I: IntoIterator<Item = LayoutConstraint>,
    {
        let mut added = Vec::new();
        for constraint in constraints {
            match self.add_constraint_to_common_superview(constraint) {
                Ok(id) => added.push(id),
                Err(err) => {
                    for id in added.into_iter().rev() {
                        if let Err(undo) = self.remove_constraint_from_common_superview(id) {
                            warn!(constraint = %id, error = %undo, "failed to undo manual constraint");
                        }
                    }
                    return Err(err);
                }
            }
        }
        Ok(added)
    }

    /// Remove several constraints. Unknown ids are reported before anything
    /// is removed; repeated ids are removed once.
    pub fn remove_constraints_from_common_superview(
        &mut self,
        ids: &[ConstraintId],
    ) -> Result<(), LayoutError> {
        if let Some(missing) = ids.iter().find(|id| self.solver.constraint(**id).is_none()) {
            return Err(LayoutError::UnknownConstraint(*missing));
        }
        for &id in ids {
            if self.solver.constraint(id).is_some() {
                self.remove_constraint_from_common_superview(id)?;
            }
        }
        Ok(())
    }
}

// ============================================================================
// Named attributes
// ============================================================================

impl KeepLayout {
    pub fn keep_width(&mut self, view: ViewId) -> Result<AttributeId, LayoutError> {
        self.attribute(view, AttributeKind::Width, None)
    }

    pub fn keep_height(&mut self, view: ViewId) -> Result<AttributeId, LayoutError> {
        self.attribute(view, AttributeKind::Height, None)
    }

    /// Width as a multiple of the view's own height
    pub fn keep_aspect_ratio(&mut self, view: ViewId) -> Result<AttributeId, LayoutError> {
        self.attribute(view, AttributeKind::AspectRatio, None)
    }

    /// Width as a multiple of `target`'s width
    pub fn keep_width_to(&mut self, view: ViewId, target: ViewId) -> Result<AttributeId, LayoutError> {
        self.attribute(view, AttributeKind::RelativeWidth, Some(target))
    }

    pub fn keep_height_to(&mut self, view: ViewId, target: ViewId) -> Result<AttributeId, LayoutError> {
        self.attribute(view, AttributeKind::RelativeHeight, Some(target))
    }

    pub fn keep_left_inset(&mut self, view: ViewId) -> Result<AttributeId, LayoutError> {
        self.attribute(view, AttributeKind::LeftInset, None)
    }

    pub fn keep_right_inset(&mut self, view: ViewId) -> Result<AttributeId, LayoutError> {
        self.attribute(view, AttributeKind::RightInset, None)
    }

    pub fn keep_top_inset(&mut self, view: ViewId) -> Result<AttributeId, LayoutError> {
        self.attribute(view, AttributeKind::TopInset, None)
    }

    pub fn keep_bottom_inset(&mut self, view: ViewId) -> Result<AttributeId, LayoutError> {
        self.attribute(view, AttributeKind::BottomInset, None)
    }

    /// Center x as a fraction of the superview's width
    pub fn keep_horizontal_center(&mut self, view: ViewId) -> Result<AttributeId, LayoutError> {
        self.attribute(view, AttributeKind::HorizontalCenter, None)
    }

    pub fn keep_vertical_center(&mut self, view: ViewId) -> Result<AttributeId, LayoutError> {
        self.attribute(view, AttributeKind::VerticalCenter, None)
    }

    /// Gap between `target`'s right edge and this view's left edge
    pub fn keep_left_offset_to(&mut self, view: ViewId, target: ViewId) -> Result<AttributeId, LayoutError> {
        self.attribute(view, AttributeKind::LeftOffset, Some(target))
    }

    pub fn keep_right_offset_to(&mut self, view: ViewId, target: ViewId) -> Result<AttributeId, LayoutError> {
        self.attribute(view, AttributeKind::RightOffset, Some(target))
    }

    pub fn keep_top_offset_to(&mut self, view: ViewId, target: ViewId) -> Result<AttributeId, LayoutError> {
        self.attribute(view, AttributeKind::TopOffset, Some(target))
    }

    pub fn keep_bottom_offset_to(&mut self, view: ViewId, target: ViewId) -> Result<AttributeId, LayoutError> {
        self.attribute(view, AttributeKind::BottomOffset, Some(target))
    }

    pub fn keep_left_align_to(&mut self, view: ViewId, target: ViewId) -> Result<AttributeId, LayoutError> {
        self.attribute(view, AttributeKind::LeftAlign, Some(target))
    }

    pub fn keep_right_align_to(&mut self, view: ViewId, target: ViewId) -> Result<AttributeId, LayoutError> {
        self.attribute(view, AttributeKind::RightAlign, Some(target))
    }

    pub fn keep_top_align_to(&mut self, view: ViewId, target: ViewId) -> Result<AttributeId, LayoutError> {
        self.attribute(view, AttributeKind::TopAlign, Some(target))
    }

    pub fn keep_bottom_align_to(&mut self, view: ViewId, target: ViewId) -> Result<AttributeId, LayoutError> {
        self.attribute(view, AttributeKind::BottomAlign, Some(target))
    }

    /// Center x aligned to `target`'s center x
    pub fn keep_vertical_align_to(&mut self, view: ViewId, target: ViewId) -> Result<AttributeId, LayoutError> {
        self.attribute(view, AttributeKind::VerticalAlign, Some(target))
    }

    /// Center y aligned to `target`'s center y
    pub fn keep_horizontal_align_to(&mut self, view: ViewId, target: ViewId) -> Result<AttributeId, LayoutError> {
        self.attribute(view, AttributeKind::HorizontalAlign, Some(target))
    }

    pub fn keep_baseline_align_to(&mut self, view: ViewId, target: ViewId) -> Result<AttributeId, LayoutError> {
        self.attribute(view, AttributeKind::BaselineAlign, Some(target))
    }
}

// ============================================================================
// Grouped shortcuts
// ============================================================================

impl KeepLayout {
    /// Fix width and height
    pub fn keep_size(&mut self, view: ViewId, size: Size, priority: Priority) -> Result<Proxy, LayoutError> {
        self.keep_proxy(view, ProxyKind::Size, size, priority)
    }

    /// Width and height as `ratio` times `target`'s
    pub fn keep_size_to(
        &mut self,
        view: ViewId,
        target: ViewId,
        ratio: f64,
        priority: Priority,
    ) -> Result<Proxy, LayoutError> {
        self.keep_proxy(view, ProxyKind::RelativeSize(target), ratio, priority)
    }

    pub fn keep_insets(
        &mut self,
        view: ViewId,
        insets: EdgeInsets,
        priority: Priority,
    ) -> Result<Proxy, LayoutError> {
        self.keep_proxy(view, ProxyKind::Insets, insets, priority)
    }

    pub fn keep_horizontal_insets(
        &mut self,
        view: ViewId,
        inset: f64,
        priority: Priority,
    ) -> Result<Proxy, LayoutError> {
        self.keep_proxy(view, ProxyKind::HorizontalInsets, inset, priority)
    }

    pub fn keep_vertical_insets(
        &mut self,
        view: ViewId,
        inset: f64,
        priority: Priority,
    ) -> Result<Proxy, LayoutError> {
        self.keep_proxy(view, ProxyKind::VerticalInsets, inset, priority)
    }

    /// Center at `center`, given as fractions of the superview's size
    pub fn keep_center(&mut self, view: ViewId, center: Point, priority: Priority) -> Result<Proxy, LayoutError> {
        self.keep_proxy(view, ProxyKind::Center, center, priority)
    }

    /// Center in the superview at the default priority
    pub fn keep_centered(&mut self, view: ViewId) -> Result<Proxy, LayoutError> {
        let priority = self.config.default_priority;
        self.keep_centered_with_priority(view, priority)
    }

    pub fn keep_centered_with_priority(&mut self, view: ViewId, priority: Priority) -> Result<Proxy, LayoutError> {
        self.keep_center(view, Point::new(0.5, 0.5), priority)
    }

    /// Align all four edges to `target`'s, inset by `insets`
    pub fn keep_edge_align_to(
        &mut self,
        view: ViewId,
        target: ViewId,
        insets: EdgeInsets,
        priority: Priority,
    ) -> Result<Proxy, LayoutError> {
        self.keep_proxy(view, ProxyKind::EdgeAlign(target), insets, priority)
    }

    /// Align both centers to `target`'s, shifted by `offset`
    pub fn keep_center_align_to(
        &mut self,
        view: ViewId,
        target: ViewId,
        offset: Offset,
        priority: Priority,
    ) -> Result<Proxy, LayoutError> {
        self.keep_proxy(view, ProxyKind::CenterAlign(target), offset, priority)
    }

    fn keep_proxy(
        &mut self,
        view: ViewId,
        kind: ProxyKind,
        value: impl Into<ProxyValue>,
        priority: Priority,
    ) -> Result<Proxy, LayoutError> {
        let proxy = self.proxy(view, kind)?;
        self.set_proxy_value(&proxy, value, priority)?;
        Ok(proxy)
    }
}
