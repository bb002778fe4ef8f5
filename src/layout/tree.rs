//! View hierarchy and common ancestor resolution
//!
//! Views live in an arena owned by [`ViewTree`] and are referred to by
//! [`ViewId`]. Each node owns the constraints installed on it and the cache
//! of attributes it vends, keyed by relationship kind and target view.

use std::collections::HashMap;
use std::fmt;

use tracing::trace;

use super::attribute::AttributeId;
use super::error::LayoutError;
use super::relation::AttributeKind;
use super::solver::ConstraintId;
use super::types::Frame;

/// Identity of a view in a [`ViewTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewId(pub usize);

impl fmt::Display for ViewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Cache key for attributes vended by a view
pub type AttributeKey = (AttributeKind, Option<ViewId>);

/// A node in the hierarchy
#[derive(Debug, Clone, Default)]
pub struct ViewNode {
    pub name: Option<String>,
    pub parent: Option<ViewId>,
    pub children: Vec<ViewId>,
    /// Last frame written by a layout pass (or pinned, for roots)
    pub frame: Frame,
    /// Distance of the baseline below the top edge; `None` means the bottom edge
    pub baseline: Option<f64>,
    /// Constraints owned by this view
    pub constraints: Vec<ConstraintId>,
    /// Attributes whose source is this view
    pub attributes: HashMap<AttributeKey, AttributeId>,
    removed: bool,
}

/// Arena of views forming a forest of strict trees
#[derive(Debug, Default)]
pub struct ViewTree {
    nodes: Vec<ViewNode>,
}

impl ViewTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a view with no superview
    pub fn add_root(&mut self, name: Option<&str>, frame: Frame) -> ViewId {
        let id = ViewId(self.nodes.len());
        self.nodes.push(ViewNode {
            name: name.map(str::to_string),
            frame,
            ..ViewNode::default()
        });
        id
    }

    /// Add a view as the last child of `parent`
    pub fn add_subview(&mut self, parent: ViewId, name: Option<&str>) -> Result<ViewId, LayoutError> {
        self.node(parent)?;
        let id = ViewId(self.nodes.len());
        self.nodes.push(ViewNode {
            name: name.map(str::to_string),
            parent: Some(parent),
            ..ViewNode::default()
        });
        self.node_mut(parent)?.children.push(id);
        Ok(id)
    }

    /// Detach `view` and its descendants, returning the removed ids in
    /// pre-order. The ids stay reserved; looking them up afterwards fails.
    pub fn remove_view(&mut self, view: ViewId) -> Result<Vec<ViewId>, LayoutError> {
        let parent = self.node(view)?.parent;
        if let Some(parent) = parent {
            self.node_mut(parent)?.children.retain(|c| *c != view);
        }
        let removed = self.subtree(view)?;
        for id in &removed {
            let node = &mut self.nodes[id.0];
            node.removed = true;
            node.parent = None;
            node.children.clear();
        }
        Ok(removed)
    }

    /// `view` and all its descendants in pre-order
    pub fn subtree(&self, view: ViewId) -> Result<Vec<ViewId>, LayoutError> {
        let mut out = Vec::new();
        let mut stack = vec![view];
        while let Some(id) = stack.pop() {
            let node = self.node(id)?;
            out.push(id);
            stack.extend(node.children.iter().rev().copied());
        }
        Ok(out)
    }

    pub fn contains(&self, view: ViewId) -> bool {
        self.nodes.get(view.0).is_some_and(|n| !n.removed)
    }

    pub fn node(&self, view: ViewId) -> Result<&ViewNode, LayoutError> {
        match self.nodes.get(view.0) {
            Some(node) if !node.removed => Ok(node),
            _ => Err(LayoutError::UnknownView(view)),
        }
    }

    pub fn node_mut(&mut self, view: ViewId) -> Result<&mut ViewNode, LayoutError> {
        match self.nodes.get_mut(view.0) {
            Some(node) if !node.removed => Ok(node),
            _ => Err(LayoutError::UnknownView(view)),
        }
    }

    pub fn superview(&self, view: ViewId) -> Result<Option<ViewId>, LayoutError> {
        Ok(self.node(view)?.parent)
    }

    pub fn children(&self, view: ViewId) -> Result<&[ViewId], LayoutError> {
        Ok(&self.node(view)?.children)
    }

    pub fn frame(&self, view: ViewId) -> Result<Frame, LayoutError> {
        Ok(self.node(view)?.frame)
    }

    pub fn name(&self, view: ViewId) -> Option<&str> {
        self.nodes.get(view.0).and_then(|n| n.name.as_deref())
    }

    /// Find a live view by name
    pub fn find(&self, name: &str) -> Option<ViewId> {
        self.nodes
            .iter()
            .position(|n| !n.removed && n.name.as_deref() == Some(name))
            .map(ViewId)
    }

    /// Live views in creation order
    pub fn views(&self) -> impl Iterator<Item = ViewId> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| !n.removed)
            .map(|(i, _)| ViewId(i))
    }

    /// `view` followed by its superviews up to the root
    pub fn ancestors(&self, view: ViewId) -> Result<Vec<ViewId>, LayoutError> {
        let mut chain = vec![view];
        let mut current = self.node(view)?.parent;
        while let Some(id) = current {
            chain.push(id);
            current = self.node(id)?.parent;
        }
        Ok(chain)
    }

    /// True when `ancestor` is `view` or one of its superviews
    pub fn is_ancestor(&self, ancestor: ViewId, view: ViewId) -> Result<bool, LayoutError> {
        Ok(self.ancestors(view)?.contains(&ancestor))
    }

    /// Nearest view that is an ancestor of (or equal to) both arguments.
    ///
    /// When one view contains the other the outer one is returned.
    pub fn common_superview(&self, first: ViewId, second: ViewId) -> Result<ViewId, LayoutError> {
        let first_chain = self.ancestors(first)?;
        for candidate in self.ancestors(second)? {
            if first_chain.contains(&candidate) {
                trace!(%first, %second, common = %candidate, "resolved common superview");
                return Ok(candidate);
            }
        }
        Err(LayoutError::disconnected(first, second))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// root
    /// ├── a
    /// │   ├── a1
    /// │   └── a2
    /// └── b
    fn sample() -> (ViewTree, [ViewId; 5]) {
        let mut tree = ViewTree::new();
        let root = tree.add_root(Some("root"), Frame::new(0.0, 0.0, 320.0, 480.0));
        let a = tree.add_subview(root, Some("a")).unwrap();
        let a1 = tree.add_subview(a, Some("a1")).unwrap();
        let a2 = tree.add_subview(a, Some("a2")).unwrap();
        let b = tree.add_subview(root, Some("b")).unwrap();
        (tree, [root, a, a1, a2, b])
    }

    #[test]
    fn test_siblings_resolve_to_parent() {
        let (tree, [_, a, a1, a2, _]) = sample();
        assert_eq!(tree.common_superview(a1, a2).unwrap(), a);
    }

    #[test]
    fn test_cousins_resolve_to_root() {
        let (tree, [root, _, a1, _, b]) = sample();
        assert_eq!(tree.common_superview(a1, b).unwrap(), root);
        assert_eq!(tree.common_superview(b, a1).unwrap(), root);
    }

    #[test]
    fn test_ancestor_argument_is_returned_directly() {
        let (tree, [root, a, a1, _, _]) = sample();
        assert_eq!(tree.common_superview(a1, a).unwrap(), a);
        assert_eq!(tree.common_superview(a, a1).unwrap(), a);
        assert_eq!(tree.common_superview(root, a1).unwrap(), root);
    }

    #[test]
    fn test_same_view_is_its_own_common_superview() {
        let (tree, [_, _, a1, _, _]) = sample();
        assert_eq!(tree.common_superview(a1, a1).unwrap(), a1);
    }

    #[test]
    fn test_disconnected_trees_fail() {
        let (mut tree, [_, _, a1, _, _]) = sample();
        let other = tree.add_root(Some("other"), Frame::zero());
        let child = tree.add_subview(other, None).unwrap();
        let err = tree.common_superview(a1, child).unwrap_err();
        assert!(matches!(
            err,
            LayoutError::DisconnectedHierarchy { first, second } if first == a1 && second == child
        ));
    }

    #[test]
    fn test_ancestors_chain() {
        let (tree, [root, a, a1, _, _]) = sample();
        assert_eq!(tree.ancestors(a1).unwrap(), vec![a1, a, root]);
        assert!(tree.is_ancestor(root, a1).unwrap());
        assert!(!tree.is_ancestor(a1, root).unwrap());
    }

    #[test]
    fn test_remove_view_detaches_subtree() {
        let (mut tree, [root, a, a1, a2, b]) = sample();
        let removed = tree.remove_view(a).unwrap();
        assert_eq!(removed, vec![a, a1, a2]);
        assert_eq!(tree.children(root).unwrap(), &[b]);
        assert!(!tree.contains(a1));
        assert!(matches!(tree.node(a2), Err(LayoutError::UnknownView(_))));
        assert_eq!(tree.views().collect::<Vec<_>>(), vec![root, b]);
    }

    #[test]
    fn test_find_by_name() {
        let (tree, [_, _, _, a2, _]) = sample();
        assert_eq!(tree.find("a2"), Some(a2));
        assert_eq!(tree.find("missing"), None);
        assert_eq!(tree.name(a2), Some("a2"));
    }
}
