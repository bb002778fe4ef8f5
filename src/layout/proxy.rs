//! Grouped attributes
//!
//! A [`Proxy`] groups attributes that share one meaning ("size" is width and
//! height) so that a single call sets all of them. Members are always visited
//! in grouping order, and a proxy mutation either applies to every member or
//! to none.

use super::attribute::{AttributeId, Change};
use super::engine::KeepLayout;
use super::error::LayoutError;
use super::priority::Priority;
use super::relation::{AttributeKind, Relation};
use super::tree::ViewId;
use super::types::{EdgeInsets, Offset, Point, Size};

/// The groupings a view can vend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProxyKind {
    /// Width, height
    Size,
    /// Width and height relative to another view
    RelativeSize(ViewId),
    /// Left, right, top, bottom insets to the superview
    Insets,
    HorizontalInsets,
    VerticalInsets,
    /// Horizontal and vertical relative position in the superview
    Center,
    /// Left, right, top, bottom edges aligned to another view
    EdgeAlign(ViewId),
    /// Vertical (center x) and horizontal (center y) alignment to another view
    CenterAlign(ViewId),
}

impl ProxyKind {
    /// Member kinds in grouping order, with their target view
    pub fn members(self) -> Vec<(AttributeKind, Option<ViewId>)> {
        use AttributeKind::*;

        let own = |kinds: &[AttributeKind]| -> Vec<_> { kinds.iter().map(|k| (*k, None)).collect() };
        let to = |kinds: &[AttributeKind], target: ViewId| -> Vec<_> {
            kinds.iter().map(|k| (*k, Some(target))).collect()
        };
        match self {
            Self::Size => own(&[Width, Height]),
            Self::RelativeSize(target) => to(&[RelativeWidth, RelativeHeight], target),
            Self::Insets => own(&[LeftInset, RightInset, TopInset, BottomInset]),
            Self::HorizontalInsets => own(&[LeftInset, RightInset]),
            Self::VerticalInsets => own(&[TopInset, BottomInset]),
            Self::Center => own(&[HorizontalCenter, VerticalCenter]),
            Self::EdgeAlign(target) => to(&[LeftAlign, RightAlign, TopAlign, BottomAlign], target),
            Self::CenterAlign(target) => to(&[VerticalAlign, HorizontalAlign], target),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Size => "size",
            Self::RelativeSize(_) => "relative size",
            Self::Insets => "insets",
            Self::HorizontalInsets => "horizontal insets",
            Self::VerticalInsets => "vertical insets",
            Self::Center => "center",
            Self::EdgeAlign(_) => "edge align",
            Self::CenterAlign(_) => "center align",
        }
    }
}

/// Value accepted by a proxy: one scalar for every member, or a structured
/// value whose fields map one-to-one onto the members
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProxyValue {
    Scalar(f64),
    Size(Size),
    Insets(EdgeInsets),
    Point(Point),
    Offset(Offset),
}

impl ProxyValue {
    fn components(&self) -> usize {
        match self {
            Self::Scalar(_) => 1,
            Self::Size(_) | Self::Point(_) | Self::Offset(_) => 2,
            Self::Insets(_) => 4,
        }
    }

    /// The field of this value that belongs to a member of `kind`
    fn component_for(&self, kind: AttributeKind) -> Option<f64> {
        use AttributeKind::*;

        match (self, kind) {
            (Self::Scalar(v), _) => Some(*v),
            (Self::Size(s), Width | RelativeWidth) => Some(s.width),
            (Self::Size(s), Height | RelativeHeight) => Some(s.height),
            (Self::Insets(i), LeftInset | LeftAlign) => Some(i.left),
            (Self::Insets(i), RightInset | RightAlign) => Some(i.right),
            (Self::Insets(i), TopInset | TopAlign) => Some(i.top),
            (Self::Insets(i), BottomInset | BottomAlign) => Some(i.bottom),
            (Self::Point(p), HorizontalCenter) => Some(p.x),
            (Self::Point(p), VerticalCenter) => Some(p.y),
            (Self::Offset(o), VerticalAlign) => Some(o.horizontal),
            (Self::Offset(o), HorizontalAlign) => Some(o.vertical),
            _ => None,
        }
    }
}

impl From<f64> for ProxyValue {
    fn from(value: f64) -> Self {
        Self::Scalar(value)
    }
}

impl From<Size> for ProxyValue {
    fn from(value: Size) -> Self {
        Self::Size(value)
    }
}

impl From<EdgeInsets> for ProxyValue {
    fn from(value: EdgeInsets) -> Self {
        Self::Insets(value)
    }
}

impl From<Point> for ProxyValue {
    fn from(value: Point) -> Self {
        Self::Point(value)
    }
}

impl From<Offset> for ProxyValue {
    fn from(value: Offset) -> Self {
        Self::Offset(value)
    }
}

/// An ordered group of attributes vended by one view
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proxy {
    kind: ProxyKind,
    view: ViewId,
    members: Vec<AttributeId>,
}

impl Proxy {
    pub fn kind(&self) -> ProxyKind {
        self.kind
    }

    pub fn view(&self) -> ViewId {
        self.view
    }

    /// Member handles in grouping order
    pub fn members(&self) -> &[AttributeId] {
        &self.members
    }
}

impl KeepLayout {
    /// Vend the proxy of `kind` for `view`; members come from the view's
    /// attribute cache, so they are the same handles the single accessors return
    pub fn proxy(&mut self, view: ViewId, kind: ProxyKind) -> Result<Proxy, LayoutError> {
        let members = kind
            .members()
            .into_iter()
            .map(|(member, target)| self.attribute(view, member, target))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Proxy {
            kind,
            view,
            members,
        })
    }

    /// Set every member from `value` at `priority`
    pub fn set_proxy_value(
        &mut self,
        proxy: &Proxy,
        value: impl Into<ProxyValue>,
        priority: Priority,
    ) -> Result<(), LayoutError> {
        let value = value.into();
        let values = self.distribute(proxy, value)?;
        let changes: Vec<_> = proxy
            .members
            .iter()
            .zip(values)
            .map(|(id, value)| (*id, Change::Value { value, priority }))
            .collect();
        self.apply_changes(&changes)
    }

    pub fn set_proxy_priority(&mut self, proxy: &Proxy, priority: Priority) -> Result<(), LayoutError> {
        let changes: Vec<_> = proxy
            .members
            .iter()
            .map(|id| (*id, Change::Priority(priority)))
            .collect();
        self.apply_changes(&changes)
    }

    pub fn set_proxy_relation(&mut self, proxy: &Proxy, relation: Relation) -> Result<(), LayoutError> {
        let changes: Vec<_> = proxy
            .members
            .iter()
            .map(|id| (*id, Change::Relation(relation)))
            .collect();
        self.apply_changes(&changes)
    }

    pub fn activate_proxy(&mut self, proxy: &Proxy) -> Result<(), LayoutError> {
        let mut changes = Vec::with_capacity(proxy.members.len());
        for id in &proxy.members {
            if !self.is_active(*id)? {
                changes.push((*id, Change::Activate));
            }
        }
        self.apply_changes(&changes)
    }

    pub fn deactivate_proxy(&mut self, proxy: &Proxy) -> Result<(), LayoutError> {
        for id in &proxy.members {
            self.attribute_info(*id)?;
        }
        for id in &proxy.members {
            self.deactivate(*id)?;
        }
        Ok(())
    }

    /// Current caller-visible value of every member, in grouping order
    pub fn proxy_values(&self, proxy: &Proxy) -> Result<Vec<f64>, LayoutError> {
        proxy.members.iter().map(|id| self.value(*id)).collect()
    }

    fn distribute(&self, proxy: &Proxy, value: ProxyValue) -> Result<Vec<f64>, LayoutError> {
        let arity_error = || LayoutError::ValueArity {
            kind: proxy.kind.name(),
            expected: proxy.members.len(),
            found: value.components(),
        };
        if !matches!(value, ProxyValue::Scalar(_)) && value.components() != proxy.members.len() {
            return Err(arity_error());
        }
        proxy
            .members
            .iter()
            .map(|id| {
                let kind = self.attribute_info(*id)?.kind();
                value.component_for(kind).ok_or_else(arity_error)
            })
            .collect()
    }
}
