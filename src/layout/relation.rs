//! Relationship factory
//!
//! Every [`AttributeKind`] maps to one fixed [`RelationRule`]: which anchor of
//! the source view is constrained, what it is related to, whether the caller's
//! value is a constant or a multiplier, and whether the value is applied with
//! inverted sign. Sign inversion is declared here once so that callers can
//! always read positive values as "inward" or "forward" on every edge.

use std::fmt;

use serde::Deserialize;

/// Geometric anchor of a view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Anchor {
    Left,
    Right,
    Top,
    Bottom,
    Width,
    Height,
    CenterX,
    CenterY,
    Baseline,
}

/// Axis an anchor lies on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Horizontal,
    Vertical,
}

impl Anchor {
    pub fn axis(self) -> Axis {
        match self {
            Self::Left | Self::Right | Self::Width | Self::CenterX => Axis::Horizontal,
            Self::Top | Self::Bottom | Self::Height | Self::CenterY | Self::Baseline => {
                Axis::Vertical
            }
        }
    }

    /// Dimensions do not depend on where the view sits
    pub fn is_dimension(self) -> bool {
        matches!(self, Self::Width | Self::Height)
    }
}

/// Relation between the two sides of a constraint, as the caller sees it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Relation {
    #[default]
    Equal,
    AtLeast,
    AtMost,
}

impl Relation {
    /// The relation obtained by multiplying both sides by -1
    pub fn flipped(self) -> Self {
        match self {
            Self::Equal => Self::Equal,
            Self::AtLeast => Self::AtMost,
            Self::AtMost => Self::AtLeast,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Equal => "=",
            Self::AtLeast => ">=",
            Self::AtMost => "<=",
        }
    }
}

/// Which view the right-hand side of a constraint refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counterpart {
    /// The source view itself
    Itself,
    /// The source view's superview
    Superview,
    /// A second view supplied by the caller
    Target,
}

/// How the caller's value enters the constraint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Constant,
    Multiplier,
}

/// Closed vocabulary of layout relationships
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeKind {
    Width,
    Height,
    AspectRatio,
    RelativeWidth,
    RelativeHeight,
    LeftInset,
    RightInset,
    TopInset,
    BottomInset,
    HorizontalCenter,
    VerticalCenter,
    LeftOffset,
    RightOffset,
    TopOffset,
    BottomOffset,
    LeftAlign,
    RightAlign,
    TopAlign,
    BottomAlign,
    VerticalAlign,
    HorizontalAlign,
    BaselineAlign,
}

/// Fixed mapping from a kind to the constraint it produces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelationRule {
    pub first: Anchor,
    pub second: Option<(Counterpart, Anchor)>,
    pub value_kind: ValueKind,
    pub inverted: bool,
}

/// A rule applied to concrete values, ready for the solver.
///
/// Reads as `first (relation) multiplier × second + constant`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompiledRelation {
    pub relation: Relation,
    pub multiplier: f64,
    pub constant: f64,
}

impl RelationRule {
    const fn new(
        first: Anchor,
        second: Option<(Counterpart, Anchor)>,
        value_kind: ValueKind,
        inverted: bool,
    ) -> Self {
        Self {
            first,
            second,
            value_kind,
            inverted,
        }
    }

    pub fn requires_target(&self) -> bool {
        matches!(self.second, Some((Counterpart::Target, _)))
    }

    pub fn requires_superview(&self) -> bool {
        matches!(self.second, Some((Counterpart::Superview, _)))
    }

    /// Apply sign inversion to caller-visible values
    pub fn compile(&self, constant: f64, multiplier: f64, relation: Relation) -> CompiledRelation {
        if self.inverted {
            CompiledRelation {
                relation: relation.flipped(),
                multiplier,
                constant: -constant,
            }
        } else {
            CompiledRelation {
                relation,
                multiplier,
                constant,
            }
        }
    }
}

impl AttributeKind {
    pub const ALL: [AttributeKind; 22] = [
        Self::Width,
        Self::Height,
        Self::AspectRatio,
        Self::RelativeWidth,
        Self::RelativeHeight,
        Self::LeftInset,
        Self::RightInset,
        Self::TopInset,
        Self::BottomInset,
        Self::HorizontalCenter,
        Self::VerticalCenter,
        Self::LeftOffset,
        Self::RightOffset,
        Self::TopOffset,
        Self::BottomOffset,
        Self::LeftAlign,
        Self::RightAlign,
        Self::TopAlign,
        Self::BottomAlign,
        Self::VerticalAlign,
        Self::HorizontalAlign,
        Self::BaselineAlign,
    ];

    pub fn rule(self) -> RelationRule {
        use Anchor::*;
        use Counterpart::*;
        use ValueKind::*;

        match self {
            Self::Width => RelationRule::new(Width, None, Constant, false),
            Self::Height => RelationRule::new(Height, None, Constant, false),
            Self::AspectRatio => RelationRule::new(Width, Some((Itself, Height)), Multiplier, false),
            Self::RelativeWidth => RelationRule::new(Width, Some((Target, Width)), Multiplier, false),
            Self::RelativeHeight => {
                RelationRule::new(Height, Some((Target, Height)), Multiplier, false)
            }

            Self::LeftInset => RelationRule::new(Left, Some((Superview, Left)), Constant, false),
            Self::RightInset => RelationRule::new(Right, Some((Superview, Right)), Constant, true),
            Self::TopInset => RelationRule::new(Top, Some((Superview, Top)), Constant, false),
            Self::BottomInset => {
                RelationRule::new(Bottom, Some((Superview, Bottom)), Constant, true)
            }

            // Relative position: 0 is the leading edge, 1 the trailing edge
            Self::HorizontalCenter => {
                RelationRule::new(CenterX, Some((Superview, Right)), Multiplier, false)
            }
            Self::VerticalCenter => {
                RelationRule::new(CenterY, Some((Superview, Bottom)), Multiplier, false)
            }

            Self::LeftOffset => RelationRule::new(Left, Some((Target, Right)), Constant, false),
            Self::RightOffset => RelationRule::new(Right, Some((Target, Left)), Constant, true),
            Self::TopOffset => RelationRule::new(Top, Some((Target, Bottom)), Constant, false),
            Self::BottomOffset => RelationRule::new(Bottom, Some((Target, Top)), Constant, true),

            Self::LeftAlign => RelationRule::new(Left, Some((Target, Left)), Constant, false),
            Self::RightAlign => RelationRule::new(Right, Some((Target, Right)), Constant, true),
            Self::TopAlign => RelationRule::new(Top, Some((Target, Top)), Constant, false),
            Self::BottomAlign => RelationRule::new(Bottom, Some((Target, Bottom)), Constant, true),
            Self::VerticalAlign => {
                RelationRule::new(CenterX, Some((Target, CenterX)), Constant, false)
            }
            Self::HorizontalAlign => {
                RelationRule::new(CenterY, Some((Target, CenterY)), Constant, true)
            }
            Self::BaselineAlign => {
                RelationRule::new(Baseline, Some((Target, Baseline)), Constant, false)
            }
        }
    }

    pub fn requires_target(self) -> bool {
        self.rule().requires_target()
    }

    /// Value a freshly vended attribute of this kind starts with
    pub fn default_value(self) -> f64 {
        match self {
            Self::HorizontalCenter | Self::VerticalCenter => 0.5,
            kind if kind.rule().value_kind == ValueKind::Multiplier => 1.0,
            _ => 0.0,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Width => "width",
            Self::Height => "height",
            Self::AspectRatio => "aspect ratio",
            Self::RelativeWidth => "relative width",
            Self::RelativeHeight => "relative height",
            Self::LeftInset => "left inset",
            Self::RightInset => "right inset",
            Self::TopInset => "top inset",
            Self::BottomInset => "bottom inset",
            Self::HorizontalCenter => "horizontal center",
            Self::VerticalCenter => "vertical center",
            Self::LeftOffset => "left offset",
            Self::RightOffset => "right offset",
            Self::TopOffset => "top offset",
            Self::BottomOffset => "bottom offset",
            Self::LeftAlign => "left align",
            Self::RightAlign => "right align",
            Self::TopAlign => "top align",
            Self::BottomAlign => "bottom align",
            Self::VerticalAlign => "vertical align",
            Self::HorizontalAlign => "horizontal align",
            Self::BaselineAlign => "baseline align",
        }
    }

    /// Parse the kebab-case form of [`AttributeKind::name`]
    pub fn from_name(name: &str) -> Option<Self> {
        let normalized = name.trim().replace(['-', '_'], " ");
        Self::ALL.into_iter().find(|kind| kind.name() == normalized)
    }
}

impl fmt::Display for AttributeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
