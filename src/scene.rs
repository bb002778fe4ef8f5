//! Scene descriptions
//!
//! A scene is a TOML document declaring a view hierarchy and the
//! relationships to keep between its views:
//!
//! ```toml
//! [[view]]
//! name = "screen"
//! frame = { x = 0.0, y = 0.0, width = 320.0, height = 480.0 }
//!
//! [[view]]
//! name = "card"
//! parent = "screen"
//!
//! [[rule]]
//! view = "card"
//! keep = "insets"
//! value = [20.0, 16.0, 20.0, 16.0]   # top, left, bottom, right
//! ```
//!
//! `keep` is an attribute name (`width`, `left-offset`, ...) or a grouping
//! (`size`, `insets`, `center`, `edge-align`, ...). Groupings take either a
//! single number for every member or a list with one entry per field.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::error::SceneError;
use crate::layout::{
    AttributeKind, EdgeInsets, Frame, KeepLayout, LayoutConfig, LayoutError, Offset, Point,
    Priority, ProxyKind, ProxyValue, Relation, Size, ViewId,
};

/// One view declaration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ViewSpec {
    pub name: String,
    /// Views without a parent are roots and need a frame
    pub parent: Option<String>,
    pub frame: Option<Frame>,
    /// Distance of the baseline below the top edge
    pub baseline: Option<f64>,
}

/// One relationship to keep
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleSpec {
    pub view: String,
    pub keep: String,
    /// Target view for relationships between two views
    pub to: Option<String>,
    pub value: Option<RuleValue>,
    pub priority: Option<Priority>,
    pub relation: Option<Relation>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RuleValue {
    Number(f64),
    List(Vec<f64>),
}

/// A parsed scene, not yet laid out
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Scene {
    #[serde(default, rename = "view")]
    pub views: Vec<ViewSpec>,
    #[serde(default, rename = "rule")]
    pub rules: Vec<RuleSpec>,
}

/// What a rule's `keep` resolved to
enum Keep {
    Attribute(AttributeKind),
    Proxy(ProxyKind),
}

impl Scene {
    /// Load a scene from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, SceneError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Load a scene from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self, SceneError> {
        Ok(toml::from_str(content)?)
    }

    /// Create the views and apply every rule in order
    pub fn build(&self, config: LayoutConfig) -> Result<LaidOutScene, SceneError> {
        let mut layout = KeepLayout::with_config(config);
        let mut names: HashMap<String, ViewId> = HashMap::new();
        let mut order = Vec::with_capacity(self.views.len());

        for spec in &self.views {
            if names.contains_key(&spec.name) {
                return Err(SceneError::DuplicateView(spec.name.clone()));
            }
            let view = match &spec.parent {
                None => layout.add_root(Some(&spec.name), spec.frame.unwrap_or_default()),
                Some(parent) => {
                    let parent = lookup(&names, parent)?;
                    let view = layout.add_subview(parent, Some(&spec.name))?;
                    if let Some(frame) = spec.frame {
                        layout.set_frame(view, frame)?;
                    }
                    view
                }
            };
            if spec.baseline.is_some() {
                layout.set_baseline(view, spec.baseline)?;
            }
            names.insert(spec.name.clone(), view);
            order.push(view);
        }

        for (index, rule) in self.rules.iter().enumerate() {
            apply_rule(&mut layout, &names, index, rule)?;
        }

        let roots: Vec<_> = order
            .iter()
            .copied()
            .filter(|v| matches!(layout.tree().superview(*v), Ok(None)))
            .collect();
        for root in &roots {
            layout.layout_if_needed(*root)?;
        }
        debug!(views = order.len(), rules = self.rules.len(), "scene laid out");
        Ok(LaidOutScene { layout, roots })
    }
}

fn lookup(names: &HashMap<String, ViewId>, name: &str) -> Result<ViewId, SceneError> {
    names
        .get(name)
        .copied()
        .ok_or_else(|| SceneError::UnknownView(name.to_string()))
}

fn resolve_keep(keep: &str, target: Option<ViewId>) -> Result<Keep, SceneError> {
    if let Some(kind) = AttributeKind::from_name(keep) {
        return Ok(Keep::Attribute(kind));
    }
    let needs_target = |make: fn(ViewId) -> ProxyKind| {
        target.map(make).ok_or_else(|| SceneError::InvalidRule {
            rule: 0,
            keep: keep.to_string(),
            message: "requires a target view (`to`)".to_string(),
        })
    };
    let kind = match keep.trim().replace('_', "-").as_str() {
        "size" => ProxyKind::Size,
        "relative-size" => needs_target(ProxyKind::RelativeSize)?,
        "insets" => ProxyKind::Insets,
        "horizontal-insets" => ProxyKind::HorizontalInsets,
        "vertical-insets" => ProxyKind::VerticalInsets,
        "center" => ProxyKind::Center,
        "edge-align" => needs_target(ProxyKind::EdgeAlign)?,
        "center-align" => needs_target(ProxyKind::CenterAlign)?,
        _ => return Err(SceneError::UnknownKeep(keep.to_string())),
    };
    Ok(Keep::Proxy(kind))
}

/// Turn a rule value into the structured value a grouping expects
fn proxy_value(kind: ProxyKind, value: &RuleValue) -> Option<ProxyValue> {
    let list = match value {
        RuleValue::Number(v) => return Some(ProxyValue::Scalar(*v)),
        RuleValue::List(list) => list.as_slice(),
    };
    match (kind, list) {
        (ProxyKind::Size | ProxyKind::RelativeSize(_), [width, height]) => {
            Some(Size::new(*width, *height).into())
        }
        (ProxyKind::Insets | ProxyKind::EdgeAlign(_), [top, left, bottom, right]) => {
            Some(EdgeInsets::new(*top, *left, *bottom, *right).into())
        }
        (ProxyKind::Center, [x, y]) => Some(Point::new(*x, *y).into()),
        (ProxyKind::CenterAlign(_), [horizontal, vertical]) => {
            Some(Offset::new(*horizontal, *vertical).into())
        }
        _ => None,
    }
}

/// Stage relation, value and priority on an inactive handle, then activate,
/// so the solver only ever sees the finished constraint
fn apply_rule(
    layout: &mut KeepLayout,
    names: &HashMap<String, ViewId>,
    index: usize,
    rule: &RuleSpec,
) -> Result<(), SceneError> {
    let invalid = |message: &str| SceneError::InvalidRule {
        rule: index,
        keep: rule.keep.clone(),
        message: message.to_string(),
    };
    let view = lookup(names, &rule.view)?;
    let target = rule.to.as_deref().map(|t| lookup(names, t)).transpose()?;
    let priority = rule.priority.unwrap_or(layout.config().default_priority);

    let keep = match resolve_keep(&rule.keep, target) {
        Err(SceneError::InvalidRule { message, .. }) => return Err(invalid(&message)),
        other => other?,
    };
    match keep {
        Keep::Attribute(kind) => {
            let id = layout.attribute(view, kind, target)?;
            layout.deactivate(id)?;
            if let Some(relation) = rule.relation {
                layout.set_relation(id, relation)?;
            }
            match &rule.value {
                Some(RuleValue::Number(value)) => layout.set_value(id, *value, priority)?,
                Some(RuleValue::List(_)) => return Err(invalid("expects a single number")),
                None => layout.set_priority(id, priority)?,
            }
            if rule.active {
                layout.activate(id)?;
            }
        }
        Keep::Proxy(kind) => {
            let proxy = layout.proxy(view, kind)?;
            layout.deactivate_proxy(&proxy)?;
            if let Some(relation) = rule.relation {
                layout.set_proxy_relation(&proxy, relation)?;
            }
            match &rule.value {
                Some(value) => {
                    let value = proxy_value(kind, value).ok_or_else(|| {
                        invalid(&format!(
                            "expects a number or a list of {} numbers",
                            kind_fields(kind)
                        ))
                    })?;
                    layout.set_proxy_value(&proxy, value, priority)?;
                }
                None => layout.set_proxy_priority(&proxy, priority)?,
            }
            if rule.active {
                layout.activate_proxy(&proxy)?;
            }
        }
    }
    Ok(())
}

fn kind_fields(kind: ProxyKind) -> usize {
    match kind {
        ProxyKind::Insets | ProxyKind::EdgeAlign(_) => 4,
        ProxyKind::HorizontalInsets | ProxyKind::VerticalInsets => 1,
        _ => 2,
    }
}

/// A scene after its rules were applied and a layout pass ran
#[derive(Debug)]
pub struct LaidOutScene {
    pub layout: KeepLayout,
    roots: Vec<ViewId>,
}

impl LaidOutScene {
    /// Find a view by its declared name
    pub fn view(&self, name: &str) -> Option<ViewId> {
        self.layout.tree().find(name)
    }

    pub fn frame(&self, name: &str) -> Result<Frame, SceneError> {
        let view = self
            .view(name)
            .ok_or_else(|| SceneError::UnknownView(name.to_string()))?;
        Ok(self.layout.frame(view)?)
    }

    /// Indented frame listing of every view, one line each
    pub fn report(&self) -> Result<String, LayoutError> {
        let mut out = String::new();
        for root in &self.roots {
            self.report_view(*root, 0, &mut out)?;
        }
        Ok(out)
    }

    fn report_view(&self, view: ViewId, depth: usize, out: &mut String) -> Result<(), LayoutError> {
        let tree = self.layout.tree();
        let frame = tree.frame(view)?;
        let name = tree.name(view).unwrap_or("<anon>");
        // Writing to a String cannot fail
        let _ = writeln!(
            out,
            "{}{} x={:.1} y={:.1} w={:.1} h={:.1}",
            "  ".repeat(depth),
            name,
            tidy(frame.x),
            tidy(frame.y),
            tidy(frame.width),
            tidy(frame.height)
        );
        for child in tree.children(view)? {
            self.report_view(*child, depth + 1, out)?;
        }
        Ok(())
    }
}

/// Round to the printed precision so solver noise never shows up as `-0.0`
fn tidy(value: f64) -> f64 {
    let rounded = (value * 10.0).round() / 10.0;
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCREEN: &str = r#"
        [[view]]
        name = "screen"
        frame = { x = 0.0, y = 0.0, width = 320.0, height = 480.0 }

        [[view]]
        name = "card"
        parent = "screen"

        [[view]]
        name = "button"
        parent = "card"
    "#;

    fn scene(rules: &str) -> Scene {
        Scene::from_toml_str(&format!("{}\n{}", SCREEN, rules)).unwrap()
    }

    #[test]
    fn test_parse_views_and_rules() {
        let scene = scene(
            r#"
            [[rule]]
            view = "card"
            keep = "width"
            value = 100.0
            priority = "high"
            relation = "at-least"
            "#,
        );
        assert_eq!(scene.views.len(), 3);
        assert_eq!(scene.views[1].parent.as_deref(), Some("screen"));
        let rule = &scene.rules[0];
        assert_eq!(rule.value, Some(RuleValue::Number(100.0)));
        assert_eq!(rule.priority, Some(Priority::HIGH));
        assert_eq!(rule.relation, Some(Relation::AtLeast));
        assert!(rule.active);
    }

    #[test]
    fn test_insets_and_centered_button() {
        let laid_out = scene(
            r#"
            [[rule]]
            view = "card"
            keep = "insets"
            value = [20.0, 10.0, 20.0, 10.0]

            [[rule]]
            view = "button"
            keep = "size"
            value = [100.0, 40.0]

            [[rule]]
            view = "button"
            keep = "center"
            "#,
        )
        .build(LayoutConfig::default())
        .unwrap();

        let card = laid_out.frame("card").unwrap();
        assert!(card.approx_eq(&Frame::new(10.0, 20.0, 300.0, 440.0), 0.001));
        let button = laid_out.frame("button").unwrap();
        assert!(button.approx_eq(&Frame::new(110.0, 220.0, 100.0, 40.0), 0.001));
    }

    #[test]
    fn test_relation_is_staged_before_activation() {
        let laid_out = scene(
            r#"
            [[rule]]
            view = "card"
            keep = "width"
            value = 200.0

            [[rule]]
            view = "card"
            keep = "width"
            value = 150.0
            relation = "at-least"
            "#,
        )
        .build(LayoutConfig::default())
        .unwrap();
        // the second rule updates the same handle rather than adding a constraint
        assert_eq!(laid_out.layout.constraint_count(), 1);
        assert!((laid_out.frame("card").unwrap().width - 150.0).abs() < 0.001);
    }

    #[test]
    fn test_inactive_rule_only_stages() {
        let laid_out = scene(
            r#"
            [[rule]]
            view = "card"
            keep = "height"
            value = 30.0
            active = false
            "#,
        )
        .build(LayoutConfig::default())
        .unwrap();
        assert_eq!(laid_out.layout.constraint_count(), 0);
    }

    #[test]
    fn test_unknown_names_are_reported() {
        let err = scene(
            r#"
            [[rule]]
            view = "missing"
            keep = "width"
            "#,
        )
        .build(LayoutConfig::default())
        .unwrap_err();
        assert!(matches!(err, SceneError::UnknownView(name) if name == "missing"));

        let err = scene(
            r#"
            [[rule]]
            view = "card"
            keep = "wobble"
            "#,
        )
        .build(LayoutConfig::default())
        .unwrap_err();
        assert!(matches!(err, SceneError::UnknownKeep(_)));
    }

    #[test]
    fn test_grouping_target_and_list_length_are_checked() {
        let err = scene(
            r#"
            [[rule]]
            view = "button"
            keep = "edge-align"
            value = 0.0
            "#,
        )
        .build(LayoutConfig::default())
        .unwrap_err();
        assert!(matches!(err, SceneError::InvalidRule { rule: 0, .. }));

        let err = scene(
            r#"
            [[rule]]
            view = "button"
            keep = "size"
            value = [1.0, 2.0, 3.0]
            "#,
        )
        .build(LayoutConfig::default())
        .unwrap_err();
        assert!(matches!(err, SceneError::InvalidRule { .. }));
    }

    #[test]
    fn test_layout_errors_pass_through() {
        let err = scene(
            r#"
            [[rule]]
            view = "screen"
            keep = "top-inset"
            value = 4.0
            "#,
        )
        .build(LayoutConfig::default())
        .unwrap_err();
        assert!(matches!(
            err,
            SceneError::Layout(LayoutError::NoSuperview { .. })
        ));
    }

    #[test]
    fn test_duplicate_view() {
        let err = Scene::from_toml_str(
            r#"
            [[view]]
            name = "a"
            [[view]]
            name = "a"
            "#,
        )
        .unwrap()
        .build(LayoutConfig::default())
        .unwrap_err();
        assert!(matches!(err, SceneError::DuplicateView(_)));
    }

    #[test]
    fn test_report_is_indented_by_depth() {
        let laid_out = scene(
            r#"
            [[rule]]
            view = "card"
            keep = "insets"
            value = 10.0
            "#,
        )
        .build(LayoutConfig::default())
        .unwrap();
        let report = laid_out.report().unwrap();
        let lines: Vec<_> = report.lines().collect();
        assert_eq!(lines[0], "screen x=0.0 y=0.0 w=320.0 h=480.0");
        assert_eq!(lines[1], "  card x=10.0 y=10.0 w=300.0 h=460.0");
        assert!(lines[2].starts_with("    button "));
    }
}
