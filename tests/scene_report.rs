//! End-to-end tests: TOML scene in, frame report out

use std::path::PathBuf;

use keep_layout::{layout_scene, layout_scene_file, LayoutConfig, Priority, Scene, SceneError};
use pretty_assertions::assert_eq;

const LOGIN: &str = r#"
[[view]]
name = "screen"
frame = { x = 0.0, y = 0.0, width = 320.0, height = 480.0 }

[[view]]
name = "form"
parent = "screen"

[[view]]
name = "user"
parent = "form"

[[view]]
name = "password"
parent = "form"

[[view]]
name = "submit"
parent = "screen"

[[rule]]
view = "form"
keep = "horizontal-insets"
value = 20.0

[[rule]]
view = "form"
keep = "top-inset"
value = 100.0

[[rule]]
view = "form"
keep = "height"
value = 90.0

[[rule]]
view = "user"
keep = "edge-align"
to = "form"
value = [0.0, 0.0, 50.0, 0.0]

[[rule]]
view = "password"
keep = "top-offset"
to = "user"
value = 10.0

[[rule]]
view = "password"
keep = "size"
value = [280.0, 40.0]

[[rule]]
view = "password"
keep = "left-align"
to = "user"

[[rule]]
view = "submit"
keep = "size"
value = [120.0, 44.0]

[[rule]]
view = "submit"
keep = "vertical-align"
to = "form"

[[rule]]
view = "submit"
keep = "top-offset"
to = "form"
value = 24.0
"#;

#[test]
fn test_login_scene_report() {
    let report = layout_scene(LOGIN).unwrap();
    insta::assert_snapshot!(report, @r"
    screen x=0.0 y=0.0 w=320.0 h=480.0
      form x=20.0 y=100.0 w=280.0 h=90.0
        user x=20.0 y=100.0 w=280.0 h=40.0
        password x=20.0 y=150.0 w=280.0 h=40.0
      submit x=100.0 y=214.0 w=120.0 h=44.0
    ");
}

#[test]
fn test_scene_frames_by_name() {
    let laid_out = Scene::from_toml_str(LOGIN)
        .unwrap()
        .build(LayoutConfig::default())
        .unwrap();
    let submit = laid_out.frame("submit").unwrap();
    assert!((submit.center().x - 160.0).abs() < 0.001);
    assert!(matches!(
        laid_out.frame("nope"),
        Err(SceneError::UnknownView(_))
    ));
}

#[test]
fn test_later_rule_reuses_the_size_handle() {
    let source = format!(
        "{}\n{}",
        LOGIN,
        r#"
[[rule]]
view = "submit"
keep = "width"
value = 300.0
priority = "low"
"#
    );
    let laid_out = Scene::from_toml_str(&source)
        .unwrap()
        .build(LayoutConfig::default())
        .unwrap();
    // the size grouping vended this width handle; the low rule updates it in place
    assert!((laid_out.frame("submit").unwrap().width - 300.0).abs() < 0.001);
    let width = laid_out.view("submit").unwrap();
    assert_eq!(laid_out.layout.constraints_on(width).unwrap().len(), 2);
}

#[test]
fn test_config_default_priority_applies_to_rules_without_one() {
    let config = LayoutConfig::new().with_default_priority(Priority::LOW);
    let laid_out = Scene::from_toml_str(LOGIN).unwrap().build(config).unwrap();
    let form = laid_out.view("form").unwrap();
    let height = laid_out
        .layout
        .tree()
        .node(form)
        .unwrap()
        .attributes
        .values()
        .map(|id| laid_out.layout.attribute_info(*id).unwrap())
        .find(|a| a.kind() == keep_layout::AttributeKind::Height)
        .unwrap();
    assert_eq!(height.priority(), Priority::LOW);
}

#[test]
fn test_scene_and_config_files() {
    let dir = std::env::temp_dir().join(format!("keep-layout-test-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let scene: PathBuf = dir.join("login.toml");
    let config: PathBuf = dir.join("config.toml");
    std::fs::write(&scene, LOGIN).unwrap();
    std::fs::write(&config, "default_priority = \"required\"\nframe_tolerance = 0.01\n").unwrap();

    let from_file = layout_scene_file(&scene, Some(&config)).unwrap();
    assert_eq!(from_file, layout_scene(LOGIN).unwrap());

    std::fs::write(&config, "frame_tolerance = \"wide\"\n").unwrap();
    let err = layout_scene_file(&scene, Some(&config)).unwrap_err();
    assert!(matches!(err, SceneError::Config(_)));

    std::fs::remove_dir_all(&dir).unwrap();
}
