//! ROUTE resolution through the public API.
//!
//! Run with: cargo test --test routing

use x3d_behavior::declarations::parse_declarations;
use x3d_behavior::{BehaviorConfig, InteractivityManager, Route};

const NODES: &str = r#"
    { "node": "Group", "children": [
        { "node": "TouchSensor", "DEF": "Touch" },
        { "node": "Transform", "DEF": "Box" } ] },
    { "node": "TimeSensor", "DEF": "Clock", "cycleInterval": 2 },
    { "node": "PositionInterpolator", "DEF": "Path",
      "key": [0, 0.5, 1], "keyValue": [0, 0, 0, 1, 0, 0, 2, 0, 0] },
    { "node": "BooleanToggle", "DEF": "Flag" },
    { "node": "Script", "DEF": "Logic", "source": "fn onTouch(v) { }",
      "fields": [
        { "name": "onTouch", "accessType": "inputOnly", "type": "SFBool" },
        { "name": "flag", "accessType": "inputOnly", "type": "SFBool" } ] }
"#;

fn scene(routes: &[Route]) -> (InteractivityManager, usize) {
    let routes: Vec<String> = routes
        .iter()
        .map(|r| {
            format!(
                r#"{{ "node": "ROUTE", "fromNode": "{}", "fromField": "{}", "toNode": "{}", "toField": "{}" }}"#,
                r.from_node, r.from_field, r.to_node, r.to_field
            )
        })
        .collect();
    let json = if routes.is_empty() {
        format!("[{}]", NODES)
    } else {
        format!("[{}, {}]", NODES, routes.join(", "))
    };
    let mut manager = InteractivityManager::new(BehaviorConfig::default()).unwrap();
    manager.load(&parse_declarations(&json).unwrap());
    let applied = manager.finish_scene();
    (manager, applied)
}

fn sensor_to_clock() -> Route {
    Route::new("Touch", "isActive", "Clock", "startTime")
}

fn clock_to_path() -> Route {
    Route::new("Clock", "fraction_changed", "Path", "set_fraction")
}

fn path_to_box() -> Route {
    Route::new("Path", "value_changed", "Box", "set_translation")
}

#[test]
fn test_chain_merges_into_one_object_in_dependency_orders() {
    let orders = [
        vec![sensor_to_clock(), clock_to_path(), path_to_box()],
        vec![clock_to_path(), sensor_to_clock(), path_to_box()],
        vec![clock_to_path(), path_to_box(), sensor_to_clock()],
        vec![path_to_box(), clock_to_path(), sensor_to_clock()],
    ];
    for routes in orders {
        let (manager, applied) = scene(&routes);
        assert_eq!(applied, 3);
        assert_eq!(manager.objects().len(), 1, "routes: {:?}", routes);
        let object = &manager.objects()[0];
        assert!(object.sensor().is_some());
        assert!(object.time_sensor().is_some());
        assert!(object.interpolator().is_some());
        assert!(object.defined_item().is_some());
        assert_eq!(object.sensor_from_field(), Some("isActive"));
        assert_eq!(object.defined_item_to_field(), Some("set_translation"));
        assert_eq!(manager.behaviors()[0].pattern(), "triggered-animation");
    }
}

#[test]
fn test_unresolved_routes_are_dropped_and_the_rest_still_apply() {
    let (manager, applied) = scene(&[
        Route::new("Nobody", "isActive", "Clock", "startTime"),
        clock_to_path(),
        Route::new("Path", "value_changed", "Nowhere", "set_translation"),
        path_to_box(),
    ]);
    assert_eq!(applied, 2);
    assert_eq!(manager.objects().len(), 1);
    assert_eq!(manager.behaviors()[0].pattern(), "animation");
}

#[test]
fn test_names_resolve_case_insensitively() {
    let (manager, applied) = scene(&[
        Route::new("CLOCK", "fraction_changed", "path", "set_fraction"),
        Route::new("pAtH", "value_changed", "box", "set_translation"),
    ]);
    assert_eq!(applied, 2);
    assert_eq!(manager.objects().len(), 1);
    assert!(manager.objects()[0].time_sensor().is_some());
}

#[test]
fn test_toggle_into_parameter_field_binds_instead_of_filling_slot() {
    let (manager, applied) = scene(&[
        Route::new("Touch", "isOver", "Logic", "onTouch"),
        Route::new("Flag", "toggle", "Logic", "flag"),
    ]);
    assert_eq!(applied, 2);
    assert_eq!(manager.objects().len(), 1);
    let object = &manager.objects()[0];
    assert!(object.sensor().is_some());
    assert!(object.event_utility().is_none());

    let script = manager.registries().scripts.find("logic").unwrap();
    let script = manager.registries().scripts.get(script).unwrap();
    assert!(script.fields[1].from_binding().is_some());
    assert_eq!(manager.behaviors()[0].pattern(), "sensor-script");
}

#[test]
fn test_anchors_need_no_route() {
    let json = r#"[{ "node": "Anchor", "DEF": "Home", "url": ["index.html"],
        "children": [ { "node": "Shape", "geometry": "Box" } ] }]"#;
    let mut manager = InteractivityManager::new(BehaviorConfig::default()).unwrap();
    manager.load(&parse_declarations(json).unwrap());
    assert_eq!(manager.finish_scene(), 0);
    assert_eq!(manager.objects().len(), 1);
    assert_eq!(manager.behaviors()[0].pattern(), "anchor");
}
