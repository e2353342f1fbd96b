mod common;

use sbgraph_core::editor::Headless;
use sbgraph_core::mutate::set_field;
use sbgraph_core::sb3::{load_project, project_to_json, save_project, Assets};
use sbgraph_core::serialize::{serialize, SerializeOptions};
use std::fs;

fn pseudocode(project: &sbgraph_core::model::Project) -> String {
    let options = SerializeOptions {
        with_ids: false,
        with_choices: false,
    };
    serialize(project, &Headless, options)
        .expect("serialize")
        .pseudocode
}

#[test]
fn test_sb3_round_trip_keeps_edits_and_assets() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let mut project = common::project();
    set_field(&mut project, &Headless, "set", "VALUE", "42").expect("set VALUE");
    set_field(&mut project, &Headless, "bcast", "BROADCAST_INPUT", "go").expect("set message");

    let mut assets = Assets::new();
    assets.insert("cat-a.svg".to_string(), b"<svg/>".to_vec());
    let path = dir.path().join("out.sb3");
    save_project(&project, &assets, &path).expect("save sb3");

    let (loaded, loaded_assets) = load_project(&path).expect("load sb3");
    assert_eq!(loaded_assets.get("cat-a.svg").map(Vec::as_slice), Some(&b"<svg/>"[..]));
    assert_eq!(pseudocode(&loaded), pseudocode(&project));
    assert!(pseudocode(&loaded).contains("  - input VALUE: 42 (math_number)"));
    let stage = loaded.stage().expect("stage");
    assert!(stage.broadcasts.iter().any(|b| b.name == "go"));
}

#[test]
fn test_json_save_is_plain_project_json() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let project = common::project();
    let path = dir.path().join("nested").join("project.json");
    save_project(&project, &Assets::new(), &path).expect("save json");

    let text = fs::read_to_string(&path).expect("read saved json");
    let value: serde_json::Value = serde_json::from_str(&text).expect("valid json");
    assert_eq!(value, project_to_json(&project));
    assert_eq!(value["meta"]["semver"], "3.0.0");

    let (loaded, assets) = load_project(&path).expect("load json");
    assert!(assets.is_empty());
    assert_eq!(pseudocode(&loaded), pseudocode(&project));
}

#[test]
fn test_load_reports_bad_inputs() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("broken.sb3");
    fs::write(&path, b"not a zip").expect("write file");
    let err = load_project(&path).unwrap_err();
    assert!(err.to_string().contains("not a valid zip"), "{}", err);

    let json_path = dir.path().join("empty.json");
    fs::write(&json_path, "{}").expect("write file");
    let err = load_project(&json_path).unwrap_err();
    assert!(err.to_string().contains("targets"), "{}", err);
}
