mod common;

use sbgraph_core::catalog::{self, BlockKind};
use sbgraph_core::editor::Headless;
use sbgraph_core::serialize::{serialize, SerializeOptions};

fn plain() -> SerializeOptions {
    SerializeOptions {
        with_ids: false,
        with_choices: false,
    }
}

#[test]
fn test_pseudocode_matches_expected_layout() {
    let project = common::project();
    let out = serialize(&project, &Headless, plain()).expect("serialize");
    assert_eq!(out.pseudocode, common::PLAIN_PSEUDOCODE);
    assert_eq!(out.target_name, "Cat");
}

#[test]
fn test_empty_condition_and_branch_are_listed() {
    let project = common::project();
    let out = serialize(&project, &Headless, plain()).expect("serialize");
    let lines = out.pseudocode.lines().collect::<Vec<_>>();
    let at = lines
        .iter()
        .position(|l| *l == "#2 control_if")
        .expect("control_if line");
    assert_eq!(lines[at + 1], "  - input CONDITION:");
    assert_eq!(lines[at + 2], "  - SUBSTACK:");
}

#[test]
fn test_out_of_scope_subtrees_are_absent() {
    let project = common::project();
    let out = serialize(&project, &Headless, plain()).expect("serialize");
    for hidden in ["ext", "hidden", "drum", "after"] {
        assert!(!out.id_to_block.contains_key(hidden), "{} should be absent", hidden);
    }
    assert!(!out.pseudocode.contains("videoSensing"));
    assert!(!out.pseudocode.contains("looks_hide"));
    assert!(!out.pseudocode.contains("looks_show"));
}

#[test]
fn test_shadows_never_get_an_index() {
    let project = common::project();
    let out = serialize(&project, &Headless, plain()).expect("serialize");
    assert_eq!(out.idx_to_block.len(), 5);
    for record in out.idx_to_block.values() {
        assert_eq!(catalog::classify(&record.opcode), BlockKind::Structural);
    }
    let keys = out.idx_to_block.keys().copied().collect::<Vec<_>>();
    assert_eq!(keys, vec![1, 2, 3, 4, 5]);
}

#[test]
fn test_index_tables_agree() {
    let project = common::project();
    let out = serialize(&project, &Headless, plain()).expect("serialize");
    assert_eq!(out.idx_to_block.len(), out.id_to_block.len());
    for record in out.idx_to_block.values() {
        assert_eq!(out.id_to_block.get(&record.id), Some(record));
    }
    let bcast = &out.id_to_block["bcast"];
    assert_eq!(bcast.inputs["BROADCAST_INPUT"]["block"], "menu1");
    assert_eq!(bcast.parent.as_deref(), Some("set"));
    let set = &out.id_to_block["set"];
    assert_eq!(set.fields["VARIABLE"]["value"], "score");
    assert_eq!(set.fields["VARIABLE"]["id"], "v1");
}

#[test]
fn test_serializing_twice_is_identical() {
    let project = common::project();
    let first = serialize(&project, &Headless, SerializeOptions::default()).expect("first");
    let second = serialize(&project, &Headless, SerializeOptions::default()).expect("second");
    assert_eq!(first, second);
}

#[test]
fn test_choices_follow_fields_and_menus() {
    let project = common::project();
    let out = serialize(&project, &Headless, SerializeOptions::default()).expect("serialize");
    let lines = out.pseudocode.lines().collect::<Vec<_>>();
    assert!(lines.contains(&"  - field VARIABLE: score {choices: variables=[score, global]}"));
    assert!(lines.contains(
        &"  - input BROADCAST_INPUT: message1 (event_broadcast_menu) {choices: messages=[message1]}"
    ));
}

#[test]
fn test_ids_mode_tags_every_line() {
    let project = common::project();
    let options = SerializeOptions {
        with_ids: true,
        with_choices: false,
    };
    let out = serialize(&project, &Headless, options).expect("serialize");
    assert!(out
        .pseudocode
        .starts_with("#1 event_whenflagclicked [top] (id: flag)\n"));
    assert!(out.pseudocode.contains("#5 looks_sayforsecs [top] (id: say)"));
}
