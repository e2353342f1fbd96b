#![allow(dead_code)]

use sbgraph_core::model::Project;
use sbgraph_core::sb3::project_from_json;
use serde_json::{json, Value};

/// A cat sprite with three scripts: a flag script, an extension script that is
/// invisible to the serializer, and a loose say block.
pub fn fixture() -> Value {
    json!({
        "targets": [
            {
                "name": "Stage",
                "isStage": true,
                "variables": {"g1": ["global", 0]},
                "lists": {},
                "broadcasts": {"m1": "message1"},
                "blocks": {},
                "costumes": [{"name": "backdrop1"}],
                "sounds": []
            },
            {
                "name": "Cat",
                "isStage": false,
                "variables": {"v1": ["score", 0]},
                "lists": {"l1": ["items", []]},
                "blocks": {
                    "flag": {"opcode": "event_whenflagclicked", "next": "if", "parent": null,
                             "inputs": {}, "fields": {}, "shadow": false, "topLevel": true, "x": 0, "y": 0},
                    "if": {"opcode": "control_if", "next": "set", "parent": "flag",
                           "inputs": {}, "fields": {}, "shadow": false, "topLevel": false},
                    "set": {"opcode": "data_setvariableto", "next": "bcast", "parent": "if",
                            "inputs": {}, "fields": {"VARIABLE": ["score", "v1"]},
                            "shadow": false, "topLevel": false},
                    "bcast": {"opcode": "event_broadcast", "next": "drum", "parent": "set",
                              "inputs": {"BROADCAST_INPUT": [1, "menu1"]}, "fields": {},
                              "shadow": false, "topLevel": false},
                    "menu1": {"opcode": "event_broadcast_menu", "next": null, "parent": "bcast",
                              "inputs": {}, "fields": {"BROADCAST_OPTION": ["message1", "m1"]},
                              "shadow": true, "topLevel": false},
                    "drum": {"opcode": "music_playDrumForBeats", "next": "after", "parent": "bcast",
                             "inputs": {}, "fields": {}, "shadow": false, "topLevel": false},
                    "after": {"opcode": "looks_show", "next": null, "parent": "drum",
                              "inputs": {}, "fields": {}, "shadow": false, "topLevel": false},
                    "ext": {"opcode": "videoSensing_whenMotionGreaterThan", "next": "hidden", "parent": null,
                            "inputs": {}, "fields": {}, "shadow": false, "topLevel": true, "x": 0, "y": 200},
                    "hidden": {"opcode": "looks_hide", "next": null, "parent": "ext",
                               "inputs": {}, "fields": {}, "shadow": false, "topLevel": false},
                    "say": {"opcode": "looks_sayforsecs", "next": null, "parent": null,
                            "inputs": {"MESSAGE": [1, [10, "Hello!"]], "SECS": [1, [4, "2"]]},
                            "fields": {}, "shadow": false, "topLevel": true, "x": 0, "y": 400}
                },
                "costumes": [{"name": "cat-a"}, {"name": "cat-b"}],
                "sounds": [{"name": "meow"}]
            }
        ],
        "meta": {"semver": "3.0.0"}
    })
}

pub fn project() -> Project {
    project_from_json(&fixture()).expect("fixture loads")
}

pub const PLAIN_PSEUDOCODE: &str = "\
#1 event_whenflagclicked [top]
#2 control_if
  - input CONDITION:
  - SUBSTACK:
#3 data_setvariableto
  - field VARIABLE: score
  - input VALUE:
#4 event_broadcast
  - input BROADCAST_INPUT: message1 (event_broadcast_menu)

#5 looks_sayforsecs [top]
  - input MESSAGE: \"Hello!\" (text)
  - input SECS: 2 (math_number)";
