use crate::catalog::{self, BlockKind};
use crate::model::{branch_slot, Block, BlockArena, Field, Input, Project, Target, Variable};
use anyhow::{anyhow, Context, Result};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::fs;
use std::io::{Cursor, Read, Write};
use std::path::Path;
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::ZipArchive;

pub type Assets = HashMap<String, Vec<u8>>;

/// Loads a `.sb3` archive, or a bare `project.json` when the extension says so.
pub fn load_project(input: &Path) -> Result<(Project, Assets)> {
    let is_json = input
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if is_json {
        let text = fs::read_to_string(input)
            .with_context(|| format!("Failed to open '{}'.", input.display()))?;
        let value: Value = serde_json::from_str(&text)
            .with_context(|| format!("'{}' is not valid JSON.", input.display()))?;
        return Ok((project_from_json(&value)?, Assets::new()));
    }
    let (project_json, assets) = read_sb3(input)?;
    Ok((project_from_json(&project_json)?, assets))
}

fn read_sb3(input: &Path) -> Result<(Value, Assets)> {
    let file =
        fs::File::open(input).with_context(|| format!("Failed to open '{}'.", input.display()))?;
    let mut zip = ZipArchive::new(file)
        .with_context(|| format!("'{}' is not a valid zip/.sb3 file.", input.display()))?;

    let mut project_json_str = String::new();
    {
        let mut entry = zip
            .by_name("project.json")
            .map_err(|_| anyhow!("project.json not found in '{}'.", input.display()))?;
        entry.read_to_string(&mut project_json_str)?;
    }
    let project_json: Value = serde_json::from_str(&project_json_str)
        .with_context(|| format!("Invalid project.json in '{}'.", input.display()))?;

    let mut assets = HashMap::new();
    for i in 0..zip.len() {
        let mut entry = zip.by_index(i)?;
        let name = entry.name().to_string();
        if name == "project.json" || name.ends_with('/') {
            continue;
        }
        let mut bytes = Vec::new();
        entry.read_to_end(&mut bytes)?;
        assets.insert(name, bytes);
    }

    Ok((project_json, assets))
}

pub fn project_from_json(project_json: &Value) -> Result<Project> {
    let targets_json = project_json
        .get("targets")
        .and_then(Value::as_array)
        .ok_or_else(|| anyhow!("Invalid project.json: missing 'targets' array."))?;

    let mut targets = Vec::new();
    for target in targets_json {
        targets.push(read_target(target)?);
    }

    let mut raw = project_json.clone();
    if let Some(obj) = raw.as_object_mut() {
        obj.remove("targets");
    }
    Ok(Project::new(targets, raw))
}

fn read_target(target: &Value) -> Result<Target> {
    let name = target
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("Target missing 'name'."))?
        .to_string();
    let is_stage = target
        .get("isStage")
        .and_then(Value::as_bool)
        .ok_or_else(|| anyhow!("Target '{}' missing isStage.", name))?;

    let mut out = Target::new(name.clone(), is_stage);
    out.variables = read_decls(target.get("variables"));
    out.lists = read_decls(target.get("lists"));
    out.broadcasts = read_broadcasts(target.get("broadcasts"));
    out.costumes = read_asset_names(target.get("costumes"));
    out.sounds = read_asset_names(target.get("sounds"));

    let empty = Map::new();
    let blocks_obj = match target.get("blocks") {
        Some(Value::Object(obj)) => obj,
        None => &empty,
        Some(_) => return Err(anyhow!("Target '{}' has invalid blocks object.", name)),
    };
    out.blocks = read_blocks(blocks_obj).with_context(|| format!("In target '{}'.", name))?;
    debug!(sprite = %name, blocks = out.blocks.len(), "loaded target");

    let mut raw = target.clone();
    if let Some(obj) = raw.as_object_mut() {
        for key in ["blocks", "variables", "lists", "broadcasts"] {
            obj.remove(key);
        }
    }
    out.raw = raw;
    Ok(out)
}

fn read_decls(node: Option<&Value>) -> Vec<Variable> {
    let mut out = Vec::new();
    let Some(obj) = node.and_then(Value::as_object) else {
        return out;
    };
    for (id, value) in obj {
        let Some(arr) = value.as_array() else {
            continue;
        };
        if let Some(name) = arr.first().and_then(Value::as_str) {
            out.push(Variable {
                id: id.clone(),
                name: name.to_string(),
                value: arr.get(1).cloned().unwrap_or(Value::Null),
            });
        }
    }
    out
}

fn read_broadcasts(node: Option<&Value>) -> Vec<Variable> {
    let mut out = Vec::new();
    let Some(obj) = node.and_then(Value::as_object) else {
        return out;
    };
    for (id, value) in obj {
        if let Some(name) = value.as_str() {
            out.push(Variable {
                id: id.clone(),
                name: name.to_string(),
                value: value.clone(),
            });
        }
    }
    out
}

fn read_asset_names(node: Option<&Value>) -> Vec<String> {
    let mut out = Vec::new();
    let Some(arr) = node.and_then(Value::as_array) else {
        return out;
    };
    for asset in arr {
        if let Some(name) = asset.get("name").and_then(Value::as_str) {
            out.push(name.to_string());
        }
    }
    out
}

#[derive(Debug, Clone, Copy)]
enum SlotRole {
    Block,
    Shadow,
    Both,
}

struct PendingPrimitive {
    parent: String,
    input: String,
    role: SlotRole,
    literal: Vec<Value>,
}

fn read_blocks(blocks: &Map<String, Value>) -> Result<BlockArena> {
    let mut arena = BlockArena::new();
    let mut pending = Vec::new();
    let mut top_level_primitives = Vec::new();

    for (id, raw) in blocks {
        match raw {
            Value::Object(_) => {
                let block = read_block(id, raw, &mut pending)?;
                arena.insert(block);
            }
            Value::Array(arr) => top_level_primitives.push((id.clone(), arr.clone())),
            _ => return Err(anyhow!("Block '{}' has an invalid shape.", id)),
        }
    }

    for (id, literal) in top_level_primitives {
        let mut block = primitive_block(&id, &literal)
            .ok_or_else(|| anyhow!("Block '{}' is an unknown primitive.", id))?;
        block.top_level = true;
        block.x = literal.get(3).and_then(Value::as_f64);
        block.y = literal.get(4).and_then(Value::as_f64);
        arena.insert(block);
    }

    for prim in pending {
        let id = arena.new_id("prim");
        let mut block = primitive_block(&id, &prim.literal).ok_or_else(|| {
            anyhow!(
                "Input '{}' of block '{}' holds an unknown primitive.",
                prim.input,
                prim.parent
            )
        })?;
        block.parent = Some(prim.parent.clone());
        arena.insert(block);
        let parent = arena.require_mut(&prim.parent)?;
        let input = parent.ensure_input(&prim.input);
        match prim.role {
            SlotRole::Block => input.block = Some(id),
            SlotRole::Shadow => input.shadow = Some(id),
            SlotRole::Both => {
                input.block = Some(id.clone());
                input.shadow = Some(id);
            }
        }
    }

    arena.sort_scripts_by(block_sort_key);
    Ok(arena)
}

fn read_block(id: &str, raw: &Value, pending: &mut Vec<PendingPrimitive>) -> Result<Block> {
    let opcode = raw
        .get("opcode")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("Block '{}' missing opcode.", id))?;
    let mut block = Block::new(id, opcode);
    block.next = raw.get("next").and_then(Value::as_str).map(ToString::to_string);
    block.parent = raw.get("parent").and_then(Value::as_str).map(ToString::to_string);
    block.top_level = raw.get("topLevel").and_then(Value::as_bool).unwrap_or(false);
    if block.top_level {
        block.x = raw.get("x").and_then(Value::as_f64);
        block.y = raw.get("y").and_then(Value::as_f64);
    }
    block.mutation = raw.get("mutation").cloned();

    if let Some(fields) = raw.get("fields").and_then(Value::as_object) {
        for (name, value) in fields {
            block.fields.insert(name.clone(), read_field(value));
        }
    }

    let Some(inputs) = raw.get("inputs").and_then(Value::as_object) else {
        return Ok(block);
    };
    for (name, value) in inputs {
        if let Some(slot) = branch_slot(name) {
            block.branches[slot] = input_block_ref(value);
            continue;
        }
        let input = read_input(id, name, value, pending);
        block.inputs.push(input);
    }
    Ok(block)
}

fn read_field(value: &Value) -> Field {
    match value {
        Value::Array(arr) => Field {
            value: arr.first().map(value_text).unwrap_or_default(),
            id: arr.get(1).and_then(Value::as_str).map(ToString::to_string),
        },
        other => Field::new(value_text(other)),
    }
}

fn input_block_ref(value: &Value) -> Option<String> {
    let arr = value.as_array()?;
    arr.get(1)?.as_str().map(ToString::to_string)
}

fn read_input(
    parent: &str,
    name: &str,
    value: &Value,
    pending: &mut Vec<PendingPrimitive>,
) -> Input {
    let mut input = Input::empty(name);
    let Some(arr) = value.as_array() else {
        return input;
    };
    let mode = arr.first().and_then(Value::as_i64).unwrap_or_default();
    let mut slot = |payload: Option<&Value>, role: SlotRole, input: &mut Input| match payload {
        Some(Value::String(id)) => match role {
            SlotRole::Block => input.block = Some(id.clone()),
            SlotRole::Shadow => input.shadow = Some(id.clone()),
            SlotRole::Both => {
                input.block = Some(id.clone());
                input.shadow = Some(id.clone());
            }
        },
        Some(Value::Array(literal)) => pending.push(PendingPrimitive {
            parent: parent.to_string(),
            input: name.to_string(),
            role,
            literal: literal.clone(),
        }),
        _ => {}
    };
    match mode {
        1 => slot(arr.get(1), SlotRole::Both, &mut input),
        2 => slot(arr.get(1), SlotRole::Block, &mut input),
        3 => {
            slot(arr.get(1), SlotRole::Block, &mut input);
            slot(arr.get(2), SlotRole::Shadow, &mut input);
        }
        _ => {}
    }
    input
}

fn primitive_block(id: &str, literal: &[Value]) -> Option<Block> {
    let code = literal.first()?.as_i64()?;
    let text = literal.get(1).map(value_text).unwrap_or_default();
    let reference = literal.get(2).and_then(Value::as_str).unwrap_or_default();
    let (opcode, field, field_value) = match code {
        4 => ("math_number", "NUM", Field::new(text)),
        5 => ("math_positive_number", "NUM", Field::new(text)),
        6 => ("math_whole_number", "NUM", Field::new(text)),
        7 => ("math_integer", "NUM", Field::new(text)),
        8 => ("math_angle", "NUM", Field::new(text)),
        9 => ("colour_picker", "COLOUR", Field::new(text)),
        10 => ("text", "TEXT", Field::new(text)),
        11 => ("event_broadcast_menu", "BROADCAST_OPTION", Field::reference(text, reference)),
        12 => ("data_variable", "VARIABLE", Field::reference(text, reference)),
        13 => ("data_listcontents", "LIST", Field::reference(text, reference)),
        _ => return None,
    };
    let mut block = Block::new(id, opcode);
    block.fields.insert(field.to_string(), field_value);
    Some(block)
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn block_sort_key(block: &Block) -> (i64, i64, String) {
    let y = block.y.map(|v| v.round() as i64).unwrap_or(i64::MAX);
    let x = block.x.map(|v| v.round() as i64).unwrap_or(i64::MAX);
    (y, x, block.id.clone())
}

pub fn project_to_json(project: &Project) -> Value {
    let mut out = match &project.raw {
        Value::Object(obj) => obj.clone(),
        _ => Map::new(),
    };
    let targets = project.targets.iter().map(target_to_json).collect::<Vec<_>>();
    out.insert("targets".to_string(), Value::Array(targets));
    Value::Object(out)
}

fn target_to_json(target: &Target) -> Value {
    let mut out = match &target.raw {
        Value::Object(obj) => obj.clone(),
        _ => Map::new(),
    };
    out.insert("name".to_string(), json!(target.name));
    out.insert("isStage".to_string(), json!(target.is_stage));

    let mut variables = Map::new();
    for var in &target.variables {
        variables.insert(var.id.clone(), json!([var.name, var.value]));
    }
    let mut lists = Map::new();
    for list in &target.lists {
        let items = if list.value.is_array() { list.value.clone() } else { json!([]) };
        lists.insert(list.id.clone(), json!([list.name, items]));
    }
    let mut broadcasts = Map::new();
    for msg in &target.broadcasts {
        broadcasts.insert(msg.id.clone(), json!(msg.name));
    }
    let mut blocks = Map::new();
    for block in target.blocks.blocks() {
        blocks.insert(block.id.clone(), block_to_json(block));
    }
    out.insert("variables".to_string(), Value::Object(variables));
    out.insert("lists".to_string(), Value::Object(lists));
    out.insert("broadcasts".to_string(), Value::Object(broadcasts));
    out.insert("blocks".to_string(), Value::Object(blocks));
    Value::Object(out)
}

fn block_to_json(block: &Block) -> Value {
    let mut inputs = Map::new();
    for input in &block.inputs {
        inputs.insert(input.name.clone(), input_to_json(input));
    }
    for (slot, head) in block.branches.iter().enumerate() {
        if let Some(head) = head {
            inputs.insert(crate::model::BRANCH_NAMES[slot].to_string(), json!([2, head]));
        }
    }
    let mut fields = Map::new();
    for (name, field) in &block.fields {
        fields.insert(name.clone(), json!([field.value, field.id]));
    }
    let mut out = json!({
        "opcode": block.opcode,
        "next": block.next,
        "parent": block.parent,
        "inputs": inputs,
        "fields": fields,
        "shadow": catalog::classify(&block.opcode) == BlockKind::Shadow,
        "topLevel": block.top_level,
    });
    if let Some(obj) = out.as_object_mut() {
        if block.top_level {
            obj.insert("x".to_string(), json!(block.x.unwrap_or(0.0)));
            obj.insert("y".to_string(), json!(block.y.unwrap_or(0.0)));
        }
        if let Some(mutation) = &block.mutation {
            obj.insert("mutation".to_string(), mutation.clone());
        }
    }
    out
}

fn input_to_json(input: &Input) -> Value {
    match (&input.block, &input.shadow) {
        (Some(block), Some(shadow)) if block == shadow => json!([1, shadow]),
        (Some(block), Some(shadow)) => json!([3, block, shadow]),
        (Some(block), None) => json!([2, block]),
        (None, Some(shadow)) => json!([1, shadow]),
        (None, None) => json!([1, Value::Null]),
    }
}

/// Writes the project back as `.json` or as a `.sb3` archive carrying `assets`.
pub fn save_project(project: &Project, assets: &Assets, output: &Path) -> Result<()> {
    let project_json = project_to_json(project);
    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let is_json = output
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let bytes = if is_json {
        serde_json::to_vec_pretty(&project_json)?
    } else {
        build_sb3_bytes(&project_json, assets)?
    };
    fs::write(output, bytes).with_context(|| format!("Failed to write '{}'.", output.display()))?;
    Ok(())
}

fn build_sb3_bytes(project_json: &Value, assets: &Assets) -> Result<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::<u8>::new());
    let mut zip = zip::ZipWriter::new(&mut buffer);
    let opts = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    zip.start_file("project.json", opts)?;
    zip.write_all(&serde_json::to_vec(project_json)?)?;

    let mut assets = assets.iter().collect::<Vec<_>>();
    assets.sort_by(|(left_name, _), (right_name, _)| left_name.cmp(right_name));
    for (name, bytes) in assets {
        zip.start_file(name.as_str(), opts)?;
        zip.write_all(bytes)?;
    }
    zip.finish()?;
    Ok(buffer.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Value {
        json!({
            "targets": [
                {
                    "name": "Stage",
                    "isStage": true,
                    "variables": {"v1": ["score", 0]},
                    "lists": {},
                    "broadcasts": {"b1": "start"},
                    "blocks": {},
                    "costumes": [{"name": "backdrop1"}],
                    "sounds": []
                },
                {
                    "name": "Cat",
                    "isStage": false,
                    "variables": {},
                    "lists": {"l1": ["items", []]},
                    "blocks": {
                        "hat": {"opcode": "event_whenflagclicked", "next": "move", "parent": null,
                                "inputs": {}, "fields": {}, "shadow": false, "topLevel": true, "x": 0, "y": 0},
                        "move": {"opcode": "motion_movesteps", "next": null, "parent": "hat",
                                 "inputs": {"STEPS": [1, [4, "10"]]}, "fields": {}, "shadow": false, "topLevel": false},
                        "loose": [12, "score", "v1", 100, 200]
                    },
                    "costumes": [{"name": "cat-a"}, {"name": "cat-b"}],
                    "sounds": [{"name": "meow"}]
                }
            ],
            "meta": {"semver": "3.0.0"}
        })
    }

    #[test]
    fn compressed_primitives_become_shadow_blocks() {
        let project = project_from_json(&sample()).unwrap();
        let cat = &project.targets[1];
        let steps = cat.blocks.get("move").unwrap().input("STEPS").unwrap().clone();
        let shadow_id = steps.shadow.clone().unwrap();
        assert_eq!(steps.block, Some(shadow_id.clone()));
        let shadow = cat.blocks.get(&shadow_id).unwrap();
        assert_eq!(shadow.opcode, "math_number");
        assert_eq!(shadow.fields["NUM"].value, "10");
        assert_eq!(shadow.parent.as_deref(), Some("move"));
    }

    #[test]
    fn top_level_reporters_are_scripts() {
        let project = project_from_json(&sample()).unwrap();
        let cat = &project.targets[1];
        assert_eq!(cat.blocks.scripts(), &["hat".to_string(), "loose".to_string()]);
        let loose = cat.blocks.get("loose").unwrap();
        assert_eq!(loose.opcode, "data_variable");
        assert_eq!(loose.fields["VARIABLE"].id.as_deref(), Some("v1"));
    }

    #[test]
    fn editing_target_defaults_to_first_sprite() {
        let project = project_from_json(&sample()).unwrap();
        assert_eq!(project.editing_target().unwrap().name, "Cat");
        assert_eq!(project.stage().unwrap().broadcasts[0].name, "start");
        assert_eq!(project.targets[1].costumes, vec!["cat-a", "cat-b"]);
    }

    #[test]
    fn saved_json_reloads_to_same_graph() {
        let project = project_from_json(&sample()).unwrap();
        let reloaded = project_from_json(&project_to_json(&project)).unwrap();
        let before = &project.targets[1].blocks;
        let after = &reloaded.targets[1].blocks;
        assert_eq!(before.len(), after.len());
        for block in before.blocks() {
            assert_eq!(Some(block), after.get(&block.id));
        }
        assert_eq!(reloaded.raw["meta"]["semver"], "3.0.0");
    }
}
