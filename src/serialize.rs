use crate::catalog::{self, BlockKind, ShadowType};
use crate::choices::{self, ChoiceContext};
use crate::editor::{BoundingBox, Editor, Geometry, Position};
use crate::error::{ApiError, ErrorKind, Result};
use crate::model::{Block, BlockArena, Project, BRANCH_NAMES};
use anyhow::{anyhow, bail};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerializeOptions {
    /// Append each block's id to its pseudocode line.
    pub with_ids: bool,
    /// Attach `{choices: ...}` to field and menu lines.
    pub with_choices: bool,
}

impl Default for SerializeOptions {
    fn default() -> Self {
        Self {
            with_ids: false,
            with_choices: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockRecord {
    pub id: String,
    pub opcode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<BoundingBox>,
    pub parent: Option<String>,
    pub next: Option<String>,
    pub inputs: Map<String, Value>,
    pub fields: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Serialized {
    pub pseudocode: String,
    pub idx_to_block: BTreeMap<usize, BlockRecord>,
    pub id_to_block: BTreeMap<String, BlockRecord>,
    pub target_name: String,
}

/// Renders the editing target's scripts as indexed pseudocode plus lookup records.
pub fn serialize(
    project: &Project,
    editor: &dyn Editor,
    options: SerializeOptions,
) -> Result<Serialized> {
    let Some(target_index) = project.editing else {
        return Err(ApiError::new(ErrorKind::NoTarget, "No editing target selected."));
    };
    let Some(target) = project.targets.get(target_index) else {
        return Err(ApiError::new(
            ErrorKind::ApiUnavailable,
            format!("Editing target {} is not loaded.", target_index),
        ));
    };

    let mut walker = Walker {
        blocks: &target.blocks,
        ctx: ChoiceContext {
            project,
            target: target_index,
            editor,
        },
        options,
        index: HashMap::new(),
        visited: HashSet::new(),
        lines: Vec::new(),
        records: Vec::new(),
    };
    for root in target.blocks.scripts() {
        walker.walk_script(root)?;
    }
    debug!(
        sprite = %target.name,
        blocks = walker.records.len(),
        "serialized target"
    );

    let mut idx_to_block = BTreeMap::new();
    let mut id_to_block = BTreeMap::new();
    for (index, record) in walker.records {
        id_to_block.insert(record.id.clone(), record.clone());
        idx_to_block.insert(index, record);
    }
    Ok(Serialized {
        pseudocode: walker.lines.join("\n"),
        idx_to_block,
        id_to_block,
        target_name: target.name.clone(),
    })
}

struct Walker<'a> {
    blocks: &'a BlockArena,
    ctx: ChoiceContext<'a>,
    options: SerializeOptions,
    index: HashMap<String, usize>,
    visited: HashSet<String>,
    lines: Vec<String>,
    records: Vec<(usize, BlockRecord)>,
}

impl<'a> Walker<'a> {
    fn walk_script(&mut self, root: &str) -> anyhow::Result<()> {
        let blocks = self.blocks;
        let block = blocks.require(root)?;
        if catalog::classify(&block.opcode) != BlockKind::Structural {
            return Ok(());
        }
        if !self.lines.is_empty() {
            self.lines.push(String::new());
        }
        self.walk_sequence(root, 0, true)
    }

    /// Emits `head` and its `next` chain at one depth.
    fn walk_sequence(&mut self, head: &str, depth: usize, top: bool) -> anyhow::Result<()> {
        let blocks = self.blocks;
        let mut current = Some(head.to_string());
        let mut first = true;
        while let Some(id) = current {
            let block = blocks.require(&id)?;
            if catalog::classify(&block.opcode) != BlockKind::Structural {
                break;
            }
            self.emit_block(block, depth, top && first)?;
            current = block.next.clone();
            first = false;
        }
        Ok(())
    }

    fn emit_block(&mut self, block: &'a Block, depth: usize, top: bool) -> anyhow::Result<()> {
        if !self.visited.insert(block.id.clone()) {
            bail!("Block '{}' is reachable more than once.", block.id);
        }
        let index = self.index_of(&block.id);
        let pad = spaces(depth * 4);
        let mut line = format!("{}#{} {}", pad, index, block.opcode);
        if top {
            line.push_str(" [top]");
        }
        if self.options.with_ids {
            line.push_str(&format!(" (id: {})", block.id));
        }
        self.lines.push(line);
        let record = self.record(block);
        self.records.push((index, record));

        let prop = spaces(depth * 4 + 2);
        for (name, field) in &block.fields {
            let mut line = format!("{}- field {}: {}", prop, name, field.value);
            self.append_choices(&mut line, &block.opcode, name, &field.value, &block.id);
            self.lines.push(line);
        }

        for name in input_names(block) {
            self.emit_input(block, &name, depth, &prop)?;
        }

        let expected = catalog::expected_branches(&block.opcode);
        for (slot, branch) in BRANCH_NAMES.iter().enumerate() {
            let head = block.branches[slot].as_deref();
            if head.is_none() && !expected.contains(branch) {
                continue;
            }
            self.lines.push(format!("{}- {}:", prop, branch));
            if let Some(head) = head {
                self.walk_sequence(head, depth + 1, false)?;
            }
        }
        Ok(())
    }

    fn emit_input(
        &mut self,
        block: &Block,
        name: &str,
        depth: usize,
        prop: &str,
    ) -> anyhow::Result<()> {
        let header = format!("{}- input {}:", prop, name);
        let Some(child_id) = block.input(name).and_then(|input| input.block.as_deref()) else {
            self.lines.push(header);
            return Ok(());
        };
        let blocks = self.blocks;
        let child = blocks.require(child_id).map_err(|_| {
            anyhow!(
                "Input '{}' of block '{}' points at missing block '{}'.",
                name,
                block.id,
                child_id
            )
        })?;
        match catalog::classify(&child.opcode) {
            BlockKind::Structural => {
                self.lines.push(header);
                self.walk_sequence(child_id, depth + 1, false)?;
            }
            BlockKind::Shadow => {
                let mut line = format!("{} {}", header, shadow_text(child));
                if let Some(field) = catalog::shadow_primary_field(&child.opcode) {
                    if let Some(value) = child.fields.get(field) {
                        self.append_choices(&mut line, &child.opcode, field, &value.value, &child.id);
                    }
                }
                self.lines.push(line);
            }
            BlockKind::OutOfScope => self.lines.push(header),
        }
        Ok(())
    }

    fn append_choices(
        &self,
        line: &mut String,
        opcode: &str,
        field: &str,
        current: &str,
        block_id: &str,
    ) {
        if !self.options.with_choices {
            return;
        }
        if let Some(set) = choices::resolve(&self.ctx, opcode, field, current, block_id) {
            line.push(' ');
            line.push_str(&set.to_string());
        }
    }

    fn index_of(&mut self, id: &str) -> usize {
        let next = self.index.len() + 1;
        *self.index.entry(id.to_string()).or_insert(next)
    }

    fn record(&self, block: &Block) -> BlockRecord {
        let geometry = self.geometry(block);
        BlockRecord {
            id: block.id.clone(),
            opcode: block.opcode.clone(),
            position: geometry.position,
            bounding_box: geometry.bounding_box,
            parent: block.parent.clone(),
            next: block.next.clone(),
            inputs: raw_inputs(block),
            fields: raw_fields(block),
        }
    }

    fn geometry(&self, block: &Block) -> Geometry {
        let fallback = match (block.x, block.y) {
            (Some(x), Some(y)) => Some(Position { x, y }),
            _ => None,
        };
        match self.ctx.editor.geometry(&block.id) {
            Ok(Some(mut geometry)) => {
                geometry.position = geometry.position.or(fallback);
                geometry
            }
            Ok(None) => Geometry {
                position: fallback,
                bounding_box: None,
            },
            Err(err) => {
                debug!(block = %block.id, error = %err, "geometry lookup failed");
                Geometry {
                    position: fallback,
                    bounding_box: None,
                }
            }
        }
    }
}

/// Actual slots in their stored order, then expected ones that are missing.
fn input_names(block: &Block) -> Vec<String> {
    let mut names = block
        .inputs
        .iter()
        .map(|input| input.name.clone())
        .collect::<Vec<_>>();
    for expected in catalog::expected_inputs(&block.opcode) {
        if !names.iter().any(|name| name == expected) {
            names.push(expected.to_string());
        }
    }
    names
}

/// Inline rendering of a shadow: `value (opcode)`, or the bare opcode.
fn shadow_text(shadow: &Block) -> String {
    let value = match catalog::shadow_type_for_opcode(&shadow.opcode) {
        Some(ShadowType::Text) => shadow.fields.get("TEXT").map(|f| quote_str(&f.value)),
        Some(ShadowType::Color) => shadow.fields.get("COLOUR").map(|f| f.value.clone()),
        Some(_) => shadow
            .fields
            .get("NUM")
            .map(|f| f.value.trim().to_string())
            .filter(|v| !v.is_empty()),
        None => shadow.first_field().map(|(_, f)| f.value.clone()),
    };
    match value {
        Some(value) => format!("{} ({})", value, shadow.opcode),
        None => shadow.opcode.clone(),
    }
}

fn raw_inputs(block: &Block) -> Map<String, Value> {
    let mut out = Map::new();
    for input in &block.inputs {
        out.insert(
            input.name.clone(),
            json!({"name": input.name, "block": input.block, "shadow": input.shadow}),
        );
    }
    for (slot, head) in block.branches.iter().enumerate() {
        if let Some(head) = head {
            let name = BRANCH_NAMES[slot];
            out.insert(
                name.to_string(),
                json!({"name": name, "block": head, "shadow": Value::Null}),
            );
        }
    }
    out
}

fn raw_fields(block: &Block) -> Map<String, Value> {
    block
        .fields
        .iter()
        .map(|(name, field)| {
            (
                name.clone(),
                json!({"name": name, "value": field.value, "id": field.id}),
            )
        })
        .collect()
}

fn quote_str(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

fn spaces(n: usize) -> String {
    " ".repeat(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::Headless;
    use crate::sb3::project_from_json;

    fn project(blocks: Value) -> Project {
        project_from_json(&json!({
            "targets": [
                {"name": "Stage", "isStage": true, "blocks": {}},
                {"name": "Cat", "isStage": false, "blocks": blocks}
            ]
        }))
        .unwrap()
    }

    fn plain() -> SerializeOptions {
        SerializeOptions {
            with_ids: false,
            with_choices: false,
        }
    }

    #[test]
    fn literal_shadows_render_inline() {
        let project = project(json!({
            "hat": {"opcode": "event_whenflagclicked", "next": "say", "parent": null,
                    "inputs": {}, "fields": {}, "topLevel": true, "x": 0, "y": 0},
            "say": {"opcode": "looks_sayforsecs", "next": null, "parent": "hat",
                    "inputs": {"MESSAGE": [1, [10, "hi \"there\""]], "SECS": [1, [4, "2"]]},
                    "fields": {}, "topLevel": false}
        }));
        let out = serialize(&project, &Headless, plain()).unwrap();
        assert_eq!(
            out.pseudocode,
            "#1 event_whenflagclicked [top]\n\
             #2 looks_sayforsecs\n  \
             - input MESSAGE: \"hi \\\"there\\\"\" (text)\n  \
             - input SECS: 2 (math_number)"
        );
        assert_eq!(out.idx_to_block[&2].id, "say");
        assert_eq!(out.id_to_block["hat"].position, Some(Position { x: 0.0, y: 0.0 }));
    }

    #[test]
    fn reporters_nest_one_level_deeper() {
        let project = project(json!({
            "set": {"opcode": "data_setvariableto", "next": null, "parent": null,
                    "inputs": {"VALUE": [3, "add", [10, "0"]]},
                    "fields": {"VARIABLE": ["score", "v1"]}, "topLevel": true, "x": 0, "y": 0},
            "add": {"opcode": "operator_add", "next": null, "parent": "set",
                    "inputs": {"NUM1": [1, [4, "1"]], "NUM2": [1, [4, ""]]},
                    "fields": {}, "topLevel": false}
        }));
        let out = serialize(&project, &Headless, plain()).unwrap();
        let lines = out.pseudocode.lines().collect::<Vec<_>>();
        assert_eq!(
            lines,
            vec![
                "#1 data_setvariableto [top]",
                "  - field VARIABLE: score",
                "  - input VALUE:",
                "    #2 operator_add",
                "      - input NUM1: 1 (math_number)",
                "      - input NUM2: math_number",
            ]
        );
    }

    #[test]
    fn ids_are_appended_when_requested() {
        let project = project(json!({
            "hide": {"opcode": "looks_hide", "next": null, "parent": null,
                     "inputs": {}, "fields": {}, "topLevel": true, "x": 0, "y": 0}
        }));
        let options = SerializeOptions {
            with_ids: true,
            with_choices: false,
        };
        let out = serialize(&project, &Headless, options).unwrap();
        assert_eq!(out.pseudocode, "#1 looks_hide [top] (id: hide)");
    }

    #[test]
    fn cycles_fail_instead_of_looping() {
        let project = project(json!({
            "a": {"opcode": "looks_show", "next": "b", "parent": null,
                  "inputs": {}, "fields": {}, "topLevel": true, "x": 0, "y": 0},
            "b": {"opcode": "looks_hide", "next": "a", "parent": "a",
                  "inputs": {}, "fields": {}, "topLevel": false}
        }));
        let err = serialize(&project, &Headless, plain()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ExecutionError);
    }

    #[test]
    fn dangling_references_fail() {
        let project = project(json!({
            "a": {"opcode": "looks_show", "next": "gone", "parent": null,
                  "inputs": {}, "fields": {}, "topLevel": true, "x": 0, "y": 0}
        }));
        let err = serialize(&project, &Headless, plain()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ExecutionError);
        assert!(err.message.contains("gone"));
    }

    #[test]
    fn missing_editing_target_is_no_target() {
        let mut project = project(json!({}));
        project.editing = None;
        let err = serialize(&project, &Headless, plain()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::NoTarget);
        project.editing = Some(9);
        let err = serialize(&project, &Headless, plain()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ApiUnavailable);
    }

    #[test]
    fn shadow_without_value_renders_opcode() {
        let mut shadow = Block::new("p", "procedures_prototype");
        shadow.parent = Some("def".to_string());
        assert_eq!(shadow_text(&shadow), "procedures_prototype");
        let mut colour = Block::new("c", "colour_picker");
        colour.fields.insert("COLOUR".to_string(), crate::model::Field::new("#ff0000"));
        assert_eq!(shadow_text(&colour), "#ff0000 (colour_picker)");
    }
}
