use crate::catalog::{self, BlockKind, InputKind, ShadowType};
use crate::choices::{self, ChoiceContext};
use crate::editor::Editor;
use crate::error::{ApiError, ErrorKind, Result};
use crate::model::{Block, BlockArena, Field, Input, Project};
use regex::Regex;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::OnceLock;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldUpdate {
    pub updated: u32,
    /// Concrete field that was written (e.g. `NUM` for a numeric input).
    pub field_name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddedBlock {
    pub block_id: String,
    pub connected: bool,
}

/// Where a write lands, and what was created to make it possible.
struct Slot {
    owner: String,
    field: String,
    synthesized: Option<Synthesized>,
}

struct Synthesized {
    parent: String,
    input: String,
    shadow: String,
    /// The input slot itself was added (expected by the opcode but absent).
    added_input: bool,
    previous: Input,
}

enum Write {
    Plain(String),
    Reference { label: String, id: String },
    Message(String),
}

pub(crate) fn editing_index(project: &Project) -> Result<usize> {
    let index = project
        .editing
        .ok_or_else(|| ApiError::new(ErrorKind::NoTarget, "No editing target selected."))?;
    if index >= project.targets.len() {
        return Err(ApiError::new(
            ErrorKind::ApiUnavailable,
            format!("Editing target {} is not loaded.", index),
        ));
    }
    Ok(index)
}

/// Writes `value` into the field `input_name` resolves to on `block_id`.
/// On failure the graph is left exactly as it was.
pub fn set_field(
    project: &mut Project,
    editor: &dyn Editor,
    block_id: &str,
    input_name: &str,
    value: &str,
) -> Result<FieldUpdate> {
    let target = editing_index(project)?;
    let slot = resolve_slot(&mut project.targets[target].blocks, block_id, input_name)?;
    match write_slot(project, editor, target, &slot, value) {
        Ok(update) => {
            info!(block = block_id, input = input_name, field = %update.field_name, "field updated");
            Ok(update)
        }
        Err(err) => {
            if let Some(synth) = &slot.synthesized {
                if let Err(rollback_err) = rollback(&mut project.targets[target].blocks, synth) {
                    warn!(block = block_id, input = input_name, error = %rollback_err, "rollback failed");
                }
            }
            debug!(block = block_id, input = input_name, error = %err, "field update rolled back");
            Err(err)
        }
    }
}

fn resolve_slot(blocks: &mut BlockArena, block_id: &str, input_name: &str) -> Result<Slot> {
    let block = blocks
        .get(block_id)
        .ok_or_else(|| ApiError::not_found(format!("Block '{}' not found.", block_id)))?;

    if block.fields.contains_key(input_name) {
        return Ok(Slot {
            owner: block_id.to_string(),
            field: input_name.to_string(),
            synthesized: None,
        });
    }

    let opcode = block.opcode.clone();
    let input = block.input(input_name).cloned();
    let expected = catalog::expected_inputs(&opcode).contains(&input_name);

    if let Some(child_id) = input.as_ref().and_then(|i| i.block.clone()) {
        let child = blocks.require(&child_id)?;
        return connected_slot(child, input_name).map(|field| Slot {
            owner: child_id,
            field,
            synthesized: None,
        });
    }

    if input.is_none() && !expected {
        let legal = legal_inputs(block);
        return Err(ApiError::new(
            ErrorKind::InputNotFound,
            format!(
                "Input '{}' not found on block '{}'. Available inputs: {}",
                input_name,
                block_id,
                legal.join(", ")
            ),
        )
        .with_details(json!({ "availableInputs": legal })));
    }

    synthesize(blocks, block_id, &opcode, input_name, input)
}

fn connected_slot(child: &Block, input_name: &str) -> Result<String> {
    if catalog::classify(&child.opcode) != BlockKind::Shadow {
        return Err(ApiError::new(
            ErrorKind::InvalidField,
            format!(
                "Input '{}' holds block '{}' ({}), not a value.",
                input_name, child.id, child.opcode
            ),
        ));
    }
    if let Some(field) = catalog::shadow_primary_field(&child.opcode) {
        if child.fields.contains_key(field) {
            return Ok(field.to_string());
        }
    }
    child
        .first_field()
        .map(|(name, _)| name.clone())
        .ok_or_else(|| {
            ApiError::new(
                ErrorKind::InvalidField,
                format!("Shadow '{}' ({}) has no writable field.", child.id, child.opcode),
            )
        })
}

/// Actual input names followed by expected ones, as the serializer lists them.
fn legal_inputs(block: &Block) -> Vec<String> {
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

fn synthesize(
    blocks: &mut BlockArena,
    parent_id: &str,
    opcode: &str,
    input_name: &str,
    existing: Option<Input>,
) -> Result<Slot> {
    let added_input = existing.is_none();
    let previous = existing.unwrap_or_else(|| Input::empty(input_name));

    // An unplugged input that still owns its shadow gets it back.
    if let Some(shadow_id) = previous.shadow.clone() {
        if let Some(shadow) = blocks.get(&shadow_id) {
            let field = connected_slot(shadow, input_name)?;
            let parent = blocks.require_mut(parent_id)?;
            parent.ensure_input(input_name).block = Some(shadow_id.clone());
            return Ok(Slot {
                owner: shadow_id.clone(),
                field,
                synthesized: Some(Synthesized {
                    parent: parent_id.to_string(),
                    input: input_name.to_string(),
                    shadow: shadow_id,
                    added_input,
                    previous,
                }),
            });
        }
    }

    let (shadow_opcode, field, default) = match catalog::input_kind(opcode, input_name) {
        Some(InputKind::Menu(menu_opcode, menu_field, default)) => (menu_opcode, menu_field, default),
        Some(InputKind::Prototype) => {
            return Err(ApiError::new(
                ErrorKind::ShadowCreateFailed,
                format!("Cannot create a shadow for '{}' of '{}'.", input_name, opcode),
            ))
        }
        Some(InputKind::Literal(..)) | Some(InputKind::Boolean) | None => {
            let kind = catalog::infer_shadow_type(input_name, None);
            (kind.opcode(), kind.field(), "")
        }
    };
    if catalog::classify(shadow_opcode) != BlockKind::Shadow {
        return Err(ApiError::new(
            ErrorKind::ShadowCreateFailed,
            format!("Unknown shadow type '{}'.", shadow_opcode),
        ));
    }

    let shadow_id = blocks.new_id("shadow");
    let mut shadow = Block::new(shadow_id.clone(), shadow_opcode);
    shadow.parent = Some(parent_id.to_string());
    shadow.fields.insert(field.to_string(), Field::new(default));
    blocks.insert(shadow);
    let synthesized = Synthesized {
        parent: parent_id.to_string(),
        input: input_name.to_string(),
        shadow: shadow_id.clone(),
        added_input,
        previous,
    };

    if catalog::is_boolean_input(opcode, input_name) {
        rollback(blocks, &synthesized)?;
        return Err(ApiError::new(
            ErrorKind::ConnectionFailed,
            format!(
                "Input '{}' of '{}' only accepts boolean blocks.",
                input_name, opcode
            ),
        ));
    }

    let parent = blocks.require_mut(parent_id)?;
    let input = parent.ensure_input(input_name);
    input.block = Some(shadow_id.clone());
    input.shadow = Some(shadow_id.clone());
    debug!(block = parent_id, input = input_name, shadow = %shadow_id, "shadow created");
    Ok(Slot {
        owner: shadow_id,
        field: field.to_string(),
        synthesized: Some(synthesized),
    })
}

fn rollback(blocks: &mut BlockArena, synth: &Synthesized) -> Result<()> {
    let owned = synth.previous.shadow.as_deref() == Some(synth.shadow.as_str());
    if !owned {
        blocks.remove(&synth.shadow);
    }
    let parent = blocks.require_mut(&synth.parent)?;
    if synth.added_input {
        parent.inputs.retain(|input| input.name != synth.input);
    } else if let Some(input) = parent.input_mut(&synth.input) {
        *input = synth.previous.clone();
    }
    Ok(())
}

fn write_slot(
    project: &mut Project,
    editor: &dyn Editor,
    target: usize,
    slot: &Slot,
    value: &str,
) -> Result<FieldUpdate> {
    let owner = project.targets[target].blocks.require(&slot.owner)?;
    let owner_opcode = owner.opcode.clone();
    let current = owner
        .fields
        .get(&slot.field)
        .map(|f| f.value.clone())
        .unwrap_or_default();

    let write = translate(project, editor, target, &owner_opcode, slot, &current, value)?;
    if let (Write::Plain(text), None) = (&write, &slot.synthesized) {
        validate(&owner_opcode, &slot.field, text)?;
    }

    let (field, reported) = match write {
        Write::Plain(text) => (Field::new(text.clone()), text),
        Write::Reference { label, id } => (Field::reference(label, id.clone()), id),
        Write::Message(name) => {
            let id = project.ensure_broadcast(&name)?;
            (Field::reference(name, id.clone()), id)
        }
    };
    let owner = project.targets[target].blocks.require_mut(&slot.owner)?;
    owner.fields.insert(slot.field.clone(), field);
    Ok(FieldUpdate {
        updated: 1,
        field_name: slot.field.clone(),
        value: reported,
    })
}

fn translate(
    project: &Project,
    editor: &dyn Editor,
    target: usize,
    owner_opcode: &str,
    slot: &Slot,
    current: &str,
    value: &str,
) -> Result<Write> {
    if catalog::is_message_field(owner_opcode, &slot.field) {
        if value.trim().is_empty() {
            return Err(ApiError::new(ErrorKind::SetFailed, "Message name cannot be empty."));
        }
        return Ok(Write::Message(value.to_string()));
    }

    let ctx = ChoiceContext {
        project,
        target,
        editor,
    };
    let options = choices::field_options(&ctx, owner_opcode, &slot.field, current, &slot.owner)
        .unwrap_or_default();

    if catalog::is_reference_field(&slot.field) {
        let found = options
            .iter()
            .find(|o| o.label == value)
            .or_else(|| options.iter().find(|o| o.code == value));
        return match found {
            Some(option) => Ok(Write::Reference {
                label: option.label.clone(),
                id: option.code.clone(),
            }),
            None => Err(ApiError::new(
                ErrorKind::SetFailed,
                format!("No {} named '{}' is in scope.", slot.field.to_lowercase(), value),
            )
            .with_details(json!({
                "available": options.iter().map(|o| o.label.clone()).collect::<Vec<_>>()
            }))),
        };
    }

    let code = options
        .iter()
        .find(|o| o.label == value)
        .map(|o| o.code.clone())
        .unwrap_or_else(|| value.to_string());
    Ok(Write::Plain(code))
}

/// An existing colour picker only holds `#rrggbb`. Other literals are written as given.
fn validate(owner_opcode: &str, field: &str, text: &str) -> Result<()> {
    if catalog::shadow_type_for_opcode(owner_opcode) != Some(ShadowType::Color) {
        return Ok(());
    }
    static COLOUR_RE: OnceLock<std::result::Result<Regex, regex::Error>> = OnceLock::new();
    let colour_re = COLOUR_RE
        .get_or_init(|| Regex::new(r"^#[0-9a-fA-F]{6}$"))
        .as_ref()
        .map_err(|e| anyhow::Error::from(e.clone()))?;
    if colour_re.is_match(text) {
        Ok(())
    } else {
        Err(ApiError::new(
            ErrorKind::SetFailed,
            format!("'{}' is not a #rrggbb colour for {}.", text, field),
        ))
    }
}

/// Inserts a new top-level `opcode` block built from its catalog template.
///
/// `creation` may carry `variableName` / `listName` to bind the block's
/// variable or list field right after insertion.
pub fn add_block(
    project: &mut Project,
    editor: &dyn Editor,
    opcode: &str,
    creation: Option<&Value>,
) -> Result<AddedBlock> {
    let target = editing_index(project)?;
    let spec = catalog::block_spec(opcode)
        .ok_or_else(|| ApiError::invalid_arg(format!("Unknown block type '{}'.", opcode)))?;

    let mut bindings = Vec::new();
    for (key, field) in [("variableName", "VARIABLE"), ("listName", "LIST")] {
        let Some(name) = creation.and_then(|c| c.get(key)) else {
            continue;
        };
        let Some(name) = name.as_str() else {
            return Err(ApiError::invalid_arg(format!("'{}' must be a string.", key)));
        };
        if !spec.fields.iter().any(|(f, _)| *f == field) {
            return Err(ApiError::invalid_arg(format!(
                "Block '{}' has no {} field to bind.",
                opcode, field
            )));
        }
        bindings.push((field.to_string(), name.to_string()));
    }

    let first_variable = project
        .variables_in_scope(target)
        .first()
        .map(|(v, _)| v.name.clone());
    let first_list = project
        .lists_in_scope(target)
        .first()
        .map(|(v, _)| v.name.clone());
    let costume = project.targets[target].costumes.first().cloned();
    let backdrop = project.stage().and_then(|s| s.costumes.first().cloned());
    let sound = project.targets[target].sounds.first().cloned();

    for (field, default) in spec.fields {
        let implicit = match *field {
            "VARIABLE" => first_variable.clone(),
            "LIST" => first_list.clone(),
            "BROADCAST_OPTION" => Some(default.to_string()),
            _ => None,
        };
        if let Some(name) = implicit {
            if !bindings.iter().any(|(f, _)| f == field) {
                bindings.push((field.to_string(), name));
            }
        }
    }

    let blocks = &mut project.targets[target].blocks;
    let block_id = blocks.new_id("block");
    let mut block = Block::new(block_id.clone(), opcode);
    block.top_level = true;
    block.x = Some(0.0);
    block.y = Some(next_script_y(blocks));
    for (field, default) in spec.fields {
        block.fields.insert(field.to_string(), Field::new(*default));
    }

    let mut shadows = Vec::new();
    for input in spec.inputs {
        let mut slot = Input::empty(input.name);
        let template = match input.kind {
            InputKind::Literal(kind, default) => Some((kind.opcode(), kind.field(), default.to_string())),
            InputKind::Menu(menu_opcode, menu_field, default) => {
                let default = match menu_field {
                    "COSTUME" => costume.clone().unwrap_or_default(),
                    "BACKDROP" => backdrop.clone().unwrap_or_default(),
                    "SOUND_MENU" => sound.clone().unwrap_or_default(),
                    _ => default.to_string(),
                };
                Some((menu_opcode, menu_field, default))
            }
            InputKind::Boolean | InputKind::Prototype => None,
        };
        if let Some((shadow_opcode, field, default)) = template {
            let shadow_id = blocks.new_id("shadow");
            let mut shadow = Block::new(shadow_id.clone(), shadow_opcode);
            shadow.parent = Some(block_id.clone());
            shadow.fields.insert(field.to_string(), Field::new(default));
            slot.block = Some(shadow_id.clone());
            slot.shadow = Some(shadow_id);
            if catalog::is_message_field(shadow_opcode, field) {
                bindings.push((input.name.to_string(), "message1".to_string()));
            }
            shadows.push(shadow);
        }
        block.inputs.push(slot);
    }
    blocks.insert(block);
    for shadow in shadows {
        blocks.insert(shadow);
    }

    for (field, name) in &bindings {
        if let Err(err) = set_field(project, editor, &block_id, field, name) {
            project.targets[target].blocks.dispose(&block_id)?;
            return Err(err);
        }
    }
    info!(block = %block_id, opcode, "block added");
    Ok(AddedBlock {
        block_id,
        connected: false,
    })
}

pub(crate) fn next_script_y(blocks: &BlockArena) -> f64 {
    blocks
        .scripts()
        .iter()
        .filter_map(|id| blocks.get(id).and_then(|b| b.y))
        .fold(None, |acc: Option<f64>, y| Some(acc.map_or(y, |a| a.max(y))))
        .map(|y| y + 100.0)
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::Headless;
    use crate::sb3::project_from_json;

    fn project() -> Project {
        project_from_json(&json!({
            "targets": [
                {"name": "Stage", "isStage": true, "variables": {"g1": ["global", 0]},
                 "broadcasts": {}, "blocks": {}},
                {"name": "Cat", "isStage": false, "variables": {"v1": ["score", 0]},
                 "blocks": {
                    "turn": {"opcode": "motion_pointindirection", "next": null, "parent": null,
                             "inputs": {"DIRECTION": [1, [8, "90"]]}, "fields": {},
                             "topLevel": true, "x": 0, "y": 0},
                    "pen": {"opcode": "pen_setPenColorToColor", "next": null, "parent": null,
                            "inputs": {"COLOR": [1, [9, "#112233"]]}, "fields": {},
                            "topLevel": true, "x": 0, "y": 100}
                 }}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn connected_shadow_gets_its_primary_field() {
        let mut project = project();
        let update = set_field(&mut project, &Headless, "turn", "DIRECTION", "45").unwrap();
        assert_eq!(update.field_name, "NUM");
        assert_eq!(update.value, "45");
    }

    #[test]
    fn free_form_literals_are_written_as_given() {
        let mut project = project();
        let update = set_field(&mut project, &Headless, "turn", "DIRECTION", "north").unwrap();
        assert_eq!(update.value, "north");
        let blocks = &project.targets[1].blocks;
        let shadow_id = blocks.get("turn").unwrap().input("DIRECTION").unwrap().block.clone().unwrap();
        assert_eq!(blocks.get(&shadow_id).unwrap().fields["NUM"].value, "north");
    }

    #[test]
    fn existing_colour_pickers_take_hex_codes_only() {
        let mut project = project();
        let err = set_field(&mut project, &Headless, "pen", "COLOR", "red").unwrap_err();
        assert_eq!(err.kind, ErrorKind::SetFailed);
        set_field(&mut project, &Headless, "pen", "COLOR", "#00FF7f").unwrap();
    }

    #[test]
    fn synthesized_shadows_accept_any_text() {
        let mut project = project();
        project.targets[1].blocks.get_mut("pen").unwrap().inputs.clear();
        let update = set_field(&mut project, &Headless, "pen", "COLOR", "red").unwrap();
        assert_eq!(update.field_name, "COLOUR");
        assert_eq!(update.value, "red");
    }

    #[test]
    fn unknown_block_is_not_found() {
        let mut project = project();
        let err = set_field(&mut project, &Headless, "nope", "X", "1").unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    #[test]
    fn variable_fields_bind_by_name_or_id() {
        let mut project = project();
        let added = add_block(&mut project, &Headless, "data_changevariableby", None).unwrap();
        let blocks = &project.targets[1].blocks;
        let field = &blocks.get(&added.block_id).unwrap().fields["VARIABLE"];
        assert_eq!(field, &Field::reference("score", "v1"));

        let update = set_field(&mut project, &Headless, &added.block_id, "VARIABLE", "g1").unwrap();
        assert_eq!(update.value, "g1");
        let err = set_field(&mut project, &Headless, &added.block_id, "VARIABLE", "ghost").unwrap_err();
        assert_eq!(err.kind, ErrorKind::SetFailed);
    }

    #[test]
    fn add_block_builds_default_shadows() {
        let mut project = project();
        let added = add_block(&mut project, &Headless, "motion_gotoxy", None).unwrap();
        assert!(!added.connected);
        let blocks = &project.targets[1].blocks;
        let block = blocks.get(&added.block_id).unwrap();
        assert!(block.top_level);
        assert_eq!(block.y, Some(200.0));
        for name in ["X", "Y"] {
            let shadow_id = block.input(name).unwrap().block.clone().unwrap();
            let shadow = blocks.get(&shadow_id).unwrap();
            assert_eq!(shadow.opcode, "math_number");
            assert_eq!(shadow.fields["NUM"].value, "0");
        }
    }

    #[test]
    fn add_block_rejects_unknown_opcodes_and_bad_hints() {
        let mut project = project();
        let before = project.targets[1].blocks.len();
        let err = add_block(&mut project, &Headless, "music_playNote", None).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidArg);
        let hint = json!({"listName": "items"});
        let err = add_block(&mut project, &Headless, "looks_show", Some(&hint)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidArg);
        let hint = json!({"variableName": "ghost"});
        let err = add_block(&mut project, &Headless, "data_showvariable", Some(&hint)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::SetFailed);
        assert_eq!(project.targets[1].blocks.len(), before);
    }

    #[test]
    fn fixed_menu_labels_translate_to_codes() {
        let mut project = project();
        let added = add_block(&mut project, &Headless, "sensing_current", None).unwrap();
        let update =
            set_field(&mut project, &Headless, &added.block_id, "CURRENTMENU", "day of week").unwrap();
        assert_eq!(update.value, "DAYOFWEEK");
        let update = set_field(&mut project, &Headless, &added.block_id, "CURRENTMENU", "MONTH").unwrap();
        assert_eq!(update.value, "MONTH");
    }
}
