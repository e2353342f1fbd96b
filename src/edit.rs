use crate::catalog::{self, BlockKind};
use crate::error::{ApiError, ErrorKind, Result};
use crate::model::{branch_slot, BlockArena, Project, Scope, Variable, BRANCH_NAMES};
use crate::mutate::{editing_index, next_script_y};
use anyhow::anyhow;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Created {
    pub id: String,
    pub name: String,
    pub scope: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    StackAfter,
    StatementInto(String),
    ValueInto(String),
}

impl Placement {
    /// Parses `{kind, inputName}`.
    pub fn from_json(value: &Value) -> Result<Self> {
        let kind = value
            .get("kind")
            .and_then(Value::as_str)
            .ok_or_else(|| ApiError::invalid_arg("'placement.kind' is required."))?;
        let input_name = value
            .get("inputName")
            .and_then(Value::as_str)
            .map(ToString::to_string);
        match (kind, input_name) {
            ("stack_after", _) => Ok(Placement::StackAfter),
            ("statement_into", name) => Ok(Placement::StatementInto(
                name.unwrap_or_else(|| BRANCH_NAMES[0].to_string()),
            )),
            ("value_into", Some(name)) => Ok(Placement::ValueInto(name)),
            ("value_into", None) => Err(ApiError::invalid_arg(
                "'inputName' is required when kind is 'value_into'.",
            )),
            (other, _) => Err(ApiError::invalid_arg(format!(
                "Unknown placement kind '{}'.",
                other
            ))),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Placement::StackAfter => "stack_after",
            Placement::StatementInto(_) => "statement_into",
            Placement::ValueInto(_) => "value_into",
        }
    }
}

pub fn parse_scope(scope: &str) -> Result<Scope> {
    match scope {
        "sprite" => Ok(Scope::Sprite),
        "all" => Ok(Scope::Stage),
        _ => Err(ApiError::invalid_arg("'scope' must be 'sprite' or 'all'.")),
    }
}

pub fn add_variable(project: &mut Project, name: &str, scope: Scope) -> Result<Created> {
    add_entity(project, name, scope, false)
}

pub fn add_list(project: &mut Project, name: &str, scope: Scope) -> Result<Created> {
    add_entity(project, name, scope, true)
}

fn add_entity(project: &mut Project, name: &str, scope: Scope, list: bool) -> Result<Created> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ApiError::invalid_arg("'name' is required."));
    }
    let editing = editing_index(project)?;
    let owner = match scope {
        Scope::Sprite => editing,
        Scope::Stage => project
            .stage_index()
            .ok_or_else(|| ApiError::new(ErrorKind::NoTarget, "Project has no stage."))?,
    };

    let pick = |t: &crate::model::Target| if list { t.lists.clone() } else { t.variables.clone() };
    let taken = if project.targets[owner].is_stage {
        // A global clashes with any sprite-local entity of the same name.
        project.targets.iter().flat_map(pick).any(|v| v.name == name)
    } else {
        let in_scope = if list {
            project.lists_in_scope(owner)
        } else {
            project.variables_in_scope(owner)
        };
        in_scope.iter().any(|(v, _)| v.name == name)
    };
    let kind = if list { "list" } else { "variable" };
    if taken {
        return Err(ApiError::invalid_arg(format!(
            "A {} named '{}' already exists in scope.",
            kind, name
        )));
    }

    let id = project.new_entity_id(if list { "list" } else { "var" });
    let entity = Variable {
        id: id.clone(),
        name: name.to_string(),
        value: if list { json!([]) } else { json!(0) },
    };
    let target = &mut project.targets[owner];
    let scope = if target.is_stage { Scope::Stage } else { Scope::Sprite };
    if list {
        target.lists.push(entity);
    } else {
        target.variables.push(entity);
    }
    info!(sprite = %target.name, kind, name, "entity created");
    Ok(Created {
        id,
        name: name.to_string(),
        scope: scope.as_str(),
    })
}

fn structural(blocks: &BlockArena, id: &str, role: &str) -> Result<()> {
    let block = blocks
        .get(id)
        .ok_or_else(|| ApiError::not_found(format!("{} block '{}' not found.", role, id)))?;
    if catalog::classify(&block.opcode) == BlockKind::Shadow {
        return Err(ApiError::invalid_arg(format!(
            "{} block '{}' is a shadow and cannot be moved.",
            role, id
        )));
    }
    Ok(())
}

/// Points whatever slot of `parent_id` referred to `old` at `new` instead.
/// An input that loses its block falls back to its shadow.
fn relink(
    blocks: &mut BlockArena,
    parent_id: &str,
    old: &str,
    new: Option<String>,
) -> anyhow::Result<()> {
    let parent = blocks.require_mut(parent_id)?;
    if parent.next.as_deref() == Some(old) {
        parent.next = new;
    } else if let Some(slot) = parent.branches.iter().position(|b| b.as_deref() == Some(old)) {
        parent.branches[slot] = new;
    } else if let Some(input) = parent
        .inputs
        .iter_mut()
        .find(|input| input.block.as_deref() == Some(old))
    {
        input.block = new.or_else(|| input.shadow.clone());
    } else {
        return Err(anyhow!(
            "Block '{}' is not linked from its parent '{}'.",
            old,
            parent_id
        ));
    }
    Ok(())
}

/// Unplugs `id` from its parent, keeping everything after it attached.
fn unlink(blocks: &mut BlockArena, id: &str) -> anyhow::Result<()> {
    let Some(parent) = blocks.require(id)?.parent.clone() else {
        return Ok(());
    };
    relink(blocks, &parent, id, None)?;
    blocks.require_mut(id)?.parent = None;
    Ok(())
}

pub fn detach_blocks(project: &mut Project, block_id: &str) -> Result<Value> {
    let target = editing_index(project)?;
    let blocks = &mut project.targets[target].blocks;
    structural(blocks, block_id, "Source")?;
    let previous_parent = blocks.require(block_id)?.parent.clone();
    if previous_parent.is_some() {
        let y = next_script_y(blocks);
        unlink(blocks, block_id)?;
        blocks.set_top_level(block_id, true)?;
        let block = blocks.require_mut(block_id)?;
        block.x = Some(0.0);
        block.y = Some(y);
        info!(block = block_id, "blocks detached");
    }
    Ok(json!({
        "blockId": block_id,
        "detached": previous_parent.is_some(),
        "previousParent": previous_parent,
    }))
}

pub fn connect_blocks(
    project: &mut Project,
    source_id: &str,
    target_id: &str,
    placement: &Placement,
) -> Result<Value> {
    let target = editing_index(project)?;
    let blocks = &mut project.targets[target].blocks;
    structural(blocks, source_id, "Source")?;
    structural(blocks, target_id, "Target")?;
    if blocks.subtree_ids(source_id)?.iter().any(|id| id == target_id) {
        return Err(ApiError::invalid_arg(format!(
            "Block '{}' is inside '{}' and cannot receive it.",
            target_id, source_id
        )));
    }
    let source = blocks.require(source_id)?;
    let destination = blocks.require(target_id)?;

    match placement {
        Placement::StackAfter | Placement::StatementInto(_) if catalog::is_hat(&source.opcode) => {
            return Err(ApiError::invalid_arg(format!(
                "Hat block '{}' must stay at the top of its script.",
                source_id
            )));
        }
        Placement::StatementInto(name) => {
            let slot = branch_slot(name).ok_or_else(|| {
                ApiError::invalid_arg(format!("'{}' is not a statement input.", name))
            })?;
            let declared = catalog::expected_branches(&destination.opcode).len();
            if slot >= declared && destination.branches[slot].is_none() {
                return Err(ApiError::invalid_arg(format!(
                    "Block '{}' ({}) has no {} branch.",
                    target_id, destination.opcode, name
                )));
            }
        }
        Placement::ValueInto(name) => {
            if branch_slot(name).is_some() {
                return Err(ApiError::invalid_arg(format!(
                    "'{}' is a statement input; use statement_into.",
                    name
                )));
            }
            if source.next.is_some() {
                return Err(ApiError::invalid_arg(format!(
                    "Block '{}' has blocks below it and cannot be used as a value.",
                    source_id
                )));
            }
            let known = destination.input(name).is_some()
                || catalog::expected_inputs(&destination.opcode).contains(&name.as_str());
            if !known {
                return Err(ApiError::new(
                    ErrorKind::InputNotFound,
                    format!("Input '{}' not found on block '{}'.", name, target_id),
                ));
            }
            let occupied = destination
                .input(name)
                .and_then(|input| input.block.as_deref())
                .and_then(|id| blocks.get(id))
                .map(|b| catalog::classify(&b.opcode) != BlockKind::Shadow)
                .unwrap_or(false);
            if occupied {
                return Err(ApiError::invalid_arg(format!(
                    "Input '{}' of block '{}' already holds a block.",
                    name, target_id
                )));
            }
        }
        Placement::StackAfter => {}
    }

    unlink(blocks, source_id)?;
    blocks.set_top_level(source_id, false)?;
    blocks.require_mut(source_id)?.parent = Some(target_id.to_string());

    match placement {
        Placement::StackAfter => {
            let destination = blocks.require_mut(target_id)?;
            let displaced = destination.next.replace(source_id.to_string());
            reattach(blocks, source_id, displaced)?;
        }
        Placement::StatementInto(name) => {
            let slot = branch_slot(name).ok_or_else(|| anyhow!("Bad branch '{}'.", name))?;
            let destination = blocks.require_mut(target_id)?;
            let displaced = destination.branches[slot].replace(source_id.to_string());
            reattach(blocks, source_id, displaced)?;
        }
        Placement::ValueInto(name) => {
            let input = blocks.require_mut(target_id)?.ensure_input(name);
            if input.shadow.is_none() {
                input.shadow = input.block.take();
            }
            input.block = Some(source_id.to_string());
        }
    }
    info!(source = source_id, target = target_id, kind = placement.kind(), "blocks connected");
    Ok(json!({
        "sourceId": source_id,
        "targetId": target_id,
        "placement": placement.kind(),
    }))
}

/// Hangs a displaced sequence below the last block of the `head` chain.
fn reattach(blocks: &mut BlockArena, head: &str, displaced: Option<String>) -> anyhow::Result<()> {
    let Some(displaced) = displaced else {
        return Ok(());
    };
    let tail = blocks.tail_of(head)?;
    blocks.require_mut(&tail)?.next = Some(displaced.clone());
    blocks.require_mut(&displaced)?.parent = Some(tail);
    Ok(())
}

/// Deletes a block with its inputs and branch contents. The block after it
/// takes its place.
pub fn delete_block(project: &mut Project, block_id: &str) -> Result<Value> {
    let target = editing_index(project)?;
    let blocks = &mut project.targets[target].blocks;
    structural(blocks, block_id, "Target")?;
    let block = blocks.require(block_id)?;
    let opcode = block.opcode.clone();
    let parent = block.parent.clone();
    let next = block.next.clone();
    let (x, y, top_level) = (block.x, block.y, block.top_level);

    match &parent {
        Some(parent) => relink(blocks, parent, block_id, next.clone())?,
        None => {
            if let Some(next) = &next {
                blocks.set_top_level(next, true)?;
                let follower = blocks.require_mut(next)?;
                follower.x = x;
                follower.y = y;
            }
        }
    }
    if let Some(next) = &next {
        blocks.require_mut(next)?.parent = parent.clone();
        blocks.require_mut(block_id)?.next = None;
    }
    let removed = blocks.dispose(block_id)?;
    info!(block = block_id, removed = removed.len(), "block deleted");
    Ok(json!({
        "blockId": block_id,
        "opcode": opcode,
        "topLevel": top_level,
        "removed": removed,
    }))
}

pub fn select_sprite(project: &mut Project, name: &str) -> Result<String> {
    let index = project
        .targets
        .iter()
        .position(|t| !t.is_stage && t.name == name)
        .ok_or_else(|| ApiError::not_found(format!("Sprite '{}' not found.", name)))?;
    project.editing = Some(index);
    info!(sprite = name, "editing target selected");
    Ok(project.targets[index].name.clone())
}

pub fn select_stage(project: &mut Project) -> Result<String> {
    let index = project
        .stage_index()
        .ok_or_else(|| ApiError::not_found("Project has no stage."))?;
    project.editing = Some(index);
    Ok(project.targets[index].name.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sb3::project_from_json;

    fn project() -> Project {
        project_from_json(&json!({
            "targets": [
                {"name": "Stage", "isStage": true, "variables": {"g1": ["score", 0]}, "blocks": {}},
                {"name": "Cat", "isStage": false, "variables": {"v1": ["speed", 0]},
                 "blocks": {
                    "hat": {"opcode": "event_whenflagclicked", "next": "a", "parent": null,
                            "inputs": {}, "fields": {}, "topLevel": true, "x": 0, "y": 0},
                    "a": {"opcode": "looks_show", "next": "b", "parent": "hat",
                          "inputs": {}, "fields": {}, "topLevel": false},
                    "b": {"opcode": "looks_hide", "next": null, "parent": "a",
                          "inputs": {}, "fields": {}, "topLevel": false},
                    "loop": {"opcode": "control_forever", "next": null, "parent": null,
                             "inputs": {}, "fields": {}, "topLevel": true, "x": 0, "y": 300}
                 }},
                {"name": "Dog", "isStage": false, "variables": {"d1": ["speed", 0]}, "blocks": {}}
            ]
        }))
        .unwrap()
    }

    fn chain(blocks: &BlockArena, head: &str) -> Vec<String> {
        let mut out = vec![head.to_string()];
        let mut current = head.to_string();
        while let Some(next) = blocks.get(&current).and_then(|b| b.next.clone()) {
            out.push(next.clone());
            current = next;
        }
        out
    }

    #[test]
    fn duplicate_names_are_rejected_per_scope() {
        let mut project = project();
        let err = add_variable(&mut project, "score", Scope::Sprite).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidArg);
        let err = add_variable(&mut project, "speed", Scope::Stage).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidArg);
        let created = add_list(&mut project, "speed", Scope::Sprite).unwrap();
        assert_eq!(created.scope, "sprite");
        assert_eq!(project.targets[1].lists[0].id, created.id);
    }

    #[test]
    fn statement_into_wraps_and_keeps_old_body() {
        let mut project = project();
        connect_blocks(&mut project, "a", "loop", &Placement::StatementInto("SUBSTACK".into()))
            .unwrap();
        let blocks = &project.targets[1].blocks;
        assert_eq!(blocks.get("hat").unwrap().next, None);
        assert_eq!(blocks.get("loop").unwrap().branches[0].as_deref(), Some("a"));
        assert_eq!(chain(blocks, "a"), vec!["a", "b"]);
        assert_eq!(blocks.get("a").unwrap().parent.as_deref(), Some("loop"));
    }

    #[test]
    fn stack_after_splices_existing_next() {
        let mut project = project();
        connect_blocks(&mut project, "loop", "a", &Placement::StackAfter).unwrap();
        let blocks = &project.targets[1].blocks;
        assert_eq!(chain(blocks, "hat"), vec!["hat", "a", "loop", "b"]);
        assert_eq!(blocks.scripts(), &["hat".to_string()]);
    }

    #[test]
    fn invalid_connections_leave_graph_alone() {
        let mut project = project();
        let err = connect_blocks(&mut project, "hat", "loop", &Placement::StackAfter).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidArg);
        let err = connect_blocks(&mut project, "a", "b", &Placement::StackAfter).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidArg);
        let err = connect_blocks(&mut project, "loop", "a", &Placement::StatementInto("SUBSTACK".into()))
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidArg);
        assert_eq!(chain(&project.targets[1].blocks, "hat"), vec!["hat", "a", "b"]);
    }

    #[test]
    fn detach_makes_a_new_script() {
        let mut project = project();
        let out = detach_blocks(&mut project, "a").unwrap();
        assert_eq!(out["previousParent"], "hat");
        let blocks = &project.targets[1].blocks;
        assert_eq!(blocks.get("hat").unwrap().next, None);
        assert!(blocks.get("a").unwrap().top_level);
        assert_eq!(chain(blocks, "a"), vec!["a", "b"]);
    }

    #[test]
    fn delete_splices_the_follower_in() {
        let mut project = project();
        delete_block(&mut project, "a").unwrap();
        let blocks = &project.targets[1].blocks;
        assert_eq!(chain(blocks, "hat"), vec!["hat", "b"]);
        assert_eq!(blocks.get("b").unwrap().parent.as_deref(), Some("hat"));

        delete_block(&mut project, "hat").unwrap();
        let blocks = &project.targets[1].blocks;
        assert!(blocks.get("b").unwrap().top_level);
        assert!(blocks.scripts().contains(&"b".to_string()));
    }

    #[test]
    fn selecting_targets() {
        let mut project = project();
        assert_eq!(select_sprite(&mut project, "Dog").unwrap(), "Dog");
        assert_eq!(project.editing, Some(2));
        assert_eq!(select_sprite(&mut project, "Stage").unwrap_err().kind, ErrorKind::NotFound);
        assert_eq!(select_stage(&mut project).unwrap(), "Stage");
        assert_eq!(project.editing, Some(0));
    }

    #[test]
    fn placement_parsing() {
        assert_eq!(
            Placement::from_json(&json!({"kind": "value_into", "inputName": "VALUE"})).unwrap(),
            Placement::ValueInto("VALUE".into())
        );
        assert!(Placement::from_json(&json!({"kind": "value_into"})).is_err());
        assert!(Placement::from_json(&json!({"kind": "sideways"})).is_err());
        assert_eq!(parse_scope("all").unwrap(), Scope::Stage);
    }
}
