use crate::catalog;
use crate::edit::{self, Placement};
use crate::editor::{Editor, Headless};
use crate::error::{ApiError, ErrorKind, Result};
use crate::model::{Project, Scope};
use crate::mutate;
use crate::serialize::{self, BlockRecord, SerializeOptions, Serialized};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// One call against the session: `{"api": "...", "args": {...}}`.
#[derive(Debug, Clone, Deserialize)]
pub struct Request {
    #[serde(default)]
    pub api: String,
    #[serde(default)]
    pub args: Value,
}

impl Request {
    pub fn new(api: impl Into<String>, args: Value) -> Self {
        Self {
            api: api.into(),
            args,
        }
    }
}

/// A loaded project plus the state carried between requests.
pub struct Session {
    project: Project,
    editor: Box<dyn Editor>,
    options: SerializeOptions,
    /// `idxToBlock` of the last serialization; cleared by structural edits.
    cached: Option<BTreeMap<usize, BlockRecord>>,
}

impl Session {
    pub fn new(project: Project) -> Self {
        Self {
            project,
            editor: Box::new(Headless),
            options: SerializeOptions::default(),
            cached: None,
        }
    }

    pub fn with_editor(mut self, editor: Box<dyn Editor>) -> Self {
        self.editor = editor;
        self
    }

    pub fn with_options(mut self, options: SerializeOptions) -> Self {
        self.options = options;
        self
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    pub fn into_project(self) -> Project {
        self.project
    }

    /// Serializes the editing target and remembers its index for later requests.
    pub fn serialize(&mut self) -> Result<Serialized> {
        let out = serialize::serialize(&self.project, self.editor.as_ref(), self.options)?;
        self.cached = Some(out.idx_to_block.clone());
        Ok(out)
    }

    /// Runs one request and wraps the outcome in the `{ok, ...}` envelope.
    pub fn execute(&mut self, request: &Request) -> Value {
        let api = request.api.trim();
        debug!(api, "executing request");
        match self.dispatch(api, &request.args) {
            Ok(payload) => success(payload),
            Err(err) => {
                warn!(api, kind = %err.kind, message = %err.message, "request failed");
                failure(&err)
            }
        }
    }

    fn dispatch(&mut self, api: &str, args: &Value) -> Result<Value> {
        match api {
            "" => Err(ApiError::invalid_arg("Missing 'api' field.")),
            "get_blocks_pseudocode" | "get_blocks_structure" => self.blocks_pseudocode(),
            "set_block_field" => self.set_block_field(args),
            "add_block" => {
                let block_type = str_arg(args, "blockType")?;
                let added = mutate::add_block(
                    &mut self.project,
                    self.editor.as_ref(),
                    block_type,
                    args.get("creation").filter(|c| !c.is_null()),
                )?;
                self.cached = None;
                Ok(json!({"blockId": added.block_id, "connected": added.connected}))
            }
            "add_variable" | "add_list" => {
                let name = str_arg(args, "name")?;
                let scope = edit::parse_scope(str_arg(args, "scope")?.trim())?;
                let created = if api == "add_variable" {
                    edit::add_variable(&mut self.project, name, scope)?
                } else {
                    edit::add_list(&mut self.project, name, scope)?
                };
                Ok(json!({ "created": created }))
            }
            "connect_blocks" => {
                let source = self.block_arg(args, "sourceBlockId", "sourceBlockIndex")?;
                let target = self.block_arg(args, "targetBlockId", "targetBlockIndex")?;
                let placement = Placement::from_json(args.get("placement").unwrap_or(&Value::Null))?;
                let out = edit::connect_blocks(&mut self.project, &source, &target, &placement)?;
                self.cached = None;
                Ok(out)
            }
            "detach_blocks" => {
                let block = self.block_arg(args, "blockId", "blockIndex")?;
                let out = edit::detach_blocks(&mut self.project, &block)?;
                self.cached = None;
                Ok(out)
            }
            "delete_block" => {
                let index_key = if args.get("blockIndex").is_some() { "blockIndex" } else { "index" };
                let block = self.block_arg(args, "blockId", index_key)?;
                let info = edit::delete_block(&mut self.project, &block)?;
                self.cached = None;
                Ok(json!({
                    "deleted": true,
                    "index": args.get(index_key),
                    "blockId": block,
                    "blockInfo": info,
                }))
            }
            "select_sprite" => {
                let name = str_arg(args, "name")?.trim().to_string();
                let selected = edit::select_sprite(&mut self.project, &name)?;
                self.cached = None;
                Ok(json!({ "targetName": selected }))
            }
            "select_stage" => {
                let selected = edit::select_stage(&mut self.project)?;
                self.cached = None;
                Ok(json!({ "targetName": selected }))
            }
            other => Err(ApiError::new(
                ErrorKind::Unsupported,
                format!("Unsupported api '{}'.", other),
            )),
        }
    }

    fn blocks_pseudocode(&mut self) -> Result<Value> {
        let out = self.serialize()?;
        let mut payload = match serde_json::to_value(&out).map_err(anyhow::Error::from)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        if let Some(target) = self.project.editing {
            payload.extend(target_context(&self.project, target));
        }
        info!(
            target_name = %out.target_name,
            blocks = out.idx_to_block.len(),
            "pseudocode generated"
        );
        Ok(Value::Object(payload))
    }

    fn set_block_field(&mut self, args: &Value) -> Result<Value> {
        let block_id = self.block_arg(args, "blockId", "blockIndex")?;
        let field_name = str_arg(args, "fieldName")?;
        let value = match args.get("value") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::Bool(b)) => b.to_string(),
            _ => return Err(ApiError::invalid_arg("'value' is required.")),
        };
        let update = mutate::set_field(
            &mut self.project,
            self.editor.as_ref(),
            &block_id,
            field_name,
            &value,
        )?;
        Ok(json!({
            "updated": update.updated,
            "blockIndex": args.get("blockIndex"),
            "blockId": block_id,
            "fieldName": field_name,
            "resolvedField": update.field_name,
            "value": update.value,
            "originalValue": value,
        }))
    }

    /// Resolves a block argument given either directly by id or by a cached index.
    fn block_arg(&self, args: &Value, id_key: &str, index_key: &str) -> Result<String> {
        if let Some(id) = args.get(id_key).and_then(Value::as_str) {
            return Ok(id.to_string());
        }
        let Some(raw) = args.get(index_key) else {
            return Err(ApiError::invalid_arg(format!(
                "'{}' or '{}' is required.",
                index_key, id_key
            )));
        };
        let index = raw
            .as_u64()
            .filter(|i| *i >= 1)
            .ok_or_else(|| {
                ApiError::invalid_arg(format!("'{}' must be a positive integer.", index_key))
            })?;
        let Some(cached) = &self.cached else {
            return Err(ApiError::new(
                ErrorKind::InvalidState,
                "No cached block data. Call get_blocks_pseudocode first.",
            ));
        };
        cached
            .get(&(index as usize))
            .map(|record| record.id.clone())
            .ok_or_else(|| ApiError::not_found(format!("Block not found at index {}.", index)))
    }
}

fn str_arg<'a>(args: &'a Value, key: &str) -> Result<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ApiError::invalid_arg(format!("'{}' is required.", key)))
}

pub fn success(payload: Value) -> Value {
    let mut out = Map::new();
    out.insert("ok".to_string(), Value::Bool(true));
    match payload {
        Value::Object(map) => out.extend(map),
        Value::Null => {}
        other => {
            out.insert("data".to_string(), other);
        }
    }
    Value::Object(out)
}

pub fn failure(err: &ApiError) -> Value {
    let mut out = json!({
        "ok": false,
        "kind": err.kind,
        "message": err.message,
    });
    if let (Some(details), Some(obj)) = (&err.details, out.as_object_mut()) {
        obj.insert("details".to_string(), details.clone());
    }
    out
}

/// Names and identifiers a caller needs to phrase edits against `target`.
fn target_context(project: &Project, target: usize) -> Map<String, Value> {
    let mut variables = Map::new();
    let mut stage_variables = Map::new();
    let mut target_variables = Vec::new();
    for (var, scope) in project.variables_in_scope(target) {
        target_variables.push(json!({"name": var.name, "scope": scope.as_str()}));
        let map = match scope {
            Scope::Sprite => &mut variables,
            Scope::Stage => &mut stage_variables,
        };
        map.insert(var.name.clone(), json!(var.id));
    }

    let mut lists = Map::new();
    let mut stage_lists = Map::new();
    let mut target_lists = Vec::new();
    for (list, scope) in project.lists_in_scope(target) {
        target_lists.push(json!({"name": list.name, "scope": scope.as_str()}));
        let map = match scope {
            Scope::Sprite => &mut lists,
            Scope::Stage => &mut stage_lists,
        };
        map.insert(list.name.clone(), json!(list.id));
    }

    let sounds = project.targets[target]
        .sounds
        .iter()
        .map(|s| (s.clone(), json!(s)))
        .collect::<Map<_, _>>();
    let sprites = project
        .sprite_names()
        .into_iter()
        .map(|s| (s.clone(), json!(s)))
        .collect::<Map<_, _>>();
    let mut special = Map::new();
    for field in ["TO", "TOUCHINGOBJECTMENU", "CLONE_OPTION", "OBJECT"] {
        for (label, code) in catalog::special_targets(field) {
            special.insert(label.to_string(), json!(code));
        }
    }
    for (label, code) in catalog::fixed_menu("sensing_current", "CURRENTMENU").unwrap_or_default() {
        special.insert(label.to_string(), json!(code));
    }

    let mut out = Map::new();
    out.insert("availableTargets".to_string(), json!(project.sprite_names()));
    out.insert("targetVariables".to_string(), Value::Array(target_variables));
    out.insert("targetLists".to_string(), Value::Array(target_lists));
    out.insert(
        "valueToIdMappings".to_string(),
        json!({
            "variables": variables,
            "stageVariables": stage_variables,
            "lists": lists,
            "stageLists": stage_lists,
            "sounds": sounds,
            "sprites": sprites,
            "specialOptions": special,
        }),
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelopes_flatten_payloads() {
        let ok = success(json!({"blockId": "b1"}));
        assert_eq!(ok, json!({"ok": true, "blockId": "b1"}));
        let err = ApiError::new(ErrorKind::InputNotFound, "nope").with_details(json!({"availableInputs": ["A"]}));
        assert_eq!(
            failure(&err),
            json!({"ok": false, "kind": "INPUT_NOT_FOUND", "message": "nope", "details": {"availableInputs": ["A"]}})
        );
    }

    #[test]
    fn string_args_must_be_present() {
        let args = json!({"name": "  ", "scope": "all"});
        assert_eq!(str_arg(&args, "name").unwrap_err().kind, ErrorKind::InvalidArg);
        assert_eq!(str_arg(&args, "scope").unwrap(), "all");
    }
}
