use anyhow::{anyhow, Result};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};

pub type BlockId = String;

/// Input slots that hold nested statement sequences instead of values.
pub static BRANCH_NAMES: [&str; 2] = ["SUBSTACK", "SUBSTACK2"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub value: String,
    /// Entity reference for variable, list and broadcast fields.
    pub id: Option<String>,
}

impl Field {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            id: None,
        }
    }

    pub fn reference(value: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            id: Some(id.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Input {
    pub name: String,
    /// Block currently plugged into the slot (may be the shadow itself).
    pub block: Option<BlockId>,
    /// Shadow owned by the slot, visible when `block` is the same id.
    pub shadow: Option<BlockId>,
}

impl Input {
    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            block: None,
            shadow: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub id: BlockId,
    pub opcode: String,
    pub fields: BTreeMap<String, Field>,
    pub inputs: Vec<Input>,
    pub branches: [Option<BlockId>; 2],
    pub next: Option<BlockId>,
    pub parent: Option<BlockId>,
    pub top_level: bool,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub mutation: Option<Value>,
}

impl Block {
    pub fn new(id: impl Into<BlockId>, opcode: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            opcode: opcode.into(),
            fields: BTreeMap::new(),
            inputs: Vec::new(),
            branches: [None, None],
            next: None,
            parent: None,
            top_level: false,
            x: None,
            y: None,
            mutation: None,
        }
    }

    pub fn input(&self, name: &str) -> Option<&Input> {
        self.inputs.iter().find(|input| input.name == name)
    }

    pub fn input_mut(&mut self, name: &str) -> Option<&mut Input> {
        self.inputs.iter_mut().find(|input| input.name == name)
    }

    /// Returns the slot, creating an empty one at the end when it is missing.
    pub fn ensure_input(&mut self, name: &str) -> &mut Input {
        if let Some(pos) = self.inputs.iter().position(|input| input.name == name) {
            return &mut self.inputs[pos];
        }
        self.inputs.push(Input::empty(name));
        let last = self.inputs.len() - 1;
        &mut self.inputs[last]
    }

    pub fn first_field(&self) -> Option<(&String, &Field)> {
        self.fields.iter().next()
    }

    /// Every block id this block refers to as owner: inputs, shadows, branches, next.
    pub fn child_ids(&self) -> Vec<BlockId> {
        let mut out = Vec::new();
        for input in &self.inputs {
            if let Some(id) = &input.block {
                out.push(id.clone());
            }
            if let Some(id) = &input.shadow {
                if input.block.as_ref() != Some(id) {
                    out.push(id.clone());
                }
            }
        }
        out.extend(self.branches.iter().flatten().cloned());
        if let Some(next) = &self.next {
            out.push(next.clone());
        }
        out
    }
}

pub fn branch_slot(name: &str) -> Option<usize> {
    BRANCH_NAMES.iter().position(|branch| *branch == name)
}

#[derive(Debug, Clone, Default)]
pub struct BlockArena {
    blocks: HashMap<BlockId, Block>,
    scripts: Vec<BlockId>,
    id_counter: usize,
}

impl BlockArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Block> {
        self.blocks.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Block> {
        self.blocks.get_mut(id)
    }

    pub fn require(&self, id: &str) -> Result<&Block> {
        self.blocks
            .get(id)
            .ok_or_else(|| anyhow!("Missing block '{}'.", id))
    }

    pub fn require_mut(&mut self, id: &str) -> Result<&mut Block> {
        self.blocks
            .get_mut(id)
            .ok_or_else(|| anyhow!("Missing block '{}'.", id))
    }

    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.blocks.values()
    }

    /// Top-level block ids in declared order.
    pub fn scripts(&self) -> &[BlockId] {
        &self.scripts
    }

    pub fn insert(&mut self, block: Block) {
        if block.top_level && !self.scripts.contains(&block.id) {
            self.scripts.push(block.id.clone());
        }
        self.blocks.insert(block.id.clone(), block);
    }

    pub fn remove(&mut self, id: &str) -> Option<Block> {
        self.scripts.retain(|script| script != id);
        self.blocks.remove(id)
    }

    pub fn set_top_level(&mut self, id: &str, top_level: bool) -> Result<()> {
        let block = self.require_mut(id)?;
        block.top_level = top_level;
        if top_level {
            block.parent = None;
            if !self.scripts.iter().any(|script| script == id) {
                self.scripts.push(id.to_string());
            }
        } else {
            block.x = None;
            block.y = None;
            self.scripts.retain(|script| script != id);
        }
        Ok(())
    }

    pub fn sort_scripts_by<K: Ord>(&mut self, key: impl Fn(&Block) -> K) {
        let blocks = &self.blocks;
        self.scripts.sort_by_key(|id| blocks.get(id).map(&key));
    }

    pub fn new_id(&mut self, prefix: &str) -> BlockId {
        loop {
            self.id_counter += 1;
            let candidate = format!("{}_{}", prefix, self.id_counter);
            if !self.blocks.contains_key(&candidate) {
                return candidate;
            }
        }
    }

    /// Ids of `root` and every block it owns, in depth-first order.
    pub fn subtree_ids(&self, root: &str) -> Result<Vec<BlockId>> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        let mut stack = vec![root.to_string()];
        while let Some(id) = stack.pop() {
            if !seen.insert(id.clone()) {
                return Err(anyhow!("Cyclic block reference at '{}'.", id));
            }
            let block = self.require(&id)?;
            let mut children = block.child_ids();
            children.reverse();
            stack.extend(children);
            out.push(id);
        }
        Ok(out)
    }

    /// Removes `root` and everything it owns. The caller unlinks it first.
    pub fn dispose(&mut self, root: &str) -> Result<Vec<BlockId>> {
        let ids = self.subtree_ids(root)?;
        for id in &ids {
            self.remove(id);
        }
        Ok(ids)
    }

    /// Follows `next` from `id` to the last block of its sequence.
    pub fn tail_of(&self, id: &str) -> Result<BlockId> {
        let mut seen = HashSet::new();
        let mut current = id.to_string();
        loop {
            if !seen.insert(current.clone()) {
                return Err(anyhow!("Cyclic block chain at '{}'.", current));
            }
            match &self.require(&current)?.next {
                Some(next) => current = next.clone(),
                None => return Ok(current),
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub id: String,
    pub name: String,
    pub value: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Sprite,
    Stage,
}

impl Scope {
    pub fn as_str(self) -> &'static str {
        match self {
            Scope::Sprite => "sprite",
            Scope::Stage => "all",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Target {
    pub name: String,
    pub is_stage: bool,
    pub blocks: BlockArena,
    pub variables: Vec<Variable>,
    pub lists: Vec<Variable>,
    pub broadcasts: Vec<Variable>,
    pub costumes: Vec<String>,
    pub sounds: Vec<String>,
    /// Remaining target JSON, carried through on save.
    pub raw: Value,
}

impl Target {
    pub fn new(name: impl Into<String>, is_stage: bool) -> Self {
        Self {
            name: name.into(),
            is_stage,
            blocks: BlockArena::new(),
            variables: Vec::new(),
            lists: Vec::new(),
            broadcasts: Vec::new(),
            costumes: Vec::new(),
            sounds: Vec::new(),
            raw: Value::Object(Default::default()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Project {
    pub targets: Vec<Target>,
    pub editing: Option<usize>,
    pub raw: Value,
    entity_counter: usize,
}

impl Project {
    pub fn new(targets: Vec<Target>, raw: Value) -> Self {
        let editing = targets
            .iter()
            .position(|t| !t.is_stage)
            .or_else(|| targets.iter().position(|t| t.is_stage));
        Self {
            targets,
            editing,
            raw,
            entity_counter: 0,
        }
    }

    pub fn stage_index(&self) -> Option<usize> {
        self.targets.iter().position(|t| t.is_stage)
    }

    pub fn stage(&self) -> Option<&Target> {
        self.targets.iter().find(|t| t.is_stage)
    }

    pub fn editing_target(&self) -> Option<&Target> {
        self.targets.get(self.editing?)
    }

    pub fn find_target(&self, name: &str) -> Option<usize> {
        self.targets.iter().position(|t| t.name == name)
    }

    pub fn sprite_names(&self) -> Vec<String> {
        self.targets
            .iter()
            .filter(|t| !t.is_stage)
            .map(|t| t.name.clone())
            .collect()
    }

    /// Variables visible from `target`: its own first, then stage globals.
    pub fn variables_in_scope(&self, target: usize) -> Vec<(&Variable, Scope)> {
        self.scoped(target, |t| &t.variables)
    }

    pub fn lists_in_scope(&self, target: usize) -> Vec<(&Variable, Scope)> {
        self.scoped(target, |t| &t.lists)
    }

    fn scoped<'a>(
        &'a self,
        target: usize,
        pick: impl Fn(&'a Target) -> &'a Vec<Variable>,
    ) -> Vec<(&'a Variable, Scope)> {
        let mut out = Vec::new();
        if let Some(t) = self.targets.get(target) {
            let scope = if t.is_stage { Scope::Stage } else { Scope::Sprite };
            out.extend(pick(t).iter().map(|v| (v, scope)));
            if t.is_stage {
                return out;
            }
        }
        if let Some(stage) = self.stage() {
            out.extend(pick(stage).iter().map(|v| (v, Scope::Stage)));
        }
        out
    }

    pub fn broadcast_by_name(&self, name: &str) -> Option<&Variable> {
        self.stage()?.broadcasts.iter().find(|b| b.name == name)
    }

    /// Looks up a broadcast message by name, creating it on the stage on first use.
    pub fn ensure_broadcast(&mut self, name: &str) -> Result<String> {
        if let Some(existing) = self.broadcast_by_name(name) {
            return Ok(existing.id.clone());
        }
        let id = self.new_entity_id("broadcast");
        let stage_index = self
            .stage_index()
            .ok_or_else(|| anyhow!("Project has no stage to hold broadcast '{}'.", name))?;
        self.targets[stage_index].broadcasts.push(Variable {
            id: id.clone(),
            name: name.to_string(),
            value: Value::String(name.to_string()),
        });
        Ok(id)
    }

    pub fn new_entity_id(&mut self, prefix: &str) -> String {
        let used = self
            .targets
            .iter()
            .flat_map(|t| t.variables.iter().chain(&t.lists).chain(&t.broadcasts))
            .map(|v| v.id.clone())
            .collect::<HashSet<_>>();
        loop {
            self.entity_counter += 1;
            let candidate = format!("{}_{}", prefix, self.entity_counter);
            if !used.contains(&candidate) {
                return candidate;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(arena: &mut BlockArena, ids: &[&str]) {
        for (i, id) in ids.iter().enumerate() {
            let mut block = Block::new(*id, "motion_movesteps");
            block.top_level = i == 0;
            block.next = ids.get(i + 1).map(|s| s.to_string());
            block.parent = if i == 0 { None } else { Some(ids[i - 1].to_string()) };
            arena.insert(block);
        }
    }

    #[test]
    fn tail_follows_next_chain() {
        let mut arena = BlockArena::new();
        chain(&mut arena, &["a", "b", "c"]);
        assert_eq!(arena.tail_of("a").unwrap(), "c");
        assert_eq!(arena.scripts(), &["a".to_string()]);
    }

    #[test]
    fn cycles_are_reported_not_followed() {
        let mut arena = BlockArena::new();
        chain(&mut arena, &["a", "b"]);
        arena.get_mut("b").unwrap().next = Some("a".to_string());
        assert!(arena.tail_of("a").is_err());
        assert!(arena.subtree_ids("a").is_err());
    }

    #[test]
    fn dispose_removes_whole_subtree() {
        let mut arena = BlockArena::new();
        chain(&mut arena, &["a", "b"]);
        let mut shadow = Block::new("s", "math_number");
        shadow.parent = Some("b".to_string());
        arena.insert(shadow);
        let input = arena.get_mut("b").unwrap().ensure_input("STEPS");
        input.block = Some("s".to_string());
        input.shadow = Some("s".to_string());

        let removed = arena.dispose("a").unwrap();
        assert_eq!(removed, vec!["a", "b", "s"]);
        assert!(arena.is_empty());
        assert!(arena.scripts().is_empty());
    }

    #[test]
    fn generated_ids_skip_existing_ones() {
        let mut arena = BlockArena::new();
        arena.insert(Block::new("block_1", "looks_show"));
        assert_eq!(arena.new_id("block"), "block_2");
    }

    #[test]
    fn broadcasts_are_created_once() {
        let mut project = Project::new(vec![Target::new("Stage", true)], Value::Null);
        let first = project.ensure_broadcast("go").unwrap();
        let second = project.ensure_broadcast("go").unwrap();
        assert_eq!(first, second);
        assert_eq!(project.stage().unwrap().broadcasts.len(), 1);
    }
}
