use crate::catalog;
use crate::editor::{Editor, MenuOption};
use crate::model::{BlockArena, Project};
use anyhow::{anyhow, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use tracing::debug;

/// Legal values of one field at serialization time, grouped by where they come from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ChoiceSet(pub BTreeMap<String, Vec<String>>);

impl Display for ChoiceSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let groups = self
            .0
            .iter()
            .map(|(name, labels)| format!("{}=[{}]", name, labels.join(", ")))
            .collect::<Vec<_>>();
        write!(f, "{{choices: {}}}", groups.join("; "))
    }
}

/// Project state a field's options are computed from.
pub struct ChoiceContext<'a> {
    pub project: &'a Project,
    pub target: usize,
    pub editor: &'a dyn Editor,
}

impl<'a> ChoiceContext<'a> {
    fn blocks(&self) -> Result<&'a BlockArena> {
        self.project
            .targets
            .get(self.target)
            .map(|t| &t.blocks)
            .ok_or_else(|| anyhow!("Target {} does not exist.", self.target))
    }
}

type Groups = Vec<(&'static str, Vec<MenuOption>)>;

/// Choices for `field` of the block `block_id`, or `None` when nothing is known.
/// Never fails: lookup errors are logged and treated as "no choices".
pub fn resolve(
    ctx: &ChoiceContext<'_>,
    opcode: &str,
    field: &str,
    current: &str,
    block_id: &str,
) -> Option<ChoiceSet> {
    if let Some(options) = live_options(ctx, field, current, block_id) {
        let labels = options.into_iter().map(|o| o.label).collect();
        return Some(ChoiceSet(BTreeMap::from([("options".to_string(), labels)])));
    }
    let groups = match computed_options(ctx, opcode, field, block_id) {
        Ok(groups) => groups,
        Err(err) => {
            debug!(block = block_id, field, error = %err, "choice lookup failed");
            return None;
        }
    };
    let mut set = BTreeMap::new();
    for (name, options) in groups {
        if options.is_empty() {
            continue;
        }
        set.entry(name.to_string())
            .or_insert_with(Vec::new)
            .extend(options.into_iter().map(|o| o.label));
    }
    if set.is_empty() {
        None
    } else {
        Some(ChoiceSet(set))
    }
}

/// Flat (label, code) options of `field`, preferring the live widget.
pub fn field_options(
    ctx: &ChoiceContext<'_>,
    opcode: &str,
    field: &str,
    current: &str,
    block_id: &str,
) -> Option<Vec<MenuOption>> {
    if let Some(options) = live_options(ctx, field, current, block_id) {
        return Some(options);
    }
    match computed_options(ctx, opcode, field, block_id) {
        Ok(groups) => {
            let flat = groups
                .into_iter()
                .flat_map(|(_, options)| options)
                .collect::<Vec<_>>();
            (!flat.is_empty()).then_some(flat)
        }
        Err(err) => {
            debug!(block = block_id, field, error = %err, "option lookup failed");
            None
        }
    }
}

fn live_options(
    ctx: &ChoiceContext<'_>,
    field: &str,
    current: &str,
    block_id: &str,
) -> Option<Vec<MenuOption>> {
    match ctx.editor.field_options(block_id, field, current) {
        Ok(Some(options)) if !options.is_empty() => Some(options),
        Ok(_) => None,
        Err(err) => {
            debug!(block = block_id, field, error = %err, "live option query failed");
            None
        }
    }
}

fn computed_options(
    ctx: &ChoiceContext<'_>,
    opcode: &str,
    field: &str,
    block_id: &str,
) -> Result<Groups> {
    let project = ctx.project;
    let target = project
        .targets
        .get(ctx.target)
        .ok_or_else(|| anyhow!("Target {} does not exist.", ctx.target))?;

    if let Some(fixed) = catalog::fixed_menu(opcode, field) {
        let options = fixed
            .into_iter()
            .map(|(label, code)| MenuOption::new(label, code))
            .collect();
        return Ok(vec![("options", options)]);
    }

    let groups: Groups = match field {
        "VARIABLE" => vec![(
            "variables",
            project
                .variables_in_scope(ctx.target)
                .into_iter()
                .map(|(v, _)| MenuOption::new(&v.name, &v.id))
                .collect(),
        )],
        "LIST" => vec![(
            "lists",
            project
                .lists_in_scope(ctx.target)
                .into_iter()
                .map(|(v, _)| MenuOption::new(&v.name, &v.id))
                .collect(),
        )],
        "BROADCAST_OPTION" => vec![(
            "messages",
            project
                .stage()
                .map(|stage| {
                    stage
                        .broadcasts
                        .iter()
                        .map(|b| MenuOption::new(&b.name, &b.id))
                        .collect()
                })
                .unwrap_or_default(),
        )],
        "COSTUME" => vec![("costumes", same_label_code(&target.costumes))],
        "BACKDROP" => vec![(
            "backdrops",
            project
                .stage()
                .map(|stage| same_label_code(&stage.costumes))
                .unwrap_or_default(),
        )],
        "SOUND_MENU" => vec![("sounds", same_label_code(&target.sounds))],
        "PROPERTY" if opcode == "sensing_of" => vec![("properties", property_options(ctx, block_id)?)],
        f if catalog::is_sprite_menu_field(f) => {
            let special = catalog::special_targets(f)
                .iter()
                .map(|(label, code)| MenuOption::new(*label, *code))
                .collect();
            let sprites = project
                .targets
                .iter()
                .filter(|t| !t.is_stage)
                .filter(|t| f == "OBJECT" || t.name != target.name)
                .map(|t| MenuOption::new(&t.name, &t.name))
                .collect();
            vec![("special", special), ("sprites", sprites)]
        }
        _ => Vec::new(),
    };
    Ok(groups)
}

fn same_label_code(names: &[String]) -> Vec<MenuOption> {
    names.iter().map(|n| MenuOption::new(n, n)).collect()
}

/// `sensing_of` properties depend on the object chosen in its OBJECT menu.
fn property_options(ctx: &ChoiceContext<'_>, block_id: &str) -> Result<Vec<MenuOption>> {
    let blocks = ctx.blocks()?;
    let block = blocks.require(block_id)?;
    let object = block
        .input("OBJECT")
        .and_then(|input| input.block.as_deref())
        .and_then(|menu_id| blocks.get(menu_id))
        .and_then(|menu| menu.fields.get("OBJECT"))
        .map(|f| f.value.clone())
        .unwrap_or_else(|| "_stage_".to_string());

    let (builtin, owner) = if object == "_stage_" {
        (catalog::STAGE_PROPERTIES, ctx.project.stage())
    } else {
        let owner = ctx
            .project
            .find_target(&object)
            .map(|i| &ctx.project.targets[i]);
        (catalog::SPRITE_PROPERTIES, owner)
    };
    let mut out = builtin
        .iter()
        .map(|p| MenuOption::new(*p, *p))
        .collect::<Vec<_>>();
    if let Some(owner) = owner {
        out.extend(owner.variables.iter().map(|v| MenuOption::new(&v.name, &v.name)));
    }
    Ok(out)
}
