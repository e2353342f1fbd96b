pub mod api;
pub mod catalog;
pub mod choices;
pub mod edit;
pub mod editor;
pub mod error;
pub mod model;
pub mod mutate;
pub mod sb3;
pub mod serialize;

#[cfg(not(target_arch = "wasm32"))]
pub mod cli;

#[cfg(all(target_arch = "wasm32", feature = "wasm-bindings"))]
pub mod wasm;

use anyhow::{Context, Result};
use api::{Request, Session};
use serde_json::{json, Value};
use serialize::SerializeOptions;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[cfg(not(target_arch = "wasm32"))]
pub fn run_cli(args: &cli::Args) -> Result<()> {
    let total_stages = 3 + usize::from(args.commands.is_some()) + usize::from(args.save.is_some());
    let progress = CliProgress::new("Inspect", total_stages);
    let mut stage = 0usize;

    stage += 1;
    progress.emit(stage, "Resolving input path");
    let input = canonicalize_file(&args.input)?;

    stage += 1;
    progress.emit(stage, "Loading project");
    let (project, assets) = sb3::load_project(&input)?;
    let options = SerializeOptions {
        with_ids: args.with_ids,
        with_choices: !args.no_choices,
    };
    let mut session = Session::new(project).with_options(options);
    if let Some(name) = &args.target {
        select_target(&mut session, name)?;
    }

    if let Some(commands) = &args.commands {
        stage += 1;
        progress.emit(stage, "Applying commands");
        let requests = read_requests(commands)?;
        let mut failed = 0usize;
        for request in &requests {
            let response = session.execute(request);
            if response.get("ok") != Some(&Value::Bool(true)) {
                failed += 1;
            }
            println!("{}", serde_json::to_string(&response)?);
        }
        if failed > 0 {
            warn!(failed, total = requests.len(), "some commands failed");
        }
    }

    stage += 1;
    progress.emit(stage, "Serializing blocks");
    if args.json {
        let response = session.execute(&Request::new("get_blocks_pseudocode", Value::Null));
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        let out = session.serialize()?;
        println!("{}", out.pseudocode);
    }

    if let Some(save) = &args.save {
        stage += 1;
        progress.emit(stage, "Writing project");
        sb3::save_project(session.project(), &assets, save)?;
        info!(path = %save.display(), "project saved");
    }

    Ok(())
}

#[cfg(not(target_arch = "wasm32"))]
fn select_target(session: &mut Session, name: &str) -> Result<()> {
    let is_stage = session
        .project()
        .targets
        .iter()
        .any(|t| t.is_stage && t.name == name);
    let request = if is_stage {
        Request::new("select_stage", Value::Null)
    } else {
        Request::new("select_sprite", json!({ "name": name }))
    };
    let response = session.execute(&request);
    if response.get("ok") != Some(&Value::Bool(true)) {
        anyhow::bail!("Target '{}' not found in project.", name);
    }
    Ok(())
}

#[cfg(not(target_arch = "wasm32"))]
fn read_requests(path: &Path) -> Result<Vec<Request>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to open '{}'.", path.display()))?;
    parse_requests(&text).with_context(|| format!("Invalid commands file '{}'.", path.display()))
}

fn parse_requests(text: &str) -> Result<Vec<Request>> {
    let value: Value = serde_json::from_str(text)?;
    let requests = match value {
        Value::Array(_) => serde_json::from_value(value)?,
        Value::Object(_) => vec![serde_json::from_value(value)?],
        _ => anyhow::bail!("Expected a request object or an array of requests."),
    };
    Ok(requests)
}

/// Applies `requests_json` to a project given as `project.json` text.
/// Returns `{"responses": [...], "project": {...}}` as JSON text.
pub fn execute_requests_json(project_json: &str, requests_json: &str) -> Result<String> {
    let value: Value = serde_json::from_str(project_json).context("Invalid project.json.")?;
    let project = sb3::project_from_json(&value)?;
    let requests = parse_requests(requests_json)?;
    let mut session = Session::new(project);
    let responses = requests
        .iter()
        .map(|request| session.execute(request))
        .collect::<Vec<_>>();
    let out = json!({
        "responses": responses,
        "project": sb3::project_to_json(session.project()),
    });
    Ok(serde_json::to_string(&out)?)
}

pub fn canonicalize_file(path: &Path) -> Result<PathBuf> {
    if !path.exists() || !path.is_file() {
        return Err(anyhow::anyhow!("Input file not found: '{}'.", path.display()));
    }
    Ok(path.canonicalize()?)
}

#[cfg(not(target_arch = "wasm32"))]
struct CliProgress {
    prefix: &'static str,
    total: usize,
}

#[cfg(not(target_arch = "wasm32"))]
impl CliProgress {
    fn new(prefix: &'static str, total: usize) -> Self {
        Self {
            prefix,
            total: total.max(1),
        }
    }

    fn emit(&self, step: usize, label: &str) {
        let step = step.clamp(1, self.total);
        let bar = render_progress_bar(step, self.total, 14);
        eprintln!(
            "[{}] {}... ({}/{}) {}",
            self.prefix, label, step, self.total, bar
        );
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn render_progress_bar(step: usize, total: usize, width: usize) -> String {
    let width = width.max(1);
    let filled = ((step * width) + (total / 2)) / total;
    let mut s = String::with_capacity(width + 2);
    s.push('[');
    for i in 0..width {
        s.push(if i < filled { '=' } else { '-' });
    }
    s.push(']');
    s
}
