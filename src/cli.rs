use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "sbgraph-rs",
    about = "Inspect and edit Scratch block graphs: indexed pseudocode out, field/block edits in."
)]
pub struct Args {
    #[arg(value_name = "INPUT", help = "Project to load (.sb3 archive or project.json).")]
    pub input: PathBuf,

    #[arg(
        long,
        value_name = "FILE",
        help = "JSON array of {\"api\", \"args\"} requests applied in order before printing."
    )]
    pub commands: Option<PathBuf>,

    #[arg(long, value_name = "NAME", help = "Sprite (or stage) to edit and print.")]
    pub target: Option<String>,

    #[arg(long, help = "Append block ids to pseudocode lines.")]
    pub with_ids: bool,

    #[arg(long, help = "Do not attach {choices: ...} to field lines.")]
    pub no_choices: bool,

    #[arg(long, help = "Print the full serialization payload as JSON instead of pseudocode.")]
    pub json: bool,

    #[arg(long, value_name = "PATH", help = "Write the edited project to this .sb3 or .json path.")]
    pub save: Option<PathBuf>,

    #[arg(short, long, help = "Log debug details to stderr.")]
    pub verbose: bool,
}
