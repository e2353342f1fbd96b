use anyhow::Result;
use clap::Parser;
use sbgraph_core::cli::Args;
use tracing::Level;

fn main() -> Result<()> {
    let args = Args::parse();
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
    sbgraph_core::run_cli(&args)
}
