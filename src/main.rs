//! gridsync - headless runner for the grid component
//!
//! This is the binary entry point. All logic lives in the library.

use std::path::PathBuf;

use clap::Parser;

/// gridsync - drive a grid component from a props file and stdin commands
#[derive(Parser, Debug)]
#[command(name = "gridsync")]
#[command(about = "Headless runner for the gridsync grid component", long_about = None)]
struct Args {
    /// JSON file with the host properties
    #[arg(long, value_name = "FILE")]
    props: PathBuf,

    /// Directory holding `.gridsync/config.toml` (defaults to the current directory)
    #[arg(long, value_name = "DIR")]
    project: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let args = Args::parse();

    // Logs go to a file; stdout carries the NDJSON events
    gridsync_core::logging::init()?;

    let project_path = args
        .project
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    let result = gridsync::run_headless(&args.props, &project_path).await;
    if let Err(ref e) = result {
        tracing::error!("Application error: {:?}", e);
    }
    Ok(result?)
}
