//! Command-line front-end for running a workflow definition file through
//! [`wf_engine::Executor`]. Not part of the core contract (SPEC_FULL §6) —
//! an ambient demonstration/debugging harness, in the spirit of the
//! teacher's `n8n-server` binary.

use std::collections::HashMap;
use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use wf_engine::Executor;
use wf_graph::{ExecutionMode, Workflow};

#[derive(Parser, Debug)]
#[command(name = "wf-cli", about = "Run a workflow JSON file and print its RunReport")]
struct Args {
    /// Path to a workflow definition JSON file.
    #[arg(long)]
    workflow: PathBuf,

    /// Restrict execution to this node's ancestor sub-graph.
    #[arg(long)]
    destination: Option<String>,

    /// Explicit start node(s); may be repeated. Overrides auto-discovery.
    #[arg(long = "start")]
    start_nodes: Vec<String>,

    /// Execution mode string. Only "manual" has engine-level meaning.
    #[arg(long, default_value = "manual")]
    mode: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::from_default_env();
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!(workflow = %args.workflow.display(), "loading workflow");
    let raw = std::fs::read_to_string(&args.workflow)?;
    let workflow: Workflow = serde_json::from_str(&raw)?;
    workflow.validate()?;

    let executor = Executor::new();
    let mode = ExecutionMode::from(args.mode.as_str());
    let report = executor
        .run(
            &workflow,
            mode,
            wf_engine::GlobalConfig::new(),
            args.destination.as_deref(),
            args.start_nodes,
            HashMap::new(),
        )
        .await;

    info!(status = report.status.as_str(), "run finished");
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
