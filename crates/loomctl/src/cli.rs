//! Command-line surface (§4.15): a narrow operational CLI around a single
//! runtime process, not a general `apply`/`get`/`delete` resource CLI.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "loomctl", version, about = "Operate a Loom agent runtime")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Runs the ingestion boundary, agent loop, and reporter HTTP surface.
    Serve {
        /// Path to a `ServeConfig` YAML file.
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Inspects registered workflows.
    Workflow {
        #[command(subcommand)]
        command: WorkflowCommand,
    },
    /// Prints an on-disk status snapshot (buffer occupancy, declared
    /// sources) without contacting a running process.
    Status {
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Prints queue depth by priority from the on-disk buffer.
    Queue {
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Emits shell completion scripts.
    Completion {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Debug, Subcommand)]
pub enum WorkflowCommand {
    /// Lists workflow metadata declared in a manifest.
    List {
        #[arg(long)]
        manifest: Option<PathBuf>,
    },
    /// Describes a single declared workflow.
    Describe {
        name: String,
        #[arg(long)]
        manifest: Option<PathBuf>,
    },
}
