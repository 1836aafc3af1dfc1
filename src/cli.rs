use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "plinth")]
#[command(version)]
#[command(about = "Declarative cloud infrastructure provisioning", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the stack file (defaults to ./stack.toml, then ./stack.json)
    #[arg(short, long, global = true)]
    pub stack: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show what an apply would change, without executing anything
    Plan,

    /// Diff the stack against recorded state and execute the changes
    Apply(ApplyArgs),

    /// Delete every resource recorded for the stack
    Destroy(DestroyArgs),

    /// Validate the stack file and resource graph
    Validate,

    /// Inspect and manage recorded state
    #[command(subcommand)]
    State(StateCommand),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Apply / Destroy
// ============================================================================

#[derive(Parser)]
pub struct ApplyArgs {
    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Number of concurrent provider calls within a group
    #[arg(short, long, default_value = "4")]
    pub jobs: usize,

    /// Maximum attempts per provider call for transient errors
    #[arg(long, default_value = "4")]
    pub retries: u32,
}

#[derive(Parser)]
pub struct DestroyArgs {
    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Number of concurrent provider calls within a group
    #[arg(short, long, default_value = "4")]
    pub jobs: usize,

    /// Maximum attempts per provider call for transient errors
    #[arg(long, default_value = "4")]
    pub retries: u32,
}

// ============================================================================
// State Commands
// ============================================================================

#[derive(Subcommand)]
pub enum StateCommand {
    /// List all recorded resources
    List,

    /// Show the full record for one resource
    Show {
        /// Logical id of the resource
        id: String,
    },

    /// Drop a record without touching the physical resource
    Forget {
        /// Logical id of the resource
        id: String,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}
