//! Subcommand implementations.

pub mod apply;
pub mod destroy;
pub mod plan;
pub mod state;
pub mod validate;

use crate::catalog;
use crate::config::StackConfig;
use anyhow::{Context as AnyhowContext, Result};
use converge::ResourceGraph;
use statefile::FileStore;
use std::path::{Path, PathBuf};

/// Everything a command needs: the parsed stack, its materialized
/// graph, and the opened state store.
pub struct StackEnv {
    pub config: StackConfig,
    pub graph: ResourceGraph,
    pub store: FileStore,
    pub state_root: PathBuf,
}

/// Load the stack file, build and validate the graph, and open the
/// unit's state store.
pub fn load_env(stack_path: Option<&Path>) -> Result<StackEnv> {
    let path = StackConfig::discover(stack_path)?;
    let config = StackConfig::load(&path)?;

    let graph = config.to_graph()?;
    catalog::validate_graph(&graph)?;

    let state_root = config.state_root()?;
    let store = FileStore::open(&state_root, &config.stack.name).with_context(|| {
        format!(
            "Failed to open state store for stack '{}'",
            config.stack.name
        )
    })?;

    Ok(StackEnv {
        config,
        graph,
        store,
        state_root,
    })
}
