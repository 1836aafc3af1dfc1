//! `plinth validate` - check the stack file and graph, touch nothing.

use crate::commands::load_env;
use crate::{ui, Context};
use anyhow::Result;
use std::collections::BTreeMap;
use std::path::Path;

pub fn run(_ctx: &Context, stack_path: Option<&Path>) -> Result<()> {
    // load_env performs the full validation chain: parse, unique ids,
    // resolvable references, acyclicity, catalog required properties.
    let env = load_env(stack_path)?;

    let mut by_type: BTreeMap<&str, usize> = BTreeMap::new();
    for resource in env.graph.iter() {
        *by_type.entry(resource.resource_type.as_str()).or_default() += 1;
    }

    ui::success(&format!(
        "Stack '{}' is valid: {} resources",
        env.config.stack.name,
        env.graph.len()
    ));
    for (resource_type, count) in by_type {
        ui::kv(resource_type, &count.to_string());
    }

    Ok(())
}
