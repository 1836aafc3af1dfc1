//! `plinth plan` - diff only, no execution.

use crate::catalog::Catalog;
use crate::commands::load_env;
use crate::{ui, Context};
use anyhow::Result;
use converge::diff;
use std::path::Path;

pub fn run(_ctx: &Context, stack_path: Option<&Path>) -> Result<()> {
    let env = load_env(stack_path)?;

    let prior = env.store.load_records()?;
    let changes = diff(&env.graph, &prior, &Catalog);

    ui::header(&format!("Stack: {}", env.config.stack.name));
    ui::display_plan(&changes);

    Ok(())
}
