//! `plinth destroy` - delete everything recorded for the stack.

use crate::catalog::Catalog;
use crate::cli::DestroyArgs;
use crate::commands::{apply::execute_changes, load_env};
use crate::{ui, Context};
use anyhow::{bail, Result};
use converge::{diff, ResourceGraph};
use std::path::Path;

pub fn run(ctx: &Context, stack_path: Option<&Path>, args: &DestroyArgs) -> Result<()> {
    let env = load_env(stack_path)?;

    let prior = env.store.load_records()?;
    if prior.is_empty() {
        ui::success(&format!(
            "No recorded state for stack '{}', nothing to destroy",
            env.config.stack.name
        ));
        return Ok(());
    }

    // Diffing against an empty graph turns every record into a delete.
    let empty = ResourceGraph::new();
    let changes = diff(&empty, &prior, &Catalog);

    ui::header(&format!("Stack: {}", env.config.stack.name));
    ui::display_plan(&changes);

    ui::warn(&format!(
        "This will delete all {} recorded resources.",
        prior.len()
    ));
    if !args.yes && !ui::confirm_proceed()? {
        println!();
        println!("  Aborted, nothing destroyed.");
        return Ok(());
    }

    // Deletes are planned against the empty graph: ordering comes from
    // the dependency snapshots in state.
    let env = crate::commands::StackEnv {
        graph: empty,
        ..env
    };
    let report = execute_changes(ctx, &env, &changes, args.jobs, args.retries)?;
    ui::print_report(&report);

    let summary = report.summary();
    if !report.is_success() {
        bail!(
            "{} failed, {} skipped of {} resources",
            summary.failed,
            summary.skipped,
            summary.total()
        );
    }
    Ok(())
}
