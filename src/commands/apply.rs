//! `plinth apply` - diff, confirm, execute.

use crate::catalog::Catalog;
use crate::cli::ApplyArgs;
use crate::commands::load_env;
use crate::progress::BarObserver;
use crate::{provider, ui, Context};
use anyhow::{bail, Result};
use converge::{
    diff, execute, plan, CancelToken, ChangePlan, ExecuteOptions, RetryConfig, RunReport,
};
use std::path::Path;

pub fn run(ctx: &Context, stack_path: Option<&Path>, args: &ApplyArgs) -> Result<()> {
    let env = load_env(stack_path)?;

    let prior = env.store.load_records()?;
    let changes = diff(&env.graph, &prior, &Catalog);

    ui::header(&format!("Stack: {}", env.config.stack.name));
    ui::display_plan(&changes);

    if !changes.has_changes() {
        return Ok(());
    }

    if !args.yes && !ui::confirm_proceed()? {
        println!();
        println!("  Aborted, nothing applied.");
        return Ok(());
    }

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

/// Lower a change plan, run it against the stack's provider, and merge
/// the outcomes into a report. Shared with `destroy`.
pub fn execute_changes(
    ctx: &Context,
    env: &crate::commands::StackEnv,
    changes: &ChangePlan,
    jobs: usize,
    retries: u32,
) -> Result<RunReport> {
    let execution = plan(changes, &env.graph)?;
    let provider = provider::resolve(
        &env.config.stack.provider,
        &env.state_root,
        &env.config.stack.name,
    )?;

    log::info!(
        "Executing {} actions in {} groups via provider '{}'",
        execution.total_actions(),
        execution.groups.len(),
        provider.name()
    );

    let opts = ExecuteOptions {
        jobs: jobs.max(1),
        retry: RetryConfig {
            max_attempts: retries.max(1),
            ..RetryConfig::default()
        },
    };

    let observer = BarObserver::new(execution.total_actions(), ctx.quiet);
    let cancel = CancelToken::new();
    let results = execute(
        &execution,
        provider.as_ref(),
        &env.store,
        &opts,
        &cancel,
        &observer,
    )?;
    observer.finish();

    let unchanged = changes
        .unchanged()
        .map(|action| (action.logical_id.clone(), action.resource_type.clone()))
        .collect();
    Ok(RunReport::new(results, unchanged))
}
