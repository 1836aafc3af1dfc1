#![allow(dead_code)]

use colored::Colorize;
use converge::{ActionOutcome, ChangeAction, ChangeKind, ChangePlan, RunReport};

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.len()).dimmed());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

/// Ask the user to confirm before proceeding
pub fn confirm_proceed() -> anyhow::Result<bool> {
    use dialoguer::Confirm;

    let confirmed = Confirm::new()
        .with_prompt("Continue?")
        .default(true)
        .interact()?;

    Ok(confirmed)
}

// ============================================================================
// Plan Rendering
// ============================================================================

/// Display a change plan in a user-friendly format
pub fn display_plan(plan: &ChangePlan) {
    if !plan.has_changes() {
        println!();
        println!("  {} No changes. Stack is converged.", "✓".green());
        return;
    }

    println!();
    println!(
        "┌─ {} ─────────────────────────────────────────┐",
        "Change Plan".bold()
    );
    println!("│");

    for action in plan.changes() {
        let symbol = match action.kind {
            ChangeKind::Create => "+".green(),
            ChangeKind::Update => "~".yellow(),
            ChangeKind::Replace => "±".red(),
            ChangeKind::Delete => "-".red(),
            ChangeKind::NoOp => "·".dimmed(),
        };

        let replace_marker = if action.kind == ChangeKind::Replace {
            " [replace]".red().to_string()
        } else {
            String::new()
        };

        println!(
            "│   {} {:<16} {:<12} {}{}",
            symbol,
            action.logical_id,
            action.resource_type.dimmed(),
            change_detail(action).dimmed(),
            replace_marker
        );
    }

    let summary = plan.summary();
    println!("│");
    println!("├─────────────────────────────────────────────────────┤");
    println!(
        "│ Plan: {} to create, {} to update, {} to replace, {} to delete",
        summary.creates.to_string().green(),
        summary.updates.to_string().yellow(),
        summary.replaces.to_string().red(),
        summary.deletes.to_string().red()
    );
    println!("└─────────────────────────────────────────────────────┘");
}

/// One-line description of what changes for one action
fn change_detail(action: &ChangeAction) -> String {
    match action.kind {
        ChangeKind::Create => "(new)".to_string(),
        ChangeKind::Delete => "(will delete)".to_string(),
        ChangeKind::Update | ChangeKind::Replace => {
            let prior = action
                .prior
                .as_ref()
                .map(|record| &record.properties);
            let desired = action.desired.as_ref();

            let mut parts = Vec::new();
            for key in &action.changed {
                let old = prior.and_then(|map| map.get(key));
                let new = desired.and_then(|map| map.get(key));
                let part = match (old, new) {
                    (Some(old), Some(new)) => format!("{key}: {old} → {new}"),
                    (None, Some(new)) => format!("{key}: + {new}"),
                    (Some(old), None) => format!("{key}: {old} (removed)"),
                    (None, None) => key.clone(),
                };
                parts.push(part);
            }
            parts.join(", ")
        }
        ChangeKind::NoOp => String::new(),
    }
}

// ============================================================================
// Run Report Rendering
// ============================================================================

/// Display the final per-resource report and summary
pub fn print_report(report: &RunReport) {
    println!();
    for entry in &report.entries {
        let symbol = match &entry.outcome {
            ActionOutcome::Created { .. }
            | ActionOutcome::Updated
            | ActionOutcome::Replaced { .. }
            | ActionOutcome::Deleted => "✓".green(),
            ActionOutcome::Unchanged => "○".dimmed(),
            ActionOutcome::Failed { .. } => "✗".red(),
            ActionOutcome::Skipped { .. } => "⊘".yellow(),
        };
        println!(
            "  {} {:<16} {}",
            symbol,
            entry.logical_id,
            entry.outcome.to_string().dimmed()
        );
    }

    let summary = report.summary();
    println!();
    if report.is_success() {
        println!("  {} Stack converged successfully!", "✓".green().bold());
    } else {
        println!("  {} Run finished with errors", "⚠".yellow().bold());
    }

    if summary.created > 0 {
        println!("    • {} resources created", summary.created);
    }
    if summary.updated > 0 {
        println!("    • {} resources updated", summary.updated);
    }
    if summary.replaced > 0 {
        println!("    • {} resources replaced", summary.replaced);
    }
    if summary.deleted > 0 {
        println!("    • {} resources deleted", summary.deleted);
    }
    if summary.unchanged > 0 {
        println!("    • {} resources unchanged", summary.unchanged);
    }
    if summary.skipped > 0 {
        println!("    • {} resources skipped", summary.skipped);
    }
    if summary.failed > 0 {
        println!("    • {} {} failed", summary.failed, "resources".red());
    }
}
