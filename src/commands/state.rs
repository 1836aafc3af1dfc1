//! `plinth state` - operator surface over recorded state.

use crate::cli::StateCommand;
use crate::commands::load_env;
use crate::{ui, Context};
use anyhow::{bail, Context as AnyhowContext, Result};
use chrono::SecondsFormat;
use colored::Colorize;
use converge::RecordStatus;
use std::path::Path;

pub fn run(_ctx: &Context, stack_path: Option<&Path>, cmd: StateCommand) -> Result<()> {
    let env = load_env(stack_path)?;

    match cmd {
        StateCommand::List => {
            let records = env.store.load_records()?;
            if records.is_empty() {
                ui::info(&format!(
                    "No recorded state for stack '{}'",
                    env.config.stack.name
                ));
                return Ok(());
            }

            ui::header(&format!("State: {}", env.config.stack.name));
            for record in &records {
                let status = match record.status {
                    RecordStatus::Applied => "applied".green(),
                    RecordStatus::Pending => "pending".yellow(),
                    RecordStatus::Failed => "failed".red(),
                };
                println!(
                    "  {:<16} {:<12} {:<8} {:<24} {}",
                    record.logical_id,
                    record.resource_type.dimmed(),
                    status,
                    record.physical_id.as_deref().unwrap_or("-").dimmed(),
                    record
                        .updated_at
                        .to_rfc3339_opts(SecondsFormat::Secs, true)
                        .dimmed()
                );
            }
            Ok(())
        }

        StateCommand::Show { id } => {
            let Some(record) = env.store.get_record(&id)? else {
                bail!(
                    "No record for '{id}' in stack '{}'",
                    env.config.stack.name
                );
            };
            let rendered = toml::to_string_pretty(&record)
                .context("Failed to render state record")?;
            ui::header(&format!("Record: {id}"));
            print!("{rendered}");
            if let Some(error) = &record.last_error {
                println!();
                ui::warn(&format!("Last error: {error}"));
            }
            Ok(())
        }

        StateCommand::Forget { id, yes } => {
            if env.store.get_record(&id)?.is_none() {
                bail!(
                    "No record for '{id}' in stack '{}'",
                    env.config.stack.name
                );
            }

            ui::warn(&format!(
                "Forgetting '{id}' drops the record without deleting the physical resource."
            ));
            if !yes && !ui::confirm_proceed()? {
                println!();
                println!("  Aborted, record kept.");
                return Ok(());
            }

            env.store.remove_record(&id)?;
            ui::success(&format!("Forgot '{id}'"));
            Ok(())
        }
    }
}
