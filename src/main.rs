mod catalog;
mod cli;
mod commands;
mod config;
mod progress;
mod provider;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use std::io;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
    };

    let stack = cli.stack.as_deref();

    match cli.command {
        Command::Plan => commands::plan::run(&ctx, stack),
        Command::Apply(args) => commands::apply::run(&ctx, stack, &args),
        Command::Destroy(args) => commands::destroy::run(&ctx, stack, &args),
        Command::Validate => commands::validate::run(&ctx, stack),
        Command::State(cmd) => commands::state::run(&ctx, stack, cmd),
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "plinth", &mut io::stdout());
            Ok(())
        }
    }
}
