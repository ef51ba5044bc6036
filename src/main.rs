mod cli;
mod commands;
mod config;
mod host;
mod phases;
mod privilege;
mod progress;
mod render;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
    pub config: Option<PathBuf>,
    pub skip: Vec<String>,
}

fn main() -> Result<ExitCode> {
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
        config: cli.config,
        skip: cli.skip,
    };

    match cli.command {
        Command::Scan(args) => commands::reset::scan(&ctx, args),
        Command::Reset(args) => commands::reset::reset(&ctx, args),
        Command::Baseline(args) => commands::baseline::run(&ctx, args).map(|()| ExitCode::SUCCESS),
        Command::Order => commands::order::run().map(|()| ExitCode::SUCCESS),
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "pristine", &mut io::stdout());
            Ok(ExitCode::SUCCESS)
        }
    }
}
