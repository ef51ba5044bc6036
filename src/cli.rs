use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pristine")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Reset an Ubuntu server to its provisioning baseline", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file (default: /etc/pristine/config.toml)
    #[arg(long, global = true, env = "PRISTINE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Phases to leave alone, by label (repeatable, comma-separated)
    #[arg(long, global = true, value_delimiter = ',')]
    pub skip: Vec<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Report what a reset would remove, without changing anything
    Scan(ScanArgs),

    /// Remove everything installed since provisioning
    Reset(ResetArgs),

    /// Show the resolved baseline, or capture a new snapshot
    Baseline(BaselineArgs),

    /// Show phase scan order and execute order
    Order,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args)]
pub struct ScanArgs {
    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct ResetArgs {
    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct BaselineArgs {
    /// Write the host's current manual packages and snaps to the snapshot file
    #[arg(long)]
    pub capture: bool,

    /// Overwrite an existing snapshot when capturing
    #[arg(long, requires = "capture")]
    pub force: bool,

    /// Print every entry instead of a summary
    #[arg(long)]
    pub list: bool,
}
