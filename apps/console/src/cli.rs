use bridge_core::ServiceMode;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(name = "bridge", version, about = "Talk to the Perpetua daemon")]
pub struct Cli {
    /// Directory holding bridge.json (defaults to the platform config dir)
    #[arg(long, global = true)]
    pub config_dir: Option<PathBuf>,

    /// Directory for bridge.log (defaults to the config dir)
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    /// Print results and errors as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, PartialEq, Eq)]
pub enum Command {
    /// Ask the daemon for its status and show the active mode
    Status,

    /// Switch the daemon between client and server
    Mode {
        #[arg(value_enum)]
        target: ModeArg,
    },

    /// Follow mode changes, client connections and diagnostics until Ctrl-C
    Watch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    Client,
    Server,
}

impl From<ModeArg> for ServiceMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Client => ServiceMode::Client,
            ModeArg::Server => ServiceMode::Server,
        }
    }
}
