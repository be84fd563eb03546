use bridge_console::cli::{Cli, Command};
use bridge_console::error::ConsoleError;
use bridge_console::logger::{initialize as LoggerInitialize, level_for_verbosity};
use bridge_console::session::{Session, describe_mode};

use bridge_core::config::{BridgeConfig, default_config_dir};

use std::fs::create_dir_all;
use std::process::ExitCode;

use clap::Parser;
use log::{error, info};
use serde_json::json;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let json_output = cli.json;

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            if json_output {
                let rendered = serde_json::to_string(&e).unwrap_or_else(|_| e.to_string());
                println!("{rendered}");
            } else {
                eprintln!("{e}");
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), ConsoleError> {
    let config_dir = match cli.config_dir {
        Some(dir) => dir,
        None => default_config_dir()?,
    };
    let log_dir = cli.log_dir.unwrap_or_else(|| config_dir.clone());

    create_dir_all(&log_dir)
        .map_err(|e| ConsoleError::console(format!("Failed to create log directory: {e}")))?;

    // Initialize logger FIRST
    LoggerInitialize(&log_dir, level_for_verbosity(cli.verbose))?;

    info!("Bridge console starting");
    info!("Config directory: {}", config_dir.display());

    let config = BridgeConfig::load(&config_dir)?;
    let session = Session::open(config).await?;

    let result = match cli.command {
        Command::Status => session.status().await.map(|report| {
            if cli.json {
                println!("{}", json!(report));
            } else {
                println!("{report}");
            }
        }),
        Command::Mode { target } => session.switch(target.into()).await.map(|mode| {
            if cli.json {
                println!("{}", json!({ "mode": mode }));
            } else {
                println!("{}", describe_mode(&session.mode()));
                info!("Daemon is in {mode} mode");
            }
        }),
        Command::Watch => session.watch(cli.json).await,
    };

    session.close();
    result
}
