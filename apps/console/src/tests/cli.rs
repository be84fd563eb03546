use crate::cli::{Cli, Command, ModeArg};

use bridge_core::ServiceMode;

use std::path::PathBuf;

use clap::Parser;

/// **VALUE**: Global flags work on either side of the subcommand.
///
/// **BUG THIS CATCHES**: Dropping `global = true`, which would make
/// `bridge status --json` a usage error.
#[test]
fn given_flags_after_subcommand_when_parsed_then_applied() {
    let cli = Cli::try_parse_from(["bridge", "status", "--json", "--config-dir", "/tmp/perpetua"])
        .expect("valid arguments");

    assert_eq!(cli.command, Command::Status);
    assert!(cli.json);
    assert_eq!(cli.config_dir, Some(PathBuf::from("/tmp/perpetua")));
}

#[test]
fn given_mode_subcommand_when_parsed_then_target_maps_to_service_mode() {
    let cli = Cli::try_parse_from(["bridge", "-vv", "mode", "server"]).expect("valid arguments");

    assert_eq!(cli.verbose, 2);
    assert_eq!(cli.command, Command::Mode { target: ModeArg::Server });
    assert_eq!(ServiceMode::from(ModeArg::Client), ServiceMode::Client);
}

#[test]
fn given_unknown_mode_when_parsed_then_rejected() {
    assert!(Cli::try_parse_from(["bridge", "mode", "auto"]).is_err());
    assert!(Cli::try_parse_from(["bridge"]).is_err());
}
