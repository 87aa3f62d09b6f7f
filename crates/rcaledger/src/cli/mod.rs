//! Command-line interface for rcaledger.
//!
//! This module provides the CLI structure for the `rcal` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    AwbInput, ConfigCommand, ExportCommand, OutputFormat, RcaTypeArg, RoleArg, StatusCommand,
    SubmitCommand, SummaryCommand, TrackCommand, UserCommand,
};

/// rcal - Shipment RCA remark ledger
///
/// Records root-cause remarks against AWBs, keeping a bounded history per
/// AWB and archiving whatever falls off the end.
#[derive(Debug, Parser)]
#[command(name = "rcal")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Email to log in as
    #[arg(long, global = true, env = "RCALEDGER_EMAIL")]
    pub email: Option<String>,

    /// Password to log in with
    #[arg(long, global = true, env = "RCALEDGER_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show live remarks for AWBs
    Track(TrackCommand),

    /// Append one remark to many AWBs
    Submit(SubmitCommand),

    /// Show counts per service center and dashboard totals
    Summary(SummaryCommand),

    /// Export all tables to a spreadsheet (admin only)
    Export(ExportCommand),

    /// Manage users
    #[command(subcommand)]
    User(UserCommand),

    /// Drop archive and login rows past the retention window (admin only)
    Prune,

    /// Show database status
    Status(StatusCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Verbosity from `-q` / `-v`.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        crate::logging::Verbosity::from_flags(self.quiet, self.verbose)
    }

    /// Credentials from flags or environment, if both are present.
    #[must_use]
    pub fn credentials(&self) -> Option<(&str, &str)> {
        Some((self.email.as_deref()?, self.password.as_deref()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn status_cli(verbose: u8, quiet: bool) -> Cli {
        Cli {
            config: None,
            verbose,
            quiet,
            email: None,
            password: None,
            command: Command::Status(StatusCommand { json: false }),
        }
    }

    #[test]
    fn test_cli_name() {
        assert_eq!(Cli::command().get_name(), "rcal");
    }

    #[test]
    fn test_cli_verify() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_verbosity() {
        use crate::logging::Verbosity;
        assert_eq!(status_cli(0, true).verbosity(), Verbosity::Quiet);
        assert_eq!(status_cli(0, false).verbosity(), Verbosity::Normal);
        assert_eq!(status_cli(1, false).verbosity(), Verbosity::Verbose);
        assert_eq!(status_cli(2, false).verbosity(), Verbosity::Trace);
    }

    #[test]
    fn test_credentials_need_both() {
        let mut cli = status_cli(0, false);
        assert!(cli.credentials().is_none());
        cli.email = Some("a@example.com".to_string());
        assert!(cli.credentials().is_none());
        cli.password = Some("pw".to_string());
        assert_eq!(cli.credentials(), Some(("a@example.com", "pw")));
    }

    #[test]
    fn test_parse_track() {
        let cli = Cli::try_parse_from(["rcal", "track", "A1", "B2"]).unwrap();
        match cli.command {
            Command::Track(cmd) => {
                assert_eq!(cmd.input.awbs, vec!["A1", "B2"]);
                assert_eq!(cmd.format, OutputFormat::Table);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_submit() {
        let cli = Cli::try_parse_from([
            "rcal",
            "--email",
            "ops@example.com",
            "submit",
            "-s",
            "SC-1",
            "-t",
            "shortage",
            "-r",
            "two boxes short",
            "A1",
        ])
        .unwrap();
        assert_eq!(cli.email.as_deref(), Some("ops@example.com"));
        match cli.command {
            Command::Submit(cmd) => {
                assert_eq!(cmd.service_center, "SC-1");
                assert_eq!(cmd.rca_type, RcaTypeArg::Shortage);
                assert_eq!(cmd.remark, "two boxes short");
                assert_eq!(cmd.subject, "");
                assert_eq!(cmd.input.awbs, vec!["A1"]);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_submit_requires_remark() {
        assert!(Cli::try_parse_from(["rcal", "submit", "-s", "SC", "-t", "loss", "A1"]).is_err());
    }

    #[test]
    fn test_parse_user_create() {
        let cli = Cli::try_parse_from([
            "rcal",
            "user",
            "create",
            "x@example.com",
            "X",
            "--role",
            "admin",
            "--new-password",
            "pw",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Command::User(UserCommand::Create {
                role: RoleArg::Admin,
                ..
            })
        ));
    }

    #[test]
    fn test_parse_prune_and_export() {
        let cli = Cli::try_parse_from(["rcal", "prune"]).unwrap();
        assert!(matches!(cli.command, Command::Prune));

        let cli = Cli::try_parse_from(["rcal", "export", "-o", "/tmp/out.xlsx"]).unwrap();
        match cli.command {
            Command::Export(cmd) => assert_eq!(cmd.output, Some(PathBuf::from("/tmp/out.xlsx"))),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_with_config() {
        let cli = Cli::try_parse_from(["rcal", "-c", "/custom/config.toml", "status"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/custom/config.toml")));
    }

    #[test]
    fn test_parse_with_verbose_and_quiet() {
        let cli = Cli::try_parse_from(["rcal", "-v", "status"]).unwrap();
        assert_eq!(cli.verbose, 1);
        let cli = Cli::try_parse_from(["rcal", "-q", "status"]).unwrap();
        assert!(cli.quiet);
    }
}
