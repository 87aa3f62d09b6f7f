//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::{Path, PathBuf};

use clap::{Args, Subcommand, ValueEnum};

use crate::access::Role;
use crate::error::Result;
use crate::record::{parse_awbs, RcaType};

/// AWBs given on the command line and/or in a file, one per line.
#[derive(Debug, Clone, Default, Args)]
pub struct AwbInput {
    /// AWB numbers
    pub awbs: Vec<String>,

    /// Read more AWBs from this file, one per line
    #[arg(short, long, value_name = "FILE")]
    pub file: Option<PathBuf>,
}

impl AwbInput {
    /// Positional AWBs followed by those in the file, blank lines dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn collect(&self) -> Result<Vec<String>> {
        let mut awbs = parse_awbs(&self.awbs.join("\n"));
        if let Some(path) = &self.file {
            awbs.extend(read_awb_file(path)?);
        }
        Ok(awbs)
    }
}

fn read_awb_file(path: &Path) -> Result<Vec<String>> {
    Ok(parse_awbs(&std::fs::read_to_string(path)?))
}

/// Track command arguments.
#[derive(Debug, Args)]
pub struct TrackCommand {
    /// AWBs to look up
    #[command(flatten)]
    pub input: AwbInput,

    /// Output format
    #[arg(long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

/// Submit command arguments.
#[derive(Debug, Args)]
pub struct SubmitCommand {
    /// AWBs to attach the remark to
    #[command(flatten)]
    pub input: AwbInput,

    /// Service center responsible
    #[arg(short = 's', long)]
    pub service_center: String,

    /// Root-cause category
    #[arg(short = 't', long, value_enum)]
    pub rca_type: RcaTypeArg,

    /// Email subject the remark came from
    #[arg(long, default_value = "")]
    pub subject: String,

    /// Remark text
    #[arg(short, long)]
    pub remark: String,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Summary command arguments.
#[derive(Debug, Args)]
pub struct SummaryCommand {
    /// Include daily and monthly login activity (admin only)
    #[arg(long)]
    pub logins: bool,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Export command arguments.
#[derive(Debug, Args)]
pub struct ExportCommand {
    /// Output file (defaults to the configured file name)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

/// User management commands.
#[derive(Debug, Subcommand)]
pub enum UserCommand {
    /// Create the first superadmin on an empty ledger
    Bootstrap {
        /// Login email
        email: String,
        /// Display name
        name: String,
        /// Initial password
        #[arg(long, env = "RCALEDGER_NEW_PASSWORD", hide_env_values = true)]
        new_password: String,
    },

    /// Register a user (admin only)
    Create {
        /// Login email
        email: String,
        /// Display name
        name: String,
        /// Access role
        #[arg(short, long, value_enum, default_value = "user")]
        role: RoleArg,
        /// Initial password
        #[arg(long, env = "RCALEDGER_NEW_PASSWORD", hide_env_values = true)]
        new_password: String,
    },

    /// Change your own password
    Passwd {
        /// New password
        #[arg(long, env = "RCALEDGER_NEW_PASSWORD", hide_env_values = true)]
        new_password: String,
    },

    /// List users (admin only)
    List {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },
}

/// Status command arguments.
#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Root-cause category argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RcaTypeArg {
    /// Shipment pending
    Pendency,
    /// Pieces or weight short
    Shortage,
    /// Shipment lost
    Loss,
}

impl From<RcaTypeArg> for RcaType {
    fn from(arg: RcaTypeArg) -> Self {
        match arg {
            RcaTypeArg::Pendency => Self::Pendency,
            RcaTypeArg::Shortage => Self::Shortage,
            RcaTypeArg::Loss => Self::Loss,
        }
    }
}

/// Role argument for new users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RoleArg {
    /// Regular user
    User,
    /// Administrator
    Admin,
    /// Super administrator
    Superadmin,
}

impl From<RoleArg> for Role {
    fn from(arg: RoleArg) -> Self {
        match arg {
            RoleArg::User => Self::User,
            RoleArg::Admin => Self::Admin,
            RoleArg::Superadmin => Self::SuperAdmin,
        }
    }
}

/// Output format for commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Plain text output
    #[default]
    Plain,
    /// Formatted table
    Table,
    /// JSON output
    Json,
}
