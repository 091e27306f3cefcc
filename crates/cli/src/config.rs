//! Command-line configuration.
//!
//! Every global option can also be set through a `COMMITTEE_LEDGER__*` environment
//! variable. Command-line arguments take precedence.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Default location of the file-backed ledger store.
pub const DEFAULT_DATA_PATH: &str = "committee-ledger.json";

/// Command-line client for the committee registry.
#[derive(Debug, Parser)]
#[command(name = "committee-ledger", version, about)]
pub struct Cli {
    /// Path of the JSON file backing the ledger store.
    #[arg(long, env = "COMMITTEE_LEDGER__DATA", default_value = DEFAULT_DATA_PATH)]
    pub data: PathBuf,

    /// Account used as the member address for writes.
    #[arg(long, env = "COMMITTEE_LEDGER__ACCOUNT")]
    pub account: Option<String>,

    /// Log output format.
    #[arg(long, env = "COMMITTEE_LEDGER__LOG_FORMAT", value_enum, default_value_t = LogFormat::Auto)]
    pub log_format: LogFormat,

    /// Command to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines.
    Text,
    /// One JSON object per event.
    Json,
    /// JSON when stdout is not a terminal, text otherwise.
    Auto,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// List committee members, newest first.
    Members,
    /// Join the committee with the configured account.
    Join {
        /// Member role (Delegate, Validator, Ambassador, Contributor).
        #[arg(long)]
        role: String,
        /// Reputation score, 0 to 100.
        #[arg(long, allow_negative_numbers = true)]
        reputation: i64,
    },
    /// Trigger sortition over the current committee.
    Sortition {
        /// Seed for the selection. Defaults to the current time.
        #[arg(long)]
        seed: Option<String>,
    },
    /// Show committee statistics.
    Stats,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_join_arguments() {
        let cli = Cli::try_parse_from([
            "committee-ledger",
            "--account",
            "0xAA11",
            "join",
            "--role",
            "Delegate",
            "--reputation",
            "50",
        ])
        .unwrap();

        assert_eq!(cli.account.as_deref(), Some("0xAA11"));
        assert_eq!(cli.data, PathBuf::from(DEFAULT_DATA_PATH));
        match cli.command {
            Command::Join { role, reputation } => {
                assert_eq!(role, "Delegate");
                assert_eq!(reputation, 50);
            },
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_negative_reputation_reaches_validation() {
        let cli = Cli::try_parse_from([
            "committee-ledger",
            "join",
            "--role",
            "Delegate",
            "--reputation",
            "-1",
        ])
        .unwrap();
        assert!(matches!(cli.command, Command::Join { reputation: -1, .. }));
    }

    #[test]
    fn test_log_format_values() {
        let cli =
            Cli::try_parse_from(["committee-ledger", "--log-format", "json", "stats"]).unwrap();
        assert_eq!(cli.log_format, LogFormat::Json);
        assert!(Cli::try_parse_from(["committee-ledger", "--log-format", "xml", "stats"]).is_err());
    }

    #[test]
    fn test_sortition_seed_is_optional() {
        let cli = Cli::try_parse_from(["committee-ledger", "sortition"]).unwrap();
        assert!(matches!(cli.command, Command::Sortition { seed: None }));
    }
}
